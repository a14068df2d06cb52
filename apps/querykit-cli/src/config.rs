use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use querykit::QueryLimits;
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides, e.g. `QUERYKIT__PAGING__SIZE=25`.
pub const ENV_PREFIX: &str = "QUERYKIT__";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub paging: PagingConfig,
    pub limits: QueryLimits,
    /// Sort key appended (ascending) when a request does not already sort by it.
    pub tiebreaker: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset and no `-v` is given.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            json: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub size: u64,
    pub origin: u64,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self { size: 10, origin: 1 }
    }
}

/// Values given on the command line; they win over every other layer.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub size: Option<u64>,
    pub origin: Option<u64>,
    pub verbose: u8,
}

impl AppConfig {
    /// Layered load: defaults -> YAML file (if given) -> `QUERYKIT__*` env.
    ///
    /// # Errors
    /// Returns an error if the file is missing or any layer fails to parse.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            if !path.is_file() {
                anyhow::bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }

    pub fn apply_cli_overrides(&mut self, args: &CliOverrides) {
        if let Some(size) = args.size {
            self.paging.size = size;
        }
        if let Some(origin) = args.origin {
            self.paging.origin = origin;
        }
        match args.verbose {
            0 => {}
            1 => "info".clone_into(&mut self.logging.level),
            2 => "debug".clone_into(&mut self.logging.level),
            _ => "trace".clone_into(&mut self.logging.level),
        }
    }

    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to render configuration")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_file_or_env() {
        Jail::expect_with(|_jail| {
            let config = AppConfig::load_or_default(None).unwrap();
            assert_eq!(config, AppConfig::default());
            assert_eq!(config.paging.size, 10);
            assert_eq!(config.limits.max_depth, 16);
            Ok(())
        });
    }

    #[test]
    fn yaml_then_env_then_cli() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "querykit.yaml",
                r"
logging:
  level: info
paging:
  size: 25
  origin: 0
limits:
  max_depth: 4
tiebreaker: id
",
            )?;
            jail.set_env("QUERYKIT__PAGING__SIZE", "50");

            let mut config = AppConfig::load_or_default(Some(Path::new("querykit.yaml"))).unwrap();
            assert_eq!(config.paging.size, 50);
            assert_eq!(config.paging.origin, 0);
            assert_eq!(config.limits.max_depth, 4);
            assert_eq!(config.limits.max_conditions, 256);
            assert_eq!(config.tiebreaker.as_deref(), Some("id"));
            assert_eq!(config.logging.level, "info");

            config.apply_cli_overrides(&CliOverrides {
                size: Some(5),
                origin: None,
                verbose: 2,
            });
            assert_eq!(config.paging.size, 5);
            assert_eq!(config.paging.origin, 0);
            assert_eq!(config.logging.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load_or_default(Some(Path::new("/definitely/not/here.yaml")))
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
