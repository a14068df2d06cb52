//! Field resolution for record types.
//!
//! Filters name fields by string path. Before a predicate runs, every path is
//! resolved once to an accessor closure through a [`FieldResolver`]:
//! - [`FieldRegistry`]: per-type registry of typed accessors, built once at startup
//! - [`JsonFields`]: dotted-path access into `serde_json::Value` records
//!
//! Accessors return `None` for a missing value anywhere along the path, which is
//! what makes field access null-propagating.
//!
//! # Example
//!
//! ```rust
//! use querykit::{FieldKind, FieldRegistry, Value};
//!
//! struct Address { city: String }
//! struct User { age: i64, address: Option<Address> }
//!
//! let fields = FieldRegistry::<User>::new()
//!     .insert("age", FieldKind::I64, |u| Some(Value::from(u.age)))
//!     .insert("address.city", FieldKind::String, |u| {
//!         u.address.as_ref().map(|a| Value::from(a.city.as_str()))
//!     });
//! assert!(fields.get("Address.City").is_some());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Logical field types, used to reject literals that can never match a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    I64,
    F64,
    Decimal,
    Bool,
    Uuid,
    DateTimeUtc,
}

impl FieldKind {
    /// Whether a literal of this value's type can be compared with the field.
    ///
    /// Strings are accepted for uuid and datetime fields; they are parsed at
    /// comparison time.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (FieldKind::String, Value::String(_))
                | (
                    FieldKind::I64 | FieldKind::F64 | FieldKind::Decimal,
                    Value::Number(_)
                )
                | (FieldKind::Bool, Value::Bool(_))
                | (FieldKind::Uuid, Value::Uuid(_) | Value::String(_))
                | (FieldKind::DateTimeUtc, Value::DateTime(_) | Value::String(_))
        )
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::String => write!(f, "String"),
            FieldKind::I64 => write!(f, "I64"),
            FieldKind::F64 => write!(f, "F64"),
            FieldKind::Decimal => write!(f, "Decimal"),
            FieldKind::Bool => write!(f, "Bool"),
            FieldKind::Uuid => write!(f, "Uuid"),
            FieldKind::DateTimeUtc => write!(f, "DateTimeUtc"),
        }
    }
}

/// Reads one field from a record; `None` means null or missing.
pub type Accessor<T> = Arc<dyn Fn(&T) -> Option<Value> + Send + Sync>;

/// A field path resolved against a record type.
pub struct ResolvedField<T> {
    pub accessor: Accessor<T>,
    /// `None` when the resolver has no static type for the field.
    pub kind: Option<FieldKind>,
}

impl<T> Clone for ResolvedField<T> {
    fn clone(&self) -> Self {
        Self {
            accessor: Arc::clone(&self.accessor),
            kind: self.kind,
        }
    }
}

impl<T> fmt::Debug for ResolvedField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedField")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Resolves field paths of a record type to accessors.
pub trait FieldResolver<T>: Send + Sync {
    fn resolve(&self, path: &str) -> Option<ResolvedField<T>>;
}

impl<T, R: FieldResolver<T> + ?Sized> FieldResolver<T> for Arc<R> {
    fn resolve(&self, path: &str) -> Option<ResolvedField<T>> {
        (**self).resolve(path)
    }
}

/// Registry of typed accessors for one record type.
///
/// Field names are matched case-insensitively.
#[must_use]
pub struct FieldRegistry<T> {
    fields: HashMap<String, ResolvedField<T>>,
}

impl<T> Default for FieldRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FieldRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
        }
    }
}

impl<T> FieldRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    pub fn insert<F>(mut self, name: impl Into<String>, kind: FieldKind, accessor: F) -> Self
    where
        F: Fn(&T) -> Option<Value> + Send + Sync + 'static,
    {
        self.fields.insert(
            name.into().to_lowercase(),
            ResolvedField {
                accessor: Arc::new(accessor),
                kind: Some(kind),
            },
        );
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResolvedField<T>> {
        self.fields.get(&name.to_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<T> fmt::Debug for FieldRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FieldRegistry")
            .field("fields", &names)
            .finish()
    }
}

impl<T> FieldResolver<T> for FieldRegistry<T> {
    fn resolve(&self, path: &str) -> Option<ResolvedField<T>> {
        self.get(path).cloned()
    }
}

/// Dotted-path resolver for JSON records.
///
/// Any non-empty path resolves; a path segment that is missing, null, or not an
/// object yields null. Numeric segments index into arrays. Non-scalar leaves
/// read as null.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonFields;

impl FieldResolver<serde_json::Value> for JsonFields {
    fn resolve(&self, path: &str) -> Option<ResolvedField<serde_json::Value>> {
        let segments: Vec<String> = path.split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return None;
        }
        Some(ResolvedField {
            accessor: Arc::new(move |record: &serde_json::Value| {
                let mut current = record;
                for segment in &segments {
                    current = match current {
                        serde_json::Value::Object(map) => map.get(segment)?,
                        serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                        _ => return None,
                    };
                }
                Value::try_from(current.clone()).ok().filter(|v| !v.is_null())
            }),
            kind: None,
        })
    }
}
