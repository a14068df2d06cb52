#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Repository helpers over a typed in-memory store.

use querykit::{
    Condition, DynamicQuery, FieldKind, FieldRegistry, Lambda, Logic, OrderBy, OrderKey,
    Predicate, Sort, SortDir, ValidationError, Value,
};
use querykit_store::{
    AsyncRepository, Keyed, MemoryQuery, MemoryStore, PageError, PageRequest, QueryError,
    Repository, paginate,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, PartialEq)]
struct User {
    id: u32,
    last_name: String,
    age: i64,
    active: bool,
    email: Option<String>,
}

impl Keyed for User {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

fn user_fields() -> FieldRegistry<User> {
    FieldRegistry::new()
        .insert("id", FieldKind::I64, |u: &User| Some(Value::from(u.id)))
        .insert("lastName", FieldKind::String, |u: &User| {
            Some(Value::from(u.last_name.as_str()))
        })
        .insert("age", FieldKind::I64, |u: &User| Some(Value::from(u.age)))
        .insert("active", FieldKind::Bool, |u: &User| Some(Value::from(u.active)))
        .insert("email", FieldKind::String, |u: &User| {
            u.email.as_deref().map(Value::from)
        })
}

fn store() -> MemoryStore<User> {
    let rows = (1..=25u32).map(|id| User {
        id,
        last_name: match id % 3 {
            0 => "Adams",
            1 => "Baker",
            _ => "Clark",
        }
        .to_owned(),
        age: 18 + i64::from(id),
        active: id % 2 == 0,
        email: (id % 5 != 0).then(|| format!("u{id}@example.com")),
    });
    MemoryStore::with_rows(user_fields(), rows)
}

fn ids(rows: &[User]) -> Vec<u32> {
    rows.iter().map(|u| u.id).collect()
}

fn age_desc() -> OrderBy {
    OrderBy(vec![OrderKey {
        field: "age".to_owned(),
        dir: SortDir::Desc,
    }])
}

#[test]
fn get_returns_first_match() {
    let store = store();
    let p: Predicate = Lambda::new(|x| x.field("age").gt(40)).into();

    let found = store.get(&p).unwrap();

    assert_eq!(found.map(|u| u.id), Some(23));
}

#[test]
fn get_returns_none_without_match() {
    let p: Predicate = Lambda::new(|x| x.field("age").gt(400)).into();
    assert_eq!(store().get(&p).unwrap(), None);
}

#[test]
fn get_list_orders_before_taking() {
    let rows = store().get_list(None, Some(&age_desc()), Some(3)).unwrap();
    assert_eq!(ids(&rows), vec![25, 24, 23]);
}

#[test]
fn get_list_filters() {
    let p: Predicate = Lambda::new(|x| x.field("email").is_null()).into();
    let rows = store().get_list(Some(&p), None, None).unwrap();
    assert_eq!(ids(&rows), vec![5, 10, 15, 20, 25]);
}

#[test]
fn get_paginated_list_uses_one_based_pages() {
    let page = store()
        .get_paginated_list(None, Some(&age_desc()), 3, 10)
        .unwrap();

    assert_eq!(page.origin, 1);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_previous);
    assert!(!page.has_next);
    assert_eq!(ids(&page.items), vec![5, 4, 3, 2, 1]);
}

#[test]
fn paginated_list_rejects_index_before_origin() {
    let err = store().get_paginated_list(None, None, 0, 10).unwrap_err();
    assert!(matches!(err, PageError::InvalidArgument(_)));
}

/// Repository that counts how often its source is opened.
struct CountingUsers {
    store: MemoryStore<User>,
    opened: AtomicUsize,
}

impl CountingUsers {
    fn new() -> Self {
        Self {
            store: store(),
            opened: AtomicUsize::new(0),
        }
    }

    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Repository for CountingUsers {
    type Query = MemoryQuery<User>;

    fn source(&self) -> MemoryQuery<User> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.store.query()
    }
}

impl AsyncRepository for CountingUsers {}

#[test]
fn page_argument_errors_come_before_opening_the_source() {
    // Arrange
    let repo = CountingUsers::new();
    let p: Predicate = Lambda::new(|x| x.field("age").gt(20)).into();
    let request = DynamicQuery::new();

    // Act
    let errors = [
        repo.get_paginated_list(Some(&p), Some(&age_desc()), 0, 10).unwrap_err(),
        repo.get_paginated_list(None, None, 1, 0).unwrap_err(),
        repo.get_paginated_dynamic_list(&request, Some(&p), 0, 10).unwrap_err(),
    ];

    // Assert
    for err in errors {
        assert!(matches!(err, PageError::InvalidArgument(_)), "{err}");
    }
    assert_eq!(repo.opened(), 0);

    repo.get_paginated_list(None, None, 1, 10).unwrap();
    assert_eq!(repo.opened(), 1);
}

#[tokio::test]
async fn async_page_argument_errors_come_before_opening_the_source() {
    let repo = CountingUsers::new();
    let cancel = CancellationToken::new();

    let err = repo
        .get_paginated_list_async(None, None, 0, 10, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, PageError::InvalidArgument(_)));

    let err = repo
        .get_paginated_dynamic_list_async(&DynamicQuery::new(), None, 0, 10, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, PageError::InvalidArgument(_)));

    assert_eq!(repo.opened(), 0);
}

#[test]
fn dynamic_list_combines_request_and_extra_predicate() {
    // Arrange
    let request: DynamicQuery = serde_json::from_value(json!({
        "sort": [
            { "field": "lastName", "direction": "asc" },
            { "field": "age", "direction": "desc" }
        ],
        "filter": {
            "field": "age", "operator": "gte", "value": 30, "logic": "and",
            "children": [{ "field": "active", "operator": "eq", "value": true }]
        }
    }))
    .unwrap();
    let extra: Predicate = Lambda::new(|y| y.field("email").is_not_null()).into();

    // Act
    let rows = store().get_dynamic_list(&request, Some(&extra), None).unwrap();

    // Assert
    assert!(rows.iter().all(|u| u.age >= 30 && u.active && u.email.is_some()));
    let keys: Vec<(String, i64)> = rows.iter().map(|u| (u.last_name.clone(), u.age)).collect();
    let mut sorted = keys.clone();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
    assert_eq!(keys, sorted);
    assert_eq!(ids(&rows), vec![24, 18, 12, 22, 16, 14]);
}

#[test]
fn dynamic_list_size_applies_after_ordering() {
    let request = DynamicQuery::new().with_sort(Sort::desc("id"));
    let rows = store().get_dynamic_list(&request, None, Some(2)).unwrap();
    assert_eq!(ids(&rows), vec![25, 24]);
}

#[test]
fn paginated_dynamic_list_counts_all_matches() {
    let request = DynamicQuery::new()
        .with_filter(Condition::new("lastName", "eq").with_value("Baker"))
        .with_sort(Sort::asc("id"));

    let page = store()
        .get_paginated_dynamic_list(&request, None, 2, 3)
        .unwrap();

    assert_eq!(page.total_count, 9);
    assert_eq!(page.total_pages, 3);
    assert_eq!(ids(&page.items), vec![10, 13, 16]);
}

#[test]
fn dynamic_validation_errors_surface() {
    let request = DynamicQuery::new().with_filter(
        Condition::new("age", "gte")
            .with_value(1)
            .with_child(Condition::new("id", "eq").with_value(1)),
    );

    let err = store().get_dynamic_list(&request, None, None).unwrap_err();

    assert!(matches!(
        err,
        PageError::Validation(ValidationError::InvalidLogic { .. })
    ));
}

#[test]
fn unknown_field_surfaces_as_query_error() {
    let request =
        DynamicQuery::new().with_filter(Condition::new("nickname", "eq").with_value("x"));
    let err = store().get_dynamic_list(&request, None, None).unwrap_err();
    assert!(matches!(err, PageError::Query(QueryError::Bind(_))));
}

#[test]
fn type_mismatch_surfaces_as_query_error() {
    let request = DynamicQuery::new().with_filter(
        Condition::new("age", "gte")
            .with_value("thirty")
            .with_logic(Logic::And),
    );
    let err = store().get_dynamic_list(&request, None, None).unwrap_err();
    assert!(matches!(err, PageError::Query(QueryError::Bind(_))));
}

#[test]
fn page_reflects_mutations() {
    let store = store();
    let before = paginate(&store.query(), PageRequest::default()).unwrap();

    store
        .delete_range(&store.get_list(None, None, Some(5)).unwrap())
        .unwrap();
    let after = paginate(&store.query(), PageRequest::default()).unwrap();

    assert_eq!(before.total_count, 25);
    assert_eq!(after.total_count, 20);
    assert_eq!(after.items.first().map(|u| u.id), Some(6));
}

#[tokio::test]
async fn async_helpers_match_sync_helpers() {
    let store = store();
    let cancel = CancellationToken::new();
    let p: Predicate = Lambda::new(|x| x.field("active").eq(true)).into();
    let request = DynamicQuery::new().with_sort(Sort::desc("age"));

    assert_eq!(
        store.get_async(&p, &cancel).await.unwrap(),
        store.get(&p).unwrap()
    );
    assert_eq!(
        store
            .get_list_async(Some(&p), Some(&age_desc()), Some(4), &cancel)
            .await
            .unwrap(),
        store.get_list(Some(&p), Some(&age_desc()), Some(4)).unwrap()
    );
    assert_eq!(
        store
            .get_paginated_list_async(Some(&p), None, 2, 5, &cancel)
            .await
            .unwrap(),
        store.get_paginated_list(Some(&p), None, 2, 5).unwrap()
    );
    assert_eq!(
        store
            .get_dynamic_list_async(&request, Some(&p), Some(3), &cancel)
            .await
            .unwrap(),
        store.get_dynamic_list(&request, Some(&p), Some(3)).unwrap()
    );
    assert_eq!(
        store
            .get_paginated_dynamic_list_async(&request, None, 1, 7, &cancel)
            .await
            .unwrap(),
        store.get_paginated_dynamic_list(&request, None, 1, 7).unwrap()
    );
}

#[tokio::test]
async fn async_helpers_honor_cancellation() {
    let store = store();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = store
        .get_paginated_dynamic_list_async(&DynamicQuery::new(), None, 1, 10, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, PageError::Cancelled);

    let err = store
        .get_list_async(None, None, None, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, PageError::Cancelled);
}

#[tokio::test]
async fn concurrent_pages_read_consistent_snapshots() {
    let store = store();
    let cancel = CancellationToken::new();

    let pages = futures::future::join_all((1..=3).map(|index| {
        let store = store.clone();
        let cancel = cancel.clone();
        async move {
            store
                .get_paginated_list_async(None, None, index, 10, &cancel)
                .await
                .unwrap()
        }
    }))
    .await;

    let all: Vec<u32> = pages.iter().flat_map(|p| ids(&p.items)).collect();
    assert_eq!(all, (1..=25).collect::<Vec<_>>());
}
