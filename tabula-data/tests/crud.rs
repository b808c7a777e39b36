mod common;

use common::*;
use serde_json::json;
use tabula_data::{Args, CrudExt, DataConfig, DataError, Filter, Identity, Registry};

#[tokio::test]
async fn test_get_or_none_detaches_before_mapping() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new().respond(vec![json!({"id": 1, "name": "Ann", "email": null})]);

    let person = registry.crud::<Person, _>(&mut session).get_or_none(1).await.unwrap();
    assert_eq!(
        person,
        Some(Person {
            id: 1,
            name: "Ann".into()
        })
    );
    assert_eq!(session.detached.len(), 1);
    assert_eq!(
        session.sql(),
        vec!["SELECT persons.id, persons.name, persons.email FROM persons WHERE persons.id = ?"]
    );
}

#[tokio::test]
async fn test_get_absent_is_not_found() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new();
    let mut crud = Person::crud(&registry, &mut session);

    assert!(crud.get_or_none(9).await.unwrap().is_none());
    assert!(!crud.exist(9).await.unwrap());
    assert!(crud.get(9).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_identity_arguments() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new();
    let mut crud = registry.crud::<Membership, _>(&mut session);

    let positional = crud.get_or_none(1).await;
    assert!(matches!(positional, Err(DataError::Argument(_))));

    let keyed = crud
        .get_or_none([("org", json!("acme")), ("user_id", json!(1))])
        .await
        .unwrap();
    assert!(keyed.is_none());
    drop(crud);
    assert_eq!(session.executed.len(), 1);
    assert!(session.executed[0]
        .sql
        .ends_with("WHERE memberships.org = ? AND memberships.user_id = ?"));
}

#[tokio::test]
async fn test_create_flushes_then_refetches() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new()
        .respond(vec![json!({"id": 7})])
        .respond(vec![json!({"id": 7, "name": "A", "email": null})]);

    let created = registry
        .crud::<Person, _>(&mut session)
        .create(Args::new().set("id", 99).set("name", "A"))
        .await
        .unwrap();
    assert_eq!(
        created,
        Person {
            id: 7,
            name: "A".into()
        }
    );
    assert_eq!(session.flushes, 1);
    assert_eq!(session.sql()[0], "INSERT INTO persons (name) VALUES (?) RETURNING id");
    assert_eq!(session.executed[1].params, vec![json!(7)]);
}

#[tokio::test]
async fn test_create_rejects_conflicting_sources() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new();
    let args = Args::object(&json!({"name": "A"})).unwrap().set("name", "B");
    let err = registry.crud::<Person, _>(&mut session).create(args).await.unwrap_err();
    assert!(matches!(err, DataError::Argument(_)));
    assert!(session.executed.is_empty());
}

#[tokio::test]
async fn test_update_of_absent_record_does_not_write() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new();
    let mut crud = registry.crud::<Person, _>(&mut session);

    let result = crud.update_or_none(3, Args::new().set("name", "B")).await.unwrap();
    assert!(result.is_none());
    let strict = crud.update(3, Args::new().set("name", "B")).await;
    assert!(strict.unwrap_err().is_not_found());
    drop(crud);

    assert!(session.sql().iter().all(|sql| sql.starts_with("SELECT")));
    assert_eq!(session.flushes, 0);
}

#[tokio::test]
async fn test_update_existing_record() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new()
        .respond(vec![json!({"id": 3, "name": "A", "email": null})])
        .respond(vec![json!({"id": 3, "name": "B", "email": null})])
        .respond(vec![json!({"id": 3, "name": "B", "email": null})]);

    let updated = registry
        .crud::<Person, _>(&mut session)
        .update(3, Args::new().set("name", "B"))
        .await
        .unwrap();
    assert_eq!(updated.name, "B");
    assert_eq!(
        session.sql()[1],
        "UPDATE persons SET name = ? WHERE persons.id = ? RETURNING id, name, email"
    );
    assert_eq!(session.flushes, 1);
}

#[tokio::test]
async fn test_delete_variants() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new();
    let mut crud = registry.crud::<Person, _>(&mut session);

    for _ in 0..2 {
        assert_eq!(crud.delete_or_zero(5).await.unwrap(), 0);
        assert!(crud.delete(5).await.unwrap_err().is_not_found());
    }
    drop(crud);

    let mut session = ScriptedSession::new()
        .respond(vec![json!({"id": 5, "name": "A", "email": null})])
        .respond(vec![json!({"id": 5})]);
    let removed = registry.crud::<Person, _>(&mut session).delete_or_zero(5).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(session.sql()[1], "DELETE FROM persons WHERE persons.id = ? RETURNING id");
    assert_eq!(session.flushes, 1);
}

#[tokio::test]
async fn test_upsert_requires_keys() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new();
    let err = registry
        .crud::<Person, _>(&mut session)
        .upsert(Args::new().set("name", "A"))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Argument(_)));
}

#[tokio::test]
async fn test_paginate_clamps_page() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new().respond(vec![]).respond(vec![]);
    let mut crud = registry.crud::<Person, _>(&mut session);

    let zero = crud.paginate(|s| s, 0, 10).await.unwrap();
    let one = crud.paginate(|s| s, 1, 10).await.unwrap();
    assert_eq!(zero, one);
    assert_eq!(zero.page, 1);
    drop(crud);
    assert_eq!(session.sql().len(), 2);
    assert_eq!(session.sql()[0], session.sql()[1]);
    assert!(session.sql()[0].ends_with("LIMIT 10 OFFSET 0"));
}

#[tokio::test]
async fn test_paginate_rejects_offset_overflow() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new();
    let err = registry
        .crud::<Person, _>(&mut session)
        .paginate(|s| s, u64::MAX, 50)
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Argument(_)));
    assert!(session.executed.is_empty());
}

#[tokio::test]
async fn test_split_on_empty_table() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new().respond(vec![]);
    let split = registry
        .crud::<Person, _>(&mut session)
        .split(|s| s.where_like("name", "A%"), 0, 50)
        .await
        .unwrap();
    assert_eq!(split.offset, 0);
    assert_eq!(split.count, 0);
    assert!(split.result.is_empty());
    assert_eq!(
        session.sql(),
        vec!["SELECT persons.id, persons.name, persons.email FROM persons WHERE persons.name LIKE ? LIMIT 50 OFFSET 0"]
    );
}

#[tokio::test]
async fn test_split_counts_returned_records() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new().respond(vec![
        json!({"id": 1, "name": "A"}),
        json!({"id": 2, "name": "B"}),
    ]);
    let split = registry
        .crud::<Person, _>(&mut session)
        .split(|s| s, 0, 2)
        .await
        .unwrap();
    assert_eq!(split.count, split.result.len() as u64);
    assert_eq!(split.count, 2);
    assert_eq!(session.executed.len(), 1);
}

#[tokio::test]
async fn test_page_size_limits() {
    let registry = Registry::new(DataConfig {
        max_per_page: Some(5),
        ..DataConfig::default()
    });
    let mut session = ScriptedSession::new().respond(vec![]);
    registry
        .crud::<Person, _>(&mut session)
        .paginate(|s| s.order_by("id", true), 3, 100)
        .await
        .unwrap();
    assert!(session.sql()[0].ends_with("ORDER BY persons.id ASC LIMIT 5 OFFSET 10"));
}

#[tokio::test]
async fn test_all_hydrates_relationships() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new().respond(vec![
        json!({"id": 1, "name": "P", "children.id": 10, "children.name": "a", "children.parent_id": 1}),
        json!({"id": 1, "name": "P", "children.id": 11, "children.name": "b", "children.parent_id": 1}),
        json!({"id": 2, "name": "Q", "children.id": null, "children.name": null, "children.parent_id": null}),
    ]);
    let parents = registry.crud::<ParentView, _>(&mut session).all(|s| s).await.unwrap();
    assert_eq!(parents.len(), 2);
    assert_eq!(parents[0].children.len(), 2);
    assert!(parents[1].children.is_empty());
    assert_eq!(session.executed.len(), 1);
}

#[tokio::test]
async fn test_keyed_identity_conversions() {
    let registry = Registry::default();
    let mut session = ScriptedSession::new();
    let mut crud = registry.crud::<Person, _>(&mut session);
    let wrong = crud.get_or_none(Identity::from([("name", "Ann")])).await;
    assert!(matches!(wrong, Err(DataError::Argument(_))));
}
