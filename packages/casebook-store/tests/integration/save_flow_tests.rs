//! Save flow tests: optimistic publish, confirmation, rollback, conflicts.

use std::time::Duration;

use casebook_core::{RecordId, SnapshotOrigin, StoreError, SyncError};
use serde_json::json;

use super::helpers::{client_schema, doc, loaded_fixture, record_log, status, JANE};

#[tokio::test]
async fn test_noop_edit_reproduces_snapshot() {
    let fixture = loaded_fixture().await;
    let id = RecordId::new(JANE);

    let session = fixture.controller.begin_edit(&id, client_schema()).unwrap();
    let record = session.to_record().unwrap();

    assert_eq!(&record, fixture.cache.get(&id).unwrap().record());
}

#[tokio::test]
async fn test_confirmed_value_replaces_optimistic_value() {
    let fixture = loaded_fixture().await;
    let id = RecordId::new(JANE);
    let (_sub, log) = record_log(&fixture.cache, &id);

    let mut session = fixture.controller.begin_edit(&id, client_schema()).unwrap();
    session.set_field("metadata.status", json!("Active")).unwrap();
    let optimistic = session.to_record().unwrap();

    let confirmed = fixture.controller.save_session(&mut session).await.unwrap();

    // The store stamps updatedAt, so the confirmed value differs
    assert_ne!(confirmed.record(), &optimistic);
    assert!(confirmed.record().field("updatedAt").is_some());
    let current = fixture.cache.get(&id).unwrap();
    assert!(current.same_record(&confirmed));
    assert!(!current.is_optimistic());
    assert!(session.is_closed());

    let active = Some("Active".to_string());
    assert_eq!(
        *log.lock(),
        vec![
            Some((SnapshotOrigin::Optimistic, active.clone())),
            Some((SnapshotOrigin::Remote, active)),
        ]
    );
}

#[tokio::test]
async fn test_partial_object_edit_saves_complete_record() {
    let fixture = loaded_fixture().await;
    let id = RecordId::new(JANE);

    let mut session = fixture.controller.begin_edit(&id, client_schema()).unwrap();
    session
        .set_field("profile", json!({"firstName": "Janet"}))
        .unwrap();
    let pending = fixture.controller.save(session.to_record().unwrap()).unwrap();

    let optimistic = fixture.cache.get(&id).unwrap();
    assert!(optimistic.is_optimistic());
    assert_eq!(
        optimistic.record().field("profile"),
        Some(&json!({"firstName": "Janet", "lastName": "Doe", "dob": "1990-04-02", "age": 34}))
    );

    let confirmed = pending.await.unwrap();
    assert_eq!(
        confirmed.record().field("profile"),
        optimistic.record().field("profile")
    );
    assert_eq!(
        fixture.store.stored(&id).unwrap().field("profile.lastName"),
        Some(&json!("Doe"))
    );
}

#[tokio::test]
async fn test_rejected_save_restores_pre_save_snapshot() {
    let fixture = loaded_fixture().await;
    let id = RecordId::new(JANE);
    let before = fixture.cache.get(&id).unwrap();
    fixture
        .store
        .fail_next_write(StoreError::Rejected("validation".to_string()));

    let mut session = fixture.controller.begin_edit(&id, client_schema()).unwrap();
    session.set_field("metadata.status", json!("Active")).unwrap();
    let pending = fixture.controller.save(session.to_record().unwrap()).unwrap();
    assert_eq!(
        status(&fixture.cache.get(&id).unwrap()).as_deref(),
        Some("Active")
    );

    let err = pending.await.unwrap_err();
    assert_eq!(
        err,
        SyncError::WriteFailed {
            id: id.clone(),
            cause: StoreError::Rejected("validation".to_string()),
        }
    );
    let after = fixture.cache.get(&id).unwrap();
    assert!(after.same_record(&before));
    assert_eq!(after.origin(), before.origin());
    assert_eq!(fixture.store.stored(&id).unwrap().field("metadata.status"), Some(&json!("Prospect")));
}

#[tokio::test]
async fn test_second_save_conflicts_without_store_write() {
    let fixture = loaded_fixture().await;
    let id = RecordId::new(JANE);
    let gate = fixture.store.hold_writes();

    let mut first = fixture.cache.get(&id).unwrap().record().clone();
    first.fields.insert("referralSource".to_string(), json!("Walk-in"));
    let pending = fixture.controller.save(first).unwrap();
    tokio::task::yield_now().await;
    assert_eq!(fixture.store.write_count(), 1);

    let second = fixture.cache.get(&id).unwrap().record().clone();
    let err = fixture.controller.save(second).unwrap_err();
    assert_eq!(err, SyncError::Conflict { id: id.clone() });

    gate.release();
    let confirmed = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(confirmed.record().field("referralSource"), Some(&json!("Walk-in")));
    assert_eq!(fixture.store.write_count(), 1);
    assert!(!fixture.controller.is_saving(&id));
}

#[tokio::test]
async fn test_failed_save_keeps_session_for_retry() {
    let fixture = loaded_fixture().await;
    let id = RecordId::new(JANE);
    fixture
        .store
        .fail_next_write(StoreError::Network("unavailable".to_string()));

    let mut session = fixture.controller.begin_edit(&id, client_schema()).unwrap();
    session.set_field("metadata.status", json!("Active")).unwrap();

    let err = fixture.controller.save_session(&mut session).await.unwrap_err();
    assert!(err.store_cause().is_some_and(StoreError::is_transient));
    assert!(!session.is_closed());
    assert_eq!(session.changed_fields().unwrap(), vec!["metadata.status".to_string()]);
    assert_eq!(
        status(&fixture.cache.get(&id).unwrap()).as_deref(),
        Some("Prospect")
    );

    let confirmed = fixture.controller.save_session(&mut session).await.unwrap();
    assert_eq!(status(&confirmed).as_deref(), Some("Active"));
    assert_eq!(fixture.store.write_count(), 2);
}

#[tokio::test]
async fn test_draft_save_creates_record_with_store_id() {
    let fixture = loaded_fixture().await;
    let mut session = fixture.controller.begin_draft(
        client_schema(),
        doc(json!({"profile": {"firstName": "Sam", "lastName": "Lee"}})),
    );
    let draft_id = session.id().clone();
    let (sub, log) = record_log(&fixture.cache, &draft_id);
    session.set_field("metadata.status", json!("Prospect")).unwrap();

    let confirmed = fixture.controller.save_session(&mut session).await.unwrap();

    assert_eq!(confirmed.id().as_str(), "rec001");
    assert!(confirmed.record().field("createdAt").is_some());
    assert!(fixture.cache.get(&draft_id).is_none());
    assert!(fixture.cache.get(confirmed.id()).unwrap().same_record(&confirmed));
    assert_eq!(sub.record_id(), *confirmed.id());
    assert_eq!(log.lock().len(), 2);
    assert_eq!(fixture.store.stored(confirmed.id()).unwrap(), *confirmed.record());
}

#[tokio::test]
async fn test_concurrent_external_edit_last_write_wins() {
    let fixture = loaded_fixture().await;
    let id = RecordId::new(JANE);
    let gate = fixture.store.hold_writes();

    let mut session = fixture.controller.begin_edit(&id, client_schema()).unwrap();
    session.set_field("metadata.status", json!("Active")).unwrap();
    let pending = fixture.controller.save(session.to_record().unwrap()).unwrap();
    tokio::task::yield_now().await;

    // Another user changes the status while our write is in flight
    fixture
        .store
        .external_update(&id, doc(json!({"metadata": {"status": "Inactive"}})));

    gate.release();
    let confirmed = pending.await.unwrap();
    assert_eq!(status(&confirmed).as_deref(), Some("Active"));
    assert_eq!(
        fixture.store.stored(&id).unwrap().field("metadata.status"),
        Some(&json!("Active"))
    );
}

#[tokio::test]
async fn test_saves_on_different_records_run_concurrently() {
    let fixture = loaded_fixture().await;
    let jane = RecordId::new(JANE);
    let gate = fixture.store.hold_writes();

    let draft = fixture
        .controller
        .begin_draft(client_schema(), doc(json!({"referralSource": "Partner"})));
    let first = fixture
        .controller
        .save(fixture.cache.get(&jane).unwrap().record().clone())
        .unwrap();
    let second = fixture.controller.save(draft.to_record().unwrap()).unwrap();
    assert_eq!(fixture.controller.pending_count(), 2);

    gate.release();
    first.await.unwrap();
    second.await.unwrap();
    assert_eq!(fixture.controller.pending_count(), 0);
    assert_eq!(fixture.store.write_count(), 2);
}

#[tokio::test]
async fn test_discarded_session_rejects_edits() {
    let fixture = loaded_fixture().await;
    let id = RecordId::new(JANE);

    let mut session = fixture.controller.begin_edit(&id, client_schema()).unwrap();
    session.discard();

    assert_eq!(
        session.set_field("metadata.status", json!("Active")).unwrap_err(),
        SyncError::SessionClosed
    );
    assert_eq!(session.to_record().unwrap_err(), SyncError::SessionClosed);
    assert_eq!(
        fixture.controller.save_session(&mut session).await.unwrap_err(),
        SyncError::SessionClosed
    );
    assert_eq!(fixture.store.write_count(), 0);
}

#[tokio::test]
async fn test_unknown_field_is_rejected() {
    let fixture = loaded_fixture().await;
    let id = RecordId::new(JANE);

    let mut session = fixture.controller.begin_edit(&id, client_schema()).unwrap();
    let err = session.set_field("profile.nickname", json!("JJ")).unwrap_err();
    assert_eq!(
        err,
        SyncError::InvalidField {
            schema: "client".to_string(),
            field: "profile.nickname".to_string(),
        }
    );
    assert!(!session.is_dirty());
}
