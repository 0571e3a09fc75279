mod common;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{RecordingSaver, lamp, registry, registry_with_custom_id, values};
use entityform::{
    Entity, EntityForm, EntityStatus, FormPhase, SaveError, SubmitOutcome, SubmitRejected,
    form::{CustomIdState, SnapshotOutcome},
};

fn open_lamp() -> entityform::FormController {
    EntityForm::new(registry(), "Product", "products")
        .with_entity(lamp())
        .open()
        .expect("form opens")
}

#[tokio::test]
async fn missing_custom_id_blocks_submit_without_saving() {
    let saver = RecordingSaver::succeeding();
    let mut form = EntityForm::new(registry_with_custom_id(), "Product", "products")
        .open()
        .expect("form opens");
    form.set_field("name", json!("Lamp")).unwrap();
    assert!(!form.custom_id().has_error());

    let rejected = form.submit_with(&*saver).await.unwrap_err();
    assert_eq!(rejected, SubmitRejected::MissingCustomId);
    assert!(form.custom_id().has_error());
    assert_eq!(saver.call_count(), 0);
    assert_eq!(form.phase(), FormPhase::Editing);

    form.set_custom_id("lamp-01").unwrap();
    assert_eq!(
        form.custom_id().state(),
        &CustomIdState::IdRequiredSet("lamp-01".into())
    );
    assert_eq!(form.submit_with(&*saver).await, Ok(SubmitOutcome::Saved));
    assert_eq!(saver.call_count(), 1);
}

#[test]
fn touched_field_survives_a_live_update() {
    let mut form = open_lamp();
    form.set_field("price", json!(15)).unwrap();

    let snapshot = Entity::existing(
        "p1",
        values(json!({"name": "Lamp", "price": 12, "available": true})),
    );
    assert_eq!(form.apply_snapshot(snapshot), SnapshotOutcome::Applied);
    assert_eq!(form.values()["price"], json!(15));
    assert!(form.is_dirty());

    let price = form
        .fields()
        .into_iter()
        .find(|field| field.name == "price")
        .expect("price field");
    assert!(price.underlying_value_changed);
}

#[test]
fn untouched_field_follows_live_data() {
    let mut form = open_lamp();
    let snapshot = Entity::existing(
        "p1",
        values(json!({"name": "Lamp", "price": 10, "available": false})),
    );
    form.apply_snapshot(snapshot);
    assert_eq!(form.values()["available"], json!(false));
    assert_eq!(form.baseline()["available"], json!(false));
    assert!(!form.is_dirty());
}

#[tokio::test]
async fn successful_save_rebaselines_the_form() {
    let saver = RecordingSaver::succeeding();
    let mut form = EntityForm::new(registry(), "Product", "products")
        .with_entity(Entity::existing("p1", values(json!({"name": "Lamp", "price": 10}))))
        .open()
        .unwrap();
    form.set_field("price", json!(15)).unwrap();
    assert!(form.is_dirty());

    assert_eq!(form.submit_with(&*saver).await, Ok(SubmitOutcome::Saved));
    assert_eq!(form.baseline(), &values(json!({"name": "Lamp", "price": 15})));
    assert!(form.touched().is_empty());
    assert!(!form.is_dirty());
    assert_eq!(form.phase(), FormPhase::Editing);

    let request = &saver.calls.lock().unwrap()[0];
    assert_eq!(request.id.as_deref(), Some("p1"));
    assert_eq!(request.status, EntityStatus::Existing);
    assert_eq!(request.collection_path, "products");
}

#[tokio::test]
async fn failed_save_keeps_edits_and_allows_resubmit() {
    let saver = RecordingSaver::failing(SaveError::Network("connection reset".into()));
    let mut form = open_lamp();
    form.set_field("price", json!(15)).unwrap();
    let before = form.values().clone();

    let outcome = form.submit_with(&*saver).await.unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Failed(SaveError::Network("connection reset".into()))
    );
    assert_eq!(form.phase(), FormPhase::SaveFailed);
    assert_eq!(form.values(), &before);
    assert!(form.is_touched("price"));
    assert!(form.is_dirty());
    assert!(matches!(form.save_error(), Some(SaveError::Network(_))));

    saver.set_result(Ok(()));
    assert_eq!(form.submit_with(&*saver).await, Ok(SubmitOutcome::Saved));
    let calls = saver.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].values, calls[1].values);
}

#[test]
fn invalid_values_block_submit_with_field_errors() {
    let mut form = open_lamp();
    form.set_field("name", json!("")).unwrap();
    let rejected = form.begin_submit().unwrap_err();
    let SubmitRejected::Invalid(errors) = rejected else {
        panic!("expected validation errors, got {rejected:?}");
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path.pointer(), "/name");
    assert_eq!(form.field_errors(), errors.as_slice());
}

#[test]
fn snapshot_during_submit_is_applied_after_the_result() {
    let mut form = open_lamp();
    form.set_field("price", json!(15)).unwrap();
    let request = form.begin_submit().unwrap();

    let live = Entity::existing(
        "p1",
        values(json!({"name": "Lamp", "price": 15, "available": false})),
    );
    assert_eq!(form.apply_snapshot(live), SnapshotOutcome::Deferred);
    assert!(form.has_pending_snapshot());
    assert_eq!(form.values()["available"], json!(true));

    assert_eq!(form.complete_submit(request.ticket, Ok(())), SubmitOutcome::Saved);
    assert!(!form.has_pending_snapshot());
    assert_eq!(form.values()["available"], json!(false));
    assert_eq!(form.values()["price"], json!(15));
    assert!(!form.is_dirty());
}

#[test]
fn snapshots_for_other_entities_are_ignored() {
    let mut form = open_lamp();
    let other = Entity::existing("p2", values(json!({"name": "Desk"})));
    assert_eq!(form.apply_snapshot(other), SnapshotOutcome::Ignored);
    assert_eq!(form.values()["name"], json!("Lamp"));
}
