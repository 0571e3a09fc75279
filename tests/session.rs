mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{GatedSaver, RecordingSaver, StalledSaver, lamp, registry, values};
use entityform::{
    Entity, EntityForm, FormPhase, SaveError, SessionEvent, SessionOptions,
};

#[tokio::test]
async fn edits_and_saves_flow_through_the_session() {
    let saver = RecordingSaver::succeeding();
    let handle = EntityForm::new(registry(), "Product", "products")
        .with_entity(lamp())
        .spawn(saver.clone())
        .expect("session starts");

    handle.set_field("price", json!(15)).await.unwrap();
    let report = handle.wait_for(|report| report.dirty).await.unwrap();
    assert_eq!(report.touched, vec!["price".to_string()]);

    handle.submit().await.unwrap();
    let report = handle
        .wait_for(|report| report.saves == 1 && report.phase == FormPhase::Editing)
        .await
        .unwrap();
    assert!(!report.dirty);
    assert!(report.touched.is_empty());
    assert_eq!(saver.call_count(), 1);

    let form = handle.close().await.unwrap();
    assert_eq!(form.phase(), FormPhase::Discarded);
    assert_eq!(form.baseline()["price"], json!(15));
}

#[tokio::test]
async fn snapshot_arriving_mid_save_is_applied_afterwards() {
    let saver = GatedSaver::new();
    let handle = EntityForm::new(registry(), "Product", "products")
        .with_entity(lamp())
        .spawn(saver.clone())
        .unwrap();

    handle.set_field("price", json!(15)).await.unwrap();
    handle.submit().await.unwrap();
    handle
        .wait_for(|report| report.phase == FormPhase::Submitting)
        .await
        .unwrap();

    let live = Entity::existing(
        "p1",
        values(json!({"name": "Lamp", "price": 15, "available": false})),
    );
    handle.snapshot(live).await.unwrap();
    let report = handle.wait_for(|report| report.pending_snapshot).await.unwrap();
    assert_eq!(report.values["available"], json!(true));

    saver.release();
    let report = handle
        .wait_for(|report| report.saves == 1 && !report.pending_snapshot)
        .await
        .unwrap();
    assert_eq!(report.phase, FormPhase::Editing);
    assert_eq!(report.values["available"], json!(false));
    assert_eq!(report.values["price"], json!(15));
    assert!(!report.dirty);
    assert_eq!(saver.calls.lock().unwrap().len(), 1);

    handle.close().await.unwrap();
}

#[tokio::test]
async fn edits_are_refused_while_a_save_is_in_flight() {
    let saver = GatedSaver::new();
    let handle = EntityForm::new(registry(), "Product", "products")
        .with_entity(lamp())
        .spawn(saver.clone())
        .unwrap();

    handle.submit().await.unwrap();
    handle
        .wait_for(|report| report.phase == FormPhase::Submitting)
        .await
        .unwrap();
    handle.set_field("price", json!(99)).await.unwrap();
    let report = handle
        .wait_for(|report| report.last_rejection.is_some())
        .await
        .unwrap();
    assert_eq!(report.values["price"], json!(10));

    saver.release();
    handle.wait_for(|report| report.saves == 1).await.unwrap();
    handle.close().await.unwrap();
}

#[tokio::test]
async fn closing_during_a_save_discards_the_form() {
    let handle = EntityForm::new(registry(), "Product", "products")
        .with_entity(lamp())
        .with_options(SessionOptions::default().with_save_timeout(None))
        .spawn(StalledSaver)
        .unwrap();

    handle.set_field("price", json!(15)).await.unwrap();
    handle.submit().await.unwrap();
    handle
        .wait_for(|report| report.phase == FormPhase::Submitting)
        .await
        .unwrap();

    let form = handle.close().await.unwrap();
    assert_eq!(form.phase(), FormPhase::Discarded);
    assert_eq!(form.values()["price"], json!(15));
    assert_eq!(form.baseline()["price"], json!(10));
}

#[tokio::test(start_paused = true)]
async fn slow_saves_time_out_as_network_errors() {
    let handle = EntityForm::new(registry(), "Product", "products")
        .with_entity(lamp())
        .with_options(SessionOptions::default().with_save_timeout(Some(Duration::from_secs(5))))
        .spawn(StalledSaver)
        .unwrap();

    handle.send(SessionEvent::Submit).await.unwrap();
    let report = handle
        .wait_for(|report| report.phase == FormPhase::SaveFailed)
        .await
        .unwrap();
    assert!(matches!(report.save_error, Some(SaveError::Network(_))));
    assert_eq!(report.saves, 0);

    handle.discard().await.unwrap();
    let form = handle.close().await.unwrap();
    assert_eq!(form.phase(), FormPhase::Discarded);
}
