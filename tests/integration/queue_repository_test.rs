//! `que_jobs` leasing against PostgreSQL.

use std::time::Duration;

use chrono::Utc;

use crate::helpers::TestDb;

const LEASE: Duration = Duration::from_secs(60);

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_lock_fail_and_delete() {
    let test = TestDb::new().await;
    let queue = test.db.queue_repository();
    // private class so parallel tests never claim this message
    let class = format!("AlrJobTest{}", uuid::Uuid::new_v4().simple());
    let classes = vec![class.clone()];

    let unit = queue
        .enqueue(&class, &serde_json::json!({"ID": 7, "CMSID": "A0001"}))
        .await
        .unwrap();
    assert_eq!(unit.error_count, 0);

    let locked = queue.lock_next(&classes, LEASE).await.unwrap().unwrap();
    assert_eq!(locked.id, unit.id);

    // leased messages are invisible
    assert!(queue.lock_next(&classes, LEASE).await.unwrap().is_none());

    queue
        .record_failure(unit.id, "boom", Utc::now() - chrono::Duration::seconds(1))
        .await
        .unwrap();
    let retried = queue.lock_next(&classes, LEASE).await.unwrap().unwrap();
    assert_eq!(retried.error_count, 1);
    assert_eq!(retried.last_error.as_deref(), Some("boom"));

    queue.delete(unit.id).await.unwrap();
    assert!(queue.lock_next(&classes, LEASE).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_future_run_at_is_not_claimed() {
    let test = TestDb::new().await;
    let queue = test.db.queue_repository();
    let class = format!("AlrJobTest{}", uuid::Uuid::new_v4().simple());
    let classes = vec![class.clone()];

    let unit = queue.enqueue(&class, &serde_json::json!({})).await.unwrap();
    queue.lock_next(&classes, LEASE).await.unwrap().unwrap();
    queue
        .record_failure(unit.id, "later", Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();

    assert!(queue.lock_next(&classes, LEASE).await.unwrap().is_none());
    queue.delete(unit.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_extended_lease_keeps_message_hidden() {
    let test = TestDb::new().await;
    let queue = test.db.queue_repository();
    let class = format!("AlrJobTest{}", uuid::Uuid::new_v4().simple());
    let classes = vec![class.clone()];

    let unit = queue.enqueue(&class, &serde_json::json!({})).await.unwrap();
    queue
        .lock_next(&classes, Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap();
    assert!(queue.extend_lease(unit.id, LEASE).await.unwrap());

    // the original one-second lease would have run out by now
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(queue.lock_next(&classes, LEASE).await.unwrap().is_none());

    queue.delete(unit.id).await.unwrap();
    assert!(!queue.extend_lease(unit.id, LEASE).await.unwrap());
}
