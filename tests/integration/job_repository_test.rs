//! Job store against PostgreSQL.

use alr_database::{JobStore, UpdateOutcome};
use alr_entity::job::{JobId, JobStatus, NewJobKey};

use crate::helpers::TestDb;

fn job_id(id: i64) -> JobId {
    JobId::try_from(id).unwrap()
}

fn key(job_id: i64, que_job_id: i64, file_name: &str) -> NewJobKey {
    NewJobKey {
        job_id,
        que_job_id: Some(que_job_id),
        file_name: file_name.to_string(),
        resource_type: "ALR".to_string(),
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_missing_job_is_none() {
    let test = TestDb::new().await;
    let repo = test.db.job_repository();

    let job = repo.get_job_by_id(JobId(i64::MAX as u64)).await.unwrap();
    assert!(job.is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_out_of_range_id_is_rejected_before_query() {
    let test = TestDb::new().await;
    let repo = test.db.job_repository();

    let err = repo.get_job_by_id(JobId(u64::MAX)).await.unwrap_err();
    assert_eq!(err.kind, alr_core::error::ErrorKind::Validation);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_concurrent_check_status_has_one_winner() {
    let test = TestDb::new().await;
    let id = test.create_job(2, JobStatus::Pending).await;
    let repo = test.db.job_repository();

    let (a, b) = tokio::join!(
        repo.update_job_status_check_status(job_id(id), JobStatus::Pending, JobStatus::InProgress),
        repo.update_job_status_check_status(job_id(id), JobStatus::Pending, JobStatus::InProgress),
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| o.is_applied()).count(), 1);
    assert!(outcomes.contains(&UpdateOutcome::NotApplied));

    let job = repo.get_job_by_id(job_id(id)).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::InProgress);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_finalize_respects_terminal_states() {
    let test = TestDb::new().await;
    let id = test.create_job(1, JobStatus::Cancelled).await;
    let repo = test.db.job_repository();

    let outcome = repo
        .finalize_job_status(job_id(id), JobStatus::Completed)
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::NotApplied);

    // the unconditional update still goes through
    let outcome = repo
        .update_job_status(job_id(id), JobStatus::Failed)
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Applied);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_job_key_counts() {
    let test = TestDb::new().await;
    let id = test.create_job(2, JobStatus::InProgress).await;
    let repo = test.db.job_repository();

    repo.create_job_keys(&[
        key(id, 1, "1.ndjson"),
        key(id, 1, "1-error.ndjson"),
        key(id, 2, "2.ndjson"),
    ])
    .await
    .unwrap();
    repo.create_job_key(&key(id, 2, "2b.ndjson")).await.unwrap();

    assert_eq!(repo.get_unique_job_key_count(job_id(id)).await.unwrap(), 2);
    assert_eq!(repo.get_job_key_count(job_id(id)).await.unwrap(), 3);

    let found = repo.get_job_key(job_id(id), 2).await.unwrap().unwrap();
    assert_eq!(found.file_name, "2.ndjson");
    assert!(repo.get_job_key(job_id(id), 3).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_overlapping_deliveries_record_one_key() {
    let test = TestDb::new().await;
    let id = test.create_job(1, JobStatus::InProgress).await;
    let repo = test.db.job_repository();

    let (key_a, key_b) = (key(id, 5, "5.ndjson"), key(id, 5, "5.ndjson"));
    let (a, b) = tokio::join!(repo.create_job_key(&key_a), repo.create_job_key(&key_b));
    a.unwrap();
    b.unwrap();
    repo.create_job_keys(&[key(id, 5, "5.ndjson")]).await.unwrap();

    assert_eq!(repo.get_job_key_count(job_id(id)).await.unwrap(), 1);
    assert_eq!(repo.get_unique_job_key_count(job_id(id)).await.unwrap(), 1);
}
