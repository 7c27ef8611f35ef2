use chrono::{Duration, Utc};
use chunked_upload_service::api::error::AppError;
use chunked_upload_service::config::UploadConfig;
use chunked_upload_service::entities::file_infos::{self, FileStatus};
use chunked_upload_service::entities::prelude::FileInfos;
use chunked_upload_service::infrastructure::{database, storage};
use chunked_upload_service::services::record_store::RecordStore;
use chunked_upload_service::services::upload_coordinator::{
    InitStatus, InitUploadRequest, UploadCoordinator,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectOptions, ConnectionTrait, Database, EntityTrait, QueryFilter, Statement,
};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

const CHUNK: u64 = 100;

async fn setup(config_fn: impl FnOnce(&mut UploadConfig)) -> (UploadCoordinator, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = UploadConfig {
        upload_dir: dir.path().join("uploads"),
        temp_dir: dir.path().join("tmp"),
        chunk_size: CHUNK,
        ..UploadConfig::default()
    };
    config_fn(&mut config);

    // One connection so every query sees the same in-memory database.
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1);
    let db = Database::connect(opt).await.unwrap();
    database::run_migrations(&db).await.unwrap();
    let blobs = storage::setup_storage(&config).await.unwrap();

    (
        UploadCoordinator::new(RecordStore::new(db), blobs, config),
        dir,
    )
}

fn init_req(hash: &str, size: i64) -> InitUploadRequest {
    InitUploadRequest {
        file_name: "report.bin".to_string(),
        file_size: size,
        file_hash: hash.to_string(),
        content_type: "application/octet-stream".to_string(),
    }
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn save(coordinator: &UploadCoordinator, file_id: &str, num: i32, data: &[u8]) {
    coordinator
        .save_chunk(file_id, num, Box::new(data))
        .await
        .unwrap();
}

/// Uploads `data` in CHUNK-sized pieces starting at chunk 0.
async fn upload_all(coordinator: &UploadCoordinator, file_id: &str, data: &[u8]) {
    for (i, piece) in data.chunks(CHUNK as usize).enumerate() {
        save(coordinator, file_id, i as i32, piece).await;
    }
}

#[tokio::test]
async fn test_out_of_order_upload_merges_in_chunk_order() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let data = payload(250);

    let init = coordinator
        .init_upload(init_req("abc12345", 250))
        .await
        .unwrap();
    assert_eq!(init.status, InitStatus::Initialized);
    assert_eq!(init.total_chunks, 3);
    assert_eq!(init.chunk_size, CHUNK);
    assert!(init.uploaded_chunks.is_empty());

    let status = coordinator.get_upload_status(&init.file_id).await.unwrap();
    assert_eq!(status.progress, 0);
    assert_eq!(status.status, FileStatus::Uploading);

    save(&coordinator, &init.file_id, 2, &data[200..]).await;
    let status = coordinator.get_upload_status(&init.file_id).await.unwrap();
    assert_eq!(status.progress, 33);

    save(&coordinator, &init.file_id, 0, &data[..100]).await;
    let status = coordinator.get_upload_status(&init.file_id).await.unwrap();
    assert_eq!(status.progress, 66);
    assert_eq!(status.uploaded_chunks, vec![0, 2]);

    save(&coordinator, &init.file_id, 1, &data[100..200]).await;
    let status = coordinator.get_upload_status(&init.file_id).await.unwrap();
    assert_eq!(status.progress, 100);

    let done = coordinator.complete_upload(&init.file_id).await.unwrap();
    assert_eq!(done.status, FileStatus::Completed);
    assert_eq!(done.file_size, 250);

    let merged = std::fs::read(&done.file_path).unwrap();
    assert_eq!(merged, data);
    assert!(done.file_path.ends_with("abc12345"));

    let chunk_dir = coordinator.config().temp_dir.join(&init.file_id);
    assert!(!chunk_dir.exists());

    let info = coordinator.get_file_info(&init.file_id).await.unwrap();
    assert_eq!(info.status, FileStatus::Completed);
}

#[tokio::test]
async fn test_resending_a_chunk_replaces_it() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let init = coordinator
        .init_upload(init_req("resend001", 250))
        .await
        .unwrap();

    save(&coordinator, &init.file_id, 2, b"stale bytes").await;
    save(&coordinator, &init.file_id, 2, &[7u8; 50]).await;

    let chunks = coordinator
        .records()
        .list_chunk_records(&init.file_id)
        .await
        .unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].chunk_size, 50);
    assert_eq!(std::fs::read(&chunks[0].chunk_path).unwrap(), vec![7u8; 50]);

    let status = coordinator.get_upload_status(&init.file_id).await.unwrap();
    assert_eq!(status.uploaded_chunks, vec![2]);
}

#[tokio::test]
async fn test_complete_with_missing_chunks_keeps_uploading() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let data = payload(250);
    let init = coordinator
        .init_upload(init_req("partial01", 250))
        .await
        .unwrap();

    save(&coordinator, &init.file_id, 0, &data[..100]).await;
    save(&coordinator, &init.file_id, 1, &data[100..200]).await;

    let err = coordinator.complete_upload(&init.file_id).await.unwrap_err();
    match err {
        AppError::IncompleteUpload {
            expected,
            received,
            missing,
        } => {
            assert_eq!(expected, 3);
            assert_eq!(received, 2);
            assert_eq!(missing, vec![2]);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let status = coordinator.get_upload_status(&init.file_id).await.unwrap();
    assert_eq!(status.status, FileStatus::Uploading);

    // Finishing the upload afterwards still works.
    save(&coordinator, &init.file_id, 2, &data[200..]).await;
    let done = coordinator.complete_upload(&init.file_id).await.unwrap();
    assert_eq!(done.status, FileStatus::Completed);
}

#[tokio::test]
async fn test_gap_in_chunk_numbers_is_incomplete() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let data = payload(250);
    let init = coordinator.init_upload(init_req("gapped01", 250)).await.unwrap();

    save(&coordinator, &init.file_id, 0, &data[..100]).await;
    save(&coordinator, &init.file_id, 1, &data[100..200]).await;
    save(&coordinator, &init.file_id, 5, &data[200..]).await;

    let err = coordinator.complete_upload(&init.file_id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::IncompleteUpload { ref missing, .. } if missing == &vec![2]
    ));
}

#[tokio::test]
async fn test_one_based_chunk_numbers_complete() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let data = payload(250);
    let init = coordinator.init_upload(init_req("onebased1", 250)).await.unwrap();

    save(&coordinator, &init.file_id, 3, &data[200..]).await;
    save(&coordinator, &init.file_id, 1, &data[..100]).await;
    save(&coordinator, &init.file_id, 2, &data[100..200]).await;

    let done = coordinator.complete_upload(&init.file_id).await.unwrap();
    assert_eq!(std::fs::read(&done.file_path).unwrap(), data);
}

#[tokio::test]
async fn test_completed_hash_short_circuits_init() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let data = payload(250);
    let first = coordinator.init_upload(init_req("dedup0001", 250)).await.unwrap();
    upload_all(&coordinator, &first.file_id, &data).await;
    coordinator.complete_upload(&first.file_id).await.unwrap();

    let records_before = coordinator
        .records()
        .list_file_records(None)
        .await
        .unwrap()
        .len();

    let second = coordinator.init_upload(init_req("dedup0001", 250)).await.unwrap();
    assert_eq!(second.status, InitStatus::Completed);
    assert_eq!(second.file_id, first.file_id);
    assert_ne!(second.upload_id, first.upload_id);
    assert_eq!(second.uploaded_chunks, vec![0, 1, 2]);

    let records_after = coordinator
        .records()
        .list_file_records(None)
        .await
        .unwrap()
        .len();
    assert_eq!(records_before, records_after);
}

#[tokio::test]
async fn test_in_progress_uploads_are_not_deduplicated() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let a = coordinator.init_upload(init_req("samehash1", 250)).await.unwrap();
    let b = coordinator.init_upload(init_req("samehash1", 250)).await.unwrap();

    assert_ne!(a.file_id, b.file_id);
    assert_eq!(b.status, InitStatus::Initialized);
}

#[tokio::test]
async fn test_second_completion_of_same_content_conflicts() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let data = payload(250);
    let a = coordinator.init_upload(init_req("racing001", 250)).await.unwrap();
    let b = coordinator.init_upload(init_req("racing001", 250)).await.unwrap();
    upload_all(&coordinator, &a.file_id, &data).await;
    upload_all(&coordinator, &b.file_id, &data).await;

    coordinator.complete_upload(&a.file_id).await.unwrap();
    let err = coordinator.complete_upload(&b.file_id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // The loser can be deleted without touching the winner's bytes.
    coordinator.delete_file(&b.file_id).await.unwrap();
    let winner = coordinator.get_file_info(&a.file_id).await.unwrap();
    assert_eq!(std::fs::read(&winner.file_path).unwrap(), data);
}

#[tokio::test]
async fn test_concurrent_completion_of_same_hash_keeps_winner_bytes() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let a = coordinator.init_upload(init_req("samehash99", 250)).await.unwrap();
    let b = coordinator.init_upload(init_req("samehash99", 250)).await.unwrap();
    upload_all(&coordinator, &a.file_id, &[b'A'; 250]).await;
    upload_all(&coordinator, &b.file_id, &[b'B'; 250]).await;

    let (res_a, res_b) = tokio::join!(
        coordinator.complete_upload(&a.file_id),
        coordinator.complete_upload(&b.file_id)
    );

    let (winner, loser, expected_byte, loser_res) = match (res_a, res_b) {
        (Ok(done), Err(e)) => (done, b.file_id.clone(), b'A', e),
        (Err(e), Ok(done)) => (done, a.file_id.clone(), b'B', e),
        other => panic!("exactly one completion must win: {other:?}"),
    };
    assert!(matches!(loser_res, AppError::Conflict(_)));

    let on_disk = std::fs::read(&winner.file_path).unwrap();
    assert_eq!(on_disk, vec![expected_byte; 250]);

    let loser = coordinator.get_file_info(&loser).await.unwrap();
    assert_eq!(loser.status, FileStatus::Uploading);
}

#[tokio::test]
async fn test_complete_is_idempotent() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let data = payload(120);
    let init = coordinator.init_upload(init_req("twice0001", 120)).await.unwrap();
    upload_all(&coordinator, &init.file_id, &data).await;

    let first = coordinator.complete_upload(&init.file_id).await.unwrap();
    let second = coordinator.complete_upload(&init.file_id).await.unwrap();
    assert_eq!(first.file_path, second.file_path);
    assert_eq!(second.status, FileStatus::Completed);
}

#[tokio::test]
async fn test_size_mismatch_is_rejected() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let init = coordinator.init_upload(init_req("short0001", 250)).await.unwrap();

    save(&coordinator, &init.file_id, 0, &payload(100)).await;
    save(&coordinator, &init.file_id, 1, &payload(100)).await;
    save(&coordinator, &init.file_id, 2, &payload(10)).await;

    let err = coordinator.complete_upload(&init.file_id).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let info = coordinator.get_file_info(&init.file_id).await.unwrap();
    assert_eq!(info.status, FileStatus::Uploading);
    assert!(!coordinator.config().upload_dir.join("short0001").exists());
}

#[tokio::test]
async fn test_content_hash_verification() {
    let (coordinator, _dir) = setup(|c| c.verify_content_hash = true).await;
    let data = payload(180);
    let real_hash = hex::encode(Sha256::digest(&data));

    let good = coordinator.init_upload(init_req(&real_hash, 180)).await.unwrap();
    upload_all(&coordinator, &good.file_id, &data).await;
    let done = coordinator.complete_upload(&good.file_id).await.unwrap();
    assert_eq!(done.status, FileStatus::Completed);

    let wrong_hash = "0".repeat(64);
    let bad = coordinator.init_upload(init_req(&wrong_hash, 180)).await.unwrap();
    upload_all(&coordinator, &bad.file_id, &data).await;
    let err = coordinator.complete_upload(&bad.file_id).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let info = coordinator.get_file_info(&bad.file_id).await.unwrap();
    assert_eq!(info.status, FileStatus::Uploading);
}

#[tokio::test]
async fn test_unknown_file_is_not_found() {
    let (coordinator, _dir) = setup(|_| {}).await;

    assert!(matches!(
        coordinator.get_upload_status("missing").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        coordinator.complete_upload("missing").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        coordinator.delete_file("missing").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        coordinator
            .save_chunk("missing", 0, Box::new(&b"data"[..]))
            .await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_invalid_chunk_inputs_are_rejected() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let data = payload(50);
    let init = coordinator.init_upload(init_req("badchunk1", 50)).await.unwrap();

    let err = coordinator
        .save_chunk(&init.file_id, -1, Box::new(&data[..]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    upload_all(&coordinator, &init.file_id, &data).await;
    coordinator.complete_upload(&init.file_id).await.unwrap();

    let err = coordinator
        .save_chunk(&init.file_id, 0, Box::new(&data[..]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = coordinator
        .init_upload(init_req("../../etc/passwd", 50))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_delete_removes_record_and_bytes() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let data = payload(250);
    let init = coordinator.init_upload(init_req("delete001", 250)).await.unwrap();
    upload_all(&coordinator, &init.file_id, &data).await;
    let done = coordinator.complete_upload(&init.file_id).await.unwrap();
    assert_eq!(coordinator.list_files().await.unwrap().len(), 1);

    coordinator.delete_file(&init.file_id).await.unwrap();

    assert!(matches!(
        coordinator.get_file_info(&init.file_id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(!std::path::Path::new(&done.file_path).exists());
    assert!(
        coordinator
            .records()
            .list_chunk_records(&init.file_id)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(coordinator.list_files().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_of_in_progress_upload_removes_chunks() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let init = coordinator.init_upload(init_req("abandon01", 250)).await.unwrap();
    save(&coordinator, &init.file_id, 0, &payload(100)).await;

    let chunk_dir = coordinator.config().temp_dir.join(&init.file_id);
    assert!(chunk_dir.exists());

    coordinator.delete_file(&init.file_id).await.unwrap();
    assert!(!chunk_dir.exists());
}

#[tokio::test]
async fn test_list_files_only_returns_completed() {
    let (coordinator, _dir) = setup(|_| {}).await;
    let data = payload(90);
    let done = coordinator.init_upload(init_req("listed001", 90)).await.unwrap();
    upload_all(&coordinator, &done.file_id, &data).await;
    coordinator.complete_upload(&done.file_id).await.unwrap();
    coordinator.init_upload(init_req("pending01", 90)).await.unwrap();

    let files = coordinator.list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, done.file_id);
    assert_eq!(files[0].file_hash, "listed001");
}

#[tokio::test]
async fn test_cleanup_sweeps_only_stale_uploads() {
    let (coordinator, _dir) = setup(|c| c.cleanup_expiry_hours = 24).await;
    let data = payload(90);

    let stale = coordinator.init_upload(init_req("stale0001", 250)).await.unwrap();
    save(&coordinator, &stale.file_id, 0, &payload(100)).await;
    let fresh = coordinator.init_upload(init_req("fresh0001", 250)).await.unwrap();
    let finished = coordinator.init_upload(init_req("finished1", 90)).await.unwrap();
    upload_all(&coordinator, &finished.file_id, &data).await;
    coordinator.complete_upload(&finished.file_id).await.unwrap();

    let long_ago = Utc::now() - Duration::hours(48);
    FileInfos::update_many()
        .col_expr(file_infos::Column::UpdatedAt, Expr::value(long_ago))
        .filter(file_infos::Column::Id.is_in([stale.file_id.clone(), finished.file_id.clone()]))
        .exec(coordinator.records().connection())
        .await
        .unwrap();

    let report = coordinator.cleanup_expired_uploads().await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed, 0);

    assert!(matches!(
        coordinator.get_upload_status(&stale.file_id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(!coordinator.config().temp_dir.join(&stale.file_id).exists());
    assert!(coordinator.get_upload_status(&fresh.file_id).await.is_ok());
    assert!(coordinator.get_file_info(&finished.file_id).await.is_ok());

    let report = coordinator.cleanup_expired_uploads().await.unwrap();
    assert_eq!(report.expired, 0);
}

#[tokio::test]
async fn test_cleanup_continues_past_a_failed_deletion() {
    let (coordinator, _dir) = setup(|c| c.cleanup_expiry_hours = 1).await;
    let stuck = coordinator.init_upload(init_req("stuck0001", 250)).await.unwrap();
    let doomed = coordinator.init_upload(init_req("doomed001", 250)).await.unwrap();
    save(&coordinator, &doomed.file_id, 0, &payload(100)).await;

    let db = coordinator.records().connection();
    FileInfos::update_many()
        .col_expr(
            file_infos::Column::UpdatedAt,
            Expr::value(Utc::now() - Duration::hours(5)),
        )
        .exec(db)
        .await
        .unwrap();

    // Make the record store refuse to delete one of the two rows.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        format!(
            "CREATE TRIGGER keep_stuck BEFORE DELETE ON file_infos \
             WHEN OLD.id = '{}' BEGIN SELECT RAISE(ABORT, 'row is locked'); END",
            stuck.file_id
        ),
    ))
    .await
    .unwrap();

    let report = coordinator.cleanup_expired_uploads().await.unwrap();
    assert_eq!(report.expired, 2);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed, 1);

    assert!(matches!(
        coordinator.get_file_info(&doomed.file_id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(!coordinator.config().temp_dir.join(&doomed.file_id).exists());
    assert!(coordinator.get_file_info(&stuck.file_id).await.is_ok());
}

#[tokio::test]
async fn test_health_reports_both_stores() {
    let (coordinator, _dir) = setup(|_| {}).await;
    assert_eq!(coordinator.health().await, (true, true));
}
