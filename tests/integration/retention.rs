//! Result retention and expiry against the filesystem backend.

use std::sync::Arc;
use std::time::Duration;

use pdfcraft::ErrorKind;
use pdfcraft::config::{RetentionPolicy, StorageConfig};
use pdfcraft::ops::params::Params;
use pdfcraft::storage::{Area, FilesystemStorage, ManualClock, Storage, Upload};
use pdfcraft::sweeper::Sweeper;
use tempfile::TempDir;
use tokio::sync::watch;

use crate::common::{WINDOW, dispatcher, pdf_with_widths};

async fn filesystem(temp: &TempDir) -> (Arc<FilesystemStorage>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let config = StorageConfig {
        staging_dir: temp.path().join("uploads"),
        results_dir: temp.path().join("outputs"),
    };
    let storage = FilesystemStorage::open_with_clock(&config, RetentionPolicy::new(WINDOW), clock.clone())
        .await
        .unwrap();
    (Arc::new(storage), clock)
}

fn files_in(storage: &FilesystemStorage, area: Area) -> usize {
    std::fs::read_dir(storage.dir(area)).unwrap().count()
}

#[tokio::test]
async fn test_result_retrievable_until_window_elapses() {
    let temp = TempDir::new().unwrap();
    let (storage, clock) = filesystem(&temp).await;
    let dispatcher = dispatcher(storage.clone());

    let completed = dispatcher
        .handle(
            "rotate",
            vec![Upload::new("in.pdf", pdf_with_widths(&[200]))],
            &Params::new(),
        )
        .await
        .unwrap();
    let id = completed.result.id.clone();
    let created = completed.result.created_at;

    clock.set(created + WINDOW - Duration::from_secs(1));
    assert_eq!(dispatcher.fetch_result(&id).await.unwrap(), completed.bytes);

    clock.set(created + WINDOW);
    assert!(dispatcher.fetch_result(&id).await.is_ok());

    clock.set(created + WINDOW + Duration::from_secs(1));
    let err = dispatcher.fetch_result(&id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_staging_is_empty_after_request() {
    let temp = TempDir::new().unwrap();
    let (storage, _) = filesystem(&temp).await;

    dispatcher(storage.clone())
        .handle(
            "merge",
            vec![
                Upload::new("a.pdf", pdf_with_widths(&[100])),
                Upload::new("b.pdf", pdf_with_widths(&[200])),
            ],
            &Params::new(),
        )
        .await
        .unwrap();

    assert_eq!(files_in(&storage, Area::Staging), 0);
    assert_eq!(files_in(&storage, Area::Results), 1);
}

#[tokio::test]
async fn test_staging_is_empty_after_failed_request() {
    let temp = TempDir::new().unwrap();
    let (storage, _) = filesystem(&temp).await;

    let err = dispatcher(storage.clone())
        .handle(
            "compress",
            vec![Upload::new("broken.pdf", b"%PDF-1.4\nnot really".to_vec())],
            &Params::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedInput);
    assert_eq!(files_in(&storage, Area::Staging), 0);
    assert_eq!(files_in(&storage, Area::Results), 0);
}

#[tokio::test]
async fn test_sweeper_removes_expired_results() {
    let temp = TempDir::new().unwrap();
    let (storage, clock) = filesystem(&temp).await;

    let old = storage.store_result(b"old result", "pdf").await.unwrap();
    let fresh = storage.store_result(b"fresh result", "zip").await.unwrap();

    // Backdate one file past the window.
    let backdated = fresh.created_at - WINDOW - Duration::from_secs(60);
    std::fs::File::options()
        .write(true)
        .open(storage.dir(Area::Results).join(old.id.as_str()))
        .unwrap()
        .set_modified(backdated)
        .unwrap();
    clock.set(fresh.created_at + Duration::from_secs(1));

    let report = Sweeper::new(storage.clone(), Duration::from_secs(600))
        .sweep_once()
        .await
        .unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.removed, 1);
    assert_eq!(report.failed, 0);

    let err = storage.fetch(Area::Results, &old.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(storage.fetch(Area::Results, &fresh.id).await.is_ok());
}

#[tokio::test]
async fn test_sweeper_task_stops_on_shutdown() {
    let temp = TempDir::new().unwrap();
    let (storage, clock) = filesystem(&temp).await;

    let staged = storage.stage(b"abandoned", "a.pdf").await.unwrap();
    clock.advance(WINDOW * 2);

    let (tx, rx) = watch::channel(false);
    let handle = Sweeper::new(storage.clone(), Duration::from_secs(3600)).spawn(rx);

    // The first pass runs at start-up.
    for _ in 0..100 {
        if files_in(&storage, Area::Staging) == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!storage.dir(Area::Staging).join(staged.as_str()).exists());

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
