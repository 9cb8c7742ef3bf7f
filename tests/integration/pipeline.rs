//! End-to-end runs through the dispatcher.

use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::sync::Arc;

use pdfcraft::ErrorKind;
use pdfcraft::ops::params::Params;
use pdfcraft::storage::{Area, Storage, Upload};
use rstest::rstest;

use crate::common::{
    dispatcher, memory_storage, page_contents, page_rotations, page_widths, pdf_with_widths, png,
};

fn pdf(name: &str, widths: &[i64]) -> Upload {
    Upload::new(name, pdf_with_widths(widths))
}

#[tokio::test]
async fn test_merge_then_split_preserves_order() {
    let (storage, _) = memory_storage();
    let dispatcher = dispatcher(storage.clone());

    let merged = dispatcher
        .handle(
            "merge",
            vec![pdf("a.pdf", &[101, 102]), pdf("b.pdf", &[201, 202, 203])],
            &Params::new(),
        )
        .await
        .unwrap();

    let split = dispatcher
        .handle(
            "split",
            vec![Upload::new("merged.pdf", merged.bytes)],
            &Params::new(),
        )
        .await
        .unwrap();
    assert_eq!(split.result.download_name, "split_pages.zip");

    let mut archive = zip::ZipArchive::new(Cursor::new(split.bytes)).unwrap();
    assert_eq!(archive.len(), 5);

    let mut widths = Vec::new();
    for n in 1..=5 {
        let mut entry = archive.by_name(&format!("page_{n}.pdf")).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        widths.extend(page_widths(&bytes));
    }
    assert_eq!(widths, vec![101, 102, 201, 202, 203]);
    assert_eq!(storage.len(Area::Staging).await, 0);
}

#[rstest]
#[case("extract", "2,4", vec![102, 104])]
#[case("extract-pages", "4,2", vec![104, 102])]
#[case("remove-pages", "1", vec![102, 103, 104])]
#[case("remove", "2-3", vec![101, 104])]
#[tokio::test]
async fn test_page_selection(#[case] operation: &str, #[case] pages: &str, #[case] expected: Vec<i64>) {
    let (storage, _) = memory_storage();
    let completed = dispatcher(storage)
        .handle(
            operation,
            vec![pdf("in.pdf", &[101, 102, 103, 104])],
            &Params::new().with("pages", pages),
        )
        .await
        .unwrap();
    assert_eq!(page_widths(&completed.bytes), expected);
}

#[tokio::test]
async fn test_out_of_range_page_is_rejected() {
    let (storage, _) = memory_storage();
    let err = dispatcher(storage)
        .handle(
            "extract",
            vec![pdf("in.pdf", &[101, 102])],
            &Params::new().with("range", "1-3"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("out of range"));
}

#[tokio::test]
async fn test_rotate_four_times_restores_rotation() {
    let (storage, _) = memory_storage();
    let dispatcher = dispatcher(storage);

    let mut bytes = pdf_with_widths(&[101, 102]);
    for _ in 0..4 {
        bytes = dispatcher
            .handle(
                "rotate",
                vec![Upload::new("in.pdf", bytes)],
                &Params::new().with("angle", "90"),
            )
            .await
            .unwrap()
            .bytes;
    }
    assert_eq!(page_rotations(&bytes), vec![0, 0]);
}

#[tokio::test]
async fn test_negative_rotation_normalised() {
    let (storage, _) = memory_storage();
    let completed = dispatcher(storage)
        .handle(
            "rotate",
            vec![pdf("in.pdf", &[101])],
            &Params::new().with("angle", "-90"),
        )
        .await
        .unwrap();
    assert_eq!(page_rotations(&completed.bytes), vec![270]);
}

#[rstest]
#[case("rc4-128")]
#[case("aes-128")]
#[case("aes-256")]
#[tokio::test]
async fn test_protect_then_unlock(#[case] cipher: &str) {
    let (storage, _) = memory_storage();
    let dispatcher = dispatcher(storage);
    let original = pdf_with_widths(&[101, 102]);

    let protected = dispatcher
        .handle(
            "protect",
            vec![Upload::new("in.pdf", original.clone())],
            &Params::new().with("password", "s3cret").with("cipher", cipher),
        )
        .await
        .unwrap();
    assert_eq!(protected.result.download_name, "protected.pdf");

    let err = dispatcher
        .handle(
            "unlock",
            vec![Upload::new("p.pdf", protected.bytes.clone())],
            &Params::new().with("password", "wrong"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPassword);

    let unlocked = dispatcher
        .handle(
            "decrypt",
            vec![Upload::new("p.pdf", protected.bytes)],
            &Params::new().with("password", "s3cret"),
        )
        .await
        .unwrap();
    assert_eq!(page_widths(&unlocked.bytes), vec![101, 102]);
    assert_eq!(page_contents(&unlocked.bytes), page_contents(&original));

    // The unlocked file is an ordinary input again.
    let rotated = dispatcher
        .handle("rotate", vec![Upload::new("u.pdf", unlocked.bytes)], &Params::new())
        .await
        .unwrap();
    assert_eq!(page_rotations(&rotated.bytes), vec![90, 90]);
}

#[tokio::test]
async fn test_password_whitespace_is_kept() {
    let (storage, _) = memory_storage();
    let dispatcher = dispatcher(storage);

    let protected = dispatcher
        .handle(
            "protect",
            vec![pdf("in.pdf", &[101])],
            &Params::new().with("password", "  pw  "),
        )
        .await
        .unwrap();

    let err = dispatcher
        .handle(
            "unlock",
            vec![Upload::new("p.pdf", protected.bytes.clone())],
            &Params::new().with("password", "pw"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPassword);

    let unlocked = dispatcher
        .handle(
            "unlock",
            vec![Upload::new("p.pdf", protected.bytes)],
            &Params::new().with("password", "  pw  "),
        )
        .await
        .unwrap();
    assert_eq!(page_widths(&unlocked.bytes), vec![101]);
}

#[tokio::test]
async fn test_watermark_and_page_numbers_keep_page_count() {
    let (storage, _) = memory_storage();
    let dispatcher = dispatcher(storage);

    for operation in ["watermark", "page-numbers"] {
        let completed = dispatcher
            .handle(operation, vec![pdf("in.pdf", &[300, 400, 500])], &Params::new())
            .await
            .unwrap();
        assert_eq!(page_widths(&completed.bytes), vec![300, 400, 500], "{operation}");
    }
}

#[tokio::test]
async fn test_images_to_pdf_on_a4() {
    let (storage, _) = memory_storage();
    let completed = dispatcher(storage)
        .handle(
            "images-to-pdf",
            vec![
                Upload::new("landscape.png", png(300, 200)),
                Upload::new("portrait.png", png(200, 300)),
            ],
            &Params::new().with("page_size", "a4"),
        )
        .await
        .unwrap();
    assert_eq!(page_widths(&completed.bytes), vec![842, 595]);
}

#[tokio::test]
async fn test_compress_statistics() {
    let (storage, _) = memory_storage();
    let input = pdf_with_widths(&[101, 102, 103]);
    let original = input.len() as u64;

    let completed = dispatcher(storage)
        .handle("compress", vec![Upload::new("in.pdf", input)], &Params::new())
        .await
        .unwrap();

    let stats = completed.result.compression.unwrap();
    assert_eq!(stats.original_size, original);
    assert_eq!(stats.compressed_size, completed.result.size);
}

#[tokio::test]
async fn test_concurrent_stores_get_distinct_ids() {
    let (storage, _) = memory_storage();
    let handles: Vec<_> = (0..32)
        .map(|i| {
            let storage = storage.clone();
            tokio::spawn(async move {
                storage
                    .store_result(format!("result {i}").as_bytes(), "pdf")
                    .await
                    .unwrap()
                    .id
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }
    assert_eq!(ids.len(), 32);
}

#[tokio::test]
async fn test_concurrent_requests() {
    let (storage, _) = memory_storage();
    let dispatcher = Arc::new(dispatcher(storage.clone()));

    let handles: Vec<_> = (1..=8)
        .map(|width| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .handle("rotate", vec![pdf("in.pdf", &[width])], &Params::new())
                    .await
                    .unwrap()
            })
        })
        .collect();

    for (handle, width) in handles.into_iter().zip(1..=8) {
        let completed = handle.await.unwrap();
        assert_eq!(page_widths(&completed.bytes), vec![width]);
    }
    assert_eq!(storage.len(Area::Results).await, 8);
    assert_eq!(storage.len(Area::Staging).await, 0);
}

#[tokio::test]
async fn test_unknown_operation_touches_nothing() {
    let (storage, _) = memory_storage();
    let err = dispatcher(storage.clone())
        .handle("shred", vec![pdf("in.pdf", &[101])], &Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownOperation);
    assert!(storage.is_empty().await);
}
