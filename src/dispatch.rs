//! Request processing: from an operation name and uploads to a stored result.

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};

use crate::error::{PdfCraftError, Result};
use crate::io::PdfReader;
use crate::ops::inspect::{self, PdfInfo};
use crate::ops::params::Params;
use crate::ops::{CompressionStats, InputKind, OperationRegistry, OperationSpec, OutputFormat, images};
use crate::storage::{Area, FileId, Storage, Upload, UploadedFile};

/// A transformation output saved in the results area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultFile {
    pub id: FileId,
    pub download_name: String,
    pub format: OutputFormat,
    pub size: u64,
    pub created_at: SystemTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionStats>,
}

/// A finished request: the stored result and its bytes, so the caller can
/// respond without reading them back.
#[derive(Debug, Clone)]
pub struct Completed {
    pub result: ResultFile,
    pub bytes: Vec<u8>,
}

/// Runs jobs against the registry and storage.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<OperationRegistry>,
    storage: Arc<dyn Storage>,
}

impl Dispatcher {
    pub fn new(registry: Arc<OperationRegistry>, storage: Arc<dyn Storage>) -> Self {
        Self { registry, storage }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Run `operation` over `uploads`.
    ///
    /// The request is fully validated before anything is written. Staged
    /// inputs are deleted once the transformation finishes, whatever its
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns UnknownOperation or ValidationError without touching storage,
    /// otherwise whatever the transformation or storage reports.
    pub async fn handle(&self, operation: &str, uploads: Vec<Upload>, params: &Params) -> Result<Completed> {
        let started = Instant::now();
        let spec = self.registry.lookup(operation)?;
        spec.check_file_count(uploads.len())?;
        for upload in &uploads {
            check_input_kind(spec, upload)?;
        }
        let op = spec.build(params)?;

        info!(
            operation = spec.name,
            files = uploads.len(),
            params = ?params.names().collect::<Vec<_>>(),
            "Processing request"
        );

        // A partial staging failure leaves the files already written for the
        // sweeper.
        let ids = try_join_all(
            uploads
                .iter()
                .map(|upload| self.storage.stage(&upload.bytes, &upload.name)),
        )
        .await?;
        debug!(operation = spec.name, staged = ids.len(), "Staged uploads");

        let inputs: Vec<UploadedFile> = uploads
            .into_iter()
            .zip(ids.iter().cloned())
            .map(|(upload, id)| UploadedFile::staged(upload, id))
            .collect();

        let outcome = tokio::task::spawn_blocking(move || op.apply(&inputs))
            .await
            .map_err(|e| PdfCraftError::internal("running transformation", e));

        self.discard_staged(&ids).await;
        let output = outcome??;

        let stored = self
            .storage
            .store_result(&output.bytes, output.format.extension())
            .await?;

        let result = ResultFile {
            id: stored.id,
            download_name: output.download_name,
            format: output.format,
            size: stored.size,
            created_at: stored.created_at,
            compression: output.compression,
        };
        info!(
            operation = spec.name,
            id = %result.id,
            size = result.size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );

        Ok(Completed {
            result,
            bytes: output.bytes,
        })
    }

    /// Describe an uploaded PDF. Nothing is staged.
    ///
    /// # Errors
    ///
    /// Returns ValidationError if the upload is not a PDF and MalformedInput
    /// if it cannot be parsed.
    pub async fn inspect(&self, upload: Upload) -> Result<PdfInfo> {
        if !PdfReader::sniff(&upload.bytes) {
            return Err(not_a_pdf(&upload.name));
        }
        tokio::task::spawn_blocking(move || inspect::inspect(&upload.bytes, &upload.name))
            .await
            .map_err(|e| PdfCraftError::internal("inspecting document", e))?
    }

    /// Read a stored result back.
    ///
    /// # Errors
    ///
    /// Returns NotFound for unknown or expired identifiers.
    pub async fn fetch_result(&self, id: &FileId) -> Result<Vec<u8>> {
        self.storage.fetch(Area::Results, id).await
    }

    async fn discard_staged(&self, ids: &[FileId]) {
        let deletions = ids.iter().map(|id| async move {
            if let Err(e) = self.storage.delete(Area::Staging, id).await {
                warn!(%id, error = %e, "Failed to delete staged upload");
            }
        });
        join_all(deletions).await;
    }
}

fn not_a_pdf(name: &str) -> PdfCraftError {
    PdfCraftError::validation(format!("'{name}' is not a PDF file"))
}

fn check_input_kind(spec: &OperationSpec, upload: &Upload) -> Result<()> {
    match spec.input {
        InputKind::Pdf if !PdfReader::sniff(&upload.bytes) => Err(not_a_pdf(&upload.name)),
        InputKind::Image if images::sniff(&upload.bytes).is_none() => Err(PdfCraftError::validation(
            format!("'{}' is not a JPEG or PNG image", upload.name),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetentionPolicy;
    use crate::error::ErrorKind;
    use crate::ops::testing::{pdf_bytes, png_bytes};
    use crate::storage::{MemoryStorage, StoredFile, SweepReport};
    use async_trait::async_trait;

    /// Storage that fails the test if it is touched.
    struct UntouchableStorage;

    #[async_trait]
    impl Storage for UntouchableStorage {
        async fn stage(&self, _: &[u8], _: &str) -> Result<FileId> {
            panic!("stage called")
        }
        async fn fetch(&self, _: Area, _: &FileId) -> Result<Vec<u8>> {
            panic!("fetch called")
        }
        async fn store_result(&self, _: &[u8], _: &str) -> Result<StoredFile> {
            panic!("store_result called")
        }
        async fn delete(&self, _: Area, _: &FileId) -> Result<()> {
            panic!("delete called")
        }
        async fn sweep(&self) -> Result<SweepReport> {
            panic!("sweep called")
        }
        fn retention(&self) -> RetentionPolicy {
            RetentionPolicy::default()
        }
    }

    fn dispatcher_with(storage: Arc<dyn Storage>) -> Dispatcher {
        Dispatcher::new(Arc::new(OperationRegistry::builtin()), storage)
    }

    #[tokio::test]
    async fn test_rejections_happen_before_storage() {
        let dispatcher = dispatcher_with(Arc::new(UntouchableStorage));
        let pdf = || Upload::new("a.pdf", pdf_bytes(&[100]));

        let cases = [
            ("shred", vec![pdf()], Params::new(), ErrorKind::UnknownOperation),
            ("merge", vec![pdf()], Params::new(), ErrorKind::Validation),
            ("rotate", vec![Upload::new("a.pdf", b"hello".to_vec())], Params::new(), ErrorKind::Validation),
            ("images-to-pdf", vec![pdf()], Params::new(), ErrorKind::Validation),
            ("rotate", vec![pdf()], Params::new().with("angle", "33"), ErrorKind::Validation),
        ];

        for (operation, uploads, params, kind) in cases {
            let err = dispatcher.handle(operation, uploads, &params).await.unwrap_err();
            assert_eq!(err.kind(), kind, "{operation}");
        }
    }

    #[tokio::test]
    async fn test_success_stores_result_and_clears_staging() {
        let storage = Arc::new(MemoryStorage::new(RetentionPolicy::default()));
        let dispatcher = dispatcher_with(storage.clone());

        let completed = dispatcher
            .handle(
                "merge",
                vec![
                    Upload::new("a.pdf", pdf_bytes(&[100])),
                    Upload::new("b.pdf", pdf_bytes(&[200])),
                ],
                &Params::new(),
            )
            .await
            .unwrap();

        assert_eq!(completed.result.download_name, "merged.pdf");
        assert_eq!(completed.result.size, completed.bytes.len() as u64);
        assert_eq!(completed.result.id.extension(), "pdf");
        assert_eq!(storage.len(Area::Staging).await, 0);
        assert_eq!(storage.len(Area::Results).await, 1);

        let fetched = dispatcher.fetch_result(&completed.result.id).await.unwrap();
        assert_eq!(fetched, completed.bytes);
    }

    #[tokio::test]
    async fn test_failure_clears_staging_and_stores_nothing() {
        let storage = Arc::new(MemoryStorage::new(RetentionPolicy::default()));
        let dispatcher = dispatcher_with(storage.clone());

        let err = dispatcher
            .handle(
                "extract",
                vec![Upload::new("a.pdf", pdf_bytes(&[100, 200]))],
                &Params::new().with("pages", "5"),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_images_accepted_by_content() {
        let storage = Arc::new(MemoryStorage::new(RetentionPolicy::default()));
        let dispatcher = dispatcher_with(storage);

        let completed = dispatcher
            .handle(
                "jpg-to-pdf",
                vec![Upload::new("photo.bin", png_bytes(10, 10))],
                &Params::new(),
            )
            .await
            .unwrap();
        assert_eq!(completed.result.format, OutputFormat::Pdf);
    }

    #[tokio::test]
    async fn test_inspect_does_not_stage() {
        let dispatcher = dispatcher_with(Arc::new(UntouchableStorage));
        let info = dispatcher
            .inspect(Upload::new("a.pdf", pdf_bytes(&[100, 200, 300])))
            .await
            .unwrap();
        assert_eq!(info.pages, 3);
    }
}
