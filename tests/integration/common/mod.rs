//! Helpers shared by the integration tests.
//!
//! Every fixture is generated in code, so the tests need no files on disk.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::{Document, Object, Stream, dictionary};
use pdfcraft::config::{Config, RetentionPolicy};
use pdfcraft::dispatch::Dispatcher;
use pdfcraft::ops::OperationRegistry;
use pdfcraft::server::{self, AppState};
use pdfcraft::storage::{ManualClock, MemoryStorage, Storage};

/// Retention window used by the test storage.
pub const WINDOW: Duration = Duration::from_secs(60 * 60);

/// A PDF with one page per width; the width identifies the page.
pub fn pdf_with_widths(widths: &[i64]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = widths
        .iter()
        .enumerate()
        .map(|(index, &width)| {
            let text = format!("BT 20 700 Td (Page {}) Tj ET", index + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, text.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), width.into(), 792.into()],
                "Contents" => content_id,
            });
            Object::Reference(page_id)
        })
        .collect();

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialise fixture");
    bytes
}

/// Page widths of a serialised PDF, in page order.
pub fn page_widths(bytes: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(bytes).expect("Output is not a readable PDF");
    doc.get_pages()
        .into_values()
        .map(|id| {
            let page = doc.get_dictionary(id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            media_box[2].as_float().unwrap().round() as i64
        })
        .collect()
}

/// Decoded content stream of every page, in page order.
pub fn page_contents(bytes: &[u8]) -> Vec<Vec<u8>> {
    let doc = Document::load_mem(bytes).expect("Output is not a readable PDF");
    doc.get_pages()
        .into_values()
        .map(|id| doc.get_page_content(id).unwrap())
        .collect()
}

/// `/Rotate` of every page, in page order.
pub fn page_rotations(bytes: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(bytes).expect("Output is not a readable PDF");
    doc.get_pages()
        .into_values()
        .map(|id| {
            let page = doc.get_dictionary(id).unwrap();
            page.get(b"Rotate").and_then(Object::as_i64).unwrap_or(0)
        })
        .collect()
}

/// A solid-colour PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 120, 200])));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// In-memory storage on a manual clock.
pub fn memory_storage() -> (Arc<MemoryStorage>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let storage = Arc::new(MemoryStorage::with_clock(
        RetentionPolicy::new(WINDOW),
        clock.clone(),
    ));
    (storage, clock)
}

pub fn dispatcher(storage: Arc<dyn Storage>) -> Dispatcher {
    Dispatcher::new(Arc::new(OperationRegistry::builtin()), storage)
}

pub fn app(storage: Arc<dyn Storage>) -> axum::Router {
    server::router(AppState::new(storage, Config::default()))
}

pub const BOUNDARY: &str = "pdfcraft-test-boundary";

/// Multipart body builder for HTTP tests.
#[derive(Default)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, field: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, field: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
        self
    }

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}
