//! PDF decoding and encoding.
//!
//! All PDF bytes enter and leave the service through this module, so
//! every `lopdf` failure is classified here.

pub mod reader;
pub mod writer;

pub use reader::{LoadedPdf, PdfReader};
pub use writer::{PdfWriter, WriteOptions};
