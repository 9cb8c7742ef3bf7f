//! Document description for the info endpoint.

use lopdf::{Dictionary, Document, Object};
use serde::Serialize;

use super::overlay::PageBox;
use crate::error::Result;
use crate::io::PdfReader;
use crate::utils::{format_file_size, resolve};

/// Summary of an uploaded PDF.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfInfo {
    pub name: String,
    pub pages: u32,
    pub encrypted: bool,
    pub version: String,
    pub metadata: Metadata,
    /// First page width in points.
    pub width: Option<f32>,
    /// First page height in points.
    pub height: Option<f32>,
    pub file_size: u64,
    pub file_size_human: String,
}

/// Document information dictionary entries.
///
/// Empty for encrypted documents, whose strings cannot be read without
/// the password.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub subject: Option<String>,
}

/// Describe `bytes` without modifying them.
///
/// Encrypted documents are described rather than rejected.
///
/// # Errors
///
/// Returns MalformedInput if the bytes cannot be parsed.
pub fn inspect(bytes: &[u8], name: &str) -> Result<PdfInfo> {
    let doc = PdfReader::load_any(bytes, name)?;
    let encrypted = PdfReader::is_encrypted(&doc);
    let pages = doc.get_pages();

    let first_page = pages
        .values()
        .next()
        .and_then(|id| doc.get_dictionary(*id).ok())
        .map(|page| PageBox::of_page(&doc, page));

    let metadata = if encrypted {
        Metadata::default()
    } else {
        read_metadata(&doc)
    };

    Ok(PdfInfo {
        name: name.to_string(),
        pages: pages.len() as u32,
        encrypted,
        version: doc.version.clone(),
        metadata,
        width: first_page.map(|b| b.width()),
        height: first_page.map(|b| b.height()),
        file_size: bytes.len() as u64,
        file_size_human: format_file_size(bytes.len() as u64),
    })
}

fn read_metadata(doc: &Document) -> Metadata {
    let Some(info) = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
    else {
        return Metadata::default();
    };

    Metadata {
        title: text_entry(doc, info, b"Title"),
        author: text_entry(doc, info, b"Author"),
        creator: text_entry(doc, info, b"Creator"),
        subject: text_entry(doc, info, b"Subject"),
    }
}

fn text_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    let Object::String(bytes, _) = resolve(doc, dict.get(key).ok()?) else {
        return None;
    };
    let text = decode_text_string(bytes);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, otherwise
/// a single-byte encoding treated as Latin-1.
pub fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}
