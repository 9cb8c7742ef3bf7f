//! PDF loading with error classification.

use std::collections::{BTreeMap, HashSet};

use lopdf::xref::XrefEntry;
use lopdf::{Document, ObjectId, Reader};
use tracing::debug;

use crate::error::{PdfCraftError, Result};

/// Marker every PDF file starts with.
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// How far into a file the PDF marker may appear.
///
/// Some producers prepend junk before the header; readers accept it
/// within the first kilobyte.
pub const PDF_MAGIC_WINDOW: usize = 1024;

/// A parsed input document and the name the client gave it.
#[derive(Debug, Clone)]
pub struct LoadedPdf {
    /// Client-supplied file name.
    pub name: String,
    /// The parsed document.
    pub document: Document,
}

impl LoadedPdf {
    /// Wrap an already-parsed document.
    pub fn new(name: impl Into<String>, document: Document) -> Self {
        Self {
            name: name.into(),
            document,
        }
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Classify an error raised while restructuring this document.
    ///
    /// Such errors mean the object graph is not what the PDF format
    /// requires (a missing `/Pages`, a page that is not a dictionary).
    pub fn structure_error(&self, err: lopdf::Error) -> PdfCraftError {
        PdfCraftError::malformed(&self.name, format!("invalid document structure: {err}"))
    }
}

/// Loads documents from in-memory bytes.
pub struct PdfReader;

impl PdfReader {
    /// Check whether `bytes` look like a PDF file.
    pub fn sniff(bytes: &[u8]) -> bool {
        let window = &bytes[..bytes.len().min(PDF_MAGIC_WINDOW)];
        window
            .windows(PDF_MAGIC.len())
            .any(|chunk| chunk == PDF_MAGIC)
    }

    /// Load a document that is about to be transformed.
    ///
    /// # Errors
    ///
    /// - `InvalidPassword` if the document is encrypted
    /// - `MalformedInput` if `lopdf` rejects the bytes or there are no pages
    pub fn load(bytes: &[u8], name: &str) -> Result<LoadedPdf> {
        let doc = Self::load_any(bytes, name)?;

        if Self::is_encrypted(&doc) {
            return Err(PdfCraftError::invalid_password(format!(
                "'{name}' is password protected; unlock it first"
            )));
        }

        if doc.get_pages().is_empty() {
            return Err(PdfCraftError::malformed(name, "PDF has no pages"));
        }

        Ok(LoadedPdf::new(name, doc))
    }

    /// Load a document without rejecting encryption.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` (or `InvalidPassword`, when `lopdf` itself
    /// refuses for lack of a password) if the bytes cannot be parsed.
    pub fn load_any(bytes: &[u8], name: &str) -> Result<Document> {
        Document::load_mem(bytes).map_err(|e| classify(name, e))
    }

    /// Load an encrypted document with every object parsed but still
    /// encrypted, ready for [`Document::decrypt`].
    ///
    /// `lopdf` only materialises the objects of an encrypted file whose
    /// user password is empty; otherwise it keeps nothing but the
    /// `/Encrypt` dictionary. Objects stored in object streams are
    /// recovered by `decrypt` once their containers are readable.
    ///
    /// Unencrypted and already decrypted documents are returned as loaded.
    ///
    /// # Errors
    ///
    /// Same as [`PdfReader::load_any`].
    pub fn load_encrypted(bytes: &[u8], name: &str) -> Result<Document> {
        let doc = Self::load_any(bytes, name)?;
        if !Self::is_encrypted(&doc) || doc.encryption_state.is_some() {
            return Ok(doc);
        }

        let ids: Vec<ObjectId> = doc
            .reference_table
            .entries
            .iter()
            .filter_map(|(&number, entry)| match *entry {
                XrefEntry::Normal { generation, .. } => Some((number, generation)),
                _ => None,
            })
            .collect();

        // Xref offsets count from the header, as in `Reader::read`.
        let start = bytes
            .windows(PDF_MAGIC.len())
            .position(|chunk| chunk == PDF_MAGIC)
            .unwrap_or(0);
        let reader = Reader {
            buffer: &bytes[start..],
            document: doc,
            encryption_state: None,
            raw_objects: BTreeMap::new(),
        };

        let mut objects = Vec::with_capacity(ids.len());
        for id in ids {
            match reader.get_object(id, &mut HashSet::new()) {
                Ok(object) => objects.push((id, object)),
                Err(e) => debug!(name, object = ?id, error = %e, "Skipping unreadable object"),
            }
        }

        let mut doc = reader.document;
        for (id, object) in objects {
            doc.objects.entry(id).or_insert(object);
        }
        Ok(doc)
    }

    /// Check whether a document carries an encryption dictionary.
    pub fn is_encrypted(doc: &Document) -> bool {
        doc.trailer.get(b"Encrypt").is_ok()
    }
}

/// Map a `lopdf` load error onto the service taxonomy.
pub fn classify(name: &str, err: lopdf::Error) -> PdfCraftError {
    let message = err.to_string();
    let lower = message.to_ascii_lowercase();
    if lower.contains("encrypt") || lower.contains("password") || lower.contains("decrypt") {
        PdfCraftError::invalid_password(format!("Could not decrypt '{name}': {message}"))
    } else {
        PdfCraftError::malformed(name, message)
    }
}
