//! Password protection and removal.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use lopdf::encryption::crypt_filters::{Aes128CryptFilter, Aes256CryptFilter, CryptFilter};
use lopdf::encryption::{EncryptionState, EncryptionVersion, Permissions};
use lopdf::xref::XrefType;
use lopdf::{Document, Object, StringFormat};
use tracing::{debug, info};

use super::params::CipherStrength;
use crate::error::{PdfCraftError, Result};
use crate::io::{LoadedPdf, PdfReader, PdfWriter, WriteOptions};

/// Name under which the crypt filter is registered in `/CF`.
const CRYPT_FILTER: &[u8] = b"StdCF";

/// Parameters for `protect`.
#[derive(Clone, PartialEq, Eq)]
pub struct ProtectOptions {
    pub user_password: String,
    pub owner_password: String,
    pub cipher: CipherStrength,
}

impl ProtectOptions {
    /// Protect with one password for both roles.
    pub fn new(password: impl Into<String>) -> Self {
        let password = password.into();
        Self {
            owner_password: password.clone(),
            user_password: password,
            cipher: CipherStrength::default(),
        }
    }
}

impl fmt::Debug for ProtectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectOptions")
            .field("user_password", &"<redacted>")
            .field("owner_password", &"<redacted>")
            .field("cipher", &self.cipher)
            .finish()
    }
}

/// Password for `unlock`.
#[derive(Clone, PartialEq, Eq)]
pub struct UnlockOptions {
    pub password: String,
}

impl fmt::Debug for UnlockOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockOptions")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Encryption requires a file identifier; documents built in memory often
/// lack one.
fn ensure_file_id(doc: &mut Document) {
    if doc.trailer.get(b"ID").is_ok() {
        return;
    }
    let id: [u8; 16] = rand::random();
    let id = Object::String(id.to_vec(), StringFormat::Hexadecimal);
    doc.trailer.set("ID", vec![id.clone(), id]);
}

fn crypt_filters(filter: Arc<dyn CryptFilter>) -> BTreeMap<Vec<u8>, Arc<dyn CryptFilter>> {
    BTreeMap::from([(CRYPT_FILTER.to_vec(), filter)])
}

fn encryption_state(doc: &Document, options: &ProtectOptions) -> Result<EncryptionState> {
    let owner_password = options.owner_password.as_str();
    let user_password = options.user_password.as_str();
    let permissions = Permissions::all();

    let version = match options.cipher {
        CipherStrength::Rc4_128 => EncryptionVersion::V2 {
            document: doc,
            owner_password,
            user_password,
            key_length: 128,
            permissions,
        },
        CipherStrength::Aes128 => EncryptionVersion::V4 {
            document: doc,
            encrypt_metadata: true,
            crypt_filters: crypt_filters(Arc::new(Aes128CryptFilter)),
            stream_filter: CRYPT_FILTER.to_vec(),
            string_filter: CRYPT_FILTER.to_vec(),
            owner_password,
            user_password,
            permissions,
        },
        CipherStrength::Aes256 => {
            let file_encryption_key: [u8; 32] = rand::random();
            return EncryptionState::try_from(EncryptionVersion::V5 {
                encrypt_metadata: true,
                crypt_filters: crypt_filters(Arc::new(Aes256CryptFilter)),
                file_encryption_key: &file_encryption_key,
                stream_filter: CRYPT_FILTER.to_vec(),
                string_filter: CRYPT_FILTER.to_vec(),
                owner_password,
                user_password,
                permissions,
            })
            .map_err(|e| PdfCraftError::internal("preparing AES-256 encryption", e));
        }
    };

    EncryptionState::try_from(version).map_err(|e| PdfCraftError::internal("preparing encryption", e))
}

/// Encrypt a document so it opens only with the user password.
///
/// The document is cleaned up and compressed before encryption; object
/// numbers must not change afterwards, so the encrypted form is written
/// verbatim, with a classic cross-reference table.
///
/// # Errors
///
/// Returns a ValidationError for an empty password and IOFailure if
/// encryption fails.
pub fn protect(mut pdf: LoadedPdf, options: &ProtectOptions) -> Result<Vec<u8>> {
    if options.user_password.is_empty() {
        return Err(PdfCraftError::validation("Password must not be empty"));
    }

    let doc = &mut pdf.document;
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();
    ensure_file_id(doc);

    let state = encryption_state(doc, options)?;
    doc.encrypt(&state)
        .map_err(|e| PdfCraftError::internal("encrypting PDF", e))?;
    doc.reference_table.cross_reference_type = XrefType::CrossReferenceTable;
    info!(name = %pdf.name, cipher = options.cipher.as_str(), "Encrypted document");

    PdfWriter::with_options(WriteOptions::verbatim()).write(&mut pdf.document)
}

/// Remove encryption from `bytes` using `password`.
///
/// An unencrypted document is returned as parsed.
///
/// # Errors
///
/// Returns InvalidPassword if the password does not open the document and
/// MalformedInput if it cannot be parsed or has no pages once decrypted.
pub fn unlock(bytes: &[u8], name: &str, options: &UnlockOptions) -> Result<LoadedPdf> {
    let mut doc = PdfReader::load_encrypted(bytes, name)?;

    if !PdfReader::is_encrypted(&doc) {
        debug!(name, "Document is not encrypted");
        return with_pages(LoadedPdf::new(name, doc));
    }

    if doc.encryption_state.is_some() {
        // Empty user password: lopdf decrypted the objects while loading.
        if let Some(Object::Reference(id)) = doc.trailer.remove(b"Encrypt") {
            doc.objects.remove(&id);
        }
    } else {
        doc.decrypt(&options.password).map_err(|e| {
            debug!(name, error = %e, "Decryption failed");
            PdfCraftError::invalid_password(format!("Incorrect password for '{name}'"))
        })?;
    }

    // A fresh document carries no encryption state into the writer.
    let mut plain = Document::with_version(doc.version.clone());
    plain.objects = std::mem::take(&mut doc.objects);
    plain.trailer = std::mem::take(&mut doc.trailer);
    plain.max_id = doc.max_id;

    info!(name, "Decrypted document");
    with_pages(LoadedPdf::new(name, plain))
}

fn with_pages(pdf: LoadedPdf) -> Result<LoadedPdf> {
    if pdf.page_count() == 0 {
        return Err(PdfCraftError::malformed(&pdf.name, "PDF has no pages"));
    }
    Ok(pdf)
}
