//! Small helpers shared across modules.

use lopdf::{Document, Object};
use std::path::Path;

/// Fallback extension for names without a usable one.
pub const DEFAULT_EXTENSION: &str = "bin";

/// Normalise a file extension for use in a storage identifier.
///
/// Lowercases and accepts 1 to 8 ASCII alphanumerics; anything else
/// becomes [`DEFAULT_EXTENSION`].
pub fn sanitize_extension(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    let usable =
        !ext.is_empty() && ext.len() <= 8 && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    if usable {
        ext
    } else {
        DEFAULT_EXTENSION.to_string()
    }
}

/// Extension of a client-supplied file name, sanitised.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(sanitize_extension)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Human-readable file size.
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}

/// Follow a chain of references to the object it ends on.
///
/// Dangling references resolve to themselves.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    // Bounded so that a reference cycle cannot hang the caller.
    for _ in 0..32 {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}
