//! Page-tree operations: merge, select, remove, rotate.
//!
//! Every function here ends with a document whose root `/Pages` node lists
//! the surviving pages directly. Attributes a page used to inherit from an
//! intermediate node are copied onto the page first, so flattening the
//! tree never changes how a page renders.

use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use super::params::{PageSelection, Rotation};
use crate::error::{PdfCraftError, Result};
use crate::io::LoadedPdf;

/// Page attributes that may be inherited from an ancestor `/Pages` node.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Upper bound on page-tree depth, against malformed parent cycles.
const MAX_TREE_DEPTH: usize = 64;

/// Concatenate documents, pages in input order.
///
/// The first document provides the catalog, metadata and trailer of the
/// result.
///
/// # Errors
///
/// Returns a ValidationError for an empty input and MalformedInput if a
/// document's page tree cannot be restructured.
pub fn merge(inputs: Vec<LoadedPdf>) -> Result<Document> {
    let mut inputs = inputs.into_iter();
    let first = inputs
        .next()
        .ok_or_else(|| PdfCraftError::validation("Nothing to merge"))?;

    let mut merged = first.document.clone();
    let all_pages: Vec<ObjectId> = merged.get_pages().into_values().collect();
    set_pages(&mut merged, &all_pages).map_err(|e| first.structure_error(e))?;
    let root = pages_root(&merged).map_err(|e| first.structure_error(e))?;

    let mut max_id = merged.max_id;

    for mut input in inputs {
        let page_count = input.page_count();
        debug!(name = %input.name, pages = page_count, "Appending document");

        let doc = &mut input.document;
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        flatten(doc, &page_ids).map_err(|e| input.structure_error(e))?;

        // Avoid object id collisions by renumbering the incoming document.
        let doc = &mut input.document;
        doc.renumber_objects_with(max_id + 1);
        max_id = doc.max_id;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        merged.objects.extend(std::mem::take(&mut doc.objects));

        append_pages_to_page_tree(&mut merged, root, &page_ids)
            .map_err(|e| input.structure_error(e))?;
    }

    merged.max_id = max_id;
    Ok(merged)
}

/// Build a document holding only `pages` (1-based), in the given order.
///
/// # Errors
///
/// Returns a ValidationError if a page does not exist.
pub fn select(pdf: &LoadedPdf, pages: &[u32]) -> Result<Document> {
    let all_pages = pdf.document.get_pages();

    let page_ids = pages
        .iter()
        .map(|n| {
            all_pages.get(n).copied().ok_or_else(|| {
                PdfCraftError::validation(format!(
                    "Page {n} is out of range (document has {} pages)",
                    all_pages.len()
                ))
            })
        })
        .collect::<Result<Vec<ObjectId>>>()?;

    let mut doc = pdf.document.clone();
    set_pages(&mut doc, &page_ids).map_err(|e| pdf.structure_error(e))?;
    Ok(doc)
}

/// Build a document holding the pages in `selection`, in selection order.
pub fn extract(pdf: &LoadedPdf, selection: &PageSelection) -> Result<Document> {
    let pages = selection.resolve(pdf.page_count())?;
    select(pdf, &pages)
}

/// Build a document without the pages in `selection`.
///
/// # Errors
///
/// Returns a ValidationError if the selection covers every page.
pub fn remove(pdf: &LoadedPdf, selection: &PageSelection) -> Result<Document> {
    let page_count = pdf.page_count();
    let removed = selection.resolve(page_count)?;

    let kept: Vec<u32> = (1..=page_count).filter(|n| !removed.contains(n)).collect();
    if kept.is_empty() {
        return Err(PdfCraftError::validation(
            "Cannot remove every page of the document",
        ));
    }

    select(pdf, &kept)
}

/// Add `rotation` to every page's `/Rotate`.
pub fn rotate(pdf: &mut LoadedPdf, rotation: Rotation) -> Result<()> {
    let page_ids: Vec<ObjectId> = pdf.document.get_pages().into_values().collect();
    set_pages(&mut pdf.document, &page_ids).map_err(|e| pdf.structure_error(e))?;

    if rotation == Rotation::None {
        return Ok(());
    }

    for page_id in page_ids {
        rotate_page(&mut pdf.document, page_id, rotation).map_err(|e| pdf.structure_error(e))?;
    }

    Ok(())
}

fn rotate_page(doc: &mut Document, page_id: ObjectId, rotation: Rotation) -> lopdf::Result<()> {
    let dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    let current = dict.get(b"Rotate").and_then(Object::as_i64).unwrap_or(0);
    dict.set("Rotate", Object::Integer(rotation.apply_to(current)));
    Ok(())
}

/// Id of the root `/Pages` node.
pub(crate) fn pages_root(doc: &Document) -> lopdf::Result<ObjectId> {
    doc.catalog()?.get(b"Pages")?.as_reference()
}

/// Make `page_ids` the complete, ordered page list of `doc`.
pub(crate) fn set_pages(doc: &mut Document, page_ids: &[ObjectId]) -> lopdf::Result<()> {
    flatten(doc, page_ids)?;

    let root = pages_root(doc)?;
    let pages_dict = doc.get_object_mut(root)?.as_dict_mut()?;
    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
    pages_dict.set("Kids", Object::Array(kids));
    pages_dict.set("Count", Object::Integer(page_ids.len() as i64));

    Ok(())
}

/// Copy inherited attributes onto each page and re-parent it to the root.
fn flatten(doc: &mut Document, page_ids: &[ObjectId]) -> lopdf::Result<()> {
    let root = pages_root(doc)?;

    for &page_id in page_ids {
        let inherited = inherited_attributes(doc, page_id)?;
        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        for (key, value) in inherited {
            page.set(key, value);
        }
        page.set("Parent", Object::Reference(root));
    }

    Ok(())
}

/// Attributes `page_id` lacks but inherits from an ancestor.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> lopdf::Result<Vec<(Vec<u8>, Object)>> {
    let page = doc.get_dictionary(page_id)?;
    let mut missing: Vec<&[u8]> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();

    let mut found = Vec::new();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let Some(parent_id) = parent else { break };
        if missing.is_empty() {
            break;
        }

        let node = doc.get_dictionary(parent_id)?;
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    Ok(found)
}

/// Append page references to the root `/Pages` node and fix its count.
fn append_pages_to_page_tree(
    merged: &mut Document,
    root: ObjectId,
    page_ids: &[ObjectId],
) -> lopdf::Result<()> {
    for &page_id in page_ids {
        merged
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Parent", Object::Reference(root));
    }

    let pages_dict = merged.get_object_mut(root)?.as_dict_mut()?;
    let kids_array = pages_dict.get_mut(b"Kids")?.as_array_mut()?;
    kids_array.extend(page_ids.iter().map(|&id| Object::Reference(id)));

    let count = kids_array.len() as i64;
    pages_dict.set("Count", Object::Integer(count));

    Ok(())
}
