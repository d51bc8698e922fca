use anyhow::{anyhow, Result};
use lopdf::{Document as LoDocument, ObjectId};
use std::collections::HashMap;

use super::{extract, insert, redact};
use super::{Block, DocumentEngine, DocumentHandle, Rect, TextInsertion};

/// The lopdf-backed document engine. Stateless; every `open` yields an
/// independent handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfEngine;

impl LopdfEngine {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentEngine for LopdfEngine {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn is_available(&self) -> bool {
        // Linked in; present whenever the binary runs.
        true
    }

    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>> {
        let doc = LoDocument::load_mem(bytes)
            .map_err(|err| anyhow!("failed to load document: {err}"))?;
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        Ok(Box::new(LopdfHandle {
            doc,
            pages,
            pending: HashMap::new(),
        }))
    }
}

struct LopdfHandle {
    doc: LoDocument,
    /// Page object ids in document order.
    pages: Vec<ObjectId>,
    /// Redaction marks not yet applied, keyed by page index.
    pending: HashMap<usize, Vec<Rect>>,
}

impl LopdfHandle {
    fn page_id(&self, page: usize) -> Result<ObjectId> {
        self.pages
            .get(page)
            .copied()
            .ok_or_else(|| anyhow!("page index {page} out of range ({} pages)", self.pages.len()))
    }
}

impl DocumentHandle for LopdfHandle {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> Result<Vec<Block>> {
        let page_id = self.page_id(page)?;
        extract::extract_page_blocks(&self.doc, page_id)
    }

    fn add_redaction(&mut self, page: usize, region: Rect) {
        self.pending.entry(page).or_default().push(region);
    }

    fn apply_redactions(&mut self, page: usize) -> Result<()> {
        let page_id = self.page_id(page)?;
        let Some(regions) = self.pending.remove(&page) else {
            return Ok(());
        };
        redact::apply_redactions(&mut self.doc, page_id, &regions)
    }

    fn insert_text(&mut self, page: usize, insertion: &TextInsertion) -> Result<()> {
        let page_id = self.page_id(page)?;
        insert::insert_text(&mut self.doc, page_id, insertion)
    }

    fn save(&mut self) -> Result<Vec<u8>> {
        // The moral equivalent of save(garbage=4, deflate=true, clean=true):
        // drop dead weight, renumber, compress streams.
        self.doc.delete_zero_length_streams();
        self.doc.prune_objects();
        self.doc.renumber_objects();
        self.doc.compress();
        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|err| anyhow!("failed to serialize document: {err}"))?;
        Ok(out)
    }
}
