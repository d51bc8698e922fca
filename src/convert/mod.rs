use thiserror::Error;
use tracing::{debug, info};

mod fit;
mod place;
mod plan;

pub use fit::{fit_to_width, measure_text_width, MIN_FONT_SIZE, OVERFLOW_TOLERANCE};
pub use place::{place_replacement, unpack_color, Placement};
pub use plan::{plan_page, Replacement, ReplacementPlan};

use crate::pdf::DocumentEngine;
use crate::translate::{TranslateProvider, TranslationCache};

#[derive(Debug, Error)]
pub enum ConvertError {
    /// A required collaborator is missing; nothing was touched.
    #[error("missing dependency: {0}")]
    DependencyUnavailable(&'static str),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("processing error: {0}")]
    Processing(#[from] anyhow::Error),
}

/// Per-conversion state: the provider plus a cache that lives exactly as
/// long as one document. Passed explicitly so the pipeline has no hidden
/// shared state and tests can hand in fakes.
pub struct ConversionContext<'a> {
    pub provider: &'a dyn TranslateProvider,
    pub cache: TranslationCache,
}

impl<'a> ConversionContext<'a> {
    pub fn new(provider: &'a dyn TranslateProvider) -> Self {
        Self {
            provider,
            cache: TranslationCache::new(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PlacementTotals {
    placed: usize,
    fallback: usize,
    dropped: usize,
}

/// Whole-document conversion: pure function from input bytes to output bytes
/// modulo translation-service nondeterminism and fail-open degradation.
///
/// Pages run strictly in order. Per page, planning completes on the immutable
/// snapshot before any mutation; redactions apply in one batch; then each
/// replacement is fitted and placed.
pub async fn convert(
    bytes: &[u8],
    engine: &dyn DocumentEngine,
    provider: &dyn TranslateProvider,
) -> Result<Vec<u8>, ConvertError> {
    if !engine.is_available() {
        return Err(ConvertError::DependencyUnavailable("document engine"));
    }
    if !provider.is_available() {
        return Err(ConvertError::DependencyUnavailable("translation provider"));
    }

    let mut doc = engine
        .open(bytes)
        .map_err(|err| ConvertError::InvalidDocument(format!("{err:#}")))?;
    let mut ctx = ConversionContext::new(provider);
    let pages = doc.page_count();
    let mut totals = PlacementTotals::default();

    for page in 0..pages {
        let blocks = doc.page_text(page)?;
        let plan = plan_page(&blocks, &mut ctx).await;
        if plan.is_empty() {
            debug!(page, "nothing to replace");
            continue;
        }

        for region in &plan.redact_regions {
            doc.add_redaction(page, *region);
        }
        doc.apply_redactions(page)?;

        for replacement in &plan.replacements {
            let font_size = fit_to_width(
                &replacement.text,
                replacement.bbox.width(),
                replacement.font_size,
            );
            match place_replacement(doc.as_mut(), page, replacement, font_size) {
                Placement::Placed => totals.placed += 1,
                Placement::PlacedWithFallback => totals.fallback += 1,
                Placement::Dropped => totals.dropped += 1,
            }
        }
        info!(
            page,
            planned = plan.replacements.len(),
            "page replacements applied"
        );
    }

    ctx.cache.log_summary();
    info!(
        pages,
        placed = totals.placed,
        fallback = totals.fallback,
        dropped = totals.dropped,
        "document converted"
    );
    Ok(doc.save()?)
}

#[cfg(test)]
pub(crate) mod tests_support {
    use anyhow::{anyhow, Result};
    use std::sync::{Arc, Mutex};

    use crate::pdf::{Block, DocumentEngine, DocumentHandle, Rect, TextInsertion};

    /// In-memory engine for pipeline tests: serves a canned snapshot and
    /// records every call so ordering can be asserted.
    pub(crate) struct FakeEngine {
        pub available: bool,
        pub pages: Vec<Vec<Block>>,
        pub state: Arc<Mutex<FakeDocState>>,
    }

    #[derive(Default)]
    pub(crate) struct FakeDocState {
        /// Call audit in order: `snapshot:N`, `mark:N`, `apply:N`, `insert:N`,
        /// `save`.
        pub calls: Vec<String>,
        pub marked: Vec<(usize, Rect)>,
        pub apply_batches: Vec<(usize, usize)>,
        pub insertions: Vec<(usize, TextInsertion)>,
        /// Fail this many upcoming insert attempts.
        pub insert_failures_remaining: usize,
        pub saved: bool,
    }

    impl FakeEngine {
        pub(crate) fn with_pages(pages: Vec<Vec<Block>>) -> Self {
            Self {
                available: true,
                pages,
                state: Arc::new(Mutex::new(FakeDocState::default())),
            }
        }

        pub(crate) fn failing_inserts(self, count: usize) -> Self {
            self.state.lock().unwrap().insert_failures_remaining = count;
            self
        }

        pub(crate) fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }
    }

    impl DocumentEngine for FakeEngine {
        fn name(&self) -> &'static str {
            "fake-engine"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn open(&self, _bytes: &[u8]) -> Result<Box<dyn DocumentHandle>> {
            Ok(Box::new(FakeHandle {
                pages: self.pages.clone(),
                pending: vec![Vec::new(); self.pages.len()],
                state: self.state.clone(),
            }))
        }
    }

    pub(crate) struct FakeHandle {
        pages: Vec<Vec<Block>>,
        pending: Vec<Vec<Rect>>,
        state: Arc<Mutex<FakeDocState>>,
    }

    impl DocumentHandle for FakeHandle {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_text(&self, page: usize) -> Result<Vec<Block>> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("snapshot:{page}"));
            self.pages
                .get(page)
                .cloned()
                .ok_or_else(|| anyhow!("page out of range"))
        }

        fn add_redaction(&mut self, page: usize, region: Rect) {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("mark:{page}"));
            state.marked.push((page, region));
            self.pending[page].push(region);
        }

        fn apply_redactions(&mut self, page: usize) -> Result<()> {
            let batch = std::mem::take(&mut self.pending[page]);
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("apply:{page}"));
            state.apply_batches.push((page, batch.len()));
            Ok(())
        }

        fn insert_text(&mut self, page: usize, insertion: &TextInsertion) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("insert:{page}"));
            if state.insert_failures_remaining > 0 {
                state.insert_failures_remaining -= 1;
                return Err(anyhow!("simulated draw fault"));
            }
            state.insertions.push((page, insertion.clone()));
            Ok(())
        }

        fn save(&mut self) -> Result<Vec<u8>> {
            let mut state = self.state.lock().unwrap();
            state.calls.push("save".to_string());
            state.saved = true;
            Ok(b"%PDF-converted".to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::FakeEngine;
    use super::*;
    use crate::pdf::{Block, BlockKind, Line, Rect, Span};
    use crate::translate::tests_support::FakeProvider;

    fn source_span_page(text: &str) -> Vec<Block> {
        let bbox = Rect::new(0.0, 0.0, 100.0, 20.0);
        vec![Block {
            kind: BlockKind::Text,
            bbox,
            lines: vec![Line {
                bbox,
                spans: vec![Span {
                    text: text.to_string(),
                    bbox,
                    ..Span::default()
                }],
            }],
        }]
    }

    #[tokio::test]
    async fn single_span_document_end_to_end() {
        let engine = FakeEngine::with_pages(vec![source_span_page("你好世界")]);
        let provider = FakeProvider::translating(|_| "Hello World".to_string());

        let out = convert(b"%PDF-input", &engine, &provider).await.unwrap();
        assert_eq!(out, b"%PDF-converted");
        assert_eq!(provider.call_count(), 1);

        let state = engine.state.lock().unwrap();
        assert_eq!(state.marked, vec![(0, Rect::new(0.0, 0.0, 100.0, 20.0))]);
        assert_eq!(state.apply_batches, vec![(0, 1)]);
        assert_eq!(state.insertions.len(), 1);
        let (page, insertion) = &state.insertions[0];
        assert_eq!(*page, 0);
        assert_eq!(insertion.text, "Hello World");
        assert_eq!(insertion.x, 0.0);
        // "Hello World" fits the 100pt box at the original 12pt.
        assert_eq!(insertion.font_size, 12.0);
        assert_eq!(insertion.y, (20.0 + 12.0) / 2.0);
        assert_eq!(insertion.color, (0.0, 0.0, 0.0));
        assert!(state.saved);
    }

    #[tokio::test]
    async fn snapshot_is_taken_before_any_mutation() {
        let engine = FakeEngine::with_pages(vec![
            source_span_page("你好世界"),
            source_span_page("安全第一"),
        ]);
        let provider = FakeProvider::translating(|_| "translated".to_string());
        convert(b"%PDF-input", &engine, &provider).await.unwrap();

        let state = engine.state.lock().unwrap();
        let calls = &state.calls;
        for page in 0..2 {
            let snapshot = calls
                .iter()
                .position(|c| c == &format!("snapshot:{page}"))
                .unwrap();
            let first_mutation = calls
                .iter()
                .position(|c| c == &format!("mark:{page}") || c == &format!("apply:{page}"))
                .unwrap();
            assert!(snapshot < first_mutation);
        }
        // Pages strictly in order.
        let page0_apply = calls.iter().position(|c| c == "apply:0").unwrap();
        let page1_snapshot = calls.iter().position(|c| c == "snapshot:1").unwrap();
        assert!(page0_apply < page1_snapshot);
    }

    #[tokio::test]
    async fn document_without_source_text_is_untouched() {
        let engine = FakeEngine::with_pages(vec![source_span_page("plain english only")]);
        let provider = FakeProvider::translating(|_| "unused".to_string());
        convert(b"%PDF-input", &engine, &provider).await.unwrap();

        let state = engine.state.lock().unwrap();
        assert!(state.marked.is_empty());
        assert!(state.apply_batches.is_empty());
        assert!(state.insertions.is_empty());
        assert!(state.saved);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn unavailable_engine_aborts_before_opening() {
        let engine = FakeEngine::with_pages(vec![source_span_page("你好")]).unavailable();
        let provider = FakeProvider::translating(|_| "x".to_string());
        let err = convert(b"%PDF-input", &engine, &provider).await.unwrap_err();
        assert!(matches!(
            err,
            ConvertError::DependencyUnavailable("document engine")
        ));
        assert!(engine.state.lock().unwrap().calls.is_empty());
    }

    #[tokio::test]
    async fn unavailable_provider_aborts_before_opening() {
        let engine = FakeEngine::with_pages(vec![source_span_page("你好")]);
        let provider = FakeProvider::unavailable();
        let err = convert(b"%PDF-input", &engine, &provider).await.unwrap_err();
        assert!(matches!(
            err,
            ConvertError::DependencyUnavailable("translation provider")
        ));
        assert!(engine.state.lock().unwrap().calls.is_empty());
    }

    #[tokio::test]
    async fn failed_insert_falls_back_then_drops() {
        // Two failures: the first replacement needs the fallback attempt,
        // which succeeds; nothing is dropped.
        let engine =
            FakeEngine::with_pages(vec![source_span_page("你好世界")]).failing_inserts(1);
        let provider = FakeProvider::translating(|_| "Hello".to_string());
        convert(b"%PDF-input", &engine, &provider).await.unwrap();
        {
            let state = engine.state.lock().unwrap();
            assert_eq!(state.insertions.len(), 1);
            // The fallback draw is the one that landed: default style.
            assert!(state.insertions[0].1.lossy);
        }

        // Both attempts fail: the fragment is dropped, conversion succeeds,
        // the redaction stays applied.
        let engine =
            FakeEngine::with_pages(vec![source_span_page("你好世界")]).failing_inserts(2);
        let provider = FakeProvider::translating(|_| "Hello".to_string());
        convert(b"%PDF-input", &engine, &provider).await.unwrap();
        let state = engine.state.lock().unwrap();
        assert!(state.insertions.is_empty());
        assert_eq!(state.apply_batches, vec![(0, 1)]);
        assert!(state.saved);
    }
}
