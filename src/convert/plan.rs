use tracing::debug;

use crate::detect::is_source_language;
use crate::pdf::{Block, BlockKind, Rect};

use super::ConversionContext;

/// Per-page replacement plan: parallel lists of regions to erase and text to
/// put back. Built entirely from the immutable snapshot, before any page
/// mutation.
#[derive(Debug, Default)]
pub struct ReplacementPlan {
    pub redact_regions: Vec<Rect>,
    pub replacements: Vec<Replacement>,
}

#[derive(Debug, Clone)]
pub struct Replacement {
    pub bbox: Rect,
    pub text: String,
    pub font_size: f32,
    pub color: u32,
}

impl ReplacementPlan {
    pub fn is_empty(&self) -> bool {
        self.redact_regions.is_empty()
    }
}

/// Walks the snapshot in document order and decides, span by span, what gets
/// replaced. Spans whose translation round-trips unchanged (proper nouns the
/// service declines to touch) are left alone.
pub async fn plan_page(blocks: &[Block], ctx: &mut ConversionContext<'_>) -> ReplacementPlan {
    let mut plan = ReplacementPlan::default();

    for block in blocks {
        if block.kind != BlockKind::Text {
            continue;
        }
        for line in &block.lines {
            for span in &line.spans {
                let trimmed = span.text.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if !is_source_language(trimmed) {
                    continue;
                }
                let translated = ctx.cache.get_or_translate(trimmed, ctx.provider).await;
                if translated == trimmed {
                    debug!(fragment = trimmed, "translation unchanged, span kept");
                    continue;
                }
                plan.redact_regions.push(span.bbox);
                plan.replacements.push(Replacement {
                    bbox: span.bbox,
                    text: translated,
                    font_size: span.font_size,
                    color: span.color,
                });
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{Line, Span};
    use crate::translate::tests_support::FakeProvider;

    fn span(text: &str, x0: f32) -> Span {
        Span {
            text: text.to_string(),
            bbox: Rect::new(x0, 0.0, x0 + 100.0, 20.0),
            ..Span::default()
        }
    }

    fn text_block(spans: Vec<Span>) -> Block {
        let bbox = spans
            .iter()
            .skip(1)
            .fold(spans[0].bbox, |acc, s| acc.union(&s.bbox));
        Block {
            kind: BlockKind::Text,
            bbox,
            lines: vec![Line { bbox, spans }],
        }
    }

    #[tokio::test]
    async fn plans_only_source_language_spans() {
        let provider = FakeProvider::translating(|_| "Hello World".to_string());
        let mut ctx = ConversionContext::new(&provider);
        let blocks = vec![text_block(vec![
            span("你好世界", 0.0),
            span("already english", 120.0),
            span("   ", 240.0),
        ])];

        let plan = plan_page(&blocks, &mut ctx).await;
        assert_eq!(plan.redact_regions.len(), 1);
        assert_eq!(plan.replacements.len(), 1);
        assert_eq!(plan.replacements[0].text, "Hello World");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn unchanged_translation_is_not_redacted() {
        let provider = FakeProvider::echoing();
        let mut ctx = ConversionContext::new(&provider);
        let blocks = vec![text_block(vec![span("你好世界", 0.0)])];

        let plan = plan_page(&blocks, &mut ctx).await;
        assert!(plan.is_empty());
        // The fragment was still looked up (and cached) once.
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn image_blocks_are_skipped_untouched() {
        let provider = FakeProvider::translating(|_| "x".to_string());
        let mut ctx = ConversionContext::new(&provider);
        let blocks = vec![Block {
            kind: BlockKind::Image,
            bbox: Rect::new(0.0, 0.0, 200.0, 200.0),
            lines: Vec::new(),
        }];

        let plan = plan_page(&blocks, &mut ctx).await;
        assert!(plan.is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_fragments_share_one_translation_call() {
        let provider = FakeProvider::translating(|_| "Hello".to_string());
        let mut ctx = ConversionContext::new(&provider);
        let blocks = vec![text_block(vec![
            span("你好", 0.0),
            span("你好", 120.0),
            span("你好", 240.0),
        ])];

        let plan = plan_page(&blocks, &mut ctx).await;
        assert_eq!(plan.replacements.len(), 3);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn failed_translation_falls_open_and_plans_nothing() {
        let provider = FakeProvider::failing();
        let mut ctx = ConversionContext::new(&provider);
        let blocks = vec![text_block(vec![span("你好世界", 0.0)])];

        // Fail-open returns the original text, which round-trips unchanged.
        let plan = plan_page(&blocks, &mut ctx).await;
        assert!(plan.is_empty());
    }
}
