use anyhow::{anyhow, Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId};
use std::collections::HashMap;
use tracing::debug;

use super::extract::{scan_page, TextEvent};
use super::Rect;

/// What a rewrite does to one show operation: neutralize the whole operand
/// (`Tj`, `'`, `"`) or individual string items of a `TJ` array. The stored
/// value is the replacement `TJ` adjustment in thousandths of text space.
#[derive(Default)]
struct OpRewrite {
    whole: Option<f32>,
    items: HashMap<usize, f32>,
}

/// Removes every show string whose rendered box falls inside one of the
/// regions, in a single content rewrite. Each removed string becomes an
/// equivalent numeric `TJ` advance, so all surviving text keeps its exact
/// position. Non-text operators are never touched; images survive.
pub(super) fn apply_redactions(
    doc: &mut LoDocument,
    page_id: ObjectId,
    regions: &[Rect],
) -> Result<()> {
    if regions.is_empty() {
        return Ok(());
    }

    let scan = scan_page(doc, page_id)?;
    let mut rewrites: HashMap<usize, OpRewrite> = HashMap::new();
    let mut removed = 0usize;
    for event in &scan.events {
        if !event_is_redacted(event, regions) {
            continue;
        }
        let Some(adjustment) = replacement_adjustment(event) else {
            continue;
        };
        removed += 1;
        let entry = rewrites.entry(event.op_index).or_default();
        match event.item_index {
            Some(item) => {
                entry.items.insert(item, adjustment);
            }
            None => entry.whole = Some(adjustment),
        }
    }
    if rewrites.is_empty() {
        return Ok(());
    }

    let content_bytes = doc
        .get_page_content(page_id)
        .with_context(|| "failed to read page content for redaction")?;
    let content = Content::decode(&content_bytes)
        .map_err(|err| anyhow!("failed to decode page content: {err}"))?;

    let mut operations = Vec::with_capacity(content.operations.len());
    for (index, op) in content.operations.into_iter().enumerate() {
        match rewrites.get(&index) {
            None => operations.push(op),
            Some(rewrite) => rewrite_operation(op, rewrite, &mut operations),
        }
    }

    let encoded = Content { operations }
        .encode()
        .map_err(|err| anyhow!("failed to encode redacted content: {err}"))?;
    doc.change_page_content(page_id, encoded)
        .map_err(|err| anyhow!("failed to write redacted content: {err}"))?;
    debug!(removed, regions = regions.len(), "applied batched redactions");
    Ok(())
}

fn event_is_redacted(event: &TextEvent, regions: &[Rect]) -> bool {
    let cx = (event.rect.x0 + event.rect.x1) / 2.0;
    let cy = (event.rect.y0 + event.rect.y1) / 2.0;
    regions.iter().any(|region| region.contains_point(cx, cy))
}

/// `TJ` adjustments move the cursor by `-(adj / 1000) * size * Th`; the shown
/// string moved it by `advance * Th`. Equate the two and the horizontal
/// scale cancels.
fn replacement_adjustment(event: &TextEvent) -> Option<f32> {
    if event.raw_size <= 0.0 {
        return None;
    }
    Some(-(event.advance_ts * 1000.0 / event.raw_size))
}

fn rewrite_operation(op: Operation, rewrite: &OpRewrite, out: &mut Vec<Operation>) {
    match op.operator.as_str() {
        "Tj" => {
            if let Some(adjustment) = rewrite.whole {
                out.push(advance_op(adjustment));
            } else {
                out.push(op);
            }
        }
        "'" => {
            if let Some(adjustment) = rewrite.whole {
                out.push(Operation::new("T*", vec![]));
                out.push(advance_op(adjustment));
            } else {
                out.push(op);
            }
        }
        "\"" => {
            if let Some(adjustment) = rewrite.whole {
                // Keep the word/char spacing side effects of the operator.
                if let Some(aw) = op.operands.first() {
                    out.push(Operation::new("Tw", vec![aw.clone()]));
                }
                if let Some(ac) = op.operands.get(1) {
                    out.push(Operation::new("Tc", vec![ac.clone()]));
                }
                out.push(Operation::new("T*", vec![]));
                out.push(advance_op(adjustment));
            } else {
                out.push(op);
            }
        }
        "TJ" => {
            let Some(LoObject::Array(items)) = op.operands.first() else {
                out.push(op);
                return;
            };
            let rebuilt: Vec<LoObject> = items
                .iter()
                .enumerate()
                .map(|(idx, item)| match rewrite.items.get(&idx) {
                    Some(adjustment) => LoObject::Real(*adjustment),
                    None => item.clone(),
                })
                .collect();
            out.push(Operation::new("TJ", vec![LoObject::Array(rebuilt)]));
        }
        _ => out.push(op),
    }
}

fn advance_op(adjustment: f32) -> Operation {
    Operation::new("TJ", vec![LoObject::Array(vec![LoObject::Real(adjustment)])])
}
