use tracing::{debug, warn};

use crate::pdf::{DocumentHandle, TextInsertion, DEFAULT_FONT_NAME};

use super::plan::Replacement;

/// Outcome of one placement attempt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Drawn with the resolved font and the span's color.
    Placed,
    /// First draw failed; the default-style retry landed.
    PlacedWithFallback,
    /// Both attempts failed; the page keeps its redaction but loses this
    /// text.
    Dropped,
}

/// Splits a packed 0xRRGGBB color into normalized channels.
pub fn unpack_color(color: u32) -> (f32, f32, f32) {
    (
        ((color >> 16) & 255) as f32 / 255.0,
        ((color >> 8) & 255) as f32 / 255.0,
        (color & 255) as f32 / 255.0,
    )
}

/// Writes one translated fragment into its original box. Left-aligned at
/// `x0`; the baseline sits at `y0 + (height + size) / 2`, using the font size
/// as an ascent proxy. On a draw fault the default style (helv, black, lossy
/// encoding) is tried once at the same position and size before giving up.
pub fn place_replacement(
    doc: &mut dyn DocumentHandle,
    page: usize,
    replacement: &Replacement,
    font_size: f32,
) -> Placement {
    let bbox = replacement.bbox;
    let insertion = TextInsertion {
        x: bbox.x0,
        y: bbox.y0 + (bbox.height() + font_size) / 2.0,
        text: replacement.text.clone(),
        font_name: DEFAULT_FONT_NAME.to_string(),
        font_size,
        color: unpack_color(replacement.color),
        lossy: false,
    };

    match doc.insert_text(page, &insertion) {
        Ok(()) => Placement::Placed,
        Err(err) => {
            debug!(page, "insertion failed, retrying with default style: {err:#}");
            let fallback = TextInsertion {
                color: (0.0, 0.0, 0.0),
                lossy: true,
                ..insertion
            };
            match doc.insert_text(page, &fallback) {
                Ok(()) => Placement::PlacedWithFallback,
                Err(err) => {
                    warn!(
                        page,
                        text = replacement.text.as_str(),
                        "dropping fragment, both draw attempts failed: {err:#}"
                    );
                    Placement::Dropped
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::tests_support::FakeEngine;
    use crate::pdf::{DocumentEngine, Rect};

    fn replacement(color: u32) -> Replacement {
        Replacement {
            bbox: Rect::new(10.0, 30.0, 110.0, 50.0),
            text: "Hello".to_string(),
            font_size: 12.0,
            color,
        }
    }

    #[test]
    fn primary_color_channels_unpack() {
        assert_eq!(unpack_color(0xFF0000), (1.0, 0.0, 0.0));
        assert_eq!(unpack_color(0x00FF00), (0.0, 1.0, 0.0));
        assert_eq!(unpack_color(0x0000FF), (0.0, 0.0, 1.0));
        assert_eq!(unpack_color(0), (0.0, 0.0, 0.0));
    }

    #[test]
    fn placement_uses_the_vertical_centering_formula() {
        let engine = FakeEngine::with_pages(vec![Vec::new()]);
        let mut doc = engine.open(b"%PDF").unwrap();
        let outcome = place_replacement(doc.as_mut(), 0, &replacement(0xFF0000), 10.0);
        assert_eq!(outcome, Placement::Placed);

        let state = engine.state.lock().unwrap();
        let (_, insertion) = &state.insertions[0];
        assert_eq!(insertion.x, 10.0);
        // y0 + (height + size) / 2 = 30 + (20 + 10) / 2
        assert_eq!(insertion.y, 45.0);
        assert_eq!(insertion.color, (1.0, 0.0, 0.0));
        assert!(!insertion.lossy);
    }

    #[test]
    fn fallback_retries_in_default_style_at_the_same_point() {
        let engine = FakeEngine::with_pages(vec![Vec::new()]).failing_inserts(1);
        let mut doc = engine.open(b"%PDF").unwrap();
        let outcome = place_replacement(doc.as_mut(), 0, &replacement(0xFF0000), 10.0);
        assert_eq!(outcome, Placement::PlacedWithFallback);

        let state = engine.state.lock().unwrap();
        let (_, insertion) = &state.insertions[0];
        assert_eq!(insertion.y, 45.0);
        assert_eq!(insertion.font_size, 10.0);
        assert_eq!(insertion.color, (0.0, 0.0, 0.0));
        assert!(insertion.lossy);
    }

    #[test]
    fn two_failures_drop_the_fragment() {
        let engine = FakeEngine::with_pages(vec![Vec::new()]).failing_inserts(2);
        let mut doc = engine.open(b"%PDF").unwrap();
        let outcome = place_replacement(doc.as_mut(), 0, &replacement(0), 8.0);
        assert_eq!(outcome, Placement::Dropped);
        assert!(engine.state.lock().unwrap().insertions.is_empty());
    }
}
