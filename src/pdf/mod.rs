use anyhow::Result;

mod backend;
mod extract;
mod fonts;
mod insert;
mod redact;

pub use backend::LopdfEngine;
pub use fonts::{encode_win_ansi, helvetica_advance_units};

pub const DEFAULT_FONT_SIZE: f32 = 12.0;
pub const DEFAULT_FONT_NAME: &str = "helv";

/// Axis-aligned box in page space: top-left origin, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Normalizing constructor: corners may arrive in any order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Read-only snapshot of one rendered text run. Defaults when the source
/// document omits a property: size 12, font "helv", color 0 (black).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Span {
    pub text: String,
    pub bbox: Rect,
    pub font_size: f32,
    pub font_name: String,
    /// Packed 0xRRGGBB fill color.
    pub color: u32,
    pub flags: u32,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            text: String::new(),
            bbox: Rect::new(0.0, 0.0, 0.0, 0.0),
            font_size: DEFAULT_FONT_SIZE,
            font_name: DEFAULT_FONT_NAME.to_string(),
            color: 0,
            flags: 0,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Line {
    pub bbox: Rect,
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum BlockKind {
    Text,
    Image,
    Other,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Block {
    pub kind: BlockKind,
    pub bbox: Rect,
    pub lines: Vec<Line>,
}

/// One text draw request against a page, in top-left page space.
/// `x`/`y` name the baseline start point.
#[derive(Debug, Clone)]
pub struct TextInsertion {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub font_name: String,
    pub font_size: f32,
    /// Normalized RGB, each channel in 0.0..=1.0.
    pub color: (f32, f32, f32),
    /// When set, glyphs outside the insertion encoding become `?` instead
    /// of failing the whole draw.
    pub lossy: bool,
}

/// The document engine collaborator. Everything behind this seam is a thin
/// wrapper over the PDF object model; the conversion pipeline never touches
/// PDF objects directly.
pub trait DocumentEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>>;
}

/// Mutable handle over one loaded document.
///
/// Contract: callers take the full `page_text` snapshot for a page before
/// calling any mutating method on that page; redactions are marked first and
/// applied in one batch; images overlapping a redacted region survive.
pub trait DocumentHandle: Send {
    fn page_count(&self) -> usize;

    fn page_text(&self, page: usize) -> Result<Vec<Block>>;

    /// Marks a region for removal. Nothing is drawn for a mark: no fill, no
    /// stroke, no visible artifact.
    fn add_redaction(&mut self, page: usize, region: Rect);

    /// Applies every pending mark for `page` in a single content rewrite.
    fn apply_redactions(&mut self, page: usize) -> Result<()>;

    fn insert_text(&mut self, page: usize, insertion: &TextInsertion) -> Result<()>;

    /// Serializes with garbage collection of unused objects, stream
    /// compression, and cleanup of redundant structures.
    fn save(&mut self) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_normalizes_corner_order() {
        let rect = Rect::new(10.0, 20.0, 4.0, 2.0);
        assert_eq!((rect.x0, rect.y0, rect.x1, rect.y1), (4.0, 2.0, 10.0, 20.0));
        assert_eq!(rect.width(), 6.0);
        assert_eq!(rect.height(), 18.0);
    }

    #[test]
    fn span_defaults_match_the_documented_fallbacks() {
        let span = Span::default();
        assert_eq!(span.font_size, 12.0);
        assert_eq!(span.font_name, "helv");
        assert_eq!(span.color, 0);
    }
}
