use crate::pdf::helvetica_advance_units;

/// Sizes below this never get smaller; residual overflow at the floor is
/// accepted rather than wrapped or truncated.
pub const MIN_FONT_SIZE: f32 = 6.0;
/// A replacement may overhang its box by this factor before it shrinks.
pub const OVERFLOW_TOLERANCE: f32 = 1.1;
const SIZE_STEP: f32 = 0.5;

/// Advance width of `text` at `font_size` with the insertion font.
pub fn measure_text_width(text: &str, font_size: f32) -> f32 {
    let units: f32 = text.chars().map(helvetica_advance_units).sum();
    units / 1000.0 * font_size
}

/// Shrink-to-fit: starting at the original span size, step down by 0.5 until
/// the measured width fits `bbox_width` with 10% tolerance, or the floor is
/// reached. A start size at or below the floor is returned unchanged.
pub fn fit_to_width(text: &str, bbox_width: f32, start_size: f32) -> f32 {
    let limit = bbox_width * OVERFLOW_TOLERANCE;
    let mut size = start_size;
    while size > MIN_FONT_SIZE {
        if measure_text_width(text, size) <= limit {
            return size;
        }
        size -= SIZE_STEP;
    }
    size.max(MIN_FONT_SIZE).min(start_size)
}
