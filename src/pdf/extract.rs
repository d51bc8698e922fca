use anyhow::{anyhow, Result};
use lopdf::content::Content;
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId};
use std::collections::HashMap;
use ttf_parser::Face;

use super::fonts::{
    name_bytes_to_string, obj_to_f32, resolve_dict, resolve_font_resource, resolve_object,
    CharCodeEncoding, FontResource,
};
use super::{Block, BlockKind, Line, Rect, Span};

const DEFAULT_PAGE_HEIGHT: f32 = 792.0;

/// 2x3 affine matrix in PDF row-vector convention:
/// `(x', y') = (a*x + c*y + e, b*x + d*y + f)`.
#[derive(Debug, Clone, Copy)]
pub(super) struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub(super) fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub(super) fn from_operands(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub(super) fn translation(tx: f32, ty: f32) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: tx,
            f: ty,
        }
    }

    /// Applies `self`, then `other`.
    pub(super) fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub(super) fn transform(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn scale_y(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

#[derive(Clone)]
struct ParseState {
    ctm: Matrix,
    font_resource: Option<String>,
    font_name: String,
    font_size: f32,
    text_matrix: Matrix,
    text_line_matrix: Matrix,
    text_leading: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_h_scale: f32,
    text_rise: f32,
    text_render_mode: i64,
    fill_color: u32,
}

impl Default for ParseState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            font_resource: None,
            font_name: "Helvetica".to_string(),
            font_size: 12.0,
            text_matrix: Matrix::identity(),
            text_line_matrix: Matrix::identity(),
            text_leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_h_scale: 1.0,
            text_rise: 0.0,
            text_render_mode: 0,
            fill_color: 0,
        }
    }
}

pub(super) struct PageResources {
    fonts: HashMap<String, FontResource>,
    xobjects: HashMap<String, ObjectId>,
}

/// One decoded show operation (or one string item of a `TJ` array), with its
/// device-space geometry and the data a rewrite needs to keep surviving text
/// in place.
pub(super) struct TextEvent {
    pub op_index: usize,
    /// For `TJ`, the index of the string item inside the array operand.
    pub item_index: Option<usize>,
    pub text: String,
    pub rect: Rect,
    /// Effective device font size.
    pub size: f32,
    /// The raw `Tf` size, needed to express advances in `TJ` thousandths.
    pub raw_size: f32,
    /// Text-space advance of the shown string before horizontal scaling.
    pub advance_ts: f32,
    pub font_name: String,
    pub color: u32,
}

pub(super) struct PageScan {
    pub events: Vec<TextEvent>,
    pub images: Vec<Rect>,
    pub others: Vec<Rect>,
    pub page_height: f32,
}

pub(super) fn page_height(doc: &LoDocument, page_id: ObjectId) -> f32 {
    let mut current = page_id;
    for _ in 0..32 {
        let Ok(dict) = doc.get_dictionary(current) else {
            break;
        };
        if let Some(media_box) = dict
            .get(b"MediaBox")
            .ok()
            .and_then(|value| resolve_object(doc, value).ok())
            .and_then(|value| value.as_array().ok())
        {
            let coords: Vec<f32> = media_box.iter().filter_map(obj_to_f32).collect();
            if coords.len() == 4 {
                return (coords[3] - coords[1]).abs();
            }
        }
        match dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok()) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    DEFAULT_PAGE_HEIGHT
}

pub(super) fn resources_from_page(doc: &LoDocument, page_id: ObjectId) -> PageResources {
    let mut fonts = HashMap::new();
    let mut xobjects = HashMap::new();

    // Resources inherit through the page tree like MediaBox does.
    let mut current = page_id;
    let mut resources_dict = None;
    for _ in 0..32 {
        let Ok(dict) = doc.get_dictionary(current) else {
            break;
        };
        if let Ok(res_obj) = dict.get(b"Resources") {
            resources_dict = Some(resolve_dict(doc, res_obj));
            break;
        }
        match dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok()) {
            Some(parent) => current = parent,
            None => break,
        }
    }

    if let Some(resources) = resources_dict {
        if let Ok(font_obj) = resources.get(b"Font") {
            let font_dict = resolve_dict(doc, font_obj);
            for (name, font_ref) in font_dict.iter() {
                fonts.insert(
                    name_bytes_to_string(name),
                    resolve_font_resource(doc, font_ref),
                );
            }
        }
        if let Ok(xobj_obj) = resources.get(b"XObject") {
            let xobj_dict = resolve_dict(doc, xobj_obj);
            for (name, ref_obj) in xobj_dict.iter() {
                if let Ok(id) = ref_obj.as_reference() {
                    xobjects.insert(name_bytes_to_string(name), id);
                }
            }
        }
    }

    PageResources { fonts, xobjects }
}

/// Walks the page content stream once and reports every text show event
/// (device-space, top-left y-down coordinates) plus image/form placements.
/// Only the page-level stream is interpreted; content nested in form
/// XObjects is reported as an `Other` placement, not as text.
pub(super) fn scan_page(doc: &LoDocument, page_id: ObjectId) -> Result<PageScan> {
    let height = page_height(doc, page_id);
    let resources = resources_from_page(doc, page_id);
    let mut scan = PageScan {
        events: Vec::new(),
        images: Vec::new(),
        others: Vec::new(),
        page_height: height,
    };
    // A page with no content stream is legal and simply has nothing to plan.
    let Ok(content_bytes) = doc.get_page_content(page_id) else {
        return Ok(scan);
    };
    let content = Content::decode(&content_bytes)
        .map_err(|err| anyhow!("failed to decode page content: {err}"))?;

    let mut state = ParseState::default();
    let mut stack: Vec<ParseState> = Vec::new();

    for (op_index, op) in content.operations.iter().enumerate() {
        match op.operator.as_str() {
            "q" => stack.push(state.clone()),
            "Q" => {
                if let Some(prev) = stack.pop() {
                    state = prev;
                }
            }
            "cm" => {
                if let Some([a, b, c, d, e, f]) = op_f32_6(op) {
                    state.ctm = Matrix::from_operands(a, b, c, d, e, f).then(&state.ctm);
                }
            }
            "BT" => {
                state.text_matrix = Matrix::identity();
                state.text_line_matrix = Matrix::identity();
            }
            "ET" => {}
            "TL" => {
                if let Some(leading) = op_f32(op, 0) {
                    state.text_leading = leading;
                }
            }
            "Tc" => {
                if let Some(spacing) = op_f32(op, 0) {
                    state.char_spacing = spacing;
                }
            }
            "Tw" => {
                if let Some(spacing) = op_f32(op, 0) {
                    state.word_spacing = spacing;
                }
            }
            "Tz" => {
                if let Some(percent) = op_f32(op, 0) {
                    state.text_h_scale = (percent / 100.0).max(0.0);
                }
            }
            "Ts" => {
                if let Some(rise) = op_f32(op, 0) {
                    state.text_rise = rise;
                }
            }
            "Tr" => {
                if let Some(mode) = op_i64(op, 0) {
                    state.text_render_mode = mode.clamp(0, 7);
                }
            }
            "Tf" => {
                if let Some(res_name) = op_name(op, 0) {
                    let base = resources
                        .fonts
                        .get(&res_name)
                        .map(|font| font.base_font.clone())
                        .unwrap_or_else(|| res_name.clone());
                    state.font_name = base;
                    state.font_resource = Some(res_name);
                    state.font_size = op_f32(op, 1).unwrap_or(12.0).abs();
                }
            }
            "Td" | "TD" => {
                if let Some([tx, ty]) = op_f32_2(op) {
                    if op.operator == "TD" {
                        state.text_leading = -ty;
                    }
                    state.text_line_matrix =
                        Matrix::translation(tx, ty).then(&state.text_line_matrix);
                    state.text_matrix = state.text_line_matrix;
                }
            }
            "T*" => {
                next_text_line(&mut state);
            }
            "Tm" => {
                if let Some([a, b, c, d, e, f]) = op_f32_6(op) {
                    let tm = Matrix::from_operands(a, b, c, d, e, f);
                    state.text_matrix = tm;
                    state.text_line_matrix = tm;
                }
            }
            "Tj" => {
                show_string(&mut scan, &mut state, &resources, op.operands.first(), op_index, None);
            }
            "'" => {
                next_text_line(&mut state);
                show_string(&mut scan, &mut state, &resources, op.operands.first(), op_index, None);
            }
            "\"" => {
                if let Some(aw) = op_f32(op, 0) {
                    state.word_spacing = aw;
                }
                if let Some(ac) = op_f32(op, 1) {
                    state.char_spacing = ac;
                }
                next_text_line(&mut state);
                show_string(&mut scan, &mut state, &resources, op.operands.get(2), op_index, None);
            }
            "TJ" => {
                if let Some(items) = op.operands.first().and_then(|o| o.as_array().ok()) {
                    for (item_index, item) in items.iter().enumerate() {
                        if item.as_str().is_ok() {
                            show_string(
                                &mut scan,
                                &mut state,
                                &resources,
                                Some(item),
                                op_index,
                                Some(item_index),
                            );
                        } else if let Some(adj) = obj_to_f32(item) {
                            // Thousandths of text space, scaled by size and Th.
                            let tx = -(adj / 1000.0) * state.font_size * state.text_h_scale;
                            advance_text_matrix(&mut state, tx);
                        }
                    }
                }
            }
            "rg" => {
                if let Some([r, g, b]) = op_f32_3(op) {
                    state.fill_color = pack_rgb(r, g, b);
                }
            }
            "g" => {
                if let Some(gray) = op_f32(op, 0) {
                    state.fill_color = pack_rgb(gray, gray, gray);
                }
            }
            "k" => {
                if let Some([c, m, y, k]) = op_f32_4(op) {
                    let (r, g, b) = cmyk_to_rgb(c, m, y, k);
                    state.fill_color = pack_rgb(r, g, b);
                }
            }
            "sc" | "scn" => {
                let values: Vec<f32> = op.operands.iter().filter_map(obj_to_f32).collect();
                match values.len() {
                    1 => state.fill_color = pack_rgb(values[0], values[0], values[0]),
                    3 => state.fill_color = pack_rgb(values[0], values[1], values[2]),
                    4 => {
                        let (r, g, b) = cmyk_to_rgb(values[0], values[1], values[2], values[3]);
                        state.fill_color = pack_rgb(r, g, b);
                    }
                    _ => {}
                }
            }
            "Do" => {
                if let Some(name) = op_name(op, 0) {
                    if let Some(id) = resources.xobjects.get(&name) {
                        record_xobject_placement(doc, *id, &state, height, &mut scan);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(scan)
}

fn next_text_line(state: &mut ParseState) {
    state.text_line_matrix =
        Matrix::translation(0.0, -state.text_leading).then(&state.text_line_matrix);
    state.text_matrix = state.text_line_matrix;
}

fn advance_text_matrix(state: &mut ParseState, tx: f32) {
    state.text_matrix = Matrix::translation(tx, 0.0).then(&state.text_matrix);
}

fn show_string(
    scan: &mut PageScan,
    state: &mut ParseState,
    resources: &PageResources,
    operand: Option<&LoObject>,
    op_index: usize,
    item_index: Option<usize>,
) {
    let font = state
        .font_resource
        .as_ref()
        .and_then(|name| resources.fonts.get(name));
    let Some(text) = decode_text_operand(operand, font) else {
        return;
    };
    let bytes = operand.and_then(|obj| obj.as_str().ok());
    let advance_ts = advance_text_space(bytes, &text, state, font);

    // Invisible render modes still advance the cursor but show nothing.
    let visible = !text.is_empty() && state.text_render_mode != 3 && state.text_render_mode != 7;
    if visible {
        let device = state.text_matrix.then(&state.ctm);
        let (x0, y0) = device.transform(0.0, state.text_rise);
        let (x1, y1) = device.transform(advance_ts * state.text_h_scale, state.text_rise);
        let size = (state.font_size * device.scale_y()).max(0.01);
        let top = scan.page_height - y0.max(y1) - size;
        let bottom = scan.page_height - y0.min(y1) + size * 0.25;
        scan.events.push(TextEvent {
            op_index,
            item_index,
            text,
            rect: Rect::new(x0.min(x1), top, x0.max(x1), bottom),
            size,
            raw_size: state.font_size,
            advance_ts,
            font_name: state.font_name.clone(),
            color: state.fill_color,
        });
    }

    advance_text_matrix(state, advance_ts * state.text_h_scale);
}

/// Text-space advance of a shown string, before horizontal scaling:
/// `sum((w/1000)*size + Tc [+ Tw at spaces])`. Widths come from the font's
/// width table, the embedded font program, or a per-class estimate, in that
/// order of preference.
fn advance_text_space(
    bytes: Option<&[u8]>,
    text: &str,
    state: &ParseState,
    font: Option<&FontResource>,
) -> f32 {
    if let (Some(bytes), Some(font)) = (bytes, font) {
        if !font.metrics.widths.is_empty() || font.metrics.default_width > 0.0 {
            if let Some(codes) = string_codes(bytes, font.metrics.code_encoding) {
                let mut sum = 0.0f32;
                for code in codes {
                    let width = font
                        .metrics
                        .widths
                        .get(&code)
                        .copied()
                        .unwrap_or(font.metrics.default_width)
                        .max(0.0);
                    sum += (width / 1000.0) * state.font_size + state.char_spacing;
                    if code_is_space(font, code) {
                        sum += state.word_spacing;
                    }
                }
                return sum;
            }
        }
    }

    let glyph_advances = embedded_glyph_advances(text, state, font);
    let mut sum = 0.0f32;
    for (idx, ch) in text.chars().enumerate() {
        let advance = glyph_advances
            .as_ref()
            .and_then(|list| list.get(idx).copied())
            .unwrap_or_else(|| estimate_char_units(ch) * state.font_size);
        sum += advance + state.char_spacing;
        if ch == ' ' {
            sum += state.word_spacing;
        }
    }
    sum
}

fn embedded_glyph_advances(
    text: &str,
    state: &ParseState,
    font: Option<&FontResource>,
) -> Option<Vec<f32>> {
    let font_bytes = font.and_then(|f| f.embedded_font.as_ref())?;
    let face = Face::parse(font_bytes, 0).ok()?;
    let upem = face.units_per_em().max(1) as f32;
    let scale = state.font_size / upem;
    Some(
        text.chars()
            .map(|ch| {
                face.glyph_index(ch)
                    .and_then(|gid| face.glyph_hor_advance(gid))
                    .map(|w| w as f32 * scale)
                    .unwrap_or(state.font_size * 0.5)
            })
            .collect(),
    )
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(ch as u32, 0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF) {
        1.0
    } else {
        0.9
    }
}

fn string_codes(bytes: &[u8], encoding: CharCodeEncoding) -> Option<Vec<u16>> {
    match encoding {
        CharCodeEncoding::SingleByte => Some(bytes.iter().map(|b| *b as u16).collect()),
        CharCodeEncoding::TwoByteBigEndian => {
            if bytes.len() < 2 {
                return None;
            }
            Some(
                bytes
                    .chunks_exact(2)
                    .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                    .collect(),
            )
        }
    }
}

fn code_is_space(font: &FontResource, code: u16) -> bool {
    if code == 0x0020 {
        return true;
    }
    font.to_unicode
        .get(&code)
        .map(|mapped| mapped.as_str() == " ")
        .unwrap_or(false)
}

fn decode_text_operand(obj: Option<&LoObject>, font: Option<&FontResource>) -> Option<String> {
    let obj = obj?;
    if let Ok(bytes) = obj.as_str() {
        if let Some(font) = font {
            if !font.to_unicode.is_empty() {
                if let Some(decoded) = decode_with_to_unicode(bytes, &font.to_unicode) {
                    return Some(decoded);
                }
            }
        }
    }
    if let Ok(decoded) = lopdf::decode_text_string(obj) {
        return Some(decoded);
    }
    obj.as_str()
        .ok()
        .map(|bytes| String::from_utf8_lossy(bytes).to_string())
}

fn decode_with_to_unicode(bytes: &[u8], cmap: &HashMap<u16, String>) -> Option<String> {
    if bytes.is_empty() {
        return Some(String::new());
    }
    if bytes.len() % 2 == 0 {
        let mut out = String::new();
        let mut mapped_any = false;
        for chunk in bytes.chunks_exact(2) {
            let code = u16::from_be_bytes([chunk[0], chunk[1]]);
            if let Some(mapped) = cmap.get(&code) {
                out.push_str(mapped);
                mapped_any = true;
            } else if let Some(ch) = char::from_u32(code as u32) {
                out.push(ch);
            } else {
                out.push('?');
            }
        }
        if mapped_any {
            return Some(out);
        }
    }

    let mut out = String::new();
    let mut mapped_any = false;
    for b in bytes {
        let code = *b as u16;
        if let Some(mapped) = cmap.get(&code) {
            out.push_str(mapped);
            mapped_any = true;
        } else if let Some(ch) = char::from_u32(code as u32) {
            out.push(ch);
        }
    }
    if mapped_any {
        return Some(out);
    }
    None
}

fn record_xobject_placement(
    doc: &LoDocument,
    id: ObjectId,
    state: &ParseState,
    page_height: f32,
    scan: &mut PageScan,
) {
    let Ok(stream) = doc.get_object(id).and_then(|obj| obj.as_stream()) else {
        return;
    };
    let subtype = stream
        .dict
        .get(b"Subtype")
        .ok()
        .and_then(|value| value.as_name().ok())
        .map(name_bytes_to_string)
        .unwrap_or_default();

    // Placement of the XObject unit square under the current transform.
    let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
        .map(|(x, y)| state.ctm.transform(x, y));
    let min_x = corners.iter().map(|(x, _)| *x).fold(f32::INFINITY, f32::min);
    let max_x = corners.iter().map(|(x, _)| *x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = corners.iter().map(|(_, y)| *y).fold(f32::INFINITY, f32::min);
    let max_y = corners.iter().map(|(_, y)| *y).fold(f32::NEG_INFINITY, f32::max);
    let rect = Rect::new(min_x, page_height - max_y, max_x, page_height - min_y);

    if subtype == "Image" {
        scan.images.push(rect);
    } else {
        scan.others.push(rect);
    }
}

fn pack_rgb(r: f32, g: f32, b: f32) -> u32 {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
    (to_byte(r) << 16) | (to_byte(g) << 8) | to_byte(b)
}

fn cmyk_to_rgb(c: f32, m: f32, y: f32, k: f32) -> (f32, f32, f32) {
    let c = c.clamp(0.0, 1.0);
    let m = m.clamp(0.0, 1.0);
    let y = y.clamp(0.0, 1.0);
    let k = k.clamp(0.0, 1.0);
    ((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k))
}

// ---- operand helpers ----

fn op_name(op: &lopdf::content::Operation, idx: usize) -> Option<String> {
    op.operands
        .get(idx)
        .and_then(|obj| obj.as_name().ok())
        .map(name_bytes_to_string)
}

fn op_f32(op: &lopdf::content::Operation, idx: usize) -> Option<f32> {
    op.operands.get(idx).and_then(obj_to_f32)
}

fn op_i64(op: &lopdf::content::Operation, idx: usize) -> Option<i64> {
    op.operands.get(idx)?.as_i64().ok()
}

fn op_f32_2(op: &lopdf::content::Operation) -> Option<[f32; 2]> {
    Some([op_f32(op, 0)?, op_f32(op, 1)?])
}

fn op_f32_3(op: &lopdf::content::Operation) -> Option<[f32; 3]> {
    Some([op_f32(op, 0)?, op_f32(op, 1)?, op_f32(op, 2)?])
}

fn op_f32_4(op: &lopdf::content::Operation) -> Option<[f32; 4]> {
    Some([op_f32(op, 0)?, op_f32(op, 1)?, op_f32(op, 2)?, op_f32(op, 3)?])
}

fn op_f32_6(op: &lopdf::content::Operation) -> Option<[f32; 6]> {
    Some([
        op_f32(op, 0)?,
        op_f32(op, 1)?,
        op_f32(op, 2)?,
        op_f32(op, 3)?,
        op_f32(op, 4)?,
        op_f32(op, 5)?,
    ])
}

// ---- snapshot assembly ----

/// Builds the typed block/line/span snapshot for one page: text events are
/// merged into spans, spans into baseline lines, lines into blocks; image
/// and form placements become their own blocks.
pub(super) fn extract_page_blocks(doc: &LoDocument, page_id: ObjectId) -> Result<Vec<Block>> {
    let scan = scan_page(doc, page_id)?;
    let mut blocks = assemble_text_blocks(&scan.events);
    for rect in &scan.images {
        blocks.push(Block {
            kind: BlockKind::Image,
            bbox: *rect,
            lines: Vec::new(),
        });
    }
    for rect in &scan.others {
        blocks.push(Block {
            kind: BlockKind::Other,
            bbox: *rect,
            lines: Vec::new(),
        });
    }
    Ok(blocks)
}

fn assemble_text_blocks(events: &[TextEvent]) -> Vec<Block> {
    let mut lines: Vec<Line> = Vec::new();
    let mut current: Vec<Span> = Vec::new();
    let mut baseline = f32::NEG_INFINITY;

    for event in events {
        let span_baseline = event.rect.y1 - event.size * 0.25;
        let same_line = !current.is_empty() && (span_baseline - baseline).abs() < event.size * 0.5;
        if !same_line {
            if !current.is_empty() {
                lines.push(line_from_spans(std::mem::take(&mut current)));
            }
            baseline = span_baseline;
        }
        push_span(&mut current, event);
    }
    if !current.is_empty() {
        lines.push(line_from_spans(current));
    }

    group_lines_into_blocks(lines)
}

/// Merges an event into the current line, extending the previous span when
/// it continues the same run (same style, negligible gap — `TJ` kerning).
fn push_span(spans: &mut Vec<Span>, event: &TextEvent) {
    if let Some(last) = spans.last_mut() {
        let gap = event.rect.x0 - last.bbox.x1;
        let same_style = last.font_name == event.font_name
            && last.color == event.color
            && (last.font_size - event.size).abs() < 0.1;
        if same_style && gap.abs() <= event.size * 0.25 {
            last.text.push_str(&event.text);
            last.bbox = last.bbox.union(&event.rect);
            return;
        }
    }
    spans.push(Span {
        text: event.text.clone(),
        bbox: event.rect,
        font_size: event.size,
        font_name: event.font_name.clone(),
        color: event.color,
        flags: 0,
    });
}

fn line_from_spans(spans: Vec<Span>) -> Line {
    let bbox = spans
        .iter()
        .skip(1)
        .fold(spans[0].bbox, |acc, span| acc.union(&span.bbox));
    Line { bbox, spans }
}

fn group_lines_into_blocks(lines: Vec<Line>) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for line in lines {
        let start_new = match blocks.last() {
            Some(block) => {
                let prev = block.lines.last().map(|l| l.bbox).unwrap_or(block.bbox);
                let gap = line.bbox.y0 - prev.y1;
                gap > prev.height().max(line.bbox.height()) * 1.5
            }
            None => true,
        };
        if start_new {
            blocks.push(Block {
                kind: BlockKind::Text,
                bbox: line.bbox,
                lines: vec![line],
            });
        } else if let Some(block) = blocks.last_mut() {
            block.bbox = block.bbox.union(&line.bbox);
            block.lines.push(line);
        }
    }
    blocks
}
