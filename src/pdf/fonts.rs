use anyhow::{anyhow, Result};
use lopdf::{Dictionary as LoDictionary, Document as LoDocument, Object as LoObject};
use std::collections::HashMap;
use std::sync::Arc;

/// How character codes map onto the width table of a font.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum CharCodeEncoding {
    #[default]
    SingleByte,
    TwoByteBigEndian,
}

#[derive(Debug, Clone, Default)]
pub(super) struct FontWidths {
    pub(super) default_width: f32,
    pub(super) widths: HashMap<u16, f32>,
    pub(super) code_encoding: CharCodeEncoding,
}

#[derive(Debug, Clone)]
pub(super) struct FontResource {
    pub(super) base_font: String,
    pub(super) to_unicode: HashMap<u16, String>,
    pub(super) embedded_font: Option<Arc<Vec<u8>>>,
    pub(super) metrics: FontWidths,
}

impl Default for FontResource {
    fn default() -> Self {
        Self {
            base_font: "Helvetica".to_string(),
            to_unicode: HashMap::new(),
            embedded_font: None,
            metrics: FontWidths::default(),
        }
    }
}

pub(super) fn resolve_font_resource(doc: &LoDocument, obj: &LoObject) -> FontResource {
    let Ok(resolved) = resolve_object(doc, obj) else {
        return FontResource::default();
    };
    let dict = match resolved {
        LoObject::Dictionary(d) => d,
        _ => return FontResource::default(),
    };
    let base_font = dict
        .get(b"BaseFont")
        .ok()
        .and_then(|value| value.as_name().ok())
        .map(name_bytes_to_string)
        .map(|name| strip_subset_prefix(&name))
        .unwrap_or_else(|| "Helvetica".to_string());
    let to_unicode = parse_to_unicode_cmap(doc, dict);
    let embedded_font = resolve_embedded_font_bytes(doc, dict).map(Arc::new);
    let metrics = parse_font_widths(doc, dict, &to_unicode);
    FontResource {
        base_font,
        to_unicode,
        embedded_font,
        metrics,
    }
}

fn parse_font_widths(
    doc: &LoDocument,
    font_dict: &LoDictionary,
    to_unicode: &HashMap<u16, String>,
) -> FontWidths {
    let subtype = font_dict
        .get(b"Subtype")
        .ok()
        .and_then(|value| value.as_name().ok())
        .map(name_bytes_to_string)
        .unwrap_or_default();
    if subtype == "Type0" {
        parse_type0_widths(doc, font_dict, to_unicode)
    } else {
        parse_simple_widths(doc, font_dict)
    }
}

fn parse_type0_widths(
    doc: &LoDocument,
    font_dict: &LoDictionary,
    to_unicode: &HashMap<u16, String>,
) -> FontWidths {
    let encoding_name = font_dict
        .get(b"Encoding")
        .ok()
        .and_then(|value| resolve_object(doc, value).ok())
        .and_then(|value| value.as_name().ok())
        .map(name_bytes_to_string)
        .unwrap_or_default();
    let code_encoding = if encoding_name == "Identity-H"
        || encoding_name == "Identity-V"
        || to_unicode.keys().any(|code| *code > 0x00FF)
    {
        CharCodeEncoding::TwoByteBigEndian
    } else {
        CharCodeEncoding::SingleByte
    };

    let mut default_width = 1000.0f32;
    let mut widths = HashMap::new();
    if let Some(descendant) = font_dict
        .get(b"DescendantFonts")
        .ok()
        .and_then(|value| resolve_object(doc, value).ok())
        .and_then(|value| value.as_array().ok())
        .and_then(|arr| arr.first())
        .and_then(|value| resolve_object(doc, value).ok())
        .and_then(|value| value.as_dict().ok())
    {
        if let Some(dw) = descendant
            .get(b"DW")
            .ok()
            .and_then(|value| resolved_obj_to_f32(doc, value))
        {
            default_width = dw.max(0.0);
        }
        if let Ok(w_obj) = descendant.get(b"W") {
            widths = parse_cid_widths(doc, w_obj);
        }
    }

    FontWidths {
        default_width,
        widths,
        code_encoding,
    }
}

fn parse_simple_widths(doc: &LoDocument, font_dict: &LoDictionary) -> FontWidths {
    let mut default_width = 500.0f32;
    if let Some(descriptor) = font_dict
        .get(b"FontDescriptor")
        .ok()
        .and_then(|value| resolve_object(doc, value).ok())
        .and_then(|value| value.as_dict().ok())
    {
        if let Some(missing) = descriptor
            .get(b"MissingWidth")
            .ok()
            .and_then(|value| resolved_obj_to_f32(doc, value))
        {
            default_width = missing.max(0.0);
        }
    }

    let first_char = font_dict
        .get(b"FirstChar")
        .ok()
        .and_then(|value| resolved_obj_to_u16(doc, value))
        .unwrap_or(0u16);
    let mut widths = HashMap::new();
    if let Some(width_arr) = font_dict
        .get(b"Widths")
        .ok()
        .and_then(|value| resolve_object(doc, value).ok())
        .and_then(|value| value.as_array().ok())
    {
        for (idx, width_obj) in width_arr.iter().enumerate() {
            let Some(width) = resolved_obj_to_f32(doc, width_obj) else {
                continue;
            };
            let Ok(offset) = u16::try_from(idx) else {
                break;
            };
            let Some(code) = first_char.checked_add(offset) else {
                break;
            };
            widths.insert(code, width.max(0.0));
        }
    }

    FontWidths {
        default_width,
        widths,
        code_encoding: CharCodeEncoding::SingleByte,
    }
}

/// CID `W` arrays interleave two forms: `c [w w …]` and `c1 c2 w`.
fn parse_cid_widths(doc: &LoDocument, obj: &LoObject) -> HashMap<u16, f32> {
    let mut out = HashMap::new();
    let Some(items) = resolve_object(doc, obj)
        .ok()
        .and_then(|value| value.as_array().ok())
    else {
        return out;
    };

    let mut idx = 0usize;
    while idx < items.len() {
        let Some(start) = resolved_obj_to_u16(doc, &items[idx]) else {
            idx += 1;
            continue;
        };
        if idx + 1 >= items.len() {
            break;
        }
        let next = match resolve_object(doc, &items[idx + 1]) {
            Ok(value) => value,
            Err(_) => {
                idx += 1;
                continue;
            }
        };

        if let Ok(list) = next.as_array() {
            for (offset, width_obj) in list.iter().enumerate() {
                let Some(width) = resolved_obj_to_f32(doc, width_obj) else {
                    continue;
                };
                let Ok(step) = u16::try_from(offset) else {
                    break;
                };
                let Some(code) = start.checked_add(step) else {
                    break;
                };
                out.insert(code, width.max(0.0));
            }
            idx += 2;
            continue;
        }

        let Some(end) = resolved_obj_to_u16(doc, &items[idx + 1]) else {
            idx += 1;
            continue;
        };
        let Some(width) = items.get(idx + 2).and_then(|o| resolved_obj_to_f32(doc, o)) else {
            break;
        };
        for code in start..=end {
            out.insert(code, width.max(0.0));
            if code == u16::MAX {
                break;
            }
        }
        idx += 3;
    }
    out
}

fn resolve_embedded_font_bytes(doc: &LoDocument, font_dict: &LoDictionary) -> Option<Vec<u8>> {
    let descriptor = font_dict
        .get(b"FontDescriptor")
        .ok()
        .or_else(|| {
            // Type0 fonts keep the descriptor on the descendant font.
            font_dict
                .get(b"DescendantFonts")
                .ok()
                .and_then(|value| resolve_object(doc, value).ok())
                .and_then(|value| value.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|value| resolve_object(doc, value).ok())
                .and_then(|value| value.as_dict().ok())
                .and_then(|dict| dict.get(b"FontDescriptor").ok())
        })
        .and_then(|value| resolve_object(doc, value).ok())
        .and_then(|value| value.as_dict().ok())?;

    for key in [b"FontFile2".as_slice(), b"FontFile3".as_slice(), b"FontFile".as_slice()] {
        if let Some(stream) = descriptor
            .get(key)
            .ok()
            .and_then(|value| resolve_object(doc, value).ok())
            .and_then(|value| value.as_stream().ok())
        {
            if let Ok(data) = stream.get_plain_content() {
                return Some(data);
            }
        }
    }
    None
}

pub(super) fn parse_to_unicode_cmap(
    doc: &LoDocument,
    font_dict: &LoDictionary,
) -> HashMap<u16, String> {
    let mut map = HashMap::new();
    let Some(stream) = font_dict
        .get(b"ToUnicode")
        .ok()
        .and_then(|value| resolve_object(doc, value).ok())
        .and_then(|value| value.as_stream().ok())
    else {
        return map;
    };
    let Ok(bytes) = stream.get_plain_content() else {
        return map;
    };
    let text = String::from_utf8_lossy(&bytes);

    let mut in_bfchar = false;
    let mut in_bfrange = false;
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if line.ends_with("beginbfchar") {
            in_bfchar = true;
            in_bfrange = false;
            continue;
        }
        if line.ends_with("endbfchar") {
            in_bfchar = false;
            continue;
        }
        if line.ends_with("beginbfrange") {
            in_bfrange = true;
            in_bfchar = false;
            continue;
        }
        if line.ends_with("endbfrange") {
            in_bfrange = false;
            continue;
        }
        if in_bfchar {
            let tokens = extract_hex_tokens(line);
            if tokens.len() >= 2 {
                if let Some(src) = hex_bytes_to_u16(&tokens[0]) {
                    map.insert(src, hex_bytes_to_unicode(&tokens[1]));
                }
            }
            continue;
        }
        if in_bfrange {
            let tokens = extract_hex_tokens(line);
            if tokens.len() < 3 {
                continue;
            }
            let (Some(start), Some(end)) =
                (hex_bytes_to_u16(&tokens[0]), hex_bytes_to_u16(&tokens[1]))
            else {
                continue;
            };
            if start > end {
                continue;
            }
            if line.contains('[') {
                for (idx, token) in tokens.iter().skip(2).enumerate() {
                    let code = start.saturating_add(idx as u16);
                    if code > end {
                        break;
                    }
                    map.insert(code, hex_bytes_to_unicode(token));
                }
            } else if let Some(base) = hex_bytes_to_u16(&tokens[2]) {
                for code in start..=end {
                    let dst = base.saturating_add(code.saturating_sub(start));
                    if let Some(ch) = char::from_u32(dst as u32) {
                        map.insert(code, ch.to_string());
                    }
                }
            }
        }
    }
    map
}

fn extract_hex_tokens(line: &str) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let bytes = line.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i] != b'>' {
                i += 1;
            }
            if let Some(decoded) = parse_hex(&line[start..i]) {
                out.push(decoded);
            }
        }
        i += 1;
    }
    out
}

fn parse_hex(token: &str) -> Option<Vec<u8>> {
    let mut nibbles = Vec::new();
    for ch in token.chars() {
        if ch.is_whitespace() {
            continue;
        }
        nibbles.push(ch.to_digit(16)? as u8);
    }
    if nibbles.len() % 2 != 0 {
        nibbles.push(0);
    }
    Some(nibbles.chunks_exact(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
}

fn hex_bytes_to_u16(bytes: &[u8]) -> Option<u16> {
    match bytes.len() {
        1 => Some(bytes[0] as u16),
        2 => Some(u16::from_be_bytes([bytes[0], bytes[1]])),
        _ => None,
    }
}

fn hex_bytes_to_unicode(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    if bytes.len() % 2 == 0 {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).to_string()
}

/// Strips the six-letter subset tag from names like `ABCDEF+SimSun`.
pub(super) fn strip_subset_prefix(name: &str) -> String {
    let trimmed = name.trim().trim_start_matches('/');
    if let Some((prefix, rest)) = trimmed.split_once('+') {
        if prefix.len() == 6 && prefix.chars().all(|c| c.is_ascii_alphabetic()) {
            return rest.to_string();
        }
    }
    trimmed.to_string()
}

// ---- shared low-level object helpers ----

pub(super) fn resolve_object<'a>(doc: &'a LoDocument, mut obj: &'a LoObject) -> Result<&'a LoObject> {
    loop {
        match obj {
            LoObject::Reference(id) => {
                obj = doc
                    .get_object(*id)
                    .map_err(|err| anyhow!("unresolvable object reference: {err}"))?;
            }
            _ => return Ok(obj),
        }
    }
}

pub(super) fn resolve_dict(doc: &LoDocument, obj: &LoObject) -> LoDictionary {
    match resolve_object(doc, obj) {
        Ok(LoObject::Dictionary(d)) => d.clone(),
        _ => LoDictionary::new(),
    }
}

pub(super) fn name_bytes_to_string(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_string()
}

pub(super) fn obj_to_f32(obj: &LoObject) -> Option<f32> {
    if let Ok(value) = obj.as_float() {
        return Some(value);
    }
    obj.as_i64().ok().map(|value| value as f32)
}

fn resolved_obj_to_f32(doc: &LoDocument, obj: &LoObject) -> Option<f32> {
    resolve_object(doc, obj).ok().and_then(obj_to_f32)
}

fn resolved_obj_to_u16(doc: &LoDocument, obj: &LoObject) -> Option<u16> {
    let resolved = resolve_object(doc, obj).ok()?;
    let value = resolved.as_i64().ok()?;
    u16::try_from(value).ok()
}

// ---- insertion-side encoding and base-14 metrics ----

/// Encodes `text` for a WinAnsi (CP1252) simple font. With `lossy` set,
/// unencodable glyphs become `?`; otherwise they fail the encode.
pub fn encode_win_ansi(text: &str, lossy: bool) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match win_ansi_code(ch) {
            Some(code) => out.push(code),
            None if lossy => out.push(b'?'),
            None => return Err(anyhow!("glyph not encodable in WinAnsi: {ch:?}")),
        }
    }
    Ok(out)
}

fn win_ansi_code(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E => Some(code as u8),
        0xA0..=0xFF => Some(code as u8),
        // The CP1252 0x80..0x9F block, the typography Latin text actually uses.
        0x20AC => Some(0x80),
        0x201A => Some(0x82),
        0x0192 => Some(0x83),
        0x201E => Some(0x84),
        0x2026 => Some(0x85),
        0x2020 => Some(0x86),
        0x2021 => Some(0x87),
        0x02C6 => Some(0x88),
        0x2030 => Some(0x89),
        0x0160 => Some(0x8A),
        0x2039 => Some(0x8B),
        0x0152 => Some(0x8C),
        0x017D => Some(0x8E),
        0x2018 => Some(0x91),
        0x2019 => Some(0x92),
        0x201C => Some(0x93),
        0x201D => Some(0x94),
        0x2022 => Some(0x95),
        0x2013 => Some(0x96),
        0x2014 => Some(0x97),
        0x02DC => Some(0x98),
        0x2122 => Some(0x99),
        0x0161 => Some(0x9A),
        0x203A => Some(0x9B),
        0x0153 => Some(0x9C),
        0x017E => Some(0x9E),
        0x0178 => Some(0x9F),
        _ => None,
    }
}

/// Standard Helvetica AFM advance widths for 0x20..=0x7E, in thousandths
/// of an em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20..
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30..
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40..
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50..
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60..
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70..0x7E
];

/// Advance of one glyph in thousandths of an em when rendered with the
/// base-14 Helvetica. CJK ideographs (which only survive placement through
/// lossy substitution) count a full em; other unknown glyphs get the
/// average lowercase advance.
pub fn helvetica_advance_units(ch: char) -> f32 {
    let code = ch as u32;
    if let Some(idx) = code.checked_sub(0x20) {
        if let Some(width) = HELVETICA_WIDTHS.get(idx as usize) {
            return *width as f32;
        }
    }
    if matches!(code, 0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF) {
        1000.0
    } else {
        556.0
    }
}
