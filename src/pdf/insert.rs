use anyhow::{anyhow, Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document as LoDocument, Object as LoObject, ObjectId, StringFormat};

use super::extract::page_height;
use super::fonts::encode_win_ansi;
use super::TextInsertion;

/// Resource name under which the insertion font is registered. PDF resource
/// names are page-scoped; the prefix keeps it clear of common generators.
const FONT_RESOURCE_PREFIX: &str = "TrX";

/// Maps a requested font to a base-14 program. Every name resolves — the
/// original pipeline always drew with Helvetica and only the encoding can
/// make an attempt fail.
pub(super) fn resolve_base14(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.contains("times") || lower.contains("serif") {
        "Times-Roman"
    } else if lower.contains("courier") || lower.contains("mono") {
        "Courier"
    } else {
        "Helvetica"
    }
}

/// Draws one string onto the page. The insertion point arrives in top-left
/// page space and is converted to the PDF baseline here, at the last moment.
pub(super) fn insert_text(
    doc: &mut LoDocument,
    page_id: ObjectId,
    insertion: &TextInsertion,
) -> Result<()> {
    let base_font = resolve_base14(&insertion.font_name);
    let encoded = encode_win_ansi(&insertion.text, insertion.lossy)?;
    let height = page_height(doc, page_id);
    let resource_name = ensure_font_resource(doc, page_id, base_font)?;

    let (r, g, b) = insertion.color;
    let y_pdf = height - insertion.y;
    let ops = vec![
        Operation::new("q", vec![]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                LoObject::Name(resource_name.into_bytes()),
                LoObject::Real(insertion.font_size),
            ],
        ),
        Operation::new(
            "rg",
            vec![LoObject::Real(r), LoObject::Real(g), LoObject::Real(b)],
        ),
        Operation::new(
            "Td",
            vec![LoObject::Real(insertion.x), LoObject::Real(y_pdf)],
        ),
        Operation::new(
            "Tj",
            vec![LoObject::String(encoded, StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ];

    let content_bytes = doc
        .get_page_content(page_id)
        .with_context(|| "failed to read page content for insertion")?;
    let mut content = Content::decode(&content_bytes)
        .map_err(|err| anyhow!("failed to decode page content: {err}"))?;
    content.operations.extend(ops);
    let encoded_content = content
        .encode()
        .map_err(|err| anyhow!("failed to encode page content: {err}"))?;
    doc.change_page_content(page_id, encoded_content)
        .map_err(|err| anyhow!("failed to write page content: {err}"))?;
    Ok(())
}

/// Registers `base_font` in the Font resources visible to the page and
/// returns its resource name. Reuses an entry this module added earlier.
/// When resources are inherited from the page tree the font is added to the
/// inherited dictionary — adding a uniquely named entry is harmless there.
fn ensure_font_resource(
    doc: &mut LoDocument,
    page_id: ObjectId,
    base_font: &'static str,
) -> Result<String> {
    let resource_name = format!("{FONT_RESOURCE_PREFIX}{}", short_tag(base_font));

    // Find who owns the Resources dictionary: the page or an ancestor.
    let mut owner = page_id;
    let mut resources_location = None;
    for _ in 0..32 {
        let dict = doc
            .get_dictionary(owner)
            .map_err(|err| anyhow!("missing page dictionary: {err}"))?;
        if let Ok(resources) = dict.get(b"Resources") {
            resources_location = Some(match resources.as_reference() {
                Ok(id) => (None, Some(id)),
                Err(_) => (Some(owner), None),
            });
            break;
        }
        match dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok()) {
            Some(parent) => owner = parent,
            None => break,
        }
    }

    let font_object = dictionary! {
        "Type" => LoObject::Name(b"Font".to_vec()),
        "Subtype" => LoObject::Name(b"Type1".to_vec()),
        "BaseFont" => LoObject::Name(base_font.as_bytes().to_vec()),
        "Encoding" => LoObject::Name(b"WinAnsiEncoding".to_vec()),
    };

    match resources_location {
        // Resources held by reference: edit the referenced dictionary.
        Some((None, Some(resources_id))) => {
            let font_id = doc.add_object(font_object);
            let resources = doc
                .get_object_mut(resources_id)
                .and_then(LoObject::as_dict_mut)
                .map_err(|err| anyhow!("unusable resources dictionary: {err}"))?;
            add_font_entry(resources, &resource_name, font_id)?;
        }
        // Inline Resources on the owner dictionary.
        Some((Some(owner_id), None)) => {
            let font_id = doc.add_object(font_object);
            let owner_dict = doc
                .get_object_mut(owner_id)
                .and_then(LoObject::as_dict_mut)
                .map_err(|err| anyhow!("unusable page dictionary: {err}"))?;
            let resources = owner_dict
                .get_mut(b"Resources")
                .and_then(LoObject::as_dict_mut)
                .map_err(|err| anyhow!("unusable resources dictionary: {err}"))?;
            add_font_entry(resources, &resource_name, font_id)?;
        }
        // No Resources anywhere in the chain: create one on the page.
        _ => {
            let font_id = doc.add_object(font_object);
            let page_dict = doc
                .get_object_mut(page_id)
                .and_then(LoObject::as_dict_mut)
                .map_err(|err| anyhow!("unusable page dictionary: {err}"))?;
            let mut fonts = lopdf::Dictionary::new();
            fonts.set(resource_name.as_str(), LoObject::Reference(font_id));
            let mut resources = lopdf::Dictionary::new();
            resources.set("Font", fonts);
            page_dict.set("Resources", resources);
        }
    }

    Ok(resource_name)
}

fn add_font_entry(
    resources: &mut lopdf::Dictionary,
    resource_name: &str,
    font_id: ObjectId,
) -> Result<()> {
    if !resources.has(b"Font") {
        resources.set("Font", lopdf::Dictionary::new());
    }
    let fonts = resources
        .get_mut(b"Font")
        .and_then(LoObject::as_dict_mut)
        .map_err(|err| anyhow!("unusable font dictionary: {err}"))?;
    if !fonts.has(resource_name.as_bytes()) {
        fonts.set(resource_name, LoObject::Reference(font_id));
    }
    Ok(())
}

fn short_tag(base_font: &str) -> &'static str {
    match base_font {
        "Times-Roman" => "Tm",
        "Courier" => "Co",
        _ => "He",
    }
}
