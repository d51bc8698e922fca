use anyhow::Result;
use std::path::Path;

pub mod convert;
pub mod detect;
pub mod logging;
pub mod pdf;
pub mod server;
pub mod settings;
pub mod translate;

pub use convert::{convert, ConvertError};
pub use pdf::LopdfEngine;
pub use translate::GoogleTranslate;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings_path: Option<String>,
}

/// One-shot conversion: PDF bytes in, translated PDF bytes out, with the
/// engine and provider resolved from settings.
pub async fn run(config: Config, input: &[u8]) -> Result<Vec<u8>> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let engine = LopdfEngine::new();
    let provider = build_provider(&settings);
    let output = convert::convert(input, &engine, &provider).await?;
    Ok(output)
}

pub fn build_provider(settings: &settings::Settings) -> GoogleTranslate {
    let provider = GoogleTranslate::new(&settings.source_lang, &settings.target_lang);
    match settings.translate_base_url.as_deref() {
        Some(base_url) => provider.with_base_url(base_url),
        None => provider,
    }
}
