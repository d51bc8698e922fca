use anyhow::{anyhow, Context, Result};

use super::{TranslateFuture, TranslateProvider};

const DEFAULT_BASE_URL: &str = "https://translate.googleapis.com";

/// Client for the public Google translate endpoint (the `gtx` surface).
/// One HTTP call per fragment, no retry.
#[derive(Debug, Clone)]
pub struct GoogleTranslate {
    client: Option<reqwest::Client>,
    base_url: String,
    source: String,
    target: String,
}

impl GoogleTranslate {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder().build().ok(),
            base_url: base_url(),
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        self
    }
}

fn base_url() -> String {
    std::env::var("TRANSLATE_BASE_URL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

impl TranslateProvider for GoogleTranslate {
    fn name(&self) -> &'static str {
        "google-translate"
    }

    fn is_available(&self) -> bool {
        self.client.is_some()
    }

    fn translate<'a>(&'a self, text: &'a str) -> TranslateFuture<'a> {
        Box::pin(async move {
            let client = self
                .client
                .as_ref()
                .ok_or_else(|| anyhow!("translation client not initialised"))?;
            let url = format!("{}/translate_a/single", self.base_url);
            let response = client
                .get(&url)
                .query(&[
                    ("client", "gtx"),
                    ("dt", "t"),
                    ("sl", self.source.as_str()),
                    ("tl", self.target.as_str()),
                    ("q", text),
                ])
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(anyhow!(
                    "translation endpoint error ({}): {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ));
            }
            parse_gtx_body(&body)
        })
    }
}

/// The gtx surface answers a nested array: element 0 holds the segments,
/// each segment's element 0 is a translated chunk.
fn parse_gtx_body(body: &str) -> Result<String> {
    let value: serde_json::Value =
        serde_json::from_str(body).with_context(|| "failed to parse translation response JSON")?;
    let segments = value
        .get(0)
        .and_then(|item| item.as_array())
        .ok_or_else(|| anyhow!("no segments in translation response"))?;

    let mut out = String::new();
    for segment in segments {
        if let Some(chunk) = segment.get(0).and_then(|item| item.as_str()) {
            out.push_str(chunk);
        }
    }
    if out.trim().is_empty() {
        return Err(anyhow!("empty translation result"));
    }
    Ok(out)
}
