use std::collections::HashMap;
use tracing::debug;

use super::TranslateProvider;

/// Per-conversion fragment cache. Scope is one document; never persisted.
#[derive(Debug, Default)]
pub struct TranslationCache {
    map: HashMap<String, String>,
    lookups: u64,
    misses: u64,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the translation for `text`, calling the provider at most once
    /// per distinct fragment. Any provider failure or empty result falls open
    /// to the original text, and that outcome is cached too so the provider
    /// is never asked twice for the same fragment.
    pub async fn get_or_translate(&mut self, text: &str, provider: &dyn TranslateProvider) -> String {
        self.lookups += 1;
        if let Some(existing) = self.map.get(text) {
            return existing.clone();
        }

        self.misses += 1;
        let translated = match provider.translate(text).await {
            Ok(out) if !out.trim().is_empty() => out,
            Ok(_) => text.to_string(),
            Err(err) => {
                debug!("translation failed, keeping original text: {err:#}");
                text.to_string()
            }
        };
        self.map.insert(text.to_string(), translated.clone());
        translated
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn log_summary(&self) {
        debug!(
            entries = self.map.len(),
            lookups = self.lookups,
            misses = self.misses,
            "translation cache summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::tests_support::FakeProvider;

    #[tokio::test]
    async fn repeated_fragment_calls_provider_once() {
        let provider = FakeProvider::translating(|_| "Hello".to_string());
        let mut cache = TranslationCache::new();
        for _ in 0..5 {
            let out = cache.get_or_translate("你好", &provider).await;
            assert_eq!(out, "Hello");
        }
        assert_eq!(provider.call_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failure_falls_open_to_original_and_is_cached() {
        let provider = FakeProvider::failing();
        let mut cache = TranslationCache::new();
        assert_eq!(cache.get_or_translate("你好", &provider).await, "你好");
        assert_eq!(cache.get_or_translate("你好", &provider).await, "你好");
        // The failed outcome is cached: no second attempt.
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn distinct_fragments_translate_separately() {
        let provider = FakeProvider::translating(|text| format!("<{text}>"));
        let mut cache = TranslationCache::new();
        assert_eq!(cache.get_or_translate("甲", &provider).await, "<甲>");
        assert_eq!(cache.get_or_translate("乙", &provider).await, "<乙>");
        assert_eq!(provider.call_count(), 2);
        assert_eq!(cache.len(), 2);
    }
}
