use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

mod cache;
mod google;

pub use cache::TranslationCache;
pub use google::GoogleTranslate;

pub type TranslateFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// One fragment in, translated fragment out. Implementations make a single
/// attempt; fail-open recovery happens at the cache seam, not here.
pub trait TranslateProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the provider can serve calls at all. Checked once per
    /// conversion before any page is touched.
    fn is_available(&self) -> bool;

    fn translate<'a>(&'a self, text: &'a str) -> TranslateFuture<'a>;
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::{TranslateFuture, TranslateProvider};
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted provider for pipeline tests: counts calls, translates via a
    /// function, fails, or echoes its input.
    pub(crate) struct FakeProvider {
        calls: AtomicUsize,
        behavior: FakeBehavior,
        available: bool,
    }

    enum FakeBehavior {
        Translate(fn(&str) -> String),
        Fail,
        Echo,
    }

    impl FakeProvider {
        pub(crate) fn translating(f: fn(&str) -> String) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                behavior: FakeBehavior::Translate(f),
                available: true,
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                behavior: FakeBehavior::Fail,
                available: true,
            }
        }

        pub(crate) fn echoing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                behavior: FakeBehavior::Echo,
                available: true,
            }
        }

        pub(crate) fn unavailable() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                behavior: FakeBehavior::Fail,
                available: false,
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TranslateProvider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn translate<'a>(&'a self, text: &'a str) -> TranslateFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                match &self.behavior {
                    FakeBehavior::Translate(f) => Ok(f(text)),
                    FakeBehavior::Fail => Err(anyhow!("provider down")),
                    FakeBehavior::Echo => Ok(text.to_string()),
                }
            })
        }
    }
}
