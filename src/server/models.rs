use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct UrlRequest {
    pub(crate) url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UrlResponse {
    pub(crate) success: bool,
    /// Base64 of the converted document.
    pub(crate) pdf: String,
    pub(crate) size: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: &'static str,
    pub(crate) dependencies: Vec<DependencyStatus>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DependencyStatus {
    pub(crate) name: &'static str,
    pub(crate) available: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
