use anyhow::{anyhow, Context, Result};
use std::time::Duration;

/// The four bytes every PDF starts with.
const PDF_SIGNATURE: &[u8; 4] = b"%PDF";

/// Fetches the document bytes for the URL variant. The whole request is
/// bounded by one timeout; a slow or unreachable host fails the request
/// rather than hanging the conversion.
pub(crate) async fn fetch_document(url: &str, timeout_secs: u64) -> Result<Vec<u8>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .with_context(|| "failed to build download client")?;
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to download {url}"))?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("download failed with status {status}"));
    }
    let bytes = response
        .bytes()
        .await
        .with_context(|| "failed to read download body")?;
    Ok(bytes.to_vec())
}

pub(crate) fn has_pdf_signature(bytes: &[u8]) -> bool {
    bytes.len() >= PDF_SIGNATURE.len() && &bytes[..PDF_SIGNATURE.len()] == PDF_SIGNATURE
}

#[cfg(test)]
mod tests {
    use super::has_pdf_signature;

    #[test]
    fn signature_gate_accepts_only_pdf_bytes() {
        assert!(has_pdf_signature(b"%PDF-1.7 rest of file"));
        assert!(has_pdf_signature(b"%PDF"));
        assert!(!has_pdf_signature(b"%PD"));
        assert!(!has_pdf_signature(b"<html>not a pdf</html>"));
        assert!(!has_pdf_signature(b""));
    }
}
