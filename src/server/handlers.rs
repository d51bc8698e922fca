use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::convert::convert;
use crate::pdf::{DocumentEngine, LopdfEngine};
use crate::settings;
use crate::translate::TranslateProvider;

use super::download::{fetch_document, has_pdf_signature};
use super::models::{DependencyStatus, ErrorResponse, StatusResponse, UrlRequest, UrlResponse};
use super::state::ServerState;

pub async fn run_server(settings: settings::Settings, addr: String) -> Result<()> {
    let state = Arc::new(ServerState { settings });
    let app = Router::new()
        .route("/", get(status))
        .route("/health", get(health))
        .route("/translate", post(translate_upload))
        .route("/translate-url", post(translate_url))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!(addr = addr.as_str(), "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("Content-Type"),
    );
}

#[derive(Debug)]
struct ServerError {
    status: StatusCode,
    message: String,
}

impl ServerError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    fn into_rejection(self) -> (StatusCode, Json<ErrorResponse>) {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
    }
}

/// Names the two external collaborators and whether they can serve right now.
async fn status(State(state): State<Arc<ServerState>>) -> Json<StatusResponse> {
    let engine = LopdfEngine::new();
    let provider = crate::build_provider(&state.settings);
    Json(StatusResponse {
        status: "ok",
        dependencies: vec![
            DependencyStatus {
                name: engine.name(),
                available: engine.is_available(),
            },
            DependencyStatus {
                name: provider.name(),
                available: provider.is_available(),
            },
        ],
    })
}

/// Upload variant: multipart/form-data with a required `file` field. Answers
/// the converted document directly as an attachment.
async fn translate_upload(
    State(state): State<Arc<ServerState>>,
    multipart: Option<Multipart>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let Some(mut multipart) = multipart else {
        return Err(
            ServerError::bad_request("content type must be multipart/form-data").into_rejection(),
        );
    };

    let mut file_bytes: Option<Vec<u8>> = None;
    loop {
        let field = multipart.next_field().await.map_err(|err| {
            ServerError::bad_request(format!("malformed multipart body: {err}")).into_rejection()
        })?;
        let Some(field) = field else {
            break;
        };
        if field.name() != Some("file") {
            continue;
        }
        let data = field.bytes().await.map_err(|err| {
            ServerError::bad_request(format!("failed to read file field: {err}")).into_rejection()
        })?;
        file_bytes = Some(data.to_vec());
    }

    let bytes = file_bytes
        .ok_or_else(|| ServerError::bad_request("file field is required").into_rejection())?;
    if bytes.is_empty() {
        return Err(ServerError::bad_request("file is empty").into_rejection());
    }

    let converted = run_conversion(&state, &bytes)
        .await
        .map_err(ServerError::into_rejection)?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"translated.pdf\"",
            ),
        ],
        converted,
    ))
}

/// URL variant: JSON `{"url": …}`. The fetched bytes must carry the `%PDF`
/// signature before the conversion engine is ever invoked.
async fn translate_url(
    State(state): State<Arc<ServerState>>,
    body: String,
) -> Result<Json<UrlResponse>, (StatusCode, Json<ErrorResponse>)> {
    if body.trim().is_empty() {
        return Err(ServerError::bad_request("request body is empty").into_rejection());
    }
    let request: UrlRequest = serde_json::from_str(&body).map_err(|err| {
        ServerError::bad_request(format!("invalid JSON body: {err}")).into_rejection()
    })?;
    let url = request
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ServerError::bad_request("url is required").into_rejection())?;

    let bytes = fetch_document(url, state.settings.download_timeout_secs)
        .await
        .map_err(|err| ServerError::internal(format!("{err:#}")).into_rejection())?;
    if !has_pdf_signature(&bytes) {
        return Err(
            ServerError::bad_request("Invalid PDF file (missing %PDF signature)").into_rejection(),
        );
    }

    let converted = run_conversion(&state, &bytes)
        .await
        .map_err(ServerError::into_rejection)?;
    Ok(Json(UrlResponse {
        success: true,
        pdf: BASE64.encode(&converted),
        size: converted.len(),
    }))
}

/// One conversion per request: fresh engine handle, provider, and cache, so
/// concurrent requests never share state.
async fn run_conversion(state: &ServerState, bytes: &[u8]) -> Result<Vec<u8>, ServerError> {
    let engine = LopdfEngine::new();
    let provider = crate::build_provider(&state.settings);
    convert(bytes, &engine, &provider)
        .await
        .map_err(|err| ServerError::internal(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConvertError;

    #[test]
    fn rejections_carry_the_json_error_shape() {
        let (status, Json(body)) = ServerError::bad_request("url is required").into_rejection();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"error":"url is required"}"#
        );
    }

    #[test]
    fn dependency_failures_map_to_internal_errors() {
        let err = ConvertError::DependencyUnavailable("translation provider");
        let rejection = ServerError::internal(err.to_string()).into_rejection();
        assert_eq!(rejection.0, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(rejection.1 .0.error.contains("translation provider"));
    }

    #[test]
    fn url_request_tolerates_missing_field() {
        let parsed: UrlRequest = serde_json::from_str("{}").unwrap();
        assert!(parsed.url.is_none());
        let parsed: UrlRequest =
            serde_json::from_str(r#"{"url": "https://example.com/catalogue.pdf"}"#).unwrap();
        assert_eq!(parsed.url.as_deref(), Some("https://example.com/catalogue.pdf"));
    }
}
