use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, HeaderMap, HeaderName},
    response::Response,
};
use url::Url;

use crate::error::ApiError;

/// Request bodies forwarded to the dev server are buffered up to this size
const MAX_PROXY_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Dropping `Upgrade`/`Connection` means websocket upgrades are not forwarded:
/// Vite's HMR socket has to reach the dev server port directly.
const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::PROXY_AUTHORIZATION,
];

/// Forwards non-API requests to the frontend dev server.
///
/// Plain HTTP only. Upgrade requests reach the dev server as ordinary
/// requests without their upgrade headers.
#[derive(Clone)]
pub struct DevServerProxy {
    client: reqwest::Client,
    base: Url,
}

impl DevServerProxy {
    pub fn new(dev_server_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(dev_server_url)
            .map_err(|e| ApiError::internal_server_error(format!("invalid dev server url: {}", e)))?;

        // Pass encoded bodies through untouched
        let client = reqwest::Client::builder()
            .no_gzip()
            .build()
            .map_err(|e| ApiError::internal_server_error(format!("failed to build proxy client: {}", e)))?;

        Ok(Self { client, base })
    }

    pub fn target(&self, path_and_query: &str) -> Result<Url, ApiError> {
        self.base
            .join(path_and_query.trim_start_matches('/'))
            .map_err(|e| ApiError::bad_request(format!("invalid request path: {}", e)))
    }

    pub async fn forward(&self, request: Request) -> Result<Response, ApiError> {
        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let target = self.target(&path_and_query)?;

        let (parts, body) = request.into_parts();
        let body = to_bytes(body, MAX_PROXY_BODY_BYTES)
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read request body: {}", e)))?;

        let upstream = self
            .client
            .request(parts.method, target.clone())
            .headers(forwardable(&parts.headers, true))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Dev server request to {} failed: {}", target, e);
                ApiError::bad_gateway("Frontend dev server is not reachable")
            })?;

        let mut response = Response::builder().status(upstream.status());
        if let Some(headers) = response.headers_mut() {
            headers.extend(forwardable(upstream.headers(), false));
        }

        response
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|e| ApiError::internal_server_error(format!("failed to build proxy response: {}", e)))
    }
}

/// Copy end-to-end headers, dropping hop-by-hop ones (and `Host` on requests)
fn forwardable(headers: &HeaderMap, is_request: bool) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP.contains(*name))
        .filter(|(name, _)| !(is_request && **name == header::HOST))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
