//! Axum request handlers for the upload API.
//!
//! Handlers extract request data, call the matching [`Orchestrator`]
//! operation, and convert the result to an HTTP response; every validation
//! rule lives in the orchestrator. Errors are mapped to status codes via
//! `error_to_response`.

use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use upload_types::{AbortUploadQuery, ChunkUploadQuery, CompleteUploadRequest, ErrorResponse, StartUploadRequest};

use crate::auth::AuthSettings;
use crate::error::ServerError;
use crate::orchestrator::Orchestrator;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct ServerState {
    pub orchestrator: Arc<Orchestrator>,
    pub auth: Arc<AuthSettings>,
}

/// Maps ServerError to the HTTP status its class carries.
fn error_to_response(e: ServerError) -> Response {
    let status = match &e {
        ServerError::Validation(_) => StatusCode::BAD_REQUEST,
        ServerError::Decompression(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ServerError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServerError::Backend(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Middleware gate for the upload routes: a request without a valid bearer
/// token never reaches the orchestrator.
pub async fn require_bearer(State(state): State<ServerState>, req: Request, next: Next) -> Response {
    let authorization = header_str(req.headers(), "authorization");
    if let Err(e) = state.auth.verify_bearer(authorization) {
        return error_to_response(e);
    }
    next.run(req).await
}

/// POST /auth/token
///
/// Exchanges a static API key for a short-lived upload token.
pub async fn issue_token(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    if let Err(e) = state.auth.check_api_key(header_str(&headers, API_KEY_HEADER)) {
        return error_to_response(e);
    }
    match state.auth.issue_token() {
        Ok(token) => Json(token).into_response(),
        Err(e) => error_to_response(e),
    }
}

/// POST /v1/uploads
pub async fn start_upload(State(state): State<ServerState>, Json(req): Json<StartUploadRequest>) -> Response {
    match state.orchestrator.start_upload(req).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => error_to_response(e),
    }
}

/// POST /v1/uploads/{upload_id}/parts/{chunk_number}
///
/// The chunk body is the raw request body; metadata travels in the query
/// string. `chunk_number` stays a string here so the orchestrator owns the
/// integer/range validation.
pub async fn upload_chunk(
    State(state): State<ServerState>,
    Path((upload_id, chunk_number)): Path<(String, String)>,
    Query(query): Query<ChunkUploadQuery>,
    body: Bytes,
) -> Response {
    match state.orchestrator.upload_chunk(&upload_id, &chunk_number, query, body).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => error_to_response(e),
    }
}

/// POST /v1/uploads/{upload_id}/complete
pub async fn complete_upload(
    State(state): State<ServerState>,
    Path(upload_id): Path<String>,
    Json(req): Json<CompleteUploadRequest>,
) -> Response {
    match state.orchestrator.complete_upload(&upload_id, req).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => error_to_response(e),
    }
}

/// DELETE /v1/uploads/{upload_id}
pub async fn abort_upload(
    State(state): State<ServerState>,
    Path(upload_id): Path<String>,
    Query(query): Query<AbortUploadQuery>,
) -> Response {
    match state.orchestrator.abort_upload(&upload_id, &query.file_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_to_response(e),
    }
}

/// GET /health
///
/// Always 200 with no-cache headers; used by load balancers and monitoring.
pub async fn health_check() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
    );
    headers.insert(axum::http::header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(axum::http::header::EXPIRES, HeaderValue::from_static("0"));

    (StatusCode::OK, headers).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ServerError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ServerError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ServerError::Configuration("x".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(error_to_response(err).status(), status);
        }
    }
}
