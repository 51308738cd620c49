use bytes::Bytes;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware};
use serde::de::DeserializeOwned;
use tracing::debug;
use upload_types::{
    AbortUploadQuery, ChunkUploadQuery, ChunkUploadResponse, CompleteUploadRequest, CompleteUploadResponse,
    ErrorResponse, StartUploadRequest, StartUploadResponse,
};

use crate::auth::{AuthConfig, AuthMiddleware};
use crate::error::{Result, UploadClientError};
use crate::service::UploadService;

/// HTTP transport to the upload server. When auth is configured, every
/// request carries a bearer token injected (and refreshed) by the
/// middleware.
pub struct HttpUploadService {
    client: ClientWithMiddleware,
    endpoint: String,
}

impl HttpUploadService {
    pub fn new(endpoint: &str, auth: Option<AuthConfig>) -> Result<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_owned();
        let auth_middleware = auth.as_ref().map(|cfg| AuthMiddleware::new(&endpoint, cfg));
        if auth_middleware.is_none() {
            debug!("upload service auth disabled");
        }

        let reqwest_client = reqwest::Client::builder().build()?;
        let client = ClientBuilder::new(reqwest_client).maybe_with(auth_middleware).build();
        Ok(Self { client, endpoint })
    }
}

/// Helper trait to allow the reqwest_middleware client to optionally add a middleware.
trait OptionalMiddleware {
    fn maybe_with<M: Middleware>(self, middleware: Option<M>) -> Self;
}

impl OptionalMiddleware for ClientBuilder {
    fn maybe_with<M: Middleware>(self, middleware: Option<M>) -> Self {
        match middleware {
            Some(m) => self.with(m),
            None => self,
        }
    }
}

/// Turns a non-2xx response into an ApiError carrying the server's error
/// body, so the scheduler can tell validation rejections from transient
/// faults by status.
async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let message = response
        .json::<ErrorResponse>()
        .await
        .map(|e| e.error)
        .unwrap_or_else(|_| format!("HTTP error {status}"));
    Err(UploadClientError::ApiError {
        status: status.as_u16(),
        message,
    })
}

#[async_trait::async_trait]
impl UploadService for HttpUploadService {
    async fn start_upload(&self, req: StartUploadRequest) -> Result<StartUploadResponse> {
        let response = self.client.post(format!("{}/v1/uploads", self.endpoint)).json(&req).send().await?;
        parse_response(response).await
    }

    async fn upload_chunk(
        &self,
        upload_id: &str,
        chunk_number: u32,
        query: ChunkUploadQuery,
        body: Bytes,
    ) -> Result<ChunkUploadResponse> {
        let url = format!("{}/v1/uploads/{upload_id}/parts/{chunk_number}", self.endpoint);
        let response = self.client.post(url).query(&query).body(body).send().await?;
        parse_response(response).await
    }

    async fn complete_upload(&self, upload_id: &str, req: CompleteUploadRequest) -> Result<CompleteUploadResponse> {
        let url = format!("{}/v1/uploads/{upload_id}/complete", self.endpoint);
        let response = self.client.post(url).json(&req).send().await?;
        parse_response(response).await
    }

    async fn abort_upload(&self, upload_id: &str, file_id: &str) -> Result<()> {
        let url = format!("{}/v1/uploads/{upload_id}", self.endpoint);
        let query = AbortUploadQuery {
            file_id: file_id.to_owned(),
        };
        let response = self.client.delete(url).query(&query).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("HTTP error {status}"));
        Err(UploadClientError::ApiError {
            status: status.as_u16(),
            message,
        })
    }
}
