//! REST client for the `/sketch` endpoints.
//!
//! Wraps the sketch API (job creation, record retrieval, listing,
//! deletion, task status, available styles) using [`reqwest`]. One-shot
//! calls are not retried here; the bounded retry loop lives in
//! [`poll`](crate::poll).

use serde::{Deserialize, Serialize};

use linework_core::sketch::{Sketch, SketchMethod, SketchStyle, SketchType};
use linework_core::status::SketchStatus;
use linework_core::task::TaskStatus;
use linework_core::types::SketchId;

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// Parameters for `POST /sketch/create`.
///
/// Sent as query parameters; `input_key` is the object key returned by
/// the upload confirmation step.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSketchRequest {
    pub input_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<SketchStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sketch_type: Option<SketchType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<SketchMethod>,
}

impl CreateSketchRequest {
    /// Request with server-side defaults for style, type, and method.
    pub fn new(input_key: impl Into<String>) -> Self {
        Self {
            input_key: input_key.into(),
            style: None,
            sketch_type: None,
            method: None,
        }
    }
}

/// Response from `POST /sketch/create`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSketchResponse {
    pub sketch_id: SketchId,
    /// Identifier of the background task processing this sketch.
    pub task_id: String,
    pub status: SketchStatus,
    pub message: String,
}

/// Optional filters for `GET /sketch/`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListSketchesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_filter: Option<SketchStatus>,
}

/// Response from `DELETE /sketch/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteSketchResponse {
    pub message: String,
}

/// Response from `GET /sketch/styles/available`.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailableStyles {
    pub styles: Vec<String>,
    pub types: Vec<String>,
    pub methods: Vec<String>,
    /// Human-readable description per processing method.
    pub descriptions: MethodDescriptions,
}

/// Descriptions of the processing methods.
#[derive(Debug, Clone, Deserialize)]
pub struct MethodDescriptions {
    pub basic: String,
    pub advanced: String,
    pub artistic: String,
}

/// HTTP client for the sketch API.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    api_url: String,
    bearer_token: Option<String>,
}

impl RestClient {
    /// Create a client for an API base URL, e.g. `http://host:8000`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            bearer_token: None,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across clients).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            bearer_token: None,
        }
    }

    /// Attach a bearer token sent with every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Underlying HTTP client, for sharing its connection pool.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Submit a new sketch conversion job.
    pub async fn create_sketch(
        &self,
        request: &CreateSketchRequest,
    ) -> Result<CreateSketchResponse, RestError> {
        let response = self
            .request(reqwest::Method::POST, "/sketch/create")
            .query(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch one sketch record.
    pub async fn sketch(&self, sketch_id: SketchId) -> Result<Sketch, RestError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/sketch/{sketch_id}"))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// List the caller's sketch records.
    pub async fn list_sketches(
        &self,
        params: &ListSketchesParams,
    ) -> Result<Vec<Sketch>, RestError> {
        let response = self
            .request(reqwest::Method::GET, "/sketch/")
            .query(params)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Delete a sketch record.
    pub async fn delete_sketch(
        &self,
        sketch_id: SketchId,
    ) -> Result<DeleteSketchResponse, RestError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/sketch/{sketch_id}"))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the status of a background task.
    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatus, RestError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/sketch/task/{task_id}"))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Enumerate the styles, types, and methods the server offers.
    pub async fn available_styles(&self) -> Result<AvailableStyles, RestError> {
        let response = self
            .request(reqwest::Method::GET, "/sketch/styles/available")
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, format!("{}{path}", self.api_url));
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`RestError::Api`] containing
    /// the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RestError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RestError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RestError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
