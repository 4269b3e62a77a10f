//! Presigned upload flow.
//!
//! Uploads go to object storage directly, never through the API server:
//! request a presigned URL, `PUT` the raw bytes against it, then
//! confirm the key so the server can verify size and etag.

use serde::Deserialize;

use linework_core::types::Timestamp;

/// Hard cap on upload size, matching the server's validation.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Content types the sketch pipeline accepts as input.
pub const ALLOWED_CONTENT_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Errors from the upload layer.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server or object store returned a non-2xx status code.
    #[error("upload API error ({status}): {body}")]
    Api {
        status: u16,
        body: String,
    },

    /// The file exceeds [`MAX_UPLOAD_BYTES`].
    #[error("file is {size} bytes; the limit is {max}")]
    TooLarge { size: usize, max: usize },

    /// The content type is not in [`ALLOWED_CONTENT_TYPES`].
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),

    /// The configured base URL could not be parsed.
    #[error("invalid upload URL: {0}")]
    InvalidUrl(String),
}

/// Response from `POST /upload/presigned-url`.
#[derive(Debug, Clone, Deserialize)]
pub struct PresignedUrl {
    /// Time-limited target for the direct `PUT`.
    pub presigned_url: String,
    /// Object key to confirm and to reference as `input_key`.
    pub key: String,
    /// Public URL of the object once uploaded.
    pub file_url: String,
    /// Seconds until the presigned URL expires.
    pub expires_in: u64,
}

/// Response from `POST /upload/confirm`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfirmation {
    pub success: bool,
    pub message: String,
    pub file_info: FileInfo,
}

/// Object metadata reported by the confirmation step.
#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    pub key: String,
    pub size: u64,
    pub etag: String,
    pub last_modified: Timestamp,
    pub content_type: String,
}

/// Response from `GET /upload/download-url/{key}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadUrl {
    pub download_url: String,
    pub key: String,
    pub expires_in: u64,
}

/// Milestones reported by [`UploadClient::upload_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStep {
    /// About to request the presigned URL.
    Started,
    /// Presigned URL issued; the `PUT` is next.
    UrlIssued,
    /// Bytes are on the object store; confirmation is next.
    Transferred,
    /// Confirmation received.
    Confirmed,
}

impl UploadStep {
    /// Rough completion percentage for progress bars.
    pub fn percent(self) -> u8 {
        match self {
            Self::Started => 10,
            Self::UrlIssued => 30,
            Self::Transferred => 80,
            Self::Confirmed => 100,
        }
    }
}

/// HTTP client for the upload endpoints.
#[derive(Clone)]
pub struct UploadClient {
    client: reqwest::Client,
    api_url: String,
    bearer_token: Option<String>,
}

impl UploadClient {
    /// Create a client for an API base URL, e.g. `http://host:8000`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            bearer_token: None,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            bearer_token: None,
        }
    }

    /// Attach a bearer token sent with every API request (not with the
    /// presigned `PUT`, which carries its own authorization).
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Validate size and content type before any network traffic.
    pub fn validate(size: usize, content_type: &str) -> Result<(), UploadError> {
        if size > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge {
                size,
                max: MAX_UPLOAD_BYTES,
            });
        }
        if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
            return Err(UploadError::UnsupportedType(content_type.to_string()));
        }
        Ok(())
    }

    /// Request a presigned upload target for a file.
    pub async fn presigned_url(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<PresignedUrl, UploadError> {
        let response = self
            .api_request(reqwest::Method::POST, "/upload/presigned-url")
            .query(&[("filename", filename), ("content_type", content_type)])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `PUT` the raw bytes against a presigned URL.
    pub async fn put_object(
        &self,
        presigned_url: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), UploadError> {
        let response = self
            .client
            .put(presigned_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Confirm that the object landed under `key`.
    pub async fn confirm(
        &self,
        key: &str,
        etag: Option<&str>,
    ) -> Result<UploadConfirmation, UploadError> {
        let mut params = vec![("key", key)];
        if let Some(etag) = etag {
            params.push(("etag", etag));
        }

        let response = self
            .api_request(reqwest::Method::POST, "/upload/confirm")
            .query(&params)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Issue a time-limited download URL for an uploaded object.
    pub async fn download_url(&self, key: &str) -> Result<DownloadUrl, UploadError> {
        // Keys contain slashes ("uploads/<uuid>.png"); encode them as a
        // single path segment.
        let mut url = reqwest::Url::parse(&self.api_url)
            .map_err(|e| UploadError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| UploadError::InvalidUrl("base URL cannot have segments".to_string()))?
            .extend(["upload", "download-url", key]);

        let mut builder = self.client.get(url);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;

        Self::parse_response(response).await
    }

    /// Complete flow: presigned URL, direct `PUT`, confirmation.
    ///
    /// `on_step` fires at each milestone so callers can render progress.
    pub async fn upload_file(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
        mut on_step: impl FnMut(UploadStep),
    ) -> Result<UploadConfirmation, UploadError> {
        Self::validate(bytes.len(), content_type)?;
        on_step(UploadStep::Started);

        let presigned = self.presigned_url(filename, content_type).await?;
        on_step(UploadStep::UrlIssued);

        self.put_object(&presigned.presigned_url, content_type, bytes)
            .await?;
        on_step(UploadStep::Transferred);

        let confirmation = self.confirm(&presigned.key, None).await?;
        on_step(UploadStep::Confirmed);

        tracing::info!(
            key = %confirmation.file_info.key,
            size = confirmation.file_info.size,
            "Upload confirmed",
        );

        Ok(confirmation)
    }

    // ---- private helpers ----

    fn api_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, format!("{}{path}", self.api_url));
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, UploadError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(UploadError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, UploadError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<(), UploadError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
