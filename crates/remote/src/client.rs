//! Remote archive protocol contract and its OData-over-HTTP client.

use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::pin::Pin;
use time::OffsetDateTime;
use uuid::Uuid;

/// A boxed stream of downloaded bytes.
pub type RemoteByteStream = Pin<Box<dyn Stream<Item = RemoteResult<Bytes>> + Send>>;

/// Status snapshot of one remote retrieval job.
#[derive(Clone, Debug)]
pub struct RemoteJob {
    pub id: String,
    pub product_uuid: Uuid,
    /// Raw status string in the archive's vocabulary.
    pub status: String,
    pub submitted_at: Option<OffsetDateTime>,
    pub estimated_at: Option<OffsetDateTime>,
    pub message: Option<String>,
}

/// Catalog metadata for a remote product.
#[derive(Clone, Debug)]
pub struct RemoteProductMeta {
    pub uuid: Uuid,
    pub name: String,
    pub content_length: u64,
    pub etag: Option<String>,
}

/// One (possibly partial) download response.
pub struct FetchResponse {
    /// Validator for resumed fetches.
    pub etag: Option<String>,
    pub stream: RemoteByteStream,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("etag", &self.etag)
            .finish_non_exhaustive()
    }
}

/// Contract spoken against an order-based remote archive.
#[async_trait]
pub trait RemoteArchive: Send + Sync + 'static {
    /// Ask the archive to start preparing a product; returns the job the
    /// archive assigned.
    async fn submit_order(&self, uuid: Uuid) -> RemoteResult<RemoteJob>;

    /// All outstanding jobs known to the archive for this client.
    async fn list_jobs(&self) -> RemoteResult<Vec<RemoteJob>>;

    /// Current status of one job.
    async fn job_status(&self, job_id: &str) -> RemoteResult<RemoteJob>;

    /// Catalog metadata, `None` when the archive does not know the product.
    async fn product_meta(&self, uuid: Uuid) -> RemoteResult<Option<RemoteProductMeta>>;

    /// Ranged download starting at `skip`; `etag` (when given) guards the
    /// resumed range against content changes.
    async fn fetch(&self, uuid: Uuid, skip: u64, etag: Option<&str>) -> RemoteResult<FetchResponse>;
}

// OData wire shapes. Field names follow the archive's payloads, not ours.

#[derive(Debug, Deserialize)]
struct ODataJob {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "ProductId")]
    product_id: Uuid,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "SubmissionDate", default, with = "time::serde::rfc3339::option")]
    submission_date: Option<OffsetDateTime>,
    #[serde(rename = "EstimatedDate", default, with = "time::serde::rfc3339::option")]
    estimated_date: Option<OffsetDateTime>,
    #[serde(rename = "StatusMessage", default)]
    status_message: Option<String>,
}

impl From<ODataJob> for RemoteJob {
    fn from(job: ODataJob) -> Self {
        Self {
            id: job.id,
            product_uuid: job.product_id,
            status: job.status,
            submitted_at: job.submission_date,
            estimated_at: job.estimated_date,
            message: job.status_message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ODataJobList {
    value: Vec<ODataJob>,
}

#[derive(Debug, Deserialize)]
struct ODataProduct {
    #[serde(rename = "Id")]
    id: Uuid,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "ContentLength")]
    content_length: u64,
    #[serde(rename = "Checksum", default)]
    _checksum: Option<serde_json::Value>,
}

/// OData client for LTA-style archives.
pub struct ODataArchiveClient {
    http: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl ODataArchiveClient {
    pub fn new(
        base_url: impl Into<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(RemoteError::Http)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username,
            password,
        })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    async fn expect_success(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(RemoteError::Protocol(format!(
                "unexpected status {} from {}",
                response.status(),
                response.url()
            )))
        }
    }
}

#[async_trait]
impl RemoteArchive for ODataArchiveClient {
    async fn submit_order(&self, uuid: Uuid) -> RemoteResult<RemoteJob> {
        let url = format!("{}/Products({})/OData.CSC.Order", self.base_url, uuid);
        let response = self.request(reqwest::Method::POST, url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::ProductNotFound(uuid));
        }
        let response = Self::expect_success(response).await?;
        let job: ODataJob = response.json().await?;
        Ok(job.into())
    }

    async fn list_jobs(&self) -> RemoteResult<Vec<RemoteJob>> {
        let url = format!("{}/Orders", self.base_url);
        let response = self.request(reqwest::Method::GET, url).send().await?;
        let response = Self::expect_success(response).await?;
        let list: ODataJobList = response.json().await?;
        Ok(list.value.into_iter().map(RemoteJob::from).collect())
    }

    async fn job_status(&self, job_id: &str) -> RemoteResult<RemoteJob> {
        let url = format!("{}/Orders('{}')", self.base_url, job_id);
        let response = self.request(reqwest::Method::GET, url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::JobNotFound(job_id.to_string()));
        }
        let response = Self::expect_success(response).await?;
        let job: ODataJob = response.json().await?;
        Ok(job.into())
    }

    async fn product_meta(&self, uuid: Uuid) -> RemoteResult<Option<RemoteProductMeta>> {
        let url = format!("{}/Products({})", self.base_url, uuid);
        let response = self.request(reqwest::Method::GET, url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let response = Self::expect_success(response).await?;
        let product: ODataProduct = response.json().await?;
        Ok(Some(RemoteProductMeta {
            uuid: product.id,
            name: product.name,
            content_length: product.content_length,
            etag,
        }))
    }

    async fn fetch(&self, uuid: Uuid, skip: u64, etag: Option<&str>) -> RemoteResult<FetchResponse> {
        let url = format!("{}/Products({})/$value", self.base_url, uuid);
        let mut builder = self
            .request(reqwest::Method::GET, url)
            .header(reqwest::header::RANGE, format!("bytes={skip}-"));
        if let Some(etag) = etag {
            builder = builder.header(reqwest::header::IF_RANGE, etag);
        }

        let response = builder.send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::ProductNotFound(uuid));
        }
        let response = Self::expect_success(response).await?;

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let stream = response.bytes_stream().map(|r| r.map_err(RemoteError::Http));
        Ok(FetchResponse {
            etag,
            stream: Box::pin(stream),
        })
    }
}
