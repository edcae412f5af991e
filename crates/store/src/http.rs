//! `reqwest`-backed [`RemoteStore`].

use std::time::Duration;

use filedeck_protocol::{
    ApiResponse, BatchDeleteRequest, BatchDeleteResponse, CompleteUploadRequest, DeleteRequest,
    FileListing, FileQuery, InitUploadRequest, InitUploadResponse, ObjectDescriptor, PartReceipt,
    RenameRequest, TreeListing, TreeQuery, UploadPartRequest,
};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RemoteStore, StoreError, StoreFuture};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/api";

const UPLOAD_INIT: &str = "/upload_init";
const UPLOAD_PART: &str = "/upload_part";
const UPLOAD_DIRECT: &str = "/upload_direct";
const UPLOAD_COMPLETE: &str = "/upload_complete";
const FILES: &str = "/customer_files";
const FILE_DELETE: &str = "/customer_file_delete";
const FILE_BATCH_DELETE: &str = "/customer_file_batch_delete";
const FILE_RENAME: &str = "/customer_file_rename";

/// Connection settings for [`HttpStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Endpoint prefix, e.g. `https://files.example.com/api`.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// HTTP implementation of [`RemoteStore`].
///
/// Every endpoint answers with an [`ApiResponse`] envelope. Non-2xx statuses
/// map to [`StoreError::Api`], `success: false` to [`StoreError::Rejected`].
pub struct HttpStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpStore {
    /// Builds a store with its own client.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;
        Ok(Self::with_client(http, &config.base_url))
    }

    /// Builds a store around an existing client.
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Sends a request and unwraps the envelope, keeping an absent payload.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>, StoreError> {
        let resp = request.send().await.map_err(map_reqwest)?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await.map_err(map_reqwest)?;
        let envelope: ApiResponse<T> = serde_json::from_slice(&body)?;
        Ok(envelope.into_result()?)
    }

    /// Sends a request whose envelope must carry a payload.
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &'static str,
    ) -> Result<T, StoreError> {
        self.send(request).await?.ok_or(StoreError::MissingData(what))
    }
}

fn map_reqwest(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Http(err)
    }
}

impl RemoteStore for HttpStore {
    fn init_upload(&self, req: &InitUploadRequest) -> StoreFuture<'_, InitUploadResponse> {
        let request = self.http.post(self.url(UPLOAD_INIT)).json(req);
        let filename = req.filename.clone();
        Box::pin(async move {
            debug!(file = %filename, "init upload");
            self.fetch(request, "upload session").await
        })
    }

    fn upload_part(&self, req: &UploadPartRequest, body: Vec<u8>) -> StoreFuture<'_, PartReceipt> {
        let request = self
            .http
            .post(self.url(UPLOAD_PART))
            .query(req)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body);
        Box::pin(async move { self.fetch(request, "part receipt").await })
    }

    fn upload_direct(
        &self,
        transfer_id: &str,
        filename: &str,
        mime_type: &str,
        body: Vec<u8>,
    ) -> StoreFuture<'_, ObjectDescriptor> {
        let transfer_id = transfer_id.to_string();
        let filename = filename.to_string();
        let mime_type = mime_type.to_string();
        Box::pin(async move {
            let part = Part::bytes(body)
                .file_name(filename)
                .mime_str(&mime_type)?;
            let form = Form::new()
                .text("transfer_id", transfer_id)
                .part("file", part);
            let request = self.http.post(self.url(UPLOAD_DIRECT)).multipart(form);
            self.fetch(request, "object descriptor").await
        })
    }

    fn complete_upload(&self, req: &CompleteUploadRequest) -> StoreFuture<'_, ObjectDescriptor> {
        let request = self.http.post(self.url(UPLOAD_COMPLETE)).json(req);
        Box::pin(async move { self.fetch(request, "object descriptor").await })
    }

    fn list_tree(&self, query: &TreeQuery) -> StoreFuture<'_, TreeListing> {
        let request = self
            .http
            .get(self.url(FILES))
            .query(&[("tree", "1")])
            .query(query);
        Box::pin(async move { self.fetch(request, "tree listing").await })
    }

    fn list_files(&self, query: &FileQuery) -> StoreFuture<'_, FileListing> {
        let request = self.http.get(self.url(FILES)).query(query);
        Box::pin(async move { self.fetch(request, "file listing").await })
    }

    fn delete_file(&self, file_id: i64) -> StoreFuture<'_, ()> {
        let request = self
            .http
            .post(self.url(FILE_DELETE))
            .json(&DeleteRequest { file_id });
        Box::pin(async move {
            self.send::<serde_json::Value>(request).await?;
            Ok(())
        })
    }

    fn batch_delete(&self, ids: &[i64]) -> StoreFuture<'_, BatchDeleteResponse> {
        let request = self
            .http
            .post(self.url(FILE_BATCH_DELETE))
            .json(&BatchDeleteRequest { ids: ids.to_vec() });
        let requested = ids.len() as u64;
        Box::pin(async move {
            let resp: Option<BatchDeleteResponse> = self.send(request).await?;
            // Older backends answer without a count.
            Ok(resp
                .filter(|r| r.deleted_count > 0)
                .unwrap_or(BatchDeleteResponse {
                    deleted_count: requested,
                }))
        })
    }

    fn rename(&self, req: &RenameRequest) -> StoreFuture<'_, ()> {
        let request = self.http.post(self.url(FILE_RENAME)).json(req);
        Box::pin(async move {
            self.send::<serde_json::Value>(request).await?;
            Ok(())
        })
    }
}
