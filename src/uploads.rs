// 🖼️ Uploads - image bytes -> stored file ids
//
// The store answers a multipart POST to /api/upload with an array of file
// records; only their ids flow into the item write.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

use crate::entities::ImageRef;
use crate::error::{BffError, BffResult};
use crate::repository::http::upstream_error;
use crate::repository::RecordId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        UploadFile {
            filename: filename.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store every file; an empty batch stores nothing and makes no call
    async fn upload(&self, files: Vec<UploadFile>) -> BffResult<Vec<ImageRef>>;
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Clone)]
pub struct HttpFileStore {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpFileStore {
    pub fn new(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        HttpFileStore {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

/// `[{ id, url }, ..]` -> image refs; entries without an id are dropped
pub fn parse_uploaded(body: &Value) -> Vec<ImageRef> {
    body.as_array()
        .map(|files| {
            files
                .iter()
                .filter_map(|file| {
                    let id = file.get("id").and_then(RecordId::from_value)?;
                    let url = file.get("url").and_then(Value::as_str).map(str::to_string);
                    Some(ImageRef { id, url })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl FileStore for HttpFileStore {
    async fn upload(&self, files: Vec<UploadFile>) -> BffResult<Vec<ImageRef>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let operation = "upload files";
        let count = files.len();

        let mut form = Form::new();
        for file in files {
            let mut part = Part::bytes(file.bytes).file_name(file.filename);
            if let Some(content_type) = &file.content_type {
                part = part.mime_str(content_type).map_err(|e| {
                    BffError::invalid_argument(format!("bad content type {content_type:?}: {e}"))
                })?;
            }
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(format!("{}/api/upload", self.base_url))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BffError::upstream(operation, None, e.to_string()))?;

        if !response.status().is_success() {
            return Err(upstream_error(operation, response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BffError::upstream(operation, None, format!("unreadable body: {e}")))?;

        let stored = parse_uploaded(&body);
        if stored.len() != count {
            return Err(BffError::upstream(
                operation,
                None,
                format!("stored {} of {} files", stored.len(), count),
            ));
        }
        debug!(count, "files uploaded");
        Ok(stored)
    }
}

// ============================================================================
// MEMORY
// ============================================================================

/// Process-local file store: keeps the bytes, hands out sequential ids
#[derive(Default)]
pub struct MemoryFileStore {
    next_id: AtomicU64,
    stored: Mutex<Vec<(RecordId, UploadFile)>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> Vec<(RecordId, UploadFile)> {
        self.stored
            .lock()
            .map(|files| files.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn upload(&self, files: Vec<UploadFile>) -> BffResult<Vec<ImageRef>> {
        let mut stored = self
            .stored
            .lock()
            .map_err(|_| BffError::upstream("upload files", None, "file store lock poisoned"))?;

        let refs = files
            .into_iter()
            .map(|file| {
                let id = RecordId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
                let url = format!("/uploads/{}", file.filename);
                stored.push((id, file));
                ImageRef { id, url: Some(url) }
            })
            .collect();
        Ok(refs)
    }
}

// ============================================================================
// TESTS
// ============================================================================
