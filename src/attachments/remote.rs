use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use tracing::debug;

use crate::config::RemoteUploadSettings;

use super::{AttachmentRef, AttachmentStore, StorageError, UploadedFile};

/// Remote object storage reached over HTTP.
///
/// Uploads go to an unsigned upload endpoint and the returned secure URL becomes the
/// reference. Reads fetch the URL directly, so remote references stay readable even when no
/// upload endpoint is configured.
#[derive(Clone)]
pub struct RemoteStore {
    http: Client,
    upload: Option<RemoteUploadSettings>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<UploadErrorBody>,
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    message: String,
}

impl RemoteStore {
    pub fn new(http: Client, upload: Option<RemoteUploadSettings>) -> Self {
        Self { http, upload }
    }
}

#[async_trait]
impl AttachmentStore for RemoteStore {
    async fn store(&self, upload: &UploadedFile) -> Result<AttachmentRef, StorageError> {
        let Some(settings) = self.upload.as_ref() else {
            return Err(StorageError::NotConfigured);
        };

        let mut part = Part::bytes(upload.bytes.clone()).file_name(upload.original_name.clone());
        if let Some(content_type) = upload.content_type.as_deref() {
            part = part.mime_str(content_type)?;
        }

        let mut form = Form::new()
            .part("file", part)
            .text("upload_preset", settings.upload_preset.clone());
        if let Some(folder) = &settings.folder {
            form = form.text("folder", folder.clone());
        }

        let response = self
            .http
            .post(&settings.endpoint)
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        let body: UploadResponse = response.json().await?;

        if !status.is_success() {
            let message = body
                .error
                .map(|err| err.message)
                .unwrap_or_else(|| format!("status {status}"));
            return Err(StorageError::Remote(message));
        }

        let url = body
            .secure_url
            .or(body.url)
            .ok_or_else(|| StorageError::Remote("upload response carried no URL".into()))?;

        match AttachmentRef::from_stored(&url) {
            Some(reference @ AttachmentRef::Remote(_)) => Ok(reference),
            _ => Err(StorageError::Remote(format!(
                "upload response URL is not absolute: {url}"
            ))),
        }
    }

    fn resolve_url(&self, reference: &AttachmentRef) -> String {
        reference.as_stored().to_string()
    }

    async fn delete(&self, reference: &AttachmentRef) -> Result<(), StorageError> {
        // No durable object id is kept for remote uploads, so the bytes are left in place.
        debug!(reference = %reference, "remote attachment left in object storage");
        Ok(())
    }

    async fn open_for_read(&self, reference: &AttachmentRef) -> Result<Vec<u8>, StorageError> {
        let AttachmentRef::Remote(url) = reference else {
            return Err(StorageError::InvalidReference(reference.to_string()));
        };

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(url.clone()));
        }
        if !status.is_success() {
            return Err(StorageError::Remote(format!(
                "fetching {url} returned status {status}"
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
