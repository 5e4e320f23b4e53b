mod error;
mod local;
#[cfg(test)]
pub(crate) mod memory;
mod remote;

use std::{fmt, path::Path, sync::Arc};

use async_trait::async_trait;
use tracing::warn;

use crate::config::StorageBackend;

pub use error::StorageError;
pub use local::LocalStore;
pub use remote::RemoteStore;

/// Reference to stored attachment bytes.
///
/// The backend is decided once, when the reference is produced or first read back from the
/// database; call sites match on the variant instead of sniffing the string again.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentRef {
    /// Bare filename under the uploads root.
    Local(String),
    /// Fully-qualified URL in remote object storage.
    Remote(String),
}

impl AttachmentRef {
    /// Classify a persisted reference. Empty values mean "no attachment".
    pub fn from_stored(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let lowered = trimmed.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            Some(AttachmentRef::Remote(trimmed.to_string()))
        } else {
            Some(AttachmentRef::Local(trimmed.to_string()))
        }
    }

    pub fn from_stored_opt(raw: Option<&str>) -> Option<Self> {
        raw.and_then(Self::from_stored)
    }

    pub fn as_stored(&self) -> &str {
        match self {
            AttachmentRef::Local(name) => name,
            AttachmentRef::Remote(url) => url,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, AttachmentRef::Remote(_))
    }

    /// Last path segment of the reference, without any query string or fragment.
    pub fn base_name(&self) -> String {
        let raw = match self {
            AttachmentRef::Local(name) => name.as_str(),
            AttachmentRef::Remote(url) => {
                let without_query = url.split(['?', '#']).next().unwrap_or(url);
                without_query.rsplit('/').next().unwrap_or(without_query)
            }
        };

        let sanitized = sanitize_filename::sanitize(raw);
        if sanitized.is_empty() {
            "lampiran".to_string()
        } else {
            sanitized
        }
    }

    /// Lowercased extension of [`Self::base_name`], if any.
    pub fn extension(&self) -> Option<String> {
        let base = self.base_name();
        Path::new(&base)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

impl fmt::Display for AttachmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_stored())
    }
}

/// A file received in a multipart request, held in memory until it is stored.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub field_name: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Lowercased, alphanumeric-only extension of the client-supplied filename.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                ext.chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_ascii_lowercase()
            })
            .filter(|ext| !ext.is_empty())
    }
}

/// Save bytes, get back a reference; read, resolve and delete by reference.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn store(&self, upload: &UploadedFile) -> Result<AttachmentRef, StorageError>;

    /// Public URL a browser can load the attachment from.
    fn resolve_url(&self, reference: &AttachmentRef) -> String;

    /// Best-effort removal; an already-missing object is not an error.
    async fn delete(&self, reference: &AttachmentRef) -> Result<(), StorageError>;

    async fn open_for_read(&self, reference: &AttachmentRef) -> Result<Vec<u8>, StorageError>;
}

/// Dispatches every reference to the backend its variant names, and writes new uploads to the
/// configured backend.
pub struct Attachments {
    local: LocalStore,
    remote: RemoteStore,
    write_backend: StorageBackend,
}

impl Attachments {
    pub fn new(local: LocalStore, remote: RemoteStore, write_backend: StorageBackend) -> Self {
        Self {
            local,
            remote,
            write_backend,
        }
    }

    pub fn shared(self) -> Arc<dyn AttachmentStore> {
        Arc::new(self)
    }
}

#[async_trait]
impl AttachmentStore for Attachments {
    async fn store(&self, upload: &UploadedFile) -> Result<AttachmentRef, StorageError> {
        match self.write_backend {
            StorageBackend::Local => self.local.store(upload).await,
            StorageBackend::Remote => self.remote.store(upload).await,
        }
    }

    fn resolve_url(&self, reference: &AttachmentRef) -> String {
        match reference {
            AttachmentRef::Local(_) => self.local.resolve_url(reference),
            AttachmentRef::Remote(_) => self.remote.resolve_url(reference),
        }
    }

    async fn delete(&self, reference: &AttachmentRef) -> Result<(), StorageError> {
        match reference {
            AttachmentRef::Local(_) => self.local.delete(reference).await,
            AttachmentRef::Remote(_) => self.remote.delete(reference).await,
        }
    }

    async fn open_for_read(&self, reference: &AttachmentRef) -> Result<Vec<u8>, StorageError> {
        match reference {
            AttachmentRef::Local(_) => self.local.open_for_read(reference).await,
            AttachmentRef::Remote(_) => self.remote.open_for_read(reference).await,
        }
    }
}

/// Delete each reference, logging failures instead of returning them.
pub async fn delete_best_effort(store: &dyn AttachmentStore, references: &[AttachmentRef]) {
    let deletions = references.iter().map(|reference| async move {
        if let Err(err) = store.delete(reference).await {
            warn!(?err, reference = %reference, "failed to remove stored attachment");
        }
    });
    futures::future::join_all(deletions).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_and_https_references_are_remote() {
        assert_eq!(
            AttachmentRef::from_stored("https://res.cdn.test/a/b.png"),
            Some(AttachmentRef::Remote("https://res.cdn.test/a/b.png".into()))
        );
        assert!(AttachmentRef::from_stored("HTTP://host/x.pdf").unwrap().is_remote());
    }

    #[test]
    fn other_references_are_local() {
        assert_eq!(
            AttachmentRef::from_stored("1700000000000-ab12cd34.jpg"),
            Some(AttachmentRef::Local("1700000000000-ab12cd34.jpg".into()))
        );
        assert_eq!(
            AttachmentRef::from_stored("httpfile.png"),
            Some(AttachmentRef::Local("httpfile.png".into()))
        );
    }

    #[test]
    fn blank_reference_is_absent() {
        assert_eq!(AttachmentRef::from_stored("   "), None);
        assert_eq!(AttachmentRef::from_stored_opt(None), None);
    }

    #[test]
    fn remote_base_name_drops_query() {
        let reference =
            AttachmentRef::from_stored("https://cdn.test/upload/v1/folder/akta.pdf?x=1").unwrap();
        assert_eq!(reference.base_name(), "akta.pdf");
        assert_eq!(reference.extension().as_deref(), Some("pdf"));
    }

    #[test]
    fn upload_extension_is_normalized() {
        let upload = UploadedFile {
            field_name: "foto".into(),
            original_name: "Pas Foto.JPG".into(),
            content_type: Some("image/jpeg".into()),
            bytes: vec![1, 2, 3],
        };
        assert_eq!(upload.extension().as_deref(), Some("jpg"));

        let bare = UploadedFile {
            original_name: "README".into(),
            ..upload
        };
        assert_eq!(bare.extension(), None);
    }
}
