use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use super::{AttachmentRef, AttachmentStore, StorageError, UploadedFile};

/// Attachments kept as flat files under a single uploads directory.
pub struct LocalStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalStore {
    pub async fn new(root: PathBuf, url_prefix: impl Into<String>) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            url_prefix: url_prefix.into(),
        })
    }

    /// Resolve a bare filename to its path, rejecting anything that could escape the root.
    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
            || name.contains('\0');
        if invalid {
            return Err(StorageError::InvalidReference(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn local_name<'a>(&self, reference: &'a AttachmentRef) -> Result<&'a str, StorageError> {
        match reference {
            AttachmentRef::Local(name) => Ok(name),
            AttachmentRef::Remote(url) => Err(StorageError::InvalidReference(url.clone())),
        }
    }
}

/// Timestamp plus a random suffix, keeping the original extension.
fn generate_name(upload: &UploadedFile) -> String {
    let stamp = Utc::now().timestamp_millis();
    let suffix = Uuid::new_v4().simple().to_string();
    match upload.extension() {
        Some(ext) => format!("{stamp}-{}.{ext}", &suffix[..12]),
        None => format!("{stamp}-{}", &suffix[..12]),
    }
}

#[async_trait]
impl AttachmentStore for LocalStore {
    async fn store(&self, upload: &UploadedFile) -> Result<AttachmentRef, StorageError> {
        let name = generate_name(upload);
        let path = self.path_for(&name)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        if let Err(err) = file.write_all(&upload.bytes).await {
            let _ = fs::remove_file(&path).await;
            return Err(err.into());
        }
        file.flush().await?;

        Ok(AttachmentRef::Local(name))
    }

    fn resolve_url(&self, reference: &AttachmentRef) -> String {
        match reference {
            AttachmentRef::Local(name) => format!("{}/{}", self.url_prefix, name),
            AttachmentRef::Remote(url) => url.clone(),
        }
    }

    async fn delete(&self, reference: &AttachmentRef) -> Result<(), StorageError> {
        let path = self.path_for(self.local_name(reference)?)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn open_for_read(&self, reference: &AttachmentRef) -> Result<Vec<u8>, StorageError> {
        let name = self.local_name(reference)?;
        let path = self.path_for(name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
