use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use super::{AttachmentRef, AttachmentStore, StorageError, UploadedFile};

/// Test double that keeps objects in memory and records deletions.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<AttachmentRef, Vec<u8>>>,
    deleted: Mutex<Vec<AttachmentRef>>,
    failing_uploads: Mutex<HashSet<String>>,
    write_remote: bool,
    counter: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remote() -> Self {
        Self {
            write_remote: true,
            ..Self::default()
        }
    }

    /// Make every upload with this original filename fail.
    pub fn fail_upload(&self, original_name: &str) {
        self.failing_uploads
            .lock()
            .unwrap()
            .insert(original_name.to_string());
    }

    pub fn insert(&self, reference: AttachmentRef, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(reference, bytes.to_vec());
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn deleted(&self) -> Vec<AttachmentRef> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttachmentStore for MemoryStore {
    async fn store(&self, upload: &UploadedFile) -> Result<AttachmentRef, StorageError> {
        if self
            .failing_uploads
            .lock()
            .unwrap()
            .contains(&upload.original_name)
        {
            return Err(StorageError::Remote(format!(
                "refused {}",
                upload.original_name
            )));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let name = match upload.extension() {
            Some(ext) => format!("obj-{n}.{ext}"),
            None => format!("obj-{n}"),
        };
        let reference = if self.write_remote {
            AttachmentRef::Remote(format!("https://cdn.test/{name}"))
        } else {
            AttachmentRef::Local(name)
        };

        self.insert(reference.clone(), &upload.bytes);
        Ok(reference)
    }

    fn resolve_url(&self, reference: &AttachmentRef) -> String {
        match reference {
            AttachmentRef::Local(name) => format!("/uploads/{name}"),
            AttachmentRef::Remote(url) => url.clone(),
        }
    }

    async fn delete(&self, reference: &AttachmentRef) -> Result<(), StorageError> {
        self.objects.lock().unwrap().remove(reference);
        self.deleted.lock().unwrap().push(reference.clone());
        Ok(())
    }

    async fn open_for_read(&self, reference: &AttachmentRef) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(reference.to_string()))
    }
}
