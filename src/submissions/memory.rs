use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::attachments::AttachmentRef;

use super::{
    PhotoOwnership, ProductPhoto, RepoResult, Scope, SlotRefs, Submission, SubmissionFields,
    SubmissionOverview, SubmissionRepository,
};

/// In-memory repository honoring the same scoping and cascade rules as the Postgres one.
#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    submissions: Vec<Submission>,
    photos: Vec<ProductPhoto>,
    usernames: HashMap<Uuid, String>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn photo_count(&self, submission_id: Uuid) -> usize {
        let state = self.inner.lock().unwrap();
        state
            .photos
            .iter()
            .filter(|photo| photo.submission_id == submission_id)
            .count()
    }

    pub fn total_photos(&self) -> usize {
        self.inner.lock().unwrap().photos.len()
    }
}

#[async_trait]
impl SubmissionRepository for MemoryRepository {
    async fn create(
        &self,
        owner_id: Uuid,
        fields: &SubmissionFields,
        attachments: &SlotRefs,
        product_photos: &[AttachmentRef],
    ) -> RepoResult<Uuid> {
        let mut state = self.inner.lock().unwrap();
        let id = Uuid::new_v4();
        let now = Utc::now();

        state.submissions.push(Submission {
            id,
            owner_id,
            fields: fields.clone(),
            attachments: attachments.clone(),
            created_at: now,
            updated_at: now,
        });
        state
            .usernames
            .entry(owner_id)
            .or_insert_with(|| owner_id.to_string());

        for (idx, reference) in product_photos.iter().enumerate() {
            state.photos.push(ProductPhoto {
                id: Uuid::new_v4(),
                submission_id: id,
                reference: reference.clone(),
                position: idx as i32 + 1,
            });
        }

        Ok(id)
    }

    async fn get(&self, id: Uuid, scope: Scope) -> RepoResult<Option<Submission>> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .submissions
            .iter()
            .find(|s| s.id == id && scope.admits(s.owner_id))
            .cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        fields: &SubmissionFields,
        patch: &SlotRefs,
    ) -> RepoResult<bool> {
        let mut state = self.inner.lock().unwrap();
        let Some(submission) = state
            .submissions
            .iter_mut()
            .find(|s| s.id == id && s.owner_id == owner_id)
        else {
            return Ok(false);
        };

        submission.fields = fields.clone();
        for (slot, reference) in patch.present() {
            submission.attachments.set(slot, reference.clone());
        }
        submission.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete(&self, id: Uuid, scope: Scope) -> RepoResult<bool> {
        let mut state = self.inner.lock().unwrap();
        let before = state.submissions.len();
        state
            .submissions
            .retain(|s| !(s.id == id && scope.admits(s.owner_id)));
        let removed = state.submissions.len() < before;
        if removed {
            state.photos.retain(|photo| photo.submission_id != id);
        }
        Ok(removed)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Submission>> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .submissions
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> RepoResult<Vec<SubmissionOverview>> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .submissions
            .iter()
            .map(|s| SubmissionOverview {
                submission: s.clone(),
                owner_username: state
                    .usernames
                    .get(&s.owner_id)
                    .cloned()
                    .unwrap_or_default(),
                photo_count: state
                    .photos
                    .iter()
                    .filter(|photo| photo.submission_id == s.id)
                    .count() as i64,
            })
            .collect())
    }

    async fn add_product_photos(
        &self,
        submission_id: Uuid,
        references: &[AttachmentRef],
    ) -> RepoResult<Vec<ProductPhoto>> {
        let mut state = self.inner.lock().unwrap();
        if !state.submissions.iter().any(|s| s.id == submission_id) {
            return Err(sqlx::Error::RowNotFound);
        }

        let last = state
            .photos
            .iter()
            .filter(|photo| photo.submission_id == submission_id)
            .map(|photo| photo.position)
            .max()
            .unwrap_or(0);

        let added = references
            .iter()
            .enumerate()
            .map(|(offset, reference)| ProductPhoto {
                id: Uuid::new_v4(),
                submission_id,
                reference: reference.clone(),
                position: last + offset as i32 + 1,
            })
            .collect::<Vec<_>>();
        state.photos.extend(added.iter().cloned());
        Ok(added)
    }

    async fn photo_owner(&self, photo_id: Uuid) -> RepoResult<Option<PhotoOwnership>> {
        let state = self.inner.lock().unwrap();
        let Some(photo) = state.photos.iter().find(|photo| photo.id == photo_id) else {
            return Ok(None);
        };
        Ok(state
            .submissions
            .iter()
            .find(|s| s.id == photo.submission_id)
            .map(|s| PhotoOwnership {
                photo: photo.clone(),
                owner_id: s.owner_id,
            }))
    }

    async fn remove_product_photo(&self, photo_id: Uuid) -> RepoResult<Option<ProductPhoto>> {
        let mut state = self.inner.lock().unwrap();
        let Some(idx) = state.photos.iter().position(|photo| photo.id == photo_id) else {
            return Ok(None);
        };
        Ok(Some(state.photos.remove(idx)))
    }

    async fn list_product_photos(&self, submission_id: Uuid) -> RepoResult<Vec<ProductPhoto>> {
        let state = self.inner.lock().unwrap();
        let mut photos = state
            .photos
            .iter()
            .filter(|photo| photo.submission_id == submission_id)
            .cloned()
            .collect::<Vec<_>>();
        photos.sort_by_key(|photo| photo.position);
        Ok(photos)
    }
}
