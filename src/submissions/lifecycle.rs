use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    accounts::Requester,
    attachments::{AttachmentRef, AttachmentStore, UploadedFile, delete_best_effort},
    error::{PortalError, PortalResult},
};

use super::{
    AttachmentSlot, ProductPhoto, Scope, SlotRefs, Submission, SubmissionFields,
    SubmissionOverview, SubmissionRepository,
    archive::{Archive, build_archive},
};

const NOT_FOUND_MESSAGE: &str = "Data tidak ditemukan atau Anda tidak memiliki akses.";

/// Everything a create or edit request carries.
#[derive(Clone, Debug, Default)]
pub struct SubmissionDraft {
    pub fields: SubmissionFields,
    /// Files for singular slots; a slot that is absent here keeps its stored reference.
    pub slot_files: Vec<(AttachmentSlot, UploadedFile)>,
    /// New product photos, in the order they appeared in the request.
    pub product_photos: Vec<UploadedFile>,
}

#[derive(Clone, Debug)]
pub struct SubmissionView {
    pub submission: Submission,
    pub photos: Vec<ProductPhoto>,
}

impl SubmissionView {
    /// Number of stored attachments, product photos included.
    pub fn attachment_count(&self) -> usize {
        self.submission.attachments.present().count() + self.photos.len()
    }
}

/// Files stored for a single request, kept so they can be rolled back together.
struct StoredFiles {
    slots: SlotRefs,
    photos: Vec<AttachmentRef>,
}

impl StoredFiles {
    fn all(&self) -> Vec<AttachmentRef> {
        self.slots
            .present()
            .map(|(_, reference)| reference.clone())
            .chain(self.photos.iter().cloned())
            .collect()
    }
}

/// Orchestrates submissions together with their stored attachments.
#[derive(Clone)]
pub struct SubmissionService {
    repo: Arc<dyn SubmissionRepository>,
    store: Arc<dyn AttachmentStore>,
}

impl SubmissionService {
    pub fn new(repo: Arc<dyn SubmissionRepository>, store: Arc<dyn AttachmentStore>) -> Self {
        Self { repo, store }
    }

    pub fn store(&self) -> &dyn AttachmentStore {
        self.store.as_ref()
    }

    pub async fn create(&self, owner_id: Uuid, draft: SubmissionDraft) -> PortalResult<Uuid> {
        validate(&draft.fields)?;
        let stored = self.store_files(&draft).await?;

        let created = self
            .repo
            .create(owner_id, &draft.fields, &stored.slots, &stored.photos)
            .await;

        match created {
            Ok(id) => {
                info!(submission_id = %id, user_id = %owner_id, photos = stored.photos.len(), "submission created");
                Ok(id)
            }
            Err(err) => {
                delete_best_effort(self.store(), &stored.all()).await;
                Err(err.into())
            }
        }
    }

    /// Overwrite the text fields, replace supplied slots and append supplied photos.
    ///
    /// Only the owner may edit; anyone else gets the same answer as for a missing record.
    pub async fn edit(&self, owner_id: Uuid, id: Uuid, draft: SubmissionDraft) -> PortalResult<()> {
        validate(&draft.fields)?;

        let Some(existing) = self.repo.get(id, Scope::Owner(owner_id)).await? else {
            return Err(PortalError::not_found(NOT_FOUND_MESSAGE));
        };

        let stored = self.store_files(&draft).await?;

        let updated = match self
            .repo
            .update(id, owner_id, &draft.fields, &stored.slots)
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                delete_best_effort(self.store(), &stored.all()).await;
                return Err(err.into());
            }
        };
        if !updated {
            delete_best_effort(self.store(), &stored.all()).await;
            return Err(PortalError::not_found(NOT_FOUND_MESSAGE));
        }

        if !stored.photos.is_empty() {
            if let Err(err) = self.repo.add_product_photos(id, &stored.photos).await {
                // Text and slot changes are already committed at this point.
                delete_best_effort(self.store(), &stored.photos).await;
                return Err(err.into());
            }
        }

        let superseded = stored
            .slots
            .present()
            .filter_map(|(slot, replacement)| {
                existing
                    .attachments
                    .get(slot)
                    .filter(|previous| *previous != replacement)
                    .cloned()
            })
            .collect::<Vec<_>>();
        delete_best_effort(self.store(), &superseded).await;

        info!(submission_id = %id, user_id = %owner_id, new_photos = stored.photos.len(), "submission updated");
        Ok(())
    }

    /// Remove one product photo. Returns the id of the submission it belonged to.
    pub async fn delete_photo(&self, requester: &Requester, photo_id: Uuid) -> PortalResult<Uuid> {
        let Some(ownership) = self.repo.photo_owner(photo_id).await? else {
            return Err(PortalError::not_found("Foto produk tidak ditemukan."));
        };

        if ownership.owner_id != requester.user_id && !requester.is_admin() {
            return Err(PortalError::forbidden(
                "Anda tidak berhak menghapus foto ini.",
            ));
        }

        let Some(removed) = self.repo.remove_product_photo(photo_id).await? else {
            return Err(PortalError::not_found("Foto produk tidak ditemukan."));
        };

        delete_best_effort(self.store(), std::slice::from_ref(&removed.reference)).await;
        info!(photo_id = %photo_id, submission_id = %removed.submission_id, "product photo deleted");
        Ok(removed.submission_id)
    }

    /// Delete a submission, then clean up every attachment it referenced.
    pub async fn delete_submission(&self, id: Uuid, scope: Scope) -> PortalResult<()> {
        let Some(submission) = self.repo.get(id, scope).await? else {
            return Err(PortalError::not_found(NOT_FOUND_MESSAGE));
        };
        let photos = self.repo.list_product_photos(id).await?;

        let references = submission
            .attachments
            .present()
            .map(|(_, reference)| reference.clone())
            .chain(photos.into_iter().map(|photo| photo.reference))
            .collect::<Vec<_>>();

        if !self.repo.delete(id, scope).await? {
            return Err(PortalError::not_found(NOT_FOUND_MESSAGE));
        }

        // The row is gone; a crash from here on only leaves orphaned objects behind.
        delete_best_effort(self.store(), &references).await;
        info!(submission_id = %id, attachments = references.len(), "submission deleted");
        Ok(())
    }

    pub async fn view(&self, id: Uuid, scope: Scope) -> PortalResult<SubmissionView> {
        let Some(submission) = self.repo.get(id, scope).await? else {
            return Err(PortalError::not_found(NOT_FOUND_MESSAGE));
        };
        let photos = self.repo.list_product_photos(id).await?;
        Ok(SubmissionView { submission, photos })
    }

    pub async fn list_own(&self, owner_id: Uuid) -> PortalResult<Vec<Submission>> {
        Ok(self.repo.list_by_owner(owner_id).await?)
    }

    pub async fn list_all(&self) -> PortalResult<Vec<SubmissionOverview>> {
        Ok(self.repo.list_all().await?)
    }

    pub async fn archive(&self, id: Uuid, scope: Scope) -> PortalResult<Archive> {
        let view = self.view(id, scope).await?;
        let archive = build_archive(self.store(), &view.submission, &view.photos).await?;
        info!(submission_id = %id, entries = archive.entries.len(), "archive built");
        Ok(archive)
    }

    /// Store every file of the draft, or none of them.
    ///
    /// Uploads run concurrently; results keep the request order.
    async fn store_files(&self, draft: &SubmissionDraft) -> PortalResult<StoredFiles> {
        let store = self.store();

        let slot_uploads = join_all(
            draft
                .slot_files
                .iter()
                .map(|(slot, upload)| async move { (*slot, store.store(upload).await) }),
        );
        let photo_uploads = join_all(draft.product_photos.iter().map(|upload| store.store(upload)));
        let (slot_results, photo_results) = futures::join!(slot_uploads, photo_uploads);

        let mut stored = StoredFiles {
            slots: SlotRefs::default(),
            photos: Vec::with_capacity(photo_results.len()),
        };
        let mut failure = None;

        for (slot, result) in slot_results {
            match result {
                Ok(reference) => {
                    if let Some(previous) = stored.slots.get(slot).cloned() {
                        // Last file wins when a slot is sent twice.
                        delete_best_effort(store, &[previous]).await;
                    }
                    stored.slots.set(slot, reference);
                }
                Err(err) => {
                    warn!(?err, slot = slot.form_field(), "attachment upload failed");
                    failure.get_or_insert(err);
                }
            }
        }
        for result in photo_results {
            match result {
                Ok(reference) => stored.photos.push(reference),
                Err(err) => {
                    warn!(?err, "product photo upload failed");
                    failure.get_or_insert(err);
                }
            }
        }

        match failure {
            Some(err) => {
                delete_best_effort(store, &stored.all()).await;
                Err(PortalError::UploadFailed(err))
            }
            None => Ok(stored),
        }
    }
}

fn validate(fields: &SubmissionFields) -> PortalResult<()> {
    let required = [
        (&fields.innovator_name, "Nama inovator"),
        (&fields.email, "Alamat email"),
        (&fields.phone, "Nomor HP"),
        (&fields.product_name, "Nama produk"),
    ];

    let missing = required
        .iter()
        .filter(|(value, _)| value.trim().is_empty())
        .map(|(_, label)| *label)
        .collect::<Vec<_>>();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PortalError::validation(format!(
            "Kolom wajib belum diisi: {}.",
            missing.join(", ")
        )))
    }
}
