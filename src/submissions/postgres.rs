use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

use crate::attachments::AttachmentRef;

use super::{
    PhotoOwnership, ProductPhoto, Realization, RepoResult, Scope, SlotRefs, Submission,
    SubmissionFields, SubmissionOverview, SubmissionRepository, join_categories,
    split_categories,
};

const SUBMISSION_COLUMNS: &str = "id, user_id, innovator_name, email, phone, participation, group_members, identity_number, categories, product_name, background, objective, description, realization, video_url, photo_ref, identity_photo_ref, legal_document_ref, created_at, updated_at";

#[derive(FromRow)]
struct SubmissionRow {
    id: Uuid,
    user_id: Uuid,
    innovator_name: String,
    email: String,
    phone: String,
    participation: Option<String>,
    group_members: Option<String>,
    identity_number: Option<String>,
    categories: Option<String>,
    product_name: String,
    background: Option<String>,
    objective: Option<String>,
    description: Option<String>,
    realization: Option<String>,
    video_url: Option<String>,
    photo_ref: Option<String>,
    identity_photo_ref: Option<String>,
    legal_document_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Submission {
            id: row.id,
            owner_id: row.user_id,
            fields: SubmissionFields {
                innovator_name: row.innovator_name,
                email: row.email,
                phone: row.phone,
                participation: row.participation,
                group_members: row.group_members,
                identity_number: row.identity_number,
                categories: split_categories(row.categories.as_deref()),
                product_name: row.product_name,
                background: row.background,
                objective: row.objective,
                description: row.description,
                realization: row.realization.as_deref().and_then(Realization::parse),
                video_url: row.video_url,
            },
            attachments: SlotRefs {
                portrait: AttachmentRef::from_stored_opt(row.photo_ref.as_deref()),
                identity_document: AttachmentRef::from_stored_opt(
                    row.identity_photo_ref.as_deref(),
                ),
                legal_document: AttachmentRef::from_stored_opt(row.legal_document_ref.as_deref()),
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct OverviewRow {
    #[sqlx(flatten)]
    submission: SubmissionRow,
    owner_username: String,
    photo_count: i64,
}

#[derive(FromRow)]
struct PhotoRow {
    id: Uuid,
    pendaftaran_id: Uuid,
    reference: String,
    position: i32,
}

impl PhotoRow {
    fn into_photo(self) -> Option<ProductPhoto> {
        let Some(reference) = AttachmentRef::from_stored(&self.reference) else {
            warn!(photo_id = %self.id, "product photo row has an empty reference");
            return None;
        };

        Some(ProductPhoto {
            id: self.id,
            submission_id: self.pendaftaran_id,
            reference,
            position: self.position,
        })
    }
}

#[derive(FromRow)]
struct PhotoOwnerRow {
    #[sqlx(flatten)]
    photo: PhotoRow,
    user_id: Uuid,
}

fn stored(reference: Option<&AttachmentRef>) -> Option<&str> {
    reference.map(AttachmentRef::as_stored)
}

/// Postgres-backed [`SubmissionRepository`] over `pendaftaran` and `foto_produk`.
#[derive(Clone)]
pub struct PgSubmissionRepository {
    pool: PgPool,
}

impl PgSubmissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionRepository for PgSubmissionRepository {
    async fn create(
        &self,
        owner_id: Uuid,
        fields: &SubmissionFields,
        attachments: &SlotRefs,
        product_photos: &[AttachmentRef],
    ) -> RepoResult<Uuid> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO pendaftaran (id, user_id, innovator_name, email, phone, participation, group_members, identity_number, categories, product_name, background, objective, description, realization, video_url, photo_ref, identity_photo_ref, legal_document_ref)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(id)
        .bind(owner_id)
        .bind(&fields.innovator_name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(fields.participation.as_deref())
        .bind(fields.group_members.as_deref())
        .bind(fields.identity_number.as_deref())
        .bind(join_categories(&fields.categories))
        .bind(&fields.product_name)
        .bind(fields.background.as_deref())
        .bind(fields.objective.as_deref())
        .bind(fields.description.as_deref())
        .bind(fields.realization.map(|r| r.as_str()))
        .bind(fields.video_url.as_deref())
        .bind(stored(attachments.portrait.as_ref()))
        .bind(stored(attachments.identity_document.as_ref()))
        .bind(stored(attachments.legal_document.as_ref()))
        .execute(&mut *tx)
        .await?;

        for (idx, reference) in product_photos.iter().enumerate() {
            sqlx::query(
                "INSERT INTO foto_produk (id, pendaftaran_id, reference, position) VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(reference.as_stored())
            .bind(idx as i32 + 1)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    async fn get(&self, id: Uuid, scope: Scope) -> RepoResult<Option<Submission>> {
        let row = match scope {
            Scope::Owner(owner_id) => {
                sqlx::query_as::<_, SubmissionRow>(&format!(
                    "SELECT {SUBMISSION_COLUMNS} FROM pendaftaran WHERE id = $1 AND user_id = $2"
                ))
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?
            }
            Scope::Unscoped => {
                sqlx::query_as::<_, SubmissionRow>(&format!(
                    "SELECT {SUBMISSION_COLUMNS} FROM pendaftaran WHERE id = $1"
                ))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(row.map(Submission::from))
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        fields: &SubmissionFields,
        patch: &SlotRefs,
    ) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE pendaftaran SET
                 innovator_name = $3,
                 email = $4,
                 phone = $5,
                 participation = $6,
                 group_members = $7,
                 identity_number = $8,
                 categories = $9,
                 product_name = $10,
                 background = $11,
                 objective = $12,
                 description = $13,
                 realization = $14,
                 video_url = $15,
                 photo_ref = COALESCE($16, photo_ref),
                 identity_photo_ref = COALESCE($17, identity_photo_ref),
                 legal_document_ref = COALESCE($18, legal_document_ref),
                 updated_at = NOW()
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .bind(&fields.innovator_name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(fields.participation.as_deref())
        .bind(fields.group_members.as_deref())
        .bind(fields.identity_number.as_deref())
        .bind(join_categories(&fields.categories))
        .bind(&fields.product_name)
        .bind(fields.background.as_deref())
        .bind(fields.objective.as_deref())
        .bind(fields.description.as_deref())
        .bind(fields.realization.map(|r| r.as_str()))
        .bind(fields.video_url.as_deref())
        .bind(stored(patch.portrait.as_ref()))
        .bind(stored(patch.identity_document.as_ref()))
        .bind(stored(patch.legal_document.as_ref()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid, scope: Scope) -> RepoResult<bool> {
        let result = match scope {
            Scope::Owner(owner_id) => {
                sqlx::query("DELETE FROM pendaftaran WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(owner_id)
                    .execute(&self.pool)
                    .await?
            }
            Scope::Unscoped => {
                sqlx::query("DELETE FROM pendaftaran WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
        };

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Submission>> {
        let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM pendaftaran WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Submission::from).collect())
    }

    async fn list_all(&self) -> RepoResult<Vec<SubmissionOverview>> {
        let rows = sqlx::query_as::<_, OverviewRow>(
            "SELECT p.id, p.user_id, p.innovator_name, p.email, p.phone, p.participation, p.group_members,
                    p.identity_number, p.categories, p.product_name, p.background, p.objective, p.description,
                    p.realization, p.video_url, p.photo_ref, p.identity_photo_ref, p.legal_document_ref,
                    p.created_at, p.updated_at,
                    u.username AS owner_username,
                    (SELECT COUNT(*) FROM foto_produk f WHERE f.pendaftaran_id = p.id) AS photo_count
             FROM pendaftaran p
             JOIN users u ON u.id = p.user_id
             ORDER BY p.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SubmissionOverview {
                submission: Submission::from(row.submission),
                owner_username: row.owner_username,
                photo_count: row.photo_count,
            })
            .collect())
    }

    async fn add_product_photos(
        &self,
        submission_id: Uuid,
        references: &[AttachmentRef],
    ) -> RepoResult<Vec<ProductPhoto>> {
        if references.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;

        // Serializes concurrent appends to the same submission.
        sqlx::query("SELECT id FROM pendaftaran WHERE id = $1 FOR UPDATE")
            .bind(submission_id)
            .fetch_one(&mut *tx)
            .await?;

        let last_position: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), 0) FROM foto_produk WHERE pendaftaran_id = $1",
        )
        .bind(submission_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut photos = Vec::with_capacity(references.len());
        for (offset, reference) in references.iter().enumerate() {
            let photo = ProductPhoto {
                id: Uuid::new_v4(),
                submission_id,
                reference: reference.clone(),
                position: last_position + offset as i32 + 1,
            };

            sqlx::query(
                "INSERT INTO foto_produk (id, pendaftaran_id, reference, position) VALUES ($1, $2, $3, $4)",
            )
            .bind(photo.id)
            .bind(submission_id)
            .bind(reference.as_stored())
            .bind(photo.position)
            .execute(&mut *tx)
            .await?;

            photos.push(photo);
        }

        tx.commit().await?;
        Ok(photos)
    }

    async fn photo_owner(&self, photo_id: Uuid) -> RepoResult<Option<PhotoOwnership>> {
        let row = sqlx::query_as::<_, PhotoOwnerRow>(
            "SELECT f.id, f.pendaftaran_id, f.reference, f.position, p.user_id
             FROM foto_produk f
             JOIN pendaftaran p ON p.id = f.pendaftaran_id
             WHERE f.id = $1",
        )
        .bind(photo_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|row| {
            let owner_id = row.user_id;
            row.photo
                .into_photo()
                .map(|photo| PhotoOwnership { photo, owner_id })
        }))
    }

    async fn remove_product_photo(&self, photo_id: Uuid) -> RepoResult<Option<ProductPhoto>> {
        let row = sqlx::query_as::<_, PhotoRow>(
            "DELETE FROM foto_produk WHERE id = $1 RETURNING id, pendaftaran_id, reference, position",
        )
        .bind(photo_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(PhotoRow::into_photo))
    }

    async fn list_product_photos(&self, submission_id: Uuid) -> RepoResult<Vec<ProductPhoto>> {
        let rows = sqlx::query_as::<_, PhotoRow>(
            "SELECT id, pendaftaran_id, reference, position FROM foto_produk
             WHERE pendaftaran_id = $1
             ORDER BY position, created_at",
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(PhotoRow::into_photo).collect())
    }
}
