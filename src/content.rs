use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::attachments::{AttachmentRef, AttachmentStore};

/// Admin-authored announcement shown on the dashboard.
#[derive(Clone, Debug)]
pub struct DashboardContent {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: Option<AttachmentRef>,
    pub created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ContentRow {
    id: Uuid,
    title: String,
    description: String,
    image_ref: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ContentRow> for DashboardContent {
    fn from(row: ContentRow) -> Self {
        DashboardContent {
            id: row.id,
            title: row.title,
            description: row.description,
            image: AttachmentRef::from_stored_opt(row.image_ref.as_deref()),
            created_at: row.created_at,
        }
    }
}

/// Public JSON shape of an announcement.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn from_content(content: DashboardContent, store: &dyn AttachmentStore) -> Self {
        ContentItem {
            image_url: content
                .image
                .as_ref()
                .map(|reference| store.resolve_url(reference)),
            id: content.id,
            title: content.title,
            description: content.description,
            created_at: content.created_at,
        }
    }
}

pub async fn list_contents(pool: &PgPool) -> sqlx::Result<Vec<DashboardContent>> {
    let rows = sqlx::query_as::<_, ContentRow>(
        "SELECT id, title, description, image_ref, created_at FROM dashboard_content ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(DashboardContent::from).collect())
}

pub async fn find_content(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<DashboardContent>> {
    let row = sqlx::query_as::<_, ContentRow>(
        "SELECT id, title, description, image_ref, created_at FROM dashboard_content WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(DashboardContent::from))
}

pub async fn insert_content(
    pool: &PgPool,
    title: &str,
    description: &str,
    image: Option<&AttachmentRef>,
    created_by: Uuid,
) -> sqlx::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO dashboard_content (id, title, description, image_ref, created_by) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(image.map(AttachmentRef::as_stored))
    .bind(created_by)
    .execute(pool)
    .await?;
    Ok(id)
}

/// Delete a post. `None` when it did not exist; otherwise the image it referenced, if any.
pub async fn delete_content(
    pool: &PgPool,
    id: Uuid,
) -> sqlx::Result<Option<Option<AttachmentRef>>> {
    let image_ref: Option<Option<String>> =
        sqlx::query_scalar("DELETE FROM dashboard_content WHERE id = $1 RETURNING image_ref")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(image_ref.map(|raw| AttachmentRef::from_stored_opt(raw.as_deref())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::memory::MemoryStore;

    #[test]
    fn content_item_serializes_camel_case_with_resolved_url() {
        let store = MemoryStore::new();
        let content = DashboardContent {
            id: Uuid::nil(),
            title: "Pengumuman".into(),
            description: "Pendaftaran dibuka".into(),
            image: Some(AttachmentRef::Local("banner.png".into())),
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(ContentItem::from_content(content, &store)).expect("json");
        assert_eq!(value["title"], "Pengumuman");
        assert_eq!(value["imageUrl"], "/uploads/banner.png");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn remote_image_url_is_passed_through() {
        let store = MemoryStore::new();
        let content = DashboardContent {
            id: Uuid::nil(),
            title: "x".into(),
            description: String::new(),
            image: Some(AttachmentRef::Remote("https://cdn.test/a.jpg".into())),
            created_at: Utc::now(),
        };

        let item = ContentItem::from_content(content, &store);
        assert_eq!(item.image_url.as_deref(), Some("https://cdn.test/a.jpg"));
    }
}
