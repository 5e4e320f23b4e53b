pub mod archive;
mod lifecycle;
#[cfg(test)]
pub(crate) mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::attachments::AttachmentRef;

pub use lifecycle::{SubmissionDraft, SubmissionService, SubmissionView};
pub use postgres::PgSubmissionRepository;

pub const CATEGORY_SEPARATOR: &str = ", ";

/// Category options offered on the registration and edit forms.
pub const CATEGORY_OPTIONS: &[&str] = &[
    "Pertanian dan pangan",
    "Energi",
    "Lingkungan Hidup",
    "Kesehatan, Obat-obatan, dan Kosmetika",
    "Pendidikan",
    "Rekayasa dan Manufaktur",
    "Kerajinan dan Industri Rumah Tangga",
    "Sosial, Budaya, dan Seni",
];

/// How far the innovation has been realized.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Realization {
    Commercialized,
    CommunityUse,
    Prototype,
}

impl Realization {
    pub const ALL: [Realization; 3] = [
        Realization::Commercialized,
        Realization::CommunityUse,
        Realization::Prototype,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Realization::Commercialized => "commercialized",
            Realization::CommunityUse => "community_use",
            Realization::Prototype => "prototype",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Realization::Commercialized => "Sudah dikomersialkan",
            Realization::CommunityUse => "Digunakan masyarakat (non-komersial)",
            Realization::Prototype => "Masih prototipe",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "commercialized" => Some(Realization::Commercialized),
            "community_use" => Some(Realization::CommunityUse),
            "prototype" => Some(Realization::Prototype),
            _ => None,
        }
    }
}

/// Descriptive text of a submission. Always overwritten as a whole on edit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubmissionFields {
    pub innovator_name: String,
    pub email: String,
    pub phone: String,
    pub participation: Option<String>,
    pub group_members: Option<String>,
    pub identity_number: Option<String>,
    pub categories: Vec<String>,
    pub product_name: String,
    pub background: Option<String>,
    pub objective: Option<String>,
    pub description: Option<String>,
    pub realization: Option<Realization>,
    /// External video link; never uploaded.
    pub video_url: Option<String>,
}

/// The singular file slots of a submission.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AttachmentSlot {
    Portrait,
    IdentityDocument,
    LegalDocument,
}

impl AttachmentSlot {
    pub const ALL: [AttachmentSlot; 3] = [
        AttachmentSlot::Portrait,
        AttachmentSlot::IdentityDocument,
        AttachmentSlot::LegalDocument,
    ];

    /// Multipart field carrying this slot's file.
    pub fn form_field(&self) -> &'static str {
        match self {
            AttachmentSlot::Portrait => "foto",
            AttachmentSlot::IdentityDocument => "fotoIdentitas",
            AttachmentSlot::LegalDocument => "legalitas",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttachmentSlot::Portrait => "Pas Foto",
            AttachmentSlot::IdentityDocument => "Foto Identitas",
            AttachmentSlot::LegalDocument => "Legalitas",
        }
    }

    /// Prefix used for this slot's entry inside a download archive.
    pub fn archive_label(&self) -> &'static str {
        match self {
            AttachmentSlot::Portrait => "Pas_Foto",
            AttachmentSlot::IdentityDocument => "Foto_Identitas",
            AttachmentSlot::LegalDocument => "Legalitas",
        }
    }
}

/// References held in the singular slots. On update, `None` means "keep what is stored".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlotRefs {
    pub portrait: Option<AttachmentRef>,
    pub identity_document: Option<AttachmentRef>,
    pub legal_document: Option<AttachmentRef>,
}

impl SlotRefs {
    pub fn get(&self, slot: AttachmentSlot) -> Option<&AttachmentRef> {
        match slot {
            AttachmentSlot::Portrait => self.portrait.as_ref(),
            AttachmentSlot::IdentityDocument => self.identity_document.as_ref(),
            AttachmentSlot::LegalDocument => self.legal_document.as_ref(),
        }
    }

    pub fn set(&mut self, slot: AttachmentSlot, reference: AttachmentRef) {
        let target = match slot {
            AttachmentSlot::Portrait => &mut self.portrait,
            AttachmentSlot::IdentityDocument => &mut self.identity_document,
            AttachmentSlot::LegalDocument => &mut self.legal_document,
        };
        *target = Some(reference);
    }

    /// Present references in slot order.
    pub fn present(&self) -> impl Iterator<Item = (AttachmentSlot, &AttachmentRef)> {
        AttachmentSlot::ALL
            .into_iter()
            .filter_map(|slot| self.get(slot).map(|reference| (slot, reference)))
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

#[derive(Clone, Debug)]
pub struct Submission {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub fields: SubmissionFields,
    pub attachments: SlotRefs,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProductPhoto {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub reference: AttachmentRef,
    /// 1-based display and archive index.
    pub position: i32,
}

#[derive(Clone, Debug)]
pub struct PhotoOwnership {
    pub photo: ProductPhoto,
    pub owner_id: Uuid,
}

/// Admin listing row.
#[derive(Clone, Debug)]
pub struct SubmissionOverview {
    pub submission: Submission,
    pub owner_username: String,
    pub photo_count: i64,
}

/// Row filter for reads and writes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope {
    /// Only rows owned by this user.
    Owner(Uuid),
    /// Any row; admin paths only.
    Unscoped,
}

impl Scope {
    pub fn admits(&self, owner_id: Uuid) -> bool {
        match self {
            Scope::Owner(user_id) => *user_id == owner_id,
            Scope::Unscoped => true,
        }
    }
}

pub type RepoResult<T> = Result<T, sqlx::Error>;

/// Persistence for submissions and their product photos.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Insert the submission and its product photos atomically.
    async fn create(
        &self,
        owner_id: Uuid,
        fields: &SubmissionFields,
        attachments: &SlotRefs,
        product_photos: &[AttachmentRef],
    ) -> RepoResult<Uuid>;

    async fn get(&self, id: Uuid, scope: Scope) -> RepoResult<Option<Submission>>;

    /// Overwrite every text field and only the slots present in `patch`. Owner-scoped.
    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        fields: &SubmissionFields,
        patch: &SlotRefs,
    ) -> RepoResult<bool>;

    /// Delete the submission; product photo rows go with it.
    async fn delete(&self, id: Uuid, scope: Scope) -> RepoResult<bool>;

    async fn list_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Submission>>;

    async fn list_all(&self) -> RepoResult<Vec<SubmissionOverview>>;

    /// Append photos after the current last position, preserving slice order.
    async fn add_product_photos(
        &self,
        submission_id: Uuid,
        references: &[AttachmentRef],
    ) -> RepoResult<Vec<ProductPhoto>>;

    async fn photo_owner(&self, photo_id: Uuid) -> RepoResult<Option<PhotoOwnership>>;

    async fn remove_product_photo(&self, photo_id: Uuid) -> RepoResult<Option<ProductPhoto>>;

    async fn list_product_photos(&self, submission_id: Uuid) -> RepoResult<Vec<ProductPhoto>>;
}

/// Collapse a category list into the single stored column value.
pub fn join_categories(categories: &[String]) -> Option<String> {
    let cleaned = categories
        .iter()
        .map(|category| category.trim())
        .filter(|category| !category.is_empty())
        .collect::<Vec<_>>();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join(CATEGORY_SEPARATOR))
    }
}

/// Split a stored category column back into ordered, trimmed values.
///
/// Known options containing the separator (e.g. "Sosial, Budaya, dan Seni") are matched
/// first so they survive the round trip intact.
pub fn split_categories(stored: Option<&str>) -> Vec<String> {
    let Some(stored) = stored else {
        return Vec::new();
    };

    let mut categories = Vec::new();
    let mut rest = stored.trim();
    while !rest.is_empty() {
        let known = CATEGORY_OPTIONS.iter().find(|option| {
            rest.starts_with(**option)
                && rest[option.len()..]
                    .trim_start()
                    .strip_prefix(',')
                    .map_or(rest.len() == option.len(), |_| true)
        });

        let (value, remainder) = match known {
            Some(option) => (*option, &rest[option.len()..]),
            None => match rest.find(',') {
                Some(idx) => (&rest[..idx], &rest[idx..]),
                None => (rest, ""),
            },
        };

        let value = value.trim();
        if !value.is_empty() {
            categories.push(value.to_string());
        }
        rest = remainder.trim_start().trim_start_matches(',').trim_start();
    }

    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_round_trip_in_order() {
        let input = vec!["A".to_string(), "B".to_string()];
        let stored = join_categories(&input);
        assert_eq!(stored.as_deref(), Some("A, B"));
        assert_eq!(split_categories(stored.as_deref()), input);
    }

    #[test]
    fn categories_with_embedded_commas_survive() {
        let input = vec![
            "Energi".to_string(),
            "Kesehatan, Obat-obatan, dan Kosmetika".to_string(),
            "Sosial, Budaya, dan Seni".to_string(),
        ];
        let stored = join_categories(&input);
        assert_eq!(split_categories(stored.as_deref()), input);
    }

    #[test]
    fn blank_categories_are_dropped() {
        let input = vec!["  ".to_string(), " Pendidikan ".to_string()];
        assert_eq!(join_categories(&input).as_deref(), Some("Pendidikan"));
        assert_eq!(join_categories(&[]), None);
        assert!(split_categories(None).is_empty());
        assert_eq!(split_categories(Some("X ,Y,")), vec!["X", "Y"]);
    }

    #[test]
    fn realization_parses_known_values_only() {
        for value in Realization::ALL {
            assert_eq!(Realization::parse(value.as_str()), Some(value));
        }
        assert_eq!(Realization::parse("sold"), None);
    }

    #[test]
    fn slot_refs_report_present_slots_in_order() {
        let mut refs = SlotRefs::default();
        assert!(refs.is_empty());
        refs.set(
            AttachmentSlot::LegalDocument,
            AttachmentRef::Local("akta.pdf".into()),
        );
        refs.set(AttachmentSlot::Portrait, AttachmentRef::Local("me.jpg".into()));

        let slots = refs.present().map(|(slot, _)| slot).collect::<Vec<_>>();
        assert_eq!(
            slots,
            vec![AttachmentSlot::Portrait, AttachmentSlot::LegalDocument]
        );
    }

    #[test]
    fn scope_admits_owner_or_everyone() {
        let owner = Uuid::new_v4();
        assert!(Scope::Owner(owner).admits(owner));
        assert!(!Scope::Owner(owner).admits(Uuid::new_v4()));
        assert!(Scope::Unscoped.admits(owner));
    }
}
