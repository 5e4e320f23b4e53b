use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use futures::future::join_all;
use tracing::{debug, warn};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::attachments::{AttachmentRef, AttachmentStore};

use super::{ProductPhoto, Submission};

pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// A finished zip bundle of one submission's attachments.
#[derive(Debug)]
pub struct Archive {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub entries: Vec<String>,
}

/// Entry names paired with the reference they are read from, in archive order.
pub fn entry_plan(submission: &Submission, photos: &[ProductPhoto]) -> Vec<(String, AttachmentRef)> {
    let slots = submission
        .attachments
        .present()
        .map(|(slot, reference)| {
            (
                format!("{}_{}", slot.archive_label(), reference.base_name()),
                reference.clone(),
            )
        });

    let products = photos.iter().enumerate().map(|(idx, photo)| {
        (
            format!("Foto_Produk_{}_{}", idx + 1, photo.reference.base_name()),
            photo.reference.clone(),
        )
    });

    slots.chain(products).collect()
}

/// Bundle every retrievable attachment of a submission.
///
/// Missing local files and failed remote fetches are left out; they never fail the archive.
/// The zip is only written once every fetch has settled.
pub async fn build_archive(
    store: &dyn AttachmentStore,
    submission: &Submission,
    photos: &[ProductPhoto],
) -> Result<Archive> {
    let plan = entry_plan(submission, photos);

    let fetches = plan.into_iter().map(|(name, reference)| async move {
        match store.open_for_read(&reference).await {
            Ok(bytes) => Some((name, bytes)),
            Err(err) if err.is_not_found() && !reference.is_remote() => {
                debug!(reference = %reference, "local attachment missing; skipped in archive");
                None
            }
            Err(err) => {
                warn!(?err, reference = %reference, "attachment unavailable; skipped in archive");
                None
            }
        }
    });
    let entries = join_all(fetches).await.into_iter().flatten().collect::<Vec<_>>();

    let names = entries.iter().map(|(name, _)| name.clone()).collect();
    let bytes = tokio::task::spawn_blocking(move || write_zip(entries))
        .await
        .context("archive writer task panicked")??;

    Ok(Archive {
        file_name: format!("lampiran_{}.zip", submission.id),
        bytes,
        entries: names,
    })
}

fn write_zip(entries: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("failed to start archive entry {name}"))?;
        zip.write_all(&bytes)
            .with_context(|| format!("failed to write archive entry {name}"))?;
    }

    let cursor = zip.finish().context("failed to finalize archive")?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use chrono::Utc;
    use uuid::Uuid;
    use zip::ZipArchive;

    use super::*;
    use crate::{
        attachments::memory::MemoryStore,
        submissions::{SlotRefs, SubmissionFields},
    };

    fn submission(attachments: SlotRefs) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            fields: SubmissionFields::default(),
            attachments,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn photo(submission_id: Uuid, reference: AttachmentRef, position: i32) -> ProductPhoto {
        ProductPhoto {
            id: Uuid::new_v4(),
            submission_id,
            reference,
            position,
        }
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).expect("zip");
        (0..archive.len())
            .map(|idx| archive.by_index(idx).expect("entry").name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn mixed_backends_include_only_retrievable_entries() {
        let store = MemoryStore::new();
        let portrait = AttachmentRef::Local("pas.jpg".into());
        let legal = AttachmentRef::Remote("https://cdn.test/docs/akta.pdf?v=2".into());
        let missing_identity = AttachmentRef::Local("gone.png".into());
        let good_photo = AttachmentRef::Remote("https://cdn.test/p/1.png".into());
        let broken_photo = AttachmentRef::Remote("https://cdn.test/p/broken.png".into());
        let local_photo = AttachmentRef::Local("produk.webp".into());

        store.insert(portrait.clone(), b"portrait");
        store.insert(legal.clone(), b"legal");
        store.insert(good_photo.clone(), b"photo-1");
        store.insert(local_photo.clone(), b"photo-3");

        let record = submission(SlotRefs {
            portrait: Some(portrait),
            identity_document: Some(missing_identity),
            legal_document: Some(legal),
        });
        let photos = vec![
            photo(record.id, good_photo, 1),
            photo(record.id, broken_photo, 2),
            photo(record.id, local_photo, 3),
        ];

        let archive = build_archive(&store, &record, &photos)
            .await
            .expect("archive");

        let expected = vec![
            "Pas_Foto_pas.jpg".to_string(),
            "Legalitas_akta.pdf".to_string(),
            "Foto_Produk_1_1.png".to_string(),
            "Foto_Produk_3_produk.webp".to_string(),
        ];
        assert_eq!(archive.entries, expected);
        assert_eq!(entry_names(&archive.bytes), expected);
        assert_eq!(archive.file_name, format!("lampiran_{}.zip", record.id));
    }

    #[tokio::test]
    async fn entries_carry_the_stored_bytes() {
        let store = MemoryStore::new();
        let portrait = AttachmentRef::Local("me.jpg".into());
        store.insert(portrait.clone(), b"hello zip");

        let record = submission(SlotRefs {
            portrait: Some(portrait),
            ..SlotRefs::default()
        });
        let archive = build_archive(&store, &record, &[]).await.expect("archive");

        let mut zip = ZipArchive::new(Cursor::new(archive.bytes)).expect("zip");
        let mut entry = zip.by_name("Pas_Foto_me.jpg").expect("entry");
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).expect("read");
        assert_eq!(contents, b"hello zip");
    }

    #[tokio::test]
    async fn submission_without_attachments_yields_empty_archive() {
        let store = MemoryStore::new();
        let record = submission(SlotRefs::default());

        let archive = build_archive(&store, &record, &[]).await.expect("archive");
        assert!(archive.entries.is_empty());
        assert!(entry_names(&archive.bytes).is_empty());
    }
}
