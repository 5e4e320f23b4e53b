use axum::{
    extract::{Multipart, Path, Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;
use uuid::Uuid;

use crate::{
    attachments::delete_best_effort,
    content::{self, DashboardContent},
    error::{PortalError, PortalResult},
    web::{
        AppState,
        admin_utils::FlashQuery,
        auth::require_admin,
        templates::{PageLayout, escape_html, render_page},
        uploads::{FileFieldConfig, collect_multipart},
    },
};

const IMAGE_FIELD: &str = "image";

pub async fn manage_content(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> PortalResult<Html<String>> {
    let session = require_admin(&state, &jar).await?;
    let contents = content::list_contents(state.pool_ref()).await?;

    let body = format!(
        r#"<section class="panel">
            <h2>Tambah Konten</h2>
            <form method="post" action="/admin/content/create" enctype="multipart/form-data">
                <label for="title">Judul *</label>
                <input id="title" type="text" name="title" required>
                <label for="description">Deskripsi</label>
                <textarea id="description" name="description"></textarea>
                <label for="image">Gambar</label>
                <input id="image" type="file" name="image" accept="image/*">
                <button type="submit">Simpan</button>
            </form>
        </section>
        <section class="panel">
            <h2>Daftar Konten</h2>
            <table>
                <thead><tr><th>Judul</th><th>Dibuat</th><th>Aksi</th></tr></thead>
                <tbody>{rows}</tbody>
            </table>
        </section>"#,
        rows = render_content_rows(&contents),
    );

    Ok(Html(render_page(PageLayout {
        title: "Kelola Konten",
        session: Some(&session),
        flash_html: &flash.render(),
        body_html: &body,
    })))
}

fn render_content_rows(contents: &[DashboardContent]) -> String {
    if contents.is_empty() {
        return r#"<tr><td colspan="3">Belum ada konten.</td></tr>"#.to_string();
    }

    contents
        .iter()
        .map(|content| {
            format!(
                r#"<tr>
                    <td><a href="/content/{id}">{title}</a></td>
                    <td>{created}</td>
                    <td><form method="post" action="/admin/content/delete/{id}" onsubmit="return confirm('Hapus konten ini?')"><button type="submit" class="danger" style="margin-top:0;">Hapus</button></form></td>
                </tr>"#,
                id = content.id,
                title = escape_html(&content.title),
                created = content.created_at.format("%d-%m-%Y %H:%M"),
            )
        })
        .collect()
}

pub async fn create_content(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> PortalResult<Redirect> {
    let admin = require_admin(&state, &jar).await?;
    let mut form = collect_multipart(multipart, &[FileFieldConfig::new(IMAGE_FIELD, 1)]).await?;

    let Some(title) = form.text("title") else {
        return Err(PortalError::validation("Judul konten harus diisi."));
    };
    let description = form.text_or_empty("description");

    let image = match form.take_file(IMAGE_FIELD) {
        Some(upload) => Some(state.attachments().store(&upload).await?),
        None => None,
    };

    let inserted =
        content::insert_content(state.pool_ref(), &title, &description, image.as_ref(), admin.user_id)
            .await;

    match inserted {
        Ok(id) => {
            info!(content_id = %id, admin_id = %admin.user_id, "dashboard content created");
            Ok(Redirect::to("/admin/content?status=content_created"))
        }
        Err(err) => {
            if let Some(image) = image {
                delete_best_effort(state.attachments(), &[image]).await;
            }
            Err(err.into())
        }
    }
}

pub async fn delete_content(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> PortalResult<Redirect> {
    require_admin(&state, &jar).await?;

    let Some(image) = content::delete_content(state.pool_ref(), id).await? else {
        return Ok(Redirect::to("/admin/content?error=content_missing"));
    };

    if let Some(image) = image {
        delete_best_effort(state.attachments(), &[image]).await;
    }

    info!(content_id = %id, "dashboard content deleted");
    Ok(Redirect::to("/admin/content?status=content_deleted"))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn rows_escape_titles_and_post_deletes() {
        let id = Uuid::new_v4();
        let html = render_content_rows(&[DashboardContent {
            id,
            title: "A & B".into(),
            description: String::new(),
            image: None,
            created_at: Utc::now(),
        }]);

        assert!(html.contains("A &amp; B"));
        assert!(html.contains(&format!(r#"action="/admin/content/delete/{id}""#)));
        assert!(render_content_rows(&[]).contains("Belum ada konten"));
    }
}
