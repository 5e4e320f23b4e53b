use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::error;
use uuid::Uuid;

use crate::{
    attachments::AttachmentStore,
    content::{self, ContentItem, DashboardContent},
    error::{PortalError, PortalResult},
    web::{
        AppState,
        admin_utils::FlashQuery,
        auth::{current_session, require_user},
        responses::json_error,
        templates::{PageLayout, escape_html, render_page},
    },
};

pub async fn list_contents_json(State(state): State<AppState>) -> Response {
    match content::list_contents(state.pool_ref()).await {
        Ok(contents) => {
            let items = contents
                .into_iter()
                .map(|content| ContentItem::from_content(content, state.attachments()))
                .collect::<Vec<_>>();
            Json(items).into_response()
        }
        Err(err) => {
            error!(?err, "failed to load dashboard contents");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Gagal memuat konten: {err}"),
            )
            .into_response()
        }
    }
}

pub async fn content_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> PortalResult<Html<String>> {
    let Some(content) = content::find_content(state.pool_ref(), id).await? else {
        return Err(PortalError::not_found("Konten tidak ditemukan."));
    };
    let session = current_session(&state, &jar).await?;

    let image = content
        .image
        .as_ref()
        .map(|reference| {
            format!(
                r#"<img src="{}" alt="{}" style="max-width:100%;border-radius:12px;">"#,
                escape_html(&state.attachments().resolve_url(reference)),
                escape_html(&content.title),
            )
        })
        .unwrap_or_default();

    let body = format!(
        r#"<article class="panel">
            {image}
            <h2>{title}</h2>
            <p class="note">{created}</p>
            <p>{description}</p>
        </article>"#,
        title = escape_html(&content.title),
        created = content.created_at.format("%d-%m-%Y"),
        description = escape_html(&content.description).replace('\n', "<br>"),
    );

    Ok(Html(render_page(PageLayout {
        title: &content.title,
        session: session.as_ref(),
        flash_html: "",
        body_html: &body,
    })))
}

pub async fn dashboard(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> PortalResult<Html<String>> {
    let session = require_user(&state, &jar).await?;
    let contents = content::list_contents(state.pool_ref()).await?;

    let admin_note = if session.is_admin() {
        r#"<p class="note">Anda masuk sebagai admin. Kelola data melalui menu admin di atas.</p>"#
    } else {
        ""
    };

    let body = format!(
        r#"<section class="panel">
            <h2>Selamat datang, {username}</h2>
            <p class="note">Daftarkan inovasi Anda melalui menu <a href="/pendaftaran">Pendaftaran</a> dan pantau data di <a href="/dashboard/data">Data Saya</a>. Ganti password di halaman <a href="/account">Akun</a>.</p>
            {admin_note}
        </section>
        <section>
            <h2>Pengumuman</h2>
            {cards}
        </section>"#,
        username = escape_html(&session.username),
        cards = render_content_cards(&contents, state.attachments()),
    );

    Ok(Html(render_page(PageLayout {
        title: "Beranda",
        session: Some(&session),
        flash_html: &flash.render(),
        body_html: &body,
    })))
}

pub fn render_content_cards(contents: &[DashboardContent], store: &dyn AttachmentStore) -> String {
    if contents.is_empty() {
        return r#"<p class="note">Belum ada pengumuman.</p>"#.to_string();
    }

    let cards = contents
        .iter()
        .map(|content| {
            let image = content
                .image
                .as_ref()
                .map(|reference| {
                    format!(
                        r#"<img src="{}" alt="">"#,
                        escape_html(&store.resolve_url(reference))
                    )
                })
                .unwrap_or_default();
            format!(
                r#"<div class="card">{image}<div class="card-body"><h3><a href="/content/{id}">{title}</a></h3><p>{summary}</p></div></div>"#,
                id = content.id,
                title = escape_html(&content.title),
                summary = escape_html(&summarize(&content.description, 160)),
            )
        })
        .collect::<String>();

    format!(r#"<div class="cards">{cards}</div>"#)
}

fn summarize(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head = chars.by_ref().take(max_chars).collect::<String>();
    if chars.next().is_some() {
        format!("{}…", head.trim_end())
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::attachments::{AttachmentRef, memory::MemoryStore};

    #[test]
    fn summary_truncates_on_char_boundary() {
        assert_eq!(summarize("pendek", 10), "pendek");
        assert_eq!(summarize("ééééé", 3), "ééé…");
    }

    #[test]
    fn cards_link_to_content_pages() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        let contents = vec![DashboardContent {
            id,
            title: "Lomba <2025>".into(),
            description: "Isi".into(),
            image: Some(AttachmentRef::Local("b.png".into())),
            created_at: Utc::now(),
        }];

        let html = render_content_cards(&contents, &store);
        assert!(html.contains(&format!("/content/{id}")));
        assert!(html.contains("Lomba &lt;2025&gt;"));
        assert!(html.contains("/uploads/b.png"));
        assert!(render_content_cards(&[], &store).contains("Belum ada"));
    }
}
