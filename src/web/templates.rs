use chrono::{Datelike, Utc};

use crate::{accounts::Session, attachments::AttachmentRef};

const PAGE_BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
        header { background: #ffffff; padding: 1.5rem; border-bottom: 1px solid #e2e8f0; }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; }
        .header-bar h1 { margin: 0; font-size: 1.5rem; }
        nav { display: flex; gap: 0.6rem; flex-wrap: wrap; align-items: center; }
        nav a, .nav-button { display: inline-flex; align-items: center; color: #1d4ed8; text-decoration: none; font-weight: 600; background: #e0f2fe; padding: 0.45rem 0.9rem; border-radius: 999px; border: 1px solid #bfdbfe; font-size: 0.95rem; cursor: pointer; }
        nav a.admin-link { color: #0f172a; background: #fee2e2; border-color: #fecaca; }
        nav form { margin: 0; }
        main { padding: 2rem 1.5rem; max-width: 1040px; margin: 0 auto; box-sizing: border-box; }
        section { margin-bottom: 2rem; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); }
        .panel h2 { margin-top: 0; }
        label { display: block; margin: 1rem 0 0.4rem; font-weight: 600; }
        input[type="text"], input[type="email"], input[type="url"], input[type="password"], input[type="file"], textarea, select { width: 100%; padding: 0.7rem; border-radius: 8px; border: 1px solid #cbd5f5; background: #f8fafc; color: #0f172a; box-sizing: border-box; font-size: 0.95rem; }
        textarea { min-height: 6rem; }
        .checkbox-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(240px, 1fr)); gap: 0.35rem 1rem; }
        .checkbox-grid label { font-weight: 400; margin: 0; }
        button { margin-top: 1.25rem; padding: 0.8rem 1.2rem; border: none; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; }
        button:hover { background: #1d4ed8; }
        button.danger, a.danger { background: #dc2626; color: #ffffff; }
        table { width: 100%; border-collapse: collapse; margin-top: 1rem; background: #ffffff; }
        th, td { padding: 0.65rem 0.85rem; border: 1px solid #e2e8f0; text-align: left; font-size: 0.92rem; vertical-align: top; }
        th { background: #f1f5f9; }
        td a { color: #2563eb; font-weight: 600; text-decoration: none; margin-right: 0.6rem; }
        .error-box { margin: 1rem 0; padding: 1rem; border-radius: 10px; background: #fee2e2; color: #991b1b; border: 1px solid #fecaca; }
        .success-box { margin: 1rem 0; padding: 1rem; border-radius: 10px; background: #dcfce7; color: #166534; border: 1px solid #bbf7d0; }
        .flash { margin: 1rem 0; padding: 0.85rem 1rem; border-radius: 10px; }
        .flash.success { background: #dcfce7; color: #166534; }
        .flash.error { background: #fee2e2; color: #991b1b; }
        .note { color: #475569; font-size: 0.95rem; line-height: 1.6; }
        .attachments { display: grid; grid-template-columns: repeat(auto-fill, minmax(260px, 1fr)); gap: 1rem; }
        .attachment { border: 1px solid #e2e8f0; border-radius: 10px; padding: 0.75rem; background: #ffffff; }
        .attachment h3 { margin: 0 0 0.5rem; font-size: 1rem; }
        .attachment img, .attachment video { width: 100%; border-radius: 8px; }
        .attachment iframe { width: 100%; height: 320px; border: none; }
        .cards { display: grid; grid-template-columns: repeat(auto-fill, minmax(280px, 1fr)); gap: 1rem; }
        .card { background: #ffffff; border: 1px solid #e2e8f0; border-radius: 12px; overflow: hidden; }
        .card img { width: 100%; max-height: 180px; object-fit: cover; }
        .card .card-body { padding: 1rem; }
        .app-footer { margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
        @media (max-width: 768px) {
            main { padding: 1.25rem 1rem; }
            .header-bar { flex-direction: column; align-items: flex-start; }
            th, td { padding: 0.5rem; }
        }
"#;

/// Everything the shared page shell needs.
pub struct PageLayout<'a> {
    pub title: &'a str,
    pub session: Option<&'a Session>,
    pub flash_html: &'a str,
    pub body_html: &'a str,
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        title,
        session,
        flash_html,
        body_html,
    } = layout;

    let nav = render_nav(session);
    let footer = render_footer();
    let title = escape_html(title);

    format!(
        r#"<!DOCTYPE html>
<html lang="id">
<head>
    <meta charset="UTF-8">
    <title>{title} | Portal Inovasi</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
{PAGE_BASE_STYLES}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <h1>{title}</h1>
            {nav}
        </div>
    </header>
    <main>
        {flash_html}
        {body_html}
        {footer}
    </main>
</body>
</html>"#
    )
}

fn render_nav(session: Option<&Session>) -> String {
    let Some(session) = session else {
        return r#"<nav><a href="/login">Masuk</a><a href="/register">Daftar Akun</a></nav>"#
            .to_string();
    };

    let admin_links = if session.is_admin() {
        r#"<a class="admin-link" href="/admin/data">Data Pendaftar</a>
            <a class="admin-link" href="/admin/users">Pengguna</a>
            <a class="admin-link" href="/admin/content">Konten</a>"#
    } else {
        ""
    };

    format!(
        r#"<nav>
            <a href="/dashboard">Beranda</a>
            <a href="/pendaftaran">Pendaftaran</a>
            <a href="/dashboard/data">Data Saya</a>
            {admin_links}
            <form method="post" action="/logout"><button type="submit" class="nav-button">Keluar ({username})</button></form>
        </nav>"#,
        username = escape_html(&session.username),
    )
}

pub fn render_login_page(flash_html: &str) -> String {
    let body = r#"<section class="panel">
            <h2>Masuk</h2>
            <form method="post" action="/login">
                <label for="username">Username</label>
                <input id="username" type="text" name="username" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" required>
                <button type="submit">Masuk</button>
            </form>
            <p class="note">Belum punya akun? <a href="/register">Daftar di sini</a>.</p>
        </section>"#;

    render_page(PageLayout {
        title: "Masuk",
        session: None,
        flash_html,
        body_html: body,
    })
}

pub fn render_register_page(flash_html: &str) -> String {
    let body = r#"<section class="panel">
            <h2>Buat Akun</h2>
            <form method="post" action="/register">
                <label for="username">Username</label>
                <input id="username" type="text" name="username" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" required>
                <button type="submit">Daftar</button>
            </form>
            <p class="note">Sudah punya akun? <a href="/login">Masuk</a>.</p>
        </section>"#;

    render_page(PageLayout {
        title: "Daftar Akun",
        session: None,
        flash_html,
        body_html: body,
    })
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(r#"<footer class="app-footer">© {current_year} Portal Pendaftaran Inovasi</footer>"#)
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Inline error block; rendered for every failure that is not a login redirect.
pub fn error_fragment(message: &str) -> String {
    format!(r#"<div class="error-box">{}</div>"#, escape_html(message))
}

/// How an attachment is shown inline, decided by its file extension.
#[derive(Debug, Eq, PartialEq)]
pub enum PreviewKind {
    Image,
    Video,
    Pdf,
    Download,
}

pub fn preview_kind(reference: &AttachmentRef) -> PreviewKind {
    match reference.extension().as_deref() {
        Some("jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "svg") => PreviewKind::Image,
        Some("mp4" | "webm" | "ogg" | "mov") => PreviewKind::Video,
        Some("pdf") => PreviewKind::Pdf,
        _ => PreviewKind::Download,
    }
}

pub fn render_attachment_preview(label: &str, reference: &AttachmentRef, url: &str) -> String {
    let label = escape_html(label);
    let url = escape_html(url);
    let name = escape_html(&reference.base_name());

    let preview = match preview_kind(reference) {
        PreviewKind::Image => format!(r#"<img src="{url}" alt="{label}">"#),
        PreviewKind::Video => format!(r#"<video src="{url}" controls></video>"#),
        PreviewKind::Pdf => format!(r#"<iframe src="{url}" title="{label}"></iframe>"#),
        PreviewKind::Download => String::new(),
    };

    format!(
        r#"<div class="attachment"><h3>{label}</h3>{preview}<p><a href="{url}" target="_blank" rel="noopener">{name}</a></p></div>"#
    )
}

/// True for absolute `http://` or `https://` URLs, the only schemes rendered as links.
pub fn is_web_url(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}

/// Video links are never uploaded; embed known hosts and link other web URLs.
pub fn render_video_link(url: &str) -> String {
    let escaped = escape_html(url);
    if !is_web_url(url) {
        return format!(
            r#"<div class="attachment"><h3>Video Produk</h3><p>{escaped}</p></div>"#
        );
    }

    let embed = youtube_embed_url(url)
        .map(|embed| {
            format!(
                r#"<iframe src="{}" title="Video Produk" allowfullscreen></iframe>"#,
                escape_html(&embed)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<div class="attachment"><h3>Video Produk</h3>{embed}<p><a href="{escaped}" target="_blank" rel="noopener">{escaped}</a></p></div>"#
    )
}

fn youtube_embed_url(url: &str) -> Option<String> {
    let id = if let Some((_, rest)) = url.split_once("youtube.com/watch?v=") {
        rest
    } else if let Some((_, rest)) = url.split_once("youtu.be/") {
        rest
    } else {
        return None;
    };

    let id = id.split(['&', '?', '#', '/']).next().unwrap_or_default();
    if id.is_empty() {
        None
    } else {
        Some(format!("https://www.youtube.com/embed/{id}"))
    }
}
