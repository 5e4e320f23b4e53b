use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::{
    accounts::Session,
    attachments::AttachmentStore,
    error::{PortalError, PortalResult},
    submissions::{
        AttachmentSlot, CATEGORY_OPTIONS, Realization, Scope, Submission, SubmissionDraft,
        SubmissionFields, SubmissionView,
        archive::ARCHIVE_CONTENT_TYPE,
    },
    web::{
        AppState,
        admin_utils::FlashQuery,
        auth::{require_admin, require_user},
        templates::{
            PageLayout, escape_html, is_web_url, render_attachment_preview, render_page,
            render_video_link,
        },
        uploads::{FileFieldConfig, MultipartForm, collect_multipart},
    },
};

const PRODUCT_PHOTO_FIELD: &str = "fotoProduk";

pub async fn registration_page(
    State(state): State<AppState>,
    jar: CookieJar,
) -> PortalResult<Html<String>> {
    let session = require_user(&state, &jar).await?;
    let form = render_submission_form(
        "/daftar",
        &SubmissionFields::default(),
        state.config().max_product_photos,
        "Kirim Pendaftaran",
    );

    Ok(Html(render_page(PageLayout {
        title: "Formulir Pendaftaran Inovasi",
        session: Some(&session),
        flash_html: "",
        body_html: &format!(r#"<section class="panel">{form}</section>"#),
    })))
}

pub async fn create_submission(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> PortalResult<Redirect> {
    let session = require_user(&state, &jar).await?;
    let form = collect_multipart(multipart, &file_fields(state.config().max_product_photos)).await?;
    let draft = draft_from_form(form)?;

    state.submissions().create(session.user_id, draft).await?;
    Ok(Redirect::to("/dashboard/data?status=submitted"))
}

pub async fn own_submissions(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> PortalResult<Html<String>> {
    let session = require_user(&state, &jar).await?;
    let submissions = state.submissions().list_own(session.user_id).await?;

    let mut rows = String::new();
    if submissions.is_empty() {
        rows.push_str(
            r#"<tr><td colspan="5">Belum ada pendaftaran. <a href="/pendaftaran">Daftar sekarang</a>.</td></tr>"#,
        );
    }
    for submission in &submissions {
        rows.push_str(&format!(
            r#"<tr>
                <td>{product}</td>
                <td>{innovator}</td>
                <td>{categories}</td>
                <td>{created}</td>
                <td>
                    <a href="/lampiran/{id}">Lampiran</a>
                    <a href="/edit/{id}">Ubah</a>
                    <a href="/download/{id}">Unduh ZIP</a>
                    <a href="/delete/{id}" onclick="return confirm('Hapus pendaftaran ini?')">Hapus</a>
                </td>
            </tr>"#,
            id = submission.id,
            product = escape_html(&submission.fields.product_name),
            innovator = escape_html(&submission.fields.innovator_name),
            categories = escape_html(&submission.fields.categories.join(", ")),
            created = submission.created_at.format("%d-%m-%Y %H:%M"),
        ));
    }

    let body = format!(
        r#"<section class="panel">
            <h2>Pendaftaran Saya</h2>
            <table>
                <thead><tr><th>Produk</th><th>Inovator</th><th>Bidang</th><th>Dibuat</th><th>Aksi</th></tr></thead>
                <tbody>{rows}</tbody>
            </table>
        </section>"#
    );

    Ok(Html(render_page(PageLayout {
        title: "Data Saya",
        session: Some(&session),
        flash_html: &flash.render(),
        body_html: &body,
    })))
}

pub async fn view_attachments(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Query(flash): Query<FlashQuery>,
) -> PortalResult<Html<String>> {
    let session = require_user(&state, &jar).await?;
    let view = state
        .submissions()
        .view(id, Scope::Owner(session.user_id))
        .await?;
    Ok(Html(render_attachment_page(&state, &session, &view, false, &flash)))
}

pub async fn admin_view_attachments(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Query(flash): Query<FlashQuery>,
) -> PortalResult<Html<String>> {
    let session = require_admin(&state, &jar).await?;
    let view = state.submissions().view(id, Scope::Unscoped).await?;
    Ok(Html(render_attachment_page(&state, &session, &view, true, &flash)))
}

pub async fn download_archive(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> PortalResult<Response> {
    let session = require_user(&state, &jar).await?;
    archive_response(&state, id, Scope::Owner(session.user_id)).await
}

pub async fn admin_download_archive(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> PortalResult<Response> {
    require_admin(&state, &jar).await?;
    archive_response(&state, id, Scope::Unscoped).await
}

async fn archive_response(state: &AppState, id: Uuid, scope: Scope) -> PortalResult<Response> {
    let archive = state.submissions().archive(id, scope).await?;
    let disposition = format!(r#"attachment; filename="{}""#, archive.file_name);

    Ok((
        [
            (header::CONTENT_TYPE, ARCHIVE_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive.bytes,
    )
        .into_response())
}

pub async fn edit_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Query(flash): Query<FlashQuery>,
) -> PortalResult<Html<String>> {
    let session = require_user(&state, &jar).await?;
    let view = state
        .submissions()
        .view(id, Scope::Owner(session.user_id))
        .await?;

    let form = render_submission_form(
        &format!("/edit/{id}"),
        &view.submission.fields,
        state.config().max_product_photos,
        "Simpan Perubahan",
    );
    let current = render_current_attachments(state.submissions().store(), &view, true);

    let body = format!(
        r#"<section class="panel">
            <h2>Lampiran Saat Ini</h2>
            <p class="note">Unggah berkas baru hanya untuk lampiran yang ingin diganti. Foto produk baru akan ditambahkan.</p>
            {current}
        </section>
        <section class="panel">{form}</section>"#
    );

    Ok(Html(render_page(PageLayout {
        title: "Ubah Pendaftaran",
        session: Some(&session),
        flash_html: &flash.render(),
        body_html: &body,
    })))
}

pub async fn update_submission(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> PortalResult<Redirect> {
    let session = require_user(&state, &jar).await?;
    let form = collect_multipart(multipart, &file_fields(state.config().max_product_photos)).await?;
    let draft = draft_from_form(form)?;

    state.submissions().edit(session.user_id, id, draft).await?;
    Ok(Redirect::to(&format!("/edit/{id}?status=updated")))
}

/// Delete one product photo and return to the page the requester can see.
pub async fn delete_photo(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(photo_id): Path<Uuid>,
) -> PortalResult<Redirect> {
    let session = require_user(&state, &jar).await?;
    let submission_id = state
        .submissions()
        .delete_photo(&session.requester(), photo_id)
        .await?;

    Ok(Redirect::to(&photo_delete_redirect(&session, submission_id)))
}

fn photo_delete_redirect(session: &Session, submission_id: Uuid) -> String {
    if session.is_admin() {
        format!("/admin/lampiran/{submission_id}?status=photo_deleted")
    } else {
        format!("/edit/{submission_id}?status=photo_deleted")
    }
}

pub async fn delete_submission(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> PortalResult<Redirect> {
    let session = require_user(&state, &jar).await?;
    state
        .submissions()
        .delete_submission(id, Scope::Owner(session.user_id))
        .await?;
    Ok(Redirect::to("/dashboard/data?status=deleted"))
}

pub async fn admin_delete_submission(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> PortalResult<Redirect> {
    require_admin(&state, &jar).await?;
    state
        .submissions()
        .delete_submission(id, Scope::Unscoped)
        .await?;
    Ok(Redirect::to("/admin/data?status=deleted"))
}

pub async fn admin_submissions(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> PortalResult<Html<String>> {
    let session = require_admin(&state, &jar).await?;
    let overviews = state.submissions().list_all().await?;

    let mut rows = String::new();
    if overviews.is_empty() {
        rows.push_str(r#"<tr><td colspan="8">Belum ada data pendaftar.</td></tr>"#);
    }
    for overview in &overviews {
        let submission = &overview.submission;
        let attachment_count =
            submission.attachments.present().count() as i64 + overview.photo_count;
        rows.push_str(&format!(
            r#"<tr>
                <td>{innovator}</td>
                <td>{email}<br>{phone}</td>
                <td>{product}</td>
                <td>{categories}</td>
                <td>{realization}</td>
                <td>{owner}</td>
                <td>{attachment_count}</td>
                <td>
                    <a href="/admin/lampiran/{id}">Lampiran</a>
                    <a href="/admin/download/{id}">Unduh ZIP</a>
                    <a href="/admin/delete/{id}" onclick="return confirm('Hapus pendaftaran ini?')">Hapus</a>
                </td>
            </tr>"#,
            id = submission.id,
            innovator = escape_html(&submission.fields.innovator_name),
            email = escape_html(&submission.fields.email),
            phone = escape_html(&submission.fields.phone),
            product = escape_html(&submission.fields.product_name),
            categories = escape_html(&submission.fields.categories.join(", ")),
            realization = submission
                .fields
                .realization
                .map(|r| r.label())
                .unwrap_or("-"),
            owner = escape_html(&overview.owner_username),
        ));
    }

    let body = format!(
        r#"<section class="panel">
            <h2>Semua Pendaftar ({count})</h2>
            <table>
                <thead><tr><th>Inovator</th><th>Kontak</th><th>Produk</th><th>Bidang</th><th>Realisasi</th><th>Akun</th><th>Lampiran</th><th>Aksi</th></tr></thead>
                <tbody>{rows}</tbody>
            </table>
        </section>"#,
        count = overviews.len(),
    );

    Ok(Html(render_page(PageLayout {
        title: "Data Pendaftar",
        session: Some(&session),
        flash_html: &flash.render(),
        body_html: &body,
    })))
}

fn file_fields(max_product_photos: usize) -> Vec<FileFieldConfig<'static>> {
    AttachmentSlot::ALL
        .iter()
        .map(|slot| FileFieldConfig::new(slot.form_field(), 1))
        .chain(std::iter::once(FileFieldConfig::new(
            PRODUCT_PHOTO_FIELD,
            max_product_photos,
        )))
        .collect()
}

/// Turn the wire fields of the registration/edit form into a draft.
pub fn draft_from_form(mut form: MultipartForm) -> PortalResult<SubmissionDraft> {
    let realization = match form.text("inovasiYangDihasilkan") {
        None => None,
        Some(raw) => Some(Realization::parse(&raw).ok_or_else(|| {
            PortalError::validation("Pilihan inovasi yang dihasilkan tidak valid.")
        })?),
    };

    let video_url = form.text("videoProduk");
    if video_url.as_deref().is_some_and(|url| !is_web_url(url)) {
        return Err(PortalError::validation(
            "Tautan video harus diawali http:// atau https://.",
        ));
    }

    let categories = form
        .text_values("bidang")
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect();

    let fields = SubmissionFields {
        innovator_name: form.text_or_empty("namaInovator"),
        email: form.text_or_empty("alamatEmail"),
        phone: form.text_or_empty("nomorHp"),
        participation: form.text("indiKelom"),
        group_members: form.text("anggotaKelompok"),
        identity_number: form.text("identitasDiri"),
        categories,
        product_name: form.text_or_empty("namaProduk"),
        background: form.text("latarProduk"),
        objective: form.text("tujuanProduk"),
        description: form.text("uraianInovasi"),
        realization,
        video_url,
    };

    let slot_files = AttachmentSlot::ALL
        .into_iter()
        .filter_map(|slot| form.take_file(slot.form_field()).map(|file| (slot, file)))
        .collect();
    let product_photos = form.take_files(PRODUCT_PHOTO_FIELD);

    Ok(SubmissionDraft {
        fields,
        slot_files,
        product_photos,
    })
}

fn text_input(label: &str, name: &str, kind: &str, value: &str, required: bool) -> String {
    format!(
        r#"<label for="{name}">{label}{marker}</label><input id="{name}" type="{kind}" name="{name}" value="{value}"{required}>"#,
        marker = if required { " *" } else { "" },
        value = escape_html(value),
        required = if required { " required" } else { "" },
    )
}

fn text_area(label: &str, name: &str, value: Option<&str>) -> String {
    format!(
        r#"<label for="{name}">{label}</label><textarea id="{name}" name="{name}">{value}</textarea>"#,
        value = escape_html(value.unwrap_or_default()),
    )
}

fn render_submission_form(
    action: &str,
    fields: &SubmissionFields,
    max_product_photos: usize,
    submit_label: &str,
) -> String {
    let participation = fields.participation.as_deref().unwrap_or_default();
    let participation_options = ["Individu", "Kelompok"]
        .iter()
        .map(|option| {
            format!(
                r#"<option value="{option}"{selected}>{option}</option>"#,
                selected = if participation == *option { " selected" } else { "" },
            )
        })
        .collect::<String>();

    let category_boxes = CATEGORY_OPTIONS
        .iter()
        .map(|option| {
            let checked = fields.categories.iter().any(|c| c == option);
            format!(
                r#"<label><input type="checkbox" name="bidang[]" value="{value}"{checked}> {value}</label>"#,
                value = escape_html(option),
                checked = if checked { " checked" } else { "" },
            )
        })
        .collect::<String>();

    let realization_options = Realization::ALL
        .iter()
        .map(|option| {
            format!(
                r#"<option value="{value}"{selected}>{label}</option>"#,
                value = option.as_str(),
                label = option.label(),
                selected = if fields.realization == Some(*option) {
                    " selected"
                } else {
                    ""
                },
            )
        })
        .collect::<String>();

    format!(
        r#"<form method="post" action="{action}" enctype="multipart/form-data">
            {name}
            {email}
            {phone}
            <label for="indiKelom">Keikutsertaan</label>
            <select id="indiKelom" name="indiKelom"><option value="">Pilih</option>{participation_options}</select>
            {members}
            {identity}
            <label>Bidang Inovasi</label>
            <div class="checkbox-grid">{category_boxes}</div>
            {product}
            {background}
            {objective}
            {description}
            <label for="inovasiYangDihasilkan">Inovasi yang Dihasilkan</label>
            <select id="inovasiYangDihasilkan" name="inovasiYangDihasilkan"><option value="">Pilih</option>{realization_options}</select>
            {video}
            <label for="foto">Pas Foto</label><input id="foto" type="file" name="foto" accept="image/*">
            <label for="fotoIdentitas">Foto Identitas</label><input id="fotoIdentitas" type="file" name="fotoIdentitas" accept="image/*,application/pdf">
            <label for="legalitas">Legalitas</label><input id="legalitas" type="file" name="legalitas">
            <label for="fotoProduk">Foto Produk (maksimal {max_product_photos})</label><input id="fotoProduk" type="file" name="fotoProduk" accept="image/*" multiple>
            <button type="submit">{submit_label}</button>
        </form>"#,
        name = text_input("Nama Inovator", "namaInovator", "text", &fields.innovator_name, true),
        email = text_input("Alamat Email", "alamatEmail", "email", &fields.email, true),
        phone = text_input("Nomor HP", "nomorHp", "text", &fields.phone, true),
        members = text_area("Anggota Kelompok", "anggotaKelompok", fields.group_members.as_deref()),
        identity = text_input(
            "Nomor Identitas Diri",
            "identitasDiri",
            "text",
            fields.identity_number.as_deref().unwrap_or_default(),
            false,
        ),
        product = text_input("Nama Produk", "namaProduk", "text", &fields.product_name, true),
        background = text_area("Latar Belakang Produk", "latarProduk", fields.background.as_deref()),
        objective = text_area("Tujuan Produk", "tujuanProduk", fields.objective.as_deref()),
        description = text_area("Uraian Inovasi", "uraianInovasi", fields.description.as_deref()),
        video = text_input(
            "Tautan Video Produk",
            "videoProduk",
            "url",
            fields.video_url.as_deref().unwrap_or_default(),
            false,
        ),
    )
}

fn render_current_attachments(
    store: &dyn AttachmentStore,
    view: &SubmissionView,
    with_photo_delete: bool,
) -> String {
    let submission = &view.submission;
    let mut html = String::from(r#"<div class="attachments">"#);

    for (slot, reference) in submission.attachments.present() {
        html.push_str(&render_attachment_preview(
            slot.label(),
            reference,
            &store.resolve_url(reference),
        ));
    }

    for (idx, photo) in view.photos.iter().enumerate() {
        let mut card = render_attachment_preview(
            &format!("Foto Produk {}", idx + 1),
            &photo.reference,
            &store.resolve_url(&photo.reference),
        );
        if with_photo_delete {
            let link = format!(
                r#"<p><a class="danger" href="/lampiran/delete/{}" onclick="return confirm('Hapus foto ini?')">Hapus foto</a></p></div>"#,
                photo.id
            );
            if let Some(stripped) = card.strip_suffix("</div>") {
                card = format!("{stripped}{link}");
            }
        }
        html.push_str(&card);
    }

    if let Some(url) = submission.fields.video_url.as_deref() {
        html.push_str(&render_video_link(url));
    }

    if view.attachment_count() == 0 && submission.fields.video_url.is_none() {
        html.push_str(r#"<p class="note">Belum ada lampiran.</p>"#);
    }

    html.push_str("</div>");
    html
}

fn render_details(submission: &Submission) -> String {
    let fields = &submission.fields;
    let rows = [
        ("Nama Inovator", Some(fields.innovator_name.as_str())),
        ("Alamat Email", Some(fields.email.as_str())),
        ("Nomor HP", Some(fields.phone.as_str())),
        ("Keikutsertaan", fields.participation.as_deref()),
        ("Anggota Kelompok", fields.group_members.as_deref()),
        ("Identitas Diri", fields.identity_number.as_deref()),
        ("Nama Produk", Some(fields.product_name.as_str())),
        ("Latar Belakang", fields.background.as_deref()),
        ("Tujuan", fields.objective.as_deref()),
        ("Uraian Inovasi", fields.description.as_deref()),
        ("Inovasi yang Dihasilkan", fields.realization.map(|r| r.label())),
    ];

    let mut html = String::from("<table><tbody>");
    for (label, value) in rows {
        html.push_str(&format!(
            "<tr><th>{label}</th><td>{}</td></tr>",
            escape_html(value.unwrap_or("-"))
        ));
    }
    html.push_str(&format!(
        "<tr><th>Bidang</th><td>{}</td></tr></tbody></table>",
        escape_html(&fields.categories.join(", "))
    ));
    html
}

fn render_attachment_page(
    state: &AppState,
    session: &Session,
    view: &SubmissionView,
    admin_view: bool,
    flash: &FlashQuery,
) -> String {
    let id = view.submission.id;
    let (download, back) = if admin_view {
        (format!("/admin/download/{id}"), "/admin/data")
    } else {
        (format!("/download/{id}"), "/dashboard/data")
    };

    let body = format!(
        r#"<section class="panel">
            <h2>{product}</h2>
            {details}
            <p><a href="{download}">Unduh semua lampiran (ZIP)</a> · <a href="{back}">Kembali</a></p>
        </section>
        <section class="panel">
            <h2>Lampiran</h2>
            {attachments}
        </section>"#,
        product = escape_html(&view.submission.fields.product_name),
        details = render_details(&view.submission),
        attachments = render_current_attachments(state.submissions().store(), view, admin_view),
    );

    render_page(PageLayout {
        title: "Lampiran Pendaftaran",
        session: Some(session),
        flash_html: &flash.render(),
        body_html: &body,
    })
}
