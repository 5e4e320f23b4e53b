use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use tower_http::services::ServeDir;

use crate::web::{AppState, admin, auth, content, submissions};

pub fn build_router(state: AppState) -> Router {
    let config = state.config();
    let uploads = ServeDir::new(&config.uploads_dir);
    let uploads_prefix = config.uploads_url_prefix.clone();
    let body_limit = config.max_upload_bytes;

    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/login", get(auth::login_page).post(auth::process_login))
        .route(
            "/register",
            get(auth::register_page).post(auth::process_register),
        )
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/session", get(auth::session_info))
        .route("/session/refresh", post(auth::refresh_session))
        .route("/account", get(auth::account_page))
        .route("/account/password", post(auth::change_password))
        .route("/dashboard", get(content::dashboard))
        .route("/pendaftaran", get(submissions::registration_page))
        .route("/daftar", post(submissions::create_submission))
        .route("/dashboard/data", get(submissions::own_submissions))
        .route("/lampiran/:id", get(submissions::view_attachments))
        .route("/lampiran/delete/:id", get(submissions::delete_photo))
        .route("/download/:id", get(submissions::download_archive))
        .route(
            "/edit/:id",
            get(submissions::edit_page).post(submissions::update_submission),
        )
        .route("/delete/:id", get(submissions::delete_submission))
        .route("/admin/data", get(submissions::admin_submissions))
        .route(
            "/admin/lampiran/:id",
            get(submissions::admin_view_attachments),
        )
        .route(
            "/admin/download/:id",
            get(submissions::admin_download_archive),
        )
        .route(
            "/admin/delete/:id",
            get(submissions::admin_delete_submission),
        )
        .route("/admin/users", get(admin::list_users))
        .route("/admin/set-role/:id", post(admin::set_role))
        .route("/admin/content", get(admin::manage_content))
        .route("/admin/content/create", post(admin::create_content))
        .route(
            "/admin/content/delete/:id",
            get(admin::delete_content).post(admin::delete_content),
        )
        .route("/api/contents", get(content::list_contents_json))
        .route("/content/:id", get(content::content_page))
        .nest_service(&uploads_prefix, uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn root() -> Redirect {
    Redirect::to("/dashboard")
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
