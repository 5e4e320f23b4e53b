use axum::{
    Json,
    extract::{Form, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration as CookieDuration;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    accounts::{self, AccountStore, Role, Session},
    error::{PortalError, PortalResult},
    web::{
        AppState,
        admin_utils::FlashQuery,
        responses::json_error,
        templates::{
            PageLayout, error_fragment, render_login_page, render_page, render_register_page,
        },
    },
};

pub const SESSION_COOKIE: &str = "portal_session";

pub const PASSWORD_UPDATED_REDIRECT: &str = "/account?status=password_updated";

const ADMIN_ONLY_MESSAGE: &str = "Akses ditolak. Hanya admin yang boleh mengakses halaman ini.";

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
}

/// Identity snapshot exposed by `GET /session`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        SessionInfo {
            user_id: session.user_id,
            username: session.username.clone(),
            role: session.role,
        }
    }
}

/// Resolve the session cookie to its stored snapshot. The users table is not consulted.
pub async fn resolve_session(
    accounts: &dyn AccountStore,
    jar: &CookieJar,
) -> PortalResult<Option<Session>> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };
    let Ok(token) = Uuid::parse_str(cookie.value()) else {
        return Ok(None);
    };

    Ok(accounts.find_session(token).await?)
}

pub fn authorize_admin(session: Session) -> PortalResult<Session> {
    if session.is_admin() {
        Ok(session)
    } else {
        Err(PortalError::forbidden(ADMIN_ONLY_MESSAGE))
    }
}

pub async fn current_session(state: &AppState, jar: &CookieJar) -> PortalResult<Option<Session>> {
    resolve_session(state.accounts(), jar).await
}

/// Authenticated gate: no valid session redirects to the login page.
pub async fn require_user(state: &AppState, jar: &CookieJar) -> PortalResult<Session> {
    current_session(state, jar)
        .await?
        .ok_or(PortalError::AuthRequired)
}

/// Admin gate: a signed-in non-admin gets an inline denial instead of a redirect.
pub async fn require_admin(state: &AppState, jar: &CookieJar) -> PortalResult<Session> {
    authorize_admin(require_user(state, jar).await?)
}

fn session_cookie(token: Uuid, ttl_hours: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::hours(ttl_hours));
    cookie
}

fn removal_cookie() -> Cookie<'static> {
    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Lax);
    removal.set_max_age(CookieDuration::seconds(0));
    removal
}

pub async fn login_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> Response {
    match current_session(&state, &jar).await {
        Ok(Some(_)) => Redirect::to("/dashboard").into_response(),
        Ok(None) => Html(render_login_page(&flash.render())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), Response> {
    let ttl_hours = state.config().session_ttl_hours;
    let session = accounts::login(state.accounts(), &form.username, &form.password, ttl_hours)
        .await
        .map_err(|err| match err {
            PortalError::Validation(message) => (
                StatusCode::UNAUTHORIZED,
                Html(render_login_page(&error_fragment(&message))),
            )
                .into_response(),
            other => other.into_response(),
        })?;

    info!(user_id = %session.user_id, role = session.role.as_str(), "user logged in");
    let jar = jar.add(session_cookie(session.token, ttl_hours));
    Ok((jar, Redirect::to("/dashboard")))
}

pub async fn register_page(Query(flash): Query<FlashQuery>) -> Html<String> {
    Html(render_register_page(&flash.render()))
}

pub async fn process_register(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, Response> {
    accounts::register(state.accounts(), &form.username, &form.password)
        .await
        .map_err(|err| match err {
            PortalError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                Html(render_register_page(&error_fragment(&message))),
            )
                .into_response(),
            other => other.into_response(),
        })?;

    Ok(Redirect::to("/login?status=registered"))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(token) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
    {
        if let Err(err) = state.accounts().delete_session(token).await {
            error!(?err, "failed to remove session during logout");
        }
    }

    (jar.remove(removal_cookie()), Redirect::to("/login?status=logged_out"))
}

pub async fn session_info(State(state): State<AppState>, jar: CookieJar) -> Response {
    match current_session(&state, &jar).await {
        Ok(Some(session)) => Json(SessionInfo::from(&session)).into_response(),
        Ok(None) => json_error(StatusCode::UNAUTHORIZED, "Sesi tidak ditemukan.").into_response(),
        Err(err) => {
            error!(?err, "failed to resolve session");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, err.user_message()).into_response()
        }
    }
}

/// Re-read the user row and rewrite the session snapshot, extending its expiry.
pub async fn refresh_session(State(state): State<AppState>, jar: CookieJar) -> Response {
    let session = match current_session(&state, &jar).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            return json_error(StatusCode::UNAUTHORIZED, "Sesi tidak ditemukan.").into_response();
        }
        Err(err) => {
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, err.user_message())
                .into_response();
        }
    };

    let ttl_hours = state.config().session_ttl_hours;
    match accounts::refresh_session(state.accounts(), &session, ttl_hours).await {
        Ok(refreshed) => {
            let jar = jar.add(session_cookie(refreshed.token, ttl_hours));
            (jar, Json(SessionInfo::from(&refreshed))).into_response()
        }
        Err(PortalError::AuthRequired) => {
            (
                jar.remove(removal_cookie()),
                json_error(StatusCode::UNAUTHORIZED, "Sesi tidak berlaku lagi."),
            )
                .into_response()
        }
        Err(err) => json_error(StatusCode::INTERNAL_SERVER_ERROR, err.user_message()).into_response(),
    }
}

pub async fn account_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> PortalResult<Html<String>> {
    let session = require_user(&state, &jar).await?;

    let body = r#"<section class="panel">
            <h2>Ganti Password</h2>
            <form method="post" action="/account/password">
                <label for="current_password">Password Lama</label>
                <input id="current_password" type="password" name="current_password" required>
                <label for="new_password">Password Baru</label>
                <input id="new_password" type="password" name="new_password" required>
                <button type="submit">Simpan</button>
            </form>
        </section>"#;

    Ok(Html(render_page(PageLayout {
        title: "Akun Saya",
        session: Some(&session),
        flash_html: &flash.render(),
        body_html: body,
    })))
}

pub async fn change_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ChangePasswordForm>,
) -> PortalResult<Redirect> {
    let session = require_user(&state, &jar).await?;

    accounts::change_password(
        state.accounts(),
        session.user_id,
        &form.current_password,
        &form.new_password,
    )
    .await?;

    info!(user_id = %session.user_id, "password changed");
    Ok(Redirect::to(PASSWORD_UPDATED_REDIRECT))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::accounts::memory::MemoryAccountStore;

    fn jar_with(token: &str) -> CookieJar {
        CookieJar::new().add(Cookie::new(SESSION_COOKIE, token.to_string()))
    }

    #[tokio::test]
    async fn missing_or_garbled_cookie_has_no_session() {
        let store = MemoryAccountStore::new();
        assert!(resolve_session(&store, &CookieJar::new()).await.expect("resolve").is_none());
        assert!(resolve_session(&store, &jar_with("not-a-uuid")).await.expect("resolve").is_none());
        assert!(
            resolve_session(&store, &jar_with(&Uuid::new_v4().to_string()))
                .await
                .expect("resolve")
                .is_none()
        );
    }

    #[tokio::test]
    async fn gate_reads_role_from_snapshot() {
        let store = MemoryAccountStore::new();
        let alice = accounts::register(&store, "alice", "secret1").await.expect("register");
        let session = accounts::login(&store, "alice", "secret1", 12).await.expect("login");
        store.set_role(alice, Role::Admin).await.expect("promote");

        let jar = jar_with(&session.token.to_string());
        let resolved = resolve_session(&store, &jar)
            .await
            .expect("resolve")
            .expect("session");
        assert_eq!(resolved.role, Role::User);

        let err = authorize_admin(resolved).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn session_info_serializes_camel_case() {
        let session = Session {
            token: Uuid::new_v4(),
            user_id: Uuid::nil(),
            username: "alice".into(),
            role: Role::User,
            expires_at: chrono::Utc::now(),
        };
        let value = serde_json::to_value(SessionInfo::from(&session)).expect("json");
        assert_eq!(value["userId"], Uuid::nil().to_string());
        assert_eq!(value["role"], "user");
    }

    #[test]
    fn session_cookie_is_http_only_and_lax() {
        let cookie = session_cookie(Uuid::nil(), 12);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(CookieDuration::hours(12)));
    }
}
