use axum::{
    extract::{Form, Path, Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    accounts::{Role, UserRecord},
    error::{PortalError, PortalResult},
    web::{
        AppState,
        admin_utils::FlashQuery,
        auth::require_admin,
        templates::{PageLayout, escape_html, render_page},
    },
};

#[derive(Deserialize)]
pub(crate) struct SetRoleForm {
    role: String,
}

pub async fn list_users(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> PortalResult<Html<String>> {
    let session = require_admin(&state, &jar).await?;
    let users = state.accounts().list_users().await?;

    let body = format!(
        r#"<section class="panel">
            <h2>Pengguna ({count})</h2>
            <p class="note">Perubahan peran berlaku setelah pengguna masuk ulang atau memperbarui sesinya.</p>
            <table>
                <thead><tr><th>Username</th><th>Peran</th><th>Terdaftar</th><th>Ubah Peran</th></tr></thead>
                <tbody>{rows}</tbody>
            </table>
        </section>"#,
        count = users.len(),
        rows = render_user_rows(&users, session.user_id),
    );

    Ok(Html(render_page(PageLayout {
        title: "Kelola Pengguna",
        session: Some(&session),
        flash_html: &flash.render(),
        body_html: &body,
    })))
}

fn render_user_rows(users: &[UserRecord], current_user: Uuid) -> String {
    if users.is_empty() {
        return r#"<tr><td colspan="4">Belum ada pengguna.</td></tr>"#.to_string();
    }

    users
        .iter()
        .map(|user| {
            let options = [Role::User, Role::Admin]
                .iter()
                .map(|role| {
                    format!(
                        r#"<option value="{value}"{selected}>{label}</option>"#,
                        value = role.as_str(),
                        label = role.label(),
                        selected = if *role == user.role { " selected" } else { "" },
                    )
                })
                .collect::<String>();
            let marker = if user.id == current_user { " (Anda)" } else { "" };

            format!(
                r#"<tr>
                    <td>{username}{marker}</td>
                    <td>{role}</td>
                    <td>{created}</td>
                    <td>
                        <form method="post" action="/admin/set-role/{id}" style="display:flex;gap:0.5rem;align-items:center;">
                            <select name="role">{options}</select>
                            <button type="submit" style="margin-top:0;">Simpan</button>
                        </form>
                    </td>
                </tr>"#,
                id = user.id,
                username = escape_html(&user.username),
                role = user.role.label(),
                created = user.created_at.format("%d-%m-%Y"),
            )
        })
        .collect()
}

pub async fn set_role(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(user_id): Path<Uuid>,
    Form(form): Form<SetRoleForm>,
) -> PortalResult<Redirect> {
    let admin = require_admin(&state, &jar).await?;

    let Some(role) = Role::parse(&form.role) else {
        return Err(PortalError::validation(
            "Peran tidak valid. Pilih user atau admin.",
        ));
    };

    if !state.accounts().set_role(user_id, role).await? {
        return Ok(Redirect::to("/admin/users?error=user_missing"));
    }

    info!(admin_id = %admin.user_id, %user_id, role = role.as_str(), "user role updated");
    Ok(Redirect::to("/admin/users?status=role_updated"))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn user(username: &str, role: Role) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rows_preselect_current_role_and_mark_self() {
        let me = user("root", Role::Admin);
        let other = user("<alice>", Role::User);
        let html = render_user_rows(&[me.clone(), other.clone()], me.id);

        assert!(html.contains("root (Anda)"));
        assert!(html.contains("&lt;alice&gt;"));
        assert!(html.contains(&format!("/admin/set-role/{}", other.id)));
        assert!(html.contains(r#"<option value="admin" selected>"#));
        assert!(html.contains(r#"<option value="user" selected>"#));
    }
}
