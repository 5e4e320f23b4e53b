#[cfg(test)]
pub(crate) mod memory;
mod postgres;

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand_core::OsRng;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};

pub use postgres::PgAccountStore;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "Pengguna",
            Role::Admin => "Admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Server-side session: an opaque token plus a snapshot of the user's identity.
///
/// The role is copied at login and only rewritten by [`refresh_session`]; role changes made in
/// the meantime are not visible through an existing session.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub token: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn requester(&self) -> Requester {
        Requester {
            user_id: self.user_id,
            role: self.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Who is asking, as far as ownership checks care.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Requester {
    pub user_id: Uuid,
    pub role: Role,
}

impl Requester {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Persistence for users and sessions.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Returns `None` when the username is already taken.
    async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> sqlx::Result<Option<Uuid>>;

    async fn find_by_username(&self, username: &str) -> sqlx::Result<Option<UserRecord>>;

    async fn find_by_id(&self, id: Uuid) -> sqlx::Result<Option<UserRecord>>;

    async fn list_users(&self) -> sqlx::Result<Vec<UserRecord>>;

    async fn set_role(&self, id: Uuid, role: Role) -> sqlx::Result<bool>;

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> sqlx::Result<bool>;

    async fn has_admin(&self) -> sqlx::Result<bool>;

    async fn insert_session(&self, session: &Session) -> sqlx::Result<()>;

    /// Unexpired session for the token, if any.
    async fn find_session(&self, token: Uuid) -> sqlx::Result<Option<Session>>;

    async fn replace_session_snapshot(&self, session: &Session) -> sqlx::Result<bool>;

    async fn delete_session(&self, token: Uuid) -> sqlx::Result<()>;

    async fn purge_expired_sessions(&self) -> sqlx::Result<u64>;
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

fn hash_or_internal(password: &str) -> PortalResult<String> {
    hash_password(password)
        .map_err(|err| PortalError::Internal(anyhow::anyhow!("failed to hash password: {err}")))
}

/// Create a regular user account.
pub async fn register(
    store: &dyn AccountStore,
    username: &str,
    password: &str,
) -> PortalResult<Uuid> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(PortalError::validation(
            "Username dan password harus diisi.",
        ));
    }

    let password_hash = hash_or_internal(password)?;
    match store.insert_user(username, &password_hash, Role::User).await? {
        Some(id) => {
            info!(user_id = %id, "registered new user");
            Ok(id)
        }
        None => Err(PortalError::validation("Username sudah terdaftar.")),
    }
}

/// Verify credentials and open a session carrying the user's current role.
pub async fn login(
    store: &dyn AccountStore,
    username: &str,
    password: &str,
    ttl_hours: i64,
) -> PortalResult<Session> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(PortalError::validation(
            "Username dan password harus diisi.",
        ));
    }

    let Some(user) = store.find_by_username(username.trim()).await? else {
        return Err(invalid_credentials());
    };
    if !verify_password(password, &user.password_hash) {
        return Err(invalid_credentials());
    }

    let session = Session {
        token: Uuid::new_v4(),
        user_id: user.id,
        username: user.username,
        role: user.role,
        expires_at: Utc::now() + Duration::hours(ttl_hours),
    };
    store.insert_session(&session).await?;

    Ok(session)
}

/// Re-read the user behind a session and rewrite its snapshot and expiry.
pub async fn refresh_session(
    store: &dyn AccountStore,
    session: &Session,
    ttl_hours: i64,
) -> PortalResult<Session> {
    let Some(user) = store.find_by_id(session.user_id).await? else {
        store.delete_session(session.token).await?;
        return Err(PortalError::AuthRequired);
    };

    let refreshed = Session {
        token: session.token,
        user_id: user.id,
        username: user.username,
        role: user.role,
        expires_at: Utc::now() + Duration::hours(ttl_hours),
    };
    if !store.replace_session_snapshot(&refreshed).await? {
        return Err(PortalError::AuthRequired);
    }

    Ok(refreshed)
}

pub async fn change_password(
    store: &dyn AccountStore,
    user_id: Uuid,
    current_password: &str,
    new_password: &str,
) -> PortalResult<()> {
    if new_password.is_empty() {
        return Err(PortalError::validation("Password baru harus diisi."));
    }

    let Some(user) = store.find_by_id(user_id).await? else {
        return Err(PortalError::AuthRequired);
    };
    if !verify_password(current_password, &user.password_hash) {
        return Err(PortalError::validation("Password lama salah."));
    }

    let password_hash = hash_or_internal(new_password)?;
    store.set_password_hash(user_id, &password_hash).await?;
    Ok(())
}

/// Create the bootstrap admin when no admin account exists yet.
pub async fn ensure_seed_admin(
    store: &dyn AccountStore,
    username: &str,
    password: &str,
) -> anyhow::Result<()> {
    if store.has_admin().await? {
        return Ok(());
    }

    let password_hash = hash_password(password)
        .map_err(|err| anyhow::anyhow!("failed to hash seed admin password: {err}"))?;

    match store.insert_user(username, &password_hash, Role::Admin).await? {
        Some(_) => info!(
            username,
            "Seeded default admin user. Update its password promptly."
        ),
        None => warn!(
            username,
            "seed admin username belongs to a regular account; no admin was created"
        ),
    }

    Ok(())
}

fn invalid_credentials() -> PortalError {
    PortalError::Validation("Username atau password salah.".to_string())
}
