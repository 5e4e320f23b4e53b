use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{AccountStore, Role, Session, UserRecord};

#[derive(Default)]
pub struct MemoryAccountStore {
    users: Mutex<Vec<UserRecord>>,
    sessions: Mutex<Vec<Session>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> sqlx::Result<Option<Uuid>> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|user| user.username == username) {
            return Ok(None);
        }

        let id = Uuid::new_v4();
        users.push(UserRecord {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now(),
        });
        Ok(Some(id))
    }

    async fn find_by_username(&self, username: &str) -> sqlx::Result<Option<UserRecord>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|user| user.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> sqlx::Result<Option<UserRecord>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|user| user.id == id).cloned())
    }

    async fn list_users(&self) -> sqlx::Result<Vec<UserRecord>> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> sqlx::Result<bool> {
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|user| user.id == id) {
            Some(user) => {
                user.role = role;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> sqlx::Result<bool> {
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|user| user.id == id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn has_admin(&self) -> sqlx::Result<bool> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().any(|user| user.role == Role::Admin))
    }

    async fn insert_session(&self, session: &Session) -> sqlx::Result<()> {
        self.sessions.lock().unwrap().push(session.clone());
        Ok(())
    }

    async fn find_session(&self, token: Uuid) -> sqlx::Result<Option<Session>> {
        let sessions = self.sessions.lock().unwrap();
        let now = Utc::now();
        Ok(sessions
            .iter()
            .find(|session| session.token == token && session.expires_at > now)
            .cloned())
    }

    async fn replace_session_snapshot(&self, session: &Session) -> sqlx::Result<bool> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.iter_mut().find(|s| s.token == session.token) {
            Some(existing) => {
                *existing = session.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_session(&self, token: Uuid) -> sqlx::Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .retain(|session| session.token != token);
        Ok(())
    }

    async fn purge_expired_sessions(&self) -> sqlx::Result<u64> {
        let mut sessions = self.sessions.lock().unwrap();
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|session| session.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}
