use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::error;

use crate::{attachments::StorageError, web::templates::error_fragment};

/// Failure taxonomy for every request-facing operation.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// A required field is missing or a value is outside the accepted set.
    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("{0}")]
    Forbidden(String),

    /// Missing record, or a record the requester does not own. The two are never told apart.
    #[error("{0}")]
    NotFound(String),

    #[error("upload failed: {0}")]
    UploadFailed(#[from] StorageError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type PortalResult<T> = Result<T, PortalError>;

impl PortalError {
    pub fn validation(message: impl Into<String>) -> Self {
        PortalError::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        PortalError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        PortalError::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::AuthRequired => StatusCode::UNAUTHORIZED,
            PortalError::Forbidden(_) => StatusCode::FORBIDDEN,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::UploadFailed(_) => StatusCode::BAD_GATEWAY,
            PortalError::Database(_) | PortalError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text shown to the user inside the error fragment.
    pub fn user_message(&self) -> String {
        match self {
            PortalError::Validation(message)
            | PortalError::Forbidden(message)
            | PortalError::NotFound(message) => message.clone(),
            PortalError::AuthRequired => "Silakan login terlebih dahulu.".to_string(),
            PortalError::UploadFailed(err) => format!("Gagal mengunggah lampiran: {err}"),
            PortalError::Database(err) => format!("Gagal memproses data: {err}"),
            PortalError::Internal(_) => "Terjadi kesalahan pada server.".to_string(),
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        match &self {
            PortalError::AuthRequired => return Redirect::to("/login").into_response(),
            PortalError::UploadFailed(err) => error!(?err, "attachment upload failed"),
            PortalError::Database(err) => error!(?err, "database operation failed"),
            PortalError::Internal(err) => error!(?err, "internal error"),
            _ => {}
        }

        (self.status(), Html(error_fragment(&self.user_message()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_forbidden_map_to_distinct_statuses() {
        assert_eq!(
            PortalError::not_found("Data tidak ditemukan").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PortalError::forbidden("Akses ditolak").status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn auth_required_redirects_to_login() {
        let response = PortalError::AuthRequired.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response
                .headers()
                .get(axum::http::header::LOCATION)
                .and_then(|v| v.to_str().ok()),
            Some("/login")
        );
    }

    #[test]
    fn database_message_is_surfaced_verbatim() {
        let err = PortalError::Database(sqlx::Error::RowNotFound);
        assert!(err.user_message().contains(&sqlx::Error::RowNotFound.to_string()));
    }
}
