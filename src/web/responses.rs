use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

/// JSON body returned by the JSON endpoints on failure.
#[derive(Debug, Serialize, Clone)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError::new(message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_uses_error_key() {
        let (status, Json(body)) = json_error(StatusCode::NOT_FOUND, "Konten tidak ditemukan");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            serde_json::to_value(body).expect("json"),
            serde_json::json!({ "error": "Konten tidak ditemukan" })
        );
    }
}
