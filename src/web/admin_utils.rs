use serde::Deserialize;

/// `?status=` / `?error=` codes carried across a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

impl FlashQuery {
    pub fn render(&self) -> String {
        compose_flash_message(self.status.as_deref(), self.error.as_deref())
    }
}

/// Compose a flash message HTML snippet for known status or error codes.
pub fn compose_flash_message(status: Option<&str>, error: Option<&str>) -> String {
    if let Some(status) = status {
        let message = match status {
            "registered" => "Akun berhasil dibuat. Silakan masuk.",
            "logged_out" => "Anda telah keluar.",
            "submitted" => "Pendaftaran berhasil disimpan.",
            "updated" => "Data pendaftaran berhasil diperbarui.",
            "deleted" => "Data pendaftaran berhasil dihapus.",
            "photo_deleted" => "Foto produk berhasil dihapus.",
            "role_updated" => "Peran pengguna berhasil diperbarui.",
            "password_updated" => "Password berhasil diperbarui.",
            "content_created" => "Konten berhasil ditambahkan.",
            "content_deleted" => "Konten berhasil dihapus.",
            _ => "",
        };

        if !message.is_empty() {
            return format!(r#"<div class="flash success">{message}</div>"#);
        }
    }

    if let Some(error) = error {
        let message = match error {
            "user_missing" => "Pengguna tidak ditemukan.",
            "invalid_role" => "Peran tidak valid.",
            "content_missing" => "Konten tidak ditemukan.",
            _ => "Terjadi kesalahan. Silakan coba lagi.",
        };

        return format!(r#"<div class="flash error">{message}</div>"#);
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_status_renders_success_flash() {
        let html = compose_flash_message(Some("role_updated"), None);
        assert!(html.contains("flash success"));
        assert!(html.contains("Peran pengguna"));
    }

    #[test]
    fn password_update_redirect_has_a_flash() {
        let (_, query) = crate::web::auth::PASSWORD_UPDATED_REDIRECT
            .split_once("?status=")
            .expect("status query");
        let html = compose_flash_message(Some(query), None);
        assert!(html.contains("Password berhasil diperbarui."));
    }

    #[test]
    fn unknown_status_falls_through_to_error() {
        assert_eq!(compose_flash_message(Some("bogus"), None), "");
        let html = compose_flash_message(Some("bogus"), Some("whatever"));
        assert!(html.contains("flash error"));
    }
}
