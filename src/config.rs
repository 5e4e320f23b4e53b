use std::{env, path::PathBuf};

use anyhow::{Context, Result, anyhow, bail};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPLOADS_DIR: &str = "uploads";
const DEFAULT_UPLOADS_URL_PREFIX: &str = "/uploads";
const DEFAULT_SESSION_TTL_HOURS: i64 = 12;
const DEFAULT_MAX_UPLOAD_MB: usize = 25;
const DEFAULT_MAX_PRODUCT_PHOTOS: usize = 10;

/// Which backend receives newly uploaded attachments.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StorageBackend {
    Local,
    Remote,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "local" => Ok(StorageBackend::Local),
            "remote" | "cloudinary" => Ok(StorageBackend::Remote),
            other => bail!("unsupported STORAGE_BACKEND value: {other}"),
        }
    }
}

/// Settings for the unsigned remote upload endpoint.
#[derive(Clone, Debug)]
pub struct RemoteUploadSettings {
    pub endpoint: String,
    pub upload_preset: String,
    pub folder: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SeedAdmin {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct PortalConfig {
    pub database_url: String,
    pub port: u16,
    pub uploads_dir: PathBuf,
    pub uploads_url_prefix: String,
    pub storage_backend: StorageBackend,
    pub remote_upload: Option<RemoteUploadSettings>,
    pub session_ttl_hours: i64,
    pub max_upload_bytes: usize,
    pub max_product_photos: usize,
    pub seed_admin: SeedAdmin,
}

impl PortalConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL env var is missing")?;

        let port = parse_or("PORT", DEFAULT_PORT)?;
        let uploads_dir = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOADS_DIR));
        let uploads_url_prefix = normalize_prefix(
            &env::var("UPLOADS_URL_PREFIX").unwrap_or_else(|_| DEFAULT_UPLOADS_URL_PREFIX.into()),
        );

        let storage_backend =
            StorageBackend::parse(&env::var("STORAGE_BACKEND").unwrap_or_default())?;
        let remote_upload = remote_upload_from_env();
        if storage_backend == StorageBackend::Remote && remote_upload.is_none() {
            return Err(anyhow!(
                "STORAGE_BACKEND=remote requires REMOTE_UPLOAD_URL or CLOUDINARY_CLOUD_NAME plus REMOTE_UPLOAD_PRESET"
            ));
        }

        let session_ttl_hours = parse_or("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?;
        if session_ttl_hours <= 0 {
            bail!("SESSION_TTL_HOURS must be positive");
        }

        let max_upload_bytes =
            upload_limit_bytes(parse_or("MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB)?)?;
        let max_product_photos = parse_or("MAX_PRODUCT_PHOTOS", DEFAULT_MAX_PRODUCT_PHOTOS)?;

        let seed_admin = SeedAdmin {
            username: env::var("SEED_ADMIN_USERNAME").unwrap_or_else(|_| "admin".into()),
            password: env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "change-me".into()),
        };

        Ok(Self {
            database_url,
            port,
            uploads_dir,
            uploads_url_prefix,
            storage_backend,
            remote_upload,
            session_ttl_hours,
            max_upload_bytes,
            max_product_photos,
            seed_admin,
        })
    }
}

fn upload_limit_bytes(megabytes: usize) -> Result<usize> {
    match megabytes.checked_mul(1024 * 1024) {
        Some(bytes) => Ok(bytes),
        None => bail!("MAX_UPLOAD_MB={megabytes} is too large"),
    }
}

fn remote_upload_from_env() -> Option<RemoteUploadSettings> {
    let endpoint = env::var("REMOTE_UPLOAD_URL").ok().or_else(|| {
        env::var("CLOUDINARY_CLOUD_NAME")
            .ok()
            .map(|cloud| format!("https://api.cloudinary.com/v1_1/{cloud}/auto/upload"))
    })?;
    let upload_preset = env::var("REMOTE_UPLOAD_PRESET").ok()?;
    let folder = env::var("REMOTE_UPLOAD_FOLDER")
        .ok()
        .filter(|value| !value.trim().is_empty());

    Some(RemoteUploadSettings {
        endpoint,
        upload_preset,
        folder,
    })
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|err| anyhow!("invalid value for {key}: {err}")),
        _ => Ok(default),
    }
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_accepts_known_values() {
        assert_eq!(StorageBackend::parse("").unwrap(), StorageBackend::Local);
        assert_eq!(StorageBackend::parse("LOCAL").unwrap(), StorageBackend::Local);
        assert_eq!(
            StorageBackend::parse("cloudinary").unwrap(),
            StorageBackend::Remote
        );
        assert!(StorageBackend::parse("s3").is_err());
    }

    #[test]
    fn prefix_is_rooted_without_trailing_slash() {
        assert_eq!(normalize_prefix("uploads/"), "/uploads");
        assert_eq!(normalize_prefix("/files"), "/files");
    }

    #[test]
    fn upload_limit_rejects_overflow() {
        assert_eq!(upload_limit_bytes(20).unwrap(), 20 * 1024 * 1024);
        assert!(upload_limit_bytes(usize::MAX).is_err());
    }
}
