use std::collections::HashMap;

use axum::extract::Multipart;

use crate::{
    attachments::UploadedFile,
    error::{PortalError, PortalResult},
};

/// Expectations for a single multipart file field.
#[derive(Debug, Clone, Copy)]
pub struct FileFieldConfig<'a> {
    pub field_name: &'a str,
    pub max_files: usize,
}

impl<'a> FileFieldConfig<'a> {
    pub fn new(field_name: &'a str, max_files: usize) -> Self {
        Self {
            field_name,
            max_files,
        }
    }
}

/// Text values and in-memory files of a parsed multipart request.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub files: Vec<UploadedFile>,
    pub text_fields: HashMap<String, Vec<String>>,
}

impl MultipartForm {
    /// Remove and return every file sent under `field_name`, in request order.
    pub fn take_files(&mut self, field_name: &str) -> Vec<UploadedFile> {
        let (taken, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|file| file.field_name == field_name);
        self.files = rest;
        taken
    }

    pub fn take_file(&mut self, field_name: &str) -> Option<UploadedFile> {
        self.take_files(field_name).into_iter().next()
    }

    pub fn text_values(&self, field_name: &str) -> &[String] {
        self.text_fields
            .get(field_name)
            .map(|values| values.as_slice())
            .unwrap_or_default()
    }

    /// First value of the field, trimmed; blank values count as absent.
    pub fn text(&self, field_name: &str) -> Option<String> {
        self.text_values(field_name)
            .first()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    pub fn text_or_empty(&self, field_name: &str) -> String {
        self.text(field_name).unwrap_or_default()
    }
}

/// Field names like `bidang[]` are folded into `bidang`.
fn normalize_field_name(raw: &str) -> &str {
    raw.strip_suffix("[]").unwrap_or(raw)
}

/// Parse a multipart request, keeping files in memory.
///
/// File parts with no filename or no bytes are treated as "no file chosen" and dropped.
pub async fn collect_multipart(
    mut multipart: Multipart,
    field_configs: &[FileFieldConfig<'_>],
) -> PortalResult<MultipartForm> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut form = MultipartForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| PortalError::validation(format!("Gagal membaca formulir: {err}")))?
    {
        let field_name = normalize_field_name(field.name().unwrap_or("")).to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field.text().await.map_err(|err| {
                PortalError::validation(format!("Gagal membaca kolom `{field_name}`: {err}"))
            })?;
            form.text_fields.entry(field_name).or_default().push(value);
            continue;
        };

        let Some(config) = field_configs
            .iter()
            .find(|config| config.field_name == field_name)
        else {
            return Err(PortalError::validation(format!(
                "Kolom berkas `{field_name}` tidak dikenal."
            )));
        };

        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|err| {
            PortalError::validation(format!("Gagal membaca berkas `{field_name}`: {err}"))
        })?;

        if file_name.trim().is_empty() || bytes.is_empty() {
            continue;
        }

        let count = counts.entry(config.field_name).or_default();
        if *count >= config.max_files {
            return Err(PortalError::validation(format!(
                "Berkas `{}` melebihi batas (maksimal {}).",
                config.field_name, config.max_files
            )));
        }
        *count += 1;

        form.files.push(UploadedFile {
            field_name,
            original_name: file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{Request, header},
    };

    use super::*;

    const BOUNDARY: &str = "XBOUNDARYX";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    async fn multipart(parts: &[Part<'_>]) -> Multipart {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                            .as_bytes(),
                    );
                }
                Part::File(name, file_name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request");
        Multipart::from_request(request, &()).await.expect("multipart")
    }

    #[tokio::test]
    async fn collects_text_and_files_in_order() {
        let request = multipart(&[
            Part::Text("namaInovator", " Alice "),
            Part::Text("bidang[]", "Energi"),
            Part::Text("bidang[]", "Pendidikan"),
            Part::File("fotoProduk", "a.png", b"a"),
            Part::File("fotoProduk", "b.png", b"b"),
            Part::File("foto", "me.jpg", b"me"),
        ])
        .await;

        let mut form = collect_multipart(
            request,
            &[
                FileFieldConfig::new("foto", 1),
                FileFieldConfig::new("fotoProduk", 5),
            ],
        )
        .await
        .expect("form");

        assert_eq!(form.text("namaInovator").as_deref(), Some("Alice"));
        assert_eq!(form.text_values("bidang"), ["Energi", "Pendidikan"]);

        let photos = form.take_files("fotoProduk");
        assert_eq!(
            photos
                .iter()
                .map(|file| file.original_name.as_str())
                .collect::<Vec<_>>(),
            vec!["a.png", "b.png"]
        );
        assert_eq!(form.take_file("foto").map(|f| f.bytes), Some(b"me".to_vec()));
        assert!(form.files.is_empty());
    }

    #[tokio::test]
    async fn empty_file_parts_are_not_supplied() {
        let request = multipart(&[
            Part::File("foto", "", b""),
            Part::File("legalitas", "akta.pdf", b""),
        ])
        .await;

        let form = collect_multipart(
            request,
            &[
                FileFieldConfig::new("foto", 1),
                FileFieldConfig::new("legalitas", 1),
            ],
        )
        .await
        .expect("form");
        assert!(form.files.is_empty());
    }

    #[tokio::test]
    async fn too_many_files_is_a_validation_error() {
        let request = multipart(&[
            Part::File("foto", "a.jpg", b"a"),
            Part::File("foto", "b.jpg", b"b"),
        ])
        .await;

        let err = collect_multipart(request, &[FileFieldConfig::new("foto", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_file_field_is_rejected() {
        let request = multipart(&[Part::File("other", "x.bin", b"x")]).await;
        let err = collect_multipart(request, &[]).await.unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
    }

    #[test]
    fn blank_text_counts_as_absent() {
        let mut form = MultipartForm::default();
        form.text_fields
            .insert("videoProduk".into(), vec!["   ".into()]);
        assert_eq!(form.text("videoProduk"), None);
        assert_eq!(form.text_or_empty("missing"), "");
    }
}
