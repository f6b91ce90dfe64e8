use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use tokio::fs;

use crate::error::{Error, Result};

const ALLOWED_IMAGE_EXTS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Service,
    Shop,
    Product,
}

impl UploadKind {
    fn dir(&self) -> &'static str {
        match self {
            UploadKind::Service => "services",
            UploadKind::Shop => "shops",
            UploadKind::Product => "products",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SavedFile {
    pub path: PathBuf,
    /// Public path under the `/uploads` mount.
    pub url: String,
}

impl SavedFile {
    /// Best-effort removal of a file whose owning record was never written.
    pub async fn discard(self) {
        if let Err(e) = fs::remove_file(&self.path).await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove orphaned upload");
        }
    }
}

pub fn image_extension(filename: &str) -> Result<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !ALLOWED_IMAGE_EXTS.contains(&ext.as_str()) {
        return Err(Error::BadRequest(format!(
            "File type .{} is not allowed",
            if ext.is_empty() { "unknown" } else { &ext }
        )));
    }
    Ok(ext)
}

pub fn check_image_content(ext: &str, data: &[u8]) -> Result<()> {
    let ok = match ext {
        "jpg" | "jpeg" => data.starts_with(&[0xFF, 0xD8]),
        "png" => data.starts_with(&[0x89, 0x50, 0x4E, 0x47]),
        "gif" => data.starts_with(b"GIF8"),
        "webp" => data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP",
        _ => false,
    };
    if !ok {
        return Err(Error::BadRequest(format!("Invalid {} file content", ext.to_uppercase())));
    }
    Ok(())
}

pub async fn save_image(kind: UploadKind, filename: &str, data: &bytes::Bytes) -> Result<SavedFile> {
    if data.len() > MAX_IMAGE_BYTES {
        return Err(Error::BadRequest("Image exceeds the 5 MB limit".into()));
    }
    let ext = image_extension(filename)?;
    check_image_content(&ext, data)?;

    let root = &crate::config::get_config().uploads_dir;
    let dir = Path::new(root).join(kind.dir());
    fs::create_dir_all(&dir).await?;

    let safe_filename = format!("{}.{}", uuid::Uuid::new_v4(), ext);
    let path = dir.join(&safe_filename);
    fs::write(&path, data).await.map_err(|e| {
        tracing::error!("Failed to write upload: {}", e);
        Error::Internal(format!("Failed to save file: {}", e))
    })?;

    Ok(SavedFile {
        path,
        url: format!("/uploads/{}/{}", kind.dir(), safe_filename),
    })
}

/// Maps a `/uploads/<kind>/<file>` URL back to its path under the uploads
/// directory. Anything else, including `..` segments, yields `None`.
pub fn local_path_for(uploads_dir: &str, url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("/uploads/")?;
    let mut parts = rest.split('/');
    let (dir, file) = (parts.next()?, parts.next()?);
    if parts.next().is_some() || file.is_empty() || file.starts_with('.') {
        return None;
    }
    if ![UploadKind::Service, UploadKind::Shop, UploadKind::Product]
        .iter()
        .any(|k| k.dir() == dir)
    {
        return None;
    }
    Some(Path::new(uploads_dir).join(dir).join(file))
}

/// Best-effort removal of an image that its record no longer references.
pub async fn remove_public_file(url: Option<String>) {
    let Some(url) = url else { return };
    let uploads_dir = &crate::config::get_config().uploads_dir;
    if let Some(path) = local_path_for(uploads_dir, &url) {
        SavedFile { path, url }.discard().await;
    }
}

/// Text fields of a multipart form plus its optional image.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub image: Option<SavedFile>,
}

impl FormData {
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.text(name) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| Error::BadRequest(format!("Invalid value for '{}'", name))),
            None => Ok(None),
        }
    }

    pub async fn discard_image(&mut self) {
        if let Some(file) = self.image.take() {
            file.discard().await;
        }
    }
}

pub async fn read_form(mut multipart: Multipart, kind: UploadKind, image_field: &str) -> Result<FormData> {
    let mut form = FormData::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                form.discard_image().await;
                return Err(Error::BadRequest(e.to_string()));
            }
        };
        let name = field.name().unwrap_or_default().to_string();

        if name == image_field {
            let filename = field.file_name().unwrap_or("upload.bin").to_string();
            let data = match field.bytes().await {
                Ok(data) => data,
                Err(e) => {
                    form.discard_image().await;
                    return Err(Error::BadRequest(format!("Failed to read file upload: {}", e)));
                }
            };
            if data.is_empty() {
                continue;
            }
            match save_image(kind, &filename, &data).await {
                Ok(saved) => {
                    form.discard_image().await;
                    form.image = Some(saved);
                }
                Err(e) => {
                    form.discard_image().await;
                    return Err(e);
                }
            }
        } else {
            match field.text().await {
                Ok(value) => {
                    form.fields.insert(name, value);
                }
                Err(e) => {
                    form.discard_image().await;
                    return Err(Error::BadRequest(e.to_string()));
                }
            }
        }
    }

    Ok(form)
}
