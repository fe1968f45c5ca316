//! Uploaded images: decoding base64 data URIs and storing them under the media root.
//!
//! Images arrive inline in JSON bodies as `data:image/<type>;base64,<payload>`. They are written
//! to `<media.root>/<kind dir>/<uuid>.<ext>` and the returned relative path is what gets stored
//! in the database. The router serves the media root at [`MEDIA_URL_PREFIX`].

use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::path::{Component, Path};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;

pub const MEDIA_URL_PREFIX: &str = "/media";

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Where an image belongs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Avatar,
    RecipeImage,
}

impl MediaKind {
    fn dir(self) -> &'static str {
        match self {
            MediaKind::Avatar => "users",
            MediaKind::RecipeImage => "recipes/images",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("Expected a base64 encoded image data URI.")]
    NotDataUri,
    #[error("Unsupported image type '{0}'. Allowed types: png, jpg, jpeg, gif, webp.")]
    UnsupportedType(String),
    #[error("The image data is not valid base64.")]
    InvalidBase64,
    #[error("The submitted image is empty.")]
    Empty,
    #[error("The image is too large. Maximum size is {max_bytes} bytes.")]
    TooLarge { max_bytes: usize },
}

/// A decoded image ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

pub fn decode_data_uri(value: &str, max_bytes: usize) -> Result<DecodedImage, ImageError> {
    let rest = value.trim().strip_prefix("data:").ok_or(ImageError::NotDataUri)?;
    let (mime, payload) = rest.split_once(";base64,").ok_or(ImageError::NotDataUri)?;

    let extension = mime
        .strip_prefix("image/")
        .ok_or_else(|| ImageError::UnsupportedType(mime.to_string()))?
        .to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ImageError::UnsupportedType(extension));
    }

    // Reject obviously oversized payloads before allocating for them
    if payload.len() / 4 * 3 > max_bytes + 3 {
        return Err(ImageError::TooLarge { max_bytes });
    }

    let bytes = STANDARD.decode(payload.trim()).map_err(|_| ImageError::InvalidBase64)?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge { max_bytes });
    }

    Ok(DecodedImage { extension, bytes })
}

/// Write the image under the media root and return its relative path.
pub async fn store(root: &Path, kind: MediaKind, image: &DecodedImage) -> anyhow::Result<String> {
    let relative = format!("{}/{}.{}", kind.dir(), Uuid::new_v4(), image.extension);

    tokio::fs::create_dir_all(root.join(kind.dir())).await?;
    tokio::fs::write(root.join(&relative), &image.bytes).await?;

    debug!("Stored {} byte image at {}", image.bytes.len(), relative);
    Ok(relative)
}

/// Only plain relative paths may be removed, never anything outside the media root.
fn is_contained(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Delete a stored image. Failures are logged and otherwise ignored.
pub async fn remove(root: &Path, path: &str) {
    if !is_contained(path) {
        warn!("Refusing to remove media path outside the media root: {}", path);
        return;
    }

    match tokio::fs::remove_file(root.join(path)).await {
        Ok(()) => debug!("Removed media file {}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove media file {}: {}", path, e),
    }
}

/// Absolute URL of a stored media file
pub fn media_url(config: &Config, path: &str) -> String {
    config.absolute_url(&format!("{MEDIA_URL_PREFIX}/{path}"))
}
