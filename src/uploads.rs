use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Subdirectory of the media root that holds post images.
const POST_IMAGES_DIR: &str = "posts";

/// A file field pulled out of a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Returns the file extension to store the bytes under, or `None` when they
/// are not a decodable image.
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(bytes).ok()?;
    image::load_from_memory_with_format(bytes, format).ok()?;
    format.extensions_str().first().copied()
}

/// Validates and stores an uploaded image under the media root.
///
/// Returns the path relative to the media root, or `None` when the upload is
/// empty or not an image. Rejected uploads are logged and otherwise ignored.
pub async fn store_image(media_root: &Path, upload: Upload) -> AppResult<Option<String>> {
    if upload.bytes.is_empty() {
        return Ok(None);
    }

    let Upload { filename, bytes } = upload;
    let sniffed = tokio::task::spawn_blocking(move || sniff_image(&bytes).map(|ext| (ext, bytes)))
        .await
        .map_err(|e| AppError::Internal(format!("Image check failed: {e}")))?;

    let Some((ext, bytes)) = sniffed else {
        tracing::warn!(filename = %filename, "Dropping upload that is not a valid image");
        return Ok(None);
    };

    let relative = format!("{}/{}.{}", POST_IMAGES_DIR, uuid::Uuid::now_v7(), ext);
    let target = media_root.join(&relative);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, &bytes).await?;

    tracing::info!(filename = %filename, stored = %relative, size = bytes.len(), "Stored image upload");
    Ok(Some(relative))
}

/// Deletes a stored upload. Failures are logged and otherwise ignored.
pub async fn remove_image(media_root: &Path, relative: &str) {
    let Some(path) = resolve(media_root, relative) else {
        tracing::warn!(path = %relative, "Refusing to remove upload outside the media root");
        return;
    };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::info!(path = %relative, "Removed image upload"),
        Err(e) => tracing::warn!(path = %relative, "Failed to remove image upload: {}", e),
    }
}

/// Maps a request path onto the media root, refusing anything that could
/// escape it.
pub fn resolve(media_root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative.as_os_str().is_empty()
        || !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(media_root.join(relative))
}

#[cfg(test)]
pub(crate) fn png_bytes() -> Vec<u8> {
    use std::io::Cursor;

    let img = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 10, 10]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
        .unwrap();
    buf
}
