use axum::{
    extract::multipart::{Field, MultipartError},
    http::StatusCode,
};
use snapfeed_common::model::post::{ImageKey, InvalidImageKeyError};
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

pub const UPLOADS_PATH: &str = "/uploads";

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
/// Limit for a whole request body. Leaves room for the caption and multipart
/// framing around a maximum size image.
pub const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;

const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Image is required")]
    MissingImage,
    #[error("Only one image may be uploaded")]
    MultipleImages,
    #[error("Only .jpg, .jpeg, and .png files are allowed!")]
    UnsupportedType,
    #[error("File size too large. Maximum 5MB allowed.")]
    TooLarge,
    #[error("Malformed multipart body: {0}")]
    Multipart(MultipartError),
    #[error("Generated image key was invalid: {0}")]
    Key(#[from] InvalidImageKeyError),
    #[error("Writing the image failed: {0}")]
    Io(#[from] io::Error),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::MissingImage
            | UploadError::MultipleImages
            | UploadError::UnsupportedType
            | UploadError::TooLarge
            | UploadError::Multipart(_) => StatusCode::BAD_REQUEST,
            UploadError::Key(_) | UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::TooLarge
        } else {
            UploadError::Multipart(err)
        }
    }
}

/// An image that was written to the [`ImageStore`].
#[derive(Debug)]
pub struct StoredImage {
    key: ImageKey,
    path: PathBuf,
}

impl StoredImage {
    #[must_use]
    pub fn key(&self) -> &ImageKey {
        &self.key
    }
}

/// Directory that holds uploaded images, named by their [`ImageKey`].
#[derive(Debug)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Streams an uploaded file to disk under a freshly generated name.
    ///
    /// Returns `None` if the field carries no file. Nothing is left on disk
    /// when an error is returned.
    pub async fn store(&self, mut field: Field<'_>) -> Result<Option<StoredImage>, UploadError> {
        let Some(file_name) = field.file_name().filter(|name| !name.is_empty()) else {
            return Ok(None);
        };
        let extension = image_extension(file_name, field.content_type())?;

        let key = ImageKey::new(&format!("{}.{extension}", Uuid::new_v4()))?;
        let path = self.dir.join(key.get());

        let mut file = fs::File::create(&path).await?;
        let written = write_field(&mut file, &mut field).await;
        drop(file);

        match written {
            Ok(size) => {
                debug!(image = %key, size, "Stored uploaded image");
                Ok(Some(StoredImage { key, path }))
            }
            Err(err) => {
                remove(&path).await;
                Err(err)
            }
        }
    }

    /// Deletes an image that ended up not being referenced by any post.
    pub async fn discard(&self, image: StoredImage) {
        debug!(image = %image.key, "Discarding uploaded image");
        remove(&image.path).await;
    }
}

async fn write_field(file: &mut fs::File, field: &mut Field<'_>) -> Result<usize, UploadError> {
    let mut written = 0;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len();
        if written > MAX_IMAGE_BYTES {
            return Err(UploadError::TooLarge);
        }
        file.write_all(&chunk).await?;
    }
    file.sync_all().await?;

    Ok(written)
}

async fn remove(path: &Path) {
    if let Err(err) = fs::remove_file(path).await
        && err.kind() != io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %err, "Failed to remove uploaded image");
    }
}

/// Checks the client's file name and declared content type against the allow
/// list and returns the normalized extension for the stored file.
fn image_extension(file_name: &str, content_type: Option<&str>) -> Result<String, UploadError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|extension| ALLOWED_EXTENSIONS.contains(&extension.as_str()))
        .ok_or(UploadError::UnsupportedType)?;

    let content_type = content_type
        .and_then(|content_type| content_type.split(';').next())
        .map(|content_type| content_type.trim().to_ascii_lowercase());
    match content_type {
        Some(content_type) if ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) => {
            Ok(extension)
        }
        _ => Err(UploadError::UnsupportedType),
    }
}
