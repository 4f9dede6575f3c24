//! Registration: persist the reference image, extract, insert the identity.

use crate::engine::EngineHandle;
use crate::error::ApiError;
use chrono::Utc;
use facecard_store::{NewIdentity, Store};
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Directory registration images are written to.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `user_<YYYYmmdd_HHMMSS>_<8 hex>.jpg`; the suffix keeps two
    /// registrations in the same second apart.
    fn file_name() -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("user_{}_{}.jpg", Utc::now().format("%Y%m%d_%H%M%S"), &suffix[..8])
    }

    /// Encode `image` as JPEG under a fresh name and return its path.
    pub fn save(&self, image: &RgbImage) -> Result<PathBuf, ApiError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| ApiError::Internal(format!("create {}: {e}", self.dir.display())))?;
        let path = self.dir.join(Self::file_name());
        image
            .save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|e| ApiError::Internal(format!("save {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "registration image saved");
        Ok(path)
    }

    /// Best-effort removal of a saved image.
    pub fn discard(&self, path: &Path) {
        if let Err(err) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove registration image");
        }
    }
}

/// Validated registration input.
pub struct Registration {
    pub name: String,
    pub age: i64,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub image: RgbImage,
}

/// Save the image, extract a descriptor and insert the identity.
///
/// The first detected face is canonical. Any failure after the image is saved
/// removes it again, so a rejected registration leaves neither a row nor a file.
pub async fn register(
    engine: &EngineHandle,
    store: &Store,
    images: &ImageStore,
    registration: Registration,
) -> Result<(i64, PathBuf), ApiError> {
    let saved = {
        let images = images.clone();
        let image = registration.image.clone();
        tokio::task::spawn_blocking(move || images.save(&image)).await??
    };

    match insert(engine, store, &saved, registration).await {
        Ok(id) => Ok((id, saved)),
        Err(err) => {
            images.discard(&saved);
            Err(err)
        }
    }
}

async fn insert(
    engine: &EngineHandle,
    store: &Store,
    saved: &Path,
    registration: Registration,
) -> Result<i64, ApiError> {
    let Registration {
        name,
        age,
        email,
        phone,
        image,
    } = registration;

    let faces = engine.extract(image).await?;
    let Some(face) = faces.into_iter().next() else {
        tracing::info!(name = %name, "registration rejected: no face detected");
        return Err(ApiError::NoFace);
    };

    let identity = NewIdentity {
        name,
        age,
        email,
        phone,
        image_path: Some(saved.to_string_lossy().into_owned()),
        descriptor: face.descriptor,
    };
    let store = store.clone();
    Ok(tokio::task::spawn_blocking(move || store.insert_identity(&identity)).await??)
}
