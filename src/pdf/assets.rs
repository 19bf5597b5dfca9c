use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::storage::DocumentStorage;

const HEADER_CANDIDATES: &[&str] = &["header.png", "header.jpg", "header.jpeg"];
const FOOTER_CANDIDATES: &[&str] = &["footer.png", "footer.jpg", "footer.jpeg"];

/// Why an optional image could not be used. Logged, never returned to callers.
#[derive(Debug, thiserror::Error)]
enum MissingAsset {
    #[error("not found")]
    NotFound,

    #[error("not an image ({0})")]
    NotAnImage(String),

    #[error("unreadable: {0}")]
    Unreadable(String),
}

/// Loads header/footer artwork and student photos, degrading to `None`.
#[derive(Clone, Debug)]
pub struct AssetLoader {
    assets_dir: PathBuf,
    media: DocumentStorage,
}

impl AssetLoader {
    pub fn new(assets_dir: impl Into<PathBuf>, media_root: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            media: DocumentStorage::new(media_root),
        }
    }

    pub fn header(&self) -> Option<Arc<DynamicImage>> {
        self.first_of(HEADER_CANDIDATES, "header")
    }

    pub fn footer(&self) -> Option<Arc<DynamicImage>> {
        self.first_of(FOOTER_CANDIDATES, "footer")
    }

    pub fn student_photo(&self, relative: Option<&str>) -> Option<Arc<DynamicImage>> {
        let relative = relative.filter(|r| !r.trim().is_empty())?;
        let path = match self.media.resolve(relative) {
            Ok(path) => path,
            Err(e) => {
                warn!(
                    photo = relative,
                    error = %e,
                    "student photo path rejected, using placeholder"
                );
                return None;
            }
        };
        match load(&path) {
            Ok(image) => Some(image),
            Err(reason) => {
                warn!(
                    path = %path.display(),
                    %reason,
                    "student photo unavailable, using placeholder"
                );
                None
            }
        }
    }

    fn first_of(&self, candidates: &[&str], label: &str) -> Option<Arc<DynamicImage>> {
        for name in candidates {
            let path = self.assets_dir.join(name);
            match load(&path) {
                Ok(image) => return Some(image),
                Err(MissingAsset::NotFound) => continue,
                Err(reason) => {
                    warn!(
                        asset = label,
                        path = %path.display(),
                        %reason,
                        "asset unusable, omitting"
                    );
                    return None;
                }
            }
        }
        debug!(asset = label, dir = %self.assets_dir.display(), "no asset found, omitting");
        None
    }
}

fn load(path: &Path) -> Result<Arc<DynamicImage>, MissingAsset> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        return Err(MissingAsset::NotAnImage(mime.to_string()));
    }
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MissingAsset::NotFound,
        _ => MissingAsset::Unreadable(e.to_string()),
    })?;
    let image =
        image::load_from_memory(&bytes).map_err(|e| MissingAsset::Unreadable(e.to_string()))?;
    // Flatten alpha and palette formats before embedding.
    Ok(Arc::new(DynamicImage::ImageRgb8(image.to_rgb8())))
}
