use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{BotError, Result};
use crate::store::Store;

/// File extensions accepted for profile photos
pub const PHOTO_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Stores profile photos that admins upload on behalf of users
pub struct PhotoManager {
    store: Store,
    dir: PathBuf,
    /// admin account -> nickname whose photo the next upload replaces
    pending: DashMap<u64, String>,
}

impl PhotoManager {
    pub fn new(store: Store, dir: PathBuf) -> Self {
        Self {
            store,
            dir,
            pending: DashMap::new(),
        }
    }

    /// Remember that the next image from `admin_id` belongs to `nickname`
    pub async fn request(&self, admin_id: u64, nickname: &str) -> Result<()> {
        if self.store.get_user_by_nickname(nickname).await?.is_none() {
            return Err(BotError::UserNotFound {
                identifier: nickname.to_string(),
            });
        }
        self.pending.insert(admin_id, nickname.to_string());
        debug!("Admin {} is uploading a photo for {}", admin_id, nickname);
        Ok(())
    }

    pub fn is_pending(&self, admin_id: u64) -> bool {
        self.pending.contains_key(&admin_id)
    }

    /// Consume the pending request of `admin_id`
    pub fn take(&self, admin_id: u64) -> Option<String> {
        self.pending.remove(&admin_id).map(|(_, nickname)| nickname)
    }

    /// Validate and store an uploaded image as the photo of `nickname`.
    ///
    /// The file lands at `<dir>/<nickname>.<ext>` via a temp file and rename;
    /// a previous photo with another extension is removed afterwards.
    pub async fn save(
        &self,
        nickname: &str,
        filename: &str,
        dimensions: Option<(u32, u32)>,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let ext = check_upload(filename, dimensions)?;

        let previous = self
            .store
            .get_user_by_nickname(nickname)
            .await?
            .ok_or_else(|| BotError::UserNotFound {
                identifier: nickname.to_string(),
            })?
            .photo_path;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| asset_error(&self.dir, e))?;

        let path = self.dir.join(format!("{}.{}", nickname, ext));
        let temp_path = self.dir.join(format!(".tmp_{}.{}", nickname, ext));

        tokio::fs::write(&temp_path, bytes)
            .await
            .map_err(|e| asset_error(&temp_path, e))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| asset_error(&path, e))?;

        let stored = path.display().to_string();
        self.store.set_photo(nickname, &stored).await?;
        info!("Updated photo of {} ({} bytes)", nickname, bytes.len());

        if let Some(previous) = previous.filter(|p| *p != stored) {
            remove_photo(Path::new(&previous)).await;
        }
        Ok(path)
    }
}

/// Delete a photo file, ignoring one that is already gone
pub async fn remove_photo(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed photo {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove photo {}: {}", path.display(), e),
    }
}

/// Accept png/jpg/jpeg images that are not wider than tall
pub fn check_upload(filename: &str, dimensions: Option<(u32, u32)>) -> Result<&'static str> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .and_then(|e| PHOTO_EXTENSIONS.into_iter().find(|allowed| *allowed == e))
        .ok_or_else(|| BotError::Validation {
            message: "Photo must be a .png, .jpg or .jpeg image".to_string(),
        })?;

    match dimensions {
        Some((width, height)) if width > height => Err(BotError::Validation {
            message: "Photo must be vertical (height at least its width)".to_string(),
        }),
        Some(_) => Ok(ext),
        None => Err(BotError::Validation {
            message: "Attachment is not an image".to_string(),
        }),
    }
}

fn asset_error(path: &Path, source: std::io::Error) -> BotError {
    BotError::AssetWrite {
        path: path.display().to_string(),
        source,
    }
}

pub type SharedPhotoManager = Arc<PhotoManager>;

pub fn create_shared_photo_manager(store: Store, dir: PathBuf) -> SharedPhotoManager {
    Arc::new(PhotoManager::new(store, dir))
}
