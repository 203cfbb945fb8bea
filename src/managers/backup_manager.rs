use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{BotError, Result};
use crate::store::Store;

const BACKUP_PREFIX: &str = "backup_";
const BACKUP_SUFFIX: &str = ".sqlite";

/// Shortest schedule period; `tokio::time::interval` rejects zero
const MIN_INTERVAL: Duration = Duration::from_secs(60);

/// Periodic snapshots of the ledger database
pub struct BackupManager {
    store: Store,
    dir: PathBuf,
    keep: usize,
}

impl BackupManager {
    pub fn new(store: Store, dir: PathBuf, keep: usize) -> Self {
        Self {
            store,
            dir,
            keep: keep.max(1),
        }
    }

    /// Write a consistent copy of the database and prune old copies.
    ///
    /// Runs `VACUUM INTO` on a separate connection so the pooled
    /// connection keeps serving requests (the database is in WAL mode).
    pub async fn run_backup(&self) -> Result<PathBuf> {
        let source = self.store.path().ok_or_else(|| BotError::Backup {
            message: "in-memory database cannot be backed up".to_string(),
        })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BotError::Backup {
                message: format!("cannot create {}: {}", self.dir.display(), e),
            })?;

        let target = self.dir.join(backup_file_name(chrono::Utc::now()));
        vacuum_into(source, &target).await?;
        info!("Database backup created: {}", target.display());

        match self.prune().await {
            Ok(0) => {}
            Ok(removed) => debug!("Removed {} old backups", removed),
            Err(e) => warn!("Failed to prune backups: {}", e),
        }

        Ok(target)
    }

    /// Delete all but the newest `keep` backups, returning how many went
    pub async fn prune(&self) -> Result<usize> {
        let backups = list_backups(&self.dir).await?;
        let excess = backups.len().saturating_sub(self.keep);

        for old in &backups[..excess] {
            tokio::fs::remove_file(old).await?;
        }
        Ok(excess)
    }

    /// Back up now and then every `interval`
    pub fn spawn_schedule(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_backup().await {
                    error!("Backup error: {}", e);
                }
            }
        })
    }
}

pub type SharedBackupManager = Arc<BackupManager>;

pub fn create_shared_backup_manager(store: Store, dir: PathBuf, keep: usize) -> SharedBackupManager {
    Arc::new(BackupManager::new(store, dir, keep))
}

fn backup_file_name(at: chrono::DateTime<chrono::Utc>) -> String {
    format!(
        "{}{}{}",
        BACKUP_PREFIX,
        at.format("%Y%m%d_%H%M%S_%6f"),
        BACKUP_SUFFIX
    )
}

async fn vacuum_into(source: &Path, target: &Path) -> Result<()> {
    let mut conn = SqliteConnectOptions::new()
        .filename(source)
        .connect()
        .await
        .map_err(|e| BotError::Backup {
            message: format!("cannot open {}: {}", source.display(), e),
        })?;

    let escaped = target.display().to_string().replace('\'', "''");
    let result = sqlx::query(&format!("VACUUM INTO '{}'", escaped))
        .execute(&mut conn)
        .await;

    if let Err(e) = conn.close().await {
        debug!("Closing backup connection failed: {}", e);
    }

    result.map_err(|e| BotError::Backup {
        message: format!("VACUUM INTO {} failed: {}", target.display(), e),
    })?;
    Ok(())
}

/// Backup files in `dir`, oldest first
async fn list_backups(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut backups = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_SUFFIX) {
            backups.push(entry.path());
        }
    }

    // Names embed a zero-padded timestamp
    backups.sort();
    Ok(backups)
}
