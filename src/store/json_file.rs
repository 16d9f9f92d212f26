// src/store/json_file.rs
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::DatasetStore;
use crate::error::StoreError;
use crate::record::{Dataset, Record};

/// Dataset kept as a JSON array of records in one file. Saves go through a temp file in
/// the same directory followed by a rename, so readers see either the old or the new
/// file, never a partial one.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Dataset, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Dataset::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Dataset::new());
        }
        let rows: Vec<Record> =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
                path: self.path.clone(),
                source,
            })?;
        Ok(Dataset::from_records(rows))
    }

    async fn write_atomic(&self, ds: &Dataset) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(ds.records()).map_err(StoreError::Encode)?;
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).await.map_err(write_err)?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "dataset.json".to_string());
        let temp_path = dir.join(format!(".{file_name}.{}.tmp", std::process::id()));

        let result = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&body).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &self.path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path).await;
            return Err(write_err(e));
        }
        // The new file is in place; a failed directory sync only weakens crash safety.
        if let Err(e) = sync_dir(&dir).await {
            tracing::warn!(error = %e, dir = %dir.display(), "directory fsync failed after rename");
        }
        Ok(())
    }
}

/// Flush the directory entry so the rename survives a crash.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait::async_trait]
impl DatasetStore for JsonFileStore {
    async fn load(&self) -> Result<Dataset, StoreError> {
        self.read().await
    }

    async fn append_and_save(&self, candidates: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut ds = self.read().await?;
        let appended = ds.merge(candidates);
        if appended.is_empty() {
            tracing::debug!(path = %self.path.display(), "nothing new, dataset left as is");
            return Ok(appended);
        }
        self.write_atomic(&ds).await?;
        tracing::info!(
            path = %self.path.display(),
            appended = appended.len(),
            total = ds.len(),
            "dataset saved"
        );
        Ok(appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Region;
    use chrono::{TimeZone, Utc};

    fn rec(link: &str) -> Record {
        Record {
            link: link.into(),
            title: "t".into(),
            source: "s".into(),
            region: Region::Pe,
            published_at: None,
            captured_at: Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap(),
            snippet: Some("snip".into()),
            sentiment: None,
        }
    }

    #[tokio::test]
    async fn missing_file_is_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("none.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_creates_parent_dirs_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("news.json");
        let store = JsonFileStore::new(&path);

        let added = store
            .append_and_save(vec![rec("https://a.com/1"), rec("https://a.com/2")])
            .await
            .unwrap();
        assert_eq!(added.len(), 2);

        let names: Vec<String> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["news.json".to_string()]);

        let reloaded = JsonFileStore::new(&path).load().await.unwrap();
        assert_eq!(reloaded.records(), &[rec("https://a.com/1"), rec("https://a.com/2")]);
    }

    #[tokio::test]
    async fn directory_is_synced_after_rename() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sync_dir(dir.path()).await.is_ok());

        let store = JsonFileStore::new(dir.path().join("news.json"));
        store.append_and_save(vec![rec("https://a.com/1")]).await.unwrap();
        store.append_and_save(vec![rec("https://a.com/2")]).await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_directory_fails_to_sync() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sync_dir(&dir.path().join("gone")).await.is_err());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_read_side_error_and_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::new(&path);

        let err = store
            .append_and_save(vec![rec("https://a.com/1")])
            .await
            .unwrap_err();
        assert!(err.is_read_side(), "{err}");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }
}
