use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::adapter::{StorageAdapter, StorageRead};
use crate::error::StorageError;

/// One pretty-printed `<key>.json` file per key inside `dir`.
///
/// Reads go through `tokio::fs` and complete asynchronously. Writes and
/// removals block the caller; on a multi-threaded runtime the worker thread
/// is handed over to other tasks while they run.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl<T> StorageAdapter<T> for JsonFileStorage
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn get_item(&self, key: &str) -> StorageRead<T> {
        let path = self.path_for(key);

        StorageRead::pending(async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(data) => Ok(serde_json::from_str::<Option<T>>(&data)?),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn set_item(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let data = serde_json::to_string_pretty(value)?;
        let path = self.path_for(key);

        blocking(|| -> std::io::Result<()> {
            fs::create_dir_all(&self.dir)?;
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, data)?;
            fs::rename(&tmp, &path)
        })?;

        tracing::debug!("Persisted {}", path.display());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match blocking(|| fs::remove_file(self.path_for(key))) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// `block_in_place` panics on a current-thread runtime, so only multi-threaded
/// workers are handed off. Everywhere else `f` just runs.
fn blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::cell::{CellOptions, PersistedCell};

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("tolk-storage-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_value_survives_a_new_cell() {
        let dir = temp_dir();
        let storage = Arc::new(JsonFileStorage::new(&dir));

        let cell = PersistedCell::new("client", storage.clone(), CellOptions::new("gtx".to_string()));
        timeout(Duration::from_secs(1), cell.when_ready()).await.unwrap();
        cell.set("dict-chrome-ex".to_string());
        assert!(dir.join("client.json").exists());

        let reloaded = PersistedCell::new("client", storage, CellOptions::new("gtx".to_string()));
        assert_eq!(reloaded.get().as_deref(), Some("gtx"));
        timeout(Duration::from_secs(1), reloaded.when_ready()).await.unwrap();
        assert_eq!(reloaded.get().as_deref(), Some("dict-chrome-ex"));

        fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_clear_removes_the_file() {
        let dir = temp_dir();
        let storage = Arc::new(JsonFileStorage::new(&dir));

        let cell: PersistedCell<String> =
            PersistedCell::new("token", storage, CellOptions::new(None::<String>));
        timeout(Duration::from_secs(1), cell.when_ready()).await.unwrap();

        cell.set("secret".to_string());
        assert!(dir.join("token.json").exists());

        cell.clear();
        assert!(!dir.join("token.json").exists());

        fs::remove_dir_all(dir).ok();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_writes_from_multi_thread_runtime() {
        let dir = temp_dir();
        let storage = Arc::new(JsonFileStorage::new(&dir));

        let cell = PersistedCell::new("history", storage, CellOptions::new(Vec::<u32>::new()));
        timeout(Duration::from_secs(1), cell.when_ready()).await.unwrap();

        let writer = cell.clone();
        tokio::spawn(async move {
            for n in 1..=5u32 {
                writer.update(|items| items.push(n));
            }
        })
        .await
        .unwrap();

        let saved = fs::read_to_string(dir.join("history.json")).unwrap();
        assert_eq!(serde_json::from_str::<Vec<u32>>(&saved).unwrap(), vec![1, 2, 3, 4, 5]);

        cell.clear();
        assert!(!dir.join("history.json").exists());

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_writes_without_runtime() {
        let dir = temp_dir();
        let storage = JsonFileStorage::new(&dir);

        StorageAdapter::<String>::set_item(&storage, "token", &"abc".to_string()).unwrap();
        assert_eq!(fs::read_to_string(dir.join("token.json")).unwrap(), "\"abc\"");

        StorageAdapter::<String>::remove_item(&storage, "token").unwrap();
        StorageAdapter::<String>::remove_item(&storage, "token").unwrap();
        assert!(!dir.join("token.json").exists());

        fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_corrupt_file_leaves_cell_uninitialized() {
        let dir = temp_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("pair.json"), "{ not json").unwrap();

        let storage = Arc::new(JsonFileStorage::new(&dir));
        let cell = PersistedCell::new("pair", storage, CellOptions::new(1u32));

        assert!(timeout(Duration::from_millis(100), cell.when_ready()).await.is_err());
        assert!(!cell.is_initialized());
        assert_eq!(cell.get(), Some(1));

        fs::remove_dir_all(dir).ok();
    }
}
