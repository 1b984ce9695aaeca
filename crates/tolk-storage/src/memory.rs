use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::adapter::{StorageAdapter, StorageRead};
use crate::error::StorageError;

/// Process-local json store. Reads complete synchronously.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw json value under `key`
    pub fn with_item(self, key: impl Into<String>, value: Value) -> Self {
        self.items().insert(key.into(), value);
        self
    }

    /// Raw json currently stored under `key`
    pub fn item(&self, key: &str) -> Option<Value> {
        self.items().get(key).cloned()
    }

    fn items(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> StorageAdapter<T> for MemoryStorage
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn get_item(&self, key: &str) -> StorageRead<T> {
        let result = match self.item(key) {
            Some(value) => serde_json::from_value::<Option<T>>(value).map_err(StorageError::from),
            None => Ok(None),
        };
        StorageRead::Ready(result)
    }

    fn set_item(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value)?;
        self.items().insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items().remove(key);
        Ok(())
    }
}
