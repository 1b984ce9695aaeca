use std::sync::Arc;

use serde_json::Value;
use tolk_storage::{CellOptions, Comparer, PersistedCell, StorageAdapter};

/// Storage key of the saved translations
pub const HISTORY_KEY: &str = "history";

pub type Entries = Vec<Arc<Value>>;

/// Saved translations, newest first, capped at `limit` entries.
///
/// Entries are shared between versions of the list, so the cell only has to
/// compare them by pointer.
#[derive(Clone)]
pub struct History {
    entries: PersistedCell<Entries>,
    limit: usize,
}

impl History {
    pub fn new(storage: Arc<dyn StorageAdapter<Entries>>, limit: usize) -> Self {
        let options: CellOptions<Entries> =
            CellOptions::new(Vec::new()).comparer(Comparer::shallow());
        Self {
            entries: PersistedCell::new(HISTORY_KEY, storage, options),
            limit,
        }
    }

    pub fn cell(&self) -> &PersistedCell<Entries> {
        &self.entries
    }

    /// Put `translation` in front and drop whatever falls past the limit.
    /// Returns the number of entries kept.
    pub fn save(&self, translation: Value) -> usize {
        let translation = Arc::new(translation);
        let mut len = 0;

        self.entries.replace_with(|current| {
            let mut entries = Vec::with_capacity(self.limit);
            entries.push(translation);
            if let Some(current) = current {
                entries.extend(current.iter().take(self.limit.saturating_sub(1)).cloned());
            }
            entries.truncate(self.limit);

            len = entries.len();
            Some(entries)
        });
        len
    }

    pub fn entries(&self) -> Vec<Value> {
        self.entries
            .get()
            .unwrap_or_default()
            .iter()
            .map(|entry| entry.as_ref().clone())
            .collect()
    }

    pub fn clear(&self) {
        self.entries.reset();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tolk_storage::MemoryStorage;

    use super::*;

    #[test]
    fn test_newest_first_and_bounded() {
        let storage = MemoryStorage::new();
        let history = History::new(Arc::new(storage.clone()), 2);

        history.save(json!({ "translation": "one" }));
        history.save(json!({ "translation": "two" }));
        let kept = history.save(json!({ "translation": "three" }));

        assert_eq!(kept, 2);
        assert_eq!(
            storage.item(HISTORY_KEY),
            Some(json!([{ "translation": "three" }, { "translation": "two" }]))
        );
    }

    #[test]
    fn test_null_history_starts_over() {
        let storage = MemoryStorage::new().with_item(HISTORY_KEY, Value::Null);
        let history = History::new(Arc::new(storage), 5);

        assert!(history.entries().is_empty());
        assert_eq!(history.save(json!("hi")), 1);

        history.clear();
        assert!(history.entries().is_empty());
    }

    #[test]
    fn test_concurrent_saves_are_all_kept() {
        let storage = MemoryStorage::new();
        let history = History::new(Arc::new(storage.clone()), 1000);

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let history = history.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        history.save(json!({ "writer": writer, "i": i }));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(history.entries().len(), 400);
        let stored = storage.item(HISTORY_KEY).unwrap();
        assert_eq!(stored.as_array().map(Vec::len), Some(400));
    }

    #[test]
    fn test_save_shares_older_entries() {
        let history = History::new(Arc::new(MemoryStorage::new()), 3);
        history.save(json!("one"));
        let before = history.cell().get().unwrap();

        history.save(json!("two"));
        let after = history.cell().get().unwrap();

        assert!(Arc::ptr_eq(&before[0], &after[1]));
    }
}
