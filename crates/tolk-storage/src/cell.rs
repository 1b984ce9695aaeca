use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::adapter::{Change, StorageAdapter, StorageRead};
use crate::error::StorageError;

type Listener<T> = Arc<dyn Fn(&Change<'_, T>) + Send + Sync>;

/// Decides whether a new value is equal to the current one. Equal values are
/// dropped by [`PersistedCell::set`] without notifying or persisting.
pub struct Comparer<T>(Arc<dyn Fn(Option<&T>, Option<&T>) -> bool + Send + Sync>);

impl<T: PartialEq + 'static> Comparer<T> {
    /// Full `PartialEq` comparison
    pub fn structural() -> Self {
        Self(Arc::new(|a: Option<&T>, b: Option<&T>| a == b))
    }
}

impl<T: 'static> Comparer<T> {
    /// Every set counts as a change
    pub fn never() -> Self {
        Self(Arc::new(|_: Option<&T>, _: Option<&T>| false))
    }

    /// Custom comparison, e.g. one that only looks at the top-level fields
    pub fn by<F>(equals: F) -> Self
    where
        F: Fn(Option<&T>, Option<&T>) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(equals))
    }
}

impl<V: 'static> Comparer<Vec<Arc<V>>> {
    /// Same length and the same shared entries. Entries are compared by
    /// pointer, never by content.
    pub fn shallow() -> Self {
        Self(Arc::new(|a: Option<&Vec<Arc<V>>>, b: Option<&Vec<Arc<V>>>| {
            match (a, b) {
                (Some(a), Some(b)) => {
                    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
                }
                (a, b) => a.is_none() && b.is_none(),
            }
        }))
    }
}

impl<T> Comparer<T> {
    fn equals(&self, a: Option<&T>, b: Option<&T>) -> bool {
        (self.0)(a, b)
    }
}

impl<T> Clone for Comparer<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

pub struct CellOptions<T> {
    pub default_value: Option<T>,
    /// Start loading from the adapter as soon as the cell is built
    pub auto_init: bool,
    pub comparer: Comparer<T>,
}

impl<T: PartialEq + 'static> CellOptions<T> {
    pub fn new(default_value: impl Into<Option<T>>) -> Self {
        Self {
            default_value: default_value.into(),
            auto_init: true,
            comparer: Comparer::structural(),
        }
    }

    pub fn auto_init(mut self, auto_init: bool) -> Self {
        self.auto_init = auto_init;
        self
    }

    pub fn comparer(mut self, comparer: Comparer<T>) -> Self {
        self.comparer = comparer;
        self
    }
}

struct State<T> {
    value: Option<T>,
    initialized: bool,
    /// Bumped on every accepted change
    version: u64,
}

struct Inner<T> {
    key: String,
    default_value: Option<T>,
    adapter: Arc<dyn StorageAdapter<T>>,
    comparer: Comparer<T>,
    state: Mutex<State<T>>,
    /// Version of the last value handed to the adapter
    persisted: Mutex<u64>,
    ready: watch::Sender<bool>,
    listeners: Mutex<Vec<Listener<T>>>,
}

/// A named value backed by a [`StorageAdapter`].
///
/// The cell holds its default until the first load completes. Changes made
/// before that point stay in memory only; once initialized, every accepted
/// change is written through (`None` removes the key). Handles are cheap to
/// clone and share the same value.
pub struct PersistedCell<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for PersistedCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PersistedCell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(
        key: impl Into<String>,
        adapter: Arc<dyn StorageAdapter<T>>,
        options: CellOptions<T>,
    ) -> Self {
        let (ready, _) = watch::channel(false);
        let cell = Self {
            inner: Arc::new(Inner {
                key: key.into(),
                state: Mutex::new(State {
                    value: options.default_value.clone(),
                    initialized: false,
                    version: 0,
                }),
                persisted: Mutex::new(0),
                default_value: options.default_value,
                adapter,
                comparer: options.comparer,
                ready,
                listeners: Mutex::new(Vec::new()),
            }),
        };

        if options.auto_init {
            cell.initialize(false);
        }

        cell
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn default_value(&self) -> Option<&T> {
        self.inner.default_value.as_ref()
    }

    /// Load the stored value. No-op once initialized unless `force` is set.
    ///
    /// Asynchronous reads run on the current tokio runtime. A failed read is
    /// logged and leaves the cell uninitialized, so [`Self::when_ready`] keeps
    /// waiting.
    pub fn initialize(&self, force: bool) {
        if self.is_initialized() && !force {
            return;
        }

        match self.inner.adapter.get_item(&self.inner.key) {
            StorageRead::Ready(result) => self.finish_load(result),
            StorageRead::Pending(load) => {
                let Ok(runtime) = Handle::try_current() else {
                    tracing::warn!(
                        key = %self.inner.key,
                        "[init]: no async runtime to load persisted value, cell stays uninitialized"
                    );
                    return;
                };

                let cell = self.clone();
                runtime.spawn(async move {
                    let result = load.await;
                    cell.finish_load(result);
                });
            }
        }
    }

    fn finish_load(&self, result: Result<Option<T>, StorageError>) {
        match result {
            Ok(data) => {
                if let Some(data) = data
                    && !self.is_default(&data)
                {
                    self.set(data);
                }

                self.state().initialized = true;
                self.inner.ready.send_replace(true);
                tracing::debug!(key = %self.inner.key, "persisted cell ready");
            }
            Err(e) => {
                tracing::error!(key = %self.inner.key, "[init]: {e}");
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state().initialized
    }

    /// Resolves once the first load has completed
    pub async fn when_ready(&self) {
        let mut ready = self.inner.ready.subscribe();
        // The sender lives inside the cell, so this only ends once the flag flips
        let _ = ready.wait_for(|ready| *ready).await;
    }

    pub fn is_default(&self, value: &T) -> bool {
        self.inner.default_value.as_ref() == Some(value)
    }

    pub fn get(&self) -> Option<T> {
        self.state().value.clone()
    }

    pub fn set(&self, value: impl Into<Option<T>>) {
        let next = value.into();
        self.modify(|_| Some(next));
    }

    /// Compute the next value from the current one and store it, as one step
    /// with respect to other writers. Returns whether the value changed.
    ///
    /// `f` runs while the cell is locked and must not touch the cell itself.
    pub fn replace_with(&self, f: impl FnOnce(Option<&T>) -> Option<T>) -> bool {
        self.modify(|current| Some(f(current)))
    }

    /// Apply `f` to a copy of the current value and store the result.
    /// Does nothing while the value is null.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let key = &self.inner.key;
        self.modify(|current| {
            let Some(current) = current else {
                tracing::debug!(key = %key, "update skipped, value is null");
                return None;
            };

            let mut draft = current.clone();
            f(&mut draft);
            Some(Some(draft))
        });
    }

    /// `f` returns `None` to leave the value alone
    fn modify(&self, f: impl FnOnce(Option<&T>) -> Option<Option<T>>) -> bool {
        let (next, old, version) = {
            let mut state = self.state();
            let Some(next) = f(state.value.as_ref()) else {
                return false;
            };
            if self.inner.comparer.equals(state.value.as_ref(), next.as_ref()) {
                return false;
            }
            let old = std::mem::replace(&mut state.value, next.clone());
            state.version += 1;
            (next, old, state.initialized.then_some(state.version))
        };

        self.on_change(next.as_ref(), old.as_ref(), version);
        true
    }

    pub fn reset(&self) {
        self.set(self.inner.default_value.clone());
    }

    pub fn clear(&self) {
        self.set(None);
    }

    /// Register a listener for accepted changes. Listeners run synchronously
    /// after the value is replaced and the cell is unlocked, so they may write
    /// back to it.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&Change<'_, T>) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// `version` is set when the change happened after initialization
    fn on_change(&self, value: Option<&T>, old_value: Option<&T>, version: Option<u64>) {
        let change = Change {
            key: &self.inner.key,
            value,
            old_value,
        };

        if let Some(version) = version {
            let mut persisted = self
                .inner
                .persisted
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            // a concurrent writer already stored something newer
            if version > *persisted {
                self.persist(&change);
                *persisted = version;
            }
        }

        let listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            listener(&change);
        }
    }

    fn persist(&self, change: &Change<'_, T>) {
        let adapter = &self.inner.adapter;
        let result = match change.value {
            None => adapter.remove_item(change.key),
            Some(value) => adapter.set_item(change.key, value),
        };

        match result {
            Ok(()) => adapter.on_change(change),
            Err(e) => tracing::error!(key = %change.key, "[change]: {e}"),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> PersistedCell<T>
where
    T: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Shallow-merge the fields of a json object into the current value.
    ///
    /// A null current value takes the partial as a whole record, a non-object
    /// partial replaces the value, and a null partial changes nothing.
    pub fn merge(&self, partial: Value) -> Result<(), StorageError> {
        if partial.is_null() {
            return Ok(());
        }

        let mut result = Ok(());
        self.modify(|current| match merged(current, partial) {
            Ok(next) => Some(Some(next)),
            Err(e) => {
                result = Err(e);
                None
            }
        });
        result
    }
}

fn merged<T>(current: Option<&T>, partial: Value) -> Result<T, StorageError>
where
    T: Serialize + DeserializeOwned,
{
    let next = match (current, partial) {
        (Some(current), Value::Object(patch)) => {
            let mut draft = serde_json::to_value(current)?;
            match draft.as_object_mut() {
                Some(fields) => {
                    fields.extend(patch);
                    serde_json::from_value(draft)?
                }
                None => serde_json::from_value(Value::Object(patch))?,
            }
        }
        (_, partial) => serde_json::from_value(partial)?,
    };
    Ok(next)
}

impl<T: fmt::Debug> fmt::Debug for PersistedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("PersistedCell")
            .field("key", &self.inner.key)
            .field("value", &state.value)
            .field("initialized", &state.initialized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde::Deserialize;
    use serde_json::json;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    use super::*;
    use crate::memory::MemoryStorage;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Pair {
        a: i32,
        b: i32,
    }

    enum Load<T> {
        Value(Option<T>),
        Deferred(Mutex<Option<oneshot::Receiver<Option<T>>>>),
        Fail,
    }

    /// Adapter that records writes and serves a scripted read
    struct Recording<T> {
        load: Load<T>,
        writes: Mutex<Vec<(String, Option<T>)>>,
        changes: AtomicUsize,
    }

    impl<T> Recording<T> {
        fn new(load: Load<T>) -> Arc<Self> {
            Arc::new(Self {
                load,
                writes: Mutex::new(Vec::new()),
                changes: AtomicUsize::new(0),
            })
        }

        fn writes(&self) -> Vec<(String, Option<T>)>
        where
            T: Clone,
        {
            self.writes.lock().unwrap().clone()
        }
    }

    impl<T: Clone + Send + Sync + 'static> StorageAdapter<T> for Recording<T> {
        fn get_item(&self, _key: &str) -> StorageRead<T> {
            match &self.load {
                Load::Value(value) => StorageRead::Ready(Ok(value.clone())),
                Load::Deferred(rx) => {
                    let rx = rx.lock().unwrap().take().expect("read once");
                    StorageRead::pending(async move {
                        rx.await
                            .map_err(|_| StorageError::Unavailable("dropped".to_string()))
                    })
                }
                Load::Fail => StorageRead::Ready(Err(StorageError::Unavailable(
                    "backing store offline".to_string(),
                ))),
            }
        }

        fn set_item(&self, key: &str, value: &T) -> Result<(), StorageError> {
            self.writes
                .lock()
                .unwrap()
                .push((key.to_string(), Some(value.clone())));
            Ok(())
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.writes.lock().unwrap().push((key.to_string(), None));
            Ok(())
        }

        fn on_change(&self, _change: &Change<'_, T>) {
            self.changes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pair(a: i32, b: i32) -> Pair {
        Pair { a, b }
    }

    #[test]
    fn test_loaded_value_replaces_default() {
        let adapter = Recording::new(Load::Value(Some(pair(7, 8))));
        let cell = PersistedCell::new("pair", adapter.clone(), CellOptions::new(pair(0, 2)));

        assert!(cell.is_initialized());
        assert_eq!(cell.get(), Some(pair(7, 8)));
        // adopting the loaded value is not a write
        assert!(adapter.writes().is_empty());
    }

    #[test]
    fn test_missing_or_default_value_keeps_default() {
        let missing = Recording::new(Load::Value(None));
        let cell = PersistedCell::new("pair", missing, CellOptions::new(pair(0, 2)));
        assert_eq!(cell.get(), Some(pair(0, 2)));
        assert!(cell.is_initialized());

        let same = Recording::new(Load::Value(Some(pair(0, 2))));
        let cell = PersistedCell::new("pair", same.clone(), CellOptions::new(pair(0, 2)));
        assert_eq!(cell.get(), Some(pair(0, 2)));
        assert!(same.writes().is_empty());
    }

    #[tokio::test]
    async fn test_async_load_holds_default_until_ready() {
        let (tx, rx) = oneshot::channel();
        let adapter = Recording::new(Load::Deferred(Mutex::new(Some(rx))));
        let cell = PersistedCell::new("client", adapter.clone(), CellOptions::new("gtx".to_string()));

        assert!(!cell.is_initialized());
        assert_eq!(cell.get().as_deref(), Some("gtx"));

        tx.send(Some("dict-chrome-ex".to_string())).unwrap();
        timeout(Duration::from_secs(1), cell.when_ready())
            .await
            .expect("cell never became ready");

        assert_eq!(cell.get().as_deref(), Some("dict-chrome-ex"));
        // resolved signal returns immediately on later awaits
        timeout(Duration::from_millis(10), cell.when_ready()).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_before_load_is_not_persisted_and_can_be_overwritten() {
        let (tx, rx) = oneshot::channel();
        let adapter = Recording::new(Load::Deferred(Mutex::new(Some(rx))));
        let cell = PersistedCell::new("client", adapter.clone(), CellOptions::new("gtx".to_string()));

        cell.set("early".to_string());
        assert_eq!(cell.get().as_deref(), Some("early"));
        assert!(adapter.writes().is_empty());

        tx.send(Some("stored".to_string())).unwrap();
        timeout(Duration::from_secs(1), cell.when_ready()).await.unwrap();

        assert_eq!(cell.get().as_deref(), Some("stored"));
        assert!(adapter.writes().is_empty());

        cell.set("late".to_string());
        assert_eq!(
            adapter.writes(),
            vec![("client".to_string(), Some("late".to_string()))]
        );
    }

    #[test]
    fn test_equal_sets_persist_once() {
        let adapter = Recording::new(Load::Value(None));
        let cell = PersistedCell::new("pair", adapter.clone(), CellOptions::new(pair(0, 2)));

        cell.set(pair(1, 1));
        cell.set(pair(1, 1));

        assert_eq!(adapter.writes().len(), 1);
        assert_eq!(adapter.changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_never_comparer_persists_every_set() {
        let adapter = Recording::new(Load::Value(None));
        let options = CellOptions::new(pair(0, 2)).comparer(Comparer::never());
        let cell = PersistedCell::new("pair", adapter.clone(), options);

        cell.set(pair(1, 1));
        cell.set(pair(1, 1));

        assert_eq!(adapter.writes().len(), 2);
    }

    #[test]
    fn test_merge_partial_and_update_draft() {
        let storage = Arc::new(MemoryStorage::new());
        let cell = PersistedCell::new("pair", storage, CellOptions::new(pair(0, 2)));

        cell.merge(json!({ "a": 1 })).unwrap();
        assert_eq!(cell.get(), Some(pair(1, 2)));

        cell.update(|draft| draft.a = 5);
        assert_eq!(cell.get(), Some(pair(5, 2)));
    }

    #[test]
    fn test_merge_with_bad_field_type_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let cell = PersistedCell::new("pair", storage, CellOptions::new(pair(0, 2)));

        let result = cell.merge(json!({ "a": "not a number" }));

        assert!(matches!(result, Err(StorageError::Serialization(_))));
        assert_eq!(cell.get(), Some(pair(0, 2)));
    }

    #[test]
    fn test_reset_and_clear_differ() {
        let adapter = Recording::new(Load::Value(None));
        let cell = PersistedCell::new("pair", adapter.clone(), CellOptions::new(pair(0, 2)));

        cell.set(pair(9, 9));
        cell.reset();
        assert_eq!(cell.get(), Some(pair(0, 2)));

        cell.clear();
        assert_eq!(cell.get(), None);
        assert_eq!(adapter.writes().last(), Some(&("pair".to_string(), None)));

        cell.update(|draft| draft.a = 1);
        assert_eq!(cell.get(), None);
    }

    #[tokio::test]
    async fn test_failed_load_never_becomes_ready() {
        let adapter = Recording::new(Load::Fail);
        let cell = PersistedCell::new("pair", adapter.clone(), CellOptions::new(pair(0, 2)));

        assert!(!cell.is_initialized());
        assert!(timeout(Duration::from_millis(50), cell.when_ready()).await.is_err());

        cell.set(pair(3, 3));
        assert_eq!(cell.get(), Some(pair(3, 3)));
        assert!(adapter.writes().is_empty());
    }

    #[test]
    fn test_listeners_see_accepted_changes_only() {
        let storage = Arc::new(MemoryStorage::new());
        let cell = PersistedCell::new("counter", storage, CellOptions::new(0u32));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        cell.subscribe(move |change| {
            sink.lock()
                .unwrap()
                .push((change.old_value.copied(), change.value.copied()));
        });

        cell.set(1u32);
        cell.set(1u32);
        cell.clear();

        assert_eq!(*seen.lock().unwrap(), vec![(Some(0), Some(1)), (Some(1), None)]);
    }

    #[test]
    fn test_manual_initialize() {
        let adapter = Recording::new(Load::Value(Some(pair(4, 4))));
        let options = CellOptions::new(pair(0, 2)).auto_init(false);
        let cell = PersistedCell::new("pair", adapter, options);

        assert!(!cell.is_initialized());
        assert_eq!(cell.get(), Some(pair(0, 2)));

        cell.initialize(false);
        assert!(cell.is_initialized());
        assert_eq!(cell.get(), Some(pair(4, 4)));
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let storage = MemoryStorage::new();
        let cell = PersistedCell::new("counter", Arc::new(storage.clone()), CellOptions::new(0u32));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let cell = cell.clone();
                std::thread::spawn(move || {
                    for _ in 0..2000 {
                        cell.update(|count| *count += 1);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(cell.get(), Some(16_000));
        // the newest value wins in storage too
        assert_eq!(storage.item("counter"), Some(json!(16_000)));
    }

    #[test]
    fn test_concurrent_merges_keep_every_field() {
        let storage = Arc::new(MemoryStorage::new());
        let cell = PersistedCell::new("pair", storage, CellOptions::new(pair(0, 0)));

        let a = {
            let cell = cell.clone();
            std::thread::spawn(move || {
                for i in 1..=500 {
                    cell.merge(json!({ "a": i })).unwrap();
                    cell.update(|draft| draft.b += 1);
                }
            })
        };
        for i in 1..=500 {
            cell.update(|draft| draft.b += 1);
            cell.merge(json!({ "a": -i })).unwrap();
        }
        a.join().unwrap();

        assert_eq!(cell.get().map(|pair| pair.b), Some(1000));
    }

    #[test]
    fn test_listener_can_write_back() {
        let storage = Arc::new(MemoryStorage::new());
        let cell = PersistedCell::new("counter", storage, CellOptions::new(0u32));

        let target = cell.clone();
        cell.subscribe(move |change| {
            if change.value == Some(&1) {
                target.set(2u32);
            }
        });

        let (done, finished) = std::sync::mpsc::channel();
        let writer = cell.clone();
        std::thread::spawn(move || {
            writer.set(1u32);
            done.send(()).ok();
        });

        finished
            .recv_timeout(Duration::from_secs(2))
            .expect("set from a listener never returned");
        assert_eq!(cell.get(), Some(2));
    }

    #[test]
    fn test_replace_with_reports_change() {
        let adapter = Recording::new(Load::Value(None));
        let cell = PersistedCell::new("counter", adapter.clone(), CellOptions::new(1u32));

        assert!(!cell.replace_with(|current| current.copied()));
        assert!(cell.replace_with(|current| current.map(|n| n * 10)));
        assert!(cell.replace_with(|_| None));

        assert_eq!(
            adapter.writes(),
            vec![("counter".to_string(), Some(10)), ("counter".to_string(), None)]
        );
    }

    #[test]
    fn test_shallow_comparer_checks_entries_by_pointer() {
        let adapter = Recording::new(Load::Value(None));
        let first = Arc::new(json!({ "translation": "one" }));
        let options = CellOptions::new(vec![first.clone()]).comparer(Comparer::shallow());
        let cell = PersistedCell::new("history", adapter.clone(), options);

        // same entries in a fresh vector
        cell.set(vec![first.clone()]);
        assert!(adapter.writes().is_empty());

        // equal content, different entry
        cell.set(vec![Arc::new(json!({ "translation": "one" }))]);
        assert_eq!(adapter.writes().len(), 1);

        cell.clear();
        cell.clear();
        assert_eq!(adapter.writes().len(), 2);
    }
}
