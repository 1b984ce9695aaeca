use std::future::Future;
use std::pin::Pin;

use crate::error::StorageError;

/// Deferred read of a persisted value. `Ok(None)` means nothing is stored.
pub type LoadFuture<T> = Pin<Box<dyn Future<Output = Result<Option<T>, StorageError>> + Send>>;

/// Outcome of [`StorageAdapter::get_item`], which may complete right away or later
pub enum StorageRead<T> {
    Ready(Result<Option<T>, StorageError>),
    Pending(LoadFuture<T>),
}

impl<T> StorageRead<T> {
    pub fn pending<F>(load: F) -> Self
    where
        F: Future<Output = Result<Option<T>, StorageError>> + Send + 'static,
    {
        StorageRead::Pending(Box::pin(load))
    }
}

/// A value transition for `key`. `None` stands for null.
#[derive(Debug)]
pub struct Change<'a, T> {
    pub key: &'a str,
    pub value: Option<&'a T>,
    pub old_value: Option<&'a T>,
}

/// Keyed read/write/remove capability backing a persisted cell
pub trait StorageAdapter<T>: Send + Sync {
    /// Read the value stored under `key`
    fn get_item(&self, key: &str) -> StorageRead<T>;

    /// Store `value` under `key`
    fn set_item(&self, key: &str, value: &T) -> Result<(), StorageError>;

    /// Drop whatever is stored under `key`
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Called after a change has been written through
    fn on_change(&self, _change: &Change<'_, T>) {}
}
