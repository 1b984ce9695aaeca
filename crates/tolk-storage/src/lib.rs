//! Persisted state for the translator: a storage adapter contract and
//! [`PersistedCell`], a single named value that loads itself from an adapter,
//! notifies listeners on change and writes accepted changes back.

pub mod adapter;
pub mod cell;
pub mod error;
pub mod file;
pub mod memory;

pub use adapter::{Change, LoadFuture, StorageAdapter, StorageRead};
pub use cell::{CellOptions, Comparer, PersistedCell};
pub use error::StorageError;
pub use file::JsonFileStorage;
pub use memory::MemoryStorage;
