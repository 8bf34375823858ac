use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError, PartialEq)]
pub enum StoreError {
    #[error("key {0} not found")]
    NotFound(String),
}

/// The storage collaborator consumed by the command dispatcher. Implementations must serialize
/// concurrent writers while letting readers proceed without blocking each other.
pub trait Engine: Send + Sync {
    fn set(&self, key: String, value: String) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<String, StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// The Store keeps key-value pairs in memory behind a single reader/writer lock. It is designed to
/// be shared and cloned cheaply using reference counting.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    pub fn new() -> Store {
        Self::default()
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Default)]
pub struct InnerStore {
    state: RwLock<HashMap<String, String>>,
}

impl InnerStore {
    pub fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn size(&self) -> usize {
        self.read().len()
    }
}

impl Engine for Store {
    fn set(&self, key: String, value: String) -> Result<(), StoreError> {
        self.write().insert(key, value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<String, StoreError> {
        self.read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}
