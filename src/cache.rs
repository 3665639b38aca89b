//! Result cache consulted for views with `cache: true`.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::value::{Record, Value};

/// One collected row: its record plus the values of selected columns the
/// record type does not carry (such as hidden join columns).
#[derive(Clone, Debug, PartialEq)]
pub struct CachedRow {
    pub record: Record,
    pub unmapped: HashMap<String, Value>,
}

#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Rows stored for `key` (the statement and its arguments) of `view`.
    async fn lookup(&self, view: &str, key: &str) -> Result<Option<Vec<CachedRow>>, String>;

    async fn store(&self, view: &str, key: &str, rows: Vec<CachedRow>) -> Result<(), String>;
}

/// Unbounded process-local cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<(String, String), Vec<CachedRow>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn lookup(&self, view: &str, key: &str) -> Result<Option<Vec<CachedRow>>, String> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(view.to_string(), key.to_string())).cloned())
    }

    async fn store(&self, view: &str, key: &str, rows: Vec<CachedRow>) -> Result<(), String> {
        self.entries
            .write()
            .await
            .insert((view.to_string(), key.to_string()), rows);
        Ok(())
    }
}
