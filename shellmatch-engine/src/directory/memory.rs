//! In-memory account directory
//!
//! Serves lookups from a JSON snapshot (`{"customers": [...], "shells": [...]}`)
//! for offline runs and tests.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

use super::{AccountDirectory, DirectoryError, DirectoryRecord};
use crate::models::{AccountId, CustomerRecord, ShellRecord};

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    customers: Vec<CustomerRecord>,
    #[serde(default)]
    shells: Vec<ShellRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    customers: HashMap<String, CustomerRecord>,
    shells: HashMap<String, ShellRecord>,
    /// Size of every chunk request received, in arrival order
    chunk_sizes: Mutex<Vec<usize>>,
}

impl InMemoryDirectory {
    pub fn new(customers: Vec<CustomerRecord>, shells: Vec<ShellRecord>) -> Self {
        Self {
            customers: index_by_canonical(customers),
            shells: index_by_canonical(shells),
            chunk_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Load a JSON snapshot file
    pub fn from_snapshot(path: &Path) -> Result<Self, DirectoryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DirectoryError::SnapshotError(format!("{}: {}", path.display(), e)))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .map_err(|e| DirectoryError::ParseError(format!("{}: {}", path.display(), e)))?;

        info!(
            path = %path.display(),
            customers = snapshot.customers.len(),
            shells = snapshot.shells.len(),
            "Loaded directory snapshot"
        );

        Ok(Self::new(snapshot.customers, snapshot.shells))
    }

    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.chunk_sizes
            .lock()
            .map(|sizes| sizes.clone())
            .unwrap_or_default()
    }

    fn record_chunk(&self, len: usize) {
        if let Ok(mut sizes) = self.chunk_sizes.lock() {
            sizes.push(len);
        }
    }
}

fn index_by_canonical<R: DirectoryRecord>(records: Vec<R>) -> HashMap<String, R> {
    let mut indexed = HashMap::with_capacity(records.len());
    for record in records {
        match AccountId::parse(record.directory_id(), "") {
            Ok(id) => {
                indexed.insert(id.canonical().to_string(), record);
            }
            Err(e) => warn!(error = %e, "Skipping snapshot record with malformed id"),
        }
    }
    indexed
}

fn lookup<R: Clone>(records: &HashMap<String, R>, ids: &[AccountId]) -> Vec<R> {
    ids.iter()
        .filter_map(|id| records.get(id.canonical()).cloned())
        .collect()
}

#[async_trait]
impl AccountDirectory for InMemoryDirectory {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_customers(&self, ids: &[AccountId]) -> Result<Vec<CustomerRecord>, DirectoryError> {
        self.record_chunk(ids.len());
        Ok(lookup(&self.customers, ids))
    }

    async fn fetch_shells(&self, ids: &[AccountId]) -> Result<Vec<ShellRecord>, DirectoryError> {
        self.record_chunk(ids.len());
        Ok(lookup(&self.shells, ids))
    }
}
