//! External account directory
//!
//! The directory is an id-batched oracle: callers hand it a chunk of ids and
//! get back the records it knows. Ids missing from the reply are not found.
//! A failed request affects only the ids of that chunk.

pub mod http_client;
pub mod memory;

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::MatchError;
use crate::models::{AccountId, CustomerRecord, ShellRecord};

pub use http_client::RestDirectory;
pub use memory::InMemoryDirectory;

/// Directory client errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Snapshot error: {0}")]
    SnapshotError(String),
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Directory name for logging
    fn name(&self) -> &'static str;

    /// Look up customer accounts; unknown ids are simply absent from the reply
    async fn fetch_customers(&self, ids: &[AccountId]) -> Result<Vec<CustomerRecord>, DirectoryError>;

    /// Look up shell accounts; unknown ids are simply absent from the reply
    async fn fetch_shells(&self, ids: &[AccountId]) -> Result<Vec<ShellRecord>, DirectoryError>;
}

/// A record that carries its directory id
pub trait DirectoryRecord {
    fn directory_id(&self) -> &str;
}

impl DirectoryRecord for CustomerRecord {
    fn directory_id(&self) -> &str {
        &self.id
    }
}

impl DirectoryRecord for ShellRecord {
    fn directory_id(&self) -> &str {
        &self.id
    }
}

/// Outcome of a chunked lookup, keyed by canonical id
#[derive(Debug)]
pub struct ChunkedLookup<R> {
    pub found: HashMap<String, R>,
    /// Ids whose lookup failed, with the per-id error
    pub failed: HashMap<String, MatchError>,
}

impl<R> ChunkedLookup<R> {
    /// Error for an id that was requested but not returned
    pub fn error_for(&self, id: &AccountId) -> Option<MatchError> {
        if self.found.contains_key(id.canonical()) {
            return None;
        }
        Some(
            self.failed
                .get(id.canonical())
                .cloned()
                .unwrap_or_else(|| MatchError::NotFound(id.as_str().to_string())),
        )
    }
}

/// Fetch `ids` in chunks of at most `chunk_size`, isolating chunk failures
///
/// Returned records whose id was not requested are dropped.
pub async fn fetch_in_chunks<'a, R, F, Fut>(ids: &'a [AccountId], chunk_size: usize, fetch: F) -> ChunkedLookup<R>
where
    R: DirectoryRecord,
    F: Fn(&'a [AccountId]) -> Fut,
    Fut: Future<Output = Result<Vec<R>, DirectoryError>>,
{
    let mut found = HashMap::new();
    let mut failed = HashMap::new();

    for (chunk_index, chunk) in ids.chunks(chunk_size.max(1)).enumerate() {
        match fetch(chunk).await {
            Ok(records) => {
                debug!(
                    chunk = chunk_index,
                    requested = chunk.len(),
                    returned = records.len(),
                    "Directory chunk fetched"
                );
                for record in records {
                    let Ok(returned) = AccountId::parse(record.directory_id(), "") else {
                        warn!(id = %record.directory_id(), "Directory returned malformed id, skipping");
                        continue;
                    };
                    if chunk.iter().any(|id| *id == returned) {
                        found.insert(returned.canonical().to_string(), record);
                    }
                }
            }
            Err(e) => {
                warn!(chunk = chunk_index, ids = chunk.len(), error = %e, "Directory chunk failed");
                let error = MatchError::ChunkFetch {
                    chunk: chunk_index,
                    message: e.to_string(),
                };
                for id in chunk {
                    failed.insert(id.canonical().to_string(), error.clone());
                }
            }
        }
    }

    ChunkedLookup { found, failed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> AccountId {
        AccountId::parse(raw, "001").unwrap()
    }

    fn record(raw: &str) -> CustomerRecord {
        CustomerRecord {
            id: raw.to_string(),
            name: "Acme".into(),
            website: None,
            billing_city: None,
            billing_state: None,
            billing_country: None,
            billing_postal_code: None,
        }
    }

    #[tokio::test]
    async fn test_chunk_failure_is_isolated() {
        let ids = vec![
            id("001000000000001"),
            id("001000000000002"),
            id("001000000000003"),
        ];

        let lookup = fetch_in_chunks::<CustomerRecord, _, _>(&ids, 2, |chunk| async move {
            if chunk.iter().any(|i| i.as_str() == "001000000000003") {
                Err(DirectoryError::ApiError(503, "unavailable".into()))
            } else {
                Ok(chunk.iter().map(|i| record(i.as_str())).collect())
            }
        })
        .await;

        assert!(lookup.error_for(&ids[0]).is_none());
        assert!(lookup.error_for(&ids[1]).is_none());
        assert!(matches!(
            lookup.error_for(&ids[2]),
            Some(MatchError::ChunkFetch { chunk: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_and_unrequested_records() {
        let ids = vec![id("001000000000001"), id("001000000000002")];

        let lookup = fetch_in_chunks::<CustomerRecord, _, _>(&ids, 10, |_chunk| async move {
            Ok(vec![record("001000000000001"), record("001000000000009"), record("bogus")])
        })
        .await;

        assert_eq!(lookup.found.len(), 1);
        assert!(matches!(lookup.error_for(&ids[1]), Some(MatchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_eighteen_character_reply_matches_fifteen_character_request() {
        let ids = vec![id("001Dn00000ABCde")];

        let lookup = fetch_in_chunks::<CustomerRecord, _, _>(&ids, 10, |_chunk| async move {
            Ok(vec![record("001Dn00000ABCdeIAH")])
        })
        .await;

        assert!(lookup.error_for(&ids[0]).is_none());
    }
}
