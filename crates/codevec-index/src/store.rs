//! Vector store abstraction.
//!
//! A [`VectorStore`] holds named collections of [`IndexEntry`] values and
//! answers nearest-neighbour queries in the grouped shape Chroma uses: one
//! group of results per query embedding. Collections are created on first use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use codevec_core::{CodevecError, EntryMetadata, IndexEntry, StoreBackend, StoreConfig};
use serde::{Deserialize, Serialize};

use crate::chroma::ChromaStore;
use crate::sqlite::SqliteStore;

/// Optional fields a query can return. Ids are always returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Include {
    Documents,
    Distances,
    Metadatas,
}

/// Grouped query results, one inner vector per query embedding.
///
/// Every field is optional because a store only fills what was asked for,
/// and remote stores may omit fields. Consumers validate before use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub ids: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<Option<f32>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<EntryMetadata>>>>,
}

impl QueryResult {
    /// A result with `groups` empty groups for each requested field.
    pub fn empty(groups: usize, include: &[Include]) -> Self {
        Self {
            ids: Some(vec![Vec::new(); groups]),
            documents: empty_groups(groups, include, Include::Documents),
            distances: empty_groups(groups, include, Include::Distances),
            metadatas: empty_groups(groups, include, Include::Metadatas),
        }
    }
}

fn empty_groups<T: Clone>(groups: usize, include: &[Include], field: Include) -> Option<Vec<Vec<T>>> {
    include
        .contains(&field)
        .then(|| vec![Vec::new(); groups])
}

/// A collection-oriented vector store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert `entries`, replacing any entry with the same id.
    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<(), CodevecError>;

    /// Find the `n_results` nearest entries to each query embedding, in
    /// ascending distance order.
    async fn query(
        &self,
        collection: &str,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        include: &[Include],
    ) -> Result<QueryResult, CodevecError>;

    /// Number of entries in `collection` (0 if it does not exist).
    async fn count(&self, collection: &str) -> Result<usize, CodevecError>;
}

/// Open the store described by `config`.
///
/// Relative SQLite paths are resolved against `root`.
///
/// # Errors
///
/// Returns [`CodevecError::Store`] if the SQLite database cannot be opened.
pub fn open_store(config: &StoreConfig, root: &Path) -> Result<Arc<dyn VectorStore>, CodevecError> {
    match config.backend {
        StoreBackend::Sqlite => {
            let path = if config.path.is_absolute() {
                config.path.clone()
            } else {
                root.join(&config.path)
            };
            tracing::debug!(path = %path.display(), "opening sqlite store");
            Ok(Arc::new(SqliteStore::open(&path)?))
        }
        StoreBackend::Chroma => {
            tracing::debug!(
                url = %config.url,
                tenant = %config.tenant,
                database = %config.database,
                "using chroma store"
            );
            Ok(Arc::new(
                ChromaStore::new(&config.url).with_database(&config.tenant, &config.database),
            ))
        }
    }
}
