//! Query embedding and translation of store results into [`VectorMatch`]es.

use std::sync::Arc;

use codevec_core::{CodevecError, VectorMatch};

use crate::embedding::EmbeddingAggregator;
use crate::store::{Include, QueryResult, VectorStore};

const QUERY_INCLUDE: &[Include] = &[Include::Documents, Include::Distances, Include::Metadatas];

/// Semantic search over one collection.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use codevec_index::embedding::{EmbeddingAggregator, EmbeddingClient};
/// use codevec_index::search::SearchPipeline;
/// use codevec_index::sqlite::SqliteStore;
///
/// # async fn example() -> Result<(), codevec_core::CodevecError> {
/// let aggregator = EmbeddingAggregator::new(Arc::new(EmbeddingClient::new("key")?), 8192);
/// let store = Arc::new(SqliteStore::in_memory()?);
/// let search = SearchPipeline::new(aggregator, store, "my-project");
/// for m in search.search("parse the config file", 5).await? {
///     println!("{:.3} {}", m.distance, m.id);
/// }
/// # Ok(())
/// # }
/// ```
pub struct SearchPipeline {
    aggregator: EmbeddingAggregator,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl SearchPipeline {
    pub fn new(
        aggregator: EmbeddingAggregator,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            aggregator,
            store,
            collection: collection.into(),
        }
    }

    /// Find the `result_count` entries closest to `query_text`, nearest first.
    ///
    /// A blank query matches nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Embedding`] or [`CodevecError::Store`] if
    /// either service fails, and [`CodevecError::MalformedResponse`] if the store
    /// result lacks ids, documents or distances.
    pub async fn search(
        &self,
        query_text: &str,
        result_count: usize,
    ) -> Result<Vec<VectorMatch>, CodevecError> {
        let query = query_text.trim();
        if query.is_empty() || result_count == 0 {
            tracing::debug!(result_count, "nothing to search for");
            return Ok(Vec::new());
        }

        let embedding = self.aggregator.embed_query(query).await?;
        let result = self
            .store
            .query(&self.collection, &[embedding], result_count, QUERY_INCLUDE)
            .await?;

        let matches = query_result_to_matches(result)?;
        tracing::debug!(query, matches = matches.len(), "search complete");
        Ok(matches)
    }
}

/// Flatten a grouped [`QueryResult`] into matches, keeping store order.
///
/// # Errors
///
/// Returns [`CodevecError::MalformedResponse`] if ids, documents or
/// distances are missing, contain nulls, or disagree in shape.
///
/// # Examples
///
/// ```
/// use codevec_index::search::query_result_to_matches;
/// use codevec_index::store::QueryResult;
///
/// let result = QueryResult {
///     ids: Some(vec![vec!["a.py:".into()]]),
///     documents: Some(vec![vec![Some("def a(): pass".into())]]),
///     distances: Some(vec![vec![Some(0.5)]]),
///     metadatas: None,
/// };
/// let matches = query_result_to_matches(result).unwrap();
/// assert_eq!(matches[0].document_size, 13);
///
/// assert!(query_result_to_matches(QueryResult::default()).is_err());
/// ```
pub fn query_result_to_matches(result: QueryResult) -> Result<Vec<VectorMatch>, CodevecError> {
    let ids = result
        .ids
        .ok_or_else(|| CodevecError::MalformedResponse("missing ids".into()))?;
    let documents = result
        .documents
        .ok_or_else(|| CodevecError::MalformedResponse("missing documents".into()))?;
    let distances = result
        .distances
        .ok_or_else(|| CodevecError::MalformedResponse("missing distances".into()))?;

    if ids.len() != documents.len() || ids.len() != distances.len() {
        return Err(CodevecError::MalformedResponse(format!(
            "group counts disagree: {} ids, {} documents, {} distances",
            ids.len(),
            documents.len(),
            distances.len()
        )));
    }

    let mut matches = Vec::new();
    for (group, ((ids, documents), distances)) in ids.into_iter().zip(documents).zip(distances).enumerate() {
        if ids.len() != documents.len() || ids.len() != distances.len() {
            return Err(CodevecError::MalformedResponse(format!(
                "group {group} lengths disagree: {} ids, {} documents, {} distances",
                ids.len(),
                documents.len(),
                distances.len()
            )));
        }

        for ((id, document), distance) in ids.into_iter().zip(documents).zip(distances) {
            let document = document
                .ok_or_else(|| CodevecError::MalformedResponse(format!("null document for {id}")))?;
            let distance = distance
                .ok_or_else(|| CodevecError::MalformedResponse(format!("null distance for {id}")))?;
            matches.push(VectorMatch::new(id, document, distance));
        }
    }

    Ok(matches)
}
