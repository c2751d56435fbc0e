//! Chroma server [`VectorStore`] over its HTTP v2 API.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use codevec_core::{CodevecError, EntryMetadata, IndexEntry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::store::{Include, QueryResult, VectorStore};

pub const DEFAULT_TENANT: &str = "default_tenant";
pub const DEFAULT_DATABASE: &str = "default_database";

/// Client for a Chroma server.
///
/// Collections live under one tenant and database. Collection ids are
/// resolved with `get_or_create` on first use and cached.
///
/// # Examples
///
/// ```
/// use codevec_index::chroma::ChromaStore;
///
/// let store = ChromaStore::new("http://localhost:8000/").with_database("acme", "code");
/// assert_eq!(store.base_url(), "http://localhost:8000");
/// assert_eq!(
///     store.collections_url(),
///     "http://localhost:8000/api/v2/tenants/acme/databases/code/collections"
/// );
/// ```
pub struct ChromaStore {
    client: reqwest::Client,
    base_url: String,
    tenant: String,
    database: String,
    collection_ids: Mutex<HashMap<String, String>>,
}

impl std::fmt::Debug for ChromaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromaStore")
            .field("base_url", &self.base_url)
            .field("tenant", &self.tenant)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CreateCollection<'a> {
    name: &'a str,
    get_or_create: bool,
    metadata: serde_json::Value,
}

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    ids: Vec<&'a str>,
    embeddings: Vec<&'a [f32]>,
    documents: Vec<&'a str>,
    metadatas: Vec<&'a EntryMetadata>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: &'a [Vec<f32>],
    n_results: usize,
    include: &'a [Include],
}

impl ChromaStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant: DEFAULT_TENANT.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection_ids: Mutex::new(HashMap::new()),
        }
    }

    /// Use `tenant` and `database` instead of Chroma's defaults.
    pub fn with_database(mut self, tenant: &str, database: &str) -> Self {
        self.tenant = tenant.to_string();
        self.database = database.to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, self.tenant, self.database
        )
    }

    fn cached_id(&self, name: &str) -> Option<String> {
        self.collection_ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    async fn collection_id(&self, name: &str) -> Result<String, CodevecError> {
        if let Some(id) = self.cached_id(name) {
            return Ok(id);
        }

        let request = CreateCollection {
            name,
            get_or_create: true,
            metadata: serde_json::json!({ "hnsw:space": "cosine" }),
        };
        let info: CollectionInfo = self.post(self.collections_url(), &request).await?;
        tracing::debug!(collection = name, id = %info.id, "resolved chroma collection");

        self.collection_ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), info.id.clone());
        Ok(info.id)
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
    ) -> Result<R, CodevecError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| CodevecError::Store(format!("chroma request failed: {e}")))?;
        read_json(response).await
    }
}

async fn read_json<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, CodevecError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read response body".into());
        return Err(CodevecError::Store(format!(
            "chroma returned {status}: {body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| CodevecError::Store(format!("failed to parse chroma response: {e}")))
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<(), CodevecError> {
        let id = self.collection_id(collection).await?;
        if entries.is_empty() {
            return Ok(());
        }

        let request = UpsertRequest {
            ids: entries.iter().map(|e| e.id.as_str()).collect(),
            embeddings: entries.iter().map(|e| e.embedding.as_slice()).collect(),
            documents: entries.iter().map(|e| e.document.as_str()).collect(),
            metadatas: entries.iter().map(|e| &e.metadata).collect(),
        };
        let _: serde_json::Value = self
            .post(format!("{}/{id}/upsert", self.collections_url()), &request)
            .await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        include: &[Include],
    ) -> Result<QueryResult, CodevecError> {
        let id = self.collection_id(collection).await?;
        if self.count(collection).await? == 0 {
            return Ok(QueryResult::empty(query_embeddings.len(), include));
        }

        let request = QueryRequest {
            query_embeddings,
            n_results,
            include,
        };
        self.post(format!("{}/{id}/query", self.collections_url()), &request)
            .await
    }

    async fn count(&self, collection: &str) -> Result<usize, CodevecError> {
        let id = self.collection_id(collection).await?;
        let response = self
            .client
            .get(format!("{}/{id}/count", self.collections_url()))
            .send()
            .await
            .map_err(|e| CodevecError::Store(format!("chroma request failed: {e}")))?;
        read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COLLECTIONS: &str = "/api/v2/tenants/default_tenant/databases/default_database/collections";

    async fn mount_collection(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(COLLECTIONS))
            .and(body_partial_json(
                serde_json::json!({"name": "repo", "get_or_create": true}),
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "c-123", "name": "repo"})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_count(server: &MockServer, n: usize) {
        Mock::given(method("GET"))
            .and(path(format!("{COLLECTIONS}/c-123/count")))
            .respond_with(ResponseTemplate::new(200).set_body_json(n))
            .mount(server)
            .await;
    }

    fn entry() -> IndexEntry {
        IndexEntry {
            id: "src/a.py:".into(),
            document: "def a(): pass".into(),
            embedding: vec![0.1, 0.2],
            metadata: EntryMetadata {
                path: "src/a.py".into(),
                enclosing_type_name: String::new(),
                start_line: 1,
                end_line: 1,
            },
        }
    }

    #[tokio::test]
    async fn upsert_sends_parallel_arrays_and_caches_collection() {
        let server = MockServer::start().await;
        mount_collection(&server).await;
        Mock::given(method("POST"))
            .and(path(format!("{COLLECTIONS}/c-123/upsert")))
            .and(body_partial_json(serde_json::json!({
                "ids": ["src/a.py:"],
                "documents": ["def a(): pass"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(true))
            .expect(2)
            .mount(&server)
            .await;

        let store = ChromaStore::new(&server.uri());
        store.upsert("repo", &[entry()]).await.unwrap();
        store.upsert("repo", &[entry()]).await.unwrap();
    }

    #[tokio::test]
    async fn query_parses_grouped_result() {
        let server = MockServer::start().await;
        mount_collection(&server).await;
        mount_count(&server, 1).await;
        Mock::given(method("POST"))
            .and(path(format!("{COLLECTIONS}/c-123/query")))
            .and(body_partial_json(serde_json::json!({
                "n_results": 3,
                "include": ["documents", "distances"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ids": [["src/a.py:"]],
                "documents": [["def a(): pass"]],
                "distances": [[0.25]],
                "metadatas": null,
                "embeddings": null,
            })))
            .mount(&server)
            .await;

        let store = ChromaStore::new(&server.uri());
        let result = store
            .query("repo", &[vec![0.1, 0.2]], 3, &[Include::Documents, Include::Distances])
            .await
            .unwrap();
        assert_eq!(result.ids, Some(vec![vec!["src/a.py:".to_string()]]));
        assert_eq!(result.distances, Some(vec![vec![Some(0.25)]]));
        assert!(result.metadatas.is_none());
    }

    #[tokio::test]
    async fn empty_collection_short_circuits() {
        let server = MockServer::start().await;
        mount_collection(&server).await;
        mount_count(&server, 0).await;

        let store = ChromaStore::new(&server.uri());
        let result = store
            .query("repo", &[vec![1.0]], 5, &[Include::Documents])
            .await
            .unwrap();
        assert_eq!(result, QueryResult::empty(1, &[Include::Documents]));
    }

    #[tokio::test]
    async fn tenant_and_database_prefix_every_route() {
        let server = MockServer::start().await;
        let prefix = "/api/v2/tenants/acme/databases/code/collections";
        Mock::given(method("POST"))
            .and(path(prefix))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "c-9", "name": "repo"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{prefix}/c-9/count")))
            .respond_with(ResponseTemplate::new(200).set_body_json(7))
            .expect(1)
            .mount(&server)
            .await;

        let store = ChromaStore::new(&server.uri()).with_database("acme", "code");
        assert_eq!(store.count("repo").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn server_errors_are_store_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let store = ChromaStore::new(&server.uri());
        let err = store.upsert("repo", &[entry()]).await.unwrap_err();
        assert!(matches!(err, CodevecError::Store(_)));
        assert!(err.to_string().contains("500"));
    }
}
