//! Embedding model client and per-artifact vector aggregation.
//!
//! [`Embedder`] is the seam to the model. [`EmbeddingClient`] implements it
//! over an OpenAI-compatible `/embeddings` endpoint. Voyage models also get
//! `input_type: "document"` for indexing and `input_type: "query"` for
//! searching. [`EmbeddingAggregator`] turns a unit of any length into one
//! vector by chunking oversized text and mean-pooling the chunk vectors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use codevec_core::{Artifact, CodevecError, EmbeddingConfig};
use serde::{Deserialize, Serialize};

use crate::chunker::chunk_text;

/// Environment variable consulted when the config carries no API key.
pub const API_KEY_ENV: &str = "CODEVEC_EMBEDDING_API_KEY";

/// A text embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a document fragment.
    async fn encode(&self, text: &str) -> Result<Vec<f32>, CodevecError>;

    /// Embed a search query. Models without a separate query mode reuse
    /// [`Embedder::encode`].
    async fn encode_query(&self, text: &str) -> Result<Vec<f32>, CodevecError> {
        self.encode(text).await
    }
}

/// Client for an OpenAI-compatible embeddings API.
///
/// # Examples
///
/// ```
/// use codevec_index::embedding::EmbeddingClient;
///
/// let client = EmbeddingClient::new("test-key").unwrap();
/// assert_eq!(client.model(), "text-embedding-3-small");
/// ```
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    input_types: bool,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("input_types", &self.input_types)
            .finish_non_exhaustive()
    }
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Provider whose API distinguishes document and query embeddings.
const VOYAGE_PROVIDER: &str = "voyage";

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_type: Option<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, CodevecError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CodevecError::Config(format!("failed to build HTTP client: {e}")))
}

impl EmbeddingClient {
    /// Create a client against the default endpoint and model.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Config`] if the HTTP client cannot be built.
    pub fn new(api_key: &str) -> Result<Self, CodevecError> {
        Ok(Self {
            client: http_client(DEFAULT_TIMEOUT)?,
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            input_types: false,
        })
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// Falls back to the `CODEVEC_EMBEDDING_API_KEY` env var if no key is in
    /// the config. `provider = "voyage"` turns on `input_type`.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Config`] if no API key is available or the
    /// HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use codevec_core::EmbeddingConfig;
    /// use codevec_index::embedding::EmbeddingClient;
    ///
    /// let config = EmbeddingConfig {
    ///     api_key: Some("sk-test".into()),
    ///     ..EmbeddingConfig::default()
    /// };
    /// let client = EmbeddingClient::with_config(&config).unwrap();
    /// assert_eq!(client.model(), config.model);
    /// ```
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self, CodevecError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
            .ok_or_else(|| {
                CodevecError::Config(format!(
                    "embedding API key not found: set embedding.api_key in .codevec.toml or {API_KEY_ENV} env var"
                ))
            })?;

        Ok(Self {
            client: http_client(Duration::from_secs(config.timeout_secs))?,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            input_types: config.provider.eq_ignore_ascii_case(VOYAGE_PROVIDER),
        })
    }

    /// Point the client at a different endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, text: &str, input_type: &str) -> Result<Vec<f32>, CodevecError> {
        let request = EmbedRequest {
            model: &self.model,
            input: vec![text],
            input_type: self.input_types.then_some(input_type),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CodevecError::Embedding(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(CodevecError::Embedding(format!(
                "embedding API returned {status}: {body}"
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| CodevecError::Embedding(format!("failed to parse response: {e}")))?;

        let first = embed_response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| CodevecError::Embedding("empty response from embedding API".into()))?;

        Ok(first.embedding)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, CodevecError> {
        self.request(text, "document").await
    }

    async fn encode_query(&self, text: &str) -> Result<Vec<f32>, CodevecError> {
        self.request(text, "query").await
    }
}

/// Produces one vector per text regardless of its length.
///
/// Text within `max_input_chars` characters is embedded as-is. Longer text is
/// split with [`chunk_text`], each chunk is embedded independently, and the
/// result is the component-wise arithmetic mean of the chunk vectors.
#[derive(Clone)]
pub struct EmbeddingAggregator {
    embedder: Arc<dyn Embedder>,
    max_input_chars: usize,
}

impl std::fmt::Debug for EmbeddingAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingAggregator")
            .field("max_input_chars", &self.max_input_chars)
            .finish_non_exhaustive()
    }
}

impl EmbeddingAggregator {
    pub fn new(embedder: Arc<dyn Embedder>, max_input_chars: usize) -> Self {
        Self {
            embedder,
            max_input_chars: max_input_chars.max(1),
        }
    }

    /// Embed `text`, chunking and mean-pooling when it is too long.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Embedding`] if the model fails, returns an
    /// empty vector, or returns chunk vectors of different lengths.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, CodevecError> {
        if text.chars().count() <= self.max_input_chars {
            let vector = self.embedder.encode(text).await?;
            return non_empty(vector);
        }

        let chunks = chunk_text(text, self.max_input_chars);
        let mut vectors = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let longest = chunk
                .text
                .split('\n')
                .map(|line| line.chars().count())
                .max()
                .unwrap_or(0);
            if longest > self.max_input_chars {
                tracing::warn!(
                    longest,
                    max = self.max_input_chars,
                    "single line longer than the embedding window, sent whole"
                );
            }
            vectors.push(non_empty(self.embedder.encode(&chunk.text).await?)?);
        }
        tracing::debug!(chunks = chunks.len(), "mean-pooled oversized text");
        mean_pool(&vectors)
    }

    /// Return `artifact` with its embedding set.
    ///
    /// # Errors
    ///
    /// See [`EmbeddingAggregator::embed_text`].
    pub async fn embed_artifact(&self, mut artifact: Artifact) -> Result<Artifact, CodevecError> {
        artifact.embedding = Some(self.embed_text(&artifact.content).await?);
        Ok(artifact)
    }

    /// Embed a search query.
    ///
    /// Queries are short, so they go to the model in one piece via
    /// [`Embedder::encode_query`].
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Embedding`] if the model fails or returns an
    /// empty vector.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, CodevecError> {
        non_empty(self.embedder.encode_query(text).await?)
    }
}

fn non_empty(vector: Vec<f32>) -> Result<Vec<f32>, CodevecError> {
    if vector.is_empty() {
        return Err(CodevecError::Embedding(
            "model returned an empty vector".into(),
        ));
    }
    Ok(vector)
}

/// Unweighted component-wise mean of equally sized vectors.
///
/// # Errors
///
/// Returns [`CodevecError::Embedding`] if `vectors` is empty or the
/// dimensions disagree.
///
/// # Examples
///
/// ```
/// use codevec_index::embedding::mean_pool;
///
/// let mean = mean_pool(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
/// assert_eq!(mean, vec![2.0, 3.0]);
/// ```
pub fn mean_pool(vectors: &[Vec<f32>]) -> Result<Vec<f32>, CodevecError> {
    let first = vectors
        .first()
        .ok_or_else(|| CodevecError::Embedding("no vectors to pool".into()))?;
    let dims = first.len();

    let mut sum = vec![0.0f32; dims];
    for vector in vectors {
        if vector.len() != dims {
            return Err(CodevecError::Embedding(format!(
                "chunk dimensions disagree: {} vs {dims}",
                vector.len()
            )));
        }
        for (acc, v) in sum.iter_mut().zip(vector) {
            *acc += v;
        }
    }

    let n = vectors.len() as f32;
    Ok(sum.into_iter().map(|v| v / n).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Encodes text as `[chars, lines]` and records every input.
    #[derive(Default)]
    struct ShapeEmbedder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Embedder for ShapeEmbedder {
        async fn encode(&self, text: &str) -> Result<Vec<f32>, CodevecError> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(vec![text.chars().count() as f32, text.lines().count() as f32])
        }
    }

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn encode(&self, _text: &str) -> Result<Vec<f32>, CodevecError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn short_text_is_embedded_directly() {
        let embedder = Arc::new(ShapeEmbedder::default());
        let aggregator = EmbeddingAggregator::new(embedder.clone(), 100);

        let vector = aggregator.embed_text("fn a() {}\n").await.unwrap();
        assert_eq!(vector, vec![10.0, 1.0]);
        assert_eq!(embedder.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn long_text_is_mean_of_chunks() {
        let embedder = Arc::new(ShapeEmbedder::default());
        let aggregator = EmbeddingAggregator::new(embedder.clone(), 20);
        let text = ["0123456789"; 5].join("\n");

        let vector = aggregator.embed_text(&text).await.unwrap();

        let seen = embedder.seen.lock().unwrap().clone();
        let expected: Vec<String> = chunk_text(&text, 20).into_iter().map(|c| c.text).collect();
        assert_eq!(seen, expected);
        assert_eq!(seen.len(), 3);
        // Chunks of 21, 21 and 10 chars with 2, 2 and 1 lines.
        assert!((vector[0] - 52.0 / 3.0).abs() < 1e-5);
        assert!((vector[1] - 5.0 / 3.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn embed_artifact_sets_embedding() {
        let aggregator = EmbeddingAggregator::new(Arc::new(FixedEmbedder(vec![0.5; 3])), 8192);
        let artifact = Artifact::new("Greeter", "void hi() {}", 1, 1);

        let embedded = aggregator.embed_artifact(artifact.clone()).await.unwrap();
        assert_eq!(embedded.embedding, Some(vec![0.5; 3]));
        assert_eq!(embedded.content, artifact.content);
    }

    #[tokio::test]
    async fn empty_vector_is_an_error() {
        let aggregator = EmbeddingAggregator::new(Arc::new(FixedEmbedder(Vec::new())), 8192);
        let err = aggregator.embed_text("x").await.unwrap_err();
        assert!(matches!(err, CodevecError::Embedding(_)));
    }

    #[test]
    fn mean_pool_rejects_mismatched_dimensions() {
        let err = mean_pool(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(err.to_string().contains("dimensions"));
        assert!(mean_pool(&[]).is_err());
    }

    #[test]
    fn missing_api_key_gives_clear_error() {
        std::env::remove_var(API_KEY_ENV);
        let config = EmbeddingConfig {
            api_key: None,
            ..EmbeddingConfig::default()
        };
        let err = EmbeddingClient::with_config(&config).unwrap_err().to_string();
        assert!(err.contains("API key"), "error should mention API key: {err}");
    }

    #[test]
    fn debug_output_hides_api_key() {
        let client = EmbeddingClient::new("sk-secret").unwrap();
        assert!(!format!("{client:?}").contains("sk-secret"));
    }

    #[tokio::test]
    async fn default_request_has_no_input_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": [{"embedding": [0.1, 0.2]}]})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = EmbeddingClient::new("test-key")
            .unwrap()
            .with_base_url(&server.uri());
        client.encode("fn a() {}").await.unwrap();
        client.encode_query("auth").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        for request in &requests {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            assert_eq!(body["model"], "text-embedding-3-small");
            assert_eq!(body["input"].as_array().map(Vec::len), Some(1));
            assert!(body.get("input_type").is_none(), "body: {body}");
        }
    }

    #[tokio::test]
    async fn voyage_client_posts_document_and_query_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"input_type": "document"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": [{"embedding": [0.1, 0.2]}]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({"input_type": "query"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": [{"embedding": [0.9]}]})),
            )
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            provider: "voyage".into(),
            base_url: server.uri(),
            model: "voyage-code-3".into(),
            api_key: Some("test-key".into()),
            ..EmbeddingConfig::default()
        };
        let client = EmbeddingClient::with_config(&config).unwrap();
        assert_eq!(client.encode("fn a() {}").await.unwrap(), vec![0.1, 0.2]);
        assert_eq!(client.encode_query("auth").await.unwrap(), vec![0.9]);
    }

    #[tokio::test]
    async fn client_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = EmbeddingClient::new("k").unwrap().with_base_url(&server.uri());
        let err = client.encode("x").await.unwrap_err();
        assert!(matches!(err, CodevecError::Embedding(_)));
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn client_rejects_empty_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let client = EmbeddingClient::new("k").unwrap().with_base_url(&server.uri());
        assert!(client.encode("x").await.is_err());
    }

    #[tokio::test]
    async fn hung_request_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": [{"embedding": [1.0]}]}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            base_url: server.uri(),
            api_key: Some("k".into()),
            timeout_secs: 1,
            ..EmbeddingConfig::default()
        };
        let client = EmbeddingClient::with_config(&config).unwrap();
        let err = client.encode("x").await.unwrap_err();
        assert!(matches!(err, CodevecError::Embedding(_)));
    }

    #[tokio::test]
    async fn chunk_with_one_long_line_is_still_embedded() {
        let embedder = Arc::new(ShapeEmbedder::default());
        let aggregator = EmbeddingAggregator::new(embedder.clone(), 20);
        let text = format!("{}\n{}\nshort", "a".repeat(15), "b".repeat(500));

        let vector = aggregator.embed_text(&text).await.unwrap();

        let seen = embedder.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].chars().count(), 516);
        assert!((vector[0] - (516.0 + 5.0) / 2.0).abs() < 1e-5);
    }
}
