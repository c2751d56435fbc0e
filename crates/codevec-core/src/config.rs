use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CodevecError;

/// Top-level configuration loaded from `.codevec.toml`.
///
/// Supports layered resolution: CLI flags > config file > defaults.
///
/// # Examples
///
/// ```
/// use codevec_core::CodevecConfig;
///
/// let config = CodevecConfig::default();
/// assert_eq!(config.embedding.max_input_chars, 8192);
/// assert_eq!(config.ingest.workers, 8);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodevecConfig {
    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Vector store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Ingestion behavior.
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Search behavior.
    #[serde(default)]
    pub search: SearchConfig,
}

impl CodevecConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Io`] if the file cannot be read, or
    /// [`CodevecError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use codevec_core::CodevecConfig;
    /// use std::path::Path;
    ///
    /// let config = CodevecConfig::from_file(Path::new(".codevec.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, CodevecError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use codevec_core::CodevecConfig;
    ///
    /// let toml = r#"
    /// [ingest]
    /// workers = 2
    /// "#;
    /// let config = CodevecConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.ingest.workers, 2);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, CodevecError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Configuration for the embedding model endpoint.
///
/// # Examples
///
/// ```
/// use codevec_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.model, "text-embedding-3-small");
/// assert!(config.api_key.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider label. `voyage` also sends `input_type` with each request.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Base URL of an OpenAI-compatible embeddings API.
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    /// Model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// API key. Falls back to `CODEVEC_EMBEDDING_API_KEY`.
    pub api_key: Option<String>,
    /// Largest text (in characters) sent to the model in one call (default: 8192).
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Per-request timeout in seconds (default: 60).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_provider() -> String {
    "openai-compatible".into()
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_max_input_chars() -> usize {
    8192
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            api_key: None,
            max_input_chars: default_max_input_chars(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Which vector store implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local SQLite database.
    #[default]
    Sqlite,
    /// Chroma server over HTTP.
    Chroma,
}

/// Vector store configuration.
///
/// # Examples
///
/// ```
/// use codevec_core::{StoreBackend, StoreConfig};
///
/// let config = StoreConfig::default();
/// assert_eq!(config.backend, StoreBackend::Sqlite);
/// assert_eq!(config.url, "http://localhost:8000");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend (default: `sqlite`).
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite database path, relative to the indexed project.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Chroma server URL.
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Chroma tenant.
    #[serde(default = "default_tenant")]
    pub tenant: String,
    /// Chroma database within the tenant.
    #[serde(default = "default_database")]
    pub database: String,
    /// Collection name. Defaults to the project directory name.
    pub collection: Option<String>,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".codevec/index.db")
}

fn default_store_url() -> String {
    "http://localhost:8000".into()
}

fn default_tenant() -> String {
    "default_tenant".into()
}

fn default_database() -> String {
    "default_database".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            url: default_store_url(),
            tenant: default_tenant(),
            database: default_database(),
            collection: None,
        }
    }
}

/// Ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Number of files processed concurrently (default: 8).
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Restrict indexing to these languages. Empty means every supported language.
    #[serde(default)]
    pub languages: Vec<String>,
}

fn default_workers() -> usize {
    8
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            languages: Vec::new(),
        }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of matches returned when the CLI does not say otherwise (default: 5).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = CodevecConfig::default();
        assert_eq!(config.embedding.provider, "openai-compatible");
        assert_eq!(config.embedding.base_url, "https://api.openai.com/v1");
        assert_eq!(config.embedding.max_input_chars, 8192);
        assert_eq!(config.embedding.timeout_secs, 60);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.path, PathBuf::from(".codevec/index.db"));
        assert_eq!(config.store.tenant, "default_tenant");
        assert_eq!(config.store.database, "default_database");
        assert!(config.store.collection.is_none());
        assert_eq!(config.ingest.workers, 8);
        assert!(config.ingest.languages.is_empty());
        assert_eq!(config.search.limit, 5);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[embedding]
base_url = "http://localhost:11434/v1"
provider = "voyage"
model = "nomic-embed-text"
max_input_chars = 2048
timeout_secs = 15

[store]
backend = "chroma"
url = "http://chroma:8000"
tenant = "acme"
database = "code"
collection = "myproject"

[ingest]
workers = 4
languages = ["java", "python"]

[search]
limit = 10
"#;
        let config = CodevecConfig::from_toml(toml).unwrap();
        assert_eq!(config.embedding.base_url, "http://localhost:11434/v1");
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert_eq!(config.embedding.provider, "voyage");
        assert_eq!(config.embedding.max_input_chars, 2048);
        assert_eq!(config.embedding.timeout_secs, 15);
        assert_eq!(config.store.backend, StoreBackend::Chroma);
        assert_eq!(config.store.url, "http://chroma:8000");
        assert_eq!(config.store.tenant, "acme");
        assert_eq!(config.store.database, "code");
        assert_eq!(config.store.collection.as_deref(), Some("myproject"));
        assert_eq!(config.ingest.workers, 4);
        assert_eq!(config.ingest.languages, vec!["java", "python"]);
        assert_eq!(config.search.limit, 10);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let toml = r#"
[embedding]
model = "nomic-embed-code"
"#;
        let config = CodevecConfig::from_toml(toml).unwrap();
        assert_eq!(config.embedding.model, "nomic-embed-code");
        assert_eq!(config.embedding.max_input_chars, 8192);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = CodevecConfig::from_toml("").unwrap();
        assert_eq!(config.ingest.workers, 8);
        assert_eq!(config.search.limit, 5);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let result = CodevecConfig::from_toml("[store]\nbackend = \"redis\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = CodevecConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }
}
