//! Parallel ingestion of source files into a vector store collection.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use codevec_core::{CodevecError, EntryMetadata, IndexEntry};
use codevec_walker::{walk_repo, Language};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::artifact::ArtifactExtractor;
use crate::embedding::EmbeddingAggregator;
use crate::identity::IdentityAssigner;
use crate::store::VectorStore;

const DEFAULT_WORKERS: usize = 8;

/// Extracts, embeds and stores every function and method of a set of files.
///
/// Files are processed concurrently, at most `workers` at a time. A file
/// that cannot be read, parsed or embedded is logged and skipped as a whole;
/// the rest of the batch is still stored. All entries go to the store in a
/// single upsert once every file has finished.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
/// use codevec_index::embedding::{EmbeddingAggregator, EmbeddingClient};
/// use codevec_index::ingest::IngestionPipeline;
/// use codevec_index::sqlite::SqliteStore;
///
/// # async fn example() -> Result<(), codevec_core::CodevecError> {
/// let aggregator = EmbeddingAggregator::new(Arc::new(EmbeddingClient::new("key")?), 8192);
/// let store = Arc::new(SqliteStore::open(Path::new(".codevec/index.db"))?);
/// let pipeline = IngestionPipeline::new(aggregator, store, "my-project").with_workers(4);
/// let stored = pipeline.ingest_repo(Path::new(".")).await?;
/// println!("stored {stored} entries");
/// # Ok(())
/// # }
/// ```
pub struct IngestionPipeline {
    aggregator: EmbeddingAggregator,
    store: Arc<dyn VectorStore>,
    collection: String,
    workers: usize,
    languages: Vec<Language>,
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("collection", &self.collection)
            .field("workers", &self.workers)
            .field("languages", &self.languages)
            .finish_non_exhaustive()
    }
}

impl IngestionPipeline {
    pub fn new(
        aggregator: EmbeddingAggregator,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            aggregator,
            store,
            collection: collection.into(),
            workers: DEFAULT_WORKERS,
            languages: Language::ALL.to_vec(),
        }
    }

    /// Number of files processed concurrently (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Languages picked up by [`IngestionPipeline::ingest_repo`].
    pub fn with_languages(mut self, languages: Vec<Language>) -> Self {
        self.languages = languages;
        self
    }

    /// Ingest `file_paths`, returning the number of entries stored.
    ///
    /// Duplicate paths are processed once. Ids use each path as given.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Store`] if the final upsert fails. Per-file
    /// failures are logged, never returned.
    pub async fn ingest(&self, file_paths: &[PathBuf]) -> Result<usize, CodevecError> {
        let jobs = file_paths.iter().map(|p| (p.clone(), None)).collect();
        self.ingest_jobs(jobs).await
    }

    /// Walk `root` for files of the configured languages and ingest them.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::FileNotFound`] if `root` does not exist, or
    /// any error from [`IngestionPipeline::ingest`].
    pub async fn ingest_repo(&self, root: &Path) -> Result<usize, CodevecError> {
        let files = walk_repo(root, &self.languages)?;
        tracing::info!(root = %root.display(), files = files.len(), "walked repository");
        let jobs = files
            .into_iter()
            .map(|f| (f.path, Some(f.language)))
            .collect();
        self.ingest_jobs(jobs).await
    }

    /// Files paired with their language, when already known.
    async fn ingest_jobs(
        &self,
        jobs: Vec<(PathBuf, Option<Language>)>,
    ) -> Result<usize, CodevecError> {
        let mut seen = HashSet::new();
        let unique: Vec<(PathBuf, Option<Language>)> = jobs
            .into_iter()
            .filter(|(p, _)| seen.insert(p.clone()))
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let ids = Arc::new(IdentityAssigner::new());
        let batch: Arc<Mutex<Vec<IndexEntry>>> = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = JoinSet::new();

        for (path, language) in unique {
            let semaphore = Arc::clone(&semaphore);
            let aggregator = self.aggregator.clone();
            let ids = Arc::clone(&ids);
            let batch = Arc::clone(&batch);

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    tracing::warn!("worker pool closed before {}", path.display());
                    return false;
                };
                match process_file(&path, language, &aggregator, &ids).await {
                    Ok(entries) => {
                        let n = entries.len();
                        batch
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .extend(entries);
                        tracing::debug!(path = %path.display(), entries = n, "file ingested");
                        true
                    }
                    Err(e) => {
                        tracing::warn!("skipping {}: {e}", path.display());
                        false
                    }
                }
            });
        }

        let mut failed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => {}
                Ok(false) => failed += 1,
                Err(e) => {
                    tracing::warn!("ingestion task failed: {e}");
                    failed += 1;
                }
            }
        }

        let entries = std::mem::take(&mut *batch.lock().unwrap_or_else(|e| e.into_inner()));
        if entries.is_empty() {
            tracing::info!(failed, "nothing to store");
            return Ok(0);
        }

        self.store.upsert(&self.collection, &entries).await?;
        tracing::info!(
            collection = %self.collection,
            entries = entries.len(),
            failed,
            "ingestion complete"
        );
        Ok(entries.len())
    }
}

/// Read, extract and embed one file. Ids are assigned only once every
/// artifact of the file has an embedding.
async fn process_file(
    path: &Path,
    language: Option<Language>,
    aggregator: &EmbeddingAggregator,
    ids: &IdentityAssigner,
) -> Result<Vec<IndexEntry>, CodevecError> {
    let text = tokio::fs::read_to_string(path).await?;
    let extractor = match language {
        Some(language) => ArtifactExtractor::new(language)?,
        None => ArtifactExtractor::for_path(path)?,
    };
    let artifacts = tokio::task::spawn_blocking(move || extractor.find_artifacts(&text))
        .await
        .map_err(|e| CodevecError::Parse(format!("parser task failed: {e}")))??;

    let mut embedded = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        embedded.push(aggregator.embed_artifact(artifact).await?);
    }

    let path_str = path.to_string_lossy();
    let entries = embedded
        .into_iter()
        .map(|artifact| {
            let id = ids.assign_id(&path_str, &artifact);
            IndexEntry {
                id,
                metadata: EntryMetadata {
                    path: path_str.to_string(),
                    enclosing_type_name: artifact.enclosing_type_name,
                    start_line: artifact.start_line,
                    end_line: artifact.end_line,
                },
                document: artifact.content,
                embedding: artifact.embedding.unwrap_or_default(),
            }
        })
        .collect();

    Ok(entries)
}
