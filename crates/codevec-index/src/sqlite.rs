//! SQLite-backed [`VectorStore`].
//!
//! Entries live in one table keyed by `(collection, id)` with embeddings as
//! little-endian `f32` BLOBs. Cosine distance is computed in Rust over every
//! entry of the queried collection.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use codevec_core::{CodevecError, EntryMetadata, IndexEntry};
use rusqlite::{params, Connection, OptionalExtension};

use crate::store::{Include, QueryResult, VectorStore};

/// Local vector store in a single SQLite file.
///
/// # Examples
///
/// ```
/// use codevec_index::sqlite::SqliteStore;
///
/// let store = SqliteStore::in_memory().unwrap();
/// assert_eq!(store.dimensions("missing").unwrap(), None);
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

struct StoredRow {
    id: String,
    document: String,
    metadata: EntryMetadata,
    embedding: Vec<f32>,
}

impl SqliteStore {
    /// Open or create a store database at the given path.
    ///
    /// Creates the parent directory and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Store`] if the database cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use codevec_index::sqlite::SqliteStore;
    ///
    /// let store = SqliteStore::open(Path::new(".codevec/index.db")).unwrap();
    /// ```
    pub fn open(path: &Path) -> Result<Self, CodevecError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CodevecError::Store(format!("failed to create index directory: {e}"))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| CodevecError::Store(format!("failed to open database: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Store`] if schema creation fails.
    pub fn in_memory() -> Result<Self, CodevecError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CodevecError::Store(format!("failed to create in-memory database: {e}"))
        })?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CodevecError> {
        self.conn
            .lock()
            .map_err(|_| CodevecError::Store("database connection lock poisoned".into()))
    }

    fn init_schema(&self) -> Result<(), CodevecError> {
        self.lock()?
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS collections (
                    name TEXT PRIMARY KEY,
                    dimensions INTEGER,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS entries (
                    collection TEXT NOT NULL,
                    id TEXT NOT NULL,
                    document TEXT NOT NULL,
                    path TEXT NOT NULL,
                    enclosing_type_name TEXT NOT NULL,
                    start_line INTEGER NOT NULL,
                    end_line INTEGER NOT NULL,
                    embedding BLOB NOT NULL,
                    PRIMARY KEY (collection, id),
                    FOREIGN KEY (collection) REFERENCES collections(name)
                );
                ",
            )
            .map_err(|e| CodevecError::Store(format!("failed to create schema: {e}")))?;

        Ok(())
    }

    /// Embedding dimensionality fixed for `collection`, if any entry was stored.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Store`] on query failure.
    pub fn dimensions(&self, collection: &str) -> Result<Option<usize>, CodevecError> {
        let conn = self.lock()?;
        stored_dimensions(&conn, collection)
    }

    fn upsert_blocking(&self, collection: &str, entries: &[IndexEntry]) -> Result<(), CodevecError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| CodevecError::Store(format!("failed to begin transaction: {e}")))?;

        tx.execute(
            "INSERT OR IGNORE INTO collections (name, dimensions, created_at) VALUES (?1, NULL, ?2)",
            params![collection, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(|e| CodevecError::Store(format!("failed to create collection: {e}")))?;

        let dims = match stored_dimensions(&tx, collection)? {
            Some(d) => Some(d),
            None => match entries.first() {
                Some(first) => {
                    tx.execute(
                        "UPDATE collections SET dimensions = ?1 WHERE name = ?2",
                        params![first.embedding.len() as i64, collection],
                    )
                    .map_err(|e| CodevecError::Store(format!("failed to set dimensions: {e}")))?;
                    Some(first.embedding.len())
                }
                None => None,
            },
        };

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO entries
                     (collection, id, document, path, enclosing_type_name, start_line, end_line, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(|e| CodevecError::Store(format!("failed to prepare insert: {e}")))?;

            for entry in entries {
                if Some(entry.embedding.len()) != dims {
                    return Err(CodevecError::Store(format!(
                        "collection '{collection}' holds {}-dimensional embeddings but entry '{}' has {}",
                        dims.unwrap_or_default(),
                        entry.id,
                        entry.embedding.len()
                    )));
                }
                stmt.execute(params![
                    collection,
                    entry.id,
                    entry.document,
                    entry.metadata.path,
                    entry.metadata.enclosing_type_name,
                    entry.metadata.start_line,
                    entry.metadata.end_line,
                    floats_to_bytes(&entry.embedding),
                ])
                .map_err(|e| CodevecError::Store(format!("failed to insert entry: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| CodevecError::Store(format!("failed to commit: {e}")))?;
        Ok(())
    }

    fn load_rows(&self, collection: &str) -> Result<Vec<StoredRow>, CodevecError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, document, path, enclosing_type_name, start_line, end_line, embedding
                 FROM entries WHERE collection = ?1",
            )
            .map_err(|e| CodevecError::Store(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map(params![collection], |row| {
                let embedding_bytes: Vec<u8> = row.get(6)?;
                Ok(StoredRow {
                    id: row.get(0)?,
                    document: row.get(1)?,
                    metadata: EntryMetadata {
                        path: row.get(2)?,
                        enclosing_type_name: row.get(3)?,
                        start_line: row.get(4)?,
                        end_line: row.get(5)?,
                    },
                    embedding: bytes_to_floats(&embedding_bytes),
                })
            })
            .map_err(|e| CodevecError::Store(format!("failed to query entries: {e}")))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| CodevecError::Store(format!("failed to read row: {e}")))?);
        }
        Ok(out)
    }

    fn count_blocking(&self, collection: &str) -> Result<usize, CodevecError> {
        let count: i64 = self
            .lock()?
            .query_row(
                "SELECT COUNT(*) FROM entries WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .map_err(|e| CodevecError::Store(format!("failed to count entries: {e}")))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<(), CodevecError> {
        self.upsert_blocking(collection, entries)
    }

    async fn query(
        &self,
        collection: &str,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        include: &[Include],
    ) -> Result<QueryResult, CodevecError> {
        let Some(dims) = self.dimensions(collection)? else {
            return Ok(QueryResult::empty(query_embeddings.len(), include));
        };
        if let Some(bad) = query_embeddings.iter().find(|q| q.len() != dims) {
            return Err(CodevecError::Store(format!(
                "query has {} dimensions but collection '{collection}' holds {dims}",
                bad.len()
            )));
        }

        let rows = self.load_rows(collection)?;
        let mut result = QueryResult::empty(query_embeddings.len(), include);

        for (group, query) in query_embeddings.iter().enumerate() {
            let mut scored: Vec<(f32, &StoredRow)> = rows
                .iter()
                .map(|row| (cosine_distance(query, &row.embedding), row))
                .collect();
            scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
            scored.truncate(n_results);

            for (distance, row) in scored {
                if let Some(ids) = result.ids.as_mut() {
                    ids[group].push(row.id.clone());
                }
                if let Some(documents) = result.documents.as_mut() {
                    documents[group].push(Some(row.document.clone()));
                }
                if let Some(distances) = result.distances.as_mut() {
                    distances[group].push(Some(distance));
                }
                if let Some(metadatas) = result.metadatas.as_mut() {
                    metadatas[group].push(Some(row.metadata.clone()));
                }
            }
        }

        Ok(result)
    }

    async fn count(&self, collection: &str) -> Result<usize, CodevecError> {
        self.count_blocking(collection)
    }
}

fn stored_dimensions(conn: &Connection, collection: &str) -> Result<Option<usize>, CodevecError> {
    let dims: Option<Option<i64>> = conn
        .query_row(
            "SELECT dimensions FROM collections WHERE name = ?1",
            params![collection],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| CodevecError::Store(format!("failed to read collection: {e}")))?;
    Ok(dims.flatten().map(|d| d as usize))
}

fn floats_to_bytes(floats: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(floats.len() * 4);
    for f in floats {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

fn bytes_to_floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// `1 - cosine_similarity`, clamped to `>= 0`. Zero vectors are at distance 1.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 1.0;
    }

    (1.0 - dot / denom).max(0.0) as f32
}
