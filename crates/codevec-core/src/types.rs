use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A logical code unit (function or method) extracted from a source file.
///
/// `content` is exactly lines `start_line..=end_line` of the original file,
/// joined by `\n`. `embedding` stays `None` until the unit has been embedded.
///
/// # Examples
///
/// ```
/// use codevec_core::Artifact;
///
/// let artifact = Artifact::new("Greeter", "fn hello() {}", 3, 3);
/// assert_eq!(artifact.enclosing_type_name, "Greeter");
/// assert!(artifact.embedding.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Name of the nearest enclosing type, empty for top-level functions.
    pub enclosing_type_name: String,
    /// Source text of the unit.
    pub content: String,
    /// First line (1-indexed, inclusive).
    pub start_line: u32,
    /// Last line (1-indexed, inclusive).
    pub end_line: u32,
    /// Embedding vector, once computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Artifact {
    /// Create an artifact without an embedding.
    pub fn new(
        enclosing_type_name: impl Into<String>,
        content: impl Into<String>,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self {
            enclosing_type_name: enclosing_type_name.into(),
            content: content.into(),
            start_line,
            end_line,
            embedding: None,
        }
    }
}

/// Metadata stored alongside each [`IndexEntry`].
///
/// Field names are kept snake_case on the wire because they become the
/// metadata keys of the vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Path of the source file, as given to the ingestion pipeline.
    pub path: String,
    /// Enclosing type of the artifact.
    pub enclosing_type_name: String,
    /// First line of the artifact (1-indexed).
    pub start_line: u32,
    /// Last line of the artifact (1-indexed).
    pub end_line: u32,
}

/// The unit of storage handed to a vector store.
///
/// # Examples
///
/// ```
/// use codevec_core::{EntryMetadata, IndexEntry};
///
/// let entry = IndexEntry {
///     id: "src/App.java:App".into(),
///     document: "void run() {}".into(),
///     embedding: vec![0.1, 0.2],
///     metadata: EntryMetadata {
///         path: "src/App.java".into(),
///         enclosing_type_name: "App".into(),
///         start_line: 2,
///         end_line: 2,
///     },
/// };
/// assert_eq!(entry.embedding.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Unique id within the collection.
    pub id: String,
    /// Artifact source text.
    pub document: String,
    /// Artifact embedding.
    pub embedding: Vec<f32>,
    /// Location metadata.
    pub metadata: EntryMetadata,
}

/// A single search hit.
///
/// # Examples
///
/// ```
/// use codevec_core::VectorMatch;
///
/// let m = VectorMatch::new("a.py:", "def a(): pass", 0.12);
/// assert_eq!(m.document_size, 13);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorMatch {
    /// Id of the stored entry.
    pub id: String,
    /// Stored document text.
    pub document: String,
    /// Dissimilarity to the query. Smaller is more similar.
    pub distance: f32,
    /// Length of `document` in characters.
    pub document_size: usize,
}

impl VectorMatch {
    /// Build a match, deriving `document_size` from the document.
    pub fn new(id: impl Into<String>, document: impl Into<String>, distance: f32) -> Self {
        let document = document.into();
        let document_size = document.chars().count();
        Self {
            id: id.into(),
            document,
            distance,
            document_size,
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use codevec_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
