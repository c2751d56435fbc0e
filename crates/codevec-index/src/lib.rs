//! Code segmentation, embedding and vector indexing.
//!
//! Source files are parsed with tree-sitter into function-level
//! [`Artifact`](codevec_core::Artifact)s, each embedded into one vector
//! (oversized units are chunked and mean-pooled), given a unique id and
//! upserted into a [`VectorStore`](store::VectorStore). Queries are embedded
//! the same way and answered by nearest-neighbour search.

pub mod artifact;
pub mod chroma;
pub mod chunker;
pub mod embedding;
pub mod identity;
pub mod ingest;
pub mod search;
pub mod sqlite;
pub mod store;
