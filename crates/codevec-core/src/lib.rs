//! Core types, configuration, and error handling for codevec.
//!
//! This crate provides the shared foundation used by the other codevec crates:
//! - [`CodevecError`] — unified error type using `thiserror`
//! - [`CodevecConfig`] — configuration loaded from `.codevec.toml`
//! - Shared types: [`Artifact`], [`IndexEntry`], [`EntryMetadata`],
//!   [`VectorMatch`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    CodevecConfig, EmbeddingConfig, IngestConfig, SearchConfig, StoreBackend, StoreConfig,
};
pub use error::CodevecError;
pub use types::{Artifact, EntryMetadata, IndexEntry, OutputFormat, VectorMatch};

/// A convenience `Result` type for codevec operations.
pub type Result<T> = std::result::Result<T, CodevecError>;
