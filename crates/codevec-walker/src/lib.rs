//! Language registry and repository walking.
//!
//! Maps languages to file extensions and bundled tree-sitter grammars, and
//! walks a repository (honoring `.gitignore` via the `ignore` crate) to find
//! the source files worth indexing.

pub mod language;
pub mod walker;

pub use language::{parse_languages, Language};
pub use walker::{walk_repo, SourcePath};
