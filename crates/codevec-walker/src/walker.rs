use std::path::{Path, PathBuf};

use codevec_core::CodevecError;

use crate::language::Language;

/// Maximum file size to index (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

/// A source file discovered during repository walking. Content is not read here.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codevec_walker::{Language, SourcePath};
///
/// let file = SourcePath {
///     path: PathBuf::from("src/main.rs"),
///     language: Language::Rust,
/// };
/// assert_eq!(file.language, Language::Rust);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePath {
    /// Path to the file, prefixed with the walk root.
    pub path: PathBuf,
    /// Language detected from the extension.
    pub language: Language,
}

/// Walk a repository, respecting `.gitignore`, returning files of the given languages.
///
/// Skips directories, files larger than 1 MB and files whose extension does
/// not belong to one of `languages`. Results are sorted by path so repeated
/// walks over the same tree produce the same order.
///
/// # Errors
///
/// Returns [`CodevecError::FileNotFound`] if `root` does not exist.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use codevec_walker::{walk_repo, Language};
///
/// let files = walk_repo(Path::new("."), &[Language::Java]).unwrap();
/// for f in &files {
///     println!("{}", f.path.display());
/// }
/// ```
pub fn walk_repo(root: &Path, languages: &[Language]) -> Result<Vec<SourcePath>, CodevecError> {
    if !root.exists() {
        return Err(CodevecError::FileNotFound(root.to_path_buf()));
    }

    let walker = ignore::WalkBuilder::new(root).build();
    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("skipping unreadable entry: {e}");
                continue;
            }
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();

        let Some(language) = Language::from_path(path) else {
            continue;
        };
        if !languages.contains(&language) {
            continue;
        }

        match entry.metadata() {
            Ok(m) if m.len() > MAX_FILE_SIZE => {
                tracing::debug!("skipping {} ({} bytes)", path.display(), m.len());
                continue;
            }
            Ok(_) => {}
            Err(_) => continue,
        }

        files.push(SourcePath {
            path: path.to_path_buf(),
            language,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
