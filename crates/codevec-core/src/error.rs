use std::path::PathBuf;

/// Errors that can occur across codevec.
///
/// Library crates return this type directly. It also implements
/// [`miette::Diagnostic`], so the binary can propagate it with `?` into a
/// `miette::Result`.
///
/// # Examples
///
/// ```
/// use codevec_core::CodevecError;
///
/// let err = CodevecError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CodevecError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration, including unsupported languages.
    #[error("configuration error: {0}")]
    #[diagnostic(help("check .codevec.toml or run `codevec init`"))]
    Config(String),

    /// Source code parsing failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// The embedding model failed or returned an unusable vector.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Vector store upsert or query failure.
    #[error("store error: {0}")]
    Store(String),

    /// The vector store answered, but without the fields the caller asked for.
    #[error("malformed store response: {0}")]
    MalformedResponse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CodevecError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = CodevecError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn malformed_response_is_distinct_from_store_error() {
        let err = CodevecError::MalformedResponse("missing distances".into());
        assert!(matches!(err, CodevecError::MalformedResponse(_)));
        assert_eq!(
            err.to_string(),
            "malformed store response: missing distances"
        );
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = CodevecError::FileNotFound(PathBuf::from("/tmp/missing.rs"));
        assert!(err.to_string().contains("/tmp/missing.rs"));
    }
}
