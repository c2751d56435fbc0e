use std::fmt;
use std::str::FromStr;

use codevec_core::CodevecError;
use serde::{Deserialize, Serialize};

/// A programming language with a bundled tree-sitter grammar.
///
/// # Examples
///
/// ```
/// use codevec_walker::Language;
///
/// assert_eq!(Language::from_extension("rs"), Some(Language::Rust));
/// assert_eq!(Language::from_extension("py"), Some(Language::Python));
/// assert_eq!(Language::from_extension("java"), Some(Language::Java));
/// assert_eq!(Language::from_extension("kts"), Some(Language::Kotlin));
/// assert_eq!(Language::from_extension("cs"), Some(Language::CSharp));
/// assert_eq!(Language::from_extension("txt"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    TypeScript,
    JavaScript,
    Go,
    Java,
    CSharp,
    C,
    Cpp,
    Ruby,
    Php,
    Kotlin,
    Swift,
}

impl Language {
    /// Every supported language.
    pub const ALL: [Language; 13] = [
        Language::Rust,
        Language::Python,
        Language::TypeScript,
        Language::JavaScript,
        Language::Go,
        Language::Java,
        Language::CSharp,
        Language::C,
        Language::Cpp,
        Language::Ruby,
        Language::Php,
        Language::Kotlin,
        Language::Swift,
    ];

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Go => "go",
            Language::Java => "java",
            Language::CSharp => "csharp",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Kotlin => "kotlin",
            Language::Swift => "swift",
        }
    }

    /// File extensions (without the dot) that belong to this language.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Language::Rust => &["rs"],
            Language::Python => &["py"],
            Language::TypeScript => &["ts", "tsx"],
            Language::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Language::Go => &["go"],
            Language::Java => &["java"],
            Language::CSharp => &["cs"],
            Language::C => &["c", "h"],
            Language::Cpp => &["cpp", "cc", "cxx", "hpp", "hxx", "hh"],
            Language::Ruby => &["rb"],
            Language::Php => &["php"],
            Language::Kotlin => &["kt", "kts"],
            Language::Swift => &["swift"],
        }
    }

    /// Detect language from a file extension string (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext))
    }

    /// Detect language from a path's extension.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the tree-sitter grammar for this language.
    pub fn tree_sitter_language(self) -> tree_sitter::Language {
        match self {
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Java => tree_sitter_java::LANGUAGE.into(),
            Language::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
            Language::C => tree_sitter_c::LANGUAGE.into(),
            Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            Language::Ruby => tree_sitter_ruby::LANGUAGE.into(),
            Language::Php => tree_sitter_php::LANGUAGE_PHP.into(),
            Language::Kotlin => tree_sitter_kotlin_ng::LANGUAGE.into(),
            Language::Swift => tree_sitter_swift::LANGUAGE.into(),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = CodevecError;

    /// Parse a language name. Accepts a few common aliases (`c++`, `ts`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lang = match s.trim().to_lowercase().as_str() {
            "rust" | "rs" => Language::Rust,
            "python" | "py" => Language::Python,
            "typescript" | "ts" => Language::TypeScript,
            "javascript" | "js" => Language::JavaScript,
            "go" | "golang" => Language::Go,
            "java" => Language::Java,
            "csharp" | "c#" | "cs" | "c_sharp" => Language::CSharp,
            "c" => Language::C,
            "cpp" | "c++" => Language::Cpp,
            "ruby" | "rb" => Language::Ruby,
            "php" => Language::Php,
            "kotlin" | "kt" => Language::Kotlin,
            "swift" => Language::Swift,
            other => {
                return Err(CodevecError::Config(format!(
                    "unsupported language: {other}"
                )))
            }
        };
        Ok(lang)
    }
}

/// Parse a list of language names, failing on the first unsupported one.
///
/// An empty list means "every supported language".
///
/// # Errors
///
/// Returns [`CodevecError::Config`] naming the unsupported language.
///
/// # Examples
///
/// ```
/// use codevec_walker::{parse_languages, Language};
///
/// let langs = parse_languages(&["java".to_string()]).unwrap();
/// assert_eq!(langs, vec![Language::Java]);
/// assert_eq!(parse_languages(&[]).unwrap().len(), Language::ALL.len());
/// assert!(parse_languages(&["cobol".to_string()]).is_err());
/// ```
pub fn parse_languages(names: &[String]) -> Result<Vec<Language>, CodevecError> {
    if names.is_empty() {
        return Ok(Language::ALL.to_vec());
    }
    names.iter().map(|n| n.parse()).collect()
}
