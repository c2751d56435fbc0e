//! AST-driven extraction of functions and methods using tree-sitter.
//!
//! Each function or method becomes an [`Artifact`] tagged with the name of
//! its nearest enclosing type declaration. Which node kinds count as
//! functions, type declarations and type names is described per language by
//! a [`SyntaxProfile`].

use std::path::Path;

use codevec_core::{Artifact, CodevecError};
use codevec_walker::Language;
use tree_sitter::{Node, Parser, Tree};

/// Node kinds the extractor cares about for one grammar.
#[derive(Debug, Clone, Copy)]
pub struct SyntaxProfile {
    /// Kinds that produce an artifact.
    pub function_kinds: &'static [&'static str],
    /// Kinds that set the enclosing type name for their descendants.
    pub type_kinds: &'static [&'static str],
    /// Token kinds accepted as the name of a type declaration.
    pub type_name_kinds: &'static [&'static str],
    /// Field of a type declaration that holds the named type, when the name
    /// is not simply the first name token (`impl Trait for Type`).
    pub type_name_field: Option<&'static str>,
    /// Field of a function that names its receiver type (Go methods).
    pub receiver_field: Option<&'static str>,
}

const PLAIN: SyntaxProfile = SyntaxProfile {
    function_kinds: &[],
    type_kinds: &[],
    type_name_kinds: &[],
    type_name_field: None,
    receiver_field: None,
};

impl SyntaxProfile {
    /// The profile for `language`.
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::Rust => Self {
                function_kinds: &["function_item"],
                type_kinds: &["struct_item", "enum_item", "trait_item", "impl_item"],
                type_name_kinds: &["type_identifier"],
                type_name_field: Some("type"),
                ..PLAIN
            },
            Language::Python => Self {
                function_kinds: &["function_definition"],
                type_kinds: &["class_definition"],
                type_name_kinds: &["identifier"],
                ..PLAIN
            },
            Language::TypeScript => Self {
                function_kinds: &[
                    "function_declaration",
                    "method_definition",
                    "generator_function_declaration",
                ],
                type_kinds: &[
                    "class_declaration",
                    "abstract_class_declaration",
                    "interface_declaration",
                ],
                type_name_kinds: &["type_identifier"],
                ..PLAIN
            },
            Language::JavaScript => Self {
                function_kinds: &[
                    "function_declaration",
                    "method_definition",
                    "generator_function_declaration",
                ],
                type_kinds: &["class_declaration"],
                type_name_kinds: &["identifier"],
                ..PLAIN
            },
            Language::Go => Self {
                function_kinds: &["function_declaration", "method_declaration"],
                type_kinds: &["type_spec"],
                type_name_kinds: &["type_identifier"],
                receiver_field: Some("receiver"),
                ..PLAIN
            },
            Language::Java => Self {
                function_kinds: &["method_declaration", "constructor_declaration"],
                type_kinds: &[
                    "class_declaration",
                    "interface_declaration",
                    "enum_declaration",
                    "record_declaration",
                ],
                type_name_kinds: &["identifier"],
                ..PLAIN
            },
            Language::C => Self {
                function_kinds: &["function_definition"],
                type_kinds: &["struct_specifier"],
                type_name_kinds: &["type_identifier"],
                ..PLAIN
            },
            Language::Cpp => Self {
                function_kinds: &["function_definition"],
                type_kinds: &["class_specifier", "struct_specifier"],
                type_name_kinds: &["type_identifier"],
                ..PLAIN
            },
            Language::Ruby => Self {
                function_kinds: &["method", "singleton_method"],
                type_kinds: &["class", "module"],
                type_name_kinds: &["constant"],
                ..PLAIN
            },
            Language::Php => Self {
                function_kinds: &["function_definition", "method_declaration"],
                type_kinds: &[
                    "class_declaration",
                    "interface_declaration",
                    "trait_declaration",
                ],
                type_name_kinds: &["name"],
                ..PLAIN
            },
            Language::Kotlin => Self {
                function_kinds: &["function_declaration"],
                type_kinds: &["class_declaration", "object_declaration"],
                type_name_kinds: &["type_identifier", "identifier"],
                ..PLAIN
            },
            Language::CSharp => Self {
                function_kinds: &["method_declaration", "constructor_declaration"],
                type_kinds: &[
                    "class_declaration",
                    "struct_declaration",
                    "interface_declaration",
                    "record_declaration",
                ],
                type_name_kinds: &["identifier"],
                ..PLAIN
            },
            Language::Swift => Self {
                function_kinds: &["function_declaration"],
                type_kinds: &["class_declaration", "protocol_declaration"],
                type_name_kinds: &["type_identifier"],
                ..PLAIN
            },
        }
    }

    fn is_function(&self, kind: &str) -> bool {
        self.function_kinds.contains(&kind)
    }

    fn is_type(&self, kind: &str) -> bool {
        self.type_kinds.contains(&kind)
    }
}

/// Extracts [`Artifact`]s from source text of one language.
///
/// # Examples
///
/// ```
/// use codevec_walker::Language;
/// use codevec_index::artifact::ArtifactExtractor;
///
/// let extractor = ArtifactExtractor::new(Language::Python).unwrap();
/// let artifacts = extractor
///     .find_artifacts("def a():\n    pass\n\ndef b():\n    pass\n")
///     .unwrap();
/// assert_eq!(artifacts.len(), 2);
/// assert_eq!((artifacts[0].start_line, artifacts[0].end_line), (1, 2));
/// assert_eq!((artifacts[1].start_line, artifacts[1].end_line), (4, 5));
/// assert!(artifacts.iter().all(|a| a.enclosing_type_name.is_empty()));
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactExtractor {
    language: Language,
    grammar: tree_sitter::Language,
    profile: SyntaxProfile,
}

impl ArtifactExtractor {
    /// Create an extractor, checking that the grammar loads.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Config`] if the bundled grammar is incompatible
    /// with the linked tree-sitter runtime.
    pub fn new(language: Language) -> Result<Self, CodevecError> {
        let grammar = language.tree_sitter_language();
        Parser::new().set_language(&grammar).map_err(|e| {
            CodevecError::Config(format!("failed to load {language} grammar: {e}"))
        })?;

        Ok(Self {
            language,
            grammar,
            profile: SyntaxProfile::for_language(language),
        })
    }

    /// Create an extractor for the language implied by `path`'s extension.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Config`] for extensions without a grammar.
    pub fn for_path(path: &Path) -> Result<Self, CodevecError> {
        let language = Language::from_path(path).ok_or_else(|| {
            CodevecError::Config(format!("unsupported file type: {}", path.display()))
        })?;
        Self::new(language)
    }

    /// The language this extractor parses.
    pub fn language(&self) -> Language {
        self.language
    }

    /// Parse `text` into a syntax tree.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Parse`] if tree-sitter produces no tree.
    pub fn parse(&self, text: &str) -> Result<Tree, CodevecError> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar)
            .map_err(|e| CodevecError::Parse(format!("failed to set language: {e}")))?;

        parser.parse(text, None).ok_or_else(|| {
            CodevecError::Parse(format!("{} parser produced no tree", self.language))
        })
    }

    /// Find every function and method in `text`. Embeddings are left unset.
    ///
    /// # Errors
    ///
    /// Returns [`CodevecError::Parse`] if the text cannot be parsed.
    pub fn find_artifacts(&self, text: &str) -> Result<Vec<Artifact>, CodevecError> {
        let tree = self.parse(text)?;
        let lines: Vec<&str> = text.lines().collect();
        Ok(collect_artifacts(
            tree.root_node(),
            text.as_bytes(),
            &lines,
            &self.profile,
            "",
        ))
    }
}

/// Depth-first walk collecting artifacts below `node`.
///
/// `enclosing` is the nearest enclosing type name on the path from the root.
/// A type declaration replaces it for its descendants; one without a
/// readable name replaces it with an empty name. A function with a receiver
/// (Go methods) takes the receiver's type instead.
pub fn collect_artifacts(
    node: Node,
    source: &[u8],
    lines: &[&str],
    profile: &SyntaxProfile,
    enclosing: &str,
) -> Vec<Artifact> {
    let mut artifacts = Vec::new();

    let mut context = enclosing.to_string();
    if profile.is_function(node.kind()) {
        if let Some(receiver) = receiver_type_name(&node, source, profile) {
            context = receiver;
        }
        if let Some(artifact) = make_artifact(&node, lines, &context) {
            artifacts.push(artifact);
        }
    }

    if profile.is_type(node.kind()) {
        context = type_name(&node, source, profile).unwrap_or_default();
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        artifacts.extend(collect_artifacts(child, source, lines, profile, &context));
    }

    artifacts
}

fn type_name(node: &Node, source: &[u8], profile: &SyntaxProfile) -> Option<String> {
    if let Some(target) = profile
        .type_name_field
        .and_then(|field| node.child_by_field_name(field))
    {
        return first_name_within(target, source, profile);
    }

    let mut cursor = node.walk();
    let name_node = node
        .children(&mut cursor)
        .find(|child| profile.type_name_kinds.contains(&child.kind()))?;
    node_text(name_node, source)
}

fn receiver_type_name(node: &Node, source: &[u8], profile: &SyntaxProfile) -> Option<String> {
    let receiver = node.child_by_field_name(profile.receiver_field?)?;
    first_name_within(receiver, source, profile)
}

/// First name token at or below `node` in source order: `Wrapper<T>` gives
/// `Wrapper`, `*Server` gives `Server`.
fn first_name_within(node: Node, source: &[u8], profile: &SyntaxProfile) -> Option<String> {
    if profile.type_name_kinds.contains(&node.kind()) {
        return node_text(node, source);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .find_map(|child| first_name_within(child, source, profile))
}

fn node_text(node: Node, source: &[u8]) -> Option<String> {
    let text = node.utf8_text(source).ok()?;
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn make_artifact(node: &Node, lines: &[&str], enclosing: &str) -> Option<Artifact> {
    if lines.is_empty() {
        return None;
    }

    let mut start = node.start_position().row;
    let mut end = node.end_position().row;
    // A span ending at column 0 stops before that row's text.
    if end > start && node.end_position().column == 0 {
        end -= 1;
    }
    end = end.min(lines.len() - 1);
    if start > end {
        return None;
    }

    while start <= end && lines[start].trim().is_empty() {
        start += 1;
    }
    while end > start && lines[end].trim().is_empty() {
        end -= 1;
    }
    if start > end || lines[start].trim().is_empty() {
        return None;
    }

    Some(Artifact::new(
        enclosing,
        lines[start..=end].join("\n"),
        start as u32 + 1,
        end as u32 + 1,
    ))
}
