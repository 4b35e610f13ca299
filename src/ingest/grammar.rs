//! Tree-sitter grammar loading.
//!
//! The grammar crates have churned their loading surface across releases
//! (free `language()` functions, `LANGUAGE` constants, feature-gated
//! variants). Every front-end goes through this module so the binding
//! drift is contained in one place: callers hold an opaque
//! [`tree_sitter::Language`] and never touch the grammar crates directly.

use crate::error::{CodegraphError, Result};
use std::path::Path;

/// Grammar variants the shared tree-sitter walker can load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// Python grammar.
    Python,
    /// TypeScript grammar (.ts).
    TypeScript,
    /// TSX grammar (.tsx).
    Tsx,
    /// JavaScript grammar (.js, .jsx, .mjs, .cjs).
    JavaScript,
}

impl Grammar {
    /// Load the grammar as an opaque handle.
    pub fn load(&self) -> tree_sitter::Language {
        match self {
            Grammar::Python => tree_sitter_python::language(),
            Grammar::TypeScript => tree_sitter_typescript::language_typescript(),
            Grammar::Tsx => tree_sitter_typescript::language_tsx(),
            Grammar::JavaScript => tree_sitter_javascript::language(),
        }
    }

    /// Pick the TypeScript-family grammar for a path (`.tsx` needs the
    /// TSX variant, everything else in the family parses as TypeScript).
    pub fn for_typescript_path(path: &Path) -> Grammar {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsx") => Grammar::Tsx,
            _ => Grammar::TypeScript,
        }
    }
}

/// Build a parser configured for the grammar.
pub fn parser_for(grammar: Grammar, path: &Path) -> Result<tree_sitter::Parser> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&grammar.load())
        .map_err(|e| CodegraphError::Other(format!(
            "Failed to load {:?} grammar for {}: {e:?}",
            grammar,
            path.display()
        )))?;
    Ok(parser)
}
