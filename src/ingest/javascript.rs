//! JavaScript front-end.
//!
//! A thin variant of the shared tree-sitter walker: the grammar handle is
//! the only difference. TypeScript-only node kinds (interfaces, type
//! aliases, enums) never appear in JavaScript trees, so the walker just
//! does not see them.

use crate::ingest::detect::{detect_file_type, FileType};
use crate::ingest::{grammar, typescript, FrontEnd, FrontEndOptions};
use crate::model::FileParse;
use std::path::Path;

/// JavaScript front-end (.js, .jsx, .mjs, .cjs).
pub struct JavaScriptFrontEnd {
    options: FrontEndOptions,
}

impl JavaScriptFrontEnd {
    /// Create the front-end with the given options.
    pub fn new(options: FrontEndOptions) -> Self {
        JavaScriptFrontEnd { options }
    }
}

impl FrontEnd for JavaScriptFrontEnd {
    fn name(&self) -> &'static str {
        "javascript"
    }

    fn claims(&self, path: &Path) -> bool {
        detect_file_type(path) == Some(FileType::JavaScript)
    }

    fn parse_file(&self, path: &Path) -> FileParse {
        typescript::parse_with_grammar(path, &self.options, grammar::Grammar::JavaScript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityKind, RelationKind};

    #[test]
    fn parses_plain_javascript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.js");
        std::fs::write(
            &path,
            "import { helper } from './util';\n\nexport function run() {\n  helper();\n}\n",
        )
        .unwrap();

        let parse = JavaScriptFrontEnd::new(FrontEndOptions::default()).parse_file(&path);
        assert!(parse
            .entities
            .iter()
            .any(|e| e.kind == EntityKind::Function && e.name == "run"));
        assert!(parse.pending.iter().any(|e| e.kind == RelationKind::Imports));
        assert!(parse.pending.iter().any(|e| e.kind == RelationKind::Calls));
    }

    #[test]
    fn class_with_methods() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.js");
        std::fs::write(
            &path,
            "class Widget {\n  draw() { return 1; }\n}\nmodule.exports = Widget;\n",
        )
        .unwrap();

        let parse = JavaScriptFrontEnd::new(FrontEndOptions::default()).parse_file(&path);
        assert!(parse
            .entities
            .iter()
            .any(|e| e.kind == EntityKind::Class && e.name == "Widget"));
        assert!(parse
            .entities
            .iter()
            .any(|e| e.kind == EntityKind::Method && e.name == "draw"));
    }
}
