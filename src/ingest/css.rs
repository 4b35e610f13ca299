//! Stylesheet front-end.
//!
//! Produces exactly one File entity per stylesheet (css/scss/sass) with
//! selector, rule, and import counts as properties. Like the template
//! front-end, it emits no declaration entities; it exists so UsesStyles
//! edges have a concrete target.

use crate::ingest::detect::{detect_file_type, FileType};
use crate::ingest::{degraded_parse, file_entity, FrontEnd, FrontEndOptions, LoadOutcome};
use crate::model::{FileParse, PropKey, PropValue};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Stylesheet front-end (.css, .scss, .sass).
pub struct CssFrontEnd {
    options: FrontEndOptions,
}

impl CssFrontEnd {
    /// Create the front-end with the given options.
    pub fn new(options: FrontEndOptions) -> Self {
        CssFrontEnd { options }
    }
}

fn selector_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^\s*([.#:&]?[a-zA-Z][a-zA-Z0-9_:.#\s>+~-]*)\{").expect("static pattern")
    })
}

fn import_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"@(?:import|use|forward)\s+['"]([^'"]+)['"]"#).expect("static pattern")
    })
}

impl FrontEnd for CssFrontEnd {
    fn name(&self) -> &'static str {
        "css"
    }

    fn claims(&self, path: &Path) -> bool {
        detect_file_type(path) == Some(FileType::Css)
    }

    fn parse_file(&self, path: &Path) -> FileParse {
        let (text, hash) = match super::load_source(path, self.options.max_file_size) {
            LoadOutcome::Loaded { text, hash } => (text, hash),
            other => return degraded_parse(path, other),
        };

        let mut entity = file_entity(path, &hash, text.lines().count(), text.len() as u64);

        // Strip comments before feature extraction.
        let stripped = strip_comments(&text);

        let selector_count = selector_pattern().captures_iter(&stripped).count();
        entity.props.insert(
            PropKey::SelectorCount,
            PropValue::Int(selector_count as i64),
        );

        let rule_count = stripped.matches('{').count();
        entity
            .props
            .insert(PropKey::RuleCount, PropValue::Int(rule_count as i64));

        let import_count = import_pattern().captures_iter(&stripped).count();
        entity
            .props
            .insert(PropKey::ImportCount, PropValue::Int(import_count as i64));

        FileParse::file_only(path.to_path_buf(), entity, hash)
    }
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start..].find("*/") {
            Some(end) => rest = &rest[start + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    #[test]
    fn produces_one_file_entity_with_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.component.scss");
        std::fs::write(
            &path,
            "@use '@angular/material';\n\n.card {\n  color: red;\n}\n\n/* note */\n.card-title {\n  font-weight: bold;\n}\n",
        )
        .unwrap();

        let parse = CssFrontEnd::new(FrontEndOptions::default()).parse_file(&path);
        assert_eq!(parse.entities.len(), 1);
        assert_eq!(parse.entities[0].kind, EntityKind::File);

        let props = &parse.entities[0].props;
        assert_eq!(props.get(&PropKey::RuleCount), Some(&PropValue::Int(2)));
        assert_eq!(props.get(&PropKey::ImportCount), Some(&PropValue::Int(1)));
        assert_eq!(props.get(&PropKey::SelectorCount), Some(&PropValue::Int(2)));
    }
}
