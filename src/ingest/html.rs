//! Template front-end.
//!
//! Produces exactly one File entity per markup file plus template features
//! as entity properties. Never produces declaration entities; its
//! structural role is to be the target of UsesTemplate edges resolved in
//! pass 2.

use crate::ingest::detect::{detect_file_type, FileType};
use crate::ingest::{degraded_parse, file_entity, FrontEnd, FrontEndOptions, LoadOutcome};
use crate::model::{FileParse, PropKey, PropValue};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// HTML template front-end (.html, .htm).
pub struct HtmlFrontEnd {
    options: FrontEndOptions,
}

impl HtmlFrontEnd {
    /// Create the front-end with the given options.
    pub fn new(options: FrontEndOptions) -> Self {
        HtmlFrontEnd { options }
    }
}

fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\*ng[A-Z][a-zA-Z]*").expect("static pattern"))
}

fn interpolation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{[^}]*\}\}").expect("static pattern"))
}

fn component_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<(app-[a-z][a-z0-9-]*)").expect("static pattern"))
}

impl FrontEnd for HtmlFrontEnd {
    fn name(&self) -> &'static str {
        "html"
    }

    fn claims(&self, path: &Path) -> bool {
        detect_file_type(path) == Some(FileType::Html)
    }

    fn parse_file(&self, path: &Path) -> FileParse {
        let (text, hash) = match super::load_source(path, self.options.max_file_size) {
            LoadOutcome::Loaded { text, hash } => (text, hash),
            other => return degraded_parse(path, other),
        };

        let mut entity = file_entity(path, &hash, text.lines().count(), text.len() as u64);

        // Template features become properties on the File entity.
        let mut directives: Vec<&str> = directive_pattern()
            .find_iter(&text)
            .map(|m| m.as_str())
            .collect();
        directives.sort_unstable();
        directives.dedup();
        if !directives.is_empty() {
            entity.props.insert(
                PropKey::Directives,
                PropValue::Str(directives.join(",")),
            );
        }

        let interpolations = interpolation_pattern().find_iter(&text).count();
        entity.props.insert(
            PropKey::Interpolations,
            PropValue::Int(interpolations as i64),
        );

        let mut tags: Vec<String> = component_tag_pattern()
            .captures_iter(&text)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();
        tags.sort_unstable();
        tags.dedup();
        if !tags.is_empty() {
            entity
                .props
                .insert(PropKey::CustomComponents, PropValue::Str(tags.join(",")));
        }

        FileParse::file_only(path.to_path_buf(), entity, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    #[test]
    fn produces_exactly_one_file_entity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.component.html");
        std::fs::write(
            &path,
            "<div *ngIf=\"ready\">{{ title }}</div>\n<app-child></app-child>\n",
        )
        .unwrap();

        let parse = HtmlFrontEnd::new(FrontEndOptions::default()).parse_file(&path);
        assert_eq!(parse.entities.len(), 1);
        assert_eq!(parse.entities[0].kind, EntityKind::File);
        assert!(parse.pending.is_empty());

        let props = &parse.entities[0].props;
        assert_eq!(
            props.get(&PropKey::Directives),
            Some(&PropValue::Str("*ngIf".to_string()))
        );
        assert_eq!(props.get(&PropKey::Interpolations), Some(&PropValue::Int(1)));
        assert_eq!(
            props.get(&PropKey::CustomComponents),
            Some(&PropValue::Str("app-child".to_string()))
        );
    }
}
