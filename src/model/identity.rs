//! Deterministic entity identity.
//!
//! Identity is a SHA-256 hash over the tuple (kind, absolute file path,
//! fully-qualified name, start line, end line). Fields are length-prefixed
//! before hashing so the serialization is unambiguous: no separator choice
//! can make two distinct tuples collide. The same bytes on disk always
//! produce the same identity, which is what turns incremental re-parsing
//! into a set-diff instead of a rebuild.

use crate::model::EntityKind;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Raw-name length above which an External display name is sanitized.
/// Bounds ID size for pathological generated names (long method-chain
/// receivers).
const EXTERNAL_NAME_CAP: usize = 90;

/// Prefix kept when sanitizing, sized so prefix + `...` + 8 hex digits
/// never exceeds 99 characters.
const EXTERNAL_PREFIX_KEEP: usize = 88;

/// A 256-bit entity identity rendered as 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(String);

impl EntityId {
    /// The hex form, as stored in the graph.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Feed one length-prefixed field into the hasher.
fn push_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u32).to_be_bytes());
    hasher.update(bytes);
}

/// Compute the identity of a declared entity.
///
/// `qualified_name` is the name prefixed with all enclosing scopes, joined
/// with `::` (e.g. `module::Outer::method`). Property-only edits that keep
/// the tuple intact keep the identity; renames and moves break it.
pub fn entity_id(
    kind: EntityKind,
    file_path: &Path,
    qualified_name: &str,
    line_start: i64,
    line_end: i64,
) -> EntityId {
    let mut hasher = Sha256::new();
    push_field(&mut hasher, kind.as_str().as_bytes());
    push_field(&mut hasher, file_path.to_string_lossy().as_bytes());
    push_field(&mut hasher, qualified_name.as_bytes());
    push_field(&mut hasher, line_start.to_string().as_bytes());
    push_field(&mut hasher, line_end.to_string().as_bytes());
    EntityId(hex_digest(hasher))
}

/// Compute the identity of an External placeholder.
///
/// Externals have no file or span; identity hashes (kind, canonical name)
/// so two references to the same external name collapse to one entity.
pub fn external_id(canonical_name: &str) -> EntityId {
    let mut hasher = Sha256::new();
    push_field(&mut hasher, EntityKind::External.as_str().as_bytes());
    push_field(&mut hasher, canonical_name.as_bytes());
    EntityId(hex_digest(hasher))
}

/// Sanitize an External display name.
///
/// Names longer than [`EXTERNAL_NAME_CAP`] are truncated (at the last dot
/// inside the tail when one is near the cut, so the result reads as a
/// path) and suffixed with `...` plus the first 8 hex digits of the full
/// name's hash. Distinct long names therefore never collide.
pub fn sanitize_external_name(name: &str) -> String {
    if name.is_empty() {
        return "unknown".to_string();
    }
    if name.chars().count() <= EXTERNAL_NAME_CAP {
        return name.to_string();
    }

    let digest = Sha256::digest(name.as_bytes());
    let suffix: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();

    let mut truncated: String = name.chars().take(EXTERNAL_PREFIX_KEEP).collect();
    // Cut back to the last dot if one falls in the final stretch, so the
    // truncation point lands on a path segment boundary.
    if let Some(dot) = truncated.rfind('.') {
        if truncated.len() - dot <= 10 {
            truncated.truncate(dot);
        }
    }
    format!("{truncated}...{suffix}")
}

fn hex_digest(hasher: Sha256) -> String {
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn identity_is_deterministic() {
        let path = PathBuf::from("/project/a.py");
        let a = entity_id(EntityKind::Function, &path, "a::f", 1, 2);
        let b = entity_id(EntityKind::Function, &path, "a::f", 1, 2);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn identity_changes_with_every_tuple_field() {
        let path = PathBuf::from("/project/a.py");
        let base = entity_id(EntityKind::Function, &path, "a::f", 1, 2);
        assert_ne!(base, entity_id(EntityKind::Method, &path, "a::f", 1, 2));
        assert_ne!(
            base,
            entity_id(EntityKind::Function, &PathBuf::from("/project/b.py"), "a::f", 1, 2)
        );
        assert_ne!(base, entity_id(EntityKind::Function, &path, "a::g", 1, 2));
        assert_ne!(base, entity_id(EntityKind::Function, &path, "a::f", 2, 2));
        assert_ne!(base, entity_id(EntityKind::Function, &path, "a::f", 1, 3));
    }

    #[test]
    fn length_prefixing_prevents_field_bleed() {
        // Without length prefixes "ab"+"c" and "a"+"bc" would hash the same.
        let path = PathBuf::from("/p");
        let a = entity_id(EntityKind::Function, &path, "ab", 1, 1);
        let b = entity_id(EntityKind::Function, &path, "a", 11, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn short_external_names_pass_through() {
        assert_eq!(sanitize_external_name("numpy"), "numpy");
    }

    #[test]
    fn long_external_names_are_capped_with_hash_suffix() {
        let long: String = "d3.select.append.attr.".repeat(10);
        let sanitized = sanitize_external_name(&long);
        assert!(sanitized.len() <= 99, "got {} chars", sanitized.len());
        assert!(sanitized.contains("..."));

        // Two distinct long names must never collide.
        let other = format!("{long}x");
        assert_ne!(sanitize_external_name(&long), sanitize_external_name(&other));
    }

    #[test]
    fn empty_external_name_becomes_unknown() {
        assert_eq!(sanitize_external_name(""), "unknown");
    }

    #[test]
    fn external_id_collapses_same_name() {
        assert_eq!(external_id("numpy"), external_id("numpy"));
        assert_ne!(external_id("numpy"), external_id("pandas"));
    }
}
