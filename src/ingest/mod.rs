//! Filesystem → front-end → entity stream ingestion pipeline.
//!
//! Each language front-end turns one source file into a [`FileParse`]:
//! entities, pending relationships, and in-band issues. Front-ends never
//! fail out of band; a file that cannot be parsed still yields its File
//! entity so links to it resolve.

pub mod angular;
pub mod css;
pub mod detect;
pub mod grammar;
pub mod html;
pub mod javascript;
pub mod python;
pub mod typescript;

use crate::config::CodegraphConfig;
use crate::model::identity::entity_id;
use crate::model::{Entity, EntityKind, FileParse, ParseIssue, PropKey, PropValue, PropertyBag};
use log::warn;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

pub use detect::{detect_file_type, FileType};

/// A language front-end: converts one source file into entities and
/// pending relationships.
pub trait FrontEnd: Send + Sync {
    /// Front-end name for logs and reports.
    fn name(&self) -> &'static str;

    /// Whether this front-end claims the path.
    fn claims(&self, path: &Path) -> bool;

    /// Parse a single file.
    ///
    /// The returned lists may be empty. Problems are reported in the
    /// result's `issues`; this method does not fail.
    fn parse_file(&self, path: &Path) -> FileParse;
}

/// The set of front-ends for one extraction run.
///
/// Constructed once per run from the configuration; claim order is the
/// extension-priority tiebreak, so each path is handled by exactly one
/// front-end.
pub struct FrontEndSet {
    front_ends: Vec<Box<dyn FrontEnd>>,
}

impl FrontEndSet {
    /// Build the front-end set from the run configuration.
    pub fn from_config(config: &CodegraphConfig) -> Self {
        let options = FrontEndOptions::from_config(config);
        FrontEndSet {
            front_ends: vec![
                Box::new(python::PythonFrontEnd::new(options.clone())),
                Box::new(typescript::TypeScriptFrontEnd::new(options.clone())),
                Box::new(javascript::JavaScriptFrontEnd::new(options.clone())),
                Box::new(html::HtmlFrontEnd::new(options.clone())),
                Box::new(css::CssFrontEnd::new(options)),
            ],
        }
    }

    /// The first front-end claiming the path, if any.
    pub fn front_end_for(&self, path: &Path) -> Option<&dyn FrontEnd> {
        self.front_ends
            .iter()
            .find(|fe| fe.claims(path))
            .map(|fe| fe.as_ref())
    }
}

/// Options shared by all front-ends, copied out of the config.
#[derive(Debug, Clone)]
pub struct FrontEndOptions {
    /// Size cap; larger files are skipped with their File entity kept.
    pub max_file_size: u64,
    /// Capture docstrings as entity properties.
    pub include_docstrings: bool,
}

impl FrontEndOptions {
    fn from_config(config: &CodegraphConfig) -> Self {
        FrontEndOptions {
            max_file_size: config.parsing.max_file_size,
            include_docstrings: config.parsing.include_docstrings,
        }
    }
}

impl Default for FrontEndOptions {
    fn default() -> Self {
        FrontEndOptions {
            max_file_size: 1024 * 1024,
            include_docstrings: true,
        }
    }
}

/// SHA-256 of a byte slice, lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Outcome of loading a source file under the size cap.
pub(crate) enum LoadOutcome {
    /// File loaded and valid UTF-8.
    Loaded {
        /// Decoded source text.
        text: String,
        /// Content hash (over raw bytes).
        hash: String,
    },
    /// File exceeds the size cap; only its hash was computed (streaming).
    Oversized {
        /// Content hash.
        hash: String,
        /// Actual size in bytes.
        size: u64,
    },
    /// File is not valid UTF-8.
    Encoding {
        /// Content hash.
        hash: String,
    },
    /// File could not be read at all.
    Unreadable {
        /// The read error.
        message: String,
    },
}

/// Load a file, enforcing the size cap without holding oversized content.
pub(crate) fn load_source(path: &Path, max_file_size: u64) -> LoadOutcome {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            return LoadOutcome::Unreadable {
                message: e.to_string(),
            }
        }
    };

    if size > max_file_size {
        // Stream-hash so the journal still tracks the file.
        match stream_hash(path) {
            Ok(hash) => return LoadOutcome::Oversized { hash, size },
            Err(e) => {
                return LoadOutcome::Unreadable {
                    message: e.to_string(),
                }
            }
        }
    }

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            return LoadOutcome::Unreadable {
                message: e.to_string(),
            }
        }
    };
    let hash = sha256_hex(&bytes);
    match String::from_utf8(bytes) {
        Ok(text) => LoadOutcome::Loaded { text, hash },
        Err(_) => LoadOutcome::Encoding { hash },
    }
}

fn stream_hash(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// Build the File entity for a path.
///
/// `line_count` is 1 when the content was not loaded (skips); the entity
/// still exists so framework and import edges can resolve to it.
pub(crate) fn file_entity(path: &Path, hash: &str, line_count: usize, size: u64) -> Entity {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    let line_end = line_count.max(1) as i64;

    let mut props = PropertyBag::new();
    props.insert(
        PropKey::Path,
        PropValue::Str(path.to_string_lossy().into_owned()),
    );
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        props.insert(PropKey::Extension, PropValue::Str(format!(".{ext}")));
    }
    props.insert(PropKey::Size, PropValue::Int(size as i64));
    props.insert(PropKey::Hash, PropValue::Str(hash.to_string()));
    props.insert(PropKey::LinesOfCode, PropValue::Int(line_count as i64));

    Entity {
        id: entity_id(EntityKind::File, path, &name, 1, line_end),
        kind: EntityKind::File,
        name,
        file_path: path.to_path_buf(),
        line_start: 1,
        line_end,
        props,
    }
}

/// Shared skip/degrade path: build a file-only parse for content that was
/// not (or could not be) parsed, with the reason recorded in-band.
pub(crate) fn degraded_parse(path: &Path, outcome: LoadOutcome) -> FileParse {
    let (hash, size, message) = match outcome {
        LoadOutcome::Oversized { hash, size } => {
            warn!("Skipping {} - exceeds size cap ({size} bytes)", path.display());
            (hash, size, format!("skipped: size cap exceeded ({size} bytes)"))
        }
        LoadOutcome::Encoding { hash } => {
            warn!("Skipping {} - not valid UTF-8", path.display());
            (hash, 0, "skipped: encoding failure (not UTF-8)".to_string())
        }
        LoadOutcome::Unreadable { message } => {
            warn!("Cannot read {}: {message}", path.display());
            (String::new(), 0, format!("unreadable: {message}"))
        }
        LoadOutcome::Loaded { .. } => unreachable!("loaded content is not a degraded parse"),
    };

    let entity = file_entity(path, &hash, 1, size);
    let mut parse = FileParse::file_only(path.to_path_buf(), entity, hash);
    parse.issues.push(ParseIssue {
        file: path.to_path_buf(),
        line: None,
        column: None,
        message,
    });
    parse
}

/// Normalize to an absolute path without touching the filesystem beyond
/// the current directory lookup. Paths are identity input, so `.`/`..`
/// segments are folded deterministically.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut parts: Vec<std::ffi::OsString> = Vec::new();
    for component in absolute.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                parts.pop();
            }
            other => parts.push(other.as_os_str().to_os_string()),
        }
    }
    let mut result = PathBuf::new();
    for part in parts {
        result.push(part);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_entity_has_path_and_hash_props() {
        let entity = file_entity(Path::new("/p/a.py"), "deadbeef", 10, 42);
        assert_eq!(entity.kind, EntityKind::File);
        assert_eq!(entity.name, "a.py");
        assert_eq!(entity.line_end, 10);
        assert_eq!(
            entity.props.get(&PropKey::Hash),
            Some(&PropValue::Str("deadbeef".to_string()))
        );
        assert_eq!(
            entity.props.get(&PropKey::Extension),
            Some(&PropValue::Str(".py".to_string()))
        );
    }

    #[test]
    fn oversized_file_degrades_to_file_only() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&vec![b'x'; 128]).unwrap();

        let outcome = load_source(tmp.path(), 16);
        let parse = degraded_parse(tmp.path(), outcome);
        assert_eq!(parse.entities.len(), 1);
        assert_eq!(parse.entities[0].kind, EntityKind::File);
        assert_eq!(parse.issues.len(), 1);
        assert!(parse.issues[0].message.contains("size cap"));
        assert!(!parse.content_hash.is_empty());
    }

    #[test]
    fn normalize_folds_dot_segments() {
        let normalized = normalize_path(Path::new("/a/b/../c/./d.py"));
        assert_eq!(normalized, PathBuf::from("/a/c/d.py"));
    }

    #[test]
    fn front_end_set_claims_each_type_once() {
        let set = FrontEndSet::from_config(&CodegraphConfig::default());
        for (file, expected) in [
            ("a.py", "python"),
            ("a.ts", "typescript"),
            ("a.jsx", "javascript"),
            ("a.html", "html"),
            ("a.scss", "css"),
        ] {
            let fe = set.front_end_for(Path::new(file)).expect(file);
            assert_eq!(fe.name(), expected, "{file}");
        }
        assert!(set.front_end_for(Path::new("a.txt")).is_none());
    }
}
