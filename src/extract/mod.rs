//! Extractor driver.
//!
//! Orchestrates one run: discover and dedupe files, pass 1 in parallel
//! (each worker owns its parse state; the shared registry takes batched
//! inserts at file granularity), coalesce duplicate identities, pass 2
//! against the frozen registry, and emit the extraction delta. The driver
//! is cancelable between files via a cooperative flag.

pub mod delta;
pub mod resolve;

use crate::config::CodegraphConfig;
use crate::error::{CodegraphError, Result};
use crate::ingest::{normalize_path, FrontEndSet};
use crate::model::{EntityId, FileParse};
use crate::registry::SymbolRegistry;
use glob::Pattern;
use log::{debug, info};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

pub use delta::{ExtractionDelta, ExtractionReport, FileDelta};

/// Coordinates entity extraction over a set of files.
pub struct Extractor {
    config: CodegraphConfig,
    front_ends: FrontEndSet,
    exclude: Vec<Pattern>,
    cancel: Arc<AtomicBool>,
}

impl Extractor {
    /// Build an extractor for one run.
    pub fn new(config: &CodegraphConfig) -> Self {
        let exclude = config
            .parsing
            .exclude_patterns
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();
        Extractor {
            config: config.clone(),
            front_ends: FrontEndSet::from_config(config),
            exclude,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The cooperative cancellation flag. Workers poll it between files.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Discover parseable files under a tree root.
    ///
    /// Excluded patterns are filtered, each absolute path appears exactly
    /// once, and only paths claimed by a front-end survive. The result is
    /// sorted for deterministic downstream processing.
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let root = normalize_path(root);
        if !root.is_dir() {
            return Err(CodegraphError::Discovery {
                root,
                message: "not a directory".to_string(),
            });
        }

        let mut found = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(dir) = stack.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Cannot read {}: {e}", dir.display());
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let file_type = match entry.file_type() {
                    Ok(ft) => ft,
                    Err(_) => continue,
                };
                if file_type.is_symlink() && !self.config.parsing.follow_symlinks {
                    continue;
                }
                if self.is_excluded(&path) {
                    continue;
                }
                if path.is_dir() {
                    stack.push(path);
                } else if self.front_ends.front_end_for(&path).is_some() {
                    found.insert(normalize_path(&path));
                }
            }
        }
        Ok(found.into_iter().collect())
    }

    /// Run the full extraction over a tree root.
    pub fn extract_tree(&self, root: &Path) -> Result<ExtractionDelta> {
        let paths = self.discover(root)?;
        self.extract_paths(&paths)
    }

    /// Run the full extraction over an explicit set of paths.
    pub fn extract_paths(&self, paths: &[PathBuf]) -> Result<ExtractionDelta> {
        // Dedupe and order so each absolute path is parsed exactly once.
        let unique: BTreeSet<PathBuf> = paths.iter().map(|p| normalize_path(p)).collect();
        let paths: Vec<PathBuf> = unique.into_iter().collect();
        info!("Extracting {} files", paths.len());

        // Pass 1: parallel parse; registry inserts batched per file.
        let registry = RwLock::new(SymbolRegistry::new());
        let parses: Vec<FileParse> = paths
            .par_iter()
            .filter_map(|path| {
                if self.cancel.load(Ordering::Relaxed) {
                    return None;
                }
                let front_end = self.front_ends.front_end_for(path)?;
                let parse = front_end.parse_file(path);
                registry
                    .write()
                    .expect("registry lock poisoned")
                    .insert_file(&parse);
                Some(parse)
            })
            .collect();

        if self.cancel.load(Ordering::Relaxed) {
            return Err(CodegraphError::Cancelled);
        }

        let registry = registry.into_inner().expect("registry lock poisoned");
        info!(
            "Pass 1 complete: {} files, {} registered",
            parses.len(),
            registry.file_count()
        );

        // Coalesce: identical identities within a file are deduped.
        let parses: Vec<FileParse> = parses.into_iter().map(coalesce_file).collect();

        // Pass 2: parallel resolution against the frozen registry.
        let source_roots = self.config.source_roots();
        let resolved: Vec<(FileDelta, Vec<crate::model::Entity>, usize)> = parses
            .par_iter()
            .filter_map(|parse| {
                if self.cancel.load(Ordering::Relaxed) {
                    return None;
                }
                let mut externals = resolve::Externals::default();
                let outcome =
                    resolve::resolve_file(&registry, &source_roots, parse, &mut externals);
                let file_delta = FileDelta {
                    file_path: parse.file_path.clone(),
                    content_hash: parse.content_hash.clone(),
                    entities: parse.entities.clone(),
                    edges: outcome.edges,
                    issues: parse.issues.clone(),
                };
                Some((
                    file_delta,
                    externals.into_entities(),
                    outcome.dropped_framework_edges,
                ))
            })
            .collect();

        if self.cancel.load(Ordering::Relaxed) {
            return Err(CodegraphError::Cancelled);
        }

        // Merge: interned Externals are deduplicated across files by id.
        let mut files = Vec::with_capacity(resolved.len());
        let mut externals_by_id: HashMap<EntityId, crate::model::Entity> = HashMap::new();
        let mut dropped_framework_edges = 0;
        for (delta, externals, dropped) in resolved {
            for external in externals {
                externals_by_id.entry(external.id.clone()).or_insert(external);
            }
            dropped_framework_edges += dropped;
            files.push(delta);
        }
        files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        let mut externals: Vec<crate::model::Entity> = externals_by_id.into_values().collect();
        externals.sort_by(|a, b| a.id.cmp(&b.id));

        let mut report = ExtractionReport {
            files_parsed: files.len(),
            dropped_framework_edges,
            ..ExtractionReport::default()
        };
        for file in &files {
            if !file.issues.is_empty() {
                report.files_with_issues += 1;
                report.issues.extend(file.issues.iter().cloned());
            }
            report.entities += file.entities.len();
            report.edges += file.edges.len();
        }
        report.externals = externals.len();
        info!(
            "Pass 2 complete: {} entities, {} edges, {} externals",
            report.entities, report.edges, report.externals
        );

        Ok(ExtractionDelta {
            files,
            externals,
            cross_edges: Vec::new(),
            report,
        })
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let full = path.to_string_lossy();
        self.exclude
            .iter()
            .any(|pattern| pattern.matches(&name) || pattern.matches(&full))
    }
}

/// Dedupe entities with identical identity inside one file parse.
fn coalesce_file(mut parse: FileParse) -> FileParse {
    let mut seen: HashSet<EntityId> = HashSet::with_capacity(parse.entities.len());
    parse.entities.retain(|entity| seen.insert(entity.id.clone()));
    parse
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn discovery_excludes_patterns_and_unclaimed_files() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "a.py", "x = 1\n");
        write(tmp.path(), "notes.txt", "ignored\n");
        write(tmp.path(), "node_modules/lib/x.js", "var x = 1;\n");

        let config = CodegraphConfig::with_root(tmp.path());
        let extractor = Extractor::new(&config);
        let paths = extractor.discover(tmp.path()).unwrap();

        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("a.py"));
    }

    #[test]
    fn extraction_is_order_independent() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write(tmp.path(), "a.py", "import b\n\ndef f():\n    g()\n");
        let b = write(tmp.path(), "b.py", "def g():\n    pass\n");

        let config = CodegraphConfig::with_root(tmp.path());
        let extractor = Extractor::new(&config);

        let forward = extractor
            .extract_paths(&[a.clone(), b.clone()])
            .unwrap();
        let backward = extractor.extract_paths(&[b, a]).unwrap();

        let signature = |delta: &ExtractionDelta| {
            let mut ids: Vec<String> = delta
                .files
                .iter()
                .flat_map(|f| f.entities.iter().map(|e| e.id.to_string()))
                .collect();
            ids.sort();
            let mut edges: Vec<String> = delta
                .files
                .iter()
                .flat_map(|f| {
                    f.edges
                        .iter()
                        .map(|e| format!("{}:{}:{}", e.kind.as_str(), e.source, e.target))
                })
                .collect();
            edges.sort();
            (ids, edges)
        };
        assert_eq!(signature(&forward), signature(&backward));
    }

    #[test]
    fn cancelled_extraction_reports_cancellation() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write(tmp.path(), "a.py", "x = 1\n");

        let config = CodegraphConfig::with_root(tmp.path());
        let extractor = Extractor::new(&config);
        extractor.cancel_flag().store(true, Ordering::Relaxed);

        let result = extractor.extract_paths(&[a]);
        assert!(matches!(result, Err(CodegraphError::Cancelled)));
    }

    #[test]
    fn duplicate_paths_are_parsed_once() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write(tmp.path(), "a.py", "def f():\n    pass\n");

        let config = CodegraphConfig::with_root(tmp.path());
        let extractor = Extractor::new(&config);
        let delta = extractor.extract_paths(&[a.clone(), a]).unwrap();
        assert_eq!(delta.files.len(), 1);
        let functions = delta.files[0]
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::Function)
            .count();
        assert_eq!(functions, 1);
    }
}
