//! Incremental update engine.
//!
//! Reconciles the store with the filesystem: classify every path as added,
//! modified, deleted, or unchanged; detach-delete what is gone; re-parse
//! what changed; and merge the result so the store equals a cold full run
//! on the same tree. Identity determinism is what makes the merge a
//! set-diff: unchanged entities recover the same IDs, so edges into them
//! from other files can be restored by ID.

pub mod journal;

use crate::config::CodegraphConfig;
use crate::error::Result;
use crate::extract::delta::ExtractionDelta;
use crate::extract::{ExtractionReport, Extractor, FileDelta};
use crate::ingest::normalize_path;
use crate::model::EntityId;
use crate::store::{ApplyReport, GraphStore};
use journal::{mtime_seconds, Journal};
use log::{debug, info};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Classification of the tracked and on-disk path sets.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Present on disk, not tracked.
    pub added: Vec<PathBuf>,
    /// Tracked with a content-hash mismatch.
    pub modified: Vec<PathBuf>,
    /// Tracked, no longer on disk.
    pub deleted: Vec<PathBuf>,
    /// Tracked and unchanged (skipped entirely).
    pub unchanged: Vec<PathBuf>,
}

impl ChangeSet {
    /// Whether anything needs re-parsing or deleting.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Outcome of one update run.
#[derive(Debug, Clone, Default)]
pub struct UpdateOutcome {
    /// The classification the run acted on.
    pub changes: ChangeSet,
    /// Extraction statistics (files actually parsed this run).
    pub extraction: ExtractionReport,
    /// Store write statistics.
    pub apply: ApplyReport,
    /// Externals removed by garbage collection.
    pub externals_collected: u64,
}

/// Drives incremental updates against one store.
pub struct IncrementalUpdater<'a> {
    config: &'a CodegraphConfig,
    store: &'a GraphStore,
}

impl<'a> IncrementalUpdater<'a> {
    /// Create an updater over an open store.
    pub fn new(config: &'a CodegraphConfig, store: &'a GraphStore) -> Self {
        IncrementalUpdater { config, store }
    }

    /// Run an update over `root` (default: the project root).
    ///
    /// `full` short-circuits the classifier: the store contents and the
    /// journal are dropped first and everything on disk is re-parsed. The
    /// first run on an empty journal behaves identically.
    pub fn update(&self, root: Option<&Path>, full: bool) -> Result<UpdateOutcome> {
        let root = root
            .map(normalize_path)
            .unwrap_or_else(|| normalize_path(&self.config.project_root));
        let journal_path = self.config.journal_path();
        let mut journal = if full {
            info!("Full update: clearing store and journal");
            self.store.clear()?;
            Journal::default()
        } else {
            Journal::load(&journal_path)?
        };

        let extractor = Extractor::new(self.config);
        let present = extractor.discover(&root)?;
        let mut changes = classify(&journal, &root, &present);
        info!(
            "Change detection: {} added, {} modified, {} deleted, {} unchanged",
            changes.added.len(),
            changes.modified.len(),
            changes.deleted.len(),
            changes.unchanged.len()
        );

        // Files with edges into a deleted subtree must re-resolve: a full
        // run would demote those references to Externals, and equivalence
        // requires the same end state. Collect them before deleting.
        let mut dependents: BTreeSet<PathBuf> = BTreeSet::new();
        for path in &changes.deleted {
            for dependent in self.store.dependent_files(path)? {
                dependents.insert(dependent);
            }
        }

        // Deletions first: detach-delete each File subtree.
        for path in &changes.deleted {
            debug!("Deleting subtree for {}", path.display());
            self.store.delete_file_subtree(path)?;
            journal.remove(path);
            dependents.remove(path);
        }

        for dependent in dependents {
            let untouched = !changes.added.contains(&dependent)
                && !changes.modified.contains(&dependent);
            if untouched && present.contains(&dependent) {
                debug!("Re-resolving dependent {}", dependent.display());
                changes.unchanged.retain(|p| p != &dependent);
                changes.modified.push(dependent);
            }
        }
        changes.modified.sort();

        let mut outcome = UpdateOutcome {
            changes: changes.clone(),
            ..UpdateOutcome::default()
        };

        if changes.added.is_empty() && changes.modified.is_empty() {
            outcome.externals_collected = if changes.deleted.is_empty() {
                0
            } else {
                self.store.collect_external_garbage()?
            };
            journal.save(&journal_path)?;
            info!("No files to re-parse");
            return Ok(outcome);
        }

        // Extract over every present file so pass 2 resolves re-parsed
        // files against the unchanged ones, exactly as a full run would.
        // Only the re-parsed subset is written back.
        let delta = extractor.extract_paths(&present)?;
        let reparse: BTreeSet<PathBuf> = changes
            .added
            .iter()
            .chain(changes.modified.iter())
            .cloned()
            .collect();
        let apply_delta = restrict_delta(delta, &reparse);

        outcome.extraction = apply_delta.report.clone();
        outcome.apply = self.store.apply(&apply_delta)?;
        outcome.externals_collected = self.store.collect_external_garbage()?;

        // Journal every present file, re-parsed or not.
        for file in &apply_delta.files {
            journal.insert(
                file.file_path.clone(),
                file.content_hash.clone(),
                mtime_seconds(&file.file_path),
            );
        }
        for path in &changes.unchanged {
            if journal.get(path).is_none() {
                // Unchanged by hash but missing from the journal (e.g.
                // recovered store): track it now.
                if let Some(entry) = hash_on_disk(path) {
                    journal.insert(path.clone(), entry, mtime_seconds(path));
                }
            }
        }
        journal.save(&journal_path)?;
        Ok(outcome)
    }
}

/// Classify present paths against the journal.
///
/// The tracked set is restricted to paths under `root` so a partial
/// `update --path` never deletes files outside the scanned subtree.
pub fn classify(journal: &Journal, root: &Path, present: &[PathBuf]) -> ChangeSet {
    let present_set: HashSet<&PathBuf> = present.iter().collect();
    let mut changes = ChangeSet::default();

    for path in present {
        match journal.get(path) {
            None => changes.added.push(path.clone()),
            // Classification is by content hash; the journal's mtime is
            // bookkeeping, not a shortcut (same-second rewrites would
            // slip through an mtime comparison).
            Some(entry) => match hash_on_disk(path) {
                Some(hash) if hash == entry.hash => changes.unchanged.push(path.clone()),
                Some(_) => changes.modified.push(path.clone()),
                None => changes.modified.push(path.clone()),
            },
        }
    }

    for tracked in journal.paths() {
        if tracked.starts_with(root) && !present_set.contains(tracked) {
            changes.deleted.push(tracked.clone());
        }
    }

    changes.added.sort();
    changes.modified.sort();
    changes.deleted.sort();
    changes.unchanged.sort();
    changes
}

/// Keep only the re-parsed files in the delta, and collect edges from
/// unchanged files that point into re-parsed ones. Those edges were
/// destroyed by the subtree replacement and must be re-inserted.
fn restrict_delta(delta: ExtractionDelta, reparse: &BTreeSet<PathBuf>) -> ExtractionDelta {
    let mut kept: Vec<FileDelta> = Vec::new();
    let mut others: Vec<FileDelta> = Vec::new();
    for file in delta.files {
        if reparse.contains(&file.file_path) {
            kept.push(file);
        } else {
            others.push(file);
        }
    }

    let reparsed_ids: HashSet<EntityId> = kept
        .iter()
        .flat_map(|f| f.entities.iter().map(|e| e.id.clone()))
        .collect();

    let mut cross_edges = Vec::new();
    for file in &others {
        for edge in &file.edges {
            if reparsed_ids.contains(&edge.target) {
                cross_edges.push(edge.clone());
            }
        }
    }

    let mut report = ExtractionReport {
        files_parsed: kept.len(),
        ..ExtractionReport::default()
    };
    for file in &kept {
        if !file.issues.is_empty() {
            report.files_with_issues += 1;
            report.issues.extend(file.issues.iter().cloned());
        }
        report.entities += file.entities.len();
        report.edges += file.edges.len();
    }
    report.externals = delta.externals.len();
    report.dropped_framework_edges = delta.report.dropped_framework_edges;

    ExtractionDelta {
        files: kept,
        externals: delta.externals,
        cross_edges,
        report,
    }
}

fn hash_on_disk(path: &Path) -> Option<String> {
    std::fs::read(path)
        .ok()
        .map(|bytes| crate::ingest::sha256_hex(&bytes))
}
