//! Extraction delta: what one driver run hands to the store adapter.

use crate::model::{Edge, Entity, ParseIssue};
use std::path::PathBuf;

/// An edge re-inserted on behalf of an unchanged file.
///
/// When a modified file's subtree is replaced, edges pointing into it from
/// files that were not re-parsed are destroyed by the detach-delete. The
/// incremental engine collects them here so the adapter restores them in
/// the same apply.
pub type CrossEdges = Vec<Edge>;

/// Everything extracted from one file, fully resolved.
#[derive(Debug, Clone)]
pub struct FileDelta {
    /// Absolute path of the file.
    pub file_path: PathBuf,
    /// Content hash, for the journal.
    pub content_hash: String,
    /// Entities rooted at this file.
    pub entities: Vec<Entity>,
    /// Resolved edges originating in this file.
    pub edges: Vec<Edge>,
    /// Parse issues for the report.
    pub issues: Vec<ParseIssue>,
}

/// The ordered set of additions produced by one extraction run.
///
/// Files are sorted by path so the final graph state does not depend on
/// worker scheduling order.
#[derive(Debug, Clone, Default)]
pub struct ExtractionDelta {
    /// Per-file deltas (the store applies each transactionally).
    pub files: Vec<FileDelta>,
    /// Interned External placeholders, deduplicated across files.
    pub externals: Vec<Entity>,
    /// Edges from files outside `files` whose targets live inside it.
    /// Empty for full runs; filled by the incremental engine.
    pub cross_edges: CrossEdges,
    /// Run statistics and per-file issue list.
    pub report: ExtractionReport,
}

/// Summary returned from every run: counts plus the per-file error list.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Files handed to front-ends.
    pub files_parsed: usize,
    /// Files that reported at least one issue.
    pub files_with_issues: usize,
    /// Total entities extracted (excluding Externals).
    pub entities: usize,
    /// Total resolved edges.
    pub edges: usize,
    /// Distinct External placeholders interned.
    pub externals: usize,
    /// Edges dropped because a framework side-file was absent.
    pub dropped_framework_edges: usize,
    /// All parse issues, in file order.
    pub issues: Vec<ParseIssue>,
}
