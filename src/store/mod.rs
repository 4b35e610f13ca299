//! Kuzu store adapter.
//!
//! Translates extraction deltas into parameterized Cypher upserts and
//! exposes the read-only query surface. The store holds a process-level
//! exclusive writer lock (a second process opening the same store fails
//! fast inside Kuzu). All values go through parameter binding; nothing is
//! concatenated into query text.

pub mod schema;

use crate::config::DatabaseConfig;
use crate::error::{CodegraphError, Result};
use crate::extract::delta::ExtractionDelta;
use crate::model::identity::{external_id, sanitize_external_name};
use crate::model::{Edge, Entity, EntityId, EntityKind, PropKey, PropValue, RelationKind};
use kuzu::{Connection, Database, LogicalType, SystemConfig, Value};
use log::{debug, info, warn};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Result of one `apply` call.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    /// File subtrees replaced.
    pub files_applied: usize,
    /// Entity rows written.
    pub entities_written: usize,
    /// Edge rows written.
    pub edges_written: usize,
    /// Edges whose missing endpoint was demoted to an External.
    pub edges_demoted: usize,
    /// Rows retried individually after a batch failure.
    pub rows_retried: usize,
    /// Rows that failed even individually.
    pub rows_failed: usize,
    /// Kinds the schema does not declare, reported once per run.
    pub missing_kinds: BTreeSet<String>,
}

/// Rows returned from a read query, stringified for display.
#[derive(Debug, Clone, Default)]
pub struct QueryRows {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Row values rendered with the store's display rules.
    pub rows: Vec<Vec<String>>,
}

/// Handle to an open store.
pub struct GraphStore {
    db: Database,
    store_path: PathBuf,
    batch_size: usize,
    query_timeout_ms: u64,
}

fn write_verb_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Conservative: any write verb anywhere in the text rejects the query.
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(CREATE|MERGE|DELETE|DETACH|SET|DROP|ALTER|COPY|IMPORT|EXPORT|BEGIN|COMMIT|ROLLBACK)\b",
        )
        .expect("static pattern")
    })
}

impl GraphStore {
    /// Open (or create) the store at `path` and probe the schema.
    pub fn open(path: &Path, config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CodegraphError::io(parent, e))?;
        }
        let db = Database::new(path, SystemConfig::default())?;
        let store = GraphStore {
            db,
            store_path: path.to_path_buf(),
            batch_size: config.batch_size.max(1),
            query_timeout_ms: config.query_timeout_secs.saturating_mul(1000),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// The store's on-disk location.
    pub fn path(&self) -> &Path {
        &self.store_path
    }

    fn connection(&self) -> Result<Connection<'_>> {
        Ok(Connection::new(&self.db)?)
    }

    // ---- schema probe & migration ----

    /// Compare declared tables to existing ones; create what is missing
    /// and run the additive column migration for tables that drifted.
    fn ensure_schema(&self) -> Result<()> {
        let conn = self.connection()?;
        let existing = existing_tables(&conn)?;

        for kind in EntityKind::all() {
            if !existing.contains(kind.as_str()) {
                debug!("Creating node table {}", kind.as_str());
                conn.query(&schema::node_table_ddl(*kind))?;
            } else {
                self.migrate_node_columns(&conn, *kind)?;
            }
        }
        for kind in RelationKind::all() {
            if !existing.contains(kind.as_str()) {
                debug!("Creating rel table {}", kind.as_str());
                conn.query(&schema::rel_table_ddl(*kind))?;
            }
        }

        // Version marker, additive-only.
        if !existing.contains("SchemaMeta") {
            conn.query(
                "CREATE NODE TABLE IF NOT EXISTS SchemaMeta(id INT64, version INT64, PRIMARY KEY (id))",
            )?;
        }
        let rows = collect_rows(conn.query("MATCH (m:SchemaMeta) RETURN m.version")?);
        match rows.first().and_then(|r| r.first()).cloned() {
            Some(stored) if stored == schema::SCHEMA_VERSION.to_string() => {}
            Some(stored) => {
                info!(
                    "Migrating schema from version {stored} to {}",
                    schema::SCHEMA_VERSION
                );
                let mut stmt = conn.prepare("MATCH (m:SchemaMeta) SET m.version = $version")?;
                conn.execute(
                    &mut stmt,
                    vec![("version", Value::Int64(schema::SCHEMA_VERSION))],
                )?;
            }
            None => {
                let mut stmt =
                    conn.prepare("CREATE (:SchemaMeta {id: $id, version: $version})")?;
                conn.execute(
                    &mut stmt,
                    vec![
                        ("id", Value::Int64(0)),
                        ("version", Value::Int64(schema::SCHEMA_VERSION)),
                    ],
                )?;
            }
        }
        Ok(())
    }

    fn migrate_node_columns(&self, conn: &Connection, kind: EntityKind) -> Result<()> {
        let info = collect_rows(conn.query(&format!("CALL table_info('{}') RETURN *", kind.as_str()))?);
        let present: HashSet<String> = info
            .iter()
            .flat_map(|row| row.iter().cloned())
            .collect();
        for column in schema::node_columns(kind) {
            if !present.contains(column.key.as_str()) {
                info!(
                    "Schema migration: adding {}.{}",
                    kind.as_str(),
                    column.key.as_str()
                );
                conn.query(&format!(
                    "ALTER TABLE {} ADD {} {}",
                    kind.as_str(),
                    column.key.as_str(),
                    column.ctype.ddl()
                ))?;
            }
        }
        Ok(())
    }

    // ---- write surface ----

    /// Apply an extraction delta.
    ///
    /// Per file: the existing subtree is detach-deleted and the new
    /// entities inserted inside one transaction. Edges follow in batches
    /// after all endpoints exist; a batch failure retries row by row.
    pub fn apply(&self, delta: &ExtractionDelta) -> Result<ApplyReport> {
        let conn = self.connection()?;
        let mut report = ApplyReport::default();
        let mut known_ids: HashSet<EntityId> = HashSet::new();

        // External placeholders first: they are upserts shared by every
        // file and carry no containment.
        for external in &delta.externals {
            self.upsert_entity(&conn, external, &mut report)?;
            known_ids.insert(external.id.clone());
        }

        // Per-file transactions: replace the subtree, insert entities.
        for file in &delta.files {
            let path_str = file.file_path.to_string_lossy().into_owned();
            let outcome: Result<()> = (|| {
                conn.query("BEGIN TRANSACTION")?;
                self.delete_subtree_statements(&conn, &path_str)?;
                for entity in &file.entities {
                    self.upsert_entity(&conn, entity, &mut report)?;
                }
                conn.query("COMMIT")?;
                Ok(())
            })();

            match outcome {
                Ok(()) => {
                    report.files_applied += 1;
                    known_ids.extend(file.entities.iter().map(|e| e.id.clone()));
                }
                Err(e) => {
                    // Roll back and recover row by row; surviving rows
                    // commit individually.
                    let _ = conn.query("ROLLBACK");
                    warn!(
                        "Batch apply failed for {path_str} ({e}); retrying rows individually"
                    );
                    let _ = self.delete_subtree_statements(&conn, &path_str);
                    for entity in &file.entities {
                        report.rows_retried += 1;
                        match self.upsert_entity(&conn, entity, &mut report) {
                            Ok(()) => {
                                known_ids.insert(entity.id.clone());
                            }
                            Err(row_err) => {
                                report.rows_failed += 1;
                                debug!("Entity row failed: {} ({row_err})", entity.id);
                            }
                        }
                    }
                    report.files_applied += 1;
                }
            }
        }

        // Edges, batched. Endpoints were inserted above or already exist
        // in the store; the existence check guards cross-batch references.
        let mut edges: Vec<&Edge> = Vec::new();
        for file in &delta.files {
            edges.extend(file.edges.iter());
        }
        edges.extend(delta.cross_edges.iter());

        for batch in edges.chunks(self.batch_size) {
            self.apply_edge_batch(&conn, batch, &known_ids, &mut report)?;
        }

        for kind in &report.missing_kinds {
            warn!("Schema does not declare kind '{kind}'; its rows were rejected");
        }
        Ok(report)
    }

    fn apply_edge_batch(
        &self,
        conn: &Connection,
        batch: &[&Edge],
        known_ids: &HashSet<EntityId>,
        report: &mut ApplyReport,
    ) -> Result<()> {
        // Resolve each edge against endpoint existence before writing.
        let mut resolved: Vec<Edge> = Vec::with_capacity(batch.len());
        for edge in batch {
            match self.check_endpoints(conn, edge, known_ids)? {
                EndpointStatus::Ok => resolved.push((*edge).clone()),
                EndpointStatus::MissingTarget => {
                    match self.demote_edge(conn, edge, report)? {
                        Some(demoted) => {
                            report.edges_demoted += 1;
                            resolved.push(demoted);
                        }
                        None => {
                            report.rows_failed += 1;
                            debug!(
                                "Edge dropped, no External demotion for {}",
                                edge.kind.as_str()
                            );
                        }
                    }
                }
                EndpointStatus::MissingSource => {
                    report.rows_failed += 1;
                    debug!("Edge dropped, missing source for {}", edge.kind.as_str());
                }
            }
        }

        let batch_outcome: Result<()> = (|| {
            conn.query("BEGIN TRANSACTION")?;
            for edge in &resolved {
                self.insert_edge(conn, edge, report)?;
            }
            conn.query("COMMIT")?;
            Ok(())
        })();

        if let Err(e) = batch_outcome {
            let _ = conn.query("ROLLBACK");
            warn!("Edge batch failed ({e}); retrying rows individually");
            for edge in &resolved {
                report.rows_retried += 1;
                if let Err(row_err) = self.insert_edge(conn, edge, report) {
                    report.rows_failed += 1;
                    debug!(
                        "Edge row failed: {} {} -> {} ({row_err})",
                        edge.kind.as_str(),
                        edge.source,
                        edge.target
                    );
                }
            }
        }
        Ok(())
    }

    fn check_endpoints(
        &self,
        conn: &Connection,
        edge: &Edge,
        known_ids: &HashSet<EntityId>,
    ) -> Result<EndpointStatus> {
        let source_ok = known_ids.contains(&edge.source)
            || self.node_exists(conn, edge.source_kind, &edge.source)?;
        if !source_ok {
            return Ok(EndpointStatus::MissingSource);
        }
        let target_ok = known_ids.contains(&edge.target)
            || self.node_exists(conn, edge.target_kind, &edge.target)?;
        if target_ok {
            Ok(EndpointStatus::Ok)
        } else {
            Ok(EndpointStatus::MissingTarget)
        }
    }

    /// Replace a missing target with an interned External, when the edge
    /// kind declares an External pair.
    fn demote_edge(
        &self,
        conn: &Connection,
        edge: &Edge,
        report: &mut ApplyReport,
    ) -> Result<Option<Edge>> {
        if !schema::pair_declared(edge.kind, edge.source_kind, EntityKind::External) {
            return Ok(None);
        }
        let raw_name = edge
            .props
            .get(&PropKey::Symbol)
            .or_else(|| edge.props.get(&PropKey::PropertyPath))
            .and_then(|v| match v {
                PropValue::Str(s) => Some(s.clone()),
                _ => None,
            })
            .unwrap_or_else(|| format!("unresolved:{}", &edge.target.as_str()[..12]));
        let name = sanitize_external_name(&raw_name);
        let id = external_id(&name);

        let external = Entity {
            id: id.clone(),
            kind: EntityKind::External,
            name,
            file_path: PathBuf::new(),
            line_start: 0,
            line_end: 0,
            props: Default::default(),
        };
        self.upsert_entity(conn, &external, report)?;

        let mut demoted = edge.clone();
        demoted.target = id;
        demoted.target_kind = EntityKind::External;
        Ok(Some(demoted))
    }

    fn node_exists(&self, conn: &Connection, kind: EntityKind, id: &EntityId) -> Result<bool> {
        let mut stmt = conn.prepare(&format!(
            "MATCH (n:{} {{id: $id}}) RETURN n.id",
            kind.as_str()
        ))?;
        let result = conn.execute(&mut stmt, vec![("id", Value::String(id.to_string()))])?;
        Ok(result.into_iter().next().is_some())
    }

    fn upsert_entity(
        &self,
        conn: &Connection,
        entity: &Entity,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let set_clause = schema::node_column_names(entity.kind)
            .iter()
            .map(|c| format!("n.{c} = ${c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!(
            "MERGE (n:{} {{id: $id}}) ON CREATE SET {set_clause} ON MATCH SET {set_clause}",
            entity.kind.as_str()
        );

        let mut params: Vec<(&str, Value)> =
            vec![("id", Value::String(entity.id.to_string()))];
        params.push(("name", Value::String(entity.name.clone())));
        if schema::has_location_columns(entity.kind) {
            params.push((
                "file_path",
                Value::String(entity.file_path.to_string_lossy().into_owned()),
            ));
            params.push(("line_start", Value::Int64(entity.line_start)));
            params.push(("line_end", Value::Int64(entity.line_end)));
        }
        for column in schema::node_columns(entity.kind) {
            params.push((
                column.key.as_str(),
                bind_prop(entity.props.get(&column.key), column.ctype),
            ));
        }

        let mut stmt = conn.prepare(&text)?;
        conn.execute(&mut stmt, params)?;
        report.entities_written += 1;
        Ok(())
    }

    fn insert_edge(&self, conn: &Connection, edge: &Edge, report: &mut ApplyReport) -> Result<()> {
        if !schema::pair_declared(edge.kind, edge.source_kind, edge.target_kind) {
            report.missing_kinds.insert(format!(
                "{}({} -> {})",
                edge.kind.as_str(),
                edge.source_kind.as_str(),
                edge.target_kind.as_str()
            ));
            return Err(CodegraphError::SchemaMismatch {
                kind: edge.kind.as_str().to_string(),
            });
        }

        let columns = schema::rel_columns(edge.kind);
        let prop_pattern = if columns.is_empty() {
            String::new()
        } else {
            let assignments = columns
                .iter()
                .map(|c| format!("{}: ${}", c.key.as_str(), c.key.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            format!(" {{{assignments}}}")
        };
        let text = format!(
            "MATCH (a:{} {{id: $from_id}}), (b:{} {{id: $to_id}}) CREATE (a)-[:{}{}]->(b)",
            edge.source_kind.as_str(),
            edge.target_kind.as_str(),
            edge.kind.as_str(),
            prop_pattern
        );

        let mut params: Vec<(&str, Value)> = vec![
            ("from_id", Value::String(edge.source.to_string())),
            ("to_id", Value::String(edge.target.to_string())),
        ];
        for column in columns {
            params.push((
                column.key.as_str(),
                bind_prop(edge.props.get(&column.key), column.ctype),
            ));
        }

        let mut stmt = conn.prepare(&text)?;
        conn.execute(&mut stmt, params)?;
        report.edges_written += 1;
        Ok(())
    }

    /// Detach-delete the File entity at `path` and every entity it
    /// contains, in a single transaction.
    pub fn delete_file_subtree(&self, path: &Path) -> Result<()> {
        let conn = self.connection()?;
        let path_str = path.to_string_lossy().into_owned();
        conn.query("BEGIN TRANSACTION")?;
        match self.delete_subtree_statements(&conn, &path_str) {
            Ok(()) => {
                conn.query("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.query("ROLLBACK");
                Err(e)
            }
        }
    }

    fn delete_subtree_statements(&self, conn: &Connection, path: &str) -> Result<()> {
        for kind in EntityKind::all() {
            if !schema::has_location_columns(*kind) {
                continue;
            }
            let mut stmt = conn.prepare(&format!(
                "MATCH (n:{}) WHERE n.file_path = $path DETACH DELETE n",
                kind.as_str()
            ))?;
            conn.execute(&mut stmt, vec![("path", Value::String(path.to_string()))])?;
        }
        let mut stmt =
            conn.prepare("MATCH (n:File) WHERE n.path = $path DETACH DELETE n")?;
        conn.execute(&mut stmt, vec![("path", Value::String(path.to_string()))])?;
        Ok(())
    }

    /// Files with at least one edge into `path`'s subtree.
    ///
    /// Queried before a deletion so the incremental engine can re-resolve
    /// the dependents; a full run would have demoted their references to
    /// Externals, and equivalence requires the same end state.
    pub fn dependent_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let conn = self.connection()?;
        let path_str = path.to_string_lossy().into_owned();
        let mut dependents: BTreeSet<PathBuf> = BTreeSet::new();

        for text in [
            // Edges into entities contained by the file.
            "MATCH (s)-[r]->(t) WHERE t.file_path = $path RETURN DISTINCT s.file_path, s.path",
            // Edges into the File node itself (imports, framework links).
            "MATCH (s)-[r]->(t:File) WHERE t.path = $path RETURN DISTINCT s.file_path, s.path",
        ] {
            let mut stmt = conn.prepare(text)?;
            let rows = collect_rows(
                conn.execute(&mut stmt, vec![("path", Value::String(path_str.clone()))])?,
            );
            for row in rows {
                // Non-File sources carry file_path, File sources carry path.
                let source = row.iter().find(|cell| !cell.is_empty());
                if let Some(source) = source {
                    if source != &path_str {
                        dependents.insert(PathBuf::from(source));
                    }
                }
            }
        }
        Ok(dependents.into_iter().collect())
    }

    /// Remove External entities no edge targets any longer.
    pub fn collect_external_garbage(&self) -> Result<u64> {
        let conn = self.connection()?;
        let before = self.count_kind(&conn, EntityKind::External)?;
        conn.query(
            "MATCH (e:External) OPTIONAL MATCH (s)-[r]->(e) WITH e, count(r) AS refs WHERE refs = 0 DELETE e",
        )?;
        let after = self.count_kind(&conn, EntityKind::External)?;
        Ok(before.saturating_sub(after) as u64)
    }

    /// Drop all graph contents (used by `--full` runs).
    pub fn clear(&self) -> Result<()> {
        let conn = self.connection()?;
        for kind in EntityKind::all() {
            conn.query(&format!("MATCH (n:{}) DETACH DELETE n", kind.as_str()))?;
        }
        Ok(())
    }

    // ---- read surface ----

    /// Run a read-only query. Write verbs are rejected pre-dispatch; the
    /// call runs under the configured timeout.
    pub fn query(&self, cypher: &str, params: &[(&str, PropValue)]) -> Result<QueryRows> {
        if let Some(found) = write_verb_pattern().find(cypher) {
            return Err(CodegraphError::QueryRejected {
                reason: format!("write verb '{}' is not allowed", found.as_str()),
            });
        }

        let conn = self.connection()?;
        conn.set_query_timeout(self.query_timeout_ms);

        let result = if params.is_empty() {
            conn.query(cypher)?
        } else {
            let mut stmt = conn.prepare(cypher)?;
            let bound: Vec<(&str, Value)> = params
                .iter()
                .map(|(name, value)| {
                    let v = match value {
                        PropValue::Str(s) => Value::String(s.clone()),
                        PropValue::Int(i) => Value::Int64(*i),
                        PropValue::Bool(b) => Value::Bool(*b),
                    };
                    (*name, v)
                })
                .collect();
            conn.execute(&mut stmt, bound)?
        };

        let columns = result.get_column_names();
        let rows = collect_rows(result);
        Ok(QueryRows { columns, rows })
    }

    /// Entity counts per kind, for `status`.
    pub fn kind_counts(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.connection()?;
        let mut counts = Vec::new();
        for kind in EntityKind::all() {
            counts.push((kind.as_str().to_string(), self.count_kind(&conn, *kind)?));
        }
        Ok(counts)
    }

    /// Relationship counts per kind, for `status`.
    pub fn relation_counts(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.connection()?;
        let mut counts = Vec::new();
        for kind in RelationKind::all() {
            let rows = collect_rows(conn.query(&format!(
                "MATCH ()-[r:{}]->() RETURN count(r)",
                kind.as_str()
            ))?);
            counts.push((kind.as_str().to_string(), first_count(&rows)));
        }
        Ok(counts)
    }

    /// File paths and content hashes currently stored, a recovery source
    /// when the journal is missing.
    pub fn stored_file_hashes(&self) -> Result<Vec<(PathBuf, String)>> {
        let conn = self.connection()?;
        let rows = collect_rows(conn.query("MATCH (f:File) RETURN f.path, f.hash")?);
        Ok(rows
            .into_iter()
            .filter(|r| r.len() >= 2)
            .map(|mut r| {
                let hash = r.pop().unwrap_or_default();
                let path = r.pop().unwrap_or_default();
                (PathBuf::from(path), hash)
            })
            .collect())
    }

    fn count_kind(&self, conn: &Connection, kind: EntityKind) -> Result<i64> {
        let rows = collect_rows(conn.query(&format!(
            "MATCH (n:{}) RETURN count(n)",
            kind.as_str()
        ))?);
        Ok(first_count(&rows))
    }
}

enum EndpointStatus {
    Ok,
    MissingSource,
    MissingTarget,
}

fn bind_prop(value: Option<&PropValue>, ctype: schema::ColumnType) -> Value {
    match (value, ctype) {
        (Some(PropValue::Str(s)), schema::ColumnType::Str) => Value::String(s.clone()),
        (Some(PropValue::Int(i)), schema::ColumnType::Int) => Value::Int64(*i),
        (Some(PropValue::Bool(b)), schema::ColumnType::Bool) => Value::Bool(*b),
        // Type drift between bag and schema binds as null rather than
        // failing the row.
        (_, schema::ColumnType::Str) => Value::Null(LogicalType::String),
        (_, schema::ColumnType::Int) => Value::Null(LogicalType::Int64),
        (_, schema::ColumnType::Bool) => Value::Null(LogicalType::Bool),
    }
}

fn collect_rows(result: kuzu::QueryResult) -> Vec<Vec<String>> {
    result
        .into_iter()
        .map(|row| row.into_iter().map(render_value).collect())
        .collect()
}

fn render_value(value: Value) -> String {
    match value {
        Value::Null(_) => String::new(),
        other => format!("{other}"),
    }
}

fn first_count(rows: &[Vec<String>]) -> i64 {
    rows.first()
        .and_then(|r| r.first())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0)
}

fn existing_tables(conn: &Connection) -> Result<HashSet<String>> {
    let rows = collect_rows(conn.query("CALL show_tables() RETURN *")?);
    // Column order varies across store versions; collect every string
    // cell and match table names against the set.
    Ok(rows.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_verbs_are_rejected() {
        for query in [
            "CREATE (n:File {id: 'x'})",
            "MATCH (n) DELETE n",
            "MATCH (n) SET n.name = 'x'",
            "merge (n:File {id: 'x'})",
            "MATCH (n) DETACH DELETE n",
            "DROP TABLE File",
        ] {
            assert!(
                write_verb_pattern().find(query).is_some(),
                "should reject: {query}"
            );
        }
    }

    #[test]
    fn read_queries_pass_the_guard() {
        for query in [
            "MATCH (n:File) RETURN n.path",
            "MATCH (a)-[r:Calls]->(b) RETURN a.name, b.name",
            "MATCH (n:Function) WHERE n.is_async RETURN count(n)",
        ] {
            assert!(
                write_verb_pattern().find(query).is_none(),
                "should allow: {query}"
            );
        }
    }

    #[test]
    fn bind_prop_nulls_on_type_drift() {
        let v = bind_prop(
            Some(&PropValue::Str("x".to_string())),
            schema::ColumnType::Int,
        );
        assert!(matches!(v, Value::Null(_)));
        let v = bind_prop(Some(&PropValue::Int(7)), schema::ColumnType::Int);
        assert!(matches!(v, Value::Int64(7)));
    }
}
