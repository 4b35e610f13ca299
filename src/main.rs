//! codegraph CLI binary.
//!
//! This is the main entry point for the codegraph command-line interface.
//! The CLI is a thin adapter over the library APIs; no extraction or
//! store logic is implemented here.

use codegraph::cli::{Commands, OutputFormat};
use codegraph::config::CodegraphConfig;
use codegraph::incremental::IncrementalUpdater;
use codegraph::store::{GraphStore, QueryRows};
use codegraph::CodegraphError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = codegraph::cli::parse_args();

    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::init();
    }

    let result = match cli.command {
        Commands::Init { ref path } => execute_init(path.as_deref()),
        Commands::Update { full, ref path } => {
            execute_update(cli.config.as_deref(), full, path.as_deref())
        }
        Commands::Query {
            ref query,
            format,
            limit,
        } => execute_query(cli.config.as_deref(), query, format, limit),
        Commands::Status => execute_status(cli.config.as_deref()),
        Commands::Reset => execute_reset(cli.config.as_deref()),
    };

    match result {
        Ok(message) => {
            println!("{message}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<CodegraphConfig, CodegraphError> {
    match explicit {
        Some(path) => CodegraphConfig::load(path),
        None => {
            let cwd = std::env::current_dir().map_err(|e| CodegraphError::io(".", e))?;
            CodegraphConfig::discover(&cwd)
        }
    }
}

/// Create the store and write the config file.
fn execute_init(path: Option<&Path>) -> Result<String, CodegraphError> {
    let root = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().map_err(|e| CodegraphError::io(".", e))?,
    };
    let config = CodegraphConfig::with_root(&root);
    let config_path = config.save()?;

    // Opening the store creates it and probes the schema.
    let store = GraphStore::open(&config.store_path(), &config.database)?;
    Ok(format!(
        "Initialized codegraph project: config at {}, store at {}",
        config_path.display(),
        store.path().display()
    ))
}

/// Run the incremental engine. Exit is non-zero only on I/O or store
/// errors; files with parse errors are reported in the output.
fn execute_update(
    config_path: Option<&Path>,
    full: bool,
    path: Option<&Path>,
) -> Result<String, CodegraphError> {
    let config = load_config(config_path)?;
    let store = GraphStore::open(&config.store_path(), &config.database)?;
    let updater = IncrementalUpdater::new(&config, &store);
    let outcome = updater.update(path, full)?;

    let mut lines = vec![format!(
        "Update complete: {} added, {} modified, {} deleted, {} unchanged",
        outcome.changes.added.len(),
        outcome.changes.modified.len(),
        outcome.changes.deleted.len(),
        outcome.changes.unchanged.len()
    )];
    lines.push(format!(
        "Wrote {} entities and {} edges ({} demoted to external, {} rows failed)",
        outcome.apply.entities_written,
        outcome.apply.edges_written,
        outcome.apply.edges_demoted,
        outcome.apply.rows_failed
    ));
    if outcome.externals_collected > 0 {
        lines.push(format!(
            "Collected {} orphaned external entities",
            outcome.externals_collected
        ));
    }
    if !outcome.extraction.issues.is_empty() {
        lines.push(format!(
            "{} files reported parse issues:",
            outcome.extraction.files_with_issues
        ));
        for issue in &outcome.extraction.issues {
            let line = issue
                .line
                .map(|l| format!(":{l}"))
                .unwrap_or_default();
            lines.push(format!("  {}{}: {}", issue.file.display(), line, issue.message));
        }
    }
    Ok(lines.join("\n"))
}

/// Run a one-shot read query.
fn execute_query(
    config_path: Option<&Path>,
    query: &str,
    format: OutputFormat,
    limit: Option<usize>,
) -> Result<String, CodegraphError> {
    let config = load_config(config_path)?;
    let store = GraphStore::open(&config.store_path(), &config.database)?;
    let mut rows = store.query(query, &[])?;
    if let Some(limit) = limit {
        rows.rows.truncate(limit);
    }
    Ok(render_rows(&rows, format))
}

/// Print counts per kind plus store health.
fn execute_status(config_path: Option<&Path>) -> Result<String, CodegraphError> {
    let config = load_config(config_path)?;
    let store_path = config.store_path();
    if !store_path.exists() {
        return Ok(format!(
            "No store at {} (run `codegraph init` first)",
            store_path.display()
        ));
    }
    let store = GraphStore::open(&store_path, &config.database)?;

    let mut lines = vec![format!("Store: {}", store_path.display())];
    lines.push("Entities:".to_string());
    for (kind, count) in store.kind_counts()? {
        if count > 0 {
            lines.push(format!("  {kind:<20} {count}"));
        }
    }
    lines.push("Relationships:".to_string());
    for (kind, count) in store.relation_counts()? {
        if count > 0 {
            lines.push(format!("  {kind:<30} {count}"));
        }
    }
    let tracked = store.stored_file_hashes()?.len();
    lines.push(format!("Tracked files: {tracked}"));
    Ok(lines.join("\n"))
}

/// Delete the store directory and the journal.
fn execute_reset(config_path: Option<&Path>) -> Result<String, CodegraphError> {
    let config = load_config(config_path)?;
    let store_path = config.store_path();
    let data_dir = store_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if data_dir.exists() {
        std::fs::remove_dir_all(&data_dir).map_err(|e| CodegraphError::io(&data_dir, e))?;
        Ok(format!("Removed {}", data_dir.display()))
    } else {
        Ok(format!("Nothing to remove at {}", data_dir.display()))
    }
}

fn render_rows(rows: &QueryRows, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => render_table(rows),
        OutputFormat::Json => render_json(rows),
        OutputFormat::Csv => render_csv(rows),
    }
}

fn render_table(rows: &QueryRows) -> String {
    let cols = rows.columns.len();
    let mut widths: Vec<usize> = rows.columns.iter().map(String::len).collect();
    for row in &rows.rows {
        for (i, cell) in row.iter().enumerate().take(cols) {
            if cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }

    let sep = {
        let mut s = String::from("+");
        for w in &widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    };
    let line = |cells: &[String]| {
        let mut s = String::from("|");
        for (i, w) in widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            s.push_str(&format!(" {cell:<width$} |", width = *w));
        }
        s
    };

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&line(&rows.columns));
    out.push('\n');
    out.push_str(&sep);
    for row in &rows.rows {
        out.push('\n');
        out.push_str(&line(row));
    }
    out.push('\n');
    out.push_str(&sep);
    out.push_str(&format!("\n{} row(s)", rows.rows.len()));
    out
}

fn render_json(rows: &QueryRows) -> String {
    let objects: Vec<serde_json::Value> = rows
        .rows
        .iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            for (i, column) in rows.columns.iter().enumerate() {
                object.insert(
                    column.clone(),
                    serde_json::Value::String(row.get(i).cloned().unwrap_or_default()),
                );
            }
            serde_json::Value::Object(object)
        })
        .collect();
    serde_json::to_string_pretty(&objects).unwrap_or_else(|_| "[]".to_string())
}

fn render_csv(rows: &QueryRows) -> String {
    let escape = |cell: &str| {
        if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
            format!("\"{}\"", cell.replace('"', "\"\""))
        } else {
            cell.to_string()
        }
    };
    let mut out = rows
        .columns
        .iter()
        .map(|c| escape(c))
        .collect::<Vec<_>>()
        .join(",");
    for row in &rows.rows {
        out.push('\n');
        out.push_str(
            &row.iter()
                .map(|c| escape(c))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    out
}
