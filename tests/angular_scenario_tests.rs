//! Framework-decorator scenarios: rekinding and side-file resolution.

use codegraph::config::CodegraphConfig;
use codegraph::extract::{ExtractionDelta, Extractor};
use codegraph::model::{EntityKind, RelationKind};
use std::path::{Path, PathBuf};

const COMPONENT_TS: &str = r#"import { Component } from '@angular/core';

@Component({
  selector: 'app-x',
  templateUrl: './x.component.html',
  styleUrls: ['./x.component.scss'],
})
export class X {
  render(): void {}
}
"#;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

fn extract(root: &Path) -> ExtractionDelta {
    let config = CodegraphConfig::with_root(root);
    Extractor::new(&config).extract_tree(root).unwrap()
}

fn edge_targets(delta: &ExtractionDelta, kind: RelationKind) -> Vec<String> {
    let names: std::collections::HashMap<_, _> = delta
        .files
        .iter()
        .flat_map(|f| f.entities.iter())
        .chain(delta.externals.iter())
        .map(|e| (e.id.clone(), e.name.clone()))
        .collect();
    delta
        .files
        .iter()
        .flat_map(|f| f.edges.iter())
        .filter(|e| e.kind == kind)
        .filter_map(|e| names.get(&e.target).cloned())
        .collect()
}

#[test]
fn scenario_c_component_with_side_files() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "x.component.ts", COMPONENT_TS);
    write(tmp.path(), "x.component.html", "<p>{{ title }}</p>\n");
    write(tmp.path(), "x.component.scss", ".x { color: red; }\n");
    let delta = extract(tmp.path());

    // Exactly one Component named X, no plain Class shadow.
    let components: Vec<_> = delta
        .files
        .iter()
        .flat_map(|f| f.entities.iter())
        .filter(|e| e.kind == EntityKind::Component)
        .collect();
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].name, "X");
    assert!(delta
        .files
        .iter()
        .flat_map(|f| f.entities.iter())
        .all(|e| e.kind != EntityKind::Class));

    // Edges resolved to the sibling File entities.
    assert_eq!(
        edge_targets(&delta, RelationKind::UsesTemplate),
        vec!["x.component.html".to_string()]
    );
    assert_eq!(
        edge_targets(&delta, RelationKind::UsesStyles),
        vec!["x.component.scss".to_string()]
    );
}

#[test]
fn absent_side_file_drops_the_edge() {
    // Property: when the template is absent the edge is dropped, not
    // demoted to an External.
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "x.component.ts", COMPONENT_TS);
    // Only the stylesheet exists on disk.
    write(tmp.path(), "x.component.scss", ".x {}\n");
    let delta = extract(tmp.path());

    assert!(edge_targets(&delta, RelationKind::UsesTemplate).is_empty());
    assert_eq!(
        edge_targets(&delta, RelationKind::UsesStyles),
        vec!["x.component.scss".to_string()]
    );
    assert_eq!(delta.report.dropped_framework_edges, 1);
    // The missing template produced no External placeholder.
    assert!(delta.externals.iter().all(|e| !e.name.contains("html")));
}

#[test]
fn rekind_is_idempotent_across_runs() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "x.component.ts", COMPONENT_TS);
    write(tmp.path(), "x.component.html", "<p></p>\n");
    write(tmp.path(), "x.component.scss", ".x {}\n");

    let first = extract(tmp.path());
    let second = extract(tmp.path());

    let component_ids = |delta: &ExtractionDelta| {
        delta
            .files
            .iter()
            .flat_map(|f| f.entities.iter())
            .filter(|e| e.kind == EntityKind::Component)
            .map(|e| e.id.to_string())
            .collect::<Vec<_>>()
    };
    assert_eq!(component_ids(&first), component_ids(&second));
    assert_eq!(component_ids(&first).len(), 1);
}

#[test]
fn service_and_module_decorators_rekind() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "data.service.ts",
        "import { Injectable } from '@angular/core';\n\n@Injectable({ providedIn: 'root' })\nexport class DataService {}\n",
    );
    write(
        tmp.path(),
        "app.module.ts",
        "import { NgModule } from '@angular/core';\n\n@NgModule({})\nexport class AppModule {}\n",
    );
    let delta = extract(tmp.path());

    let kinds: Vec<_> = delta
        .files
        .iter()
        .flat_map(|f| f.entities.iter())
        .filter(|e| e.kind == EntityKind::Service || e.kind == EntityKind::NgModule)
        .map(|e| (e.kind, e.name.clone()))
        .collect();
    assert!(kinds.contains(&(EntityKind::Service, "DataService".to_string())));
    assert!(kinds.contains(&(EntityKind::NgModule, "AppModule".to_string())));
}
