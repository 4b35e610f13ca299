//! End-to-end extraction scenarios at the driver level (no store).

use codegraph::config::CodegraphConfig;
use codegraph::extract::{ExtractionDelta, Extractor};
use codegraph::model::{Edge, Entity, EntityId, EntityKind, RelationKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

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

fn entities(delta: &ExtractionDelta) -> Vec<&Entity> {
    delta
        .files
        .iter()
        .flat_map(|f| f.entities.iter())
        .chain(delta.externals.iter())
        .collect()
}

fn edges(delta: &ExtractionDelta) -> Vec<&Edge> {
    delta.files.iter().flat_map(|f| f.edges.iter()).collect()
}

fn names_by_id(delta: &ExtractionDelta) -> HashMap<EntityId, (EntityKind, String)> {
    entities(delta)
        .into_iter()
        .map(|e| (e.id.clone(), (e.kind, e.name.clone())))
        .collect()
}

/// Assert an edge exists by kind and endpoint names.
fn has_edge(delta: &ExtractionDelta, kind: RelationKind, source: &str, target: &str) -> bool {
    let names = names_by_id(delta);
    edges(delta).iter().any(|e| {
        e.kind == kind
            && names.get(&e.source).map(|(_, n)| n.as_str()) == Some(source)
            && names.get(&e.target).map(|(_, n)| n.as_str()) == Some(target)
    })
}

#[test]
fn scenario_a_simple_call_graph() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "a.py", "import b\n\ndef f():\n    g()\n");
    write(tmp.path(), "b.py", "def g():\n    pass\n");
    let delta = extract(tmp.path());

    let files: Vec<_> = entities(&delta)
        .into_iter()
        .filter(|e| e.kind == EntityKind::File)
        .map(|e| e.name.clone())
        .collect();
    assert_eq!(files.len(), 2);
    assert!(files.contains(&"a.py".to_string()));
    assert!(files.contains(&"b.py".to_string()));

    let functions: Vec<_> = entities(&delta)
        .into_iter()
        .filter(|e| e.kind == EntityKind::Function)
        .map(|e| e.name.clone())
        .collect();
    assert!(functions.contains(&"f".to_string()));
    assert!(functions.contains(&"g".to_string()));

    assert!(has_edge(&delta, RelationKind::FileContainsFunction, "a.py", "f"));
    assert!(has_edge(&delta, RelationKind::FileContainsFunction, "b.py", "g"));
    assert!(has_edge(&delta, RelationKind::FileContainsImport, "a.py", "b"));
    assert!(has_edge(&delta, RelationKind::Imports, "b", "b.py"));
    assert!(has_edge(&delta, RelationKind::Calls, "f", "g"));

    // Nothing here references the outside world.
    assert!(delta.externals.is_empty());
}

#[test]
fn scenario_b_inheritance_across_files() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "base.ts", "export class Base {}\n");
    write(
        tmp.path(),
        "child.ts",
        "import { Base } from './base';\nexport class Child extends Base {}\n",
    );
    let delta = extract(tmp.path());

    assert!(has_edge(&delta, RelationKind::Inherits, "Child", "Base"));
    assert!(has_edge(&delta, RelationKind::FileContainsClass, "base.ts", "Base"));
    assert!(has_edge(&delta, RelationKind::FileContainsClass, "child.ts", "Child"));
    assert!(has_edge(&delta, RelationKind::Imports, "Base", "base.ts"));
    // Resolved through the registry, so no External stand-in for Base.
    assert!(delta.externals.is_empty());
}

#[test]
fn scenario_f_external_collapsing() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "one.py",
        "import numpy as np\n\ndef use_one():\n    np.array([1])\n",
    );
    write(
        tmp.path(),
        "two.py",
        "import numpy as np\n\ndef use_two():\n    np.array([2])\n",
    );
    let delta = extract(tmp.path());

    // Exactly one External entity for numpy.
    let externals: Vec<_> = delta.externals.iter().map(|e| e.name.clone()).collect();
    assert_eq!(externals, vec!["numpy".to_string()]);

    // Two Imports edges point at the same record.
    let numpy_id = delta.externals[0].id.clone();
    let import_edges: Vec<_> = edges(&delta)
        .into_iter()
        .filter(|e| e.kind == RelationKind::Imports && e.target == numpy_id)
        .collect();
    assert_eq!(import_edges.len(), 2);

    // Each caller's enclosing function gets a Uses edge to the record.
    assert!(has_edge(&delta, RelationKind::Uses, "use_one", "numpy"));
    assert!(has_edge(&delta, RelationKind::Uses, "use_two", "numpy"));
}

#[test]
fn scenario_d_resolution_through_import_registry() {
    // The resolution half of scenario D: a call through an imported
    // module name lands on the concrete function in the other file.
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "a.py", "import b\n\ndef f():\n    g()\n");
    write(tmp.path(), "b.py", "def g():\n    pass\n");
    write(tmp.path(), "c.py", "import a\n\ndef h():\n    a.f()\n");
    let delta = extract(tmp.path());

    assert!(has_edge(&delta, RelationKind::Calls, "h", "f"));
}

#[test]
fn containment_forms_a_forest_rooted_at_files() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "app.py",
        "import os\n\nTOP = 1\n\nclass A:\n    y = 2\n\n    def m(self):\n        def inner():\n            pass\n        inner()\n\ndef f():\n    pass\n",
    );
    write(
        tmp.path(),
        "lib.ts",
        "export class C {\n  field: number = 0;\n  run(): void {}\n}\nexport const go = () => 1;\n",
    );
    let delta = extract(tmp.path());

    let ids: HashMap<EntityId, (EntityKind, String)> = names_by_id(&delta);
    let mut parent_count: HashMap<EntityId, usize> = HashMap::new();
    for edge in edges(&delta) {
        if edge.kind.is_containment() {
            *parent_count.entry(edge.target.clone()).or_default() += 1;
        }
    }

    for (id, (kind, name)) in &ids {
        match kind {
            EntityKind::File | EntityKind::External => {
                assert_eq!(
                    parent_count.get(id),
                    None,
                    "{name} should have no container"
                );
            }
            _ => {
                assert_eq!(
                    parent_count.get(id),
                    Some(&1),
                    "{} '{name}' should have exactly one container",
                    kind.as_str()
                );
            }
        }
    }
}

#[test]
fn endpoint_closure_over_the_delta() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "m.py",
        "import requests\n\ndef fetch():\n    requests.get('http://x')\n    helper()\n\ndef helper():\n    pass\n",
    );
    let delta = extract(tmp.path());

    let known: std::collections::HashSet<EntityId> =
        entities(&delta).into_iter().map(|e| e.id.clone()).collect();
    for edge in edges(&delta) {
        assert!(known.contains(&edge.source), "dangling source");
        assert!(known.contains(&edge.target), "dangling target");
    }
}

#[test]
fn identity_determinism_across_cold_runs() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "mod.py",
        "class K:\n    def m(self):\n        pass\n\ndef f():\n    pass\n",
    );

    let first = extract(tmp.path());
    let second = extract(tmp.path());

    let ids = |delta: &ExtractionDelta| {
        let mut v: Vec<String> = entities(delta).iter().map(|e| e.id.to_string()).collect();
        v.sort();
        v
    };
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn property_only_edit_preserves_sibling_identities() {
    // Editing one file must not disturb identities in another.
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "stable.py", "def keep():\n    pass\n");
    write(tmp.path(), "volatile.py", "def v1():\n    pass\n");

    let before = extract(tmp.path());
    write(tmp.path(), "volatile.py", "def v2():\n    pass\n");
    let after = extract(tmp.path());

    let stable_ids = |delta: &ExtractionDelta| {
        let mut v: Vec<String> = entities(delta)
            .into_iter()
            .filter(|e| e.file_path.ends_with("stable.py"))
            .map(|e| e.id.to_string())
            .collect();
        v.sort();
        v
    };
    assert_eq!(stable_ids(&before), stable_ids(&after));
}

#[test]
fn parse_errors_never_abort_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "ok.py", "def fine():\n    pass\n");
    write(tmp.path(), "broken.py", "def broken(:\n");
    let delta = extract(tmp.path());

    assert_eq!(delta.files.len(), 2);
    assert!(delta.report.files_with_issues >= 1);
    // Both File entities exist regardless.
    let files: Vec<_> = entities(&delta)
        .into_iter()
        .filter(|e| e.kind == EntityKind::File)
        .collect();
    assert_eq!(files.len(), 2);
}

#[test]
fn oversized_file_keeps_its_file_entity() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "big.py", &format!("# {}\n", "x".repeat(64)));

    let mut config = CodegraphConfig::with_root(tmp.path());
    config.parsing.max_file_size = 16;
    let delta = Extractor::new(&config).extract_tree(tmp.path()).unwrap();

    assert_eq!(delta.files.len(), 1);
    assert_eq!(delta.files[0].entities.len(), 1);
    assert_eq!(delta.files[0].entities[0].kind, EntityKind::File);
    assert!(!delta.files[0].issues.is_empty());
}
