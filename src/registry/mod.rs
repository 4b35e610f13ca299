//! Run-scoped symbol registry.
//!
//! Populated during pass 1 (batched inserts at file granularity, under the
//! driver's write lock) and read-only during pass 2. Keys cover the lookup
//! contexts resolution needs: absolute file paths and import-specifier
//! candidates, exported names per file, template/style side-files by both
//! absolute path and filename, class members, and a global simple-name
//! bucket for the cross-file fallback.
//!
//! Collision policy: when several entities answer the same lookup the
//! winner is chosen by same-file, then same-directory, then shortest
//! relative path, then lexicographic file path. The order is total, so
//! resolution does not depend on scheduling order.

use crate::model::{EntityId, EntityKind, FileParse, PendingTarget, RelationKind};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Extensions probed, in order, when an import specifier omits one.
const RESOLVE_EXTENSIONS: &[&str] = &["py", "ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Index-file names probed when a specifier points at a directory.
const INDEX_FILES: &[&str] = &[
    "index.ts",
    "index.tsx",
    "index.js",
    "index.jsx",
    "__init__.py",
];

/// A candidate answer for a name lookup.
#[derive(Debug, Clone)]
struct Candidate {
    file: PathBuf,
    id: EntityId,
    kind: EntityKind,
}

/// In-memory index of addressable symbols for one extraction run.
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    /// Absolute file path → File entity id.
    files: HashMap<PathBuf, EntityId>,
    /// `template:<filename>` form for markup side-files.
    templates_by_name: HashMap<String, Vec<(PathBuf, EntityId)>>,
    /// `style:<filename>` form for stylesheet side-files.
    styles_by_name: HashMap<String, Vec<(PathBuf, EntityId)>>,
    /// (file path, name) → entity, covering file-scope names and exports.
    file_scope: HashMap<(PathBuf, String), (EntityId, EntityKind)>,
    /// (class id, member name) → entity.
    members: HashMap<(EntityId, String), (EntityId, EntityKind)>,
    /// Simple-name buckets for the cross-file fallback.
    by_name: HashMap<String, Vec<Candidate>>,
}

impl SymbolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        SymbolRegistry::default()
    }

    /// Number of distinct files registered.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Insert everything one file parse declared. Called once per file,
    /// which is the lock-batching granularity.
    pub fn insert_file(&mut self, parse: &FileParse) {
        let path = parse.file_path.clone();
        self.files.insert(path.clone(), parse.file_id.clone());

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            match path.extension().and_then(|e| e.to_str()) {
                Some("html" | "htm") => self
                    .templates_by_name
                    .entry(name.to_string())
                    .or_default()
                    .push((path.clone(), parse.file_id.clone())),
                Some("css" | "scss" | "sass") => self
                    .styles_by_name
                    .entry(name.to_string())
                    .or_default()
                    .push((path.clone(), parse.file_id.clone())),
                _ => {}
            }
        }

        for (name, (id, kind)) in &parse.local_names {
            self.file_scope
                .insert((path.clone(), name.clone()), (id.clone(), *kind));
            self.by_name
                .entry(name.clone())
                .or_default()
                .push(Candidate {
                    file: path.clone(),
                    id: id.clone(),
                    kind: *kind,
                });
        }
        for (name, id, kind) in &parse.exports {
            self.file_scope
                .insert((path.clone(), name.clone()), (id.clone(), *kind));
        }

        // Class member keys come from the containment edges: the entities
        // on both sides are known by the end of the file's pass 1.
        let names: HashMap<&EntityId, &str> = parse
            .entities
            .iter()
            .map(|e| (&e.id, e.name.as_str()))
            .collect();
        for edge in &parse.pending {
            if !matches!(
                edge.kind,
                RelationKind::ClassContainsFunction | RelationKind::ClassContainsVariable
            ) {
                continue;
            }
            if let (
                PendingTarget::Entity { id: class_id, .. },
                PendingTarget::Entity { id, kind },
            ) = (&edge.source, &edge.target)
            {
                if let Some(name) = names.get(id) {
                    self.members.insert(
                        (class_id.clone(), (*name).to_string()),
                        (id.clone(), *kind),
                    );
                }
            }
        }
    }

    // ---- lookups (pass 2) ----

    /// Resolve an import specifier from the importer's directory.
    ///
    /// Walks candidate absolute paths derived from the specifier: relative
    /// forms join the importer's directory, bare forms additionally try
    /// each configured source root. Extension-less candidates probe the
    /// known extensions and directory index entries. First hit wins.
    pub fn resolve_module(
        &self,
        importer_dir: &Path,
        specifier: &str,
        source_roots: &[PathBuf],
    ) -> Option<(EntityId, PathBuf)> {
        if specifier.is_empty() {
            return None;
        }

        let mut bases: Vec<PathBuf> = Vec::new();
        if specifier.starts_with('.') {
            if specifier.contains('/') {
                // JS-style relative: `./foo`, `../bar/baz`.
                bases.push(normalize(&importer_dir.join(specifier)));
            } else {
                // Python-style relative: `.mod`, `..pkg.mod`. One leading
                // dot is the current package, each further dot walks up.
                let dots = specifier.chars().take_while(|c| *c == '.').count();
                let rest = &specifier[dots..];
                let mut dir = importer_dir.to_path_buf();
                for _ in 1..dots {
                    dir.pop();
                }
                if rest.is_empty() {
                    bases.push(normalize(&dir));
                } else {
                    bases.push(normalize(&dir.join(rest.replace('.', "/"))));
                }
            }
        } else {
            // Bare specifier: Python dots address a path, JS specifiers
            // already use slashes. Siblings first, then the source roots.
            let relative: PathBuf = if specifier.contains('/') {
                PathBuf::from(specifier)
            } else {
                PathBuf::from(specifier.replace('.', "/"))
            };
            bases.push(normalize(&importer_dir.join(&relative)));
            for root in source_roots {
                bases.push(normalize(&root.join(&relative)));
            }
        }

        for base in bases {
            if let Some(id) = self.files.get(&base) {
                return Some((id.clone(), base));
            }
            for ext in RESOLVE_EXTENSIONS {
                let candidate = base.with_extension(ext);
                if let Some(id) = self.files.get(&candidate) {
                    return Some((id.clone(), candidate));
                }
            }
            for index in INDEX_FILES {
                let candidate = base.join(index);
                if let Some(id) = self.files.get(&candidate) {
                    return Some((id.clone(), candidate));
                }
            }
        }
        None
    }

    /// Resolve an exported (or file-scope) name inside a specific file.
    pub fn resolve_in_file(&self, file: &Path, name: &str) -> Option<(EntityId, EntityKind)> {
        self.file_scope
            .get(&(file.to_path_buf(), name.to_string()))
            .cloned()
    }

    /// Resolve a class member.
    pub fn resolve_member(&self, class_id: &EntityId, name: &str) -> Option<(EntityId, EntityKind)> {
        self.members
            .get(&(class_id.clone(), name.to_string()))
            .cloned()
    }

    /// Cross-file fallback by simple name, applying the collision policy
    /// from the perspective of `referencing_file`.
    pub fn resolve_name(
        &self,
        referencing_file: &Path,
        name: &str,
    ) -> Option<(EntityId, EntityKind)> {
        let candidates = self.by_name.get(name)?;
        let winner = pick_candidate(referencing_file, candidates)?;
        Some((winner.id.clone(), winner.kind))
    }

    /// Resolve a template path expression: absolute form first, then the
    /// filename form with the collision policy.
    pub fn resolve_template(
        &self,
        component_dir: &Path,
        path_expr: &str,
    ) -> Option<(EntityId, PathBuf)> {
        self.resolve_side_file(component_dir, path_expr, &self.templates_by_name)
    }

    /// Resolve a stylesheet path expression the same way.
    pub fn resolve_style(
        &self,
        component_dir: &Path,
        path_expr: &str,
    ) -> Option<(EntityId, PathBuf)> {
        self.resolve_side_file(component_dir, path_expr, &self.styles_by_name)
    }

    fn resolve_side_file(
        &self,
        component_dir: &Path,
        path_expr: &str,
        by_name: &HashMap<String, Vec<(PathBuf, EntityId)>>,
    ) -> Option<(EntityId, PathBuf)> {
        // Absolute form: the path expression resolved against the
        // component's directory.
        let absolute = if Path::new(path_expr).is_absolute() {
            normalize(Path::new(path_expr))
        } else {
            normalize(&component_dir.join(path_expr))
        };
        if let Some(id) = self.files.get(&absolute) {
            return Some((id.clone(), absolute));
        }

        // Filename form.
        let filename = Path::new(path_expr).file_name()?.to_str()?;
        let entries = by_name.get(filename)?;
        let candidates: Vec<Candidate> = entries
            .iter()
            .map(|(file, id)| Candidate {
                file: file.clone(),
                id: id.clone(),
                kind: EntityKind::File,
            })
            .collect();
        let reference = component_dir.join("_");
        let winner = pick_candidate(&reference, &candidates)?;
        Some((winner.id.clone(), winner.file.clone()))
    }
}

/// Apply the collision policy: same file, then same directory, then
/// shortest relative path, then lexicographic file path.
fn pick_candidate<'a>(referencing_file: &Path, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    let reference_dir = referencing_file.parent().unwrap_or(Path::new(""));
    candidates.iter().min_by_key(|c| {
        let same_file = c.file == referencing_file;
        let same_dir = c.file.parent() == Some(reference_dir);
        (
            !same_file,
            !same_dir,
            relative_distance(reference_dir, &c.file),
            c.file.clone(),
        )
    })
}

/// Number of path components separating `to` from `from_dir`.
fn relative_distance(from_dir: &Path, to: &Path) -> usize {
    let from: Vec<_> = from_dir.components().collect();
    let to_components: Vec<_> = to.components().collect();
    let common = from
        .iter()
        .zip(to_components.iter())
        .take_while(|(a, b)| a == b)
        .count();
    (from.len() - common) + (to_components.len() - common)
}

/// Fold `.`/`..` segments without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<std::ffi::OsString> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
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
    use crate::model::identity::{entity_id, external_id};
    use crate::model::{Entity, PropertyBag};

    fn file_parse(path: &str, names: &[(&str, EntityKind)]) -> FileParse {
        let path = PathBuf::from(path);
        let file = Entity {
            id: entity_id(EntityKind::File, &path, "f", 1, 1),
            kind: EntityKind::File,
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_path: path.clone(),
            line_start: 1,
            line_end: 1,
            props: PropertyBag::new(),
        };
        let mut parse = FileParse::file_only(path.clone(), file, "h".to_string());
        for (name, kind) in names {
            let id = entity_id(*kind, &path, name, 1, 2);
            parse
                .local_names
                .insert((*name).to_string(), (id.clone(), *kind));
            parse.exports.push(((*name).to_string(), id, *kind));
        }
        parse
    }

    #[test]
    fn module_resolution_probes_extensions() {
        let mut registry = SymbolRegistry::new();
        registry.insert_file(&file_parse("/proj/b.py", &[("g", EntityKind::Function)]));

        let hit = registry.resolve_module(Path::new("/proj"), "b", &[]);
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().1, PathBuf::from("/proj/b.py"));
    }

    #[test]
    fn module_resolution_walks_relative_specifiers() {
        let mut registry = SymbolRegistry::new();
        registry.insert_file(&file_parse("/proj/src/base.ts", &[("Base", EntityKind::Class)]));

        let hit = registry.resolve_module(Path::new("/proj/src"), "./base", &[]);
        assert_eq!(hit.unwrap().1, PathBuf::from("/proj/src/base.ts"));

        let miss = registry.resolve_module(Path::new("/proj/src"), "./missing", &[]);
        assert!(miss.is_none());
    }

    #[test]
    fn dotted_python_specifier_uses_source_roots() {
        let mut registry = SymbolRegistry::new();
        registry.insert_file(&file_parse("/proj/pkg/util.py", &[]));

        let hit = registry.resolve_module(
            Path::new("/proj/other"),
            "pkg.util",
            &[PathBuf::from("/proj")],
        );
        assert_eq!(hit.unwrap().1, PathBuf::from("/proj/pkg/util.py"));
    }

    #[test]
    fn name_collision_prefers_same_directory_then_shortest_path() {
        let mut registry = SymbolRegistry::new();
        registry.insert_file(&file_parse("/proj/deep/nested/m.py", &[("f", EntityKind::Function)]));
        registry.insert_file(&file_parse("/proj/here/m2.py", &[("f", EntityKind::Function)]));

        let (id, _) = registry
            .resolve_name(Path::new("/proj/here/caller.py"), "f")
            .unwrap();
        let expected = entity_id(
            EntityKind::Function,
            Path::new("/proj/here/m2.py"),
            "f",
            1,
            2,
        );
        assert_eq!(id, expected);
    }

    #[test]
    fn name_collision_tiebreak_is_deterministic() {
        // Two equally distant candidates: lexicographic path order decides,
        // independent of insertion order.
        let mut forward = SymbolRegistry::new();
        forward.insert_file(&file_parse("/proj/a/m.py", &[("f", EntityKind::Function)]));
        forward.insert_file(&file_parse("/proj/b/m.py", &[("f", EntityKind::Function)]));

        let mut reverse = SymbolRegistry::new();
        reverse.insert_file(&file_parse("/proj/b/m.py", &[("f", EntityKind::Function)]));
        reverse.insert_file(&file_parse("/proj/a/m.py", &[("f", EntityKind::Function)]));

        let reference = Path::new("/proj/c/caller.py");
        assert_eq!(
            forward.resolve_name(reference, "f").unwrap().0,
            reverse.resolve_name(reference, "f").unwrap().0
        );
    }

    #[test]
    fn template_resolution_absolute_form_wins() {
        let mut registry = SymbolRegistry::new();
        registry.insert_file(&file_parse("/proj/app/x.component.html", &[]));
        registry.insert_file(&file_parse("/proj/other/x.component.html", &[]));

        let (_, path) = registry
            .resolve_template(Path::new("/proj/app"), "./x.component.html")
            .unwrap();
        assert_eq!(path, PathBuf::from("/proj/app/x.component.html"));
    }

    #[test]
    fn template_resolution_falls_back_to_filename() {
        let mut registry = SymbolRegistry::new();
        registry.insert_file(&file_parse("/proj/templates/shared.html", &[]));

        let (_, path) = registry
            .resolve_template(Path::new("/proj/app"), "./shared.html")
            .unwrap();
        assert_eq!(path, PathBuf::from("/proj/templates/shared.html"));
    }

    #[test]
    fn member_lookup_by_class_id() {
        let mut registry = SymbolRegistry::new();
        let path = PathBuf::from("/proj/a.py");
        let class_id = entity_id(EntityKind::Class, &path, "a::A", 1, 5);
        let method_id = entity_id(EntityKind::Method, &path, "a::A::m", 2, 3);

        let mut parse = file_parse("/proj/a.py", &[]);
        parse.entities.push(Entity {
            id: method_id.clone(),
            kind: EntityKind::Method,
            name: "m".to_string(),
            file_path: path.clone(),
            line_start: 2,
            line_end: 3,
            props: PropertyBag::new(),
        });
        parse.pending.push(crate::model::PendingEdge::resolved(
            RelationKind::ClassContainsFunction,
            (class_id.clone(), EntityKind::Class),
            (method_id.clone(), EntityKind::Method),
        ));
        registry.insert_file(&parse);

        assert_eq!(
            registry.resolve_member(&class_id, "m"),
            Some((method_id, EntityKind::Method))
        );
        assert_eq!(registry.resolve_member(&external_id("x"), "m"), None);
    }
}
