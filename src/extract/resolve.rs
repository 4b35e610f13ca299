//! Pass 2: pending-edge resolution.
//!
//! A pure function over the frozen symbol registry and one file's pending
//! edges. Every pending edge either resolves to a concrete target identity
//! or is demoted to an edge targeting an interned External placeholder; no
//! new entities are created here except those placeholders. The single
//! exception is framework side-file edges (UsesTemplate/UsesStyles), which
//! are dropped, not demoted, when the side-file is absent.

use crate::model::identity::{external_id, sanitize_external_name};
use crate::model::{
    Edge, Entity, EntityId, EntityKind, FileParse, ImportAlias, PendingEdge, PendingTarget,
    PropKey, PropValue, PropertyBag, RelationKind,
};
use crate::registry::SymbolRegistry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Interner for External placeholders. Scoped per pass-2 worker; the
/// driver merges the maps by identity afterwards, which is what collapses
/// two references to the same external name into one entity.
#[derive(Debug, Default)]
pub struct Externals {
    map: HashMap<EntityId, Entity>,
}

impl Externals {
    /// Intern a raw external name, returning its placeholder identity.
    pub fn intern(&mut self, raw_name: &str) -> (EntityId, EntityKind) {
        let name = sanitize_external_name(raw_name);
        let id = external_id(&name);
        self.map.entry(id.clone()).or_insert_with(|| Entity {
            id: id.clone(),
            kind: EntityKind::External,
            name,
            file_path: PathBuf::new(),
            line_start: 0,
            line_end: 0,
            props: PropertyBag::new(),
        });
        (id, EntityKind::External)
    }

    /// Drain the interned placeholders.
    pub fn into_entities(self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.map.into_values().collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }
}

/// Resolution outcome for one file.
pub struct ResolvedFile {
    /// Final edges for this file.
    pub edges: Vec<Edge>,
    /// Framework edges dropped because the side-file was absent.
    pub dropped_framework_edges: usize,
}

/// Resolve every pending edge of one file against the registry.
pub fn resolve_file(
    registry: &SymbolRegistry,
    source_roots: &[PathBuf],
    parse: &FileParse,
    externals: &mut Externals,
) -> ResolvedFile {
    let resolver = FileResolver {
        registry,
        source_roots,
        parse,
        dir: parse
            .file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };

    let mut edges = Vec::with_capacity(parse.pending.len());
    let mut dropped = 0;
    for pending in &parse.pending {
        match resolver.resolve_edge(pending, externals) {
            Outcome::Edge(edge) => edges.push(edge),
            Outcome::DroppedFramework => dropped += 1,
            Outcome::Dropped => {}
        }
    }
    ResolvedFile {
        edges,
        dropped_framework_edges: dropped,
    }
}

enum Outcome {
    Edge(Edge),
    /// UsesTemplate/UsesStyles whose side-file is not on disk.
    DroppedFramework,
    /// Unresolvable edges with no External to stand in (rare).
    Dropped,
}

struct FileResolver<'a> {
    registry: &'a SymbolRegistry,
    source_roots: &'a [PathBuf],
    parse: &'a FileParse,
    dir: PathBuf,
}

impl<'a> FileResolver<'a> {
    fn resolve_edge(&self, pending: &PendingEdge, externals: &mut Externals) -> Outcome {
        let mut props = pending.props.clone();

        // Source endpoint: known for everything except Decorates.
        let (source, source_kind) = match &pending.source {
            PendingTarget::Entity { id, kind } => (id.clone(), *kind),
            PendingTarget::Name { head, access_path } => {
                let full = join_path(head, access_path);
                match self.resolve_name_chain(head, access_path, &mut props) {
                    Some(resolved) => resolved,
                    None => externals.intern(&full),
                }
            }
            _ => return Outcome::Dropped,
        };

        match &pending.target {
            PendingTarget::Entity { id, kind } => {
                let edge_kind = adjust_resolved_kind(pending.kind, source_kind, *kind, &mut props);
                Outcome::Edge(Edge {
                    kind: edge_kind,
                    source,
                    source_kind,
                    target: id.clone(),
                    target_kind: *kind,
                    props,
                })
            }

            PendingTarget::Module { specifier } => {
                match self
                    .registry
                    .resolve_module(&self.dir, specifier, self.source_roots)
                {
                    Some((file_id, resolved_path)) => {
                        props.insert(
                            PropKey::ResolvedPath,
                            PropValue::Str(resolved_path.to_string_lossy().into_owned()),
                        );
                        Outcome::Edge(Edge {
                            kind: pending.kind,
                            source,
                            source_kind,
                            target: file_id,
                            target_kind: EntityKind::File,
                            props,
                        })
                    }
                    None => {
                        let (target, target_kind) = externals.intern(specifier);
                        Outcome::Edge(Edge {
                            kind: pending.kind,
                            source,
                            source_kind,
                            target,
                            target_kind,
                            props,
                        })
                    }
                }
            }

            PendingTarget::Template { path } => {
                match self.registry.resolve_template(&self.dir, path) {
                    Some((file_id, resolved_path)) => {
                        props.insert(
                            PropKey::ResolvedPath,
                            PropValue::Str(resolved_path.to_string_lossy().into_owned()),
                        );
                        Outcome::Edge(Edge {
                            kind: pending.kind,
                            source,
                            source_kind,
                            target: file_id,
                            target_kind: EntityKind::File,
                            props,
                        })
                    }
                    // Absent side-files drop the edge; an External would
                    // claim a file that simply is not there.
                    None => Outcome::DroppedFramework,
                }
            }

            PendingTarget::Style { path } => match self.registry.resolve_style(&self.dir, path) {
                Some((file_id, resolved_path)) => {
                    props.insert(
                        PropKey::ResolvedPath,
                        PropValue::Str(resolved_path.to_string_lossy().into_owned()),
                    );
                    Outcome::Edge(Edge {
                        kind: pending.kind,
                        source,
                        source_kind,
                        target: file_id,
                        target_kind: EntityKind::File,
                        props,
                    })
                }
                None => Outcome::DroppedFramework,
            },

            PendingTarget::Name { head, access_path } => {
                match self.resolve_name_chain(head, access_path, &mut props) {
                    Some((target, target_kind)) => {
                        let edge_kind =
                            adjust_resolved_kind(pending.kind, source_kind, target_kind, &mut props);
                        Outcome::Edge(Edge {
                            kind: edge_kind,
                            source,
                            source_kind,
                            target,
                            target_kind,
                            props,
                        })
                    }
                    None => {
                        // Resolution miss: demote to External. A reference
                        // that went through an import alias interns the
                        // module's name so all uses collapse to one record.
                        let (external_name, via_import) = match self.parse.import_aliases.get(head)
                        {
                            Some(alias) => (alias.specifier.clone(), true),
                            None => (join_path(head, access_path), false),
                        };
                        let (target, target_kind) = externals.intern(&external_name);
                        let edge_kind = adjust_external_kind(pending.kind, via_import, &mut props);
                        Outcome::Edge(Edge {
                            kind: edge_kind,
                            source,
                            source_kind,
                            target,
                            target_kind,
                            props,
                        })
                    }
                }
            }
        }
    }

    /// Resolve a name reference: import aliases, then the file's own
    /// addressable names, then the cross-file fallback. Returns the
    /// resolved entity and records the remaining access path on the edge.
    fn resolve_name_chain(
        &self,
        head: &str,
        access_path: &Option<String>,
        props: &mut PropertyBag,
    ) -> Option<(EntityId, EntityKind)> {
        // 1. Import aliases: the head names a binding from another module.
        if let Some(alias) = self.parse.import_aliases.get(head) {
            return self.resolve_through_import(alias, access_path, props);
        }

        // 2. File-level names (covers forward references pass 1 missed).
        if let Some(found) = self.registry.resolve_in_file(&self.parse.file_path, head) {
            record_access_path(props, access_path);
            return Some(found);
        }

        // 3. Cross-file fallback by simple name.
        if let Some(found) = self.registry.resolve_name(&self.parse.file_path, head) {
            record_access_path(props, access_path);
            return Some(found);
        }

        None
    }

    fn resolve_through_import(
        &self,
        alias: &ImportAlias,
        access_path: &Option<String>,
        props: &mut PropertyBag,
    ) -> Option<(EntityId, EntityKind)> {
        let (file_id, file_path) =
            self.registry
                .resolve_module(&self.dir, &alias.specifier, self.source_roots)?;

        match &alias.member {
            // `from m import a` / `import { a } from './m'`: the binding
            // is the member itself.
            Some(member) if member != "default" => {
                match self.registry.resolve_in_file(&file_path, member) {
                    Some(found) => {
                        record_access_path(props, access_path);
                        Some(found)
                    }
                    None => None,
                }
            }
            // Default imports resolve to the file when the symbol itself
            // cannot be named.
            Some(_) => {
                record_access_path(props, access_path);
                Some((file_id, EntityKind::File))
            }
            // `import m` / `import * as m`: the first path segment selects
            // the member inside the module.
            None => match access_path {
                Some(path) => {
                    let (member, rest) = match path.split_once('.') {
                        Some((m, rest)) => (m, Some(rest.to_string())),
                        None => (path.as_str(), None),
                    };
                    match self.registry.resolve_in_file(&file_path, member) {
                        Some(found) => {
                            record_access_path(props, &rest);
                            Some(found)
                        }
                        None => None,
                    }
                }
                None => Some((file_id, EntityKind::File)),
            },
        }
    }
}

fn record_access_path(props: &mut PropertyBag, access_path: &Option<String>) {
    if let Some(path) = access_path {
        props
            .entry(PropKey::PropertyPath)
            .or_insert_with(|| PropValue::Str(path.clone()));
    }
}

fn join_path(head: &str, access_path: &Option<String>) -> String {
    match access_path {
        Some(path) => format!("{head}.{path}"),
        None => head.to_string(),
    }
}

/// Adjust an edge kind once its target resolved to a project entity.
///
/// Calls to non-callables become Uses; attribute accesses that landed on a
/// declared entity become Uses as well (Accesses is reserved for property
/// paths on Externals). Extends between two class-like entities is the
/// inheritance relation.
fn adjust_resolved_kind(
    kind: RelationKind,
    _source_kind: EntityKind,
    target_kind: EntityKind,
    props: &mut PropertyBag,
) -> RelationKind {
    match kind {
        RelationKind::Calls if !target_kind.is_callable() => {
            let usage = if target_kind.is_class_like() {
                "instantiation"
            } else {
                "call"
            };
            props.insert(PropKey::UsageType, PropValue::Str(usage.to_string()));
            RelationKind::Uses
        }
        RelationKind::Accesses if target_kind != EntityKind::External => {
            props.insert(
                PropKey::UsageType,
                PropValue::Str("attribute_access".to_string()),
            );
            RelationKind::Uses
        }
        RelationKind::Extends if target_kind.is_class_like() => RelationKind::Inherits,
        other => other,
    }
}

/// Adjust an edge kind once its target demoted to an External.
fn adjust_external_kind(
    kind: RelationKind,
    via_import: bool,
    props: &mut PropertyBag,
) -> RelationKind {
    match kind {
        // A call through an imported external module is a use of that
        // module, not a call edge to nowhere.
        RelationKind::Calls if via_import => {
            props.insert(
                PropKey::UsageType,
                PropValue::Str("external_call".to_string()),
            );
            RelationKind::Uses
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn externals_collapse_by_name() {
        let mut externals = Externals::default();
        let (a, _) = externals.intern("numpy");
        let (b, _) = externals.intern("numpy");
        assert_eq!(a, b);
        assert_eq!(externals.into_entities().len(), 1);
    }

    #[test]
    fn long_external_names_stay_distinct() {
        let mut externals = Externals::default();
        let long: String = "chart.axis.scale.".repeat(12);
        let (a, _) = externals.intern(&long);
        let (b, _) = externals.intern(&format!("{long}tail"));
        assert_ne!(a, b);
        let entities = externals.into_entities();
        assert_eq!(entities.len(), 2);
        for entity in entities {
            assert!(entity.name.len() <= 99);
        }
    }

    #[test]
    fn calls_to_class_become_instantiation_uses() {
        let mut props = PropertyBag::new();
        let kind = adjust_resolved_kind(
            RelationKind::Calls,
            EntityKind::Function,
            EntityKind::Class,
            &mut props,
        );
        assert_eq!(kind, RelationKind::Uses);
        assert_eq!(
            props.get(&PropKey::UsageType),
            Some(&PropValue::Str("instantiation".to_string()))
        );
    }

    #[test]
    fn extends_between_classes_is_inheritance() {
        let mut props = PropertyBag::new();
        assert_eq!(
            adjust_resolved_kind(
                RelationKind::Extends,
                EntityKind::Class,
                EntityKind::Class,
                &mut props
            ),
            RelationKind::Inherits
        );
        assert_eq!(
            adjust_resolved_kind(
                RelationKind::Extends,
                EntityKind::Interface,
                EntityKind::Interface,
                &mut props
            ),
            RelationKind::Extends
        );
    }
}
