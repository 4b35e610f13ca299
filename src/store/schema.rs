//! Store schema declarations.
//!
//! One node table per entity kind, one relationship table per relationship
//! kind. The schema is additive on upgrade: new tables and columns may be
//! added, existing columns are never renamed or removed. A probe at store
//! open compares declared tables to existing ones and creates what is
//! missing; missing columns run through the versioned migration step.

use crate::model::{EntityKind, PropKey, RelationKind};

/// Current schema version, bumped on every additive change.
pub const SCHEMA_VERSION: i64 = 1;

/// Column value types the store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// STRING column.
    Str,
    /// INT64 column.
    Int,
    /// BOOLEAN column.
    Bool,
}

impl ColumnType {
    /// DDL type name.
    pub fn ddl(&self) -> &'static str {
        match self {
            ColumnType::Str => "STRING",
            ColumnType::Int => "INT64",
            ColumnType::Bool => "BOOLEAN",
        }
    }
}

/// One property-bag-backed column.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    /// The property key this column persists.
    pub key: PropKey,
    /// Column type.
    pub ctype: ColumnType,
}

const fn col(key: PropKey, ctype: ColumnType) -> Column {
    Column { key, ctype }
}

/// Property columns shared by every callable kind.
const CALLABLE_COLUMNS: &[Column] = &[
    col(PropKey::Docstring, ColumnType::Str),
    col(PropKey::Signature, ColumnType::Str),
    col(PropKey::ReturnType, ColumnType::Str),
    col(PropKey::IsAsync, ColumnType::Bool),
    col(PropKey::IsGenerator, ColumnType::Bool),
    col(PropKey::IsStatic, ColumnType::Bool),
    col(PropKey::IsExported, ColumnType::Bool),
    col(PropKey::Complexity, ColumnType::Int),
];

/// Kind-specific property columns for a node table.
pub fn node_columns(kind: EntityKind) -> &'static [Column] {
    const FILE: &[Column] = &[
        col(PropKey::Path, ColumnType::Str),
        col(PropKey::Extension, ColumnType::Str),
        col(PropKey::Size, ColumnType::Int),
        col(PropKey::Hash, ColumnType::Str),
        col(PropKey::LinesOfCode, ColumnType::Int),
        col(PropKey::Directives, ColumnType::Str),
        col(PropKey::Interpolations, ColumnType::Int),
        col(PropKey::CustomComponents, ColumnType::Str),
        col(PropKey::SelectorCount, ColumnType::Int),
        col(PropKey::RuleCount, ColumnType::Int),
        col(PropKey::ImportCount, ColumnType::Int),
    ];
    const MODULE: &[Column] = &[col(PropKey::Docstring, ColumnType::Str)];
    const CLASS: &[Column] = &[
        col(PropKey::Docstring, ColumnType::Str),
        col(PropKey::IsAbstract, ColumnType::Bool),
        col(PropKey::IsExported, ColumnType::Bool),
    ];
    const IS_EXPORTED_ONLY: &[Column] = &[col(PropKey::IsExported, ColumnType::Bool)];
    const VARIABLE: &[Column] = &[
        col(PropKey::TypeAnnotation, ColumnType::Str),
        col(PropKey::IsConstant, ColumnType::Bool),
        col(PropKey::IsExported, ColumnType::Bool),
    ];
    const IMPORT: &[Column] = &[
        col(PropKey::ModuleName, ColumnType::Str),
        col(PropKey::Alias, ColumnType::Str),
        col(PropKey::IsFromImport, ColumnType::Bool),
    ];
    const COMPONENT: &[Column] = &[
        col(PropKey::Selector, ColumnType::Str),
        col(PropKey::Template, ColumnType::Str),
        col(PropKey::Styles, ColumnType::Str),
        col(PropKey::Standalone, ColumnType::Bool),
        col(PropKey::IsExported, ColumnType::Bool),
    ];
    const SERVICE: &[Column] = &[
        col(PropKey::ProvidedIn, ColumnType::Str),
        col(PropKey::IsExported, ColumnType::Bool),
    ];
    const DIRECTIVE_OR_PIPE: &[Column] = &[
        col(PropKey::Selector, ColumnType::Str),
        col(PropKey::IsExported, ColumnType::Bool),
    ];
    match kind {
        EntityKind::File => FILE,
        EntityKind::Module => MODULE,
        EntityKind::Class => CLASS,
        EntityKind::Interface | EntityKind::TypeAlias | EntityKind::Enum => IS_EXPORTED_ONLY,
        EntityKind::Function
        | EntityKind::Method
        | EntityKind::ArrowFunction
        | EntityKind::GeneratorFunction => CALLABLE_COLUMNS,
        EntityKind::Variable => VARIABLE,
        EntityKind::Import => IMPORT,
        EntityKind::Component => COMPONENT,
        EntityKind::Service => SERVICE,
        EntityKind::Directive | EntityKind::Pipe => DIRECTIVE_OR_PIPE,
        EntityKind::NgModule => IS_EXPORTED_ONLY,
        EntityKind::External => &[],
    }
}

/// Whether the kind carries file/line base columns. File stores its path
/// under `path`; External has neither file nor span.
pub fn has_location_columns(kind: EntityKind) -> bool {
    !matches!(kind, EntityKind::File | EntityKind::External)
}

/// DDL for a node table.
pub fn node_table_ddl(kind: EntityKind) -> String {
    let mut columns = String::from("id STRING, name STRING");
    if has_location_columns(kind) {
        columns.push_str(", file_path STRING, line_start INT64, line_end INT64");
    }
    for column in node_columns(kind) {
        columns.push_str(&format!(", {} {}", column.key.as_str(), column.ctype.ddl()));
    }
    format!(
        "CREATE NODE TABLE IF NOT EXISTS {}({}, PRIMARY KEY (id))",
        kind.as_str(),
        columns
    )
}

/// Declared column names for a node table, in DDL order (without the pk).
pub fn node_column_names(kind: EntityKind) -> Vec<&'static str> {
    let mut names = vec!["name"];
    if has_location_columns(kind) {
        names.extend(["file_path", "line_start", "line_end"]);
    }
    names.extend(node_columns(kind).iter().map(|c| c.key.as_str()));
    names
}

/// Property columns for a relationship table.
pub fn rel_columns(kind: RelationKind) -> &'static [Column] {
    const CALLS: &[Column] = &[
        col(PropKey::CallType, ColumnType::Str),
        col(PropKey::LineNumber, ColumnType::Int),
        col(PropKey::PropertyPath, ColumnType::Str),
    ];
    const USES: &[Column] = &[
        col(PropKey::UsageType, ColumnType::Str),
        col(PropKey::LineNumber, ColumnType::Int),
        col(PropKey::PropertyPath, ColumnType::Str),
        col(PropKey::AccessLocation, ColumnType::Int),
    ];
    const ACCESSES: &[Column] = &[
        col(PropKey::PropertyPath, ColumnType::Str),
        col(PropKey::AccessLocation, ColumnType::Int),
    ];
    const IMPORTS: &[Column] = &[
        col(PropKey::ImportType, ColumnType::Str),
        col(PropKey::ResolvedPath, ColumnType::Str),
    ];
    const DECORATES: &[Column] = &[
        col(PropKey::DecoratorName, ColumnType::Str),
        col(PropKey::LineNumber, ColumnType::Int),
    ];
    const EXPORTS: &[Column] = &[
        col(PropKey::ExportType, ColumnType::Str),
        col(PropKey::Symbol, ColumnType::Str),
    ];
    const USES_TEMPLATE: &[Column] = &[
        col(PropKey::TemplatePath, ColumnType::Str),
        col(PropKey::ResolvedPath, ColumnType::Str),
        col(PropKey::ComponentSelector, ColumnType::Str),
    ];
    const USES_STYLES: &[Column] = &[
        col(PropKey::StylePath, ColumnType::Str),
        col(PropKey::ResolvedPath, ColumnType::Str),
        col(PropKey::ComponentSelector, ColumnType::Str),
    ];
    match kind {
        RelationKind::Calls => CALLS,
        RelationKind::Uses => USES,
        RelationKind::Accesses => ACCESSES,
        RelationKind::Imports => IMPORTS,
        RelationKind::Decorates => DECORATES,
        RelationKind::Exports => EXPORTS,
        RelationKind::UsesTemplate => USES_TEMPLATE,
        RelationKind::UsesStyles => USES_STYLES,
        _ => &[],
    }
}

const CALLABLES: &[EntityKind] = &[
    EntityKind::Function,
    EntityKind::Method,
    EntityKind::ArrowFunction,
    EntityKind::GeneratorFunction,
];

const CLASS_LIKE: &[EntityKind] = &[
    EntityKind::Class,
    EntityKind::Component,
    EntityKind::Service,
    EntityKind::Directive,
    EntityKind::Pipe,
    EntityKind::NgModule,
];

fn pairs(from: &[EntityKind], to: &[EntityKind]) -> Vec<(EntityKind, EntityKind)> {
    let mut out = Vec::with_capacity(from.len() * to.len());
    for f in from {
        for t in to {
            out.push((*f, *t));
        }
    }
    out
}

fn with_external(kinds: &[EntityKind]) -> Vec<EntityKind> {
    let mut out = kinds.to_vec();
    out.push(EntityKind::External);
    out
}

/// Endpoint (FROM, TO) pairs declared for a relationship table.
///
/// Generated from the kind families the extractor can actually produce;
/// an edge outside these pairs is a schema mismatch and is rejected by
/// the adapter.
pub fn rel_pairs(kind: RelationKind) -> Vec<(EntityKind, EntityKind)> {
    use EntityKind::*;
    match kind {
        RelationKind::FileContainsModule => vec![(File, Module)],
        RelationKind::FileContainsClass => vec![(File, Class)],
        RelationKind::FileContainsFunction => vec![(File, Function), (File, Method)],
        RelationKind::FileContainsVariable => vec![(File, Variable)],
        RelationKind::FileContainsImport => vec![(File, Import)],
        RelationKind::FileContainsComponent => vec![(File, Component)],
        RelationKind::FileContainsService => vec![(File, Service)],
        RelationKind::FileContainsDirective => vec![(File, Directive)],
        RelationKind::FileContainsPipe => vec![(File, Pipe)],
        RelationKind::FileContainsNgModule => vec![(File, NgModule)],
        RelationKind::FileContainsInterface => vec![(File, Interface)],
        RelationKind::FileContainsTypeAlias => vec![(File, TypeAlias)],
        RelationKind::FileContainsEnum => vec![(File, Enum)],
        RelationKind::FileContainsArrowFunction => vec![(File, ArrowFunction)],
        RelationKind::FileContainsGeneratorFunction => vec![(File, GeneratorFunction)],
        RelationKind::ModuleContainsClass => vec![(Module, Class)],
        RelationKind::ModuleContainsFunction => vec![(Module, Function)],
        RelationKind::ModuleContainsVariable => vec![(Module, Variable)],
        RelationKind::ClassContainsFunction => pairs(CLASS_LIKE, &[Method, Function]),
        RelationKind::ClassContainsVariable => pairs(CLASS_LIKE, &[Variable]),
        RelationKind::FunctionContainsFunction => pairs(
            CALLABLES,
            &[Function, ArrowFunction, GeneratorFunction],
        ),
        RelationKind::FunctionContainsVariable => pairs(CALLABLES, &[Variable]),
        RelationKind::Calls => pairs(CALLABLES, &with_external(CALLABLES)),
        RelationKind::Inherits => pairs(CLASS_LIKE, &with_external(CLASS_LIKE)),
        RelationKind::Implements => pairs(CLASS_LIKE, &[Interface, External]),
        RelationKind::Extends => {
            let mut sources = CLASS_LIKE.to_vec();
            sources.push(Interface);
            let targets = with_external(&sources);
            pairs(&sources, &targets)
        }
        RelationKind::Imports => vec![
            (Import, File),
            (Import, External),
            (File, File),
            (File, External),
        ],
        RelationKind::Uses => {
            let mut targets = vec![
                Variable, Class, Component, Service, Directive, Pipe, NgModule, Interface,
                TypeAlias, Enum, File, External,
            ];
            targets.extend_from_slice(CALLABLES);
            pairs(CALLABLES, &targets)
        }
        RelationKind::Accesses => {
            let mut targets = with_external(&[Variable]);
            targets.push(File);
            pairs(CALLABLES, &targets)
        }
        RelationKind::Decorates => {
            let mut sources = CALLABLES.to_vec();
            sources.push(Class);
            sources.push(External);
            let mut targets = CLASS_LIKE.to_vec();
            targets.extend_from_slice(CALLABLES);
            pairs(&sources, &targets)
        }
        RelationKind::Exports => {
            let targets = with_external(&[
                Class, Interface, TypeAlias, Enum, Function, ArrowFunction, GeneratorFunction,
                Variable, Component, Service, Directive, Pipe, NgModule,
            ]);
            pairs(&[File], &targets)
        }
        RelationKind::UsesTemplate => vec![(Component, File)],
        RelationKind::UsesStyles => vec![(Component, File)],
    }
}

/// DDL for a relationship table.
pub fn rel_table_ddl(kind: RelationKind) -> String {
    let pair_list = rel_pairs(kind)
        .iter()
        .map(|(from, to)| format!("FROM {} TO {}", from.as_str(), to.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    let mut columns = String::new();
    for column in rel_columns(kind) {
        columns.push_str(&format!(", {} {}", column.key.as_str(), column.ctype.ddl()));
    }
    format!(
        "CREATE REL TABLE IF NOT EXISTS {}({}{})",
        kind.as_str(),
        pair_list,
        columns
    )
}

/// Whether a (source, target) kind pair is declared for a relationship.
pub fn pair_declared(kind: RelationKind, source: EntityKind, target: EntityKind) -> bool {
    rel_pairs(kind).contains(&(source, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ddl_shapes() {
        let ddl = node_table_ddl(EntityKind::File);
        assert!(ddl.starts_with("CREATE NODE TABLE IF NOT EXISTS File(id STRING, name STRING"));
        assert!(ddl.contains("path STRING"));
        assert!(ddl.contains("PRIMARY KEY (id)"));
        assert!(!ddl.contains("file_path"));

        let ddl = node_table_ddl(EntityKind::Function);
        assert!(ddl.contains("file_path STRING"));
        assert!(ddl.contains("is_async BOOLEAN"));
        assert!(ddl.contains("complexity INT64"));

        let ddl = node_table_ddl(EntityKind::External);
        assert!(!ddl.contains("file_path"));
    }

    #[test]
    fn rel_ddl_shapes() {
        let ddl = rel_table_ddl(RelationKind::Calls);
        assert!(ddl.contains("FROM Function TO Function"));
        assert!(ddl.contains("FROM Function TO External"));
        assert!(ddl.contains("call_type STRING"));

        let ddl = rel_table_ddl(RelationKind::FileContainsModule);
        assert_eq!(
            ddl,
            "CREATE REL TABLE IF NOT EXISTS FileContainsModule(FROM File TO Module)"
        );
    }

    #[test]
    fn scenario_pairs_are_declared() {
        use EntityKind::*;
        // Scenario A: Imports(import_b, b) and Calls(f, g).
        assert!(pair_declared(RelationKind::Imports, Import, File));
        assert!(pair_declared(RelationKind::Calls, Function, Function));
        // Scenario B: Inherits(Child, Base).
        assert!(pair_declared(RelationKind::Inherits, Class, Class));
        // Scenario C: UsesTemplate/UsesStyles(Component, File).
        assert!(pair_declared(RelationKind::UsesTemplate, Component, File));
        assert!(pair_declared(RelationKind::UsesStyles, Component, File));
        // Scenario F: Imports and Uses to External.
        assert!(pair_declared(RelationKind::Imports, Import, External));
        assert!(pair_declared(RelationKind::Uses, Function, External));
    }

    #[test]
    fn every_table_has_ddl() {
        for kind in EntityKind::all() {
            assert!(!node_table_ddl(*kind).is_empty());
        }
        for kind in RelationKind::all() {
            let ddl = rel_table_ddl(*kind);
            assert!(ddl.contains("FROM"), "{ddl}");
        }
    }
}
