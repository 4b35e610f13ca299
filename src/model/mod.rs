//! Core data model: entities, relationships, and property bags.
//!
//! Everything the front-ends emit is expressed in the closed enums defined
//! here. Property bags are maps keyed by [`PropKey`], never free-form
//! strings, so the store adapter can bind them to schema columns without
//! guessing. Edges reference entities by [`identity::EntityId`], never by
//! in-memory pointers; that is what makes incremental merges a set-diff.

pub mod identity;

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::PathBuf;

pub use identity::EntityId;

/// Kinds of entities tracked in the graph. Fixed and closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    /// A source file.
    File,
    /// A named namespace emitted by the language (one implicit per Python file).
    Module,
    /// A class declaration.
    Class,
    /// An interface declaration.
    Interface,
    /// A type alias declaration.
    TypeAlias,
    /// An enum declaration.
    Enum,
    /// A free function.
    Function,
    /// A function owned by a class or interface.
    Method,
    /// An arrow function bound to a variable.
    ArrowFunction,
    /// A generator function.
    GeneratorFunction,
    /// A named binding at file, module, class, or function scope.
    Variable,
    /// A named import statement (distinct from the Imports edge it produces).
    Import,
    /// A class rekinded by a recognized component decorator.
    Component,
    /// A class rekinded by an injectable decorator.
    Service,
    /// A class rekinded by a directive decorator.
    Directive,
    /// A class rekinded by a pipe decorator.
    Pipe,
    /// A class rekinded by a module decorator.
    NgModule,
    /// Placeholder for a symbol referenced but not declared in the project.
    External,
}

impl EntityKind {
    /// Canonical kind name. Also the node table name in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::File => "File",
            EntityKind::Module => "Module",
            EntityKind::Class => "Class",
            EntityKind::Interface => "Interface",
            EntityKind::TypeAlias => "TypeAlias",
            EntityKind::Enum => "Enum",
            EntityKind::Function => "Function",
            EntityKind::Method => "Method",
            EntityKind::ArrowFunction => "ArrowFunction",
            EntityKind::GeneratorFunction => "GeneratorFunction",
            EntityKind::Variable => "Variable",
            EntityKind::Import => "Import",
            EntityKind::Component => "Component",
            EntityKind::Service => "Service",
            EntityKind::Directive => "Directive",
            EntityKind::Pipe => "Pipe",
            EntityKind::NgModule => "NgModule",
            EntityKind::External => "External",
        }
    }

    /// All kinds, in schema declaration order.
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::File,
            EntityKind::Module,
            EntityKind::Class,
            EntityKind::Interface,
            EntityKind::TypeAlias,
            EntityKind::Enum,
            EntityKind::Function,
            EntityKind::Method,
            EntityKind::ArrowFunction,
            EntityKind::GeneratorFunction,
            EntityKind::Variable,
            EntityKind::Import,
            EntityKind::Component,
            EntityKind::Service,
            EntityKind::Directive,
            EntityKind::Pipe,
            EntityKind::NgModule,
            EntityKind::External,
        ]
    }

    /// Whether this kind is a callable unit (a valid Calls endpoint).
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            EntityKind::Function
                | EntityKind::Method
                | EntityKind::ArrowFunction
                | EntityKind::GeneratorFunction
        )
    }

    /// Whether this kind is a class-like declaration (a valid rekind input
    /// and Inherits/Implements endpoint).
    pub fn is_class_like(&self) -> bool {
        matches!(
            self,
            EntityKind::Class
                | EntityKind::Component
                | EntityKind::Service
                | EntityKind::Directive
                | EntityKind::Pipe
                | EntityKind::NgModule
        )
    }

    /// The FileContainsX edge kind for this entity kind, if one exists.
    ///
    /// File and External entities have no container.
    pub fn file_contains(&self) -> Option<RelationKind> {
        match self {
            EntityKind::Module => Some(RelationKind::FileContainsModule),
            EntityKind::Class => Some(RelationKind::FileContainsClass),
            EntityKind::Interface => Some(RelationKind::FileContainsInterface),
            EntityKind::TypeAlias => Some(RelationKind::FileContainsTypeAlias),
            EntityKind::Enum => Some(RelationKind::FileContainsEnum),
            EntityKind::Function | EntityKind::Method => Some(RelationKind::FileContainsFunction),
            EntityKind::ArrowFunction => Some(RelationKind::FileContainsArrowFunction),
            EntityKind::GeneratorFunction => Some(RelationKind::FileContainsGeneratorFunction),
            EntityKind::Variable => Some(RelationKind::FileContainsVariable),
            EntityKind::Import => Some(RelationKind::FileContainsImport),
            EntityKind::Component => Some(RelationKind::FileContainsComponent),
            EntityKind::Service => Some(RelationKind::FileContainsService),
            EntityKind::Directive => Some(RelationKind::FileContainsDirective),
            EntityKind::Pipe => Some(RelationKind::FileContainsPipe),
            EntityKind::NgModule => Some(RelationKind::FileContainsNgModule),
            EntityKind::File | EntityKind::External => None,
        }
    }
}

/// Kinds of relationships tracked in the graph. Fixed and closed.
///
/// The names are user-visible through the query surface and must not drift.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelationKind {
    FileContainsModule,
    FileContainsClass,
    FileContainsFunction,
    FileContainsVariable,
    FileContainsImport,
    FileContainsComponent,
    FileContainsService,
    FileContainsDirective,
    FileContainsPipe,
    FileContainsNgModule,
    FileContainsInterface,
    FileContainsTypeAlias,
    FileContainsEnum,
    FileContainsArrowFunction,
    FileContainsGeneratorFunction,
    ModuleContainsClass,
    ModuleContainsFunction,
    ModuleContainsVariable,
    ClassContainsFunction,
    ClassContainsVariable,
    FunctionContainsFunction,
    FunctionContainsVariable,
    Calls,
    Inherits,
    Implements,
    Imports,
    Uses,
    Accesses,
    Decorates,
    Extends,
    Exports,
    UsesTemplate,
    UsesStyles,
}

impl RelationKind {
    /// Canonical relationship name. Also the rel table name in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::FileContainsModule => "FileContainsModule",
            RelationKind::FileContainsClass => "FileContainsClass",
            RelationKind::FileContainsFunction => "FileContainsFunction",
            RelationKind::FileContainsVariable => "FileContainsVariable",
            RelationKind::FileContainsImport => "FileContainsImport",
            RelationKind::FileContainsComponent => "FileContainsComponent",
            RelationKind::FileContainsService => "FileContainsService",
            RelationKind::FileContainsDirective => "FileContainsDirective",
            RelationKind::FileContainsPipe => "FileContainsPipe",
            RelationKind::FileContainsNgModule => "FileContainsNgModule",
            RelationKind::FileContainsInterface => "FileContainsInterface",
            RelationKind::FileContainsTypeAlias => "FileContainsTypeAlias",
            RelationKind::FileContainsEnum => "FileContainsEnum",
            RelationKind::FileContainsArrowFunction => "FileContainsArrowFunction",
            RelationKind::FileContainsGeneratorFunction => "FileContainsGeneratorFunction",
            RelationKind::ModuleContainsClass => "ModuleContainsClass",
            RelationKind::ModuleContainsFunction => "ModuleContainsFunction",
            RelationKind::ModuleContainsVariable => "ModuleContainsVariable",
            RelationKind::ClassContainsFunction => "ClassContainsFunction",
            RelationKind::ClassContainsVariable => "ClassContainsVariable",
            RelationKind::FunctionContainsFunction => "FunctionContainsFunction",
            RelationKind::FunctionContainsVariable => "FunctionContainsVariable",
            RelationKind::Calls => "Calls",
            RelationKind::Inherits => "Inherits",
            RelationKind::Implements => "Implements",
            RelationKind::Imports => "Imports",
            RelationKind::Uses => "Uses",
            RelationKind::Accesses => "Accesses",
            RelationKind::Decorates => "Decorates",
            RelationKind::Extends => "Extends",
            RelationKind::Exports => "Exports",
            RelationKind::UsesTemplate => "UsesTemplate",
            RelationKind::UsesStyles => "UsesStyles",
        }
    }

    /// Whether this edge kind expresses containment.
    ///
    /// Containment edges form a forest rooted at File nodes; every non-File
    /// entity has exactly one incoming containment edge.
    pub fn is_containment(&self) -> bool {
        matches!(
            self,
            RelationKind::FileContainsModule
                | RelationKind::FileContainsClass
                | RelationKind::FileContainsFunction
                | RelationKind::FileContainsVariable
                | RelationKind::FileContainsImport
                | RelationKind::FileContainsComponent
                | RelationKind::FileContainsService
                | RelationKind::FileContainsDirective
                | RelationKind::FileContainsPipe
                | RelationKind::FileContainsNgModule
                | RelationKind::FileContainsInterface
                | RelationKind::FileContainsTypeAlias
                | RelationKind::FileContainsEnum
                | RelationKind::FileContainsArrowFunction
                | RelationKind::FileContainsGeneratorFunction
                | RelationKind::ModuleContainsClass
                | RelationKind::ModuleContainsFunction
                | RelationKind::ModuleContainsVariable
                | RelationKind::ClassContainsFunction
                | RelationKind::ClassContainsVariable
                | RelationKind::FunctionContainsFunction
                | RelationKind::FunctionContainsVariable
        )
    }

    /// All kinds, in schema declaration order.
    pub fn all() -> &'static [RelationKind] {
        &[
            RelationKind::FileContainsModule,
            RelationKind::FileContainsClass,
            RelationKind::FileContainsFunction,
            RelationKind::FileContainsVariable,
            RelationKind::FileContainsImport,
            RelationKind::FileContainsComponent,
            RelationKind::FileContainsService,
            RelationKind::FileContainsDirective,
            RelationKind::FileContainsPipe,
            RelationKind::FileContainsNgModule,
            RelationKind::FileContainsInterface,
            RelationKind::FileContainsTypeAlias,
            RelationKind::FileContainsEnum,
            RelationKind::FileContainsArrowFunction,
            RelationKind::FileContainsGeneratorFunction,
            RelationKind::ModuleContainsClass,
            RelationKind::ModuleContainsFunction,
            RelationKind::ModuleContainsVariable,
            RelationKind::ClassContainsFunction,
            RelationKind::ClassContainsVariable,
            RelationKind::FunctionContainsFunction,
            RelationKind::FunctionContainsVariable,
            RelationKind::Calls,
            RelationKind::Inherits,
            RelationKind::Implements,
            RelationKind::Imports,
            RelationKind::Uses,
            RelationKind::Accesses,
            RelationKind::Decorates,
            RelationKind::Extends,
            RelationKind::Exports,
            RelationKind::UsesTemplate,
            RelationKind::UsesStyles,
        ]
    }
}

/// Closed set of property names used in entity and edge property bags.
///
/// The store schema declares a column for each key it persists; the adapter
/// refuses to bind anything outside this enum.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropKey {
    Path,
    Extension,
    Size,
    Hash,
    LinesOfCode,
    Docstring,
    Signature,
    ReturnType,
    IsAsync,
    IsGenerator,
    IsAbstract,
    IsStatic,
    IsExported,
    IsConstant,
    TypeAnnotation,
    Complexity,
    Selector,
    ProvidedIn,
    Standalone,
    Template,
    Styles,
    ModuleName,
    Alias,
    IsFromImport,
    SelectorCount,
    RuleCount,
    ImportCount,
    Directives,
    Interpolations,
    CustomComponents,
    // Edge properties.
    CallType,
    LineNumber,
    UsageType,
    PropertyPath,
    AccessLocation,
    ImportType,
    DecoratorName,
    ExportType,
    Symbol,
    TemplatePath,
    StylePath,
    ResolvedPath,
    ComponentSelector,
}

impl PropKey {
    /// Column name in the store schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            PropKey::Path => "path",
            PropKey::Extension => "extension",
            PropKey::Size => "size",
            PropKey::Hash => "hash",
            PropKey::LinesOfCode => "lines_of_code",
            PropKey::Docstring => "docstring",
            PropKey::Signature => "signature",
            PropKey::ReturnType => "return_type",
            PropKey::IsAsync => "is_async",
            PropKey::IsGenerator => "is_generator",
            PropKey::IsAbstract => "is_abstract",
            PropKey::IsStatic => "is_static",
            PropKey::IsExported => "is_exported",
            PropKey::IsConstant => "is_constant",
            PropKey::TypeAnnotation => "type_annotation",
            PropKey::Complexity => "complexity",
            PropKey::Selector => "selector",
            PropKey::ProvidedIn => "provided_in",
            PropKey::Standalone => "standalone",
            PropKey::Template => "template",
            PropKey::Styles => "styles",
            PropKey::ModuleName => "module_name",
            PropKey::Alias => "alias",
            PropKey::IsFromImport => "is_from_import",
            PropKey::SelectorCount => "selector_count",
            PropKey::RuleCount => "rule_count",
            PropKey::ImportCount => "import_count",
            PropKey::Directives => "directives",
            PropKey::Interpolations => "interpolations",
            PropKey::CustomComponents => "custom_components",
            PropKey::CallType => "call_type",
            PropKey::LineNumber => "line_number",
            PropKey::UsageType => "usage_type",
            PropKey::PropertyPath => "property_path",
            PropKey::AccessLocation => "access_location",
            PropKey::ImportType => "import_type",
            PropKey::DecoratorName => "decorator_name",
            PropKey::ExportType => "export_type",
            PropKey::Symbol => "symbol",
            PropKey::TemplatePath => "template_path",
            PropKey::StylePath => "style_path",
            PropKey::ResolvedPath => "resolved_path",
            PropKey::ComponentSelector => "component_selector",
        }
    }
}

/// A single property value. The store maps these to STRING/INT64/BOOLEAN.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// String property.
    Str(String),
    /// Integer property.
    Int(i64),
    /// Boolean property.
    Bool(bool),
}

/// Ordered property bag. BTreeMap keeps serialization deterministic.
pub type PropertyBag = BTreeMap<PropKey, PropValue>;

/// A declared source construct tracked as a node in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Deterministic 256-bit identity (hex).
    pub id: EntityId,
    /// Entity kind.
    pub kind: EntityKind,
    /// Display name.
    pub name: String,
    /// Owning file path (absolute). Empty for External entities.
    pub file_path: PathBuf,
    /// Start line (1-based).
    pub line_start: i64,
    /// End line (1-based).
    pub line_end: i64,
    /// Kind-specific properties.
    pub props: PropertyBag,
}

/// One endpoint of an edge before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingTarget {
    /// Resolved during pass 1 (containment, same-file references).
    Entity {
        /// The endpoint's identity.
        id: EntityId,
        /// The endpoint's kind.
        kind: EntityKind,
    },
    /// Textual module specifier from an import statement.
    Module {
        /// The specifier exactly as written (`./foo`, `numpy`, `@angular/core`).
        specifier: String,
    },
    /// Template path expression from component metadata.
    Template {
        /// The path expression exactly as written.
        path: String,
    },
    /// Stylesheet path expression from component metadata.
    Style {
        /// The path expression exactly as written.
        path: String,
    },
    /// A name to resolve against the lexical chain and the registry.
    Name {
        /// Head of the reference (`receiver` in `receiver.method`).
        head: String,
        /// Remaining dotted path, recorded on the edge if resolution succeeds.
        access_path: Option<String>,
    },
}

/// An edge emitted in pass 1 whose endpoints may still be textual.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdge {
    /// Relationship kind.
    pub kind: RelationKind,
    /// Source endpoint. Almost always `Entity`; `Name` for Decorates.
    pub source: PendingTarget,
    /// Target endpoint.
    pub target: PendingTarget,
    /// Edge properties carried through resolution.
    pub props: PropertyBag,
}

impl PendingEdge {
    /// Containment and other edges whose endpoints are known at parse time.
    pub fn resolved(
        kind: RelationKind,
        source: (EntityId, EntityKind),
        target: (EntityId, EntityKind),
    ) -> Self {
        PendingEdge {
            kind,
            source: PendingTarget::Entity {
                id: source.0,
                kind: source.1,
            },
            target: PendingTarget::Entity {
                id: target.0,
                kind: target.1,
            },
            props: PropertyBag::new(),
        }
    }
}

/// A fully resolved, persistable edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Relationship kind.
    pub kind: RelationKind,
    /// Source identity.
    pub source: EntityId,
    /// Source kind (selects the FROM node table).
    pub source_kind: EntityKind,
    /// Target identity.
    pub target: EntityId,
    /// Target kind (selects the TO node table).
    pub target_kind: EntityKind,
    /// Edge properties.
    pub props: PropertyBag,
}

/// A parse problem reported in-band. Never thrown out of band.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseIssue {
    /// The file the issue occurred in.
    pub file: PathBuf,
    /// Line of the issue (1-based), if known.
    pub line: Option<usize>,
    /// Column of the issue (0-based), if known.
    pub column: Option<usize>,
    /// Human-readable message.
    pub message: String,
}

/// A local import binding: what a name in this file refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportAlias {
    /// The module specifier exactly as written.
    pub specifier: String,
    /// The imported member, for `from M import a` forms.
    pub member: Option<String>,
}

/// Everything pass 1 produced for one file.
///
/// `import_aliases` and `local_names` are the resolution context pass 2
/// needs: the lexical chain was already walked inside-out during parsing,
/// so what remains here is file-level state only.
#[derive(Debug, Clone)]
pub struct FileParse {
    /// Absolute path of the parsed file.
    pub file_path: PathBuf,
    /// Identity of the File entity.
    pub file_id: EntityId,
    /// SHA-256 of the file content (hex).
    pub content_hash: String,
    /// Entities extracted from this file (File entity first).
    pub entities: Vec<Entity>,
    /// Edges awaiting resolution.
    pub pending: Vec<PendingEdge>,
    /// Parse problems encountered (the parse may still be partial-success).
    pub issues: Vec<ParseIssue>,
    /// Local import alias → imported binding (`np` → `numpy`).
    pub import_aliases: HashMap<String, ImportAlias>,
    /// File-scope declared names → entity, for registry seeding.
    pub local_names: HashMap<String, (EntityId, EntityKind)>,
    /// Names this file exports (explicitly, or implicitly for Python).
    pub exports: Vec<(String, EntityId, EntityKind)>,
}

impl FileParse {
    /// Create an empty parse result for a file (used for skipped files:
    /// the File entity is still present so links to it resolve).
    pub fn file_only(file_path: PathBuf, file_entity: Entity, content_hash: String) -> Self {
        FileParse {
            file_path,
            file_id: file_entity.id.clone(),
            content_hash,
            entities: vec![file_entity],
            pending: Vec::new(),
            issues: Vec::new(),
            import_aliases: HashMap::new(),
            local_names: HashMap::new(),
            exports: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_distinct_name() {
        let mut seen = std::collections::HashSet::new();
        for kind in EntityKind::all() {
            assert!(seen.insert(kind.as_str()), "duplicate kind {}", kind.as_str());
        }
    }

    #[test]
    fn every_relation_has_distinct_name() {
        let mut seen = std::collections::HashSet::new();
        for kind in RelationKind::all() {
            assert!(seen.insert(kind.as_str()), "duplicate relation {}", kind.as_str());
        }
    }

    #[test]
    fn file_contains_covers_all_contained_kinds() {
        for kind in EntityKind::all() {
            let edge = kind.file_contains();
            match kind {
                EntityKind::File | EntityKind::External => assert!(edge.is_none()),
                _ => assert!(edge.is_some(), "no container edge for {}", kind.as_str()),
            }
        }
    }

    #[test]
    fn containment_classification_matches_names() {
        for kind in RelationKind::all() {
            let name = kind.as_str();
            let looks_containing = name.contains("Contains");
            assert_eq!(kind.is_containment(), looks_containing, "{name}");
        }
    }
}
