//! TypeScript front-end and the shared tree-sitter walker.
//!
//! The walker is the common base for the structurally-typed languages: it
//! recognizes classes, interfaces, type aliases, enums, functions (named,
//! method, arrow, generator), variables with destructuring flattened, and
//! import/export statements including re-exports. The JavaScript variant
//! reuses it with a different grammar handle; TypeScript-only node kinds
//! simply never appear in JavaScript trees.
//!
//! Decorators are extracted as annotations on the enclosing class and are
//! never their own entities; the framework-decorator step (`angular`)
//! consumes them to rekind classes before identity is computed.

use crate::ingest::angular::{self, DecoratorMeta};
use crate::ingest::detect::{detect_file_type, FileType};
use crate::ingest::{degraded_parse, file_entity, grammar, FrontEnd, FrontEndOptions, LoadOutcome};
use crate::model::identity::entity_id;
use crate::model::{
    Entity, EntityId, EntityKind, FileParse, ImportAlias, ParseIssue, PendingEdge, PendingTarget,
    PropKey, PropValue, PropertyBag, RelationKind,
};
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::Node;

/// TypeScript front-end (.ts, .tsx).
pub struct TypeScriptFrontEnd {
    options: FrontEndOptions,
}

impl TypeScriptFrontEnd {
    /// Create the front-end with the given options.
    pub fn new(options: FrontEndOptions) -> Self {
        TypeScriptFrontEnd { options }
    }
}

impl FrontEnd for TypeScriptFrontEnd {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn claims(&self, path: &Path) -> bool {
        detect_file_type(path) == Some(FileType::TypeScript)
    }

    fn parse_file(&self, path: &Path) -> FileParse {
        parse_with_grammar(path, &self.options, grammar::Grammar::for_typescript_path(path))
    }
}

/// Parse one file with the shared walker under the given grammar.
pub(crate) fn parse_with_grammar(
    path: &Path,
    options: &FrontEndOptions,
    grammar_variant: grammar::Grammar,
) -> FileParse {
    let (text, hash) = match super::load_source(path, options.max_file_size) {
        LoadOutcome::Loaded { text, hash } => (text, hash),
        other => return degraded_parse(path, other),
    };

    let file = file_entity(path, &hash, text.lines().count(), text.len() as u64);
    let fallback = |message: String, hash: String| {
        let mut parse = FileParse::file_only(path.to_path_buf(), file.clone(), hash);
        parse.issues.push(ParseIssue {
            file: path.to_path_buf(),
            line: None,
            column: None,
            message,
        });
        parse
    };

    let mut parser = match grammar::parser_for(grammar_variant, path) {
        Ok(parser) => parser,
        Err(e) => return fallback(e.to_string(), hash),
    };
    let tree = match parser.parse(text.as_bytes(), None) {
        Some(tree) => tree,
        None => return fallback("parse failed - no tree returned".to_string(), hash),
    };

    let mut walker = TreeWalker::new(path, &text, hash, options, file);
    walker.collect_error_nodes(tree.root_node());
    walker.walk_program(tree.root_node());
    walker.finish()
}

struct Scope {
    owner: (EntityId, EntityKind),
    names: HashMap<String, (EntityId, EntityKind)>,
    is_class: bool,
    segment: String,
}

/// Pass-1 walker over one TypeScript/JavaScript file.
struct TreeWalker<'a> {
    path: &'a Path,
    source: &'a str,
    hash: String,
    options: &'a FrontEndOptions,

    file_id: EntityId,
    entities: Vec<Entity>,
    pending: Vec<PendingEdge>,
    issues: Vec<ParseIssue>,
    import_aliases: HashMap<String, ImportAlias>,
    local_names: HashMap<String, (EntityId, EntityKind)>,
    exports: Vec<(String, EntityId, EntityKind)>,

    scopes: Vec<Scope>,
}

impl<'a> TreeWalker<'a> {
    fn new(
        path: &'a Path,
        source: &'a str,
        hash: String,
        options: &'a FrontEndOptions,
        file: Entity,
    ) -> Self {
        let file_id = file.id.clone();
        TreeWalker {
            path,
            source,
            hash,
            options,
            file_id,
            entities: vec![file],
            pending: Vec::new(),
            issues: Vec::new(),
            import_aliases: HashMap::new(),
            local_names: HashMap::new(),
            exports: Vec::new(),
            scopes: Vec::new(),
        }
    }

    fn finish(self) -> FileParse {
        FileParse {
            file_path: self.path.to_path_buf(),
            file_id: self.file_id,
            content_hash: self.hash,
            entities: self.entities,
            pending: self.pending,
            issues: self.issues,
            import_aliases: self.import_aliases,
            local_names: self.local_names,
            exports: self.exports,
        }
    }

    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn line_range(node: Node) -> (i64, i64) {
        (
            node.start_position().row as i64 + 1,
            node.end_position().row as i64 + 1,
        )
    }

    fn qualify(&self, name: &str) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut qualified = stem;
        for scope in &self.scopes {
            if !scope.segment.is_empty() {
                qualified.push_str("::");
                qualified.push_str(&scope.segment);
            }
        }
        qualified.push_str("::");
        qualified.push_str(name);
        qualified
    }

    fn collect_error_nodes(&mut self, root: Node) {
        if !root.has_error() {
            return;
        }
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                let pos = node.start_position();
                self.issues.push(ParseIssue {
                    file: self.path.to_path_buf(),
                    line: Some(pos.row + 1),
                    column: Some(pos.column),
                    message: format!(
                        "syntax error near '{}'",
                        self.text(node).chars().take(40).collect::<String>()
                    ),
                });
                if self.issues.len() >= 20 {
                    return;
                }
                continue;
            }
            if node.has_error() {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    stack.push(child);
                }
            }
        }
    }

    // ---- walking ----

    fn walk_program(&mut self, root: Node<'a>) {
        self.walk_children(root, false);
    }

    fn walk_children(&mut self, node: Node<'a>, exported: bool) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk_node(child, exported);
        }
    }

    fn walk_node(&mut self, node: Node<'a>, exported: bool) {
        match node.kind() {
            "export_statement" => self.handle_export(node),
            "import_statement" => self.handle_import(node),
            "class_declaration" | "abstract_class_declaration" => {
                self.handle_class(node, exported, &[])
            }
            "interface_declaration" => self.handle_simple_type(node, EntityKind::Interface, exported),
            "type_alias_declaration" => self.handle_simple_type(node, EntityKind::TypeAlias, exported),
            "enum_declaration" => self.handle_simple_type(node, EntityKind::Enum, exported),
            "function_declaration" => self.handle_function(node, EntityKind::Function, exported),
            "generator_function_declaration" => {
                self.handle_function(node, EntityKind::GeneratorFunction, exported)
            }
            "method_definition" => self.handle_function(node, EntityKind::Method, false),
            "public_field_definition" | "field_definition" => self.handle_class_field(node),
            "lexical_declaration" | "variable_declaration" => {
                self.handle_variable_statement(node, exported)
            }
            "call_expression" => {
                self.handle_call(node);
                if let Some(args) = node.child_by_field_name("arguments") {
                    self.walk_children(args, false);
                }
            }
            "member_expression" => self.handle_member(node),
            _ => self.walk_children(node, false),
        }
    }

    fn handle_export(&mut self, node: Node<'a>) {
        let source_module = node
            .child_by_field_name("source")
            .map(|s| strip_quotes(self.text(s)).to_string());

        // Re-export: `export { a } from './m'` or `export * from './m'`.
        if let Some(module) = &source_module {
            let mut edge_props = PropertyBag::new();
            edge_props.insert(PropKey::ImportType, PropValue::Str("reexport".to_string()));
            self.pending.push(PendingEdge {
                kind: RelationKind::Imports,
                source: PendingTarget::Entity {
                    id: self.file_id.clone(),
                    kind: EntityKind::File,
                },
                target: PendingTarget::Module {
                    specifier: module.clone(),
                },
                props: edge_props,
            });
        }

        // Decorators written above `export class` attach to the export
        // statement in some grammar revisions; collect them here and hand
        // them to the class handler either way.
        let mut export_decorators = Vec::new();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "decorator" => export_decorators.push(child),
                "export_clause" => {
                    let mut spec_cursor = child.walk();
                    for spec in child.children(&mut spec_cursor) {
                        if spec.kind() == "export_specifier" {
                            let name = spec
                                .child_by_field_name("name")
                                .map(|n| self.text(n).to_string())
                                .unwrap_or_default();
                            if !name.is_empty() {
                                self.push_export_edge(&name, "named");
                            }
                        }
                    }
                }
                "class_declaration" | "abstract_class_declaration" => {
                    self.handle_class(child, true, &export_decorators)
                }
                // Declarations under `export` walk with the exported flag.
                "interface_declaration"
                | "type_alias_declaration"
                | "enum_declaration"
                | "function_declaration"
                | "generator_function_declaration"
                | "lexical_declaration"
                | "variable_declaration" => self.walk_node(child, true),
                _ => {}
            }
        }
    }

    fn push_export_edge(&mut self, name: &str, export_type: &str) {
        let mut props = PropertyBag::new();
        props.insert(PropKey::ExportType, PropValue::Str(export_type.to_string()));
        props.insert(PropKey::Symbol, PropValue::Str(name.to_string()));
        self.pending.push(PendingEdge {
            kind: RelationKind::Exports,
            source: PendingTarget::Entity {
                id: self.file_id.clone(),
                kind: EntityKind::File,
            },
            target: PendingTarget::Name {
                head: name.to_string(),
                access_path: None,
            },
            props,
        });
    }

    fn handle_import(&mut self, node: Node<'a>) {
        let Some(module) = node
            .child_by_field_name("source")
            .map(|s| strip_quotes(self.text(s)).to_string())
        else {
            return;
        };
        let (line, _) = Self::line_range(node);

        // One Import entity per statement, named after the module.
        let qualified = format!("import::{module}");
        let qualified = self.qualify(&qualified);
        let import_id = entity_id(EntityKind::Import, self.path, &qualified, line, line);

        let mut names = Vec::new();
        let mut import_type = "side_effect";
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "import_clause" {
                continue;
            }
            let mut clause_cursor = child.walk();
            for clause in child.children(&mut clause_cursor) {
                match clause.kind() {
                    "identifier" => {
                        // Default import.
                        import_type = "default";
                        let local = self.text(clause).to_string();
                        names.push(local.clone());
                        self.import_aliases.insert(
                            local,
                            ImportAlias {
                                specifier: module.clone(),
                                member: Some("default".to_string()),
                            },
                        );
                    }
                    "namespace_import" => {
                        import_type = "namespace";
                        if let Some(alias) = clause
                            .children(&mut clause.walk())
                            .find(|c| c.kind() == "identifier")
                        {
                            let local = self.text(alias).to_string();
                            names.push(local.clone());
                            self.import_aliases.insert(
                                local,
                                ImportAlias {
                                    specifier: module.clone(),
                                    member: None,
                                },
                            );
                        }
                    }
                    "named_imports" => {
                        import_type = "named";
                        let mut named_cursor = clause.walk();
                        for spec in clause.children(&mut named_cursor) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let imported = spec
                                .child_by_field_name("name")
                                .map(|n| self.text(n).to_string())
                                .unwrap_or_default();
                            let local = spec
                                .child_by_field_name("alias")
                                .map(|n| self.text(n).to_string())
                                .unwrap_or_else(|| imported.clone());
                            if imported.is_empty() {
                                continue;
                            }
                            names.push(local.clone());
                            self.import_aliases.insert(
                                local,
                                ImportAlias {
                                    specifier: module.clone(),
                                    member: Some(imported),
                                },
                            );
                        }
                    }
                    _ => {}
                }
            }
        }

        let display = if names.is_empty() {
            module.clone()
        } else {
            names.join(", ")
        };
        let mut props = PropertyBag::new();
        props.insert(PropKey::ModuleName, PropValue::Str(module.clone()));
        props.insert(PropKey::IsFromImport, PropValue::Bool(false));

        self.entities.push(Entity {
            id: import_id.clone(),
            kind: EntityKind::Import,
            name: display,
            file_path: self.path.to_path_buf(),
            line_start: line,
            line_end: line,
            props,
        });
        self.pending.push(PendingEdge::resolved(
            RelationKind::FileContainsImport,
            (self.file_id.clone(), EntityKind::File),
            (import_id.clone(), EntityKind::Import),
        ));

        let mut edge_props = PropertyBag::new();
        edge_props.insert(
            PropKey::ImportType,
            PropValue::Str(import_type.to_string()),
        );
        self.pending.push(PendingEdge {
            kind: RelationKind::Imports,
            source: PendingTarget::Entity {
                id: import_id,
                kind: EntityKind::Import,
            },
            target: PendingTarget::Module { specifier: module },
            props: edge_props,
        });
    }

    fn handle_class(&mut self, node: Node<'a>, exported: bool, extra_decorators: &[Node<'a>]) {
        let name = match node.child_by_field_name("name") {
            Some(n) => self.text(n).to_string(),
            None => return,
        };
        let (line_start, line_end) = Self::line_range(node);

        // Decorators are annotations on the declaration; a recognized one
        // rekinds the class before its identity is computed, so the Class
        // is replaced, never duplicated.
        let decorators: Vec<DecoratorMeta> = extra_decorators
            .iter()
            .copied()
            .chain(node.children(&mut node.walk()).filter(|c| c.kind() == "decorator"))
            .filter_map(|d| angular::parse_decorator(d, self.source))
            .collect();
        let kind = decorators
            .iter()
            .find_map(|d| angular::recognized_kind(&d.name))
            .unwrap_or(EntityKind::Class);

        let qualified = self.qualify(&name);
        let class_id = entity_id(kind, self.path, &qualified, line_start, line_end);

        let mut props = PropertyBag::new();
        if exported {
            props.insert(PropKey::IsExported, PropValue::Bool(true));
        }
        if node.kind() == "abstract_class_declaration" {
            props.insert(PropKey::IsAbstract, PropValue::Bool(true));
        }

        for decorator in &decorators {
            match angular::recognized_kind(&decorator.name) {
                Some(_) => {
                    angular::apply_metadata(
                        decorator,
                        (&class_id, kind),
                        &mut props,
                        &mut self.pending,
                    );
                }
                None => {
                    // Plain decorator: a Decorates edge resolved in pass 2.
                    let (head, access_path) = split_dotted(&decorator.name);
                    let mut edge_props = PropertyBag::new();
                    edge_props.insert(
                        PropKey::DecoratorName,
                        PropValue::Str(decorator.name.clone()),
                    );
                    edge_props.insert(PropKey::LineNumber, PropValue::Int(decorator.line));
                    self.pending.push(PendingEdge {
                        kind: RelationKind::Decorates,
                        source: PendingTarget::Name {
                            head: head.to_string(),
                            access_path,
                        },
                        target: PendingTarget::Entity {
                            id: class_id.clone(),
                            kind,
                        },
                        props: edge_props,
                    });
                }
            }
        }

        // Heritage: extends and implements clauses.
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "class_heritage" {
                continue;
            }
            let mut heritage_cursor = child.walk();
            for clause in child.children(&mut heritage_cursor) {
                match clause.kind() {
                    "extends_clause" => {
                        for base in self.clause_type_names(clause) {
                            let (head, access_path) = split_dotted(&base);
                            self.push_reference_edge(
                                RelationKind::Extends,
                                (class_id.clone(), kind),
                                head,
                                access_path,
                                PropertyBag::new(),
                            );
                        }
                    }
                    "implements_clause" => {
                        for interface in self.clause_type_names(clause) {
                            let (head, access_path) = split_dotted(&interface);
                            self.push_reference_edge(
                                RelationKind::Implements,
                                (class_id.clone(), kind),
                                head,
                                access_path,
                                PropertyBag::new(),
                            );
                        }
                    }
                    _ => {}
                }
            }
        }

        self.entities.push(Entity {
            id: class_id.clone(),
            kind,
            name: name.clone(),
            file_path: self.path.to_path_buf(),
            line_start,
            line_end,
            props,
        });
        self.record_containment(&name, class_id.clone(), kind, exported);

        self.scopes.push(Scope {
            owner: (class_id, kind),
            names: HashMap::new(),
            is_class: true,
            segment: name,
        });
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_children(body, false);
        }
        self.scopes.pop();
    }

    fn handle_simple_type(&mut self, node: Node<'a>, kind: EntityKind, exported: bool) {
        let name = match node.child_by_field_name("name") {
            Some(n) => self.text(n).to_string(),
            None => return,
        };
        let (line_start, line_end) = Self::line_range(node);
        let qualified = self.qualify(&name);
        let id = entity_id(kind, self.path, &qualified, line_start, line_end);

        let mut props = PropertyBag::new();
        if exported {
            props.insert(PropKey::IsExported, PropValue::Bool(true));
        }

        // Interfaces may extend other interfaces.
        if kind == EntityKind::Interface {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "extends_type_clause" || child.kind() == "extends_clause" {
                    for base in self.clause_type_names(child) {
                        let (head, access_path) = split_dotted(&base);
                        self.push_reference_edge(
                            RelationKind::Extends,
                            (id.clone(), kind),
                            head,
                            access_path,
                            PropertyBag::new(),
                        );
                    }
                }
            }
        }

        self.entities.push(Entity {
            id: id.clone(),
            kind,
            name: name.clone(),
            file_path: self.path.to_path_buf(),
            line_start,
            line_end,
            props,
        });
        self.record_containment(&name, id, kind, exported);
    }

    fn handle_function(&mut self, node: Node<'a>, kind: EntityKind, exported: bool) {
        let name = match node.child_by_field_name("name") {
            Some(n) => self.text(n).to_string(),
            None => return,
        };
        // Constructors and accessors are methods of their class.
        let in_class = self.scopes.last().map(|s| s.is_class).unwrap_or(false);
        let kind = if in_class { EntityKind::Method } else { kind };

        let (line_start, line_end) = Self::line_range(node);
        let qualified = self.qualify(&name);
        let function_id = entity_id(kind, self.path, &qualified, line_start, line_end);

        let is_async = node
            .children(&mut node.walk())
            .any(|c| c.kind() == "async");
        let is_generator = node
            .children(&mut node.walk())
            .any(|c| c.kind() == "*")
            || kind == EntityKind::GeneratorFunction;

        let mut props = PropertyBag::new();
        props.insert(PropKey::IsAsync, PropValue::Bool(is_async));
        props.insert(PropKey::IsGenerator, PropValue::Bool(is_generator));
        if exported {
            props.insert(PropKey::IsExported, PropValue::Bool(true));
        }
        if in_class {
            let is_static = node
                .children(&mut node.walk())
                .any(|c| c.kind() == "static");
            props.insert(PropKey::IsStatic, PropValue::Bool(is_static));
        }
        if let Some(params) = node.child_by_field_name("parameters") {
            props.insert(
                PropKey::Signature,
                PropValue::Str(self.text(params).to_string()),
            );
        }
        if let Some(ret) = node.child_by_field_name("return_type") {
            props.insert(
                PropKey::ReturnType,
                PropValue::Str(self.text(ret).trim_start_matches(':').trim().to_string()),
            );
        }

        self.entities.push(Entity {
            id: function_id.clone(),
            kind,
            name: name.clone(),
            file_path: self.path.to_path_buf(),
            line_start,
            line_end,
            props,
        });
        self.record_containment(&name, function_id.clone(), kind, exported);

        self.scopes.push(Scope {
            owner: (function_id, kind),
            names: HashMap::new(),
            is_class: false,
            segment: name,
        });
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_children(body, false);
        }
        self.scopes.pop();
    }

    fn handle_class_field(&mut self, node: Node<'a>) {
        let name = match node.child_by_field_name("name") {
            Some(n) => self.text(n).to_string(),
            None => return,
        };
        let (line_start, _) = Self::line_range(node);
        let qualified = self.qualify(&name);
        let id = entity_id(
            EntityKind::Variable,
            self.path,
            &qualified,
            line_start,
            line_start,
        );

        let mut props = PropertyBag::new();
        if let Some(ty) = node.child_by_field_name("type") {
            props.insert(
                PropKey::TypeAnnotation,
                PropValue::Str(self.text(ty).trim_start_matches(':').trim().to_string()),
            );
        }

        self.entities.push(Entity {
            id: id.clone(),
            kind: EntityKind::Variable,
            name: name.clone(),
            file_path: self.path.to_path_buf(),
            line_start,
            line_end: line_start,
            props,
        });
        self.record_containment(&name, id, EntityKind::Variable, false);

        if let Some(value) = node.child_by_field_name("value") {
            self.walk_node(value, false);
        }
    }

    fn handle_variable_statement(&mut self, node: Node<'a>, exported: bool) {
        let is_const = self.text(node).trim_start().starts_with("const");
        let mut cursor = node.walk();
        for declarator in node.children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            self.handle_declarator(declarator, is_const, exported);
        }
    }

    fn handle_declarator(&mut self, node: Node<'a>, is_const: bool, exported: bool) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let value = node.child_by_field_name("value");
        let (line_start, line_end) = Self::line_range(node);

        match name_node.kind() {
            "identifier" => {
                let name = self.text(name_node).to_string();
                // Arrow and function expressions bound to a name are
                // callable units named by their variable.
                let kind = match value.map(|v| v.kind()) {
                    Some("arrow_function") => EntityKind::ArrowFunction,
                    Some("generator_function") => EntityKind::GeneratorFunction,
                    Some("function_expression") | Some("function") => EntityKind::Function,
                    _ => EntityKind::Variable,
                };
                let qualified = self.qualify(&name);
                let id = entity_id(kind, self.path, &qualified, line_start, line_end);

                let mut props = PropertyBag::new();
                if kind == EntityKind::Variable {
                    props.insert(PropKey::IsConstant, PropValue::Bool(is_const));
                } else {
                    let is_async = value
                        .map(|v| v.children(&mut v.walk()).any(|c| c.kind() == "async"))
                        .unwrap_or(false);
                    props.insert(PropKey::IsAsync, PropValue::Bool(is_async));
                    props.insert(
                        PropKey::IsGenerator,
                        PropValue::Bool(kind == EntityKind::GeneratorFunction),
                    );
                }
                if exported {
                    props.insert(PropKey::IsExported, PropValue::Bool(true));
                }

                self.entities.push(Entity {
                    id: id.clone(),
                    kind,
                    name: name.clone(),
                    file_path: self.path.to_path_buf(),
                    line_start,
                    line_end,
                    props,
                });
                self.record_containment(&name, id.clone(), kind, exported);

                if let Some(value_node) = value {
                    if kind.is_callable() {
                        self.scopes.push(Scope {
                            owner: (id, kind),
                            names: HashMap::new(),
                            is_class: false,
                            segment: name,
                        });
                        self.walk_node(value_node, false);
                        self.scopes.pop();
                    } else {
                        self.walk_node(value_node, false);
                    }
                }
            }
            "object_pattern" | "array_pattern" => {
                // Destructuring flattens into one Variable per bound name.
                for name in self.pattern_names(name_node) {
                    let qualified = self.qualify(&name);
                    let id = entity_id(
                        EntityKind::Variable,
                        self.path,
                        &qualified,
                        line_start,
                        line_start,
                    );
                    let mut props = PropertyBag::new();
                    props.insert(PropKey::IsConstant, PropValue::Bool(is_const));
                    self.entities.push(Entity {
                        id: id.clone(),
                        kind: EntityKind::Variable,
                        name: name.clone(),
                        file_path: self.path.to_path_buf(),
                        line_start,
                        line_end: line_start,
                        props,
                    });
                    self.record_containment(&name, id, EntityKind::Variable, exported);
                }
                if let Some(value_node) = value {
                    self.walk_node(value_node, false);
                }
            }
            _ => {}
        }
    }

    fn pattern_names(&self, node: Node) -> Vec<String> {
        let mut names = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            match current.kind() {
                "shorthand_property_identifier_pattern" | "identifier" => {
                    names.push(self.text(current).to_string());
                }
                "pair_pattern" => {
                    if let Some(value) = current.child_by_field_name("value") {
                        stack.push(value);
                    }
                }
                _ => {
                    let mut cursor = current.walk();
                    for child in current.children(&mut cursor) {
                        stack.push(child);
                    }
                }
            }
        }
        names.reverse();
        names
    }

    fn handle_call(&mut self, node: Node<'a>) {
        let Some(callee) = node.child_by_field_name("function") else {
            return;
        };
        let Some(owner) = self.enclosing_callable() else {
            return;
        };
        let dotted = self.text(callee);
        if dotted.is_empty() || dotted.contains('(') || dotted.contains('[') {
            self.walk_children(callee, false);
            return;
        }
        let (line, _) = Self::line_range(node);
        let (head, access_path) = split_dotted(dotted);

        let mut props = PropertyBag::new();
        props.insert(
            PropKey::CallType,
            PropValue::Str(if access_path.is_some() {
                "method_call".to_string()
            } else {
                "function_call".to_string()
            }),
        );
        props.insert(PropKey::LineNumber, PropValue::Int(line));
        self.push_reference_edge(RelationKind::Calls, owner, head, access_path, props);
    }

    fn handle_member(&mut self, node: Node<'a>) {
        let Some(owner) = self.enclosing_callable() else {
            return;
        };
        let dotted = self.text(node);
        if dotted.is_empty() || dotted.contains('(') || dotted.contains('[') {
            self.walk_children(node, false);
            return;
        }
        let (line, _) = Self::line_range(node);
        let (head, access_path) = split_dotted(dotted);

        let mut props = PropertyBag::new();
        props.insert(PropKey::PropertyPath, PropValue::Str(dotted.to_string()));
        props.insert(PropKey::AccessLocation, PropValue::Int(line));
        self.push_reference_edge(RelationKind::Accesses, owner, head, access_path, props);
    }

    fn push_reference_edge(
        &mut self,
        kind: RelationKind,
        source: (EntityId, EntityKind),
        head: &str,
        access_path: Option<String>,
        props: PropertyBag,
    ) {
        if head == "this" {
            if let Some(member) = access_path
                .as_deref()
                .map(split_dotted)
                .map(|(m, _)| m.to_string())
            {
                if let Some(target) = self.lookup_class_member(&member) {
                    self.pending.push(PendingEdge {
                        kind,
                        source: PendingTarget::Entity {
                            id: source.0,
                            kind: source.1,
                        },
                        target: PendingTarget::Entity {
                            id: target.0,
                            kind: target.1,
                        },
                        props,
                    });
                }
            }
            return;
        }

        let target = match self.lookup_lexical(head) {
            Some((id, entity_kind)) => PendingTarget::Entity {
                id,
                kind: entity_kind,
            },
            None => PendingTarget::Name {
                head: head.to_string(),
                access_path,
            },
        };
        self.pending.push(PendingEdge {
            kind,
            source: PendingTarget::Entity {
                id: source.0,
                kind: source.1,
            },
            target,
            props,
        });
    }

    fn clause_type_names(&self, clause: Node) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = clause.walk();
        for child in clause.children(&mut cursor) {
            match child.kind() {
                "identifier" | "type_identifier" | "member_expression" | "nested_type_identifier" => {
                    names.push(self.text(child).to_string());
                }
                "generic_type" => {
                    if let Some(inner) = child.child(0) {
                        names.push(self.text(inner).to_string());
                    }
                }
                _ => {}
            }
        }
        names
    }

    fn record_containment(&mut self, name: &str, id: EntityId, kind: EntityKind, exported: bool) {
        let owner = self.scopes.last().map(|s| s.owner.clone());

        let containment = match owner.as_ref().map(|(_, k)| k) {
            Some(owner_kind) if owner_kind.is_class_like() => match kind {
                EntityKind::Method | EntityKind::Function => {
                    Some(RelationKind::ClassContainsFunction)
                }
                EntityKind::Variable => Some(RelationKind::ClassContainsVariable),
                _ => None,
            },
            Some(owner_kind) if owner_kind.is_callable() => match kind {
                EntityKind::Function | EntityKind::ArrowFunction | EntityKind::GeneratorFunction => {
                    Some(RelationKind::FunctionContainsFunction)
                }
                EntityKind::Variable => Some(RelationKind::FunctionContainsVariable),
                _ => None,
            },
            _ => None,
        };

        match (containment, owner) {
            (Some(edge_kind), Some(owner)) => {
                self.pending.push(PendingEdge::resolved(
                    edge_kind,
                    owner,
                    (id.clone(), kind),
                ));
            }
            _ => {
                // File-level declarations (TypeScript emits no Module).
                if let Some(edge_kind) = kind.file_contains() {
                    self.pending.push(PendingEdge::resolved(
                        edge_kind,
                        (self.file_id.clone(), EntityKind::File),
                        (id.clone(), kind),
                    ));
                }
            }
        }

        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(name.to_string(), (id.clone(), kind));
        } else {
            self.local_names.insert(name.to_string(), (id.clone(), kind));
            if exported {
                self.exports.push((name.to_string(), id, kind));
            }
        }
    }

    fn enclosing_callable(&self) -> Option<(EntityId, EntityKind)> {
        self.scopes
            .iter()
            .rev()
            .find(|s| s.owner.1.is_callable())
            .map(|s| s.owner.clone())
    }

    fn lookup_lexical(&self, name: &str) -> Option<(EntityId, EntityKind)> {
        for scope in self.scopes.iter().rev() {
            if let Some(found) = scope.names.get(name) {
                return Some(found.clone());
            }
        }
        self.local_names.get(name).cloned()
    }

    fn lookup_class_member(&self, name: &str) -> Option<(EntityId, EntityKind)> {
        self.scopes
            .iter()
            .rev()
            .find(|s| s.is_class)
            .and_then(|s| s.names.get(name))
            .cloned()
    }
}

fn split_dotted(dotted: &str) -> (&str, Option<String>) {
    match dotted.split_once('.') {
        Some((head, rest)) => (head, Some(rest.to_string())),
        None => (dotted, None),
    }
}

/// Strip matched string quotes from a literal.
pub(crate) fn strip_quotes(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ['\'', '"', '`'] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_source(name: &str, source: &str) -> FileParse {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, source).unwrap();
        TypeScriptFrontEnd::new(FrontEndOptions::default()).parse_file(&path)
    }

    fn find<'a>(parse: &'a FileParse, kind: EntityKind, name: &str) -> Option<&'a Entity> {
        parse
            .entities
            .iter()
            .find(|e| e.kind == kind && e.name == name)
    }

    #[test]
    fn extracts_class_interface_type_enum() {
        let parse = parse_source(
            "types.ts",
            "export class A {}\nexport interface I {}\ntype T = string;\nenum E { X }\n",
        );
        assert!(find(&parse, EntityKind::Class, "A").is_some());
        assert!(find(&parse, EntityKind::Interface, "I").is_some());
        assert!(find(&parse, EntityKind::TypeAlias, "T").is_some());
        assert!(find(&parse, EntityKind::Enum, "E").is_some());

        let a = find(&parse, EntityKind::Class, "A").unwrap();
        assert_eq!(
            a.props.get(&PropKey::IsExported),
            Some(&PropValue::Bool(true))
        );
    }

    #[test]
    fn exported_names_feed_the_registry() {
        let parse = parse_source("base.ts", "export class Base {}\n");
        assert!(parse
            .exports
            .iter()
            .any(|(name, _, kind)| name == "Base" && *kind == EntityKind::Class));
    }

    #[test]
    fn named_import_records_alias_and_edge() {
        let parse = parse_source("child.ts", "import { Base as B } from './base';\n");
        let alias = parse.import_aliases.get("B").unwrap();
        assert_eq!(alias.specifier, "./base");
        assert_eq!(alias.member.as_deref(), Some("Base"));

        let imports: Vec<_> = parse
            .pending
            .iter()
            .filter(|e| e.kind == RelationKind::Imports)
            .collect();
        assert_eq!(imports.len(), 1);
        assert!(matches!(
            &imports[0].target,
            PendingTarget::Module { specifier } if specifier == "./base"
        ));
    }

    #[test]
    fn extends_clause_produces_pending_edge() {
        let parse = parse_source(
            "child.ts",
            "import { Base } from './base';\nexport class Child extends Base {}\n",
        );
        let extends = parse
            .pending
            .iter()
            .find(|e| e.kind == RelationKind::Extends)
            .expect("extends edge");
        assert!(matches!(
            &extends.target,
            PendingTarget::Name { head, .. } if head == "Base"
        ));
    }

    #[test]
    fn implements_clause_produces_pending_edge() {
        let parse = parse_source(
            "impl.ts",
            "interface I {}\nclass C implements I {}\n",
        );
        let implements = parse
            .pending
            .iter()
            .find(|e| e.kind == RelationKind::Implements)
            .expect("implements edge");
        // I is declared earlier in the file, so pass 1 resolved it.
        assert!(matches!(implements.target, PendingTarget::Entity { .. }));
    }

    #[test]
    fn methods_and_fields_belong_to_their_class() {
        let parse = parse_source(
            "svc.ts",
            "class S {\n  count: number = 0;\n  get(): number { return this.count; }\n}\n",
        );
        assert!(find(&parse, EntityKind::Method, "get").is_some());
        assert!(find(&parse, EntityKind::Variable, "count").is_some());
        assert!(parse
            .pending
            .iter()
            .any(|e| e.kind == RelationKind::ClassContainsFunction));
        assert!(parse
            .pending
            .iter()
            .any(|e| e.kind == RelationKind::ClassContainsVariable));
    }

    #[test]
    fn arrow_and_generator_functions_get_their_kinds() {
        let parse = parse_source(
            "fns.ts",
            "const go = async () => 1;\nfunction* gen() { yield 1; }\n",
        );
        assert!(find(&parse, EntityKind::ArrowFunction, "go").is_some());
        assert!(find(&parse, EntityKind::GeneratorFunction, "gen").is_some());
        let go = find(&parse, EntityKind::ArrowFunction, "go").unwrap();
        assert_eq!(go.props.get(&PropKey::IsAsync), Some(&PropValue::Bool(true)));
    }

    #[test]
    fn destructuring_flattens_to_one_variable_per_name() {
        let parse = parse_source("destructure.ts", "const { a, b } = source();\n");
        assert!(find(&parse, EntityKind::Variable, "a").is_some());
        assert!(find(&parse, EntityKind::Variable, "b").is_some());
    }

    #[test]
    fn calls_reduce_to_dotted_paths() {
        let parse = parse_source(
            "calls.ts",
            "function f() { api.users.fetch(); }\n",
        );
        let call = parse
            .pending
            .iter()
            .find(|e| e.kind == RelationKind::Calls)
            .expect("call edge");
        match &call.target {
            PendingTarget::Name { head, access_path } => {
                assert_eq!(head, "api");
                assert_eq!(access_path.as_deref(), Some("users.fetch"));
            }
            other => panic!("unexpected target {other:?}"),
        }
    }

    #[test]
    fn reexport_emits_imports_and_exports() {
        let parse = parse_source("index.ts", "export { Base } from './base';\n");
        assert!(parse.pending.iter().any(|e| e.kind == RelationKind::Imports));
        assert!(parse.pending.iter().any(|e| e.kind == RelationKind::Exports));
    }

    #[test]
    fn no_module_entity_for_typescript() {
        let parse = parse_source("plain.ts", "export function f() {}\n");
        assert!(parse.entities.iter().all(|e| e.kind != EntityKind::Module));
        assert!(parse
            .pending
            .iter()
            .any(|e| e.kind == RelationKind::FileContainsFunction));
    }
}
