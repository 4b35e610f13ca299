//! Python front-end.
//!
//! Walks the tree-sitter-python AST once (pass 1) and produces the typed
//! entity stream: an implicit Module per file, classes with decorators and
//! bases, functions and methods (async and generator variants), top-level
//! and class-body variables, and both `import X` and `from M import a as b`
//! forms. Call, inheritance, and attribute references that cannot be
//! resolved inside the file's lexical chain are emitted as pending edges
//! for pass 2.

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

/// Python front-end over tree-sitter-python.
pub struct PythonFrontEnd {
    options: FrontEndOptions,
}

impl PythonFrontEnd {
    /// Create the front-end with the given options.
    pub fn new(options: FrontEndOptions) -> Self {
        PythonFrontEnd { options }
    }
}

impl FrontEnd for PythonFrontEnd {
    fn name(&self) -> &'static str {
        "python"
    }

    fn claims(&self, path: &Path) -> bool {
        detect_file_type(path) == Some(FileType::Python)
    }

    fn parse_file(&self, path: &Path) -> FileParse {
        let (text, hash) = match super::load_source(path, self.options.max_file_size) {
            LoadOutcome::Loaded { text, hash } => (text, hash),
            other => return degraded_parse(path, other),
        };

        let mut parser = match grammar::parser_for(grammar::Grammar::Python, path) {
            Ok(parser) => parser,
            Err(e) => {
                let mut parse = FileParse::file_only(
                    path.to_path_buf(),
                    file_entity(path, &hash, text.lines().count(), text.len() as u64),
                    hash,
                );
                parse.issues.push(ParseIssue {
                    file: path.to_path_buf(),
                    line: None,
                    column: None,
                    message: e.to_string(),
                });
                return parse;
            }
        };

        let tree = match parser.parse(text.as_bytes(), None) {
            Some(tree) => tree,
            None => {
                let mut parse = FileParse::file_only(
                    path.to_path_buf(),
                    file_entity(path, &hash, text.lines().count(), text.len() as u64),
                    hash,
                );
                parse.issues.push(ParseIssue {
                    file: path.to_path_buf(),
                    line: None,
                    column: None,
                    message: "parse failed - no tree returned".to_string(),
                });
                return parse;
            }
        };

        let mut walker = PythonWalker::new(path, &text, hash, &self.options);
        walker.collect_error_nodes(tree.root_node());
        walker.walk_module(tree.root_node());
        walker.finish()
    }
}

/// One lexical scope on the walker's stack.
struct Scope {
    owner: (EntityId, EntityKind),
    /// Names declared directly in this scope.
    names: HashMap<String, (EntityId, EntityKind)>,
    is_class: bool,
    /// Scope name segment, for qualified-name construction.
    segment: String,
}

/// Pass-1 walker over one Python file.
struct PythonWalker<'a> {
    path: &'a Path,
    source: &'a str,
    hash: String,
    options: &'a FrontEndOptions,
    module_name: String,

    file_id: EntityId,
    entities: Vec<Entity>,
    pending: Vec<PendingEdge>,
    issues: Vec<ParseIssue>,
    import_aliases: HashMap<String, ImportAlias>,
    local_names: HashMap<String, (EntityId, EntityKind)>,
    exports: Vec<(String, EntityId, EntityKind)>,

    scopes: Vec<Scope>,
}

impl<'a> PythonWalker<'a> {
    fn new(path: &'a Path, source: &'a str, hash: String, options: &'a FrontEndOptions) -> Self {
        let line_count = source.lines().count();
        let file = file_entity(path, &hash, line_count, source.len() as u64);
        let file_id = file.id.clone();
        let module_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "module".to_string());

        PythonWalker {
            path,
            source,
            hash,
            options,
            module_name,
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

    /// Qualified name for a declaration in the current scope chain.
    fn qualify(&self, name: &str) -> String {
        let mut qualified = self.module_name.clone();
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

    /// Record syntax problems without aborting the walk: extraction keeps
    /// every declaration tree-sitter recovered before and after the error.
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
                    message: format!("syntax error near '{}'", truncate(self.text(node), 40)),
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

    // ---- declaration handling ----

    fn walk_module(&mut self, root: Node<'a>) {
        // The implicit Module entity spans the whole file.
        let line_end = self.source.lines().count().max(1) as i64;
        let module_id = entity_id(
            EntityKind::Module,
            self.path,
            &self.module_name,
            1,
            line_end,
        );

        let mut props = PropertyBag::new();
        if self.options.include_docstrings {
            if let Some(doc) = block_docstring(root, self.source) {
                props.insert(PropKey::Docstring, PropValue::Str(doc));
            }
        }
        self.entities.push(Entity {
            id: module_id.clone(),
            kind: EntityKind::Module,
            name: self.module_name.clone(),
            file_path: self.path.to_path_buf(),
            line_start: 1,
            line_end,
            props,
        });
        self.pending.push(PendingEdge::resolved(
            RelationKind::FileContainsModule,
            (self.file_id.clone(), EntityKind::File),
            (module_id.clone(), EntityKind::Module),
        ));

        self.scopes.push(Scope {
            owner: (module_id, EntityKind::Module),
            names: HashMap::new(),
            is_class: false,
            segment: String::new(),
        });
        self.walk_block(root, &[]);
        self.scopes.pop();
    }

    fn walk_block(&mut self, node: Node<'a>, decorators: &[Node<'a>]) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk_node(child, decorators);
        }
    }

    fn walk_node(&mut self, node: Node<'a>, decorators: &[Node<'a>]) {
        match node.kind() {
            "decorated_definition" => {
                let mut decs = Vec::new();
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == "decorator" {
                        decs.push(child);
                    }
                }
                if let Some(definition) = node.child_by_field_name("definition") {
                    self.walk_node(definition, &decs);
                }
            }
            "class_definition" => self.handle_class(node, decorators),
            "function_definition" => self.handle_function(node, decorators),
            "import_statement" => self.handle_import(node),
            "import_from_statement" => self.handle_import_from(node),
            "assignment" => {
                self.handle_assignment(node);
                if let Some(right) = node.child_by_field_name("right") {
                    self.walk_node(right, &[]);
                }
            }
            "call" => {
                self.handle_call(node);
                // The callee subtree was consumed; arguments may contain
                // further calls and accesses.
                if let Some(args) = node.child_by_field_name("arguments") {
                    self.walk_block(args, &[]);
                }
            }
            "attribute" => self.handle_attribute(node),
            _ => self.walk_block(node, &[]),
        }
    }

    fn handle_class(&mut self, node: Node<'a>, decorators: &[Node<'a>]) {
        let name = match node.child_by_field_name("name") {
            Some(n) => self.text(n).to_string(),
            None => return,
        };
        let (line_start, line_end) = Self::line_range(node);
        let qualified = self.qualify(&name);
        let class_id = entity_id(EntityKind::Class, self.path, &qualified, line_start, line_end);

        let mut props = PropertyBag::new();
        if self.options.include_docstrings {
            if let Some(body) = node.child_by_field_name("body") {
                if let Some(doc) = block_docstring(body, self.source) {
                    props.insert(PropKey::Docstring, PropValue::Str(doc));
                }
            }
        }
        if let Some(bases) = node.child_by_field_name("superclasses") {
            let base_names = self.argument_names(bases);
            if base_names.iter().any(|b| b == "ABC" || b == "abc.ABC") {
                props.insert(PropKey::IsAbstract, PropValue::Bool(true));
            }
            for base in &base_names {
                let (head, access_path) = split_dotted(base);
                self.push_reference_edge(
                    RelationKind::Inherits,
                    (class_id.clone(), EntityKind::Class),
                    head,
                    access_path,
                    PropertyBag::new(),
                );
            }
        }

        self.entities.push(Entity {
            id: class_id.clone(),
            kind: EntityKind::Class,
            name: name.clone(),
            file_path: self.path.to_path_buf(),
            line_start,
            line_end,
            props,
        });

        self.record_containment(&name, class_id.clone(), EntityKind::Class);
        self.push_decorator_edges(decorators, (class_id.clone(), EntityKind::Class), line_start);

        self.scopes.push(Scope {
            owner: (class_id, EntityKind::Class),
            names: HashMap::new(),
            is_class: true,
            segment: name,
        });
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_block(body, &[]);
        }
        self.scopes.pop();
    }

    fn handle_function(&mut self, node: Node<'a>, decorators: &[Node<'a>]) {
        let name = match node.child_by_field_name("name") {
            Some(n) => self.text(n).to_string(),
            None => return,
        };
        let in_class = self.scopes.last().map(|s| s.is_class).unwrap_or(false);
        let kind = if in_class {
            EntityKind::Method
        } else {
            EntityKind::Function
        };

        let (line_start, line_end) = Self::line_range(node);
        let qualified = self.qualify(&name);
        let function_id = entity_id(kind, self.path, &qualified, line_start, line_end);

        let is_async = node
            .children(&mut node.walk())
            .any(|c| c.kind() == "async");
        let body = node.child_by_field_name("body");
        let is_generator = body.map(|b| contains_yield(b)).unwrap_or(false);

        let mut props = PropertyBag::new();
        props.insert(PropKey::IsAsync, PropValue::Bool(is_async));
        props.insert(PropKey::IsGenerator, PropValue::Bool(is_generator));
        props.insert(
            PropKey::Complexity,
            PropValue::Int(cyclomatic_complexity(node)),
        );
        if let Some(params) = node.child_by_field_name("parameters") {
            props.insert(
                PropKey::Signature,
                PropValue::Str(self.text(params).to_string()),
            );
        }
        if let Some(ret) = node.child_by_field_name("return_type") {
            props.insert(
                PropKey::ReturnType,
                PropValue::Str(self.text(ret).to_string()),
            );
        }
        if self.options.include_docstrings {
            if let Some(b) = body {
                if let Some(doc) = block_docstring(b, self.source) {
                    props.insert(PropKey::Docstring, PropValue::Str(doc));
                }
            }
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

        self.record_containment(&name, function_id.clone(), kind);
        self.push_decorator_edges(decorators, (function_id.clone(), kind), line_start);

        self.scopes.push(Scope {
            owner: (function_id, kind),
            names: HashMap::new(),
            is_class: false,
            segment: name,
        });
        if let Some(b) = body {
            self.walk_block(b, &[]);
        }
        self.scopes.pop();
    }

    fn handle_import(&mut self, node: Node<'a>) {
        let (line_start, _) = Self::line_range(node);
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "dotted_name" => {
                    let module = self.text(child).to_string();
                    self.push_import(&module, None, None, false, line_start);
                }
                "aliased_import" => {
                    let module = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    let alias = child
                        .child_by_field_name("alias")
                        .map(|n| self.text(n).to_string());
                    self.push_import(&module, None, alias, false, line_start);
                }
                _ => {}
            }
        }
    }

    fn handle_import_from(&mut self, node: Node<'a>) {
        let (line_start, _) = Self::line_range(node);
        let module = node
            .child_by_field_name("module_name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            // Skip the module_name itself; remaining dotted_name /
            // aliased_import children are the imported names.
            if Some(child) == node.child_by_field_name("module_name") {
                continue;
            }
            match child.kind() {
                "dotted_name" | "identifier" => {
                    let member = self.text(child).to_string();
                    self.push_import(&module, Some(member), None, true, line_start);
                }
                "aliased_import" => {
                    let member = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    let alias = child
                        .child_by_field_name("alias")
                        .map(|n| self.text(n).to_string());
                    self.push_import(&module, Some(member), alias, true, line_start);
                }
                "wildcard_import" => {
                    self.push_import(&module, Some("*".to_string()), None, true, line_start);
                }
                _ => {}
            }
        }
    }

    fn push_import(
        &mut self,
        module: &str,
        member: Option<String>,
        alias: Option<String>,
        is_from: bool,
        line: i64,
    ) {
        if module.is_empty() {
            return;
        }
        let display = alias
            .clone()
            .or_else(|| member.clone())
            .unwrap_or_else(|| module.to_string());
        let qualified = match &member {
            Some(m) => format!("{}::import::{module}::{m}", self.module_name),
            None => format!("{}::import::{module}", self.module_name),
        };
        let import_id = entity_id(EntityKind::Import, self.path, &qualified, line, line);

        let mut props = PropertyBag::new();
        props.insert(PropKey::ModuleName, PropValue::Str(module.to_string()));
        if let Some(a) = &alias {
            props.insert(PropKey::Alias, PropValue::Str(a.clone()));
        }
        props.insert(PropKey::IsFromImport, PropValue::Bool(is_from));

        self.entities.push(Entity {
            id: import_id.clone(),
            kind: EntityKind::Import,
            name: display.clone(),
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

        // The Imports edge targets the textual module specifier; pass 2
        // resolves it to a File or an External.
        let mut edge_props = PropertyBag::new();
        edge_props.insert(
            PropKey::ImportType,
            PropValue::Str(if is_from { "from" } else { "plain" }.to_string()),
        );
        self.pending.push(PendingEdge {
            kind: RelationKind::Imports,
            source: PendingTarget::Entity {
                id: import_id,
                kind: EntityKind::Import,
            },
            target: PendingTarget::Module {
                specifier: module.to_string(),
            },
            props: edge_props,
        });

        // Track the local binding for reference resolution.
        if member.as_deref() != Some("*") {
            self.import_aliases.insert(
                display,
                ImportAlias {
                    specifier: module.to_string(),
                    member,
                },
            );
        }
    }

    fn handle_assignment(&mut self, node: Node<'a>) {
        // Variables are extracted at module and class scope only; function
        // bodies keep their bindings private.
        let in_function = self
            .scopes
            .last()
            .map(|s| s.owner.1.is_callable())
            .unwrap_or(false);
        if in_function {
            return;
        }

        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        let (line_start, _) = Self::line_range(node);
        let type_annotation = node
            .child_by_field_name("type")
            .map(|t| self.text(t).to_string());

        for name in self.target_names(left) {
            if name.starts_with('_') {
                continue;
            }
            let qualified = self.qualify(&name);
            let variable_id = entity_id(
                EntityKind::Variable,
                self.path,
                &qualified,
                line_start,
                line_start,
            );

            let mut props = PropertyBag::new();
            props.insert(
                PropKey::IsConstant,
                PropValue::Bool(name.chars().all(|c| !c.is_lowercase())),
            );
            if let Some(annotation) = &type_annotation {
                props.insert(PropKey::TypeAnnotation, PropValue::Str(annotation.clone()));
            }

            self.entities.push(Entity {
                id: variable_id.clone(),
                kind: EntityKind::Variable,
                name: name.clone(),
                file_path: self.path.to_path_buf(),
                line_start,
                line_end: line_start,
                props,
            });
            self.record_containment(&name, variable_id, EntityKind::Variable);
        }
    }

    /// Flatten assignment targets (identifier, tuple, list patterns).
    fn target_names(&self, node: Node) -> Vec<String> {
        match node.kind() {
            "identifier" => vec![self.text(node).to_string()],
            "pattern_list" | "tuple_pattern" | "list_pattern" => {
                let mut names = Vec::new();
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    names.extend(self.target_names(child));
                }
                names
            }
            _ => Vec::new(),
        }
    }

    // ---- reference handling ----

    fn handle_call(&mut self, node: Node<'a>) {
        let Some(callee) = node.child_by_field_name("function") else {
            return;
        };
        let Some(owner) = self.enclosing_callable() else {
            return;
        };
        let dotted = self.text(callee);
        if dotted.is_empty() || dotted.contains('(') {
            // Chained call receivers ((f())() etc.) are not statically
            // resolvable names.
            self.walk_block(callee, &[]);
            return;
        }
        let (line, _) = Self::line_range(node);
        let (head, access_path) = split_dotted(dotted);

        let mut props = PropertyBag::new();
        props.insert(
            PropKey::CallType,
            PropValue::Str("function_call".to_string()),
        );
        props.insert(PropKey::LineNumber, PropValue::Int(line));
        self.push_reference_edge(RelationKind::Calls, owner, head, access_path, props);
    }

    fn handle_attribute(&mut self, node: Node<'a>) {
        let Some(owner) = self.enclosing_callable() else {
            return;
        };
        let dotted = self.text(node);
        if dotted.is_empty() || dotted.contains('(') || dotted.contains('[') {
            self.walk_block(node, &[]);
            return;
        }
        let (line, _) = Self::line_range(node);
        let (head, access_path) = split_dotted(dotted);

        let mut props = PropertyBag::new();
        props.insert(PropKey::PropertyPath, PropValue::Str(dotted.to_string()));
        props.insert(PropKey::AccessLocation, PropValue::Int(line));
        self.push_reference_edge(RelationKind::Accesses, owner, head, access_path, props);
    }

    /// Emit a reference edge, resolving inside-out through the lexical
    /// chain first. Same-file hits become concrete targets immediately;
    /// everything else stays textual for pass 2.
    fn push_reference_edge(
        &mut self,
        kind: RelationKind,
        source: (EntityId, EntityKind),
        head: &str,
        access_path: Option<String>,
        props: PropertyBag,
    ) {
        // `self.x` inside a class resolves against the class members.
        if head == "self" {
            if let Some(member) = access_path
                .as_deref()
                .map(|p| split_dotted(p))
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
                    return;
                }
            }
            // Unresolvable self references stay local noise, not Externals.
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

    fn push_decorator_edges(
        &mut self,
        decorators: &[Node<'a>],
        target: (EntityId, EntityKind),
        line: i64,
    ) {
        for decorator in decorators {
            let text = self.text(*decorator);
            let name = text
                .trim_start_matches('@')
                .split('(')
                .next()
                .unwrap_or("")
                .trim();
            if name.is_empty() {
                continue;
            }
            let (head, access_path) = split_dotted(name);
            let mut props = PropertyBag::new();
            props.insert(PropKey::DecoratorName, PropValue::Str(name.to_string()));
            props.insert(PropKey::LineNumber, PropValue::Int(line));

            let source = match self.lookup_lexical(head) {
                Some((id, kind)) => PendingTarget::Entity { id, kind },
                None => PendingTarget::Name {
                    head: head.to_string(),
                    access_path,
                },
            };
            self.pending.push(PendingEdge {
                kind: RelationKind::Decorates,
                source,
                target: PendingTarget::Entity {
                    id: target.0.clone(),
                    kind: target.1,
                },
                props,
            });
        }
    }

    // ---- scope helpers ----

    /// Record a declaration in its enclosing scope and emit the single
    /// containment edge for it.
    fn record_containment(&mut self, name: &str, id: EntityId, kind: EntityKind) {
        let owner = self
            .scopes
            .last()
            .map(|s| s.owner.clone())
            .expect("module scope always present");

        let containment = match owner.1 {
            // Module-scope declarations attach to the File (one container
            // each); the Module entity holds the namespace and docstring.
            EntityKind::Module => None,
            k if k.is_class_like() => match kind {
                EntityKind::Method | EntityKind::Function => {
                    Some(RelationKind::ClassContainsFunction)
                }
                EntityKind::Variable => Some(RelationKind::ClassContainsVariable),
                _ => None,
            },
            k if k.is_callable() => match kind {
                EntityKind::Function => Some(RelationKind::FunctionContainsFunction),
                EntityKind::Variable => Some(RelationKind::FunctionContainsVariable),
                _ => None,
            },
            _ => None,
        };

        match containment {
            Some(edge_kind) => {
                self.pending.push(PendingEdge::resolved(
                    edge_kind,
                    owner.clone(),
                    (id.clone(), kind),
                ));
            }
            None => {
                // Fall back to the file container (e.g. nested classes,
                // which have no Class-to-Class containment edge kind).
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
        }
        if self.scopes.len() == 1 {
            // Top-level declarations are the file's addressable surface.
            self.local_names.insert(name.to_string(), (id.clone(), kind));
            self.exports.push((name.to_string(), id, kind));
        }
    }

    fn enclosing_callable(&self) -> Option<(EntityId, EntityKind)> {
        self.scopes
            .iter()
            .rev()
            .find(|s| s.owner.1.is_callable())
            .map(|s| s.owner.clone())
    }

    /// Inside-out lexical lookup: enclosing scopes, then file-level names.
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

    fn argument_names(&self, node: Node) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "identifier" | "attribute" => names.push(self.text(child).to_string()),
                "keyword_argument" => {
                    // metaclass=... and friends are not inheritance.
                }
                _ => {}
            }
        }
        names
    }
}

/// Split a dotted reference into its head and the remaining access path.
fn split_dotted(dotted: &str) -> (&str, Option<String>) {
    match dotted.split_once('.') {
        Some((head, rest)) => (head, Some(rest.to_string())),
        None => (dotted, None),
    }
}

/// Extract the docstring from the first statement of a block, if present.
fn block_docstring(block: Node, source: &str) -> Option<String> {
    let mut cursor = block.walk();
    for child in block.children(&mut cursor) {
        match child.kind() {
            "comment" => continue,
            "expression_statement" => {
                let inner = child.child(0)?;
                if inner.kind() == "string" {
                    let raw = inner.utf8_text(source.as_bytes()).ok()?;
                    return Some(strip_string_quotes(raw));
                }
                return None;
            }
            _ => return None,
        }
    }
    None
}

fn strip_string_quotes(raw: &str) -> String {
    let trimmed = raw
        .trim_start_matches(|c| c == 'r' || c == 'b' || c == 'u' || c == 'f' || c == 'R');
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if trimmed.starts_with(quote) && trimmed.ends_with(quote) && trimmed.len() >= 2 * quote.len()
        {
            return trimmed[quote.len()..trimmed.len() - quote.len()].to_string();
        }
    }
    trimmed.to_string()
}

/// Whether a function body yields (ignoring nested function bodies).
fn contains_yield(body: Node) -> bool {
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "yield" => return true,
            "function_definition" | "lambda" => continue,
            _ => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    stack.push(child);
                }
            }
        }
    }
    false
}

/// Cyclomatic complexity: one plus every branching construct in the body.
fn cyclomatic_complexity(node: Node) -> i64 {
    let mut complexity = 1;
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current.kind() {
            "if_statement" | "elif_clause" | "while_statement" | "for_statement"
            | "except_clause" | "with_statement" | "conditional_expression" => complexity += 1,
            "boolean_operator" => complexity += 1,
            _ => {}
        }
        let mut cursor = current.walk();
        for child in current.children(&mut cursor) {
            if child.kind() != "function_definition" {
                stack.push(child);
            }
        }
    }
    complexity
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
