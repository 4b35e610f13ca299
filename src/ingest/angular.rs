//! Framework-decorator step.
//!
//! After pass 1 of a tree-sitter file, a class carrying a recognized
//! decorator is rekinded: the identity tuple is preserved (the rekind
//! happens before identities are computed) but the kind becomes the
//! decorator-specific one, so the plain Class is replaced, never
//! duplicated. Decorator metadata is parsed from the call's object
//! literal: selector strings become properties, `templateUrl` and
//! `styleUrls` become pending UsesTemplate/UsesStyles edges, and inline
//! `template`/`styles` stay properties with no edges.

use crate::model::{
    EntityId, EntityKind, PendingEdge, PendingTarget, PropKey, PropValue, PropertyBag,
    RelationKind,
};
use tree_sitter::Node;

/// Parsed decorator annotation: name plus the recognized metadata keys.
#[derive(Debug, Clone, Default)]
pub struct DecoratorMeta {
    /// Decorator name without the `@` (e.g. `Component`).
    pub name: String,
    /// Line of the decorator (1-based).
    pub line: i64,
    /// `selector` metadata string.
    pub selector: Option<String>,
    /// `templateUrl` path expression.
    pub template_url: Option<String>,
    /// `styleUrl` / `styleUrls` path expressions.
    pub style_urls: Vec<String>,
    /// Inline `template` payload.
    pub inline_template: Option<String>,
    /// Inline `styles` payload.
    pub inline_styles: Option<String>,
    /// `providedIn` metadata string.
    pub provided_in: Option<String>,
    /// `standalone` flag.
    pub standalone: Option<bool>,
}

/// The decorator-specific kind a recognized decorator rekinds a class to.
pub fn recognized_kind(decorator_name: &str) -> Option<EntityKind> {
    match decorator_name {
        "Component" => Some(EntityKind::Component),
        "Injectable" => Some(EntityKind::Service),
        "Directive" => Some(EntityKind::Directive),
        "Pipe" => Some(EntityKind::Pipe),
        "NgModule" => Some(EntityKind::NgModule),
        _ => None,
    }
}

/// Parse a `decorator` node into its name and metadata.
pub fn parse_decorator(node: Node, source: &str) -> Option<DecoratorMeta> {
    let text = |n: Node| n.utf8_text(source.as_bytes()).unwrap_or("");
    let line = node.start_position().row as i64 + 1;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                // Bare decorator without arguments, e.g. `@Injectable`.
                return Some(DecoratorMeta {
                    name: text(child).to_string(),
                    line,
                    ..DecoratorMeta::default()
                });
            }
            "call_expression" => {
                let name = child
                    .child_by_field_name("function")
                    .map(|f| text(f).to_string())?;
                let mut meta = DecoratorMeta {
                    name,
                    line,
                    ..DecoratorMeta::default()
                };
                if let Some(args) = child.child_by_field_name("arguments") {
                    let mut args_cursor = args.walk();
                    for arg in args.children(&mut args_cursor) {
                        if arg.kind() == "object" {
                            parse_object_literal(arg, source, &mut meta);
                        }
                    }
                }
                return Some(meta);
            }
            "member_expression" => {
                return Some(DecoratorMeta {
                    name: text(child).to_string(),
                    line,
                    ..DecoratorMeta::default()
                });
            }
            _ => {}
        }
    }
    None
}

fn parse_object_literal(object: Node, source: &str, meta: &mut DecoratorMeta) {
    let text = |n: Node| n.utf8_text(source.as_bytes()).unwrap_or("");

    let mut cursor = object.walk();
    for pair in object.children(&mut cursor) {
        if pair.kind() != "pair" {
            continue;
        }
        let Some(key_node) = pair.child_by_field_name("key") else {
            continue;
        };
        let Some(value_node) = pair.child_by_field_name("value") else {
            continue;
        };
        let key = unquote(text(key_node));

        match key.as_str() {
            "selector" => meta.selector = Some(unquote(text(value_node))),
            "templateUrl" => meta.template_url = Some(unquote(text(value_node))),
            "template" => meta.inline_template = Some(unquote(text(value_node))),
            "styles" => meta.inline_styles = Some(text(value_node).to_string()),
            "providedIn" => meta.provided_in = Some(unquote(text(value_node))),
            "standalone" => meta.standalone = Some(text(value_node).trim() == "true"),
            "styleUrl" => meta.style_urls.push(unquote(text(value_node))),
            "styleUrls" => {
                // Array or scalar, both appear in the wild.
                if value_node.kind() == "array" {
                    let mut array_cursor = value_node.walk();
                    for item in value_node.children(&mut array_cursor) {
                        if item.kind() == "string" || item.kind() == "template_string" {
                            meta.style_urls.push(unquote(text(item)));
                        }
                    }
                } else {
                    meta.style_urls.push(unquote(text(value_node)));
                }
            }
            _ => {}
        }
    }
}

/// Apply a recognized decorator's metadata to the rekinded class: store
/// selector and flags as properties and emit the pending framework edges.
pub fn apply_metadata(
    meta: &DecoratorMeta,
    class: (&EntityId, EntityKind),
    props: &mut PropertyBag,
    pending: &mut Vec<PendingEdge>,
) {
    let (class_id, class_kind) = class;

    if let Some(selector) = &meta.selector {
        props.insert(PropKey::Selector, PropValue::Str(selector.clone()));
    }
    if let Some(provided_in) = &meta.provided_in {
        props.insert(PropKey::ProvidedIn, PropValue::Str(provided_in.clone()));
    }
    if let Some(standalone) = meta.standalone {
        props.insert(PropKey::Standalone, PropValue::Bool(standalone));
    }
    // Inline payloads are properties of the component, never edges.
    if let Some(template) = &meta.inline_template {
        props.insert(PropKey::Template, PropValue::Str(template.clone()));
    }
    if let Some(styles) = &meta.inline_styles {
        props.insert(PropKey::Styles, PropValue::Str(styles.clone()));
    }

    if let Some(template_url) = &meta.template_url {
        let mut edge_props = PropertyBag::new();
        edge_props.insert(
            PropKey::TemplatePath,
            PropValue::Str(template_url.clone()),
        );
        if let Some(selector) = &meta.selector {
            edge_props.insert(
                PropKey::ComponentSelector,
                PropValue::Str(selector.clone()),
            );
        }
        pending.push(PendingEdge {
            kind: RelationKind::UsesTemplate,
            source: PendingTarget::Entity {
                id: class_id.clone(),
                kind: class_kind,
            },
            target: PendingTarget::Template {
                path: template_url.clone(),
            },
            props: edge_props,
        });
    }

    for style_url in &meta.style_urls {
        let mut edge_props = PropertyBag::new();
        edge_props.insert(PropKey::StylePath, PropValue::Str(style_url.clone()));
        if let Some(selector) = &meta.selector {
            edge_props.insert(
                PropKey::ComponentSelector,
                PropValue::Str(selector.clone()),
            );
        }
        pending.push(PendingEdge {
            kind: RelationKind::UsesStyles,
            source: PendingTarget::Entity {
                id: class_id.clone(),
                kind: class_kind,
            },
            target: PendingTarget::Style {
                path: style_url.clone(),
            },
            props: edge_props,
        });
    }
}

fn unquote(raw: &str) -> String {
    super::typescript::strip_quotes(raw).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{FrontEnd, FrontEndOptions};
    use crate::ingest::typescript::TypeScriptFrontEnd;

    const COMPONENT: &str = r#"
import { Component } from '@angular/core';

@Component({
  selector: 'app-x',
  templateUrl: './x.component.html',
  styleUrls: ['./x.component.scss'],
})
export class X {
  render(): void {}
}
"#;

    fn parse(name: &str, source: &str) -> crate::model::FileParse {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, source).unwrap();
        TypeScriptFrontEnd::new(FrontEndOptions::default()).parse_file(&path)
    }

    #[test]
    fn recognized_decorators_map_to_kinds() {
        assert_eq!(recognized_kind("Component"), Some(EntityKind::Component));
        assert_eq!(recognized_kind("Injectable"), Some(EntityKind::Service));
        assert_eq!(recognized_kind("Pipe"), Some(EntityKind::Pipe));
        assert_eq!(recognized_kind("Custom"), None);
    }

    #[test]
    fn component_class_is_rekinded_not_duplicated() {
        let parse = parse("x.component.ts", COMPONENT);
        let components: Vec<_> = parse
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::Component)
            .collect();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].name, "X");
        // No residual plain Class shadow.
        assert!(parse.entities.iter().all(|e| e.kind != EntityKind::Class));
    }

    #[test]
    fn component_metadata_becomes_properties_and_edges() {
        let parse = parse("x.component.ts", COMPONENT);
        let component = parse
            .entities
            .iter()
            .find(|e| e.kind == EntityKind::Component)
            .unwrap();
        assert_eq!(
            component.props.get(&PropKey::Selector),
            Some(&PropValue::Str("app-x".to_string()))
        );

        let template = parse
            .pending
            .iter()
            .find(|e| e.kind == RelationKind::UsesTemplate)
            .expect("template edge");
        assert!(matches!(
            &template.target,
            PendingTarget::Template { path } if path == "./x.component.html"
        ));

        let styles = parse
            .pending
            .iter()
            .find(|e| e.kind == RelationKind::UsesStyles)
            .expect("styles edge");
        assert!(matches!(
            &styles.target,
            PendingTarget::Style { path } if path == "./x.component.scss"
        ));
    }

    #[test]
    fn inline_template_is_a_property_without_edge() {
        let parse = parse(
            "inline.component.ts",
            "@Component({ selector: 'app-i', template: '<p>hi</p>' })\nexport class I {}\n",
        );
        let component = parse
            .entities
            .iter()
            .find(|e| e.kind == EntityKind::Component)
            .unwrap();
        assert_eq!(
            component.props.get(&PropKey::Template),
            Some(&PropValue::Str("<p>hi</p>".to_string()))
        );
        assert!(parse
            .pending
            .iter()
            .all(|e| e.kind != RelationKind::UsesTemplate));
    }

    #[test]
    fn injectable_rekinds_to_service() {
        let parse = parse(
            "data.service.ts",
            "@Injectable({ providedIn: 'root' })\nexport class DataService {}\n",
        );
        let service = parse
            .entities
            .iter()
            .find(|e| e.kind == EntityKind::Service)
            .expect("service entity");
        assert_eq!(service.name, "DataService");
        assert_eq!(
            service.props.get(&PropKey::ProvidedIn),
            Some(&PropValue::Str("root".to_string()))
        );
    }

    #[test]
    fn rekind_is_idempotent_across_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.component.ts");
        std::fs::write(&path, COMPONENT).unwrap();
        let fe = TypeScriptFrontEnd::new(FrontEndOptions::default());
        let first = fe.parse_file(&path);
        let second = fe.parse_file(&path);

        let component_id = |p: &crate::model::FileParse| {
            p.entities
                .iter()
                .find(|e| e.kind == EntityKind::Component)
                .map(|e| e.id.clone())
                .unwrap()
        };
        assert_eq!(component_id(&first), component_id(&second));
    }
}
