// src/core/call_graph/classifier.rs
//! Decides what a call or construction contributes to the graph.
//!
//! Most calls are plain edges. Event registrations, host platform callback
//! APIs and observer constructions are instead turned into synthetic nodes
//! named after the call itself, so the registered callback hangs off a
//! readable node rather than an anonymous closure.

use std::collections::HashSet;
use std::path::Path;
use tree_sitter::Node;

use crate::config::{AnalysisConfig, CallbackPosition, PlatformRule};
use crate::error::{CallMapError, Result};
use super::container::anonymous_name;
use super::syntax::{call_arguments, line_of, NodeKind, SourceText};

/// Callback handed to a registration or construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    /// A plain reference such as `handler` or `this.onClick`
    Reference(String),
    /// An inline closure starting on `line`
    Closure { line: usize },
}

impl Callback {
    pub fn name(&self) -> String {
        match self {
            Callback::Reference(name) => name.clone(),
            Callback::Closure { line } => anonymous_name(*line),
        }
    }
}

/// A call that appears in the graph as a node of its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticNode {
    /// `<label>:<line>`, unique within a file
    pub name: String,
    /// Line of the call site
    pub line: usize,
    pub callback: Option<Callback>,
}

impl SyntheticNode {
    fn new(label: &str, line: usize, callback: Option<Callback>) -> Self {
        Self {
            name: format!("{}:{}", label, line),
            line,
            callback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    EventRegistration(SyntheticNode),
    PlatformCallback(SyntheticNode),
    ObserverConstruction(SyntheticNode),
    /// Edge straight to the callee's short name
    Plain { callee: String, line: usize },
    /// Recognised but contributes nothing, with the reason
    Skipped(String),
    /// No usable callee name (e.g. an immediately invoked closure)
    Ignored,
}

pub struct CallClassifier<'a> {
    source: &'a SourceText<'a>,
    file: &'a Path,
    event_method: &'a str,
    observer_constructors: HashSet<&'a str>,
    platform_rules: &'a [PlatformRule],
}

impl<'a> CallClassifier<'a> {
    pub fn new(source: &'a SourceText<'a>, file: &'a Path, rules: &'a AnalysisConfig) -> Self {
        Self {
            source,
            file,
            event_method: &rules.event_method,
            observer_constructors: rules.observer_constructors.iter().map(String::as_str).collect(),
            platform_rules: &rules.platform_rules,
        }
    }

    /// Classify a `call_expression` node
    pub fn classify_call(&self, call: &Node) -> Result<Classification> {
        let line = line_of(call);
        let callee = call.child_by_field_name("function");
        let arguments = call_arguments(call);

        if let Some(callee) = callee.filter(|c| NodeKind::of(c) == NodeKind::MemberExpression) {
            if self.member_property(&callee)?.as_deref() == Some(self.event_method) {
                if let Some(handler) = arguments.get(1) {
                    let label = self.registration_label(call, handler)?;
                    let callback = self.event_callback(handler)?;
                    return Ok(Classification::EventRegistration(SyntheticNode::new(
                        &label, line, callback,
                    )));
                }
            }
        }

        if let Some(rule) = self.platform_rule(callee.as_ref())? {
            let short_name = self.short_name(call)?;
            let argument = match rule.callback {
                CallbackPosition::Last => arguments.last(),
                CallbackPosition::Index(index) => arguments.get(index),
            };
            return match argument.map(|arg| self.callback(arg)).transpose()?.flatten() {
                Some(callback) => Ok(Classification::PlatformCallback(SyntheticNode::new(
                    &short_name,
                    line,
                    Some(callback),
                ))),
                None => Ok(Classification::Skipped(format!(
                    "{} at line {} has no callback argument",
                    short_name, line
                ))),
            };
        }

        let short_name = self.short_name(call)?;
        if short_name.is_empty() {
            return Ok(Classification::Ignored);
        }
        Ok(Classification::Plain {
            callee: short_name,
            line,
        })
    }

    /// Classify a `new_expression` node
    pub fn classify_new(&self, construction: &Node) -> Result<Classification> {
        let line = line_of(construction);
        let Some(constructor) = construction.child_by_field_name("constructor") else {
            return Ok(Classification::Ignored);
        };
        let name = self.source.node_text(&constructor)?;

        if NodeKind::of(&constructor) == NodeKind::Identifier
            && self.observer_constructors.contains(name.as_str())
        {
            let arguments = call_arguments(construction);
            let callback = match arguments.first() {
                Some(argument) => self.callback(argument)?,
                None => None,
            };
            return match callback {
                Some(callback) => Ok(Classification::ObserverConstruction(SyntheticNode::new(
                    &name,
                    line,
                    Some(callback),
                ))),
                None => Err(CallMapError::InputShape {
                    file: self.file.to_path_buf(),
                    line,
                    message: format!(
                        "{} expects an identifier or inline function as its callback",
                        name
                    ),
                }),
            };
        }

        if name.is_empty() || name.contains('(') {
            return Ok(Classification::Ignored);
        }
        Ok(Classification::Plain { callee: name, line })
    }

    /// Call text up to its first parenthesis
    fn short_name(&self, call: &Node) -> Result<String> {
        let text = self.source.node_text(call)?;
        Ok(text.split('(').next().unwrap_or_default().trim().to_string())
    }

    /// `el.addEventListener("click", handler)` becomes `el.addEventListener(click)`
    fn registration_label(&self, call: &Node, handler: &Node) -> Result<String> {
        let head = self.source.slice(call.start_position(), handler.start_position())?;
        let head = head.trim_end().trim_end_matches(',').trim_end();
        let unquoted: String = head
            .chars()
            .filter(|c| !matches!(c, '"' | '\'' | '`'))
            .collect();
        Ok(format!("{})", unquoted))
    }

    /// Identifier or inline closure, the only callback shapes recognised
    fn callback(&self, argument: &Node) -> Result<Option<Callback>> {
        let kind = NodeKind::of(argument);
        if kind == NodeKind::Identifier {
            return Ok(Some(Callback::Reference(self.source.node_text(argument)?)));
        }
        if kind.is_closure() {
            return Ok(Some(Callback::Closure {
                line: line_of(argument),
            }));
        }
        Ok(None)
    }

    /// Event handlers may also be member references like `this.onClick`
    fn event_callback(&self, argument: &Node) -> Result<Option<Callback>> {
        match self.callback(argument)? {
            Some(callback) => Ok(Some(callback)),
            None if NodeKind::of(argument) == NodeKind::MemberExpression => Ok(Some(
                Callback::Reference(self.source.node_text(argument)?),
            )),
            None => Ok(None),
        }
    }

    fn member_property(&self, member: &Node) -> Result<Option<String>> {
        match member.child_by_field_name("property") {
            Some(property) => Ok(Some(self.source.node_text(&property)?)),
            None => Ok(None),
        }
    }

    fn platform_rule(&self, callee: Option<&Node>) -> Result<Option<&'a PlatformRule>> {
        let Some(callee) = callee else {
            return Ok(None);
        };
        let Some(namespace) = self.leftmost_identifier(callee)? else {
            return Ok(None);
        };
        Ok(self.platform_rules.iter().find(|rule| rule.namespace == namespace))
    }

    /// `chrome.storage.local.get` -> `chrome`
    fn leftmost_identifier(&self, callee: &Node) -> Result<Option<String>> {
        let mut current = *callee;
        loop {
            let next = match NodeKind::of(&current) {
                NodeKind::Identifier => return Ok(Some(self.source.node_text(&current)?)),
                NodeKind::MemberExpression => current.child_by_field_name("object"),
                NodeKind::CallExpression => current.child_by_field_name("function"),
                _ => None,
            };
            match next {
                Some(node) => current = node,
                None => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::call_graph::test_support::{find_call, parse_javascript};

    fn classify(code: &str, callee: &str) -> Result<Classification> {
        classify_with(code, callee, &AnalysisConfig::default())
    }

    fn classify_with(code: &str, callee: &str, rules: &AnalysisConfig) -> Result<Classification> {
        let tree = parse_javascript(code);
        let source = SourceText::new(code);
        let file = Path::new("app.js");
        let classifier = CallClassifier::new(&source, file, rules);
        let (node, _) = find_call(&tree, code, callee);
        if node.kind() == "new_expression" {
            classifier.classify_new(&node)
        } else {
            classifier.classify_call(&node)
        }
    }

    #[test]
    fn test_plain_call_uses_short_name() {
        let result = classify("function g() {\n  console.log('hi', 1);\n}\n", "console.log").unwrap();
        assert_eq!(
            result,
            Classification::Plain {
                callee: "console.log".to_string(),
                line: 2
            }
        );
    }

    #[test]
    fn test_event_registration_with_reference() {
        let code = "function g() {\n  el.addEventListener(\"click\", handler);\n}\n";
        let result = classify(code, "el.addEventListener").unwrap();
        assert_eq!(
            result,
            Classification::EventRegistration(SyntheticNode {
                name: "el.addEventListener(click):2".to_string(),
                line: 2,
                callback: Some(Callback::Reference("handler".to_string())),
            })
        );
    }

    #[test]
    fn test_event_registration_with_inline_closure() {
        let code = "button.addEventListener('keyup',\n  (event) => {\n    send(event);\n  });\n";
        let Classification::EventRegistration(node) = classify(code, "button.addEventListener").unwrap() else {
            panic!("expected an event registration");
        };
        assert_eq!(node.name, "button.addEventListener(keyup):1");
        assert_eq!(node.callback, Some(Callback::Closure { line: 2 }));
        assert_eq!(node.callback.unwrap().name(), "anonymous_function:2");
    }

    #[test]
    fn test_event_registration_with_member_handler() {
        let code = "this.el.addEventListener(\"scroll\", this.onScroll);\n";
        let Classification::EventRegistration(node) = classify(code, "this.el.addEventListener").unwrap() else {
            panic!("expected an event registration");
        };
        assert_eq!(node.callback, Some(Callback::Reference("this.onScroll".to_string())));
    }

    #[test]
    fn test_event_method_without_handler_is_plain() {
        let result = classify("el.addEventListener(options);\n", "el.addEventListener").unwrap();
        assert!(matches!(result, Classification::Plain { .. }));
    }

    #[test]
    fn test_platform_callback_last_argument() {
        let code = "chrome.storage.local.get(['lang'], function (items) {\n  apply(items);\n});\n";
        let result = classify(code, "chrome.storage.local.get").unwrap();
        assert_eq!(
            result,
            Classification::PlatformCallback(SyntheticNode {
                name: "chrome.storage.local.get:1".to_string(),
                line: 1,
                callback: Some(Callback::Closure { line: 1 }),
            })
        );
    }

    #[test]
    fn test_platform_call_without_callback_is_skipped() {
        let result = classify("chrome.runtime.sendMessage({ type: 'ping' });\n", "chrome.runtime.sendMessage").unwrap();
        assert!(matches!(result, Classification::Skipped(_)));
    }

    #[test]
    fn test_platform_rule_table_is_configurable() {
        let mut rules = AnalysisConfig::default();
        rules.platform_rules = vec![PlatformRule {
            namespace: "figma".to_string(),
            callback: CallbackPosition::Index(1),
        }];
        let code = "figma.on('selectionchange', onSelection, { once: true });\n";
        let Classification::PlatformCallback(node) = classify_with(code, "figma.on", &rules).unwrap() else {
            panic!("expected a platform callback");
        };
        assert_eq!(node.name, "figma.on:1");
        assert_eq!(node.callback, Some(Callback::Reference("onSelection".to_string())));

        let chrome = classify_with("chrome.tabs.query({}, cb);\n", "chrome.tabs.query", &rules).unwrap();
        assert!(matches!(chrome, Classification::Plain { .. }));
    }

    #[test]
    fn test_observer_construction() {
        let code = "const observer = new MutationObserver(onMutation);\n";
        let result = classify(code, "MutationObserver").unwrap();
        assert_eq!(
            result,
            Classification::ObserverConstruction(SyntheticNode {
                name: "MutationObserver:1".to_string(),
                line: 1,
                callback: Some(Callback::Reference("onMutation".to_string())),
            })
        );
    }

    #[test]
    fn test_observer_with_unsupported_callback_is_input_error() {
        let code = "const observer = new IntersectionObserver(handlers.visible);\n";
        let error = classify(code, "IntersectionObserver").unwrap_err();
        assert!(matches!(error, CallMapError::InputShape { line: 1, .. }));
    }

    #[test]
    fn test_other_constructions_are_plain() {
        let result = classify("const p = new Player(config);\n", "Player").unwrap();
        assert_eq!(
            result,
            Classification::Plain {
                callee: "Player".to_string(),
                line: 1
            }
        );
    }

    #[test]
    fn test_immediately_invoked_closure_is_ignored() {
        let code = "(function () {\n  boot();\n})();\n";
        let result = classify(code, "(function () {boot();})").unwrap();
        assert_eq!(result, Classification::Ignored);
    }
}
