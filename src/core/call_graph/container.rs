// src/core/call_graph/container.rs
//! Attribution of a call site to its innermost executable unit.

use std::collections::HashSet;
use tree_sitter::Node;

use crate::error::Result;
use super::syntax::{is_field, line_of, NodeKind, SourceText};

/// Name of the synthetic root container
pub const TOP_LEVEL: &str = "top level";

/// Name given to an unnamed closure starting on `line`
pub fn anonymous_name(line: usize) -> String {
    format!("anonymous_function:{}", line)
}

/// The executable unit a call is attributed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    /// Code outside any function
    TopLevel,
    /// A named function declaration
    Function(String),
    /// A closure or method bound to a property, variable or class
    Bound { name: String, line: usize },
    /// An unnamed closure, tagged by its start line
    Anonymous { line: usize },
}

impl Container {
    pub fn name(&self) -> String {
        match self {
            Container::TopLevel => TOP_LEVEL.to_string(),
            Container::Function(name) => name.clone(),
            Container::Bound { name, .. } => name.clone(),
            Container::Anonymous { line } => anonymous_name(*line),
        }
    }
}

/// What a single ancestor contributes to resolution
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    NamedFunction(String),
    AssignedClosure { name: String, line: usize },
    TransparentClosure,
    AnonymousClosure { line: usize },
}

/// Scans ancestor chains back-to-front for the nearest enclosing container
pub struct ContainerResolver<'a> {
    source: &'a SourceText<'a>,
    iteration_methods: HashSet<&'a str>,
}

impl<'a> ContainerResolver<'a> {
    pub fn new(source: &'a SourceText<'a>, iteration_methods: &'a [String]) -> Self {
        Self {
            source,
            iteration_methods: iteration_methods.iter().map(String::as_str).collect(),
        }
    }

    /// Container of a node whose ancestors (root first) are given
    pub fn resolve(&self, ancestors: &[Node]) -> Result<Container> {
        for index in (0..ancestors.len()).rev() {
            match self.scope_of(&ancestors[index], &ancestors[..index])? {
                Some(Scope::NamedFunction(name)) => return Ok(Container::Function(name)),
                Some(Scope::AssignedClosure { name, line }) => {
                    return Ok(Container::Bound { name, line })
                }
                Some(Scope::AnonymousClosure { line }) => return Ok(Container::Anonymous { line }),
                Some(Scope::TransparentClosure) | None => continue,
            }
        }

        Ok(Container::TopLevel)
    }

    /// Container opened by a declaration node itself (function or method)
    pub fn declared(&self, node: &Node, ancestors: &[Node]) -> Result<Option<Container>> {
        let container = match self.scope_of(node, ancestors)? {
            Some(Scope::NamedFunction(name)) => Some(Container::Function(name)),
            Some(Scope::AssignedClosure { name, line }) => Some(Container::Bound { name, line }),
            Some(Scope::AnonymousClosure { .. }) | Some(Scope::TransparentClosure) | None => None,
        };
        Ok(container)
    }

    /// Class that `this` denotes at a node with the given ancestors.
    ///
    /// Arrow functions inherit `this`; any other function rebinds it.
    pub fn this_class(&self, ancestors: &[Node]) -> Result<Option<String>> {
        for index in (0..ancestors.len()).rev() {
            let node = &ancestors[index];
            match NodeKind::of(node) {
                NodeKind::ArrowFunction => continue,
                NodeKind::MethodDefinition => return self.class_of_method(&ancestors[..index]),
                NodeKind::FunctionDeclaration
                | NodeKind::GeneratorFunctionDeclaration
                | NodeKind::FunctionExpression
                | NodeKind::GeneratorFunction => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }

    /// Name of the class whose body directly holds a method
    fn class_of_method(&self, parents: &[Node]) -> Result<Option<String>> {
        let Some((body, outer)) = parents.split_last() else {
            return Ok(None);
        };
        if NodeKind::of(body) != NodeKind::ClassBody {
            return Ok(None);
        }
        match outer.last().and_then(|class| class.child_by_field_name("name")) {
            Some(name) => Ok(Some(self.source.node_text(&name)?)),
            None => Ok(None),
        }
    }

    fn scope_of(&self, node: &Node, parents: &[Node]) -> Result<Option<Scope>> {
        let scope = match NodeKind::of(node) {
            NodeKind::FunctionDeclaration | NodeKind::GeneratorFunctionDeclaration => {
                match node.child_by_field_name("name") {
                    Some(name) => Some(Scope::NamedFunction(self.source.node_text(&name)?)),
                    // `export default function () {}`
                    None => Some(Scope::AnonymousClosure { line: line_of(node) }),
                }
            }
            NodeKind::MethodDefinition => Some(self.method_scope(node, parents)?),
            NodeKind::FunctionExpression | NodeKind::GeneratorFunction | NodeKind::ArrowFunction => {
                Some(self.closure_scope(node, parents)?)
            }
            NodeKind::Program
            | NodeKind::CallExpression
            | NodeKind::NewExpression
            | NodeKind::ClassDeclaration
            | NodeKind::ClassExpression
            | NodeKind::ClassBody
            | NodeKind::Object
            | NodeKind::Pair
            | NodeKind::AssignmentExpression
            | NodeKind::VariableDeclarator
            | NodeKind::MemberExpression
            | NodeKind::Arguments
            | NodeKind::Identifier
            | NodeKind::Comment
            | NodeKind::Other => None,
        };
        Ok(scope)
    }

    fn closure_scope(&self, closure: &Node, parents: &[Node]) -> Result<Scope> {
        let anonymous = Scope::AnonymousClosure { line: line_of(closure) };
        let Some((parent, outer)) = parents.split_last() else {
            return Ok(anonymous);
        };

        let scope = match NodeKind::of(parent) {
            NodeKind::Pair if is_field(parent, "value", closure) => {
                let Some(key) = parent.child_by_field_name("key") else {
                    return Ok(anonymous);
                };
                let property = self.property_name(&key)?;
                Scope::AssignedClosure {
                    name: self.qualify(property, outer)?,
                    line: line_of(parent),
                }
            }
            NodeKind::AssignmentExpression if is_field(parent, "right", closure) => {
                match self.assignment_target(parent)? {
                    Some(target) => Scope::AssignedClosure {
                        name: target,
                        line: line_of(parent),
                    },
                    None => anonymous,
                }
            }
            NodeKind::VariableDeclarator if is_field(parent, "value", closure) => {
                match self.declarator_name(parent)? {
                    Some(name) => Scope::AssignedClosure {
                        name,
                        line: line_of(parent),
                    },
                    None => anonymous,
                }
            }
            NodeKind::Arguments => match outer.last() {
                Some(call) if self.is_iteration_call(call)? => Scope::TransparentClosure,
                _ => anonymous,
            },
            _ => anonymous,
        };

        Ok(scope)
    }

    fn method_scope(&self, method: &Node, parents: &[Node]) -> Result<Scope> {
        let line = line_of(method);
        let Some(name_node) = method.child_by_field_name("name") else {
            return Ok(Scope::AnonymousClosure { line });
        };
        let method_name = self.property_name(&name_node)?;

        let name = match parents.split_last() {
            Some((body, _)) if NodeKind::of(body) == NodeKind::ClassBody => {
                match self.class_of_method(parents)? {
                    Some(class_name) => format!("{}.{}", class_name, method_name),
                    None => method_name,
                }
            }
            // shorthand method inside an object literal
            Some((_, outer)) => self.qualify(method_name, outer)?,
            None => method_name,
        };

        Ok(Scope::AssignedClosure { name, line })
    }

    /// Prefix a property with the nearest enclosing assignment target
    fn qualify(&self, property: String, outer: &[Node]) -> Result<String> {
        for node in outer.iter().rev() {
            let target = match NodeKind::of(node) {
                NodeKind::AssignmentExpression => self.assignment_target(node)?,
                NodeKind::VariableDeclarator => self.declarator_name(node)?,
                _ => None,
            };
            if let Some(target) = target {
                return Ok(format!("{}.{}", target, property));
            }
        }
        Ok(property)
    }

    fn assignment_target(&self, assignment: &Node) -> Result<Option<String>> {
        match assignment.child_by_field_name("left") {
            Some(left)
                if matches!(
                    NodeKind::of(&left),
                    NodeKind::Identifier | NodeKind::MemberExpression
                ) =>
            {
                Ok(Some(self.source.node_text(&left)?))
            }
            _ => Ok(None),
        }
    }

    fn declarator_name(&self, declarator: &Node) -> Result<Option<String>> {
        match declarator.child_by_field_name("name") {
            Some(name) if NodeKind::of(&name) == NodeKind::Identifier => {
                Ok(Some(self.source.node_text(&name)?))
            }
            _ => Ok(None),
        }
    }

    fn property_name(&self, key: &Node) -> Result<String> {
        let text = self.source.node_text(key)?;
        Ok(text.trim_matches(|c| matches!(c, '"' | '\'' | '`')).to_string())
    }

    fn is_iteration_call(&self, call: &Node) -> Result<bool> {
        if NodeKind::of(call) != NodeKind::CallExpression {
            return Ok(false);
        }
        let Some(callee) = call.child_by_field_name("function") else {
            return Ok(false);
        };
        if NodeKind::of(&callee) != NodeKind::MemberExpression {
            return Ok(false);
        }
        match callee.child_by_field_name("property") {
            Some(property) => {
                let method = self.source.node_text(&property)?;
                Ok(self.iteration_methods.contains(method.as_str()))
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::call_graph::test_support::{ancestors_of_call, parse_javascript};

    fn iteration() -> Vec<String> {
        vec!["forEach".to_string(), "map".to_string(), "filter".to_string()]
    }

    fn container_of(code: &str, callee: &str) -> Container {
        let tree = parse_javascript(code);
        let source = SourceText::new(code);
        let methods = iteration();
        let resolver = ContainerResolver::new(&source, &methods);
        let ancestors = ancestors_of_call(&tree, code, callee);
        resolver.resolve(&ancestors).unwrap()
    }

    #[test]
    fn test_top_level_call() {
        assert_eq!(container_of("init();\n", "init"), Container::TopLevel);
        assert_eq!(Container::TopLevel.name(), "top level");
    }

    #[test]
    fn test_nearest_function_declaration_wins() {
        let code = "function outer() {\n  function inner() {\n    work();\n  }\n  inner();\n}\n";
        assert_eq!(container_of(code, "work"), Container::Function("inner".to_string()));
        assert_eq!(container_of(code, "inner"), Container::Function("outer".to_string()));
    }

    #[test]
    fn test_closure_nested_in_function_is_its_own_container() {
        let code = "function outer() {\n  setTimeout(function () {\n    work();\n  }, 10);\n}\n";
        assert_eq!(container_of(code, "work"), Container::Anonymous { line: 2 });
        assert_eq!(Container::Anonymous { line: 2 }.name(), "anonymous_function:2");
    }

    #[test]
    fn test_declaration_inside_closure_is_nearest() {
        let code = "setTimeout(() => {\n  function tick() {\n    work();\n  }\n});\n";
        assert_eq!(container_of(code, "work"), Container::Function("tick".to_string()));
    }

    #[test]
    fn test_object_property_qualified_by_assignment() {
        let code = "window.logger = {\n  setLevel: function (level) {\n    apply(level);\n  }\n};\n";
        assert_eq!(
            container_of(code, "apply"),
            Container::Bound {
                name: "window.logger.setLevel".to_string(),
                line: 2
            }
        );
    }

    #[test]
    fn test_object_property_without_assignment() {
        let code = "register({\n  run: () => {\n    work();\n  }\n});\n";
        assert_eq!(
            container_of(code, "work"),
            Container::Bound {
                name: "run".to_string(),
                line: 2
            }
        );
    }

    #[test]
    fn test_property_assignment_and_variable_binding() {
        let code = "obj.handler = function () {\n  work();\n};\nconst start = () => {\n  boot();\n};\n";
        assert_eq!(
            container_of(code, "work"),
            Container::Bound {
                name: "obj.handler".to_string(),
                line: 1
            }
        );
        assert_eq!(
            container_of(code, "boot"),
            Container::Bound {
                name: "start".to_string(),
                line: 4
            }
        );
    }

    #[test]
    fn test_iteration_callback_is_transparent() {
        let code = "function g() {\n  items.forEach(function (item) {\n    f(item);\n  });\n}\n";
        assert_eq!(container_of(code, "f"), Container::Function("g".to_string()));

        let top = "items.map((item) => f(item));\n";
        assert_eq!(container_of(top, "f"), Container::TopLevel);
    }

    #[test]
    fn test_non_iteration_callback_is_not_transparent() {
        let code = "function g() {\n  items.reduce(function (acc) {\n    f(acc);\n  });\n}\n";
        assert_eq!(container_of(code, "f"), Container::Anonymous { line: 2 });
    }

    #[test]
    fn test_this_class_through_arrow_functions() {
        let code = "class Player {\n  play() {\n    setTimeout(() => this.load(), 5);\n    [1].forEach(function () {\n      this.stop();\n    });\n  }\n}\nfunction free() {\n  this.reset();\n}\n";
        let tree = parse_javascript(code);
        let source = SourceText::new(code);
        let methods = iteration();
        let resolver = ContainerResolver::new(&source, &methods);

        let arrow = ancestors_of_call(&tree, code, "this.load");
        assert_eq!(resolver.this_class(&arrow).unwrap(), Some("Player".to_string()));

        let rebound = ancestors_of_call(&tree, code, "this.stop");
        assert_eq!(resolver.this_class(&rebound).unwrap(), None);

        let free = ancestors_of_call(&tree, code, "this.reset");
        assert_eq!(resolver.this_class(&free).unwrap(), None);
    }

    #[test]
    fn test_class_method_container() {
        let code = "class Player {\n  play() {\n    this.load();\n  }\n}\n";
        assert_eq!(
            container_of(code, "this.load"),
            Container::Bound {
                name: "Player.play".to_string(),
                line: 2
            }
        );
    }
}
