// src/core/call_graph/syntax.rs
//! Thin, typed view over tree-sitter nodes: a closed set of node kinds the
//! engine understands and line-split source text extraction.

use tree_sitter::{Node, Point};

use crate::error::{CallMapError, Result};

/// Syntax node kinds the call graph engine distinguishes.
///
/// Every grammar kind not listed here maps to [`NodeKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Program,
    CallExpression,
    NewExpression,
    FunctionDeclaration,
    GeneratorFunctionDeclaration,
    FunctionExpression,
    GeneratorFunction,
    ArrowFunction,
    MethodDefinition,
    ClassDeclaration,
    ClassExpression,
    ClassBody,
    Object,
    Pair,
    AssignmentExpression,
    VariableDeclarator,
    MemberExpression,
    Arguments,
    Identifier,
    Comment,
    Other,
}

impl NodeKind {
    #[cfg(test)]
    pub const ALL: [NodeKind; 21] = [
        NodeKind::Program,
        NodeKind::CallExpression,
        NodeKind::NewExpression,
        NodeKind::FunctionDeclaration,
        NodeKind::GeneratorFunctionDeclaration,
        NodeKind::FunctionExpression,
        NodeKind::GeneratorFunction,
        NodeKind::ArrowFunction,
        NodeKind::MethodDefinition,
        NodeKind::ClassDeclaration,
        NodeKind::ClassExpression,
        NodeKind::ClassBody,
        NodeKind::Object,
        NodeKind::Pair,
        NodeKind::AssignmentExpression,
        NodeKind::VariableDeclarator,
        NodeKind::MemberExpression,
        NodeKind::Arguments,
        NodeKind::Identifier,
        NodeKind::Comment,
        NodeKind::Other,
    ];

    pub fn of(node: &Node) -> Self {
        Self::from_grammar(node.kind())
    }

    pub fn from_grammar(kind: &str) -> Self {
        match kind {
            "program" => NodeKind::Program,
            "call_expression" => NodeKind::CallExpression,
            "new_expression" => NodeKind::NewExpression,
            "function_declaration" => NodeKind::FunctionDeclaration,
            "generator_function_declaration" => NodeKind::GeneratorFunctionDeclaration,
            // older javascript grammars call function expressions "function"
            "function_expression" | "function" => NodeKind::FunctionExpression,
            "generator_function" => NodeKind::GeneratorFunction,
            "arrow_function" => NodeKind::ArrowFunction,
            "method_definition" => NodeKind::MethodDefinition,
            "class_declaration" | "abstract_class_declaration" => NodeKind::ClassDeclaration,
            "class" => NodeKind::ClassExpression,
            "class_body" => NodeKind::ClassBody,
            "object" => NodeKind::Object,
            "pair" => NodeKind::Pair,
            "assignment_expression" => NodeKind::AssignmentExpression,
            "variable_declarator" => NodeKind::VariableDeclarator,
            "member_expression" => NodeKind::MemberExpression,
            "arguments" => NodeKind::Arguments,
            "identifier" => NodeKind::Identifier,
            "comment" => NodeKind::Comment,
            _ => NodeKind::Other,
        }
    }

    /// Grammar kind names that map onto this variant
    #[cfg(test)]
    pub fn grammar_names(self) -> &'static [&'static str] {
        match self {
            NodeKind::Program => &["program"],
            NodeKind::CallExpression => &["call_expression"],
            NodeKind::NewExpression => &["new_expression"],
            NodeKind::FunctionDeclaration => &["function_declaration"],
            NodeKind::GeneratorFunctionDeclaration => &["generator_function_declaration"],
            NodeKind::FunctionExpression => &["function_expression", "function"],
            NodeKind::GeneratorFunction => &["generator_function"],
            NodeKind::ArrowFunction => &["arrow_function"],
            NodeKind::MethodDefinition => &["method_definition"],
            NodeKind::ClassDeclaration => &["class_declaration", "abstract_class_declaration"],
            NodeKind::ClassExpression => &["class"],
            NodeKind::ClassBody => &["class_body"],
            NodeKind::Object => &["object"],
            NodeKind::Pair => &["pair"],
            NodeKind::AssignmentExpression => &["assignment_expression"],
            NodeKind::VariableDeclarator => &["variable_declarator"],
            NodeKind::MemberExpression => &["member_expression"],
            NodeKind::Arguments => &["arguments"],
            NodeKind::Identifier => &["identifier"],
            NodeKind::Comment => &["comment"],
            NodeKind::Other => &[],
        }
    }

    /// Unnamed function values: arrow functions and function expressions
    pub fn is_closure(self) -> bool {
        matches!(
            self,
            NodeKind::FunctionExpression | NodeKind::GeneratorFunction | NodeKind::ArrowFunction
        )
    }
}

/// 1-indexed source line a node starts on
pub fn line_of(node: &Node) -> usize {
    node.start_position().row + 1
}

/// True when `child` is the node stored under `field` of `parent`
pub fn is_field(parent: &Node, field: &str, child: &Node) -> bool {
    parent
        .child_by_field_name(field)
        .map_or(false, |value| value.id() == child.id())
}

/// Named, non-comment children of a call's `arguments` node
pub fn call_arguments<'tree>(call: &Node<'tree>) -> Vec<Node<'tree>> {
    let Some(arguments) = call
        .child_by_field_name("arguments")
        .filter(|args| NodeKind::of(args) == NodeKind::Arguments)
    else {
        return Vec::new();
    };

    let mut cursor = arguments.walk();
    arguments
        .named_children(&mut cursor)
        .filter(|arg| NodeKind::of(arg) != NodeKind::Comment)
        .collect()
}

/// Depth-first pre-order walk handing every node its ancestor chain
/// (root first, the visited node excluded).
pub fn walk_with_ancestors<'tree, F>(root: Node<'tree>, mut visit: F) -> Result<()>
where
    F: FnMut(Node<'tree>, &[Node<'tree>]) -> Result<()>,
{
    let mut cursor = root.walk();
    let mut ancestors: Vec<Node<'tree>> = Vec::new();

    loop {
        let node = cursor.node();
        visit(node, &ancestors)?;

        if cursor.goto_first_child() {
            ancestors.push(node);
            continue;
        }

        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return Ok(());
            }
            ancestors.pop();
        }
    }
}

/// Source code split into lines for position-based extraction
pub struct SourceText<'a> {
    lines: Vec<&'a str>,
}

impl<'a> SourceText<'a> {
    pub fn new(code: &'a str) -> Self {
        Self {
            lines: code.split('\n').collect(),
        }
    }

    /// Text of a node; multi-line nodes have each line trimmed and joined
    pub fn node_text(&self, node: &Node) -> Result<String> {
        self.slice(node.start_position(), node.end_position())
    }

    /// Text between two positions (start column included, end column excluded)
    pub fn slice(&self, start: Point, end: Point) -> Result<String> {
        if end.row < start.row || (end.row == start.row && end.column < start.column) {
            return Err(CallMapError::MissingContext(format!(
                "range {}:{}..{}:{} is reversed",
                start.row + 1,
                start.column,
                end.row + 1,
                end.column
            )));
        }

        let first = self.line(start.row)?;
        if start.row == end.row {
            return first
                .get(start.column..end.column)
                .map(str::to_string)
                .ok_or_else(|| self.bad_column(start.row, end.column));
        }

        let mut parts = Vec::with_capacity(end.row - start.row + 1);
        let head = first
            .get(start.column..)
            .ok_or_else(|| self.bad_column(start.row, start.column))?;
        parts.push(head.trim());
        for row in (start.row + 1)..end.row {
            parts.push(self.line(row)?.trim());
        }
        let last = self.line(end.row)?;
        let tail = last
            .get(..end.column)
            .ok_or_else(|| self.bad_column(end.row, end.column))?;
        parts.push(tail.trim());

        Ok(parts.concat())
    }

    fn line(&self, row: usize) -> Result<&'a str> {
        self.lines.get(row).copied().ok_or_else(|| {
            CallMapError::MissingContext(format!(
                "line {} requested but the code has {} lines",
                row + 1,
                self.lines.len()
            ))
        })
    }

    fn bad_column(&self, row: usize, column: usize) -> CallMapError {
        CallMapError::MissingContext(format!("column {} is outside line {}", column, row + 1))
    }
}
