// src/core/call_graph/mod.rs
//! Call graph construction for JavaScript and TypeScript files.
//!
//! One depth-first walk over a file's syntax tree attributes every call to
//! its innermost container, classifies it, and accumulates a per-file
//! [`CodeGraph`] which is then stripped of calls into code the file does
//! not define.

mod builder;
mod call_graph;
mod classifier;
mod container;
mod syntax;

pub use builder::{FileAnalysis, GraphBuilder};
pub use call_graph::{CodeGraph, LineIndex, RunIndex};
pub use container::TOP_LEVEL;

#[cfg(test)]
pub(crate) mod test_support {
    use tree_sitter::{Node, Parser, Tree};

    use super::syntax::{walk_with_ancestors, NodeKind, SourceText};

    pub fn parse_javascript(code: &str) -> Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::language())
            .unwrap();
        parser.parse(code, None).unwrap()
    }

    /// First call or construction whose callee text equals `callee`,
    /// together with its ancestors
    pub fn find_call<'t>(tree: &'t Tree, code: &str, callee: &str) -> (Node<'t>, Vec<Node<'t>>) {
        let source = SourceText::new(code);
        let mut found = None;
        walk_with_ancestors(tree.root_node(), |node, ancestors| {
            if found.is_some() {
                return Ok(());
            }
            let field = match NodeKind::of(&node) {
                NodeKind::CallExpression => "function",
                NodeKind::NewExpression => "constructor",
                _ => return Ok(()),
            };
            if let Some(target) = node.child_by_field_name(field) {
                if source.node_text(&target)? == callee {
                    found = Some((node, ancestors.to_vec()));
                }
            }
            Ok(())
        })
        .unwrap();
        found.unwrap_or_else(|| panic!("no call to {} in test source", callee))
    }

    pub fn ancestors_of_call<'t>(tree: &'t Tree, code: &str, callee: &str) -> Vec<Node<'t>> {
        find_call(tree, code, callee).1
    }
}
