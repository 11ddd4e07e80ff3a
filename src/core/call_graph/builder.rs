// src/core/call_graph/builder.rs
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;
use tree_sitter::{Node, Tree};

use crate::config::AnalysisConfig;
use crate::error::{CallMapError, Result};
use super::call_graph::{CodeGraph, LineIndex};
use super::classifier::{CallClassifier, Callback, Classification, SyntheticNode};
use super::container::{Container, ContainerResolver};
use super::syntax::{line_of, walk_with_ancestors, NodeKind, SourceText};

/// Nodes visited between deadline checks
const DEADLINE_CHECK_INTERVAL: usize = 1024;

/// Graph and declaration lines produced for one file
#[derive(Debug, Clone, Default)]
pub struct FileAnalysis {
    pub graph: CodeGraph,
    pub lines: LineIndex,
}

/// Walks one syntax tree and accumulates its call graph
pub struct GraphBuilder<'a> {
    rules: &'a AnalysisConfig,
    timeout: Option<Duration>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(rules: &'a AnalysisConfig) -> Self {
        Self { rules, timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the filtered call graph of `tree`, parsed from `code`
    pub fn build(&self, path: &Path, tree: &Tree, code: &str) -> Result<FileAnalysis> {
        let source = SourceText::new(code);
        let resolver = ContainerResolver::new(&source, &self.rules.iteration_methods);
        let classifier = CallClassifier::new(&source, path, self.rules);
        let deadline = self.timeout.map(|timeout| (Instant::now() + timeout, timeout));

        let mut analysis = FileAnalysis::default();
        let mut visited = 0usize;

        walk_with_ancestors(tree.root_node(), |node, ancestors| {
            visited += 1;
            if visited % DEADLINE_CHECK_INTERVAL == 0 {
                if let Some((deadline, timeout)) = deadline {
                    if Instant::now() >= deadline {
                        return Err(CallMapError::Timeout {
                            path: path.to_path_buf(),
                            millis: timeout.as_millis() as u64,
                        });
                    }
                }
            }
            visit(&mut analysis, &resolver, &classifier, node, ancestors)
        })?;

        let removed = analysis.graph.filter_noise();
        debug!(
            "{}: {} nodes, {} edges kept, {} noise edges dropped",
            path.display(),
            analysis.graph.len(),
            analysis.graph.edge_count(),
            removed
        );

        Ok(analysis)
    }
}

fn visit(
    analysis: &mut FileAnalysis,
    resolver: &ContainerResolver,
    classifier: &CallClassifier,
    node: Node,
    ancestors: &[Node],
) -> Result<()> {
    match NodeKind::of(&node) {
        NodeKind::CallExpression => {
            let classification = classifier.classify_call(&node)?;
            record_call(analysis, resolver, classification, ancestors)
        }
        NodeKind::NewExpression => {
            let classification = classifier.classify_new(&node)?;
            record_call(analysis, resolver, classification, ancestors)
        }
        NodeKind::FunctionDeclaration
        | NodeKind::GeneratorFunctionDeclaration
        | NodeKind::MethodDefinition
        | NodeKind::FunctionExpression
        | NodeKind::GeneratorFunction
        | NodeKind::ArrowFunction => {
            // declared but never called functions still become nodes;
            // closures only when bound to a variable, property or key
            if let Some(container) = resolver.declared(&node, ancestors)? {
                let name = container.name();
                let line = match &container {
                    Container::Bound { line, .. } => *line,
                    _ => line_of(&node),
                };
                analysis.graph.ensure_node(&name);
                analysis.lines.record(&name, line);
            }
            Ok(())
        }
        NodeKind::Program
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
        | NodeKind::Other => Ok(()),
    }
}

fn record_call(
    analysis: &mut FileAnalysis,
    resolver: &ContainerResolver,
    classification: Classification,
    ancestors: &[Node],
) -> Result<()> {
    let (synthetic, plain) = match classification {
        Classification::Ignored => return Ok(()),
        Classification::Skipped(reason) => {
            debug!("skipped call: {}", reason);
            return Ok(());
        }
        Classification::Plain { callee, line } => (None, Some((callee, line))),
        Classification::EventRegistration(node)
        | Classification::PlatformCallback(node)
        | Classification::ObserverConstruction(node) => (Some(node), None),
    };

    let container = resolver.resolve(ancestors)?;
    let from = container.name();
    if let Container::Bound { name, line } = &container {
        analysis.lines.record(name, *line);
    }
    analysis.graph.ensure_node(&from);

    if let Some((callee, line)) = plain {
        let callee = qualify_this(resolver, ancestors, callee)?;
        analysis.graph.add_edge(&from, line, callee);
    }
    if let Some(node) = synthetic {
        record_synthetic(analysis, resolver, ancestors, &from, node)?;
    }
    Ok(())
}

fn record_synthetic(
    analysis: &mut FileAnalysis,
    resolver: &ContainerResolver,
    ancestors: &[Node],
    from: &str,
    node: SyntheticNode,
) -> Result<()> {
    analysis.graph.ensure_node(&node.name);
    if let Some(callback) = &node.callback {
        let target = match callback {
            Callback::Closure { line } => {
                let target = callback.name();
                analysis.graph.ensure_node(&target);
                analysis.lines.record(&target, *line);
                target
            }
            Callback::Reference(name) => qualify_this(resolver, ancestors, name.clone())?,
        };
        analysis.graph.add_edge(&node.name, node.line, target);
    }
    analysis.graph.add_edge(from, node.line, node.name);
    Ok(())
}

/// `this.load` inside a method of `Player` -> `Player.load`, matching how
/// class methods are keyed
fn qualify_this(resolver: &ContainerResolver, ancestors: &[Node], callee: String) -> Result<String> {
    let Some(member) = callee.strip_prefix("this.") else {
        return Ok(callee);
    };
    if member.contains('.') {
        return Ok(callee);
    }
    match resolver.this_class(ancestors)? {
        Some(class_name) => Ok(format!("{}.{}", class_name, member)),
        None => Ok(callee),
    }
}
