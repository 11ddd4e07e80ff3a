// src/core/diagram.rs
//! Mermaid flowchart rendering of per-file call graphs.
//!
//! Every node gets exactly one `click` statement binding it to a source
//! line, so the renderer can open the code behind any node. Edges carry
//! ids of their own so they can be clicked independently.

use regex::Regex;
use std::collections::HashSet;

use super::call_graph::{CodeGraph, LineIndex, TOP_LEVEL};

/// Node id of the synthetic root container
const TOP_LEVEL_ID: &str = "top_level";

/// Words mermaid reserves in flowcharts, unusable as bare node ids
const RESERVED_IDS: &[&str] = &[
    "end", "graph", "flowchart", "subgraph", "click", "call", "href", "style",
    "class", "classDef", "linkStyle", "direction", "default",
];

/// How a graph node is written in the diagram
#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeRef {
    /// Bare identifier used by `click` statements
    id: String,
    /// Form used in edge and node statements
    declaration: String,
}

/// Renders call graphs as Mermaid flowchart text
pub struct MermaidRenderer {
    plain_id_regex: Regex,
}

impl MermaidRenderer {
    pub fn new() -> Self {
        Self {
            plain_id_regex: Regex::new(r"^[A-Za-z0-9_.:]+$").expect("Invalid node id regex"),
        }
    }

    /// Render one file's graph. `lines` supplies declaration lines for
    /// click metadata; synthetic names fall back to their `:<line>` suffix.
    pub fn render(&self, file_path: &str, graph: &CodeGraph, lines: Option<&LineIndex>) -> String {
        let mut result = String::new();
        result.push_str(&format!("---\n{}\n---\n", file_path));
        result.push_str("flowchart LR\n");

        // Pass 1: node and edge statements
        let mut edge_ids = HashSet::new();
        for (name, edges) in graph.iter() {
            let from = self.node_ref(name);
            if edges.is_empty() {
                result.push_str(&format!("{}\n", from.declaration));
                continue;
            }
            for edge in edges {
                let to = self.node_ref(&edge.callee);
                let edge_id = unique_edge_id(&mut edge_ids, &edge.callee, edge.line);
                result.push_str(&format!("{} {}@--> {}\n", from.declaration, edge_id, to.declaration));
            }
        }

        // Pass 2: one click statement per node
        for name in graph.node_names() {
            let node = self.node_ref(name);
            let line = lines
                .and_then(|index| index.get(name))
                .or_else(|| trailing_line(name))
                .unwrap_or(1);
            result.push_str(&format!(
                "click {} call callback(\"{}\", {})\n",
                node.id, node.id, line
            ));
        }

        result
    }

    fn node_ref(&self, name: &str) -> NodeRef {
        if name == TOP_LEVEL {
            return NodeRef {
                id: TOP_LEVEL_ID.to_string(),
                declaration: format!("{}[{}]", TOP_LEVEL_ID, TOP_LEVEL),
            };
        }

        if self.plain_id_regex.is_match(name) && !is_reserved(name) {
            return NodeRef {
                id: name.to_string(),
                declaration: name.to_string(),
            };
        }

        // e.g. `el.addEventListener(click):12`: keep the literal text as a label
        let id = sanitize_id(name);
        NodeRef {
            declaration: format!("{}[\"{}\"]", id, escape_label(name)),
            id,
        }
    }
}

impl Default for MermaidRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace everything outside `[A-Za-z0-9_]` with `_`
fn sanitize_id(name: &str) -> String {
    let id: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if is_reserved(&id) {
        format!("n_{}", id)
    } else {
        id
    }
}

/// Mermaid keywords and the id taken by the root container
fn is_reserved(id: &str) -> bool {
    id == TOP_LEVEL_ID || RESERVED_IDS.contains(&id)
}

fn escape_label(name: &str) -> String {
    name.replace('"', "#quot;")
}

fn unique_edge_id(used: &mut HashSet<String>, callee: &str, line: usize) -> String {
    let base = format!("e_{}_{}", sanitize_id(callee), line);
    let mut candidate = base.clone();
    let mut suffix = 1;
    while !used.insert(candidate.clone()) {
        suffix += 1;
        candidate = format!("{}_{}", base, suffix);
    }
    candidate
}

/// `anonymous_function:12` -> 12
fn trailing_line(name: &str) -> Option<usize> {
    name.rsplit_once(':')
        .and_then(|(_, line)| line.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> (CodeGraph, LineIndex) {
        let mut graph = CodeGraph::default();
        let mut lines = LineIndex::default();
        graph.ensure_node("f");
        lines.record("f", 1);
        graph.add_edge("g", 3, "f");
        graph.add_edge("g", 4, "f");
        lines.record("g", 2);
        graph.add_edge("g", 5, "el.addEventListener(click):5");
        graph.add_edge("el.addEventListener(click):5", 5, "f");
        graph.add_edge("top level", 9, "g");
        (graph, lines)
    }

    #[test]
    fn test_header_and_directive() {
        let (graph, lines) = sample_graph();
        let text = MermaidRenderer::new().render("src/app.js", &graph, Some(&lines));
        assert!(text.starts_with("---\nsrc/app.js\n---\nflowchart LR\n"));
    }

    #[test]
    fn test_isolated_node_and_single_click() {
        let (graph, lines) = sample_graph();
        let text = MermaidRenderer::new().render("app.js", &graph, Some(&lines));
        let lines_of_f: Vec<&str> = text.lines().filter(|line| *line == "f").collect();
        assert_eq!(lines_of_f.len(), 1);

        let clicks: Vec<&str> = text
            .lines()
            .filter(|line| line.starts_with("click f "))
            .collect();
        assert_eq!(clicks, vec!["click f call callback(\"f\", 1)"]);
    }

    #[test]
    fn test_edges_have_unique_ids() {
        let (graph, lines) = sample_graph();
        let text = MermaidRenderer::new().render("app.js", &graph, Some(&lines));
        assert!(text.contains("g e_f_3@--> f\n"));
        assert!(text.contains("g e_f_4@--> f\n"));
        assert!(text.contains("el_addEventListener_click__5[\"el.addEventListener(click):5\"] e_f_5@--> f\n"));
    }

    #[test]
    fn test_labelled_nodes_and_top_level() {
        let (graph, lines) = sample_graph();
        let text = MermaidRenderer::new().render("app.js", &graph, Some(&lines));
        assert!(text.contains("g e_el_addEventListener_click__5_5@--> el_addEventListener_click__5[\"el.addEventListener(click):5\"]\n"));
        assert!(text.contains("top_level[top level] e_g_9@--> g\n"));
        assert!(text.contains("click el_addEventListener_click__5 call callback(\"el_addEventListener_click__5\", 5)\n"));
        assert!(text.contains("click top_level call callback(\"top_level\", 1)\n"));
    }

    #[test]
    fn test_click_line_falls_back_to_name_suffix() {
        let mut graph = CodeGraph::default();
        graph.add_edge("anonymous_function:7", 8, "f");
        graph.ensure_node("f");
        let text = MermaidRenderer::new().render("app.js", &graph, None);
        assert!(text.contains("click anonymous_function:7 call callback(\"anonymous_function:7\", 7)\n"));
    }

    #[test]
    fn test_reserved_words_are_relabelled() {
        let mut graph = CodeGraph::default();
        graph.ensure_node("end");
        let text = MermaidRenderer::new().render("app.js", &graph, None);
        assert!(text.contains("n_end[\"end\"]\n"));
        assert!(text.contains("click n_end call"));
    }

    #[test]
    fn test_user_function_named_like_root_keeps_its_own_id() {
        let mut graph = CodeGraph::default();
        graph.add_edge("top level", 1, "top_level");
        graph.ensure_node("top_level");
        let text = MermaidRenderer::new().render("app.js", &graph, None);

        assert!(text.contains("top_level[top level] e_n_top_level_1@--> n_top_level[\"top_level\"]\n"));
        assert!(text.contains("click top_level call callback(\"top_level\", 1)\n"));
        assert!(text.contains("click n_top_level call callback(\"n_top_level\", 1)\n"));
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let (graph, lines) = sample_graph();
        let renderer = MermaidRenderer::new();
        let first = renderer.render("app.js", &graph, Some(&lines));
        let second = renderer.render("app.js", &graph, Some(&lines));
        assert_eq!(first, second);
    }

    #[test]
    fn test_trailing_line() {
        assert_eq!(trailing_line("MutationObserver:12"), Some(12));
        assert_eq!(trailing_line("a.b(c):3"), Some(3));
        assert_eq!(trailing_line("plain"), None);
    }
}
