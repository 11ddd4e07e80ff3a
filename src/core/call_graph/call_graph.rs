// src/core/call_graph/call_graph.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

/// A call from a container: the call-site line and the callee's name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// 1-indexed line of the call site
    pub line: usize,
    pub callee: String,
}

/// True for names carrying the `:<line>` disambiguator
/// (synthetic nodes and anonymous closures)
pub fn is_synthetic_name(name: &str) -> bool {
    name.contains(':')
}

/// Per-file graph: container name -> outgoing edges, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeGraph {
    entries: Vec<(String, Vec<Edge>)>,
    positions: HashMap<String, usize>,
}

impl CodeGraph {
    /// Register a node, keeping its position if it already exists
    pub fn ensure_node(&mut self, name: &str) -> &mut Vec<Edge> {
        let position = match self.positions.get(name) {
            Some(&position) => position,
            None => {
                self.entries.push((name.to_string(), Vec::new()));
                let position = self.entries.len() - 1;
                self.positions.insert(name.to_string(), position);
                position
            }
        };
        &mut self.entries[position].1
    }

    pub fn add_edge(&mut self, from: &str, line: usize, callee: impl Into<String>) {
        let callee = callee.into();
        self.ensure_node(from).push(Edge { line, callee });
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    #[cfg(test)]
    pub fn edges(&self, name: &str) -> Option<&[Edge]> {
        self.positions
            .get(name)
            .map(|&position| self.entries[position].1.as_slice())
    }

    /// Nodes with their edges, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Edge])> {
        self.entries
            .iter()
            .map(|(name, edges)| (name.as_str(), edges.as_slice()))
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.entries.iter().map(|(_, edges)| edges.len()).sum()
    }

    /// Drop edges to callees the graph does not know: standard library,
    /// DOM and third-party calls. Synthetic names always survive.
    pub fn filter_noise(&mut self) -> usize {
        let positions = &self.positions;
        let mut removed = 0;
        for (_, edges) in self.entries.iter_mut() {
            let before = edges.len();
            edges.retain(|edge| positions.contains_key(&edge.callee) || is_synthetic_name(&edge.callee));
            removed += before - edges.len();
        }
        removed
    }

    pub fn get_statistics(&self) -> CallGraphStats {
        CallGraphStats {
            total_nodes: self.len(),
            total_edges: self.edge_count(),
            synthetic_nodes: self.node_names().filter(|name| is_synthetic_name(name)).count(),
            isolated_nodes: self.iter().filter(|(_, edges)| edges.is_empty()).count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub synthetic_nodes: usize,
    pub isolated_nodes: usize,
}

/// Declaration lines of one file's containers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineIndex {
    lines: HashMap<String, usize>,
}

impl LineIndex {
    /// Record a declaration line; the first declaration of a name wins
    pub fn record(&mut self, name: &str, line: usize) {
        self.lines.entry(name.to_string()).or_insert(line);
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.lines.get(name).copied()
    }
}

/// Line indices of every file in a run, merged as files complete
#[derive(Debug, Clone, Default)]
pub struct RunIndex {
    files: HashMap<PathBuf, LineIndex>,
}

impl RunIndex {
    pub fn merge(&mut self, path: &Path, index: LineIndex) {
        self.files.insert(path.to_path_buf(), index);
    }

    pub fn file(&self, path: &Path) -> Option<&LineIndex> {
        self.files.get(path)
    }
}
