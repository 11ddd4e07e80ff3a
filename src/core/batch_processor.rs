// src/core/batch_processor.rs
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::{AnalysisConfig, BatchConfig, Config, EmptyGraphPolicy};
use crate::error::{CallMapError, Result};
use super::call_graph::{CodeGraph, FileAnalysis, GraphBuilder, RunIndex};
use super::parser::{CodeParser, SourceFile};

/// Finished graph of one file
#[derive(Debug, Clone)]
pub struct FileGraph {
    pub path: PathBuf,
    pub graph: CodeGraph,
}

/// A file that could not be analyzed
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of analyzing a file queue
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Non-empty graphs in file order
    pub graphs: Vec<FileGraph>,

    /// Declaration lines of every reported file
    pub index: RunIndex,

    /// Files that yielded no graph entries
    pub empty_files: Vec<PathBuf>,

    pub failures: Vec<FileFailure>,

    /// File that halted the run under the abort policy
    pub aborted_at: Option<PathBuf>,
}

/// Runs file discovery, parsing and graph building over a worker pool
pub struct BatchProcessor {
    parser: CodeParser,
    analysis: AnalysisConfig,
    batch: BatchConfig,
}

impl BatchProcessor {
    pub fn new(config: &Config) -> Self {
        Self {
            parser: CodeParser::new(&config.project, &config.parsing),
            analysis: config.analysis.clone(),
            batch: config.batch.clone(),
        }
    }

    pub fn discover<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        self.parser.discover(dir)
    }

    /// Read, parse and walk one file
    pub fn analyze_file(&self, path: &Path) -> Result<FileAnalysis> {
        let source = self.parser.read_file(path)?;
        self.analyze_source(&source)
    }

    pub fn analyze_source(&self, source: &SourceFile) -> Result<FileAnalysis> {
        let tree = self.parser.parse_source(source)?;
        GraphBuilder::new(&self.analysis)
            .with_timeout(self.parser.timeout())
            .build(&source.path, &tree, &source.content)
    }

    /// Analyze `files` in parallel, then apply the empty-graph policy in
    /// file order so the outcome matches a sequential run.
    pub fn process(&self, files: &[PathBuf]) -> Result<BatchReport> {
        let workers = self.batch.effective_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| CallMapError::Config(format!("Failed to build worker pool: {}", e)))?;

        info!("Analyzing {} files with {} workers", files.len(), workers);
        let results: Vec<(PathBuf, Result<FileAnalysis>)> = pool.install(|| {
            files
                .par_iter()
                .map(|path| (path.clone(), self.analyze_file(path)))
                .collect()
        });

        let abort = self.batch.empty_graph_policy == EmptyGraphPolicy::Abort;
        let mut report = BatchReport::default();

        for (path, result) in results {
            match result {
                Ok(analysis) if analysis.graph.is_empty() => {
                    warn!("No functions in {}", path.display());
                    report.empty_files.push(path.clone());
                    if abort {
                        error!("{}, abandoning the remaining files", CallMapError::EmptyGraph(path.clone()));
                        report.aborted_at = Some(path);
                        break;
                    }
                }
                Ok(analysis) => {
                    let stats = analysis.graph.get_statistics();
                    debug!(
                        "{}: {} nodes ({} synthetic, {} isolated), {} edges",
                        path.display(),
                        stats.total_nodes,
                        stats.synthetic_nodes,
                        stats.isolated_nodes,
                        stats.total_edges
                    );
                    report.index.merge(&path, analysis.lines);
                    report.graphs.push(FileGraph {
                        path,
                        graph: analysis.graph,
                    });
                }
                Err(e) => {
                    error!("Failed to analyze {}: {}", path.display(), e);
                    report.failures.push(FileFailure {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                    if abort {
                        report.aborted_at = Some(path);
                        break;
                    }
                }
            }
        }

        Ok(report)
    }
}
