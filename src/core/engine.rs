// src/core/engine.rs
use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::{Config, OutputFormat};
use super::batch_processor::{BatchProcessor, BatchReport};
use super::diagram::MermaidRenderer;

/// Name of the file holding all diagrams in JSON output
const JSON_OUTPUT_FILE: &str = "callgraph.json";

/// Diagram of one file, as emitted by JSON output
#[derive(Debug, Clone, Serialize)]
pub struct DiagramRecord {
    pub file: String,
    pub diagram: String,
    pub nodes: usize,
    pub edges: usize,
}

/// Main orchestration engine
pub struct Engine {
    config: Config,
    renderer: MermaidRenderer,
}

impl Engine {
    /// Create a new engine instance from a configuration file
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;

        debug!("Loaded configuration: {:?}", config);

        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            renderer: MermaidRenderer::new(),
        }
    }

    /// Write a default configuration file
    pub async fn init(&self, path: Option<PathBuf>) -> Result<()> {
        let target_dir = match path {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        let config_path = target_dir.join("callmap.toml");
        if config_path.exists() {
            warn!("{} already exists, leaving it untouched", config_path.display());
            return Ok(());
        }

        tokio::fs::create_dir_all(&target_dir).await?;
        Config::default().save(&config_path)?;
        info!("Wrote default configuration to {}", config_path.display());
        Ok(())
    }

    /// Analyze a directory and emit one diagram per file
    pub async fn scan(
        &mut self,
        source: Option<PathBuf>,
        output: Option<PathBuf>,
        format: Option<OutputFormat>,
        ecma_version: Option<String>,
    ) -> Result<()> {
        if let Some(source) = source {
            self.config.project.analysis_target_dir = source;
        }
        if ecma_version.is_some() {
            self.config.parsing.ecma_version = ecma_version;
        }
        let format = format.unwrap_or(self.config.output.format);
        let output = output.or_else(|| self.config.output.dir.clone());
        let source_dir = self.config.project.analysis_target_dir.clone();

        info!("🔍 Building call graphs for {}", source_dir.display());

        let processor = BatchProcessor::new(&self.config);
        let report = tokio::task::spawn_blocking(move || -> crate::error::Result<BatchReport> {
            let files = processor.discover(&source_dir)?;
            processor.process(&files)
        })
        .await??;

        for failure in &report.failures {
            warn!("Skipped {}: {}", failure.path.display(), failure.error);
        }
        if let Some(path) = &report.aborted_at {
            error!("Run stopped at {}; later files were not analyzed", path.display());
        }
        info!(
            "📊 {} diagrams, {} empty files, {} failures",
            report.graphs.len(),
            report.empty_files.len(),
            report.failures.len()
        );

        let records = self.records(&report);
        match (format, output) {
            (OutputFormat::Mermaid, Some(dir)) => {
                tokio::fs::create_dir_all(&dir).await?;
                let mut taken = HashSet::new();
                for record in &records {
                    let target = dir.join(diagram_file_name(&record.file, &mut taken));
                    tokio::fs::write(&target, &record.diagram).await?;
                    debug!("Wrote {}", target.display());
                }
                info!("Wrote {} diagrams to {}", records.len(), dir.display());
            }
            (OutputFormat::Mermaid, None) => {
                for record in &records {
                    println!("{}", record.diagram);
                }
            }
            (OutputFormat::Json, Some(dir)) => {
                tokio::fs::create_dir_all(&dir).await?;
                let target = dir.join(JSON_OUTPUT_FILE);
                tokio::fs::write(&target, serde_json::to_string_pretty(&records)?).await?;
                info!("Wrote {}", target.display());
            }
            (OutputFormat::Json, None) => {
                println!("{}", serde_json::to_string_pretty(&records)?);
            }
        }

        Ok(())
    }

    /// Analyze one file and print its diagram
    pub async fn file(&self, path: PathBuf) -> Result<()> {
        let diagram = self.render_file(path).await?;
        println!("{}", diagram);
        Ok(())
    }

    /// Diagram text of a single file
    pub async fn render_file(&self, path: PathBuf) -> Result<String> {
        let processor = BatchProcessor::new(&self.config);
        let analysis_path = path.clone();
        let analysis = tokio::task::spawn_blocking(move || processor.analyze_file(&analysis_path)).await??;

        if analysis.graph.is_empty() {
            warn!("No functions in {}", path.display());
        }
        Ok(self
            .renderer
            .render(&path.display().to_string(), &analysis.graph, Some(&analysis.lines)))
    }

    fn records(&self, report: &BatchReport) -> Vec<DiagramRecord> {
        report
            .graphs
            .iter()
            .map(|file| {
                let lines = report.index.file(&file.path);
                let name = file.path.display().to_string();
                DiagramRecord {
                    diagram: self.renderer.render(&name, &file.graph, lines),
                    nodes: file.graph.len(),
                    edges: file.graph.edge_count(),
                    file: name,
                }
            })
            .collect()
    }
}

/// `app/src/main.js` -> `app_src_main.js.mmd`, numbered when flattening
/// makes two paths meet (`a/b.js` and `a_b.js`)
fn diagram_file_name(file: &str, taken: &mut HashSet<String>) -> String {
    let flattened: String = file
        .trim_start_matches("./")
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect();
    let base = flattened.trim_start_matches('_');

    let mut candidate = format!("{}.mmd", base);
    let mut suffix = 1;
    while !taken.insert(candidate.clone()) {
        suffix += 1;
        candidate = format!("{}_{}.mmd", base, suffix);
    }
    candidate
}
