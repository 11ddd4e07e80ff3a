use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{CallMapError, Result};

/// ECMAScript version assumed when the configuration does not name one
pub const DEFAULT_ECMA_VERSION: &str = "2020";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project being analyzed
    pub project: ProjectConfig,

    /// Source code parsing configuration
    pub parsing: ParsingConfig,

    /// Call classification rules
    pub analysis: AnalysisConfig,

    /// Batch processing behaviour
    pub batch: BatchConfig,

    /// Output settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directory of the project we want to analyze
    pub analysis_target_dir: PathBuf,

    /// Exclude `.gitignore` entries from analysis
    pub use_git_ignore: bool,

    /// Extra exclusions, evaluated with `analysis_target_dir` as base directory
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// File extensions to analyze
    pub file_extensions: Vec<String>,

    /// Maximum file size to parse (in bytes)
    pub max_file_size: usize,

    /// ECMAScript version ("latest" or a year such as 2020)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecma_version: Option<String>,

    /// Per-file parse and walk budget in milliseconds, 0 disables it
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Method name treated as an event registration
    pub event_method: String,

    /// Methods whose closure arguments read like loop bodies
    pub iteration_methods: Vec<String>,

    /// Constructors taking a single observer callback
    pub observer_constructors: Vec<String>,

    /// Host-application callback APIs, keyed by their namespace
    pub platform_rules: Vec<PlatformRule>,
}

/// Where a platform API expects its callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackPosition {
    /// The last positional argument
    Last,
    /// A fixed zero-based argument index
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRule {
    /// Leftmost identifier of the callee, e.g. `chrome`
    pub namespace: String,

    /// Which argument carries the callback
    pub callback: CallbackPosition,
}

/// What to do when a file yields no graph entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyGraphPolicy {
    /// Stop the run, dropping every file after the empty one
    Abort,
    /// Report the file and continue with the rest
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub empty_graph_policy: EmptyGraphPolicy,

    /// Worker threads, 0 picks half the available cores
    pub workers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Mermaid,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format
    pub format: OutputFormat,

    /// Output directory, stdout when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            analysis_target_dir: PathBuf::from("."),
            use_git_ignore: false,
            ignore_patterns: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                ".github".to_string(),
            ],
        }
    }
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            file_extensions: ["js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "tsx"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            max_file_size: 1024 * 1024, // 1MB
            ecma_version: None,
            timeout_ms: 10_000,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            event_method: "addEventListener".to_string(),
            iteration_methods: vec!["forEach".to_string(), "map".to_string(), "filter".to_string()],
            observer_constructors: vec![
                "MutationObserver".to_string(),
                "IntersectionObserver".to_string(),
            ],
            platform_rules: vec![
                PlatformRule {
                    namespace: "chrome".to_string(),
                    callback: CallbackPosition::Last,
                },
                PlatformRule {
                    namespace: "browser".to_string(),
                    callback: CallbackPosition::Last,
                },
            ],
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            empty_graph_policy: EmptyGraphPolicy::Abort,
            workers: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Mermaid,
            dir: None,
        }
    }
}

impl ParsingConfig {
    /// ECMAScript version handed to the tree provider
    pub fn effective_ecma_version(&self) -> String {
        match &self.ecma_version {
            Some(version) => version.clone(),
            None => {
                warn!("ES version not specified, defaulting to {}", DEFAULT_ECMA_VERSION);
                DEFAULT_ECMA_VERSION.to_string()
            }
        }
    }
}

impl BatchConfig {
    /// Number of worker threads to run with
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::cmp::max(1, num_cpus::get() / 2)
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| CallMapError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CallMapError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = ["Callmap.toml", "callmap.toml", ".callmap.toml"];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}
