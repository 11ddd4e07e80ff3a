//! Tree providers for the supported source dialects
//!
//! Each dialect gets its own module with a consistent interface for turning
//! source text into a tree-sitter syntax tree.

mod javascript;
mod typescript;

pub use javascript::JavaScriptParser;
pub use typescript::TypeScriptParser;

use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use tree_sitter::{Parser, Tree};

use crate::error::{CallMapError, Result};

/// Options handed to every parse
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// ECMAScript version the sources target
    pub ecma_version: String,
    /// Abandon parsing after this long
    pub timeout: Option<Duration>,
}

/// Trait that all tree providers must implement
pub trait TreeProvider: Send {
    /// Parse source code into a syntax tree
    fn parse(&mut self, content: &str, options: &ParseOptions) -> Result<Tree>;

    /// Get the language name
    fn language_name(&self) -> &'static str;
}

/// Source dialects, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    JavaScript,
    TypeScript,
    Tsx,
}

impl Dialect {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        match extension {
            "js" | "mjs" | "cjs" | "jsx" => Some(Dialect::JavaScript),
            "ts" | "mts" | "cts" => Some(Dialect::TypeScript),
            "tsx" => Some(Dialect::Tsx),
            _ => None,
        }
    }

    pub fn tree_provider(self) -> Result<Box<dyn TreeProvider>> {
        let provider: Box<dyn TreeProvider> = match self {
            Dialect::JavaScript => Box::new(JavaScriptParser::new()?),
            Dialect::TypeScript => Box::new(TypeScriptParser::new()?),
            Dialect::Tsx => Box::new(TypeScriptParser::tsx()?),
        };
        Ok(provider)
    }
}

/// Shared parse routine: apply the timeout, parse, report syntax errors
fn parse_with(parser: &mut Parser, content: &str, options: &ParseOptions, language: &str) -> Result<Tree> {
    let micros = options
        .timeout
        .map(|timeout| timeout.as_micros().min(u64::MAX as u128) as u64)
        .unwrap_or(0);
    parser.set_timeout_micros(micros);
    parser.reset();

    debug!("Parsing {} source (ECMAScript {})", language, options.ecma_version);
    let tree = parser.parse(content, None).ok_or_else(|| {
        CallMapError::Parser(format!("{} parse did not complete", language))
    })?;

    if tree.root_node().has_error() {
        warn!("{} source contains syntax errors, graph may be partial", language);
    }

    Ok(tree)
}
