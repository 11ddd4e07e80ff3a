use tree_sitter::{Parser, Tree};

use crate::error::{CallMapError, Result};
use super::{parse_with, ParseOptions, TreeProvider};

/// JavaScript tree provider using Tree-sitter
pub struct JavaScriptParser {
    parser: Parser,
}

impl JavaScriptParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let javascript_language = tree_sitter_javascript::language();
        parser.set_language(&javascript_language)
            .map_err(|e| CallMapError::Parser(format!("Failed to set JavaScript language: {}", e)))?;

        Ok(Self { parser })
    }
}

impl TreeProvider for JavaScriptParser {
    fn parse(&mut self, content: &str, options: &ParseOptions) -> Result<Tree> {
        let language = self.language_name();
        parse_with(&mut self.parser, content, options, language)
    }

    fn language_name(&self) -> &'static str {
        "javascript"
    }
}
