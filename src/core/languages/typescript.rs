use tree_sitter::{Language, Parser, Tree};

use crate::error::{CallMapError, Result};
use super::{parse_with, ParseOptions, TreeProvider};

/// TypeScript (and TSX) tree provider using Tree-sitter
pub struct TypeScriptParser {
    parser: Parser,
    tsx: bool,
}

impl TypeScriptParser {
    pub fn new() -> Result<Self> {
        Self::with_language(tree_sitter_typescript::language_typescript(), false)
    }

    pub fn tsx() -> Result<Self> {
        Self::with_language(tree_sitter_typescript::language_tsx(), true)
    }

    fn with_language(language: Language, tsx: bool) -> Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&language)
            .map_err(|e| CallMapError::Parser(format!("Failed to set TypeScript language: {}", e)))?;

        Ok(Self { parser, tsx })
    }
}

impl TreeProvider for TypeScriptParser {
    fn parse(&mut self, content: &str, options: &ParseOptions) -> Result<Tree> {
        let language = self.language_name();
        parse_with(&mut self.parser, content, options, language)
    }

    fn language_name(&self) -> &'static str {
        if self.tsx {
            "tsx"
        } else {
            "typescript"
        }
    }
}
