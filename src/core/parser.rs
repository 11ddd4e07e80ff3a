use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use tree_sitter::Tree;

use crate::config::{ParsingConfig, ProjectConfig};
use crate::error::{CallMapError, Result};
use super::languages::{Dialect, ParseOptions};

/// A source file read from disk, ready to parse
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File path as discovered (prefixed with the analysis directory)
    pub path: PathBuf,

    /// Dialect detected from the extension
    pub dialect: Dialect,

    /// Raw source content
    pub content: String,
}

/// Finds, reads and parses the source files of a project
pub struct CodeParser {
    project: ProjectConfig,
    parsing: ParsingConfig,
    options: ParseOptions,
}

impl CodeParser {
    pub fn new(project: &ProjectConfig, parsing: &ParsingConfig) -> Self {
        let options = ParseOptions {
            ecma_version: parsing.effective_ecma_version(),
            timeout: match parsing.timeout_ms {
                0 => None,
                millis => Some(Duration::from_millis(millis)),
            },
        };

        Self {
            project: project.clone(),
            parsing: parsing.clone(),
            options,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.options.timeout
    }

    /// Candidate files under `dir`, after ignore rules, sorted by path
    pub fn discover<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CallMapError::FileSystem(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        if self.project.use_git_ignore && !dir.join(".gitignore").is_file() {
            return Err(CallMapError::Config(format!(
                "No .gitignore in {} detected, but use_git_ignore is enabled",
                dir.display()
            )));
        }

        // Extra exclusions are evaluated relative to the analysis directory
        let mut overrides = OverrideBuilder::new(dir);
        for pattern in &self.project.ignore_patterns {
            overrides
                .add(&format!("!{}", pattern))
                .map_err(|e| CallMapError::Config(format!("Invalid ignore pattern {}: {}", pattern, e)))?;
        }
        let overrides = overrides
            .build()
            .map_err(|e| CallMapError::Config(e.to_string()))?;

        let walker = WalkBuilder::new(dir)
            .hidden(false)
            .ignore(false)
            .parents(false)
            .git_global(false)
            .git_exclude(false)
            .git_ignore(self.project.use_git_ignore)
            .require_git(false)
            .overrides(overrides)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| CallMapError::FileSystem(e.to_string()))?;
            let path = entry.path();

            if path.is_file() && self.should_parse_file(path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        debug!("Discovered {} source files in {}", files.len(), dir.display());
        Ok(files)
    }

    /// Read a single source file
    pub fn read_file<P: AsRef<Path>>(&self, file_path: P) -> Result<SourceFile> {
        let path = file_path.as_ref();
        let dialect = Dialect::from_path(path).ok_or_else(|| {
            CallMapError::Parser(format!("Could not detect language for file: {}", path.display()))
        })?;

        let content = std::fs::read_to_string(path)?;

        // Check file size
        if content.len() > self.parsing.max_file_size {
            return Err(CallMapError::Parser(
                format!("File {} exceeds maximum size limit", path.display())
            ));
        }

        Ok(SourceFile {
            path: path.to_path_buf(),
            dialect,
            content,
        })
    }

    /// Parse a source file into its syntax tree
    pub fn parse_source(&self, file: &SourceFile) -> Result<Tree> {
        let mut provider = file.dialect.tree_provider()?;
        provider.parse(&file.content, &self.options).map_err(|e| match e {
            CallMapError::Parser(message) => {
                CallMapError::Parser(format!("{}: {}", file.path.display(), message))
            }
            other => other,
        })
    }

    /// Determine if a file should be parsed based on configuration
    fn should_parse_file(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.parsing.file_extensions.iter().any(|ext| ext == extension)
            && Dialect::from_path(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    fn project(dir: &Path) -> ProjectConfig {
        ProjectConfig {
            analysis_target_dir: dir.to_path_buf(),
            ..ProjectConfig::default()
        }
    }

    fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_discover_filters_extensions_and_ignores() {
        let temp = TempDir::new().unwrap();
        temp.child("src/app.js").write_str("main();").unwrap();
        temp.child("src/util.ts").write_str("export {}").unwrap();
        temp.child("src/view.tsx").write_str("export {}").unwrap();
        temp.child("src/notes.md").write_str("# notes").unwrap();
        temp.child("node_modules/lib/index.js").write_str("x();").unwrap();
        temp.child("tests/app.test.js").write_str("t();").unwrap();

        let mut config = project(temp.path());
        config.ignore_patterns.push("tests/**".to_string());
        let parser = CodeParser::new(&config, &ParsingConfig::default());

        let files = parser.discover(temp.path()).unwrap();
        assert_eq!(
            relative(temp.path(), &files),
            vec!["src/app.js", "src/util.ts", "src/view.tsx"]
        );
    }

    #[test]
    fn test_git_ignore_is_honoured_without_a_repository() {
        let temp = TempDir::new().unwrap();
        temp.child(".gitignore").write_str("# build output\ndist/\n").unwrap();
        temp.child("dist/bundle.js").write_str("x();").unwrap();
        temp.child("app.js").write_str("main();").unwrap();

        let mut config = project(temp.path());
        config.use_git_ignore = true;
        let parser = CodeParser::new(&config, &ParsingConfig::default());

        let files = parser.discover(temp.path()).unwrap();
        assert_eq!(relative(temp.path(), &files), vec!["app.js"]);
    }

    #[test]
    fn test_missing_gitignore_is_a_config_error() {
        let temp = TempDir::new().unwrap();
        temp.child("app.js").write_str("main();").unwrap();

        let mut config = project(temp.path());
        config.use_git_ignore = true;
        let parser = CodeParser::new(&config, &ParsingConfig::default());

        assert!(matches!(parser.discover(temp.path()), Err(CallMapError::Config(_))));
    }

    #[test]
    fn test_read_and_parse() {
        let temp = TempDir::new().unwrap();
        let file = temp.child("app.ts");
        file.write_str("function f(): void { g(); }\n").unwrap();

        let parser = CodeParser::new(&project(temp.path()), &ParsingConfig::default());
        let source = parser.read_file(file.path()).unwrap();
        assert_eq!(source.dialect, Dialect::TypeScript);

        let tree = parser.parse_source(&source).unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn test_zero_timeout_disables_the_budget() {
        let temp = TempDir::new().unwrap();
        let unbounded = ParsingConfig {
            timeout_ms: 0,
            ..ParsingConfig::default()
        };
        let parser = CodeParser::new(&project(temp.path()), &unbounded);
        assert_eq!(parser.timeout(), None);

        let parser = CodeParser::new(&project(temp.path()), &ParsingConfig::default());
        assert_eq!(parser.timeout(), Some(Duration::from_millis(10_000)));
    }

    #[test]
    fn test_oversized_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let file = temp.child("big.js");
        file.write_str(&"a();\n".repeat(100)).unwrap();

        let parsing = ParsingConfig {
            max_file_size: 16,
            ..ParsingConfig::default()
        };
        let parser = CodeParser::new(&project(temp.path()), &parsing);
        assert!(matches!(parser.read_file(file.path()), Err(CallMapError::Parser(_))));
    }
}
