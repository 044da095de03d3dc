//! Source preprocessing: comment stripping and file inclusion
//!
//! Runs before the lexer. Strips `//` line comments and `/* ... */` block
//! comments, and resolves `#include "name"` directives against an ordered
//! include-path list. A file is included at most once.

use csl_common::{CslError, CslResult};
use log::debug;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Preprocessor {
    include_paths: Vec<PathBuf>,
    included: HashSet<PathBuf>,
    output: String,
    in_block_comment: bool,
}

impl Preprocessor {
    pub fn new(include_paths: &[PathBuf]) -> Self {
        let mut paths = vec![PathBuf::from(".")];
        paths.extend(include_paths.iter().cloned());
        Self {
            include_paths: paths,
            included: HashSet::new(),
            output: String::new(),
            in_block_comment: false,
        }
    }

    /// Process a file and all of its includes into one source text
    pub fn process(mut self, file: &Path) -> CslResult<String> {
        self.process_file(file)?;
        if self.in_block_comment {
            return Err(CslError::read("block comment left open"));
        }
        Ok(self.output)
    }

    fn process_file(&mut self, file: &Path) -> CslResult<()> {
        let full = self.resolve(file)?;
        if !self.included.insert(full.clone()) {
            debug!("ignoring already included file: {}", file.display());
            return Ok(());
        }
        if let Some(dir) = full.parent() {
            self.include_paths.push(dir.to_path_buf());
        }

        let text = fs::read_to_string(&full)
            .map_err(|err| CslError::read(format!("cannot read {}: {}", full.display(), err)))?;
        for line in text.lines() {
            self.process_line(line)?;
        }
        Ok(())
    }

    fn process_line(&mut self, line: &str) -> CslResult<()> {
        let mut rest = line;
        let mut stripped = String::new();

        if self.in_block_comment {
            match rest.find("*/") {
                Some(end) => {
                    rest = &rest[end + 2..];
                    self.in_block_comment = false;
                }
                None => return Ok(()),
            }
        }

        loop {
            let line_comment = rest.find("//");
            let block_comment = rest.find("/*");
            match (line_comment, block_comment) {
                (Some(lc), bc) if bc.map_or(true, |bc| lc < bc) => {
                    stripped.push_str(&rest[..lc]);
                    break;
                }
                (Some(lc), None) => {
                    stripped.push_str(&rest[..lc]);
                    break;
                }
                (_, Some(bc)) => {
                    stripped.push_str(&rest[..bc]);
                    match rest[bc + 2..].find("*/") {
                        Some(end) => rest = &rest[bc + 2 + end + 2..],
                        None => {
                            self.in_block_comment = true;
                            break;
                        }
                    }
                }
                (None, None) => {
                    stripped.push_str(rest);
                    break;
                }
            }
        }

        let trimmed = stripped.trim();
        if let Some(directive) = trimmed.strip_prefix('#') {
            return self.process_directive(directive.trim());
        }

        self.output.push_str(&stripped);
        self.output.push('\n');
        Ok(())
    }

    fn process_directive(&mut self, directive: &str) -> CslResult<()> {
        if let Some(arg) = directive.strip_prefix("include") {
            let name = arg.trim().trim_matches('"');
            if name.is_empty() {
                return Err(CslError::read("include directive requires a file name"));
            }
            return self.process_file(Path::new(name));
        }
        Err(CslError::read(format!("unknown preprocessor directive: #{}", directive)))
    }

    /// Search the include paths for a file, first match wins
    fn resolve(&self, file: &Path) -> CslResult<PathBuf> {
        if file.is_absolute() && file.is_file() {
            return Ok(file.to_path_buf());
        }
        for dir in &self.include_paths {
            let candidate = dir.join(file);
            if candidate.is_file() {
                return candidate
                    .canonicalize()
                    .map_err(|err| CslError::read(format!("{}: {}", candidate.display(), err)));
            }
        }
        Err(CslError::read(format!("file {} does not exist", file.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_line_comments_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let main = write_file(dir.path(), "main.csl", "int x = 1; // comment\nint y;\n");
        let out = Preprocessor::new(&[]).process(&main).unwrap();
        assert_eq!(out, "int x = 1; \nint y;\n");
    }

    #[test]
    fn test_block_comments_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let main = write_file(
            dir.path(),
            "main.csl",
            "int a; /* one */ int b;\nint /* two\nlines */ c;\n",
        );
        let out = Preprocessor::new(&[]).process(&main).unwrap();
        assert_eq!(out, "int a;  int b;\nint \n c;\n");
    }

    #[test]
    fn test_unterminated_block_comment() {
        let dir = tempfile::tempdir().unwrap();
        let main = write_file(dir.path(), "main.csl", "int a; /* oops\n");
        let err = Preprocessor::new(&[]).process(&main).unwrap_err();
        assert!(err.to_string().contains("block comment left open"), "{}", err);
    }

    #[test]
    fn test_include_resolution() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "defs.csl", "int shared;\n");
        let main = write_file(
            dir.path(),
            "main.csl",
            "#include \"defs.csl\"\nint local;\n",
        );
        let out = Preprocessor::new(&[dir.path().to_path_buf()]).process(&main).unwrap();
        assert_eq!(out, "int shared;\nint local;\n");
    }

    #[test]
    fn test_duplicate_includes_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "defs.csl", "int shared;\n");
        let main = write_file(
            dir.path(),
            "main.csl",
            "#include \"defs.csl\"\n#include \"defs.csl\"\nint local;\n",
        );
        let out = Preprocessor::new(&[dir.path().to_path_buf()]).process(&main).unwrap();
        assert_eq!(out.matches("int shared;").count(), 1);
    }

    #[test]
    fn test_missing_include_fails() {
        let dir = tempfile::tempdir().unwrap();
        let main = write_file(dir.path(), "main.csl", "#include \"nope.csl\"\n");
        let err = Preprocessor::new(&[]).process(&main).unwrap_err();
        assert!(err.to_string().contains("does not exist"), "{}", err);
    }

    #[test]
    fn test_unknown_directive_fails() {
        let dir = tempfile::tempdir().unwrap();
        let main = write_file(dir.path(), "main.csl", "#define X 1\n");
        let err = Preprocessor::new(&[]).process(&main).unwrap_err();
        assert!(err.to_string().contains("unknown preprocessor directive"), "{}", err);
    }
}
