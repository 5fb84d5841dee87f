use std::path::PathBuf;

use crate::alias::AliasTable;
use crate::editor::LineEditor;
use crate::expander::CommandSubRunner;
use crate::jobs::JobTable;
use crate::{ast, command, executor, parser, script_parser};

/// Bound on nested `source` calls, guarding against a file sourcing itself.
const MAX_SOURCE_DEPTH: usize = 16;

/// All shell-wide state that used to be process globals in the original
/// implementation, gathered into one value so it can be threaded explicitly
/// instead of mutated through statics.
pub struct Shell {
    pub jobs: JobTable,
    pub aliases: AliasTable,
    pub last_exit_code: i32,
    pub editor: LineEditor,
    pub interactive: bool,
    /// Files currently being `source`d, innermost last; used to cap
    /// recursion and to name the file in error messages.
    pub source_stack: Vec<PathBuf>,
}

impl Shell {
    pub fn new(interactive: bool) -> Self {
        Shell {
            jobs: JobTable::new(),
            aliases: AliasTable::new(),
            last_exit_code: 0,
            editor: LineEditor::new(),
            interactive,
            source_stack: Vec::new(),
        }
    }

    /// Parse and run one logical line (already has here-documents spliced
    /// in). Returns `Some(code)` if the shell should exit with `code`.
    pub fn run_line(&mut self, line: &str) -> Option<i32> {
        let words = match parser::tokenize(line) {
            Ok(w) => w,
            Err(e) => {
                eprintln!("{e}");
                self.last_exit_code = 2;
                return None;
            }
        };
        if words.is_empty() {
            return None;
        }

        let entries = match script_parser::parse_chain(words) {
            Ok(e) => e,
            Err(e) => {
                eprintln!("{e}");
                self.last_exit_code = 2;
                return None;
            }
        };
        if entries.is_empty() {
            return None;
        }

        let aliases_snapshot = self.aliases.clone();
        let last_exit_code = self.last_exit_code;
        let chain = match command::build_chain(entries, &aliases_snapshot, last_exit_code, self) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{e}");
                self.last_exit_code = 2;
                return None;
            }
        };

        match executor::execute_chain(chain, self) {
            executor::ExecutionAction::Continue => None,
            executor::ExecutionAction::Exit(code) => Some(code),
        }
    }

    /// Read and run every line of a `.mashrc`-style file. Used for shell
    /// startup and the `source` builtin. Errors are reported but do not
    /// abort the remaining lines, matching how an interactive shell
    /// recovers from a bad line and keeps prompting.
    pub fn source_file(&mut self, path: &std::path::Path) -> Result<(), String> {
        if self.source_stack.len() >= MAX_SOURCE_DEPTH {
            return Err(format!(
                "mash: source: {}: maximum source depth exceeded",
                path.display()
            ));
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("mash: source: {}: {e}", path.display()))?;

        self.source_stack.push(path.to_path_buf());
        for raw_line in contents.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if self.run_line(line).is_some() {
                break; // `exit` inside a sourced file stops sourcing but not the shell
            }
        }
        self.source_stack.pop();
        Ok(())
    }
}

impl CommandSubRunner for Shell {
    fn run_substitution(&mut self, command_text: &str) -> Result<String, String> {
        let words = parser::tokenize(command_text)?;
        if words.is_empty() {
            return Ok(String::new());
        }
        let entries = script_parser::parse_chain(words)?;
        let last_exit_code = self.last_exit_code;
        let aliases_snapshot = self.aliases.clone();
        let chain = command::build_chain(entries, &aliases_snapshot, last_exit_code, self)?;

        let mut buffer = Vec::new();
        let exit_code = executor::execute_chain_capturing(chain, self, &mut buffer)?;
        self.last_exit_code = exit_code;

        let mut text = String::from_utf8_lossy(&buffer).into_owned();
        while text.ends_with('\n') {
            text.pop();
        }
        Ok(text)
    }
}

/// Render a chain-entry's connector back to its source text, for messages.
pub fn connector_text(c: &ast::Connector) -> &'static str {
    match c {
        ast::Connector::Sequence => ";",
        ast::Connector::And => "&&",
        ast::Connector::Or => "||",
    }
}
