mod alias;
mod ast;
mod builtins;
mod command;
mod editor;
mod executor;
mod expander;
mod job_control;
mod jobs;
mod parser;
mod prompt;
mod redirect;
mod script_parser;
mod shell;
mod signals;
mod status;

use std::io::{self};
use std::path::PathBuf;

use crossterm::tty::IsTty;

use shell::Shell;

/// A here-document body may not exceed this many bytes, matching the
/// original shell's bounded-buffer guard against an unterminated `HERE{`
/// hanging the prompt forever.
const MAX_HERE_DOC_BYTES: usize = 64 * 1024;

fn main() {
    signals::install();

    let interactive = parse_args();
    let mut shell = Shell::new(interactive);

    if let Ok(cwd) = std::env::current_dir() {
        unsafe { std::env::set_var("PWD", cwd) };
    }

    if let Some(rc_path) = mashrc_path() {
        if rc_path.exists() {
            if let Err(e) = shell.source_file(&rc_path) {
                eprintln!("{e}");
            }
        }
    }

    let exit_code = run_repl(&mut shell);
    std::process::exit(exit_code);
}

/// The only flag this shell recognizes is `-i` (force interactive mode even
/// when stdin isn't a tty). Anything else is ignored, matching the
/// teacher's minimal argv handling.
fn parse_args() -> bool {
    let forced = std::env::args().skip(1).any(|a| a == "-i");
    forced || io::stdin().is_tty()
}

fn mashrc_path() -> Option<PathBuf> {
    let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")).ok()?;
    Some(PathBuf::from(home).join(".mashrc"))
}

fn run_repl(shell: &mut Shell) -> i32 {
    loop {
        shell.jobs.reap();

        poll_signals(shell);

        let prompt_text = if shell.interactive {
            prompt::render()
        } else {
            String::new()
        };

        let line = match shell.editor.read_line(&prompt_text) {
            Ok(Some(line)) => line,
            Ok(None) => return shell.last_exit_code,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("mash: {e}");
                return 1;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let spliced = match splice_here_docs(shell, line) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("mash: {e}");
                shell.last_exit_code = 1;
                continue;
            }
        };

        shell.editor.add_to_history(trimmed);

        if let Some(code) = shell.run_line(&spliced) {
            return code;
        }
    }
}

/// Drain a deferred SIGINT/SIGTSTP noticed between REPL iterations.
/// Job-control signals that arrive while a foreground job is running are
/// handled inline by the executor's own wait loop; a signal noticed here
/// means the shell itself was sitting idle at the prompt, so all that's
/// left to do is reset `$?` the way an interrupted read does.
fn poll_signals(shell: &mut Shell) {
    if signals::take_pending() == signals::SIGINT_SEEN {
        shell.last_exit_code = 130;
    }
}

/// Detect a `HERE{` token in `line` and, if present, read raw lines from
/// stdin until one exactly equal to `}`, splicing the collected body back
/// in as a single-quoted here-string literal (`<<< '...'`) in place of the
/// `HERE{` token so the rest of the pipeline never needs to know here-docs
/// exist.
fn splice_here_docs(shell: &mut Shell, line: String) -> io::Result<String> {
    let Some(at) = line.find(parser::HERE_DOC_OPEN) else {
        return Ok(line);
    };

    let mut body = String::new();
    loop {
        let raw = shell.editor.read_line(prompt::CONTINUATION)?;
        let Some(raw) = raw else {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "mash: unterminated HERE{ block (expected a line with just '}')",
            ));
        };
        if raw == "}" {
            break;
        }
        if body.len() + raw.len() + 1 > MAX_HERE_DOC_BYTES {
            return Err(io::Error::other(format!(
                "here document exceeds maximum size of {MAX_HERE_DOC_BYTES} bytes"
            )));
        }
        body.push_str(&raw);
        body.push('\n');
    }

    let quoted = format!("<<< '{}'", body.replace('\'', "'\\''"));
    let mut spliced = line.clone();
    spliced.replace_range(at..at + parser::HERE_DOC_OPEN.len(), &quoted);
    Ok(spliced)
}
