//! Renders the `PROMPT` environment variable's `@token` escape grammar into
//! the string printed before each input line.
//!
//! Recognized tokens: `@user`, `@host`, `@where`, `@branch`, and the color
//! switches `@green`/`@pink`/`@blue`/`@nocolor`. Anything else starting with
//! `@` (or no `@` at all) is copied through unchanged, so a `PROMPT` with a
//! literal `@` that doesn't match a token still renders sensibly.

use std::env;
use std::process::{Command, Stdio};

const DEFAULT_PROMPT: &str = "@user@@host @where> ";

/// The prompt shown while waiting for a continuation line (inside an open
/// quote, paren, or `HERE{` block).
pub const CONTINUATION: &str = "> ";

/// Render the current prompt, reading `PROMPT` from the environment and
/// falling back to a sensible default when it isn't set.
pub fn render() -> String {
    let template = env::var("PROMPT").unwrap_or_else(|_| DEFAULT_PROMPT.to_string());
    render_template(&template)
}

fn render_template(template: &str) -> String {
    let mut out = String::new();
    let mut rest = template;

    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..at]);
        rest = &rest[at + 1..];

        if let Some(stripped) = rest.strip_prefix('@') {
            out.push('@');
            rest = stripped;
            continue;
        }

        if let Some((replacement, tail)) = match_token(rest) {
            out.push_str(&replacement);
            rest = tail;
        } else {
            out.push('@');
        }
    }
    out.push_str(rest);
    out
}

/// If `rest` begins with a known token name, return its rendering and the
/// remaining text after the token.
fn match_token(rest: &str) -> Option<(String, &str)> {
    const TOKENS: &[(&str, fn() -> String)] = &[
        ("user", username),
        ("host", hostname),
        ("where", current_dir_display),
        ("branch", git_branch_suffix),
        ("green", || "\u{1b}[01;32m".to_string()),
        ("pink", || "\u{1b}[01;35m".to_string()),
        ("blue", || "\u{1b}[01;34m".to_string()),
        ("nocolor", || "\u{1b}[0m".to_string()),
    ];

    for (name, render) in TOKENS {
        if let Some(tail) = rest.strip_prefix(name) {
            return Some((render(), tail));
        }
    }
    None
}

fn username() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "user".to_string())
}

#[cfg(unix)]
fn hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return "localhost".to_string();
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

#[cfg(not(unix))]
fn hostname() -> String {
    env::var("COMPUTERNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// The working directory, with a `HOME`-prefixed path collapsed to `~`.
fn current_dir_display() -> String {
    let cwd = env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let home = env::var("HOME").or_else(|_| env::var("USERPROFILE")).ok();
    match home {
        Some(home) if !home.is_empty() && cwd.starts_with(&home) => {
            format!("~{}", &cwd[home.len()..])
        }
        _ => cwd,
    }
}

/// `(branch-name)` for the current directory's git branch, or empty outside
/// a git repository. Shells out to `git` rather than parsing `.git/HEAD`
/// directly, since that also covers detached HEADs and worktrees correctly.
fn git_branch_suffix() -> String {
    let output = Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let branch = String::from_utf8_lossy(&output.stdout);
            let branch = branch.trim();
            if branch.is_empty() {
                String::new()
            } else {
                format!("({branch})")
            }
        }
        _ => String::new(),
    }
}
