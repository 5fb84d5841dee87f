use crate::alias::{self, AliasTable};
use crate::ast::{ChainEntry, Connector};
use crate::expander::{self, CommandSubRunner};
use crate::parser::{self, Word, WordSegment, as_operator};
use crate::redirect::{self, RedirectTarget};

/// A single command within a pipeline: program + arguments, already fully
/// expanded, with its redirections resolved to concrete targets.
#[derive(Debug, Clone)]
pub struct Command {
    pub argv: Vec<String>,
    pub redirections: Vec<ResolvedRedirection>,
    /// Set by `ifok`/`ifnot` when their condition on `$?` was not met — the
    /// stage runs nothing and passes its stdin straight through.
    pub skip: bool,
}

#[derive(Debug, Clone)]
pub enum ResolvedTarget {
    File(String),
    FileAppend(String),
    FileRead(String),
    Fd(i32),
    HereString(String),
}

#[derive(Debug, Clone)]
pub struct ResolvedRedirection {
    pub fd: i32,
    pub target: ResolvedTarget,
}

/// One or more commands connected by pipes, run as a unit.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub background: bool,
    /// Human-readable reconstruction, used as the `jobs` listing text.
    pub raw_text: String,
}

/// Build every pipeline in a parsed chain, in order, expanding aliases,
/// variables, globs, and command substitutions along the way.
pub fn build_chain(
    entries: Vec<ChainEntry>,
    aliases: &AliasTable,
    last_exit_code: i32,
    runner: &mut dyn CommandSubRunner,
) -> Result<Vec<(Connector, Pipeline)>, String> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let pipeline = build_pipeline(entry.words, aliases, last_exit_code, runner)?;
        out.push((entry.connector, pipeline));
    }
    Ok(out)
}

fn build_pipeline(
    mut words: Vec<Word>,
    aliases: &AliasTable,
    last_exit_code: i32,
    runner: &mut dyn CommandSubRunner,
) -> Result<Pipeline, String> {
    let raw_text = render_words(&words);

    let background = strip_trailing_background(&mut words);

    let stages = split_on_pipe(words)?;
    let mut commands = Vec::with_capacity(stages.len());
    for stage in stages {
        commands.push(build_command(stage, aliases, last_exit_code, runner)?);
    }

    Ok(Pipeline {
        commands,
        background,
        raw_text,
    })
}

fn strip_trailing_background(words: &mut Vec<Word>) -> bool {
    if let Some(last) = words.last() {
        if as_operator(last) == Some("&") {
            words.pop();
            return true;
        }
    }
    false
}

fn split_on_pipe(words: Vec<Word>) -> Result<Vec<Vec<Word>>, String> {
    let mut stages = Vec::new();
    let mut current = Vec::new();
    for word in words {
        if as_operator(&word) == Some("|") {
            if current.is_empty() {
                return Err("mash: syntax error near unexpected token `|'".to_string());
            }
            stages.push(std::mem::take(&mut current));
        } else {
            current.push(word);
        }
    }
    if current.is_empty() {
        return Err("mash: syntax error: expected command after `|'".to_string());
    }
    stages.push(current);
    Ok(stages)
}

fn build_command(
    stage: Vec<Word>,
    aliases: &AliasTable,
    last_exit_code: i32,
    runner: &mut dyn CommandSubRunner,
) -> Result<Command, String> {
    let stage = expand_alias_head(stage, aliases)?;
    let (arg_words, raw_redirs) = redirect::extract_redirections(&stage)?;
    let argv = expander::expand_words(&arg_words, last_exit_code, runner)?;
    let (argv, skip) = apply_conditional_prefix(argv, last_exit_code)?;

    let mut redirections = Vec::with_capacity(raw_redirs.len());
    for redir in raw_redirs {
        let target = match redir.target {
            RedirectTarget::File(w) => {
                ResolvedTarget::File(expander::expand_word_single(&w, last_exit_code, runner)?)
            }
            RedirectTarget::FileAppend(w) => ResolvedTarget::FileAppend(
                expander::expand_word_single(&w, last_exit_code, runner)?,
            ),
            RedirectTarget::FileRead(w) => {
                ResolvedTarget::FileRead(expander::expand_word_single(&w, last_exit_code, runner)?)
            }
            RedirectTarget::Fd(fd) => ResolvedTarget::Fd(fd),
            RedirectTarget::HereString(w) => ResolvedTarget::HereString(
                expander::expand_word_single(&w, last_exit_code, runner)?,
            ),
        };
        redirections.push(ResolvedRedirection { fd: redir.fd, target });
    }

    Ok(Command { argv, redirections, skip })
}

/// Handle the `ifok`/`ifnot` conditional prefix: `ifok CMD...` runs `CMD`
/// only if the previous command exited 0; `ifnot` only if it didn't. With no
/// further arguments it prints a usage string and skips without error.
/// Returns the (possibly stripped) argv and whether the stage should skip
/// execution entirely.
fn apply_conditional_prefix(
    argv: Vec<String>,
    last_exit_code: i32,
) -> Result<(Vec<String>, bool), String> {
    let Some(head) = argv.first() else {
        return Ok((argv, false));
    };
    let runs_when_ok = match head.as_str() {
        "ifok" => true,
        "ifnot" => false,
        _ => return Ok((argv, false)),
    };

    if argv.get(1).map(String::as_str) == Some("--help") {
        println!(
            "usage: {head} COMMAND [ARGS...]\n  run COMMAND only if the previous exit status {} 0",
            if runs_when_ok { "was" } else { "was not" }
        );
        return Ok((Vec::new(), true));
    }

    let rest: Vec<String> = argv[1..].to_vec();
    if rest.is_empty() {
        return Err(format!("mash: {head}: missing command"));
    }

    let condition_met = if runs_when_ok {
        last_exit_code == 0
    } else {
        last_exit_code != 0
    };
    if condition_met {
        Ok((rest, false))
    } else {
        Ok((Vec::new(), true))
    }
}

/// Expand an alias at the head of a command, re-tokenizing its value and
/// splicing the result in place of the head word.
fn expand_alias_head(stage: Vec<Word>, aliases: &AliasTable) -> Result<Vec<Word>, String> {
    let Some(head_word) = stage.first() else {
        return Ok(stage);
    };
    let Some(head_text) = as_plain_text(head_word) else {
        return Ok(stage);
    };
    let Some(expansion) = alias::expand_with_cycle_guard(aliases, &head_text) else {
        return Ok(stage);
    };

    let mut replaced = parser::tokenize(&expansion)?;
    replaced.extend(stage.into_iter().skip(1));
    Ok(replaced)
}

/// A word is "plain text" for alias lookup purposes only if it is a single
/// unquoted segment — `"ls"` or `'ls'` should never trigger alias expansion.
fn as_plain_text(word: &Word) -> Option<String> {
    if word.len() != 1 {
        return None;
    }
    match &word[0] {
        WordSegment::Unquoted(s) => Some(s.clone()),
        _ => None,
    }
}

fn render_words(words: &[Word]) -> String {
    words
        .iter()
        .map(|w| {
            w.iter()
                .map(|seg| match seg {
                    WordSegment::Unquoted(s) => s.clone(),
                    WordSegment::DoubleQuoted(s) => format!("\"{s}\""),
                    WordSegment::SingleQuoted(s) => format!("'{s}'"),
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script_parser::parse_chain;

    struct NoSub;
    impl CommandSubRunner for NoSub {
        fn run_substitution(&mut self, _command_text: &str) -> Result<String, String> {
            Ok(String::new())
        }
    }

    fn build(input: &str) -> Vec<(Connector, Pipeline)> {
        let words = parser::tokenize(input).unwrap();
        let entries = parse_chain(words).unwrap();
        build_chain(entries, &AliasTable::new(), 0, &mut NoSub).unwrap()
    }

    #[test]
    fn simple_command() {
        let chain = build("echo hello");
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].1.commands[0].argv, vec!["echo", "hello"]);
        assert!(!chain[0].1.background);
    }

    #[test]
    fn pipeline_splits_on_pipe() {
        let chain = build("ls | wc -l");
        assert_eq!(chain[0].1.commands.len(), 2);
        assert_eq!(chain[0].1.commands[1].argv, vec!["wc", "-l"]);
    }

    #[test]
    fn trailing_ampersand_backgrounds() {
        let chain = build("sleep 5 &");
        assert!(chain[0].1.background);
        assert_eq!(chain[0].1.commands[0].argv, vec!["sleep", "5"]);
    }

    #[test]
    fn redirection_is_resolved() {
        let chain = build("echo hi > out.txt");
        assert_eq!(chain[0].1.commands[0].argv, vec!["echo", "hi"]);
        let redir = &chain[0].1.commands[0].redirections[0];
        assert_eq!(redir.fd, 1);
        assert!(matches!(&redir.target, ResolvedTarget::File(p) if p == "out.txt"));
    }

    #[test]
    fn alias_expands_at_head() {
        let mut aliases = AliasTable::new();
        aliases.set("ll", "ls -la");
        let words = parser::tokenize("ll /tmp").unwrap();
        let entries = parse_chain(words).unwrap();
        let chain = build_chain(entries, &aliases, 0, &mut NoSub).unwrap();
        assert_eq!(chain[0].1.commands[0].argv, vec!["ls", "-la", "/tmp"]);
    }

    #[test]
    fn quoted_head_is_not_alias_expanded() {
        let mut aliases = AliasTable::new();
        aliases.set("ll", "ls -la");
        let words = parser::tokenize("\"ll\"").unwrap();
        let entries = parse_chain(words).unwrap();
        let chain = build_chain(entries, &aliases, 0, &mut NoSub).unwrap();
        assert_eq!(chain[0].1.commands[0].argv, vec!["ll"]);
    }

    #[test]
    fn empty_pipe_segment_is_error() {
        let words = parser::tokenize("ls | | wc").unwrap();
        let entries = parse_chain(words).unwrap();
        assert!(build_chain(entries, &AliasTable::new(), 0, &mut NoSub).is_err());
    }

    #[test]
    fn ifok_runs_command_when_condition_met() {
        let words = parser::tokenize("ifok echo done").unwrap();
        let entries = parse_chain(words).unwrap();
        let chain = build_chain(entries, &AliasTable::new(), 0, &mut NoSub).unwrap();
        assert!(!chain[0].1.commands[0].skip);
        assert_eq!(chain[0].1.commands[0].argv, vec!["echo", "done"]);
    }

    #[test]
    fn ifok_skips_command_when_condition_not_met() {
        let words = parser::tokenize("ifok echo done").unwrap();
        let entries = parse_chain(words).unwrap();
        let chain = build_chain(entries, &AliasTable::new(), 1, &mut NoSub).unwrap();
        assert!(chain[0].1.commands[0].skip);
    }

    #[test]
    fn ifnot_runs_command_when_previous_failed() {
        let words = parser::tokenize("ifnot echo recovered").unwrap();
        let entries = parse_chain(words).unwrap();
        let chain = build_chain(entries, &AliasTable::new(), 1, &mut NoSub).unwrap();
        assert!(!chain[0].1.commands[0].skip);
        assert_eq!(chain[0].1.commands[0].argv, vec!["echo", "recovered"]);
    }

    #[test]
    fn ifok_without_command_is_error() {
        let words = parser::tokenize("ifok").unwrap();
        let entries = parse_chain(words).unwrap();
        assert!(build_chain(entries, &AliasTable::new(), 0, &mut NoSub).is_err());
    }

    #[test]
    fn alias_per_stage_after_pipe() {
        let mut aliases = AliasTable::new();
        aliases.set("count", "wc -l");
        let words = parser::tokenize("ls | count").unwrap();
        let entries = parse_chain(words).unwrap();
        let chain = build_chain(entries, &aliases, 0, &mut NoSub).unwrap();
        assert_eq!(chain[0].1.commands[1].argv, vec!["wc", "-l"]);
    }
}
