use crate::parser::{TextPart, Word, WordSegment, split_command_subs};

/// Runs a nested pipeline for `$(...)` command substitution and returns its
/// captured stdout (trailing newlines stripped, matching shell convention).
/// Implemented by [`crate::shell::Shell`]; kept as a trait so the expander
/// doesn't need to know about the executor.
pub trait CommandSubRunner {
    fn run_substitution(&mut self, command_text: &str) -> Result<String, String>;
}

/// Expand a list of parsed words into final argument strings.
/// Applies tilde, variable, command-substitution, and glob expansion
/// according to quote context.
pub fn expand_words(
    words: &[Word],
    last_exit_code: i32,
    runner: &mut dyn CommandSubRunner,
) -> Result<Vec<String>, String> {
    let mut result = Vec::new();
    for word in words {
        result.extend(expand_word(word, last_exit_code, runner)?);
    }
    Ok(result)
}

/// Expand a single word into one or more strings (more than one only when
/// an unquoted segment contains a glob that matches multiple paths).
pub fn expand_word(
    segments: &[WordSegment],
    last_exit_code: i32,
    runner: &mut dyn CommandSubRunner,
) -> Result<Vec<String>, String> {
    let mut combined = String::new();
    let mut is_globbable = false;

    for segment in segments {
        match segment {
            WordSegment::SingleQuoted(text) => {
                combined.push_str(text);
            }
            WordSegment::DoubleQuoted(text) => {
                let expanded = expand_substitutions_and_variables(text, last_exit_code, runner)?;
                combined.push_str(&expanded);
            }
            WordSegment::Unquoted(text) => {
                let expanded = expand_substitutions_and_variables(text, last_exit_code, runner)?;
                let expanded = expand_tilde(&expanded);
                if contains_glob_chars(&expanded) {
                    is_globbable = true;
                }
                combined.push_str(&expanded);
            }
        }
    }

    if is_globbable {
        Ok(expand_globs(&combined))
    } else {
        Ok(vec![combined])
    }
}

/// Expand exactly one word into exactly one string, for contexts (redirect
/// targets, `cd` arguments) where multiple results from a glob make no
/// sense. A glob that matches several paths here keeps its literal pattern
/// text, matching bash's behavior for redirection targets.
pub fn expand_word_single(
    segments: &[WordSegment],
    last_exit_code: i32,
    runner: &mut dyn CommandSubRunner,
) -> Result<String, String> {
    let mut combined = String::new();
    for segment in segments {
        match segment {
            WordSegment::SingleQuoted(text) => combined.push_str(text),
            WordSegment::DoubleQuoted(text) => {
                combined.push_str(&expand_substitutions_and_variables(
                    text,
                    last_exit_code,
                    runner,
                )?);
            }
            WordSegment::Unquoted(text) => {
                let expanded = expand_substitutions_and_variables(text, last_exit_code, runner)?;
                combined.push_str(&expand_tilde(&expanded));
            }
        }
    }
    Ok(combined)
}

fn expand_substitutions_and_variables(
    text: &str,
    last_exit_code: i32,
    runner: &mut dyn CommandSubRunner,
) -> Result<String, String> {
    let mut out = String::new();
    for part in split_command_subs(text) {
        match part {
            TextPart::Literal(lit) => out.push_str(&expand_variables(&lit, last_exit_code)?),
            TextPart::Sub(src) => out.push_str(&runner.run_substitution(&src)?),
        }
    }
    Ok(out)
}

// ── Tilde Expansion ──

fn expand_tilde(token: &str) -> String {
    if !token.starts_with('~') {
        return token.to_string();
    }

    let home = get_home_dir();

    if token == "~" {
        return home;
    }

    if token.starts_with("~/") || token.starts_with("~\\") {
        return format!("{home}{}", &token[1..]);
    }

    // ~username not supported — returned as-is
    token.to_string()
}

fn get_home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| "~".to_string())
}

// ── Variable Expansion ──

/// Looks up `name` in the environment, reporting a `mash:`-prefixed
/// diagnostic and aborting the rest of the line the way an unresolved
/// redirect or syntax error does, rather than silently substituting "".
fn lookup_var(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("mash: {name}: unbound variable"))
}

fn expand_variables(input: &str, last_exit_code: i32) -> Result<String, String> {
    let mut result = String::new();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        match chars.peek() {
            None => result.push('$'),
            Some(&'?') => {
                chars.next();
                result.push_str(&last_exit_code.to_string());
            }
            Some(&'$') => {
                chars.next();
                result.push_str(&std::process::id().to_string());
            }
            Some(&'0') => {
                chars.next();
                result.push_str("mash");
            }
            Some(&'{') => {
                chars.next();
                let name: String = chars.by_ref().take_while(|c| *c != '}').collect();
                if name.is_empty() {
                    result.push_str("${}");
                } else {
                    result.push_str(&lookup_var(&name)?);
                }
            }
            Some(&c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                name.push(chars.next().unwrap());
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(chars.next().unwrap());
                    } else {
                        break;
                    }
                }
                result.push_str(&lookup_var(&name)?);
            }
            Some(_) => result.push('$'),
        }
    }

    Ok(result)
}

// ── Glob Expansion ──

fn contains_glob_chars(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[')
}

fn expand_globs(pattern: &str) -> Vec<String> {
    if !contains_glob_chars(pattern) {
        return vec![pattern.to_string()];
    }

    match glob::glob(pattern) {
        Ok(paths) => {
            let mut matches: Vec<String> = paths
                .filter_map(|entry| entry.ok())
                .map(|path| path.to_string_lossy().into_owned())
                .collect();

            if matches.is_empty() {
                vec![pattern.to_string()]
            } else {
                matches.sort();
                matches
            }
        }
        Err(_) => vec![pattern.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoSub;
    impl CommandSubRunner for NoSub {
        fn run_substitution(&mut self, _command_text: &str) -> Result<String, String> {
            Ok(String::new())
        }
    }

    struct EchoSub;
    impl CommandSubRunner for EchoSub {
        fn run_substitution(&mut self, command_text: &str) -> Result<String, String> {
            Ok(format!("[{command_text}]"))
        }
    }

    #[test]
    fn tilde_alone() {
        let expanded = expand_tilde("~");
        assert_ne!(expanded, "~");
    }

    #[test]
    fn tilde_in_middle_not_expanded() {
        assert_eq!(expand_tilde("foo~bar"), "foo~bar");
    }

    #[test]
    fn variable_simple() {
        unsafe { std::env::set_var("MASH_TEST_VAR", "hello") };
        assert_eq!(expand_variables("$MASH_TEST_VAR", 0).unwrap(), "hello");
        unsafe { std::env::remove_var("MASH_TEST_VAR") };
    }

    #[test]
    fn variable_braced() {
        unsafe { std::env::set_var("MASH_TEST_VAR2", "world") };
        assert_eq!(expand_variables("${MASH_TEST_VAR2}!", 0).unwrap(), "world!");
        unsafe { std::env::remove_var("MASH_TEST_VAR2") };
    }

    #[test]
    fn variable_exit_code() {
        assert_eq!(expand_variables("$?", 42).unwrap(), "42");
    }

    #[test]
    fn variable_shell_name() {
        assert_eq!(expand_variables("$0", 0).unwrap(), "mash");
    }

    #[test]
    fn unset_variable_reports_error_and_aborts() {
        // Ensure the name really is unset before asserting on it.
        unsafe { std::env::remove_var("MASH_DEFINITELY_UNSET_VAR") };
        let err = expand_variables("$MASH_DEFINITELY_UNSET_VAR", 0).unwrap_err();
        assert!(err.starts_with("mash:"));
        assert!(err.contains("MASH_DEFINITELY_UNSET_VAR"));
    }

    #[test]
    fn unset_braced_variable_reports_error() {
        unsafe { std::env::remove_var("MASH_DEFINITELY_UNSET_VAR2") };
        let err = expand_variables("${MASH_DEFINITELY_UNSET_VAR2}", 0).unwrap_err();
        assert!(err.starts_with("mash:"));
    }

    #[test]
    fn unset_variable_fails_word_expansion() {
        unsafe { std::env::remove_var("MASH_DEFINITELY_UNSET_VAR3") };
        let word = vec![WordSegment::Unquoted("$MASH_DEFINITELY_UNSET_VAR3".into())];
        assert!(expand_word(&word, 0, &mut NoSub).is_err());
    }

    #[test]
    fn single_quoted_no_expansion() {
        let word = vec![WordSegment::SingleQuoted("$HOME".into())];
        let result = expand_word(&word, 0, &mut NoSub).unwrap();
        assert_eq!(result, vec!["$HOME"]);
    }

    #[test]
    fn double_quoted_expands_vars() {
        unsafe { std::env::set_var("MASH_DQ_TEST", "expanded") };
        let word = vec![WordSegment::DoubleQuoted("$MASH_DQ_TEST".into())];
        let result = expand_word(&word, 0, &mut NoSub).unwrap();
        assert_eq!(result, vec!["expanded"]);
        unsafe { std::env::remove_var("MASH_DQ_TEST") };
    }

    #[test]
    fn double_quoted_no_glob() {
        let word = vec![WordSegment::DoubleQuoted("*.rs".into())];
        let result = expand_word(&word, 0, &mut NoSub).unwrap();
        assert_eq!(result, vec!["*.rs"]);
    }

    #[test]
    fn no_glob_matches_keeps_literal() {
        let result = expand_globs("*.definitely_not_a_real_extension_xyz");
        assert_eq!(result, vec!["*.definitely_not_a_real_extension_xyz"]);
    }

    #[test]
    fn command_substitution_runs_through_runner() {
        let word = vec![WordSegment::Unquoted("pre\u{1}echo hi\u{1}post".into())];
        let result = expand_word(&word, 0, &mut EchoSub).unwrap();
        assert_eq!(result, vec!["pre[echo hi]post"]);
    }
}
