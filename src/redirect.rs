use crate::parser::{Word, WordSegment, as_operator};

/// What a file descriptor should be connected to. Targets that come from
/// parsed text are kept as [`Word`]s so they still go through variable and
/// tilde expansion before being opened.
#[derive(Debug, Clone)]
pub enum RedirectTarget {
    /// Write to file (truncate)
    File(Word),
    /// Write to file (append)
    FileAppend(Word),
    /// Read from file
    FileRead(Word),
    /// Duplicate another fd (e.g., 2>&1)
    Fd(i32),
    /// Feed a string as stdin (also backs `HERE{...}` here-documents, spliced
    /// in as a here-string by the line reader before tokenizing)
    HereString(Word),
}

/// A single I/O redirection instruction.
#[derive(Debug, Clone)]
pub struct Redirection {
    pub fd: i32,
    pub target: RedirectTarget,
}

/// Separate redirect operator words from regular argument words.
///
/// Handles `>`, `>>`, `<`, `<<<`, `2>`, `2>>`, `2>&1`, `1>&2`, `>&1`, `>&2`,
/// and `&>` (merge stdout+stderr into one file).
pub fn extract_redirections(words: &[Word]) -> Result<(Vec<Word>, Vec<Redirection>), String> {
    let mut args = Vec::new();
    let mut redirections = Vec::new();
    let mut i = 0;

    while i < words.len() {
        let op = as_operator(&words[i]);
        match op {
            Some(">") => {
                i += 1;
                let target = expect_word(i, words, ">")?;
                redirections.push(Redirection {
                    fd: 1,
                    target: RedirectTarget::File(target),
                });
            }
            Some(">>") => {
                i += 1;
                let target = expect_word(i, words, ">>")?;
                redirections.push(Redirection {
                    fd: 1,
                    target: RedirectTarget::FileAppend(target),
                });
            }
            Some("<") => {
                i += 1;
                let target = expect_word(i, words, "<")?;
                redirections.push(Redirection {
                    fd: 0,
                    target: RedirectTarget::FileRead(target),
                });
            }
            Some("<<<") => {
                i += 1;
                let target = expect_word(i, words, "<<<")?;
                redirections.push(Redirection {
                    fd: 0,
                    target: RedirectTarget::HereString(target),
                });
            }
            Some("2>") => {
                i += 1;
                let target = expect_word(i, words, "2>")?;
                redirections.push(Redirection {
                    fd: 2,
                    target: RedirectTarget::File(target),
                });
            }
            Some("2>>") => {
                i += 1;
                let target = expect_word(i, words, "2>>")?;
                redirections.push(Redirection {
                    fd: 2,
                    target: RedirectTarget::FileAppend(target),
                });
            }
            Some("2>&1") => {
                redirections.push(Redirection {
                    fd: 2,
                    target: RedirectTarget::Fd(1),
                });
            }
            Some("1>&2") => {
                redirections.push(Redirection {
                    fd: 1,
                    target: RedirectTarget::Fd(2),
                });
            }
            Some(">&1") => {
                redirections.push(Redirection {
                    fd: 1,
                    target: RedirectTarget::Fd(1),
                });
            }
            Some(">&2") => {
                redirections.push(Redirection {
                    fd: 1,
                    target: RedirectTarget::Fd(2),
                });
            }
            Some("&>") => {
                i += 1;
                let target = expect_word(i, words, "&>")?;
                redirections.push(Redirection {
                    fd: 1,
                    target: RedirectTarget::File(target.clone()),
                });
                redirections.push(Redirection {
                    fd: 2,
                    target: RedirectTarget::Fd(1),
                });
            }
            _ => args.push(words[i].clone()),
        }
        i += 1;
    }

    Ok((args, redirections))
}

fn expect_word(i: usize, words: &[Word], operator: &str) -> Result<Word, String> {
    if i < words.len() {
        Ok(words[i].clone())
    } else {
        Err(format!("mash: syntax error: expected filename after '{operator}'"))
    }
}

/// Check if a path refers to a null device (cross-platform).
pub fn is_null_device(path: &str) -> bool {
    if cfg!(windows) {
        path.eq_ignore_ascii_case("NUL") || path.eq_ignore_ascii_case("/dev/null")
    } else {
        path == "/dev/null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokenize;

    fn words_to_strings(words: &[Word]) -> Vec<String> {
        words
            .iter()
            .map(|w| {
                w.iter()
                    .map(|seg| match seg {
                        WordSegment::Unquoted(s)
                        | WordSegment::DoubleQuoted(s)
                        | WordSegment::SingleQuoted(s) => s.as_str(),
                    })
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn simple_stdout_redirect() {
        let words = tokenize("echo hello > out.txt").unwrap();
        let (args, redirs) = extract_redirections(&words).unwrap();
        assert_eq!(words_to_strings(&args), vec!["echo", "hello"]);
        assert_eq!(redirs.len(), 1);
        assert_eq!(redirs[0].fd, 1);
        assert!(matches!(&redirs[0].target, RedirectTarget::File(_)));
    }

    #[test]
    fn append_redirect() {
        let words = tokenize("echo hello >> out.txt").unwrap();
        let (_, redirs) = extract_redirections(&words).unwrap();
        assert!(matches!(&redirs[0].target, RedirectTarget::FileAppend(_)));
    }

    #[test]
    fn stdin_redirect() {
        let words = tokenize("sort < data.txt").unwrap();
        let (args, redirs) = extract_redirections(&words).unwrap();
        assert_eq!(words_to_strings(&args), vec!["sort"]);
        assert_eq!(redirs[0].fd, 0);
    }

    #[test]
    fn stderr_to_stdout() {
        let words = tokenize("ls 2>&1").unwrap();
        let (args, redirs) = extract_redirections(&words).unwrap();
        assert_eq!(words_to_strings(&args), vec!["ls"]);
        assert_eq!(redirs[0].fd, 2);
        assert!(matches!(&redirs[0].target, RedirectTarget::Fd(1)));
    }

    #[test]
    fn here_string() {
        let words = tokenize(r#"cat <<< "hello world""#).unwrap();
        let (args, redirs) = extract_redirections(&words).unwrap();
        assert_eq!(words_to_strings(&args), vec!["cat"]);
        assert!(matches!(&redirs[0].target, RedirectTarget::HereString(_)));
    }

    #[test]
    fn quoted_operator_is_an_argument() {
        let words = tokenize(r#"echo ">""#).unwrap();
        let (args, redirs) = extract_redirections(&words).unwrap();
        assert_eq!(words_to_strings(&args), vec!["echo", ">"]);
        assert!(redirs.is_empty());
    }

    #[test]
    fn missing_filename_is_error() {
        let words = tokenize("echo >").unwrap();
        assert!(extract_redirections(&words).is_err());
    }

    #[test]
    fn merge_stdout_stderr() {
        let words = tokenize("cmd &> out.txt").unwrap();
        let (_, redirs) = extract_redirections(&words).unwrap();
        assert_eq!(redirs.len(), 2);
        assert_eq!(redirs[0].fd, 1);
        assert_eq!(redirs[1].fd, 2);
        assert!(matches!(&redirs[1].target, RedirectTarget::Fd(1)));
    }

    #[test]
    fn null_device_detection() {
        assert!(is_null_device("/dev/null"));
    }
}
