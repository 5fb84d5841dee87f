use std::io::Write;

/// `echo [-n] args`: `-n` suppresses the trailing newline.
pub fn run(args: &[String], stdout: &mut dyn Write) -> i32 {
    let (suppress_newline, words) = match args.first() {
        Some(first) if first == "-n" => (true, &args[1..]),
        _ => (false, args),
    };
    let text = words.join(" ");
    if suppress_newline {
        let _ = write!(stdout, "{text}");
    } else {
        let _ = writeln!(stdout, "{text}");
    }
    0
}
