use std::io::Write;

const ENTRIES: &[(&str, &str)] = &[
    ("cd [DIR]", "change the working directory"),
    ("pwd", "print the working directory"),
    ("echo ARGS...", "print arguments separated by spaces"),
    ("export NAME=VALUE", "set an environment variable"),
    ("unset NAME", "remove an environment variable"),
    ("type NAME", "report whether NAME is a builtin or on PATH"),
    ("sleep SECONDS", "pause for the given number of seconds"),
    ("math EXPR", "evaluate an arithmetic expression"),
    ("alias [NAME=VALUE]", "define or list command aliases"),
    ("unalias NAME", "remove an alias"),
    ("jobs", "list background and stopped jobs"),
    ("fg [%JOB]", "bring a job to the foreground"),
    ("bg [%JOB]", "resume a stopped job in the background"),
    ("kill [%JOB|PID]", "send SIGTERM to a job or process"),
    ("wait [%JOB|PID]", "block until a job finishes"),
    ("disown [%JOB]", "remove a job from the table without killing it"),
    ("source FILE", "read and run commands from FILE"),
    ("ifok CMD...", "run CMD only if the previous command exited 0"),
    ("ifnot CMD...", "run CMD only if the previous command exited nonzero"),
    ("exit [CODE]", "exit the shell"),
];

pub fn run(_args: &[String], stdout: &mut dyn Write) -> i32 {
    for (usage, description) in ENTRIES {
        let _ = writeln!(stdout, "{usage:<24} {description}");
    }
    0
}
