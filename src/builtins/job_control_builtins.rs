use std::io::Write;

#[cfg(unix)]
use crate::job_control;
use crate::jobs::JobStatus;
use crate::shell::Shell;
use crate::status;

/// `jobs [-lprs] [jobspec]`: `-l` adds the pid column, `-p` prints only
/// pids, `-r` restricts the listing to running jobs, `-s` to stopped ones.
pub fn run_jobs(args: &[String], shell: &Shell, stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    let mut long = false;
    let mut pids_only = false;
    let mut running_only = false;
    let mut stopped_only = false;
    let mut jobspec = None;

    for arg in args {
        match arg.as_str() {
            "-l" => long = true,
            "-p" => pids_only = true,
            "-r" => running_only = true,
            "-s" => stopped_only = true,
            flags if flags.starts_with('-') && flags.len() > 1 => {
                for c in flags[1..].chars() {
                    match c {
                        'l' => long = true,
                        'p' => pids_only = true,
                        'r' => running_only = true,
                        's' => stopped_only = true,
                        other => {
                            let _ = writeln!(stderr, "mash: jobs: -{other}: invalid option");
                            return 1;
                        }
                    }
                }
            }
            other => jobspec = Some(other.to_string()),
        }
    }

    let jobs = shell.jobs.jobs_sorted();
    for job in jobs {
        if let Some(spec) = &jobspec {
            if shell.jobs.resolve_jobspec(spec) != Some(job.pos) {
                continue;
            }
        }
        match job.status {
            JobStatus::Running if stopped_only => continue,
            JobStatus::Stopped if running_only => continue,
            JobStatus::Done(_) if running_only || stopped_only => continue,
            _ => {}
        }

        if pids_only {
            let _ = writeln!(stdout, "{}", job.pid);
            continue;
        }

        let marker = match job.relevance {
            0 => "+",
            1 => "-",
            _ => " ",
        };
        let state = match job.status {
            JobStatus::Running => "Running",
            JobStatus::Stopped => "Stopped",
            JobStatus::Done(_) => "Done",
        };
        if long {
            let _ = writeln!(stdout, "[{}]{marker}  {}  {state}  {}", job.pos, job.pid, job.command);
        } else {
            let _ = writeln!(stdout, "[{}]{marker}  {state}  {}", job.pos, job.command);
        }
    }
    0
}

fn resolve_spec(args: &[String], shell: &Shell) -> Option<usize> {
    let spec = args.first().map(String::as_str).unwrap_or("%+");
    shell.jobs.resolve_jobspec(spec)
}

pub fn run_fg(args: &[String], shell: &mut Shell, stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    let Some(pos) = resolve_spec(args, shell) else {
        let _ = writeln!(stderr, "mash: fg: no such job");
        return 1;
    };
    let Some(job) = shell.jobs.remove(pos) else {
        let _ = writeln!(stderr, "mash: fg: no such job");
        return 1;
    };
    let _ = writeln!(stdout, "{}", job.command);

    #[cfg(unix)]
    {
        if job.status == JobStatus::Stopped {
            if let Err(e) = job_control::send_continue_to_group(job.pgid as libc::pid_t) {
                let _ = writeln!(stderr, "mash: fg: failed to continue job: {e}");
            }
        }

        let mut child = job.child;
        let pid = child.id() as libc::pid_t;
        let terminal_guard = job_control::ForegroundTerminalGuard::new(job.pgid as libc::pid_t).ok();
        let outcome = job_control::wait_for_pid(pid);
        drop(terminal_guard);

        match outcome {
            Ok(job_control::WaitOutcome::Exited(code)) => {
                drop(child);
                code
            }
            Ok(job_control::WaitOutcome::Stopped) => {
                let new_pos = shell.jobs.add(child, job.pgid, job.command.clone(), JobStatus::Stopped, false);
                println!("[{new_pos}]  Stopped  {}", job.command);
                0
            }
            Err(e) => {
                let _ = writeln!(stderr, "mash: fg: waitpid failed: {e}");
                1
            }
        }
    }

    #[cfg(not(unix))]
    {
        let mut child = job.child;
        match child.wait() {
            Ok(s) => status::exit_code(s),
            Err(e) => {
                let _ = writeln!(stderr, "mash: fg: {e}");
                1
            }
        }
    }
}

pub fn run_bg(args: &[String], shell: &mut Shell, stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    let Some(pos) = resolve_spec(args, shell) else {
        let _ = writeln!(stderr, "mash: bg: no such job");
        return 1;
    };
    let Some(job) = shell.jobs.get_mut(pos) else {
        let _ = writeln!(stderr, "mash: bg: no such job");
        return 1;
    };
    if job.status != JobStatus::Stopped {
        let _ = writeln!(stderr, "mash: bg: job {pos} is not stopped");
        return 1;
    }

    #[cfg(unix)]
    if let Err(e) = job_control::send_continue_to_group(job.pgid as libc::pid_t) {
        let _ = writeln!(stderr, "mash: bg: failed to continue job: {e}");
        return 1;
    }

    job.status = JobStatus::Running;
    let _ = writeln!(stdout, "[{pos}] {}", job.command);
    0
}

/// `(name, number)` table for signals common to Linux and macOS, used by
/// `kill -SIGNAME`/`kill -l`/`kill -s NAME`/`kill -n NUM`. Matches the set
/// the original shell's `kill` recognized, minus the handful of Linux-only
/// numbers (`STKFLT`, `PWR`) that would otherwise make `kill -l` lie about
/// what `kill -SIGNAME` actually accepts on other platforms.
#[cfg(unix)]
const SIGNAL_TABLE: &[(&str, libc::c_int)] = &[
    ("HUP", libc::SIGHUP),
    ("INT", libc::SIGINT),
    ("QUIT", libc::SIGQUIT),
    ("ILL", libc::SIGILL),
    ("TRAP", libc::SIGTRAP),
    ("ABRT", libc::SIGABRT),
    ("BUS", libc::SIGBUS),
    ("FPE", libc::SIGFPE),
    ("KILL", libc::SIGKILL),
    ("USR1", libc::SIGUSR1),
    ("SEGV", libc::SIGSEGV),
    ("USR2", libc::SIGUSR2),
    ("PIPE", libc::SIGPIPE),
    ("ALRM", libc::SIGALRM),
    ("TERM", libc::SIGTERM),
    ("CHLD", libc::SIGCHLD),
    ("CONT", libc::SIGCONT),
    ("STOP", libc::SIGSTOP),
    ("TSTP", libc::SIGTSTP),
    ("TTIN", libc::SIGTTIN),
    ("TTOU", libc::SIGTTOU),
    ("URG", libc::SIGURG),
    ("XCPU", libc::SIGXCPU),
    ("XFSZ", libc::SIGXFSZ),
    ("VTALRM", libc::SIGVTALRM),
    ("PROF", libc::SIGPROF),
    ("WINCH", libc::SIGWINCH),
    ("SYS", libc::SIGSYS),
];

#[cfg(unix)]
fn signal_by_name(name: &str) -> Option<libc::c_int> {
    let name = name.strip_prefix("SIG").unwrap_or(name);
    SIGNAL_TABLE
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, num)| *num)
}

#[cfg(unix)]
fn signal_name(num: libc::c_int) -> Option<&'static str> {
    SIGNAL_TABLE.iter().find(|(_, n)| *n == num).map(|(name, _)| *name)
}

/// Parse the optional `-s SIGNAME`, `-n NUM`, or bare `-SIGNAME`/`-NUM` flag
/// that may precede `kill`'s jobspec argument. Returns the resolved signal
/// number and the remaining (unconsumed) arguments.
#[cfg(unix)]
fn parse_signal_spec<'a>(args: &'a [String]) -> Result<(libc::c_int, &'a [String]), String> {
    let Some(first) = args.first() else {
        return Ok((libc::SIGTERM, args));
    };

    if first == "-s" {
        let name = args.get(1).ok_or("kill: -s requires a signal name")?;
        let sig = signal_by_name(name).ok_or_else(|| format!("kill: {name}: unknown signal name"))?;
        return Ok((sig, &args[2..]));
    }
    if first == "-n" {
        let num = args.get(1).ok_or("kill: -n requires a signal number")?;
        let sig: libc::c_int = num.parse().map_err(|_| format!("kill: {num}: invalid signal number"))?;
        return Ok((sig, &args[2..]));
    }
    if let Some(rest) = first.strip_prefix('-') {
        if rest.is_empty() {
            return Ok((libc::SIGTERM, args));
        }
        let sig = if let Ok(num) = rest.parse::<libc::c_int>() {
            num
        } else {
            signal_by_name(rest).ok_or_else(|| format!("kill: {rest}: unknown signal name"))?
        };
        return Ok((sig, &args[1..]));
    }

    Ok((libc::SIGTERM, args))
}

pub fn run_kill(args: &[String], shell: &mut Shell, stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    #[cfg(unix)]
    {
        if args.first().map(String::as_str) == Some("-l") {
            if let Some(spec) = args.get(1) {
                // `kill -l NUM` prints the name; `kill -l SIGNAME` prints the number.
                if let Ok(num) = spec.parse::<libc::c_int>() {
                    match signal_name(num) {
                        Some(name) => {
                            let _ = writeln!(stdout, "{name}");
                            return 0;
                        }
                        None => {
                            let _ = writeln!(stderr, "mash: kill: {spec}: unknown signal number");
                            return 1;
                        }
                    }
                }
                return match signal_by_name(spec) {
                    Some(num) => {
                        let _ = writeln!(stdout, "{num}");
                        0
                    }
                    None => {
                        let _ = writeln!(stderr, "mash: kill: {spec}: unknown signal name");
                        1
                    }
                };
            }
            for (name, num) in SIGNAL_TABLE {
                let _ = writeln!(stdout, "{num}) SIG{name}");
            }
            return 0;
        }

        let (signal, rest) = match parse_signal_spec(args) {
            Ok(pair) => pair,
            Err(msg) => {
                let _ = writeln!(stderr, "mash: {msg}");
                return 1;
            }
        };
        let Some(spec) = rest.first() else {
            let _ = writeln!(stderr, "mash: kill: usage: kill [-s sig|-n num|-sig] %JOB|PID");
            return 1;
        };
        let Some(pid) = shell.jobs.resolve_pid(spec) else {
            let _ = writeln!(stderr, "mash: kill: {spec}: no such job or process");
            return 1;
        };

        let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
        if rc != 0 {
            let _ = writeln!(stderr, "mash: kill: {}", std::io::Error::last_os_error());
            return 1;
        }
        0
    }

    #[cfg(not(unix))]
    {
        let _ = stdout;
        let Some(spec) = args.last() else {
            let _ = writeln!(stderr, "mash: kill: usage: kill %JOB|PID");
            return 1;
        };
        let Some(pid) = shell.jobs.resolve_pid(spec) else {
            let _ = writeln!(stderr, "mash: kill: {spec}: no such job or process");
            return 1;
        };
        let _ = pid;
        let _ = writeln!(stderr, "mash: kill: not supported on this platform");
        1
    }
}

pub fn run_wait(args: &[String], shell: &mut Shell, stderr: &mut dyn Write) -> i32 {
    if let Some(spec) = args.first() {
        let Some(pos) = shell.jobs.resolve_jobspec(spec).or_else(|| {
            spec.parse::<u32>()
                .ok()
                .and_then(|pid| shell.jobs.jobs_sorted().iter().find(|j| j.pid == pid).map(|j| j.pos))
        }) else {
            let _ = writeln!(stderr, "mash: wait: {spec}: no such job");
            return 1;
        };
        return wait_one(shell, pos);
    }

    let mut code = 0;
    let positions: Vec<usize> = shell.jobs.jobs_sorted().iter().map(|j| j.pos).collect();
    for pos in positions {
        code = wait_one(shell, pos);
    }
    code
}

fn wait_one(shell: &mut Shell, pos: usize) -> i32 {
    let Some(job) = shell.jobs.remove(pos) else {
        return 0;
    };
    let mut child = job.child;
    match child.wait() {
        Ok(s) => status::exit_code(s),
        Err(_) => 1,
    }
}

/// `disown [-a|-r|jobspec|pid]`: `-a` disowns every tracked job, `-r` every
/// running one, a bare jobspec/pid disowns just that job, and no argument
/// disowns the current job. Disowning removes the job from the table
/// entirely (it stops being listed by `jobs` and reaped by the shell) but
/// does not touch the underlying process — dropping the `Job` drops the
/// `std::process::Child` handle without waiting on or killing it.
pub fn run_disown(args: &[String], shell: &mut Shell, stderr: &mut dyn Write) -> i32 {
    match args.first().map(String::as_str) {
        Some("-a") => {
            for pos in shell.jobs.jobs_sorted().iter().map(|j| j.pos).collect::<Vec<_>>() {
                shell.jobs.remove(pos);
            }
            return 0;
        }
        Some("-r") => {
            let running: Vec<usize> = shell
                .jobs
                .jobs_sorted()
                .iter()
                .filter(|j| j.status == JobStatus::Running)
                .map(|j| j.pos)
                .collect();
            for pos in running {
                shell.jobs.remove(pos);
            }
            return 0;
        }
        _ => {}
    }

    let Some(pos) = resolve_spec(args, shell) else {
        let _ = writeln!(stderr, "mash: disown: no such job");
        return 1;
    };
    if shell.jobs.remove(pos).is_none() {
        let _ = writeln!(stderr, "mash: disown: no such job");
        return 1;
    }
    0
}

pub fn run_alias(args: &[String], shell: &mut Shell, stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    if args.is_empty() {
        for (name, value) in shell.aliases.sorted() {
            let _ = writeln!(stdout, "alias {name}='{value}'");
        }
        return 0;
    }

    let mut status_code = 0;
    for arg in args {
        match arg.split_once('=') {
            Some((name, value)) => shell.aliases.set(name, value),
            None => match shell.aliases.get(arg) {
                Some(value) => {
                    let _ = writeln!(stdout, "alias {arg}='{value}'");
                }
                None => {
                    let _ = writeln!(stderr, "mash: alias: {arg}: not found");
                    status_code = 1;
                }
            },
        }
    }
    status_code
}
