use os_pipe::{PipeReader, PipeWriter, pipe};
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::process::{Command as ProcessCommand, Stdio};

use crate::ast::Connector;
use crate::builtins::{self, BuiltinOutcome};
use crate::command::{Command, Pipeline, ResolvedTarget};
#[cfg(unix)]
use crate::job_control;
use crate::jobs::JobStatus;
use crate::redirect::is_null_device;
use crate::shell::Shell;
#[cfg(not(unix))]
use crate::status;

/// What the REPL should do after a chain finished running.
pub enum ExecutionAction {
    Continue,
    Exit(i32),
}

enum PipelineOutcome {
    Status(i32),
    Exit(i32),
}

fn connector_allows(connector: Connector, last_exit_code: i32) -> bool {
    match connector {
        Connector::Sequence => true,
        Connector::And => last_exit_code == 0,
        Connector::Or => last_exit_code != 0,
    }
}

/// Run every pipeline in a chain, left to right, gating each on its
/// connector and the previous pipeline's exit status.
pub fn execute_chain(chain: Vec<(Connector, Pipeline)>, shell: &mut Shell) -> ExecutionAction {
    for (connector, pipeline) in chain {
        if !connector_allows(connector, shell.last_exit_code) {
            continue;
        }
        match execute_pipeline(pipeline, shell, shell.last_exit_code, None) {
            PipelineOutcome::Exit(code) => return ExecutionAction::Exit(code),
            PipelineOutcome::Status(code) => shell.last_exit_code = code,
        }
    }
    ExecutionAction::Continue
}

/// Same as [`execute_chain`], but each pipeline's stdout is captured into
/// `buffer` instead of going to the real terminal — used to resolve
/// `$(...)` command substitution.
pub fn execute_chain_capturing(
    chain: Vec<(Connector, Pipeline)>,
    shell: &mut Shell,
    buffer: &mut Vec<u8>,
) -> Result<i32, String> {
    let mut code = 0;
    for (connector, pipeline) in chain {
        if !connector_allows(connector, code) {
            continue;
        }
        match execute_pipeline(pipeline, shell, code, Some(buffer)) {
            PipelineOutcome::Exit(c) => return Ok(c),
            PipelineOutcome::Status(c) => code = c,
        }
    }
    Ok(code)
}

fn execute_pipeline(
    pipeline: Pipeline,
    shell: &mut Shell,
    previous_code: i32,
    capture: Option<&mut Vec<u8>>,
) -> PipelineOutcome {
    let Pipeline { commands, background, raw_text } = pipeline;

    if commands.is_empty() {
        return PipelineOutcome::Status(previous_code);
    }

    // `ifok`/`ifnot` whose condition wasn't met skip the whole pipeline
    // rather than threading a transparent pass-through through every stage —
    // a rare case in practice, since they're almost always used standalone.
    if commands.iter().any(|c| c.skip) {
        return PipelineOutcome::Status(previous_code);
    }

    if commands.len() > 1 {
        for cmd in &commands {
            if let Some(name) = cmd.argv.first() {
                if matches!(builtins::classify(name), Some(builtins::BuiltinClass::ShellOnly)) {
                    eprintln!("mash: '{name}' is not supported in a pipeline");
                    return PipelineOutcome::Status(1);
                }
            }
        }
    }

    if commands.len() == 1 {
        return execute_single(&commands[0], shell, background, &raw_text, capture);
    }

    execute_multi_stage(commands, shell, background, &raw_text, capture)
}

fn execute_single(
    cmd: &Command,
    shell: &mut Shell,
    background: bool,
    raw_text: &str,
    capture: Option<&mut Vec<u8>>,
) -> PipelineOutcome {
    let Some(name) = cmd.argv.first().cloned() else {
        return PipelineOutcome::Status(0);
    };

    if let Some(class) = builtins::classify(&name) {
        let defaults = RedirectionDefaults {
            stdin: InputHandle::Inherit,
            stdout: OutputHandle::Inherit,
            stderr: OutputHandle::Inherit,
        };
        let resolved = match resolve_redirections(cmd, defaults) {
            Ok(r) => r,
            Err(msg) => {
                eprintln!("{msg}");
                return PipelineOutcome::Status(1);
            }
        };

        let mut capture_buf = Vec::new();
        let mut real_stdout = if capture.is_none() {
            match resolved.stdout.into_writer("stdout") {
                Ok(w) => Some(w),
                Err(msg) => {
                    eprintln!("{msg}");
                    return PipelineOutcome::Status(1);
                }
            }
        } else {
            None
        };
        let mut stderr_writer = match resolved.stderr.into_writer("stderr") {
            Ok(w) => w,
            Err(msg) => {
                eprintln!("{msg}");
                return PipelineOutcome::Status(1);
            }
        };
        let stdout_writer: &mut dyn Write =
            real_stdout.as_deref_mut().map(|w| w as &mut dyn Write).unwrap_or(&mut capture_buf);

        let outcome = match class {
            builtins::BuiltinClass::ChildSafe => {
                PipelineOutcome::Status(builtins::run_child_safe(&cmd.argv, stdout_writer, &mut *stderr_writer))
            }
            builtins::BuiltinClass::ShellOnly => {
                match builtins::run_shell_only(&cmd.argv, shell, stdout_writer, &mut *stderr_writer) {
                    BuiltinOutcome::Status(code) => PipelineOutcome::Status(code),
                    BuiltinOutcome::Exit(code) => PipelineOutcome::Exit(code),
                }
            }
            builtins::BuiltinClass::Modify => {
                eprintln!("mash: {name}: missing command");
                PipelineOutcome::Status(1)
            }
        };
        if let Some(mut w) = real_stdout {
            let _ = w.flush();
        }
        let _ = stderr_writer.flush();

        if let Some(buf) = capture {
            buf.extend_from_slice(&capture_buf);
        }
        return outcome;
    }

    run_external_single(cmd, shell, background, raw_text, capture)
}

fn run_external_single(
    cmd: &Command,
    shell: &mut Shell,
    background: bool,
    raw_text: &str,
    capture: Option<&mut Vec<u8>>,
) -> PipelineOutcome {
    let defaults = RedirectionDefaults {
        stdin: InputHandle::Inherit,
        stdout: OutputHandle::Inherit,
        stderr: OutputHandle::Inherit,
    };
    let resolved = match resolve_redirections(cmd, defaults) {
        Ok(r) => r,
        Err(msg) => {
            eprintln!("{msg}");
            return PipelineOutcome::Status(1);
        }
    };

    let mut process = ProcessCommand::new(&cmd.argv[0]);
    process.args(&cmd.argv[1..]);

    #[cfg(unix)]
    set_child_pre_exec(&mut process, None);

    let (stdin_stdio, here_string) = match resolved.stdin.into_stdio() {
        Ok(r) => r,
        Err(msg) => {
            eprintln!("{msg}");
            return PipelineOutcome::Status(1);
        }
    };
    let mut capture_reader = None;
    let stdout_stdio = if capture.is_some() {
        match pipe() {
            Ok((reader, writer)) => {
                capture_reader = Some(reader);
                Stdio::from(writer)
            }
            Err(e) => {
                eprintln!("mash: failed to create pipe: {e}");
                return PipelineOutcome::Status(1);
            }
        }
    } else {
        match resolved.stdout.into_stdio_plain() {
            Ok(s) => s,
            Err(msg) => {
                eprintln!("{msg}");
                return PipelineOutcome::Status(1);
            }
        }
    };
    let stderr_stdio = match resolved.stderr.into_stdio_plain() {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("{msg}");
            return PipelineOutcome::Status(1);
        }
    };

    process.stdin(stdin_stdio).stdout(stdout_stdio).stderr(stderr_stdio);

    let mut child = match process.spawn() {
        Ok(child) => child,
        Err(e) => return PipelineOutcome::Status(command_error(&cmd.argv[0], &e)),
    };

    if let Some(text) = here_string {
        if let Some(mut stdin) = child.stdin.take() {
            let _ = writeln!(stdin, "{text}");
        }
    }

    // Draining before waiting avoids a deadlock if output exceeds the pipe
    // buffer: reading blocks until the child closes its end, which happens
    // at exit (or earlier), so this always terminates.
    if let (Some(mut reader), Some(buf)) = (capture_reader, capture) {
        let _ = reader.read_to_end(buf);
    }

    let pgid = child_process_group(&child, &cmd.argv[0]);

    if background {
        let pos = shell.jobs.add(child, pgid, raw_text.to_string(), JobStatus::Running, true);
        println!("[{pos}] {pgid}");
        return PipelineOutcome::Status(0);
    }

    PipelineOutcome::Status(run_foreground(child, &cmd.argv[0], pgid, shell, raw_text))
}

fn execute_multi_stage(
    commands: Vec<Command>,
    shell: &mut Shell,
    background: bool,
    raw_text: &str,
    mut capture: Option<&mut Vec<u8>>,
) -> PipelineOutcome {
    #[allow(unused_mut)]
    let mut pipeline_pgid: Option<u32> = None;
    let mut children: Vec<std::process::Child> = Vec::new();
    let mut builtin_threads: Vec<std::thread::JoinHandle<()>> = Vec::new();
    let mut prev_pipe: Option<PipeReader> = None;
    let mut last_status = 0;
    let count = commands.len();
    let last_is_external =
        !builtins::is_builtin(commands.last().unwrap().argv.first().map(String::as_str).unwrap_or(""));
    let mut last_external_index: Option<usize> = None;
    let mut capture_reader: Option<PipeReader> = None;

    for (idx, cmd) in commands.into_iter().enumerate() {
        let is_last = idx + 1 == count;
        let name = cmd.argv.first().cloned().unwrap_or_default();
        let builtin_class = builtins::classify(&name);
        let capturing_this_stage = is_last && capture.is_some();

        let stdin_default = prev_pipe.take().map(InputHandle::Pipe).unwrap_or(InputHandle::Inherit);

        // A capturing last builtin writes straight into the buffer, so it
        // needs no OS pipe at all; a capturing last external command does.
        let needs_pipe = !is_last || (capturing_this_stage && builtin_class.is_none());
        let (stdout_default, next_pipe_reader) = if needs_pipe {
            match pipe() {
                Ok((reader, writer)) => (OutputHandle::Pipe(writer), Some(reader)),
                Err(e) => {
                    eprintln!("mash: failed to create pipe: {e}");
                    wait_children(&mut children);
                    return PipelineOutcome::Status(1);
                }
            }
        } else {
            (OutputHandle::Inherit, None)
        };

        let defaults = RedirectionDefaults {
            stdin: stdin_default,
            stdout: stdout_default,
            stderr: OutputHandle::Inherit,
        };
        let resolved = match resolve_redirections(&cmd, defaults) {
            Ok(r) => r,
            Err(msg) => {
                eprintln!("{msg}");
                wait_children(&mut children);
                return PipelineOutcome::Status(1);
            }
        };

        if let Some(class) = builtin_class {
            let mut stdin_reader = match resolved.stdin.into_reader() {
                Ok(r) => r,
                Err(msg) => {
                    eprintln!("{msg}");
                    wait_children(&mut children);
                    return PipelineOutcome::Status(1);
                }
            };
            let _ = stdin_reader.as_mut();

            if is_last {
                let mut capture_buf = Vec::new();
                let mut real_stdout = if capturing_this_stage {
                    None
                } else {
                    match resolved.stdout.into_writer("stdout") {
                        Ok(w) => Some(w),
                        Err(msg) => {
                            eprintln!("{msg}");
                            wait_children(&mut children);
                            return PipelineOutcome::Status(1);
                        }
                    }
                };
                let mut stderr_writer = match resolved.stderr.into_writer("stderr") {
                    Ok(w) => w,
                    Err(msg) => {
                        eprintln!("{msg}");
                        wait_children(&mut children);
                        return PipelineOutcome::Status(1);
                    }
                };
                let stdout_writer: &mut dyn Write =
                    real_stdout.as_deref_mut().map(|w| w as &mut dyn Write).unwrap_or(&mut capture_buf);

                let code = match class {
                    builtins::BuiltinClass::ChildSafe => {
                        builtins::run_child_safe(&cmd.argv, stdout_writer, stderr_writer.as_mut())
                    }
                    builtins::BuiltinClass::ShellOnly => {
                        match builtins::run_shell_only(&cmd.argv, shell, stdout_writer, stderr_writer.as_mut()) {
                            BuiltinOutcome::Status(c) => c,
                            BuiltinOutcome::Exit(c) => {
                                if let Some(mut w) = real_stdout {
                                    let _ = w.flush();
                                }
                                wait_children(&mut children);
                                return PipelineOutcome::Exit(c);
                            }
                        }
                    }
                    builtins::BuiltinClass::Modify => 1,
                };
                if let Some(mut w) = real_stdout {
                    let _ = w.flush();
                }
                let _ = stderr_writer.flush();
                if capturing_this_stage {
                    if let Some(buf) = capture.as_deref_mut() {
                        buf.extend_from_slice(&capture_buf);
                    }
                }
                last_status = code;
            } else {
                let argv = cmd.argv.clone();
                let mut stdout_writer = match resolved.stdout.into_writer("stdout") {
                    Ok(w) => w,
                    Err(msg) => {
                        eprintln!("{msg}");
                        wait_children(&mut children);
                        return PipelineOutcome::Status(1);
                    }
                };
                let mut stderr_writer = match resolved.stderr.into_writer("stderr") {
                    Ok(w) => w,
                    Err(msg) => {
                        eprintln!("{msg}");
                        wait_children(&mut children);
                        return PipelineOutcome::Status(1);
                    }
                };
                // Not the last stage: the downstream stage hasn't been
                // spawned yet, so running synchronously could deadlock once
                // the pipe buffer fills. Run on a thread instead, the same
                // way a concurrent external process would behave.
                let handle = std::thread::spawn(move || {
                    let _ = builtins::run_child_safe(&argv, stdout_writer.as_mut(), stderr_writer.as_mut());
                    let _ = stdout_writer.flush();
                    let _ = stderr_writer.flush();
                });
                builtin_threads.push(handle);
            }
        } else {
            let mut process = ProcessCommand::new(&cmd.argv[0]);
            process.args(&cmd.argv[1..]);

            #[cfg(unix)]
            set_child_pre_exec(&mut process, pipeline_pgid);

            let (stdin_stdio, here_string) = match resolved.stdin.into_stdio() {
                Ok(r) => r,
                Err(msg) => {
                    eprintln!("{msg}");
                    wait_children(&mut children);
                    return PipelineOutcome::Status(1);
                }
            };
            let stdout_stdio = match resolved.stdout.into_stdio_plain() {
                Ok(s) => s,
                Err(msg) => {
                    eprintln!("{msg}");
                    wait_children(&mut children);
                    return PipelineOutcome::Status(1);
                }
            };
            let stderr_stdio = match resolved.stderr.into_stdio_plain() {
                Ok(s) => s,
                Err(msg) => {
                    eprintln!("{msg}");
                    wait_children(&mut children);
                    return PipelineOutcome::Status(1);
                }
            };

            process.stdin(stdin_stdio).stdout(stdout_stdio).stderr(stderr_stdio);

            let mut child = match process.spawn() {
                Ok(c) => c,
                Err(e) => {
                    let code = command_error(&cmd.argv[0], &e);
                    wait_children(&mut children);
                    return PipelineOutcome::Status(code);
                }
            };

            #[cfg(unix)]
            if pipeline_pgid.is_none() {
                let child_pid = child.id() as libc::pid_t;
                unsafe { libc::setpgid(child_pid, child_pid) };
                pipeline_pgid = Some(child.id());
            }

            if let Some(text) = here_string {
                if let Some(mut stdin) = child.stdin.take() {
                    let _ = writeln!(stdin, "{text}");
                }
            }

            if capturing_this_stage {
                capture_reader = next_pipe_reader.as_ref().and_then(|r| r.try_clone().ok());
            }

            children.push(child);
            last_external_index = Some(children.len() - 1);
        }

        prev_pipe = next_pipe_reader;
    }

    if let (Some(mut reader), Some(buf)) = (capture_reader, capture.as_deref_mut()) {
        let _ = reader.read_to_end(buf);
    }

    if background {
        drop(builtin_threads);
        if let Some(last_idx) = last_external_index {
            let last_child = children.swap_remove(last_idx);
            drop(children);
            let pgid = pipeline_pgid.unwrap_or_else(|| last_child.id());
            let pos = shell.jobs.add(last_child, pgid, raw_text.to_string(), JobStatus::Running, true);
            println!("[{pos}] {pgid}");
        }
        return PipelineOutcome::Status(0);
    }

    for handle in builtin_threads {
        let _ = handle.join();
    }

    wait_multi_stage(children, pipeline_pgid, last_external_index, last_is_external, shell, raw_text, last_status)
}

#[cfg(unix)]
fn wait_multi_stage(
    mut children: Vec<std::process::Child>,
    pipeline_pgid: Option<u32>,
    last_external_index: Option<usize>,
    last_is_external: bool,
    shell: &mut Shell,
    raw_text: &str,
    last_status: i32,
) -> PipelineOutcome {
    if children.is_empty() {
        return PipelineOutcome::Status(last_status);
    }

    let fg_pgid = pipeline_pgid.unwrap_or_else(|| children[0].id());
    let terminal_guard = match job_control::ForegroundTerminalGuard::new(fg_pgid as libc::pid_t) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("mash: failed to move terminal to pipeline job group {fg_pgid}: {e}");
            None
        }
    };

    let child_pids: Vec<u32> = children.iter().map(|c| c.id()).collect();
    let last_external_pid = last_external_index.and_then(|idx| children.get(idx).map(|c| c.id()));

    let wait_result = match wait_for_pipeline_group(&child_pids, fg_pgid as libc::pid_t, last_external_pid) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("mash: failed waiting for pipeline jobs: {e}");
            drop(terminal_guard);
            return PipelineOutcome::Status(1);
        }
    };
    drop(terminal_guard);

    match wait_result {
        PipelineWaitOutcome::Stopped => {
            let stopped_index = last_external_index.unwrap_or(0);
            let stopped_child = if stopped_index < children.len() {
                children.swap_remove(stopped_index)
            } else {
                children.swap_remove(0)
            };
            let pos = shell.jobs.add(stopped_child, fg_pgid, raw_text.to_string(), JobStatus::Stopped, false);
            println!("[{pos}]  Stopped  {raw_text}");
            PipelineOutcome::Status(0)
        }
        PipelineWaitOutcome::Exited(code) => {
            if last_is_external {
                PipelineOutcome::Status(code)
            } else {
                PipelineOutcome::Status(last_status)
            }
        }
    }
}

#[cfg(not(unix))]
fn wait_multi_stage(
    children: Vec<std::process::Child>,
    _pipeline_pgid: Option<u32>,
    last_external_index: Option<usize>,
    last_is_external: bool,
    _shell: &mut Shell,
    _raw_text: &str,
    mut last_status: i32,
) -> PipelineOutcome {
    for (idx, mut child) in children.into_iter().enumerate() {
        match child.wait() {
            Ok(s) => {
                if last_is_external && Some(idx) == last_external_index {
                    last_status = status::exit_code(s);
                }
            }
            Err(_) => return PipelineOutcome::Status(1),
        }
    }
    PipelineOutcome::Status(last_status)
}

fn run_foreground(
    mut child: std::process::Child,
    cmd_name: &str,
    #[allow(unused_variables)] pgid: u32,
    #[allow(unused_variables)] shell: &mut Shell,
    #[allow(unused_variables)] raw_text: &str,
) -> i32 {
    #[cfg(unix)]
    {
        let pid = child.id() as libc::pid_t;
        let terminal_guard = match job_control::ForegroundTerminalGuard::new(pgid as libc::pid_t) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("mash: {cmd_name}: failed to move terminal to job: {e}");
                None
            }
        };

        let wait_outcome = match job_control::wait_for_pid(pid) {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("mash: {cmd_name}: waitpid failed: {e}");
                return 1;
            }
        };
        drop(terminal_guard);

        match wait_outcome {
            job_control::WaitOutcome::Stopped => {
                let pos = shell.jobs.add(child, pgid, raw_text.to_string(), JobStatus::Stopped, false);
                println!("[{pos}]  Stopped  {raw_text}");
                0
            }
            job_control::WaitOutcome::Exited(code) => code,
        }
    }

    #[cfg(not(unix))]
    {
        match child.wait() {
            Ok(s) => status::exit_code(s),
            Err(e) => {
                eprintln!("mash: {cmd_name}: {e}");
                1
            }
        }
    }
}

fn child_process_group(child: &std::process::Child, #[allow(unused_variables)] cmd_name: &str) -> u32 {
    #[cfg(unix)]
    {
        let pid = child.id() as libc::pid_t;
        if let Err(e) = job_control::set_process_group(pid, pid) {
            eprintln!("mash: {cmd_name}: failed to set process group: {e}");
        }
        return match job_control::process_group_id(pid) {
            Ok(pgid) => pgid as u32,
            Err(e) => {
                eprintln!("mash: {cmd_name}: failed to read process group: {e}");
                child.id()
            }
        };
    }
    #[cfg(not(unix))]
    {
        child.id()
    }
}

#[cfg(unix)]
fn set_child_pre_exec(process: &mut ProcessCommand, leader_pgid: Option<u32>) {
    use std::os::unix::process::CommandExt;
    unsafe {
        process.pre_exec(move || {
            crate::signals::reset_to_default();
            let target_pgid = leader_pgid.map(|p| p as libc::pid_t).unwrap_or(0);
            if libc::setpgid(0, target_pgid) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

fn command_error(program: &str, e: &std::io::Error) -> i32 {
    if e.kind() == std::io::ErrorKind::NotFound {
        eprintln!("mash: command not found: {program}");
        127
    } else {
        eprintln!("mash: {program}: {e}");
        126
    }
}

fn wait_children(children: &mut Vec<std::process::Child>) {
    for mut child in children.drain(..) {
        let _ = child.wait();
    }
}

#[cfg(unix)]
enum PipelineWaitOutcome {
    Exited(i32),
    Stopped,
}

#[cfg(unix)]
fn wait_for_pipeline_group(
    child_pids: &[u32],
    pgid: libc::pid_t,
    last_external_pid: Option<u32>,
) -> io::Result<PipelineWaitOutcome> {
    if child_pids.is_empty() {
        return Ok(PipelineWaitOutcome::Exited(0));
    }
    use std::collections::HashSet;
    let mut remaining: HashSet<libc::pid_t> = child_pids.iter().map(|p| *p as libc::pid_t).collect();
    let mut last_exit_code = None;

    while !remaining.is_empty() {
        let mut raw_status: libc::c_int = 0;
        let waited = unsafe { libc::waitpid(-pgid, &mut raw_status, libc::WUNTRACED) };
        if waited < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }
        if unsafe { libc::WIFSTOPPED(raw_status) } {
            return Ok(PipelineWaitOutcome::Stopped);
        }
        if !remaining.remove(&waited) {
            continue;
        }
        let code = crate::status::exit_code_from_wait_status(raw_status).unwrap_or(1);
        if Some(waited as u32) == last_external_pid {
            last_exit_code = Some(code);
        }
    }
    Ok(PipelineWaitOutcome::Exited(last_exit_code.unwrap_or(0)))
}

// ── Redirection resolution ──

enum InputHandle {
    Inherit,
    Pipe(PipeReader),
    File(File),
    HereString(String),
}

enum OutputHandle {
    Inherit,
    Null,
    File(File),
    Pipe(PipeWriter),
}

struct ResolvedIo {
    stdin: InputHandle,
    stdout: OutputHandle,
    stderr: OutputHandle,
}

struct RedirectionDefaults {
    stdin: InputHandle,
    stdout: OutputHandle,
    stderr: OutputHandle,
}

impl OutputHandle {
    fn try_clone(&self) -> Result<OutputHandle, String> {
        match self {
            OutputHandle::Inherit => Ok(OutputHandle::Inherit),
            OutputHandle::Null => Ok(OutputHandle::Null),
            OutputHandle::File(f) => {
                f.try_clone().map(OutputHandle::File).map_err(|e| format!("mash: failed to duplicate file: {e}"))
            }
            OutputHandle::Pipe(w) => {
                w.try_clone().map(OutputHandle::Pipe).map_err(|e| format!("mash: failed to duplicate pipe: {e}"))
            }
        }
    }

    fn into_stdio_plain(self) -> Result<Stdio, String> {
        Ok(match self {
            OutputHandle::Inherit => Stdio::inherit(),
            OutputHandle::Null => Stdio::null(),
            OutputHandle::File(f) => Stdio::from(f),
            OutputHandle::Pipe(w) => Stdio::from(w),
        })
    }

    fn into_writer(self, label: &str) -> Result<Box<dyn Write>, String> {
        match self {
            OutputHandle::Inherit => {
                if label == "stderr" {
                    Ok(Box::new(io::stderr()))
                } else {
                    Ok(Box::new(io::stdout()))
                }
            }
            OutputHandle::Null => Ok(Box::new(io::sink())),
            OutputHandle::File(f) => Ok(Box::new(f)),
            OutputHandle::Pipe(w) => Ok(Box::new(w)),
        }
    }
}

impl InputHandle {
    fn into_stdio(self) -> Result<(Stdio, Option<String>), String> {
        Ok(match self {
            InputHandle::Inherit => (Stdio::inherit(), None),
            InputHandle::Pipe(r) => (Stdio::from(r), None),
            InputHandle::File(f) => (Stdio::from(f), None),
            InputHandle::HereString(text) => (Stdio::piped(), Some(text)),
        })
    }

    fn into_reader(self) -> Result<Box<dyn Read>, String> {
        match self {
            InputHandle::Inherit => Ok(Box::new(io::stdin())),
            InputHandle::Pipe(r) => Ok(Box::new(r)),
            InputHandle::File(f) => Ok(Box::new(f)),
            InputHandle::HereString(text) => Ok(Box::new(Cursor::new(format!("{text}\n")))),
        }
    }
}

fn resolve_redirections(cmd: &Command, defaults: RedirectionDefaults) -> Result<ResolvedIo, String> {
    let mut stdin = defaults.stdin;
    let mut stdout = defaults.stdout;
    let mut stderr = defaults.stderr;

    for redir in &cmd.redirections {
        match (&redir.target, redir.fd) {
            (ResolvedTarget::Fd(target), fd) if *target == fd => {}
            (ResolvedTarget::File(path), 1) => stdout = open_output_file(path, false)?,
            (ResolvedTarget::FileAppend(path), 1) => stdout = open_output_file(path, true)?,
            (ResolvedTarget::FileRead(path), 0) => stdin = open_input_file(path)?,
            (ResolvedTarget::File(path), 2) => stderr = open_output_file(path, false)?,
            (ResolvedTarget::FileAppend(path), 2) => stderr = open_output_file(path, true)?,
            (ResolvedTarget::Fd(1), 2) => stderr = stdout.try_clone()?,
            (ResolvedTarget::Fd(2), 1) => stdout = stderr.try_clone()?,
            (ResolvedTarget::HereString(text), 0) => stdin = InputHandle::HereString(text.clone()),
            _ => return Err(format!("mash: unsupported redirection: fd {} -> {:?}", redir.fd, redir.target)),
        }
    }

    Ok(ResolvedIo { stdin, stdout, stderr })
}

fn open_output_file(path: &str, append: bool) -> Result<OutputHandle, String> {
    if is_null_device(path) {
        return Ok(OutputHandle::Null);
    }
    let file = if append {
        OpenOptions::new().create(true).append(true).open(path)
    } else {
        OpenOptions::new().create(true).write(true).truncate(true).open(path)
    };
    file.map(OutputHandle::File).map_err(|e| format!("mash: {path}: {e}"))
}

fn open_input_file(path: &str) -> Result<InputHandle, String> {
    let file = File::open(path).map_err(|e| format!("mash: {path}: {e}"))?;
    Ok(InputHandle::File(file))
}
