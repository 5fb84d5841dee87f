use std::process::Child;

use crate::status;

/// The lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Stopped,
    Done(i32),
}

/// A single tracked background or stopped job.
pub struct Job {
    /// The `%N` jobspec number. Assigned once at `add` time and never reused.
    pub pos: usize,
    /// 0 = current job (`+`), 1 = previous job (`-`), higher = older.
    /// Renormalized on every removal so the invariant keeps holding.
    pub relevance: i32,
    pub pid: u32,
    pub pgid: u32,
    pub command: String,
    pub status: JobStatus,
    pub child: Child,
}

/// The shell's job table.
///
/// Relevance bookkeeping follows the original job-control design: adding a
/// job that was stopped from the foreground (e.g. Ctrl-Z) bumps every
/// existing job's relevance up by one, since the newly stopped job becomes
/// the new "current" job and displaces everything else. Adding an explicit
/// background job (`cmd &`) only bumps the relevance of other *running*
/// jobs, so it doesn't steal the `+`/`-` markers away from jobs the user
/// actually stopped. Removing a job decrements every job whose relevance
/// was greater, keeping the 0/1/2/... sequence dense with no gaps.
#[derive(Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_pos: usize,
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            next_pos: 1,
        }
    }

    /// Register a new job. `background` distinguishes an explicit `cmd &`
    /// from a job that just got stopped out of the foreground.
    pub fn add(
        &mut self,
        child: Child,
        pgid: u32,
        command: String,
        status: JobStatus,
        background: bool,
    ) -> usize {
        for job in &mut self.jobs {
            if background {
                if job.status == JobStatus::Running {
                    job.relevance += 1;
                }
            } else {
                job.relevance += 1;
            }
        }

        let pos = self.next_pos;
        self.next_pos += 1;
        let pid = child.id();
        self.jobs.push(Job {
            pos,
            relevance: 0,
            pid,
            pgid,
            command,
            status,
            child,
        });
        pos
    }

    pub fn get_mut(&mut self, pos: usize) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.pos == pos)
    }

    pub fn get(&self, pos: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.pos == pos)
    }

    pub fn remove(&mut self, pos: usize) -> Option<Job> {
        let idx = self.jobs.iter().position(|j| j.pos == pos)?;
        let removed = self.jobs.remove(idx);
        self.renormalize_after_removal(removed.relevance);
        Some(removed)
    }

    fn renormalize_after_removal(&mut self, removed_relevance: i32) {
        for job in &mut self.jobs {
            if job.relevance > removed_relevance {
                job.relevance -= 1;
            }
        }
        if self.jobs.is_empty() {
            return;
        }
        if self.jobs.iter().all(|j| j.relevance != 0) {
            if let Some(min) = self.jobs.iter().map(|j| j.relevance).min() {
                for job in &mut self.jobs {
                    job.relevance -= min;
                }
            }
        }
    }

    /// Non-blocking poll of all running/stopped jobs. Prints `[N]+  Done  cmd`
    /// for any that have finished and removes them from the table.
    pub fn reap(&mut self) {
        let mut done_positions = Vec::new();

        for job in self.jobs.iter_mut() {
            if job.status != JobStatus::Running {
                continue;
            }
            match job.child.try_wait() {
                Ok(Some(exit_status)) => {
                    let code = status::exit_code(exit_status);
                    job.status = JobStatus::Done(code);
                    println!(
                        "[{}]{}  Done  {}",
                        job.pos,
                        marker(job.relevance),
                        job.command
                    );
                    done_positions.push(job.pos);
                }
                Ok(None) => {}
                Err(e) => {
                    eprintln!("mash: error checking job {}: {}", job.pos, e);
                }
            }
        }

        for pos in done_positions {
            self.remove(pos);
        }
    }

    /// All jobs sorted by position (ascending), for the `jobs` builtin.
    pub fn jobs_sorted(&self) -> Vec<&Job> {
        let mut list: Vec<&Job> = self.jobs.iter().collect();
        list.sort_by_key(|j| j.pos);
        list
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Resolve a jobspec (`%+`, `%%`, `%`, `%-`, `%N`) to a job position.
    /// A bare integer with no `%` prefix is a PID, not a jobspec, and
    /// returns `None` here — callers should fall back to treating it as a
    /// literal pid.
    pub fn resolve_jobspec(&self, spec: &str) -> Option<usize> {
        let rest = spec.strip_prefix('%')?;
        match rest {
            "+" | "%" | "" => self.jobs.iter().find(|j| j.relevance == 0).map(|j| j.pos),
            "-" => self.jobs.iter().find(|j| j.relevance == 1).map(|j| j.pos),
            n => {
                let pos = n.parse::<usize>().ok()?;
                self.jobs.iter().any(|j| j.pos == pos).then_some(pos)
            }
        }
    }

    /// `%`-jobspec or bare pid → pid, for `kill`.
    pub fn resolve_pid(&self, spec: &str) -> Option<u32> {
        if let Some(pos) = self.resolve_jobspec(spec) {
            return self.get(pos).map(|j| j.pid);
        }
        spec.parse::<u32>().ok()
    }
}

fn marker(relevance: i32) -> &'static str {
    match relevance {
        0 => "+",
        1 => "-",
        _ => " ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    fn spawn_sleeper() -> Child {
        Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn sleep")
    }

    #[test]
    fn first_job_is_current() {
        let mut table = JobTable::new();
        let child = spawn_sleeper();
        let pid = child.id();
        let pos = table.add(child, pid, "sleep 30".into(), JobStatus::Running, true);
        assert_eq!(table.get(pos).unwrap().relevance, 0);
        table.remove(pos).unwrap().child.kill().ok();
    }

    #[test]
    fn foreground_stop_bumps_all_relevances() {
        let mut table = JobTable::new();
        let c1 = spawn_sleeper();
        let p1 = table.add(c1, 0, "a".into(), JobStatus::Stopped, false);
        let c2 = spawn_sleeper();
        let p2 = table.add(c2, 0, "b".into(), JobStatus::Stopped, false);

        assert_eq!(table.get(p1).unwrap().relevance, 1);
        assert_eq!(table.get(p2).unwrap().relevance, 0);

        table.remove(p1).unwrap().child.kill().ok();
        table.remove(p2).unwrap().child.kill().ok();
    }

    #[test]
    fn background_add_does_not_bump_stopped_jobs() {
        let mut table = JobTable::new();
        let c1 = spawn_sleeper();
        let p1 = table.add(c1, 0, "stopped-one".into(), JobStatus::Stopped, false);
        let c2 = spawn_sleeper();
        let p2 = table.add(c2, 0, "bg-one".into(), JobStatus::Running, true);

        // The stopped job keeps relevance 0 (it's still "current"); the new
        // background job does not steal the marker.
        assert_eq!(table.get(p1).unwrap().relevance, 0);
        assert_eq!(table.get(p2).unwrap().relevance, 0);

        table.remove(p1).unwrap().child.kill().ok();
        table.remove(p2).unwrap().child.kill().ok();
    }

    #[test]
    fn jobspec_grammar() {
        let mut table = JobTable::new();
        let c1 = spawn_sleeper();
        let p1 = table.add(c1, 0, "a".into(), JobStatus::Stopped, false);
        let c2 = spawn_sleeper();
        let p2 = table.add(c2, 0, "b".into(), JobStatus::Stopped, false);

        assert_eq!(table.resolve_jobspec("%+"), Some(p2));
        assert_eq!(table.resolve_jobspec("%%"), Some(p2));
        assert_eq!(table.resolve_jobspec("%"), Some(p2));
        assert_eq!(table.resolve_jobspec("%-"), Some(p1));
        assert_eq!(table.resolve_jobspec(&format!("%{p1}")), Some(p1));
        // Bare integer (no `%`) is not a jobspec.
        assert_eq!(table.resolve_jobspec("42"), None);

        table.remove(p1).unwrap().child.kill().ok();
        table.remove(p2).unwrap().child.kill().ok();
    }

    #[test]
    fn removal_renormalizes_negative_relevance() {
        let mut table = JobTable::new();
        let c1 = spawn_sleeper();
        let p1 = table.add(c1, 0, "a".into(), JobStatus::Stopped, false);
        let c2 = spawn_sleeper();
        let p2 = table.add(c2, 0, "b".into(), JobStatus::Stopped, false);
        let c3 = spawn_sleeper();
        let p3 = table.add(c3, 0, "c".into(), JobStatus::Stopped, false);

        // Relevances are now: p1=2, p2=1, p3=0. Remove the current job (p3);
        // p2 should become the new current (relevance 0), not go negative.
        table.remove(p3).unwrap().child.kill().ok();
        assert_eq!(table.get(p2).unwrap().relevance, 0);
        assert_eq!(table.get(p1).unwrap().relevance, 1);

        table.remove(p1).unwrap().child.kill().ok();
        table.remove(p2).unwrap().child.kill().ok();
    }
}
