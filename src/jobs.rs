use std::collections::BTreeMap;
use std::fmt;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::command::Pipeline;
use crate::error::{Result, ShellError};
use crate::pipes::{exit_code, launch, syscall, Plan};
use crate::signal_handler::SignalChannel;

/// Outcome of handing a pipeline to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// Foreground: the leader was waited on and collected.
    Waited(i32),
    /// Background: the leader keeps running and is reaped later.
    Detached { id: u32, pid: Pid },
}

#[derive(Debug)]
pub struct Job {
    pub id: u32,
    pub pid: Pid,
    pub command: String,
}

/// A detached pipeline that has been reaped.
#[derive(Debug)]
pub struct Finished {
    pub job: Job,
    pub status: Option<i32>,
}

impl fmt::Display for Finished {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(0) => write!(f, "[{}] Done {}", self.job.id, self.job.command),
            Some(code) => write!(f, "[{}] Exit {} {}", self.job.id, code, self.job.command),
            None => write!(f, "[{}] Lost {}", self.job.id, self.job.command),
        }
    }
}

pub struct JobController {
    jobs: BTreeMap<u32, Job>,
    next_id: u32,
    signals: SignalChannel,
    reap_pending: bool,
}

impl JobController {
    pub fn new(signals: SignalChannel) -> Self {
        JobController {
            jobs: BTreeMap::new(),
            next_id: 1,
            signals,
            reap_pending: false,
        }
    }

    /// Launch the pipeline and either wait for it or detach it.
    pub fn run(&mut self, pipeline: &Pipeline) -> Result<Launch> {
        let plan = Plan::new(pipeline)?;

        // an interrupt typed before this line must not count against it
        self.drain_signals();

        let leader = launch(&plan, pipeline.background)?;
        debug!(pid = %leader, stages = plan.len(), background = pipeline.background, "pipeline launched");

        if pipeline.background {
            let id = self.detach(leader, pipeline.to_string());
            return Ok(Launch::Detached { id, pid: leader });
        }

        let status = self.wait_foreground(leader)?;
        Ok(Launch::Waited(status))
    }

    fn wait_foreground(&mut self, leader: Pid) -> Result<i32> {
        let ws = syscall(|| waitpid(leader, None)).map_err(ShellError::sys("waitpid"))?;
        let status = exit_code(ws).unwrap_or(1);

        if self.drain_signals() {
            // the terminal echoed ^C without a newline
            println!();
        }
        debug!(pid = %leader, status, "pipeline finished");
        Ok(status)
    }

    /// Returns whether an interrupt was among the drained signals.
    fn drain_signals(&mut self) -> bool {
        let notices = self.signals.poll();
        self.reap_pending |= notices.child_exited;
        notices.interrupted
    }

    pub fn detach(&mut self, pid: Pid, command: String) -> u32 {
        if self.jobs.is_empty() {
            self.next_id = 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.jobs.insert(id, Job { id, pid, command });
        id
    }

    #[cfg(test)]
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Passive reaping, driven by SIGCHLD: collect detached pipelines that
    /// have terminated since the last call without blocking.
    pub fn update_jobs(&mut self) -> Vec<Finished> {
        self.drain_signals();
        if !self.reap_pending {
            return Vec::new();
        }
        self.reap_pending = false;
        self.reap_detached()
    }

    pub fn reap_detached(&mut self) -> Vec<Finished> {
        let mut done = Vec::new();

        for (&id, job) in self.jobs.iter() {
            match syscall(|| waitpid(job.pid, Some(WaitPidFlag::WNOHANG))) {
                Ok(WaitStatus::StillAlive) => {}
                Ok(ws) => {
                    if let Some(status) = exit_code(ws) {
                        done.push((id, Some(status)));
                    }
                }
                Err(Errno::ECHILD) => done.push((id, None)),
                Err(e) => warn!(id, pid = %job.pid, error = %e, "failed to poll background job"),
            }
        }

        done.into_iter()
            .filter_map(|(id, status)| self.jobs.remove(&id).map(|job| Finished { job, status }))
            .inspect(|f| info!(id = f.job.id, pid = %f.job.pid, status = ?f.status, "background job reaped"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::thread::sleep;
    use std::time::{Duration, Instant};

    fn controller() -> JobController {
        JobController::new(SignalChannel::install().unwrap())
    }

    fn spawn(program: &str, args: &[&str]) -> Pid {
        let child = Command::new(program).args(args).spawn().unwrap();
        Pid::from_raw(child.id() as i32)
    }

    fn reap_until_empty(jobs: &mut JobController) -> Vec<Finished> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut finished = Vec::new();
        while jobs.jobs().next().is_some() && Instant::now() < deadline {
            finished.extend(jobs.reap_detached());
            sleep(Duration::from_millis(20));
        }
        finished
    }

    #[test]
    fn detached_jobs_are_reaped_with_status() {
        let mut jobs = controller();
        let ok = jobs.detach(spawn("true", &[]), "true &".to_string());
        let failed = jobs.detach(spawn("sh", &["-c", "exit 3"]), "sh -c 'exit 3' &".to_string());
        assert_eq!((ok, failed), (1, 2));

        let mut finished = reap_until_empty(&mut jobs);
        finished.sort_by_key(|f| f.job.id);

        assert_eq!(finished.len(), 2);
        assert_eq!(finished[0].status, Some(0));
        assert_eq!(finished[0].to_string(), "[1] Done true &");
        assert_eq!(finished[1].status, Some(3));
        assert!(finished[1].to_string().starts_with("[2] Exit 3"));
    }

    #[test]
    fn running_jobs_are_left_alone() {
        let mut jobs = controller();
        let pid = spawn("sleep", &["5"]);
        jobs.detach(pid, "sleep 5 &".to_string());

        assert!(jobs.reap_detached().is_empty());
        assert_eq!(jobs.jobs().count(), 1);

        nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL).unwrap();
        let finished = reap_until_empty(&mut jobs);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].status, Some(128 + 9));
    }

    #[test]
    fn unknown_pids_are_dropped() {
        let mut jobs = controller();
        // not our child
        jobs.detach(Pid::from_raw(1), "init".to_string());
        let finished = jobs.reap_detached();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].status, None);
        assert_eq!(jobs.jobs().count(), 0);
    }

    #[test]
    fn ids_restart_once_the_table_is_empty() {
        let mut jobs = controller();
        assert_eq!(jobs.detach(Pid::from_raw(1), "a".to_string()), 1);
        jobs.reap_detached();
        assert_eq!(jobs.detach(Pid::from_raw(1), "b".to_string()), 1);
    }
}
