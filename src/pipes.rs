use std::ffi::CString;
use std::os::fd::OwnedFd;
use std::path::Path;

use nix::errno::Errno;
use nix::sys::signal::{kill, signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{execvp, fork, pipe, setpgid, ForkResult, Pid};

use crate::command::Pipeline;
use crate::error::{report, Result, ShellError};
use crate::redirects::{bind, Redirections};

/// Status reported when the pipeline could not be built at all.
const BUILD_FAILED: i32 = 1;
const NOT_FOUND: i32 = 127;
const NOT_EXECUTABLE: i32 = 126;

/// Everything a forked process needs, converted before the first fork so the
/// children only do descriptor work and exec.
#[derive(Debug)]
pub struct Plan<'a> {
    stages: Vec<Vec<CString>>,
    input: Option<&'a Path>,
    output: Option<&'a Path>,
}

impl<'a> Plan<'a> {
    pub fn new(pipeline: &'a Pipeline) -> Result<Self> {
        let stages = pipeline
            .stages
            .iter()
            .map(|stage| stage.to_cstrings())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            stages,
            input: pipeline.stdin.as_deref(),
            output: pipeline.stdout.as_deref(),
        })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// One pipe per boundary between adjacent stages.
    pub fn pipe_count(&self) -> usize {
        self.len() - 1
    }

    /// File redirections only ever touch the two ends of the pipeline.
    pub fn redirections(&self, index: usize) -> Redirections<'a> {
        Redirections {
            input: if index == 0 { self.input } else { None },
            output: if index + 1 == self.len() { self.output } else { None },
        }
    }
}

/// Which pipes stage `index` of `len` reads from and writes to.
/// Stage i reads pipe i-1 and writes pipe i.
pub fn endpoints(index: usize, len: usize) -> (Option<usize>, Option<usize>) {
    let read = index.checked_sub(1);
    let write = if index + 1 < len { Some(index) } else { None };
    (read, write)
}

/// Fork the pipeline leader. It builds the stage processes, waits for all of
/// them and exits with the status of the last stage.
pub fn launch(plan: &Plan, background: bool) -> Result<Pid> {
    match unsafe { fork() }.map_err(ShellError::sys("fork"))? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            unsafe {
                // the leader must outlive an interrupt to reap its stages
                let _ = signal(Signal::SIGINT, SigHandler::SigIgn);
                let _ = signal(Signal::SIGQUIT, SigHandler::SigIgn);
                let _ = signal(Signal::SIGCHLD, SigHandler::SigDfl);
            }
            if background {
                // own process group: terminal interrupts go elsewhere
                let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
            }
            let status = run_leader(plan);
            exit_now(status)
        }
    }
}

fn run_leader(plan: &Plan) -> i32 {
    let mut pipes = match open_pipes(plan.pipe_count()) {
        Ok(pipes) => pipes,
        Err(e) => {
            report(&e);
            return BUILD_FAILED;
        }
    };

    let mut children = Vec::with_capacity(plan.len());
    for index in 0..plan.len() {
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => children.push(child),
            Ok(ForkResult::Child) => exec_stage(plan, index, std::mem::take(&mut pipes)),
            Err(e) => {
                report(&ShellError::Sys {
                    op: "fork",
                    source: e,
                });
                drop(pipes);
                abort(&children);
                return BUILD_FAILED;
            }
        }
    }

    // readers only see end-of-stream once the leader's copies are gone
    drop(pipes);
    wait_all(&children)
}

pub fn open_pipes(count: usize) -> Result<Vec<(OwnedFd, OwnedFd)>> {
    (0..count)
        .map(|_| pipe().map_err(ShellError::sys("pipe")))
        .collect()
}

/// Runs in the forked stage process and never returns.
fn exec_stage(plan: &Plan, index: usize, pipes: Vec<(OwnedFd, OwnedFd)>) -> ! {
    unsafe {
        let _ = signal(Signal::SIGINT, SigHandler::SigDfl);
        let _ = signal(Signal::SIGQUIT, SigHandler::SigDfl);
    }

    if let Err(e) = wire(index, plan.len(), pipes) {
        report(&e);
        exit_now(BUILD_FAILED);
    }
    if let Err(e) = plan.redirections(index).apply() {
        report(&e);
        exit_now(BUILD_FAILED);
    }

    let argv = &plan.stages[index];
    match execvp(&argv[0], argv) {
        Ok(never) => match never {},
        Err(e) => exit_now(exec_failed(&argv[0], e)),
    }
}

/// Move this stage's pipe ends onto stdin/stdout and close every pipe
/// descriptor, used or not.
fn wire(index: usize, len: usize, pipes: Vec<(OwnedFd, OwnedFd)>) -> Result<()> {
    let (read_from, write_to) = endpoints(index, len);
    for (i, (read, write)) in pipes.into_iter().enumerate() {
        if Some(i) == read_from {
            bind(read, libc::STDIN_FILENO).map_err(ShellError::sys("dup2"))?;
        }
        if Some(i) == write_to {
            bind(write, libc::STDOUT_FILENO).map_err(ShellError::sys("dup2"))?;
        }
    }
    Ok(())
}

fn exec_failed(program: &CString, errno: Errno) -> i32 {
    let name = program.to_string_lossy();
    if errno == Errno::ENOENT {
        report(&format!("{}: command not found", name));
        NOT_FOUND
    } else {
        report(&format!("{}: {}", name, errno.desc()));
        NOT_EXECUTABLE
    }
}

/// Stop stages that were already started, then collect them.
fn abort(children: &[Pid]) {
    for &child in children {
        let _ = kill(child, Signal::SIGTERM);
    }
    wait_all(children);
}

fn wait_all(children: &[Pid]) -> i32 {
    let mut status = 0;
    for (i, &child) in children.iter().enumerate() {
        if let Ok(ws) = syscall(|| waitpid(child, None)) {
            if i + 1 == children.len() {
                status = exit_code(ws).unwrap_or(status);
            }
        }
    }
    status
}

/// Shell-style status: the exit code, or 128 + signal number.
pub fn exit_code(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, sig, _) => Some(128 + sig as i32),
        _ => None,
    }
}

/// Retry a system call interrupted by a signal.
pub fn syscall<F, T>(f: F) -> nix::Result<T>
where
    F: Fn() -> nix::Result<T>,
{
    loop {
        match f() {
            Err(Errno::EINTR) => (),
            result => return result,
        }
    }
}

fn exit_now(code: i32) -> ! {
    // skip atexit handlers and buffered output inherited from the interpreter
    unsafe { libc::_exit(code) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use std::fs::File;
    use std::io::{Read, Write};

    #[test]
    fn every_boundary_has_one_reader_and_one_writer() {
        for len in 1..=6 {
            let mut readers = vec![0; len - 1];
            let mut writers = vec![0; len - 1];
            for index in 0..len {
                let (read, write) = endpoints(index, len);
                if let Some(p) = read {
                    readers[p] += 1;
                }
                if let Some(p) = write {
                    writers[p] += 1;
                }
            }
            assert!(readers.iter().all(|&n| n == 1), "len {}", len);
            assert!(writers.iter().all(|&n| n == 1), "len {}", len);
        }
    }

    #[test]
    fn end_stages_use_the_terminal() {
        assert_eq!(endpoints(0, 1), (None, None));
        assert_eq!(endpoints(0, 3), (None, Some(0)));
        assert_eq!(endpoints(1, 3), (Some(0), Some(1)));
        assert_eq!(endpoints(2, 3), (Some(1), None));
    }

    #[test]
    fn plan_has_one_pipe_less_than_stages() {
        let pipeline = parse("a | b | c | d").unwrap();
        let plan = Plan::new(&pipeline).unwrap();
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.pipe_count(), 3);

        let single = parse("a").unwrap();
        assert_eq!(Plan::new(&single).unwrap().pipe_count(), 0);
    }

    #[test]
    fn redirections_only_at_boundaries() {
        let pipeline = parse("a < in | b | c > out").unwrap();
        let plan = Plan::new(&pipeline).unwrap();

        let first = plan.redirections(0);
        assert_eq!(first.input, Some(Path::new("in")));
        assert_eq!(first.output, None);

        assert!(plan.redirections(1).is_empty());

        let last = plan.redirections(2);
        assert_eq!(last.input, None);
        assert_eq!(last.output, Some(Path::new("out")));
    }

    #[test]
    fn single_stage_gets_both_redirections() {
        let pipeline = parse("cat < in > out").unwrap();
        let plan = Plan::new(&pipeline).unwrap();
        let only = plan.redirections(0);
        assert_eq!(only.input, Some(Path::new("in")));
        assert_eq!(only.output, Some(Path::new("out")));
    }

    #[test]
    fn open_pipes_creates_working_channels() {
        let pipes = open_pipes(2).unwrap();
        assert_eq!(pipes.len(), 2);
        for (reader, writer) in pipes {
            let mut writer = File::from(writer);
            writer.write_all(b"x").unwrap();
            drop(writer);

            let mut out = String::new();
            File::from(reader).read_to_string(&mut out).unwrap();
            assert_eq!(out, "x");
        }
    }

    #[test]
    fn status_mapping() {
        let pid = Pid::from_raw(1);
        assert_eq!(exit_code(WaitStatus::Exited(pid, 3)), Some(3));
        assert_eq!(
            exit_code(WaitStatus::Signaled(pid, Signal::SIGINT, false)),
            Some(130)
        );
        assert_eq!(exit_code(WaitStatus::StillAlive), None);
    }
}
