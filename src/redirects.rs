use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::errno::Errno;

use crate::error::{Result, ShellError};

/// rw-rw-rw-, narrowed by the umask
const OUTPUT_MODE: u32 = 0o666;

/// File redirections for one stage process. Only the first stage of a
/// pipeline ever gets `input` and only the last one gets `output`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Redirections<'a> {
    pub input: Option<&'a Path>,
    pub output: Option<&'a Path>,
}

impl<'a> Redirections<'a> {
    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none()
    }

    /// Open the files and move them onto stdin/stdout of the calling process.
    /// Only ever called in a forked stage, after its pipe ends are wired.
    pub fn apply(&self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        if let Some(path) = self.input {
            let file = open_input(path).map_err(|source| redirect_error(path, source))?;
            bind(file.into(), libc::STDIN_FILENO).map_err(ShellError::sys("dup2"))?;
        }
        if let Some(path) = self.output {
            let file = open_output(path).map_err(|source| redirect_error(path, source))?;
            bind(file.into(), libc::STDOUT_FILENO).map_err(ShellError::sys("dup2"))?;
        }
        Ok(())
    }
}

fn redirect_error(path: &Path, source: io::Error) -> ShellError {
    ShellError::Redirect {
        path: path.to_path_buf(),
        source,
    }
}

pub fn open_input(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).open(path)
}

pub fn open_output(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(OUTPUT_MODE)
        .open(path)
}

/// Duplicate `fd` onto `target`, then close `fd`.
pub fn bind(fd: OwnedFd, target: RawFd) -> nix::Result<()> {
    if fd.as_raw_fd() == target {
        // already in place; dropping it would close the target
        let _ = fd.into_raw_fd();
        return Ok(());
    }
    Errno::result(unsafe { libc::dup2(fd.as_raw_fd(), target) })?;
    drop(fd);
    Ok(())
}
