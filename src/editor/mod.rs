//! Line input: an interactive editor for terminals and a plain reader for
//! everything else (pipes, files, test harnesses).

mod buffer;
mod completion;
mod core;
mod raw_mode;

use std::io::{self, Read, Write};

use nix::errno::Errno;

use crossterm::tty::IsTty;

use crate::history::History;

pub use self::core::LineEditor;

pub trait LineSource {
    /// Next line without its terminator, `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Record an accepted, non-blank line for recall.
    fn add_history(&mut self, line: &str);
}

/// Reads lines one byte at a time and never prints a prompt. Nothing past
/// the newline is consumed, so a stage that inherits stdin sees the rest.
pub struct PlainReader<R> {
    input: R,
    history: History,
}

impl<R: Read> PlainReader<R> {
    pub fn new(input: R, history: History) -> Self {
        Self { input, history }
    }
}

impl<R: Read> LineSource for PlainReader<R> {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) if line.is_empty() => return Ok(None),
                Ok(0) => break,
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) => line.push(byte[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    fn add_history(&mut self, line: &str) {
        self.history.add(line);
    }
}

/// Descriptor 0 without the read-ahead buffer `io::Stdin` keeps.
pub struct RawStdin;

impl Read for RawStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = Errno::result(unsafe {
            libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len())
        })?;
        Ok(n as usize)
    }
}

/// Pick the editor when stdin is a terminal, the plain reader otherwise.
pub fn open(history: History) -> Box<dyn LineSource> {
    if io::stdin().is_tty() {
        Box::new(LineEditor::new(history))
    } else {
        let _ = io::stdout().flush();
        Box::new(PlainReader::new(RawStdin, history))
    }
}
