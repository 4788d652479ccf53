use std::io;

use nix::sys::signal::{signal, SigHandler, Signal};
use signal_hook::consts::{SIGCHLD, SIGINT};
use signal_hook::iterator::Signals;
use tracing::debug;

/// Signals seen since the last poll.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Notices {
    pub interrupted: bool,
    pub child_exited: bool,
}

/// Queues SIGINT and SIGCHLD instead of acting on them inside a handler.
/// The interpreter polls it at fixed points of its loop.
pub struct SignalChannel {
    signals: Signals,
}

impl SignalChannel {
    /// Catching SIGINT here keeps a terminal interrupt from killing the
    /// interpreter; exec resets caught signals to default in children.
    pub fn install() -> io::Result<Self> {
        let signals = Signals::new([SIGINT, SIGCHLD])?;

        unsafe {
            // ignored dispositions survive exec, stages restore the default
            let _ = signal(Signal::SIGQUIT, SigHandler::SigIgn);
        }

        Ok(Self { signals })
    }

    /// Non-blocking: drain whatever arrived since the previous call.
    pub fn poll(&mut self) -> Notices {
        let mut notices = Notices::default();
        for sig in self.signals.pending() {
            match sig {
                SIGINT => notices.interrupted = true,
                SIGCHLD => notices.child_exited = true,
                _ => {}
            }
        }
        if notices != Notices::default() {
            debug!(?notices, "signals received");
        }
        notices
    }
}
