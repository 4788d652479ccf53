use tracing::{debug, warn};

use crate::command::Pipeline;
use crate::error::Result;
use crate::session::Session;

/// Commands that act on the interpreter process itself and so can never be
/// handed to a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Builtin {
    Cd(Option<String>),
    Exit,
}

/// What the interpreter loop does after a builtin ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

impl Builtin {
    /// Inspect the first stage; anything that is not a builtin goes to the
    /// pipeline builder.
    pub fn intercept(pipeline: &Pipeline) -> Option<Self> {
        let first = pipeline.first();
        let builtin = match first.program() {
            "cd" => Builtin::Cd(first.args().first().cloned()),
            "exit" => Builtin::Exit,
            _ => return None,
        };

        if pipeline.len() > 1 || pipeline.stdin.is_some() || pipeline.stdout.is_some() {
            warn!(command = %pipeline, "builtin runs in the interpreter; pipes and redirections ignored");
        }
        Some(builtin)
    }

    pub fn run(self, session: &mut Session) -> Result<Flow> {
        debug!(builtin = ?self, "running builtin");
        match self {
            Builtin::Cd(path) => {
                session.change_dir(path.as_deref())?;
                Ok(Flow::Continue)
            }
            Builtin::Exit => Ok(Flow::Exit),
        }
    }
}
