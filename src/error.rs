use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// Reasons a raw line is rejected before anything is executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command line")]
    EmptyLine,
    #[error("empty command in pipeline")]
    EmptyStage,
    #[error("expected a file name after '{0}'")]
    MissingTarget(char),
    #[error("more than one '{0}' redirection")]
    DuplicateRedirect(char),
    #[error("'{0}' redirection is only allowed at the {1} of a pipeline")]
    MisplacedRedirect(char, &'static str),
    #[error("'&' must be the last token")]
    MisplacedBackground,
    #[error("unterminated quote")]
    UnterminatedQuote,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown option '{0}'")]
    UnknownFlag(String),
    #[error("option '{0}' requires an argument")]
    MissingValue(&'static str),
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("argument contains a NUL byte")]
    Nul(#[from] std::ffi::NulError),
    #[error("{op}: {source}")]
    Sys {
        op: &'static str,
        #[source]
        source: Errno,
    },
    #[error("{}: {source}", .path.display())]
    Redirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{name}: {message}")]
    Builtin { name: &'static str, message: String },
}

impl ShellError {
    pub fn sys(op: &'static str) -> impl FnOnce(Errno) -> ShellError {
        move |source| ShellError::Sys { op, source }
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;

/// Print a diagnostic on stderr, `lsh:` prefixed.
pub fn report(err: &dyn std::fmt::Display) {
    use colored::Colorize;
    eprintln!("{} {}", "lsh:".red().bold(), err);
}
