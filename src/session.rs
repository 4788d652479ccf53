use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Result, ShellError};

/// Interpreter state that outlives a single command line.
#[derive(Debug, Clone)]
pub struct Session {
    pub cwd: PathBuf,
    pub home: Option<PathBuf>,
    pub user: String,
    pub host: String,
    /// Status of the last foreground pipeline or builtin.
    pub last_status: i32,
}

impl Session {
    pub fn new() -> Self {
        Self {
            cwd: env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            home: env::var_os("HOME").map(PathBuf::from),
            user: whoami::username(),
            host: whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string()),
            last_status: 0,
        }
    }

    /// Change the process-wide working directory; `None` means `$HOME`.
    /// On failure the previous directory stays in effect.
    pub fn change_dir(&mut self, target: Option<&str>) -> Result<()> {
        let target = match target {
            Some(path) => PathBuf::from(path),
            None => self.home.clone().ok_or_else(|| ShellError::Builtin {
                name: "cd",
                message: "HOME not set".to_string(),
            })?,
        };

        env::set_current_dir(&target).map_err(|e| ShellError::Builtin {
            name: "cd",
            message: format!("{}: {}", target.display(), e),
        })?;

        self.cwd = env::current_dir().unwrap_or(target);
        env::set_var("PWD", &self.cwd);
        Ok(())
    }

    /// Working directory as shown in the prompt, `$HOME` collapsed to `~`.
    pub fn display_cwd(&self) -> String {
        abbreviate_home(&self.cwd, self.home.as_deref())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn abbreviate_home(cwd: &Path, home: Option<&Path>) -> String {
    if let Some(home) = home {
        if let Ok(rest) = cwd.strip_prefix(home) {
            if rest.as_os_str().is_empty() {
                return "~".to_string();
            }
            return format!("~/{}", rest.display());
        }
    }
    cwd.display().to_string()
}
