use std::ffi::CString;
use std::fmt;
use std::path::PathBuf;

use crate::error::Result;

/// One external command with its arguments, `argv[0]` first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    argv: Vec<String>,
}

impl Stage {
    pub fn new(argv: Vec<String>) -> Self {
        debug_assert!(!argv.is_empty());
        Self { argv }
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Converts the tokens into the C strings handed to `execvp`.
    pub fn to_cstrings(&self) -> Result<Vec<CString>> {
        self.argv
            .iter()
            .map(|a| CString::new(a.as_str()).map_err(Into::into))
            .collect()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}

/// A parsed command line, stages in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    pub stdin: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
    pub background: bool,
}

impl Pipeline {
    pub fn first(&self) -> &Stage {
        &self.stages[0]
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Multi-line dump printed by `--print-parse`.
    pub fn report(&self) -> String {
        let path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<none>".to_string())
        };

        let mut out = String::new();
        out.push_str("------------------------------\n");
        out.push_str("Parse OK\n");
        out.push_str(&format!("stdin:      {}\n", path(&self.stdin)));
        out.push_str(&format!("stdout:     {}\n", path(&self.stdout)));
        out.push_str(&format!("background: {}\n", self.background));
        out.push_str("Pgms:\n");
        for stage in &self.stages {
            out.push_str(&format!("            * [ {} ]\n", stage));
        }
        out.push_str("------------------------------");
        out
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", stage)?;
            if i == 0 {
                if let Some(ref input) = self.stdin {
                    write!(f, " < {}", input.display())?;
                }
            }
        }
        if let Some(ref output) = self.stdout {
            write!(f, " > {}", output.display())?;
        }
        if self.background {
            write!(f, " &")?;
        }
        Ok(())
    }
}
