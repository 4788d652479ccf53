use std::path::PathBuf;

use crate::error::ConfigError;

pub const LOG_ENV: &str = "LSH_LOG";
pub const HISTORY_ENV: &str = "LSH_HISTORY";
const HISTORY_FILE: &str = ".lsh_history";

/// What `main` should do with the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Help,
    Version,
    Run(Config),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `-c`: run this one line and exit.
    pub command: Option<String>,
    /// `-p`: dump every parsed line before running it.
    pub print_parse: bool,
    pub history_path: Option<PathBuf>,
}

impl Config {
    /// `env` is a lookup so tests don't have to touch the real environment.
    pub fn from_args<I, E>(args: I, env: E) -> Result<Action, ConfigError>
    where
        I: IntoIterator<Item = String>,
        E: Fn(&str) -> Option<String>,
    {
        let mut command = None;
        let mut print_parse = false;
        let mut no_history = false;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(Action::Help),
                "-v" | "-V" | "--version" => return Ok(Action::Version),
                "-c" => command = Some(args.next().ok_or(ConfigError::MissingValue("-c"))?),
                "-p" | "--print-parse" => print_parse = true,
                "--no-history" => no_history = true,
                _ => return Err(ConfigError::UnknownFlag(arg)),
            }
        }

        let history_path = if no_history {
            None
        } else {
            env(HISTORY_ENV)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .or_else(|| env("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE)))
        };

        Ok(Action::Run(Config {
            command,
            print_parse,
            history_path,
        }))
    }
}

pub fn usage() -> String {
    [
        "lsh - pipeline shell",
        "",
        "Usage: lsh [OPTIONS]",
        "  -c <line>           Run one command line and exit",
        "  -p, --print-parse   Print the parsed form of every line",
        "      --no-history    Do not read or write the history file",
        "  -h, --help          Print this help",
        "  -v, --version       Print version",
        "",
        "Environment:",
        "  LSH_HISTORY   history file (default ~/.lsh_history)",
        "  LSH_LOG       log filter, e.g. debug or lsh=trace (default warn)",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str], env: &[(&str, &str)]) -> Result<Action, ConfigError> {
        let env: Vec<(String, String)> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_args(args.iter().map(|s| s.to_string()), |key| {
            env.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
    }

    fn run(args: &[&str], env: &[(&str, &str)]) -> Config {
        match parse(args, env).unwrap() {
            Action::Run(config) => config,
            other => panic!("expected a run config, got {:?}", other),
        }
    }

    #[test]
    fn defaults() {
        let config = run(&[], &[("HOME", "/home/ada")]);
        assert_eq!(config.command, None);
        assert!(!config.print_parse);
        assert_eq!(config.history_path, Some(PathBuf::from("/home/ada/.lsh_history")));
    }

    #[test]
    fn help_and_version_win() {
        assert_eq!(parse(&["-p", "--help"], &[]), Ok(Action::Help));
        assert_eq!(parse(&["-v"], &[]), Ok(Action::Version));
    }

    #[test]
    fn single_command() {
        let config = run(&["-p", "-c", "echo hi | wc"], &[]);
        assert_eq!(config.command.as_deref(), Some("echo hi | wc"));
        assert!(config.print_parse);
    }

    #[test]
    fn history_location() {
        let config = run(&[], &[("HOME", "/home/ada"), (HISTORY_ENV, "/tmp/h")]);
        assert_eq!(config.history_path, Some(PathBuf::from("/tmp/h")));

        let config = run(&["--no-history"], &[("HOME", "/home/ada")]);
        assert_eq!(config.history_path, None);

        assert_eq!(run(&[], &[]).history_path, None);
    }

    #[test]
    fn bad_arguments() {
        assert_eq!(parse(&["-c"], &[]), Err(ConfigError::MissingValue("-c")));
        assert_eq!(
            parse(&["--frobnicate"], &[]),
            Err(ConfigError::UnknownFlag("--frobnicate".to_string()))
        );
    }
}
