use std::env;
use std::io;
use std::process;

use crossterm::tty::IsTty;
use tracing_subscriber::EnvFilter;

mod builtins;
mod command;
mod config;
mod editor;
mod error;
mod history;
mod jobs;
mod parser;
mod pipes;
mod prompt;
mod redirects;
mod session;
mod shell;
mod signal_handler;

use config::{Action, Config, LOG_ENV};

fn print_version() {
    println!("lsh {}", env!("CARGO_PKG_VERSION"));
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let action = Config::from_args(env::args().skip(1), |key| env::var(key).ok());
    let config = match action {
        Ok(Action::Help) => {
            println!("{}", config::usage());
            process::exit(0);
        }
        Ok(Action::Version) => {
            print_version();
            process::exit(0);
        }
        Ok(Action::Run(config)) => config,
        Err(e) => {
            eprintln!("lsh: {}", e);
            eprintln!("{}", config::usage());
            process::exit(2);
        }
    };

    init_logging();
    if !(io::stdout().is_tty() && io::stderr().is_tty()) {
        colored::control::set_override(false);
    }

    let mut shell = match shell::Shell::new(&config) {
        Ok(shell) => shell,
        Err(e) => {
            error::report(&e);
            process::exit(1);
        }
    };

    let status = match config.command {
        Some(ref line) => shell.run_command(line),
        None => shell.run(),
    };
    process::exit(status);
}
