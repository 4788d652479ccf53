use std::io::{self, Write};

use crossterm::tty::IsTty;
use tracing::debug;

use crate::builtins::{Builtin, Flow};
use crate::command::Pipeline;
use crate::config::Config;
use crate::editor::{self, LineSource};
use crate::error::{report, Result};
use crate::history::History;
use crate::jobs::{JobController, Launch};
use crate::parser;
use crate::prompt::Prompt;
use crate::session::Session;
use crate::signal_handler::SignalChannel;

pub struct Shell {
    session: Session,
    prompt: Prompt,
    reader: Box<dyn LineSource>,
    jobs: JobController,
    print_parse: bool,
}

impl Shell {
    pub fn new(config: &Config) -> Result<Self> {
        // before anything is forked: interrupts at the prompt must not kill us
        let signals = SignalChannel::install()?;
        let history = History::new(config.history_path.clone());

        Ok(Self {
            session: Session::new(),
            prompt: Prompt::new(io::stdout().is_tty()),
            reader: editor::open(history),
            jobs: JobController::new(signals),
            print_parse: config.print_parse,
        })
    }

    /// Read and execute lines until `exit` or end of input. Returns the
    /// status the interpreter should exit with.
    pub fn run(&mut self) -> i32 {
        loop {
            self.report_finished_jobs();

            let prompt = self.prompt.render(&self.session);
            let line = match self.reader.read_line(&prompt) {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    report(&format!("error reading input: {}", e));
                    break;
                }
            };

            if self.execute_line(&line) == Flow::Exit {
                return 0;
            }
        }
        self.session.last_status
    }

    /// `-c`: one line, then the status of whatever it ran.
    pub fn run_command(&mut self, line: &str) -> i32 {
        match self.execute_line(line) {
            Flow::Exit => 0,
            Flow::Continue => self.session.last_status,
        }
    }

    fn report_finished_jobs(&mut self) {
        for finished in self.jobs.update_jobs() {
            println!("{}", finished);
        }
    }

    /// Normalize, record and parse one raw line, then execute it.
    pub fn execute_line(&mut self, raw: &str) -> Flow {
        let line = raw.trim();
        if line.is_empty() {
            return Flow::Continue;
        }
        self.reader.add_history(line);

        let pipeline = match parser::parse(line) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                debug!(error = %e, line, "syntax error");
                println!("Parse ERROR");
                return Flow::Continue;
            }
        };
        debug!(?pipeline, "parsed");

        if self.print_parse {
            println!("{}", pipeline.report());
        }
        self.execute(&pipeline)
    }

    /// Builtins run here; everything else goes to the job controller.
    pub fn execute(&mut self, pipeline: &Pipeline) -> Flow {
        if let Some(builtin) = Builtin::intercept(pipeline) {
            return match builtin.run(&mut self.session) {
                Ok(flow) => {
                    self.session.last_status = 0;
                    flow
                }
                Err(e) => {
                    report(&e);
                    self.session.last_status = 1;
                    Flow::Continue
                }
            };
        }

        // children must not inherit unflushed output
        let _ = io::stdout().flush();

        self.session.last_status = match self.jobs.run(pipeline) {
            Ok(Launch::Waited(status)) => status,
            Ok(Launch::Detached { id, pid }) => {
                println!("[{}] {}", id, pid);
                0
            }
            Err(e) => {
                report(&e);
                1
            }
        };
        Flow::Continue
    }
}
