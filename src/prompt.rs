use colored::Colorize;

use crate::session::Session;

pub struct Prompt {
    prefix: String,
    color: bool,
}

impl Prompt {
    pub fn new(color: bool) -> Self {
        Self {
            prefix: String::from(">"),
            color,
        }
    }

    /// `user@host:cwd> `, the marker turning red after a failed command.
    pub fn render(&self, session: &Session) -> String {
        let cwd = session.display_cwd();
        if !self.color {
            return format!("{}@{}:{}{} ", session.user, session.host, cwd, self.prefix);
        }

        let marker = if session.last_status == 0 {
            self.prefix.bold()
        } else {
            self.prefix.red().bold()
        };
        format!(
            "{}:{}{} ",
            format!("{}@{}", session.user, session.host).green().bold(),
            cwd.blue().bold(),
            marker
        )
    }
}
