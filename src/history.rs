use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

/// Recall list for the line editor, optionally backed by a file that every
/// accepted line is appended to.
pub struct History {
    commands: Vec<String>,
    file_path: Option<PathBuf>,
    position: usize,
}

impl History {
    pub fn new(file_path: Option<PathBuf>) -> Self {
        let commands = file_path
            .as_deref()
            .map(Self::load_from_file)
            .unwrap_or_default();
        let position = commands.len();

        Self {
            commands,
            file_path,
            position,
        }
    }

    fn load_from_file(path: &Path) -> Vec<String> {
        match File::open(path) {
            Ok(file) => BufReader::new(file)
                .lines()
                .map_while(Result::ok)
                .filter(|line| !line.trim().is_empty())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn add(&mut self, command: &str) {
        let command = command.trim();
        if command.is_empty() {
            return;
        }

        // Don't add duplicate of last command
        if self.commands.last().map(String::as_str) != Some(command) {
            self.commands.push(command.to_string());
            self.save_to_file(command);
        }

        self.position = self.commands.len();
    }

    fn save_to_file(&self, command: &str) {
        let Some(ref path) = self.file_path else {
            return;
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{}", command));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "could not save history");
        }
    }

    pub fn previous(&mut self) -> Option<&String> {
        if self.position > 0 {
            self.position -= 1;
            self.commands.get(self.position)
        } else {
            None
        }
    }

    pub fn next(&mut self) -> Option<&String> {
        if self.position + 1 < self.commands.len() {
            self.position += 1;
            Some(&self.commands[self.position])
        } else {
            self.position = self.commands.len();
            None
        }
    }

    /// Back to "after the newest entry", as when a fresh line starts.
    pub fn rewind(&mut self) {
        self.position = self.commands.len();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.commands.len()
    }
}
