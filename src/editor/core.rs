use std::io::{self, Write};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    style::Print,
    terminal::{self, ClearType},
};

use super::buffer::LineBuffer;
use super::completion::complete;
use super::raw_mode::RawModeGuard;
use super::LineSource;
use crate::history::History;

/// What a key press does to the line being read.
enum Step {
    Redraw,
    Cursor,
    Submit,
    EndOfInput,
    Ignore,
}

/// Interactive line editor used when stdin is a terminal.
pub struct LineEditor {
    line: LineBuffer,
    history: History,
}

impl LineEditor {
    pub fn new(history: History) -> Self {
        Self {
            line: LineBuffer::default(),
            history,
        }
    }

    fn handle_key(&mut self, key: KeyEvent, prompt: &str) -> io::Result<Step> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let step = match key.code {
            KeyCode::Enter => Step::Submit,

            // Ctrl+C - drop the current line
            KeyCode::Char('c') if ctrl => {
                self.line.clear();
                execute!(io::stdout(), Print("^C"))?;
                Step::Submit
            }

            // Ctrl+D - end of input on an empty line
            KeyCode::Char('d') if ctrl => {
                if self.line.is_empty() {
                    Step::EndOfInput
                } else if self.line.delete() {
                    Step::Redraw
                } else {
                    Step::Ignore
                }
            }

            KeyCode::Backspace => self.line.backspace().into(),
            KeyCode::Delete => self.line.delete().into(),
            KeyCode::Left => cursor_step(self.line.left()),
            KeyCode::Right => cursor_step(self.line.right()),

            KeyCode::Home => {
                self.line.home();
                Step::Cursor
            }
            KeyCode::Char('a') if ctrl => {
                self.line.home();
                Step::Cursor
            }
            KeyCode::End => {
                self.line.end();
                Step::Cursor
            }
            KeyCode::Char('e') if ctrl => {
                self.line.end();
                Step::Cursor
            }

            KeyCode::Up => match self.history.previous() {
                Some(entry) => {
                    self.line.set(entry);
                    Step::Redraw
                }
                None => Step::Ignore,
            },
            KeyCode::Down => {
                match self.history.next() {
                    Some(entry) => self.line.set(entry),
                    None => self.line.clear(),
                }
                Step::Redraw
            }

            KeyCode::Char('k') if ctrl => {
                self.line.kill_to_end();
                Step::Redraw
            }
            KeyCode::Char('u') if ctrl => {
                self.line.kill_to_start();
                Step::Redraw
            }
            KeyCode::Char('w') if ctrl => self.line.delete_word().into(),
            KeyCode::Char('l') if ctrl => {
                execute!(
                    io::stdout(),
                    terminal::Clear(ClearType::All),
                    cursor::MoveTo(0, 0)
                )?;
                Step::Redraw
            }

            KeyCode::Tab => self.complete(prompt)?,

            KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                self.line.insert(c);
                Step::Redraw
            }

            _ => Step::Ignore,
        };
        Ok(step)
    }

    fn complete(&mut self, prompt: &str) -> io::Result<Step> {
        let Some(done) = complete(self.line.text(), self.line.cursor_byte()) else {
            return Ok(Step::Ignore);
        };

        if done.candidates.len() > 1 {
            let mut stdout = io::stdout();
            execute!(stdout, Print("\r\n"), Print(done.candidates.join("    ")), Print("\r\n"))?;
            // the prompt line was scrolled away
            execute!(stdout, Print(prompt))?;
        }
        self.line.replace_before_cursor(done.start, &done.replacement);
        Ok(Step::Redraw)
    }

    fn redraw(&self, prompt: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::UntilNewLine),
            Print(prompt),
            Print(self.line.text()),
        )?;
        self.update_cursor_position(prompt)
    }

    fn update_cursor_position(&self, prompt: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        let column = visual_length(prompt) + self.line.cursor();
        execute!(stdout, cursor::MoveToColumn(column as u16))?;
        stdout.flush()
    }
}

impl LineSource for LineEditor {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.line.clear();
        self.history.rewind();

        let mut stdout = io::stdout();
        let _guard = RawModeGuard::enter()?;

        execute!(stdout, Print(prompt))?;
        stdout.flush()?;

        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind == KeyEventKind::Release {
                continue;
            }
            match self.handle_key(key, prompt)? {
                Step::Submit => {
                    execute!(stdout, Print("\r\n"))?;
                    return Ok(Some(self.line.text().to_string()));
                }
                Step::EndOfInput => {
                    execute!(stdout, Print("\r\n"))?;
                    return Ok(None);
                }
                Step::Redraw => self.redraw(prompt)?,
                Step::Cursor => self.update_cursor_position(prompt)?,
                Step::Ignore => {}
            }
        }
    }

    fn add_history(&mut self, line: &str) {
        self.history.add(line);
    }
}

impl From<bool> for Step {
    fn from(changed: bool) -> Self {
        if changed {
            Step::Redraw
        } else {
            Step::Ignore
        }
    }
}

fn cursor_step(moved: bool) -> Step {
    if moved {
        Step::Cursor
    } else {
        Step::Ignore
    }
}

/// Printable width of the prompt, ANSI colour sequences excluded.
fn visual_length(s: &str) -> usize {
    let mut in_escape = false;
    let mut length = 0;

    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
            continue;
        }
        if in_escape {
            if c == 'm' {
                in_escape = false;
            }
            continue;
        }
        length += 1;
    }
    length
}
