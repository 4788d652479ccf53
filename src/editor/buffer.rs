/// Text being edited plus a cursor counted in chars, not bytes.
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    text: String,
    cursor: usize,
}

impl LineBuffer {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    fn byte_at(&self, pos: usize) -> usize {
        self.text
            .char_indices()
            .nth(pos)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    pub fn cursor_byte(&self) -> usize {
        self.byte_at(self.cursor)
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    /// Replace the whole line, cursor at the end (history recall).
    pub fn set(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.char_len();
    }

    pub fn insert(&mut self, c: char) {
        let at = self.cursor_byte();
        self.text.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let at = self.cursor_byte();
        self.text.remove(at);
        true
    }

    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.char_len() {
            return false;
        }
        let at = self.cursor_byte();
        self.text.remove(at);
        true
    }

    pub fn left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn right(&mut self) -> bool {
        if self.cursor >= self.char_len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.char_len();
    }

    /// Ctrl-K
    pub fn kill_to_end(&mut self) {
        let at = self.cursor_byte();
        self.text.truncate(at);
    }

    /// Ctrl-U
    pub fn kill_to_start(&mut self) {
        let at = self.cursor_byte();
        self.text.drain(..at);
        self.cursor = 0;
    }

    /// Ctrl-W: the word before the cursor and the blanks after it.
    pub fn delete_word(&mut self) -> bool {
        let chars: Vec<char> = self.text.chars().collect();
        let mut start = self.cursor;
        while start > 0 && chars[start - 1].is_whitespace() {
            start -= 1;
        }
        while start > 0 && !chars[start - 1].is_whitespace() {
            start -= 1;
        }
        if start == self.cursor {
            return false;
        }

        let (from, to) = (self.byte_at(start), self.cursor_byte());
        self.text.drain(from..to);
        self.cursor = start;
        true
    }

    /// Swap `text[start..cursor]` (byte offsets) for `with`, cursor after it.
    pub fn replace_before_cursor(&mut self, start: usize, with: &str) {
        let end = self.cursor_byte();
        self.text.replace_range(start..end, with);
        self.cursor = self.text[..start + with.len()].chars().count();
    }
}
