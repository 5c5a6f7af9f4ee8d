//! Line-oriented terminal sessions for the shell.

use std::io::{self, BufRead, Write};

/// A source of input lines and a sink for output lines.
pub trait LineSession {
    /// Shows `prompt` and reads one line without its terminator.
    /// `None` means end of input.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Writes one line of output.
    fn write_line(&mut self, text: &str) -> io::Result<()>;

    /// Records a complete entry in the session history.
    fn add_history(&mut self, _entry: &str) {}

    /// Entries recorded so far, oldest first.
    fn history(&self) -> &[String] {
        &[]
    }
}

/// A [`LineSession`] over any reader and writer, e.g. stdin and stdout.
pub struct StdioSession<R, W> {
    input: R,
    output: W,
    history: Vec<String>,
    max_history: usize,
}

impl<R: BufRead, W: Write> StdioSession<R, W> {
    /// Creates a session keeping up to 1000 history entries.
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            history: Vec::new(),
            max_history: 1000,
        }
    }

    /// Consumes the session and returns its writer.
    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> LineSession for StdioSession<R, W> {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    fn write_line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{text}")
    }

    fn add_history(&mut self, entry: &str) {
        if self.history.len() == self.max_history {
            self.history.remove(0);
        }
        self.history.push(entry.to_string());
    }

    fn history(&self) -> &[String] {
        &self.history
    }
}
