use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Append-only receiver of `OUTPUT` lines, called once per statement in program order.
pub trait OutputSink {
    fn emit(&mut self, line: &str) -> io::Result<()>;
}

/// Pull-based provider of input values. `None` means the source is exhausted.
pub trait InputSource {
    fn read(&mut self, prompt: Option<&str>) -> Option<String>;
}

impl OutputSink for Vec<String> {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}

/// Forwards every line to a closure.
pub struct CallbackSink<F: FnMut(&str)> {
    callback: F,
}

impl<F: FnMut(&str)> CallbackSink<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: FnMut(&str)> OutputSink for CallbackSink<F> {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        (self.callback)(line);
        Ok(())
    }
}

/// Writes one line per output, flushing after each so output already sent
/// survives a later failure.
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for WriterSink<W> {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()
    }
}

/// Pre-supplied input values, consumed front to back.
#[derive(Debug, Clone, Default)]
pub struct QueueInput {
    values: VecDeque<String>,
}

impl QueueInput {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.values.push_back(value.into());
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl InputSource for QueueInput {
    fn read(&mut self, _prompt: Option<&str>) -> Option<String> {
        self.values.pop_front()
    }
}

/// Reads one line per request from a buffered reader, optionally echoing
/// prompts to a writer first.
pub struct ReaderInput<R: BufRead> {
    reader: R,
    prompts: Option<Box<dyn Write>>,
}

impl<R: BufRead> ReaderInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            prompts: None,
        }
    }

    pub fn with_prompts(mut self, writer: Box<dyn Write>) -> Self {
        self.prompts = Some(writer);
        self
    }
}

impl<R: BufRead> InputSource for ReaderInput<R> {
    fn read(&mut self, prompt: Option<&str>) -> Option<String> {
        if let (Some(writer), Some(prompt)) = (self.prompts.as_mut(), prompt) {
            // A prompt that cannot be shown does not stop the read
            let _ = writeln!(writer, "{}", prompt).and_then(|_| writer.flush());
        }
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => {
                warn!(error = %e, "Reading input failed, treating the source as exhausted");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_input_strips_line_endings_and_ends() {
        let mut input = ReaderInput::new("7\r\nhello\n".as_bytes());
        assert_eq!(input.read(None).as_deref(), Some("7"));
        assert_eq!(input.read(Some("again?")).as_deref(), Some("hello"));
        assert_eq!(input.read(None), None);
    }

    #[test]
    fn unreadable_input_ends_the_source() {
        let mut input = ReaderInput::new(&[0xff, 0xfe, b'\n'][..]);
        assert_eq!(input.read(None), None);
    }

    #[test]
    fn writer_sink_writes_one_line_per_output() {
        let mut sink = WriterSink::new(Vec::new());
        sink.emit("a").unwrap();
        sink.emit("b").unwrap();
        assert_eq!(sink.into_inner(), b"a\nb\n");
    }
}
