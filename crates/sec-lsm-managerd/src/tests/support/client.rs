//! Line-oriented protocol client used by the socket scenarios.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

/// Blocking client exchanging newline-terminated records.
pub struct LineClient {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl LineClient {
    /// Wraps a connected stream.
    #[must_use]
    pub fn new(stream: UnixStream) -> Self {
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set read timeout");
        let writer = stream.try_clone().expect("clone stream");
        Self {
            reader: BufReader::new(stream),
            writer,
        }
    }

    /// Sends one record without its terminator.
    pub fn send(&mut self, record: &str) {
        self.writer
            .write_all(format!("{record}\n").as_bytes())
            .expect("write record");
    }

    /// Reads one reply line without its terminator; `None` at end of stream.
    pub fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches('\n').to_owned()),
        }
    }

    /// Sends `record` and returns the single reply.
    pub fn request(&mut self, record: &str) -> String {
        self.send(record);
        self.read_line().expect("reply before end of stream")
    }

    /// Sends `record` and collects replies up to `done` or `error`.
    pub fn request_listing(&mut self, record: &str) -> Vec<String> {
        self.send(record);
        let mut lines = Vec::new();
        while let Some(line) = self.read_line() {
            let last = line == "done" || line.starts_with("error");
            lines.push(line);
            if last {
                break;
            }
        }
        lines
    }
}
