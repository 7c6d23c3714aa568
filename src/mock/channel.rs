use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::hardware::{SerialChannel, SerialError};

#[derive(Debug, Default)]
struct ChannelState {
    written: Vec<String>,
    incoming: VecDeque<String>,
    auto_reply: Option<String>,
    writes_before_failure: Option<usize>,
}

/// In-memory [`SerialChannel`] with a scripted far end.
///
/// Clones share state, so a test keeps one handle while the link under test
/// owns another. Reads never block: a read with nothing queued is a timeout.
#[derive(Debug, Clone, Default)]
pub struct ScriptedChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `reply` after every successful write.
    pub fn with_auto_reply(self, reply: &str) -> Self {
        self.state.lock().auto_reply = Some(reply.to_string());
        self
    }

    /// Accept `writes` writes, then fail every write after that.
    pub fn failing_writes_after(self, writes: usize) -> Self {
        self.state.lock().writes_before_failure = Some(writes);
        self
    }

    /// Queue lines as if the device had sent them.
    pub fn push_lines<'a>(&self, lines: impl IntoIterator<Item = &'a str>) {
        self.state
            .lock()
            .incoming
            .extend(lines.into_iter().map(str::to_string));
    }

    /// Every line successfully written so far.
    pub fn written(&self) -> Vec<String> {
        self.state.lock().written.clone()
    }

    pub fn pending_lines(&self) -> usize {
        self.state.lock().incoming.len()
    }
}

impl SerialChannel for ScriptedChannel {
    fn write_line(&mut self, line: &str) -> Result<(), SerialError> {
        let mut state = self.state.lock();
        if let Some(remaining) = state.writes_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(SerialError::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "scripted write failure",
                )));
            }
            *remaining -= 1;
        }
        state.written.push(line.to_string());
        if let Some(reply) = state.auto_reply.clone() {
            state.incoming.push_back(reply);
        }
        Ok(())
    }

    fn poll_line(&mut self) -> Result<Option<String>, SerialError> {
        Ok(self.state.lock().incoming.pop_front())
    }

    fn read_line_timeout(&mut self, _timeout: Duration) -> Result<Option<String>, SerialError> {
        self.poll_line()
    }
}
