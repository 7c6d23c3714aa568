use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Errors from a line-oriented serial transport.
#[derive(Debug, Error)]
pub enum SerialError {
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serial channel is not connected")]
    NotConnected,
}

/// A line-oriented duplex transport to a microcontroller.
///
/// Lines are newline-terminated ASCII. Received lines are trimmed and empty
/// lines are skipped.
pub trait SerialChannel: Send {
    /// Write `line` followed by a newline and flush.
    fn write_line(&mut self, line: &str) -> Result<(), SerialError>;

    /// Return a complete line if one is already available, without blocking.
    fn poll_line(&mut self) -> Result<Option<String>, SerialError>;

    /// Block for at most `timeout` waiting for a line. `Ok(None)` on timeout.
    fn read_line_timeout(&mut self, timeout: Duration) -> Result<Option<String>, SerialError>;
}

impl<T: SerialChannel + ?Sized> SerialChannel for Box<T> {
    fn write_line(&mut self, line: &str) -> Result<(), SerialError> {
        (**self).write_line(line)
    }

    fn poll_line(&mut self) -> Result<Option<String>, SerialError> {
        (**self).poll_line()
    }

    fn read_line_timeout(&mut self, timeout: Duration) -> Result<Option<String>, SerialError> {
        (**self).read_line_timeout(timeout)
    }
}

/// Upper bound on a single blocking read, so deadlines are honoured.
const READ_SLICE: Duration = Duration::from_millis(100);

/// [`SerialChannel`] over a real UART.
pub struct PortChannel {
    name: String,
    port: Box<dyn serialport::SerialPort>,
    buffer: Vec<u8>,
}

impl PortChannel {
    pub fn open(path: &str, baud: u32) -> Result<Self, SerialError> {
        let port = serialport::new(path, baud)
            .timeout(READ_SLICE)
            .open()
            .map_err(|source| SerialError::Open {
                port: path.to_string(),
                source,
            })?;
        log::info!("opened serial port {path} at {baud} baud");
        Ok(Self {
            name: path.to_string(),
            port,
            buffer: Vec::new(),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pop the next non-empty buffered line.
    fn take_line(&mut self) -> Option<String> {
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }

    /// Read whatever arrives within the port timeout into the buffer.
    fn fill(&mut self, timeout: Duration) -> Result<(), SerialError> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| SerialError::Io(e.into()))?;
        let mut chunk = [0u8; 256];
        match self.port.read(&mut chunk) {
            // A blocking read only returns nothing once the device is gone.
            Ok(0) => Err(SerialError::NotConnected),
            Ok(n) => {
                self.buffer.extend_from_slice(&chunk[..n]);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SerialChannel for PortChannel {
    fn write_line(&mut self, line: &str) -> Result<(), SerialError> {
        log::trace!("{} <- {line}", self.name);
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;
        Ok(())
    }

    fn poll_line(&mut self) -> Result<Option<String>, SerialError> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }
        let available = self
            .port
            .bytes_to_read()
            .map_err(|e| SerialError::Io(e.into()))?;
        if available > 0 {
            self.fill(READ_SLICE)?;
        }
        let line = self.take_line();
        if let Some(line) = &line {
            log::trace!("{} -> {line}", self.name);
        }
        Ok(line)
    }

    fn read_line_timeout(&mut self, timeout: Duration) -> Result<Option<String>, SerialError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(line) = self.take_line() {
                log::trace!("{} -> {line}", self.name);
                return Ok(Some(line));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            self.fill(remaining.min(READ_SLICE))?;
        }
    }
}

impl std::fmt::Debug for PortChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortChannel")
            .field("name", &self.name)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

/// Open `path` if configured, logging instead of failing when it cannot be
/// opened. Hardware links run in degraded mode without a channel.
pub fn open_optional(label: &str, path: Option<&str>, baud: u32) -> Option<Box<dyn SerialChannel>> {
    let path = path?;
    match PortChannel::open(path, baud) {
        Ok(channel) => Some(Box::new(channel)),
        Err(e) => {
            log::warn!("{label} unavailable, continuing without it: {e}");
            None
        }
    }
}
