//! Robot arm link: turns a [`ResolvedMove`] into wire commands and drives
//! them one by one, waiting for a completion line after each.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

use super::serial::{SerialChannel, SerialError};
use crate::game_logic::ResolvedMove;

/// Command returning the arm to its neutral position.
pub const HOME_COMMAND: &str = "zero";

/// Substrings (upper case) that mark a command as finished.
pub const COMPLETION_KEYWORDS: [&str; 5] =
    ["MOVE_COMPLETE", "MOVECOMPLETE", "DONE", "COMPLETE", "READY"];

/// Whether a received line acknowledges the current command.
pub fn is_completion(line: &str) -> bool {
    let upper = line.to_ascii_uppercase();
    COMPLETION_KEYWORDS.iter().any(|kw| upper.contains(kw))
}

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("no completion for '{command}' within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("actuator link lost while sending '{command}': {source}")]
    Disconnected {
        command: String,
        #[source]
        source: SerialError,
    },

    #[error("another move is still being executed")]
    Busy,
}

/// The ordered wire commands for one move, homing included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorCommand {
    steps: Vec<String>,
}

impl ActuatorCommand {
    /// Capture removal (if any), the move itself, then homing.
    ///
    /// The removal targets the captured piece's square, which for en passant
    /// is the passed pawn rather than the destination.
    pub fn for_move(mv: &ResolvedMove) -> Self {
        let mut steps = Vec::with_capacity(3);
        if let Some(captured) = mv.captured {
            steps.push(format!("{captured}cap"));
        }
        steps.push(format!("{}{}", mv.from, mv.to));
        steps.push(HOME_COMMAND.to_string());
        Self { steps }
    }

    pub fn home() -> Self {
        Self {
            steps: vec![HOME_COMMAND.to_string()],
        }
    }

    #[inline]
    pub fn steps(&self) -> &[String] {
        &self.steps
    }
}

impl fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.steps.join(" -> "))
    }
}

/// Acknowledgement and pacing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorTimings {
    pub ack_timeout: Duration,
    pub home_timeout: Duration,
    pub inter_command_delay: Duration,
}

impl Default for ActuatorTimings {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(30),
            home_timeout: Duration::from_secs(10),
            inter_command_delay: Duration::from_millis(300),
        }
    }
}

/// Drives the arm over a [`SerialChannel`].
///
/// Without a channel the link runs dry: commands are built and logged and
/// every call succeeds. One move is in flight at a time; a concurrent
/// [`ActuatorLink::execute`] gets [`ActuatorError::Busy`].
pub struct ActuatorLink {
    channel: Mutex<Option<Box<dyn SerialChannel>>>,
    timings: ActuatorTimings,
    connected: AtomicBool,
    moving: AtomicBool,
}

impl ActuatorLink {
    pub fn new(channel: Option<Box<dyn SerialChannel>>, timings: ActuatorTimings) -> Self {
        Self {
            connected: AtomicBool::new(channel.is_some()),
            channel: Mutex::new(channel),
            timings,
            moving: AtomicBool::new(false),
        }
    }

    /// A link with no arm attached.
    pub fn dry_run() -> Self {
        Self::new(None, ActuatorTimings::default())
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_moving(&self) -> bool {
        self.moving.load(Ordering::Acquire)
    }

    /// Physically play `mv`. Missing acknowledgements are logged and skipped;
    /// a transport failure aborts the remaining commands.
    pub fn execute(&self, mv: &ResolvedMove) -> Result<(), ActuatorError> {
        let command = ActuatorCommand::for_move(mv);
        log::info!("actuating {mv} ({}): {command}", mv.describe());
        self.run(&command, self.timings.ack_timeout)
    }

    /// Send the arm to its neutral position.
    pub fn home(&self) -> Result<(), ActuatorError> {
        log::info!("homing actuator");
        self.run(&ActuatorCommand::home(), self.timings.home_timeout)
    }

    fn run(&self, command: &ActuatorCommand, timeout: Duration) -> Result<(), ActuatorError> {
        let mut guard = self.channel.try_lock().ok_or(ActuatorError::Busy)?;
        let Some(channel) = guard.as_mut() else {
            for (i, step) in command.steps().iter().enumerate() {
                log::info!("[dry run] {}. {step}", i + 1);
            }
            return Ok(());
        };

        self.moving.store(true, Ordering::Release);
        let result = self.send_all(channel.as_mut(), command, timeout);
        self.moving.store(false, Ordering::Release);

        if let Err(ActuatorError::Disconnected { .. }) = &result {
            *guard = None;
            self.connected.store(false, Ordering::Release);
        }
        result
    }

    fn send_all(
        &self,
        channel: &mut dyn SerialChannel,
        command: &ActuatorCommand,
        timeout: Duration,
    ) -> Result<(), ActuatorError> {
        let steps = command.steps();
        for (i, step) in steps.iter().enumerate() {
            log::debug!("actuator command {}/{}: {step}", i + 1, steps.len());
            match send_and_wait(channel, step, timeout) {
                Ok(()) => {}
                Err(e @ ActuatorError::Timeout { .. }) => log::warn!("{e}, continuing"),
                Err(e) => {
                    log::error!("{e}");
                    return Err(e);
                }
            }
            if i + 1 < steps.len() && !self.timings.inter_command_delay.is_zero() {
                std::thread::sleep(self.timings.inter_command_delay);
            }
        }
        Ok(())
    }
}

/// Write one command and wait for a completion line.
fn send_and_wait(
    channel: &mut dyn SerialChannel,
    command: &str,
    timeout: Duration,
) -> Result<(), ActuatorError> {
    let disconnected = |source| ActuatorError::Disconnected {
        command: command.to_string(),
        source,
    };

    channel.write_line(command).map_err(disconnected)?;

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match channel.read_line_timeout(remaining).map_err(disconnected)? {
            Some(line) if is_completion(&line) => {
                log::debug!("actuator acknowledged '{command}': {line}");
                return Ok(());
            }
            Some(line) => log::debug!("actuator: {line}"),
            None => {
                return Err(ActuatorError::Timeout {
                    command: command.to_string(),
                    timeout,
                });
            }
        }
        if remaining.is_zero() {
            return Err(ActuatorError::Timeout {
                command: command.to_string(),
                timeout,
            });
        }
    }
}

impl fmt::Debug for ActuatorLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActuatorLink")
            .field("connected", &self.is_connected())
            .field("moving", &self.is_moving())
            .field("timings", &self.timings)
            .finish()
    }
}
