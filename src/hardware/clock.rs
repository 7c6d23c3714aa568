//! Physical chess clock: telemetry parsing, button inference and commands.
//!
//! The clock firmware labels black as `P1` and white as `P2`. Depending on
//! firmware version it reports remaining time as `DATA: P1:n,P2:n`, as a bare
//! `P1:n,P2:n`, or inside a pipe-delimited `LOG:` line, and may or may not
//! report button presses directly. When it does not, the pressed button is
//! inferred from which clock started running.

use std::fmt;

use shakmaty::Color;
use thiserror::Error;

use super::serial::{SerialChannel, SerialError};

/// Seconds on each clock before any telemetry arrives.
pub const DEFAULT_INITIAL_SECONDS: u32 = 600;

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("clock link lost: {0}")]
    Disconnected(#[from] SerialError),
}

/// A clock button, named the way the firmware names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockButton {
    /// Black's button.
    P1,
    /// White's button.
    P2,
}

impl ClockButton {
    /// The button a player presses to end their own turn.
    #[inline]
    pub const fn of(color: Color) -> Self {
        match color {
            Color::Black => ClockButton::P1,
            Color::White => ClockButton::P2,
        }
    }

    #[inline]
    pub const fn color(self) -> Color {
        match self {
            ClockButton::P1 => Color::Black,
            ClockButton::P2 => Color::White,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ClockButton::P1 => "P1",
            ClockButton::P2 => "P2",
        }
    }
}

impl fmt::Display for ClockButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recognized telemetry line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockLine {
    Times { black: u32, white: u32 },
    Button(ClockButton),
}

/// Parse one telemetry line; unrecognized lines yield `None`.
pub fn parse_line(line: &str) -> Option<ClockLine> {
    let line = line.trim();
    if let Some((black, white)) = parse_times(line) {
        return Some(ClockLine::Times { black, white });
    }
    parse_button(line).map(ClockLine::Button)
}

fn parse_times(line: &str) -> Option<(u32, u32)> {
    if let Some(rest) = line.strip_prefix("DATA:") {
        return parse_pair(rest.trim());
    }
    if line.starts_with("P1:") {
        return parse_pair(line);
    }
    if line.starts_with("LOG:") {
        let field = |label: &str| -> Option<u32> {
            line.split('|')
                .map(str::trim)
                .find_map(|part| part.strip_prefix(label))
                .and_then(|v| v.trim().trim_end_matches('s').trim().parse().ok())
        };
        return Some((field("P1:")?, field("P2:")?));
    }
    None
}

/// `P1:<n>,P2:<n>`
fn parse_pair(s: &str) -> Option<(u32, u32)> {
    let (p1, p2) = s.split_once(',')?;
    let black = p1.trim().strip_prefix("P1:")?.trim().parse().ok()?;
    let white = p2.trim().strip_prefix("P2:")?.trim().parse().ok()?;
    Some((black, white))
}

fn parse_button(line: &str) -> Option<ClockButton> {
    let upper = line.to_ascii_uppercase();
    let tagged = ["BUTTON", "BTN", "PRESS"].iter().any(|kw| upper.contains(kw));
    if tagged {
        if upper.contains("P1") {
            return Some(ClockButton::P1);
        }
        if upper.contains("P2") {
            return Some(ClockButton::P2);
        }
    }
    match upper.as_str() {
        "P1" => Some(ClockButton::P1),
        "P2" => Some(ClockButton::P2),
        _ => None,
    }
}

/// The latest clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSample {
    pub black_seconds: u32,
    pub white_seconds: u32,
    /// Side whose clock is counting down, if established.
    pub active: Option<Color>,
}

/// Tracks clock readings and derives button events from them.
#[derive(Debug, Clone)]
pub struct ClockMonitor {
    black_seconds: u32,
    white_seconds: u32,
    active: Option<Color>,
    pending: Option<ClockButton>,
    received_times: bool,
}

impl Default for ClockMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_SECONDS)
    }
}

impl ClockMonitor {
    pub fn new(initial_seconds: u32) -> Self {
        Self {
            black_seconds: initial_seconds,
            white_seconds: initial_seconds,
            active: None,
            pending: None,
            received_times: false,
        }
    }

    /// Feed one raw telemetry line. Returns what it was recognized as.
    pub fn feed_line(&mut self, line: &str) -> Option<ClockLine> {
        let parsed = parse_line(line);
        match parsed {
            Some(ClockLine::Times { black, white }) => self.record_times(black, white),
            Some(ClockLine::Button(button)) => self.record_button(button),
            None => log::trace!("ignoring clock line: {line}"),
        }
        parsed
    }

    /// A direct press report replaces any inferred one.
    pub fn record_button(&mut self, button: ClockButton) {
        log::debug!("clock button {button} pressed");
        self.pending = Some(button);
    }

    /// Update remaining times and infer a button press from which clock runs.
    ///
    /// When black's clock starts running, white has just pressed `P2`, and
    /// vice versa. Only a flip of an already established running side counts.
    pub fn record_times(&mut self, black: u32, white: u32) {
        let delta_black = i64::from(self.black_seconds) - i64::from(black);
        let delta_white = i64::from(self.white_seconds) - i64::from(white);
        self.black_seconds = black;
        self.white_seconds = white;
        self.received_times = true;

        let running = if delta_black > 0 && delta_white <= 0 {
            Some(Color::Black)
        } else if delta_white > 0 && delta_black <= 0 {
            Some(Color::White)
        } else {
            None
        };

        let Some(running) = running else {
            return;
        };
        match self.active {
            Some(previous) if previous != running => {
                let pressed = ClockButton::of(!running);
                log::debug!("{running} clock started, inferring {pressed} press");
                self.pending = Some(pressed);
            }
            Some(_) => {}
            None => log::debug!("{running} clock running"),
        }
        self.active = Some(running);
    }

    /// Pending button event, returned at most once.
    #[inline]
    pub fn check_button(&mut self) -> Option<ClockButton> {
        self.pending.take()
    }

    pub fn sample(&self) -> ClockSample {
        ClockSample {
            black_seconds: self.black_seconds,
            white_seconds: self.white_seconds,
            active: self.active,
        }
    }

    pub fn seconds(&self, color: Color) -> u32 {
        match color {
            Color::Black => self.black_seconds,
            Color::White => self.white_seconds,
        }
    }

    /// The side whose time ran out, once real readings have arrived.
    pub fn expired(&self) -> Option<Color> {
        if !self.received_times {
            return None;
        }
        if self.white_seconds == 0 {
            Some(Color::White)
        } else if self.black_seconds == 0 {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// `Black: MM:SS | White: MM:SS`
    pub fn display(&self) -> String {
        format!(
            "Black: {} | White: {}",
            mm_ss(self.black_seconds),
            mm_ss(self.white_seconds)
        )
    }
}

fn mm_ss(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Commands understood by the clock firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockCommand {
    Start,
    Stop,
    Reset,
    /// Virtual press of a player's button.
    Press(ClockButton),
}

impl fmt::Display for ClockCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockCommand::Start => f.write_str("START_TIMER"),
            ClockCommand::Stop => f.write_str("STOP_TIMER"),
            ClockCommand::Reset => f.write_str("RESET_TIMER"),
            ClockCommand::Press(button) => write!(f, "PRESS:{button}"),
        }
    }
}

/// The clock's serial link and its monitor.
///
/// A transport failure is reported once and the link carries on without a
/// channel; readings then stay at their last values and no events arrive.
#[derive(Debug)]
pub struct ClockLink<C = Box<dyn SerialChannel>> {
    channel: Option<C>,
    monitor: ClockMonitor,
    initial_seconds: u32,
}

impl<C: SerialChannel> ClockLink<C> {
    pub fn new(channel: Option<C>, initial_seconds: u32) -> Self {
        Self {
            channel,
            monitor: ClockMonitor::new(initial_seconds),
            initial_seconds,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    #[inline]
    pub fn monitor(&self) -> &ClockMonitor {
        &self.monitor
    }

    /// Drain all telemetry that is already available.
    pub fn poll(&mut self) -> Result<(), ClockError> {
        let Some(channel) = self.channel.as_mut() else {
            return Ok(());
        };
        loop {
            match channel.poll_line() {
                Ok(Some(line)) => {
                    self.monitor.feed_line(&line);
                }
                Ok(None) => return Ok(()),
                Err(e) => return Err(self.degrade(e)),
            }
        }
    }

    /// Poll, then return the pending button event at most once.
    pub fn check_button(&mut self) -> Result<Option<ClockButton>, ClockError> {
        self.poll()?;
        Ok(self.monitor.check_button())
    }

    pub fn send(&mut self, command: ClockCommand) -> Result<(), ClockError> {
        let Some(channel) = self.channel.as_mut() else {
            log::debug!("no clock attached, not sending {command}");
            return Ok(());
        };
        log::debug!("clock <- {command}");
        match channel.write_line(&command.to_string()) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.degrade(e)),
        }
    }

    /// Start timing a game, resetting first if a side already reads zero.
    pub fn start_game(&mut self) -> Result<(), ClockError> {
        self.poll()?;
        if let Some(flagged) = self.monitor.expired() {
            log::info!("{flagged} clock reads zero, resetting clock");
            self.send(ClockCommand::Reset)?;
            self.monitor = ClockMonitor::new(self.initial_seconds);
        }
        self.send(ClockCommand::Start)
    }

    fn degrade(&mut self, source: SerialError) -> ClockError {
        self.channel = None;
        ClockError::Disconnected(source)
    }
}
