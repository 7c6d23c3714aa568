use std::io::{self, BufRead, Write};
use std::thread;

use crossbeam_channel::{Receiver, TryRecvError, bounded};

/// What the operator console produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    Line(String),
    /// End of input; nothing more will arrive.
    Closed,
}

/// Operator text input.
///
/// The turn controller polls it between clock checks and blocks on it only
/// for manual move entry.
pub trait ConsoleInput {
    /// A line if one is ready, without blocking.
    fn poll_line(&mut self) -> Option<ConsoleEvent>;

    /// Show `prompt` and block until a line or end of input.
    fn read_line(&mut self, prompt: &str) -> ConsoleEvent;
}

/// Standard input read on a dedicated thread.
///
/// Reading stdin blocks, so lines are handed to the controller through a
/// small bounded channel it can poll.
pub struct StdinConsole {
    lines: Receiver<ConsoleEvent>,
    _reader: thread::JoinHandle<()>,
}

impl StdinConsole {
    pub fn spawn() -> io::Result<Self> {
        let (tx, lines) = bounded::<ConsoleEvent>(10);
        let reader = thread::Builder::new()
            .name("console".into())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(ConsoleEvent::Line(line.trim().to_string())).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            log::warn!("console read failed: {e}");
                            break;
                        }
                    }
                }
                let _ = tx.send(ConsoleEvent::Closed);
            })?;
        Ok(Self {
            lines,
            _reader: reader,
        })
    }
}

impl ConsoleInput for StdinConsole {
    fn poll_line(&mut self) -> Option<ConsoleEvent> {
        match self.lines.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(ConsoleEvent::Closed),
        }
    }

    fn read_line(&mut self, prompt: &str) -> ConsoleEvent {
        print!("{prompt}");
        let _ = io::stdout().flush();
        self.lines.recv().unwrap_or(ConsoleEvent::Closed)
    }
}

/// Operator words that end the game.
pub fn is_quit(line: &str) -> bool {
    matches!(
        line.trim().to_ascii_lowercase().as_str(),
        "q" | "quit" | "exit"
    )
}

/// Operator word that re-baselines the reference board.
pub fn is_reset(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "r" | "reset")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("q", true)]
    #[test_case(" QUIT ", true)]
    #[test_case("exit", true)]
    #[test_case("e2e4", false)]
    #[test_case("", false)]
    fn quit_words(line: &str, expected: bool) {
        assert_eq!(is_quit(line), expected);
    }

    #[test_case("r", true)]
    #[test_case("Reset", true)]
    #[test_case("rook", false)]
    fn reset_words(line: &str, expected: bool) {
        assert_eq!(is_reset(line), expected);
    }
}
