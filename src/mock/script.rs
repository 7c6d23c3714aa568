use std::collections::VecDeque;

use shakmaty::{Chess, Square};
use thiserror::Error;

use crate::ObservationSource;
use crate::observation::{BoardObservation, Occupancy};
use crate::vision::VisionError;

/// Error when parsing a board script.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid script token: '{0}'")]
pub struct ParseError(pub(crate) String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Set(Square, Occupancy),
    /// The capture fails for this observation.
    Fail,
}

/// A scriptable board that produces one observation per script batch.
///
/// Each [`ObservationSource::observe`] applies the next pending batch and
/// returns the resulting occupancy. With nothing pending it keeps returning
/// the current occupancy, like a camera pointed at an untouched board.
#[derive(Debug, Clone)]
pub struct ScriptedBoard {
    observation: BoardObservation,
    pending_batches: VecDeque<Vec<Edit>>,
    observations: usize,
}

impl Default for ScriptedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBoard {
    /// Create with starting chess position.
    pub fn new() -> Self {
        Self::from_observation(BoardObservation::from_position(&Chess::default()))
    }

    /// Create from a specific occupancy.
    pub fn from_observation(observation: BoardObservation) -> Self {
        Self {
            observation,
            pending_batches: VecDeque::new(),
            observations: 0,
        }
    }

    /// Current occupancy, without consuming a batch.
    #[inline]
    pub fn current(&self) -> BoardObservation {
        self.observation
    }

    /// Number of observations taken so far.
    #[inline]
    pub fn observations(&self) -> usize {
        self.observations
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.pending_batches.len()
    }

    /// Parse and queue additional script for execution.
    ///
    /// Format:
    /// - `e2` empties a square (piece lifted)
    /// - `We4` / `Be4` puts a white / black piece on a square
    /// - `!` makes that observation fail
    /// - Spaces separate tokens in the same batch; `.` ends a batch
    ///
    /// Examples:
    /// - `"e2 We4."` - pawn e2 to e4, observed in one go
    /// - `"e2. We4."` - lifted, observed, then placed, observed
    /// - `"e4 Wd5."` - e4 captures on d5 (d5 was black)
    pub fn push_script(&mut self, script: &str) -> Result<(), ParseError> {
        let batches = parse_script(script)?;
        self.pending_batches.extend(batches);
        Ok(())
    }

    /// Builder form of [`ScriptedBoard::push_script`].
    pub fn with_script(mut self, script: &str) -> Result<Self, ParseError> {
        self.push_script(script)?;
        Ok(self)
    }
}

impl ObservationSource for ScriptedBoard {
    fn observe(&mut self) -> Result<BoardObservation, VisionError> {
        self.observations += 1;
        if let Some(batch) = self.pending_batches.pop_front() {
            for edit in batch {
                match edit {
                    Edit::Set(square, occupancy) => {
                        self.observation = self.observation.with(square, occupancy);
                    }
                    Edit::Fail => {
                        return Err(VisionError::Capture("scripted capture failure".into()));
                    }
                }
            }
        }
        Ok(self.observation)
    }
}

/// Parse a board script into batches of edits.
fn parse_script(script: &str) -> Result<Vec<Vec<Edit>>, ParseError> {
    let mut batches: Vec<Vec<Edit>> = vec![Vec::new()];
    let mut current_token = String::new();

    for ch in script.chars() {
        match ch {
            '.' => {
                flush_token(&mut current_token, &mut batches)?;
                batches.push(Vec::new());
            }
            c if c.is_whitespace() => {
                flush_token(&mut current_token, &mut batches)?;
            }
            '!' => {
                flush_token(&mut current_token, &mut batches)?;
                push_edit(&mut batches, Edit::Fail);
            }
            _ => {
                current_token.push(ch);

                // Squares are 2 characters, with an optional W/B prefix.
                let len = if current_token.starts_with(['W', 'B']) { 3 } else { 2 };
                if current_token.len() == len {
                    flush_token(&mut current_token, &mut batches)?;
                }
            }
        }
    }

    flush_token(&mut current_token, &mut batches)?;

    batches.retain(|b| !b.is_empty());
    Ok(batches)
}

fn push_edit(batches: &mut Vec<Vec<Edit>>, edit: Edit) {
    match batches.last_mut() {
        Some(batch) => batch.push(edit),
        None => batches.push(vec![edit]),
    }
}

/// Add current token to the last batch and clear it.
fn flush_token(token: &mut String, batches: &mut Vec<Vec<Edit>>) -> Result<(), ParseError> {
    if token.is_empty() {
        return Ok(());
    }
    let (occupancy, square) = match token.as_bytes()[0] {
        b'W' => (Occupancy::White, &token[1..]),
        b'B' => (Occupancy::Black, &token[1..]),
        _ => (Occupancy::Empty, token.as_str()),
    };
    let square: Square = square.parse().map_err(|_| ParseError(token.clone()))?;
    push_edit(batches, Edit::Set(square, occupancy));
    token.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_apply_one_per_observation() {
        let mut board = ScriptedBoard::new()
            .with_script("e2. We4.")
            .expect("valid script");

        let lifted = board.observe().expect("scripted");
        assert_eq!(lifted.at(Square::E2), Occupancy::Empty);
        assert_eq!(lifted.at(Square::E4), Occupancy::Empty);

        let placed = board.observe().expect("scripted");
        assert_eq!(placed.at(Square::E4), Occupancy::White);

        // Nothing pending: same board again.
        assert_eq!(board.observe().expect("scripted"), placed);
        assert_eq!(board.observations(), 3);
    }

    #[test]
    fn tokens_without_spaces() {
        let mut board = ScriptedBoard::new().with_script("e7Be5.").expect("valid script");
        let obs = board.observe().expect("scripted");
        assert_eq!(obs.at(Square::E7), Occupancy::Empty);
        assert_eq!(obs.at(Square::E5), Occupancy::Black);
    }

    #[test]
    fn fail_token_yields_capture_error() {
        let mut board = ScriptedBoard::new().with_script("!. e2 We4.").expect("valid script");
        assert!(matches!(board.observe(), Err(VisionError::Capture(_))));
        assert_eq!(
            board.observe().expect("scripted").at(Square::E4),
            Occupancy::White
        );
    }

    #[test]
    fn test_parse_error_invalid_square() {
        let mut board = ScriptedBoard::new();
        let result = board.push_script("e2.  zz.");
        assert_eq!(result, Err(ParseError("zz".to_string())));
    }

    #[test]
    fn test_parse_error_does_not_modify_state() {
        let mut board = ScriptedBoard::new();
        let initial = board.current();

        board.push_script("e2. ").expect("valid script");

        // Invalid script should fail without modifying pending batches
        assert!(board.push_script("Wxx.").is_err());
        assert_eq!(board.pending(), 1);

        let obs = board.observe().expect("scripted");
        assert_ne!(obs, initial);
    }
}
