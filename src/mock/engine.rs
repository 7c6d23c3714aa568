use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use shakmaty::{CastlingMode, Chess, Position, uci::UciMove};

use crate::engine::{Engine, EngineError, EngineResult};
use super::ParseError;
use crate::game_logic::{GameState, position_key};

/// Engine with canned replies keyed by position.
///
/// Positions without a scripted reply get the first legal move.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    replies: HashMap<String, EngineResult>,
    failing: bool,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose every search fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Reply with `pv` once `moves` have been played from the start.
    pub fn with_reply(mut self, moves: &[&str], pv: &[&str]) -> Result<Self, ParseError> {
        let mut game = GameState::new();
        for &text in moves {
            let mv = game
                .parse_move(text)
                .ok_or_else(|| ParseError(text.to_string()))?;
            game.apply(&mv).map_err(|_| ParseError(text.to_string()))?;
        }
        let pv = pv
            .iter()
            .map(|&text| text.parse::<UciMove>().map_err(|_| ParseError(text.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        let best_move = pv
            .first()
            .cloned()
            .ok_or_else(|| ParseError(String::new()))?;
        self.replies.insert(
            game.position_key(),
            EngineResult {
                best_move,
                pv,
                score: None,
            },
        );
        Ok(self)
    }

    /// Number of searches requested so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Engine for ScriptedEngine {
    fn analyse(
        &self,
        position: &Chess,
        _depth: u8,
        _stop: &AtomicBool,
    ) -> Result<EngineResult, EngineError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing {
            return Err(EngineError::Terminated);
        }
        if let Some(reply) = self.replies.get(&position_key(position)) {
            return Ok(reply.clone());
        }
        let mv = position
            .legal_moves()
            .first()
            .cloned()
            .ok_or(EngineError::NoLegalMove)?;
        let uci = mv.to_uci(CastlingMode::Standard);
        Ok(EngineResult {
            best_move: uci.clone(),
            pv: vec![uci],
            score: None,
        })
    }
}
