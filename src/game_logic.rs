use std::fmt;

use shakmaty::{
    CastlingMode, Chess, Color, EnPassantMode, File, Move, Piece, Position, Role, Square,
    fen::{Epd, Fen},
    san::San,
    uci::UciMove,
};
use thiserror::Error;

use crate::observation::BoardObservation;

mod mapper;
mod resolver;

pub use mapper::{PROMOTION_ORDER, map_pair, map_unordered};
pub use resolver::{Ambiguity, BoardDiffResolver, DEFAULT_MAX_CHANGED_SQUARES};

/// Errors raised by [`GameState`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("move {0} is not legal in the current position")]
    IllegalMove(ResolvedMove),

    #[error("invalid FEN: {0}")]
    InvalidFen(String),
}

/// Kind of move, as reported by the rules after the move was found legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveClass {
    Normal,
    Capture,
    Castle,
    EnPassant,
    Promotion,
}

/// A fully directional, rules-legal move ready to apply and actuate.
///
/// Castling is expressed king-wise (`e1g1`), not king-takes-rook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
    pub class: MoveClass,
    /// Square of the captured piece, if any. Differs from `to` for en passant.
    pub captured: Option<Square>,
}

impl ResolvedMove {
    /// Classify a legal [`Move`]. Returns `None` for drop moves.
    pub fn from_move(mv: &Move) -> Option<Self> {
        let resolved = match *mv {
            Move::Normal {
                from,
                capture,
                to,
                promotion,
                ..
            } => ResolvedMove {
                from,
                to,
                promotion,
                class: match (promotion, capture) {
                    (Some(_), _) => MoveClass::Promotion,
                    (None, Some(_)) => MoveClass::Capture,
                    (None, None) => MoveClass::Normal,
                },
                captured: capture.map(|_| to),
            },
            Move::EnPassant { from, to } => ResolvedMove {
                from,
                to,
                promotion: None,
                class: MoveClass::EnPassant,
                captured: Some(Square::from_coords(to.file(), from.rank())),
            },
            Move::Castle { king, rook } => {
                let file = if rook.file() > king.file() {
                    File::G
                } else {
                    File::C
                };
                ResolvedMove {
                    from: king,
                    to: Square::from_coords(file, king.rank()),
                    promotion: None,
                    class: MoveClass::Castle,
                    captured: None,
                }
            }
            Move::Put { .. } => return None,
        };
        Some(resolved)
    }

    #[inline]
    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }

    /// Same origin, destination and promotion piece.
    #[inline]
    fn same_squares(&self, from: Square, to: Square, promotion: Option<Role>) -> bool {
        self.from == from && self.to == to && self.promotion == promotion
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> &'static str {
        match self.class {
            MoveClass::Castle => "castling",
            MoveClass::EnPassant => "en passant",
            MoveClass::Promotion if self.is_capture() => "capturing promotion",
            MoveClass::Promotion => "promotion",
            MoveClass::Capture => "capture",
            MoveClass::Normal => "move",
        }
    }
}

/// UCI notation, e.g. `e2e4`, `e1g1`, `e7e8q`.
impl fmt::Display for ResolvedMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(role) = self.promotion {
            write!(f, "{}", role.char())?;
        }
        Ok(())
    }
}

/// Result of a resolution attempt at any boundary of the turn loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing relevant changed since the committed board.
    NoChange,
    /// The observation does not pin down a single legal move.
    Ambiguous(Ambiguity),
    /// A legal move explains the observation.
    Move(ResolvedMove),
    /// The operator asked to stop.
    Quit,
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    Checkmate { winner: Color },
    Stalemate,
    Draw,
    TimeExpired { loser: Color },
    UserQuit,
}

impl fmt::Display for GameOverReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameOverReason::Checkmate { winner } => write!(f, "checkmate, {winner} wins"),
            GameOverReason::Stalemate => write!(f, "stalemate"),
            GameOverReason::Draw => write!(f, "draw"),
            GameOverReason::TimeExpired { loser } => write!(f, "{loser} ran out of time"),
            GameOverReason::UserQuit => write!(f, "quit by operator"),
        }
    }
}

/// The authoritative game: a legal position plus bookkeeping.
///
/// Only the turn controller mutates it, and only through [`GameState::apply`],
/// which re-checks legality every time.
#[derive(Clone, Default)]
pub struct GameState {
    /// The logical chess position (piece types, turn, castling rights, etc.)
    position: Chess,

    /// Plies applied since this state was created.
    move_count: u32,

    game_over: Option<GameOverReason>,
}

impl GameState {
    #[inline]
    pub fn new() -> Self {
        Self::from_position(Chess::default())
    }

    /// Creates a GameState from an existing chess position.
    pub fn from_position(position: Chess) -> Self {
        Self {
            position,
            move_count: 0,
            game_over: None,
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let position: Chess = fen
            .parse::<Fen>()
            .map_err(|e| GameError::InvalidFen(e.to_string()))?
            .into_position(CastlingMode::Standard)
            .map_err(|e| GameError::InvalidFen(e.to_string()))?;
        Ok(Self::from_position(position))
    }

    #[inline]
    pub fn position(&self) -> &Chess {
        &self.position
    }

    #[inline]
    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    #[inline]
    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    /// Get the piece at a given square, if any
    #[inline]
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.position.board().piece_at(square)
    }

    /// Occupancy a correct camera would report for the current position.
    #[inline]
    pub fn occupancy(&self) -> BoardObservation {
        BoardObservation::from_position(&self.position)
    }

    pub fn fen(&self) -> String {
        Fen::from_position(&self.position, EnPassantMode::Legal).to_string()
    }

    /// Position identity without move clocks.
    pub fn position_key(&self) -> String {
        position_key(&self.position)
    }

    /// The legal move with these squares, if there is one.
    pub fn legal_move(&self, from: Square, to: Square, promotion: Option<Role>) -> Option<Move> {
        self.position.legal_moves().into_iter().find(|mv| {
            ResolvedMove::from_move(mv).is_some_and(|r| r.same_squares(from, to, promotion))
        })
    }

    #[inline]
    pub fn is_legal(&self, from: Square, to: Square, promotion: Option<Role>) -> bool {
        self.legal_move(from, to, promotion).is_some()
    }

    /// Resolve `from`/`to`/`promotion` into a classified move, if legal.
    pub fn classify(&self, from: Square, to: Square, promotion: Option<Role>) -> Option<ResolvedMove> {
        self.legal_move(from, to, promotion)
            .as_ref()
            .and_then(ResolvedMove::from_move)
    }

    /// Occupancy after playing `mv`, without committing it.
    pub fn occupancy_after(&self, mv: &ResolvedMove) -> Option<BoardObservation> {
        let legal = self.legal_move(mv.from, mv.to, mv.promotion)?;
        let mut after = self.position.clone();
        after.play_unchecked(legal);
        Some(BoardObservation::from_position(&after))
    }

    /// Standard algebraic notation for a legal move.
    pub fn san(&self, mv: &ResolvedMove) -> Option<String> {
        let legal = self.legal_move(mv.from, mv.to, mv.promotion)?;
        Some(San::from_move(&self.position, legal).to_string())
    }

    /// Parse operator input as UCI (`e2e4`, `e7e8q`) or SAN (`Nf3`, `O-O`).
    pub fn parse_move(&self, text: &str) -> Option<ResolvedMove> {
        let text = text.trim();
        let legal = match text.parse::<UciMove>() {
            Ok(uci) => uci.to_move(&self.position).ok(),
            Err(_) => None,
        }
        .or_else(|| {
            text.parse::<San>()
                .ok()
                .and_then(|san| san.to_move(&self.position).ok())
        })?;
        ResolvedMove::from_move(&legal)
    }

    /// Commit a move. Legality is re-checked against the current position.
    pub fn apply(&mut self, mv: &ResolvedMove) -> Result<(), GameError> {
        let legal = self
            .legal_move(mv.from, mv.to, mv.promotion)
            .ok_or(GameError::IllegalMove(*mv))?;
        self.position.play_unchecked(legal);
        self.move_count += 1;
        Ok(())
    }

    /// How the game ended by the rules, if it did.
    pub fn outcome(&self) -> Option<GameOverReason> {
        if self.position.is_checkmate() {
            Some(GameOverReason::Checkmate {
                winner: !self.position.turn(),
            })
        } else if self.position.is_stalemate() {
            Some(GameOverReason::Stalemate)
        } else if self.position.is_insufficient_material() || self.position.halfmoves() >= 150 {
            Some(GameOverReason::Draw)
        } else {
            None
        }
    }

    #[inline]
    pub fn game_over(&self) -> Option<GameOverReason> {
        self.game_over
    }

    pub fn finish(&mut self, reason: GameOverReason) {
        self.game_over.get_or_insert(reason);
    }
}

/// Position identity without move clocks.
pub fn position_key(position: &Chess) -> String {
    Epd::from_position(position, EnPassantMode::Legal).to_string()
}

impl fmt::Debug for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameState")
            .field("position", &self.fen())
            .field("move_count", &self.move_count)
            .field("game_over", &self.game_over)
            .finish()
    }
}
