//! Infers the move a player made from two occupancy snapshots.

use shakmaty::{Bitboard, Color, Square};

use super::{GameState, Resolution, ResolvedMove, map_pair, map_unordered};
use crate::observation::{BoardObservation, row_major_squares};

/// Default cap on relevant changed squares (castling touches four).
pub const DEFAULT_MAX_CHANGED_SQUARES: usize = 4;

/// Why a diff could not be turned into a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ambiguity {
    /// Only one square changed, e.g. a piece is still in the hand.
    SingleSquare(Square),
    /// More squares changed than any legal move explains.
    TooManyChanges(usize),
    /// No legal move matches the changed squares.
    NoLegalMove(Vec<Square>),
}

impl std::fmt::Display for Ambiguity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ambiguity::SingleSquare(square) => write!(f, "only {square} changed"),
            Ambiguity::TooManyChanges(count) => write!(f, "{count} squares changed"),
            Ambiguity::NoLegalMove(squares) => {
                let list: Vec<String> = squares.iter().map(Square::to_string).collect();
                write!(f, "no legal move matches changes on {}", list.join(" "))
            }
        }
    }
}

/// Resolves the side-to-move's move from a committed reference observation
/// and a fresh one.
///
/// Only squares where the side to move lost or gained a piece are relevant.
/// Opponent-only changes (the captured pawn in en passant, the captured piece
/// under a capturing piece) are ignored.
#[derive(Debug, Clone, Copy)]
pub struct BoardDiffResolver {
    max_changed_squares: usize,
}

impl Default for BoardDiffResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHANGED_SQUARES)
    }
}

impl BoardDiffResolver {
    pub fn new(max_changed_squares: usize) -> Self {
        Self {
            max_changed_squares: max_changed_squares.max(2),
        }
    }

    /// Squares where `side` lost or gained a piece, in grid scan order.
    pub fn relevant_changes(
        previous: &BoardObservation,
        current: &BoardObservation,
        side: Color,
    ) -> Vec<Square> {
        let changed = previous.by_color(side) ^ current.by_color(side);
        row_major_squares().filter(|&sq| changed.contains(sq)).collect()
    }

    pub fn resolve(
        &self,
        game: &GameState,
        previous: &BoardObservation,
        current: &BoardObservation,
    ) -> Resolution {
        let side = game.turn();
        let changes = Self::relevant_changes(previous, current, side);
        log::debug!(
            "{} relevant change(s) for {side}: {}",
            changes.len(),
            squares_list(&changes)
        );

        let resolved = match changes.len() {
            0 => return Resolution::NoChange,
            1 => return Resolution::Ambiguous(Ambiguity::SingleSquare(changes[0])),
            n if n > self.max_changed_squares => {
                return Resolution::Ambiguous(Ambiguity::TooManyChanges(n));
            }
            2 => {
                let (a, b) = (changes[0], changes[1]);
                // Source is where the side's piece disappeared.
                let (src, dst) = if previous.by_color(side).contains(b) {
                    (b, a)
                } else {
                    (a, b)
                };
                map_unordered(game, src, dst)
            }
            _ => self.resolve_many(game, current, &changes),
        };

        match resolved {
            Some(mv) => {
                log::debug!("resolved {mv} ({})", mv.describe());
                Resolution::Move(mv)
            }
            None => Resolution::Ambiguous(Ambiguity::NoLegalMove(changes)),
        }
    }

    /// Try every ordered pair and keep the legal move whose outcome disagrees
    /// with the side's observed occupancy on the fewest changed squares.
    ///
    /// An exact match wins in pair order. An inexact best (detector noise) is
    /// only accepted when no other move does equally well.
    fn resolve_many(
        &self,
        game: &GameState,
        current: &BoardObservation,
        changes: &[Square],
    ) -> Option<ResolvedMove> {
        let side = game.turn();
        let mask = changes.iter().fold(Bitboard::EMPTY, |mut bb, &sq| {
            bb.add(sq);
            bb
        });
        let observed = current.by_color(side) & mask;

        let mut best: Option<(usize, ResolvedMove)> = None;
        let mut tied = false;
        for mv in changes
            .iter()
            .flat_map(|&from| changes.iter().map(move |&to| (from, to)))
            .filter_map(|(from, to)| map_pair(game, from, to))
        {
            let Some(after) = game.occupancy_after(&mv) else {
                continue;
            };
            let mismatches = ((after.by_color(side) & mask) ^ observed).count();
            match &best {
                Some((score, _)) if mismatches > *score => {}
                Some((score, _)) if mismatches == *score => tied = true,
                _ => {
                    best = Some((mismatches, mv));
                    tied = false;
                }
            }
        }

        match best {
            Some((0, mv)) => Some(mv),
            Some((score, mv)) if !tied => {
                log::debug!("{mv} leaves {score} changed square(s) unexplained");
                Some(mv)
            }
            Some((score, _)) => {
                log::debug!("several moves leave {score} changed square(s) unexplained");
                None
            }
            None => None,
        }
    }
}

fn squares_list(squares: &[Square]) -> String {
    squares
        .iter()
        .map(Square::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
