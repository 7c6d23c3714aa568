//! Turns a square pair into a rules-legal move.

use shakmaty::{Color, Rank, Role, Square};

use super::{GameState, ResolvedMove};

/// Promotion pieces tried in order when a pawn reaches its last rank.
pub const PROMOTION_ORDER: [Role; 4] = [Role::Queen, Role::Rook, Role::Bishop, Role::Knight];

/// Whether the piece on `from` is a pawn stepping onto its last rank.
fn is_promotion_square(game: &GameState, from: Square, to: Square) -> bool {
    match game.piece_at(from) {
        Some(piece) if piece.role == Role::Pawn => match piece.color {
            Color::White => to.rank() == Rank::Eighth,
            Color::Black => to.rank() == Rank::First,
        },
        _ => false,
    }
}

/// Map an ordered `(from, to)` pair to a legal move.
///
/// Castling is accepted king-wise (`e1g1`). A pawn reaching its last rank is
/// tried as queen, rook, bishop and knight in that order.
pub fn map_pair(game: &GameState, from: Square, to: Square) -> Option<ResolvedMove> {
    if from == to {
        return None;
    }

    if is_promotion_square(game, from, to) {
        return PROMOTION_ORDER
            .iter()
            .find_map(|&role| game.classify(from, to, Some(role)));
    }

    let resolved = game.classify(from, to, None);
    if resolved.is_none() {
        log::trace!("{from}{to} is not legal");
    }
    resolved
}

/// Map a pair whose direction is unknown: `(a, b)` first, then `(b, a)`.
pub fn map_unordered(game: &GameState, a: Square, b: Square) -> Option<ResolvedMove> {
    map_pair(game, a, b).or_else(|| map_pair(game, b, a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_logic::MoveClass;
    use test_case::test_case;

    #[test_case(Square::E2, Square::E4, "e2e4"; "pawn double push")]
    #[test_case(Square::G1, Square::F3, "g1f3"; "knight")]
    fn legal_pairs_map(from: Square, to: Square, uci: &str) {
        let game = GameState::new();
        let mv = map_pair(&game, from, to).expect("legal pair");
        assert_eq!(mv.to_string(), uci);
    }

    #[test_case(Square::E2, Square::E5; "too far")]
    #[test_case(Square::E4, Square::E2; "empty origin")]
    #[test_case(Square::E2, Square::E2; "same square")]
    #[test_case(Square::E7, Square::E5; "wrong side")]
    fn illegal_pairs_are_rejected(from: Square, to: Square) {
        assert_eq!(map_pair(&GameState::new(), from, to), None);
    }

    #[test]
    fn unordered_tries_reverse() {
        let game = GameState::new();
        let mv = map_unordered(&game, Square::E4, Square::E2).expect("legal in reverse");
        assert_eq!(mv.from, Square::E2);
        assert_eq!(mv.to, Square::E4);
    }

    #[test]
    fn promotion_prefers_queen() {
        let game = GameState::from_fen("8/4P3/8/8/8/8/k7/4K3 w - - 0 1").expect("valid fen");
        let mv = map_pair(&game, Square::E7, Square::E8).expect("legal promotion");
        assert_eq!(mv.promotion, Some(Role::Queen));
        assert_eq!(mv.class, MoveClass::Promotion);
        assert_eq!(mv.to_string(), "e7e8q");
    }

    #[test]
    fn black_promotion_on_first_rank() {
        let game = GameState::from_fen("4k3/8/8/8/8/8/3p4/K7 b - - 0 1").expect("valid fen");
        let mv = map_pair(&game, Square::D2, Square::D1).expect("legal promotion");
        assert_eq!(mv.to_string(), "d2d1q");
    }

    #[test]
    fn castle_is_accepted_king_wise() {
        let game = GameState::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQK2R w KQkq - 0 1")
            .expect("valid fen");
        let mv = map_pair(&game, Square::E1, Square::G1).expect("legal castle");
        assert_eq!(mv.class, MoveClass::Castle);
    }
}
