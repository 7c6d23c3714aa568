use chessbot::game_logic::{Ambiguity, BoardDiffResolver, GameState, MoveClass, Resolution};
use chessbot::observation::Occupancy;
use test_case::test_case;

/// Replay `moves` and check every one is recovered from before/after
/// snapshots, and that a half-made move (piece still in hand) is not.
#[test_case(
    "e4 e5 Nf3 Nc6 Bb5 a6 Bxc6 dxc6 O-O f6 d4 exd4 Nxd4 c5 Nb3 Qxd1 Rxd1";
    "exchange ruy lopez"
)]
#[test_case(
    "e4 d5 e5 f5 exf6 Qd6 fxg7 Bd7 gxh8=Q Nc6 Qxg8 O-O-O";
    "en passant, capturing promotion and long castle"
)]
fn game_is_replayed_from_snapshots(moves: &str) {
    let resolver = BoardDiffResolver::default();
    let mut game = GameState::new();

    for san in moves.split_whitespace() {
        let expected = game
            .parse_move(san)
            .unwrap_or_else(|| panic!("{san} is legal"));
        let before = game.occupancy();
        let after = game.occupancy_after(&expected).expect("legal move");

        let in_hand = before.with(expected.from, Occupancy::Empty);
        assert_eq!(
            resolver.resolve(&game, &before, &in_hand),
            Resolution::Ambiguous(Ambiguity::SingleSquare(expected.from)),
            "{san} half made"
        );
        assert_eq!(
            resolver.resolve(&game, &before, &after),
            Resolution::Move(expected),
            "{san}"
        );

        game.apply(&expected).expect("legal move");
    }
}

#[test]
fn move_classes_along_the_way() {
    let resolver = BoardDiffResolver::default();
    let mut game = GameState::new();
    let mut classes = Vec::new();

    for san in "e4 d5 e5 f5 exf6 Qd6 fxg7 Bd7 gxh8=Q Nc6 Qxg8 O-O-O".split_whitespace() {
        let mv = game.parse_move(san).expect("legal");
        let after = game.occupancy_after(&mv).expect("legal");
        let Resolution::Move(found) = resolver.resolve(&game, &game.occupancy(), &after) else {
            panic!("{san} not resolved");
        };
        classes.push(found.class);
        game.apply(&found).expect("legal");
    }

    assert!(classes.contains(&MoveClass::EnPassant));
    assert!(classes.contains(&MoveClass::Promotion));
    assert_eq!(classes.last(), Some(&MoveClass::Castle));
}
