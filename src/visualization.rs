//! Operator-facing board diagrams.

use std::io::{self, Write};

use shakmaty::{Color, File, Rank, Square};

use crate::game_logic::GameState;
use crate::observation::{BoardObservation, Occupancy};

/// Squares where the camera and the game disagree about occupancy.
pub fn discrepancies(observed: &BoardObservation, game: &GameState) -> Vec<Square> {
    let expected = game.occupancy();
    let differing = (observed.by_color(Color::White) ^ expected.by_color(Color::White))
        | (observed.by_color(Color::Black) ^ expected.by_color(Color::Black));
    differing.into_iter().collect()
}

/// Camera occupancy and game position side by side.
///
/// Mismatching squares are bracketed on both boards.
pub fn render_comparison(
    w: &mut impl Write,
    observed: &BoardObservation,
    game: &GameState,
) -> io::Result<()> {
    let mismatched = discrepancies(observed, game);

    writeln!(w, "      Camera                      Game")?;
    for rank in Rank::ALL.iter().rev() {
        write!(w, " {} ", rank.char())?;
        for file in File::ALL {
            let square = Square::from_coords(file, *rank);
            let symbol = match observed.at(square) {
                Occupancy::Empty => '·',
                occupied => occupied.symbol(),
            };
            write!(w, "{}", cell(symbol, mismatched.contains(&square)))?;
        }
        write!(w, "    {} ", rank.char())?;
        for file in File::ALL {
            let square = Square::from_coords(file, *rank);
            let symbol = game.piece_at(square).map_or('·', |p| p.char());
            write!(w, "{}", cell(symbol, mismatched.contains(&square)))?;
        }
        writeln!(w)?;
    }
    writeln!(w, "    a  b  c  d  e  f  g  h       a  b  c  d  e  f  g  h")?;

    if !mismatched.is_empty() {
        let list: Vec<String> = mismatched.iter().map(Square::to_string).collect();
        writeln!(w, "Mismatch on: {}", list.join(" "))?;
    }
    Ok(())
}

/// Game position only, for when no observation is at hand.
pub fn render_position(w: &mut impl Write, game: &GameState) -> io::Result<()> {
    for rank in Rank::ALL.iter().rev() {
        write!(w, " {} ", rank.char())?;
        for file in File::ALL {
            let square = Square::from_coords(file, *rank);
            let symbol = game.piece_at(square).map_or('·', |p| p.char());
            write!(w, "{}", cell(symbol, false))?;
        }
        writeln!(w)?;
    }
    writeln!(w, "    a  b  c  d  e  f  g  h")
}

fn cell(symbol: char, marked: bool) -> String {
    if marked {
        format!("[{symbol}]")
    } else {
        format!(" {symbol} ")
    }
}

/// Render into a string, for logging.
pub fn render_to_string<F>(render: F) -> String
where
    F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
{
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = render(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_boards_have_no_markers() {
        let game = GameState::new();
        let output = render_to_string(|w| render_comparison(w, &game.occupancy(), &game));

        for rank in '1'..='8' {
            assert!(
                output.contains(&format!(" {rank} ")),
                "missing rank {rank}:\n{output}"
            );
        }
        assert!(!output.contains('['));
        assert!(!output.contains("Mismatch"));
        assert!(output.contains(" R  N  B  Q  K  B  N  R "));
        assert!(output.contains(" W  W  W  W  W  W  W  W "));
    }

    #[test]
    fn discrepancies_are_bracketed_and_listed() {
        let game = GameState::new();
        let observed = game
            .occupancy()
            .with(Square::E2, Occupancy::Empty)
            .with(Square::E4, Occupancy::White);

        assert_eq!(discrepancies(&observed, &game), vec![Square::E2, Square::E4]);

        let output = render_to_string(|w| render_comparison(w, &observed, &game));
        assert!(output.contains("[W]"), "{output}");
        assert!(output.contains("[P]"), "{output}");
        assert!(output.contains("Mismatch on: e2 e4"), "{output}");
    }

    #[test]
    fn color_swap_is_a_discrepancy() {
        let game = GameState::new();
        let observed = game.occupancy().with(Square::E2, Occupancy::Black);
        assert_eq!(discrepancies(&observed, &game), vec![Square::E2]);
    }

    #[test]
    fn position_diagram_has_file_labels() {
        let output = render_to_string(|w| render_position(w, &GameState::new()));
        assert!(output.ends_with("    a  b  c  d  e  f  g  h\n"));
        assert_eq!(output.lines().count(), 9);
    }
}
