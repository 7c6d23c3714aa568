use std::fmt;
use std::str::FromStr;

use shakmaty::{Bitboard, Color, File, Position, Rank, Square};
use thiserror::Error;

/// Occupancy of a single square as reported by the piece classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occupancy {
    Empty,
    White,
    Black,
}

impl Occupancy {
    #[inline]
    pub const fn from_color(color: Option<Color>) -> Self {
        match color {
            None => Occupancy::Empty,
            Some(Color::White) => Occupancy::White,
            Some(Color::Black) => Occupancy::Black,
        }
    }

    #[inline]
    pub const fn color(self) -> Option<Color> {
        match self {
            Occupancy::Empty => None,
            Occupancy::White => Some(Color::White),
            Occupancy::Black => Some(Color::Black),
        }
    }

    /// Grid symbol used by the text codec.
    pub const fn symbol(self) -> char {
        match self {
            Occupancy::Empty => '.',
            Occupancy::White => 'W',
            Occupancy::Black => 'B',
        }
    }

    fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '.' | '0' => Some(Occupancy::Empty),
            'W' | 'w' | '1' => Some(Occupancy::White),
            'B' | 'b' | '2' => Some(Occupancy::Black),
            _ => None,
        }
    }
}

/// Square at a grid cell. Row 0 is rank 8, column 0 is file a.
#[inline]
pub fn cell_square(row: u32, col: u32) -> Square {
    debug_assert!(row < 8 && col < 8);
    Square::from_coords(File::new(col), Rank::new(7 - row))
}

/// Grid cell `(row, col)` of a square, inverse of [`cell_square`].
#[inline]
pub fn square_cell(square: Square) -> (u32, u32) {
    (7 - square.rank() as u32, square.file() as u32)
}

/// All 64 squares in grid scan order: a8, b8, ..., h8, a7, ..., h1.
pub fn row_major_squares() -> impl Iterator<Item = Square> {
    (0..8).flat_map(|row| (0..8).map(move |col| cell_square(row, col)))
}

/// Error when white and black occupancy claim the same square.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("square {0} is marked both white and black")]
pub struct OverlapError(pub Square);

/// Error when decoding a text grid.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GridParseError {
    #[error("expected 8 rows, found {0}")]
    RowCount(usize),
    #[error("row {row} has {len} cells, expected 8")]
    RowLength { row: usize, len: usize },
    #[error("row {row} contains unknown symbol '{symbol}'")]
    Symbol { row: usize, symbol: char },
}

/// A single 8×8 tri-state snapshot of the physical board.
///
/// Produced fresh on every detection cycle and never mutated by the
/// controller afterwards. Internally stored as one bitboard per color,
/// which keeps diffing against a [`shakmaty`] position cheap.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct BoardObservation {
    white: Bitboard,
    black: Bitboard,
}

impl BoardObservation {
    /// An observation with no pieces at all.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            white: Bitboard::EMPTY,
            black: Bitboard::EMPTY,
        }
    }

    /// Build from per-color bitboards, rejecting overlapping squares.
    pub fn from_bitboards(white: Bitboard, black: Bitboard) -> Result<Self, OverlapError> {
        match (white & black).first() {
            Some(square) => Err(OverlapError(square)),
            None => Ok(Self { white, black }),
        }
    }

    /// The occupancy a correct classifier would report for `position`.
    pub fn from_position(position: &impl Position) -> Self {
        let board = position.board();
        Self {
            white: board.by_color(Color::White),
            black: board.by_color(Color::Black),
        }
    }

    #[inline]
    pub fn by_color(&self, color: Color) -> Bitboard {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.white | self.black
    }

    pub fn at(&self, square: Square) -> Occupancy {
        if self.white.contains(square) {
            Occupancy::White
        } else if self.black.contains(square) {
            Occupancy::Black
        } else {
            Occupancy::Empty
        }
    }

    #[inline]
    pub fn at_cell(&self, row: u32, col: u32) -> Occupancy {
        self.at(cell_square(row, col))
    }

    /// Return a copy with `square` set to `occupancy`.
    pub fn with(mut self, square: Square, occupancy: Occupancy) -> Self {
        self.white.discard(square);
        self.black.discard(square);
        match occupancy {
            Occupancy::Empty => {}
            Occupancy::White => self.white.add(square),
            Occupancy::Black => self.black.add(square),
        }
        self
    }
}

impl fmt::Debug for BoardObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardObservation")
            .field("white", &format_args!("{:#018X}", self.white))
            .field("black", &format_args!("{:#018X}", self.black))
            .finish()
    }
}

/// Eight lines of eight symbols, rank 8 first (`.` empty, `W` white, `B` black).
impl fmt::Display for BoardObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..8 {
            for col in 0..8 {
                write!(f, "{}", self.at_cell(row, col).symbol())?;
            }
            if row < 7 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Parse the text grid an external classifier writes.
///
/// Blank lines and lines starting with `#` are skipped, whitespace inside a
/// row is ignored, and the numeric classifier labels `0`/`1`/`2` are accepted
/// alongside `.`/`W`/`B`.
impl FromStr for BoardObservation {
    type Err = GridParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows: Vec<Vec<char>> = s
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.chars().filter(|c| !c.is_whitespace()).collect())
            .collect();

        if rows.len() != 8 {
            return Err(GridParseError::RowCount(rows.len()));
        }

        let mut observation = Self::empty();
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != 8 {
                return Err(GridParseError::RowLength {
                    row,
                    len: cells.len(),
                });
            }
            for (col, &symbol) in cells.iter().enumerate() {
                let occupancy = Occupancy::from_symbol(symbol)
                    .ok_or(GridParseError::Symbol { row, symbol })?;
                observation = observation.with(cell_square(row as u32, col as u32), occupancy);
            }
        }
        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::Chess;
    use test_case::test_case;

    const START_GRID: &str = "\
        BBBBBBBB\n\
        BBBBBBBB\n\
        ........\n\
        ........\n\
        ........\n\
        ........\n\
        WWWWWWWW\n\
        WWWWWWWW";

    #[test]
    fn start_grid_matches_start_position() {
        let parsed: BoardObservation = START_GRID.parse().expect("valid grid");
        assert_eq!(parsed, BoardObservation::from_position(&Chess::default()));
    }

    #[test_case(0, 0, Square::A8)]
    #[test_case(7, 7, Square::H1)]
    #[test_case(7, 4, Square::E1)]
    #[test_case(3, 3, Square::D5)]
    fn cell_convention(row: u32, col: u32, square: Square) {
        assert_eq!(cell_square(row, col), square);
        assert_eq!(square_cell(square), (row, col));
    }

    #[test]
    fn row_major_starts_on_rank_eight() {
        let order: Vec<Square> = row_major_squares().collect();
        assert_eq!(order.len(), 64);
        assert_eq!(order[0], Square::A8);
        assert_eq!(order[8], Square::A7);
        assert_eq!(order[63], Square::H1);
    }

    #[test]
    fn numeric_labels_and_comments_are_accepted() {
        let grid = "# classifier output\n\
            2 2 2 2 2 2 2 2\n\
            22222222\n\
            00000000\n\
            \n\
            00000000\n\
            00000000\n\
            00000000\n\
            11111111\n\
            11111111\n";
        let parsed: BoardObservation = grid.parse().expect("valid grid");
        assert_eq!(parsed, BoardObservation::from_position(&Chess::default()));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let obs = BoardObservation::from_position(&Chess::default())
            .with(Square::E2, Occupancy::Empty)
            .with(Square::E4, Occupancy::White);
        let text = obs.to_string();
        assert_eq!(text.parse::<BoardObservation>(), Ok(obs));
        assert_eq!(text.lines().nth(4), Some("....W..."));
    }

    #[test]
    fn wrong_row_count_is_rejected() {
        let result = "........\n........".parse::<BoardObservation>();
        assert_eq!(result, Err(GridParseError::RowCount(2)));
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        let grid = START_GRID.replacen('.', "x", 1);
        let result = grid.parse::<BoardObservation>();
        assert_eq!(
            result,
            Err(GridParseError::Symbol {
                row: 2,
                symbol: 'x'
            })
        );
    }

    #[test]
    fn overlapping_bitboards_are_rejected() {
        let white = Bitboard::from(Square::E4);
        let black = Bitboard::from(Square::E4);
        assert_eq!(
            BoardObservation::from_bitboards(white, black),
            Err(OverlapError(Square::E4))
        );
    }

    #[test]
    fn with_replaces_previous_occupancy() {
        let obs = BoardObservation::empty()
            .with(Square::D5, Occupancy::Black)
            .with(Square::D5, Occupancy::White);
        assert_eq!(obs.at(Square::D5), Occupancy::White);
        assert!(obs.by_color(Color::Black).is_empty());
    }
}
