//! The 10×10 cell grid and the redacted view an opponent is allowed to see.

use core::fmt;

use crate::common::{Coord, GridDecodeError};
use crate::config::GRID_SIZE;

/// Shot state of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellState {
    #[default]
    Unshot,
    Miss,
    Hit,
    Sunk,
}

impl CellState {
    pub fn is_attacked(self) -> bool {
        self != CellState::Unshot
    }

    /// Token used in board dumps.
    pub fn token(self) -> char {
        match self {
            CellState::Unshot => '~',
            CellState::Miss => 'M',
            CellState::Hit => 'H',
            CellState::Sunk => 'X',
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "~" => Some(CellState::Unshot),
            "M" => Some(CellState::Miss),
            "H" => Some(CellState::Hit),
            "X" => Some(CellState::Sunk),
            _ => None,
        }
    }
}

/// One grid cell. A cell without a ship is only ever `Unshot` or `Miss`; a
/// cell with a ship only `Unshot`, `Hit` or `Sunk`. `Board` maintains this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    /// Index into the owning board's ship list.
    pub ship: Option<usize>,
    pub state: CellState,
}

/// Row-major 10×10 grid owned by one player.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    cells: [[Cell; GRID_SIZE]; GRID_SIZE],
}

impl Grid {
    pub fn new() -> Self {
        Self {
            cells: [[Cell::default(); GRID_SIZE]; GRID_SIZE],
        }
    }

    /// Cell at in-bounds indices.
    pub fn get(&self, row: usize, col: usize) -> Cell {
        self.cells[row][col]
    }

    pub(crate) fn get_mut(&mut self, row: usize, col: usize) -> &mut Cell {
        &mut self.cells[row][col]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell; GRID_SIZE]> {
        self.cells.iter()
    }

    /// What the opponent may see: shot states only, ship identity hidden.
    pub fn redacted(&self) -> OpponentView {
        let mut view = OpponentView::new();
        for (r, row) in self.cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                view.states[r][c] = cell.state;
            }
        }
        view
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.iter() {
            for cell in row.iter() {
                let ch = match (cell.ship, cell.state) {
                    (Some(id), CellState::Unshot) => char::from_digit(id as u32 % 10, 10).unwrap_or('S'),
                    (_, state) => state.token(),
                };
                write!(f, "{} ", ch)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Redacted picture of the opponent's grid as one player knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpponentView {
    states: [[CellState; GRID_SIZE]; GRID_SIZE],
}

impl OpponentView {
    pub fn new() -> Self {
        Self {
            states: [[CellState::Unshot; GRID_SIZE]; GRID_SIZE],
        }
    }

    pub fn get(&self, coord: Coord) -> Option<CellState> {
        coord.index().map(|(r, c)| self.states[r][c])
    }

    /// Record a state at `coord`; out-of-range coordinates are ignored.
    pub fn set(&mut self, coord: Coord, state: CellState) {
        if let Some((r, c)) = coord.index() {
            self.states[r][c] = state;
        }
    }

    /// True for cells already shot at. Out-of-range cells count as attacked
    /// since they can never be attacked successfully.
    pub fn is_attacked(&self, coord: Coord) -> bool {
        self.get(coord).is_none_or(CellState::is_attacked)
    }

    /// Board dump lines: one per row, space-separated tokens.
    pub fn to_rows(&self) -> Vec<String> {
        self.states
            .iter()
            .map(|row| {
                row.iter()
                    .map(|s| s.token().to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }

    /// Parse the lines produced by [`OpponentView::to_rows`].
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, GridDecodeError> {
        let mut view = OpponentView::new();
        let mut seen = 0usize;
        for (r, line) in rows.iter().enumerate() {
            for (c, token) in line.as_ref().split_whitespace().enumerate() {
                let index = r * GRID_SIZE + c;
                let state = CellState::from_token(token).ok_or(GridDecodeError::InvalidByte {
                    index,
                    byte: token.as_bytes()[0],
                })?;
                if r < GRID_SIZE && c < GRID_SIZE {
                    view.states[r][c] = state;
                }
                seen += 1;
            }
        }
        if seen != GRID_SIZE * GRID_SIZE || rows.len() != GRID_SIZE {
            return Err(GridDecodeError::WrongLength {
                expected: GRID_SIZE * GRID_SIZE,
                actual: seen,
            });
        }
        Ok(view)
    }
}

impl Default for OpponentView {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_rows_parse_back() {
        let mut view = OpponentView::new();
        view.set(Coord::new(0, 0), CellState::Hit);
        view.set(Coord::new(9, 9), CellState::Miss);
        view.set(Coord::new(4, 2), CellState::Sunk);
        let rows = view.to_rows();
        assert_eq!(rows.len(), GRID_SIZE);
        assert!(rows[0].starts_with("H ~"));
        assert_eq!(OpponentView::from_rows(&rows).unwrap(), view);
    }

    #[test]
    fn short_dump_is_rejected() {
        let rows = vec!["~ ~ ~".to_string()];
        assert!(matches!(
            OpponentView::from_rows(&rows),
            Err(GridDecodeError::WrongLength { actual: 3, .. })
        ));
    }

    #[test]
    fn out_of_range_counts_as_attacked() {
        let view = OpponentView::new();
        assert!(view.is_attacked(Coord::new(10, 0)));
        assert!(!view.is_attacked(Coord::new(9, 0)));
    }
}
