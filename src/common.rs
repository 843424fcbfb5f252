//! Common types for Battleship: coordinates, attack outcomes and model errors.

use core::fmt;

use crate::config::GRID_SIZE;

/// A board coordinate, 0-indexed.
///
/// Signed so that values arriving from the wire can be carried to the
/// resolver and rejected there as out of range instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    pub row: i32,
    pub col: i32,
}

impl Coord {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Build from 1-indexed wire/user values.
    pub fn from_wire(row: i32, col: i32) -> Self {
        Self {
            row: row.saturating_sub(1),
            col: col.saturating_sub(1),
        }
    }

    /// 1-indexed (row, col) for the wire/user boundary.
    pub fn to_wire(self) -> (i32, i32) {
        (self.row.saturating_add(1), self.col.saturating_add(1))
    }

    pub fn in_bounds(self) -> bool {
        (0..GRID_SIZE as i32).contains(&self.row) && (0..GRID_SIZE as i32).contains(&self.col)
    }

    /// Array indices, or `None` when outside the grid.
    pub fn index(self) -> Option<(usize, usize)> {
        if self.in_bounds() {
            Some((self.row as usize, self.col as usize))
        } else {
            None
        }
    }

    /// In-bounds axis neighbours in the order up, down, left, right.
    pub fn neighbors(self) -> impl Iterator<Item = Coord> {
        [(-1, 0), (1, 0), (0, -1), (0, 1)]
            .into_iter()
            .map(move |(dr, dc)| Coord::new(self.row + dr, self.col + dc))
            .filter(|c| c.in_bounds())
    }
}

impl From<(usize, usize)> for Coord {
    fn from((row, col): (usize, usize)) -> Self {
        Coord::new(row as i32, col as i32)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (r, c) = self.to_wire();
        write!(f, "({} {})", r, c)
    }
}

/// Result of resolving one attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    Miss,
    Hit,
    /// The attack sank a ship.
    Sunk,
    AlreadyShot,
    OutOfRange,
    /// Sinking attack that also ended the game. Never produced by the
    /// resolver; the caller upgrades `Sunk` after its win check.
    GameWon,
}

impl AttackOutcome {
    /// Attacks that did not touch the board and must be retried.
    pub fn is_rejection(self) -> bool {
        matches!(self, AttackOutcome::AlreadyShot | AttackOutcome::OutOfRange)
    }

    /// Attacks that landed on a ship.
    pub fn is_hit(self) -> bool {
        matches!(
            self,
            AttackOutcome::Hit | AttackOutcome::Sunk | AttackOutcome::GameWon
        )
    }

    /// Outcome text as it appears on the wire.
    pub fn as_wire(self) -> &'static str {
        match self {
            AttackOutcome::Miss => "Miss",
            AttackOutcome::Hit => "Hit",
            AttackOutcome::Sunk => "Hit, sunk!",
            AttackOutcome::AlreadyShot => "You already shot there",
            AttackOutcome::OutOfRange => "Invalid Coordinates",
            AttackOutcome::GameWon => "Hit, sunk! You won!",
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        let outcome = match text.trim() {
            "Miss" => AttackOutcome::Miss,
            "Hit" => AttackOutcome::Hit,
            "Hit, sunk!" => AttackOutcome::Sunk,
            "You already shot there" => AttackOutcome::AlreadyShot,
            "Invalid Coordinates" => AttackOutcome::OutOfRange,
            "Hit, sunk! You won!" => AttackOutcome::GameWon,
            _ => return None,
        };
        Some(outcome)
    }
}

impl fmt::Display for AttackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Errors returned by ship placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    /// Ship index is not in the catalogue.
    InvalidIndex,
    /// Ship with this index is already on the grid.
    AlreadyPlaced,
    /// Some ship cell would fall outside the grid.
    OutOfBounds,
    /// Ship would cover a cell owned by another ship.
    Overlaps,
    /// Random placement found no legal spot within the retry cap.
    PlacementExhausted,
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementError::InvalidIndex => write!(f, "Ship index is out of range"),
            PlacementError::AlreadyPlaced => write!(f, "Ship is already placed on the grid"),
            PlacementError::OutOfBounds => write!(f, "Ship placement is out of bounds"),
            PlacementError::Overlaps => write!(f, "Ship placement overlaps with another ship"),
            PlacementError::PlacementExhausted => {
                write!(f, "No valid ship placement found within the retry limit")
            }
        }
    }
}

impl std::error::Error for PlacementError {}

/// Errors returned when decoding a grid transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridDecodeError {
    /// Buffer is not exactly one byte per cell.
    WrongLength { expected: usize, actual: usize },
    /// Byte is neither water, a ship id nor the legacy ship marker.
    InvalidByte { index: usize, byte: u8 },
    /// Buffer mixes explicit ship ids with legacy markers.
    MixedEncoding,
    /// Cells carrying one ship id are not a straight contiguous run.
    MalformedShip { id: usize },
    /// Buffer holds no ship cells at all.
    EmptyFleet,
}

impl fmt::Display for GridDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridDecodeError::WrongLength { expected, actual } => {
                write!(f, "Grid transfer has {} bytes, expected {}", actual, expected)
            }
            GridDecodeError::InvalidByte { index, byte } => {
                write!(f, "Invalid grid byte 0x{:02x} at offset {}", byte, index)
            }
            GridDecodeError::MixedEncoding => {
                write!(f, "Grid transfer mixes ship ids with legacy ship markers")
            }
            GridDecodeError::MalformedShip { id } => {
                write!(f, "Cells of ship {} do not form a straight line", id)
            }
            GridDecodeError::EmptyFleet => write!(f, "Grid transfer contains no ships"),
        }
    }
}

impl std::error::Error for GridDecodeError {}
