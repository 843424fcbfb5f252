//! Ship definitions and their placement footprint.

use core::fmt;

use crate::common::{Coord, PlacementError};
use crate::config::GRID_SIZE;

/// Orientation of a ship on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Column increases along the ship.
    Horizontal,
    /// Row increases along the ship.
    Vertical,
}

impl Orientation {
    /// (row, col) step from one ship cell to the next.
    pub fn step(self) -> (usize, usize) {
        match self {
            Orientation::Horizontal => (0, 1),
            Orientation::Vertical => (1, 0),
        }
    }
}

/// Type of ship: name and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipType {
    name: &'static str,
    length: usize,
}

impl ShipType {
    /// Create a new ship type.
    pub const fn new(name: &'static str, length: usize) -> Self {
        Self { name, length }
    }

    /// Ship's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Ship's length.
    pub fn length(&self) -> usize {
        self.length
    }
}

/// A ship placed on the grid. Cells are fixed at construction; only the
/// hit counter changes afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Ship {
    ship_type: ShipType,
    orientation: Orientation,
    cells: Vec<(usize, usize)>,
    hits: usize,
}

impl Ship {
    /// Lay out a ship from `origin` along `orientation`.
    pub fn new(
        ship_type: ShipType,
        origin: Coord,
        orientation: Orientation,
    ) -> Result<Self, PlacementError> {
        let (row, col) = origin.index().ok_or(PlacementError::OutOfBounds)?;
        let len = ship_type.length();
        let end = match orientation {
            Orientation::Horizontal => col + len,
            Orientation::Vertical => row + len,
        };
        if len == 0 || end > GRID_SIZE {
            return Err(PlacementError::OutOfBounds);
        }
        let (dr, dc) = orientation.step();
        let cells = (0..len).map(|i| (row + i * dr, col + i * dc)).collect();
        Ok(Ship {
            ship_type,
            orientation,
            cells,
            hits: 0,
        })
    }

    pub fn ship_type(&self) -> ShipType {
        self.ship_type
    }

    pub fn name(&self) -> &'static str {
        self.ship_type.name()
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Absolute cells covered by the ship, from origin outwards.
    pub fn cells(&self) -> &[(usize, usize)] {
        &self.cells
    }

    pub fn origin(&self) -> (usize, usize) {
        self.cells[0]
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn occupies(&self, row: usize, col: usize) -> bool {
        self.cells.contains(&(row, col))
    }

    /// Count one more hit. Saturates at the ship size.
    pub(crate) fn register_hit(&mut self) {
        if self.hits < self.size() {
            self.hits += 1;
        }
    }

    /// Check if the ship is sunk (all segments hit).
    pub fn is_sunk(&self) -> bool {
        self.hits == self.size()
    }
}

impl fmt::Debug for Ship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (r, c) = self.origin();
        write!(
            f,
            "Ship {{ name: \"{}\", origin: ({}, {}), orientation: {:?}, hits: {}/{} }}",
            self.name(),
            r,
            c,
            self.orientation,
            self.hits,
            self.size(),
        )
    }
}
