//! A player's board: grid plus fleet. Placement, attack resolution and the
//! grid transfer encoding all live here.

use core::fmt;
use rand::Rng;

use crate::common::{AttackOutcome, Coord, GridDecodeError, PlacementError};
use crate::config::{
    GRID_SIZE, GRID_WIRE_LEN, MAX_PLACEMENT_ATTEMPTS, NUM_SHIPS, RECOVERED_SHIP_NAME, SHIPS,
    WIRE_LEGACY_SHIP, WIRE_WATER,
};
use crate::grid::{CellState, Grid};
use crate::ship::{Orientation, Ship, ShipType};

#[derive(Clone, PartialEq, Eq)]
pub struct Board {
    grid: Grid,
    ships: Vec<Ship>,
}

impl Board {
    /// Create an empty board (no ships placed).
    pub fn new() -> Self {
        Board {
            grid: Grid::new(),
            ships: Vec::with_capacity(NUM_SHIPS),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    /// Validate and place a ship, returning its index on this board.
    pub fn place_ship(
        &mut self,
        ship_type: ShipType,
        origin: Coord,
        orientation: Orientation,
    ) -> Result<usize, PlacementError> {
        let ship = Ship::new(ship_type, origin, orientation)?;
        if ship
            .cells()
            .iter()
            .any(|&(r, c)| self.grid.get(r, c).ship.is_some())
        {
            return Err(PlacementError::Overlaps);
        }
        let id = self.ships.len();
        for &(r, c) in ship.cells() {
            self.grid.get_mut(r, c).ship = Some(id);
        }
        self.ships.push(ship);
        Ok(id)
    }

    /// Place catalogue ship `ship_index` (see [`SHIPS`]).
    pub fn place(
        &mut self,
        ship_index: usize,
        origin: Coord,
        orientation: Orientation,
    ) -> Result<usize, PlacementError> {
        let def = *SHIPS.get(ship_index).ok_or(PlacementError::InvalidIndex)?;
        if self.is_placed(ship_index) {
            return Err(PlacementError::AlreadyPlaced);
        }
        self.place_ship(def, origin, orientation)
    }

    /// Whether catalogue ship `ship_index` is on the board.
    pub fn is_placed(&self, ship_index: usize) -> bool {
        SHIPS
            .get(ship_index)
            .is_some_and(|def| self.ships.iter().any(|s| s.ship_type() == *def))
    }

    /// True once every catalogue ship is placed.
    pub fn fleet_complete(&self) -> bool {
        (0..NUM_SHIPS).all(|i| self.is_placed(i))
    }

    /// Sample a legal (origin, orientation) for `ship_type` without placing it.
    pub fn random_placement<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        ship_type: ShipType,
    ) -> Result<(Coord, Orientation), PlacementError> {
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let orientation = if rng.random() {
                Orientation::Horizontal
            } else {
                Orientation::Vertical
            };
            let origin = Coord::new(
                rng.random_range(0..GRID_SIZE as i32),
                rng.random_range(0..GRID_SIZE as i32),
            );
            let Ok(ship) = Ship::new(ship_type, origin, orientation) else {
                continue;
            };
            if ship
                .cells()
                .iter()
                .all(|&(r, c)| self.grid.get(r, c).ship.is_none())
            {
                return Ok((origin, orientation));
            }
        }
        Err(PlacementError::PlacementExhausted)
    }

    /// Place every catalogue ship not yet on the board at random.
    pub fn place_remaining_randomly<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<(), PlacementError> {
        for i in 0..NUM_SHIPS {
            if self.is_placed(i) {
                continue;
            }
            let (origin, orientation) = self.random_placement(rng, SHIPS[i])?;
            self.place(i, origin, orientation)?;
        }
        Ok(())
    }

    /// Convenience constructor for a fully, randomly placed fleet.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Result<Self, PlacementError> {
        let mut board = Board::new();
        board.place_remaining_randomly(rng)?;
        Ok(board)
    }

    /// Resolve an attack at `coord`, mutating the board on a valid shot.
    pub fn resolve_attack(&mut self, coord: Coord) -> AttackOutcome {
        let Some((row, col)) = coord.index() else {
            return AttackOutcome::OutOfRange;
        };
        let cell = self.grid.get(row, col);
        if cell.state.is_attacked() {
            return AttackOutcome::AlreadyShot;
        }
        let Some(id) = cell.ship else {
            self.grid.get_mut(row, col).state = CellState::Miss;
            return AttackOutcome::Miss;
        };
        self.grid.get_mut(row, col).state = CellState::Hit;
        let ship = &mut self.ships[id];
        ship.register_hit();
        if !ship.is_sunk() {
            return AttackOutcome::Hit;
        }
        for &(r, c) in ship.cells() {
            self.grid.get_mut(r, c).state = CellState::Sunk;
        }
        AttackOutcome::Sunk
    }

    /// Returns `true` when every ship's hit count equals its size.
    pub fn all_sunk(&self) -> bool {
        self.ships.iter().all(Ship::is_sunk)
    }

    pub fn sunk_count(&self) -> usize {
        self.ships.iter().filter(|s| s.is_sunk()).count()
    }

    /// Encode for grid transfer: one byte per cell, `~` for water and the
    /// 1-based ship id as an ASCII digit for ship cells.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(GRID_WIRE_LEN);
        for row in self.grid.rows() {
            for cell in row.iter() {
                buf.push(match cell.ship {
                    Some(id) => b'1' + id as u8,
                    None => WIRE_WATER,
                });
            }
        }
        buf
    }

    /// Encode for legacy peers that only understand `S`/`~`.
    pub fn to_legacy_wire(&self) -> Vec<u8> {
        self.to_wire()
            .into_iter()
            .map(|b| if b == WIRE_WATER { b } else { WIRE_LEGACY_SHIP })
            .collect()
    }

    /// Decode a grid transfer into a fresh, unshot board.
    ///
    /// Ship ids give each ship directly. A legacy buffer of bare `S` markers
    /// is split into ships by walking straight runs: a run goes right when
    /// the next cell to the right is also a ship, otherwise down.
    pub fn from_wire(buf: &[u8]) -> Result<Self, GridDecodeError> {
        if buf.len() != GRID_WIRE_LEN {
            return Err(GridDecodeError::WrongLength {
                expected: GRID_WIRE_LEN,
                actual: buf.len(),
            });
        }
        let mut has_ids = false;
        let mut has_legacy = false;
        for (index, &byte) in buf.iter().enumerate() {
            match byte {
                WIRE_WATER => {}
                WIRE_LEGACY_SHIP => has_legacy = true,
                b'1'..=b'9' => has_ids = true,
                _ => return Err(GridDecodeError::InvalidByte { index, byte }),
            }
        }
        if has_ids && has_legacy {
            return Err(GridDecodeError::MixedEncoding);
        }
        if !has_ids && !has_legacy {
            return Err(GridDecodeError::EmptyFleet);
        }
        if has_legacy {
            Ok(Self::recover_legacy(buf))
        } else {
            Self::from_ship_ids(buf)
        }
    }

    fn from_ship_ids(buf: &[u8]) -> Result<Self, GridDecodeError> {
        let mut groups: Vec<Vec<(usize, usize)>> = vec![Vec::new(); 9];
        for (index, &byte) in buf.iter().enumerate() {
            if byte != WIRE_WATER {
                groups[(byte - b'1') as usize].push((index / GRID_SIZE, index % GRID_SIZE));
            }
        }
        let mut board = Board::new();
        for (slot, cells) in groups.iter().enumerate() {
            if cells.is_empty() {
                continue;
            }
            let id = slot + 1;
            let orientation = run_orientation(cells).ok_or(GridDecodeError::MalformedShip { id })?;
            let ship_type = match SHIPS.get(slot) {
                Some(def) if def.length() == cells.len() && !board.ships.iter().any(|s| s.ship_type() == *def) => *def,
                _ => ShipType::new(RECOVERED_SHIP_NAME, cells.len()),
            };
            board
                .place_ship(ship_type, Coord::from(cells[0]), orientation)
                .map_err(|_| GridDecodeError::MalformedShip { id })?;
        }
        Ok(board)
    }

    fn recover_legacy(buf: &[u8]) -> Self {
        let is_ship = |r: usize, c: usize| buf[r * GRID_SIZE + c] == WIRE_LEGACY_SHIP;
        let mut board = Board::new();
        for r in 0..GRID_SIZE {
            for c in 0..GRID_SIZE {
                if !is_ship(r, c) || board.grid.get(r, c).ship.is_some() {
                    continue;
                }
                let free = |board: &Board, r: usize, c: usize| {
                    r < GRID_SIZE && c < GRID_SIZE && is_ship(r, c) && board.grid.get(r, c).ship.is_none()
                };
                let orientation = if free(&board, r, c + 1) {
                    Orientation::Horizontal
                } else {
                    Orientation::Vertical
                };
                let (dr, dc) = orientation.step();
                let mut len = 1;
                while free(&board, r + len * dr, c + len * dc) {
                    len += 1;
                }
                let ship_type = ShipType::new(RECOVERED_SHIP_NAME, len);
                // The run was checked free and in bounds above.
                let _ = board.place_ship(ship_type, Coord::from((r, c)), orientation);
            }
        }
        board
    }
}

/// Orientation of a straight contiguous run of cells listed in row-major
/// order, or `None` if the cells are not one.
fn run_orientation(cells: &[(usize, usize)]) -> Option<Orientation> {
    let (r0, c0) = cells[0];
    if cells.iter().enumerate().all(|(i, &(r, c))| r == r0 && c == c0 + i) {
        Some(Orientation::Horizontal)
    } else if cells.iter().enumerate().all(|(i, &(r, c))| c == c0 && r == r0 + i) {
        Some(Orientation::Vertical)
    } else {
        None
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Board {{\n  ships: {:?},\n  grid:", self.ships)?;
        write!(f, "{:?}}}", self.grid)
    }
}
