use crate::ship::ShipType;

pub const GRID_SIZE: usize = 10;
pub const NUM_SHIPS: usize = 5;
pub const SHIPS: [ShipType; NUM_SHIPS] = [
    ShipType::new("Carrier", 5),
    ShipType::new("Battleship", 4),
    ShipType::new("Cruiser", 3),
    ShipType::new("Submarine", 3),
    ShipType::new("Destroyer", 2),
];

/// Total number of ship segments used in the standard configuration.
pub const TOTAL_SHIP_CELLS: usize = 5 + 4 + 3 + 3 + 2;

/// Random placement gives up on a ship after this many rejected samples.
pub const MAX_PLACEMENT_ATTEMPTS: usize = 10_000;

/// Upper bound on rejected attacks the AI will absorb within one turn.
pub const MAX_TARGET_ATTEMPTS: usize = 4 * GRID_SIZE * GRID_SIZE;

/// Bytes in a grid transfer: one per cell, no terminator.
pub const GRID_WIRE_LEN: usize = GRID_SIZE * GRID_SIZE;

/// Water marker in a grid transfer.
pub const WIRE_WATER: u8 = b'~';

/// Legacy ship marker carrying no ship identity.
pub const WIRE_LEGACY_SHIP: u8 = b'S';

/// Name given to ships recovered from a legacy grid transfer.
pub const RECOVERED_SHIP_NAME: &str = "Unknown";

