// Hunt/target guessing logic for the opponent board.

use core::fmt;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::board::Board;
use crate::common::{AttackOutcome, Coord};
use crate::config::{GRID_SIZE, MAX_TARGET_ATTEMPTS};

/// How hard the AI tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Difficulty {
    /// Uniform random search.
    Easy,
    /// Random search that hunts around hits.
    #[default]
    Normal,
    /// Currently plays exactly like `Normal`.
    Hard,
}

impl Difficulty {
    fn hunts(self) -> bool {
        matches!(self, Difficulty::Normal | Difficulty::Hard)
    }
}

/// Errors from the targeting engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetingError {
    /// Every cell has been tried.
    NoTargetsLeft,
    /// Too many rejected attacks within one turn.
    RetriesExhausted,
}

impl fmt::Display for TargetingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetingError::NoTargetsLeft => write!(f, "No untried coordinates remain"),
            TargetingError::RetriesExhausted => {
                write!(f, "Gave up after {} rejected attacks", MAX_TARGET_ATTEMPTS)
            }
        }
    }
}

impl std::error::Error for TargetingError {}

/// Targeting state for one game: the cells tried so far and the candidate
/// stack of cells next to hits.
#[derive(Debug, Clone)]
pub struct AiTargeting {
    difficulty: Difficulty,
    candidates: Vec<Coord>,
    tried: [[bool; GRID_SIZE]; GRID_SIZE],
}

impl AiTargeting {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            candidates: Vec::new(),
            tried: [[false; GRID_SIZE]; GRID_SIZE],
        }
    }

    /// Forget everything; call at the start of a new game.
    pub fn reset(&mut self) {
        self.candidates.clear();
        self.tried = [[false; GRID_SIZE]; GRID_SIZE];
    }

    /// Pending hunt candidates, top of stack last.
    pub fn candidates(&self) -> &[Coord] {
        &self.candidates
    }

    pub fn has_tried(&self, coord: Coord) -> bool {
        coord.index().map_or(false, |(r, c)| self.tried[r][c])
    }

    /// Pick the next coordinate to attack. Hunting modes drain the candidate
    /// stack first, skipping cells already tried; otherwise an untried cell
    /// is drawn uniformly.
    pub fn next_target<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Coord, TargetingError> {
        if self.difficulty.hunts() {
            while let Some(coord) = self.candidates.pop() {
                if !self.has_tried(coord) {
                    return Ok(coord);
                }
            }
        }
        self.random_untried(rng)
    }

    fn random_untried<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Coord, TargetingError> {
        // Sample first; enumerate the open cells only when sampling keeps missing.
        for _ in 0..GRID_SIZE * GRID_SIZE {
            let coord = Coord::new(
                rng.random_range(0..GRID_SIZE as i32),
                rng.random_range(0..GRID_SIZE as i32),
            );
            if !self.has_tried(coord) {
                return Ok(coord);
            }
        }
        let open: Vec<Coord> = (0..GRID_SIZE)
            .flat_map(|r| (0..GRID_SIZE).map(move |c| (r, c)))
            .filter(|&(r, c)| !self.tried[r][c])
            .map(Coord::from)
            .collect();
        open.choose(rng).copied().ok_or(TargetingError::NoTargetsLeft)
    }

    /// Feed back the outcome of an attack at `coord`. On a hit in a hunting
    /// mode every in-bounds axis neighbour is pushed as a candidate.
    pub fn observe(&mut self, coord: Coord, outcome: AttackOutcome) {
        if let Some((r, c)) = coord.index() {
            self.tried[r][c] = true;
        }
        if self.difficulty.hunts() && outcome == AttackOutcome::Hit {
            self.candidates.extend(coord.neighbors());
        }
    }

    /// Take one full turn: keep attacking through `fire` until an attack is
    /// not rejected. Bounded by [`MAX_TARGET_ATTEMPTS`].
    pub fn take_turn<R, F>(
        &mut self,
        rng: &mut R,
        mut fire: F,
    ) -> Result<(Coord, AttackOutcome), TargetingError>
    where
        R: Rng + ?Sized,
        F: FnMut(Coord) -> AttackOutcome,
    {
        for _ in 0..MAX_TARGET_ATTEMPTS {
            let coord = self.next_target(rng)?;
            let outcome = fire(coord);
            self.observe(coord, outcome);
            if !outcome.is_rejection() {
                return Ok((coord, outcome));
            }
        }
        Err(TargetingError::RetriesExhausted)
    }

    /// Take one turn directly against a local board.
    pub fn attack<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        board: &mut Board,
    ) -> Result<(Coord, AttackOutcome), TargetingError> {
        self.take_turn(rng, |coord| board.resolve_attack(coord))
    }
}
