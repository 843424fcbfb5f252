//! Single-player game against the AI on one machine.

use rand::Rng;

use crate::ai::{AiTargeting, Difficulty};
use crate::board::Board;
use crate::common::{AttackOutcome, Coord, PlacementError};
use crate::grid::OpponentView;
use crate::session::TurnState;

/// Index of the human player in [`TurnState`].
pub const HUMAN: usize = 0;
/// Index of the AI player in [`TurnState`].
pub const COMPUTER: usize = 1;

pub struct LocalGame {
    player: Board,
    enemy: Board,
    ai: AiTargeting,
    turn: TurnState,
    turns: usize,
}

impl LocalGame {
    /// Game with both fleets already placed. The human moves first.
    pub fn new(player: Board, enemy: Board, difficulty: Difficulty) -> Self {
        Self {
            player,
            enemy,
            ai: AiTargeting::new(difficulty),
            turn: TurnState::AttackPhase(HUMAN),
            turns: 0,
        }
    }

    /// Place the AI fleet randomly around an already placed human fleet.
    pub fn with_random_enemy<R: Rng + ?Sized>(
        rng: &mut R,
        player: Board,
        difficulty: Difficulty,
    ) -> Result<Self, PlacementError> {
        let enemy = Board::random(rng)?;
        Ok(Self::new(player, enemy, difficulty))
    }

    pub fn turn(&self) -> TurnState {
        self.turn
    }

    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn player_board(&self) -> &Board {
        &self.player
    }

    /// What the human knows about the AI fleet.
    pub fn enemy_view(&self) -> OpponentView {
        self.enemy.grid().redacted()
    }

    pub fn winner(&self) -> Option<usize> {
        match self.turn {
            TurnState::GameOver(winner) => Some(winner),
            _ => None,
        }
    }

    /// Resolve the human's attack. Rejected attacks leave the turn with the
    /// human; anything else hands it to the AI.
    pub fn player_attack(&mut self, coord: Coord) -> anyhow::Result<AttackOutcome> {
        if self.turn != TurnState::AttackPhase(HUMAN) {
            anyhow::bail!("not the player's turn: {:?}", self.turn);
        }
        let outcome = self.enemy.resolve_attack(coord);
        Ok(self.finish_attack(HUMAN, outcome, self.enemy.all_sunk()))
    }

    /// Let the AI take its turn, retrying its own rejected attacks.
    pub fn ai_turn<R: Rng + ?Sized>(&mut self, rng: &mut R) -> anyhow::Result<(Coord, AttackOutcome)> {
        if self.turn != TurnState::AttackPhase(COMPUTER) {
            anyhow::bail!("not the computer's turn: {:?}", self.turn);
        }
        let (coord, outcome) = self.ai.attack(rng, &mut self.player)?;
        let outcome = self.finish_attack(COMPUTER, outcome, self.player.all_sunk());
        Ok((coord, outcome))
    }

    fn finish_attack(&mut self, attacker: usize, outcome: AttackOutcome, won: bool) -> AttackOutcome {
        if outcome.is_rejection() {
            return outcome;
        }
        self.turns += 1;
        if won {
            self.turn = TurnState::GameOver(attacker);
            return AttackOutcome::GameWon;
        }
        self.turn = TurnState::AttackPhase(1 - attacker);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ship::Orientation;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn destroyer_at(row: i32) -> Board {
        let mut board = Board::new();
        board.place(4, Coord::new(row, 0), Orientation::Horizontal).unwrap();
        board
    }

    #[test]
    fn rejected_attack_keeps_the_turn() {
        let mut game = LocalGame::new(destroyer_at(0), destroyer_at(5), Difficulty::Easy);
        assert_eq!(
            game.player_attack(Coord::from_wire(11, 1)).unwrap(),
            AttackOutcome::OutOfRange
        );
        assert_eq!(game.turn(), TurnState::AttackPhase(HUMAN));
        assert_eq!(game.player_attack(Coord::new(9, 9)).unwrap(), AttackOutcome::Miss);
        assert_eq!(game.turn(), TurnState::AttackPhase(COMPUTER));
        assert!(game.player_attack(Coord::new(8, 8)).is_err());
    }

    #[test]
    fn sinking_the_last_ship_wins() {
        let mut rng = SmallRng::seed_from_u64(9);
        let mut game = LocalGame::new(destroyer_at(0), destroyer_at(5), Difficulty::Easy);
        assert_eq!(game.player_attack(Coord::new(5, 0)).unwrap(), AttackOutcome::Hit);
        game.ai_turn(&mut rng).unwrap();
        assert_eq!(game.player_attack(Coord::new(5, 1)).unwrap(), AttackOutcome::GameWon);
        assert_eq!(game.winner(), Some(HUMAN));
    }

    #[test]
    fn full_game_reaches_game_over() {
        let mut rng = SmallRng::seed_from_u64(21);
        let mut game = LocalGame::with_random_enemy(&mut rng, destroyer_at(3), Difficulty::Normal)
            .unwrap();
        let mut col = 0;
        let mut row = 9;
        while game.winner().is_none() {
            game.player_attack(Coord::new(row, col)).unwrap();
            col += 1;
            if col == 10 {
                col = 0;
                row -= 1;
            }
            if game.winner().is_some() {
                break;
            }
            game.ai_turn(&mut rng).unwrap();
        }
        assert!(game.winner().is_some());
        assert!(game.turns() <= 200);
    }
}
