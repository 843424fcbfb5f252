//! Client side of a networked game.
//!
//! [`ClientSession`] keeps the local picture of the game: the player's own
//! board, what is known about the opponent's board and whose turn it is. The
//! interactive loop merges server messages, key presses and a redraw tick;
//! the AI loop answers `YOUR_TURN` prompts from the targeting engine.

use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::ai::AiTargeting;
use crate::board::Board;
use crate::common::{AttackOutcome, Coord};
use crate::config::GRID_SIZE;
use crate::grid::{CellState, OpponentView};
use crate::protocol::{read_server_message, write_client_message, ClientMessage, ServerMessage};
use crate::transport::{LineRead, LineWrite};

/// Redraw period of the interactive loop.
pub const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Attack,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Quit,
}

/// How the game ended for this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEnd {
    Won,
    Lost,
    /// The local player forfeited.
    Quit,
    /// The opponent dropped off without finishing the game.
    OpponentLeft,
}

/// Output side of the interactive client.
pub trait GameDisplay {
    fn render_boards(
        &mut self,
        own: &Board,
        opponent: &OpponentView,
        cursor: Coord,
        your_turn: bool,
        phase: Phase,
    );
    fn render_status(&mut self, msg: &str);
    fn render_result(&mut self, msg: &str);
}

/// Send the placed fleet as the grid transfer.
pub async fn send_grid<W: LineWrite + ?Sized>(
    writer: &mut W,
    board: &Board,
    legacy: bool,
) -> anyhow::Result<()> {
    let buf = if legacy {
        board.to_legacy_wire()
    } else {
        board.to_wire()
    };
    writer.write_all(&buf).await
}

pub struct ClientSession {
    own: Board,
    opponent: OpponentView,
    cursor: Coord,
    your_turn: bool,
    phase: Phase,
    in_flight: Option<Coord>,
    status: String,
    last_result: String,
}

impl ClientSession {
    /// Session for a board whose grid has already been sent.
    pub fn new(own: Board) -> Self {
        Self {
            own,
            opponent: OpponentView::new(),
            cursor: Coord::new(0, 0),
            your_turn: false,
            phase: Phase::Attack,
            in_flight: None,
            status: "Waiting for opponent".to_string(),
            last_result: String::new(),
        }
    }

    pub fn own(&self) -> &Board {
        &self.own
    }

    pub fn opponent(&self) -> &OpponentView {
        &self.opponent
    }

    pub fn cursor(&self) -> Coord {
        self.cursor
    }

    pub fn your_turn(&self) -> bool {
        self.your_turn
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn in_flight(&self) -> Option<Coord> {
        self.in_flight
    }

    pub fn last_result(&self) -> &str {
        &self.last_result
    }

    /// Apply one server message. Returns the end of the game once known.
    pub fn apply_server(&mut self, msg: ServerMessage) -> Option<GameEnd> {
        match msg {
            ServerMessage::YourTurn => {
                self.your_turn = true;
                self.in_flight = None;
                self.status = "Your turn".to_string();
            }
            ServerMessage::OpponentTurn => {
                self.your_turn = false;
                self.status = "Opponent's turn".to_string();
            }
            ServerMessage::Result { coord, outcome } => {
                self.in_flight = None;
                let state = match outcome {
                    AttackOutcome::Miss => Some(CellState::Miss),
                    AttackOutcome::Hit => Some(CellState::Hit),
                    AttackOutcome::Sunk | AttackOutcome::GameWon => Some(CellState::Sunk),
                    AttackOutcome::AlreadyShot | AttackOutcome::OutOfRange => None,
                };
                if let Some(state) = state {
                    self.opponent.set(coord, state);
                }
                self.last_result = format!("You fired at {}: {}", coord, outcome);
            }
            ServerMessage::Attacked { coord, outcome } => {
                let local = self.own.resolve_attack(coord);
                let agrees = local == outcome
                    || (local == AttackOutcome::Sunk && outcome == AttackOutcome::GameWon);
                if !agrees {
                    log::warn!(
                        "server reports {} at {} but local board says {}",
                        outcome,
                        coord,
                        local
                    );
                }
                self.last_result = format!("Opponent fired at {}: {}", coord, outcome);
            }
            ServerMessage::Board(view) => self.opponent = view,
            ServerMessage::OpponentForfeit => {
                self.status = "Opponent forfeited".to_string();
            }
            ServerMessage::OpponentDisconnected => {
                self.finish("Opponent disconnected");
                return Some(GameEnd::OpponentLeft);
            }
            ServerMessage::GameOver { won } => {
                self.finish(if won { "You won!" } else { "You lost!" });
                return Some(if won { GameEnd::Won } else { GameEnd::Lost });
            }
        }
        None
    }

    fn finish(&mut self, status: &str) {
        self.phase = Phase::Finished;
        self.your_turn = false;
        self.status = status.to_string();
    }

    /// Apply a key press, returning the message to send if any.
    pub fn handle_key(&mut self, key: KeyInput) -> Option<ClientMessage> {
        if key == KeyInput::Quit {
            self.finish("You forfeited");
            return Some(ClientMessage::Forfeit);
        }
        if !self.your_turn || self.phase != Phase::Attack {
            return None;
        }
        let max = GRID_SIZE as i32 - 1;
        let Coord { row, col } = self.cursor;
        match key {
            KeyInput::Up => self.cursor = Coord::new((row - 1).max(0), col),
            KeyInput::Down => self.cursor = Coord::new((row + 1).min(max), col),
            KeyInput::Left => self.cursor = Coord::new(row, (col - 1).max(0)),
            KeyInput::Right => self.cursor = Coord::new(row, (col + 1).min(max)),
            KeyInput::Enter => {
                if self.in_flight.is_some() {
                    return None;
                }
                if self.opponent.is_attacked(self.cursor) {
                    self.last_result = format!(
                        "{} {}",
                        self.cursor,
                        AttackOutcome::AlreadyShot
                    );
                    return None;
                }
                self.in_flight = Some(self.cursor);
                self.your_turn = false;
                return Some(ClientMessage::Attack(self.cursor));
            }
            KeyInput::Quit => {}
        }
        None
    }

    fn render<D: GameDisplay + ?Sized>(&self, display: &mut D) {
        display.render_boards(
            &self.own,
            &self.opponent,
            self.cursor,
            self.your_turn,
            self.phase,
        );
        display.render_status(&self.status);
        display.render_result(&self.last_result);
    }

    /// Interactive loop. Server messages arrive through a reader task, key
    /// presses through `keys`, and the display is redrawn every [`TICK`].
    pub async fn run<R, W, D>(
        &mut self,
        reader: R,
        mut writer: W,
        mut keys: mpsc::Receiver<KeyInput>,
        display: &mut D,
    ) -> anyhow::Result<GameEnd>
    where
        R: LineRead + 'static,
        W: LineWrite,
        D: GameDisplay + ?Sized,
    {
        let (net_tx, mut net_rx) = mpsc::channel(32);
        let reader_task = tokio::spawn(async move {
            let mut reader = reader;
            loop {
                let msg = read_server_message(&mut reader).await;
                let last = !matches!(msg, Ok(Some(_)));
                if net_tx.send(msg).await.is_err() || last {
                    break;
                }
            }
        });

        let mut tick = interval(TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut keys_open = true;
        let result = loop {
            tokio::select! {
                msg = net_rx.recv() => match msg {
                    Some(Ok(Some(msg))) => {
                        if let Some(end) = self.apply_server(msg) {
                            break Ok(end);
                        }
                    }
                    Some(Ok(None)) | None => break Err(anyhow::anyhow!("server disconnected")),
                    Some(Err(e)) => break Err(e.context("server disconnected")),
                },
                key = keys.recv(), if keys_open => match key {
                    Some(key) => {
                        let Some(out) = self.handle_key(key) else { continue };
                        if let Err(e) = write_client_message(&mut writer, &out).await {
                            break Err(e.context("server disconnected"));
                        }
                        if out == ClientMessage::Forfeit {
                            break Ok(GameEnd::Quit);
                        }
                    }
                    None => keys_open = false,
                },
                _ = tick.tick() => self.render(display),
            }
        };
        reader_task.abort();
        if let Err(e) = &result {
            self.finish(&format!("{:#}", e));
        }
        self.render(display);
        let _ = writer.shutdown().await;
        result
    }

    /// Play with the targeting engine instead of a keyboard.
    pub async fn run_ai<T, R>(
        &mut self,
        transport: &mut T,
        ai: &mut AiTargeting,
        rng: &mut R,
    ) -> anyhow::Result<GameEnd>
    where
        T: LineRead + LineWrite + ?Sized,
        R: Rng + ?Sized,
    {
        loop {
            let msg = read_server_message(transport)
                .await?
                .ok_or_else(|| anyhow::anyhow!("server disconnected"))?;
            if let ServerMessage::Result { coord, outcome } = &msg {
                ai.observe(*coord, *outcome);
            }
            let prompted = msg == ServerMessage::YourTurn;
            if let Some(end) = self.apply_server(msg) {
                return Ok(end);
            }
            if prompted {
                let target = ai.next_target(rng)?;
                log::debug!("ai fires at {}", target);
                self.in_flight = Some(target);
                self.your_turn = false;
                write_client_message(transport, &ClientMessage::Attack(target)).await?;
            }
        }
    }
}
