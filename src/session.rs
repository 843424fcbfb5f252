//! Server side of one game: two peers, their authoritative boards and the
//! turn state machine driving the exchange.

use anyhow::Context;
use serde::Serialize;
use tokio::time::{timeout, Duration};

use crate::board::Board;
use crate::common::{AttackOutcome, Coord};
use crate::config::GRID_WIRE_LEN;
use crate::protocol::{
    read_client_message, watch_client_message, write_server_message, ClientMessage, ServerMessage,
};
use crate::transport::Transport;

/// How long a failed peer's buffered input is checked for a `FORFEIT`.
const FORFEIT_GRACE: Duration = Duration::from_millis(50);

/// Where a session is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    WaitingForOpponent,
    PlacementPhase,
    /// The peer at this index attacks next.
    AttackPhase(usize),
    /// The peer at this index won.
    GameOver(usize),
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SessionEnd {
    AllSunk,
    Forfeit { peer: usize },
    Disconnected { peer: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub winner: Option<usize>,
    /// Valid attacks resolved; rejected attacks are not counted.
    pub turns: usize,
    pub end: SessionEnd,
}

/// One connected peer and its board.
pub struct PlayerSession {
    transport: Box<dyn Transport>,
    board: Board,
    label: String,
}

impl PlayerSession {
    pub fn new(transport: Box<dyn Transport>, label: impl Into<String>) -> Self {
        Self {
            transport,
            board: Board::new(),
            label: label.into(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn sunk_count(&self) -> usize {
        self.board.sunk_count()
    }

    async fn receive_grid(&mut self) -> anyhow::Result<Board> {
        let buf = self
            .transport
            .read_exact(GRID_WIRE_LEN)
            .await
            .with_context(|| format!("{}: grid transfer failed", self.label))?;
        let board =
            Board::from_wire(&buf).with_context(|| format!("{}: bad grid transfer", self.label))?;
        Ok(board)
    }

    async fn send(&mut self, msg: &ServerMessage) -> anyhow::Result<()> {
        write_server_message(&mut *self.transport, msg)
            .await
            .with_context(|| format!("{}: send failed", self.label))
    }
}

/// Failure attributed to one peer.
struct PeerFailure {
    peer: usize,
    error: anyhow::Error,
}

fn failed(peer: usize) -> impl FnOnce(anyhow::Error) -> PeerFailure {
    move |error| PeerFailure { peer, error }
}

/// What ended the wait for an attack.
enum Move {
    Attack(Coord, AttackOutcome),
    Forfeit(usize),
}

/// A game between two peers.
pub struct GameSession {
    id: u64,
    players: [PlayerSession; 2],
    turn: TurnState,
    turns: usize,
}

impl GameSession {
    pub fn new(id: u64, first: Box<dyn Transport>, second: Box<dyn Transport>) -> Self {
        Self {
            id,
            players: [
                PlayerSession::new(first, "player 1"),
                PlayerSession::new(second, "player 2"),
            ],
            turn: TurnState::WaitingForOpponent,
            turns: 0,
        }
    }

    pub fn turn(&self) -> TurnState {
        self.turn
    }

    pub fn player(&self, index: usize) -> &PlayerSession {
        &self.players[index]
    }

    /// Run the session to completion and close both connections.
    ///
    /// Peer failures are reported in the summary rather than as an error.
    pub async fn run(&mut self) -> anyhow::Result<SessionSummary> {
        let result = match self.placement().await {
            Ok(()) => self.play().await,
            Err(failure) => Err(failure),
        };
        let summary = match result {
            Ok(summary) => summary,
            Err(failure) => self.peer_failed(failure).await,
        };
        for player in self.players.iter_mut() {
            let _ = player.transport.shutdown().await;
        }
        log::info!(
            "[session {}] finished after {} turns: {:?}",
            self.id,
            summary.turns,
            summary.end
        );
        Ok(summary)
    }

    /// A peer that sent `FORFEIT` right before going away forfeits; any
    /// other failure ends the game without a winner.
    async fn peer_failed(&mut self, failure: PeerFailure) -> SessionSummary {
        let PeerFailure { peer, error } = failure;
        if self.left_with_forfeit(peer).await {
            return self.forfeit(peer).await;
        }
        log::warn!("[session {}] {:#}", self.id, error);
        let survivor = 1 - peer;
        if let Err(e) = self.players[survivor]
            .send(&ServerMessage::OpponentDisconnected)
            .await
        {
            log::debug!("[session {}] could not notify survivor: {:#}", self.id, e);
        }
        SessionSummary {
            winner: None,
            turns: self.turns,
            end: SessionEnd::Disconnected { peer },
        }
    }

    async fn left_with_forfeit(&mut self, peer: usize) -> bool {
        let read = watch_client_message(&mut *self.players[peer].transport);
        matches!(
            timeout(FORFEIT_GRACE, read).await,
            Ok(Ok(Some(ClientMessage::Forfeit)))
        )
    }

    async fn placement(&mut self) -> Result<(), PeerFailure> {
        self.turn = TurnState::PlacementPhase;
        log::info!("[session {}] waiting for both grids", self.id);
        let [first, second] = &mut self.players;
        let (a, b) = tokio::join!(first.receive_grid(), second.receive_grid());
        match (a, b) {
            (Ok(a), Ok(b)) => {
                self.players[0].board = a;
                self.players[1].board = b;
                self.turn = TurnState::AttackPhase(0);
                Ok(())
            }
            (Err(error), Ok(_)) => Err(PeerFailure { peer: 0, error }),
            (_, Err(error)) => Err(PeerFailure { peer: 1, error }),
        }
    }

    async fn send(&mut self, peer: usize, msg: &ServerMessage) -> Result<(), PeerFailure> {
        self.players[peer].send(msg).await.map_err(failed(peer))
    }

    /// Read attacks from the active peer until one is valid. The waiting
    /// peer is watched at the same time so its `FORFEIT` or disconnect is
    /// handled at once.
    async fn next_attack(&mut self, active: usize) -> Result<Move, PeerFailure> {
        let defender = 1 - active;
        loop {
            let (peer, msg) = self.next_message(active).await;
            let msg = msg.map_err(failed(peer))?;
            let coord = match msg {
                None => {
                    return Err(PeerFailure {
                        peer,
                        error: anyhow::anyhow!("{}: connection closed", self.players[peer].label),
                    })
                }
                Some(ClientMessage::Forfeit) => return Ok(Move::Forfeit(peer)),
                Some(ClientMessage::Attack(coord)) if peer == defender => {
                    log::debug!(
                        "[session {}] {} attacked {} out of turn, ignored",
                        self.id,
                        self.players[peer].label,
                        coord
                    );
                    continue;
                }
                Some(ClientMessage::Attack(coord)) => coord,
            };
            let outcome = self.players[defender].board.resolve_attack(coord);
            if !outcome.is_rejection() {
                return Ok(Move::Attack(coord, outcome));
            }
            log::debug!(
                "[session {}] {} attack {} rejected: {}",
                self.id,
                self.players[active].label,
                coord,
                outcome
            );
            self.send(active, &ServerMessage::Result { coord, outcome })
                .await?;
            self.send(active, &ServerMessage::YourTurn).await?;
        }
    }

    /// Next line from either peer, tagged with its sender. Only the active
    /// peer's read is subject to the read timeout.
    async fn next_message(
        &mut self,
        active: usize,
    ) -> (usize, anyhow::Result<Option<ClientMessage>>) {
        let [first, second] = &mut self.players;
        let (attacker, waiting) = if active == 0 {
            (first, second)
        } else {
            (second, first)
        };
        tokio::select! {
            biased;
            msg = watch_client_message(&mut *waiting.transport) => (1 - active, msg),
            msg = read_client_message(&mut *attacker.transport) => (active, msg),
        }
    }

    async fn play(&mut self) -> Result<SessionSummary, PeerFailure> {
        while let TurnState::AttackPhase(active) = self.turn {
            let defender = 1 - active;
            self.send(active, &ServerMessage::YourTurn).await?;
            self.send(defender, &ServerMessage::OpponentTurn).await?;

            let (coord, outcome) = match self.next_attack(active).await? {
                Move::Attack(coord, outcome) => (coord, outcome),
                Move::Forfeit(peer) => return Ok(self.forfeit(peer).await),
            };
            self.turns += 1;
            let won = self.players[defender].board.all_sunk();
            let outcome = if won { AttackOutcome::GameWon } else { outcome };
            log::info!(
                "[session {}] {} attacks {}: {}",
                self.id,
                self.players[active].label,
                coord,
                outcome
            );

            self.send(active, &ServerMessage::Result { coord, outcome })
                .await?;
            self.send(defender, &ServerMessage::Attacked { coord, outcome })
                .await?;
            let view = self.players[defender].board.grid().redacted();
            self.send(active, &ServerMessage::Board(view)).await?;

            if won {
                self.turn = TurnState::GameOver(active);
                self.send(active, &ServerMessage::GameOver { won: true })
                    .await?;
                self.send(defender, &ServerMessage::GameOver { won: false })
                    .await?;
                return Ok(SessionSummary {
                    winner: Some(active),
                    turns: self.turns,
                    end: SessionEnd::AllSunk,
                });
            }
            self.turn = TurnState::AttackPhase(defender);
        }
        Err(PeerFailure {
            peer: 0,
            error: anyhow::anyhow!("session left the attack phase: {:?}", self.turn),
        })
    }

    async fn forfeit(&mut self, peer: usize) -> SessionSummary {
        let winner = 1 - peer;
        log::info!("[session {}] {} forfeits", self.id, self.players[peer].label);
        self.turn = TurnState::GameOver(winner);
        let notify = async {
            self.send(winner, &ServerMessage::OpponentForfeit).await?;
            self.send(winner, &ServerMessage::GameOver { won: true })
                .await?;
            self.send(peer, &ServerMessage::GameOver { won: false })
                .await
        };
        if let Err(PeerFailure { error, .. }) = notify.await {
            log::debug!("[session {}] forfeit notice not delivered: {:#}", self.id, error);
        }
        SessionSummary {
            winner: Some(winner),
            turns: self.turns,
            end: SessionEnd::Forfeit { peer },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::read_server_message;
    use crate::ship::Orientation;
    use crate::transport::in_memory::InMemoryTransport;
    use crate::transport::LineWrite;

    fn destroyer_only() -> Board {
        let mut board = Board::new();
        board.place(4, Coord::new(0, 0), Orientation::Horizontal).unwrap();
        board
    }

    async fn expect(peer: &mut InMemoryTransport, msg: ServerMessage) {
        assert_eq!(read_server_message(peer).await.unwrap(), Some(msg));
    }

    #[tokio::test]
    async fn starts_waiting_and_moves_to_attack_phase() {
        let (s0, mut c0) = InMemoryTransport::pair();
        let (s1, mut c1) = InMemoryTransport::pair();
        let mut session = GameSession::new(1, Box::new(s0), Box::new(s1));
        assert_eq!(session.turn(), TurnState::WaitingForOpponent);

        let grid = destroyer_only().to_wire();
        c0.write_all(&grid).await.unwrap();
        c1.write_all(&grid).await.unwrap();
        drop(c1);
        let summary = session.run().await.unwrap();
        // Grids were accepted; the game then broke when player 2 vanished.
        assert_eq!(session.turn(), TurnState::AttackPhase(0));
        assert_eq!(session.player(1).board().ships().len(), 1);
        assert_eq!(summary.end, SessionEnd::Disconnected { peer: 1 });
        assert_eq!(summary.winner, None);
        expect(&mut c0, ServerMessage::YourTurn).await;
        expect(&mut c0, ServerMessage::OpponentDisconnected).await;
    }

    #[tokio::test]
    async fn short_grid_notifies_the_other_peer() {
        let (s0, mut c0) = InMemoryTransport::pair();
        let (s1, mut c1) = InMemoryTransport::pair();
        let mut session = GameSession::new(2, Box::new(s0), Box::new(s1));
        c0.write_all(&destroyer_only().to_wire()).await.unwrap();
        c1.write_all(b"~~~~").await.unwrap();
        drop(c1);
        let summary = session.run().await.unwrap();
        assert_eq!(summary.end, SessionEnd::Disconnected { peer: 1 });
        expect(&mut c0, ServerMessage::OpponentDisconnected).await;
    }

    #[tokio::test]
    async fn forfeit_sent_before_hanging_up_still_counts() {
        let (s0, mut c0) = InMemoryTransport::pair();
        let (s1, mut c1) = InMemoryTransport::pair();
        let mut session = GameSession::new(3, Box::new(s0), Box::new(s1));
        let grid = destroyer_only().to_wire();
        c0.write_all(&grid).await.unwrap();
        c1.write_all(&grid).await.unwrap();
        c1.write_line("FORFEIT").await.unwrap();
        drop(c1);
        let summary = session.run().await.unwrap();
        assert_eq!(summary.end, SessionEnd::Forfeit { peer: 1 });
        assert_eq!(summary.winner, Some(0));
        assert_eq!(session.turn(), TurnState::GameOver(0));
        expect(&mut c0, ServerMessage::YourTurn).await;
        expect(&mut c0, ServerMessage::OpponentForfeit).await;
        expect(&mut c0, ServerMessage::GameOver { won: true }).await;
    }
}
