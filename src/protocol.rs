//! Messages exchanged between the turn server and its two clients.
//!
//! Every message is one text line except the board dump, which is a
//! `BOARD` header followed by one line per grid row, and the grid transfer,
//! which is a raw buffer handled by [`Board::to_wire`](crate::Board::to_wire).

use core::fmt;

use crate::common::{AttackOutcome, Coord, GridDecodeError};
use crate::config::GRID_SIZE;
use crate::grid::OpponentView;
use crate::transport::{LineRead, LineWrite};

const YOUR_TURN: &str = "YOUR_TURN";
const OPPONENT_TURN: &str = "OPPONENT_TURN";
const RESULT: &str = "RESULT";
const ATTACKED: &str = "ATTACKED";
const BOARD: &str = "BOARD";
const FORFEIT: &str = "FORFEIT";
const OPPONENT_FORFEIT: &str = "OPPONENT_FORFEIT";
const OPPONENT_DISCONNECTED: &str = "OPPONENT_DISCONNECTED";
const YOU_WON: &str = "You won!";
const YOU_LOST: &str = "You lost!";

/// Client to server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    Attack(Coord),
    Forfeit,
}

impl ClientMessage {
    pub fn to_line(&self) -> String {
        match self {
            ClientMessage::Attack(coord) => coord.to_string(),
            ClientMessage::Forfeit => FORFEIT.to_string(),
        }
    }

    /// Lines that are not a readable coordinate become an attack on wire
    /// coordinate (0 0), which the resolver rejects as out of range.
    pub fn parse(line: &str) -> Self {
        if line.trim() == FORFEIT {
            return ClientMessage::Forfeit;
        }
        ClientMessage::Attack(parse_coordinate(line).unwrap_or(Coord::from_wire(0, 0)))
    }
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    YourTurn,
    OpponentTurn,
    /// Outcome of the recipient's own attack.
    Result { coord: Coord, outcome: AttackOutcome },
    /// The opponent attacked the recipient's grid.
    Attacked { coord: Coord, outcome: AttackOutcome },
    /// Redacted snapshot of the opponent's grid.
    Board(OpponentView),
    OpponentForfeit,
    OpponentDisconnected,
    GameOver { won: bool },
}

impl ServerMessage {
    pub fn to_lines(&self) -> Vec<String> {
        match self {
            ServerMessage::YourTurn => vec![YOUR_TURN.to_string()],
            ServerMessage::OpponentTurn => vec![OPPONENT_TURN.to_string()],
            ServerMessage::Result { coord, outcome } => {
                vec![format!("{} {} {}", RESULT, coord, outcome)]
            }
            ServerMessage::Attacked { coord, outcome } => {
                vec![format!("{} {} {}", ATTACKED, coord, outcome)]
            }
            ServerMessage::Board(view) => {
                let mut lines = vec![BOARD.to_string()];
                lines.extend(view.to_rows());
                lines
            }
            ServerMessage::OpponentForfeit => vec![OPPONENT_FORFEIT.to_string()],
            ServerMessage::OpponentDisconnected => vec![OPPONENT_DISCONNECTED.to_string()],
            ServerMessage::GameOver { won: true } => vec![YOU_WON.to_string()],
            ServerMessage::GameOver { won: false } => vec![YOU_LOST.to_string()],
        }
    }

    /// Parse a single-line message. `BOARD` needs the following rows and is
    /// handled by [`read_server_message`].
    pub fn parse_line(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        let msg = match line {
            YOUR_TURN => ServerMessage::YourTurn,
            OPPONENT_TURN => ServerMessage::OpponentTurn,
            OPPONENT_FORFEIT => ServerMessage::OpponentForfeit,
            OPPONENT_DISCONNECTED => ServerMessage::OpponentDisconnected,
            YOU_WON => ServerMessage::GameOver { won: true },
            YOU_LOST => ServerMessage::GameOver { won: false },
            _ => {
                if let Some(rest) = line.strip_prefix(RESULT) {
                    let (coord, outcome) = parse_report(rest)
                        .ok_or_else(|| ProtocolError::Malformed(line.to_string()))?;
                    ServerMessage::Result { coord, outcome }
                } else if let Some(rest) = line.strip_prefix(ATTACKED) {
                    let (coord, outcome) = parse_report(rest)
                        .ok_or_else(|| ProtocolError::Malformed(line.to_string()))?;
                    ServerMessage::Attacked { coord, outcome }
                } else {
                    return Err(ProtocolError::Unknown(line.to_string()));
                }
            }
        };
        Ok(msg)
    }
}

/// Errors decoding protocol lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Line matches no known message.
    Unknown(String),
    /// Known message with an unreadable payload.
    Malformed(String),
    /// Board dump could not be decoded.
    BadBoard(GridDecodeError),
    /// Connection closed in the middle of a board dump.
    TruncatedBoard,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Unknown(line) => write!(f, "Unknown message: {:?}", line),
            ProtocolError::Malformed(line) => write!(f, "Malformed message: {:?}", line),
            ProtocolError::BadBoard(e) => write!(f, "Bad board dump: {}", e),
            ProtocolError::TruncatedBoard => write!(f, "Connection closed inside a board dump"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Parse a 1-indexed coordinate such as `(3 7)`, `3 7` or `3,7`.
pub fn parse_coordinate(text: &str) -> Option<Coord> {
    let inner = text.trim();
    let inner = inner.strip_prefix('(').unwrap_or(inner);
    let inner = inner.strip_suffix(')').unwrap_or(inner);
    let mut parts = inner
        .split(|ch: char| ch.is_whitespace() || ch == ',')
        .filter(|p| !p.is_empty());
    let row = parts.next()?.parse::<i32>().ok()?;
    let col = parts.next()?.parse::<i32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Coord::from_wire(row, col))
}

/// `(r c) <outcome text>`
fn parse_report(rest: &str) -> Option<(Coord, AttackOutcome)> {
    let rest = rest.trim_start();
    let close = rest.find(')')?;
    let coord = parse_coordinate(&rest[..=close])?;
    let outcome = AttackOutcome::from_wire(&rest[close + 1..])?;
    Some((coord, outcome))
}

/// Read one server message, or `None` if the server closed the connection.
pub async fn read_server_message<R: LineRead + ?Sized>(
    reader: &mut R,
) -> anyhow::Result<Option<ServerMessage>> {
    let Some(line) = reader.read_line().await? else {
        return Ok(None);
    };
    log::debug!("<- {}", line);
    if line.trim() != BOARD {
        return Ok(Some(ServerMessage::parse_line(&line)?));
    }
    let mut rows = Vec::with_capacity(GRID_SIZE);
    for _ in 0..GRID_SIZE {
        let row = reader.read_line().await?.ok_or(ProtocolError::TruncatedBoard)?;
        rows.push(row);
    }
    let view = OpponentView::from_rows(&rows).map_err(ProtocolError::BadBoard)?;
    Ok(Some(ServerMessage::Board(view)))
}

pub async fn write_server_message<W: LineWrite + ?Sized>(
    writer: &mut W,
    msg: &ServerMessage,
) -> anyhow::Result<()> {
    for line in msg.to_lines() {
        writer.write_line(&line).await?;
    }
    Ok(())
}

/// Read one client message, or `None` if the client closed the connection.
pub async fn read_client_message<R: LineRead + ?Sized>(
    reader: &mut R,
) -> anyhow::Result<Option<ClientMessage>> {
    Ok(client_message(reader.read_line().await?))
}

/// Read a client message from a peer that is not on turn. No read timeout
/// applies, and the future can be dropped without losing input.
pub async fn watch_client_message<R: LineRead + ?Sized>(
    reader: &mut R,
) -> anyhow::Result<Option<ClientMessage>> {
    Ok(client_message(reader.watch_line().await?))
}

fn client_message(line: Option<String>) -> Option<ClientMessage> {
    if let Some(line) = &line {
        log::debug!("<- {}", line);
    }
    line.map(|l| ClientMessage::parse(&l))
}

pub async fn write_client_message<W: LineWrite + ?Sized>(
    writer: &mut W,
    msg: &ClientMessage,
) -> anyhow::Result<()> {
    writer.write_line(&msg.to_line()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellState;
    use crate::transport::in_memory::InMemoryTransport;

    #[test]
    fn coordinates_accept_common_spellings() {
        assert_eq!(parse_coordinate("(3 7)"), Some(Coord::new(2, 6)));
        assert_eq!(parse_coordinate(" 3 7 "), Some(Coord::new(2, 6)));
        assert_eq!(parse_coordinate("3,7"), Some(Coord::new(2, 6)));
        assert_eq!(parse_coordinate("(11 1)"), Some(Coord::new(10, 0)));
        assert_eq!(parse_coordinate("a b"), None);
        assert_eq!(parse_coordinate("1 2 3"), None);
        assert_eq!(parse_coordinate(""), None);
    }

    #[test]
    fn garbage_attack_is_out_of_range() {
        let ClientMessage::Attack(coord) = ClientMessage::parse("fire!") else {
            panic!("expected attack");
        };
        assert!(!coord.in_bounds());
        assert_eq!(ClientMessage::parse("FORFEIT"), ClientMessage::Forfeit);
    }

    #[test]
    fn result_line_echoes_coordinate() {
        let msg = ServerMessage::Result {
            coord: Coord::new(0, 9),
            outcome: AttackOutcome::Sunk,
        };
        assert_eq!(msg.to_lines(), vec!["RESULT (1 10) Hit, sunk!".to_string()]);
        assert_eq!(ServerMessage::parse_line("RESULT (1 10) Hit, sunk!"), Ok(msg));
        assert_eq!(
            ServerMessage::parse_line("ATTACKED (2 2) Miss"),
            Ok(ServerMessage::Attacked {
                coord: Coord::new(1, 1),
                outcome: AttackOutcome::Miss
            })
        );
        assert!(matches!(
            ServerMessage::parse_line("RESULT (1 1) Splash"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ServerMessage::parse_line("HELLO"),
            Err(ProtocolError::Unknown(_))
        ));
    }

    #[test]
    fn terminal_messages_match_wire_text() {
        assert_eq!(
            ServerMessage::GameOver { won: true }.to_lines(),
            vec!["You won!".to_string()]
        );
        assert_eq!(
            ServerMessage::parse_line("You lost!"),
            Ok(ServerMessage::GameOver { won: false })
        );
    }

    #[tokio::test]
    async fn board_dump_spans_eleven_lines() -> anyhow::Result<()> {
        let (mut a, mut b) = InMemoryTransport::pair();
        let mut view = OpponentView::new();
        view.set(Coord::new(3, 3), CellState::Sunk);
        write_server_message(&mut a, &ServerMessage::Board(view)).await?;
        write_server_message(&mut a, &ServerMessage::YourTurn).await?;
        assert_eq!(read_server_message(&mut b).await?, Some(ServerMessage::Board(view)));
        assert_eq!(read_server_message(&mut b).await?, Some(ServerMessage::YourTurn));
        Ok(())
    }

    #[tokio::test]
    async fn truncated_board_dump_is_an_error() {
        let (mut a, mut b) = InMemoryTransport::pair();
        a.write_line("BOARD").await.unwrap();
        a.write_line("~ ~ ~ ~ ~ ~ ~ ~ ~ ~").await.unwrap();
        drop(a);
        let err = read_server_message(&mut b).await.unwrap_err();
        assert!(err.to_string().contains("board dump"));
    }
}
