mod ai;
mod board;
pub mod client;
mod common;
mod config;
mod grid;
pub mod local;
mod logging;
pub mod protocol;
pub mod server;
pub mod session;
mod ship;
pub mod transport;
pub mod ui;

pub use ai::*;
pub use board::*;
pub use client::{ClientSession, GameDisplay, GameEnd, KeyInput, Phase};
pub use common::*;
pub use config::*;
pub use grid::*;
pub use local::LocalGame;
pub use logging::{init_logging, LOG_ENV};
pub use protocol::{ClientMessage, ProtocolError, ServerMessage};
pub use server::GameServer;
pub use session::{GameSession, PlayerSession, SessionEnd, SessionSummary, TurnState};
pub use ship::*;
pub use transport::in_memory::InMemoryTransport;
pub use transport::tcp::TcpTransport;
pub use transport::{LineRead, LineWrite, Transport, TransportConfig};
