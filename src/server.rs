//! TCP front end: accepts connections and pairs them into sessions.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::session::{GameSession, SessionSummary};
use crate::transport::tcp::TcpTransport;
use crate::transport::TransportConfig;

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct GameServer {
    listener: TcpListener,
    config: TransportConfig,
    next_session: u64,
}

impl GameServer {
    pub async fn bind(addr: &str, config: TransportConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        log::info!("listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            config,
            next_session: 1,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    async fn accept(&self) -> anyhow::Result<TcpTransport> {
        let (stream, addr) = self.listener.accept().await?;
        log::info!("player connected from {}", addr);
        Ok(TcpTransport::new(stream, &self.config))
    }

    /// Wait for the next two connections and build a session for them.
    pub async fn accept_pair(&mut self) -> anyhow::Result<GameSession> {
        log::info!("waiting for first player");
        let first = self.accept().await?;
        log::info!("waiting for opponent");
        let second = self.accept().await?;
        Ok(self.pair(first, second))
    }

    fn pair(&mut self, first: TcpTransport, second: TcpTransport) -> GameSession {
        let id = self.next_session;
        self.next_session += 1;
        log::info!("[session {}] both players connected", id);
        GameSession::new(id, Box::new(first), Box::new(second))
    }

    /// Pair one session and play it on the current task.
    pub async fn run_one_session(&mut self) -> anyhow::Result<SessionSummary> {
        let mut session = self.accept_pair().await?;
        session.run().await
    }

    /// Serve sessions forever, or until `limit` sessions have been started.
    /// Each session runs on its own task.
    pub async fn run(&mut self, limit: Option<usize>) -> anyhow::Result<()> {
        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        let mut started = 0usize;
        let mut waiting: Option<TcpTransport> = None;
        while limit.is_none_or(|n| started < n) {
            if waiting.is_none() {
                log::info!("waiting for first player");
            } else {
                log::info!("waiting for opponent");
            }
            let transport = match self.accept().await {
                Ok(transport) => transport,
                Err(e) => {
                    log::warn!("accept failed: {:#}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            let Some(first) = waiting.take() else {
                waiting = Some(transport);
                continue;
            };
            let mut session = self.pair(first, transport);
            handles.push(tokio::spawn(async move {
                if let Err(e) = session.run().await {
                    log::warn!("session ended with an error: {:#}", e);
                }
            }));
            started += 1;
            handles.retain(|h| !h.is_finished());
        }
        for handle in handles {
            let _ = handle.await;
        }
        Ok(())
    }
}
