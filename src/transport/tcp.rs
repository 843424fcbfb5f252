use std::net::SocketAddr;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::transport::{LineTransport, TransportConfig};

/// Line transport over a TCP connection.
pub type TcpTransport = LineTransport<OwnedReadHalf, OwnedWriteHalf>;

impl TcpTransport {
    pub fn new(stream: TcpStream, config: &TransportConfig) -> Self {
        // Turn messages are tiny; don't let Nagle hold them back.
        let _ = stream.set_nodelay(true);
        let (read, write) = stream.into_split();
        Self::from_halves(read, write, config)
    }

    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        config: &TransportConfig,
    ) -> anyhow::Result<(Self, SocketAddr)> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        Ok((Self::new(stream, config), peer))
    }
}
