use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

use crate::transport::{LineTransport, TransportConfig};

/// Buffer size of each direction of an in-memory pair.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Line transport over an in-process pipe.
pub type InMemoryTransport = LineTransport<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

impl InMemoryTransport {
    /// Two connected ends. Dropping one end closes the other's read side.
    pub fn pair() -> (Self, Self) {
        Self::pair_with(&TransportConfig::default())
    }

    pub fn pair_with(config: &TransportConfig) -> (Self, Self) {
        let (a, b) = tokio::io::duplex(PIPE_CAPACITY);
        let (ar, aw) = tokio::io::split(a);
        let (br, bw) = tokio::io::split(b);
        (
            Self::from_halves(ar, aw, config),
            Self::from_halves(br, bw, config),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{LineRead, LineWrite};
    use tokio::time::Duration;

    #[tokio::test]
    async fn lines_and_raw_bytes_interleave() -> anyhow::Result<()> {
        let (mut a, mut b) = InMemoryTransport::pair();
        a.write_all(b"~~S").await?;
        a.write_line("(1 2)").await?;
        a.write_line("FORFEIT\r").await?;
        assert_eq!(b.read_exact(3).await?, b"~~S".to_vec());
        assert_eq!(b.read_line().await?.as_deref(), Some("(1 2)"));
        assert_eq!(b.read_line().await?.as_deref(), Some("FORFEIT"));
        drop(a);
        assert_eq!(b.read_line().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn overlong_line_is_an_error() {
        let config = TransportConfig {
            max_line_len: 8,
            ..TransportConfig::default()
        };
        let (mut a, mut b) = InMemoryTransport::pair_with(&config);
        a.write_line("0123456789abcdef").await.unwrap();
        assert!(b.read_line().await.is_err());
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let config = TransportConfig {
            read_timeout: Some(Duration::from_millis(50)),
            ..TransportConfig::default()
        };
        let (_a, mut b) = InMemoryTransport::pair_with(&config);
        let err = b.read_line().await.unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[tokio::test]
    async fn cancelled_watch_keeps_the_partial_line() {
        let (mut a, mut b) = InMemoryTransport::pair();
        a.write_all(b"FORF").await.unwrap();
        let waited = tokio::time::timeout(Duration::from_millis(20), b.watch_line()).await;
        assert!(waited.is_err());
        a.write_line("EIT").await.unwrap();
        assert_eq!(b.read_line().await.unwrap().as_deref(), Some("FORFEIT"));
    }

    #[tokio::test]
    async fn watch_ignores_the_read_timeout() {
        let config = TransportConfig {
            read_timeout: Some(Duration::from_millis(10)),
            ..TransportConfig::default()
        };
        let (mut a, mut b) = InMemoryTransport::pair_with(&config);
        let writer = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            a.write_line("FORFEIT").await.unwrap();
        };
        let (line, ()) = tokio::join!(b.watch_line(), writer);
        assert_eq!(line.unwrap().as_deref(), Some("FORFEIT"));
    }

    #[tokio::test]
    async fn short_grid_transfer_is_an_error() {
        let (mut a, mut b) = InMemoryTransport::pair();
        a.write_all(b"~~~").await.unwrap();
        drop(a);
        let err = b.read_exact(100).await.unwrap_err();
        assert_eq!(err.to_string(), "Connection closed by peer");
    }
}
