//! Newline-framed text transport over any async byte stream.
//!
//! The wire carries one message per `\n`-terminated line, except for the
//! grid transfer which is a fixed number of raw bytes. Reading and writing
//! are separate traits so a connection can be split between a reader task
//! and the task that owns the write side.

use std::io;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::time::{timeout, Duration};

pub mod in_memory;
pub mod tcp;

/// Default timeout for writes.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest accepted line, excluding the terminator.
const DEFAULT_MAX_LINE_LEN: usize = 1024;

#[async_trait::async_trait]
pub trait LineRead: Send {
    /// Next line without its terminator, or `None` on a clean close.
    async fn read_line(&mut self) -> anyhow::Result<Option<String>>;
    /// Like `read_line` but ignoring the read timeout. Used to watch a peer
    /// that is not expected to speak. Cancelling it loses no data.
    async fn watch_line(&mut self) -> anyhow::Result<Option<String>>;
    /// Exactly `len` raw bytes.
    async fn read_exact(&mut self, len: usize) -> anyhow::Result<Vec<u8>>;
}

#[async_trait::async_trait]
pub trait LineWrite: Send {
    async fn write_line(&mut self, line: &str) -> anyhow::Result<()>;
    async fn write_all(&mut self, data: &[u8]) -> anyhow::Result<()>;
    /// Flush and close the write side.
    async fn shutdown(&mut self) -> anyhow::Result<()>;
}

/// A full duplex connection.
pub trait Transport: LineRead + LineWrite {}

impl<T: LineRead + LineWrite> Transport for T {}

/// Limits applied to every connection.
#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    /// `None` waits forever; turn-paced human games may idle for long.
    pub read_timeout: Option<Duration>,
    pub write_timeout: Duration,
    pub max_line_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_timeout: None,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

fn read_error(e: io::Error) -> anyhow::Error {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => anyhow::anyhow!("Connection closed by peer"),
        io::ErrorKind::ConnectionReset => anyhow::anyhow!("Connection reset by peer"),
        _ => anyhow::anyhow!("Read error: {}", e),
    }
}

fn write_error(e: io::Error) -> anyhow::Error {
    match e.kind() {
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => {
            anyhow::anyhow!("Connection closed by peer")
        }
        _ => anyhow::anyhow!("Write error: {}", e),
    }
}

/// Read half of a connection.
///
/// Line reads are cancel safe: bytes of a partly received line stay in
/// `pending` until the rest arrives.
pub struct LineReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
    read_timeout: Option<Duration>,
    max_line_len: usize,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    pub fn new(inner: R, config: &TransportConfig) -> Self {
        Self {
            inner: BufReader::new(inner),
            pending: Vec::new(),
            read_timeout: config.read_timeout,
            max_line_len: config.max_line_len,
        }
    }

    async fn next_line(&mut self) -> anyhow::Result<Option<String>> {
        let limit = (self.max_line_len + 2).saturating_sub(self.pending.len()) as u64;
        let n = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut self.pending)
            .await
            .map_err(read_error)?;
        if n == 0 && self.pending.is_empty() {
            return Ok(None);
        }
        let mut buf = std::mem::take(&mut self.pending);
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        if buf.len() > self.max_line_len {
            return Err(anyhow::anyhow!(
                "Line too long: more than {} bytes",
                self.max_line_len
            ));
        }
        let line =
            String::from_utf8(buf).map_err(|_| anyhow::anyhow!("Line is not valid UTF-8"))?;
        Ok(Some(line))
    }
}

#[async_trait::async_trait]
impl<R: AsyncRead + Unpin + Send> LineRead for LineReader<R> {
    async fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        match self.read_timeout {
            Some(d) => timeout(d, self.next_line())
                .await
                .map_err(|_| anyhow::anyhow!("Receive timeout after {:?}", d))?,
            None => self.next_line().await,
        }
    }

    async fn watch_line(&mut self) -> anyhow::Result<Option<String>> {
        self.next_line().await
    }

    async fn read_exact(&mut self, len: usize) -> anyhow::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let carried = self.pending.len().min(len);
        buf[..carried].copy_from_slice(&self.pending[..carried]);
        self.pending.drain(..carried);
        let read_timeout = self.read_timeout;
        let inner = &mut self.inner;
        let op = async {
            inner
                .read_exact(&mut buf[carried..])
                .await
                .map_err(read_error)?;
            anyhow::Ok(())
        };
        match read_timeout {
            Some(d) => timeout(d, op)
                .await
                .map_err(|_| anyhow::anyhow!("Receive timeout after {:?}", d))??,
            None => op.await?,
        }
        Ok(buf)
    }
}

/// Write half of a connection.
pub struct LineWriter<W> {
    inner: W,
    write_timeout: Duration,
}

impl<W: AsyncWrite + Unpin + Send> LineWriter<W> {
    pub fn new(inner: W, config: &TransportConfig) -> Self {
        Self {
            inner,
            write_timeout: config.write_timeout,
        }
    }

    async fn send_bytes(&mut self, parts: &[&[u8]]) -> anyhow::Result<()> {
        let d = self.write_timeout;
        let inner = &mut self.inner;
        let op = async {
            for part in parts {
                inner.write_all(part).await.map_err(write_error)?;
            }
            inner.flush().await.map_err(write_error)?;
            anyhow::Ok(())
        };
        timeout(d, op)
            .await
            .map_err(|_| anyhow::anyhow!("Send timeout after {:?}", d))?
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> LineWrite for LineWriter<W> {
    async fn write_line(&mut self, line: &str) -> anyhow::Result<()> {
        log::debug!("-> {}", line);
        self.send_bytes(&[line.as_bytes(), b"\n"]).await
    }

    async fn write_all(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.send_bytes(&[data]).await
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.inner.shutdown().await.map_err(write_error)
    }
}

/// Both halves of a connection.
pub struct LineTransport<R, W> {
    reader: LineReader<R>,
    writer: LineWriter<W>,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn from_halves(read: R, write: W, config: &TransportConfig) -> Self {
        Self {
            reader: LineReader::new(read, config),
            writer: LineWriter::new(write, config),
        }
    }

    /// Separate the halves so they can be driven from different tasks.
    pub fn into_split(self) -> (LineReader<R>, LineWriter<W>) {
        (self.reader, self.writer)
    }
}

#[async_trait::async_trait]
impl<R, W> LineRead for LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        self.reader.read_line().await
    }

    async fn watch_line(&mut self) -> anyhow::Result<Option<String>> {
        self.reader.watch_line().await
    }

    async fn read_exact(&mut self, len: usize) -> anyhow::Result<Vec<u8>> {
        self.reader.read_exact(len).await
    }
}

#[async_trait::async_trait]
impl<R, W> LineWrite for LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn write_line(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_line(line).await
    }

    async fn write_all(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.writer.write_all(data).await
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.writer.shutdown().await
    }
}
