use std::fmt;
use std::net::SocketAddr;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

use crate::protocol::Reply;

/// Size of the scratch buffer each read lands in.
pub const READ_BUF_SIZE: usize = 16 * 1024;

/// Opaque identity of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What reader tasks report to the event loop.
#[derive(Debug)]
pub enum ConnEvent {
    Data(ConnId, Vec<u8>),
    Closed(ConnId),
}

enum Outbound {
    Line(String),
    Close,
}

/// The event loop's handle on a live connection. Writes are queued to the
/// connection's writer task; dropping the handle without `close` leaves the
/// writer running until its queue is drained.
pub struct Connection {
    pub peer: SocketAddr,
    tx: mpsc::UnboundedSender<Outbound>,
    reader: AbortHandle,
    writer: JoinHandle<()>,
}

impl Connection {
    /// Splits `socket` into a reader task feeding `events` and a writer task
    /// draining this handle's queue.
    pub fn spawn(
        id: ConnId,
        socket: TcpStream,
        peer: SocketAddr,
        events: mpsc::UnboundedSender<ConnEvent>,
    ) -> Self {
        let (reader, writer) = socket.into_split();

        let (tx, rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(async move {
            if let Err(err) = read_loop(id, reader, &events).await {
                warn!(conn = %id, "read error: {err:?}");
            }

            let _ = events.send(ConnEvent::Closed(id));
        })
        .abort_handle();

        let writer = tokio::spawn(async move {
            if let Err(err) = write_loop(writer, rx).await {
                warn!(conn = %id, "write error: {err:?}");
            }
        });

        Self { peer, tx, reader, writer }
    }

    pub fn send(&self, reply: &Reply) {
        let _ = self.tx.send(Outbound::Line(reply.to_line()));
    }

    /// Flushes queued lines, then shuts the socket down. No further events
    /// are reported for this connection. The returned handle completes once
    /// the writer is done.
    pub fn close(self) -> JoinHandle<()> {
        self.reader.abort();
        let _ = self.tx.send(Outbound::Close);
        self.writer
    }
}

async fn read_loop(
    id: ConnId,
    mut reader: OwnedReadHalf,
    events: &mpsc::UnboundedSender<ConnEvent>,
) -> Result<()> {
    let mut buf = vec![0u8; READ_BUF_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;

        if n == 0 {
            debug!(conn = %id, "eof");
            return Ok(());
        }

        if events.send(ConnEvent::Data(id, buf[..n].to_vec())).is_err() {
            // event loop is gone
            return Ok(());
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) -> Result<()> {
    while let Some(out) = rx.recv().await {
        match out {
            Outbound::Line(line) => writer.write_all(line.as_bytes()).await?,
            Outbound::Close => break,
        }
    }

    writer.shutdown().await?;

    Ok(())
}
