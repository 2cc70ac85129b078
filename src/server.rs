use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::conn::{ConnEvent, ConnId, Connection};
use crate::state::{Outbox, ServerState};

/// How long shutdown waits for writers to flush before giving up on them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// The event loop. It alone owns the protocol state and every connection
/// handle; reader tasks reach it only through `events`.
pub struct Server {
    listener: TcpListener,
    state: ServerState,
    conns: HashMap<ConnId, Connection>,
    events_tx: mpsc::UnboundedSender<ConnEvent>,
    events_rx: mpsc::UnboundedReceiver<ConnEvent>,
    next_id: u64,
}

impl Server {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            listener,
            state: ServerState::new(),
            conns: HashMap::new(),
            events_tx,
            events_rx,
            next_id: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until `shutdown` resolves, then closes every connection and
    /// waits up to `SHUTDOWN_GRACE` for queued lines to be written.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("listening on {}", self.local_addr()?);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => self.accept(socket, peer),
                    Err(err) => warn!("accept failed: {err}"),
                },

                Some(event) = self.events_rx.recv() => match event {
                    ConnEvent::Data(id, bytes) => {
                        let out = self.state.feed(id, &bytes);
                        self.deliver(out);
                    }
                    ConnEvent::Closed(id) => self.teardown(id),
                },
            }
        }

        for (name, members) in self.state.rooms().list_rooms() {
            info!(room = %name, members, "room at shutdown");
        }

        for id in self.state.registry().ids() {
            self.state.disconnect(id);
        }
        let writers: Vec<_> = self.conns.drain().map(|(_, conn)| conn.close()).collect();

        for writer in writers {
            if tokio::time::timeout(SHUTDOWN_GRACE, writer).await.is_err() {
                warn!("writer did not finish within {SHUTDOWN_GRACE:?}");
            }
        }

        info!("server shutdown complete");

        Ok(())
    }

    fn accept(&mut self, socket: TcpStream, peer: SocketAddr) {
        let id = ConnId(self.next_id);
        self.next_id += 1;

        let conn = Connection::spawn(id, socket, peer, self.events_tx.clone());
        self.conns.insert(id, conn);
        self.state.connect(id);

        info!(conn = %id, %peer, online = self.state.registry().len(), "connection accepted");
    }

    fn teardown(&mut self, id: ConnId) {
        let out = self.state.disconnect(id);
        self.deliver(out);

        if let Some(conn) = self.conns.remove(&id) {
            info!(conn = %id, peer = %conn.peer, online = self.state.registry().len(), "connection closed");
            conn.close();
        }
    }

    fn deliver(&mut self, out: Outbox) {
        for (to, reply) in &out.deliveries {
            if let Some(conn) = self.conns.get(to) {
                conn.send(reply);
            }
        }

        for id in out.closing {
            if let Some(conn) = self.conns.remove(&id) {
                info!(conn = %id, peer = %conn.peer, online = self.state.registry().len(), "connection closed by client");
                conn.close();
            }
        }
    }
}
