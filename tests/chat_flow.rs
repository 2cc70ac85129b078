//! End-to-end tests against a live server on an ephemeral port.

use std::net::SocketAddr;
use std::time::Duration;

use chatline::{Reply, Server};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(150);

struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let server = Server::bind("127.0.0.1:0").await.expect("bind");
        let addr = server.local_addr().expect("local addr");
        let (shutdown, rx) = oneshot::channel::<()>();

        tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        Self { addr, shutdown: Some(shutdown) }
    }

    async fn client(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect");
        let (reader, writer) = stream.into_split();

        TestClient {
            reader: BufReader::new(reader),
            writer,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write");
        self.writer.flush().await.expect("flush");
    }

    async fn send(&mut self, line: &str) {
        self.raw(format!("{line}\n").as_bytes()).await;
    }

    /// Next server line, or `None` on EOF.
    async fn recv(&mut self) -> Option<Reply> {
        let mut line = String::new();
        let n = timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .expect("read");

        if n == 0 {
            return None;
        }

        Some(line.parse().expect("well-formed server line"))
    }

    async fn expect(&mut self, reply: Reply) {
        assert_eq!(self.recv().await, Some(reply));
    }

    /// Asserts nothing arrives for a short while.
    async fn expect_silence(&mut self) {
        let mut line = String::new();
        let res = timeout(QUIET, self.reader.read_line(&mut line)).await;
        assert!(res.is_err(), "unexpected line: {line:?}");
    }

    async fn named(server: &TestServer, nick: &str) -> Self {
        let mut client = server.client().await;
        client.send(&format!("/nick {nick}")).await;
        client.expect(Reply::Ok).await;
        client
    }
}

fn joined(nick: &str) -> Reply {
    Reply::Joined(nick.into())
}

fn left(nick: &str) -> Reply {
    Reply::Left(nick.into())
}

#[tokio::test]
async fn scenario_two_clients() {
    let server = TestServer::start().await;
    let mut a = server.client().await;
    let mut b = server.client().await;

    a.send("/nick alice").await;
    a.expect(Reply::Ok).await;

    b.send("/nick alice").await;
    b.expect(Reply::Error).await;
    b.send("/nick bob").await;
    b.expect(Reply::Ok).await;

    a.send("/join lobby").await;
    a.expect(Reply::Ok).await;

    b.send("/join lobby").await;
    b.expect(Reply::Ok).await;
    a.expect(joined("bob")).await;

    a.send("hello").await;
    b.expect(Reply::Message { nick: "alice".into(), text: "hello".into() }).await;
    a.expect_silence().await;

    b.send("/bye").await;
    b.expect(Reply::Bye).await;
    assert_eq!(b.recv().await, None);

    a.expect(left("bob")).await;
}

#[tokio::test]
async fn fragmented_command_is_reassembled() {
    let server = TestServer::start().await;
    let mut a = TestClient::named(&server, "alice").await;

    a.raw(b"/jo").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    a.raw(b"in room1\n").await;

    a.expect(Reply::Ok).await;
    a.expect_silence().await;

    a.send("/leave").await;
    a.expect(Reply::Ok).await;
}

#[tokio::test]
async fn switching_rooms_notifies_both_rooms() {
    let server = TestServer::start().await;
    let mut a = TestClient::named(&server, "alice").await;
    let mut b = TestClient::named(&server, "bob").await;
    let mut c = TestClient::named(&server, "carol").await;

    a.send("/join lobby").await;
    a.expect(Reply::Ok).await;
    b.send("/join attic").await;
    b.expect(Reply::Ok).await;
    c.send("/join lobby").await;
    c.expect(Reply::Ok).await;
    a.expect(joined("carol")).await;

    c.send("/join attic").await;
    a.expect(left("carol")).await;
    b.expect(joined("carol")).await;
    c.expect(Reply::Ok).await;

    c.send("up here").await;
    b.expect(Reply::Message { nick: "carol".into(), text: "up here".into() }).await;
    a.expect_silence().await;
}

#[tokio::test]
async fn private_messages() {
    let server = TestServer::start().await;
    let mut a = TestClient::named(&server, "alice").await;
    let mut b = TestClient::named(&server, "bob").await;

    a.send("/priv nobody hi").await;
    a.expect(Reply::Error).await;

    a.send("/priv bob are you there?").await;
    a.expect(Reply::Ok).await;
    b.expect(Reply::Private { nick: "alice".into(), text: "are you there?".into() }).await;
}

#[tokio::test]
async fn errors_leave_session_usable() {
    let server = TestServer::start().await;
    let mut a = server.client().await;

    for line in ["/join lobby", "/leave", "hello", "/dance", "/nick", "/priv bob hi"] {
        a.send(line).await;
        a.expect(Reply::Error).await;
    }

    a.send("/nick alice").await;
    a.expect(Reply::Ok).await;
    a.send("/leave extra").await;
    a.expect(Reply::Error).await;
}

#[tokio::test]
async fn abrupt_disconnect_leaves_room_and_frees_nick() {
    let server = TestServer::start().await;
    let mut a = TestClient::named(&server, "alice").await;
    let mut b = TestClient::named(&server, "bob").await;

    a.send("/join lobby").await;
    a.expect(Reply::Ok).await;
    b.send("/join lobby").await;
    b.expect(Reply::Ok).await;
    a.expect(joined("bob")).await;

    drop(b);
    a.expect(left("bob")).await;

    let mut c = server.client().await;
    c.send("/nick bob").await;
    c.expect(Reply::Ok).await;
}

#[tokio::test]
async fn shutdown_closes_connections_before_returning() {
    let server = Server::bind("127.0.0.1:0").await.expect("bind");
    let addr = server.local_addr().expect("local addr");
    let (stop, rx) = oneshot::channel::<()>();

    let running = tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));

    let handle = TestServer { addr, shutdown: None };
    let mut a = TestClient::named(&handle, "alice").await;

    stop.send(()).expect("server still running");
    timeout(WAIT, running)
        .await
        .expect("server did not stop")
        .expect("server task panicked")
        .expect("server returned an error");

    assert_eq!(a.recv().await, None);
}
