//! Integration test: boots an in-process TCP server that plays the module
//! gateway, connects a real [`DeviceClient`] over `TcpConnector`, and
//! asserts the handshake, status/command cycle and reconnect behaviour.
//!
//! Each accepted connection follows a [`ConnScript`]: the handshake verdict
//! to return, then one [`StatusReply`] per status received.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mg_device_sdk::{
    ClientError, ConnectionState, DeviceClient, DeviceClientBuilder, ErrorKind, Rejection,
};
use mg_protocol::{
    decode_header, encode_frame, ClientMessage, ClientPayload, Device, DeviceStatus, Message,
    ResponseType, ServerMessage, FRAME_HEADER_LEN,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

// ── Mini gateway ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum StatusReply {
    Command(Vec<u8>),
    /// Announce `n` payload bytes, then close without sending them.
    CloseAfterPrefix(u32),
    /// Read the status and never answer.
    Hang,
    /// Answer a status with a handshake response.
    NotACommand,
}

#[derive(Debug, Clone)]
struct ConnScript {
    handshake: ResponseType,
    replies: Vec<StatusReply>,
}

impl ConnScript {
    fn accept(replies: Vec<StatusReply>) -> Self {
        Self {
            handshake: ResponseType::Ok,
            replies,
        }
    }

    fn reject(code: ResponseType) -> Self {
        Self {
            handshake: code,
            replies: Vec::new(),
        }
    }
}

/// What the gateway saw from the device.
#[derive(Debug)]
enum Seen {
    Connect(Device),
    Status(DeviceStatus),
}

struct MiniGateway {
    addr: SocketAddr,
    seen: mpsc::UnboundedReceiver<Seen>,
    accepted: Arc<AtomicUsize>,
}

impl MiniGateway {
    fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    fn client(&self) -> DeviceClientBuilder {
        DeviceClientBuilder::new()
            .host(self.addr.ip().to_string())
            .port(self.addr.port())
            .connect_timeout(Duration::from_secs(2))
            .module_id(1)
            .device_name("button1")
            .device_type(0)
            .device_role("left_button")
    }
}

/// Connection `i` follows `scripts[i]`; extra connections reuse the last.
async fn start_mini_gateway(scripts: Vec<ConnScript>) -> MiniGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen) = mpsc::unbounded_channel();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        while let Ok((stream, _peer)) = listener.accept().await {
            let index = counter.fetch_add(1, Ordering::SeqCst);
            let script = scripts[index.min(scripts.len() - 1)].clone();
            tokio::spawn(serve(stream, script, seen_tx.clone()));
        }
    });

    MiniGateway {
        addr,
        seen,
        accepted,
    }
}

async fn serve(mut stream: TcpStream, script: ConnScript, seen: mpsc::UnboundedSender<Seen>) {
    let Some(hello) = read_client_message(&mut stream).await else {
        return;
    };
    if let Some(ClientPayload::DeviceConnect(connect)) = hello.payload {
        let _ = seen.send(Seen::Connect(connect.device.unwrap_or_default()));
    }
    write_server_message(&mut stream, ServerMessage::connect_response(script.handshake)).await;
    if script.handshake != ResponseType::Ok {
        return;
    }

    for reply in script.replies {
        let Some(msg) = read_client_message(&mut stream).await else {
            return;
        };
        if let Some(ClientPayload::DeviceStatus(status)) = msg.payload {
            let _ = seen.send(Seen::Status(status));
        }
        match reply {
            StatusReply::Command(data) => {
                write_server_message(&mut stream, ServerMessage::command(data)).await
            }
            StatusReply::CloseAfterPrefix(n) => {
                let _ = stream.write_all(&n.to_be_bytes()).await;
                return;
            }
            StatusReply::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                return;
            }
            StatusReply::NotACommand => {
                write_server_message(&mut stream, ServerMessage::connect_response(ResponseType::Ok))
                    .await
            }
        }
    }
}

async fn read_client_message(stream: &mut TcpStream) -> Option<ClientMessage> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    stream.read_exact(&mut header).await.ok()?;
    let mut body = vec![0u8; decode_header(header)];
    stream.read_exact(&mut body).await.ok()?;
    ClientMessage::decode(body.as_slice()).ok()
}

async fn write_server_message(stream: &mut TcpStream, msg: ServerMessage) {
    let frame = encode_frame(&msg.encode_to_vec()).unwrap();
    let _ = stream.write_all(&frame).await;
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn handshake_and_status_roundtrip() {
    let mut gw = start_mini_gateway(vec![ConnScript::accept(vec![
        StatusReply::Command(b"cmd-1".to_vec()),
        StatusReply::Command(b"cmd-2".to_vec()),
    ])])
    .await;

    let mut client = gw.client().device_priority(2).connect().await.unwrap();
    assert!(client.is_connected());
    assert_eq!(client.state(), ConnectionState::Connected);

    // ── Assert device_connect ────────────────────────────────────────
    match gw.seen.recv().await.unwrap() {
        Seen::Connect(device) => {
            assert_eq!(device.module, 1);
            assert_eq!(device.device_name, "button1");
            assert_eq!(device.device_type, 0);
            assert_eq!(device.device_role, "left_button");
            assert_eq!(device.priority, 2);
        }
        other => panic!("expected device_connect, got: {other:?}"),
    }

    // ── No command before the first status ───────────────────────────
    assert!(matches!(client.get_command(), Err(ClientError::NoCommand)));

    // ── Status → command ─────────────────────────────────────────────
    client.send_status(br#"{"pressed":true}"#, 2_000).await.unwrap();
    match gw.seen.recv().await.unwrap() {
        Seen::Status(status) => {
            assert_eq!(status.status_data, br#"{"pressed":true}"#);
            assert_eq!(status.device.unwrap().device_name, "button1");
        }
        other => panic!("expected device_status, got: {other:?}"),
    }
    assert_eq!(client.get_command().unwrap(), b"cmd-1");
    assert_eq!(client.get_command().unwrap(), b"cmd-1");

    client.send_status(br#"{"pressed":false}"#, 2_000).await.unwrap();
    assert_eq!(client.get_command().unwrap(), b"cmd-2");
    assert_eq!(gw.accepted(), 1);

    client.destroy();
    assert_eq!(client.state(), ConnectionState::Destroyed);
}

#[tokio::test]
async fn each_rejection_code_stops_after_one_attempt() {
    let cases = [
        (ResponseType::AlreadyConnected, Rejection::AlreadyConnected),
        (ResponseType::ModuleNotSupported, Rejection::ModuleNotSupported),
        (ResponseType::DeviceNotSupported, Rejection::DeviceNotSupported),
        (
            ResponseType::HigherPriorityAlreadyConnected,
            Rejection::HigherPriorityAlreadyConnected,
        ),
    ];
    for (code, expected) in cases {
        let gw = start_mini_gateway(vec![ConnScript::reject(code)]).await;
        let err = gw
            .client()
            .connection_retry_count(3)
            .connect()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rejection(expected), "{err}");
        assert_eq!(gw.accepted(), 1, "rejection {expected:?} must not be retried");
    }
}

#[tokio::test]
async fn truncated_response_reconnects_and_resends() {
    let mut gw = start_mini_gateway(vec![
        ConnScript::accept(vec![StatusReply::CloseAfterPrefix(10)]),
        ConnScript::accept(vec![StatusReply::Command(b"after-reconnect".to_vec())]),
    ])
    .await;

    let mut client = gw.client().connect().await.unwrap();
    client.send_status(b"s", 2_000).await.unwrap();
    assert_eq!(client.get_command().unwrap(), b"after-reconnect");
    assert_eq!(gw.accepted(), 2);

    // connect, status, connect, status
    let mut statuses = 0;
    while let Ok(seen) = gw.seen.try_recv() {
        if let Seen::Status(s) = seen {
            assert_eq!(s.status_data, b"s");
            statuses += 1;
        }
    }
    assert_eq!(statuses, 2);
}

#[tokio::test]
async fn persistent_truncation_exhausts_budget_and_destroys() {
    let gw = start_mini_gateway(vec![ConnScript::accept(vec![
        StatusReply::CloseAfterPrefix(10),
    ])])
    .await;

    let mut client = gw.client().send_retry_count(2).connect().await.unwrap();
    let err = client.send_status(b"s", 2_000).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    assert!(err.to_string().contains("expected 10 bytes, got 0 bytes"), "{err}");
    assert_eq!(client.state(), ConnectionState::Destroyed);
    // initial connection + one per retry iteration
    assert_eq!(gw.accepted(), 3);

    assert!(matches!(
        client.send_status(b"s", 2_000).await,
        Err(ClientError::ContextDestroyed)
    ));
    assert!(matches!(client.get_command(), Err(ClientError::ContextDestroyed)));
}

#[tokio::test]
async fn rejection_while_reconnecting_destroys_immediately() {
    let gw = start_mini_gateway(vec![
        ConnScript::accept(vec![StatusReply::CloseAfterPrefix(4)]),
        ConnScript::reject(ResponseType::HigherPriorityAlreadyConnected),
    ])
    .await;

    let mut client = gw.client().send_retry_count(5).connect().await.unwrap();
    let err = client.send_status(b"s", 2_000).await.unwrap_err();
    assert_eq!(
        err.kind(),
        ErrorKind::Rejection(Rejection::HigherPriorityAlreadyConnected)
    );
    assert_eq!(client.state(), ConnectionState::Destroyed);
    assert_eq!(gw.accepted(), 2);
}

#[tokio::test]
async fn status_timeout_is_retried_on_new_connection() {
    let gw = start_mini_gateway(vec![
        ConnScript::accept(vec![StatusReply::Hang]),
        ConnScript::accept(vec![StatusReply::Command(b"late".to_vec())]),
    ])
    .await;

    let mut client = gw.client().connect().await.unwrap();
    client.send_status(b"s", 200).await.unwrap();
    assert_eq!(client.get_command().unwrap(), b"late");
    assert_eq!(gw.accepted(), 2);
}

#[tokio::test]
async fn status_timeout_without_recovery_surfaces_timeout() {
    let gw = start_mini_gateway(vec![ConnScript::accept(vec![StatusReply::Hang])]).await;

    let mut client = gw.client().connect().await.unwrap();
    let err = client.send_status(b"s", 100).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(client.state(), ConnectionState::Destroyed);
}

#[tokio::test]
async fn missing_command_is_malformed_and_not_retried() {
    let gw = start_mini_gateway(vec![ConnScript::accept(vec![StatusReply::NotACommand])]).await;

    let mut client = gw.client().send_retry_count(3).connect().await.unwrap();
    let err = client.send_status(b"s", 2_000).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    assert!(err.to_string().contains("device_command missing"));
    assert_eq!(gw.accepted(), 1);
    assert!(client.is_connected());
    assert!(matches!(client.get_command(), Err(ClientError::NoCommand)));
}

#[tokio::test]
async fn negative_timeout_issues_no_io() {
    let mut gw = start_mini_gateway(vec![ConnScript::accept(vec![StatusReply::Command(
        b"unused".to_vec(),
    )])])
    .await;

    let mut client = gw.client().connect().await.unwrap();
    assert!(matches!(gw.seen.recv().await, Some(Seen::Connect(_))));

    let err = client.send_status(b"s", -1).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidTimeout(-1)));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(gw.seen.try_recv().is_err(), "no status may reach the gateway");
    assert!(client.is_connected());
}

#[tokio::test]
async fn refused_port_exhausts_connection_budget() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = DeviceClient::builder()
        .host("127.0.0.1")
        .port(port)
        .device_name("button1")
        .connection_retry_count(2)
        .connect()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
    assert!(err.to_string().contains("gave up after 2 attempts"), "{err}");
}

#[tokio::test]
async fn destroy_twice_is_harmless() {
    let gw = start_mini_gateway(vec![ConnScript::accept(vec![])]).await;
    let mut client = gw.client().connect().await.unwrap();
    client.destroy();
    assert_eq!(client.state(), ConnectionState::Destroyed);
    client.destroy();
    assert_eq!(client.state(), ConnectionState::Destroyed);
}
