//! End-to-end tests against a real listener and WebSocket clients.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use talkpair_relay::{hub, serve, Coordinator, HubHandle};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_relay() -> (SocketAddr, HubHandle) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (handle, _task) = hub::spawn(Coordinator::with_seed(32, 11));
    tokio::spawn(serve(listener, handle.clone(), 64));
    (addr, handle)
}

/// Connect and consume the `hello` frame, returning the assigned id.
async fn connect(addr: SocketAddr) -> (Client, String) {
    let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    let hello = next(&mut ws).await;
    assert_eq!(hello["type"], "hello");
    let id = hello["id"].as_str().unwrap().to_string();
    (ws, id)
}

async fn send(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn next(ws: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Next frame of the given type, skipping anything else.
async fn next_of(ws: &mut Client, kind: &str) -> Value {
    loop {
        let value = next(ws).await;
        if value["type"] == kind {
            return value;
        }
    }
}

#[tokio::test]
async fn alice_and_bob_negotiate_and_hang_up() {
    let (addr, _hub) = start_relay().await;
    let (mut x, x_id) = connect(addr).await;
    let (mut y, y_id) = connect(addr).await;

    send(&mut x, json!({"type": "register", "name": "Alice"})).await;
    assert_eq!(next_of(&mut x, "status").await["message"], "Registered as Alice");
    send(&mut y, json!({"type": "register", "name": "Bob"})).await;
    assert_eq!(next_of(&mut y, "status").await["message"], "Registered as Bob");

    send(&mut x, json!({"type": "find-partner"})).await;
    next_of(&mut x, "waiting").await;
    send(&mut y, json!({"type": "find-partner"})).await;

    let x_found = next_of(&mut x, "partner-found").await;
    let y_found = next_of(&mut y, "partner-found").await;
    assert_eq!(x_found["partnerId"], y_id.as_str());
    assert_eq!(x_found["partnerName"], "Bob");
    assert_eq!(y_found["partnerId"], x_id.as_str());
    assert_eq!(y_found["partnerName"], "Alice");
    assert_ne!(x_found["initiator"], y_found["initiator"]);

    let offer = json!({"type": "offer", "sdp": "v=0\r\ns=-\r\n"});
    send(&mut x, json!({"type": "signal", "to": y_id, "offer": offer})).await;
    assert_eq!(
        next_of(&mut y, "signal").await,
        json!({"type": "signal", "from": x_id, "offer": offer})
    );

    // Legacy form: no `to`, routed to the partner.
    send(&mut y, json!({"type": "signal", "answer": {"sdp": "a"}})).await;
    assert_eq!(
        next_of(&mut x, "signal").await,
        json!({"type": "signal", "from": y_id, "answer": {"sdp": "a"}})
    );

    send(&mut y, json!({"type": "end-call", "partnerId": x_id})).await;
    next_of(&mut x, "call-ended").await;
}

#[tokio::test]
async fn closing_socket_notifies_partner() {
    let (addr, hub) = start_relay().await;
    let (mut x, _) = connect(addr).await;
    let (mut y, _) = connect(addr).await;

    send(&mut x, json!({"type": "register", "name": "Alice"})).await;
    send(&mut y, json!({"type": "register", "name": "Bob"})).await;
    send(&mut x, json!({"type": "find-partner"})).await;
    next_of(&mut x, "waiting").await;
    send(&mut y, json!({"type": "find-partner"})).await;
    next_of(&mut y, "partner-found").await;

    x.close(None).await.unwrap();
    next_of(&mut y, "partner-left").await;
    assert_eq!(next_of(&mut y, "presence-count").await["count"], 1);

    let stats = hub.stats().await.unwrap();
    assert_eq!(stats.connections, 1);
    assert_eq!(stats.pairs, 0);
}

#[tokio::test]
async fn waiting_client_leaving_empties_slot() {
    let (addr, hub) = start_relay().await;
    let (mut x, _) = connect(addr).await;
    send(&mut x, json!({"type": "register", "name": "Alice"})).await;
    send(&mut x, json!({"type": "find-partner"})).await;
    next_of(&mut x, "waiting").await;
    drop(x);

    let mut stats = hub.stats().await.unwrap();
    for _ in 0..50 {
        if stats.connections == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        stats = hub.stats().await.unwrap();
    }
    assert_eq!(stats.connections, 0);
    assert!(!stats.waiting);
}

#[tokio::test]
async fn malformed_frames_get_status_and_keep_socket_open() {
    let (addr, _hub) = start_relay().await;
    let (mut x, _) = connect(addr).await;

    x.send(Message::Text("{not json".to_string().into())).await.unwrap();
    let status = next_of(&mut x, "status").await;
    assert!(status["message"]
        .as_str()
        .unwrap()
        .starts_with("Unrecognized command"));

    send(&mut x, json!({"type": "self-destruct"})).await;
    next_of(&mut x, "status").await;

    send(&mut x, json!({"type": "register", "name": "Still here"})).await;
    assert_eq!(
        next_of(&mut x, "status").await["message"],
        "Registered as Still here"
    );
}

#[tokio::test]
async fn signal_to_unknown_target_is_silent() {
    let (addr, _hub) = start_relay().await;
    let (mut x, _) = connect(addr).await;
    send(&mut x, json!({"type": "register", "name": "Alice"})).await;
    next_of(&mut x, "status").await;
    next_of(&mut x, "presence-count").await;

    send(
        &mut x,
        json!({"type": "signal", "to": "00000000-0000-4000-8000-000000000000", "offer": {}}),
    )
    .await;
    // A later command is answered first, so nothing came back for the signal.
    send(&mut x, json!({"type": "end-call"})).await;
    let reply = next(&mut x).await;
    assert_eq!(reply, json!({"type": "status", "message": "You are not in a call"}));
}

/// Raw text of the next frame of the given type, skipping anything else.
async fn next_text_of(ws: &mut Client, kind: &str) -> String {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            let value: Value = serde_json::from_str(&text).unwrap();
            if value["type"] == kind {
                return text.as_str().to_owned();
            }
        }
    }
}

#[tokio::test]
async fn signal_payload_is_forwarded_exactly() {
    let (addr, _hub) = start_relay().await;
    let (mut x, x_id) = connect(addr).await;
    let (mut y, y_id) = connect(addr).await;
    send(&mut x, json!({"type": "register", "name": "Alice"})).await;
    send(&mut y, json!({"type": "register", "name": "Bob"})).await;
    next_of(&mut x, "status").await;
    next_of(&mut y, "status").await;

    let frame = format!(
        r#"{{"type":"signal","to":"{y_id}","zeta":1,"from":"forged","alpha":1e5,"big":12345678901234567890123}}"#
    );
    x.send(Message::Text(frame.into())).await.unwrap();

    assert_eq!(
        next_text_of(&mut y, "signal").await,
        format!(r#"{{"type":"signal","from":"{x_id}","zeta":1,"alpha":1e5,"big":12345678901234567890123}}"#)
    );
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (addr, _hub) = start_relay().await;
    let (mut x, _) = connect(addr).await;

    x.send(Message::Ping(b"are you there".to_vec().into()))
        .await
        .unwrap();
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), x.next())
            .await
            .expect("timed out waiting for pong")
            .expect("socket closed")
            .unwrap();
        if let Message::Pong(data) = frame {
            assert_eq!(&data[..], b"are you there");
            break;
        }
    }
}
