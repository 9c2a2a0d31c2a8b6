//! Integration tests for the compositor IPC client.
//!
//! The compositor side is played by a second `IpcClient` over an in-memory
//! duplex pipe.

use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

use sway_freezer::ipc::{
    CommandType, Event, EventKind, Frame, IpcClient, IpcError, EVENT_FLAG, HEADER_LEN,
};

fn pair() -> (IpcClient<DuplexStream>, IpcClient<DuplexStream>) {
    let (a, b) = duplex(64 * 1024);
    (IpcClient::new(a), IpcClient::new(b))
}

#[tokio::test]
async fn test_request_echo_round_trip() {
    let (mut client, mut peer) = pair();

    let server = tokio::spawn(async move {
        let request = peer.read_frame().await.unwrap();
        peer.write_frame(&request).await.unwrap();
        request
    });

    let payload = br#"["window"]"#;
    let reply = client.send_command(7, payload).await.unwrap();
    let seen = server.await.unwrap();

    assert_eq!(seen.kind, 7);
    assert_eq!(reply.kind, 7);
    assert_eq!(reply.payload.len(), payload.len());
    assert_eq!(reply.payload, payload);
}

#[tokio::test]
async fn test_subscribe_ack_and_rejection() {
    let (mut client, mut peer) = pair();

    let server = tokio::spawn(async move {
        let first = peer.read_frame().await.unwrap();
        let names: Vec<String> = serde_json::from_slice(&first.payload).unwrap();
        assert_eq!(names, vec!["window", "shutdown"]);
        peer.write_frame(&Frame::new(first.kind, br#"{"success": true}"#.to_vec()))
            .await
            .unwrap();

        let second = peer.read_frame().await.unwrap();
        peer.write_frame(&Frame::new(
            second.kind,
            br#"{"success": false, "error": "unknown event"}"#.to_vec(),
        ))
        .await
        .unwrap();
    });

    client
        .subscribe(&[EventKind::Window, EventKind::Shutdown])
        .await
        .unwrap();
    match client.subscribe(&[EventKind::Window]).await {
        Err(IpcError::Rejected(msg)) => assert_eq!(msg, "unknown event"),
        other => panic!("expected rejection, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_events_arrive_in_wire_order() {
    let (mut client, mut peer) = pair();

    let focus = |app: &str| {
        format!(r#"{{"change": "focus", "container": {{"id": 1, "app_id": "{app}", "pid": 100, "focused": true}}}}"#)
    };
    for app in ["firefox", "foot"] {
        peer.write_frame(&Frame::new(EventKind::Window.frame_type(), focus(app)))
            .await
            .unwrap();
    }
    peer.write_frame(&Frame::new(EVENT_FLAG | 0x14, b"{}".to_vec()))
        .await
        .unwrap();
    peer.write_frame(&Frame::new(
        EventKind::Shutdown.frame_type(),
        br#"{"change": "exit"}"#.to_vec(),
    ))
    .await
    .unwrap();

    let mut apps = Vec::new();
    for _ in 0..2 {
        match client.next_event().await.unwrap() {
            Event::Window(ev) => apps.push(ev.focus_change().unwrap().app_id),
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(apps, vec!["firefox", "foot"]);
    assert!(matches!(client.next_event().await.unwrap(), Event::Other(k) if k == EVENT_FLAG | 0x14));
    assert!(matches!(client.next_event().await.unwrap(), Event::Shutdown));
}

#[tokio::test]
async fn test_frame_split_across_writes() {
    let (client_io, mut raw_peer) = duplex(1024);
    let mut client = IpcClient::new(client_io);

    let bytes = Frame::new(EventKind::Shutdown.frame_type(), b"{}".to_vec())
        .encode()
        .unwrap();
    let writer = tokio::spawn(async move {
        for chunk in bytes.chunks(3) {
            raw_peer.write_all(chunk).await.unwrap();
            tokio::task::yield_now().await;
        }
        raw_peer
    });

    assert!(matches!(client.next_event().await.unwrap(), Event::Shutdown));
    drop(writer.await.unwrap());
}

#[tokio::test]
async fn test_get_tree_lists_windows() {
    let (mut client, mut peer) = pair();

    let server = tokio::spawn(async move {
        let request = peer.read_frame().await.unwrap();
        assert_eq!(request.kind, CommandType::GetTree.code());
        assert!(request.payload.is_empty());
        let tree = br#"{"id": 1, "nodes": [
            {"id": 2, "nodes": [
                {"id": 3, "app_id": "firefox", "pid": 1200, "focused": false, "nodes": []},
                {"id": 4, "app_id": "foot", "pid": 1300, "focused": true, "nodes": []}
            ]}
        ]}"#;
        peer.write_frame(&Frame::new(request.kind, tree.to_vec()))
            .await
            .unwrap();
    });

    let windows = client.get_tree().await.unwrap().windows();
    server.await.unwrap();

    assert_eq!(windows.len(), 2);
    let firefox = windows.iter().find(|w| w.app_id == "firefox").unwrap();
    assert_eq!(firefox.pid, 1200);
    assert!(!firefox.focused);
}

#[tokio::test]
async fn test_mismatched_reply_type_is_an_error() {
    let (mut client, mut peer) = pair();

    tokio::spawn(async move {
        let request = peer.read_frame().await.unwrap();
        peer.write_frame(&Frame::new(request.kind + 1, Vec::new()))
            .await
            .unwrap();
    });

    assert!(matches!(
        client.get_tree().await,
        Err(IpcError::UnexpectedReply { expected: 4, got: 5 })
    ));
}

#[tokio::test]
async fn test_bad_magic_and_disconnect() {
    let (client_io, mut raw_peer) = duplex(1024);
    let mut client = IpcClient::new(client_io);

    let mut garbage = vec![0u8; HEADER_LEN];
    garbage[..6].copy_from_slice(b"i4-ipc");
    raw_peer.write_all(&garbage).await.unwrap();
    assert!(matches!(client.read_frame().await, Err(IpcError::BadMagic(_))));

    let (client_io, raw_peer) = duplex(1024);
    let mut client = IpcClient::new(client_io);
    drop(raw_peer);
    assert!(matches!(client.next_event().await, Err(IpcError::Disconnected)));
}
