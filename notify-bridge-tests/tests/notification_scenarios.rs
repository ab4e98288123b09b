use notifier_core::{BackendCall, LoopbackBackend};
use notify_bridge::listener::{ListenerError, READ_CHUNK_SIZE};
use notify_bridge::notification_codec::{PayloadBoundary, QueryKindRule};
use notify_bridge::{
    BackendDriver, DriverError, ListenerConfig, NotificationListener, NotificationMessage,
    NotificationSender, PushGrammar, SessionState,
};
use notify_bridge_tests::{local_config, spawn_listener, spawn_listener_with, READ_GAP};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const SCENARIO_FRAME: &[u8] = b"PUSH 00:e0:4c:7d:f1:ac 0 I am good, thank you! :ENDNOT:";

const DAEMON: PushGrammar = PushGrammar {
    query_kind: QueryKindRule::Digit,
    payload_boundary: PayloadBoundary::TrimSeparator,
};

#[tokio::test]
async fn push_frame_is_split_into_fields() -> anyhow::Result<()> {
    let mut listener = spawn_listener(PushGrammar::default()).await?;

    let mut peer = TcpStream::connect(listener.addr).await?;
    peer.write_all(SCENARIO_FRAME).await?;

    let NotificationMessage::Push(push) = listener.next_message().await? else {
        anyhow::bail!("expected a push notification");
    };
    assert_eq!(push.sender_id.to_string(), "00:e0:4c:7d:f1:ac");
    assert_eq!(push.query_kind, b'0');
    assert_eq!(push.payload, &b"I am good, thank you! "[..]);

    drop(peer);
    assert_eq!(listener.finish().await?.delivered, 1);
    Ok(())
}

#[tokio::test]
async fn frames_written_together_are_all_delivered() -> anyhow::Result<()> {
    let mut listener = spawn_listener(PushGrammar::default()).await?;

    let mut frames = b"prob_req\nhl_query\n".to_vec();
    frames.extend_from_slice(SCENARIO_FRAME);
    frames.extend_from_slice(b"NEWNODEAddr:00:e0:4c:7d:f1:ac\n");

    let mut peer = TcpStream::connect(listener.addr).await?;
    peer.write_all(&frames).await?;
    drop(peer);

    assert_eq!(listener.next_message().await?, NotificationMessage::plain("prob_req"));
    assert_eq!(listener.next_message().await?, NotificationMessage::plain("hl_query"));
    assert!(listener.next_message().await?.is_push());
    assert_eq!(
        listener.next_message().await?,
        NotificationMessage::plain("NEWNODEAddr:00:e0:4c:7d:f1:ac")
    );

    let summary = listener.finish().await?;
    assert_eq!((summary.delivered, summary.rejected), (4, 0));
    Ok(())
}

#[tokio::test]
async fn frame_split_across_reads_is_reassembled() -> anyhow::Result<()> {
    let mut listener = spawn_listener(PushGrammar::default()).await?;
    let (head, tail) = SCENARIO_FRAME.split_at(SCENARIO_FRAME.len() - 4);

    let mut peer = TcpStream::connect(listener.addr).await?;
    peer.write_all(head).await?;
    tokio::time::sleep(READ_GAP).await;
    peer.write_all(tail).await?;

    let NotificationMessage::Push(push) = listener.next_message().await? else {
        anyhow::bail!("expected a push notification");
    };
    assert_eq!(push.payload, &b"I am good, thank you! "[..]);

    drop(peer);
    let summary = listener.finish().await?;
    assert_eq!((summary.delivered, summary.rejected), (1, 0));
    Ok(())
}

#[tokio::test]
async fn push_larger_than_read_chunk_keeps_its_payload() -> anyhow::Result<()> {
    let mut listener = spawn_listener(PushGrammar::default()).await?;
    let payload = "a".repeat(READ_CHUNK_SIZE + 76) + " tail ";

    let mut peer = TcpStream::connect(listener.addr).await?;
    peer.write_all(b"PUSH 00:e0:4c:7d:f1:ac 0 ").await?;
    peer.write_all(payload.as_bytes()).await?;
    peer.write_all(b":ENDNOT:prob_req\n").await?;
    drop(peer);

    let NotificationMessage::Push(push) = listener.next_message().await? else {
        anyhow::bail!("expected a push notification");
    };
    assert_eq!(push.payload, payload.as_bytes());
    assert_eq!(listener.next_message().await?, NotificationMessage::plain("prob_req"));

    let summary = listener.finish().await?;
    assert_eq!((summary.delivered, summary.rejected), (2, 0));
    Ok(())
}

#[tokio::test]
async fn unterminated_oversized_frame_is_rejected_once() -> anyhow::Result<()> {
    let mut listener = spawn_listener_with(ListenerConfig {
        max_frame_len: 256,
        ..local_config(PushGrammar::default())
    })
    .await?;

    let mut peer = TcpStream::connect(listener.addr).await?;
    peer.write_all(&[b'a'; 1000]).await?;
    tokio::time::sleep(READ_GAP).await;
    peer.write_all(b"aaaa\nhl_query\n").await?;
    drop(peer);

    assert_eq!(listener.next_message().await?, NotificationMessage::plain("hl_query"));
    let summary = listener.finish().await?;
    assert_eq!((summary.delivered, summary.rejected), (1, 1));
    Ok(())
}

#[tokio::test]
async fn daemon_grammar_trims_payload_separator() -> anyhow::Result<()> {
    let mut listener = spawn_listener(DAEMON).await?;

    let mut sender = NotificationSender::connect(listener.addr).await?;
    sender.send_raw(b"PUSH 00:e0:4c:7d:f1:ac x rejected :ENDNOT:").await?;
    sender.send_raw(SCENARIO_FRAME).await?;

    let NotificationMessage::Push(push) = listener.next_message().await? else {
        anyhow::bail!("expected a push notification");
    };
    assert_eq!(push.payload, &b"I am good, thank you!"[..]);

    sender.close().await?;
    let summary = listener.finish().await?;
    assert_eq!((summary.delivered, summary.rejected), (1, 1));
    Ok(())
}

#[test]
fn backend_processes_only_after_init() -> anyhow::Result<()> {
    let backend = Arc::new(LoopbackBackend::new());
    let driver = BackendDriver::new(backend.clone());
    let prob_req = NotificationMessage::plain("prob_req");

    assert_eq!(
        driver.process_command(&prob_req),
        Err(DriverError::BackendNotReady {
            state: SessionState::Uninitialized
        })
    );

    driver.init()?;
    driver.process_command(&prob_req)?;
    driver.deinit()?;

    assert_eq!(
        backend.calls(),
        vec![
            BackendCall::Init,
            BackendCall::ProcessCommand(b"prob_req".to_vec()),
            BackendCall::Deinit
        ]
    );
    Ok(())
}

#[tokio::test]
async fn peer_close_ends_listener_cleanly() -> anyhow::Result<()> {
    let mut listener = spawn_listener(PushGrammar::default()).await?;

    let mut sender = NotificationSender::connect(listener.addr).await?;
    let peer = sender.peer();
    for token in ["prob_req", "hl_query"] {
        sender.send(&NotificationMessage::plain(token)).await?;
    }
    sender.close().await?;

    assert_eq!(listener.next_message().await?, NotificationMessage::plain("prob_req"));
    assert_eq!(listener.next_message().await?, NotificationMessage::plain("hl_query"));

    let summary = listener.finish().await?;
    assert_eq!(summary.delivered, 2);
    assert_eq!(summary.rejected, 0);
    assert_eq!(summary.peer.map(|p| p.ip()), Some(peer.ip()));
    Ok(())
}

#[tokio::test]
async fn bind_to_occupied_port_fails_immediately() -> anyhow::Result<()> {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0")?;
    let config = ListenerConfig {
        port: occupied.local_addr()?.port(),
        ..local_config(PushGrammar::default())
    };

    let started = std::time::Instant::now();
    let err = NotificationListener::bind(config).await.unwrap_err();
    assert!(matches!(err, ListenerError::Bind { .. }), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(1));
    Ok(())
}

#[tokio::test]
async fn cancelled_listener_stops_reading() -> anyhow::Result<()> {
    let listener = spawn_listener(PushGrammar::default()).await?;
    let _peer = TcpStream::connect(listener.addr).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    listener.token.cancel();
    let summary = listener.finish().await?;
    assert!(summary.peer.is_some());
    assert_eq!(summary.delivered, 0);
    Ok(())
}
