//! Helpers shared by the end-to-end tests.

use notify_bridge::{
    ListenerConfig, ListenerError, ListenerSummary, NotificationListener, NotificationMessage,
    PushGrammar,
};
use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Pause that lets the listener consume a partial write before the rest arrives
pub const READ_GAP: Duration = Duration::from_millis(100);

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn local_config(grammar: PushGrammar) -> ListenerConfig {
    ListenerConfig {
        address: "127.0.0.1".to_string(),
        port: 0,
        grammar,
        ..Default::default()
    }
}

pub struct RunningListener {
    pub addr: SocketAddr,
    pub messages: UnboundedReceiver<NotificationMessage>,
    pub token: CancellationToken,
    pub task: JoinHandle<Result<ListenerSummary, ListenerError>>,
}

///
/// Binds an ephemeral listener and forwards every decoded message to a channel
///
pub async fn spawn_listener(grammar: PushGrammar) -> anyhow::Result<RunningListener> {
    spawn_listener_with(local_config(grammar)).await
}

pub async fn spawn_listener_with(config: ListenerConfig) -> anyhow::Result<RunningListener> {
    init_tracing();

    let listener = NotificationListener::bind(config).await?;
    let addr = listener.local_addr()?;
    let token = CancellationToken::new();
    let (tx, messages) = unbounded_channel();

    let task = tokio::spawn(listener.run(
        move |message: NotificationMessage| {
            let _ = tx.send(message);
        },
        token.clone(),
    ));

    Ok(RunningListener {
        addr,
        messages,
        token,
        task,
    })
}

impl RunningListener {
    pub async fn next_message(&mut self) -> anyhow::Result<NotificationMessage> {
        tokio::time::timeout(Duration::from_secs(5), self.messages.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("listener stopped before delivering a message"))
    }

    pub async fn finish(self) -> anyhow::Result<ListenerSummary> {
        let summary = tokio::time::timeout(Duration::from_secs(5), self.task).await???;
        Ok(summary)
    }
}
