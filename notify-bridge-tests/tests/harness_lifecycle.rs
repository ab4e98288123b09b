use notifier_core::{BackendCall, LoopbackBackend};
use notify_bridge::control_codec::DAEMON_GRAMMAR;
use notify_bridge::scenario::{run_scenario, DriverScenario};
use notify_bridge::{
    BackendDriver, NotificationForwarder, NotificationListener, NotificationMessage,
    NotificationSender, PushGrammar, SessionState, Supervisor,
};
use notify_bridge_tests::{init_tracing, local_config};
use std::sync::Arc;
use std::time::Duration;

const PUSH_FRAME: &[u8] = b"PUSH 00:e0:4c:7d:f1:ac 0 I am good, thank you! :ENDNOT:";
const NEW_NODE: &[u8] = b"NEWNODEAddr:00:e0:4c:7d:f1:ac";

async fn wait_for(mut condition: impl FnMut() -> bool) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn forwarded_notifications_reach_the_backend_session() -> anyhow::Result<()> {
    init_tracing();
    let backend = Arc::new(LoopbackBackend::new());
    let driver = Arc::new(BackendDriver::new(backend.clone()));

    let listener = NotificationListener::bind(local_config(PushGrammar::default())).await?;
    let addr = listener.local_addr()?;

    let mut supervisor = Supervisor::new();
    let forwarder = NotificationForwarder::new(Some(Arc::clone(&driver)));
    let token = supervisor.token();
    supervisor.spawn("listener", async move {
        listener.run(forwarder, token).await?;
        Ok(())
    });

    let scenario = DriverScenario {
        message: NotificationMessage::plain("hl_query"),
        init_delay: Duration::ZERO,
        process_delay: Duration::from_secs(30),
        ..Default::default()
    };
    let (token, scenario_driver) = (supervisor.token(), Arc::clone(&driver));
    supervisor.spawn("scenario", async move {
        run_scenario(scenario_driver, scenario, token).await?;
        Ok(())
    });

    wait_for(|| !backend.processed().is_empty()).await?;
    assert_eq!(driver.state(), SessionState::Ready);

    let mut sender = NotificationSender::connect(addr).await?;
    sender.send_raw(&[PUSH_FRAME, NEW_NODE].concat()).await?;
    sender.close().await?;

    let listener_outcome = tokio::time::timeout(Duration::from_secs(5), supervisor.join_next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("no task finished"))?;
    assert_eq!(listener_outcome.name, "listener");
    assert!(listener_outcome.result.is_ok());

    let outcomes = supervisor.shutdown().await;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].result.is_ok(), "{:?}", outcomes[0].result);

    assert_eq!(driver.state(), SessionState::Closed);
    assert_eq!(
        backend.calls(),
        vec![
            BackendCall::Init,
            BackendCall::ProcessCommand(b"hl_query".to_vec()),
            BackendCall::ProcessCommand(PUSH_FRAME.to_vec()),
            BackendCall::ProcessCommand(NEW_NODE.to_vec()),
            BackendCall::Deinit,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn notifications_before_init_are_dropped() -> anyhow::Result<()> {
    init_tracing();
    let backend = Arc::new(LoopbackBackend::new());
    let driver = Arc::new(BackendDriver::new(backend.clone()));

    let listener = NotificationListener::bind(local_config(PushGrammar::default())).await?;
    let addr = listener.local_addr()?;

    let mut supervisor = Supervisor::new();
    let token = supervisor.token();
    let forwarder = NotificationForwarder::new(Some(Arc::clone(&driver)));
    supervisor.spawn("listener", async move {
        listener.run(forwarder, token).await?;
        Ok(())
    });

    let mut sender = NotificationSender::connect(addr).await?;
    sender.send(&NotificationMessage::plain("prob_req")).await?;
    sender.close().await?;

    let outcomes = supervisor.wait().await;
    assert!(outcomes.iter().all(|outcome| outcome.result.is_ok()));
    assert_eq!(driver.state(), SessionState::Uninitialized);
    assert!(backend.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn daemon_grammar_frames_are_forwarded_unchanged() -> anyhow::Result<()> {
    init_tracing();
    let backend = Arc::new(LoopbackBackend::new());
    let driver = Arc::new(BackendDriver::with_grammar(backend.clone(), DAEMON_GRAMMAR));
    driver.init()?;

    let listener = NotificationListener::bind(local_config(DAEMON_GRAMMAR)).await?;
    let addr = listener.local_addr()?;

    let mut supervisor = Supervisor::new();
    let token = supervisor.token();
    let forwarder = NotificationForwarder::new(Some(Arc::clone(&driver)));
    supervisor.spawn("listener", async move {
        listener.run(forwarder, token).await?;
        Ok(())
    });

    let mut sender = NotificationSender::connect(addr).await?;
    sender.send_raw(&[PUSH_FRAME, b"\n", PUSH_FRAME].concat()).await?;
    sender.close().await?;

    let outcomes = supervisor.wait().await;
    assert!(outcomes.iter().all(|outcome| outcome.result.is_ok()));
    assert_eq!(backend.processed(), vec![PUSH_FRAME.to_vec(), PUSH_FRAME.to_vec()]);

    driver.deinit()?;
    Ok(())
}
