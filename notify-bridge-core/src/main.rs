/*
 * If not stated otherwise in this file or this component's LICENSE file the
 * following copyright and licenses apply:
 *
 * Copyright 2025 RDK Management
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
*/

#![deny(warnings)]

mod logger;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use notifier_core::{BackendSymbols, LoopbackBackend, NativeBackend, NotifierBackend};
use notify_bridge::control_codec::NotifierCommand;
use notify_bridge::listener::{ListenerError, DEFAULT_ADDRESS, DEFAULT_PORT};
use notify_bridge::notification_codec::{PayloadBoundary, QueryKindRule};
use notify_bridge::scenario::{run_scenario, DriverScenario};
use notify_bridge::{
    decode, next_task_id, BackendDriver, ListenerConfig, NotificationForwarder,
    NotificationListener, NotificationSender, PushGrammar, Supervisor,
};
use sd_notify::NotifyState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, instrument, warn};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
    /// Tracing filter
    #[arg(long, short, global = true, default_value_t = String::from("info"))]
    filter: String,
    /// Enable file appender for logs
    #[arg(long, global = true, value_name = "FOLDER")]
    file_appender: Option<PathBuf>,
    /// Disable stdout appender for logs
    #[arg(long, global = true)]
    no_stdout_appender: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Receive notifications and drive the notifier backend
    Listen(ListenArgs),
    /// Write notifications to a running listener
    Send(SendArgs),
    /// Send control commands to the notifier daemon and print its replies
    Control(ControlArgs),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum Flavor {
    /// Access point daemon notifier
    Ap,
    /// Station supplicant notifier
    Sta,
}

impl Flavor {
    fn symbols(self) -> BackendSymbols {
        match self {
            Self::Ap => BackendSymbols::access_point(),
            Self::Sta => BackendSymbols::station(),
        }
    }
}

#[derive(Args)]
struct ListenArgs {
    /// Address to listen on
    #[arg(long, default_value_t = String::from(DEFAULT_ADDRESS))]
    address: String,
    /// Port to listen on
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Notifier flavor, selects the backend entry points
    #[arg(long, value_enum, default_value_t = Flavor::Sta)]
    flavor: Flavor,
    /// Notifier shared object, an in-process loopback backend is used when absent
    #[arg(long, value_name = "PATH")]
    backend_lib: Option<PathBuf>,
    /// Message processed by the backend once initialized
    #[arg(long, default_value_t = String::from("prob_req"))]
    message: String,
    /// Pause between init and process (ms)
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    init_delay: u64,
    /// Pause between process and deinit (ms)
    #[arg(long, value_name = "MS", default_value_t = 0)]
    process_delay: u64,
    /// Pause after deinit (ms)
    #[arg(long, value_name = "MS", default_value_t = 0)]
    deinit_delay: u64,
    /// Run init in its own task
    #[arg(long)]
    init_detached: bool,
    /// Give up on a silent peer after this long (ms)
    #[arg(long, value_name = "MS")]
    read_timeout: Option<u64>,
    /// Forward every received notification to the backend
    #[arg(long)]
    forward: bool,
    /// Only accept a digit as PUSH query kind
    #[arg(long)]
    query_kind_digit: bool,
    /// Drop the space before the PUSH sentinel from the payload
    #[arg(long)]
    trim_payload_separator: bool,
    /// Number of times the message is processed
    #[arg(long, default_value_t = 1)]
    repeat: usize,
    /// Period between repeated messages (ms)
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    repeat_period: u64,
}

#[derive(Args)]
struct SendArgs {
    /// Listener address
    #[arg(long, default_value_t = String::from(DEFAULT_ADDRESS))]
    address: String,
    /// Listener port
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Pause between frames (ms)
    #[arg(long, value_name = "MS", default_value_t = 500)]
    gap: u64,
    /// Frames to write, in order
    #[arg(required = true)]
    messages: Vec<String>,
}

#[derive(Args)]
struct ControlArgs {
    /// Daemon control address
    #[arg(long, default_value_t = String::from(DEFAULT_ADDRESS))]
    address: String,
    /// Daemon control port
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Commands, e.g. "PING" or "DELETE 3", sent in order
    #[arg(required = true)]
    commands: Vec<String>,
}

impl ListenArgs {
    fn grammar(&self) -> PushGrammar {
        PushGrammar {
            query_kind: if self.query_kind_digit {
                QueryKindRule::Digit
            } else {
                QueryKindRule::AnyByte
            },
            payload_boundary: if self.trim_payload_separator {
                PayloadBoundary::TrimSeparator
            } else {
                PayloadBoundary::KeepSeparator
            },
        }
    }

    fn scenario(&self) -> anyhow::Result<DriverScenario> {
        let message = self
            .grammar()
            .decode(self.message.as_bytes())
            .map_err(|e| anyhow!("invalid scenario message {:?}: {e}", self.message))?;

        Ok(DriverScenario {
            message,
            init_delay: Duration::from_millis(self.init_delay),
            process_delay: Duration::from_millis(self.process_delay),
            deinit_delay: Duration::from_millis(self.deinit_delay),
            init_detached: self.init_detached,
            repeat: self.repeat,
            repeat_period: Duration::from_millis(self.repeat_period),
        })
    }

    fn backend(&self) -> anyhow::Result<Arc<dyn NotifierBackend>> {
        let Some(path) = &self.backend_lib else {
            info!("No backend library given, using the loopback backend");
            return Ok(Arc::new(LoopbackBackend::new()));
        };

        let backend = NativeBackend::load(path, self.flavor.symbols())
            .with_context(|| format!("Failed to load notifier backend {path:?}"))?;
        info!(path = ?backend.path(), flavor = ?self.flavor, "Notifier backend loaded");
        Ok(Arc::new(backend))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();

    let _guard = logger::init_logger(&cli);
    tracing::info!("Tracing initialized!");

    let runtime = tokio::runtime::Runtime::new()?;
    let result = match &cli.command {
        Command::Listen(args) => runtime.block_on(run_listen(args)),
        Command::Send(args) => runtime.block_on(run_send(args)),
        Command::Control(args) => runtime.block_on(run_control(args)),
    };

    // backend calls run on the blocking pool and cannot be interrupted
    runtime.shutdown_timeout(Duration::from_secs(2));
    tracing::info!("Closing app.");
    result
}

#[instrument(skip_all, name = "main", fields(task = next_task_id()))]
async fn run_listen(args: &ListenArgs) -> anyhow::Result<()> {
    let scenario = args.scenario()?;
    // forwarded messages are re-encoded with the grammar they were decoded with
    let driver = Arc::new(BackendDriver::with_grammar(args.backend()?, args.grammar()));

    let config = ListenerConfig {
        address: args.address.clone(),
        port: args.port,
        read_timeout: args.read_timeout.map(Duration::from_millis),
        grammar: args.grammar(),
        ..Default::default()
    };
    let listener = NotificationListener::bind(config)
        .await
        .context("Failed to start the notification listener")?;

    let mut supervisor = Supervisor::new();

    let forwarder = NotificationForwarder::new(args.forward.then(|| Arc::clone(&driver)));
    let token = supervisor.token();
    supervisor.spawn("listener", async move {
        match listener.run(forwarder, token).await {
            Ok(summary) => info!(?summary, "Listener stopped"),
            Err(e @ ListenerError::Timeout(_)) => warn!("Listener stopped: {e}"),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    });

    let token = supervisor.token();
    supervisor.spawn("scenario", async move {
        let report = run_scenario(driver, scenario, token).await?;
        info!(?report, "Scenario finished");
        Ok(())
    });

    let mut signal_terminate = signal(SignalKind::terminate())?;
    let mut signal_interrupt = signal(SignalKind::interrupt())?;
    let mut failures = 0;

    loop {
        tokio::select! {
            _ = signal_terminate.recv() => break,
            _ = signal_interrupt.recv() => break,
            outcome = supervisor.join_next() => match outcome {
                Some(outcome) => failures += usize::from(outcome.result.is_err()),
                None => break,
            },
        }
    }

    let _ = sd_notify::notify(true, &[NotifyState::Stopping]);
    failures += supervisor
        .shutdown()
        .await
        .iter()
        .filter(|outcome| outcome.result.is_err())
        .count();

    if failures > 0 {
        anyhow::bail!("{failures} task(s) failed");
    }
    Ok(())
}

#[instrument(skip_all, name = "send", fields(task = next_task_id()))]
async fn run_send(args: &SendArgs) -> anyhow::Result<()> {
    let mut sender = NotificationSender::connect((args.address.as_str(), args.port)).await?;

    for (index, message) in args.messages.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(Duration::from_millis(args.gap)).await;
        }
        if let Err(e) = decode(message.as_bytes()) {
            warn!("Listener will reject {message:?}: {e}");
        }
        // a line end terminates bare tokens and is absorbed after a PUSH sentinel
        sender.send_raw(format!("{message}\n").as_bytes()).await?;
    }

    sender.close().await
}

#[instrument(skip_all, name = "control", fields(task = next_task_id()))]
async fn run_control(args: &ControlArgs) -> anyhow::Result<()> {
    let commands = args
        .commands
        .iter()
        .map(|text| {
            NotifierCommand::decode(text.as_bytes())
                .map_err(|e| anyhow!("invalid control command {text:?}: {e}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut sender = NotificationSender::connect((args.address.as_str(), args.port)).await?;
    let mut failures = 0;
    for command in &commands {
        let reply = sender.request(command).await?;
        if reply.is_failure() {
            warn!(?command, "daemon rejected the command");
            failures += 1;
        } else {
            info!(?command, ?reply, "daemon accepted the command");
        }
    }
    sender.close().await?;

    if failures > 0 {
        anyhow::bail!("{failures} command(s) rejected");
    }
    Ok(())
}
