use crate::CliArgs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

///////////////////////////////////////////////////////////////////////////
const LOG_FILE_NAME: &str = "notify_bridge.log";

///////////////////////////////////////////////////////////////////////////
pub fn init_logger(cli: &CliArgs) -> Option<WorkerGuard> {
    // RUST_LOG wins over the command line filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.filter));

    // logging to stdout
    let fmt_layer = (!cli.no_stdout_appender).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_span_events(FmtSpan::CLOSE)
    });

    // logging to fs, one file per day
    let mut file_layer_guard = None;
    let file_layer = cli.file_appender.as_ref().map(|folder| {
        let (non_blocking, guard) = tracing_appender::non_blocking(rolling::daily(folder, LOG_FILE_NAME));
        file_layer_guard = Some(guard);

        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_span_events(FmtSpan::CLOSE)
    });

    // combined logger
    let logging_layer = tracing_subscriber::Layer::and_then(fmt_layer, file_layer);

    tracing_subscriber::registry()
        .with(logging_layer)
        .with(filter)
        .init();

    file_layer_guard
}
