use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simulator_server::cli;
use simulator_server::driver;

fn main() {
    init_logging();
    let config = cli::parse_tolerant(std::env::args().skip(1));
    tracing::info!(udid = %config.udid, fps = config.fps, quality = config.quality, "starting simulator-server");

    if let Err(e) = driver::run(config) {
        tracing::error!(error = %e, "fatal error");
        std::process::exit(e.exit_code());
    }
}

/// Structured logging to stderr only - stdout is reserved for the
/// `stream_ready`/`fps_report` machine-readable lines. Defaults to `info`,
/// overridable by `RUST_LOG`.
fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "simulator_server=info".into());

    let timer = time::format_description::well_known::Iso8601::DEFAULT;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::new(timer));

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        eprintln!("failed to initialize tracing: {err}");
    }
}
