use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    if let Err(e) = alice_httpd::cli::run_cli() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// `RUST_LOG` controls the filter (default `info`). Set
/// `ALICE_HTTPD_LOG_JSON=1` for line-delimited JSON output, useful when logs
/// go to a collector instead of a terminal.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("ALICE_HTTPD_LOG_JSON").is_ok() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}
