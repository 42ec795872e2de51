use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::agi::AgiCore;
use crate::content::ContentGenerator;
use crate::security::{DEFAULT_RATE_LIMIT, DEFAULT_RATE_WINDOW};
use crate::server::{HttpServer, ServerSettings};
use crate::template;

/// Command-line interface for alice-httpd
///
/// Provides commands for running the TLS application server and for
/// previewing Alice Side Script templates.
#[derive(Parser)]
#[command(name = "alice-httpd")]
#[command(about = "Alice Side Script application server", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands for alice-httpd
#[derive(Subcommand)]
pub enum Commands {
    /// Run the TLS application server
    Serve {
        /// Interface to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to bind
        #[arg(long, default_value_t = 8443)]
        port: u16,

        /// TLS certificate path (generated self-signed when missing)
        #[arg(long, default_value = "server.crt")]
        cert: PathBuf,

        /// TLS private key path (generated self-signed when missing)
        #[arg(long, default_value = "server.key")]
        key: PathBuf,

        /// Directory holding .ass templates
        #[arg(long, default_value = "ass_scripts")]
        scripts_dir: PathBuf,

        /// Directory holding static files
        #[arg(long, default_value = "public")]
        public_dir: PathBuf,

        /// Requests allowed per client IP per window
        #[arg(long, default_value_t = DEFAULT_RATE_LIMIT)]
        rate_limit: u32,

        /// Rate limit window length in seconds
        #[arg(long, default_value_t = DEFAULT_RATE_WINDOW.as_secs())]
        rate_window_secs: u64,
    },
    /// Render a .ass template against the live system context
    Render {
        /// Path to the template file
        #[arg(short, long)]
        template: PathBuf,

        /// Render as this user (affects USER and USER_ENTITIES)
        #[arg(long)]
        user: Option<String>,
    },
}

/// Execute the CLI command provided by the user
///
/// # Errors
///
/// Returns an error if:
/// - Certificate bootstrap or TLS configuration fails
/// - The listen address cannot be bound
/// - The template file cannot be read
pub fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Serve {
            host,
            port,
            cert,
            key,
            scripts_dir,
            public_dir,
            rate_limit,
            rate_window_secs,
        } => {
            let settings = ServerSettings {
                host: host.clone(),
                port: *port,
                cert_path: cert.clone(),
                key_path: key.clone(),
                scripts_dir: scripts_dir.clone(),
                public_dir: public_dir.clone(),
                rate_limit: *rate_limit,
                rate_window: Duration::from_secs(*rate_window_secs),
            };
            let handle = HttpServer::new(settings).start()?;
            wait_for_shutdown()?;
            handle.stop();
            info!("server stopped");
            Ok(())
        }
        Commands::Render { template, user } => {
            let source = fs::read_to_string(template)?;
            let agi = Arc::new(AgiCore::new());
            let content = ContentGenerator::new(Arc::clone(&agi), ".", ".");
            let ctx = content.build_context(user.as_deref(), 1.0);
            print!("{}", template::render(&source, &ctx));
            Ok(())
        }
    }
}

/// Block until SIGINT or SIGTERM arrives.
#[cfg(unix)]
fn wait_for_shutdown() -> std::io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "shutdown signal received");
    }
    Ok(())
}

/// Without unix signals the process runs until killed.
#[cfg(not(unix))]
fn wait_for_shutdown() -> std::io::Result<()> {
    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}
