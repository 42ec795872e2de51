//! Server bootstrap and lifecycle.
//!
//! ## Overview
//!
//! [`HttpServer::start`] wires the whole application together: crypto
//! provider, certificate bootstrap, shared state, router, the background
//! key-rotation coroutine, and the TLS accept loop. The returned
//! [`ServerHandle`] owns the shutdown flag and both coroutine handles, so
//! `stop()` tears the server down in one call and tests can run a real
//! server on an ephemeral port.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use may::coroutine::JoinHandle;
use may::net::TcpListener;
use serde_json::json;
use tracing::{error, info};

use crate::agi::AgiCore;
use crate::content::ContentGenerator;
use crate::handlers::AppState;
use crate::router::Router;
use crate::runtime_config::RuntimeConfig;
use crate::security::{SecurityManager, DEFAULT_RATE_LIMIT, DEFAULT_RATE_WINDOW};

use super::service::ConnectionService;
use super::tls::{build_server_config, ensure_server_certificate, init_crypto};

/// Startup parameters. Defaults match a bare local deployment: bind all
/// interfaces on 8443, certificate material and content directories relative
/// to the working directory.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub scripts_dir: PathBuf,
    pub public_dir: PathBuf,
    pub rate_limit: u32,
    pub rate_window: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8443,
            cert_path: PathBuf::from("server.crt"),
            key_path: PathBuf::from("server.key"),
            scripts_dir: PathBuf::from("ass_scripts"),
            public_dir: PathBuf::from("public"),
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_window: DEFAULT_RATE_WINDOW,
        }
    }
}

/// The TLS application server.
pub struct HttpServer {
    settings: ServerSettings,
}

/// Handle to a running server
///
/// Provides methods for waiting until the server is ready, stopping it
/// gracefully, or joining the accept loop.
pub struct ServerHandle {
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: Arc<AtomicBool>,
    accept_handle: JoinHandle<()>,
    rotation_handle: JoinHandle<()>,
}

impl HttpServer {
    #[must_use]
    pub fn new(settings: ServerSettings) -> Self {
        Self { settings }
    }

    /// Bind the listener and launch the accept loop.
    ///
    /// The listener is bound before any coroutine is spawned so bind errors
    /// (port in use, bad host) surface here instead of inside the loop.
    ///
    /// # Errors
    ///
    /// Returns an error if certificate bootstrap fails, the TLS config cannot
    /// be assembled, or the address cannot be bound.
    pub fn start(self) -> anyhow::Result<ServerHandle> {
        let settings = self.settings;

        // Connection coroutines run TLS handshakes; their stacks must be
        // sized before anything is spawned.
        may::config().set_stack_size(RuntimeConfig::from_env().stack_size);

        init_crypto();
        ensure_server_certificate(&settings.cert_path, &settings.key_path)?;
        let tls_config = build_server_config(&settings.cert_path, &settings.key_path)?;

        let agi = Arc::new(AgiCore::new());
        let security = Arc::new(SecurityManager::new());
        let content = Arc::new(ContentGenerator::new(
            Arc::clone(&agi),
            settings.scripts_dir.clone(),
            settings.public_dir.clone(),
        ));
        let state = Arc::new(AppState {
            agi,
            security,
            content,
        });
        let service = ConnectionService {
            state: Arc::clone(&state),
            router: Arc::new(Router::default()),
            tls_config,
            rate_limit: settings.rate_limit,
            rate_window: settings.rate_window,
        };

        let shutdown = Arc::new(AtomicBool::new(false));
        let rotation_handle = state.security.start_rotation(Arc::clone(&shutdown));

        let listener = TcpListener::bind((settings.host.as_str(), settings.port))?;
        let addr = listener.local_addr()?;

        info!(
            "🚀 alice-httpd v{} listening on https://{}:{}",
            env!("CARGO_PKG_VERSION"),
            settings.host,
            addr.port()
        );
        info!("🌌 Quantum AGI Ready | Alice Side Script Protocol Active");
        state.security.audit_event(
            "server_start",
            json!({ "host": settings.host, "port": addr.port() }),
        );

        let accept_shutdown = Arc::clone(&shutdown);
        // SAFETY: may::coroutine::spawn() is marked unsafe by the may runtime.
        // Safe because: May runtime is initialized, handler is Send + 'static
        let accept_handle = unsafe {
            may::coroutine::spawn(move || {
                for stream in listener.incoming() {
                    if accept_shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    match stream {
                        Ok(stream) => {
                            let service = service.clone();
                            // SAFETY: may::coroutine::spawn() is marked unsafe by the may runtime.
                            // Safe because: May runtime is initialized, handler is Send + 'static
                            unsafe {
                                may::coroutine::spawn(move || service.handle_connection(stream));
                            }
                        }
                        Err(e) => error!(error = %e, "accept failed"),
                    }
                }
            })
        };

        Ok(ServerHandle {
            addr,
            state,
            shutdown,
            accept_handle,
            rotation_handle,
        })
    }
}

impl ServerHandle {
    /// Address the listener actually bound, with the real port when the
    /// settings asked for 0.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared application state, mainly for tests that need to inspect
    /// sessions or the audit log behind a running server.
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Wait for the server to be ready to accept connections
    ///
    /// Polls the server address by attempting TCP connections until
    /// successful. Useful in tests to ensure the server is fully started
    /// before sending requests.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if the server doesn't become ready within ~250ms
    /// (50 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop the server gracefully
    ///
    /// Sets the shutdown flag, then cancels the accept loop and the key
    /// rotation coroutine and waits for both. Consumes the handle.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // SAFETY: may::CoroutineHandle::coroutine().cancel() is marked unsafe by the may runtime.
        // This is safe because:
        // - The server is shutting down and no new work is being scheduled
        // - Both coroutine handles are valid (we're holding them)
        // - Cancellation is the intended behavior during shutdown
        unsafe {
            self.accept_handle.coroutine().cancel();
        }
        let _ = self.accept_handle.join();
        // SAFETY: same invariants as the accept loop cancellation above.
        unsafe {
            self.rotation_handle.coroutine().cancel();
        }
        let _ = self.rotation_handle.join();
    }

    /// Block until the accept loop finishes. The server runs indefinitely
    /// unless stopped externally or the listener fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the accept coroutine panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.accept_handle.join()
    }
}
