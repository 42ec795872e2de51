//! # Security Module
//!
//! Rate limiting, capability-scoped sessions with decaying coherence,
//! hardening headers, and the signed audit trail.
//!
//! ## Overview
//!
//! All mutable security state lives behind one [`SecurityManager`] constructed
//! at startup and shared by reference with every connection coroutine. The
//! coroutines ride OS worker threads, so the three shared structures
//! (sessions, rate limits, audit log) are each guarded by their own lock.
//!
//! ## Coherence
//!
//! A session carries a coherence score that starts at 1.0 and drops by 0.01 on
//! every successful validation. Once the decremented score would fall below
//! 0.8 the session is deleted and the caller becomes anonymous, independent of
//! wall-clock expiry. Coherence is stored in integer hundredths so the
//! boundary is exact: a fresh session survives twenty validations and dies on
//! the twenty-first.
//!
//! ## Audit trail
//!
//! Security-relevant occurrences (`rate_limit_exceeded`, `coherence_low`,
//! `server_start`) are appended to an in-memory log, each signed with the host
//! Ed25519 key current at recording time. A background coroutine rotates that
//! key every [`KEY_ROTATION_INTERVAL`] without blocking request handling.

pub mod audit;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::RngCore;
use serde_json::json;
use tracing::info;

pub use audit::{AuditEvent, AuditLog};

/// Requests allowed per key within one rate window.
pub const DEFAULT_RATE_LIMIT: u32 = 100;
/// Length of the fixed rate window.
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(60);
/// Session lifetime granted at login.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// How often the host signing key is regenerated.
pub const KEY_ROTATION_INTERVAL: Duration = Duration::from_secs(600);

const COHERENCE_START_CENTI: u32 = 100;
const COHERENCE_DECREMENT_CENTI: u32 = 1;
const COHERENCE_THRESHOLD_CENTI: u32 = 80;

/// Hardening headers attached to every non-static response, in emission order.
pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    (
        "Strict-Transport-Security",
        "max-age=31536000; includeSubDomains; preload",
    ),
    (
        "Content-Security-Policy",
        "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; object-src 'none'",
    ),
    ("X-Frame-Options", "DENY"),
    ("X-Content-Type-Options", "nosniff"),
    ("X-XSS-Protection", "1; mode=block"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
    (
        "Permissions-Policy",
        "geolocation=(), microphone=(), camera=()",
    ),
    ("X-ASS-Version", "1.0"),
];

/// A live login session. Owned exclusively by the manager; handlers only ever
/// see the `(user, coherence)` pair a validation returns.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: String,
    pub expires_at: Instant,
    pub capabilities: Vec<String>,
    coherence_centi: u32,
}

impl Session {
    #[must_use]
    pub fn coherence(&self) -> f64 {
        f64::from(self.coherence_centi) / 100.0
    }
}

/// Fixed-window request counter for one `(ip, endpoint)` key.
#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_reset: Instant,
}

#[derive(Debug)]
pub struct SecurityManager {
    sessions: Mutex<HashMap<String, Session>>,
    rate_limits: Mutex<HashMap<String, RateLimitEntry>>,
    audit: AuditLog,
    signing_key: RwLock<SigningKey>,
}

impl SecurityManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            rate_limits: Mutex::new(HashMap::new()),
            audit: AuditLog::default(),
            signing_key: RwLock::new(fresh_signing_key()),
        }
    }

    /// Count one request against the `(ip, endpoint)` window.
    ///
    /// Returns `false` once `limit` requests have already been counted in the
    /// open window; the rejection is audited as `rate_limit_exceeded` and the
    /// counter is left untouched so the window boundary stays put. Called
    /// before any other processing for every accepted connection.
    pub fn rate_limit_check(
        &self,
        ip: &str,
        endpoint: &str,
        limit: u32,
        window: Duration,
    ) -> bool {
        let now = Instant::now();
        let key = format!("{ip}:{endpoint}");
        let mut limits = self
            .rate_limits
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = limits.entry(key).or_insert_with(|| RateLimitEntry {
            count: 0,
            window_reset: now + window,
        });
        if now > entry.window_reset {
            entry.count = 0;
            entry.window_reset = now + window;
        }
        if entry.count >= limit {
            drop(limits);
            self.audit_event(
                "rate_limit_exceeded",
                json!({ "ip": ip, "endpoint": endpoint }),
            );
            return false;
        }
        entry.count += 1;
        true
    }

    /// Issue a session for `user` with coherence 1.0.
    ///
    /// The id carries 256 bits from a CSPRNG, so it is unguessable and
    /// collisions are not a practical concern.
    pub fn generate_session(&self, user: &str, capabilities: Vec<String>, ttl: Duration) -> String {
        let mut id_bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut id_bytes);
        let session_id = URL_SAFE_NO_PAD.encode(id_bytes);
        let session = Session {
            user: user.to_string(),
            expires_at: Instant::now() + ttl,
            capabilities,
            coherence_centi: COHERENCE_START_CENTI,
        };
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.clone(), session);
        session_id
    }

    /// Validate a session token and spend one unit of coherence.
    ///
    /// Outcomes, in check order:
    /// - unknown id: `(None, 0.0)`
    /// - expired: session deleted, `(None, 0.0)`
    /// - `required_capability` absent: `(None, current coherence)` and the
    ///   session is kept, distinguishing "wrong scope" from "dead session"
    /// - decremented coherence below threshold: `coherence_low` audited,
    ///   session deleted, `(None, 0.0)`
    /// - otherwise: decrement persisted, `(Some(user), new coherence)`
    pub fn validate_session(
        &self,
        session_id: &str,
        required_capability: Option<&str>,
    ) -> (Option<String>, f64) {
        let now = Instant::now();
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(session) = sessions.get(session_id) else {
            return (None, 0.0);
        };

        if now > session.expires_at {
            sessions.remove(session_id);
            return (None, 0.0);
        }

        if let Some(capability) = required_capability {
            if !session.capabilities.iter().any(|c| c == capability) {
                return (None, session.coherence());
            }
        }

        let user = session.user.clone();
        let new_centi = session
            .coherence_centi
            .saturating_sub(COHERENCE_DECREMENT_CENTI);

        if new_centi < COHERENCE_THRESHOLD_CENTI {
            sessions.remove(session_id);
            drop(sessions);
            self.audit_event(
                "coherence_low",
                json!({ "session": session_id, "user": user }),
            );
            return (None, 0.0);
        }

        if let Some(session) = sessions.get_mut(session_id) {
            session.coherence_centi = new_centi;
        }
        (Some(user), f64::from(new_centi) / 100.0)
    }

    /// Drop a session outright (logout). Returns whether it existed.
    pub fn revoke_session(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some()
    }

    /// Capability test without spending coherence. Used by the admin gate
    /// after the request's session has already been validated once.
    #[must_use]
    pub fn has_capability(&self, session_id: &str, capability: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .is_some_and(|s| s.capabilities.iter().any(|c| c == capability))
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The fixed hardening header set from [`SECURITY_HEADERS`].
    #[must_use]
    pub fn security_headers(&self) -> &'static [(&'static str, &'static str)] {
        SECURITY_HEADERS
    }

    /// Sign `payload` with the current host key and append it to the audit
    /// trail. Never fails; see [`AuditLog::record`].
    pub fn audit_event(&self, event_type: &str, payload: serde_json::Value) {
        let key = self
            .signing_key
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        self.audit.record(&key, event_type, payload);
    }

    #[must_use]
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Replace the host signing key. Events recorded before a rotation stay
    /// verifiable only against the retired public key.
    pub fn rotate_signing_key(&self) {
        let fresh = fresh_signing_key();
        *self
            .signing_key
            .write()
            .unwrap_or_else(PoisonError::into_inner) = fresh;
        info!("host signing key rotated");
    }

    /// Public half of the current host signing key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .verifying_key()
    }

    /// Spawn the periodic key-rotation coroutine.
    ///
    /// Sleeps [`KEY_ROTATION_INTERVAL`] between rotations and exits once
    /// `shutdown` is set. Runs independently of connection handling; the
    /// returned handle is cancelled by the server on stop.
    pub fn start_rotation(
        self: &Arc<Self>,
        shutdown: Arc<AtomicBool>,
    ) -> may::coroutine::JoinHandle<()> {
        let manager = Arc::clone(self);
        // SAFETY: may::coroutine::spawn() is marked unsafe by the may runtime.
        // Safe because: May runtime is initialized, the closure owns all its
        // data and is Send + 'static.
        unsafe {
            may::coroutine::spawn(move || loop {
                may::coroutine::sleep(KEY_ROTATION_INTERVAL);
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                manager.rotate_signing_key();
            })
        }
    }
}

impl Default for SecurityManager {
    fn default() -> Self {
        Self::new()
    }
}

fn fresh_signing_key() -> SigningKey {
    let mut secret = [0u8; 32];
    rand::rng().fill_bytes(&mut secret);
    SigningKey::from_bytes(&secret)
}
