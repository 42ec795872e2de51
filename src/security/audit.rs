//! Signed, append-only audit trail.
//!
//! Every security-relevant occurrence (rate-limit rejections, coherence
//! exhaustion, server lifecycle) is recorded with an Ed25519 signature from
//! the host signing key current at the time of the event. Events are only
//! ever appended; nothing rewrites or drops them.

use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

/// One recorded occurrence.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// ULID assigned at recording time; ties the stored entry to its log line.
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    /// Seconds since the Unix epoch at recording time.
    pub timestamp: f64,
    /// Base64 Ed25519 signature over [`signed_bytes`]. Empty when the payload
    /// could not be serialized; the event is still recorded.
    pub signature: String,
}

/// The canonical byte form a signature covers: the JSON encoding of the event
/// type together with its payload.
pub fn signed_bytes(
    event_type: &str,
    payload: &serde_json::Value,
) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&json!({ "type": event_type, "payload": payload }))
}

#[derive(Debug, Default)]
pub struct AuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditLog {
    /// Sign and append an event. Never fails: a signing problem is logged and
    /// the event is stored unsigned rather than aborting the request that
    /// triggered it.
    pub fn record(&self, key: &SigningKey, event_type: &str, payload: serde_json::Value) {
        let signature = match signed_bytes(event_type, &payload) {
            Ok(bytes) => BASE64_STANDARD.encode(key.sign(&bytes).to_bytes()),
            Err(err) => {
                error!(
                    event = %event_type,
                    error = %err,
                    "audit payload serialization failed, recording unsigned"
                );
                String::new()
            }
        };
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let event_id = ulid::Ulid::new().to_string();
        info!(event = %event_type, id = %event_id, "audit event recorded");
        let event = AuditEvent {
            event_id,
            event_type: event_type.to_string(),
            payload,
            timestamp,
            signature,
        };
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the log for inspection. The live log stays append-only.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    fn test_key() -> SigningKey {
        SigningKey::from_bytes(&rand::random::<[u8; 32]>())
    }

    #[test]
    fn test_events_append_in_order() {
        let log = AuditLog::default();
        let key = test_key();
        log.record(&key, "server_start", json!({}));
        log.record(&key, "rate_limit_exceeded", json!({"ip": "127.0.0.1"}));
        let events = log.snapshot();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "server_start");
        assert_eq!(events[1].event_type, "rate_limit_exceeded");
        assert!(events[0].timestamp <= events[1].timestamp);
        assert_ne!(events[0].event_id, events[1].event_id);
    }

    #[test]
    fn test_signature_verifies_against_signing_key() {
        let log = AuditLog::default();
        let key = test_key();
        let payload = json!({"ip": "10.0.0.9", "endpoint": "/"});
        log.record(&key, "rate_limit_exceeded", payload.clone());

        let event = &log.snapshot()[0];
        let sig_bytes = BASE64_STANDARD.decode(&event.signature).unwrap();
        let signature = Signature::from_slice(&sig_bytes).unwrap();
        let message = signed_bytes("rate_limit_exceeded", &payload).unwrap();
        assert!(key.verifying_key().verify(&message, &signature).is_ok());
    }

    #[test]
    fn test_signature_does_not_verify_with_other_key() {
        let log = AuditLog::default();
        let key = test_key();
        let payload = json!({"user": "admin"});
        log.record(&key, "coherence_low", payload.clone());

        let event = &log.snapshot()[0];
        let sig_bytes = BASE64_STANDARD.decode(&event.signature).unwrap();
        let signature = Signature::from_slice(&sig_bytes).unwrap();
        let message = signed_bytes("coherence_low", &payload).unwrap();
        let other = test_key();
        assert!(other.verifying_key().verify(&message, &signature).is_err());
    }
}
