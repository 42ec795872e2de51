//! AGI collaborator facade.
//!
//! The request pipeline treats the "quantum AGI" backend as an external
//! collaborator reached through four calls: `user_login`, `generate_response`,
//! `train_entity`, and `get_system_metrics`. Everything behind those calls is
//! flavor text and decorative randomness; nothing here carries protocol
//! invariants. Handlers must treat the returned JSON fields as opaque except
//! where a field is interpolated into a response body.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use rand::{rng, Rng};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::info;

const ARCHETYPES: [&str; 5] = ["quantum", "linguistic", "creative", "analytic", "emotional"];

/// One simulated entity. Coherence drifts with use and rises with training.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub archetype: String,
    pub name: String,
    pub coherence: f64,
    pub training_level: u32,
}

impl Entity {
    fn new(id: &str, archetype: &str) -> Self {
        Self {
            id: id.to_string(),
            archetype: archetype.to_string(),
            name: format!("{archetype}_{id}"),
            coherence: rng().random_range(0.8..=1.0),
            training_level: 1,
        }
    }

    fn process(&mut self, input: &str) -> String {
        let mut rng = rng();
        self.coherence = (self.coherence + rng.random_range(-0.05..=0.05)).clamp(0.1, 1.0);
        let preview: String = input.chars().take(30).collect();
        let flavor = match rng.random_range(0..5u8) {
            0 => format!("I understand your query about '{preview}...'"),
            1 => "Processing your input through cognitive pathways...".to_string(),
            2 => "Analyzing the patterns in your message...".to_string(),
            3 => "Generating response based on your query...".to_string(),
            _ => "Considering multiple perspectives on your input...".to_string(),
        };
        format!("{} (Coherence: {:.2}): {}", self.name, self.coherence, flavor)
    }

    fn train(&mut self, training_data: &Value) -> Value {
        let content_length = match training_data.get("content") {
            Some(Value::String(s)) => s.len(),
            Some(other) => other.to_string().len(),
            None => 0,
        };
        let improvement = (0.05 + content_length as f64 / 1000.0 * 0.1).min(0.15);
        self.coherence = (self.coherence + improvement).min(1.0);
        self.training_level += 1;
        json!({
            "success": true,
            "coherence_improvement": improvement,
            "training_level": self.training_level,
            "quantum_entropy": rng().random_range(0.1..0.5),
            "message": format!(
                "Training complete for {}. Coherence +{improvement:.3}",
                self.name
            ),
        })
    }
}

#[derive(Debug, Clone)]
struct UserRecord {
    hashed_pass: String,
    entities: Vec<String>,
    training_sessions: u32,
}

/// The collaborator state: a fixed entity swarm plus the user store the
/// security layer authenticates against.
#[derive(Debug)]
pub struct AgiCore {
    entities: Mutex<Vec<Entity>>,
    users: Mutex<HashMap<String, UserRecord>>,
    started_at: Instant,
}

impl AgiCore {
    /// Five entities, one per archetype, and the seeded `admin` account.
    #[must_use]
    pub fn new() -> Self {
        let entities: Vec<Entity> = ARCHETYPES
            .iter()
            .enumerate()
            .map(|(i, archetype)| Entity::new(&format!("{:02}", i + 1), archetype))
            .collect();
        for entity in &entities {
            info!(entity = %entity.name, coherence = format!("{:.3}", entity.coherence), "entity created");
        }

        let mut users = HashMap::new();
        users.insert(
            "admin".to_string(),
            UserRecord {
                hashed_pass: sha256_hex("passabc123"),
                entities: vec![
                    "quantum_01".to_string(),
                    "linguistic_02".to_string(),
                    "creative_03".to_string(),
                ],
                training_sessions: 0,
            },
        );

        Self {
            entities: Mutex::new(entities),
            users: Mutex::new(users),
            started_at: Instant::now(),
        }
    }

    /// Authenticate a user. The returned mapping is opaque to the caller
    /// except for `success`; on success it carries `user_entities`,
    /// `quantum_coherence`, and `message`.
    #[must_use]
    pub fn user_login(&self, username: &str, password: &str) -> Value {
        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(record) = users.get(username) else {
            return json!({ "success": false, "message": "User not found" });
        };
        if record.hashed_pass != sha256_hex(password) {
            return json!({ "success": false, "message": "Invalid password" });
        }
        json!({
            "success": true,
            "user_entities": record.entities,
            "quantum_coherence": rng().random_range(0.8..=1.0),
            "message": "Login successful",
        })
    }

    /// Create a user with the starter entity. Returns `false` when the name
    /// is already taken.
    pub fn register_user(&self, username: &str, password: &str) -> bool {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(username) {
            return false;
        }
        users.insert(
            username.to_string(),
            UserRecord {
                hashed_pass: sha256_hex(password),
                entities: vec!["quantum_01".to_string()],
                training_sessions: 0,
            },
        );
        true
    }

    /// Attach an entity to a user's roster. Refused beyond three entities or
    /// for duplicates or unknown users.
    pub fn assign_entity(&self, username: &str, entity_id: &str) -> bool {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(record) = users.get_mut(username) else {
            return false;
        };
        if record.entities.iter().any(|e| e == entity_id) || record.entities.len() >= 3 {
            return false;
        }
        record.entities.push(entity_id.to_string());
        true
    }

    #[must_use]
    pub fn user_entities(&self, username: &str) -> Vec<String> {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(username)
            .map(|r| r.entities.clone())
            .unwrap_or_default()
    }

    /// Route a prompt to one entity, or to the collective when no entity id
    /// is given or the id is unknown.
    #[must_use]
    pub fn generate_response(&self, prompt: &str, entity_id: Option<&str>) -> String {
        if let Some(id) = entity_id {
            let mut entities = self
                .entities
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(entity) = entities.iter_mut().find(|e| e.id == id || e.name == id) {
                return entity.process(prompt);
            }
        }
        let mut rng = rng();
        let coherence: f64 = rng.random_range(0.8..=1.0);
        let modulation: f64 = rng.random_range(0.0..2.0);
        let preview: String = prompt.chars().take(40).collect();
        format!(
            "Quantum Collective (Coherence: {coherence:.2}): Synthesizing insights on '{preview}...' [Quantum Modulation: {modulation:.2}]"
        )
    }

    /// Display name for an entity id, when one matches.
    #[must_use]
    pub fn entity_name(&self, entity_id: &str) -> Option<String> {
        self.entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.id == entity_id || e.name == entity_id)
            .map(|e| e.name.clone())
    }

    /// Train one entity. Mapping carries `success` plus decorative detail;
    /// unknown ids yield `{"success": false, "error": "Entity not found"}`.
    pub fn train_entity(&self, entity_id: &str, training_data: &Value) -> Value {
        let mut entities = self
            .entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(entity) = entities
            .iter_mut()
            .find(|e| e.id == entity_id || e.name == entity_id)
        else {
            return json!({ "success": false, "error": "Entity not found" });
        };
        let result = entity.train(training_data);
        drop(entities);

        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        for record in users.values_mut() {
            if record.entities.iter().any(|e| e == entity_id) {
                record.training_sessions += 1;
            }
        }
        result
    }

    /// Snapshot of the entity swarm for dashboards and the entities API.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// System-wide metrics mapping. Mostly decorative; the process memory
    /// figure is real, the rest is plausible noise.
    #[must_use]
    pub fn get_system_metrics(&self) -> Value {
        let entities = self
            .entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let active_entities = entities.len();
        let system_coherence =
            entities.iter().map(|e| e.coherence).sum::<f64>() / active_entities.max(1) as f64;
        drop(entities);

        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        let total_users = users.len();
        let training_sessions: u32 = users.values().map(|r| r.training_sessions).sum();
        drop(users);

        let memory_mb = memory_stats::memory_stats()
            .map(|usage| usage.physical_mem / (1024 * 1024))
            .unwrap_or(0);

        let mut rng = rng();
        json!({
            "active_entities": active_entities,
            "system_coherence": system_coherence,
            "total_users": total_users,
            "training_sessions": training_sessions,
            "active_sessions": rng.random_range(1..=10),
            "total_memory": rng.random_range(1000..=10000),
            "quantum_entropy": rng.random_range(0.1..0.5),
            "total_entanglements": 0,
            "system_uptime": format_uptime(self.started_at.elapsed().as_secs()),
            "cpu_usage": format!("{}%", rng.random_range(30..=70)),
            "memory_usage": format!("{memory_mb}MB"),
        })
    }
}

impl Default for AgiCore {
    fn default() -> Self {
        Self::new()
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn format_uptime(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else {
        format!("{minutes}m {seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_login_round_trip() {
        let core = AgiCore::new();
        let ok = core.user_login("admin", "passabc123");
        assert_eq!(ok["success"], true);
        assert_eq!(ok["message"], "Login successful");
        assert_eq!(ok["user_entities"][0], "quantum_01");

        let bad_pass = core.user_login("admin", "wrong");
        assert_eq!(bad_pass["success"], false);
        assert_eq!(bad_pass["message"], "Invalid password");

        let unknown = core.user_login("nobody", "x");
        assert_eq!(unknown["success"], false);
        assert_eq!(unknown["message"], "User not found");
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let core = AgiCore::new();
        assert!(core.register_user("alice", "secret"));
        assert!(!core.register_user("alice", "other"));
        assert_eq!(core.user_entities("alice"), vec!["quantum_01".to_string()]);
    }

    #[test]
    fn test_assign_entity_caps_at_three() {
        let core = AgiCore::new();
        core.register_user("bob", "pw");
        assert!(core.assign_entity("bob", "linguistic_02"));
        assert!(core.assign_entity("bob", "creative_03"));
        assert!(!core.assign_entity("bob", "creative_03"), "duplicate");
        assert!(!core.assign_entity("bob", "analytic_04"), "over the cap");
        assert!(!core.assign_entity("ghost", "quantum_01"), "unknown user");
    }

    #[test]
    fn test_training_raises_level_and_reports_improvement() {
        let core = AgiCore::new();
        let result = core.train_entity("quantum_01", &json!({"content": "short"}));
        assert_eq!(result["success"], true);
        assert_eq!(result["training_level"], 2);
        let improvement = result["coherence_improvement"].as_f64().unwrap();
        assert!(improvement >= 0.05 && improvement <= 0.15);

        let missing = core.train_entity("phantom_99", &json!({"content": "x"}));
        assert_eq!(missing["success"], false);
        assert_eq!(missing["error"], "Entity not found");
    }

    #[test]
    fn test_entity_lookup_by_id_or_name() {
        let core = AgiCore::new();
        assert_eq!(core.entity_name("01").as_deref(), Some("quantum_01"));
        assert_eq!(core.entity_name("quantum_01").as_deref(), Some("quantum_01"));
        assert_eq!(core.entity_name("zz"), None);
    }

    #[test]
    fn test_metrics_have_expected_keys() {
        let core = AgiCore::new();
        let metrics = core.get_system_metrics();
        for key in [
            "active_entities",
            "system_coherence",
            "total_users",
            "training_sessions",
            "active_sessions",
            "total_memory",
            "quantum_entropy",
            "total_entanglements",
            "system_uptime",
            "cpu_usage",
            "memory_usage",
        ] {
            assert!(metrics.get(key).is_some(), "missing metric {key}");
        }
        assert_eq!(metrics["active_entities"], 5);
    }
}
