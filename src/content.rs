//! Fallback content generation.
//!
//! Paths with no registered handler land here. The generator serves static
//! assets from the public directory, renders `.ass` templates from the
//! scripts directory, exposes two JSON endpoints, and synthesizes a small
//! HTML page for everything else. It never returns an error: failures are
//! folded into 404/500 responses whose bodies match the content type so a
//! missing stylesheet still parses as CSS.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use tracing::{debug, error, warn};

use crate::agi::AgiCore;
use crate::http::Response;
use crate::template::{self, TemplateContext, Value};

const STATIC_EXTENSIONS: [&str; 6] = [".css", ".js", ".png", ".jpg", ".svg", ".html"];

pub struct ContentGenerator {
    agi: Arc<AgiCore>,
    scripts_dir: PathBuf,
    public_dir: PathBuf,
}

impl ContentGenerator {
    pub fn new<S, P>(agi: Arc<AgiCore>, scripts_dir: S, public_dir: P) -> Self
    where
        S: Into<PathBuf>,
        P: Into<PathBuf>,
    {
        Self {
            agi,
            scripts_dir: scripts_dir.into(),
            public_dir: public_dir.into(),
        }
    }

    /// Produce a response for a path no explicit route claimed.
    #[must_use]
    pub fn generate(&self, path: &str, user: Option<&str>, coherence: f64) -> Response {
        if path.starts_with("/public/")
            || STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        {
            return self.serve_static(path);
        }
        match path {
            "/" | "/index" | "/dashboard" => self.serve_template("index.ass", user, coherence),
            "/admin" => self.serve_template("admin.ass", user, coherence),
            "/training" => self.serve_template("training.ass", user, coherence),
            "/entities" => self.serve_template("entity.ass", user, coherence),
            "/userdash" => self.serve_template("userdash.ass", user, coherence),
            "/auth" => self.serve_template("auth.ass", user, coherence),
            "/api/entities" => self.entities_json(),
            "/api/metrics" => self.metrics_json(),
            _ => self.dynamic_page(path, user, coherence),
        }
    }

    fn serve_template(&self, name: &str, user: Option<&str>, coherence: f64) -> Response {
        let Some(file_path) = map_path(&self.scripts_dir, name) else {
            warn!(template = %name, "template path rejected");
            return Response::html(404, self.error_page(&format!("ASS template not found: {name}")));
        };
        match fs::read_to_string(&file_path) {
            Ok(source) => {
                let context = self.build_context(user, coherence);
                let rendered = template::render(&source, &context);
                debug!(template = %name, bytes = rendered.len(), "template rendered");
                Response::html(200, rendered)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                error!(template = %name, "ASS template not found");
                Response::html(404, self.error_page(&format!("ASS template not found: {name}")))
            }
            Err(e) => {
                error!(template = %name, error = %e, "failed to read template");
                Response::html(500, self.error_page(&format!("Error: {e}")))
            }
        }
    }

    fn serve_static(&self, path: &str) -> Response {
        let content_type = static_content_type(path);
        let relative = path.strip_prefix("/public/").unwrap_or(path);
        let Some(file_path) = map_path(&self.public_dir, relative) else {
            warn!(path = %path, "static path rejected");
            return Response::new(404, content_type, not_found_body(content_type, path));
        };
        match fs::read(&file_path) {
            Ok(bytes) => Response::new(200, content_type, bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path, "static file not found");
                Response::new(404, content_type, not_found_body(content_type, path))
            }
            Err(e) => {
                error!(path = %path, error = %e, "failed to read static file");
                Response::new(500, content_type, read_error_body(content_type, &e))
            }
        }
    }

    fn entities_json(&self) -> Response {
        let list: Vec<serde_json::Value> = self
            .agi
            .entities()
            .into_iter()
            .map(|e| {
                json!({
                    "entity_id": e.id,
                    "name": e.name,
                    "archetype": e.archetype,
                    "coherence": round3(e.coherence),
                    "training_level": e.training_level,
                })
            })
            .collect();
        Response::json(200, &serde_json::Value::Array(list)).unwrap_or_else(encoding_failure)
    }

    fn metrics_json(&self) -> Response {
        Response::json(200, &self.agi.get_system_metrics()).unwrap_or_else(encoding_failure)
    }

    /// Context every template render sees. Pulls live figures from the
    /// collaborator and falls back to fixed values if a metric is absent.
    /// Also used by the `render` CLI command for offline template previews.
    pub(crate) fn build_context(&self, user: Option<&str>, coherence: f64) -> TemplateContext {
        let metrics = self.agi.get_system_metrics();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut context = TemplateContext::new();
        context.insert("SYSTEM_COHERENCE".into(), Value::Num(round3(coherence)));
        context.insert(
            "QUANTUM_ENTROPY".into(),
            Value::Num(round3(metrics["quantum_entropy"].as_f64().unwrap_or(0.5))),
        );
        context.insert(
            "ACTIVE_ENTITIES".into(),
            Value::Num(metrics["active_entities"].as_f64().unwrap_or(0.0)),
        );
        context.insert("TIMESTAMP".into(), Value::Num(timestamp as f64));
        context.insert("USER".into(), Value::from(user.unwrap_or("guest")));
        context.insert("SESSION_ID".into(), Value::from("quantum_session"));
        context.insert("ASS_VERSION".into(), Value::from("1.0"));
        context.insert(
            "COHERENCE_STATUS".into(),
            Value::from(coherence_status(coherence)),
        );
        context.insert(
            "SYSTEM_UPTIME".into(),
            Value::from(metrics["system_uptime"].as_str().unwrap_or("5m 23s")),
        );
        context.insert(
            "TOTAL_MEMORY".into(),
            Value::Num(metrics["total_memory"].as_f64().unwrap_or(128.0)),
        );
        context.insert(
            "ACTIVE_SESSIONS".into(),
            Value::Num(metrics["active_sessions"].as_f64().unwrap_or(1.0)),
        );
        context.insert(
            "TOTAL_ENTANGLEMENTS".into(),
            Value::Num(metrics["total_entanglements"].as_f64().unwrap_or(12.0)),
        );

        let entities: Vec<Value> = self
            .agi
            .entities()
            .into_iter()
            .map(|e| {
                let mut fields = HashMap::new();
                fields.insert("id".to_string(), Value::from(e.id));
                fields.insert("name".to_string(), Value::from(e.name));
                fields.insert("archetype".to_string(), Value::from(e.archetype));
                fields.insert("coherence".to_string(), Value::Num(round3(e.coherence)));
                fields.insert(
                    "training_level".to_string(),
                    Value::Num(f64::from(e.training_level)),
                );
                Value::Map(fields)
            })
            .collect();
        context.insert("ENTITIES".into(), Value::List(entities));

        let user_entities: Vec<Value> = user
            .map(|u| self.agi.user_entities(u))
            .unwrap_or_default()
            .into_iter()
            .map(Value::Str)
            .collect();
        context.insert("USER_ENTITIES".into(), Value::List(user_entities));

        context
    }

    fn dynamic_page(&self, path: &str, user: Option<&str>, coherence: f64) -> Response {
        let body = format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <title>ASS Dynamic - {path}</title>
    <link rel="stylesheet" href="/public/css/style.css">
</head>
<body>
    <div class="quantum-container">
        <header class="quantum-header">
            <h1>Alice Side Script Dynamic Content</h1>
        </header>
        <div class="card">
            <p>Path: {path}</p>
            <p>Coherence: {coherence:.3}</p>
            <p>Entities: {entities}</p>
            <p>User: {user}</p>
        </div>
    </div>
</body>
</html>"#,
            entities = self.agi.entities().len(),
            user = user.unwrap_or("guest"),
        );
        Response::html(200, body)
    }

    fn error_page(&self, message: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <title>ASS Error</title>
    <link rel="stylesheet" href="/public/css/style.css">
</head>
<body>
    <div class="quantum-container">
        <div class="card" style="text-align: center; background: #ff4444; color: white;">
            <h1>🔴 Quantum Decoherence Detected</h1>
            <p>{message}</p>
            <button onclick="location.reload()" class="btn-primary">Restore Coherence</button>
        </div>
    </div>
</body>
</html>"#
        )
    }
}

/// Resolve a URL path under `base`, refusing parent components so requests
/// cannot climb out of the served directory.
fn map_path(base: &Path, url_path: &str) -> Option<PathBuf> {
    let mut resolved = base.to_path_buf();
    for comp in Path::new(url_path.trim_start_matches('/')).components() {
        match comp {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(resolved)
}

fn static_content_type(path: &str) -> &'static str {
    match Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
        .as_str()
    {
        "css" => "text/css",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "html" => "text/html",
        _ => "text/plain",
    }
}

fn not_found_body(content_type: &str, path: &str) -> Vec<u8> {
    match content_type {
        "text/css" => b"/* File not found */".to_vec(),
        "application/javascript" => b"// File not found".to_vec(),
        _ => format!("File not found: {path}").into_bytes(),
    }
}

fn read_error_body(content_type: &str, err: &io::Error) -> Vec<u8> {
    match content_type {
        "text/css" => b"/* Error serving file */".to_vec(),
        "application/javascript" => b"// Error serving file".to_vec(),
        _ => format!("Error: {err}").into_bytes(),
    }
}

fn encoding_failure(err: serde_json::Error) -> Response {
    error!(error = %err, "failed to encode JSON payload");
    Response::new(500, "application/json", br#"{"error": "encoding failure"}"#.to_vec())
}

fn coherence_status(coherence: f64) -> &'static str {
    if coherence > 0.9 {
        "Stable"
    } else if coherence > 0.7 {
        "Degraded"
    } else {
        "Critical"
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}
