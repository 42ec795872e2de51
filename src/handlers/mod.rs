//! Route handlers.
//!
//! Each handler is a plain function over [`AppState`] and the per-request
//! [`RequestContext`]. Page handlers delegate to the content generator and
//! stamp the security header set plus `X-Coherence`; API handlers return
//! JSON with the security headers only. Handler-level failures surface as
//! [`ServerError`] and are mapped to plain-text responses by the connection
//! layer.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info};

use crate::agi::AgiCore;
use crate::content::ContentGenerator;
use crate::error::ServerError;
use crate::http::{Request, Response};
use crate::security::{SecurityManager, SESSION_TTL};

/// Shared server state handed to every handler.
pub struct AppState {
    pub agi: Arc<AgiCore>,
    pub security: Arc<SecurityManager>,
    pub content: Arc<ContentGenerator>,
}

/// Per-request view: the parsed request plus the authenticated user (if the
/// bearer token validated) and the session coherence after this request's
/// decay step. Anonymous requests carry full coherence.
pub struct RequestContext<'a> {
    pub request: &'a Request,
    pub user: Option<String>,
    pub coherence: f64,
}

pub type Handler = fn(&AppState, &RequestContext) -> Result<Response, ServerError>;

fn apply_security_headers(resp: &mut Response, state: &AppState) {
    for (name, value) in state.security.security_headers() {
        resp.push_header(name, value);
    }
}

fn page(state: &AppState, ctx: &RequestContext, path: &str) -> Result<Response, ServerError> {
    let mut resp = state.content.generate(path, ctx.user.as_deref(), ctx.coherence);
    apply_security_headers(&mut resp, state);
    resp.push_header("X-Coherence", &format!("{:?}", ctx.coherence));
    Ok(resp)
}

fn secured_json(state: &AppState, status: u16, body: &Value) -> Result<Response, ServerError> {
    let mut resp = Response::json(status, body)?;
    apply_security_headers(&mut resp, state);
    Ok(resp)
}

fn required_str<'a>(data: &'a Value, field: &str) -> Result<&'a str, ServerError> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ServerError::Internal(format!("missing field: {field}")))
}

pub fn dashboard(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    page(state, ctx, "/")
}

pub fn admin_page(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    page(state, ctx, "/admin")
}

pub fn training_page(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    page(state, ctx, "/training")
}

pub fn entities_page(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    page(state, ctx, "/entities")
}

pub fn userdash_page(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    page(state, ctx, "/userdash")
}

pub fn auth_page(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    page(state, ctx, "/auth")
}

pub fn metrics(state: &AppState, _ctx: &RequestContext) -> Result<Response, ServerError> {
    secured_json(state, 200, &state.agi.get_system_metrics())
}

pub fn api_entities(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    let mut resp = state
        .content
        .generate("/api/entities", ctx.user.as_deref(), ctx.coherence);
    apply_security_headers(&mut resp, state);
    Ok(resp)
}

pub fn api_metrics(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    let mut resp = state
        .content
        .generate("/api/metrics", ctx.user.as_deref(), ctx.coherence);
    apply_security_headers(&mut resp, state);
    Ok(resp)
}

/// POST /login. Authenticates against the collaborator's user store and, on
/// success, mints a session whose capabilities include `admin` only for the
/// admin account. Body parse failures are reported as a login failure rather
/// than a protocol error.
pub fn login(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    let data = match ctx.request.json_body() {
        Ok(value) => value,
        Err(e) => {
            error!(error = %e, "login body rejected");
            return secured_json(state, 500, &json!({"success": false, "message": "Login failed"}));
        }
    };
    let username = data.get("username").and_then(Value::as_str).unwrap_or("");
    let password = data.get("password").and_then(Value::as_str).unwrap_or("");

    let mut result = state.agi.user_login(username, password);
    let success = result["success"].as_bool().unwrap_or(false);
    if success {
        let mut capabilities: Vec<String> = ["read", "write", "chat", "train"]
            .iter()
            .map(ToString::to_string)
            .collect();
        if username == "admin" {
            capabilities.push("admin".to_string());
        }
        let session_id = state
            .security
            .generate_session(username, capabilities.clone(), SESSION_TTL);
        result["session_id"] = json!(session_id);
        result["capabilities"] = json!(capabilities);
        info!(user = %username, "user login");
    }

    let status = if success { 200 } else { 401 };
    secured_json(state, status, &result)
}

/// POST /logout. Revokes the presented session; idempotent, always succeeds.
pub fn logout(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    if let Some(token) = ctx.request.bearer_token() {
        if state.security.revoke_session(token) {
            info!("session revoked");
        }
    }
    secured_json(state, 200, &json!({"success": true}))
}

pub fn register(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    let data = ctx.request.json_body()?;
    let username = required_str(&data, "username")?;
    let password = required_str(&data, "password")?;

    if !state.agi.register_user(username, password) {
        return secured_json(state, 400, &json!({"success": false, "message": "User exists"}));
    }
    info!(user = %username, "user registered");
    secured_json(state, 200, &json!({"success": true}))
}

/// POST /chat. Routes the prompt to a single entity, or the collective when
/// no entity id is supplied. Unknown entity ids still answer as the
/// collective.
pub fn chat(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    let data = ctx.request.json_body()?;
    let input = required_str(&data, "input")?;
    let entity_id = data.get("entity_id").and_then(Value::as_str);

    let response = state.agi.generate_response(input, entity_id);
    let entity_name = entity_id
        .and_then(|id| state.agi.entity_name(id))
        .unwrap_or_else(|| "Collective".to_string());

    secured_json(
        state,
        200,
        &json!({
            "response": response,
            "entity_name": entity_name,
            "coherence": ctx.coherence,
        }),
    )
}

/// POST /collective_chat. Fans the prompt out to the named entities, then
/// asks the collective to synthesize the individual answers.
pub fn collective_chat(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    let data = ctx.request.json_body()?;
    let input = required_str(&data, "input")?;
    let entity_ids: Vec<&str> = data
        .get("entity_ids")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut individual = Vec::with_capacity(entity_ids.len());
    for entity_id in &entity_ids {
        let response = state.agi.generate_response(input, Some(entity_id));
        let entity_name = state
            .agi
            .entity_name(entity_id)
            .unwrap_or_else(|| (*entity_id).to_string());
        individual.push(json!({
            "entity_id": entity_id,
            "entity_name": entity_name,
            "response": response,
        }));
    }

    let responses: Vec<&str> = individual
        .iter()
        .filter_map(|entry| entry["response"].as_str())
        .collect();
    let synthesis = state
        .agi
        .generate_response(&format!("Synthesize: {responses:?}"), None);

    secured_json(
        state,
        200,
        &json!({
            "individual_responses": individual,
            "collective_synthesis": synthesis,
        }),
    )
}

pub fn train(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    let data = ctx.request.json_body()?;
    let entity_id = required_str(&data, "entity_id")?;
    let training_data = data
        .get("training_data")
        .ok_or_else(|| ServerError::Internal("missing field: training_data".to_string()))?;

    let result = state.agi.train_entity(entity_id, training_data);
    let status = if result["success"].as_bool().unwrap_or(false) {
        200
    } else {
        400
    };
    secured_json(state, status, &result)
}

/// POST /assign_entity. Requires an authenticated user; attaches one entity
/// to their roster, capped at three.
pub fn assign_entity(state: &AppState, ctx: &RequestContext) -> Result<Response, ServerError> {
    let Some(user) = ctx.user.as_deref() else {
        return secured_json(state, 401, &json!({"success": false}));
    };
    let data = ctx.request.json_body()?;
    let entity_id = required_str(&data, "entity_id")?;

    if state.agi.assign_entity(user, entity_id) {
        secured_json(state, 200, &json!({"success": true}))
    } else {
        secured_json(state, 400, &json!({"success": false}))
    }
}
