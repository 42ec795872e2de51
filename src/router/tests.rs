use std::sync::Arc;

use http::Method;
use serde_json::{json, Value};

use super::{app_routes, Route, Router};
use crate::agi::AgiCore;
use crate::content::ContentGenerator;
use crate::error::ServerError;
use crate::handlers::{AppState, RequestContext};
use crate::http::{parse_request, Response};
use crate::security::SecurityManager;

fn test_state() -> AppState {
    let agi = Arc::new(AgiCore::new());
    let security = Arc::new(SecurityManager::new());
    let content = Arc::new(ContentGenerator::new(
        Arc::clone(&agi),
        "ass_scripts",
        "public",
    ));
    AppState {
        agi,
        security,
        content,
    }
}

fn get(path: &str) -> crate::http::Request {
    let raw = format!("GET {path} HTTP/1.1\r\n\r\n");
    parse_request(raw.as_bytes()).unwrap()
}

fn marker_a(_: &AppState, _: &RequestContext) -> Result<Response, ServerError> {
    Ok(Response::text(200, "a"))
}

fn marker_b(_: &AppState, _: &RequestContext) -> Result<Response, ServerError> {
    Ok(Response::text(200, "b"))
}

#[test]
fn test_exact_match_wins() {
    let router = Router::new(vec![
        Route {
            method: Method::GET,
            path: "/api/entity/{id}",
            handler: marker_a,
        },
        Route {
            method: Method::GET,
            path: "/api/entity/list",
            handler: marker_b,
        },
    ]);
    let state = test_state();

    let request = get("/api/entity/list");
    let ctx = RequestContext {
        request: &request,
        user: None,
        coherence: 1.0,
    };
    let resp = router.dispatch(&state, &ctx).unwrap();
    assert_eq!(resp.body, b"b");
}

#[test]
fn test_pattern_prefix_first_match_wins() {
    let router = Router::new(vec![
        Route {
            method: Method::GET,
            path: "/api/{rest}",
            handler: marker_a,
        },
        Route {
            method: Method::GET,
            path: "/api/entity/{id}",
            handler: marker_b,
        },
    ]);
    let state = test_state();

    let request = get("/api/entity/42");
    let ctx = RequestContext {
        request: &request,
        user: None,
        coherence: 1.0,
    };
    let resp = router.dispatch(&state, &ctx).unwrap();
    assert_eq!(resp.body, b"a", "insertion order decides between patterns");
}

#[test]
fn test_pattern_is_method_scoped() {
    let router = Router::new(vec![Route {
        method: Method::POST,
        path: "/api/entity/{id}",
        handler: marker_a,
    }]);
    assert!(router.route(&Method::GET, "/api/entity/42").is_none());
    assert!(router.route(&Method::POST, "/api/entity/42").is_some());
}

#[test]
fn test_unmatched_path_falls_back_to_content() {
    let router = Router::default();
    let state = test_state();

    let request = get("/somewhere/else");
    let ctx = RequestContext {
        request: &request,
        user: None,
        coherence: 0.85,
    };
    let resp = router.dispatch(&state, &ctx).unwrap();
    assert_eq!(resp.status, 200);
    let body = String::from_utf8(resp.body).unwrap();
    assert!(body.contains("Alice Side Script Dynamic Content"));
    let coherence = resp
        .headers
        .iter()
        .find(|(n, _)| n == "X-Coherence")
        .map(|(_, v)| v.clone())
        .unwrap();
    assert_eq!(coherence, "0.85");
}

#[test]
fn test_default_table_routes_login_only_for_post() {
    let router = Router::default();
    assert!(router.route(&Method::POST, "/login").is_some());
    assert!(
        router.route(&Method::GET, "/login").is_none(),
        "GET /login falls through to the content generator"
    );
}

#[test]
fn test_default_table_covers_every_page_and_api_route() {
    let router = Router::new(app_routes());
    for path in [
        "/",
        "/dashboard",
        "/admin",
        "/training",
        "/entities",
        "/userdash",
        "/auth",
        "/metrics",
        "/api/entities",
        "/api/metrics",
    ] {
        assert!(router.route(&Method::GET, path).is_some(), "GET {path}");
    }
    for path in [
        "/login",
        "/logout",
        "/register",
        "/chat",
        "/collective_chat",
        "/train",
        "/assign_entity",
    ] {
        assert!(router.route(&Method::POST, path).is_some(), "POST {path}");
    }
}

#[test]
fn test_dispatch_runs_registered_handler() {
    let router = Router::default();
    let state = test_state();

    let raw = format!(
        "POST /login HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}",
        r#"{}"#
    );
    let request = parse_request(raw.as_bytes()).unwrap();
    let ctx = RequestContext {
        request: &request,
        user: None,
        coherence: 1.0,
    };
    let resp = router.dispatch(&state, &ctx).unwrap();
    assert_eq!(resp.status, 401);
    let body: Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(body, json!({"success": false, "message": "User not found"}));
}
