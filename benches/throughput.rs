use std::collections::HashMap;
use std::hint::black_box;

use alice_httpd::http::{parse_request, Response};
use alice_httpd::router::Router;
use alice_httpd::template::{render, TemplateContext, Value};
use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;

fn dashboard_source() -> String {
    std::fs::read_to_string("ass_scripts/index.ass").expect("dashboard template present")
}

fn dashboard_context() -> TemplateContext {
    let mut ctx = TemplateContext::new();
    ctx.insert("SYSTEM_COHERENCE".into(), Value::Num(0.93));
    ctx.insert("QUANTUM_ENTROPY".into(), Value::Num(0.42));
    ctx.insert("ACTIVE_ENTITIES".into(), Value::Num(5.0));
    ctx.insert("TIMESTAMP".into(), Value::Num(1_700_000_000.0));
    ctx.insert("USER".into(), Value::from("admin"));
    ctx.insert("SESSION_ID".into(), Value::from("quantum_session"));
    ctx.insert("ASS_VERSION".into(), Value::from("1.0"));
    ctx.insert("COHERENCE_STATUS".into(), Value::from("Stable"));
    ctx.insert("SYSTEM_UPTIME".into(), Value::from("5m 23s"));
    ctx.insert("TOTAL_MEMORY".into(), Value::Num(128.0));
    ctx.insert("ACTIVE_SESSIONS".into(), Value::Num(3.0));
    ctx.insert("TOTAL_ENTANGLEMENTS".into(), Value::Num(12.0));

    let entities = (1..=5)
        .map(|i| {
            let mut fields = HashMap::new();
            fields.insert("id".to_string(), Value::from(format!("{i:02}")));
            fields.insert("name".to_string(), Value::from(format!("quantum_{i:02}")));
            fields.insert("archetype".to_string(), Value::from("analytic"));
            fields.insert("coherence".to_string(), Value::Num(0.8));
            fields.insert("training_level".to_string(), Value::from(i as i64));
            Value::Map(fields)
        })
        .collect();
    ctx.insert("ENTITIES".into(), Value::List(entities));
    ctx.insert("USER_ENTITIES".into(), Value::List(vec![Value::from("01")]));
    ctx
}

fn bench_template_render(c: &mut Criterion) {
    let source = dashboard_source();
    let ctx = dashboard_context();
    c.bench_function("template_render_dashboard", |b| {
        b.iter(|| black_box(render(black_box(&source), &ctx)))
    });
}

fn bench_request_parse(c: &mut Criterion) {
    let raw = b"POST /chat HTTP/1.1\r\nHost: localhost\r\nAuthorization: Bearer 0123456789abcdef\r\nContent-Type: application/json\r\nContent-Length: 24\r\n\r\n{\"input\": \"hello field\"}";
    c.bench_function("request_parse", |b| {
        b.iter(|| black_box(parse_request(black_box(raw))))
    });
}

fn bench_route_match(c: &mut Criterion) {
    let router = Router::default();
    c.bench_function("route_match", |b| {
        let test_paths = [
            (Method::GET, "/"),
            (Method::GET, "/dashboard"),
            (Method::GET, "/api/metrics"),
            (Method::POST, "/login"),
            (Method::GET, "/quantum/void"),
        ];
        b.iter(|| {
            for (method, path) in test_paths.iter() {
                let res = router.route(method, path);
                black_box(&res);
            }
        })
    });
}

fn bench_response_serialize(c: &mut Criterion) {
    let mut resp = Response::html(200, "<html><body>field stable</body></html>".to_string());
    resp.push_header("X-Coherence", "0.99");
    resp.push_header("Strict-Transport-Security", "max-age=31536000");
    c.bench_function("response_serialize", |b| {
        b.iter(|| black_box(resp.to_bytes()))
    });
}

criterion_group!(
    benches,
    bench_template_render,
    bench_request_parse,
    bench_route_match,
    bench_response_serialize
);
criterion_main!(benches);
