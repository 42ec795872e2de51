use std::collections::HashMap;
use std::fs;

use alice_httpd::template::{render, TemplateContext, Value};

fn entity(id: &str, name: &str, archetype: &str, coherence: f64, level: i64) -> Value {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), Value::from(id));
    fields.insert("name".to_string(), Value::from(name));
    fields.insert("archetype".to_string(), Value::from(archetype));
    fields.insert("coherence".to_string(), Value::Num(coherence));
    fields.insert("training_level".to_string(), Value::from(level));
    Value::Map(fields)
}

/// Every key the shipped site templates reference.
fn site_context() -> TemplateContext {
    let mut ctx = TemplateContext::new();
    ctx.insert("SYSTEM_COHERENCE".into(), Value::Num(0.93));
    ctx.insert("QUANTUM_ENTROPY".into(), Value::Num(0.42));
    ctx.insert("ACTIVE_ENTITIES".into(), Value::Num(2.0));
    ctx.insert("TIMESTAMP".into(), Value::Num(1_700_000_000.0));
    ctx.insert("USER".into(), Value::from("alice"));
    ctx.insert("SESSION_ID".into(), Value::from("quantum_session"));
    ctx.insert("ASS_VERSION".into(), Value::from("1.0"));
    ctx.insert("COHERENCE_STATUS".into(), Value::from("Stable"));
    ctx.insert("SYSTEM_UPTIME".into(), Value::from("5m 23s"));
    ctx.insert("TOTAL_MEMORY".into(), Value::Num(128.0));
    ctx.insert("ACTIVE_SESSIONS".into(), Value::Num(1.0));
    ctx.insert("TOTAL_ENTANGLEMENTS".into(), Value::Num(12.0));
    ctx.insert(
        "ENTITIES".into(),
        Value::List(vec![
            entity("01", "quantum_01", "analytic", 0.82, 3),
            entity("05", "emotional_05", "empathic", 0.77, 1),
        ]),
    );
    ctx.insert(
        "USER_ENTITIES".into(),
        Value::List(vec![Value::from("01")]),
    );
    ctx
}

#[test]
fn test_plain_text_passes_through() {
    let ctx = TemplateContext::new();
    assert_eq!(render("no tags at all", &ctx), "no tags at all");
}

#[test]
fn test_scalar_loop_concatenates_items() {
    let mut ctx = TemplateContext::new();
    ctx.insert(
        "XS".into(),
        Value::List(vec![Value::from(1i64), Value::from(2i64), Value::from(3i64)]),
    );
    assert_eq!(render("{{#each XS}}{{this}}{{/each}}", &ctx), "123");
}

#[test]
fn test_loop_fields_shadow_outer_keys() {
    let mut ctx = TemplateContext::new();
    ctx.insert("name".into(), Value::from("mothership"));
    let mut a = HashMap::new();
    a.insert("name".to_string(), Value::from("alice"));
    a.insert("rank".to_string(), Value::from(1i64));
    let mut b = HashMap::new();
    b.insert("name".to_string(), Value::from("bob"));
    b.insert("rank".to_string(), Value::from(2i64));
    ctx.insert("CREW".into(), Value::List(vec![Value::Map(a), Value::Map(b)]));

    let out = render(
        "{{#each CREW}}{{name}}:{{this.rank}} {{/each}}from {{name}}",
        &ctx,
    );
    assert_eq!(out, "alice:1 bob:2 from mothership");
}

#[test]
fn test_missing_loop_target_expands_to_nothing() {
    let ctx = TemplateContext::new();
    assert_eq!(render("[{{#each GHOSTS}}{{this}}{{/each}}]", &ctx), "[]");
}

#[test]
fn test_numeric_conditions_branch() {
    let mut ctx = TemplateContext::new();
    ctx.insert("C".into(), Value::Num(0.8));

    assert_eq!(render("{{#if C>=0.8}}ok{{/if}}", &ctx), "ok");
    assert_eq!(render("{{#if C>0.8}}ok{{/if}}", &ctx), "");
    assert_eq!(render("{{#if C<=0.8}}low{{/if}}", &ctx), "low");
    // A missing variable reads as zero in ordered comparisons.
    assert_eq!(render("{{#if GHOST<1}}zero{{/if}}", &ctx), "zero");
}

#[test]
fn test_string_equality_strips_quotes() {
    let mut ctx = TemplateContext::new();
    ctx.insert("USER".into(), Value::from("guest"));

    assert_eq!(render(r#"{{#if USER == "guest"}}anon{{/if}}"#, &ctx), "anon");
    assert_eq!(render("{{#if USER == 'guest'}}anon{{/if}}", &ctx), "anon");
    assert_eq!(render(r#"{{#if USER != "guest"}}known{{/if}}"#, &ctx), "");
}

#[test]
fn test_bare_condition_is_truthiness() {
    let mut ctx = TemplateContext::new();
    ctx.insert("EMPTY".into(), Value::List(vec![]));
    ctx.insert("FULL".into(), Value::List(vec![Value::from("x")]));

    assert_eq!(render("{{#if MISSING}}a{{/if}}", &ctx), "");
    assert_eq!(render("{{#if EMPTY}}b{{/if}}", &ctx), "");
    assert_eq!(render("{{#if FULL}}c{{/if}}", &ctx), "c");
}

#[test]
fn test_loops_expand_before_conditionals() {
    let mut ctx = TemplateContext::new();
    ctx.insert("N".into(), Value::Num(2.0));
    ctx.insert(
        "XS".into(),
        Value::List(vec![Value::from("x"), Value::from("y")]),
    );
    assert_eq!(
        render("{{#if N>0}}{{#each XS}}{{this}}{{/each}}{{/if}}", &ctx),
        "xy"
    );

    ctx.insert("N".into(), Value::Num(0.0));
    assert_eq!(
        render("{{#if N>0}}{{#each XS}}{{this}}{{/each}}{{/if}}", &ctx),
        ""
    );
}

#[test]
fn test_unknown_placeholder_is_left_visible() {
    let ctx = TemplateContext::new();
    assert_eq!(render("hello {{MYSTERY}}", &ctx), "hello {{MYSTERY}}");
}

#[test]
fn test_compute_params_see_substituted_text() {
    let mut ctx = TemplateContext::new();
    ctx.insert("USER".into(), Value::from("alice"));
    let out = render(
        r#"{{QUANTUM_COMPUTE: probe, params: {observer: "{{USER}}", depth: 2}}}"#,
        &ctx,
    );
    assert_eq!(out, "[QUANTUM_RESULT: probe({observer: alice, depth: 2})]");
}

#[test]
fn test_shipped_dashboard_renders_completely() {
    let source = fs::read_to_string("ass_scripts/index.ass").unwrap();
    let out = render(&source, &site_context());

    assert!(!out.contains("{{"), "unrendered tag in output: {out}");
    assert!(out.contains("quantum_01"));
    assert!(out.contains("emotional_05"));
    assert!(out.contains("welcome back, alice"));
    assert!(out.contains("[QUANTUM_RESULT: entanglement_sweep"));
    // Only the stable-coherence banner should survive at 0.93.
    assert!(!out.contains("Coherence degraded"));
}

#[test]
fn test_all_shipped_templates_render_without_leftover_tags() {
    let ctx = site_context();
    for name in [
        "index.ass",
        "admin.ass",
        "training.ass",
        "entity.ass",
        "userdash.ass",
        "auth.ass",
    ] {
        let source = fs::read_to_string(format!("ass_scripts/{name}")).unwrap();
        let out = render(&source, &ctx);
        assert!(!out.contains("{{"), "{name} left tags behind: {out}");
        assert!(!out.is_empty());
    }
}
