//! Alice Side Script template engine.
//!
//! Renders `.ass` markup against a per-request context map. Four tag families
//! are recognized:
//!
//! - `{{#each NAME}} ... {{/each}}` loop blocks
//! - `{{#if CONDITION}} ... {{/if}}` conditional blocks
//! - `{{KEY}}` scalar placeholders
//! - `{{QUANTUM_COMPUTE: name, params: {...}}}` compute stubs
//!
//! The stage order is load-bearing: loops run first so their expanded bodies
//! can feed the conditional and placeholder passes, and compute stubs run last
//! so their parameters see fully substituted text. Within a loop block the
//! item's own fields are substituted before the outer placeholder pass, so a
//! per-item key shadows an outer context key of the same name.
//!
//! Rendering never fails. A block that does not match its tag grammar passes
//! through unchanged, and an unknown placeholder is left in the output for the
//! caller to see.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

mod value;

pub use value::Value;

/// Per-render context. Supplied by the caller, only ever read by the engine.
pub type TemplateContext = HashMap<String, Value>;

static EACH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{\{#each\s+(\w+)\}\}(.*?)\{\{/each\}\}")
        .expect("each regex should be valid")
});

static IF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{\{#if\s+([^}]+)\}\}(.*?)\{\{/if\}\}").expect("if regex should be valid")
});

static COMPUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{QUANTUM_COMPUTE:\s*(\w+),\s*params:\s*\{([^}]+)\}\}\}")
        .expect("compute regex should be valid")
});

/// Render template `content` against `ctx`.
#[must_use]
pub fn render(content: &str, ctx: &TemplateContext) -> String {
    let content = expand_loops(content, ctx);
    let content = resolve_conditionals(&content, ctx);
    let content = substitute_placeholders(&content, ctx);
    expand_compute_tags(&content)
}

fn expand_loops(content: &str, ctx: &TemplateContext) -> String {
    EACH_RE
        .replace_all(content, |caps: &Captures| {
            let name = &caps[1];
            let block = &caps[2];
            let items: &[Value] = match ctx.get(name) {
                Some(Value::List(items)) => items,
                Some(other) => {
                    warn!(block = %name, found = other.type_name(), "loop target is not a list");
                    return String::new();
                }
                None => &[],
            };

            let mut out = String::new();
            for item in items {
                let mut body = block.to_string();
                match item {
                    Value::Map(entries) => {
                        for (key, value) in entries {
                            let rendered = value.to_string();
                            body = body.replace(&format!("{{{{this.{key}}}}}"), &rendered);
                            body = body.replace(&format!("{{{{{key}}}}}"), &rendered);
                        }
                    }
                    scalar => {
                        body = body.replace("{{this}}", &scalar.to_string());
                    }
                }
                out.push_str(&body);
            }
            out
        })
        .into_owned()
}

fn resolve_conditionals(content: &str, ctx: &TemplateContext) -> String {
    IF_RE
        .replace_all(content, |caps: &Captures| {
            if evaluate_condition(caps[1].trim(), ctx) {
                caps[2].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Evaluate an `{{#if}}` condition.
///
/// Two-character operators are scanned before their one-character prefixes so
/// `>=` is never misread as `>` followed by a stray `=`. Equality compares the
/// value's string form against the (quote-stripped) literal; the ordered
/// operators compare as floats. A condition with no operator is a truthiness
/// check on a single context key.
fn evaluate_condition(condition: &str, ctx: &TemplateContext) -> bool {
    for op in ["==", "!=", ">=", "<=", ">", "<"] {
        if let Some((lhs, rhs)) = condition.split_once(op) {
            let var = lhs.trim();
            let literal = rhs.trim();
            return match op {
                "==" => context_string(ctx, var) == strip_quotes(literal),
                "!=" => context_string(ctx, var) != strip_quotes(literal),
                _ => numeric_compare(ctx, var, literal, op),
            };
        }
    }
    ctx.get(condition).map(Value::is_truthy).unwrap_or(false)
}

/// String form of a context entry; missing keys read as the empty string.
fn context_string(ctx: &TemplateContext, var: &str) -> String {
    ctx.get(var).map(ToString::to_string).unwrap_or_default()
}

/// Ordered comparison. A missing variable reads as 0; a side with no numeric
/// form makes the whole condition false rather than aborting the render.
fn numeric_compare(ctx: &TemplateContext, var: &str, literal: &str, op: &str) -> bool {
    let Ok(rhs) = literal.parse::<f64>() else {
        return false;
    };
    let lhs = match ctx.get(var) {
        Some(value) => match value.as_f64() {
            Some(n) => n,
            None => return false,
        },
        None => 0.0,
    };
    match op {
        ">" => lhs > rhs,
        "<" => lhs < rhs,
        ">=" => lhs >= rhs,
        "<=" => lhs <= rhs,
        _ => false,
    }
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'')
}

fn substitute_placeholders(content: &str, ctx: &TemplateContext) -> String {
    let mut content = content.to_string();
    for (key, value) in ctx {
        // Composites belong to loop expansion and are skipped here.
        if value.is_composite() {
            continue;
        }
        content = content.replace(&format!("{{{{{key}}}}}"), &value.to_string());
    }
    content
}

/// Replace compute tags with a formatted result stub. No computation happens;
/// the tag's name and parsed parameters are echoed back in a bracketed form.
fn expand_compute_tags(content: &str) -> String {
    COMPUTE_RE
        .replace_all(content, |caps: &Captures| {
            let name = &caps[1];
            let mut params = Vec::new();
            for pair in caps[2].split(',') {
                if let Some((key, value)) = pair.split_once(':') {
                    params.push(format!("{}: {}", key.trim(), strip_quotes(value.trim())));
                }
            }
            format!("[QUANTUM_RESULT: {name}({{{}}})]", params.join(", "))
        })
        .into_owned()
}
