//! Toy JSX → `React.createElement` rewrite
//!
//! A regex heuristic, not a parser. One pass, two rules:
//!
//! - self-closing tags: `<Badge variant="x" />`
//! - leaf elements whose children are only text and `{expr}`:
//!   `<Button onClick={go}>Save {n}</Button>`
//!
//! Nested elements are rewritten innermost-only (the parent keeps its JSX),
//! fragments (`<>…</>`) and spread attributes (`{...props}`) are left alone.
//! Anything left over still needs a real transpiler.

#![warn(clippy::all, rust_2018_idioms)]

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::TransformPass;

const ATTRS: &str = r#"((?:\s+[A-Za-z_][\w\-:]*(?:\s*=\s*(?:"[^"]*"|'[^']*'|\{[^{}]*\}))?)*)"#;

static SELF_CLOSING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"<([A-Za-z][\w.]*){}\s*/>", ATTRS)).expect("Invalid regex pattern")
});

static LEAF_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"<([A-Za-z][\w.]*){}\s*>([^<>]*)</([A-Za-z][\w.]*)\s*>", ATTRS))
        .expect("Invalid regex pattern")
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][\w\-:]*)(?:\s*=\s*("[^"]*"|'[^']*'|\{[^{}]*\}))?"#)
        .expect("Invalid regex pattern")
});

static CHILD_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]*)\}|([^{}]+)").expect("Invalid regex pattern"));

/// Best-effort JSX rewrite; see the module docs for what it can and cannot do
#[derive(Debug, Default, Clone, Copy)]
pub struct ToyJsxTransform;

impl TransformPass for ToyJsxTransform {
    fn name(&self) -> &'static str {
        "toy-jsx"
    }

    fn apply(&self, code: &str) -> String {
        let pass = SELF_CLOSING.replace_all(code, |caps: &Captures<'_>| {
            create_element(&caps[1], caps.get(2).map_or("", |m| m.as_str()), &[])
        });

        LEAF_ELEMENT
            .replace_all(&pass, |caps: &Captures<'_>| {
                if caps[1] != caps[4] {
                    return caps[0].to_string();
                }
                let children = children(&caps[3]);
                create_element(&caps[1], caps.get(2).map_or("", |m| m.as_str()), &children)
            })
            .into_owned()
    }
}

fn create_element(tag: &str, attrs: &str, children: &[String]) -> String {
    let mut out = format!("React.createElement({}, {}", element_type(tag), props(attrs));
    for child in children {
        out.push_str(", ");
        out.push_str(child);
    }
    out.push(')');
    out
}

/// Intrinsic elements are strings, components are identifiers
fn element_type(tag: &str) -> String {
    let intrinsic = tag
        .chars()
        .next()
        .map(|c| c.is_ascii_lowercase())
        .unwrap_or(false)
        && !tag.contains('.');
    if intrinsic {
        format!("\"{}\"", tag)
    } else {
        tag.to_string()
    }
}

fn props(attrs: &str) -> String {
    let entries: Vec<String> = ATTRIBUTE
        .captures_iter(attrs)
        .map(|caps| {
            let name = &caps[1];
            let key = if name.contains('-') || name.contains(':') {
                format!("\"{}\"", name)
            } else {
                name.to_string()
            };
            let value = match caps.get(2).map(|m| m.as_str()) {
                Some(v) if v.starts_with('{') => v[1..v.len() - 1].trim().to_string(),
                Some(v) => v.to_string(),
                None => "true".to_string(),
            };
            format!("{}: {}", key, value)
        })
        .collect();

    if entries.is_empty() {
        "null".to_string()
    } else {
        format!("{{ {} }}", entries.join(", "))
    }
}

fn children(body: &str) -> Vec<String> {
    CHILD_SEGMENT
        .captures_iter(body)
        .filter_map(|caps| {
            if let Some(expr) = caps.get(1) {
                let expr = expr.as_str().trim();
                return (!expr.is_empty()).then(|| expr.to_string());
            }
            let text = caps.get(2)?.as_str();
            let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if collapsed.is_empty() {
                None
            } else {
                serde_json::to_string(&collapsed).ok()
            }
        })
        .collect()
}
