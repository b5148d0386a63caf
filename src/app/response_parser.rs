//! Splits a model response into description and code.
//!
//! Expected framing is `DESCRIPTION: <text>` followed by `CODE:` and the
//! source. Models drift, so three shapes are accepted in priority order:
//! the framing, a fenced code block, a bare component function. Anything
//! else is treated as code in its entirety. Parsing never fails.
//!
//! A bare function runs until its brackets balance and a following line
//! reads as prose, so closing remarks after the code are left out.

#![warn(clippy::all, rust_2018_idioms)]

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::app::normalizer::code_mask;

static FRAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)DESCRIPTION:\s*(.*?)\s*CODE:\s*\n?(.*)").expect("Invalid regex pattern")
});

static FENCED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\n(.*?)\n?```").expect("Invalid regex pattern")
});

static BARE_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export\s+(?:default\s+)?)?(?:function\s+[A-Z]\w*\s*\(|const\s+[A-Z]\w*\s*=\s*(?:\([^)]*\)|\w+)\s*=>)")
        .expect("Invalid regex pattern")
});

/// A sentence-like line: optional bullet, a word, then another word
static PROSE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-*]\s+|\d+\.\s+)?([A-Za-z][\w']*)(?:[,:]?[ \t]+[A-Za-z]|[.!]\s*$)")
        .expect("Invalid regex pattern")
});

/// Leading words that start a top-level statement rather than a sentence
const STATEMENT_KEYWORDS: &[&str] = &[
    "async", "await", "class", "const", "declare", "default", "enum", "export", "function", "if", "import",
    "interface", "let", "new", "return", "throw", "type", "var",
];

/// Which rule matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResponseShape {
    Framed,
    Fenced,
    BareFunction,
    Whole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedResponse {
    pub description: Option<String>,
    pub code: String,
    pub shape: ResponseShape,
}

pub fn parse_response(text: &str) -> ParsedResponse {
    if let Some(caps) = FRAMED.captures(text) {
        let description = caps.get(1).map(|m| m.as_str().trim().to_string());
        let code = caps.get(2).map_or("", |m| m.as_str()).trim();
        // Framing with an empty body falls through to the looser rules
        if !code.is_empty() {
            return ParsedResponse {
                description: description.filter(|d| !d.is_empty()),
                code: unfence(code),
                shape: ResponseShape::Framed,
            };
        }
    }

    if let Some(body) = FENCED.captures(text).and_then(|caps| caps.get(1)) {
        let description = text[..body.start()]
            .rsplit_once("```")
            .map(|(before, _)| before.trim())
            .filter(|before| !before.is_empty())
            .map(str::to_string);
        return ParsedResponse {
            description,
            code: body.as_str().trim().to_string(),
            shape: ResponseShape::Fenced,
        };
    }

    if let Some(start) = BARE_FUNCTION.find(text) {
        let description = text[..start.start()].trim();
        return ParsedResponse {
            description: (!description.is_empty()).then(|| description.to_string()),
            code: text[start.start()..code_end(text, start.start())].trim().to_string(),
            shape: ResponseShape::BareFunction,
        };
    }

    ParsedResponse {
        description: None,
        code: text.trim().to_string(),
        shape: ResponseShape::Whole,
    }
}

/// Byte offset where the code beginning at `start` ends.
///
/// The code ends at the first line that begins outside every bracket, outside
/// any string or comment, and reads as prose. Without one, the code runs to
/// the end of the text.
fn code_end(text: &str, start: usize) -> usize {
    let code = &text[start..];
    let bytes = code.as_bytes();
    let mask = code_mask(code);
    let mut depth = 0i32;
    let mut offset = 0;

    for (index, line) in code.split_inclusive('\n').enumerate() {
        let trimmed = line.trim_start();
        let first = offset + (line.len() - trimmed.len());
        let in_code = mask.get(first).copied().unwrap_or(false);
        if index > 0 && depth <= 0 && in_code && is_prose(trimmed.trim_end()) {
            return start + offset;
        }

        for i in offset..offset + line.len() {
            if !mask[i] {
                continue;
            }
            match bytes[i] {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth -= 1,
                _ => {}
            }
        }
        offset += line.len();
    }

    text.len()
}

fn is_prose(line: &str) -> bool {
    PROSE_LINE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|word| !STATEMENT_KEYWORDS.contains(&word.as_str()))
        .unwrap_or(false)
}

/// Framed code is often fenced as well
fn unfence(code: &str) -> String {
    match FENCED.captures(code).and_then(|caps| caps.get(1)) {
        Some(body) => body.as_str().trim().to_string(),
        None => code.to_string(),
    }
}
