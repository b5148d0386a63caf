//! Source Normalizer
//!
//! Turns raw generated text into something a JavaScript engine (or an
//! in-browser transpiler) has a chance of executing:
//!
//! 1. markdown fence delimiters are dropped, their content kept
//! 2. `import` statements and `export` keywords/statements are removed
//! 3. `interface` and `type` declarations are removed
//! 4. type annotations on hook generics, parameters, return positions and
//!    variable declarations are removed
//!
//! Every step is a heuristic over text, not a parse. [`normalize`] never
//! panics on any input and `normalize(normalize(x)) == normalize(x)`.
//!
//! The normalizer never invents a component entry point. Use [`entry_point`]
//! to find out whether one exists.

#![warn(clippy::all, rust_2018_idioms)]

use once_cell::sync::Lazy;
use regex::Regex;

/// Conventional name of the component generated code must define
pub const ENTRY_POINT: &str = "GeneratedApp";

/// Upper bound on how far a single type annotation is scanned
const MAX_TYPE_LEN: usize = 256;

/// Upper bound on the size of a removed interface/type declaration
const MAX_DECLARATION_LEN: usize = 8192;

/// Upper bound on repeated pass rounds
const MAX_ROUNDS: usize = 32;

static FENCE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```[\w+#.\-]*\s*$").expect("Invalid regex pattern"));

static IMPORT_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^import(\s|\{|\*|'|")"#).expect("Invalid regex pattern"));

static MODULE_SPECIFIER_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"from\s*['"]"#).expect("Invalid regex pattern"));

static SPECIFIER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w$\s,{}*]*$").expect("Invalid regex pattern"));

static EXPORT_KEEP_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^export\s+(default\s+)?((async\s+)?function\b|class\b|const\b|let\b|var\b|interface\b|type\b|enum\b)")
        .expect("Invalid regex pattern")
});

static EXPORT_DEFAULT_EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^export\s+default\s+").expect("Invalid regex pattern"));

static EXPORT_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^export(\s|\{|\*)").expect("Invalid regex pattern"));

static BARE_IDENTIFIER_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w$.]+\s*;?\s*$").expect("Invalid regex pattern"));

static DECLARATION_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:declare\s+)?(interface|type)\s+[A-Za-z_$][\w$]*")
        .expect("Invalid regex pattern")
});

static HOOK_GENERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(useState|useRef|useMemo|useCallback|useReducer|useContext|createContext|useEffect|useLayoutEffect)\s*<")
        .expect("Invalid regex pattern")
});

static FUNCTION_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w$])function\s*\*?\s*[\w$]*\s*(?:<[^()]*>)?\s*$")
        .expect("Invalid regex pattern")
});

static VARIABLE_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w$.])(const|let|var)\s+").expect("Invalid regex pattern"));

static GENERATED_APP_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w$.])(?:function\s+GeneratedApp\b|(?:const|let|var)\s+GeneratedApp\s*=|class\s+GeneratedApp\b)")
        .expect("Invalid regex pattern")
});

static COMPONENT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:async\s+)?(?:function\s+([A-Z][\w$]*)\s*\(|(?:const|let|var)\s+([A-Z][\w$]*)\s*=|class\s+([A-Z][\w$]*)\b)")
        .expect("Invalid regex pattern")
});

/// Normalize raw generated source. Total and idempotent.
///
/// Removing one construct can bring another to the start of a line (a type
/// alias followed by an import on the same line), so the passes repeat until
/// nothing changes. Every pass only deletes text, which bounds the loop.
pub fn normalize(raw: &str) -> String {
    let mut text = raw.to_string();
    for _ in 0..MAX_ROUNDS {
        let next = normalize_round(&text);
        if next == text {
            break;
        }
        text = next;
    }
    text
}

fn normalize_round(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n");
    let text = strip_fences(&text);
    let text = strip_module_syntax(&text);
    let text = strip_type_declarations(&text);
    let text = strip_type_annotations(&text);
    text.trim().to_string()
}

/// Name of the component the code declares, if any.
///
/// `GeneratedApp` wins when declared anywhere; otherwise the last top-level
/// capitalized function, const or class declaration is taken.
pub fn entry_point(code: &str) -> Option<String> {
    if GENERATED_APP_DECL.is_match(code) {
        return Some(ENTRY_POINT.to_string());
    }

    COMPONENT_DECL
        .captures_iter(code)
        .filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
        })
        .last()
}

// ---------------------------------------------------------------------------
// Step 1: fences
// ---------------------------------------------------------------------------

fn strip_fences(text: &str) -> String {
    if !text.contains("```") {
        return text.to_string();
    }

    text.lines()
        .filter(|line| !FENCE_LINE.is_match(line))
        .map(|line| line.replace("```", ""))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Step 2: import / export
// ---------------------------------------------------------------------------

fn strip_module_syntax(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_statement = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        let indent = &line[..line.len() - trimmed.len()];

        if in_statement {
            if MODULE_SPECIFIER_END.is_match(trimmed) || trimmed.ends_with(';') {
                in_statement = false;
                continue;
            }
            if SPECIFIER_LINE.is_match(trimmed) {
                if trimmed.contains('}') && !trimmed.contains('{') {
                    // `export { a, b }` closed without a trailing `from`
                    in_statement = false;
                }
                continue;
            }
            // Not a specifier list after all; stop swallowing lines
            in_statement = false;
        }

        if IMPORT_START.is_match(trimmed) {
            if !import_is_complete(trimmed) {
                in_statement = true;
            }
            continue;
        }

        if EXPORT_ANY.is_match(trimmed) {
            if let Some(kept) = rewrite_export(trimmed) {
                out.push(format!("{}{}", indent, kept));
            } else if trimmed.starts_with("export") && trimmed.contains('{') && !trimmed.contains('}')
            {
                in_statement = true;
            }
            continue;
        }

        out.push(line.to_string());
    }

    out.join("\n")
}

fn import_is_complete(line: &str) -> bool {
    MODULE_SPECIFIER_END.is_match(line)
        || line.ends_with(';')
        || line.starts_with("import '")
        || line.starts_with("import \"")
}

/// Returns the line to keep for an `export …` line, or `None` to drop it.
fn rewrite_export(line: &str) -> Option<String> {
    let mut current = line.to_string();

    // `export export const` and friends collapse fully
    loop {
        if let Some(m) = EXPORT_KEEP_DECLARATION.find(&current) {
            let keyword_start = EXPORT_KEEP_DECLARATION
                .captures(&current)
                .and_then(|caps| caps.get(2))
                .map(|g| g.start())
                .unwrap_or(m.end());
            current = current[keyword_start..].to_string();
            if EXPORT_ANY.is_match(&current) {
                continue;
            }
            return Some(current);
        }

        if let Some(m) = EXPORT_DEFAULT_EXPRESSION.find(&current) {
            let rest = &current[m.end()..];
            if rest.trim().is_empty() || BARE_IDENTIFIER_STATEMENT.is_match(rest) {
                return None;
            }
            let rest = rest.to_string();
            if EXPORT_ANY.is_match(&rest) {
                current = rest;
                continue;
            }
            return Some(rest);
        }

        // `export { … }`, `export * from`, `export import …`
        return None;
    }
}

// ---------------------------------------------------------------------------
// Step 3: interface / type declarations
// ---------------------------------------------------------------------------

fn strip_type_declarations(text: &str) -> String {
    if !text.contains("interface") && !text.contains("type") {
        return text.to_string();
    }

    let bytes = text.as_bytes();
    let mask = code_mask(text);
    let mut removals = Vec::new();

    for caps in DECLARATION_START.captures_iter(text) {
        let (Some(whole), Some(keyword)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if !mask.get(keyword.start()).copied().unwrap_or(false) {
            continue;
        }

        let end = match keyword.as_str() {
            "interface" => interface_end(bytes, &mask, whole.end()),
            _ => type_alias_end(bytes, &mask, whole.end()),
        };

        if let Some(end) = end {
            removals.push((whole.start(), consume_line_rest(bytes, end)));
        }
    }

    apply_removals(text, removals)
}

/// End (exclusive) of an interface body starting the search at `from`
fn interface_end(bytes: &[u8], mask: &[bool], from: usize) -> Option<usize> {
    let limit = (from + MAX_DECLARATION_LEN).min(bytes.len());
    let mut i = from;
    while i < limit && !(mask[i] && bytes[i] == b'{') {
        if mask[i] && (bytes[i] == b';' || bytes[i] == b'=') {
            return None;
        }
        i += 1;
    }
    if i >= limit {
        return None;
    }
    matching_close(bytes, mask, i, limit).map(|close| close + 1)
}

/// End (exclusive) of a `type X = …` alias starting after the name
fn type_alias_end(bytes: &[u8], mask: &[bool], from: usize) -> Option<usize> {
    let limit = (from + MAX_DECLARATION_LEN).min(bytes.len());
    let mut i = skip_ws(bytes, from);

    if i < limit && bytes[i] == b'<' {
        let mut depth = 0i32;
        while i < limit {
            match bytes[i] {
                b'<' => depth += 1,
                b'>' if bytes[i - 1] != b'=' => {
                    depth -= 1;
                    if depth == 0 {
                        i += 1;
                        break;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        i = skip_ws(bytes, i);
    }

    if i >= limit || bytes[i] != b'=' {
        return None;
    }
    i += 1;

    let mut depth = 0i32;
    while i < limit {
        if !mask[i] {
            i += 1;
            continue;
        }
        match bytes[i] {
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'>' if bytes[i - 1] != b'=' => depth -= 1,
            b';' if depth <= 0 => return Some(i + 1),
            b'\n' if depth <= 0 => {
                let next = skip_ws(bytes, i + 1);
                let continues = matches!(bytes.get(next), Some(b'|') | Some(b'&'));
                if !continues {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    if i >= bytes.len() {
        Some(bytes.len())
    } else {
        None
    }
}

/// Extend a removal over trailing `;`, spaces and one newline
fn consume_line_rest(bytes: &[u8], mut end: usize) -> usize {
    while end < bytes.len() && (bytes[end] == b';' || bytes[end] == b' ' || bytes[end] == b'\t') {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'\n' {
        end += 1;
    }
    end
}

// ---------------------------------------------------------------------------
// Step 4: type annotations
// ---------------------------------------------------------------------------

fn strip_type_annotations(text: &str) -> String {
    let text = strip_hook_generics(text);
    let text = strip_signature_annotations(&text);
    strip_variable_annotations(&text)
}

/// `useState<string[]>(…)` → `useState(…)`
fn strip_hook_generics(text: &str) -> String {
    let bytes = text.as_bytes();
    let mask = code_mask(text);
    let mut removals = Vec::new();

    for m in HOOK_GENERIC.find_iter(text) {
        let lt = m.end() - 1;
        if !mask[lt] {
            continue;
        }
        let limit = (lt + MAX_TYPE_LEN).min(bytes.len());
        let mut depth = 0i32;
        let mut i = lt;
        let mut gt = None;
        while i < limit {
            match bytes[i] {
                b'<' => depth += 1,
                b'>' if bytes[i - 1] != b'=' => {
                    depth -= 1;
                    if depth == 0 {
                        gt = Some(i);
                        break;
                    }
                }
                b';' | b'\n' => break,
                _ => {}
            }
            i += 1;
        }
        if let Some(gt) = gt {
            if bytes.get(skip_ws(bytes, gt + 1)) == Some(&b'(') {
                removals.push((lt, gt + 1));
            }
        }
    }

    apply_removals(text, removals)
}

/// Parameter annotations and return types of functions and arrows
fn strip_signature_annotations(text: &str) -> String {
    let bytes = text.as_bytes();
    let mask = code_mask(text);
    let mut removals = Vec::new();

    for (open, close) in matching_parens(bytes, &mask) {
        let after = skip_ws(bytes, close + 1);
        let colon_after = bytes.get(after) == Some(&b':') && mask[after];

        let mut return_type = None;
        let is_signature = if FUNCTION_HEAD.is_match(lookbehind(text, open)) {
            if colon_after {
                return_type = scan_type(bytes, &mask, after + 1, bytes.len(), TypeEnd::FunctionBody)
                    .map(|end| (after, end));
            }
            true
        } else if bytes[after..].starts_with(b"=>") {
            true
        } else if colon_after {
            match scan_type(bytes, &mask, after + 1, bytes.len(), TypeEnd::ArrowBody) {
                Some(end) => {
                    return_type = Some((after, end));
                    true
                }
                None => false,
            }
        } else {
            false
        };

        if is_signature {
            collect_parameter_annotations(bytes, &mask, open, close, &mut removals);
            if let Some(range) = return_type {
                removals.push(range);
            }
        }
    }

    apply_removals(text, removals)
}

fn collect_parameter_annotations(
    bytes: &[u8],
    mask: &[bool],
    open: usize,
    close: usize,
    removals: &mut Vec<(usize, usize)>,
) {
    let mut depth = 0i32;
    let mut in_default = false;
    let mut i = open + 1;

    while i < close {
        if !mask[i] {
            i += 1;
            continue;
        }
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b',' if depth == 0 => in_default = false,
            b'=' if depth == 0 => {
                let next = bytes.get(i + 1).copied();
                let prev = bytes[i - 1];
                if next != Some(b'>') && next != Some(b'=') && !matches!(prev, b'=' | b'!' | b'<' | b'>')
                {
                    in_default = true;
                }
            }
            b':' if depth == 0 && !in_default => {
                let start = if bytes[i - 1] == b'?' { i - 1 } else { i };
                if let Some(end) = scan_type(bytes, mask, i + 1, close, TypeEnd::ParamList) {
                    removals.push((start, end));
                    i = end.max(i + 1);
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
}

/// `const x: Foo = …` → `const x = …`
fn strip_variable_annotations(text: &str) -> String {
    let bytes = text.as_bytes();
    let mask = code_mask(text);
    let mut removals = Vec::new();

    for caps in VARIABLE_KEYWORD.captures_iter(text) {
        let (Some(whole), Some(keyword)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if !mask[keyword.start()] {
            continue;
        }

        let mut i = whole.end();
        match bytes.get(i) {
            Some(b'{') | Some(b'[') => match matching_close(bytes, &mask, i, bytes.len()) {
                Some(close) => i = close + 1,
                None => continue,
            },
            Some(b) if b.is_ascii_alphabetic() || *b == b'_' || *b == b'$' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$')
                {
                    i += 1;
                }
            }
            _ => continue,
        }

        let colon = skip_inline_ws(bytes, i);
        if bytes.get(colon) == Some(&b':') && mask[colon] {
            if let Some(end) = scan_type(bytes, &mask, colon + 1, bytes.len(), TypeEnd::Declaration) {
                removals.push((colon, end));
            }
        }
    }

    apply_removals(text, removals)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeEnd {
    /// Ends at a top-level `,` `=` or the list's closing paren
    ParamList,
    /// Ends right before a top-level `=>`
    ArrowBody,
    /// Ends right before a top-level `{`
    FunctionBody,
    /// Ends before a top-level `=`, `;` or newline
    Declaration,
}

/// Scan a type annotation starting at `start`; returns its exclusive end with
/// trailing whitespace excluded, or `None` when no valid end is found.
fn scan_type(bytes: &[u8], mask: &[bool], start: usize, limit: usize, kind: TypeEnd) -> Option<usize> {
    let max = (start + MAX_TYPE_LEN).min(limit).min(bytes.len());
    let mut depth = 0i32;
    let mut seen_token = false;
    let mut i = start;

    let finish = |end: usize| -> Option<usize> {
        let mut end = end;
        while end > start && bytes[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
        if end > start {
            Some(end)
        } else {
            None
        }
    };

    while i < max {
        if !mask[i] {
            // String literal types: 'primary' | 'secondary'
            seen_token = true;
            i += 1;
            continue;
        }
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        if depth == 0 {
            match kind {
                TypeEnd::ParamList => {
                    if b == b',' || (b == b'=' && next != Some(b'>')) {
                        return finish(i);
                    }
                }
                TypeEnd::ArrowBody => {
                    if b == b'=' && next == Some(b'>') {
                        return if seen_token { finish(i) } else { None };
                    }
                    if b == b';' || b == b'\n' || b == b',' {
                        return None;
                    }
                }
                TypeEnd::FunctionBody => {
                    if b == b'{' && seen_token {
                        return finish(i);
                    }
                    if b == b';' {
                        return None;
                    }
                }
                TypeEnd::Declaration => {
                    if (b == b'=' && next != Some(b'>')) || b == b';' || b == b'\n' {
                        return if seen_token { finish(i) } else { None };
                    }
                }
            }
        }

        match b {
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            b'>' if i > 0 && bytes[i - 1] != b'=' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            b'=' if next == Some(b'>') => {
                // arrow inside a function type; step over both characters
                seen_token = true;
                i += 2;
                continue;
            }
            _ => {}
        }
        if !b.is_ascii_whitespace() {
            seen_token = true;
        }
        i += 1;
    }

    if kind == TypeEnd::ParamList && i >= limit && depth == 0 && seen_token {
        return finish(limit);
    }
    None
}

// ---------------------------------------------------------------------------
// Shared scanning helpers
// ---------------------------------------------------------------------------

/// Marks which bytes are code rather than string literal or comment.
///
/// Quoted strings stop at a newline so stray apostrophes in JSX text cannot
/// swallow the rest of the file.
pub(crate) fn code_mask(src: &str) -> Vec<bool> {
    let bytes = src.as_bytes();
    let mut mask = vec![true; bytes.len()];
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let start = i;
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                mask[start..i].fill(false);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let start = i;
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                mask[start..i].fill(false);
            }
            quote @ (b'\'' | b'"' | b'`') => {
                let start = i;
                i += 1;
                while i < bytes.len() {
                    let b = bytes[i];
                    if b == b'\\' {
                        i += 2;
                        continue;
                    }
                    if b == quote {
                        i += 1;
                        break;
                    }
                    if b == b'\n' && quote != b'`' {
                        break;
                    }
                    i += 1;
                }
                let end = i.min(bytes.len());
                mask[start..end].fill(false);
                i = end;
            }
            _ => i += 1,
        }
    }

    mask
}

/// All `(`…`)` pairs in code positions, ordered by opening index
fn matching_parens(bytes: &[u8], mask: &[bool]) -> Vec<(usize, usize)> {
    let mut stack = Vec::new();
    let mut pairs = Vec::new();

    for (i, &b) in bytes.iter().enumerate() {
        if !mask[i] {
            continue;
        }
        match b {
            b'(' => stack.push(i),
            b')' => {
                if let Some(open) = stack.pop() {
                    pairs.push((open, i));
                }
            }
            _ => {}
        }
    }

    pairs.sort_unstable();
    pairs
}

/// Index of the bracket closing the one at `open`, searching below `limit`
fn matching_close(bytes: &[u8], mask: &[bool], open: usize, limit: usize) -> Option<usize> {
    let mut depth = 0i32;
    for i in open..limit.min(bytes.len()) {
        if !mask[i] {
            continue;
        }
        match bytes[i] {
            b'{' | b'[' | b'(' => depth += 1,
            b'}' | b']' | b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn skip_inline_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    i
}

/// Up to 80 bytes of text before `pos`, cut at a char boundary
fn lookbehind(text: &str, pos: usize) -> &str {
    let mut start = pos.saturating_sub(80);
    while start < pos && !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..pos]
}

/// Remove byte ranges from `text`; overlapping or non-boundary ranges are skipped
fn apply_removals(text: &str, mut removals: Vec<(usize, usize)>) -> String {
    if removals.is_empty() {
        return text.to_string();
    }
    removals.sort_unstable();

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in removals {
        if start < cursor
            || end <= start
            || end > text.len()
            || !text.is_char_boundary(start)
            || !text.is_char_boundary(end)
        {
            continue;
        }
        out.push_str(&text[cursor..start]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_markdown_stripping_scenario() {
        let raw = "```tsx\nimport React from 'react';\nfunction GeneratedApp(){return null;}\n```";
        let out = normalize(raw);
        assert!(!out.contains('`'), "backticks left in: {}", out);
        assert!(!out.lines().any(|l| l.starts_with("import")));
        assert_eq!(out, "function GeneratedApp(){return null;}");
    }

    #[test]
    fn test_template_literals_survive() {
        let raw = "const label = `Total: ${count}`;";
        assert_eq!(normalize(raw), raw);
    }

    #[test]
    fn test_multiline_import_removed() {
        let raw = "import {\n  Card,\n  CardContent,\n} from '@/components/ui/card';\nconst x = 1;";
        assert_eq!(normalize(raw), "const x = 1;");
    }

    #[test]
    fn test_unterminated_import_does_not_swallow_code() {
        let raw = "import {\nfunction GeneratedApp() { return null; }";
        assert_eq!(normalize(raw), "function GeneratedApp() { return null; }");
    }

    #[test]
    fn test_export_prefixes() {
        let raw = "export default function GeneratedApp() {\n  return null;\n}\nexport const helper = 1;\nexport { helper };\nexport default GeneratedApp;";
        assert_eq!(
            normalize(raw),
            "function GeneratedApp() {\n  return null;\n}\nconst helper = 1;"
        );
    }

    #[test]
    fn test_interface_and_type_alias_removed() {
        let raw = "interface Todo {\n  id: number;\n  meta: { done: boolean };\n}\ntype Filter = 'all' | 'done';\ntype Handler = (t: Todo) => void;\nfunction GeneratedApp() { return null; }";
        assert_eq!(normalize(raw), "function GeneratedApp() { return null; }");
    }

    #[test]
    fn test_multiline_union_type_removed() {
        let raw = "type Status =\n  | 'idle'\n  | 'busy';\nconst s = 'idle';";
        assert_eq!(normalize(raw), "const s = 'idle';");
    }

    #[test]
    fn test_hook_generics_removed() {
        let raw = "const [items, setItems] = useState<Todo[]>([]);\nconst ref = React.useRef<HTMLDivElement | null>(null);";
        assert_eq!(
            normalize(raw),
            "const [items, setItems] = useState([]);\nconst ref = React.useRef(null);"
        );
    }

    #[test]
    fn test_parameter_and_return_annotations_removed() {
        let raw = "function Row({ title, done }: RowProps): JSX.Element {\n  return null;\n}\nconst onChange = (e: React.ChangeEvent<HTMLInputElement>, id?: number): void => setValue(e.target.value);";
        assert_eq!(
            normalize(raw),
            "function Row({ title, done }) {\n  return null;\n}\nconst onChange = (e, id) => setValue(e.target.value);"
        );
    }

    #[test]
    fn test_function_type_in_parameter() {
        let raw = "const run = (cb: (value: string) => void, n = 2) => cb('x');";
        assert_eq!(normalize(raw), "const run = (cb, n = 2) => cb('x');");
    }

    #[test]
    fn test_variable_annotations_removed() {
        let raw = "const total: number = 5;\nlet names: string[] = [];\nconst { a }: Props = props;";
        assert_eq!(
            normalize(raw),
            "const total = 5;\nlet names = [];\nconst { a } = props;"
        );
    }

    #[test]
    fn test_ternaries_and_object_literals_untouched() {
        let raw = "const v = ok ? (a) : b;\nconst o = { a, b: c, d };\nconst el = flag ? (x) : (y);\nconst fn2 = (a = ok ? 1 : 2) => a;";
        assert_eq!(normalize(raw), raw);
    }

    #[test]
    fn test_strings_untouched() {
        let raw = "const s = \"(a: string) => void\";\nconst t = 'interface X {}';";
        assert_eq!(normalize(raw), raw);
    }

    #[test]
    fn test_idempotent_on_samples() {
        let samples = [
            "```jsx\nimport { useState } from 'react';\nexport default function GeneratedApp() {\n  const [n, setN] = useState<number>(0);\n  return <Button onClick={() => setN(n + 1)}>{n}</Button>;\n}\n```",
            "interface P { a: string }\nconst C = ({ a }: P) => <div>{a}</div>;",
            "const x = cond ? (a) : (b);\n// comment with (a: b) => c\n",
            "import {\n  A,\n  B\n} from 'lib';\n\n\nconst y: Map<string, number[]> = new Map();",
            "",
            "   \n\n ",
            "```\n```",
            "export { a, b };\nexport * from './x';",
        ];
        for sample in samples {
            let once = normalize(sample);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_declaration_exposing_module_syntax() {
        let raw = "type Props = { a: string };import React from 'react';\nfunction GeneratedApp() { return null; }";
        assert_eq!(normalize(raw), "function GeneratedApp() { return null; }");

        let raw = "interface P { a: string }export type X = number;\nconst GeneratedApp = () => null;";
        assert_eq!(normalize(raw), "const GeneratedApp = () => null;");
    }

    #[test]
    fn test_idempotent_on_seeded_token_soup() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        const TOKENS: &[&str] = &[
            "type Props = { a: string };",
            "interface P { b: number }",
            "import React from 'react';",
            "import {",
            "} from 'lib';",
            "export ",
            "export default ",
            "export type X = number;",
            "export { a };",
            "function GeneratedApp() { return null; }",
            "const v: number = 1;",
            "const [n, setN] = useState<number>(0);",
            "(a: string) => a",
            "function f(x: T): U {",
            "}",
            "{",
            ";",
            ":",
            "=>",
            "<",
            ">",
            "'",
            "`",
            "```",
            "```tsx",
            "// note",
            "\n",
            "\n",
            " ",
            "\r\n",
        ];

        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..5_000 {
            let len = rng.gen_range(1..10);
            let input: String = (0..len).map(|_| TOKENS[rng.gen_range(0..TOKENS.len())]).collect();
            let once = normalize(&input);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_total_on_hostile_input() {
        let garbage: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
        let garbage = String::from_utf8_lossy(&garbage).to_string();
        let once = normalize(&garbage);
        let _ = normalize(&once);

        for input in ["(", ")", "(((((", ":", "=>", "const", "type X =", "interface {", "useState<", "'", "`"] {
            let _ = normalize(input);
        }
    }

    #[test]
    fn test_large_input() {
        let line = "const handler = (event: MouseEvent, index: number): void => { setValue(index); };\n";
        let big = line.repeat(10_000);
        let out = normalize(&big);
        assert_eq!(out.lines().count(), 10_000);
        assert!(!out.contains(": number"));
    }

    #[test]
    fn test_entry_point_detection() {
        assert_eq!(
            entry_point("function GeneratedApp() { return null; }").as_deref(),
            Some("GeneratedApp")
        );
        assert_eq!(
            entry_point("const GeneratedApp = () => null;").as_deref(),
            Some("GeneratedApp")
        );
        assert_eq!(
            entry_point("function Header() {}\nfunction Dashboard() {}").as_deref(),
            Some("Dashboard")
        );
        assert_eq!(entry_point("const x = 1;\nconsole.log(x);"), None);
    }

    #[test]
    fn test_normalizer_never_fabricates_entry_point() {
        let out = normalize("```js\nconst helper = () => 1;\n```");
        assert_eq!(entry_point(&out), None);
    }
}
