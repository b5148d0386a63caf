//! HTML for the iframe sandbox
//!
//! Two documents per generation:
//!
//! - the **frame document**, set as the iframe's `srcdoc`: static script tags
//!   for React, the chart engine and the transpiler, the inline shim library,
//!   the error handlers and dependency loader from `frame_boot.js`, and the
//!   generated code as a JSON string literal
//! - the **host page**, loaded into the webview: one sandboxed iframe and the
//!   message forwarder from `host_page.js`
//!
//! Everything dynamic is embedded through [`script_literal`], never spliced in
//! as markup.

#![warn(clippy::all, rust_2018_idioms)]

use serde::Serialize;
use std::time::Duration;

use super::frames::FrameId;
use crate::app::dependencies::table::{BABEL_URL, PROP_TYPES_URL, REACT_DOM_URL, REACT_URL, RECHARTS_URL};
use crate::app::dependencies::{is_optional, LoadedModule};
use crate::app::shims::{FRAMEWORK_NAMES, SHIM_SOURCE};

const FRAME_BOOT_SOURCE: &str = include_str!("frame_boot.js");
const HOST_PAGE_SOURCE: &str = include_str!("host_page.js");

#[derive(Debug, Clone)]
pub struct FrameDocumentOptions {
    pub debug: bool,
    /// Per-module budget of the in-frame loader
    pub dependency_timeout: Duration,
}

impl Default for FrameDocumentOptions {
    fn default() -> Self {
        Self {
            debug: false,
            dependency_timeout: Duration::from_secs(4),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentModule {
    pub name: String,
    pub url: String,
    pub optional: bool,
}

impl From<&LoadedModule> for DocumentModule {
    fn from(module: &LoadedModule) -> Self {
        Self {
            name: module.name.clone(),
            url: module.url.to_string(),
            optional: is_optional(&module.name),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameConfig<'a> {
    code: &'a str,
    entry: &'a str,
    framework: &'a [&'static str],
    modules: &'a [DocumentModule],
    dependency_timeout_ms: u64,
    debug: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HostConfig<'a> {
    frame_id: String,
    document: &'a str,
}

/// JSON encode `value` so it can sit inside an inline `<script>`
pub fn script_literal<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    Ok(serde_json::to_string(value)?
        .replace("</", "<\\/")
        .replace("<!--", "<\\!--"))
}

/// React builds; development builds give readable errors in debug mode
fn react_urls(debug: bool) -> (String, String) {
    if debug {
        (
            REACT_URL.replace("production.min", "development"),
            REACT_DOM_URL.replace("production.min", "development"),
        )
    } else {
        (REACT_URL.to_string(), REACT_DOM_URL.to_string())
    }
}

fn static_script(url: &str, name: &str) -> String {
    format!(
        "<script crossorigin src=\"{}\" onerror=\"__uiforgeMissing('{}')\"></script>\n",
        url, name
    )
}

/// The `srcdoc` of the preview iframe
pub fn frame_document(
    code: &str,
    entry: &str,
    modules: &[DocumentModule],
    options: &FrameDocumentOptions,
) -> serde_json::Result<String> {
    let config = FrameConfig {
        code,
        entry,
        framework: FRAMEWORK_NAMES,
        modules,
        dependency_timeout_ms: options.dependency_timeout.as_millis() as u64,
        debug: options.debug,
    };
    let (react, react_dom) = react_urls(options.debug);

    let mut html = String::with_capacity(code.len() + SHIM_SOURCE.len() + FRAME_BOOT_SOURCE.len() + 2048);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<script src=\"https://cdn.tailwindcss.com\"></script>\n");
    html.push_str(&format!(
        "<script>window.__UIFORGE_FRAME__ = {};</script>\n",
        script_literal(&config)?
    ));
    html.push_str("<script>\n");
    html.push_str(FRAME_BOOT_SOURCE);
    html.push_str("\n</script>\n");
    html.push_str(&static_script(&react, "react"));
    html.push_str(&static_script(&react_dom, "react-dom"));
    html.push_str(&static_script(PROP_TYPES_URL, "prop-types"));
    html.push_str(&static_script(RECHARTS_URL, "recharts"));
    html.push_str(&static_script(BABEL_URL, "babel"));
    html.push_str("<script>\n");
    html.push_str(SHIM_SOURCE);
    html.push_str("\n</script>\n</head>\n<body>\n<div id=\"root\"></div>\n");
    html.push_str("<script>window.__uiforgeBoot();</script>\n</body>\n</html>\n");
    Ok(html)
}

/// The page the webview loads around the iframe
pub fn host_page(frame_id: &FrameId, frame_document: &str) -> serde_json::Result<String> {
    let config = HostConfig {
        frame_id: frame_id.to_string(),
        document: frame_document,
    };

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>uiforge preview</title>
<style>html, body {{ margin: 0; height: 100%; }} iframe {{ border: 0; width: 100%; height: 100%; display: block; }}</style>
</head>
<body>
<iframe id="preview" sandbox="allow-scripts" title="Generated preview"></iframe>
<script>window.__UIFORGE_HOST__ = {config};</script>
<script>
{forwarder}
</script>
</body>
</html>
"#,
        config = script_literal(&config)?,
        forwarder = HOST_PAGE_SOURCE
    ))
}
