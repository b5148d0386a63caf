//! Webview integration module
//!
//! Preview pages are shown in webviews running in separate processes (the
//! `--webview` mode of this binary). The page reports back to the main
//! process over the frame signal endpoint served by [`ApiServer`].

use std::env;
use std::path::PathBuf;
use std::process::{Child, Command};
use tao::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};
use wry::WebViewBuilder;

mod api_server;

pub use api_server::ApiServer;

/// Environment handed to webview processes
pub const API_URL_ENV: &str = "UIFORGE_API_URL";
pub const API_TOKEN_ENV: &str = "UIFORGE_API_TOKEN";

/// Pages larger than this go through a temporary file instead of argv
const MAX_INLINE_HTML: usize = 64 * 1024;

/// Where webview pages send frame signals, and the token they need
#[derive(Debug, Clone)]
pub struct SignalEndpoint {
    pub base_url: String,
    pub token: String,
}

pub enum WebviewContent {
    Html(String),
    HtmlFile(PathBuf),
}

pub fn spawn_webview_process_with_html(
    html: &str,
    title: &str,
    endpoint: &SignalEndpoint,
) -> std::io::Result<Child> {
    let current_exe = env::current_exe()?;

    let mut command = Command::new(current_exe);
    command.arg("--webview").arg("--title").arg(title);

    if html.len() > MAX_INLINE_HTML {
        let path = env::temp_dir().join(format!("uiforge-preview-{:016x}.html", rand::random::<u64>()));
        std::fs::write(&path, html)?;
        command.arg("--html-file").arg(path);
    } else {
        command.arg("--html").arg(html);
    }

    tracing::info!("Spawning webview with API URL: {}", endpoint.base_url);

    command
        .env(API_URL_ENV, &endpoint.base_url)
        .env(API_TOKEN_ENV, &endpoint.token)
        .spawn()
}

pub fn parse_webview_args(args: &[String]) -> Option<(WebviewContent, String)> {
    if !args.iter().any(|arg| arg == "--webview") {
        return None;
    }

    let mut title = "uiforge preview".to_string();
    let mut html: Option<String> = None;
    let mut html_file: Option<PathBuf> = None;

    for i in 0..args.len() {
        if args[i] == "--title" && i + 1 < args.len() {
            title = args[i + 1].clone();
        } else if args[i] == "--html" && i + 1 < args.len() {
            html = Some(args[i + 1].clone());
        } else if args[i] == "--html-file" && i + 1 < args.len() {
            html_file = Some(PathBuf::from(&args[i + 1]));
        }
    }

    let content = match (html, html_file) {
        (Some(h), _) => WebviewContent::Html(h),
        (None, Some(path)) => WebviewContent::HtmlFile(path),
        (None, None) => WebviewContent::Html(String::new()),
    };

    Some((content, title))
}

/// Script run before the page: endpoint and token as JS string literals
fn initialization_script(api_url: &str, api_token: &str) -> String {
    let quote = |value: &str| serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "window.__UIFORGE_API_URL__ = {};\nwindow.__UIFORGE_API_TOKEN__ = {};",
        quote(api_url),
        quote(api_token)
    )
}

fn html_response(body: Vec<u8>, status: u16) -> wry::http::Response<std::borrow::Cow<'static, [u8]>> {
    wry::http::Response::builder()
        .status(status)
        .header("Content-Type", "text/html")
        .header("Access-Control-Allow-Origin", "*")
        .body(body)
        .map(|response| response.map(Into::into))
        .unwrap_or_else(|_| wry::http::Response::new(Vec::new().into()))
}

pub fn run_webview(content: WebviewContent, title: String) -> anyhow::Result<()> {
    let html = match content {
        WebviewContent::Html(html) => html,
        WebviewContent::HtmlFile(path) => {
            let html = std::fs::read_to_string(&path)?;
            let _ = std::fs::remove_file(&path);
            html
        }
    };
    tracing::info!("run_webview called with title='{}' ({} bytes)", title, html.len());

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new().with_title(&title).build(&event_loop)?;

    // Endpoint comes from the main process
    let api_url = env::var(API_URL_ENV).unwrap_or_default();
    let api_token = env::var(API_TOKEN_ENV).unwrap_or_default();
    if api_token.is_empty() {
        tracing::warn!("No API token found - preview will not be able to report results");
    }

    // Served from wry://localhost so the page has an origin fetch() accepts
    let builder = WebViewBuilder::new()
        .with_initialization_script(&initialization_script(&api_url, &api_token))
        .with_custom_protocol("wry".into(), move |_webview_id, request| {
            let uri = request.uri().to_string();
            if uri == "wry://localhost/" || uri == "wry://localhost" {
                html_response(html.as_bytes().to_vec(), 200)
            } else {
                tracing::debug!("Custom protocol 404: {}", uri);
                html_response(Vec::new(), 404)
            }
        })
        .with_url("wry://localhost/");

    #[cfg(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "ios",
        target_os = "android"
    ))]
    let _webview = builder.build(&window)?;

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "ios",
        target_os = "android"
    )))]
    let _webview = {
        use tao::platform::unix::WindowExtUnix;
        use wry::WebViewBuilderExtUnix;
        let vbox = window
            .default_vbox()
            .ok_or_else(|| anyhow::anyhow!("Window has no GTK container"))?;
        builder.build_gtk(vbox)?
    };

    tracing::info!("Webview built, starting event loop");
    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        if let Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } = event
        {
            tracing::info!("Window close requested");
            *control_flow = ControlFlow::Exit;
        }
    });
}
