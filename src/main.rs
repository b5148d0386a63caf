#![warn(clippy::all, rust_2018_idioms)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;

use uiforge::app::config::PreviewConfig;
use uiforge::app::dependencies::{DependencyResolver, HttpModuleFetcher, ModuleFetcher};
use uiforge::app::execution::{
    BundlerStrategy, DefineApiClient, ExecutionResult, ExecutionStrategy, Executor, IframeStrategy,
    InRealmStrategy, RenderedOutput, StrategyKind,
};
use uiforge::app::generation_client::GenerationClient;
use uiforge::app::live::{run_source, FileSource};
use uiforge::app::orchestrator::{Attempt, AttemptOutcome, PreviewSurface};
use uiforge::app::sandbox::{FrameRegistry, WebviewFrameHost};
use uiforge::app::status::{PreviewEvent, StatusBus};
use uiforge::app::transform::ToyJsxTransform;
use uiforge::app::v8_bindings::initialize_v8_platform;
use uiforge::app::webview::ApiServer;

const USAGE: &str = "\
Usage: uiforge [OPTIONS] <COMMAND>

Commands:
  generate <prompt...>   Generate a component from a description and preview it
  render <file>          Preview a component source file
  watch <file>           Preview a file and re-render on every edit
                         (stdin: `:revert N`, `:history`, `:quit`)

Options:
  --strategy <name>      in-realm | iframe | bundler (default from config)
  --jsx-transform        Run the regex JSX rewrite before executing
  --debug                Verbose logging and development builds in frames
  --version              Print build information
  --help                 Print this help";

fn init_logging() {
    // To enable: TOKIO_CONSOLE=1 RUSTFLAGS="--cfg tokio_unstable" cargo run
    let use_tokio_console = std::env::var("TOKIO_CONSOLE")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false);

    if use_tokio_console {
        console_subscriber::init();
        eprintln!("tokio-console profiling enabled - connect with: tokio-console");
        eprintln!("NOTE: File logging disabled when using tokio-console");
        return;
    }

    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "", "uiforge") {
        let log_dir = proj_dirs.data_dir().join("logs");
        let _ = std::fs::create_dir_all(&log_dir);

        let log_path = log_dir.join("uiforge.log");

        let file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&log_path)
            .expect("Failed to open log file");

        // Owner read/write only: the log carries generated code and API responses
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = file.metadata() {
                let mut perms = metadata.permissions();
                perms.set_mode(0o600);
                if let Err(e) = std::fs::set_permissions(&log_path, perms) {
                    eprintln!("[SECURITY] Failed to set log file permissions: {}", e);
                }
            }
        }

        let filter = tracing_subscriber::EnvFilter::builder()
            .parse("uiforge=info,hyper=warn,reqwest=warn,tao=warn,wry=warn,v8=warn")
            .expect("Failed to parse env filter");

        let (filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);

        let subscriber = tracing_subscriber::registry().with(filter).with(
            tracing_subscriber::fmt::layer()
                .with_writer(move || file.try_clone().expect("Failed to clone file handle"))
                .with_ansi(false),
        );

        tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

        // Must come after the subscriber is installed
        tracing_log::LogTracer::init().expect("Failed to initialize log-to-tracing bridge");

        uiforge::set_tracing_reload_handle(reload_handle);

        tracing::info!("Logging initialized to: {:?}", log_path);
    }
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let crash_msg = format!(
            "uiforge crashed!\n\
             Panic occurred at: {}\n\
             Details: {}\n\
             Backtrace:\n{:?}\n",
            panic_info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown location".to_string()),
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.payload().downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic"),
            std::backtrace::Backtrace::force_capture()
        );

        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "", "uiforge") {
            let log_dir = proj_dirs.data_dir().join("logs");
            let _ = std::fs::create_dir_all(&log_dir);
            let crash_log_path = log_dir.join("crash.log");

            if let Ok(mut file) = std::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&crash_log_path)
            {
                use std::io::Write;
                let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                let _ = writeln!(file, "\n=== CRASH at {} ===\n{}", timestamp, crash_msg);
            }

            eprintln!("\n{}", crash_msg);
            eprintln!("Crash log written to: {:?}", crash_log_path);
        } else {
            eprintln!("\n{}", crash_msg);
        }
    }));
}

#[derive(Debug, PartialEq)]
enum Command {
    Generate(String),
    Render(PathBuf),
    Watch(PathBuf),
    Version,
    Help,
}

#[derive(Debug)]
struct CliArgs {
    command: Command,
    strategy: Option<StrategyKind>,
    jsx_transform: bool,
    debug: bool,
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut strategy = None;
    let mut debug = false;
    let mut jsx_transform = false;
    let mut positional: Vec<&str> = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--strategy" => {
                let value = iter.next().ok_or("--strategy needs a value")?;
                strategy = Some(value.parse::<StrategyKind>()?);
            }
            "--debug" => debug = true,
            "--jsx-transform" => jsx_transform = true,
            "--version" | "-V" => positional = vec!["version"],
            "--help" | "-h" => positional = vec!["help"],
            other if other.starts_with("--") => return Err(format!("Unknown option {}", other)),
            other => positional.push(other),
        }
    }

    let command = match positional.split_first() {
        Some((&"generate", rest)) if !rest.is_empty() => Command::Generate(rest.join(" ")),
        Some((&"render", [file])) => Command::Render(PathBuf::from(file)),
        Some((&"watch", [file])) => Command::Watch(PathBuf::from(file)),
        Some((&"version", _)) => Command::Version,
        Some((&"help", _)) | None => Command::Help,
        Some((name, _)) => return Err(format!("Unrecognized command or arguments: {}", name)),
    };

    Ok(CliArgs {
        command,
        strategy,
        jsx_transform,
        debug,
    })
}

/// Long-lived collaborators behind one surface
struct Session {
    surface: Arc<PreviewSurface>,
    api_server: Option<Arc<RwLock<ApiServer>>>,
}

impl Session {
    async fn shutdown(self) {
        if let Some(server) = self.api_server {
            server.write().await.shutdown();
        }
    }
}

async fn build_session(config: &PreviewConfig, jsx_transform: bool) -> anyhow::Result<Session> {
    let fetcher: Arc<dyn ModuleFetcher> = Arc::new(HttpModuleFetcher::new(config.module_fetch_timeout())?);
    let mut api_server = None;

    let strategy: Arc<dyn ExecutionStrategy> = match config.strategy {
        StrategyKind::InRealm => {
            initialize_v8_platform().map_err(|e| anyhow::anyhow!("V8 platform unavailable: {}", e))?;
            let strategy = InRealmStrategy::new(config.runtime_config());
            if config.in_realm_transpile {
                Arc::new(strategy.with_transpiler(Arc::clone(&fetcher)))
            } else {
                Arc::new(strategy)
            }
        }
        StrategyKind::Iframe => {
            let registry = FrameRegistry::new();
            let server = ApiServer::start(Arc::clone(&registry)).await?;
            let endpoint = server.read().await.endpoint();
            api_server = Some(server);

            let host = Arc::new(WebviewFrameHost::new(endpoint, "uiforge preview"));
            Arc::new(
                IframeStrategy::new(registry, host)
                    .with_budgets(
                        Duration::from_millis(config.frame_budget_ms),
                        Duration::from_millis(config.frame_debug_budget_ms),
                    )
                    .with_dependency_timeout(Duration::from_millis(config.frame_dependency_timeout_ms)),
            )
        }
        StrategyKind::Bundler => {
            let budget = Duration::from_millis(config.bundler_budget_ms);
            let client = DefineApiClient::new(&config.bundler_define_url, budget)?;
            Arc::new(BundlerStrategy::new(Arc::new(client)).with_budget(budget))
        }
    };

    let mut surface = PreviewSurface::new(
        Executor::new(strategy),
        DependencyResolver::new(fetcher),
        StatusBus::new(),
    )
    .with_debug(config.debug)
    .with_history_cap(config.history_cap);
    if config.strategy != StrategyKind::InRealm {
        // The fallback component must not depend on the network
        match initialize_v8_platform() {
            Ok(()) => {
                let realm = InRealmStrategy::new(config.runtime_config());
                surface = surface.with_fallback(Executor::new(Arc::new(realm)));
            }
            Err(e) => tracing::warn!("No in-process fallback renderer: {}", e),
        }
    }
    if jsx_transform {
        surface = surface.with_transform(Arc::new(ToyJsxTransform));
    }

    Ok(Session {
        surface: Arc::new(surface),
        api_server,
    })
}

/// Mirror status events to stderr
fn spawn_event_printer(bus: &StatusBus, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(PreviewEvent::Phase { attempt, phase }) => eprintln!("[{}] {:?}", attempt, phase),
                Ok(PreviewEvent::Modules { attempt, statuses }) => {
                    let summary: Vec<String> = statuses
                        .iter()
                        .map(|(name, status)| format!("{}={:?}", name, status))
                        .collect();
                    eprintln!("[{}] modules: {}", attempt, summary.join(", "));
                }
                Ok(PreviewEvent::Error(error)) => eprintln!("error: {}", error),
                Ok(PreviewEvent::Connectivity { source, state }) => eprintln!("{}: {:?}", source, state),
                Ok(PreviewEvent::View { .. }) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event printer skipped {} events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn print_attempt(attempt: &Attempt) {
    match &attempt.outcome {
        AttemptOutcome::Superseded => println!("v{}: superseded by a newer change", attempt.version),
        AttemptOutcome::Current(ExecutionResult::Success { output, diagnostics }) => {
            for line in diagnostics {
                eprintln!("  {}", line);
            }
            match output {
                RenderedOutput::Markup { html } => println!("{}", html),
                RenderedOutput::Frame { frame_id } => {
                    println!("v{}: rendered in preview window (frame {})", attempt.version, frame_id)
                }
                RenderedOutput::Sandbox { embed_url, .. } => {
                    println!("v{}: rendered at {}", attempt.version, embed_url)
                }
            }
        }
        AttemptOutcome::Current(ExecutionResult::Failure { kind, message }) => {
            println!("v{}: {}: {}", attempt.version, kind, message);
        }
    }
}

/// Stdin lines, read on a plain thread
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        while let Ok(read) = stdin.read_line(&mut line) {
            if read == 0 || tx.send(line.trim().to_string()).is_err() {
                break;
            }
            line.clear();
        }
    });
    rx
}

/// Keep the process (and so the preview window) alive until Enter
async fn wait_for_close(attempt: &Attempt) {
    if let Some(ExecutionResult::Success {
        output: RenderedOutput::Frame { .. },
        ..
    }) = attempt.result()
    {
        println!("Press Enter to close the preview");
        let mut lines = stdin_lines();
        lines.recv().await;
    }
}

async fn watch(session: &Session, path: PathBuf, config: &PreviewConfig) -> anyhow::Result<()> {
    let surface = Arc::clone(&session.surface);
    let live = surface.live_updates(config.debounce());
    let cancel = CancellationToken::new();

    let (changes_tx, mut changes_rx) = mpsc::unbounded_channel::<String>();
    let feed = tokio::spawn(run_source(
        FileSource::new(&path),
        config.feed_timing(),
        surface.bus().clone(),
        cancel.clone(),
        move |code| {
            let _ = changes_tx.send(code);
        },
    ));

    println!("Watching {} (:revert N, :history, :quit)", path.display());
    let mut commands = stdin_lines();
    loop {
        tokio::select! {
            Some(code) = changes_rx.recv() => {
                live.push(code);
            }
            command = commands.recv() => {
                let Some(command) = command else { break };
                match command.split_whitespace().collect::<Vec<_>>().as_slice() {
                    [":quit"] | [":q"] => break,
                    [":history"] => println!("versions: {:?}", surface.history_versions()),
                    [":revert", version] => match version.parse::<u64>() {
                        Ok(version) => match surface.revert(version).await {
                            Some(attempt) => print_attempt(&attempt),
                            None => println!("version {} is no longer in history", version),
                        },
                        Err(_) => println!("not a version number: {}", version),
                    },
                    [] => {}
                    _ => println!("unknown command: {}", command),
                }
            }
        }
    }

    cancel.cancel();
    let _ = feed.await;
    live.close().await;
    Ok(())
}

async fn run(cli: CliArgs, config: PreviewConfig) -> anyhow::Result<()> {
    let session = build_session(&config, cli.jsx_transform).await?;
    let cancel = CancellationToken::new();
    let printer = spawn_event_printer(session.surface.bus(), cancel.clone());

    match cli.command {
        Command::Generate(prompt) => {
            let client = GenerationClient::new(config.generation.clone(), config.api_key.clone())?;
            let outcome = session.surface.generate(&client, &prompt).await;
            if let Some(description) = &outcome.description {
                println!("{}\n", description);
            }
            print_attempt(&outcome.attempt);
            wait_for_close(&outcome.attempt).await;
        }
        Command::Render(path) => {
            let code = tokio::fs::read_to_string(&path).await?;
            let attempt = session.surface.render(code).await;
            print_attempt(&attempt);
            wait_for_close(&attempt).await;
        }
        Command::Watch(path) => watch(&session, path, &config).await?,
        Command::Version | Command::Help => {}
    }

    cancel.cancel();
    let _ = printer.await;
    session.shutdown().await;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Before anything else, so early crashes are recorded
    setup_panic_handler();

    let args: Vec<String> = std::env::args().collect();

    init_logging();

    tracing::info!("uiforge starting, args: {:?}", args);

    if let Some((content, title)) = uiforge::app::webview::parse_webview_args(&args) {
        tracing::info!("Webview args detected, entering webview mode");
        uiforge::app::webview::run_webview(content, title)?;
        return Ok(());
    }

    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("{}\n\n{}", message, USAGE);
            std::process::exit(2);
        }
    };

    match cli.command {
        Command::Help => {
            println!("{}", USAGE);
            return Ok(());
        }
        Command::Version => {
            println!(
                "uiforge {} ({} {})",
                env!("CARGO_PKG_VERSION"),
                env!("GIT_BRANCH"),
                env!("GIT_COMMIT")
            );
            return Ok(());
        }
        _ => {}
    }

    let mut config = PreviewConfig::load();
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    if cli.debug {
        config.debug = true;
        if let Err(e) = uiforge::set_log_filter("uiforge=debug,hyper=warn,reqwest=warn") {
            eprintln!("Could not raise log level: {}", e);
        }
    }
    tracing::info!("Using {} strategy", config.strategy);

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    runtime.block_on(run(cli, config))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        let cli = parse_args(&args(&["uiforge", "generate", "a", "todo", "list", "--debug"])).unwrap();
        assert_eq!(cli.command, Command::Generate("a todo list".into()));
        assert!(cli.debug);

        let cli = parse_args(&args(&["uiforge", "--strategy", "in-realm", "render", "app.tsx"])).unwrap();
        assert_eq!(cli.command, Command::Render(PathBuf::from("app.tsx")));
        assert_eq!(cli.strategy, Some(StrategyKind::InRealm));

        let cli = parse_args(&args(&["uiforge", "watch", "app.tsx", "--jsx-transform"])).unwrap();
        assert_eq!(cli.command, Command::Watch(PathBuf::from("app.tsx")));
        assert!(cli.jsx_transform);

        assert_eq!(parse_args(&args(&["uiforge"])).unwrap().command, Command::Help);
        assert_eq!(parse_args(&args(&["uiforge", "--version"])).unwrap().command, Command::Version);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&["uiforge", "render"])).is_err());
        assert!(parse_args(&args(&["uiforge", "--strategy"])).is_err());
        assert!(parse_args(&args(&["uiforge", "--strategy", "quantum", "render", "x"])).is_err());
        assert!(parse_args(&args(&["uiforge", "--colour"])).is_err());
    }
}
