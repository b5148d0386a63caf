//! Iframe strategy wired to the real signal server, with a host that reports
//! over HTTP the way the webview host page does.

use std::sync::Arc;
use std::time::Duration;

use uiforge::app::artifact::CodeArtifact;
use uiforge::app::dependencies::ModuleLoadReport;
use uiforge::app::execution::{ExecutionRequest, ExecutionResult, Executor, IframeStrategy, RenderedOutput};
use uiforge::app::sandbox::{FrameHost, FrameHostError, FrameId, FrameRegistry};
use uiforge::app::status::ErrorKind;
use uiforge::app::webview::{ApiServer, SignalEndpoint};

struct HttpReportingHost {
    endpoint: SignalEndpoint,
    reply: serde_json::Value,
}

impl FrameHost for HttpReportingHost {
    fn mount(&self, frame_id: &FrameId, page: &str) -> Result<(), FrameHostError> {
        if !page.contains(&frame_id.to_string()) {
            return Err(FrameHostError::Unavailable("page does not name its frame".into()));
        }
        let url = format!("{}/api/frames/{}/signal", self.endpoint.base_url, frame_id);
        let token = self.endpoint.token.clone();
        let reply = self.reply.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = reqwest::Client::new()
                .post(url)
                .header("X-API-Token", token)
                .json(&reply)
                .send()
                .await;
        });
        Ok(())
    }
}

async fn run_with_reply(reply: serde_json::Value) -> ExecutionResult {
    let registry = FrameRegistry::new();
    let server = ApiServer::start(Arc::clone(&registry)).await.unwrap();
    let endpoint = server.read().await.endpoint();

    let host = Arc::new(HttpReportingHost { endpoint, reply });
    let executor = Executor::new(Arc::new(IframeStrategy::new(Arc::clone(&registry), host)));
    let request = ExecutionRequest {
        attempt: 1,
        artifact: Arc::new(CodeArtifact::new(
            "export default function GeneratedApp() { return <Button>Go</Button>; }",
        )),
        modules: ModuleLoadReport::default(),
        debug: false,
    };

    let result = executor.run(&request).await;
    server.write().await.shutdown();
    assert_eq!(registry.active_count(), 0);
    result
}

#[tokio::test]
async fn test_success_signal_over_http() {
    let result = run_with_reply(serde_json::json!({ "type": "success" })).await;
    assert!(matches!(
        result,
        ExecutionResult::Success {
            output: RenderedOutput::Frame { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_error_signals_over_http_are_classified() {
    let cases = [
        ("[render] Cannot read properties of undefined", ErrorKind::RenderError),
        ("[dependency] Failed to load lodash", ErrorKind::DependencyError),
        ("Uncaught SyntaxError: Unexpected token '<'", ErrorKind::SyntaxError),
        ("ReferenceError: Chart is not defined", ErrorKind::RuntimeError),
    ];
    for (message, kind) in cases {
        let result = run_with_reply(serde_json::json!({ "type": "error", "message": message })).await;
        assert_eq!(result.error_kind(), Some(kind), "message {:?}", message);
    }
}
