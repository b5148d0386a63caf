//! HTTP live source: polls a URL and reports the body when it differs.

use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;

use super::LiveUpdateSource;

pub struct HttpSource {
    client: reqwest::Client,
    url: url::Url,
    last_body: Option<String>,
}

impl HttpSource {
    pub fn new(url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let url = url::Url::parse(url).with_context(|| format!("Invalid live source URL: {}", url))?;
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            url,
            last_body: None,
        })
    }
}

#[async_trait]
impl LiveUpdateSource for HttpSource {
    fn name(&self) -> String {
        self.url.to_string()
    }

    async fn poll(&mut self) -> anyhow::Result<Option<String>> {
        let response = self.client.get(self.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{} answered {}", self.url, status);
        }

        let body = response.text().await?;
        if self.last_body.as_deref() == Some(body.as_str()) {
            return Ok(None);
        }
        self.last_body = Some(body.clone());
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::get, Router};
    use std::sync::{Arc, Mutex};

    async fn serve(body: Arc<Mutex<Option<String>>>) -> String {
        async fn handler(State(body): State<Arc<Mutex<Option<String>>>>) -> (StatusCode, String) {
            match body.lock().unwrap().clone() {
                Some(text) => (StatusCode::OK, text),
                None => (StatusCode::SERVICE_UNAVAILABLE, String::new()),
            }
        }

        let app = Router::new().route("/code", get(handler)).with_state(body);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/code", addr)
    }

    #[tokio::test]
    async fn test_polls_changes_and_errors() {
        let body = Arc::new(Mutex::new(Some("const a = 1;".to_string())));
        let url = serve(Arc::clone(&body)).await;
        let mut source = HttpSource::new(&url, Duration::from_secs(5)).unwrap();

        assert_eq!(source.poll().await.unwrap().as_deref(), Some("const a = 1;"));
        assert_eq!(source.poll().await.unwrap(), None);

        *body.lock().unwrap() = None;
        assert!(source.poll().await.is_err());

        *body.lock().unwrap() = Some("const a = 2;".to_string());
        assert_eq!(source.poll().await.unwrap().as_deref(), Some("const a = 2;"));
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(HttpSource::new("not a url", Duration::from_secs(1)).is_err());
    }
}
