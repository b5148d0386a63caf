//! File-backed live source: re-reads the file when its mtime moves.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::SystemTime;

use super::LiveUpdateSource;

pub struct FileSource {
    path: PathBuf,
    last_modified: Option<SystemTime>,
    last_content: Option<String>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
            last_content: None,
        }
    }
}

#[async_trait]
impl LiveUpdateSource for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn poll(&mut self) -> anyhow::Result<Option<String>> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        let modified = metadata.modified().ok();
        if modified.is_some() && modified == self.last_modified {
            return Ok(None);
        }
        self.last_modified = modified;

        let content = tokio::fs::read_to_string(&self.path).await?;
        // Touch without an edit is not a change
        if self.last_content.as_deref() == Some(content.as_str()) {
            return Ok(None);
        }
        self.last_content = Some(content.clone());
        Ok(Some(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_initial_content_then_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GeneratedApp.tsx");
        std::fs::write(&path, "function GeneratedApp() { return 1; }").unwrap();

        let mut source = FileSource::new(&path);
        assert_eq!(
            source.poll().await.unwrap().as_deref(),
            Some("function GeneratedApp() { return 1; }")
        );
        assert_eq!(source.poll().await.unwrap(), None);

        // Force a distinct mtime regardless of filesystem granularity
        std::fs::write(&path, "function GeneratedApp() { return 2; }").unwrap();
        source.last_modified = None;
        assert_eq!(
            source.poll().await.unwrap().as_deref(),
            Some("function GeneratedApp() { return 2; }")
        );

        // Same bytes rewritten
        source.last_modified = None;
        assert_eq!(source.poll().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FileSource::new(dir.path().join("absent.tsx"));
        assert!(source.poll().await.is_err());
    }
}
