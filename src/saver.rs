use crate::error::CrawlerError;
use std::path::PathBuf;
use tracing::debug;

/// Diagnostic copy of every fetched page.
#[async_trait::async_trait]
pub trait PageSaver: Send + Sync {
    async fn save(&self, name: &str, body: &[u8]) -> Result<(), CrawlerError>;
}

pub struct NullSaver;

#[async_trait::async_trait]
impl PageSaver for NullSaver {
    async fn save(&self, _name: &str, _body: &[u8]) -> Result<(), CrawlerError> {
        Ok(())
    }
}

/// Writes pages to `{root}/[{flow}] {first search no}/{name}`.
pub struct FileSaver {
    dir: PathBuf,
}

impl FileSaver {
    pub fn new(root: impl Into<PathBuf>, flow: &str, first_search_no: &str) -> Self {
        FileSaver {
            dir: root.into().join(format!("[{}] {}", flow, first_search_no)),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait::async_trait]
impl PageSaver for FileSaver {
    async fn save(&self, name: &str, body: &[u8]) -> Result<(), CrawlerError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, body).await?;
        debug!("saved {}", path.display());
        Ok(())
    }
}
