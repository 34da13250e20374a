use crate::error::GmaoError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Content-addressed file store for uploaded documents.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dir(&self) -> Result<(), GmaoError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Write `bytes` under `{hash}.{ext}`. The file is written beside its
    /// final name and renamed, so readers never see a partial blob.
    pub async fn put(&self, hash: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf, GmaoError> {
        self.ensure_dir().await?;
        let path = self.root.join(format!("{hash}.{ext}"));
        let tmp = self.root.join(format!("{hash}.{ext}.part"));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), size = bytes.len(), "blob stored");
        Ok(path)
    }

    pub async fn get(&self, path: &str) -> Result<Vec<u8>, GmaoError> {
        Ok(fs::read(path).await?)
    }
}
