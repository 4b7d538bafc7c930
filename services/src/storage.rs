//! On-disk copy of submitted content. Files stay after upload so an operator
//! resubmission can send them again.

use sha2::{Digest, Sha256};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Hex SHA-256 used as the submission identifier.
pub fn content_identifier(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn relative_path(course_module_id: i64, author_id: i64, identifier: &str) -> String {
        format!("module_{course_module_id}/user_{author_id}/{identifier}")
    }

    fn resolve(&self, relative: &str) -> io::Result<PathBuf> {
        let rel = Path::new(relative);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("content path escapes storage root: {relative}"),
            ));
        }
        Ok(self.root.join(rel))
    }

    /// Writes `bytes` and returns the path relative to the root.
    pub async fn write(
        &self,
        course_module_id: i64,
        author_id: i64,
        identifier: &str,
        bytes: &[u8],
    ) -> io::Result<String> {
        let relative = Self::relative_path(course_module_id, author_id, identifier);
        let full = self.resolve(&relative)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        Ok(relative)
    }

    pub async fn read(&self, relative: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.resolve(relative)?).await
    }
}
