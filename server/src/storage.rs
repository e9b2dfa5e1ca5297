//! Uploaded file content on disk, one directory per client.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use shared::types::ClientId;

use crate::handlers;

#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub async fn init(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves where the blob `name` of `client_id` lives, refusing names that would escape the
    /// client's directory.
    pub fn blob_path(&self, client_id: ClientId, name: &str) -> Result<PathBuf, handlers::Error> {
        if !is_safe_file_name(name) {
            return Err(handlers::Error::InvalidFileName(name.to_owned()));
        }

        Ok(self.root.join(hex::encode(client_id)).join(name))
    }

    pub async fn write_blob(&self, client_id: ClientId, name: &str, data: &[u8]) -> Result<PathBuf, handlers::Error> {
        let path = self.blob_path(client_id, name)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, data).await?;

        Ok(path)
    }

    /// Removes a stored blob. A blob that is already gone is not an error.
    pub async fn delete_blob(&self, path: &Path) -> Result<(), handlers::Error> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0', ':'])
}
