use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use crate::defaults::MAX_NAME_LENGTH;

/// Contents of the transfer info file: where to connect, who we are and what to back up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferInfo {
    pub server_addr: String,
    pub name: String,
    pub file_path: PathBuf,
}

impl TransferInfo {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("unable to read {}", path.display()))?;

        Self::parse(&contents).with_context(|| format!("invalid transfer info in {}", path.display()))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let mut lines = contents.lines().map(str::trim);

        let server_addr = lines.next().unwrap_or_default();
        match server_addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => bail!("expected the server address as host:port, got {server_addr:?}"),
        }

        let name = lines.next().unwrap_or_default();
        if name.is_empty() {
            bail!("user name is missing");
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            bail!("user name is longer than {MAX_NAME_LENGTH} characters");
        }

        let file_path = lines.next().unwrap_or_default();
        if file_path.is_empty() {
            bail!("path of the file to back up is missing");
        }

        Ok(Self {
            server_addr: server_addr.to_owned(),
            name: name.to_owned(),
            file_path: PathBuf::from(file_path),
        })
    }
}
