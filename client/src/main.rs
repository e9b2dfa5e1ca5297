#![deny(unused_must_use, deprecated)]
#![warn(clippy::pedantic)]
#![allow(clippy::redundant_else, clippy::manual_let_else)]

mod backup;
mod config;
mod defaults;
mod identity;
mod key_manager;
mod net_server;

use std::path::Path;

use anyhow::{anyhow, Context};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{backup::BackupOutcome, config::TransferInfo, net_server::Connection};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let transfer = TransferInfo::load(Path::new(defaults::TRANSFER_INFO_FILE)).await?;

    let file_name = transfer
        .file_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("{} does not name a file", transfer.file_path.display()))?
        .to_owned();
    let content = tokio::fs::read(&transfer.file_path)
        .await
        .with_context(|| format!("unable to read {}", transfer.file_path.display()))?;

    let mut conn = Connection::connect(&transfer.server_addr)
        .await
        .with_context(|| format!("unable to connect to {}", transfer.server_addr))?;

    let session = identity::login(&mut conn, &transfer.name, Path::new(defaults::ME_INFO_FILE)).await?;

    match backup::backup_file(&mut conn, &session, &file_name, &content).await? {
        BackupOutcome::Verified { sends } => {
            info!("{file_name} backed up and verified after {sends} send(s)");
            Ok(())
        }
        BackupOutcome::Failed => {
            error!("{file_name} could not be verified, the server discarded it");
            Err(anyhow!("backup of {file_name} failed"))
        }
    }
}
