#![deny(unused_must_use, deprecated)]
#![warn(clippy::pedantic)]
#![allow(clippy::single_match_else)]

mod config;
mod connection;
mod crypto;
mod db;
mod handlers;
mod storage;

use std::sync::Arc;

use anyhow::Context as _;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{config::Config, db::Database, handlers::Context, storage::Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let db = Database::init(&config.db_url)
        .await
        .with_context(|| format!("unable to open database {}", config.db_url))?;
    let storage = Storage::init(&config.upload_dir)
        .await
        .with_context(|| format!("unable to create upload directory {}", config.upload_dir.display()))?;
    info!("storing uploads in {}", storage.root().display());

    let ctx = Arc::new(Context {
        db: Box::new(db),
        storage,
    });

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("unable to listen on {}", config.bind_addr()))?;
    info!("listening on {}", config.bind_addr());

    connection::serve(listener, ctx, config.limits()).await;
    Ok(())
}
