//! Request handling: one decoded request in, one response out.

pub(crate) mod backup;
pub(crate) mod login;
pub(crate) mod register;

use shared::{
    client_message::ClientMessage,
    frame::{FrameError, RequestHeader},
    server_message::ServerMessage,
    types::ClientId,
};
use tracing::{debug, warn};

use crate::{crypto, db::Repository, storage::Storage};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed request: {0}")]
    Frame(#[from] FrameError),
    #[error("crypto error: {0}")]
    Crypto(#[from] crypto::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("database returned an unexpected type")]
    DatabaseTypeMismatch,
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("client not found")]
    ClientNotFound,
    #[error("name {0:?} is already registered")]
    NameTaken(String),
    #[error("client has not exchanged keys yet")]
    MissingKey,
    #[error("file not found")]
    FileNotFound,
    #[error("invalid client name {0:?}")]
    InvalidName(String),
    #[error("invalid file name {0:?}")]
    InvalidFileName(String),
}

/// Everything a handler may touch, shared by all connections.
pub struct Context {
    pub db: Box<dyn Repository>,
    pub storage: Storage,
}

/// Decodes and executes a single request. Failures are logged and answered with a generic error.
pub async fn handle_request(ctx: &Context, header: &RequestHeader, payload: &[u8]) -> ServerMessage {
    let client_id = header.client_id;

    let result = match ClientMessage::decode(header, payload) {
        Ok(message) => {
            debug!(client = %hex::encode(client_id), code = header.code, "handling request");
            dispatch(ctx, client_id, message).await
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            warn!(client = %hex::encode(client_id), code = header.code, "request failed: {e}");
            ServerMessage::GenericError
        }
    }
}

async fn dispatch(ctx: &Context, client_id: ClientId, message: ClientMessage) -> Result<ServerMessage, Error> {
    match message {
        ClientMessage::Registration(request) => register::register(ctx, request).await,
        ClientMessage::PublicKey(request) => register::exchange_keys(ctx, client_id, request).await,
        ClientMessage::Reconnect(request) => login::reconnect(ctx, client_id, request).await,
        ClientMessage::FileSend(request) => backup::receive_file(ctx, client_id, request).await,
        ClientMessage::CrcOk(request) => backup::crc_ok(ctx, client_id, request).await,
        ClientMessage::CrcRetry(request) => backup::crc_retry(ctx, client_id, request).await,
        ClientMessage::CrcFailed(request) => backup::crc_failed(ctx, client_id, request).await,
    }
}

/// Current time as unix seconds, the format of the last seen column.
pub(crate) fn timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
