//! Handlers for file uploads and their checksum confirmation.

use shared::{
    checksum::checksum,
    client_message::{CrcRequest, FileSendRequest},
    frame::FrameError,
    server_message::{FileReceived, ServerMessage},
    types::ClientId,
};
use tracing::info;

use crate::{
    crypto,
    db::FileRecord,
    handlers::{timestamp, Context, Error},
};

/// Decrypts and stores an upload, replying with the checksum of the plaintext.
///
/// The file stays unverified until the client confirms the checksum.
pub async fn receive_file(
    ctx: &Context,
    client_id: ClientId,
    request: FileSendRequest,
) -> Result<ServerMessage, Error> {
    let key = ctx.db.get_symmetric_key(client_id).await?.ok_or(Error::MissingKey)?;
    // reject unsafe names before doing any work
    ctx.storage.blob_path(client_id, &request.file_name)?;

    let content = crypto::decrypt_content(&key, &request.content)?;
    let content_size = u32::try_from(content.len()).map_err(|_| FrameError::FieldTooLong {
        len: content.len(),
        max: u32::MAX as usize,
    })?;
    let checksum = checksum(&content);

    let path = ctx.storage.write_blob(client_id, &request.file_name, &content).await?;
    ctx.db
        .upsert_file(&FileRecord {
            client_id,
            name: request.file_name.clone(),
            path,
            verified: false,
        })
        .await?;
    ctx.db.set_last_seen(client_id, timestamp()).await?;

    info!(
        client = %hex::encode(client_id),
        file = %request.file_name,
        size = content_size,
        checksum,
        "file received"
    );

    Ok(ServerMessage::FileReceived(FileReceived {
        client_id,
        content_size,
        file_name: request.file_name,
        checksum,
    }))
}

pub async fn crc_ok(ctx: &Context, client_id: ClientId, request: CrcRequest) -> Result<ServerMessage, Error> {
    ctx.db.set_verified(client_id, &request.file_name, true).await?;
    ctx.db.set_last_seen(client_id, timestamp()).await?;

    info!(client = %hex::encode(client_id), file = %request.file_name, "file verified");
    Ok(ServerMessage::ConfirmedMessage { client_id })
}

/// The client is about to send the file again, nothing changes until then.
pub async fn crc_retry(ctx: &Context, client_id: ClientId, request: CrcRequest) -> Result<ServerMessage, Error> {
    if !ctx.db.file_exists(client_id, &request.file_name).await? {
        return Err(Error::FileNotFound);
    }
    ctx.db.set_last_seen(client_id, timestamp()).await?;

    info!(client = %hex::encode(client_id), file = %request.file_name, "checksum mismatch, client will retry");
    Ok(ServerMessage::ConfirmedMessage { client_id })
}

/// The client gave up on the upload, both the blob and its record are removed.
pub async fn crc_failed(ctx: &Context, client_id: ClientId, request: CrcRequest) -> Result<ServerMessage, Error> {
    let file = ctx
        .db
        .get_file(client_id, &request.file_name)
        .await?
        .ok_or(Error::FileNotFound)?;

    ctx.storage.delete_blob(&file.path).await?;
    ctx.db.delete_file(client_id, &request.file_name).await?;
    ctx.db.set_last_seen(client_id, timestamp()).await?;

    info!(client = %hex::encode(client_id), file = %request.file_name, "upload failed, file removed");
    Ok(ServerMessage::ConfirmedMessage { client_id })
}
