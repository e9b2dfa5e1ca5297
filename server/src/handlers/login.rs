use shared::{
    client_message::ReconnectRequest, constants::PUBLIC_KEY_SIZE, server_message::ServerMessage, types::ClientId,
};
use tracing::info;

use crate::{
    crypto,
    handlers::{timestamp, Context, Error},
};

/// Re-wraps the stored symmetric key for a returning client.
///
/// Anything short of a known client with matching name and complete key material is answered with
/// a reconnect failure, which tells the client to register again.
pub async fn reconnect(ctx: &Context, client_id: ClientId, request: ReconnectRequest) -> Result<ServerMessage, Error> {
    let failed = ServerMessage::ReconnectFailed { client_id };

    if ctx.db.get_name(client_id).await?.as_deref() != Some(request.name.as_str()) {
        info!(client = %hex::encode(client_id), name = %request.name, "reconnect refused, unknown client");
        return Ok(failed);
    }

    let public_key = match ctx.db.get_public_key(client_id).await? {
        Some(key) if key.len() == PUBLIC_KEY_SIZE => key,
        _ => {
            info!(client = %hex::encode(client_id), "reconnect refused, no valid public key");
            return Ok(failed);
        }
    };

    let Some(symmetric_key) = ctx.db.get_symmetric_key(client_id).await? else {
        info!(client = %hex::encode(client_id), "reconnect refused, no symmetric key");
        return Ok(failed);
    };

    let wrapped_key = crypto::wrap_key(&public_key, &symmetric_key)?;
    ctx.db.set_last_seen(client_id, timestamp()).await?;

    info!(client = %hex::encode(client_id), "client reconnected");
    Ok(ServerMessage::ReconnectSuccessful { client_id, wrapped_key })
}
