//! Registration and the initial key exchange.

use shared::{
    client_message::{ClientRegistrationRequest, PublicKeyRequest},
    server_message::ServerMessage,
    types::ClientId,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    crypto,
    handlers::{timestamp, Context, Error},
};

pub async fn register(ctx: &Context, request: ClientRegistrationRequest) -> Result<ServerMessage, Error> {
    if request.name.is_empty() || !request.name.chars().all(char::is_alphanumeric) {
        return Err(Error::InvalidName(request.name));
    }

    if ctx.db.name_exists(&request.name).await? {
        info!(name = %request.name, "registration refused, name is taken");
        return Ok(ServerMessage::RegistrationUnsuccessful);
    }

    let client_id = *Uuid::new_v4().as_bytes();
    match ctx.db.insert_client(client_id, &request.name, timestamp()).await {
        Ok(()) => {}
        // another connection registered the same name since the check above
        Err(Error::NameTaken(_)) => {
            info!(name = %request.name, "registration refused, name is taken");
            return Ok(ServerMessage::RegistrationUnsuccessful);
        }
        Err(e) => return Err(e),
    }

    info!(name = %request.name, client = %hex::encode(client_id), "client registered");
    Ok(ServerMessage::RegistrationSuccessful { client_id })
}

/// Stores the client's public key and hands out a freshly generated symmetric key wrapped with it.
pub async fn exchange_keys(
    ctx: &Context,
    client_id: ClientId,
    request: PublicKeyRequest,
) -> Result<ServerMessage, Error> {
    if !ctx.db.client_exists(client_id).await? {
        return Err(Error::ClientNotFound);
    }

    let symmetric_key = crypto::generate_symmetric_key()?;
    let wrapped_key = crypto::wrap_key(&request.public_key, &symmetric_key)?;

    ctx.db
        .set_keys(client_id, &request.public_key, &symmetric_key, timestamp())
        .await?;

    info!(client = %hex::encode(client_id), "keys exchanged");
    Ok(ServerMessage::PublicKeyAccepted { client_id, wrapped_key })
}
