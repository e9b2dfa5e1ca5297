use shared::{
    client_message::{
        ClientMessage, ClientRegistrationRequest, CrcRequest, FileSendRequest, PublicKeyRequest, ReconnectRequest,
    },
    server_message::{FileReceived, ServerMessage},
    types::{ClientId, PublicKeyBytes, WrappedKey},
};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{Connection, RequestError};

/// Registers a new client under `name`. Returns `None` when the name is already taken.
pub async fn register<S>(conn: &mut Connection<S>, name: &str) -> Result<Option<ClientId>, RequestError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = ClientMessage::Registration(ClientRegistrationRequest { name: name.to_owned() });

    match conn.request(ClientId::default(), &request).await? {
        ServerMessage::RegistrationSuccessful { client_id } => Ok(Some(client_id)),
        ServerMessage::RegistrationUnsuccessful => Ok(None),
        other => Err(RequestError::UnexpectedResponse(other.code())),
    }
}

/// Sends our public key, receiving the symmetric key wrapped with it.
pub async fn exchange_keys<S>(
    conn: &mut Connection<S>,
    client_id: ClientId,
    name: &str,
    public_key: PublicKeyBytes,
) -> Result<WrappedKey, RequestError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = ClientMessage::PublicKey(PublicKeyRequest {
        name: name.to_owned(),
        public_key,
    });

    match conn.request(client_id, &request).await? {
        ServerMessage::PublicKeyAccepted {
            client_id: id,
            wrapped_key,
        } => {
            check_client(client_id, id)?;
            Ok(wrapped_key)
        }
        other => Err(RequestError::UnexpectedResponse(other.code())),
    }
}

/// Asks for the symmetric key of an existing registration. Returns `None` when the server no
/// longer accepts it and the client has to register again.
pub async fn reconnect<S>(
    conn: &mut Connection<S>,
    client_id: ClientId,
    name: &str,
) -> Result<Option<WrappedKey>, RequestError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = ClientMessage::Reconnect(ReconnectRequest { name: name.to_owned() });

    match conn.request(client_id, &request).await? {
        ServerMessage::ReconnectSuccessful {
            client_id: id,
            wrapped_key,
        } => {
            check_client(client_id, id)?;
            Ok(Some(wrapped_key))
        }
        ServerMessage::ReconnectFailed { .. } => Ok(None),
        other => Err(RequestError::UnexpectedResponse(other.code())),
    }
}

/// Uploads encrypted file content, returning what the server made of it.
pub async fn send_file<S>(
    conn: &mut Connection<S>,
    client_id: ClientId,
    file_name: &str,
    content: Vec<u8>,
) -> Result<FileReceived, RequestError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = ClientMessage::FileSend(FileSendRequest {
        file_name: file_name.to_owned(),
        content,
    });

    match conn.request(client_id, &request).await? {
        ServerMessage::FileReceived(received) => {
            check_client(client_id, received.client_id)?;
            Ok(received)
        }
        other => Err(RequestError::UnexpectedResponse(other.code())),
    }
}

pub async fn crc_ok<S>(conn: &mut Connection<S>, client_id: ClientId, file_name: &str) -> Result<(), RequestError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    confirm(conn, client_id, ClientMessage::CrcOk(crc_request(file_name))).await
}

pub async fn crc_retry<S>(conn: &mut Connection<S>, client_id: ClientId, file_name: &str) -> Result<(), RequestError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    confirm(conn, client_id, ClientMessage::CrcRetry(crc_request(file_name))).await
}

pub async fn crc_failed<S>(conn: &mut Connection<S>, client_id: ClientId, file_name: &str) -> Result<(), RequestError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    confirm(conn, client_id, ClientMessage::CrcFailed(crc_request(file_name))).await
}

fn crc_request(file_name: &str) -> CrcRequest {
    CrcRequest {
        file_name: file_name.to_owned(),
    }
}

async fn confirm<S>(conn: &mut Connection<S>, client_id: ClientId, request: ClientMessage) -> Result<(), RequestError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match conn.request(client_id, &request).await? {
        ServerMessage::ConfirmedMessage { client_id: id } => check_client(client_id, id),
        other => Err(RequestError::UnexpectedResponse(other.code())),
    }
}

fn check_client(expected: ClientId, received: ClientId) -> Result<(), RequestError> {
    if expected == received {
        Ok(())
    } else {
        Err(RequestError::WrongClient(hex::encode(received)))
    }
}
