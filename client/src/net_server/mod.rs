pub mod requests;

use shared::{
    client_message::ClientMessage,
    constants::PACKET_SIZE,
    frame::FrameError,
    server_message::{ResponseCode, ServerMessage},
    types::ClientId,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum RequestError {
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Frame(#[from] FrameError),
    #[error("server responded with a generic error")]
    ServerError,
    #[error("unexpected response {0:?}")]
    UnexpectedResponse(ResponseCode),
    #[error("response is addressed to client {0}")]
    WrongClient(String),
}

/// A connection to the backup server. Every request is answered by exactly one response packet.
pub struct Connection<S = TcpStream> {
    stream: S,
}

impl Connection<TcpStream> {
    pub async fn connect(addr: &str) -> Result<Self, RequestError> {
        let stream = TcpStream::connect(addr).await?;
        debug!("connected to {addr}");

        Ok(Self::new(stream))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub async fn request(
        &mut self,
        client_id: ClientId,
        message: &ClientMessage,
    ) -> Result<ServerMessage, RequestError> {
        let frame = message.encode(client_id)?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;

        let mut packet = vec![0; PACKET_SIZE];
        self.stream.read_exact(&mut packet).await?;
        let response = ServerMessage::decode(&packet)?;
        debug!("{:?} answered with {:?}", message.code(), response.code());

        match response {
            ServerMessage::GenericError => Err(RequestError::ServerError),
            response => Ok(response),
        }
    }
}


#[cfg(test)]
mod tests {
    use shared::client_message::{ClientRegistrationRequest, CrcRequest};

    use super::{test_utils::fake_server, *};

    #[tokio::test]
    async fn request_and_response() {
        let (mut conn, server) = fake_server(vec![ServerMessage::RegistrationSuccessful { client_id: [4; 16] }]);
        let request = ClientMessage::Registration(ClientRegistrationRequest { name: "alice".into() });

        let response = conn.request([0; 16], &request).await.unwrap();
        assert_eq!(response, ServerMessage::RegistrationSuccessful { client_id: [4; 16] });

        drop(conn);
        assert_eq!(server.await.unwrap(), vec![([0; 16], request)]);
    }

    #[tokio::test]
    async fn generic_error_is_an_error() {
        let (mut conn, _server) = fake_server(vec![ServerMessage::GenericError]);
        let request = ClientMessage::CrcOk(CrcRequest { file_name: "a".into() });

        assert!(matches!(
            conn.request([1; 16], &request).await,
            Err(RequestError::ServerError)
        ));
    }

    #[tokio::test]
    async fn closed_connection() {
        let (mut conn, _server) = fake_server(vec![]);
        let request = ClientMessage::CrcOk(CrcRequest { file_name: "a".into() });

        assert!(matches!(
            conn.request([1; 16], &request).await,
            Err(RequestError::Network(_))
        ));
    }
}
