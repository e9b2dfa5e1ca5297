//! Accept loop and the per-connection request/response cycle.

use std::{io, sync::Arc, time::Duration};

use shared::{
    constants::REQUEST_HEADER_SIZE,
    frame::{FrameError, RequestHeader},
    server_message::ServerMessage,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    time::timeout,
};
use tracing::{debug, info_span, warn, Instrument};

use crate::handlers::{self, Context};

#[derive(Clone, Copy, Debug)]
pub struct Limits {
    /// Largest payload a request may declare.
    pub max_payload_size: u32,
    /// How long a single read may wait for data.
    pub idle_timeout: Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("connection idle for too long")]
    IdleTimeout,
    #[error("declared payload of {0} bytes is over the limit")]
    PayloadTooLarge(u32),
    #[error("unable to encode response: {0}")]
    Frame(#[from] FrameError),
}

/// Accepts connections forever, serving each one on its own task.
pub async fn serve(listener: TcpListener, ctx: Arc<Context>, limits: Limits) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("failed to accept connection: {e}");
                continue;
            }
        };

        let ctx = ctx.clone();
        tokio::spawn(
            async move {
                debug!("connection accepted");
                match handle_connection(stream, &ctx, limits).await {
                    Ok(()) => debug!("connection closed by peer"),
                    Err(e) => warn!("connection dropped: {e}"),
                }
            }
            .instrument(info_span!("connection", %peer)),
        );
    }
}

/// Serves requests from `stream` one at a time until the peer disconnects.
///
/// Each request gets exactly one response packet. Requests that can't be handled are answered
/// with a generic error and the connection stays open, unless the stream itself can no longer be
/// trusted to be in sync.
pub async fn handle_connection<S>(mut stream: S, ctx: &Context, limits: Limits) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header_buf = [0; REQUEST_HEADER_SIZE];

    loop {
        match read_full(&mut stream, &mut header_buf, limits.idle_timeout).await? {
            0 => return Ok(()),
            REQUEST_HEADER_SIZE => {}
            n => return Err(unexpected_eof(n, REQUEST_HEADER_SIZE)),
        }

        let header = RequestHeader::parse(&header_buf)?;
        if header.payload_size > limits.max_payload_size {
            write_response(&mut stream, &ServerMessage::GenericError).await?;
            return Err(ConnectionError::PayloadTooLarge(header.payload_size));
        }

        // read the payload even for headers that fail validation, so the next frame starts in place
        let mut payload = vec![0; header.payload_size as usize];
        let n = read_full(&mut stream, &mut payload, limits.idle_timeout).await?;
        if n < payload.len() {
            return Err(unexpected_eof(n, payload.len()));
        }

        let response = match header.validate() {
            Ok(()) => handlers::handle_request(ctx, &header, &payload).await,
            Err(e) => {
                warn!(code = header.code, "rejected request header: {e}");
                ServerMessage::GenericError
            }
        };

        write_response(&mut stream, &response).await?;
    }
}

/// Fills `buf` unless the peer closes the stream first, returning how many bytes were read.
async fn read_full<S>(stream: &mut S, buf: &mut [u8], idle_timeout: Duration) -> Result<usize, ConnectionError>
where
    S: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = timeout(idle_timeout, stream.read(&mut buf[filled..]))
            .await
            .map_err(|_| ConnectionError::IdleTimeout)??;
        if n == 0 {
            break;
        }
        filled += n;
    }

    Ok(filled)
}

async fn write_response<S>(stream: &mut S, response: &ServerMessage) -> Result<(), ConnectionError>
where
    S: AsyncWrite + Unpin,
{
    let packet = response.to_packet()?;
    stream.write_all(&packet).await?;
    stream.flush().await?;

    Ok(())
}

fn unexpected_eof(read: usize, expected: usize) -> ConnectionError {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("peer disconnected after {read} of {expected} bytes"),
    )
    .into()
}

#[cfg(test)]
mod tests {
    use shared::{
        client_message::{ClientMessage, ClientRegistrationRequest},
        constants::PACKET_SIZE,
    };
    use tokio::{io::DuplexStream, net::TcpStream, task::JoinHandle};

    use super::*;
    use crate::handlers::test_utils::test_context;

    const LIMITS: Limits = Limits {
        max_payload_size: 1024,
        idle_timeout: Duration::from_secs(5),
    };

    fn registration(name: &str) -> Vec<u8> {
        ClientMessage::Registration(ClientRegistrationRequest { name: name.into() })
            .encode([0; 16])
            .unwrap()
    }

    async fn read_response<S: AsyncRead + Unpin>(stream: &mut S) -> ServerMessage {
        let mut packet = [0; PACKET_SIZE];
        stream.read_exact(&mut packet).await.unwrap();
        ServerMessage::decode(&packet).unwrap()
    }

    async fn connect(limits: Limits) -> (DuplexStream, JoinHandle<Result<(), ConnectionError>>, tempfile::TempDir) {
        let (ctx, dir) = test_context().await;
        let (client, server) = tokio::io::duplex(1 << 16);
        let handle = tokio::spawn(async move { handle_connection(server, &ctx, limits).await });

        (client, handle, dir)
    }

    #[tokio::test]
    async fn serves_requests_in_order() {
        let (mut client, handle, _dir) = connect(LIMITS).await;

        client.write_all(&registration("alice")).await.unwrap();
        client.write_all(&registration("alice")).await.unwrap();

        assert!(matches!(
            read_response(&mut client).await,
            ServerMessage::RegistrationSuccessful { .. }
        ));
        assert_eq!(read_response(&mut client).await, ServerMessage::RegistrationUnsuccessful);

        drop(client);
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn bad_headers_keep_the_connection_usable() {
        let (mut client, handle, _dir) = connect(LIMITS).await;

        // wrong version, payload is skipped
        let mut frame = registration("alice");
        frame[16] = 2;
        client.write_all(&frame).await.unwrap();
        assert_eq!(read_response(&mut client).await, ServerMessage::GenericError);

        // empty payload
        client.write_all(&RequestHeader::new([0; 16], 1100, 0).encode()).await.unwrap();
        assert_eq!(read_response(&mut client).await, ServerMessage::GenericError);

        client.write_all(&registration("alice")).await.unwrap();
        assert!(matches!(
            read_response(&mut client).await,
            ServerMessage::RegistrationSuccessful { .. }
        ));

        drop(client);
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn oversized_payload_closes_the_connection() {
        let (mut client, handle, _dir) = connect(LIMITS).await;

        client.write_all(&RequestHeader::new([0; 16], 1103, 1025).encode()).await.unwrap();
        assert_eq!(read_response(&mut client).await, ServerMessage::GenericError);

        assert!(matches!(
            handle.await.unwrap(),
            Err(ConnectionError::PayloadTooLarge(1025))
        ));
        assert_eq!(client.read(&mut [0; 1]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn frame_arriving_in_pieces() {
        let (mut client, handle, _dir) = connect(LIMITS).await;

        for piece in registration("alice").chunks(7) {
            client.write_all(piece).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(matches!(
            read_response(&mut client).await,
            ServerMessage::RegistrationSuccessful { .. }
        ));

        drop(client);
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn disconnect_mid_frame() {
        let (mut client, handle, _dir) = connect(LIMITS).await;

        client.write_all(&registration("alice")[..40]).await.unwrap();
        drop(client);

        assert!(matches!(handle.await.unwrap(), Err(ConnectionError::Io(_))));
    }

    #[tokio::test]
    async fn idle_connections_time_out() {
        let limits = Limits {
            idle_timeout: Duration::from_millis(50),
            ..LIMITS
        };
        let (_client, handle, _dir) = connect(limits).await;

        assert!(matches!(handle.await.unwrap(), Err(ConnectionError::IdleTimeout)));
    }

    #[tokio::test]
    async fn serves_over_tcp() {
        let (ctx, _dir) = test_context().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::new(ctx), LIMITS));

        let mut first = TcpStream::connect(addr).await.unwrap();
        let mut second = TcpStream::connect(addr).await.unwrap();

        first.write_all(&registration("alice")).await.unwrap();
        second.write_all(&registration("bob")).await.unwrap();

        assert!(matches!(
            read_response(&mut first).await,
            ServerMessage::RegistrationSuccessful { .. }
        ));
        assert!(matches!(
            read_response(&mut second).await,
            ServerMessage::RegistrationSuccessful { .. }
        ));
    }
}
