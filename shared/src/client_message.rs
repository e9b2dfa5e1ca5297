use crate::{
    constants::{FILE_NAME_SIZE, NAME_SIZE, PUBLIC_KEY_SIZE},
    frame::{FrameError, Reader, RequestHeader, Writer},
    types::{ClientId, PublicKeyBytes},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RequestCode {
    Registration = 1100,
    PublicKey = 1101,
    Reconnect = 1102,
    FileSend = 1103,
    CrcOk = 1104,
    CrcRetry = 1105,
    CrcFailed = 1106,
}

impl TryFrom<u16> for RequestCode {
    type Error = FrameError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            1100 => Ok(Self::Registration),
            1101 => Ok(Self::PublicKey),
            1102 => Ok(Self::Reconnect),
            1103 => Ok(Self::FileSend),
            1104 => Ok(Self::CrcOk),
            1105 => Ok(Self::CrcRetry),
            1106 => Ok(Self::CrcFailed),
            _ => Err(FrameError::UnknownRequestCode(code)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Registration(ClientRegistrationRequest),
    PublicKey(PublicKeyRequest),
    Reconnect(ReconnectRequest),
    FileSend(FileSendRequest),
    CrcOk(CrcRequest),
    CrcRetry(CrcRequest),
    CrcFailed(CrcRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRegistrationRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyRequest {
    pub name: String,
    pub public_key: PublicKeyBytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSendRequest {
    pub file_name: String,
    /// AES-CBC encrypted file content
    pub content: Vec<u8>,
}

/// Shared body of the CRC ok, retry and failed requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrcRequest {
    pub file_name: String,
}

impl ClientMessage {
    pub fn code(&self) -> RequestCode {
        match self {
            ClientMessage::Registration(_) => RequestCode::Registration,
            ClientMessage::PublicKey(_) => RequestCode::PublicKey,
            ClientMessage::Reconnect(_) => RequestCode::Reconnect,
            ClientMessage::FileSend(_) => RequestCode::FileSend,
            ClientMessage::CrcOk(_) => RequestCode::CrcOk,
            ClientMessage::CrcRetry(_) => RequestCode::CrcRetry,
            ClientMessage::CrcFailed(_) => RequestCode::CrcFailed,
        }
    }

    /// Decodes a request body. `payload` must hold exactly the bytes announced by `header`.
    pub fn decode(header: &RequestHeader, payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() != header.payload_size as usize {
            return Err(FrameError::PayloadSizeMismatch {
                declared: header.payload_size as usize,
                actual: payload.len(),
            });
        }

        let code = RequestCode::try_from(header.code)?;
        let mut reader = Reader::new(payload);

        let message = match code {
            RequestCode::Registration => ClientMessage::Registration(ClientRegistrationRequest {
                name: reader.padded_text(NAME_SIZE)?,
            }),
            RequestCode::PublicKey => ClientMessage::PublicKey(PublicKeyRequest {
                name: reader.padded_text(NAME_SIZE)?,
                public_key: reader.array()?,
            }),
            RequestCode::Reconnect => ClientMessage::Reconnect(ReconnectRequest {
                name: reader.padded_text(NAME_SIZE)?,
            }),
            RequestCode::FileSend => {
                let content_size = reader.u32()? as usize;
                let file_name = reader.padded_text(FILE_NAME_SIZE)?;
                let content = reader.bytes(content_size)?.to_vec();

                ClientMessage::FileSend(FileSendRequest { file_name, content })
            }
            RequestCode::CrcOk => ClientMessage::CrcOk(CrcRequest::read(&mut reader)?),
            RequestCode::CrcRetry => ClientMessage::CrcRetry(CrcRequest::read(&mut reader)?),
            RequestCode::CrcFailed => ClientMessage::CrcFailed(CrcRequest::read(&mut reader)?),
        };

        reader.finish()?;
        Ok(message)
    }

    /// Encodes the complete request frame, header included.
    pub fn encode(&self, client_id: ClientId) -> Result<Vec<u8>, FrameError> {
        let mut body = Writer::new();

        match self {
            ClientMessage::Registration(msg) => body.padded_text(&msg.name, NAME_SIZE)?,
            ClientMessage::PublicKey(msg) => {
                body.padded_text(&msg.name, NAME_SIZE)?;
                body.padded(&msg.public_key, PUBLIC_KEY_SIZE)?;
            }
            ClientMessage::Reconnect(msg) => body.padded_text(&msg.name, NAME_SIZE)?,
            ClientMessage::FileSend(msg) => {
                let content_size = u32::try_from(msg.content.len()).map_err(|_| FrameError::FieldTooLong {
                    len: msg.content.len(),
                    max: u32::MAX as usize,
                })?;

                body.u32(content_size);
                body.padded_text(&msg.file_name, FILE_NAME_SIZE)?;
                body.bytes(&msg.content);
            }
            ClientMessage::CrcOk(msg) | ClientMessage::CrcRetry(msg) | ClientMessage::CrcFailed(msg) => {
                body.padded_text(&msg.file_name, FILE_NAME_SIZE)?;
            }
        }

        let body = body.into_inner();
        let payload_size = u32::try_from(body.len()).map_err(|_| FrameError::FieldTooLong {
            len: body.len(),
            max: u32::MAX as usize,
        })?;

        let header = RequestHeader::new(client_id, self.code() as u16, payload_size);
        let mut frame = Writer::with_capacity(header.encode().len() + body.len());
        frame.bytes(&header.encode());
        frame.bytes(&body);

        Ok(frame.into_inner())
    }
}

impl CrcRequest {
    fn read(reader: &mut Reader) -> Result<Self, FrameError> {
        Ok(Self {
            file_name: reader.padded_text(FILE_NAME_SIZE)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::REQUEST_HEADER_SIZE;

    fn split(frame: &[u8]) -> (RequestHeader, &[u8]) {
        let header = RequestHeader::decode(&frame[..REQUEST_HEADER_SIZE]).unwrap();
        (header, &frame[REQUEST_HEADER_SIZE..])
    }

    #[test]
    fn registration_layout() {
        let msg = ClientMessage::Registration(ClientRegistrationRequest { name: "alice123".into() });
        let frame = msg.encode([0; 16]).unwrap();
        let (header, payload) = split(&frame);

        assert_eq!(header.code, 1100);
        assert_eq!(header.payload_size, 255);
        assert_eq!(&payload[..8], b"alice123");
        assert!(payload[8..].iter().all(|b| *b == 0));
        assert_eq!(ClientMessage::decode(&header, payload).unwrap(), msg);
    }

    #[test]
    fn public_key_layout() {
        let msg = ClientMessage::PublicKey(PublicKeyRequest {
            name: "bob".into(),
            public_key: [0xAB; 160],
        });
        let frame = msg.encode([9; 16]).unwrap();
        let (header, payload) = split(&frame);

        assert_eq!(header.client_id, [9; 16]);
        assert_eq!(header.payload_size, 415);
        assert_eq!(payload[255], 0xAB);
        assert_eq!(ClientMessage::decode(&header, payload).unwrap(), msg);
    }

    #[test]
    fn file_send_layout() {
        let msg = ClientMessage::FileSend(FileSendRequest {
            file_name: "a.txt".into(),
            content: vec![1, 2, 3, 4, 5],
        });
        let frame = msg.encode([1; 16]).unwrap();
        let (header, payload) = split(&frame);

        assert_eq!(header.payload_size, 4 + 255 + 5);
        assert_eq!(&payload[..4], &[5, 0, 0, 0]);
        assert_eq!(&payload[4..9], b"a.txt");
        assert_eq!(&payload[259..], &[1, 2, 3, 4, 5]);
        assert_eq!(ClientMessage::decode(&header, payload).unwrap(), msg);
    }

    #[test]
    fn content_size_beyond_payload_is_rejected() {
        let msg = ClientMessage::FileSend(FileSendRequest {
            file_name: "a.txt".into(),
            content: vec![0; 16],
        });
        let mut frame = msg.encode([1; 16]).unwrap();
        // claim more content than the payload carries
        frame[REQUEST_HEADER_SIZE..REQUEST_HEADER_SIZE + 4].copy_from_slice(&17u32.to_le_bytes());
        let (header, payload) = split(&frame);

        assert!(matches!(
            ClientMessage::decode(&header, payload),
            Err(FrameError::Truncated { .. })
        ));

        frame[REQUEST_HEADER_SIZE..REQUEST_HEADER_SIZE + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        let (header, payload) = split(&frame);
        assert!(ClientMessage::decode(&header, payload).is_err());
    }

    #[test]
    fn crc_requests_share_a_layout() {
        for msg in [
            ClientMessage::CrcOk(CrcRequest { file_name: "x".into() }),
            ClientMessage::CrcRetry(CrcRequest { file_name: "x".into() }),
            ClientMessage::CrcFailed(CrcRequest { file_name: "x".into() }),
        ] {
            let frame = msg.encode([2; 16]).unwrap();
            let (header, payload) = split(&frame);

            assert_eq!(header.payload_size, 255);
            assert_eq!(ClientMessage::decode(&header, payload).unwrap(), msg);
        }
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        let header = RequestHeader::new([0; 16], 1100, 10);
        assert!(matches!(
            ClientMessage::decode(&header, &[0; 10]),
            Err(FrameError::Truncated { .. })
        ));

        let header = RequestHeader::new([0; 16], 1104, 256);
        assert_eq!(ClientMessage::decode(&header, &[0; 256]), Err(FrameError::TrailingBytes(1)));

        let header = RequestHeader::new([0; 16], 1999, 255);
        assert_eq!(
            ClientMessage::decode(&header, &[0; 255]),
            Err(FrameError::UnknownRequestCode(1999))
        );

        let header = RequestHeader::new([0; 16], 1100, 255);
        assert_eq!(
            ClientMessage::decode(&header, &[0; 200]),
            Err(FrameError::PayloadSizeMismatch { declared: 255, actual: 200 })
        );
    }

    #[test]
    fn long_names_do_not_encode() {
        let msg = ClientMessage::Reconnect(ReconnectRequest { name: "n".repeat(256) });
        assert_eq!(msg.encode([0; 16]), Err(FrameError::FieldTooLong { len: 256, max: 255 }));
    }
}
