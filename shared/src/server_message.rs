use crate::{
    constants::{FILE_NAME_SIZE, PACKET_SIZE, RESPONSE_HEADER_SIZE},
    frame::{FrameError, Reader, ResponseHeader, Writer},
    types::{Checksum, ClientId, WrappedKey},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ResponseCode {
    RegistrationSuccessful = 2100,
    RegistrationUnsuccessful = 2101,
    PublicKeyAccepted = 2102,
    FileReceived = 2103,
    ConfirmedMessage = 2104,
    ReconnectSuccessful = 2105,
    ReconnectFailed = 2106,
    GenericError = 2107,
}

impl TryFrom<u16> for ResponseCode {
    type Error = FrameError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            2100 => Ok(Self::RegistrationSuccessful),
            2101 => Ok(Self::RegistrationUnsuccessful),
            2102 => Ok(Self::PublicKeyAccepted),
            2103 => Ok(Self::FileReceived),
            2104 => Ok(Self::ConfirmedMessage),
            2105 => Ok(Self::ReconnectSuccessful),
            2106 => Ok(Self::ReconnectFailed),
            2107 => Ok(Self::GenericError),
            _ => Err(FrameError::UnknownResponseCode(code)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    RegistrationSuccessful { client_id: ClientId },
    RegistrationUnsuccessful,
    PublicKeyAccepted { client_id: ClientId, wrapped_key: WrappedKey },
    FileReceived(FileReceived),
    ConfirmedMessage { client_id: ClientId },
    ReconnectSuccessful { client_id: ClientId, wrapped_key: WrappedKey },
    ReconnectFailed { client_id: ClientId },
    GenericError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReceived {
    pub client_id: ClientId,
    pub content_size: u32,
    pub file_name: String,
    pub checksum: Checksum,
}

impl ServerMessage {
    pub fn code(&self) -> ResponseCode {
        match self {
            ServerMessage::RegistrationSuccessful { .. } => ResponseCode::RegistrationSuccessful,
            ServerMessage::RegistrationUnsuccessful => ResponseCode::RegistrationUnsuccessful,
            ServerMessage::PublicKeyAccepted { .. } => ResponseCode::PublicKeyAccepted,
            ServerMessage::FileReceived(_) => ResponseCode::FileReceived,
            ServerMessage::ConfirmedMessage { .. } => ResponseCode::ConfirmedMessage,
            ServerMessage::ReconnectSuccessful { .. } => ResponseCode::ReconnectSuccessful,
            ServerMessage::ReconnectFailed { .. } => ResponseCode::ReconnectFailed,
            ServerMessage::GenericError => ResponseCode::GenericError,
        }
    }

    /// Encodes the header and payload, without packet padding.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let mut body = Writer::new();

        match self {
            ServerMessage::RegistrationSuccessful { client_id }
            | ServerMessage::ConfirmedMessage { client_id }
            | ServerMessage::ReconnectFailed { client_id } => body.bytes(client_id),
            ServerMessage::PublicKeyAccepted { client_id, wrapped_key }
            | ServerMessage::ReconnectSuccessful { client_id, wrapped_key } => {
                body.bytes(client_id);
                body.bytes(wrapped_key);
            }
            ServerMessage::FileReceived(msg) => {
                body.bytes(&msg.client_id);
                body.u32(msg.content_size);
                body.padded_text(&msg.file_name, FILE_NAME_SIZE)?;
                body.u32(msg.checksum);
            }
            ServerMessage::RegistrationUnsuccessful | ServerMessage::GenericError => {}
        }

        let body = body.into_inner();
        // payloads are a few hundred bytes at most
        let header = ResponseHeader::new(self.code() as u16, body.len() as u32);

        let mut out = Writer::with_capacity(RESPONSE_HEADER_SIZE + body.len());
        out.bytes(&header.encode());
        out.bytes(&body);
        Ok(out.into_inner())
    }

    /// Encodes the message as a single fixed-size packet, right-padded with NUL bytes.
    pub fn to_packet(&self) -> Result<Vec<u8>, FrameError> {
        let mut packet = self.encode()?;
        if packet.len() > PACKET_SIZE {
            return Err(FrameError::ResponseTooLarge(packet.len()));
        }

        packet.resize(PACKET_SIZE, 0);
        Ok(packet)
    }

    /// Decodes a response from a received packet, ignoring the padding after the payload.
    pub fn decode(packet: &[u8]) -> Result<Self, FrameError> {
        let header = ResponseHeader::decode(packet)?;
        let code = ResponseCode::try_from(header.code)?;

        let mut reader = Reader::new(packet);
        reader.bytes(RESPONSE_HEADER_SIZE)?;
        let payload = reader.bytes(header.payload_size as usize)?;
        let mut reader = Reader::new(payload);

        let message = match code {
            ResponseCode::RegistrationSuccessful => ServerMessage::RegistrationSuccessful {
                client_id: reader.array()?,
            },
            ResponseCode::RegistrationUnsuccessful => ServerMessage::RegistrationUnsuccessful,
            ResponseCode::PublicKeyAccepted => ServerMessage::PublicKeyAccepted {
                client_id: reader.array()?,
                wrapped_key: reader.array()?,
            },
            ResponseCode::FileReceived => ServerMessage::FileReceived(FileReceived {
                client_id: reader.array()?,
                content_size: reader.u32()?,
                file_name: reader.padded_text(FILE_NAME_SIZE)?,
                checksum: reader.u32()?,
            }),
            ResponseCode::ConfirmedMessage => ServerMessage::ConfirmedMessage {
                client_id: reader.array()?,
            },
            ResponseCode::ReconnectSuccessful => ServerMessage::ReconnectSuccessful {
                client_id: reader.array()?,
                wrapped_key: reader.array()?,
            },
            ResponseCode::ReconnectFailed => ServerMessage::ReconnectFailed {
                client_id: reader.array()?,
            },
            ResponseCode::GenericError => ServerMessage::GenericError,
        };

        reader.finish()?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packets_are_padded_to_fixed_size() {
        let packet = ServerMessage::ConfirmedMessage { client_id: [5; 16] }.to_packet().unwrap();

        assert_eq!(packet.len(), PACKET_SIZE);
        assert_eq!(&packet[..7], &[3, 0x38, 0x08, 16, 0, 0, 0]);
        assert_eq!(&packet[7..23], &[5; 16]);
        assert!(packet[23..].iter().all(|b| *b == 0));
    }

    #[test]
    fn header_only_responses() {
        for msg in [ServerMessage::GenericError, ServerMessage::RegistrationUnsuccessful] {
            let encoded = msg.encode().unwrap();
            assert_eq!(encoded.len(), RESPONSE_HEADER_SIZE);
            assert_eq!(&encoded[3..], &[0, 0, 0, 0]);
            assert_eq!(ServerMessage::decode(&msg.to_packet().unwrap()).unwrap(), msg);
        }
    }

    #[test]
    fn file_received_layout() {
        let msg = ServerMessage::FileReceived(FileReceived {
            client_id: [1; 16],
            content_size: 10,
            file_name: "a.txt".into(),
            checksum: 0xCBF4_3926,
        });
        let encoded = msg.encode().unwrap();

        // 16 + 4 + 255 + 4
        assert_eq!(encoded.len(), RESPONSE_HEADER_SIZE + 279);
        assert_eq!(&encoded[3..7], &279u32.to_le_bytes());
        assert_eq!(&encoded[23..27], &[10, 0, 0, 0]);
        assert_eq!(&encoded[encoded.len() - 4..], &0xCBF4_3926u32.to_le_bytes());
        assert_eq!(ServerMessage::decode(&msg.to_packet().unwrap()).unwrap(), msg);
    }

    #[test]
    fn wrapped_key_responses() {
        let accepted = ServerMessage::PublicKeyAccepted {
            client_id: [2; 16],
            wrapped_key: [3; 128],
        };
        let encoded = accepted.encode().unwrap();
        assert_eq!(encoded.len(), RESPONSE_HEADER_SIZE + 144);
        assert_eq!(ServerMessage::decode(&encoded).unwrap(), accepted);

        let reconnected = ServerMessage::ReconnectSuccessful {
            client_id: [2; 16],
            wrapped_key: [3; 128],
        };
        assert_eq!(&reconnected.encode().unwrap()[1..3], &2105u16.to_le_bytes());
    }

    #[test]
    fn corrupt_packets_are_rejected() {
        assert!(matches!(
            ServerMessage::decode(&[3, 0x34, 0x08, 16, 0, 0, 0, 1, 2]),
            Err(FrameError::Truncated { .. })
        ));
        assert_eq!(
            ServerMessage::decode(&[3, 0, 0, 0, 0, 0, 0]),
            Err(FrameError::UnknownResponseCode(0))
        );
        assert_eq!(
            ServerMessage::decode(&[1, 0x3B, 0x08, 0, 0, 0, 0]),
            Err(FrameError::VersionMismatch(1))
        );
    }
}
