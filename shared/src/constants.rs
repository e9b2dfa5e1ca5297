//! Shared constants for client and server.

/// The only protocol version the server accepts and emits.
pub const PROTOCOL_VERSION: u8 = 3;

/// Size of the client identifier carried in every request header.
pub const CLIENT_ID_SIZE: usize = 16;

/// Request header: client id, version, code and payload size.
pub const REQUEST_HEADER_SIZE: usize = CLIENT_ID_SIZE + RESPONSE_HEADER_SIZE; // 23 bytes

/// Response header: version, code and payload size.
pub const RESPONSE_HEADER_SIZE: usize = 1 + 2 + 4; // 7 bytes

/// Width of the NUL-padded client name field.
pub const NAME_SIZE: usize = 255;

/// Width of the NUL-padded file name field.
pub const FILE_NAME_SIZE: usize = 255;

/// Size of the DER encoded RSA public key sent by clients (1024-bit modulus, exponent 17).
pub const PUBLIC_KEY_SIZE: usize = 160;

/// Size of the symmetric key once wrapped with a 1024-bit RSA key.
pub const WRAPPED_KEY_SIZE: usize = 128;

/// AES-128 key size.
pub const SYMMETRIC_KEY_SIZE: usize = 16;

/// Every response is sent as exactly one packet of this size, padded with NUL bytes.
pub const PACKET_SIZE: usize = 2048;

/// Checksums are computed over chunks of this size.
pub const CHECKSUM_CHUNK_SIZE: usize = 1024 * 1024; // 1 MiB

/// Port used when no other configuration is present.
pub const DEFAULT_PORT: u16 = 1234;
