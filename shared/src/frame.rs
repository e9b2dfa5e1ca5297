//! Frame headers and the bounds-checked cursor used to lay out every message body.
//!
//! Message types describe their layout as an ordered sequence of [`Reader`] / [`Writer`] calls.
//! Any read past the end of the buffer, trailing data or oversized field is reported as a
//! [`FrameError`] instead of panicking.

use crate::{
    constants::{CLIENT_ID_SIZE, PROTOCOL_VERSION, REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE},
    types::ClientId,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated: {needed} bytes needed, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("unsupported protocol version {0}")]
    VersionMismatch(u8),
    #[error("request declares an empty payload")]
    EmptyPayload,
    #[error("payload size mismatch: header declares {declared} bytes, got {actual}")]
    PayloadSizeMismatch { declared: usize, actual: usize },
    #[error("{0} unexpected trailing bytes after the last field")]
    TrailingBytes(usize),
    #[error("field of {len} bytes does not fit into its {max} byte slot")]
    FieldTooLong { len: usize, max: usize },
    #[error("text field is not valid UTF-8")]
    InvalidText,
    #[error("unknown request code {0}")]
    UnknownRequestCode(u16),
    #[error("unknown response code {0}")]
    UnknownResponseCode(u16),
    #[error("response of {0} bytes does not fit into a single packet")]
    ResponseTooLarge(usize),
}

/// Cursor over a received buffer. Every accessor checks bounds before slicing.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], FrameError> {
        let end = self.pos.checked_add(len).ok_or(FrameError::Truncated {
            needed: usize::MAX,
            available: self.buf.len(),
        })?;

        if end > self.buf.len() {
            return Err(FrameError::Truncated {
                needed: end,
                available: self.buf.len(),
            });
        }

        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], FrameError> {
        let mut out = [0; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, FrameError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, FrameError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, FrameError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Reads a NUL-padded text field of `width` bytes, returning the text up to the first NUL.
    pub fn padded_text(&mut self, width: usize) -> Result<String, FrameError> {
        let field = self.bytes(width)?;
        let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());

        std::str::from_utf8(&field[..end])
            .map(str::to_owned)
            .map_err(|_| FrameError::InvalidText)
    }

    /// Ensures the whole buffer was consumed.
    pub fn finish(self) -> Result<(), FrameError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(FrameError::TrailingBytes(n)),
        }
    }
}

/// Append-only counterpart of [`Reader`].
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn u16(&mut self, value: u16) {
        self.bytes(&value.to_le_bytes());
    }

    pub fn u32(&mut self, value: u32) {
        self.bytes(&value.to_le_bytes());
    }

    /// Writes `data` into a field of exactly `width` bytes, padding the rest with NUL.
    pub fn padded(&mut self, data: &[u8], width: usize) -> Result<(), FrameError> {
        if data.len() > width {
            return Err(FrameError::FieldTooLong { len: data.len(), max: width });
        }

        self.bytes(data);
        self.buf.resize(self.buf.len() + width - data.len(), 0);
        Ok(())
    }

    pub fn padded_text(&mut self, text: &str, width: usize) -> Result<(), FrameError> {
        self.padded(text.as_bytes(), width)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub client_id: ClientId,
    pub version: u8,
    pub code: u16,
    pub payload_size: u32,
}

impl RequestHeader {
    pub fn new(client_id: ClientId, code: u16, payload_size: u32) -> Self {
        Self {
            client_id,
            version: PROTOCOL_VERSION,
            code,
            payload_size,
        }
    }

    pub fn encode(&self) -> [u8; REQUEST_HEADER_SIZE] {
        let mut out = [0; REQUEST_HEADER_SIZE];
        out[..CLIENT_ID_SIZE].copy_from_slice(&self.client_id);
        out[CLIENT_ID_SIZE] = self.version;
        out[CLIENT_ID_SIZE + 1..CLIENT_ID_SIZE + 3].copy_from_slice(&self.code.to_le_bytes());
        out[CLIENT_ID_SIZE + 3..].copy_from_slice(&self.payload_size.to_le_bytes());
        out
    }

    /// Parses the raw header fields without judging them.
    ///
    /// The connection loop needs the declared payload size even for headers it will reject,
    /// so it can keep the stream in sync.
    pub fn parse(buf: &[u8]) -> Result<Self, FrameError> {
        let mut reader = Reader::new(buf);

        Ok(Self {
            client_id: reader.array()?,
            version: reader.u8()?,
            code: reader.u16()?,
            payload_size: reader.u32()?,
        })
    }

    pub fn validate(&self) -> Result<(), FrameError> {
        if self.version != PROTOCOL_VERSION {
            return Err(FrameError::VersionMismatch(self.version));
        }
        if self.payload_size == 0 {
            return Err(FrameError::EmptyPayload);
        }

        Ok(())
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let header = Self::parse(buf)?;
        header.validate()?;
        Ok(header)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub version: u8,
    pub code: u16,
    pub payload_size: u32,
}

impl ResponseHeader {
    pub fn new(code: u16, payload_size: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            code,
            payload_size,
        }
    }

    pub fn encode(&self) -> [u8; RESPONSE_HEADER_SIZE] {
        let mut out = [0; RESPONSE_HEADER_SIZE];
        out[0] = self.version;
        out[1..3].copy_from_slice(&self.code.to_le_bytes());
        out[3..].copy_from_slice(&self.payload_size.to_le_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let mut reader = Reader::new(buf);
        let header = Self {
            version: reader.u8()?,
            code: reader.u16()?,
            payload_size: reader.u32()?,
        };

        if header.version != PROTOCOL_VERSION {
            return Err(FrameError::VersionMismatch(header.version));
        }

        Ok(header)
    }
}
