//! Wire protocol shared by the backup server and its client.
//!
//! Requests start with a 23 byte header carrying the client id, responses with a 7 byte header.
//! All integers are little-endian and text fields are fixed-width, NUL-padded buffers.

pub mod checksum;
pub mod client_message;
pub mod constants;
pub mod frame;
pub mod server_message;
pub mod types;
