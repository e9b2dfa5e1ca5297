pub type ClientId = [u8; crate::constants::CLIENT_ID_SIZE];
pub type PublicKeyBytes = [u8; crate::constants::PUBLIC_KEY_SIZE];
pub type WrappedKey = [u8; crate::constants::WRAPPED_KEY_SIZE];
pub type SymmetricKey = [u8; crate::constants::SYMMETRIC_KEY_SIZE];
pub type Checksum = u32;
