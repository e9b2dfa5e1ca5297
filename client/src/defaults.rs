//! Contains the default values for the configuration and various constants.

/// Server address, user name and the path of the file to back up, one per line.
pub const TRANSFER_INFO_FILE: &str = "transfer.info";

/// Identity saved after the first registration: name, client id and the RSA private key.
pub const ME_INFO_FILE: &str = "me.info";

/// Longest user name accepted in the transfer info file.
pub const MAX_NAME_LENGTH: usize = 100;

/// Size of the RSA modulus. The server expects a 160 byte public key, which this produces.
pub const RSA_KEY_BITS: usize = 1024;

/// Public exponent of the generated RSA key.
pub const RSA_EXPONENT: u32 = 17;

/// How many times a file is sent before the upload is given up.
pub const MAX_SENDS: usize = 4;

/// How many times registration is attempted when the server answers with a generic error.
pub const REGISTRATION_ATTEMPTS: usize = 3;

/// Delay between registration attempts, in seconds.
pub const REGISTRATION_RETRY_DELAY: u64 = 1;
