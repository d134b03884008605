use thiserror::Error;

/// Core error types for the VortexShield engine
#[derive(Debug, Error)]
pub enum VortexError {
    /// Magic signature mismatch: the input is not a VORTEX container
    #[error("Invalid container format: {0}")]
    Format(String),

    /// Version byte outside the supported set {1, 2}
    #[error("Unsupported container version: {0}")]
    UnsupportedVersion(u8),

    /// Declared data extends past the end of the stream
    #[error("Truncated container: {0}")]
    Truncated(String),

    /// Steganography delimiter absent within the scan window
    #[error("No steganography payload found")]
    PayloadNotFound,

    /// Container is keyfile-bound but no keyfile fingerprint was supplied
    #[error("Keyfile required for decryption")]
    KeyfileRequired,

    /// AEAD tag verification failed (wrong password/keyfile or corruption)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Decompression invoked on data that is not validly compressed
    #[error("Decompression failed: {0}")]
    Decode(String),

    /// Cryptographic operation error (cipher internals, CBC padding)
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Invalid parameter or state
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VortexError>;
