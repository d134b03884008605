//! VortexShield - Chunked File Encryption and Concealment Engine
//!
//! A streaming, async-first engine for encrypting, decrypting, and
//! concealing arbitrary files using:
//! - PBKDF2-HMAC-SHA256 key derivation from password and optional keyfile
//! - AES-256-GCM (authenticated) or AES-256-CBC chunk encryption
//! - A self-describing container format streamed in 64 MiB chunks
//! - Delimiter-based steganographic embedding inside a cover image
//!
//! # Security Notes
//! - Passwords and derived keys live in zeroize-on-drop `Secret` wrappers
//! - Every chunk gets a fresh random nonce; nonces are never reused under a key
//! - AES-CBC provides no authentication; wrong-key decryption surfaces as
//!   padding errors or garbage output, never as a verified failure
//! - The aggregate integrity digest is an operator signal, not stored in the
//!   container, and is not tamper evidence
//!
//! # Architecture
//! - `error`: error taxonomy and result alias
//! - `secret`: memory-safe secret wrappers
//! - `provider`: injected randomness capability
//! - `crypto`: hashing, key derivation, chunk ciphers, compression
//! - `format`: container header and chunk-frame codec
//! - `stegano`: cover-image delimiter locator
//! - `stream`: chunked cipher engine
//! - `worker`: background-task boundary with progress events
//!
//! # Example
//! ```rust,ignore
//! use vortex_shield::{Algorithm, Engine, EncryptOptions, NoProgress, Secret};
//!
//! let engine = Engine::with_os_rng();
//! let password = Secret::from_slice(b"correct horse battery staple");
//! let opts = EncryptOptions::new(Algorithm::AesGcm);
//! engine.encrypt("plans.pdf".as_ref(), "plans.pdf.vortex".as_ref(),
//!                &password, &opts, &NoProgress).await?;
//! ```

pub mod crypto;
pub mod error;
pub mod format;
pub mod provider;
pub mod secret;
pub mod stegano;
pub mod stream;
pub mod worker;

// Re-export commonly used types
pub use error::{Result, VortexError};
pub use format::{Algorithm, Header, Options, CHUNK_SIZE, MAGIC, VERSION, VERSION_LEGACY};
pub use provider::{CryptoProvider, OsRandom};
pub use secret::{Secret, SecretArray};
pub use stegano::{DELIMITER, SCAN_WINDOW};
pub use stream::{
    DecryptOptions, EncryptOptions, Engine, NoProgress, ProgressSink, StreamSummary,
};
pub use worker::{TaskEvent, TaskRequest};
