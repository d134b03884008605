use crate::error::{Result, VortexError};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Magic bytes identifying a VORTEX container
pub const MAGIC: [u8; 6] = *b"VORTEX";

/// Legacy container version: no options byte, implies no compression and no
/// keyfile binding. Must stay decodable forever.
pub const VERSION_LEGACY: u8 = 1;

/// Current container version: adds the options byte
pub const VERSION: u8 = 2;

/// Key-derivation salt size in bytes
pub const SALT_SIZE: usize = 16;

/// Version 1 header size: magic + version + algorithm + salt
pub const HEADER_SIZE_V1: usize = 24;

/// Version 2 header size: magic + version + algorithm + options + salt
pub const HEADER_SIZE_V2: usize = 25;

/// Plaintext chunk size ceiling (64 MiB). The final chunk may be shorter; a
/// chunk is never split across frames. Compatibility-relevant: it bounds a
/// single read's memory footprint on both sides.
pub const CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Upper bound on a declared frame ciphertext length. Cipher and gzip
/// overhead on an incompressible full chunk stays far below the slack;
/// anything larger is a corrupt or hostile length field.
pub const MAX_FRAME_LEN: usize = CHUNK_SIZE + CHUNK_SIZE / 16;

/// Cipher selection, encoded as one byte in the header.
///
/// The algorithm fixes the nonce length used by every chunk frame in the
/// container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// AES-256-GCM, authenticated (12-byte nonce)
    AesGcm,
    /// AES-256-CBC with PKCS#7 padding, confidentiality only (16-byte IV)
    AesCbc,
}

impl Algorithm {
    /// Wire identifier byte
    pub fn id(&self) -> u8 {
        match self {
            Algorithm::AesGcm => 1,
            Algorithm::AesCbc => 2,
        }
    }

    /// Decode the wire identifier
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            1 => Ok(Algorithm::AesGcm),
            2 => Ok(Algorithm::AesCbc),
            other => Err(VortexError::Format(format!(
                "Unknown algorithm id: {}",
                other
            ))),
        }
    }

    /// Per-chunk nonce/IV length in bytes
    pub fn nonce_len(&self) -> usize {
        match self {
            Algorithm::AesGcm => 12,
            Algorithm::AesCbc => 16,
        }
    }
}

/// Container options bitfield (version 2 only on the wire)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Every chunk is gzip-compressed before encryption
    pub compressed: bool,
    /// A keyfile fingerprint was mixed into key derivation; decryption
    /// without the same keyfile must fail fast
    pub keyfile_bound: bool,
}

impl Options {
    pub fn to_byte(&self) -> u8 {
        let mut byte = 0u8;
        if self.compressed {
            byte |= 1;
        }
        if self.keyfile_bound {
            byte |= 2;
        }
        byte
    }

    /// Decode the options byte. Unknown high bits are ignored so that a
    /// future minor extension does not break this reader.
    pub fn from_byte(byte: u8) -> Self {
        Self {
            compressed: byte & 1 != 0,
            keyfile_bound: byte & 2 != 0,
        }
    }
}

/// Normalized container descriptor.
///
/// Wire layout:
/// - v1 (24 bytes): MAGIC(6) VERSION(1=0x01) ALGO(1) SALT(16)
/// - v2 (25 bytes): MAGIC(6) VERSION(1=0x02) ALGO(1) OPTIONS(1) SALT(16)
///
/// The raw version byte is inspected exactly once, here; everything
/// downstream operates on this descriptor. Version 1 normalizes to
/// "no compression, no keyfile".
#[derive(Debug, Clone)]
pub struct Header {
    /// Container version as read from (or written to) the wire
    pub version: u8,

    /// Cipher for every chunk in this container
    pub algorithm: Algorithm,

    /// Normalized options (defaulted for version 1)
    pub options: Options,

    /// Random per-encryption salt for key derivation
    pub salt: [u8; SALT_SIZE],
}

impl Header {
    /// Create a header for a new container. New containers are always
    /// written at the current version.
    pub fn new(algorithm: Algorithm, options: Options, salt: [u8; SALT_SIZE]) -> Self {
        Self {
            version: VERSION,
            algorithm,
            options,
            salt,
        }
    }

    /// Encoded header length in bytes
    pub fn encoded_len(&self) -> usize {
        match self.version {
            VERSION_LEGACY => HEADER_SIZE_V1,
            _ => HEADER_SIZE_V2,
        }
    }

    /// Nonce length of every chunk frame in this container
    pub fn nonce_len(&self) -> usize {
        self.algorithm.nonce_len()
    }

    /// Serialize the header (current version, exactly 25 bytes)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE_V2);
        buf.extend_from_slice(&MAGIC);
        buf.push(VERSION);
        buf.push(self.algorithm.id());
        buf.push(self.options.to_byte());
        buf.extend_from_slice(&self.salt);
        buf
    }

    /// Parse a header from the start of `bytes`. Trailing bytes beyond the
    /// header are ignored; `encoded_len()` on the result tells the caller
    /// where the first chunk frame begins.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(VortexError::Truncated(
                "Header shorter than required".to_string(),
            ));
        }

        if bytes[..6] != MAGIC {
            return Err(VortexError::Format(
                "Magic signature mismatch".to_string(),
            ));
        }

        let version = bytes[6];
        let algorithm = Algorithm::from_id(bytes[7])?;

        match version {
            VERSION_LEGACY => {
                if bytes.len() < HEADER_SIZE_V1 {
                    return Err(VortexError::Truncated(
                        "Header shorter than required".to_string(),
                    ));
                }
                let mut salt = [0u8; SALT_SIZE];
                salt.copy_from_slice(&bytes[8..24]);
                Ok(Self {
                    version,
                    algorithm,
                    options: Options::default(),
                    salt,
                })
            }
            VERSION => {
                if bytes.len() < HEADER_SIZE_V2 {
                    return Err(VortexError::Truncated(
                        "Header shorter than required".to_string(),
                    ));
                }
                let options = Options::from_byte(bytes[8]);
                let mut salt = [0u8; SALT_SIZE];
                salt.copy_from_slice(&bytes[9..25]);
                Ok(Self {
                    version,
                    algorithm,
                    options,
                    salt,
                })
            }
            other => Err(VortexError::UnsupportedVersion(other)),
        }
    }

    /// Read and parse a header from an async stream
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE_V2];

        // Fixed prefix: magic + version + algorithm id
        reader
            .read_exact(&mut buf[..8])
            .await
            .map_err(map_eof_truncated)?;

        if buf[..6] != MAGIC {
            return Err(VortexError::Format(
                "Magic signature mismatch".to_string(),
            ));
        }
        let rest = match buf[6] {
            VERSION_LEGACY => HEADER_SIZE_V1,
            VERSION => HEADER_SIZE_V2,
            other => return Err(VortexError::UnsupportedVersion(other)),
        };
        reader
            .read_exact(&mut buf[8..rest])
            .await
            .map_err(map_eof_truncated)?;

        Self::from_bytes(&buf[..rest])
    }
}

/// One decoded chunk frame, or the normal end of the stream
#[derive(Debug)]
pub enum Frame {
    Data { nonce: Vec<u8>, ciphertext: Vec<u8> },
    End,
}

/// Encode one chunk frame: LENGTH(4, big-endian, ciphertext only) then
/// nonce, then ciphertext.
pub fn write_frame(ciphertext: &[u8], nonce: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + nonce.len() + ciphertext.len());
    buf.extend_from_slice(&(ciphertext.len() as u32).to_be_bytes());
    buf.extend_from_slice(nonce);
    buf.extend_from_slice(ciphertext);
    buf
}

/// Read the next chunk frame.
///
/// Fewer than 4 bytes remaining at a frame boundary is [`Frame::End`], the
/// normal loop-exit condition. A short nonce or ciphertext after a complete
/// length field means the container was cut off mid-frame and is an error.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R, nonce_len: usize) -> Result<Frame> {
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    if filled < 4 {
        return Ok(Frame::End);
    }

    let length = u32::from_be_bytes(len_buf) as usize;
    if length > MAX_FRAME_LEN {
        return Err(VortexError::Truncated(format!(
            "Declared chunk length {} exceeds frame ceiling",
            length
        )));
    }

    let mut nonce = vec![0u8; nonce_len];
    reader
        .read_exact(&mut nonce)
        .await
        .map_err(map_eof_truncated)?;

    let mut ciphertext = vec![0u8; length];
    reader
        .read_exact(&mut ciphertext)
        .await
        .map_err(map_eof_truncated)?;

    Ok(Frame::Data { nonce, ciphertext })
}

fn map_eof_truncated(err: std::io::Error) -> VortexError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        VortexError::Truncated("Stream ended inside a declared field".to_string())
    } else {
        VortexError::Io(err)
    }
}
