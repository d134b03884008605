use crate::error::{Result, VortexError};
use crate::format::{Algorithm, CHUNK_SIZE, SALT_SIZE};
use crate::provider::{random_vec, CryptoProvider};
use crate::secret::{Secret, SecretArray};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::io::Read;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// PBKDF2 iteration count. Compatibility-relevant: changing it makes every
/// existing container underivable.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derived symmetric key size (AES-256 for both algorithms)
pub const KEY_SIZE: usize = 32;

/// Separator token between the password and the keyfile fingerprint in the
/// key-derivation input material. Compatibility-relevant.
const KEYFILE_SEPARATOR: &[u8] = b"::KEYFILE::";

/// SHA-256 digest of a byte buffer
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 digest rendered as lowercase hex
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Fingerprint of keyfile material: SHA-256 hex over at most the first
/// 64 MiB. Oversized keyfiles are truncated, matching what every existing
/// container was bound with.
pub fn keyfile_fingerprint(data: &[u8]) -> String {
    let bounded = &data[..data.len().min(CHUNK_SIZE)];
    sha256_hex(bounded)
}

/// Aggregate integrity digest: SHA-256 hex over the UTF-8 concatenation of
/// the ordered per-chunk hex digests. Recomputed on both the encrypt and
/// decrypt paths and surfaced to the caller; never stored in the container,
/// so it is an operator signal, not tamper evidence.
pub fn aggregate_digest(chunk_digests: &[String]) -> String {
    let joined: String = chunk_digests.concat();
    sha256_hex(joined.as_bytes())
}

/// Derive the 256-bit symmetric key from password, salt, and the optional
/// keyfile fingerprint.
///
/// PBKDF2-HMAC-SHA256 at [`PBKDF2_ITERATIONS`], expensive by design.
/// Deterministic: identical (password, keyfile, salt) always produce the
/// same key, which is what makes decryption possible at all.
pub fn derive_key(
    password: &Secret,
    salt: &[u8; SALT_SIZE],
    keyfile_hash: Option<&str>,
) -> SecretArray<KEY_SIZE> {
    // Assemble input material in a Secret so the concatenation is zeroized
    let material = password.expose(|pwd| {
        let mut bytes = Vec::with_capacity(
            pwd.len() + keyfile_hash.map_or(0, |h| KEYFILE_SEPARATOR.len() + h.len()),
        );
        bytes.extend_from_slice(pwd);
        if let Some(hash) = keyfile_hash {
            bytes.extend_from_slice(KEYFILE_SEPARATOR);
            bytes.extend_from_slice(hash.as_bytes());
        }
        Secret::new(bytes)
    });

    let mut key = [0u8; KEY_SIZE];
    material.expose(|input| {
        pbkdf2::pbkdf2_hmac::<Sha256>(input, salt, PBKDF2_ITERATIONS, &mut key);
    });
    SecretArray::new(key)
}

/// Encrypt one plaintext chunk, generating a fresh random nonce of the
/// length the algorithm requires.
///
/// Returns (ciphertext, nonce). Nonces MUST be unique per chunk under the
/// same key; the provider draws a fresh one on every call.
pub fn encrypt_chunk(
    provider: &dyn CryptoProvider,
    plaintext: &[u8],
    key: &SecretArray<KEY_SIZE>,
    algorithm: Algorithm,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let nonce = random_vec(provider, algorithm.nonce_len());

    let ciphertext = match algorithm {
        Algorithm::AesGcm => key.expose(|k| {
            let cipher = Aes256Gcm::new_from_slice(k)
                .map_err(|e| VortexError::Crypto(format!("Invalid key: {}", e)))?;
            cipher
                .encrypt(Nonce::from_slice(&nonce), plaintext)
                .map_err(|e| VortexError::Crypto(format!("Encryption failed: {}", e)))
        })?,
        Algorithm::AesCbc => key.expose(|k| {
            let cipher = Aes256CbcEnc::new_from_slices(k, &nonce)
                .map_err(|e| VortexError::Crypto(format!("Invalid key/IV: {}", e)))?;
            Ok::<_, VortexError>(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
        })?,
    };

    Ok((ciphertext, nonce))
}

/// Decrypt one ciphertext chunk.
///
/// AES-GCM verifies its tag: a wrong password, wrong keyfile, wrong assumed
/// algorithm, or corrupted bytes all surface as [`VortexError::Auth`].
/// AES-CBC has no authentication; corruption shows up as a padding error or
/// as garbage plaintext, a deliberately preserved weaker guarantee.
pub fn decrypt_chunk(
    ciphertext: &[u8],
    key: &SecretArray<KEY_SIZE>,
    nonce: &[u8],
    algorithm: Algorithm,
) -> Result<Vec<u8>> {
    if nonce.len() != algorithm.nonce_len() {
        return Err(VortexError::InvalidParameter(format!(
            "Nonce must be {} bytes for {:?}, got {}",
            algorithm.nonce_len(),
            algorithm,
            nonce.len()
        )));
    }

    match algorithm {
        Algorithm::AesGcm => key.expose(|k| {
            let cipher = Aes256Gcm::new_from_slice(k)
                .map_err(|e| VortexError::Crypto(format!("Invalid key: {}", e)))?;
            cipher
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| {
                    VortexError::Auth(
                        "AEAD tag verification failed: wrong password/keyfile or corrupted data"
                            .to_string(),
                    )
                })
        }),
        Algorithm::AesCbc => key.expose(|k| {
            let cipher = Aes256CbcDec::new_from_slices(k, nonce)
                .map_err(|e| VortexError::Crypto(format!("Invalid key/IV: {}", e)))?;
            cipher
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| VortexError::Crypto("Invalid CBC padding".to_string()))
        }),
    }
}

/// Compress a chunk with gzip
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(data, Compression::default());
    let mut compressed = Vec::new();
    encoder
        .read_to_end(&mut compressed)
        .map_err(|e| VortexError::Crypto(format!("Compression failed: {}", e)))?;
    Ok(compressed)
}

/// Decompress a gzip chunk
///
/// Fails with [`VortexError::Decode`] when the input is not valid gzip,
/// e.g. the compression flag was assumed incorrectly or the data is corrupt.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| VortexError::Decode(e.to_string()))?;
    Ok(decompressed)
}
