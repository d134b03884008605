use crate::crypto;
use crate::error::{Result, VortexError};
use crate::format::{self, Frame, Header, Options, CHUNK_SIZE, SALT_SIZE};
use crate::provider::{random_array, CryptoProvider, OsRandom};
use crate::secret::Secret;
use crate::stegano;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info};

pub use crate::format::Algorithm;

/// Receives progress percentages while an operation streams.
///
/// Reported values are monotonically non-decreasing, capped at 99 until
/// finalization, then exactly one 100 on success.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8);
}

/// Sink that discards progress
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8) {}
}

/// Encryption parameters for one operation
pub struct EncryptOptions {
    /// Cipher for every chunk of the container
    pub algorithm: Algorithm,
    /// Gzip every chunk before encryption
    pub compress: bool,
    /// Keyfile fingerprint mixed into key derivation
    pub keyfile_hash: Option<String>,
    /// Cover image to prepend; the container is embedded after the
    /// steganography delimiter
    pub cover: Option<PathBuf>,
}

impl EncryptOptions {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            compress: false,
            keyfile_hash: None,
            cover: None,
        }
    }
}

/// Decryption parameters for one operation
#[derive(Default)]
pub struct DecryptOptions {
    /// Keyfile fingerprint, required when the container is keyfile-bound
    pub keyfile_hash: Option<String>,
    /// Scan for the steganography delimiter before the header
    pub stegano: bool,
}

/// Result of a completed streaming operation
#[derive(Debug)]
pub struct StreamSummary {
    /// Aggregate integrity digest (hex) over the ordered per-chunk
    /// plaintext digests; an operator trust signal, not tamper evidence
    pub digest: String,
    /// Bytes written to the destination
    pub bytes_written: u64,
    /// Number of chunks processed
    pub chunks: u64,
}

/// Chunked cipher engine.
///
/// Stateless per invocation: every operation derives its own key material
/// and owns its own buffers, so independent tasks may run on separate
/// engine clones concurrently. Randomness comes only from the injected
/// [`CryptoProvider`].
#[derive(Clone)]
pub struct Engine {
    provider: Arc<dyn CryptoProvider>,
}

impl Engine {
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self { provider }
    }

    /// Engine backed by the operating system RNG
    pub fn with_os_rng() -> Self {
        Self::new(Arc::new(OsRandom))
    }

    /// Encrypt `source` into a container at `dest`.
    ///
    /// The container only materializes at `dest` when the whole stream has
    /// been encrypted and fsynced; any failure leaves no partial output.
    pub async fn encrypt(
        &self,
        source: &Path,
        dest: &Path,
        password: &Secret,
        opts: &EncryptOptions,
        progress: &dyn ProgressSink,
    ) -> Result<StreamSummary> {
        let total = tokio::fs::metadata(source).await?.len();

        let salt = random_array::<SALT_SIZE>(self.provider.as_ref());
        let key = crypto::derive_key(password, &salt, opts.keyfile_hash.as_deref());

        let source_file = File::open(source).await.map_err(|e| {
            VortexError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open source file: {}", e),
            ))
        })?;
        let mut reader = BufReader::new(source_file);

        let mut out = AtomicFile::create(dest).await?;
        let mut bytes_written: u64 = 0;

        if let Some(cover) = &opts.cover {
            let mut cover_reader = File::open(cover).await.map_err(|e| {
                VortexError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to open cover file: {}", e),
                ))
            })?;
            bytes_written += tokio::io::copy(&mut cover_reader, &mut out.writer).await?;
            out.writer.write_all(stegano::DELIMITER).await?;
            bytes_written += stegano::DELIMITER.len() as u64;
        }

        let header = Header::new(
            opts.algorithm,
            Options {
                compressed: opts.compress,
                keyfile_bound: opts.keyfile_hash.is_some(),
            },
            salt,
        );
        let header_bytes = header.to_bytes();
        out.writer.write_all(&header_bytes).await?;
        bytes_written += header_bytes.len() as u64;

        let mut chunk_digests: Vec<String> = Vec::new();
        let mut buffer = vec![0u8; CHUNK_SIZE.min(total.max(1) as usize)];
        let mut bytes_read: u64 = 0;

        loop {
            let n = fill_chunk(&mut reader, &mut buffer).await?;
            if n == 0 {
                break;
            }
            let chunk = &buffer[..n];

            chunk_digests.push(crypto::sha256_hex(chunk));

            let processed = if opts.compress {
                crypto::compress(chunk)?
            } else {
                chunk.to_vec()
            };

            let (ciphertext, nonce) =
                crypto::encrypt_chunk(self.provider.as_ref(), &processed, &key, opts.algorithm)?;
            let frame = format::write_frame(&ciphertext, &nonce);
            out.writer.write_all(&frame).await?;
            bytes_written += frame.len() as u64;
            bytes_read += n as u64;

            debug!(
                chunk = chunk_digests.len(),
                plaintext_bytes = n,
                frame_bytes = frame.len(),
                "chunk encrypted"
            );
            report_percent(progress, bytes_read, total);

            // Keep a long stream cooperative with the rest of the runtime
            tokio::task::yield_now().await;
        }

        let digest = crypto::aggregate_digest(&chunk_digests);
        out.commit(dest).await?;
        progress.report(100);

        info!(
            chunks = chunk_digests.len(),
            bytes_written, "encryption complete"
        );

        Ok(StreamSummary {
            digest,
            bytes_written,
            chunks: chunk_digests.len() as u64,
        })
    }

    /// Decrypt the container at `source` into `dest`.
    ///
    /// With `opts.stegano` set, the header is located behind the delimiter
    /// scan first. Keyfile-bound containers fail fast with
    /// [`VortexError::KeyfileRequired`] before any key derivation.
    pub async fn decrypt(
        &self,
        source: &Path,
        dest: &Path,
        password: &Secret,
        opts: &DecryptOptions,
        progress: &dyn ProgressSink,
    ) -> Result<StreamSummary> {
        let total = tokio::fs::metadata(source).await?.len();

        let payload_offset = if opts.stegano {
            stegano::locate(source).await?
        } else {
            0
        };

        let mut source_file = File::open(source).await.map_err(|e| {
            VortexError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open source file: {}", e),
            ))
        })?;
        if payload_offset > 0 {
            source_file
                .seek(std::io::SeekFrom::Start(payload_offset))
                .await?;
        }
        let mut reader = BufReader::new(source_file);

        let header = Header::read_from(&mut reader).await?;
        if header.options.keyfile_bound && opts.keyfile_hash.is_none() {
            return Err(VortexError::KeyfileRequired);
        }

        let key = crypto::derive_key(password, &header.salt, opts.keyfile_hash.as_deref());

        let mut out = AtomicFile::create(dest).await?;
        let mut chunk_digests: Vec<String> = Vec::new();
        let mut bytes_written: u64 = 0;
        // Progress tracks consumed carrier bytes past the payload offset
        let mut consumed = header.encoded_len() as u64;
        let denominator = total.saturating_sub(payload_offset);

        loop {
            let (nonce, ciphertext) = match format::read_frame(&mut reader, header.nonce_len())
                .await?
            {
                Frame::Data { nonce, ciphertext } => (nonce, ciphertext),
                Frame::End => break,
            };
            consumed += (4 + nonce.len() + ciphertext.len()) as u64;

            let decrypted = crypto::decrypt_chunk(&ciphertext, &key, &nonce, header.algorithm)?;
            let plaintext = if header.options.compressed {
                crypto::decompress(&decrypted)?
            } else {
                decrypted
            };

            chunk_digests.push(crypto::sha256_hex(&plaintext));
            out.writer.write_all(&plaintext).await?;
            bytes_written += plaintext.len() as u64;

            debug!(
                chunk = chunk_digests.len(),
                plaintext_bytes = plaintext.len(),
                "chunk decrypted"
            );
            report_percent(progress, consumed, denominator);

            tokio::task::yield_now().await;
        }

        let digest = crypto::aggregate_digest(&chunk_digests);
        out.commit(dest).await?;
        progress.report(100);

        info!(
            chunks = chunk_digests.len(),
            bytes_written, "decryption complete"
        );

        Ok(StreamSummary {
            digest,
            bytes_written,
            chunks: chunk_digests.len() as u64,
        })
    }
}

/// Destination file that only appears once the whole stream committed.
/// Dropping it without `commit` removes the temporary file.
struct AtomicFile {
    temp: tempfile::TempPath,
    writer: BufWriter<File>,
}

impl AtomicFile {
    async fn create(dest: &Path) -> Result<Self> {
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let temp = tempfile::NamedTempFile::new_in(parent)?.into_temp_path();
        let file = File::create(&temp).await?;
        Ok(Self {
            temp,
            writer: BufWriter::new(file),
        })
    }

    /// Flush, fsync, and atomically rename onto `dest`
    async fn commit(self, dest: &Path) -> Result<()> {
        let Self { temp, mut writer } = self;
        writer.flush().await?;
        let file = writer.into_inner();
        file.sync_all().await?;
        drop(file);
        temp.persist(dest)
            .map_err(|e| VortexError::Io(e.error))?;
        Ok(())
    }
}

/// Read until `buf` is full or the stream ends; returns the filled length
async fn fill_chunk<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn report_percent(progress: &dyn ProgressSink, done: u64, total: u64) {
    if total == 0 {
        return;
    }
    let percent = ((done as u128 * 100) / total as u128).min(99) as u8;
    progress.report(percent);
}
