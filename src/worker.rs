use crate::crypto;
use crate::error::Result;
use crate::format::CHUNK_SIZE;
use crate::secret::Secret;
use crate::stream::{Algorithm, DecryptOptions, EncryptOptions, Engine, ProgressSink};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{error, info};

/// Suffix appended to encrypted output names
pub const ENCRYPTED_SUFFIX: &str = ".vortex";

/// Output name for steganographic extraction; the original name is not
/// recoverable from a carrier
pub const STEGANO_OUTPUT_NAME: &str = "revealed_payload";

/// Suffixes stripped when recovering a working name on decryption: the real
/// container suffix plus the camouflage extensions offered on encryption
const KNOWN_SUFFIXES: &[&str] = &[".vortex", ".dll", ".sys", ".dat", ".tmp", ".ini", ".bin"];

/// One unit of work handed off from the interactive surface
pub enum TaskRequest {
    Encrypt(EncryptRequest),
    Decrypt(DecryptRequest),
}

pub struct EncryptRequest {
    /// Plaintext input
    pub source: PathBuf,
    /// Directory the output lands in; the file name follows the naming policy
    pub dest_dir: PathBuf,
    pub password: Secret,
    pub algorithm: Algorithm,
    /// Cover image for steganographic embedding
    pub cover: Option<PathBuf>,
    /// Keyfile fingerprint (see [`hash_keyfile`])
    pub keyfile_hash: Option<String>,
    pub compress: bool,
    /// Fake extension replacing the container suffix in the output name
    pub camouflage_ext: Option<String>,
    /// Overrides the source file name as the naming base
    pub explicit_name: Option<String>,
}

pub struct DecryptRequest {
    /// Container or carrier input
    pub source: PathBuf,
    pub dest_dir: PathBuf,
    pub password: Secret,
    pub keyfile_hash: Option<String>,
    /// Scan for the steganography delimiter before the header
    pub stegano: bool,
    /// Name the container was stored under, used to recover a working name
    pub original_name: String,
}

/// Events reported back to the caller: zero or more progress updates, then
/// exactly one terminal event.
#[derive(Debug)]
pub enum TaskEvent {
    /// Percentage of the stream processed, 0–99
    Progress(u8),
    Complete {
        path: PathBuf,
        file_name: String,
        /// Operator log line carrying the aggregate integrity digest
        log: String,
    },
    Failed {
        reason: String,
    },
}

struct ChannelSink(UnboundedSender<TaskEvent>);

impl ProgressSink for ChannelSink {
    fn report(&self, percent: u8) {
        if percent < 100 {
            let _ = self.0.send(TaskEvent::Progress(percent));
        }
    }
}

/// Run a task on a background tokio task and stream its events.
///
/// The receiver yields progress events followed by one terminal event, then
/// closes. Abandoning the receiver abandons the task's results; keys and
/// buffers are released when the task's scope exits.
pub fn spawn(engine: Engine, request: TaskRequest) -> UnboundedReceiver<TaskEvent> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        run(&engine, request, &tx).await;
    });
    rx
}

/// Run one task to its terminal event on the current task
pub async fn run(engine: &Engine, request: TaskRequest, events: &UnboundedSender<TaskEvent>) {
    match execute(engine, request, events).await {
        Ok((path, file_name, log)) => {
            info!(file = %file_name, "task complete");
            let _ = events.send(TaskEvent::Complete {
                path,
                file_name,
                log,
            });
        }
        Err(err) => {
            error!(%err, "task failed");
            let _ = events.send(TaskEvent::Failed {
                reason: err.to_string(),
            });
        }
    }
}

/// Run a batch sequentially. Every file is isolated: a failure emits that
/// file's terminal event and the batch moves on to the next request.
pub async fn run_batch(
    engine: &Engine,
    requests: Vec<TaskRequest>,
    events: &UnboundedSender<TaskEvent>,
) {
    for request in requests {
        run(engine, request, events).await;
    }
}

/// Fingerprint a keyfile: SHA-256 hex over at most its first 64 MiB
pub async fn hash_keyfile(path: &Path) -> Result<String> {
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file).take(CHUNK_SIZE as u64);
    let mut data = Vec::new();
    reader.read_to_end(&mut data).await?;
    Ok(crypto::keyfile_fingerprint(&data))
}

async fn execute(
    engine: &Engine,
    request: TaskRequest,
    events: &UnboundedSender<TaskEvent>,
) -> Result<(PathBuf, String, String)> {
    let sink = ChannelSink(events.clone());

    match request {
        TaskRequest::Encrypt(req) => {
            let file_name = encrypt_output_name(&req);
            let dest = req.dest_dir.join(&file_name);
            let opts = EncryptOptions {
                algorithm: req.algorithm,
                compress: req.compress,
                keyfile_hash: req.keyfile_hash.clone(),
                cover: req.cover.clone(),
            };
            let summary = engine
                .encrypt(&req.source, &dest, &req.password, &opts, &sink)
                .await?;
            let log = format!("INTEGRITY CHECK PASSED [HASH:{}]", &summary.digest[..8]);
            Ok((dest, file_name, log))
        }
        TaskRequest::Decrypt(req) => {
            let file_name = decrypt_output_name(&req.original_name, req.stegano);
            let dest = req.dest_dir.join(&file_name);
            let opts = DecryptOptions {
                keyfile_hash: req.keyfile_hash.clone(),
                stegano: req.stegano,
            };
            let summary = engine
                .decrypt(&req.source, &dest, &req.password, &opts, &sink)
                .await?;
            let log = format!("INTEGRITY VERIFIED [HASH:{}]", &summary.digest[..8]);
            Ok((dest, file_name, log))
        }
    }
}

/// Naming policy for encryption output.
///
/// Default appends the container suffix; a cover derives the name from the
/// cover image; a camouflage extension replaces the container suffix.
fn encrypt_output_name(req: &EncryptRequest) -> String {
    if let Some(cover) = &req.cover {
        let cover_name = cover
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cover".to_string());
        return format!("camouflaged_{}", cover_name);
    }

    let mut name = req
        .explicit_name
        .clone()
        .or_else(|| {
            req.source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "encrypted_data".to_string());

    if !name.ends_with(ENCRYPTED_SUFFIX) {
        name.push_str(ENCRYPTED_SUFFIX);
    }

    if let Some(ext) = &req.camouflage_ext {
        name.truncate(name.len() - ENCRYPTED_SUFFIX.len());
        if !ext.starts_with('.') {
            name.push('.');
        }
        name.push_str(ext);
    }

    name
}

/// Naming policy for decryption output: strip the container suffix and any
/// camouflage extensions; steganographic extraction uses a fixed name.
fn decrypt_output_name(original_name: &str, stegano: bool) -> String {
    if stegano {
        return STEGANO_OUTPUT_NAME.to_string();
    }

    let mut name = original_name.to_string();
    loop {
        let stripped = KNOWN_SUFFIXES
            .iter()
            .find(|suffix| name.len() > suffix.len() && name.ends_with(*suffix));
        match stripped {
            Some(suffix) => name.truncate(name.len() - suffix.len()),
            None => break,
        }
    }

    if name.is_empty() {
        "decrypted_data".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypt_request(dir: &Path) -> EncryptRequest {
        EncryptRequest {
            source: dir.join("notes.txt"),
            dest_dir: dir.to_path_buf(),
            password: Secret::from_slice(b"p@ss1"),
            algorithm: Algorithm::AesGcm,
            cover: None,
            keyfile_hash: None,
            compress: false,
            camouflage_ext: None,
            explicit_name: None,
        }
    }

    async fn collect(mut rx: UnboundedReceiver<TaskEvent>) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_encrypt_name_appends_suffix() {
        let req = encrypt_request(Path::new("/tmp"));
        assert_eq!(encrypt_output_name(&req), "notes.txt.vortex");
    }

    #[test]
    fn test_encrypt_name_prefers_explicit_name() {
        let mut req = encrypt_request(Path::new("/tmp"));
        req.explicit_name = Some("renamed".to_string());
        assert_eq!(encrypt_output_name(&req), "renamed.vortex");
    }

    #[test]
    fn test_encrypt_name_from_cover() {
        let mut req = encrypt_request(Path::new("/tmp"));
        req.cover = Some(PathBuf::from("/covers/sunset.png"));
        assert_eq!(encrypt_output_name(&req), "camouflaged_sunset.png");
    }

    #[test]
    fn test_encrypt_name_camouflage_replaces_suffix() {
        let mut req = encrypt_request(Path::new("/tmp"));
        req.camouflage_ext = Some("dll".to_string());
        assert_eq!(encrypt_output_name(&req), "notes.txt.dll");

        req.camouflage_ext = Some(".sys".to_string());
        assert_eq!(encrypt_output_name(&req), "notes.txt.sys");
    }

    #[test]
    fn test_decrypt_name_strips_known_suffixes() {
        assert_eq!(decrypt_output_name("notes.txt.vortex", false), "notes.txt");
        assert_eq!(decrypt_output_name("notes.txt.dll", false), "notes.txt");
        assert_eq!(decrypt_output_name("plain.txt", false), "plain.txt");
    }

    #[test]
    fn test_decrypt_name_stego_is_fixed() {
        assert_eq!(
            decrypt_output_name("camouflaged_sunset.png", true),
            STEGANO_OUTPUT_NAME
        );
    }

    #[tokio::test]
    async fn test_spawned_task_streams_progress_then_terminal() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"task boundary test")
            .await
            .unwrap();

        let events = collect(spawn(
            Engine::with_os_rng(),
            TaskRequest::Encrypt(encrypt_request(dir.path())),
        ))
        .await;

        let (last, progress) = events.split_last().unwrap();
        for event in progress {
            match event {
                TaskEvent::Progress(p) => assert!(*p <= 99),
                other => panic!("unexpected mid-stream event: {:?}", other),
            }
        }
        match last {
            TaskEvent::Complete {
                path,
                file_name,
                log,
            } => {
                assert_eq!(file_name, "notes.txt.vortex");
                assert!(path.exists());
                assert!(log.starts_with("INTEGRITY CHECK PASSED [HASH:"));
            }
            other => panic!("expected Complete, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_encrypt_then_decrypt_through_boundary() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"round trip")
            .await
            .unwrap();

        let engine = Engine::with_os_rng();
        let events = collect(spawn(
            engine.clone(),
            TaskRequest::Encrypt(encrypt_request(dir.path())),
        ))
        .await;
        assert!(matches!(events.last(), Some(TaskEvent::Complete { .. })));

        let events = collect(spawn(
            engine,
            TaskRequest::Decrypt(DecryptRequest {
                source: dir.path().join("notes.txt.vortex"),
                dest_dir: dir.path().to_path_buf(),
                password: Secret::from_slice(b"p@ss1"),
                keyfile_hash: None,
                stegano: false,
                original_name: "notes.txt.vortex".to_string(),
            }),
        ))
        .await;

        match events.last().unwrap() {
            TaskEvent::Complete {
                path,
                file_name,
                log,
            } => {
                assert_eq!(file_name, "notes.txt");
                assert!(log.starts_with("INTEGRITY VERIFIED [HASH:"));
                assert_eq!(
                    tokio::fs::read(path).await.unwrap(),
                    b"round trip"
                );
            }
            other => panic!("expected Complete, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_is_terminal_event_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = encrypt_request(dir.path());
        request.source = dir.path().join("does-not-exist.txt");

        let events = collect(spawn(Engine::with_os_rng(), TaskRequest::Encrypt(request))).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events.last(), Some(TaskEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"second file survives")
            .await
            .unwrap();

        let mut broken = encrypt_request(dir.path());
        broken.source = dir.path().join("missing.txt");
        let good = encrypt_request(dir.path());

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let engine = Engine::with_os_rng();
        run_batch(
            &engine,
            vec![TaskRequest::Encrypt(broken), TaskRequest::Encrypt(good)],
            &tx,
        )
        .await;
        drop(tx);

        let events = collect(rx).await;
        let terminals: Vec<_> = events
            .iter()
            .filter(|e| !matches!(e, TaskEvent::Progress(_)))
            .collect();
        assert_eq!(terminals.len(), 2);
        assert!(matches!(terminals[0], TaskEvent::Failed { .. }));
        assert!(matches!(terminals[1], TaskEvent::Complete { .. }));
    }

    #[tokio::test]
    async fn test_hash_keyfile_matches_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.bin");
        tokio::fs::write(&path, b"keyfile material").await.unwrap();

        assert_eq!(
            hash_keyfile(&path).await.unwrap(),
            crypto::keyfile_fingerprint(b"keyfile material")
        );
    }
}
