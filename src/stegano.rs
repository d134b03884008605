use crate::error::{Result, VortexError};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

/// Literal byte sequence separating a cover image from the embedded
/// container. Chosen (not cryptographically guaranteed) to be absent from
/// typical image payloads. Compatibility-relevant.
pub const DELIMITER: &[u8] = b"||VORTEX_SHIELD_PAYLOAD||";

/// Delimiter search inspects at most this much of a carrier (50 MiB).
/// Payloads whose cover pushes the delimiter past the window are
/// undetectable; covers are expected to be reasonably small images.
pub const SCAN_WINDOW: usize = 50 * 1024 * 1024;

/// Build a carrier in memory: cover bytes, then the delimiter, then the
/// container. The engine streams the same layout for large inputs; this
/// slice form serves small carriers and tests.
pub fn embed(cover: &[u8], container: &[u8]) -> Vec<u8> {
    let mut carrier = Vec::with_capacity(cover.len() + DELIMITER.len() + container.len());
    carrier.extend_from_slice(cover);
    carrier.extend_from_slice(DELIMITER);
    carrier.extend_from_slice(container);
    carrier
}

/// Locate the container inside a carrier slice: the offset just past the
/// first delimiter match within the scan window.
pub fn locate_in(carrier: &[u8]) -> Result<usize> {
    let window = &carrier[..carrier.len().min(SCAN_WINDOW)];
    find_delimiter(window, DELIMITER)
        .map(|idx| idx + DELIMITER.len())
        .ok_or(VortexError::PayloadNotFound)
}

/// Locate the container inside a carrier file. Reads at most
/// [`SCAN_WINDOW`] bytes from the front of the file.
pub async fn locate(path: &Path) -> Result<u64> {
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file).take(SCAN_WINDOW as u64);
    let mut window = Vec::new();
    reader.read_to_end(&mut window).await?;
    locate_in(&window).map(|offset| offset as u64)
}

/// Naive left-to-right byte scan. Restarting on mismatch is quadratic in
/// the worst case, but the delimiter's repeated-pipe prefix makes real
/// covers shallow to reject, and correctness over overlapping partial
/// matches is what matters here.
fn find_delimiter(buffer: &[u8], delimiter: &[u8]) -> Option<usize> {
    if delimiter.is_empty() || buffer.len() < delimiter.len() {
        return None;
    }
    (0..=buffer.len() - delimiter.len()).find(|&i| buffer[i..i + delimiter.len()] == *delimiter)
}
