//! Streaming gzip of local extracts.

use crate::error::{SinkError, SinkResult};
use flate2::write::GzEncoder;
use flate2::Compression;
use frostline_protocol::defaults::COMPRESSED_SUFFIX;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

/// `extract.tsv` → `extract.tsv.gz`.
pub fn compressed_path(raw: &Path) -> PathBuf {
    let mut name = raw.as_os_str().to_os_string();
    name.push(COMPRESSED_SUFFIX);
    PathBuf::from(name)
}

/// Gzip `raw` into a sibling file with `.gz` appended and return its path.
///
/// The raw file is left in place.
pub fn gzip_file(raw: &Path) -> SinkResult<PathBuf> {
    let target = compressed_path(raw);

    let input = File::open(raw).map_err(|e| SinkError::io("open", raw, e))?;
    let output = File::create(&target).map_err(|e| SinkError::io("create", &target, e))?;

    let mut reader = BufReader::new(input);
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    let raw_bytes =
        io::copy(&mut reader, &mut encoder).map_err(|e| SinkError::io("compress", raw, e))?;

    let writer = encoder
        .finish()
        .map_err(|e| SinkError::io("finish", &target, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| SinkError::io("flush", &target, e.into_error()))?;
    file.sync_all()
        .map_err(|e| SinkError::io("sync", &target, e))?;

    debug!(
        raw = %raw.display(),
        compressed = %target.display(),
        raw_bytes,
        "Extract compressed"
    );
    Ok(target)
}

/// First 8 hex digits of the blake3 hash of the file at `path`.
pub fn file_digest(path: &Path) -> SinkResult<String> {
    let mut file = File::open(path).map_err(|e| SinkError::io("open", path, e))?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher).map_err(|e| SinkError::io("hash", path, e))?;
    let hex = hasher.finalize().to_hex();
    Ok(hex[..8].to_string())
}
