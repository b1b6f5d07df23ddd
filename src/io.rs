// File-oriented helpers for the CLI.
//
// The decoder itself is a pure function over byte slices; this layer
// reads whole files, decodes, and reports statistics about the result.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use log::debug;
use sha2::{Digest, Sha256};

use crate::error::DecodeError;
use crate::header;

/// Statistics from a completed apply.
#[derive(Debug, Clone)]
pub struct ApplyStats {
    /// Bytes in the reconstructed target.
    pub output_size: u64,
    /// Windows the delta carried.
    pub windows: usize,
    /// SHA-256 of the reconstructed target.
    pub output_sha256: [u8; 32],
}

/// Read the base and delta files and apply the delta.
///
/// A missing base means an empty source, which is valid for deltas that
/// only ADD/RUN or self-copy. Returns the reconstructed target together
/// with its stats; the caller decides where the bytes go.
pub fn apply_files(base: Option<&Path>, delta: &Path) -> Result<(Vec<u8>, ApplyStats), ApplyError> {
    let source = match base {
        Some(path) => fs::read(path)?,
        None => Vec::new(),
    };
    let delta_bytes = fs::read(delta)?;
    debug!(
        "apply: {} source bytes, {} delta bytes",
        source.len(),
        delta_bytes.len()
    );

    let window_count = header::parse_windows(&delta_bytes)?.1.len();
    let output = crate::decode(&source, &delta_bytes)?;
    debug!("apply: reconstructed {} bytes", output.len());

    let output_sha256: [u8; 32] = Sha256::digest(&output).into();
    let stats = ApplyStats {
        output_size: output.len() as u64,
        windows: window_count,
        output_sha256,
    };
    Ok((output, stats))
}

/// Lowercase hex rendering of a digest.
pub fn hex_digest(digest: &[u8; 32]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Failure while applying a delta from files.
#[derive(Debug)]
pub enum ApplyError {
    Io(io::Error),
    Decode(DecodeError),
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
        }
    }
}

impl std::error::Error for ApplyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Decode(e) => Some(e),
        }
    }
}

impl From<io::Error> for ApplyError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<DecodeError> for ApplyError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
