/*!
Compression adapters for captured file contents.

Captured files are stored compressed and never read back by this tool, so the
adapters only expose the write direction. Two DEFLATE framings are supported:
zlib and gzip.
*/

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use flate2::{write::GzEncoder, write::ZlibEncoder, Compression};

use crate::{Result, SnapshotError};

/// Compression abstraction for captured file payloads
///
/// Implementations must be pure: the same input with the same algorithm and
/// level always produces the same output, and the input is never modified.
pub trait CompressionAdapter: Send + Sync {
    /// Compress the input data
    ///
    /// # Arguments
    /// * `data` - The data to compress
    ///
    /// # Returns
    /// The compressed data or an error
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of the compression algorithm
    fn algorithm_name(&self) -> &str;
}

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    Zlib,
    Gzip,
}

impl CompressionAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionAlgorithm::Zlib => "zlib",
            CompressionAlgorithm::Gzip => "gzip",
        }
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zlib" => Ok(CompressionAlgorithm::Zlib),
            "gzip" => Ok(CompressionAlgorithm::Gzip),
            other => Err(SnapshotError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a compressor for the named algorithm
///
/// The level is not checked here. It is handed to the stream writer when
/// `compress` runs, and an out-of-range value fails there.
///
/// # Example
/// ```rust
/// use slapper_core::new_compressor;
///
/// let compressor = new_compressor("zlib", 6)?;
/// let compressed = compressor.compress(b"key = value\n")?;
/// assert!(!compressed.is_empty());
/// # Ok::<(), slapper_core::SnapshotError>(())
/// ```
pub fn new_compressor(algorithm: &str, level: i32) -> Result<Box<dyn CompressionAdapter>> {
    match algorithm.parse::<CompressionAlgorithm>()? {
        CompressionAlgorithm::Zlib => Ok(Box::new(ZlibCompressor::with_level(level))),
        CompressionAlgorithm::Gzip => Ok(Box::new(GzipCompressor::with_level(level))),
    }
}

/// Map a configured level onto a flate2 level.
///
/// `-1` is the conventional "library default" value.
fn resolve_level(level: i32) -> Result<Compression> {
    match level {
        -1 => Ok(Compression::default()),
        0..=9 => Ok(Compression::new(level as u32)),
        other => Err(SnapshotError::compression(format!(
            "invalid compression level {other}, expected -1 or 0-9"
        ))),
    }
}

/// Zlib (RFC 1950) compression adapter
#[derive(Debug, Clone)]
pub struct ZlibCompressor {
    level: i32,
}

impl ZlibCompressor {
    /// Create a new zlib compressor with the default compression level
    pub fn new() -> Self {
        Self { level: -1 }
    }

    /// Create a new zlib compressor with the specified compression level
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZlibCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionAdapter for ZlibCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), resolve_level(self.level)?);

        encoder.write_all(data).map_err(|e| {
            SnapshotError::compression(format!("Failed to write data for compression: {e}"))
        })?;

        encoder
            .finish()
            .map_err(|e| SnapshotError::compression(format!("Failed to finish compression: {e}")))
    }

    fn algorithm_name(&self) -> &str {
        "zlib"
    }
}

/// Gzip (RFC 1952) compression adapter
///
/// # Example
/// ```rust
/// use slapper_core::{CompressionAdapter, GzipCompressor};
///
/// let compressor = GzipCompressor::with_level(9);
/// let compressed = compressor.compress(b"some configuration file contents")?;
/// assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
/// # Ok::<(), slapper_core::SnapshotError>(())
/// ```
#[derive(Debug, Clone)]
pub struct GzipCompressor {
    level: i32,
}

impl GzipCompressor {
    /// Create a new gzip compressor with the default compression level
    pub fn new() -> Self {
        Self { level: -1 }
    }

    /// Create a new gzip compressor with the specified compression level
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionAdapter for GzipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), resolve_level(self.level)?);

        encoder.write_all(data).map_err(|e| {
            SnapshotError::compression(format!("Failed to write data for compression: {e}"))
        })?;

        encoder
            .finish()
            .map_err(|e| SnapshotError::compression(format!("Failed to finish compression: {e}")))
    }

    fn algorithm_name(&self) -> &str {
        "gzip"
    }
}
