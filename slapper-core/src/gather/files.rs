/*!
Configuration file capture.

Root directories are resolved from the gather settings and the platform
facts, then walked one by one. Every node visited yields either a captured
[`ConfigFile`] or a [`SkippedFile`] explaining why it was left out; nothing
below the root level can fail the collection as a whole.
*/

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs::{self, File, Metadata};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::compression::{new_compressor, CompressionAdapter};
use crate::config::{CompressionConfig, GatherConfig};
use crate::model::ConfigFile;
use crate::platform::PlatformFacts;
use crate::Result;

/// Files larger than this are not captured (50 MiB)
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Used when `xdg_config_dirs` is not configured
pub const DEFAULT_XDG_CONFIG_DIRS: &str = "/etc/xdg";

/// Why a node was left out of the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Open, stat or read failed
    Unreadable(String),
    /// Larger than the size ceiling
    TooLarge { size: u64 },
    /// The compressor rejected the contents
    Compression(String),
    /// A directory could not be listed or an entry could not be inspected
    Traversal(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unreadable(msg) => write!(f, "unreadable: {msg}"),
            SkipReason::TooLarge { size } => {
                write!(f, "file too large: {size} bytes (limit {MAX_FILE_SIZE})")
            }
            SkipReason::Compression(msg) => write!(f, "compression failed: {msg}"),
            SkipReason::Traversal(msg) => write!(f, "traversal error: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Result of visiting one node during a walk
#[derive(Debug)]
pub enum WalkOutcome {
    Captured(ConfigFile),
    Skipped(SkippedFile),
}

/// Everything a collection run produced
#[derive(Debug, Default)]
pub struct FileCollection {
    pub files: Vec<ConfigFile>,
    pub skipped: Vec<SkippedFile>,
}

impl FileCollection {
    /// Sum of the uncompressed sizes of captured files
    pub fn original_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size.max(0) as u64).sum()
    }

    /// Sum of the compressed payload sizes of captured files
    pub fn compressed_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.compressed_len() as u64).sum()
    }
}

/// Resolve the set of directories to walk.
///
/// Order of consideration: XDG config home (or `<home>/.config`), each entry
/// of the XDG config dirs (or `/etc/xdg`), then the system config directory.
/// Only existing directories are kept, and each path appears once.
pub fn resolve_roots(settings: &GatherConfig, facts: &PlatformFacts) -> BTreeSet<PathBuf> {
    let mut roots = BTreeSet::new();

    let config_home = if settings.xdg_config_home.is_empty() {
        facts.resolve_home().join(".config")
    } else {
        PathBuf::from(&settings.xdg_config_home)
    };
    insert_if_dir(&mut roots, config_home);

    let config_dirs = if settings.xdg_config_dirs.is_empty() {
        DEFAULT_XDG_CONFIG_DIRS
    } else {
        settings.xdg_config_dirs.as_str()
    };
    for dir in config_dirs.split(':').filter(|d| !d.is_empty()) {
        insert_if_dir(&mut roots, PathBuf::from(dir));
    }

    if !settings.system_config_dir.is_empty() {
        insert_if_dir(&mut roots, PathBuf::from(&settings.system_config_dir));
    }

    roots
}

fn insert_if_dir(roots: &mut BTreeSet<PathBuf>, path: PathBuf) {
    let is_dir = fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false);
    if is_dir {
        roots.insert(path);
    } else {
        debug!(path = %path.display(), "Ignoring missing config directory");
    }
}

/// Walks root directories and captures every readable regular file
pub struct FileCollector {
    compressor: Box<dyn CompressionAdapter>,
    max_file_size: u64,
}

impl FileCollector {
    pub fn new(compressor: Box<dyn CompressionAdapter>) -> Self {
        Self {
            compressor,
            max_file_size: MAX_FILE_SIZE,
        }
    }

    /// Override the size ceiling
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Walk every root and aggregate the results.
    ///
    /// A path reachable from more than one root is captured once.
    pub fn collect<I, P>(&self, roots: I) -> FileCollection
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut collection = FileCollection::default();
        let mut seen = HashSet::new();

        for root in roots {
            let root = root.as_ref();
            let (mut captured, mut skipped) = (0usize, 0usize);

            for outcome in self.walk_root(root) {
                match outcome {
                    WalkOutcome::Captured(file) => {
                        if seen.insert(file.file_path.clone()) {
                            captured += 1;
                            collection.files.push(file);
                        }
                    }
                    WalkOutcome::Skipped(skip) => {
                        debug!(path = %skip.path.display(), reason = %skip.reason, "Skipping file");
                        skipped += 1;
                        collection.skipped.push(skip);
                    }
                }
            }

            info!(root = %root.display(), captured, skipped, "Walked config directory");
        }

        collection
    }

    /// Walk a single root without following symlinks below it.
    pub fn walk_root(&self, root: &Path) -> Vec<WalkOutcome> {
        let mut outcomes = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    outcomes.push(skipped(dir, SkipReason::Traversal(e.to_string())));
                    continue;
                }
            };

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        outcomes.push(skipped(dir.clone(), SkipReason::Traversal(e.to_string())));
                        continue;
                    }
                };

                let path = entry.path();
                let file_type = match entry.file_type() {
                    Ok(file_type) => file_type,
                    Err(e) => {
                        outcomes.push(skipped(path, SkipReason::Traversal(e.to_string())));
                        continue;
                    }
                };

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    outcomes.push(self.capture_outcome(path));
                }
            }
        }

        outcomes
    }

    /// Capture one listed file, turning any failure into a skip.
    ///
    /// The entry may have changed or disappeared since it was listed.
    pub fn capture_outcome(&self, path: PathBuf) -> WalkOutcome {
        match self.capture_file(&path) {
            Ok(file) => WalkOutcome::Captured(file),
            Err(reason) => skipped(path, reason),
        }
    }

    /// Read, size-check and compress one regular file.
    pub fn capture_file(&self, path: &Path) -> std::result::Result<ConfigFile, SkipReason> {
        let unreadable = |e: std::io::Error| SkipReason::Unreadable(e.to_string());

        let file = File::open(path).map_err(unreadable)?;
        let metadata = file.metadata().map_err(unreadable)?;
        if !metadata.is_file() {
            return Err(SkipReason::Unreadable("not a regular file".to_string()));
        }

        let size = metadata.len();
        if size > self.max_file_size {
            return Err(SkipReason::TooLarge { size });
        }

        // Bound the read as well, in case the file grows after the stat.
        let mut data = Vec::with_capacity(size as usize);
        file.take(self.max_file_size + 1)
            .read_to_end(&mut data)
            .map_err(unreadable)?;
        if data.len() as u64 > self.max_file_size {
            return Err(SkipReason::TooLarge {
                size: data.len() as u64,
            });
        }

        let compressed = self
            .compressor
            .compress(&data)
            .map_err(|e| SkipReason::Compression(e.to_string()))?;

        let modified_time: DateTime<Utc> = metadata.modified().map_err(unreadable)?.into();

        Ok(ConfigFile {
            id: 0,
            system_id: 0,
            file_path: path.to_string_lossy().into_owned(),
            size: size as i64,
            permissions: permission_string(&metadata),
            modified_time,
            data: compressed,
        })
    }
}

fn skipped(path: PathBuf, reason: SkipReason) -> WalkOutcome {
    WalkOutcome::Skipped(SkippedFile { path, reason })
}

/// Resolve roots, build the configured compressor and collect.
///
/// The only error is an unsupported compression algorithm.
pub fn gather_config_files(
    settings: &GatherConfig,
    compression: &CompressionConfig,
    facts: &PlatformFacts,
) -> Result<FileCollection> {
    let compressor = new_compressor(&compression.algorithm, compression.level)?;
    let roots = resolve_roots(settings, facts);
    info!(roots = roots.len(), algorithm = %compression.algorithm, "Gathering config files");

    let collection = FileCollector::new(compressor).collect(&roots);
    info!(
        captured = collection.files.len(),
        skipped = collection.skipped.len(),
        original_bytes = collection.original_bytes(),
        compressed_bytes = collection.compressed_bytes(),
        "Gathered config files"
    );
    Ok(collection)
}

/// ls-style rendering of a file's mode, e.g. `-rw-r--r--`
#[cfg(unix)]
pub fn permission_string(metadata: &Metadata) -> String {
    use std::os::unix::fs::MetadataExt;
    render_mode(metadata.mode())
}

#[cfg(not(unix))]
pub fn permission_string(metadata: &Metadata) -> String {
    if metadata.permissions().readonly() {
        "-r--r--r--".to_string()
    } else {
        "-rw-rw-rw-".to_string()
    }
}

/// Render a raw `st_mode` value
pub fn render_mode(mode: u32) -> String {
    let kind = match mode & 0o170000 {
        0o040000 => 'd',
        0o120000 => 'l',
        0o020000 => 'c',
        0o060000 => 'b',
        0o010000 => 'p',
        0o140000 => 's',
        _ => '-',
    };

    let mut out = String::with_capacity(10);
    out.push(kind);

    // (read, write, exec, special bit, special char)
    let classes = [
        (0o400, 0o200, 0o100, 0o4000, 's'),
        (0o040, 0o020, 0o010, 0o2000, 's'),
        (0o004, 0o002, 0o001, 0o1000, 't'),
    ];
    for (read, write, exec, special, marker) in classes {
        out.push(if mode & read != 0 { 'r' } else { '-' });
        out.push(if mode & write != 0 { 'w' } else { '-' });
        out.push(match (mode & exec != 0, mode & special != 0) {
            (true, true) => marker,
            (false, true) => marker.to_ascii_uppercase(),
            (true, false) => 'x',
            (false, false) => '-',
        });
    }
    out
}
