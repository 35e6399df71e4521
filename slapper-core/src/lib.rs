/*!
# Slapper Core Engine

Host configuration snapshot library.

A snapshot captures what a host looks like at one point in time:

- The hostname and capture time
- Every network interface with its first IPv4 address and MAC address
- The contents of the XDG and system configuration directories, compressed

and writes all of it to SQLite or PostgreSQL in a single unit of work, so a
snapshot is either stored completely or not at all.

## Architecture

- Collectors (`gather`) only read from the host and return plain records
- Storage backends sit behind the [`StorageAdapter`] trait
- Host queries go through [`HostProbe`], so collectors can be tested without a real host
- [`SnapshotEngine`] sequences collection and persistence

## Usage

```rust,no_run
use slapper_core::{create_engine_from_config, AppConfig};

let config = AppConfig::load("config.toml")?;
let report = create_engine_from_config(&config)?.run()?;
println!("stored snapshot {} with {} files", report.system_id, report.files_stored);
# Ok::<(), slapper_core::SnapshotError>(())
```
*/

pub mod compression;
pub mod config;
pub mod error;
pub mod gather;
pub mod model;
pub mod observability;
pub mod platform;
pub mod snapshot;
pub mod storage;


pub use compression::{
    new_compressor, CompressionAdapter, CompressionAlgorithm, GzipCompressor, ZlibCompressor,
};
pub use config::{AppConfig, LogFormat, StorageBackend};
pub use error::{Result, SnapshotError};
pub use gather::{FileCollection, FileCollector, SkipReason, SkippedFile, MAX_FILE_SIZE};
pub use model::{ConfigFile, NetworkInterface, SystemInfo};
pub use observability::init_logging;
pub use platform::{HostProbe, LocalHost, PlatformFacts, RawInterface};
pub use snapshot::{
    create_engine_from_config, GatheredSnapshot, SnapshotEngine, SnapshotReport,
    SnapshotSettings,
};
pub use storage::{PostgresStorage, SqliteStorage, Storage, StorageAdapter};
