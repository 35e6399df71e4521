/*!
Snapshot engine that ties collection and persistence together.

One run gathers the system record, the network interfaces and the config
files, then writes all of them through a single storage unit of work. Either
the whole snapshot is committed or nothing is.
*/

use serde::Serialize;
use tracing::{error, info, warn};

use crate::compression::CompressionAlgorithm;
use crate::config::{AppConfig, CompressionConfig, GatherConfig};
use crate::gather::{gather_config_files, gather_network_info, gather_system_info, FileCollection};
use crate::model::{ConfigFile, NetworkInterface, SystemInfo};
use crate::platform::{HostProbe, LocalHost, PlatformFacts};
use crate::storage::{Storage, StorageAdapter};
use crate::Result;

/// Inputs that shape what gets collected
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotSettings {
    pub gather: GatherConfig,
    pub compression: CompressionConfig,
    pub facts: PlatformFacts,
}

impl SnapshotSettings {
    /// Settings from the loaded configuration and the process environment
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            gather: config.gather.clone(),
            compression: config.compression.clone(),
            facts: PlatformFacts::from_env(),
        }
    }
}

/// Everything one collection pass produced, before persistence
#[derive(Debug)]
pub struct GatheredSnapshot {
    pub system: SystemInfo,
    pub interfaces: Vec<NetworkInterface>,
    pub files: FileCollection,
}

/// Outcome of a committed snapshot
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    pub system_id: i64,
    pub hostname: String,
    pub interfaces_stored: usize,
    pub interfaces_failed: usize,
    pub files_stored: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
}

/// Run every collector without touching storage.
///
/// Order: system, network, files. The first collector failure is returned.
pub fn gather<P: HostProbe + ?Sized>(probe: &P, settings: &SnapshotSettings) -> Result<GatheredSnapshot> {
    let system = gather_system_info(probe)?;
    let interfaces = gather_network_info(probe)?;
    let files = gather_config_files(&settings.gather, &settings.compression, &settings.facts)?;

    Ok(GatheredSnapshot {
        system,
        interfaces,
        files,
    })
}

/// Give every child record the owning system id
fn stamp_owner(system_id: i64, interfaces: &mut [NetworkInterface], files: &mut [ConfigFile]) {
    for iface in interfaces.iter_mut() {
        iface.system_id = system_id;
    }
    for file in files.iter_mut() {
        file.system_id = system_id;
    }
}

/// Drives one snapshot from collection to commit
///
/// # Example
/// ```rust,no_run
/// use slapper_core::{LocalHost, SnapshotEngine, SnapshotSettings, SqliteStorage};
///
/// let storage = SqliteStorage::open("snapshots.db")?;
/// let mut settings = SnapshotSettings::default();
/// settings.gather.system_config_dir = "/etc".to_string();
///
/// let report = SnapshotEngine::new(storage, LocalHost, settings).run()?;
/// assert!(report.system_id > 0);
/// # Ok::<(), slapper_core::SnapshotError>(())
/// ```
pub struct SnapshotEngine<S, P>
where
    S: StorageAdapter,
    P: HostProbe,
{
    storage: S,
    probe: P,
    settings: SnapshotSettings,
}

impl<S, P> SnapshotEngine<S, P>
where
    S: StorageAdapter,
    P: HostProbe,
{
    /// Create a new engine around an open storage adapter
    pub fn new(storage: S, probe: P, settings: SnapshotSettings) -> Self {
        Self {
            storage,
            probe,
            settings,
        }
    }

    pub fn settings(&self) -> &SnapshotSettings {
        &self.settings
    }

    /// Take one snapshot and commit it
    ///
    /// The storage is closed on every path. On failure the unit of work is
    /// rolled back first, so nothing from this run is visible.
    ///
    /// # Errors
    /// Schema creation, the system insert, the commit and any collector
    /// failure abort the run. Individual interface or file inserts that fail
    /// are logged and counted in the report instead.
    pub fn run(self) -> Result<SnapshotReport> {
        let SnapshotEngine {
            mut storage,
            probe,
            settings,
        } = self;

        match persist(&mut storage, &probe, &settings) {
            Ok(report) => {
                if let Err(e) = storage.close() {
                    warn!(error = %e, "Failed to close storage after commit");
                }
                info!(
                    system_id = report.system_id,
                    interfaces = report.interfaces_stored,
                    files = report.files_stored,
                    "Snapshot complete"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Snapshot failed, rolling back");
                if let Err(rollback_err) = storage.rollback() {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                if let Err(close_err) = storage.close() {
                    warn!(error = %close_err, "Failed to close storage");
                }
                Err(e)
            }
        }
    }
}

fn persist<S, P>(storage: &mut S, probe: &P, settings: &SnapshotSettings) -> Result<SnapshotReport>
where
    S: StorageAdapter,
    P: HostProbe,
{
    storage.init_schema()?;

    let GatheredSnapshot {
        mut system,
        mut interfaces,
        mut files,
    } = gather(probe, settings)?;

    storage.store_system_info(&mut system)?;
    stamp_owner(system.id, &mut interfaces, &mut files.files);

    let mut report = SnapshotReport {
        system_id: system.id,
        hostname: system.hostname.clone(),
        files_skipped: files.skipped.len(),
        original_bytes: files.original_bytes(),
        compressed_bytes: files.compressed_bytes(),
        ..SnapshotReport::default()
    };

    for iface in interfaces.iter_mut() {
        match storage.store_network_interface(iface) {
            Ok(()) => report.interfaces_stored += 1,
            Err(e) => {
                error!(interface = %iface.interface_name, error = %e, "Failed to store network interface");
                report.interfaces_failed += 1;
            }
        }
    }

    for file in files.files.iter_mut() {
        match storage.store_config_file(file) {
            Ok(()) => report.files_stored += 1,
            Err(e) => {
                error!(path = %file.file_path, error = %e, "Failed to store config file");
                report.files_failed += 1;
            }
        }
    }

    storage.commit()?;
    Ok(report)
}

/// Build an engine for the local host from a loaded configuration
///
/// The compression algorithm is checked before the database is opened.
///
/// # Errors
/// * `SnapshotError::Config` - If the configuration is incomplete
/// * `SnapshotError::UnsupportedBackend` - If `database.type` is unknown
/// * `SnapshotError::UnsupportedAlgorithm` - If `compression.algorithm` is unknown
pub fn create_engine_from_config(config: &AppConfig) -> Result<SnapshotEngine<Storage, LocalHost>> {
    config.validate()?;
    let backend = config.database.backend()?;
    config.compression.algorithm.parse::<CompressionAlgorithm>()?;

    let storage = Storage::open(backend, &config.database.uri)?;
    Ok(SnapshotEngine::new(
        storage,
        LocalHost,
        SnapshotSettings::from_config(config),
    ))
}
