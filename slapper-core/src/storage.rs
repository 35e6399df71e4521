/*!
Storage adapters for snapshot persistence.

A storage adapter owns one database connection and one open unit of work for
its whole lifetime. Every insert made through it is staged in that unit of
work until [`StorageAdapter::commit`] makes the whole snapshot durable at
once; a snapshot is never partially visible.

Backends are a closed set selected by [`StorageBackend`]: [`SqliteStorage`]
and [`PostgresStorage`], unified behind the [`Storage`] enum.
*/

pub mod postgresql;
pub mod sqlite;

pub use postgresql::PostgresStorage;
pub use sqlite::SqliteStorage;

use tracing::info;

use crate::config::StorageBackend;
use crate::model::{ConfigFile, NetworkInterface, SystemInfo};
use crate::{Result, SnapshotError};

/// Persistence abstraction for snapshot records
///
/// Calls take `&mut self`, so one adapter is only ever driven from one place
/// at a time.
pub trait StorageAdapter {
    /// Create the snapshot tables if they do not exist yet
    fn init_schema(&mut self) -> Result<()>;

    /// Insert the system record and stamp its generated id
    ///
    /// `created_at` is replaced with the insert time.
    fn store_system_info(&mut self, info: &mut SystemInfo) -> Result<()>;

    /// Insert one interface record and stamp its generated id
    ///
    /// # Errors
    /// [`SnapshotError::MissingOwner`] when `system_id` is not set
    fn store_network_interface(&mut self, iface: &mut NetworkInterface) -> Result<()>;

    /// Insert one config file record and stamp its generated id
    ///
    /// # Errors
    /// [`SnapshotError::MissingOwner`] when `system_id` is not set
    fn store_config_file(&mut self, file: &mut ConfigFile) -> Result<()>;

    /// Make every insert since the unit of work began durable
    fn commit(&mut self) -> Result<()>;

    /// Discard every insert since the unit of work began
    fn rollback(&mut self) -> Result<()>;

    /// Release the connection. Uncommitted work is discarded.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Fail with [`SnapshotError::MissingOwner`] for a record without an owner
pub(crate) fn require_owner(system_id: i64, record: &'static str) -> Result<()> {
    if system_id == 0 {
        return Err(SnapshotError::MissingOwner { record });
    }
    Ok(())
}

/// Fail when the unit of work has already been committed or rolled back
pub(crate) fn require_active(active: bool) -> Result<()> {
    if !active {
        return Err(SnapshotError::storage("no active unit of work"));
    }
    Ok(())
}

/// A storage adapter for one of the supported backends
pub enum Storage {
    Sqlite(SqliteStorage),
    Postgres(PostgresStorage),
}

impl Storage {
    /// Open a connection to the given backend and begin the unit of work
    ///
    /// # Example
    /// ```rust
    /// use slapper_core::{Storage, StorageAdapter, StorageBackend};
    ///
    /// let mut storage = Storage::open(StorageBackend::Sqlite, ":memory:")?;
    /// storage.init_schema()?;
    /// storage.commit()?;
    /// storage.close()?;
    /// # Ok::<(), slapper_core::SnapshotError>(())
    /// ```
    pub fn open(kind: StorageBackend, uri: &str) -> Result<Self> {
        if uri.trim().is_empty() {
            return Err(SnapshotError::validation("database uri must not be empty"));
        }
        info!(backend = %kind, "Opening storage");
        match kind {
            StorageBackend::Sqlite => Ok(Storage::Sqlite(SqliteStorage::open(uri)?)),
            StorageBackend::Postgres => Ok(Storage::Postgres(PostgresStorage::connect(uri)?)),
        }
    }

    /// Parse the type tag, then open
    ///
    /// # Errors
    /// [`SnapshotError::UnsupportedBackend`] for an unknown tag
    pub fn open_tagged(tag: &str, uri: &str) -> Result<Self> {
        Self::open(tag.parse()?, uri)
    }

    pub fn backend(&self) -> StorageBackend {
        match self {
            Storage::Sqlite(_) => StorageBackend::Sqlite,
            Storage::Postgres(_) => StorageBackend::Postgres,
        }
    }
}

impl StorageAdapter for Storage {
    fn init_schema(&mut self) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.init_schema(),
            Storage::Postgres(s) => s.init_schema(),
        }
    }

    fn store_system_info(&mut self, info: &mut SystemInfo) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.store_system_info(info),
            Storage::Postgres(s) => s.store_system_info(info),
        }
    }

    fn store_network_interface(&mut self, iface: &mut NetworkInterface) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.store_network_interface(iface),
            Storage::Postgres(s) => s.store_network_interface(iface),
        }
    }

    fn store_config_file(&mut self, file: &mut ConfigFile) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.store_config_file(file),
            Storage::Postgres(s) => s.store_config_file(file),
        }
    }

    fn commit(&mut self) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.commit(),
            Storage::Postgres(s) => s.commit(),
        }
    }

    fn rollback(&mut self) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.rollback(),
            Storage::Postgres(s) => s.rollback(),
        }
    }

    fn close(self) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.close(),
            Storage::Postgres(s) => s.close(),
        }
    }
}
