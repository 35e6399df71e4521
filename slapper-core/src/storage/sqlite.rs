/*!
SQLite storage adapter.

Uses a single embedded database file. The unit of work is an explicit
`BEGIN` issued right after the connection is configured.
*/

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use super::{require_active, require_owner, StorageAdapter};
use crate::model::{ConfigFile, NetworkInterface, SystemInfo};
use crate::{Result, SnapshotError};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS system_info (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  hostname TEXT NOT NULL,
  created_at DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS network_interfaces (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  system_id INTEGER NOT NULL,
  interface_name TEXT NOT NULL,
  ip_address TEXT,
  mac_address TEXT,
  FOREIGN KEY(system_id) REFERENCES system_info(id)
);

CREATE TABLE IF NOT EXISTS config_files (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  system_id INTEGER NOT NULL,
  file_path TEXT NOT NULL,
  size INTEGER NOT NULL,
  permissions TEXT NOT NULL,
  modified_time DATETIME NOT NULL,
  data BLOB NOT NULL,
  FOREIGN KEY(system_id) REFERENCES system_info(id)
);
"#;

/// SQLite storage adapter
///
/// # Example
/// ```rust
/// use slapper_core::{SqliteStorage, StorageAdapter, SystemInfo};
///
/// let mut storage = SqliteStorage::open(":memory:")?;
/// storage.init_schema()?;
///
/// let mut info = SystemInfo::new("build-01");
/// storage.store_system_info(&mut info)?;
/// assert!(info.id > 0);
///
/// storage.commit()?;
/// storage.close()?;
/// # Ok::<(), slapper_core::SnapshotError>(())
/// ```
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    uri: String,
    active: bool,
}

impl SqliteStorage {
    /// Open (creating if needed) the database at `uri` and begin a unit of work
    ///
    /// `:memory:` opens a private in-memory database.
    pub fn open(uri: &str) -> Result<Self> {
        let conn = Connection::open(uri)?;

        // Must be set outside a transaction to take effect.
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch("BEGIN")?;

        info!(uri, %journal_mode, "Opened SQLite storage");
        Ok(Self {
            conn,
            uri: uri.to_string(),
            active: true,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl StorageAdapter for SqliteStorage {
    fn init_schema(&mut self) -> Result<()> {
        require_active(self.active)?;
        self.conn.execute_batch(SCHEMA_SQL)?;
        debug!("SQLite schema ready");
        Ok(())
    }

    fn store_system_info(&mut self, info: &mut SystemInfo) -> Result<()> {
        require_active(self.active)?;
        info.created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO system_info (hostname, created_at) VALUES (?1, ?2)",
            params![info.hostname, info.created_at],
        )?;
        info.id = self.conn.last_insert_rowid();
        debug!(id = info.id, hostname = %info.hostname, "Stored system info");
        Ok(())
    }

    fn store_network_interface(&mut self, iface: &mut NetworkInterface) -> Result<()> {
        require_active(self.active)?;
        require_owner(iface.system_id, "network interface")?;
        self.conn.execute(
            "INSERT INTO network_interfaces (system_id, interface_name, ip_address, mac_address)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                iface.system_id,
                iface.interface_name,
                iface.ip_address,
                iface.mac_address
            ],
        )?;
        iface.id = self.conn.last_insert_rowid();
        Ok(())
    }

    fn store_config_file(&mut self, file: &mut ConfigFile) -> Result<()> {
        require_active(self.active)?;
        require_owner(file.system_id, "config file")?;
        self.conn.execute(
            "INSERT INTO config_files (system_id, file_path, size, permissions, modified_time, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                file.system_id,
                file.file_path,
                file.size,
                file.permissions,
                file.modified_time,
                file.data
            ],
        )?;
        file.id = self.conn.last_insert_rowid();
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        require_active(self.active)?;
        self.conn.execute_batch("COMMIT")?;
        self.active = false;
        info!(uri = %self.uri, "Committed snapshot");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        require_active(self.active)?;
        self.active = false;
        self.conn.execute_batch("ROLLBACK")?;
        info!(uri = %self.uri, "Rolled back snapshot");
        Ok(())
    }

    fn close(mut self) -> Result<()> {
        if self.active {
            warn!(uri = %self.uri, "Closing with uncommitted work, discarding it");
            self.rollback()?;
        }
        self.conn
            .close()
            .map_err(|(_, e)| SnapshotError::storage(format!("failed to close SQLite: {e}")))?;
        debug!("Closed SQLite storage");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn db_path(dir: &TempDir) -> String {
        dir.path().join("snapshots.db").to_string_lossy().into_owned()
    }

    fn count(uri: &str, table: &str) -> i64 {
        let conn = Connection::open(uri).unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    fn sample_file(system_id: i64) -> ConfigFile {
        ConfigFile {
            id: 0,
            system_id,
            file_path: "/etc/hosts".to_string(),
            size: 12,
            permissions: "-rw-r--r--".to_string(),
            modified_time: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            data: vec![0x78, 0x9c, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01],
        }
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let mut storage = SqliteStorage::open(":memory:").unwrap();
        storage.init_schema().unwrap();
        storage.init_schema().unwrap();

        let tables: i64 = storage
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('system_info', 'network_interfaces', 'config_files')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_init_schema_twice_across_sessions() {
        let dir = TempDir::new().unwrap();
        let uri = db_path(&dir);

        for _ in 0..2 {
            let mut storage = SqliteStorage::open(&uri).unwrap();
            storage.init_schema().unwrap();
            storage.commit().unwrap();
            storage.close().unwrap();
        }
        assert_eq!(count(&uri, "system_info"), 0);
    }

    #[test]
    fn test_store_system_info_assigns_distinct_ids() {
        let mut storage = SqliteStorage::open(":memory:").unwrap();
        storage.init_schema().unwrap();

        let stale = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let mut first = SystemInfo::new("h1");
        first.created_at = stale;
        let mut second = SystemInfo::new("h1");

        storage.store_system_info(&mut first).unwrap();
        storage.store_system_info(&mut second).unwrap();

        assert!(first.id > 0);
        assert!(second.id > 0);
        assert_ne!(first.id, second.id);
        assert!(first.created_at > stale);
    }

    #[test]
    fn test_children_require_owner() {
        let mut storage = SqliteStorage::open(":memory:").unwrap();
        storage.init_schema().unwrap();

        let mut iface = NetworkInterface::new("eth0", "10.0.0.5", "aa:bb:cc:dd:ee:ff");
        let result = storage.store_network_interface(&mut iface);
        assert!(matches!(result, Err(SnapshotError::MissingOwner { .. })));
        assert_eq!(iface.id, 0);

        let mut file = sample_file(0);
        let result = storage.store_config_file(&mut file);
        assert!(matches!(result, Err(SnapshotError::MissingOwner { .. })));

        let rows: i64 = storage
            .conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM network_interfaces) + (SELECT COUNT(*) FROM config_files)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn test_commit_makes_snapshot_visible() {
        let dir = TempDir::new().unwrap();
        let uri = db_path(&dir);

        let mut storage = SqliteStorage::open(&uri).unwrap();
        storage.init_schema().unwrap();
        let mut info = SystemInfo::new("h1");
        storage.store_system_info(&mut info).unwrap();

        let mut iface = NetworkInterface::new("eth0", "10.0.0.5", "aa:bb:cc:dd:ee:ff");
        iface.system_id = info.id;
        storage.store_network_interface(&mut iface).unwrap();
        assert!(iface.id > 0);

        let mut file = sample_file(info.id);
        storage.store_config_file(&mut file).unwrap();
        assert!(file.id > 0);

        storage.commit().unwrap();
        storage.close().unwrap();

        let conn = Connection::open(&uri).unwrap();
        let (path, size, data): (String, i64, Vec<u8>) = conn
            .query_row(
                "SELECT file_path, size, data FROM config_files WHERE system_id = ?1",
                params![info.id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(path, "/etc/hosts");
        assert_eq!(size, 12);
        assert_eq!(data, file.data);
        assert_eq!(count(&uri, "network_interfaces"), 1);
    }

    #[test]
    fn test_uncommitted_work_is_discarded_on_close() {
        let dir = TempDir::new().unwrap();
        let uri = db_path(&dir);

        let mut setup = SqliteStorage::open(&uri).unwrap();
        setup.init_schema().unwrap();
        setup.commit().unwrap();
        setup.close().unwrap();

        let mut storage = SqliteStorage::open(&uri).unwrap();
        let mut info = SystemInfo::new("h1");
        storage.store_system_info(&mut info).unwrap();
        storage.close().unwrap();

        assert_eq!(count(&uri, "system_info"), 0);
    }

    #[test]
    fn test_rollback_discards_and_ends_unit_of_work() {
        let dir = TempDir::new().unwrap();
        let uri = db_path(&dir);

        let mut storage = SqliteStorage::open(&uri).unwrap();
        storage.init_schema().unwrap();
        let mut info = SystemInfo::new("h1");
        storage.store_system_info(&mut info).unwrap();
        storage.rollback().unwrap();

        let result = storage.store_system_info(&mut SystemInfo::new("h2"));
        assert!(matches!(result, Err(SnapshotError::Storage(_))));
        storage.close().unwrap();

        // The schema was part of the rolled back unit of work too.
        let conn = Connection::open(&uri).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'system_info'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn test_store_after_commit_fails() {
        let mut storage = SqliteStorage::open(":memory:").unwrap();
        storage.init_schema().unwrap();
        storage.commit().unwrap();

        let err = storage
            .store_system_info(&mut SystemInfo::new("h1"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Storage error: no active unit of work");
        assert!(storage.commit().is_err());
        storage.close().unwrap();
    }

    #[test]
    fn test_foreign_keys_are_enforced() {
        let mut storage = SqliteStorage::open(":memory:").unwrap();
        storage.init_schema().unwrap();

        let mut iface = NetworkInterface::new("eth0", "", "");
        iface.system_id = 4242;
        let result = storage.store_network_interface(&mut iface);
        assert!(matches!(result, Err(SnapshotError::Sqlite(_))));
    }

    #[test]
    fn test_uri_accessor() {
        let storage = SqliteStorage::open(":memory:").unwrap();
        assert_eq!(storage.uri(), ":memory:");
    }
}
