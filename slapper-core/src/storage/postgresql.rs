/*!
PostgreSQL storage adapter.

Connects without TLS over a libpq-style connection string. Generated ids come
back through `INSERT ... RETURNING id`.
*/

use chrono::Utc;
use postgres::{Client, NoTls};
use tracing::{debug, info, warn};

use super::{require_active, require_owner, StorageAdapter};
use crate::model::{ConfigFile, NetworkInterface, SystemInfo};
use crate::Result;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS system_info (
  id BIGSERIAL PRIMARY KEY,
  hostname TEXT NOT NULL,
  created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS network_interfaces (
  id BIGSERIAL PRIMARY KEY,
  system_id BIGINT NOT NULL REFERENCES system_info(id),
  interface_name TEXT NOT NULL,
  ip_address TEXT,
  mac_address TEXT
);

CREATE TABLE IF NOT EXISTS config_files (
  id BIGSERIAL PRIMARY KEY,
  system_id BIGINT NOT NULL REFERENCES system_info(id),
  file_path TEXT NOT NULL,
  size BIGINT NOT NULL,
  permissions TEXT NOT NULL,
  modified_time TIMESTAMPTZ NOT NULL,
  data BYTEA NOT NULL
);
"#;

/// PostgreSQL storage adapter
///
/// # Example
/// ```rust,no_run
/// use slapper_core::{PostgresStorage, StorageAdapter};
///
/// let mut storage = PostgresStorage::connect("host=localhost user=slapper dbname=slapper")?;
/// storage.init_schema()?;
/// storage.commit()?;
/// storage.close()?;
/// # Ok::<(), slapper_core::SnapshotError>(())
/// ```
pub struct PostgresStorage {
    client: Client,
    active: bool,
}

impl PostgresStorage {
    /// Connect and begin a unit of work
    pub fn connect(uri: &str) -> Result<Self> {
        let mut client = Client::connect(uri, NoTls)?;
        client.batch_execute("BEGIN")?;

        info!("Connected to PostgreSQL storage");
        Ok(Self {
            client,
            active: true,
        })
    }
}

impl StorageAdapter for PostgresStorage {
    fn init_schema(&mut self) -> Result<()> {
        require_active(self.active)?;
        self.client.batch_execute(SCHEMA_SQL)?;
        debug!("PostgreSQL schema ready");
        Ok(())
    }

    fn store_system_info(&mut self, info: &mut SystemInfo) -> Result<()> {
        require_active(self.active)?;
        info.created_at = Utc::now();
        let row = self.client.query_one(
            "INSERT INTO system_info (hostname, created_at) VALUES ($1, $2) RETURNING id",
            &[&info.hostname, &info.created_at],
        )?;
        info.id = row.get(0);
        debug!(id = info.id, hostname = %info.hostname, "Stored system info");
        Ok(())
    }

    fn store_network_interface(&mut self, iface: &mut NetworkInterface) -> Result<()> {
        require_active(self.active)?;
        require_owner(iface.system_id, "network interface")?;
        let row = self.client.query_one(
            "INSERT INTO network_interfaces (system_id, interface_name, ip_address, mac_address)
             VALUES ($1, $2, $3, $4) RETURNING id",
            &[
                &iface.system_id,
                &iface.interface_name,
                &iface.ip_address,
                &iface.mac_address,
            ],
        )?;
        iface.id = row.get(0);
        Ok(())
    }

    fn store_config_file(&mut self, file: &mut ConfigFile) -> Result<()> {
        require_active(self.active)?;
        require_owner(file.system_id, "config file")?;
        let row = self.client.query_one(
            "INSERT INTO config_files (system_id, file_path, size, permissions, modified_time, data)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
            &[
                &file.system_id,
                &file.file_path,
                &file.size,
                &file.permissions,
                &file.modified_time,
                &file.data,
            ],
        )?;
        file.id = row.get(0);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        require_active(self.active)?;
        self.client.batch_execute("COMMIT")?;
        self.active = false;
        info!("Committed snapshot");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        require_active(self.active)?;
        self.active = false;
        self.client.batch_execute("ROLLBACK")?;
        info!("Rolled back snapshot");
        Ok(())
    }

    fn close(mut self) -> Result<()> {
        if self.active {
            warn!("Closing with uncommitted work, discarding it");
            self.rollback()?;
        }
        self.client.close()?;
        debug!("Closed PostgreSQL storage");
        Ok(())
    }
}
