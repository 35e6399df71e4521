/*!
End-to-end tests for the slapper core.
These tests run complete snapshots against real SQLite databases and, when
`SLAPPER_TEST_POSTGRES_URI` is set, against PostgreSQL.
*/

use flate2::read::GzDecoder;
use rusqlite::{params, Connection};
use slapper_core::config::{CompressionConfig, GatherConfig};
use slapper_core::{
    HostProbe, PlatformFacts, PostgresStorage, RawInterface, Result, SnapshotEngine,
    SnapshotError, SnapshotSettings, SqliteStorage, StorageAdapter,
};
use std::fs;
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

/// Host with a fixed hostname and a single interface
struct FixedHost {
    hostname: Option<&'static str>,
}

impl FixedHost {
    fn named(hostname: &'static str) -> Self {
        Self {
            hostname: Some(hostname),
        }
    }
}

impl HostProbe for FixedHost {
    fn hostname(&self) -> Result<String> {
        self.hostname
            .map(str::to_string)
            .ok_or_else(|| SnapshotError::platform("hostname unavailable"))
    }

    fn interfaces(&self) -> Result<Vec<RawInterface>> {
        Ok(vec![RawInterface {
            name: "eth0".to_string(),
            hardware_addr: vec![0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
            addresses: Ok(vec!["fe80::1/64".to_string(), "10.0.0.5/24".to_string()]),
        }])
    }
}

fn settings(home: &Path, system: &Path) -> SnapshotSettings {
    SnapshotSettings {
        gather: GatherConfig {
            xdg_config_home: home.display().to_string(),
            xdg_config_dirs: "/nonexistent/slapper/xdg".to_string(),
            system_config_dir: system.display().to_string(),
        },
        compression: CompressionConfig::default(),
        facts: PlatformFacts::default(),
    }
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_complete_snapshot_to_sqlite() {
    let db_dir = TempDir::new().unwrap();
    let db_path = db_dir.path().join("snapshots.db");
    let home = TempDir::new().unwrap();
    let system = TempDir::new().unwrap();
    fs::write(system.path().join("app.conf"), b"hello world\n").unwrap();

    let storage = SqliteStorage::open(db_path.to_str().unwrap()).unwrap();
    let report = SnapshotEngine::new(storage, FixedHost::named("h1"), settings(home.path(), system.path()))
        .run()
        .unwrap();

    assert_eq!(report.hostname, "h1");
    assert_eq!(report.interfaces_stored, 1);
    assert_eq!(report.files_stored, 1);
    assert_eq!(report.files_failed, 0);

    let conn = Connection::open(&db_path).unwrap();
    assert_eq!(count(&conn, "system_info"), 1);
    assert_eq!(count(&conn, "network_interfaces"), 1);
    assert_eq!(count(&conn, "config_files"), 1);

    let (id, hostname): (i64, String) = conn
        .query_row("SELECT id, hostname FROM system_info", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(id, report.system_id);
    assert_eq!(hostname, "h1");

    let (name, ip, mac): (String, String, String) = conn
        .query_row(
            "SELECT interface_name, ip_address, mac_address FROM network_interfaces WHERE system_id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(name, "eth0");
    assert_eq!(ip, "10.0.0.5");
    assert_eq!(mac, "aa:bb:cc:dd:ee:ff");

    let (path, size, data): (String, i64, Vec<u8>) = conn
        .query_row(
            "SELECT file_path, size, data FROM config_files WHERE system_id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert!(path.ends_with("app.conf"));
    assert_eq!(size, 12);
    assert!(!data.is_empty());

    let mut restored = Vec::new();
    GzDecoder::new(data.as_slice()).read_to_end(&mut restored).unwrap();
    assert_eq!(restored, b"hello world\n");
}

#[test]
fn test_repeated_snapshots_share_schema() {
    let db_dir = TempDir::new().unwrap();
    let db_path = db_dir.path().join("snapshots.db");
    let home = TempDir::new().unwrap();
    let system = TempDir::new().unwrap();
    fs::write(system.path().join("a.conf"), b"a").unwrap();

    let mut ids = Vec::new();
    for _ in 0..2 {
        let storage = SqliteStorage::open(db_path.to_str().unwrap()).unwrap();
        let report = SnapshotEngine::new(storage, FixedHost::named("h1"), settings(home.path(), system.path()))
            .run()
            .unwrap();
        ids.push(report.system_id);
    }
    assert_ne!(ids[0], ids[1]);

    let conn = Connection::open(&db_path).unwrap();
    assert_eq!(count(&conn, "system_info"), 2);
    assert_eq!(count(&conn, "config_files"), 2);
    let owners: i64 = conn
        .query_row("SELECT COUNT(DISTINCT system_id) FROM config_files", [], |row| row.get(0))
        .unwrap();
    assert_eq!(owners, 2);
}

#[test]
fn test_directory_configured_twice_is_captured_once() {
    let db_dir = TempDir::new().unwrap();
    let db_path = db_dir.path().join("snapshots.db");
    let shared = TempDir::new().unwrap();
    fs::write(shared.path().join("one.conf"), b"1").unwrap();
    fs::write(shared.path().join("two.conf"), b"2").unwrap();

    let storage = SqliteStorage::open(db_path.to_str().unwrap()).unwrap();
    let report = SnapshotEngine::new(storage, FixedHost::named("h1"), settings(shared.path(), shared.path()))
        .run()
        .unwrap();
    assert_eq!(report.files_stored, 2);

    let conn = Connection::open(&db_path).unwrap();
    let distinct: i64 = conn
        .query_row("SELECT COUNT(DISTINCT file_path) FROM config_files", [], |row| row.get(0))
        .unwrap();
    assert_eq!(distinct, 2);
    assert_eq!(count(&conn, "config_files"), 2);
}

#[test]
fn test_failed_snapshot_leaves_no_rows() {
    let db_dir = TempDir::new().unwrap();
    let db_path = db_dir.path().join("snapshots.db");
    let home = TempDir::new().unwrap();
    let system = TempDir::new().unwrap();

    let mut setup = SqliteStorage::open(db_path.to_str().unwrap()).unwrap();
    setup.init_schema().unwrap();
    setup.commit().unwrap();
    setup.close().unwrap();

    let storage = SqliteStorage::open(db_path.to_str().unwrap()).unwrap();
    let result = SnapshotEngine::new(storage, FixedHost { hostname: None }, settings(home.path(), system.path())).run();
    assert!(matches!(result, Err(SnapshotError::Platform(_))));

    let conn = Connection::open(&db_path).unwrap();
    assert_eq!(count(&conn, "system_info"), 0);
    assert_eq!(count(&conn, "network_interfaces"), 0);
}

#[test]
fn test_complete_snapshot_to_postgres() {
    let uri = match std::env::var("SLAPPER_TEST_POSTGRES_URI") {
        Ok(uri) if !uri.is_empty() => uri,
        _ => {
            println!("Skipping PostgreSQL end-to-end test - set SLAPPER_TEST_POSTGRES_URI to run it");
            return;
        }
    };

    let home = TempDir::new().unwrap();
    let system = TempDir::new().unwrap();
    fs::write(system.path().join("app.conf"), b"hello world\n").unwrap();

    let storage = PostgresStorage::connect(&uri).unwrap();
    let report = SnapshotEngine::new(storage, FixedHost::named("pg-h1"), settings(home.path(), system.path()))
        .run()
        .unwrap();

    assert!(report.system_id > 0);
    assert_eq!(report.interfaces_stored, 1);
    assert_eq!(report.files_stored, 1);

    let mut client = postgres::Client::connect(&uri, postgres::NoTls).unwrap();
    let row = client
        .query_one(
            "SELECT size FROM config_files WHERE system_id = $1",
            &[&report.system_id],
        )
        .unwrap();
    let size: i64 = row.get(0);
    assert_eq!(size, 12);
}
