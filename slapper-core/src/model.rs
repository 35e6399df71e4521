/*!
Records produced by the collectors and written by the storage adapters.

A snapshot is one [`SystemInfo`] that owns any number of
[`NetworkInterface`] and [`ConfigFile`] records through `system_id`.
Identifiers are `0` until the store assigns them.
*/

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Basic system-level information at snapshot time
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SystemInfo {
    /// Primary key, assigned by the store
    pub id: i64,

    /// Hostname reported by the platform
    pub hostname: String,

    /// When the snapshot was taken. The store overwrites this with its insert time.
    pub created_at: DateTime<Utc>,
}

impl SystemInfo {
    pub fn new<S: Into<String>>(hostname: S) -> Self {
        Self {
            id: 0,
            hostname: hostname.into(),
            created_at: Utc::now(),
        }
    }
}

/// A single network interface's addresses
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NetworkInterface {
    /// Primary key, assigned by the store
    pub id: i64,

    /// Owning [`SystemInfo::id`]
    pub system_id: i64,

    /// e.g. "eth0", "wlan0"
    pub interface_name: String,

    /// First IPv4 address without prefix length, empty when there is none
    pub ip_address: String,

    /// e.g. "00:1a:2b:3c:4d:5e", empty for interfaces without a hardware address
    pub mac_address: String,
}

impl NetworkInterface {
    pub fn new<S1, S2, S3>(interface_name: S1, ip_address: S2, mac_address: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            id: 0,
            system_id: 0,
            interface_name: interface_name.into(),
            ip_address: ip_address.into(),
            mac_address: mac_address.into(),
        }
    }
}

/// A configuration file's metadata and compressed contents
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Primary key, assigned by the store
    pub id: i64,

    /// Owning [`SystemInfo::id`]
    pub system_id: i64,

    /// Full path to the file
    pub file_path: String,

    /// Original (uncompressed) file size in bytes
    pub size: i64,

    /// File permission string, e.g. "-rw-r--r--"
    pub permissions: String,

    /// Last modification time
    pub modified_time: DateTime<Utc>,

    /// Compressed file data
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl ConfigFile {
    /// Length of the compressed payload
    pub fn compressed_len(&self) -> usize {
        self.data.len()
    }
}
