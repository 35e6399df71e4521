/*!
Slapper CLI - capture host configuration snapshots.

Reads `config.toml` (or the file given with `--config`), gathers the hostname,
network interfaces and configuration files, and stores them in the configured
SQLite or PostgreSQL database.
*/

use anyhow::Context;
use clap::{Parser, Subcommand};
use slapper_core::{
    create_engine_from_config, init_logging, snapshot, AppConfig, LocalHost, SnapshotReport,
    SnapshotSettings, Storage, StorageAdapter,
};
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "slapper")]
#[command(about = "Snapshot a host's network interfaces and configuration files")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "SLAPPER_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Take a snapshot and store it (default)
    Snapshot {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create the database tables and exit
    InitSchema,
    /// Gather without storing anything and print what would be captured
    Inspect {
        /// Also list captured files
        #[arg(short, long)]
        files: bool,
    },
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct InterfaceRow {
    #[tabled(rename = "Interface")]
    name: String,
    #[tabled(rename = "IPv4")]
    ip_address: String,
    #[tabled(rename = "MAC")]
    mac_address: String,
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Compressed")]
    compressed: String,
    #[tabled(rename = "Mode")]
    permissions: String,
    #[tabled(rename = "Modified")]
    modified: String,
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    init_logging(level, config.logging.log_format())?;

    let command = cli.command.unwrap_or(Commands::Snapshot { json: false });
    let result = match command {
        Commands::Snapshot { json } => take_snapshot(&config, json),
        Commands::InitSchema => init_schema(&config),
        Commands::Inspect { files } => inspect(&config, files),
    };

    if let Err(e) = &result {
        error!("{e:#}");
    }
    result
}

fn take_snapshot(config: &AppConfig, json: bool) -> Result<(), anyhow::Error> {
    info!(backend = %config.database.kind, "Taking snapshot");

    let engine = create_engine_from_config(config).context("failed to open storage")?;
    let report = engine.run().context("snapshot failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", Table::new(report_rows(&report)));
    }
    Ok(())
}

fn init_schema(config: &AppConfig) -> Result<(), anyhow::Error> {
    let backend = config.database.backend()?;
    let mut storage = Storage::open(backend, &config.database.uri)?;

    if let Err(e) = storage.init_schema().and_then(|_| storage.commit()) {
        let _ = storage.rollback();
        let _ = storage.close();
        return Err(e).context("failed to create schema");
    }
    storage.close()?;

    println!("✓ Schema ready in {backend} database");
    Ok(())
}

fn inspect(config: &AppConfig, show_files: bool) -> Result<(), anyhow::Error> {
    let settings = SnapshotSettings::from_config(config);
    let gathered = snapshot::gather(&LocalHost, &settings)?;

    println!("Hostname: {}", gathered.system.hostname);
    println!();

    let interfaces: Vec<InterfaceRow> = gathered
        .interfaces
        .iter()
        .map(|iface| InterfaceRow {
            name: iface.interface_name.clone(),
            ip_address: iface.ip_address.clone(),
            mac_address: iface.mac_address.clone(),
        })
        .collect();
    println!("{}", Table::new(interfaces));
    println!();

    let collection = &gathered.files;
    if show_files {
        let mut files: Vec<FileRow> = collection
            .files
            .iter()
            .map(|file| FileRow {
                path: file.file_path.clone(),
                size: format_size(file.size.max(0) as u64),
                compressed: format_size(file.compressed_len() as u64),
                permissions: file.permissions.clone(),
                modified: format_timestamp(file.modified_time.timestamp()),
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        println!("{}", Table::new(files));
        println!();
    }

    println!(
        "{} files captured ({} -> {}), {} skipped",
        collection.files.len(),
        format_size(collection.original_bytes()),
        format_size(collection.compressed_bytes()),
        collection.skipped.len()
    );
    Ok(())
}

fn report_rows(report: &SnapshotReport) -> Vec<ReportRow> {
    let row = |field, value: String| ReportRow { field, value };
    vec![
        row("System ID", report.system_id.to_string()),
        row("Hostname", report.hostname.clone()),
        row(
            "Interfaces",
            format!("{} stored, {} failed", report.interfaces_stored, report.interfaces_failed),
        ),
        row(
            "Files",
            format!(
                "{} stored, {} failed, {} skipped",
                report.files_stored, report.files_failed, report.files_skipped
            ),
        ),
        row(
            "Data",
            format!(
                "{} -> {}",
                format_size(report.original_bytes),
                format_size(report.compressed_bytes)
            ),
        ),
    ]
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

fn format_timestamp(timestamp: i64) -> String {
    use chrono::{Local, TimeZone};

    match Local.timestamp_opt(timestamp, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => timestamp.to_string(),
    }
}
