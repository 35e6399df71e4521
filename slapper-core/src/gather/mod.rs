/*!
Collectors that describe the host.

Each collector runs independently and hands back plain records; none of them
touch storage. File- and interface-level problems are absorbed here and never
surface as errors.
*/

pub mod files;
pub mod network;
pub mod system;

pub use files::{
    gather_config_files, resolve_roots, FileCollection, FileCollector, SkipReason, SkippedFile,
    WalkOutcome, MAX_FILE_SIZE,
};
pub use network::gather_network_info;
pub use system::gather_system_info;
