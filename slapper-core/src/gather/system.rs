use tracing::debug;

use crate::model::SystemInfo;
use crate::platform::HostProbe;
use crate::Result;

/// Collect the hostname and the current UTC time.
///
/// Fails only when the platform cannot report a hostname.
pub fn gather_system_info<P: HostProbe + ?Sized>(probe: &P) -> Result<SystemInfo> {
    let hostname = probe.hostname()?;
    debug!(%hostname, "Gathered system info");
    Ok(SystemInfo::new(hostname))
}
