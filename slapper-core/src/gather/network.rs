use tracing::{debug, warn};

use crate::model::NetworkInterface;
use crate::platform::HostProbe;
use crate::Result;

/// Enumerate network interfaces and capture their IPv4 and MAC addresses.
///
/// Interfaces whose address list could not be read are skipped. The call
/// fails only when the interface table itself is unavailable.
pub fn gather_network_info<P: HostProbe + ?Sized>(probe: &P) -> Result<Vec<NetworkInterface>> {
    let interfaces = probe.interfaces()?;

    let mut results = Vec::with_capacity(interfaces.len());
    for iface in interfaces {
        let addresses = match iface.addresses {
            Ok(addresses) => addresses,
            Err(reason) => {
                warn!(interface = %iface.name, %reason, "Skipping interface with unreadable addresses");
                continue;
            }
        };

        results.push(NetworkInterface::new(
            iface.name,
            first_ipv4(&addresses),
            format_mac(&iface.hardware_addr),
        ));
    }

    debug!(count = results.len(), "Gathered network interfaces");
    Ok(results)
}

/// First address that looks like IPv4, with any `/prefix` suffix removed.
pub fn first_ipv4(addresses: &[String]) -> String {
    addresses
        .iter()
        .find(|addr| addr.contains('.'))
        .and_then(|addr| addr.split('/').next())
        .unwrap_or_default()
        .to_string()
}

/// Lowercase, colon-separated hex. Empty or all-zero input renders as an empty string.
pub fn format_mac(bytes: &[u8]) -> String {
    if bytes.iter().all(|&b| b == 0) {
        return String::new();
    }
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}
