/*!
Facts about the host the collectors run on.

Collectors never read ambient process state themselves. Environment-derived
facts are captured once in [`PlatformFacts`], and anything that asks the
operating system (hostname, interface table) goes through [`HostProbe`], so
both can be replaced in tests.
*/

use std::env;
use std::path::PathBuf;

use crate::Result;

/// Home directory used when neither `HOME` nor the executable path is known
pub const FALLBACK_HOME: &str = "/tmp";

/// Environment-derived inputs for directory resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformFacts {
    /// Value of `HOME`, if set and non-empty
    pub home: Option<PathBuf>,
    /// Path of the running executable, if it can be determined
    pub executable: Option<PathBuf>,
}

impl PlatformFacts {
    /// Capture the facts from the current process environment
    pub fn from_env() -> Self {
        Self {
            home: env::var_os("HOME")
                .filter(|home| !home.is_empty())
                .map(PathBuf::from),
            executable: env::current_exe().ok(),
        }
    }

    /// Resolve the home directory
    ///
    /// Falls back to the directory containing the executable, then to
    /// [`FALLBACK_HOME`].
    pub fn resolve_home(&self) -> PathBuf {
        if let Some(home) = self.home.as_ref().filter(|h| !h.as_os_str().is_empty()) {
            return home.clone();
        }

        self.executable
            .as_ref()
            .and_then(|exe| exe.parent())
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(FALLBACK_HOME))
    }
}

/// One entry of the host's interface table, before any filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInterface {
    pub name: String,
    /// Link-layer address bytes; empty when the interface has none
    pub hardware_addr: Vec<u8>,
    /// Addresses in `ip/prefix` form, or the reason they could not be read
    pub addresses: std::result::Result<Vec<String>, String>,
}

/// Normalise a raw link-layer address into a hardware address.
///
/// All-zero addresses (loopback) and the 4- or 16-byte IP addresses that
/// tunnel interfaces report at the link layer yield an empty address.
pub fn hardware_address(raw: &[u8]) -> Vec<u8> {
    if matches!(raw.len(), 4 | 16) || raw.iter().all(|&b| b == 0) {
        return Vec::new();
    }
    raw.to_vec()
}

/// Operating-system queries needed by the system and network collectors
#[cfg_attr(test, mockall::automock)]
pub trait HostProbe {
    /// Name the host reports for itself
    fn hostname(&self) -> Result<String>;

    /// Every network interface known to the host
    fn interfaces(&self) -> Result<Vec<RawInterface>>;
}

/// [`HostProbe`] backed by the local operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHost;

#[cfg(unix)]
impl HostProbe for LocalHost {
    fn hostname(&self) -> Result<String> {
        unix::hostname()
    }

    fn interfaces(&self) -> Result<Vec<RawInterface>> {
        unix::interfaces()
    }
}

#[cfg(not(unix))]
impl HostProbe for LocalHost {
    fn hostname(&self) -> Result<String> {
        env::var("COMPUTERNAME")
            .map_err(|_| crate::SnapshotError::platform("hostname is not available"))
    }

    fn interfaces(&self) -> Result<Vec<RawInterface>> {
        Err(crate::SnapshotError::platform(
            "interface enumeration is only implemented for unix hosts",
        ))
    }
}

#[cfg(unix)]
mod unix {
    use std::ffi::CStr;
    use std::io;
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::RawInterface;
    use crate::{Result, SnapshotError};

    pub(super) fn hostname() -> Result<String> {
        let mut buf = vec![0u8; 256];
        // SAFETY: buf is valid for buf.len() bytes for the duration of the call.
        let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
        if rc != 0 {
            return Err(SnapshotError::platform(format!(
                "gethostname failed: {}",
                io::Error::last_os_error()
            )));
        }

        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let name = String::from_utf8_lossy(&buf[..end]).into_owned();
        if name.is_empty() {
            return Err(SnapshotError::platform("gethostname returned an empty name"));
        }
        Ok(name)
    }

    pub(super) fn interfaces() -> Result<Vec<RawInterface>> {
        let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
        // SAFETY: getifaddrs only writes the list head on success.
        if unsafe { libc::getifaddrs(&mut head) } != 0 {
            return Err(SnapshotError::platform(format!(
                "getifaddrs failed: {}",
                io::Error::last_os_error()
            )));
        }

        let mut result: Vec<RawInterface> = Vec::new();
        let mut cursor = head;
        while !cursor.is_null() {
            // SAFETY: cursor is a node of the list returned by getifaddrs,
            // which stays valid until freeifaddrs below.
            let entry = unsafe { &*cursor };
            cursor = entry.ifa_next;

            if entry.ifa_name.is_null() {
                continue;
            }
            let name = unsafe { CStr::from_ptr(entry.ifa_name) }
                .to_string_lossy()
                .into_owned();

            let index = match result.iter().position(|iface| iface.name == name) {
                Some(index) => index,
                None => {
                    result.push(RawInterface {
                        name,
                        hardware_addr: Vec::new(),
                        addresses: Ok(Vec::new()),
                    });
                    result.len() - 1
                }
            };

            if entry.ifa_addr.is_null() {
                continue;
            }
            let iface = &mut result[index];
            // SAFETY: ifa_addr and ifa_netmask point at sockaddr structures
            // whose concrete type is given by sa_family.
            unsafe { record_address(iface, entry) };
        }

        // SAFETY: head came from a successful getifaddrs call.
        unsafe { libc::freeifaddrs(head) };
        Ok(result)
    }

    unsafe fn record_address(iface: &mut RawInterface, entry: &libc::ifaddrs) {
        let family = (*entry.ifa_addr).sa_family as libc::c_int;
        match family {
            libc::AF_INET => {
                let sin = &*(entry.ifa_addr as *const libc::sockaddr_in);
                let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
                let prefix = if entry.ifa_netmask.is_null() {
                    32
                } else {
                    let mask = &*(entry.ifa_netmask as *const libc::sockaddr_in);
                    u32::from_be(mask.sin_addr.s_addr).count_ones()
                };
                if let Ok(addrs) = iface.addresses.as_mut() {
                    addrs.push(format!("{ip}/{prefix}"));
                }
            }
            libc::AF_INET6 => {
                let sin6 = &*(entry.ifa_addr as *const libc::sockaddr_in6);
                let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
                let prefix = if entry.ifa_netmask.is_null() {
                    128
                } else {
                    let mask = &*(entry.ifa_netmask as *const libc::sockaddr_in6);
                    mask.sin6_addr.s6_addr.iter().map(|b| b.count_ones()).sum::<u32>()
                };
                if let Ok(addrs) = iface.addresses.as_mut() {
                    addrs.push(format!("{ip}/{prefix}"));
                }
            }
            #[cfg(any(target_os = "linux", target_os = "android"))]
            libc::AF_PACKET => {
                let sll = &*(entry.ifa_addr as *const libc::sockaddr_ll);
                let len = (sll.sll_halen as usize).min(sll.sll_addr.len());
                iface.hardware_addr = super::hardware_address(&sll.sll_addr[..len]);
            }
            #[cfg(any(target_os = "macos", target_os = "ios"))]
            libc::AF_LINK => {
                let sdl = entry.ifa_addr as *const libc::sockaddr_dl;
                let name_len = (*sdl).sdl_nlen as usize;
                let addr_len = (*sdl).sdl_alen as usize;
                let data = (*sdl).sdl_data.as_ptr() as *const u8;
                iface.hardware_addr =
                    super::hardware_address(std::slice::from_raw_parts(data.add(name_len), addr_len));
            }
            _ => {}
        }
    }
}
