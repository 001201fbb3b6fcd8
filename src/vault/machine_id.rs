//! Machine identity used as the HMAC key for vault key derivation.

use std::path::Path;

use tracing::{debug, warn};

/// Fixed key material used when the host has no stable identity.
const UNAVAILABLE_SENTINEL: &str = "notAMachine";

#[cfg(not(target_os = "macos"))]
const OS_MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];
const CGROUP_PATH: &str = "/proc/self/cgroup";

/// Where the host identity came from.
///
/// `Unavailable` still yields usable key material, but anyone with the
/// password can open the vault on any other identity-less host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineIdentity {
    Os(String),
    Container(String),
    Unavailable,
}

impl MachineIdentity {
    /// Probe the OS identity first, then the container cgroup.
    pub fn detect() -> Self {
        let identity = Self::from_sources(read_os_machine_id(), read_container_id());
        debug!(kind = identity.kind(), "machine identity detected");
        identity
    }

    pub(crate) fn from_sources(os: Option<String>, container: Option<String>) -> Self {
        match (os, container) {
            (Some(id), _) => MachineIdentity::Os(id),
            (None, Some(id)) => MachineIdentity::Container(id),
            (None, None) => MachineIdentity::Unavailable,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MachineIdentity::Os(_) => "os",
            MachineIdentity::Container(_) => "container",
            MachineIdentity::Unavailable => "unavailable",
        }
    }

    /// Bytes used as the HMAC key.
    pub fn key_material(&self) -> &[u8] {
        match self {
            MachineIdentity::Os(id) | MachineIdentity::Container(id) => id.as_bytes(),
            MachineIdentity::Unavailable => {
                warn!(
                    "no machine identity available, the vault key depends on the password only"
                );
                UNAVAILABLE_SENTINEL.as_bytes()
            }
        }
    }
}

/// Extract a docker container id from the contents of `/proc/self/cgroup`.
pub fn parse_container_id(cgroup: &str) -> Option<String> {
    cgroup.lines().find_map(|line| {
        let mut parts = line.splitn(2, "/docker/");
        parts.next()?;
        let id = parts.next()?.trim();
        if id.is_empty() || id.contains("/docker/") {
            None
        } else {
            Some(id.to_string())
        }
    })
}

#[cfg_attr(target_os = "macos", allow(dead_code))]
fn read_trimmed(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn read_container_id() -> Option<String> {
    let cgroup = std::fs::read_to_string(CGROUP_PATH).ok()?;
    parse_container_id(&cgroup)
}

#[cfg(target_os = "macos")]
fn read_os_machine_id() -> Option<String> {
    let output = std::process::Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()
        .ok()?;
    let text = String::from_utf8_lossy(&output.stdout);
    text.lines()
        .find(|line| line.contains("IOPlatformUUID"))
        .and_then(|line| line.split('"').nth(3))
        .map(str::to_string)
}

#[cfg(not(target_os = "macos"))]
fn read_os_machine_id() -> Option<String> {
    OS_MACHINE_ID_PATHS
        .iter()
        .find_map(|path| read_trimmed(Path::new(path)))
}
