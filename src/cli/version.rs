//! Version command for sts-wire.
//!
//! Displays the build metadata block, also embedded in diagnostic reports.

/// The current version of sts-wire, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit the binary was built from, when the build exported it.
pub const GIT_COMMIT: &str = match option_env!("STS_WIRE_GIT_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

/// Version label of the packaged mount executable.
pub const RCLONE_VERSION: &str = match option_env!("STS_WIRE_RCLONE_VERSION") {
    Some(version) => version,
    None => "system",
};

pub const DIVIDER: &str = "========================================";

/// The multi-line version block.
pub fn version_block() -> String {
    format!(
        "{divider}\n Version:\t\t{}\n Git Commit:\t\t{}\n OS/Arch:\t\t{}/{}\n Rclone Version:\t{}\n{divider}\n",
        VERSION,
        GIT_COMMIT,
        std::env::consts::OS,
        std::env::consts::ARCH,
        RCLONE_VERSION,
        divider = DIVIDER,
    )
}

/// Handle the `version` command.
///
/// Prints the version block and exits successfully.
pub fn handle_version_command() -> ! {
    print!("{}", version_block());
    std::process::exit(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_not_empty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_version_block_fields() {
        let block = version_block();
        assert!(block.starts_with(DIVIDER));
        assert!(block.contains(&format!("Version:\t\t{}", VERSION)));
        assert!(block.contains("Git Commit:"));
        assert!(block.contains(std::env::consts::ARCH));
        assert!(block.contains("Rclone Version:"));
    }
}
