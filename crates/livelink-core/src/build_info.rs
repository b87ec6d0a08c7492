//! Build metadata embedded by `build.rs`.

/// Crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short git commit hash, or `"unknown"` outside a checkout.
pub const GIT_HASH: &str = env!("LIVELINK_GIT_HASH");

/// Cargo profile the binary was built with.
pub const BUILD_PROFILE: &str = env!("LIVELINK_BUILD_PROFILE");

/// Target triple.
pub const TARGET: &str = env!("LIVELINK_TARGET");

/// Version line for `--version`, e.g. `0.1.0 (abc1234, release)`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("LIVELINK_GIT_HASH"),
    ", ",
    env!("LIVELINK_BUILD_PROFILE"),
    ")"
);

/// One-line description for startup logs, e.g. `livelink 0.1.0 (abc1234, release) x86_64-unknown-linux-gnu`.
pub fn version_string() -> String {
    format!("livelink {LONG_VERSION} {TARGET}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_version_starts_with_version() {
        assert!(LONG_VERSION.starts_with(VERSION));
        assert!(LONG_VERSION.contains(GIT_HASH));
    }

    #[test]
    fn test_version_string_names_target() {
        let v = version_string();
        assert!(v.starts_with("livelink "));
        assert!(v.ends_with(TARGET));
    }

    #[test]
    fn test_build_profile() {
        assert!(["debug", "release"].contains(&BUILD_PROFILE));
        assert!(!TARGET.is_empty());
    }
}
