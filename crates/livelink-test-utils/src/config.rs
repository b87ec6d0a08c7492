//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values, and
//! [`TempConfig`] when the code under test loads configuration from disk.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use livelink_config::AppConfig;
use tempfile::TempDir;

/// Fluent builder for [`AppConfig`] in tests.
///
/// Defaults to an ephemeral listener port so tests never collide on 9001.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .remote(peer.addr())
///     .timeout_ms(200)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.listener.port = 0;
        Self { config }
    }

    /// Point the remote at a concrete socket address.
    pub fn remote(mut self, addr: SocketAddr) -> Self {
        self.config.remote.host = addr.ip().to_string();
        self.config.remote.port = addr.port();
        self
    }

    pub fn remote_port(mut self, port: u16) -> Self {
        self.config.remote.port = port;
        self
    }

    pub fn listen_host(mut self, host: &str) -> Self {
        self.config.listener.host = host.to_string();
        self
    }

    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.listener.port = port;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.query.timeout_ms = ms;
        self
    }

    pub fn beat_address(mut self, address: &str) -> Self {
        self.config.query.beat_address = address.to_string();
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A TOML config file in a temp directory, deleted on drop.
pub struct TempConfig {
    path: PathBuf,
    _dir: TempDir,
}

impl TempConfig {
    /// Write `toml_content` to a fresh `livelink.toml`.
    pub fn with_toml(toml_content: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("livelink.toml");
        std::fs::write(&path, toml_content).expect("failed to write test config");
        Self { path, _dir: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file through the real config loader.
    pub async fn load(&self) -> AppConfig {
        AppConfig::load(&self.path)
            .await
            .expect("failed to parse test config")
    }
}
