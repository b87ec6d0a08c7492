//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Any config that parses must render back to TOML that parses to the same
//! settings, so `livelink config --show` output can be fed back in.

#![no_main]

use libfuzzer_sys::fuzz_target;
use livelink_config::AppConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = AppConfig::parse(s) else {
        return;
    };

    let rendered = toml::to_string(&config).expect("parsed config must render");
    let reparsed = AppConfig::parse(&rendered).expect("rendered config must parse");

    assert_eq!(reparsed.remote.host, config.remote.host);
    assert_eq!(reparsed.remote.port, config.remote.port);
    assert_eq!(reparsed.listener.host, config.listener.host);
    assert_eq!(reparsed.listener.port, config.listener.port);
    assert_eq!(
        reparsed.listener.max_receive_errors,
        config.listener.max_receive_errors
    );
    assert_eq!(reparsed.query.timeout_ms, config.query.timeout_ms);
    assert_eq!(reparsed.query.beat_address, config.query.beat_address);
    assert_eq!(reparsed.logging.level, config.logging.level);
    assert_eq!(
        toml::to_string(&reparsed).expect("reparsed config must render"),
        rendered
    );
});
