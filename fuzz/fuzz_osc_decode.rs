//! Fuzz target for the inbound OSC decoder.
//!
//! Run with: cargo +nightly fuzz run fuzz_osc_decode
//!
//! Every datagram the listener receives goes through `decode_packet`, so
//! arbitrary bytes must produce an error, never a panic or a runaway
//! allocation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use livelink_core::osc::{decode_packet, encode_message};

fuzz_target!(|data: &[u8]| {
    if let Ok(messages) = decode_packet(data) {
        for message in &messages {
            let _ = encode_message(message);
        }
    }
});
