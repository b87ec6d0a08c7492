//! OSC (Open Sound Control) messages and their wire format.
//!
//! Only the subset spoken by Live's remote scripts is supported: the OSC 1.0
//! argument types plus the common `h`/`d`/`T`/`F`/`N` extensions, and bundles
//! on the receive side.

pub mod codec;
pub mod types;

pub use codec::{CodecError, decode_message, decode_packet, encode_message};
pub use types::{InboundMessage, OscArg, OscMessage};
