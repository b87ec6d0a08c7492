//! OSC 1.0 wire encoding and decoding.
//!
//! Strings are NUL-terminated and zero-padded to a 4-byte boundary, numbers
//! are big-endian. Bundles are flattened into their messages in order; the
//! bundle time tag is not interpreted.

use super::types::{OscArg, OscMessage};

const BUNDLE_TAG: &[u8] = b"#bundle\0";

/// Errors from encoding or decoding OSC packets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("packet truncated: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("string at offset {0} is not NUL-terminated")]
    UnterminatedString(usize),

    #[error("string at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    #[error("address must start with '/', got {0:?}")]
    InvalidAddress(String),

    #[error("unsupported type tag {0:?}")]
    UnsupportedTag(char),

    #[error("invalid size {size} at offset {offset}")]
    InvalidSize { offset: usize, size: i32 },

    #[error("bundles nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Maximum bundle nesting accepted by [`decode_packet`].
const MAX_BUNDLE_DEPTH: usize = 8;

/// Encode a message into a single datagram payload.
pub fn encode_message(msg: &OscMessage) -> Result<Vec<u8>, CodecError> {
    if !msg.address.starts_with('/') {
        return Err(CodecError::InvalidAddress(msg.address.clone()));
    }

    let mut buf = Vec::with_capacity(msg.address.len() + 8 + msg.args.len() * 8);
    write_str(&mut buf, &msg.address);
    write_str(&mut buf, &msg.type_tags());

    for arg in &msg.args {
        match arg {
            OscArg::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscArg::Float(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscArg::Str(v) => write_str(&mut buf, v),
            OscArg::Blob(v) => {
                let len = i32::try_from(v.len()).map_err(|_| CodecError::InvalidSize {
                    offset: buf.len(),
                    size: i32::MAX,
                })?;
                buf.extend_from_slice(&len.to_be_bytes());
                buf.extend_from_slice(v);
                pad(&mut buf);
            }
            OscArg::Long(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscArg::Double(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscArg::Bool(_) | OscArg::Nil => {}
        }
    }

    Ok(buf)
}

/// Decode a datagram into the messages it carries.
///
/// A plain message yields one element; a bundle yields every message it
/// contains, depth first.
pub fn decode_packet(data: &[u8]) -> Result<Vec<OscMessage>, CodecError> {
    let mut out = Vec::new();
    decode_into(data, 0, &mut out)?;
    Ok(out)
}

fn decode_into(data: &[u8], depth: usize, out: &mut Vec<OscMessage>) -> Result<(), CodecError> {
    if data.starts_with(BUNDLE_TAG) {
        if depth >= MAX_BUNDLE_DEPTH {
            return Err(CodecError::TooDeep(MAX_BUNDLE_DEPTH));
        }
        let mut reader = Reader::new(data);
        reader.take(BUNDLE_TAG.len())?;
        reader.take(8)?; // time tag
        while !reader.is_empty() {
            let offset = reader.pos;
            let size = reader.i32()?;
            if size < 0 || size % 4 != 0 {
                return Err(CodecError::InvalidSize { offset, size });
            }
            let element = reader.take(size as usize)?;
            decode_into(element, depth + 1, out)?;
        }
        return Ok(());
    }

    out.push(decode_message(data)?);
    Ok(())
}

/// Decode a single (non-bundle) message.
pub fn decode_message(data: &[u8]) -> Result<OscMessage, CodecError> {
    let mut reader = Reader::new(data);
    let address = reader.string()?;
    if !address.starts_with('/') {
        return Err(CodecError::InvalidAddress(address));
    }

    // Senders predating type tags may omit them entirely.
    if reader.is_empty() {
        return Ok(OscMessage::new(address));
    }

    let tags = reader.string()?;
    let Some(tags) = tags.strip_prefix(',') else {
        return Err(CodecError::UnsupportedTag(tags.chars().next().unwrap_or('\0')));
    };

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        let arg = match tag {
            'i' => OscArg::Int(reader.i32()?),
            'f' => OscArg::Float(f32::from_be_bytes(reader.array()?)),
            's' => OscArg::Str(reader.string()?),
            'b' => {
                let offset = reader.pos;
                let size = reader.i32()?;
                if size < 0 {
                    return Err(CodecError::InvalidSize { offset, size });
                }
                let bytes = reader.take(size as usize)?.to_vec();
                reader.skip_padding(size as usize)?;
                OscArg::Blob(bytes)
            }
            'h' => OscArg::Long(i64::from_be_bytes(reader.array()?)),
            'd' => OscArg::Double(f64::from_be_bytes(reader.array()?)),
            'T' => OscArg::Bool(true),
            'F' => OscArg::Bool(false),
            'N' => OscArg::Nil,
            other => return Err(CodecError::UnsupportedTag(other)),
        };
        args.push(arg);
    }

    Ok(OscMessage { address, args })
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    pad(buf);
}

fn pad(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or(CodecError::Truncated {
                offset: self.pos,
                needed: n,
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn skip_padding(&mut self, len: usize) -> Result<(), CodecError> {
        self.take(padded_len(len) - len).map(|_| ())
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let start = self.pos;
        let rest = &self.data[start.min(self.data.len())..];
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(CodecError::UnterminatedString(start))?;
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|_| CodecError::InvalidUtf8(start))?
            .to_string();
        self.take(padded_len(nul + 1))?;
        Ok(s)
    }
}
