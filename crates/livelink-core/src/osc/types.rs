//! OSC message and argument types.

use std::fmt;
use std::net::SocketAddr;

use serde::Serialize;

/// A single OSC argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OscArg {
    /// `i`: 32-bit signed integer.
    Int(i32),
    /// `f`: 32-bit float.
    Float(f32),
    /// `s`: string.
    Str(String),
    /// `b`: opaque byte blob.
    Blob(Vec<u8>),
    /// `h`: 64-bit signed integer.
    Long(i64),
    /// `d`: 64-bit float.
    Double(f64),
    /// `T` / `F`: boolean, carried entirely in the type tag.
    Bool(bool),
    /// `N`: nil.
    Nil,
}

impl OscArg {
    /// The OSC type tag character for this argument.
    pub fn tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Str(_) => 's',
            OscArg::Blob(_) => 'b',
            OscArg::Long(_) => 'h',
            OscArg::Double(_) => 'd',
            OscArg::Bool(true) => 'T',
            OscArg::Bool(false) => 'F',
            OscArg::Nil => 'N',
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            OscArg::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            OscArg::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OscArg::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for OscArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscArg::Int(v) => write!(f, "{v}"),
            OscArg::Float(v) => write!(f, "{v}"),
            OscArg::Str(v) => write!(f, "{v:?}"),
            OscArg::Blob(v) => write!(f, "<blob {} bytes>", v.len()),
            OscArg::Long(v) => write!(f, "{v}"),
            OscArg::Double(v) => write!(f, "{v}"),
            OscArg::Bool(v) => write!(f, "{v}"),
            OscArg::Nil => f.write_str("nil"),
        }
    }
}

impl From<i32> for OscArg {
    fn from(v: i32) -> Self {
        OscArg::Int(v)
    }
}

impl From<f32> for OscArg {
    fn from(v: f32) -> Self {
        OscArg::Float(v)
    }
}

impl From<i64> for OscArg {
    fn from(v: i64) -> Self {
        OscArg::Long(v)
    }
}

impl From<f64> for OscArg {
    fn from(v: f64) -> Self {
        OscArg::Double(v)
    }
}

impl From<bool> for OscArg {
    fn from(v: bool) -> Self {
        OscArg::Bool(v)
    }
}

impl From<&str> for OscArg {
    fn from(v: &str) -> Self {
        OscArg::Str(v.to_string())
    }
}

impl From<String> for OscArg {
    fn from(v: String) -> Self {
        OscArg::Str(v)
    }
}

impl From<Vec<u8>> for OscArg {
    fn from(v: Vec<u8>) -> Self {
        OscArg::Blob(v)
    }
}

/// An OSC message: an address pattern plus its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    /// Create a message with no arguments.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument (builder style).
    pub fn arg(mut self, arg: impl Into<OscArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments (builder style).
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OscArg>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The type-tag string for this message, including the leading comma.
    pub fn type_tags(&self) -> String {
        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(',');
        tags.extend(self.args.iter().map(OscArg::tag));
        tags
    }
}

impl From<&str> for OscMessage {
    fn from(address: &str) -> Self {
        OscMessage::new(address)
    }
}

impl From<String> for OscMessage {
    fn from(address: String) -> Self {
        OscMessage::new(address)
    }
}

/// A decoded message as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Address the message was sent to.
    pub address: String,

    /// Type-tag string as received (e.g. `",if"`).
    pub tags: String,

    /// Decoded arguments.
    pub args: Vec<OscArg>,

    /// Datagram source.
    pub source: SocketAddr,
}

impl InboundMessage {
    /// Wrap a decoded message with the address it came from.
    pub fn from_message(message: OscMessage, source: SocketAddr) -> Self {
        let tags = message.type_tags();
        Self {
            address: message.address,
            tags,
            args: message.args,
            source,
        }
    }
}
