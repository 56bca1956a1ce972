//! OSC 1.0 wire format: NUL-padded strings on 4-byte boundaries, a `,`-prefixed type tag
//! string, big-endian arguments. Bundles are flattened into their messages.

use std::fmt;

const BUNDLE_TAG: &[u8] = b"#bundle\0";
const MAX_BUNDLE_DEPTH: usize = 8;

#[derive(Clone, Debug, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
    Blob(Vec<u8>),
    Long(i64),
    Double(f64),
    Bool(bool),
    Nil,
}

impl OscArg {
    fn tag(&self) -> u8 {
        match self {
            OscArg::Int(_) => b'i',
            OscArg::Float(_) => b'f',
            OscArg::Str(_) => b's',
            OscArg::Blob(_) => b'b',
            OscArg::Long(_) => b'h',
            OscArg::Double(_) => b'd',
            OscArg::Bool(true) => b'T',
            OscArg::Bool(false) => b'F',
            OscArg::Nil => b'N',
        }
    }

    /// Numeric view of the argument; ints and doubles are accepted where floats are expected.
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            OscArg::Float(v) => Some(v),
            OscArg::Int(v) => Some(v as f32),
            OscArg::Long(v) => Some(v as f32),
            OscArg::Double(v) => Some(v as f32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OscArg::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            OscArg::Bool(b) => Some(b),
            OscArg::Int(v) => Some(v != 0),
            _ => None,
        }
    }
}

impl fmt::Display for OscArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscArg::Int(v) => write!(f, "{}", v),
            OscArg::Float(v) => write!(f, "{}", v),
            OscArg::Str(s) => write!(f, "{:?}", s),
            OscArg::Blob(b) => write!(f, "<{} bytes>", b.len()),
            OscArg::Long(v) => write!(f, "{}", v),
            OscArg::Double(v) => write!(f, "{}", v),
            OscArg::Bool(v) => write!(f, "{}", v),
            OscArg::Nil => f.write_str("nil"),
        }
    }
}

impl From<f32> for OscArg {
    fn from(v: f32) -> Self {
        OscArg::Float(v)
    }
}

impl From<i32> for OscArg {
    fn from(v: i32) -> Self {
        OscArg::Int(v)
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

#[derive(Clone, Debug, PartialEq)]
pub struct OscMessage {
    pub addr: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(addr: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            addr: addr.into(),
            args,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DecodeError {
    Truncated,
    Unterminated,
    Utf8,
    BadAddress(String),
    MissingTypeTags,
    UnknownTag(char),
    BadBundle,
    TooDeep,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated => write!(f, "datagram ends mid-field"),
            DecodeError::Unterminated => write!(f, "string is not NUL-terminated"),
            DecodeError::Utf8 => write!(f, "string is not valid UTF-8"),
            DecodeError::BadAddress(a) => write!(f, "address must start with '/': {:?}", a),
            DecodeError::MissingTypeTags => write!(f, "type tag string missing"),
            DecodeError::UnknownTag(c) => write!(f, "unsupported type tag '{}'", c),
            DecodeError::BadBundle => write!(f, "malformed bundle element"),
            DecodeError::TooDeep => write!(f, "bundles nested too deeply"),
        }
    }
}

impl std::error::Error for DecodeError {}

#[inline]
fn pad4(n: usize) -> usize {
    (n + 3) & !3
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).ok_or(DecodeError::Truncated)?;
        let out = self.buf.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn string(&mut self) -> Result<String, DecodeError> {
        let rest = self.buf.get(self.pos..).ok_or(DecodeError::Truncated)?;
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::Unterminated)?;
        let s = std::str::from_utf8(&rest[..nul]).map_err(|_| DecodeError::Utf8)?;
        let s = s.to_string();
        // Strings sitting at the very end may omit trailing padding.
        self.pos = (self.pos + pad4(nul + 1)).min(self.buf.len());
        Ok(s)
    }

    fn blob(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = i32::from_be_bytes(self.array()?);
        let len = usize::try_from(len).map_err(|_| DecodeError::Truncated)?;
        let data = self.take(len)?.to_vec();
        let pad = pad4(len) - len;
        self.pos = (self.pos + pad).min(self.buf.len());
        Ok(data)
    }
}

fn decode_message(buf: &[u8]) -> Result<OscMessage, DecodeError> {
    let mut r = Reader::new(buf);
    let addr = r.string()?;
    if !addr.starts_with('/') {
        return Err(DecodeError::BadAddress(addr));
    }
    if r.is_empty() {
        return Ok(OscMessage::new(addr, Vec::new()));
    }
    let tags = r.string()?;
    let tags = tags.strip_prefix(',').ok_or(DecodeError::MissingTypeTags)?;
    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        let arg = match tag {
            'i' => OscArg::Int(i32::from_be_bytes(r.array()?)),
            'f' => OscArg::Float(f32::from_be_bytes(r.array()?)),
            's' => OscArg::Str(r.string()?),
            'b' => OscArg::Blob(r.blob()?),
            'h' => OscArg::Long(i64::from_be_bytes(r.array()?)),
            'd' => OscArg::Double(f64::from_be_bytes(r.array()?)),
            'T' => OscArg::Bool(true),
            'F' => OscArg::Bool(false),
            'N' => OscArg::Nil,
            other => return Err(DecodeError::UnknownTag(other)),
        };
        args.push(arg);
    }
    Ok(OscMessage { addr, args })
}

fn decode_into(buf: &[u8], depth: usize, out: &mut Vec<OscMessage>) -> Result<(), DecodeError> {
    if !buf.starts_with(BUNDLE_TAG) {
        out.push(decode_message(buf)?);
        return Ok(());
    }
    if depth >= MAX_BUNDLE_DEPTH {
        return Err(DecodeError::TooDeep);
    }
    let mut r = Reader::new(buf);
    r.take(BUNDLE_TAG.len())?;
    // Time tag; everything is applied on arrival.
    r.take(8)?;
    while !r.is_empty() {
        let len = i32::from_be_bytes(r.array()?);
        let len = usize::try_from(len).map_err(|_| DecodeError::BadBundle)?;
        if len == 0 || len % 4 != 0 {
            return Err(DecodeError::BadBundle);
        }
        let element = r.take(len)?;
        decode_into(element, depth + 1, out)?;
    }
    Ok(())
}

/// Decode one datagram into the messages it carries.
pub fn decode(buf: &[u8]) -> Result<Vec<OscMessage>, DecodeError> {
    let mut out = Vec::new();
    decode_into(buf, 0, &mut out)?;
    Ok(out)
}

fn write_str(out: &mut Vec<u8>, s: &[u8]) {
    out.extend_from_slice(s);
    let padded = pad4(s.len() + 1);
    out.resize(out.len() + (padded - s.len()), 0);
}

pub fn encode(msg: &OscMessage) -> Vec<u8> {
    let mut out = Vec::with_capacity(pad4(msg.addr.len() + 1) + 8 + msg.args.len() * 4);
    write_str(&mut out, msg.addr.as_bytes());
    let mut tags = Vec::with_capacity(msg.args.len() + 1);
    tags.push(b',');
    tags.extend(msg.args.iter().map(OscArg::tag));
    write_str(&mut out, &tags);
    for arg in &msg.args {
        match arg {
            OscArg::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            OscArg::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
            OscArg::Str(s) => write_str(&mut out, s.as_bytes()),
            OscArg::Blob(b) => {
                out.extend_from_slice(&(b.len() as i32).to_be_bytes());
                out.extend_from_slice(b);
                out.resize(out.len() + (pad4(b.len()) - b.len()), 0);
            }
            OscArg::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
            OscArg::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
            OscArg::Bool(_) | OscArg::Nil => {}
        }
    }
    out
}
