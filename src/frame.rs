use bytes::Bytes;
use std::fmt;

static LF: &[u8; 1] = b"\n";

/// Exactly one frame is written back for every request line.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// A success payload. An empty payload is rendered as `OK`.
    Ok(String),
    /// A textual error description, rendered as `ERR <description>`.
    Error(String),
}

impl Frame {
    pub fn ok() -> Frame {
        Frame::Ok("OK".to_string())
    }

    pub fn error(err: impl fmt::Display) -> Frame {
        Frame::Error(err.to_string())
    }

    pub fn serialize(&self) -> Bytes {
        let line = self.to_string();
        let mut bytes = Vec::with_capacity(line.len() + LF.len());
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(LF);
        Bytes::from(bytes)
    }
}

impl From<Frame> for Bytes {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Ok(s) if s.is_empty() => write!(f, "OK"),
            Frame::Ok(s) => write!(f, "{}", s),
            Frame::Error(s) => write!(f, "ERR {}", s),
        }
    }
}
