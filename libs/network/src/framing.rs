//! Line framing
//!
//! Ingress frames are newline terminated; a trailing carriage return is not
//! part of the frame. Egress frames are terminated by CRLF.

use bytes::{BufMut, Bytes, BytesMut};

pub const CRLF: &[u8] = b"\r\n";

/// Append CRLF to `body`
pub fn encode_line(body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(body.len() + CRLF.len());
    buf.put_slice(body);
    buf.put_slice(CRLF);
    buf.freeze()
}

/// Strip the line terminator (`\n`, `\r\n` or a stray `\r`) from a frame
pub fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
