//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Tag (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload Fields
//! ```text
//! ┌──────────┬─────────────────────┐
//! │ Len (4)  │  Bytes (Len bytes)  │   string / blob field
//! └──────────┴─────────────────────┘
//! ```
//!
//! Field contents are never scanned; a value may hold any byte sequence.

use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use super::{Request, RequestType, Response, Status};
use crate::error::{GateError, Result};

/// Header size: 1 byte tag + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
///
/// Format: tag (1) + payload_len (4) + payload
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut payload = BytesMut::new();

    match request {
        Request::Register { username, password } | Request::Login { username, password } => {
            put_field(&mut payload, username.as_bytes());
            put_field(&mut payload, password.as_bytes());
        }
        Request::Get { key } => put_field(&mut payload, key.as_bytes()),
        Request::Put { key, value } => {
            put_field(&mut payload, key.as_bytes());
            put_field(&mut payload, value);
        }
        Request::MultiPut { pairs } => put_pairs(&mut payload, pairs),
        Request::MultiGet { keys } => {
            payload.put_u32(keys.len() as u32);
            for key in keys {
                put_field(&mut payload, key.as_bytes());
            }
        }
        Request::GetWhen { key, cond_key, cond_value } => {
            put_field(&mut payload, key.as_bytes());
            put_field(&mut payload, cond_key.as_bytes());
            put_field(&mut payload, cond_value);
        }
        Request::Exit => {}
    }

    frame(request.request_type() as u8, &payload)
}

/// Decode a request from a complete frame
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let (tag, payload) = split_frame(bytes)?;
    decode_request_payload(tag, payload)
}

fn decode_request_payload(tag: u8, payload: &[u8]) -> Result<Request> {
    let request_type = RequestType::from_tag(tag).ok_or_else(|| {
        GateError::Protocol(format!("Unknown request tag: 0x{:02x}", tag))
    })?;

    let mut fields = FieldReader::new(payload, request_type_name(request_type));

    let request = match request_type {
        RequestType::Register => Request::Register {
            username: fields.string("username")?,
            password: fields.string("password")?,
        },
        RequestType::Login => Request::Login {
            username: fields.string("username")?,
            password: fields.string("password")?,
        },
        RequestType::Get => Request::Get {
            key: fields.string("key")?,
        },
        RequestType::Put => Request::Put {
            key: fields.string("key")?,
            value: fields.bytes("value")?,
        },
        RequestType::MultiPut => Request::MultiPut {
            pairs: fields.pairs()?,
        },
        RequestType::MultiGet => {
            let count = fields.count("key count", 4)?;
            let mut keys = Vec::with_capacity(count);
            for _ in 0..count {
                keys.push(fields.string("key")?);
            }
            Request::MultiGet { keys }
        }
        RequestType::GetWhen => Request::GetWhen {
            key: fields.string("key")?,
            cond_key: fields.string("condition key")?,
            cond_value: fields.bytes("condition value")?,
        },
        RequestType::Exit => Request::Exit,
    };

    fields.finish()?;
    Ok(request)
}

fn request_type_name(request_type: RequestType) -> &'static str {
    match request_type {
        RequestType::Get => "GET",
        RequestType::Put => "PUT",
        RequestType::MultiPut => "MULTIPUT",
        RequestType::MultiGet => "MULTIGET",
        RequestType::GetWhen => "GETWHEN",
        RequestType::Exit => "EXIT",
        RequestType::Register => "REGISTER",
        RequestType::Login => "LOGIN",
    }
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut payload = BytesMut::new();

    match response {
        Response::Ack(message) | Response::Error(message) => {
            put_field(&mut payload, message.as_bytes())
        }
        Response::NotFound => {}
        Response::Value(value) => put_field(&mut payload, value),
        Response::Values(pairs) => put_pairs(&mut payload, pairs),
        Response::Auth { success, message } => {
            payload.put_u8(u8::from(*success));
            put_field(&mut payload, message.as_bytes());
        }
    }

    frame(response.status() as u8, &payload)
}

/// Payload size `encode_response` would produce, without encoding
///
/// Lets the dispatcher refuse a reply that no peer could decode.
pub fn response_payload_len(response: &Response) -> usize {
    match response {
        Response::Ack(message) | Response::Error(message) => 4 + message.len(),
        Response::NotFound => 0,
        Response::Value(value) => 4 + value.len(),
        Response::Values(pairs) => {
            4 + pairs
                .iter()
                .map(|(key, value)| 8 + key.len() + value.len())
                .sum::<usize>()
        }
        Response::Auth { message, .. } => 1 + 4 + message.len(),
    }
}

/// Decode a response from a complete frame
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (tag, payload) = split_frame(bytes)?;
    decode_response_payload(tag, payload)
}

fn decode_response_payload(tag: u8, payload: &[u8]) -> Result<Response> {
    let status = Status::from_tag(tag).ok_or_else(|| {
        GateError::Protocol(format!("Unknown response status: 0x{:02x}", tag))
    })?;

    let mut fields = FieldReader::new(payload, "response");

    let response = match status {
        Status::Ack => Response::Ack(fields.string("message")?),
        Status::NotFound => Response::NotFound,
        Status::Error => Response::Error(fields.string("message")?),
        Status::Value => Response::Value(fields.bytes("value")?),
        Status::Values => Response::Values(fields.pairs()?),
        Status::Auth => {
            let success = match fields.u8("success flag")? {
                0 => false,
                1 => true,
                other => {
                    return Err(GateError::Protocol(format!(
                        "Invalid auth success flag: {}",
                        other
                    )))
                }
            };
            Response::Auth {
                success,
                message: fields.string("message")?,
            }
        }
    };

    fields.finish()?;
    Ok(response)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete request from a stream
///
/// Returns `Ok(None)` when the stream ends cleanly between frames.
pub fn read_request<R: Read>(reader: &mut R) -> Result<Option<Request>> {
    match read_frame(reader)? {
        Some((tag, payload)) => decode_request_payload(tag, &payload).map(Some),
        None => Ok(None),
    }
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let bytes = encode_request(request);
    check_frame_size(&bytes)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    match read_frame(reader)? {
        Some((tag, payload)) => decode_response_payload(tag, &payload),
        None => Err(GateError::Io(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            "connection closed before response",
        ))),
    }
}

/// Write a response to a stream
///
/// Frames whose payload exceeds `MAX_PAYLOAD_SIZE` are refused before
/// anything is written, so the stream stays in sync.
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response);
    check_frame_size(&bytes)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame: `None` on EOF before the first header byte,
/// a protocol error if the stream ends anywhere inside the frame.
fn read_frame<R: Read>(reader: &mut R) -> Result<Option<(u8, Vec<u8>)>> {
    let mut tag = [0u8; 1];
    loop {
        match reader.read(&mut tag) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let mut len = [0u8; 4];
    read_exact_or_truncated(reader, &mut len, "header")?;
    let payload_len = u32::from_be_bytes(len);

    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(GateError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let mut payload = vec![0u8; payload_len as usize];
    if payload_len > 0 {
        read_exact_or_truncated(reader, &mut payload, "payload")?;
    }

    Ok(Some((tag[0], payload)))
}

fn read_exact_or_truncated<R: Read>(reader: &mut R, buf: &mut [u8], part: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            GateError::TruncatedFrame(part.to_string())
        } else {
            GateError::Io(e)
        }
    })
}

// =============================================================================
// Private Helpers
// =============================================================================

fn check_frame_size(frame: &[u8]) -> Result<()> {
    let payload_len = frame.len() - HEADER_SIZE;
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(GateError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

fn frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(tag);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(payload);
    message
}

/// Validate the header of an in-memory frame and return (tag, payload)
fn split_frame(bytes: &[u8]) -> Result<(u8, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(GateError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let tag = bytes[0];
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);

    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(GateError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len as usize;
    if bytes.len() < total_len {
        return Err(GateError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }
    if bytes.len() > total_len {
        return Err(GateError::Protocol(format!(
            "Trailing bytes after frame: {}",
            bytes.len() - total_len
        )));
    }

    Ok((tag, &bytes[HEADER_SIZE..total_len]))
}

fn put_field(buf: &mut BytesMut, field: &[u8]) {
    buf.put_u32(field.len() as u32);
    buf.put_slice(field);
}

fn put_pairs(buf: &mut BytesMut, pairs: &[(String, Vec<u8>)]) {
    buf.put_u32(pairs.len() as u32);
    for (key, value) in pairs {
        put_field(buf, key.as_bytes());
        put_field(buf, value);
    }
}

/// Sequential reader over the length-prefixed fields of one payload
struct FieldReader<'a> {
    buf: &'a [u8],
    context: &'static str,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8], context: &'static str) -> Self {
        Self { buf, context }
    }

    fn u8(&mut self, field: &str) -> Result<u8> {
        if self.buf.remaining() < 1 {
            return Err(self.missing(field));
        }
        Ok(self.buf.get_u8())
    }

    fn u32(&mut self, field: &str) -> Result<u32> {
        if self.buf.remaining() < 4 {
            return Err(self.missing(field));
        }
        Ok(self.buf.get_u32())
    }

    /// Read an element count; `min_element_size` bounds the preallocation
    fn count(&mut self, field: &str, min_element_size: usize) -> Result<usize> {
        let count = self.u32(field)? as usize;
        if count.saturating_mul(min_element_size) > self.buf.remaining() {
            return Err(GateError::Protocol(format!(
                "{} frame: {} of {} cannot fit in {} remaining bytes",
                self.context,
                field,
                count,
                self.buf.remaining()
            )));
        }
        Ok(count)
    }

    fn bytes(&mut self, field: &str) -> Result<Vec<u8>> {
        let len = self.u32(field)? as usize;
        if self.buf.remaining() < len {
            return Err(GateError::Protocol(format!(
                "{} frame: incomplete {} (expected {}, got {})",
                self.context,
                field,
                len,
                self.buf.remaining()
            )));
        }
        let value = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(value)
    }

    fn string(&mut self, field: &str) -> Result<String> {
        let raw = self.bytes(field)?;
        String::from_utf8(raw).map_err(|_| {
            GateError::Protocol(format!("{} frame: {} is not valid UTF-8", self.context, field))
        })
    }

    fn pairs(&mut self) -> Result<Vec<(String, Vec<u8>)>> {
        let count = self.count("pair count", 8)?;
        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let key = self.string("key")?;
            let value = self.bytes("value")?;
            pairs.push((key, value));
        }
        Ok(pairs)
    }

    fn finish(self) -> Result<()> {
        if self.buf.has_remaining() {
            return Err(GateError::Protocol(format!(
                "{} frame: unexpected {} trailing bytes",
                self.context,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn missing(&self, field: &str) -> GateError {
        GateError::Protocol(format!("{} frame: missing {}", self.context, field))
    }
}
