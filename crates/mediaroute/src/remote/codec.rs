// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefixed JSON framing.
//!
//! Frame: 4-byte big-endian payload length, then the JSON payload.

use crate::error::ProtocolError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{ErrorKind, Read, Write};

/// Default cap on a single frame payload.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

const HEADER_LEN: usize = 4;

/// Serialize `msg` into a complete frame.
pub fn encode_frame<T: Serialize>(msg: &T, max_size: usize) -> Result<Vec<u8>, ProtocolError> {
    let payload = serde_json::to_vec(msg)?;
    if payload.len() > max_size {
        return Err(ProtocolError::FrameTooLarge {
            size: payload.len(),
            max: max_size,
        });
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Check a frame header and return the payload length.
pub fn payload_len(header: [u8; 4], max_size: usize) -> Result<usize, ProtocolError> {
    let len = u32::from_be_bytes(header) as usize;
    if len > max_size {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: max_size,
        });
    }
    Ok(len)
}

/// Decode the payload of one frame.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Decode one frame from the front of `buf`.
///
/// Returns the message and the number of bytes consumed, or `None` if `buf`
/// does not yet hold a full frame.
pub fn decode_frame<T: DeserializeOwned>(
    buf: &[u8],
    max_size: usize,
) -> Result<Option<(T, usize)>, ProtocolError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let len = payload_len([buf[0], buf[1], buf[2], buf[3]], max_size)?;
    let end = HEADER_LEN + len;
    if buf.len() < end {
        return Ok(None);
    }
    let msg = decode_payload(&buf[HEADER_LEN..end])?;
    Ok(Some((msg, end)))
}

/// Blocking read of one frame. `Ok(None)` on clean end of stream.
pub fn read_frame<R: Read, T: DeserializeOwned>(
    reader: &mut R,
    max_size: usize,
) -> Result<Option<T>, ProtocolError> {
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = payload_len(header, max_size)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            ProtocolError::Truncated {
                needed: len,
                available: 0,
            }
        } else {
            e.into()
        }
    })?;
    decode_payload(&payload).map(Some)
}

/// Blocking write of one frame.
pub fn write_frame<W: Write, T: Serialize>(
    writer: &mut W,
    msg: &T,
    max_size: usize,
) -> Result<(), ProtocolError> {
    let frame = encode_frame(msg, max_size)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}
