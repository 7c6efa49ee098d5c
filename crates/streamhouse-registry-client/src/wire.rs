//! Schema-tagged wire envelope
//!
//! Format: `[magic_byte(1)][registry_id(4, big-endian)][payload(N)]`
//!
//! The codec only splits and joins the envelope. Checking the magic byte is left to the
//! caller so it can report a bad byte as an argument error.

use crate::error::{RegistryClientError, Result};
use crate::types::RegistryId;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Magic byte that opens every envelope
pub const MAGIC_BYTE: u8 = 0x00;

/// Magic byte plus registry id
pub const HEADER_LEN: usize = 5;

/// A split envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage<'a> {
    pub magic_byte: u8,
    pub registry_id: RegistryId,
    pub payload: &'a [u8],
}

/// Wrap a serialized payload in the envelope.
pub fn encode(registry_id: RegistryId, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());

    buf.put_u8(MAGIC_BYTE);
    buf.put_u32(registry_id);
    buf.put_slice(payload);

    buf.freeze()
}

/// Split an envelope into magic byte, registry id and payload.
pub fn decode(data: &[u8]) -> Result<DecodedMessage<'_>> {
    if data.len() < HEADER_LEN {
        return Err(RegistryClientError::MalformedMessage(format!(
            "Data too short to contain schema ID: {} bytes, need at least {}",
            data.len(),
            HEADER_LEN
        )));
    }

    let mut header = &data[..HEADER_LEN];
    let magic_byte = header.get_u8();
    let registry_id = header.get_u32();

    Ok(DecodedMessage {
        magic_byte,
        registry_id,
        payload: &data[HEADER_LEN..],
    })
}
