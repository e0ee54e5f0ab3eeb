//! Pair framing codec for host/plugin IPC
//!
//! Every message on the wire is a sequence of pairs:
//!
//! ```text
//! [name length: u64 LE][name bytes][value length: u64 LE][value bytes]
//! ```
//!
//! Only the two length prefixes are binary; numeric payloads (counts,
//! progress fractions) travel as base-10 ASCII text in the value field.
//! That asymmetry is a wire-compatibility invariant, not an accident.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Maximum size of a single pair component (64 MB)
///
/// An announced length past this means the stream is corrupt or hostile;
/// the session cannot resynchronize and must terminate.
const MAX_COMPONENT_SIZE: u64 = 64 * 1024 * 1024;

/// Width of each length prefix
const LEN_PREFIX: usize = 8;

/// Pair framing error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pair component too large: {size} bytes (max {max})")]
    ComponentTooLarge { size: u64, max: u64 },

    #[error("Expected a base-10 integer value, got {text:?}")]
    InvalidNumber { text: String },
}

/// A single `(name, value)` unit on the wire
///
/// Components are raw byte strings; interpretation as UTF-8 text happens
/// above the codec, so arbitrary bytes round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub name: Bytes,
    pub value: Bytes,
}

impl Pair {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A pair whose value is the decimal text of `n` (a "number pair")
    pub fn number(name: impl Into<Bytes>, n: u64) -> Self {
        Self::new(name, n.to_string())
    }

    /// Pair name as text, replacing invalid UTF-8
    ///
    /// Names are matched against known ASCII vocabulary and registered
    /// attribute names, so lossy decoding can only turn a match into a
    /// non-match, never the reverse.
    pub fn name_text(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Pair value as text, replacing invalid UTF-8
    pub fn value_text(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    /// Parse the value as a base-10 count (the number-pair decoding)
    pub fn value_as_count(&self) -> Result<u64, CodecError> {
        std::str::from_utf8(&self.value)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| CodecError::InvalidNumber {
                text: self.value_text(),
            })
    }
}

/// Codec for pair frames, used on both sides of the connection
pub struct PairCodec;

impl PairCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PairCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Peek a length prefix at `offset` without consuming; `None` if the
/// buffer does not reach that far yet.
fn peek_len(src: &BytesMut, offset: usize) -> Result<Option<u64>, CodecError> {
    if src.len() < offset + LEN_PREFIX {
        return Ok(None);
    }
    let mut raw = [0u8; LEN_PREFIX];
    raw.copy_from_slice(&src[offset..offset + LEN_PREFIX]);
    let len = u64::from_le_bytes(raw);

    if len > MAX_COMPONENT_SIZE {
        return Err(CodecError::ComponentTooLarge {
            size: len,
            max: MAX_COMPONENT_SIZE,
        });
    }
    Ok(Some(len))
}

impl Decoder for PairCodec {
    type Item = Pair;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let name_len = match peek_len(src, 0)? {
            Some(len) => len as usize,
            None => return Ok(None),
        };
        let value_len = match peek_len(src, LEN_PREFIX + name_len)? {
            Some(len) => len as usize,
            None => return Ok(None),
        };

        let total = LEN_PREFIX + name_len + LEN_PREFIX + value_len;
        if src.len() < total {
            // Reserve space for the rest of the pair
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LEN_PREFIX);
        let name = src.split_to(name_len).freeze();
        src.advance(LEN_PREFIX);
        let value = src.split_to(value_len).freeze();

        Ok(Some(Pair { name, value }))
    }
}

impl Encoder<Pair> for PairCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Pair, dst: &mut BytesMut) -> Result<(), Self::Error> {
        for component in [&item.name, &item.value] {
            if component.len() as u64 > MAX_COMPONENT_SIZE {
                return Err(CodecError::ComponentTooLarge {
                    size: component.len() as u64,
                    max: MAX_COMPONENT_SIZE,
                });
            }
        }

        dst.reserve(2 * LEN_PREFIX + item.name.len() + item.value.len());
        dst.put_u64_le(item.name.len() as u64);
        dst.put_slice(&item.name);
        dst.put_u64_le(item.value.len() as u64);
        dst.put_slice(&item.value);
        Ok(())
    }
}
