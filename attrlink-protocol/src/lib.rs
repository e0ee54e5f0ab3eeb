//! attrlink-protocol: Wire format shared between a host and its plugin workers
//!
//! The protocol is a stream of length-prefixed `(name, value)` byte-string
//! pairs over an ordered byte stream (normally a loopback TCP socket). This
//! crate defines the pair framing codec, the message vocabulary built on top
//! of it, and the attribute table both sides synchronize through.

pub mod codec;
pub mod messages;
pub mod types;

// Re-export main types at crate root
pub use codec::{CodecError, Pair, PairCodec};
pub use messages::{
    AttrField, FIELDS_PER_ATTR, FIELD_DESC, FIELD_ERROR, FIELD_GUI_OPTIONS, FIELD_GUI_READ_ONLY,
    FIELD_GUI_TYPE, FIELD_PROC, FIELD_UID, FIELD_VALUE, MSG_ATTRS, MSG_PROGRESS, PROGRESS_DONE,
    PROGRESS_FIELDS,
};
pub use types::{AttrHandle, AttrSnapshot, AttrTable, DuplicateName};
