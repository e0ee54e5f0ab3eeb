//! Message vocabulary built on top of pair framing
//!
//! The host/plugin exchange knows three message shapes, all of them pair
//! sequences headed by a number pair:
//!
//! ```text
//! Handshake    := Pair("uid", identity) AttrSnapshot
//! AttrSnapshot := NumberPair("attrs", N) { NumberPair(attrName, 5)
//!                   Pair("value", v) Pair("gui_type", t) Pair("gui_options", o)
//!                   Pair("error", e) Pair("gui_read_only", "0"|"1") } * N
//! Batch        := NumberPair("attrs", N) { NumberPair(attrName, M)
//!                   { Pair(fieldName, fieldValue) } * M } * N
//! Progress     := NumberPair("progress", 3)
//!                   Pair("proc", decimal) Pair("desc", text) Pair("error", text)
//! ```

/// Handshake pair carrying the plugin identity
pub const FIELD_UID: &str = "uid";

/// Top-level name of snapshot and batch messages
pub const MSG_ATTRS: &str = "attrs";

/// Top-level name of progress messages
pub const MSG_PROGRESS: &str = "progress";

pub const FIELD_VALUE: &str = "value";
pub const FIELD_GUI_TYPE: &str = "gui_type";
pub const FIELD_GUI_OPTIONS: &str = "gui_options";
pub const FIELD_ERROR: &str = "error";
pub const FIELD_GUI_READ_ONLY: &str = "gui_read_only";

pub const FIELD_PROC: &str = "proc";
pub const FIELD_DESC: &str = "desc";

/// A snapshot always carries exactly these five fields per attribute, in
/// the order `value, gui_type, gui_options, error, gui_read_only`.
pub const FIELDS_PER_ATTR: u64 = 5;

/// A progress message always carries exactly `proc, desc, error`.
pub const PROGRESS_FIELDS: u64 = 3;

/// The `proc` value that marks a unit of work as fully complete.
///
/// Deliberately outside the natural `[0,1]` progress range so the host can
/// tell "done" from partial progress. An opaque marker, not a percentage.
pub const PROGRESS_DONE: &str = "10";

/// The recognized fields of an attribute-update group
///
/// Batches may carry field names outside this set (added by newer hosts);
/// those are consumed and discarded so framing stays aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrField {
    Value,
    GuiType,
    GuiOptions,
    Error,
    GuiReadOnly,
}

impl AttrField {
    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"value" => Some(Self::Value),
            b"gui_type" => Some(Self::GuiType),
            b"gui_options" => Some(Self::GuiOptions),
            b"error" => Some(Self::Error),
            b"gui_read_only" => Some(Self::GuiReadOnly),
            _ => None,
        }
    }
}

/// Wire encoding of the read-only flag
pub fn encode_read_only(read_only: bool) -> &'static str {
    if read_only {
        "1"
    } else {
        "0"
    }
}

/// Parse the read-only flag; only the literals `"0"` and `"1"` are valid.
pub fn parse_read_only(value: &[u8]) -> Option<bool> {
    match value {
        b"0" => Some(false),
        b"1" => Some(true),
        _ => None,
    }
}
