//! Attribute table shared between the session and the worker
//!
//! Attributes are registered once, before the session starts, and live for
//! the whole process. The worker keeps the handles returned at registration
//! time; the session walks the table when sending snapshots and applying
//! batches. Registration order is load-bearing: it is the order attributes
//! are advertised on the wire.

use std::sync::{Arc, Mutex};

#[derive(Debug, Default, Clone)]
struct AttrFields {
    value: String,
    gui_type: String,
    gui_options: String,
    read_only: bool,
    error: String,
}

/// A consistent copy of one attribute's mutable state, taken under the
/// attribute lock so a snapshot never mixes fields from two writes.
#[derive(Debug, Clone)]
pub struct AttrSnapshot {
    pub value: String,
    pub gui_type: String,
    pub gui_options: String,
    pub read_only: bool,
    pub error: String,
}

/// One named parameter/result slot synchronized with the host
///
/// The name is fixed at registration; everything else is interior-mutable
/// so writes through any handle are immediately visible to the session.
#[derive(Debug)]
pub struct Attr {
    name: String,
    fields: Mutex<AttrFields>,
}

/// Shared handle to an attribute, held by both the table and the worker
pub type AttrHandle = Arc<Attr>;

impl Attr {
    fn new(name: String, value: String, read_only: bool) -> Self {
        Self {
            name,
            fields: Mutex::new(AttrFields {
                value,
                read_only,
                ..AttrFields::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AttrFields> {
        self.fields.lock().expect("attribute mutex poisoned")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> String {
        self.lock().value.clone()
    }

    pub fn set_value(&self, value: impl Into<String>) {
        self.lock().value = value.into();
    }

    pub fn gui_type(&self) -> String {
        self.lock().gui_type.clone()
    }

    pub fn set_gui_type(&self, gui_type: impl Into<String>) {
        self.lock().gui_type = gui_type.into();
    }

    pub fn gui_options(&self) -> String {
        self.lock().gui_options.clone()
    }

    pub fn set_gui_options(&self, gui_options: impl Into<String>) {
        self.lock().gui_options = gui_options.into();
    }

    pub fn read_only(&self) -> bool {
        self.lock().read_only
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.lock().read_only = read_only;
    }

    /// The per-attribute error text; empty means no error
    pub fn error(&self) -> String {
        self.lock().error.clone()
    }

    pub fn set_error(&self, error: impl Into<String>) {
        self.lock().error = error.into();
    }

    pub fn clear_error(&self) {
        self.lock().error.clear();
    }

    pub fn has_error(&self) -> bool {
        !self.lock().error.is_empty()
    }

    pub fn snapshot(&self) -> AttrSnapshot {
        let fields = self.lock();
        AttrSnapshot {
            value: fields.value.clone(),
            gui_type: fields.gui_type.clone(),
            gui_options: fields.gui_options.clone(),
            read_only: fields.read_only,
            error: fields.error.clone(),
        }
    }
}

/// Attempt to register a second attribute under an existing name
#[derive(Debug, thiserror::Error)]
#[error("Duplicate attribute name: {0}")]
pub struct DuplicateName(pub String);

/// Insertion-ordered collection of attributes
#[derive(Debug, Default)]
pub struct AttrTable {
    attrs: Vec<AttrHandle>,
}

impl AttrTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new attribute, preserving registration order
    ///
    /// Duplicate names are rejected: the original host protocol tolerated
    /// them, but a table with two entries under one name advertises both
    /// while lookups only ever hit the first, which the host cannot
    /// distinguish from a single attribute.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        read_only: bool,
    ) -> Result<AttrHandle, DuplicateName> {
        let name = name.into();
        if self.find(&name).is_some() {
            return Err(DuplicateName(name));
        }
        let attr = Arc::new(Attr::new(name, value.into(), read_only));
        self.attrs.push(attr.clone());
        Ok(attr)
    }

    /// Linear first-match lookup by name
    pub fn find(&self, name: &str) -> Option<AttrHandle> {
        self.attrs.iter().find(|a| a.name() == name).cloned()
    }

    /// Iterate in registration order (stable across calls)
    pub fn iter(&self) -> impl Iterator<Item = &AttrHandle> {
        self.attrs.iter()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}
