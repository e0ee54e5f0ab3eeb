//! Worker-facing adapter around the session
//!
//! A `Plugin` is the single process-wide object a worker drives: declare
//! attributes, start the session, then alternate `next_batch` with result
//! or error reporting until the host closes the connection.

use attrlink_protocol::types::{AttrHandle, AttrTable};
use attrlink_utils::{AttrlinkError, Result};

use crate::config;
use crate::session::{Session, SessionState};

/// The plugin-side client a worker builds its loop on
///
/// Registration only works before [`start`](Plugin::start); after the
/// handshake the table layout is part of the wire contract and frozen.
#[derive(Debug)]
pub struct Plugin {
    /// Present until the session takes ownership at start
    table: Option<AttrTable>,
    session: Option<Session>,
}

impl Default for Plugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin {
    pub fn new() -> Self {
        Self {
            table: Some(AttrTable::new()),
            session: None,
        }
    }

    /// Declare an attribute the host supplies values for
    pub fn declare_input(
        &mut self,
        name: impl Into<String>,
        default: impl Into<String>,
    ) -> Result<AttrHandle> {
        self.declare(name, default, false)
    }

    /// Declare an attribute only this worker ever produces
    pub fn declare_output(
        &mut self,
        name: impl Into<String>,
        default: impl Into<String>,
    ) -> Result<AttrHandle> {
        self.declare(name, default, true)
    }

    fn declare(
        &mut self,
        name: impl Into<String>,
        default: impl Into<String>,
        read_only: bool,
    ) -> Result<AttrHandle> {
        let table = self.table.as_mut().ok_or(AttrlinkError::TableFrozen)?;
        Ok(table.register(name, default, read_only)?)
    }

    /// Open the session: resolve `endpoint`, dial, handshake.
    ///
    /// `endpoint` may be a config alias, a bare TCP port (dialed on
    /// loopback, the form hosts pass on the worker command line), or a
    /// full `host:port` address.
    pub async fn start(&mut self, uid: &str, endpoint: &str) -> Result<()> {
        // The table is present exactly until the first start attempt, so
        // its absence is the one signal for "already started".
        let table = self
            .table
            .take()
            .ok_or_else(|| AttrlinkError::connection("Session already started"))?;

        let addr = config::resolve_endpoint(endpoint);
        let session = Session::start(uid, &addr, table).await?;
        self.session = Some(session);
        Ok(())
    }

    /// Block until the next batch arrives; `Ok(false)` once the host has
    /// closed the connection and the work loop should end.
    pub async fn next_batch(&mut self) -> Result<bool> {
        self.session_mut()?.recv_batch().await
    }

    /// Publish all outputs and mark the current batch complete.
    pub async fn finalize(&mut self) -> Result<()> {
        self.session_mut()?.finalize().await
    }

    /// Report a batch-level failure; outputs are not published.
    pub async fn report_error(&mut self, error: &str) -> Result<()> {
        self.session_mut()?.report_error(error).await
    }

    /// Report intermediate progress, `frac` strictly between 0 and 1.
    pub async fn report_progress(&mut self, frac: f64, desc: &str) -> Result<()> {
        self.session_mut()?.report_progress(frac, desc, false).await
    }

    /// Close the connection. Safe to call when never started.
    pub async fn shutdown(&mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => session.shutdown().await,
            None => Ok(()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(Session::state)
            .unwrap_or(SessionState::Disconnected)
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(AttrlinkError::NotStarted)
    }
}
