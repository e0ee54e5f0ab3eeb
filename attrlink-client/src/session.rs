//! Session state machine over a framed host connection
//!
//! The protocol is strictly half-duplex: the session owns the framed
//! stream, reads exactly one batch, and sends exactly one response set per
//! batch. Nothing else ever touches the connection, so there is no
//! connection task or channel fan-out here.

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use attrlink_protocol::messages::{
    encode_read_only, parse_read_only, AttrField, FIELDS_PER_ATTR, FIELD_DESC, FIELD_ERROR,
    FIELD_GUI_OPTIONS, FIELD_GUI_READ_ONLY, FIELD_GUI_TYPE, FIELD_PROC, FIELD_UID, FIELD_VALUE,
    MSG_ATTRS, MSG_PROGRESS, PROGRESS_DONE, PROGRESS_FIELDS,
};
use attrlink_protocol::types::{AttrSnapshot, AttrTable};
use attrlink_protocol::{Pair, PairCodec};
use attrlink_utils::{AttrlinkError, Result};

/// Session lifecycle state
///
/// `Connected` only exists between the handshake pairs going out and the
/// first `AwaitingBatch`; it is observable when the handshake itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    AwaitingBatch,
    Processing,
    Terminated,
}

/// One live connection to the host, from handshake to close
///
/// Owns the attribute table for its whole lifetime; the worker keeps only
/// the handles it got back at registration time.
pub struct Session {
    framed: Framed<TcpStream, PairCodec>,
    table: AttrTable,
    state: SessionState,
}

impl Session {
    /// Dial the host and perform the handshake: one `("uid", identity)`
    /// pair followed by a full attribute snapshot.
    ///
    /// Any failure here is fatal; the caller must not retry on a session
    /// that failed to start.
    pub async fn start(uid: &str, addr: &str, table: AttrTable) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.map_err(|e| {
            AttrlinkError::connection(format!("Failed to connect to {}: {}", addr, e))
        })?;

        let mut session = Self {
            framed: Framed::new(stream, PairCodec::new()),
            table,
            state: SessionState::Connected,
        };

        session
            .framed
            .send(Pair::new(FIELD_UID, uid.to_string()))
            .await?;
        session.send_snapshot().await?;
        session.state = SessionState::AwaitingBatch;

        tracing::info!(uid, addr, attrs = session.table.len(), "Session started");
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn table(&self) -> &AttrTable {
        &self.table
    }

    /// Receive one attribute batch and apply it to the table.
    ///
    /// Returns `Ok(false)` when the host closed the connection cleanly
    /// between messages: the work loop is over. Any mid-message close,
    /// framing error, or malformed count is fatal.
    pub async fn recv_batch(&mut self) -> Result<bool> {
        self.state = SessionState::AwaitingBatch;
        match self.recv_batch_inner().await {
            Ok(true) => {
                self.state = SessionState::Processing;
                Ok(true)
            }
            Ok(false) => {
                self.state = SessionState::Terminated;
                Ok(false)
            }
            Err(e) => {
                self.state = SessionState::Terminated;
                Err(e)
            }
        }
    }

    async fn recv_batch_inner(&mut self) -> Result<bool> {
        let header = match self.framed.next().await {
            Some(Ok(pair)) => pair,
            Some(Err(e)) => return Err(e.into()),
            None => {
                tracing::info!("Host closed connection");
                return Ok(false);
            }
        };

        if header.name != MSG_ATTRS {
            return Err(AttrlinkError::protocol(format!(
                "Unknown message type: {:?}",
                header.name_text()
            )));
        }
        let group_count = header.value_as_count()?;

        for _ in 0..group_count {
            let group = self.recv_pair().await?;
            let field_count = group.value_as_count()?;
            let attr_name = group.name_text();

            let attr = self.table.find(&attr_name);
            if attr.is_none() {
                tracing::warn!(attr = %attr_name, "Ignoring update for unknown attribute");
            }

            // Field pairs are consumed even when they cannot be applied;
            // skipping them would desynchronize the framing.
            for _ in 0..field_count {
                let field = self.recv_pair().await?;
                let Some(attr) = &attr else { continue };

                match AttrField::from_name(&field.name) {
                    Some(AttrField::Value) => attr.set_value(field.value_text()),
                    Some(AttrField::GuiType) => attr.set_gui_type(field.value_text()),
                    Some(AttrField::GuiOptions) => attr.set_gui_options(field.value_text()),
                    Some(AttrField::Error) => attr.set_error(field.value_text()),
                    Some(AttrField::GuiReadOnly) => match parse_read_only(&field.value) {
                        Some(flag) => attr.set_read_only(flag),
                        None => {
                            return Err(AttrlinkError::protocol(format!(
                                "Invalid gui_read_only value: {:?}",
                                field.value_text()
                            )));
                        }
                    },
                    None => {
                        tracing::warn!(
                            attr = %attr_name,
                            field = %field.name_text(),
                            "Ignoring unknown attribute field"
                        );
                    }
                }
            }
        }

        Ok(true)
    }

    async fn recv_pair(&mut self) -> Result<Pair> {
        match self.framed.next().await {
            Some(Ok(pair)) => Ok(pair),
            Some(Err(e)) => Err(e.into()),
            None => Err(AttrlinkError::ConnectionClosed),
        }
    }

    /// Send the full attribute snapshot: `("attrs", count)` then, per
    /// attribute in registration order, `(name, 5)` and exactly five field
    /// pairs in the fixed order `value, gui_type, gui_options, error,
    /// gui_read_only`. The shape never varies per attribute.
    pub async fn send_snapshot(&mut self) -> Result<()> {
        // Copy field state up front so the wire never sees an attribute
        // mid-mutation.
        let attrs: Vec<(String, AttrSnapshot)> = self
            .table
            .iter()
            .map(|a| (a.name().to_string(), a.snapshot()))
            .collect();

        self.framed
            .send(Pair::number(MSG_ATTRS, attrs.len() as u64))
            .await?;
        for (name, snap) in attrs {
            self.framed.send(Pair::number(name, FIELDS_PER_ATTR)).await?;
            self.framed.send(Pair::new(FIELD_VALUE, snap.value)).await?;
            self.framed
                .send(Pair::new(FIELD_GUI_TYPE, snap.gui_type))
                .await?;
            self.framed
                .send(Pair::new(FIELD_GUI_OPTIONS, snap.gui_options))
                .await?;
            self.framed.send(Pair::new(FIELD_ERROR, snap.error)).await?;
            self.framed
                .send(Pair::new(
                    FIELD_GUI_READ_ONLY,
                    encode_read_only(snap.read_only),
                ))
                .await?;
        }
        Ok(())
    }

    /// Send one progress message: `("progress", 3)` then `proc`, `desc`,
    /// `error`. `proc` is free-form decimal text; [`PROGRESS_DONE`] marks
    /// completion.
    pub async fn send_progress(&mut self, proc: &str, desc: &str, error: &str) -> Result<()> {
        self.framed
            .send(Pair::number(MSG_PROGRESS, PROGRESS_FIELDS))
            .await?;
        self.framed
            .send(Pair::new(FIELD_PROC, proc.to_string()))
            .await?;
        self.framed
            .send(Pair::new(FIELD_DESC, desc.to_string()))
            .await?;
        self.framed
            .send(Pair::new(FIELD_ERROR, error.to_string()))
            .await?;
        Ok(())
    }

    /// Finish the current batch: full snapshot, then the completion marker.
    pub async fn finalize(&mut self) -> Result<()> {
        self.send_snapshot().await?;
        self.send_progress(PROGRESS_DONE, "", "").await?;
        self.state = SessionState::AwaitingBatch;
        Ok(())
    }

    /// Report a global failure for the current batch. No snapshot is sent:
    /// the outputs were never computed.
    pub async fn report_error(&mut self, error: &str) -> Result<()> {
        self.send_progress("0", "", error).await?;
        self.state = SessionState::AwaitingBatch;
        Ok(())
    }

    /// Report intermediate progress for a long unit of work, optionally
    /// publishing the outputs computed so far.
    pub async fn report_progress(&mut self, frac: f64, desc: &str, send_outputs: bool) -> Result<()> {
        if send_outputs {
            self.send_snapshot().await?;
        }
        self.send_progress(&frac.to_string(), desc, "").await
    }

    /// Close the connection. A close failure is fatal like any other I/O
    /// failure.
    pub async fn shutdown(self) -> Result<()> {
        let mut stream = self.framed.into_inner();
        stream.shutdown().await?;
        tracing::debug!("Session closed");
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("attrs", &self.table.len())
            .finish()
    }
}
