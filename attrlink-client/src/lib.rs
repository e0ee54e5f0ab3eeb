//! attrlink-client: the plugin side of the attrlink IPC protocol
//!
//! A worker process declares its attributes, dials the host, and then
//! serves one unit of work per received batch:
//!
//! ```no_run
//! use attrlink_client::Plugin;
//!
//! # async fn run() -> attrlink_utils::Result<()> {
//! let mut plugin = Plugin::new();
//! let query = plugin.declare_input("query", "")?;
//! let rows = plugin.declare_output("rows", "[]")?;
//!
//! plugin.start("worker-1", "127.0.0.1:8091").await?;
//! while plugin.next_batch().await? {
//!     if query.value().is_empty() {
//!         query.set_error("empty");
//!         plugin.finalize().await?;
//!         continue;
//!     }
//!     rows.set_value("[{\"n\":1}]");
//!     plugin.finalize().await?;
//! }
//! plugin.shutdown().await
//! # }
//! ```

pub mod config;
pub mod plugin;
pub mod session;

// Re-export the types a worker touches directly
pub use attrlink_protocol::types::AttrHandle;
pub use plugin::Plugin;
pub use session::{Session, SessionState};
