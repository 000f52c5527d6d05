//! Sharded TCP ingestion broker
//!
//! One dispatcher thread accepts device connections and hands them to a
//! fixed set of shard workers round-robin; each shard multiplexes reads over
//! its own connections and appends the raw bytes to one capture file per
//! connection. Capture is raw-bytes-only; decoding happens later as a
//! separate pass over the closed files.

mod listener;
mod poll;
mod registry;
mod session;
mod worker;

pub use registry::{CloseReason, ConnId, ConnectionRegistry};
pub use session::{write_session_notes, CaptureSession, StopToken};
pub use worker::{PendingConnection, ShardReport};
