//! Per-shard registry of live device connections
//!
//! The registry is the authoritative table of a shard's connections and owns
//! their open/close lifecycle: registering a connection opens its capture
//! sink, unregistering closes socket and sink exactly once. It is owned by a
//! single worker thread and needs no internal locking.

use crate::error::{Error, Result};
use log::{info, warn};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::net::{IpAddr, Shutdown, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;

/// Connection identifier, unique within a shard for the session lifetime
///
/// A surrogate counter rather than the raw fd: the OS reuses descriptor
/// numbers after close, and a reused number would append a second device's
/// stream to the first device's capture file.
pub type ConnId = u32;

/// Which side initiated the teardown of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The device closed or reset the connection (zero-length read)
    PeerClosed,
    /// The broker is closing (read error, sink failure, or shutdown)
    BrokerClosed,
}

/// Socket close progress
///
/// `Open -> PeerClosed | BrokerClosed -> Closed`. The explicit shutdown
/// syscall is issued only on the `Open -> BrokerClosed` edge, so a socket
/// the peer already closed is never shut down twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseState {
    Open,
    PeerClosed,
    BrokerClosed,
    Closed,
}

/// One live TCP session from a device
pub struct DeviceConnection {
    pub(crate) id: ConnId,
    pub(crate) stream: TcpStream,
    pub(crate) addr: IpAddr,
    pub(crate) port: u16,
    pub(crate) has_transmitted: bool,
    pub(crate) sink: File,
    close_state: CloseState,
}

impl DeviceConnection {
    fn close(&mut self, reason: CloseReason) {
        match (self.close_state, reason) {
            (CloseState::Open, CloseReason::PeerClosed) => {
                self.close_state = CloseState::PeerClosed;
            }
            (CloseState::Open, CloseReason::BrokerClosed) => {
                if let Err(e) = self.stream.shutdown(Shutdown::Both) {
                    // NotConnected just means the peer raced us to the close
                    if e.kind() != std::io::ErrorKind::NotConnected {
                        warn!("Shutdown failed for {}:{}: {}", self.addr, self.port, e);
                    }
                }
                self.close_state = CloseState::BrokerClosed;
            }
            _ => {}
        }
        self.close_state = CloseState::Closed;
        // Socket and sink file handles are released when the connection is
        // dropped by the caller.
    }
}

/// The authoritative per-shard map of live connections
pub struct ConnectionRegistry {
    shard_id: usize,
    session_dir: PathBuf,
    next_id: ConnId,
    conns: HashMap<ConnId, DeviceConnection>,
    /// Registration order, for stable poll-set iteration
    order: Vec<ConnId>,
}

impl ConnectionRegistry {
    /// Create an empty registry for one shard
    ///
    /// The session directory is not touched until the first registration.
    pub fn new(shard_id: usize, session_dir: PathBuf) -> Self {
        Self {
            shard_id,
            session_dir,
            next_id: 0,
            conns: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a new connection and open its capture sink
    ///
    /// Creates the session directory if absent (idempotent, safe against
    /// concurrent first-registrations in other shards). Directory or sink
    /// failures are fatal to the shard and propagate to the caller.
    pub fn register(&mut self, stream: TcpStream, addr: IpAddr, port: u16) -> Result<ConnId> {
        let id = self.next_id;
        if self.conns.contains_key(&id) {
            warn!(
                "Shard {}: connection id {} already registered, keeping first",
                self.shard_id, id
            );
            return Ok(id);
        }

        std::fs::create_dir_all(&self.session_dir).map_err(|e| Error::SessionDir {
            path: self.session_dir.clone(),
            source: e,
        })?;

        let path = self
            .session_dir
            .join(format!("process_{}_{}.dat", self.shard_id, id));
        let sink = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::SinkOpen { path, source: e })?;

        self.next_id += 1;
        self.conns.insert(
            id,
            DeviceConnection {
                id,
                stream,
                addr,
                port,
                has_transmitted: false,
                sink,
                close_state: CloseState::Open,
            },
        );
        self.order.push(id);
        info!(
            "Shard {}: registered device {}:{} as connection {}",
            self.shard_id, addr, port, id
        );
        Ok(id)
    }

    /// Record that a connection has sent its first bytes
    ///
    /// Observability only; idempotent.
    pub fn mark_active(&mut self, id: ConnId) {
        if let Some(conn) = self.conns.get_mut(&id) {
            if !conn.has_transmitted {
                conn.has_transmitted = true;
                info!("Device {}:{} started sending data", conn.addr, conn.port);
            }
        }
    }

    /// Close a connection's socket and sink and forget it
    ///
    /// Unregistering an id that is not present is an error (double
    /// unregister, or a connection that was never registered here).
    pub fn unregister(&mut self, id: ConnId, reason: CloseReason) -> Result<()> {
        let Some(mut conn) = self.conns.remove(&id) else {
            return Err(Error::UnknownConnection(id));
        };
        self.order.retain(|&other| other != id);
        conn.close(reason);
        info!(
            "Shard {}: unregistered connection {} from {}:{} ({:?})",
            self.shard_id, id, conn.addr, conn.port, reason
        );
        Ok(())
    }

    /// Unregister every connection and reset the registry to empty
    ///
    /// Connection ids are not reused afterwards.
    pub fn close_all(&mut self) {
        let ids: Vec<ConnId> = self.order.clone();
        for id in ids {
            let _ = self.unregister(id, CloseReason::BrokerClosed);
        }
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    /// True when no connections are registered (the worker's idle signal)
    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Connection ids with their socket fds, in registration order
    pub fn poll_fds(&self) -> Vec<(ConnId, RawFd)> {
        self.order
            .iter()
            .filter_map(|id| self.conns.get(id).map(|c| (*id, c.stream.as_raw_fd())))
            .collect()
    }

    /// Mutable access to one connection for socket/sink I/O
    pub(crate) fn get_mut(&mut self, id: ConnId) -> Option<&mut DeviceConnection> {
        self.conns.get_mut(&id)
    }
}
