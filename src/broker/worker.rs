//! Ingestion worker: one shard's capture loop
//!
//! Each worker owns one [`ConnectionRegistry`] and runs
//! `Running -> Draining -> Stopped`: drain the inbound queue, wait for
//! readiness across the registered sockets with a bounded timeout, append
//! whatever arrived to the per-connection sinks, and on the stop signal
//! close everything and send a finish report. A single connection's I/O
//! failure only unregisters that connection; failing to create the session
//! directory or open a sink is fatal to the whole shard.

use crate::broker::poll;
use crate::broker::registry::{CloseReason, ConnId, ConnectionRegistry};
use crate::broker::session::StopToken;
use crate::error::Result;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{error, info, warn};
use std::io::{Read, Write};
use std::net::{IpAddr, TcpStream};
use std::os::unix::io::RawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A connection accepted by the dispatcher, awaiting shard registration
pub struct PendingConnection {
    pub stream: TcpStream,
    pub addr: IpAddr,
    pub port: u16,
}

/// Completion report a shard sends right before its thread exits
pub struct ShardReport {
    pub shard_id: usize,
    pub result: Result<()>,
}

/// Everything one shard thread needs, handed over at spawn time
pub(crate) struct ShardContext {
    pub shard_id: usize,
    pub session_dir: PathBuf,
    pub inbound: Receiver<PendingConnection>,
    pub stop: StopToken,
    pub finish: Sender<ShardReport>,
    pub live_shards: Arc<AtomicUsize>,
    pub tcp_buffer_size: usize,
    pub poll_timeout: Duration,
    pub idle_sleep: Duration,
}

/// Shard thread entry point
pub(crate) fn run_shard(ctx: ShardContext) {
    let mut registry = ConnectionRegistry::new(ctx.shard_id, ctx.session_dir.clone());
    let result = shard_loop(&ctx, &mut registry);

    // Draining: close every remaining connection no matter how the loop ended
    registry.close_all();
    ctx.live_shards.fetch_sub(1, Ordering::Relaxed);

    match &result {
        Ok(()) => info!("Shard {} stopped", ctx.shard_id),
        Err(e) => error!("Shard {} failed: {}", ctx.shard_id, e),
    }
    let _ = ctx.finish.send(ShardReport {
        shard_id: ctx.shard_id,
        result,
    });
}

fn shard_loop(ctx: &ShardContext, registry: &mut ConnectionRegistry) -> Result<()> {
    let mut buf = vec![0u8; ctx.tcp_buffer_size];

    loop {
        // Drain newly accepted connections without blocking. Registration
        // failures here are resource errors and end the shard.
        loop {
            match ctx.inbound.try_recv() {
                Ok(pending) => {
                    registry.register(pending.stream, pending.addr, pending.port)?;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if ctx.stop.is_set() {
            return Ok(());
        }

        if registry.is_empty() {
            std::thread::sleep(ctx.idle_sleep);
            continue;
        }

        let pairs = registry.poll_fds();
        let fds: Vec<RawFd> = pairs.iter().map(|&(_, fd)| fd).collect();
        let ready = poll::wait_readable(&fds, ctx.poll_timeout)?;
        for (id, fd) in pairs {
            if ready.contains(&fd) {
                service_connection(ctx.shard_id, registry, id, &mut buf);
            }
        }
    }
}

/// What one readiness-driven read produced
enum ReadOutcome {
    Data,
    Eof,
    Retry,
    ReadError(std::io::Error),
    SinkError(std::io::Error),
}

/// Read once from a ready connection and append the bytes to its sink
fn service_connection(
    shard_id: usize,
    registry: &mut ConnectionRegistry,
    id: ConnId,
    buf: &mut [u8],
) {
    let outcome = {
        let Some(conn) = registry.get_mut(id) else {
            return;
        };
        match conn.stream.read(buf) {
            Ok(0) => ReadOutcome::Eof,
            Ok(n) => match conn.sink.write_all(&buf[..n]) {
                Ok(()) => ReadOutcome::Data,
                Err(e) => ReadOutcome::SinkError(e),
            },
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::Interrupted =>
            {
                ReadOutcome::Retry
            }
            Err(e) => ReadOutcome::ReadError(e),
        }
    };

    match outcome {
        ReadOutcome::Data => registry.mark_active(id),
        ReadOutcome::Retry => {}
        ReadOutcome::Eof => {
            warn!("Shard {}: connection {} disconnected", shard_id, id);
            let _ = registry.unregister(id, CloseReason::PeerClosed);
        }
        ReadOutcome::ReadError(e) => {
            warn!(
                "Shard {}: connection {} read error: {}, dropping",
                shard_id, id, e
            );
            let _ = registry.unregister(id, CloseReason::BrokerClosed);
        }
        ReadOutcome::SinkError(e) => {
            error!(
                "Shard {}: sink write failed for connection {}: {}, dropping",
                shard_id, id, e
            );
            let _ = registry.unregister(id, CloseReason::BrokerClosed);
        }
    }
}
