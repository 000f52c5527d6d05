//! TCP listener and round-robin dispatcher
//!
//! Accepts device connections and distributes them across the shard queues
//! by accepted-connection count (`n % shard_count`), which keeps the
//! distribution even regardless of arrival timing or per-shard load.

use crate::broker::poll;
use crate::broker::session::StopToken;
use crate::broker::worker::PendingConnection;
use crossbeam_channel::{SendTimeoutError, Sender};
use log::{error, info, warn};
use std::io;
use std::net::TcpListener;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Everything the dispatcher thread needs, handed over at spawn time
pub(crate) struct DispatcherContext {
    pub listener: TcpListener,
    pub queues: Vec<Sender<PendingConnection>>,
    pub stop: StopToken,
    pub live_shards: Arc<AtomicUsize>,
    pub accept_timeout: Duration,
}

/// Dispatcher thread entry point
///
/// Runs until the stop signal is set or every shard has exited. Dropping the
/// context on exit disconnects the shard queues, which the workers observe
/// on their next drain.
pub(crate) fn run_dispatcher(ctx: DispatcherContext) {
    if let Err(e) = ctx.listener.set_nonblocking(true) {
        error!("Failed to set listener nonblocking: {}", e);
        return;
    }

    let shard_count = ctx.queues.len() as u64;
    let mut accepted: u64 = 0;

    while !ctx.stop.is_set() && ctx.live_shards.load(Ordering::Relaxed) > 0 {
        match poll::wait_readable_one(ctx.listener.as_raw_fd(), ctx.accept_timeout) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(e) => {
                error!("Listener poll error: {}", e);
                break;
            }
        }

        match ctx.listener.accept() {
            Ok((stream, peer)) => {
                info!("New device {}:{}", peer.ip(), peer.port());

                if let Err(e) = stream.set_nonblocking(true) {
                    warn!("Failed to set {} nonblocking, rejecting: {}", peer, e);
                    continue;
                }
                if let Err(e) = set_keepalive(stream.as_raw_fd()) {
                    warn!("Failed to enable keep-alive for {}: {}", peer, e);
                }

                let shard = (accepted % shard_count) as usize;
                accepted += 1;
                let pending = PendingConnection {
                    stream,
                    addr: peer.ip(),
                    port: peer.port(),
                };
                match ctx.queues[shard].send_timeout(pending, ctx.accept_timeout) {
                    Ok(()) => {}
                    Err(SendTimeoutError::Timeout(_)) => {
                        warn!(
                            "Shard {} inbound queue full, dropping connection from {}",
                            shard, peer
                        );
                    }
                    Err(SendTimeoutError::Disconnected(_)) => {
                        warn!("Shard {} is gone, dropping connection from {}", shard, peer);
                    }
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => error!("Accept error: {}", e),
        }
    }

    info!("Dispatcher stopped after {} connections", accepted);
}

/// Enable TCP keep-alive on an accepted device socket
///
/// Idle 60s, probe interval 60s, 3 probes before the connection is declared
/// dead and surfaces as a failing read.
fn set_keepalive(fd: RawFd) -> io::Result<()> {
    setsockopt_int(fd, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1)?;
    #[cfg(target_os = "linux")]
    {
        setsockopt_int(fd, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, 60)?;
        setsockopt_int(fd, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, 60)?;
        setsockopt_int(fd, libc::IPPROTO_TCP, libc::TCP_KEEPCNT, 3)?;
    }
    Ok(())
}

fn setsockopt_int(
    fd: RawFd,
    level: libc::c_int,
    name: libc::c_int,
    value: libc::c_int,
) -> io::Result<()> {
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
