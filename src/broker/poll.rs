//! Bounded-timeout readiness waits over raw file descriptors
//!
//! Thin safe wrapper around `poll(2)`. Both the dispatcher (listening
//! socket) and the shard workers (registered device sockets) block here,
//! which is why every call carries a timeout: the shared stop signal must be
//! observed within one timeout interval even when no traffic arrives.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

const READABLE: libc::c_short = libc::POLLIN | libc::POLLHUP | libc::POLLERR;

/// Wait until any of `fds` is readable or the timeout elapses
///
/// Returns the subset of descriptors that are readable (hang-ups and socket
/// errors count as readable so the caller observes them as a zero-length or
/// failing read). An empty result means the timeout elapsed or the wait was
/// interrupted by a signal.
pub fn wait_readable(fds: &[RawFd], timeout: Duration) -> io::Result<Vec<RawFd>> {
    if fds.is_empty() {
        return Ok(Vec::new());
    }

    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();

    let millis = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
    let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, millis) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(Vec::new());
        }
        return Err(err);
    }

    Ok(pollfds
        .iter()
        .filter(|p| p.revents & READABLE != 0)
        .map(|p| p.fd)
        .collect())
}

/// Wait until a single descriptor is readable or the timeout elapses
pub fn wait_readable_one(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    Ok(!wait_readable(&[fd], timeout)?.is_empty())
}
