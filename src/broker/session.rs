//! Capture session orchestration
//!
//! A [`CaptureSession`] owns the dispatcher thread, the shard worker
//! threads, and the channels between them. Starting a session binds the
//! listener and spawns everything; stopping it sets the shared stop token,
//! waits for each shard's finish report within the grace period, then joins
//! the threads.

use crate::broker::listener::{run_dispatcher, DispatcherContext};
use crate::broker::worker::{run_shard, PendingConnection, ShardContext, ShardReport};
use crate::config::Config;
use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{error, info};
use std::fs::File;
use std::io::Write;
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Shared cancellation token observed by the dispatcher and every shard
#[derive(Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown; idempotent
    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One running capture session
///
/// Holds the listener address, the session directory, and the handles of the
/// dispatcher and shard threads. Consumed by [`CaptureSession::stop`].
pub struct CaptureSession {
    tag: String,
    session_dir: PathBuf,
    local_addr: SocketAddr,
    stop: StopToken,
    shard_count: usize,
    finish_rx: Receiver<ShardReport>,
    dispatcher: Option<JoinHandle<()>>,
    workers: Vec<Option<JoinHandle<()>>>,
    grace: Duration,
}

impl CaptureSession {
    /// Bind the listener, spawn the shards and the dispatcher
    ///
    /// The session directory is `{data_dir}/{tag}`; it is created lazily by
    /// whichever shard registers the first connection.
    pub fn start(config: &Config, tag: &str) -> Result<Self> {
        let shard_count = config.capture.shard_count.max(1);
        let session_dir = config.capture.data_dir.join(tag);
        let stop = StopToken::new();
        let live_shards = Arc::new(AtomicUsize::new(shard_count));
        let (finish_tx, finish_rx): (Sender<ShardReport>, Receiver<ShardReport>) =
            bounded(shard_count);

        // Bind before spawning anything so a bind failure leaves no threads
        let listener = TcpListener::bind(&config.network.bind_address)?;
        let local_addr = listener.local_addr()?;

        let mut queues = Vec::with_capacity(shard_count);
        let mut workers = Vec::with_capacity(shard_count);
        for shard_id in 0..shard_count {
            let (tx, rx) = bounded::<PendingConnection>(config.capture.queue_depth);
            queues.push(tx);

            let ctx = ShardContext {
                shard_id,
                session_dir: session_dir.clone(),
                inbound: rx,
                stop: stop.clone(),
                finish: finish_tx.clone(),
                live_shards: Arc::clone(&live_shards),
                tcp_buffer_size: config.capture.tcp_buffer_size,
                poll_timeout: Duration::from_millis(config.capture.poll_timeout_ms),
                idle_sleep: Duration::from_millis(config.capture.idle_sleep_ms),
            };
            let handle = match thread::Builder::new()
                .name(format!("ingest-{}", shard_id))
                .spawn(move || run_shard(ctx))
            {
                Ok(handle) => handle,
                Err(e) => {
                    // Already-spawned shards observe the stop token and exit
                    stop.set();
                    return Err(Error::Other(format!(
                        "Failed to spawn shard {}: {}",
                        shard_id, e
                    )));
                }
            };
            workers.push(Some(handle));
        }
        drop(finish_tx);
        info!(
            "Capture session '{}' listening on {} ({} shards)",
            tag, local_addr, shard_count
        );

        let dispatcher_ctx = DispatcherContext {
            listener,
            queues,
            stop: stop.clone(),
            live_shards,
            accept_timeout: Duration::from_millis(config.network.accept_timeout_ms),
        };
        let dispatcher = thread::Builder::new()
            .name("dispatcher".to_string())
            .spawn(move || run_dispatcher(dispatcher_ctx))
            .map_err(|e| {
                stop.set();
                Error::Other(format!("Failed to spawn dispatcher: {}", e))
            })?;

        Ok(Self {
            tag: tag.to_string(),
            session_dir,
            local_addr,
            stop,
            shard_count,
            finish_rx,
            dispatcher: Some(dispatcher),
            workers,
            grace: Duration::from_millis(config.capture.shutdown_grace_ms),
        })
    }

    /// Address the listener actually bound (useful when binding port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Directory this session's capture files land in
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Session tag
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Stop capturing and tear everything down
    ///
    /// Sets the stop token, collects each shard's finish report within the
    /// grace period, joins the dispatcher and the reported shards, and
    /// returns the first shard error if any. A shard that misses the grace
    /// deadline is reported as [`Error::ShardStalled`] and its thread
    /// abandoned; every blocking wait inside a shard is bounded, so that
    /// indicates a wedged syscall rather than a logic hang.
    pub fn stop(mut self) -> Result<()> {
        info!("Stopping capture session '{}'", self.tag);
        self.stop.set();

        let deadline = Instant::now() + self.grace;
        let mut reported = vec![false; self.shard_count];
        let mut first_error: Option<Error> = None;
        let mut remaining = self.shard_count;
        while remaining > 0 {
            let timeout = deadline.saturating_duration_since(Instant::now());
            match self.finish_rx.recv_timeout(timeout) {
                Ok(report) => {
                    remaining -= 1;
                    reported[report.shard_id] = true;
                    if let Err(e) = report.result {
                        let message = e.to_string();
                        first_error.get_or_insert(Error::ShardFailed {
                            shard: report.shard_id,
                            message,
                        });
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // The dispatcher's waits are all bounded, so this join is prompt.
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
        }

        for (shard_id, slot) in self.workers.iter_mut().enumerate() {
            if reported[shard_id] {
                if let Some(handle) = slot.take() {
                    let _ = handle.join();
                }
            } else {
                error!("Shard {} did not stop within the grace period", shard_id);
                first_error.get_or_insert(Error::ShardStalled(shard_id));
                drop(slot.take());
            }
        }

        info!("Capture session '{}' stopped", self.tag);
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Write the session's descriptive record
///
/// One plain-text `README` in the session directory: the tag on the first
/// line, the operator's notes on the second. Written once, at session end.
pub fn write_session_notes(session_dir: &Path, tag: &str, notes: &str) -> Result<()> {
    std::fs::create_dir_all(session_dir).map_err(|e| Error::SessionDir {
        path: session_dir.to_path_buf(),
        source: e,
    })?;
    let mut file = File::create(session_dir.join("README"))?;
    writeln!(file, "{}", tag)?;
    writeln!(file, "{}", notes)?;
    Ok(())
}
