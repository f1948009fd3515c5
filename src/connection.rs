//! # Connection Manager
//!
//! Owns the MPD session and supervises it:
//!
//! - a `connected` flag checked before every command,
//! - a mutex around the transport so foreground commands and keep-alive pings
//!   never interleave mid-response,
//! - an optional keep-alive thread that pings the daemon every interval.
//!
//! ## Lifecycle
//!
//! ```text
//! establish() ──► Connected+Idle ──start_keep_alive()──► Connected+Pinging
//!                       ▲                                        │
//!                       └─────────────stop_keep_alive()──────────┘
//!           teardown() / Drop (from either state) ──► Disconnected (terminal)
//! ```
//!
//! The keep-alive thread sleeps with `thread::park_timeout`, so
//! `stop_keep_alive` unparks it and joins without waiting out the interval.
//! A ping that finds the session gone flips `connected` to false; nothing
//! reconnects.

use crate::config::{DEFAULT_PORT, KEEPALIVE_INTERVAL};
use crate::error::{ControlError, Result, TransportError};
use crate::mpd_transport::TcpTransport;
use crate::protocol::Transport;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Handle on the running keep-alive thread.
#[derive(Debug)]
struct KeepAlive {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
    daemon: bool,
}

/// Supervised session with an MPD server.
///
/// `T` is the primitive command transport; [`TcpTransport`] for a real
/// daemon, [`MemoryDaemon`](crate::memory::MemoryDaemon) in tests.
#[derive(Debug)]
pub struct Connection<T: Transport + Send + 'static> {
    host: String,
    port: u16,
    transport: Arc<Mutex<T>>,
    connected: Arc<AtomicBool>,
    keep_alive: Option<KeepAlive>,
    interval: Duration,
    torn_down: bool,
}

impl Connection<TcpTransport> {
    /// Connect to MPD over TCP. `port` defaults to [`DEFAULT_PORT`].
    ///
    /// # Errors
    ///
    /// - [`ControlError::InvalidArgument`] for an empty host or port `0`
    /// - [`ControlError::ConnectionFailure`] if the daemon cannot be reached
    pub fn open(host: &str, port: Option<u16>) -> Result<Self> {
        Self::establish(host, port, TcpTransport::connect)
    }
}

impl<T: Transport + Send + 'static> Connection<T> {
    /// Validate the address and build the transport with `connect`.
    pub fn establish<F>(host: &str, port: Option<u16>, connect: F) -> Result<Self>
    where
        F: FnOnce(&str, u16) -> std::result::Result<T, TransportError>,
    {
        let host = host.trim();
        if host.is_empty() {
            return Err(ControlError::invalid("'host' must be a non-empty string"));
        }
        let port = port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(ControlError::invalid("'port' must be between 1 and 65535"));
        }

        let transport = connect(host, port).map_err(|source| ControlError::ConnectionFailure {
            host: host.to_string(),
            port,
            source,
        })?;

        info!("Connected to MPD at {host}:{port}");

        Ok(Self {
            host: host.to_string(),
            port,
            transport: Arc::new(Mutex::new(transport)),
            connected: Arc::new(AtomicBool::new(true)),
            keep_alive: None,
            interval: KEEPALIVE_INTERVAL,
            torn_down: false,
        })
    }

    /// Override the keep-alive interval. Takes effect on the next
    /// [`start_keep_alive`](Self::start_keep_alive).
    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn keep_alive_interval(&self) -> Duration {
        self.interval
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// True while a keep-alive thread is alive and looping.
    pub fn is_keep_alive_running(&self) -> bool {
        self.keep_alive
            .as_ref()
            .is_some_and(|ka| ka.running.load(Ordering::SeqCst) && !ka.handle.is_finished())
    }

    /// Whether the running keep-alive was started as a daemon thread.
    pub fn keep_alive_is_daemon(&self) -> Option<bool> {
        self.keep_alive.as_ref().map(|ka| ka.daemon)
    }

    /// Run `op` against the transport under the lock.
    ///
    /// Fails with [`ControlError::NotConnected`] without touching the
    /// transport when the connection flag is down. Transport errors come back
    /// unchanged; a disconnect additionally lowers the flag.
    pub fn call<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> std::result::Result<R, TransportError>,
    {
        if !self.is_connected() {
            return Err(ControlError::NotConnected);
        }

        let mut transport = lock(&self.transport);
        op(&mut *transport).map_err(|e| {
            if e.is_disconnect() {
                warn!("Lost connection to MPD at {}:{}: {e}", self.host, self.port);
                self.connected.store(false, Ordering::SeqCst);
            }
            ControlError::Transport(e)
        })
    }

    /// Start pinging the daemon in the background.
    ///
    /// Returns `Ok(false)` if a keep-alive thread is already running.
    /// `daemon` is recorded on the thread handle; Rust never keeps a process
    /// alive for a spawned thread, so both modes are joined on teardown.
    pub fn start_keep_alive(&mut self, daemon: bool) -> Result<bool> {
        if !self.is_connected() {
            return Err(ControlError::NotConnected);
        }
        if self.keep_alive.is_some() {
            if self.is_keep_alive_running() {
                debug!("Keep-alive already running");
                return Ok(false);
            }
            // Previous thread exited on its own (disconnect); reap it.
            self.stop_keep_alive();
        }

        let running = Arc::new(AtomicBool::new(true));
        let transport = Arc::clone(&self.transport);
        let connected = Arc::clone(&self.connected);
        let flag = Arc::clone(&running);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("mpd-keepalive".to_string())
            .spawn(move || keep_alive_loop(transport, connected, flag, interval))
            .map_err(ControlError::KeepAlive)?;

        info!(
            "Started keep-alive for {}:{} (every {:?}, daemon: {daemon})",
            self.host, self.port, interval
        );
        self.keep_alive = Some(KeepAlive {
            handle,
            running,
            daemon,
        });
        Ok(true)
    }

    /// Signal the keep-alive thread and wait for it to exit. No-op when none
    /// is running; never fails.
    pub fn stop_keep_alive(&mut self) {
        let Some(keep_alive) = self.keep_alive.take() else {
            return;
        };

        keep_alive.running.store(false, Ordering::SeqCst);
        keep_alive.handle.thread().unpark();
        match keep_alive.handle.join() {
            Ok(()) => debug!("Keep-alive stopped"),
            Err(_) => warn!("Keep-alive thread panicked"),
        }
    }

    /// Stop the keep-alive, lower the flag, close and drop the session.
    ///
    /// Idempotent. Errors from `close` are logged, never returned.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.stop_keep_alive();
        let was_connected = self.connected.swap(false, Ordering::SeqCst);

        let mut transport = lock(&self.transport);
        if was_connected {
            if let Err(e) = transport.close() {
                warn!("MPD close during teardown failed: {e}");
            }
        }
        transport.disconnect();

        info!("Disconnected from MPD at {}:{}", self.host, self.port);
    }
}

impl<T: Transport + Send + 'static> Drop for Connection<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn lock<T>(transport: &Mutex<T>) -> MutexGuard<'_, T> {
    transport.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ping, then sleep one interval, until `running` drops or the session dies.
fn keep_alive_loop<T: Transport>(
    transport: Arc<Mutex<T>>,
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    interval: Duration,
) {
    while running.load(Ordering::SeqCst) {
        if !connected.load(Ordering::SeqCst) {
            debug!("Keep-alive exiting: connection is down");
            break;
        }

        let ping = lock(&transport).ping();
        match ping {
            Ok(()) => debug!("Keep-alive ping sent"),
            Err(e) if e.is_disconnect() => {
                warn!("Keep-alive ping failed, connection lost: {e}");
                connected.store(false, Ordering::SeqCst);
                break;
            }
            Err(e) => warn!("Keep-alive ping failed: {e}"),
        }

        // park_timeout may wake early; keep parking until the deadline.
        let deadline = Instant::now() + interval;
        while running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::park_timeout(deadline - now);
        }
    }
    running.store(false, Ordering::SeqCst);
}
