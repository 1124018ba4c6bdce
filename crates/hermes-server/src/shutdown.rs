//! Signal-driven shutdown.
//!
//! [`trap`] installs OS handlers for a set of signals and returns a
//! [`ShutdownSignal`] that closes after the first of them arrives and the
//! shutdown callback has run. Later signals are swallowed: the handlers stay
//! installed, so they neither rerun the callback nor kill the process.
//!
//! ```rust,no_run
//! use hermes_server::{trap, Signal};
//!
//! # async fn example() -> Result<(), hermes_server::ShutdownError> {
//! let shutdown = trap(&[Signal::Interrupt, Signal::Terminate], |signal| {
//!     tracing::info!(%signal, "flushing caches");
//!     Ok(())
//! })?;
//!
//! shutdown.recv().await;
//! # Ok(())
//! # }
//! ```

use crate::error::ShutdownError;
use futures_util::future::{select_all, BoxFuture};
use futures_util::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Callback run once, on the listener task, when the first signal arrives.
pub type ShutdownCallback = Box<dyn FnOnce(Signal) -> anyhow::Result<()> + Send>;

/// Signals that can trigger shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// `SIGINT`, e.g. Ctrl+C.
    Interrupt,
    /// `SIGTERM`.
    Terminate,
}

impl Signal {
    /// Returns the conventional signal name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = ShutdownError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SIGINT" | "INT" | "INTERRUPT" => Ok(Self::Interrupt),
            "SIGTERM" | "TERM" | "TERMINATE" => Ok(Self::Terminate),
            _ => Err(ShutdownError::UnknownSignal(s.to_string())),
        }
    }
}

/// A one-shot signal that tasks can wait on.
///
/// Clones share state. Once closed it stays closed, and every current and
/// future [`recv`](Self::recv) completes.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    /// Creates an open signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Closes the signal. Idempotent.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.notify.notify_waiters();
        }
    }

    /// Returns `true` once the signal has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Returns a future that completes when the signal closes.
    pub fn recv(&self) -> impl Future<Output = ()> + Send + 'static {
        let signal = self.clone();
        async move {
            loop {
                let notified = signal.notify.notified();
                if signal.is_closed() {
                    return;
                }
                notified.await;
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs handlers for `signals` and returns the signal that closes after
/// the first of them.
///
/// Handlers are registered before this returns, so a signal sent right after
/// the call is never missed. `on_signal` runs exactly once on a background
/// task; an error or panic from it is logged and the signal still closes.
///
/// Must be called from within a Tokio runtime.
pub fn trap<F>(signals: &[Signal], on_signal: F) -> Result<ShutdownSignal, ShutdownError>
where
    F: FnOnce(Signal) -> anyhow::Result<()> + Send + 'static,
{
    if signals.is_empty() {
        return Err(ShutdownError::NoSignals);
    }

    let listeners = signals
        .iter()
        .map(|&signal| Listener::register(signal))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(?signals, "shutdown signals trapped");

    let first = select_all(listeners.into_iter().map(Listener::wait)).map(|(signal, _, _)| signal);
    Ok(trap_from(first, on_signal))
}

/// Runs the shutdown sequence once `first` yields a signal.
pub(crate) fn trap_from<S, F>(first: S, on_signal: F) -> ShutdownSignal
where
    S: Future<Output = Signal> + Send + 'static,
    F: FnOnce(Signal) -> anyhow::Result<()> + Send + 'static,
{
    let shutdown = ShutdownSignal::new();
    let closer = shutdown.clone();

    tokio::spawn(async move {
        let signal = first.await;
        tracing::info!(%signal, "received shutdown signal");

        match std::panic::catch_unwind(AssertUnwindSafe(|| on_signal(signal))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(%signal, error = %format!("{e:#}"), "shutdown callback failed"),
            Err(_) => tracing::error!(%signal, "shutdown callback panicked"),
        }

        closer.trigger();
    });

    shutdown
}

struct Listener {
    signal: Signal,
    #[cfg(unix)]
    stream: tokio::signal::unix::Signal,
}

impl Listener {
    #[cfg(unix)]
    fn register(signal: Signal) -> Result<Self, ShutdownError> {
        use tokio::signal::unix::SignalKind;

        let kind = match signal {
            Signal::Interrupt => SignalKind::interrupt(),
            Signal::Terminate => SignalKind::terminate(),
        };
        let stream = tokio::signal::unix::signal(kind)
            .map_err(|source| ShutdownError::Register { signal, source })?;
        Ok(Self { signal, stream })
    }

    #[cfg(not(unix))]
    fn register(signal: Signal) -> Result<Self, ShutdownError> {
        match signal {
            Signal::Interrupt => Ok(Self { signal }),
            Signal::Terminate => Err(ShutdownError::Unsupported(signal)),
        }
    }

    #[cfg(unix)]
    fn wait(mut self) -> BoxFuture<'static, Signal> {
        Box::pin(async move {
            if self.stream.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
            self.signal
        })
    }

    #[cfg(not(unix))]
    fn wait(self) -> BoxFuture<'static, Signal> {
        Box::pin(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            self.signal
        })
    }
}

/// Counts open connections so shutdown can wait for them.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl ConnectionTracker {
    /// Creates a tracker with no connections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Registers a connection until the returned token is dropped.
    #[must_use]
    pub fn acquire(&self) -> ConnectionToken {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionToken {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Number of open connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Completes once no connections are open.
    pub async fn wait_for_idle(&self) {
        loop {
            let notified = self.notify.notified();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the life of one connection.
#[derive(Debug)]
pub struct ConnectionToken {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}
