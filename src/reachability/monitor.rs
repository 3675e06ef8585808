//! Network reachability monitor.
//!
//! The monitor re-evaluates reachability whenever it is signalled (by the
//! platform through [`ReachabilityMonitor::notify_network_change`]) or when
//! its poll interval elapses. Evaluations run one at a time on a single
//! Tokio task.
//!
//! # Evaluation
//!
//! | Interfaces | Probe | Status |
//! |------------|-------|--------|
//! | none up, airplane mode | - | `Offline` |
//! | none up, cause unknown | - | `Unknown` |
//! | some up | answered | `Connected(kind)` |
//! | some up | failed or timed out | `Offline` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::error::Result;
use crate::stream::{Replay, Subscription};

use super::Reachability;
use super::probe::{HttpProbe, InterfaceSnapshot, NetworkInterfaces, ServerProbe, SystemInterfaces};
use super::status::ReachabilityStatus;

// ============================================================================
// Constants
// ============================================================================

/// Default probe target.
const DEFAULT_PROBE_URL: &str = "https://www.google.com";

/// Default per-probe timeout.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Default poll interval when the platform sends no change signals.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

// ============================================================================
// ReachabilityConfig
// ============================================================================

/// Reachability monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachabilityConfig {
    /// URL the server probe sends `HEAD` to (`http` or `https`).
    pub probe_url: String,

    /// Budget for a single probe.
    pub probe_timeout: Duration,

    /// Re-evaluation period; `None` evaluates only on signals.
    pub poll_interval: Option<Duration>,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            poll_interval: Some(DEFAULT_POLL_INTERVAL),
        }
    }
}

impl ReachabilityConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the probe URL.
    #[inline]
    #[must_use]
    pub fn with_probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = url.into();
        self
    }

    /// Sets the per-probe timeout.
    #[inline]
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the poll interval.
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = Some(poll_interval);
        self
    }

    /// Disables polling; only explicit signals trigger evaluation.
    #[inline]
    #[must_use]
    pub fn without_polling(mut self) -> Self {
        self.poll_interval = None;
        self
    }
}

// ============================================================================
// Types
// ============================================================================

/// State shared with the evaluation task.
struct MonitorInner {
    config: ReachabilityConfig,
    interfaces: Arc<dyn NetworkInterfaces>,
    probe: Arc<dyn ServerProbe>,
    status: Replay<ReachabilityStatus>,
}

/// A running evaluation task.
struct Worker {
    signal_tx: UnboundedSender<()>,
    handle: JoinHandle<()>,
}

// ============================================================================
// ReachabilityMonitor
// ============================================================================

/// Publishes whether the device can reach the internet.
///
/// Lifecycle is explicit: nothing is observed until [`start`](Self::start)
/// and observation ends at [`stop`](Self::stop) or drop. One monitor is
/// meant to be shared by every client.
///
/// # Example
///
/// ```no_run
/// use resilient_ws::ReachabilityMonitor;
///
/// # async fn example() -> resilient_ws::Result<()> {
/// let monitor = ReachabilityMonitor::shared()?;
/// monitor.start();
///
/// let mut changes = monitor.status_changes();
/// while let Some(status) = changes.recv().await {
///     println!("network is {status}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ReachabilityMonitor {
    inner: Arc<MonitorInner>,
    worker: Mutex<Option<Worker>>,
}

impl fmt::Debug for ReachabilityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReachabilityMonitor")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ReachabilityMonitor - Constructors
// ============================================================================

impl ReachabilityMonitor {
    /// Creates a monitor reading system interfaces and probing over HTTP.
    ///
    /// # Errors
    ///
    /// See [`HttpProbe::new`].
    pub fn new(config: ReachabilityConfig) -> Result<Self> {
        let probe = HttpProbe::new(&config.probe_url, config.probe_timeout)?;
        Ok(Self::with_sources(
            config,
            Arc::new(SystemInterfaces::new()),
            Arc::new(probe),
        ))
    }

    /// Creates a monitor over custom interface and probe sources.
    #[must_use]
    pub fn with_sources(
        config: ReachabilityConfig,
        interfaces: Arc<dyn NetworkInterfaces>,
        probe: Arc<dyn ServerProbe>,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                config,
                interfaces,
                probe,
                status: Replay::new(ReachabilityStatus::Unknown),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Returns the process-wide monitor with default configuration.
    ///
    /// Created on first use and never started implicitly.
    ///
    /// # Errors
    ///
    /// [`Error::Config`](crate::Error::Config) if the probe HTTP client
    /// cannot be built.
    pub fn shared() -> Result<Arc<Self>> {
        static SHARED: OnceLock<Arc<ReachabilityMonitor>> = OnceLock::new();

        if let Some(monitor) = SHARED.get() {
            return Ok(Arc::clone(monitor));
        }

        let monitor = Arc::new(Self::new(ReachabilityConfig::default())?);
        // A racing initializer may win; both monitors are unstarted.
        Ok(Arc::clone(SHARED.get_or_init(|| monitor)))
    }
}

// ============================================================================
// ReachabilityMonitor - Public API
// ============================================================================

impl ReachabilityMonitor {
    /// Starts observing network changes.
    ///
    /// Idempotent. Evaluates once immediately. Must be called within a
    /// Tokio runtime.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Self::run(Arc::clone(&self.inner), signal_rx));
        *worker = Some(Worker { signal_tx, handle });

        info!(
            probe_url = %self.inner.config.probe_url,
            poll_ms = self.inner.config.poll_interval.map(|p| p.as_millis() as u64),
            "Reachability monitor started"
        );
    }

    /// Stops observing network changes.
    ///
    /// Idempotent. [`status`](Self::status) keeps the last value.
    pub fn stop(&self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.handle.abort();
            info!(status = %self.status(), "Reachability monitor stopped");
        }
    }

    /// Returns `true` between [`start`](Self::start) and [`stop`](Self::stop).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Signals that the platform observed a network change.
    ///
    /// Ignored while stopped.
    pub fn notify_network_change(&self) {
        if let Some(worker) = self.worker.lock().as_ref() {
            let _ = worker.signal_tx.send(());
        }
    }

    /// Returns the last computed status without blocking.
    #[must_use]
    pub fn status(&self) -> ReachabilityStatus {
        self.inner.status.get()
    }

    /// Subscribes to status changes, starting with the current status.
    pub fn status_changes(&self) -> Subscription<ReachabilityStatus> {
        self.inner.status.subscribe()
    }

    /// Returns `true` if the last computed status is online.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status().is_online()
    }

    /// Returns the monitor configuration.
    #[must_use]
    pub fn config(&self) -> &ReachabilityConfig {
        &self.inner.config
    }
}

// ============================================================================
// ReachabilityMonitor - Evaluation Loop
// ============================================================================

impl ReachabilityMonitor {
    /// Evaluates on every signal or poll tick until stopped.
    async fn run(inner: Arc<MonitorInner>, mut signals: UnboundedReceiver<()>) {
        let mut poll = inner.config.poll_interval.map(|period| {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        // The first poll tick fires immediately; without polling, evaluate
        // up front instead.
        if poll.is_none() {
            inner.evaluate().await;
        }

        loop {
            tokio::select! {
                () = next_tick(&mut poll) => {}
                signal = signals.recv() => {
                    if signal.is_none() {
                        break;
                    }
                    // Collapse a burst of signals into one evaluation.
                    while signals.try_recv().is_ok() {}
                }
            }

            inner.evaluate().await;
        }

        debug!("Reachability loop terminated");
    }
}

impl MonitorInner {
    /// Computes the current status and publishes it if it changed.
    async fn evaluate(&self) -> ReachabilityStatus {
        let snapshot = self.interfaces.snapshot().await;

        let status = match snapshot {
            InterfaceSnapshot::Inactive {
                airplane_mode: true,
            } => ReachabilityStatus::Offline,
            InterfaceSnapshot::Inactive {
                airplane_mode: false,
            } => ReachabilityStatus::Unknown,
            InterfaceSnapshot::Active { .. } => {
                if self.probe.probe().await {
                    ReachabilityStatus::Connected(snapshot.kind())
                } else {
                    ReachabilityStatus::Offline
                }
            }
        };

        if self.status.publish(status) {
            info!(%status, "Reachability changed");
        }

        status
    }
}

/// Waits for the next poll tick, or forever without polling.
async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl Drop for ReachabilityMonitor {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.handle.abort();
        }
    }
}

// ============================================================================
// Reachability
// ============================================================================

impl Reachability for ReachabilityMonitor {
    fn status(&self) -> ReachabilityStatus {
        ReachabilityMonitor::status(self)
    }

    fn status_changes(&self) -> Subscription<ReachabilityStatus> {
        ReachabilityMonitor::status_changes(self)
    }

    fn start(&self) {
        ReachabilityMonitor::start(self);
    }

    fn stop(&self) {
        ReachabilityMonitor::stop(self);
    }
}

// ============================================================================
// Tests
// ============================================================================
