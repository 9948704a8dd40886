/// Context-aware profile switching.
///
/// A dedicated thread polls the foreground window every
/// `monitor_interval_seconds`, matches it against the configured rules and
/// applies the resulting profile when it differs from the one last applied.
///
/// The loop sleeps on a stop channel, so [`ContextMonitor::stop`] wakes it
/// immediately. A tick already past the stop check (e.g. mid profile apply)
/// runs to completion first; if the thread has not exited within
/// `interval + 2` seconds it is abandoned and a warning is logged.
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, error, info, warn};

use crate::config::ProfilesConfig;
use crate::matcher::match_context;
use crate::profile::ProfileApplier;
use crate::window::WindowInspector;

/// Extra time granted to the loop thread beyond one interval when stopping.
const STOP_GRACE_SECS: u64 = 2;

/// Runtime state owned by the loop thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorState {
    /// Last profile the monitor applied successfully.
    pub current_profile: Option<String>,
    /// Title seen on the previous tick; an identical title skips evaluation.
    pub last_window_title: Option<String>,
}

/// What a single tick decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Foreground title unchanged since the previous tick.
    Unchanged,
    /// Target profile is the one already applied.
    AlreadyActive,
    /// No rule matched and there is no default profile.
    NoTarget,
    Applied(String),
    ApplyFailed(String),
}

/// The per-tick decision logic, independent of threading.
struct Ticker {
    config: Arc<ProfilesConfig>,
    inspector: Arc<dyn WindowInspector>,
    applier: Arc<dyn ProfileApplier>,
    state: MonitorState,
}

impl Ticker {
    fn tick(&mut self) -> TickOutcome {
        let window = self.inspector.foreground_window();

        // Only the title is compared; two processes sharing a title count as unchanged.
        if let Some(w) = &window {
            if self.state.last_window_title.as_deref() == Some(w.title.as_str()) {
                return TickOutcome::Unchanged;
            }
        }
        self.state.last_window_title = window.as_ref().map(|w| w.title.clone());
        match &window {
            Some(w) => debug!(
                "Active window changed: '{}' (pid {}, {})",
                w.title, w.pid, w.process_name
            ),
            None => debug!("No active window information."),
        }

        let target = match_context(window.as_ref(), &self.config.contexts)
            .or_else(|| self.config.default_profile());

        if target == self.state.current_profile.as_deref() {
            debug!("Target profile {target:?} already active. No change needed.");
            return TickOutcome::AlreadyActive;
        }

        let Some(target) = target else {
            info!("No specific context matched and no default profile set. No profile applied.");
            return TickOutcome::NoTarget;
        };
        let target = target.to_string();

        info!("Context change detected. Applying profile: '{target}'");
        if self.applier.apply_profile(&target) {
            info!("Successfully applied profile: '{target}'");
            self.state.current_profile = Some(target.clone());
            TickOutcome::Applied(target)
        } else {
            error!("Failed to apply profile '{target}'.");
            TickOutcome::ApplyFailed(target)
        }
    }
}

/// Runs ticks until stop is requested, then hands the state back.
fn run_loop(
    mut ticker: Ticker,
    interval: Duration,
    stop_rx: Receiver<()>,
    _done_tx: Sender<()>,
) -> MonitorState {
    info!("Context monitor thread started.");
    loop {
        match stop_rx.try_recv() {
            Err(TryRecvError::Empty) => {}
            Ok(()) | Err(TryRecvError::Disconnected) => break,
        }

        let outcome = ticker.tick();
        debug!("Tick outcome: {outcome:?}");

        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("Context monitor thread stopped.");
    ticker.state
    // `_done_tx` drops here, which is how `stop` learns the thread has exited.
}

struct Worker {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<MonitorState>,
}

/// Stopped/Running controller for the polling loop.
pub struct ContextMonitor {
    config: Arc<ProfilesConfig>,
    inspector: Arc<dyn WindowInspector>,
    applier: Arc<dyn ProfileApplier>,
    /// State carried across a stop/start cycle.
    state: MonitorState,
    worker: Option<Worker>,
}

impl ContextMonitor {
    pub fn new(
        config: ProfilesConfig,
        inspector: Arc<dyn WindowInspector>,
        applier: Arc<dyn ProfileApplier>,
    ) -> Self {
        debug!("Context rules loaded: {}", config.contexts.len());
        debug!("Default profile: {:?}", config.default_profile());
        debug!("Monitor interval: {}s", config.monitor_interval_seconds);
        Self {
            config: Arc::new(config),
            inspector,
            applier,
            state: MonitorState::default(),
            worker: None,
        }
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.monitor_interval_seconds.max(1))
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|w| !w.handle.is_finished())
            .unwrap_or(false)
    }

    /// Launches the polling thread. Returns true if a new loop was started.
    pub fn start(&mut self) -> bool {
        if self.config.is_empty() {
            warn!("Profile configuration is empty. Monitoring disabled.");
            return false;
        }
        if self.is_running() {
            warn!("Context monitor is already running.");
            return false;
        }
        // A loop that ended on its own is reaped before starting a fresh one.
        if let Some(worker) = self.worker.take() {
            self.reap(worker);
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(0);
        let ticker = Ticker {
            config: Arc::clone(&self.config),
            inspector: Arc::clone(&self.inspector),
            applier: Arc::clone(&self.applier),
            state: std::mem::take(&mut self.state),
        };
        let interval = self.interval();

        let spawned = thread::Builder::new()
            .name("context-monitor".into())
            .spawn(move || run_loop(ticker, interval, stop_rx, done_tx));
        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker {
                    stop_tx,
                    done_rx,
                    handle,
                });
                true
            }
            Err(e) => {
                error!("Failed to spawn context monitor thread: {e}");
                false
            }
        }
    }

    /// Signals the loop to exit and waits up to `interval + 2` seconds.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            info!("Context monitor is not running.");
            return;
        };
        info!("Stopping context monitor...");
        let _ = worker.stop_tx.try_send(());

        let timeout = self
            .interval()
            .saturating_add(Duration::from_secs(STOP_GRACE_SECS));
        match worker.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                warn!("Context monitor thread did not stop within {timeout:?}; abandoning it.");
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => self.reap(worker),
        }
    }

    fn reap(&mut self, worker: Worker) {
        match worker.handle.join() {
            Ok(state) => self.state = state,
            Err(_) => error!("Context monitor thread panicked."),
        }
    }

    pub fn current_profile(&self) -> Option<&str> {
        self.state.current_profile.as_deref()
    }
}

impl Drop for ContextMonitor {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}
