//! Per-record timer engine.
//!
//! A [`TimerEngine`] is mounted for one record id and owns the start, stop,
//! reset and rename logic for it. While mounted it runs a driver task that
//! fires once per period:
//!
//! - when this engine is running, the period is a *tick*: the in-memory
//!   elapsed time grows by exactly one period and is written to the store;
//! - when idle, the period is a *poll*: the record is re-read so that changes
//!   made by another engine mounted on the same id become visible.
//!
//! Whether an engine may run is decided by the shared [`Coordinator`]. All
//! state changes and their store writes happen under one async mutex, so
//! tick writes are strictly ordered and a reset's zero cannot be overtaken
//! by a tick from the same engine. Dropping the engine aborts the driver and
//! releases the active slot if this engine holds it.

use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_RECORD_NAME;
use crate::coordinator::{Coordinator, Lease};
use crate::error::{Error, Result};
use crate::record::{format_hms, RecordId, TimerRecord};
use crate::store::RecordStore;

/// Settings for a mounted engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Tick and poll period.
    pub period: Duration,
    /// Consecutive store failures before the store is reported as degraded.
    pub failure_threshold: u32,
    /// Label shown when the bound record does not exist.
    pub placeholder_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            failure_threshold: 5,
            placeholder_name: DEFAULT_RECORD_NAME.to_string(),
        }
    }
}

impl EngineConfig {
    fn period_ms(&self) -> u64 {
        u64::try_from(self.period.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Whether a record's timer is accumulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Not accumulating.
    Idle,
    /// Accumulating, either in this engine or in another engine bound to the same record.
    Running,
}

/// Whether the bound record exists in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// The record was found on the last store access.
    Loaded,
    /// The record is gone; the engine keeps working in display-only mode.
    Missing,
}

/// How the store has been behaving for this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreHealth {
    /// Recent store calls succeeded, or too few failed to matter.
    Healthy,
    /// The store has failed on every recent call.
    Degraded {
        /// Failed calls in a row.
        consecutive_failures: u32,
    },
}

/// Result of a user-facing engine operation.
///
/// Invalid transitions are not errors; they come back as [`Outcome::Ignored`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Outcome {
    /// The operation took effect.
    Applied,
    /// The operation was not allowed in the current state and changed nothing.
    Ignored,
    /// The store rejected the operation; nothing was changed.
    Failed,
}

/// Snapshot of what a presentation layer should render for one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineView {
    /// The bound record.
    pub id: RecordId,
    /// Current label.
    pub name: String,
    /// Elapsed time shown to the user.
    pub elapsed_ms: u64,
    /// Run state, including a run held by another engine on the same record.
    pub run_state: RunState,
    /// Whether the record still exists.
    pub presence: Presence,
    /// Store health as seen by this engine.
    pub store_health: StoreHealth,
}

impl EngineView {
    /// The elapsed time as `HH:MM:SS`.
    #[must_use]
    pub fn display(&self) -> String {
        format_hms(self.elapsed_ms)
    }
}

#[derive(Debug)]
struct EngineState {
    elapsed_ms: u64,
    name: String,
    presence: Presence,
    failures: u32,
}

impl EngineState {
    fn loaded(record: TimerRecord) -> Self {
        Self {
            elapsed_ms: record.accumulated_ms,
            name: record.name,
            presence: Presence::Loaded,
            failures: 0,
        }
    }

    fn missing(placeholder: &str) -> Self {
        Self {
            elapsed_ms: 0,
            name: placeholder.to_string(),
            presence: Presence::Missing,
            failures: 0,
        }
    }
}

#[derive(Debug)]
struct Shared {
    id: RecordId,
    store: Arc<dyn RecordStore>,
    coordinator: Coordinator,
    config: EngineConfig,
    /// Lease from the last successful start, until this engine stops.
    lease: std::sync::Mutex<Option<Lease>>,
    state: Mutex<EngineState>,
    view_tx: watch::Sender<EngineView>,
    rearm: Notify,
}

/// Elapsed-time tracker for a single record.
#[derive(Debug)]
pub struct TimerEngine {
    shared: Arc<Shared>,
    driver: JoinHandle<()>,
}

impl TimerEngine {
    /// Mount an engine bound to `id` and start its periodic driver.
    ///
    /// The engine always starts idle, showing the persisted elapsed time. A
    /// record that does not exist is not an error: the engine mounts in
    /// display-only mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn mount(
        store: Arc<dyn RecordStore>,
        coordinator: Coordinator,
        id: RecordId,
        config: EngineConfig,
    ) -> Result<Self> {
        let state = match store.read_one(id).await? {
            Some(record) => EngineState::loaded(record),
            None => {
                warn!(%id, "Record not found, mounting in display-only mode");
                EngineState::missing(&config.placeholder_name)
            }
        };

        let initial_view = EngineView {
            id,
            name: state.name.clone(),
            elapsed_ms: state.elapsed_ms,
            run_state: if coordinator.is_active(id) {
                RunState::Running
            } else {
                RunState::Idle
            },
            presence: state.presence,
            store_health: StoreHealth::Healthy,
        };
        let (view_tx, _) = watch::channel(initial_view);

        let shared = Arc::new(Shared {
            id,
            store,
            coordinator,
            config,
            lease: std::sync::Mutex::new(None),
            state: Mutex::new(state),
            view_tx,
            rearm: Notify::new(),
        });

        let driver = tokio::spawn(drive(Arc::clone(&shared)));
        debug!(%id, "Timer engine mounted");

        Ok(Self { shared, driver })
    }

    /// The bound record id.
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.shared.id
    }

    /// The tick and poll period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.shared.config.period
    }

    /// Whether this record's timer is running, here or in another engine.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.run_state() == RunState::Running
    }

    /// Whether this engine itself holds the active slot.
    #[must_use]
    pub fn holds_slot(&self) -> bool {
        self.shared.held_lease().is_some()
    }

    /// Current display snapshot.
    #[must_use]
    pub fn view(&self) -> EngineView {
        let mut view = self.shared.view_tx.borrow().clone();
        view.run_state = self.shared.run_state();
        view
    }

    /// Subscribe to display updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EngineView> {
        self.shared.view_tx.subscribe()
    }

    /// Start accumulating time.
    ///
    /// Ignored if this engine is already running or any timer holds the
    /// active slot. The first tick fires one full period after a successful
    /// start.
    pub async fn start(&self) -> Outcome {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;

        if shared.held_lease().is_some() {
            return Outcome::Ignored;
        }

        // Pick up anything another engine wrote since our last poll.
        shared.poll(&mut state).await;

        let Some(lease) = shared.coordinator.try_acquire(shared.id) else {
            debug!(id = %shared.id, "Start ignored, another timer is active");
            return Outcome::Ignored;
        };

        *shared.lease() = Some(lease);
        shared.rearm.notify_one();
        shared.publish(&state);
        info!(id = %shared.id, elapsed_ms = state.elapsed_ms, "Timer started");
        Outcome::Applied
    }

    /// Stop accumulating time.
    ///
    /// When another engine on the same record is the one running, this
    /// releases the record's slot and that engine stops on its next period
    /// without writing again. Ignored when nothing is running for this record.
    pub async fn stop(&self) -> Outcome {
        let shared = &self.shared;
        let state = shared.state.lock().await;

        let own = shared.lease().take();
        if let Some(lease) = own {
            shared.coordinator.release_lease(lease);
            shared.rearm.notify_one();
        }
        let mirrored = shared.coordinator.release(shared.id);

        if own.is_none() && !mirrored {
            return Outcome::Ignored;
        }

        shared.publish(&state);
        if own.is_some() {
            info!(id = %shared.id, elapsed_ms = state.elapsed_ms, "Timer stopped");
        } else {
            info!(id = %shared.id, "Timer stopped from a mirrored view");
        }
        Outcome::Applied
    }

    /// Zero the elapsed time and stop.
    ///
    /// The zero is persisted before anything else changes. If the store
    /// rejects it, the engine is left exactly as it was.
    pub async fn reset(&self) -> Outcome {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;

        if state.presence == Presence::Loaded {
            match shared.store.update_elapsed(shared.id, 0).await {
                Ok(()) => shared.record_success(&mut state),
                Err(e) if e.is_not_found() => shared.enter_display_only(&mut state),
                Err(e) => {
                    shared.record_failure(&mut state, &e, "reset");
                    shared.publish(&state);
                    return Outcome::Failed;
                }
            }
        }

        *shared.lease() = None;
        shared.coordinator.release(shared.id);
        state.elapsed_ms = 0;
        shared.rearm.notify_one();
        shared.publish(&state);
        info!(id = %shared.id, "Timer reset");
        Outcome::Applied
    }

    /// Rename the record.
    ///
    /// The name is trimmed. Blank names and the current name are ignored.
    pub async fn rename(&self, new_name: &str) -> Outcome {
        let shared = &self.shared;
        let name = new_name.trim();
        let mut state = shared.state.lock().await;

        if name.is_empty() || name == state.name {
            return Outcome::Ignored;
        }

        if state.presence == Presence::Loaded {
            match shared.store.update_name(shared.id, name).await {
                Ok(()) => shared.record_success(&mut state),
                Err(e) if e.is_not_found() => shared.enter_display_only(&mut state),
                Err(e) => {
                    shared.record_failure(&mut state, &e, "rename");
                    shared.publish(&state);
                    return Outcome::Failed;
                }
            }
        }

        debug!(id = %shared.id, from = %state.name, to = name, "Timer renamed");
        state.name = name.to_string();
        shared.publish(&state);
        Outcome::Applied
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        self.driver.abort();
        let lease = self.shared.lease().take();
        if let Some(lease) = lease {
            self.shared.coordinator.release_lease(lease);
        }
        debug!(id = %self.shared.id, "Timer engine unmounted");
    }
}

impl Shared {
    fn lease(&self) -> MutexGuard<'_, Option<Lease>> {
        self.lease.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The lease this engine ticks under, if it is still the slot's holder.
    fn held_lease(&self) -> Option<Lease> {
        let lease = (*self.lease())?;
        self.coordinator.holds(lease).then_some(lease)
    }

    fn run_state(&self) -> RunState {
        if self.held_lease().is_some() || self.coordinator.is_active(self.id) {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    fn store_health(&self, state: &EngineState) -> StoreHealth {
        if state.failures >= self.config.failure_threshold {
            StoreHealth::Degraded {
                consecutive_failures: state.failures,
            }
        } else {
            StoreHealth::Healthy
        }
    }

    fn publish(&self, state: &EngineState) {
        self.view_tx.send_replace(EngineView {
            id: self.id,
            name: state.name.clone(),
            elapsed_ms: state.elapsed_ms,
            run_state: self.run_state(),
            presence: state.presence,
            store_health: self.store_health(state),
        });
    }

    async fn on_period(&self) {
        let mut state = self.state.lock().await;
        let ticking = self.lease().is_some();
        if ticking {
            self.tick(&mut state).await;
        } else {
            self.poll(&mut state).await;
        }
        self.publish(&state);
    }

    async fn tick(&self, state: &mut EngineState) {
        if self.held_lease().is_none() {
            *self.lease() = None;
            info!(id = %self.id, "Active slot released elsewhere, timer stopped");
            return;
        }

        state.elapsed_ms = state.elapsed_ms.saturating_add(self.config.period_ms());
        self.publish(state);

        if state.presence == Presence::Missing {
            return;
        }

        match self.store.update_elapsed(self.id, state.elapsed_ms).await {
            Ok(()) => self.record_success(state),
            Err(e) if e.is_not_found() => self.enter_display_only(state),
            Err(e) => self.record_failure(state, &e, "tick"),
        }
    }

    async fn poll(&self, state: &mut EngineState) {
        match self.store.read_one(self.id).await {
            Ok(Some(record)) => {
                if state.presence == Presence::Missing {
                    info!(id = %self.id, "Record found again, leaving display-only mode");
                    state.presence = Presence::Loaded;
                }
                state.elapsed_ms = record.accumulated_ms;
                state.name = record.name;
                self.record_success(state);
            }
            Ok(None) => {
                self.enter_display_only(state);
                self.record_success(state);
            }
            Err(e) => self.record_failure(state, &e, "poll"),
        }
    }

    fn enter_display_only(&self, state: &mut EngineState) {
        if state.presence == Presence::Loaded {
            warn!(id = %self.id, "Record no longer exists, switching to display-only mode");
            state.presence = Presence::Missing;
        }
    }

    fn record_success(&self, state: &mut EngineState) {
        if state.failures >= self.config.failure_threshold {
            info!(id = %self.id, "Record store reachable again");
        }
        state.failures = 0;
    }

    fn record_failure(&self, state: &mut EngineState, err: &Error, operation: &str) {
        state.failures = state.failures.saturating_add(1);
        if state.failures == self.config.failure_threshold {
            error!(
                id = %self.id,
                operation,
                failures = state.failures,
                error = %err,
                "Record store unreachable"
            );
        } else {
            warn!(id = %self.id, operation, error = %err, "Record store call failed, will retry next period");
        }
    }
}

async fn drive(shared: Arc<Shared>) {
    let period = shared.config.period;
    let mut ticker = time::interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            biased;
            () = shared.rearm.notified() => ticker.reset(),
            _ = ticker.tick() => shared.on_period().await,
        }
    }
}
