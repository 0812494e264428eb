//! SpinDriver — real-time runtime around the coordinator
//!
//! The coordinator keeps a logical millisecond clock. The driver maps it onto
//! `tokio::time::Instant` (milliseconds since the driver started) and runs a
//! pump task that sleeps until the next timer deadline, or until `spin()` or
//! shutdown wakes it. Stage events and lookup results go out on a broadcast
//! channel; each completed session gets exactly one lookup.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use rf_stage::{Stage, StageEvent};

use crate::coordinator::{CompletedSession, MachineView, SpinCoordinator};
use crate::error::ResolveError;
use crate::resolver::{Record, ResultResolver};

/// Driver settings
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Upper bound for one result lookup
    pub lookup_timeout: Duration,
    /// Broadcast channel capacity
    pub event_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(5),
            event_capacity: 256,
        }
    }
}

/// Lookup outcome for one completed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub generation: u64,
    pub final_number: u64,
    /// Session ended by the watchdog
    pub forced: bool,
    /// None for no match, lookup error, or timeout
    pub record: Option<Record>,
}

/// Everything the driver publishes
#[derive(Debug, Clone)]
pub enum DriverEvent {
    Stage(StageEvent),
    Resolved(Resolution),
}

/// State shared between the handle, the pump and lookup tasks
#[derive(Clone)]
struct Shared {
    coordinator: Arc<Mutex<SpinCoordinator>>,
    resolver: Arc<dyn ResultResolver>,
    events: broadcast::Sender<DriverEvent>,
    wake: Arc<Notify>,
    origin: Instant,
    lookup_timeout: Duration,
}

impl Shared {
    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Bring the coordinator up to real time and publish what happened.
    /// Returns the next timer deadline (logical ms).
    fn step(&self) -> Option<u64> {
        let now = self.elapsed_ms();
        let (stages, completed, next) = {
            let mut coordinator = self.coordinator.lock();
            coordinator.advance_to(now);
            let stages = coordinator.drain_stages();
            let completed: Vec<CompletedSession> =
                std::iter::from_fn(|| coordinator.take_completed()).collect();
            (stages, completed, coordinator.next_deadline())
        };

        for stage in stages {
            // No subscribers is fine
            let _ = self.events.send(DriverEvent::Stage(stage));
        }
        for session in completed {
            self.spawn_lookup(session);
        }
        next
    }

    fn spawn_lookup(&self, session: CompletedSession) {
        let shared = self.clone();
        tokio::spawn(async move {
            let number = session.final_number;
            let lookup = tokio::time::timeout(shared.lookup_timeout, shared.resolver.resolve(number));
            let record = match lookup.await {
                Ok(Ok(record)) => record,
                Ok(Err(e)) => {
                    log::warn!("[Resolver] {} lookup of {} failed: {}", shared.resolver.name(), number, e);
                    None
                }
                Err(_) => {
                    let e = ResolveError::Timeout(
                        u64::try_from(shared.lookup_timeout.as_millis()).unwrap_or(u64::MAX),
                    );
                    log::warn!("[Resolver] {} lookup of {}: {}", shared.resolver.name(), number, e);
                    None
                }
            };

            log::info!(
                "[Driver] generation {} resolved {} -> {}",
                session.generation,
                number,
                record.as_ref().map_or("no match", |r| r.name.as_str())
            );

            let stage = Stage::ResultResolved {
                final_number: number,
                matched: record.is_some(),
            };
            let _ = shared.events.send(DriverEvent::Stage(StageEvent::new(
                stage,
                shared.elapsed_ms(),
                session.generation,
            )));
            let _ = shared.events.send(DriverEvent::Resolved(Resolution {
                generation: session.generation,
                final_number: number,
                forced: session.was_forced(),
                record,
            }));
        });
    }
}

/// Real-time handle over a [`SpinCoordinator`]
pub struct SpinDriver {
    shared: Shared,
    pump: Option<JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl SpinDriver {
    /// Start the pump task. Must be called inside a tokio runtime.
    pub fn start(
        coordinator: SpinCoordinator,
        resolver: Arc<dyn ResultResolver>,
        config: DriverConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (shutdown_tx, _) = broadcast::channel(1);

        let shared = Shared {
            coordinator: Arc::new(Mutex::new(coordinator)),
            resolver,
            events,
            wake: Arc::new(Notify::new()),
            origin: Instant::now(),
            lookup_timeout: config.lookup_timeout,
        };

        let pump_shared = shared.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        let pump = tokio::spawn(async move {
            log::debug!("[Driver] pump started");
            loop {
                let deadline = pump_shared
                    .step()
                    .and_then(|ms| pump_shared.origin.checked_add(Duration::from_millis(ms)));
                let sleep = async {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                };

                tokio::select! {
                    _ = sleep => {}
                    _ = pump_shared.wake.notified() => {}
                    _ = shutdown_rx.recv() => {
                        log::debug!("[Driver] pump stopped");
                        break;
                    }
                }
            }
        });

        Self {
            shared,
            pump: Some(pump),
            shutdown_tx,
        }
    }

    /// Start a session now. Returns the new generation, or None if a session
    /// is already in flight.
    pub fn spin(&self) -> Option<u64> {
        let generation = {
            let mut coordinator = self.shared.coordinator.lock();
            coordinator.advance_to(self.shared.elapsed_ms());
            coordinator.spin()
        };
        self.shared.wake.notify_one();
        generation
    }

    /// Renderer snapshot
    pub fn snapshot(&self) -> MachineView {
        self.shared.coordinator.lock().snapshot()
    }

    pub fn can_spin(&self) -> bool {
        self.shared.coordinator.lock().can_spin()
    }

    /// Subscribe to stage events and lookup results
    pub fn subscribe(&self) -> broadcast::Receiver<DriverEvent> {
        self.shared.events.subscribe()
    }

    /// Shared coordinator, for inspection
    pub fn coordinator(&self) -> Arc<Mutex<SpinCoordinator>> {
        Arc::clone(&self.shared.coordinator)
    }

    /// Stop the pump and wait for it. Lookups already running still publish.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                log::error!("[Driver] pump task failed: {}", e);
            }
        }
    }
}

impl Drop for SpinDriver {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
