//! Monitoring engine
//!
//! Owns one [`MonitorSession`] and drives both monitors:
//! - a timer loop running the lifecycle pass and the inventory, task and soil
//!   scans every tick, plus the cash-flow rule every Nth tick (first tick
//!   fires immediately)
//! - one listener per change feed (inventory, tasks, farms)
//!
//! The scans catch whatever a feed missed: a feed that could not be opened,
//! one that closed, or a lagged receiver. Dedup keeps them at-most-once.
//!
//! `stop()` signals every task, waits for in-flight work to finish, then
//! clears the dedup history.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use shared::GrowthProfileRegistry;

use super::conditions::{ConditionMonitor, ConditionSettings};
use super::lifecycle::CropLifecycleMonitor;
use super::notification::NotificationSink;
use super::session::MonitorSession;
use crate::config::MonitoringConfig;
use crate::error::AppResult;
use crate::store::{ChangeEvent, ChangeFilter, Stores, Subscription};

/// Snapshot of engine activity, served by the status endpoint
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ticks: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub alerts_emitted: u64,
    pub last_error: Option<String>,
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub crops_evaluated: usize,
    pub crops_transitioned: usize,
    pub items_evaluated: usize,
    pub tasks_evaluated: usize,
    pub farms_evaluated: usize,
    pub cashflow_checked: bool,
    pub alerts_emitted: usize,
    pub failures: usize,
}

struct Running {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

struct Shared {
    session: MonitorSession,
    lifecycle: CropLifecycleMonitor,
    conditions: ConditionMonitor,
    status: RwLock<EngineStatus>,
    cashflow_every_ticks: u64,
}

impl Shared {
    fn update_status(&self, f: impl FnOnce(&mut EngineStatus)) {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut status);
    }

    /// Lifecycle pass and condition scans; cash flow when `tick` is a multiple of N
    async fn tick(&self, tick: u64, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        let mut last_error = None;

        match self.lifecycle.run(&self.session, now).await {
            Ok(lifecycle) => {
                report.crops_evaluated = lifecycle.evaluated;
                report.crops_transitioned = lifecycle.transitioned;
                report.alerts_emitted += lifecycle.alerts_emitted;
                report.failures += lifecycle.failed;
            }
            Err(e) => {
                report.failures += 1;
                tracing::error!("Crop read failed; lifecycle pass skipped: {}", e);
                last_error = Some(e.to_string());
            }
        }

        match self.conditions.scan_inventory(&self.session).await {
            Ok(items) => {
                report.items_evaluated = items.evaluated;
                report.alerts_emitted += items.alerts_emitted;
                report.failures += items.failed;
            }
            Err(e) => {
                report.failures += 1;
                tracing::error!("Inventory read failed; inventory scan skipped: {}", e);
                last_error = Some(e.to_string());
            }
        }

        match self.conditions.scan_tasks(&self.session, now).await {
            Ok(tasks) => {
                report.tasks_evaluated = tasks.evaluated;
                report.alerts_emitted += tasks.alerts_emitted;
                report.failures += tasks.failed;
            }
            Err(e) => {
                report.failures += 1;
                tracing::error!("Task read failed; task scan skipped: {}", e);
                last_error = Some(e.to_string());
            }
        }

        match self.conditions.scan_farms(&self.session).await {
            Ok(farms) => {
                report.farms_evaluated = farms.evaluated;
                report.alerts_emitted += farms.alerts_emitted;
                report.failures += farms.failed;
            }
            Err(e) => {
                report.failures += 1;
                tracing::error!("Farm read failed; soil scan skipped: {}", e);
                last_error = Some(e.to_string());
            }
        }

        if tick % self.cashflow_every_ticks == 0 {
            report.cashflow_checked = true;
            match self.conditions.check_cashflow(&self.session, now).await {
                Ok(emitted) => report.alerts_emitted += emitted,
                Err(e) => {
                    report.failures += 1;
                    tracing::error!("Cash-flow check failed: {}", e);
                    last_error = Some(e.to_string());
                }
            }
        }

        self.update_status(|status| {
            status.ticks = tick;
            status.last_tick_at = Some(now);
            status.alerts_emitted += report.alerts_emitted as u64;
            if last_error.is_some() {
                status.last_error = last_error;
            }
        });

        tracing::info!(tick, ?report, "Monitoring tick complete");
        report
    }
}

pub struct MonitoringEngine {
    stores: Stores,
    shared: Arc<Shared>,
    config: MonitoringConfig,
    running: Mutex<Option<Running>>,
}

impl MonitoringEngine {
    pub fn new(
        stores: Stores,
        sink: Arc<NotificationSink>,
        registry: Arc<GrowthProfileRegistry>,
        config: MonitoringConfig,
    ) -> Self {
        let lifecycle = CropLifecycleMonitor::new(
            stores.crops.clone(),
            registry,
            config.lifecycle_params(),
        );
        let conditions = ConditionMonitor::new(
            stores.inventory.clone(),
            stores.tasks.clone(),
            stores.farms.clone(),
            stores.ledger.clone(),
            ConditionSettings {
                default_low_stock_threshold: config.default_low_stock_threshold,
                task_due_soon_window: config.task_due_soon_window(),
                soil: config.soil_thresholds(),
            },
        );

        Self {
            stores,
            shared: Arc::new(Shared {
                session: MonitorSession::new(sink),
                lifecycle,
                conditions,
                status: RwLock::new(EngineStatus::default()),
                cashflow_every_ticks: config.cashflow_every_ticks.max(1),
            }),
            config,
            running: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &MonitorSession {
        &self.shared.session
    }

    pub fn status(&self) -> EngineStatus {
        self.shared
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Run one tick immediately, outside the timer loop
    pub async fn run_once(&self, tick: u64, now: DateTime<Utc>) -> TickReport {
        self.shared.tick(tick, now).await
    }

    /// Subscribe to the change feeds and start the timer loop.
    /// Starting a running engine does nothing.
    pub async fn start(&self) -> AppResult<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::debug!("Monitoring engine already running");
            return Ok(());
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::new();

        // A feed that cannot be opened is logged; the rest of the engine still runs
        match self.stores.inventory.subscribe_items(ChangeFilter::All).await {
            Ok(feed) => handles.push(spawn_listener(
                "inventory",
                feed,
                shutdown_rx.clone(),
                self.shared.clone(),
                |shared, change| async move {
                    shared.conditions.on_item_change(&shared.session, change).await
                },
            )),
            Err(e) => tracing::error!("Inventory change feed unavailable: {}", e),
        }

        match self.stores.tasks.subscribe_tasks(ChangeFilter::All).await {
            Ok(feed) => handles.push(spawn_listener(
                "tasks",
                feed,
                shutdown_rx.clone(),
                self.shared.clone(),
                |shared, change| async move {
                    shared.conditions.on_task_change(&shared.session, change).await
                },
            )),
            Err(e) => tracing::error!("Task change feed unavailable: {}", e),
        }

        match self.stores.farms.subscribe_farms(ChangeFilter::All).await {
            Ok(feed) => handles.push(spawn_listener(
                "farms",
                feed,
                shutdown_rx.clone(),
                self.shared.clone(),
                |shared, change| async move {
                    shared.conditions.on_farm_change(&shared.session, change).await
                },
            )),
            Err(e) => tracing::error!("Farm change feed unavailable: {}", e),
        }

        handles.push(spawn_timer(
            self.config.interval(),
            shutdown_rx,
            self.shared.clone(),
        ));

        let started_at = Utc::now();
        self.shared.update_status(|status| {
            status.running = true;
            status.started_at = Some(started_at);
            status.ticks = 0;
            status.last_error = None;
        });

        tracing::info!(
            interval_secs = self.config.interval().as_secs(),
            listeners = handles.len() - 1,
            "Monitoring engine started"
        );

        *running = Some(Running { shutdown, handles });
        Ok(())
    }

    /// Stop every task, wait for in-flight work, and clear the session
    pub async fn stop(&self) {
        let Some(Running { shutdown, handles }) = self.running.lock().await.take() else {
            return;
        };

        let _ = shutdown.send(true);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Monitoring task ended abnormally: {}", e);
            }
        }

        self.shared.session.reset();
        self.shared.update_status(|status| status.running = false);
        tracing::info!("Monitoring engine stopped");
    }

    pub async fn restart(&self) -> AppResult<()> {
        self.stop().await;
        self.start().await
    }
}

fn spawn_listener<T, F, Fut>(
    collection: &'static str,
    mut feed: Subscription<T>,
    mut shutdown: watch::Receiver<bool>,
    shared: Arc<Shared>,
    handle: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Fn(Arc<Shared>, ChangeEvent<T>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        loop {
            let change = tokio::select! {
                _ = shutdown.changed() => break,
                change = feed.next() => change,
            };
            match change {
                Some(change) => handle(shared.clone(), change).await,
                None => {
                    tracing::warn!(collection, "Change feed closed");
                    break;
                }
            }
        }
        feed.cancel();
        tracing::debug!(collection, "Change listener stopped");
    })
}

fn spawn_timer(
    interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
    shared: Arc<Shared>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut tick = 0u64;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            tick += 1;
            shared.tick(tick, Utc::now()).await;
        }
        tracing::debug!("Monitoring timer stopped");
    })
}
