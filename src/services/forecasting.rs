//! Forecast refresh service.
//!
//! [`ForecastService`] pulls a ticket batch from its [`TicketSource`], runs
//! the pure forecasting pipeline and publishes the result as the current
//! [`ForecastSnapshot`]. [`ForecastRefresher`] drives it on a timer.
//!
//! Cycles may overlap (timer tick, manual trigger, API request). Each cycle
//! takes a generation number when it starts and its result is only published
//! if nothing newer has been published in the meantime.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::errors::ForecastError;
use crate::metrics::{self, RefreshOutcome};
use crate::ml::forecasting::{
    compute_bounded_forecast_report, ForecastReport, DEFAULT_MAX_SPAN_DAYS,
};
use crate::models::TicketRecord;
use crate::services::ticket_source::TicketSource;

/// Source of "today" for the service layer.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn at_date(date: NaiveDate) -> Self {
        Self(date.and_time(chrono::NaiveTime::default()).and_utc())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A published forecast.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSnapshot {
    pub generation: u64,
    pub computed_at: DateTime<Utc>,
    pub report: ForecastReport,
}

/// Most recent refresh failure.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshFailure {
    pub generation: u64,
    pub failed_at: DateTime<Utc>,
    pub message: String,
}

pub struct ForecastService {
    source: Arc<dyn TicketSource>,
    clock: Arc<dyn Clock>,
    degree: usize,
    max_span_days: u64,
    next_generation: AtomicU64,
    latest: RwLock<Option<Arc<ForecastSnapshot>>>,
    last_error: RwLock<Option<RefreshFailure>>,
}

impl ForecastService {
    pub fn new(source: Arc<dyn TicketSource>, clock: Arc<dyn Clock>, degree: usize) -> Self {
        Self {
            source,
            clock,
            degree,
            max_span_days: DEFAULT_MAX_SPAN_DAYS,
            next_generation: AtomicU64::new(1),
            latest: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }

    /// Records older than `days` before today are left out of every report.
    pub fn with_max_span_days(mut self, days: u64) -> Self {
        self.max_span_days = days;
        self
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Runs one cycle: fetch, compute, publish.
    ///
    /// Returns whichever snapshot is current once this cycle is done, which
    /// is a newer one when this cycle was overtaken.
    pub async fn refresh(&self) -> Result<Arc<ForecastSnapshot>, ForecastError> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        debug!(generation, source = %self.source.describe(), "starting forecast refresh");

        let records = match self.source.fetch().await {
            Ok(records) => records,
            Err(err) => {
                warn!(generation, error = %err, "forecast refresh failed");
                metrics::record_refresh(RefreshOutcome::SourceError);
                *self.last_error.write().await = Some(RefreshFailure {
                    generation,
                    failed_at: self.clock.now(),
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        let report = self.compute(&records, self.degree);
        let snapshot = Arc::new(ForecastSnapshot {
            generation,
            computed_at: self.clock.now(),
            report,
        });

        Ok(self.publish(snapshot).await)
    }

    /// Computes a report for a caller-supplied batch without publishing it.
    pub fn compute(&self, records: &[TicketRecord], degree: usize) -> ForecastReport {
        let started = Instant::now();
        let report =
            compute_bounded_forecast_report(records, degree, self.clock.today(), self.max_span_days);
        metrics::record_report(&report, started.elapsed());
        report
    }

    /// Installs `snapshot` unless a newer generation is already current.
    async fn publish(&self, snapshot: Arc<ForecastSnapshot>) -> Arc<ForecastSnapshot> {
        let mut latest = self.latest.write().await;

        if let Some(current) = latest.as_ref() {
            if current.generation > snapshot.generation {
                debug!(
                    stale = snapshot.generation,
                    current = current.generation,
                    "discarding superseded forecast"
                );
                metrics::record_refresh(RefreshOutcome::Superseded);
                return current.clone();
            }
        }

        info!(
            generation = snapshot.generation,
            days = snapshot.report.series.len(),
            accepted = snapshot.report.accepted_records,
            dropped = snapshot.report.invalid_records
                + snapshot.report.future_dated_records
                + snapshot.report.out_of_span_records,
            forecasted = snapshot.report.is_forecasted(),
            "published ticket forecast"
        );
        metrics::record_refresh(RefreshOutcome::Published);

        let mut last_error = self.last_error.write().await;
        if last_error
            .as_ref()
            .is_some_and(|failure| failure.generation < snapshot.generation)
        {
            *last_error = None;
        }

        *latest = Some(snapshot.clone());
        snapshot
    }

    pub async fn latest(&self) -> Option<Arc<ForecastSnapshot>> {
        self.latest.read().await.clone()
    }

    pub async fn last_error(&self) -> Option<RefreshFailure> {
        self.last_error.read().await.clone()
    }
}

/// Periodic driver for [`ForecastService::refresh`].
pub struct ForecastRefresher;

impl ForecastRefresher {
    /// Spawns the refresh loop: one cycle immediately, then one per
    /// `interval`. Late ticks are skipped rather than bursted.
    pub fn spawn(service: Arc<ForecastService>, interval: Duration) -> RefreshHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let trigger = Arc::new(Notify::new());
        let wake = trigger.clone();

        let task = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs_f64(), "starting forecast refresher");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                    _ = wake.notified() => {
                        debug!("manual forecast refresh requested");
                    }
                }

                // Errors are logged and recorded by the service; the previous
                // snapshot stays current.
                let _ = service.refresh().await;
            }

            info!("forecast refresher stopped");
        });

        RefreshHandle {
            shutdown: shutdown_tx,
            trigger,
            task: Some(task),
        }
    }
}

/// Owner of a running refresh loop. Dropping it aborts the loop.
pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    trigger: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Asks the loop to run a cycle now instead of waiting for the next tick.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "forecast refresher task panicked");
                }
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
