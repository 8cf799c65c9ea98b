use crate::baseline::{BaselineTracker, TrendReport};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use vigil_alert::engine::AlertEngine;
use vigil_alert::error::Result as AlertResult;
use vigil_alert::MetricSource;
use vigil_common::config::MonitorConfig;
use vigil_common::types::{Alert, MetricSample};
use vigil_notify::dispatcher::NotificationDispatcher;

/// Weight of the previous average in the pass-duration moving average.
const PASS_EMA_WEIGHT: f64 = 0.8;

/// Condition callback invoked explicitly by name, for conditions the fixed
/// operator set cannot express (ranges, percent change against baseline).
pub type CustomEvaluator = Box<dyn Fn(f64, f64, &[MetricSample]) -> bool + Send + Sync>;

/// Running totals for the scheduler.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MonitorStats {
    pub evaluations_total: u64,
    pub evaluations_succeeded: u64,
    pub evaluations_failed: u64,
    pub alerts_triggered: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Exponentially weighted moving average of pass duration.
    pub avg_pass_duration_ms: f64,
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic scheduler over the alert engine.
///
/// `Stopped -> Running` on [`start`](Self::start), back on
/// [`stop`](Self::stop); at most one instance of the loop runs at a time.
/// Scheduled ticks and [`force_evaluation`](Self::force_evaluation) share a
/// single-flight lock, so evaluation passes never overlap.
pub struct ThresholdMonitor {
    config: MonitorConfig,
    engine: Arc<AlertEngine>,
    tracker: Arc<BaselineTracker>,
    source: Arc<dyn MetricSource>,
    dispatcher: Option<Arc<NotificationDispatcher>>,
    evaluators: RwLock<HashMap<String, CustomEvaluator>>,
    stats: StdMutex<MonitorStats>,
    pass_lock: Mutex<()>,
    running: StdMutex<Option<Running>>,
}

impl ThresholdMonitor {
    pub fn new(
        config: MonitorConfig,
        engine: Arc<AlertEngine>,
        tracker: Arc<BaselineTracker>,
        source: Arc<dyn MetricSource>,
    ) -> Self {
        Self {
            config,
            engine,
            tracker,
            source,
            dispatcher: None,
            evaluators: RwLock::new(HashMap::new()),
            stats: StdMutex::new(MonitorStats::default()),
            pass_lock: Mutex::new(()),
            running: StdMutex::new(None),
        }
    }

    /// Attaches the dispatcher newly triggered alerts fan out through.
    pub fn with_dispatcher(mut self, dispatcher: Arc<NotificationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Begins the periodic tick loop. A second call while running is a
    /// no-op with a warning, not an error.
    pub fn start(self: Arc<Self>) {
        let mut running = self.running.lock().unwrap_or_else(|p| p.into_inner());
        if running.is_some() {
            tracing::warn!("Threshold monitor already running, start ignored");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut shutdown = shutdown_rx;
            let mut tick = interval(Duration::from_secs(monitor.config.interval_secs));
            // A pass that overruns its tick delays the next one; passes
            // never stack up.
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let cancel = shutdown.clone();
                        let _ = monitor.run_pass(move || *cancel.borrow()).await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Threshold monitor loop exited");
        });

        *running = Some(Running {
            shutdown: shutdown_tx,
            handle,
        });
        tracing::info!(
            interval_secs = self.config.interval_secs,
            "Threshold monitor started"
        );
    }

    /// Signals the loop to stop and waits up to the configured grace period
    /// for the in-flight pass. On expiry the loop is left to finish in the
    /// background — best effort, not a forced kill.
    pub async fn stop(&self) {
        let running = {
            let mut guard = self.running.lock().unwrap_or_else(|p| p.into_inner());
            guard.take()
        };
        let Some(running) = running else {
            tracing::warn!("Threshold monitor not running, stop ignored");
            return;
        };

        let _ = running.shutdown.send(true);
        match timeout(
            Duration::from_secs(self.config.stop_grace_secs),
            running.handle,
        )
        .await
        {
            Ok(Ok(())) => tracing::info!("Threshold monitor stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "Monitor task ended abnormally"),
            Err(_) => tracing::warn!(
                grace_secs = self.config.stop_grace_secs,
                "In-flight evaluation pass did not finish within the grace period"
            ),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .is_some()
    }

    /// Runs one evaluation pass outside the schedule, under the same
    /// single-flight guarantee as scheduled ticks.
    pub async fn force_evaluation(&self) -> AlertResult<Vec<Alert>> {
        tracing::debug!("Forced evaluation pass requested");
        self.run_pass(|| false).await
    }

    async fn run_pass(&self, cancelled: impl Fn() -> bool) -> AlertResult<Vec<Alert>> {
        let _flight = self.pass_lock.lock().await;
        let started = Instant::now();

        let result = self.evaluate_pass(&cancelled);

        let elapsed = started.elapsed();
        if elapsed > Duration::from_secs(self.config.evaluation_timeout_secs) {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                budget_secs = self.config.evaluation_timeout_secs,
                "Evaluation pass exceeded its time budget"
            );
        }
        self.record_pass(&result, elapsed.as_secs_f64() * 1000.0);

        if let Ok(alerts) = &result {
            self.dispatch_alerts(alerts);
        }
        result
    }

    /// Samples every metric referenced by an enabled rule, then evaluates
    /// all rules. The cancellation signal is checked between metrics and
    /// between rules, not mid-lookup.
    fn evaluate_pass(&self, cancelled: &(impl Fn() -> bool)) -> AlertResult<Vec<Alert>> {
        let rules = self.engine.list_rules()?;
        let metrics: BTreeSet<&str> = rules
            .iter()
            .filter(|r| r.enabled)
            .map(|r| r.metric_name.as_str())
            .collect();

        let now = Utc::now();
        for metric in metrics {
            if cancelled() {
                tracing::info!("Evaluation pass cancelled during sampling");
                return Ok(Vec::new());
            }
            if let Some(value) = self.source.get_value(metric) {
                self.tracker.record(metric, value, now);
            }
        }

        self.engine.evaluate_until(cancelled)
    }

    fn dispatch_alerts(&self, alerts: &[Alert]) {
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        for alert in alerts {
            let Some(rule_id) = alert.rule_id.as_deref() else {
                continue;
            };
            match self.engine.get_rule(rule_id) {
                Ok(Some(rule)) => {
                    // The alert is already persisted; delivery runs on its
                    // own task and its outcome never feeds back.
                    let dispatcher = dispatcher.clone();
                    let alert = alert.clone();
                    tokio::spawn(async move {
                        dispatcher.dispatch(&alert, &rule).await;
                    });
                }
                Ok(None) => {
                    tracing::warn!(rule_id, "Rule deleted before dispatch, skipping");
                }
                Err(e) => {
                    tracing::error!(rule_id, error = %e, "Rule lookup for dispatch failed");
                }
            }
        }
    }

    fn record_pass(&self, outcome: &AlertResult<Vec<Alert>>, elapsed_ms: f64) {
        let mut stats = self.stats.lock().unwrap_or_else(|p| p.into_inner());
        stats.evaluations_total += 1;
        match outcome {
            Ok(alerts) => {
                stats.evaluations_succeeded += 1;
                stats.alerts_triggered += alerts.len() as u64;
            }
            Err(e) => {
                stats.evaluations_failed += 1;
                tracing::error!(error = %e, "Evaluation pass failed");
            }
        }
        stats.last_run_at = Some(Utc::now());
        stats.avg_pass_duration_ms = if stats.evaluations_total == 1 {
            elapsed_ms
        } else {
            PASS_EMA_WEIGHT * stats.avg_pass_duration_ms + (1.0 - PASS_EMA_WEIGHT) * elapsed_ms
        };
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Registers a named condition evaluator. Evaluators are only invoked
    /// explicitly through [`evaluate_custom`](Self::evaluate_custom), never
    /// wired into the scheduled pass.
    pub fn register_custom_evaluator<F>(&self, name: &str, evaluator: F)
    where
        F: Fn(f64, f64, &[MetricSample]) -> bool + Send + Sync + 'static,
    {
        self.evaluators
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(name.to_string(), Box::new(evaluator));
        tracing::debug!(name, "Custom evaluator registered");
    }

    /// Invokes a registered evaluator with the metric's recent history.
    /// Returns `None` when no evaluator with that name exists.
    pub fn evaluate_custom(
        &self,
        name: &str,
        metric: &str,
        current: f64,
        threshold: f64,
    ) -> Option<bool> {
        let evaluators = self.evaluators.read().unwrap_or_else(|p| p.into_inner());
        let evaluator = evaluators.get(name)?;
        let history = self
            .tracker
            .recent_samples(metric, self.config.baseline_window_hours);
        Some(evaluator(current, threshold, &history))
    }

    pub fn baseline(&self, metric: &str) -> Option<f64> {
        self.tracker.baseline(metric)
    }

    pub fn trend(&self, metric: &str, hours: u64) -> TrendReport {
        self.tracker.trend(metric, hours)
    }

    pub fn tracker(&self) -> &Arc<BaselineTracker> {
        &self.tracker
    }
}
