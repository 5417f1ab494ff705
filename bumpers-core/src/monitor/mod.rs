//! Periodic monitoring of the event log
//!
//! A [`Monitor`] queries recent events on every tick, evaluates its alert
//! conditions against them and notifies handlers for each condition that
//! fires. It can be ticked by hand, run on a background thread, or (with
//! the `async-runtime` feature) run as a tokio task.

mod condition;
mod handler;

pub use condition::{high_failure_rate, repeated_block, Alert, AlertCondition, EventWindow};
pub use handler::{AlertHandler, TracingAlertHandler};

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration as StdDuration;

use chrono::Duration;
use crossbeam::channel::{self, Sender};

use crate::config::MonitorConfig;
use crate::error::{BumpersError, Result};
use crate::log::{EventLog, EventQuery};
use crate::timing::{Clock, SystemClock};

const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_LOOKBACK_SECS: i64 = 3600;

pub struct Monitor {
    log: Arc<dyn EventLog>,
    conditions: Vec<AlertCondition>,
    handlers: Vec<Arc<dyn AlertHandler>>,
    interval: StdDuration,
    lookback: Duration,
    clock: Arc<dyn Clock>,
}

impl Monitor {
    /// Monitor with no conditions, ticking every minute over the last hour
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self {
            log,
            conditions: Vec::new(),
            handlers: Vec::new(),
            interval: StdDuration::from_secs(DEFAULT_INTERVAL_SECS),
            lookback: Duration::seconds(DEFAULT_LOOKBACK_SECS),
            clock: Arc::new(SystemClock),
        }
    }

    /// Build a monitor with the standard conditions enabled in `config`
    pub fn from_config(config: &MonitorConfig, log: Arc<dyn EventLog>) -> Result<Self> {
        config.validate()?;
        let mut monitor = Self::new(log)
            .with_interval(StdDuration::from_secs(config.check_interval_secs))
            .with_lookback(secs(config.lookback_secs)?);

        if let Some(threshold) = config.failure_rate_threshold {
            monitor.add_condition(high_failure_rate(
                threshold,
                secs(config.failure_rate_window_secs)?,
            ));
        }
        for block in &config.repeated_blocks {
            monitor.add_condition(repeated_block(
                block.action.clone(),
                block.count,
                secs(block.window_secs)?,
            ));
        }
        Ok(monitor)
    }

    pub fn with_interval(mut self, interval: StdDuration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_condition(mut self, condition: AlertCondition) -> Self {
        self.add_condition(condition);
        self
    }

    pub fn with_handler<H: AlertHandler + 'static>(mut self, handler: H) -> Self {
        self.add_handler(handler);
        self
    }

    pub fn add_condition(&mut self, condition: AlertCondition) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    pub fn add_handler<H: AlertHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn conditions(&self) -> &[AlertCondition] {
        &self.conditions
    }

    pub fn interval(&self) -> StdDuration {
        self.interval
    }

    pub fn lookback(&self) -> Duration {
        self.lookback
    }

    /// Run one evaluation pass and return the alerts that fired
    pub fn tick(&mut self) -> Result<Vec<Alert>> {
        let now = self.clock.now();
        let start = now - self.lookback;
        let events = self.log.query(&EventQuery::new().since(start).until(now))?;
        let window = EventWindow::new(&events, start, now);

        let mut alerts = Vec::new();
        for condition in &mut self.conditions {
            if let Some(alert) = condition.evaluate(&window, now) {
                for handler in &self.handlers {
                    handler.notify(&alert);
                }
                alerts.push(alert);
            }
        }

        tracing::debug!(
            events = events.len(),
            alerts = alerts.len(),
            "Monitor tick complete"
        );
        Ok(alerts)
    }

    fn tick_logged(&mut self) {
        if let Err(e) = self.tick() {
            tracing::error!(error = %e, log = self.log.name(), "Monitor tick failed");
        }
    }

    /// Run on a background thread until the handle is stopped or dropped
    pub fn spawn(mut self) -> Result<MonitorHandle> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let ticker = channel::tick(self.interval);

        let thread = std::thread::Builder::new()
            .name("bumpers-monitor".into())
            .spawn(move || {
                tracing::info!(interval = ?self.interval, "Monitor started");
                self.tick_logged();
                loop {
                    channel::select! {
                        recv(ticker) -> _ => self.tick_logged(),
                        recv(stop_rx) -> _ => break,
                    }
                }
                tracing::info!("Monitor stopped");
                self
            })?;

        Ok(MonitorHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Run as a tokio task until the handle is shut down
    #[cfg(feature = "async-runtime")]
    pub fn spawn_async(mut self) -> AsyncMonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            tracing::info!(interval = ?self.interval, "Monitor started");
            // The first tick completes immediately
            let mut interval = tokio::time::interval(self.interval);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = interval.tick() => self = self.tick_blocking().await,
                }
            }
            tracing::info!("Monitor stopped");
            self
        });

        AsyncMonitorHandle {
            handle,
            shutdown_tx,
        }
    }
}

#[cfg(feature = "async-runtime")]
impl Monitor {
    /// Tick on the blocking pool; the file log reads synchronously
    async fn tick_blocking(mut self) -> Self {
        let task = tokio::task::spawn_blocking(move || {
            self.tick_logged();
            self
        });
        match task.await {
            Ok(monitor) => monitor,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("log", &self.log.name())
            .field("conditions", &self.conditions)
            .field("handlers", &self.handlers.len())
            .field("interval", &self.interval)
            .field("lookback", &self.lookback)
            .finish()
    }
}

fn secs(value: u64) -> Result<Duration> {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| BumpersError::config(format!("duration of {} seconds is out of range", value)))
}

/// Handle to a monitor running on its own thread
///
/// Dropping the handle stops the thread.
#[derive(Debug)]
pub struct MonitorHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<Monitor>>,
}

impl MonitorHandle {
    /// Stop the thread and take the monitor back
    pub fn stop(mut self) -> Result<Monitor> {
        self.shutdown()
            .ok_or_else(|| BumpersError::InternalError {
                reason: "monitor thread panicked".to_string(),
            })
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    fn shutdown(&mut self) -> Option<Monitor> {
        // Disconnecting the channel wakes the select
        drop(self.stop_tx.take());
        self.thread.take().and_then(|t| t.join().ok())
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to a monitor running as a tokio task
#[cfg(feature = "async-runtime")]
#[derive(Debug)]
pub struct AsyncMonitorHandle {
    handle: tokio::task::JoinHandle<Monitor>,
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
}

#[cfg(feature = "async-runtime")]
impl AsyncMonitorHandle {
    /// Signal the task to stop and wait for it
    pub async fn shutdown(self) -> std::result::Result<Monitor, tokio::task::JoinError> {
        let _ = self.shutdown_tx.send(()).await;
        self.handle.await
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
