//! Alert handlers

use super::condition::Alert;

/// Receives fired alerts
pub trait AlertHandler: Send + Sync {
    fn notify(&self, alert: &Alert);
}

impl<F> AlertHandler for F
where
    F: Fn(&Alert) + Send + Sync,
{
    fn notify(&self, alert: &Alert) {
        self(alert)
    }
}

/// Forwards alerts to `tracing` at warn level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertHandler;

impl AlertHandler for TracingAlertHandler {
    fn notify(&self, alert: &Alert) {
        tracing::warn!(
            condition = %alert.condition,
            fired_at = %alert.fired_at,
            events = alert.events_in_window,
            "ALERT: {}",
            alert.message
        );
    }
}
