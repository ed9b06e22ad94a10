//! Picking up rule changes made by other processes.
//!
//! `clipredact rules …` edits the database from its own process. A
//! [`RuleWatcher`] running next to the monitor checks the stored revision on
//! a timer and reloads the [`ConfigManager`] when it moves, which in turn
//! notifies every observer.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::ConfigManager;
use crate::monitor::MonitorHandle;

/// Periodically reloads a [`ConfigManager`] whose store changed underneath it.
#[derive(Debug)]
pub struct RuleWatcher {
    manager: Arc<ConfigManager>,
    period: Duration,
}

impl RuleWatcher {
    /// Watch `manager`'s store, checking every `period`.
    #[must_use]
    pub fn new(manager: Arc<ConfigManager>, period: Duration) -> Self {
        Self { manager, period }
    }

    /// Check the store once. Returns `true` if the rules were reloaded.
    ///
    /// Failures are logged; the current snapshot stays in place.
    pub fn check_once(&self) -> bool {
        match self.manager.reload_if_changed() {
            Ok(Some(rules)) => {
                info!(
                    interval_ms = rules.polling_interval_ms,
                    exact_rules = rules.exact_rules.len(),
                    "Picked up rule changes"
                );
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to check for rule changes");
                false
            }
        }
    }

    /// Check on every tick until `handle` is stopped.
    pub async fn run(self, handle: MonitorHandle) {
        debug!(period_ms = self.period.as_millis(), "Rule watcher started");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the manager was just loaded.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = handle.stopped() => break,
            }
            self.check_once();
        }

        debug!("Rule watcher stopped");
    }
}
