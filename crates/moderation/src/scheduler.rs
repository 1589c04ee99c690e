//! Health-check and reconnect timers
//!
//! Two independent timers: a repeating health-check interval and an optional
//! one-shot reconnect deadline. A pending reconnect never pushes back a due
//! health check.

use std::future;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Which timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Time to verify the connection
    HealthCheck,
    /// Time to retry the connection
    Reconnect,
}

/// Watcher timers
#[derive(Debug)]
pub struct Scheduler {
    health_interval: Duration,
    health: Option<Interval>,
    reconnect_at: Option<Instant>,
}

impl Scheduler {
    /// Scheduler with nothing armed
    pub fn new(health_interval: Duration) -> Self {
        Self { health_interval, health: None, reconnect_at: None }
    }

    /// Arm the health check, first due one interval from now
    pub fn start_health(&mut self) {
        let mut interval = time::interval_at(Instant::now() + self.health_interval, self.health_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.health = Some(interval);
    }

    /// Whether health checks are armed
    pub fn health_active(&self) -> bool {
        self.health.is_some()
    }

    /// Arm the reconnect timer, replacing any pending one
    pub fn schedule_reconnect(&mut self, delay: Duration) {
        self.reconnect_at = Some(Instant::now() + delay);
    }

    /// Disarm the reconnect timer
    pub fn cancel_reconnect(&mut self) {
        self.reconnect_at = None;
    }

    /// Whether a reconnect is pending
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_at.is_some()
    }

    /// Disarm both timers
    pub fn stop(&mut self) {
        self.health = None;
        self.reconnect_at = None;
    }

    /// Wait for the next timer
    ///
    /// Cancel safe: if the future is dropped, no wake is lost. With nothing
    /// armed this never completes.
    pub async fn next_wake(&mut self) -> Wake {
        match (self.reconnect_at, self.health.as_mut()) {
            (Some(at), Some(health)) => {
                tokio::select! {
                    biased;
                    _ = time::sleep_until(at) => {
                        self.reconnect_at = None;
                        Wake::Reconnect
                    }
                    _ = health.tick() => Wake::HealthCheck,
                }
            }
            (Some(at), None) => {
                time::sleep_until(at).await;
                self.reconnect_at = None;
                Wake::Reconnect
            }
            (None, Some(health)) => {
                health.tick().await;
                Wake::HealthCheck
            }
            (None, None) => future::pending().await,
        }
    }
}
