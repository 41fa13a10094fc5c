//! Periodic eviction of idle visitor entries.
//!
//! The sweep mechanism lives in `candor_core`; this module only schedules
//! it. The task is owned by the process lifecycle: constructed in `main`,
//! stopped at graceful shutdown through its handle rather than being
//! detached fire-and-forget.

use candor_core::VisitorRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Sweeps one or more visitor registries on a fixed schedule
pub struct Sweeper {
    interval: Duration,
    retention: Duration,
    registries: Vec<Arc<VisitorRegistry>>,
}

impl Sweeper {
    pub fn new(interval: Duration, retention: Duration) -> Self {
        Self {
            interval,
            retention,
            registries: Vec::new(),
        }
    }

    /// Add a registry to the sweep schedule
    pub fn watch(mut self, registry: Arc<VisitorRegistry>) -> Self {
        self.registries.push(registry);
        self
    }

    /// One sweep pass over every watched registry
    pub fn run_once(&self) {
        for registry in &self.registries {
            let removed = registry.sweep(self.retention);
            if removed > 0 {
                debug!(removed, remaining = registry.len(), "evicted idle visitor entries");
            }
        }
    }

    /// Start the periodic task; the returned handle stops it
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // An interval's first tick is immediate; the first real sweep
            // should happen one full period in.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.run_once(),
                    _ = rx.changed() => break,
                }
            }
            debug!("visitor sweeper stopped");
        });
        SweeperHandle { shutdown, handle }
    }
}

/// Handle for stopping a spawned [`Sweeper`]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the task and wait for it to finish its current pass
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candor_core::RatePolicy;

    fn registry() -> Arc<VisitorRegistry> {
        Arc::new(VisitorRegistry::new(RatePolicy::per_seconds(10.0, 3)))
    }

    #[test]
    fn run_once_sweeps_every_watched_registry() {
        let a = registry();
        let b = registry();
        a.allow("x");
        b.allow("y");

        Sweeper::new(Duration::from_secs(300), Duration::ZERO)
            .watch(a.clone())
            .watch(b.clone())
            .run_once();

        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[tokio::test]
    async fn spawned_sweeper_evicts_and_stops() {
        let visitors = registry();
        visitors.allow("x");

        let handle = Sweeper::new(Duration::from_millis(10), Duration::ZERO)
            .watch(visitors.clone())
            .spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(visitors.is_empty());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_does_not_wait_for_the_next_tick() {
        let handle = Sweeper::new(Duration::from_secs(3600), Duration::ZERO)
            .watch(registry())
            .spawn();

        // Must return promptly despite the hour-long interval.
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("shutdown timed out");
    }
}
