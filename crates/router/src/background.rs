//! Background maintenance loops
//!
//! Three independent periodic tasks with a shared shutdown channel:
//! hourly optimization, daily mesh maintenance, and the cortex collapse
//! check. Each iteration reads a parameter snapshot and writes through
//! the service interfaces only.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::router::MemoryRouter;

const COLLAPSE_CHECK_PERIOD: Duration = Duration::from_secs(60);
const MESH_MAINTENANCE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Handles to the running maintenance loops
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl BackgroundTasks {
    /// Spawn all maintenance loops for a router
    pub fn spawn(router: Arc<MemoryRouter>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let mut handles = Vec::new();

        // Hourly (by config) optimization cycle
        {
            let router = router.clone();
            let mut rx = shutdown.subscribe();
            let period = Duration::from_secs(
                router.optimizer_cycle_hours().saturating_mul(60 * 60).max(1),
            );
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.tick().await; // immediate first tick consumed
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            router.run_optimization_cycle();
                        },
                        _ = rx.changed() => break,
                    }
                }
            }));
        }

        // Daily mesh maintenance
        {
            let router = router.clone();
            let mut rx = shutdown.subscribe();
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(MESH_MAINTENANCE_PERIOD);
                interval.tick().await;
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            router.run_mesh_maintenance().await;
                        },
                        _ = rx.changed() => break,
                    }
                }
            }));
        }

        // Cortex collapse on threshold
        {
            let router = router.clone();
            let mut rx = shutdown.subscribe();
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(COLLAPSE_CHECK_PERIOD);
                interval.tick().await;
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            router.run_cortex_collapse().await;
                        },
                        _ = rx.changed() => break,
                    }
                }
            }));
        }

        Self { handles, shutdown }
    }

    /// Stop all loops and wait for them to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::MemoryRouter;

    #[tokio::test]
    async fn test_spawn_and_shutdown() {
        let router = Arc::new(MemoryRouter::offline());
        let tasks = BackgroundTasks::spawn(router);

        // Loops are parked on their intervals; shutdown unblocks them
        tasks.shutdown().await;
    }
}
