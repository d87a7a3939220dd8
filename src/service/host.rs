//! Shared service host
//!
//! Wraps a [`PluginService`] behind a single lock and drives its update
//! pass from a background task.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::plugin_service::PluginService;
use crate::error::Result;

/// Thread-safe owner of a plugin service
#[derive(Debug)]
pub struct ServiceHost {
    service: Mutex<PluginService>,
}

impl ServiceHost {
    pub fn new(service: PluginService) -> Self {
        Self {
            service: Mutex::new(service),
        }
    }

    /// Lock the service for a batch of operations
    ///
    /// A panic in a plugin callback does not make the service unusable.
    pub fn lock(&self) -> MutexGuard<'_, PluginService> {
        self.service.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one update pass under the lock
    pub fn update(&self) -> Result<()> {
        self.lock().update()
    }

    pub fn shutdown(&self) {
        self.lock().shutdown();
    }

    /// Spawn the background update task
    ///
    /// Each pass runs on the blocking pool since plugin reads may wait up to
    /// the configured read timeout. Returns a handle that can be used to
    /// abort the task.
    pub fn spawn_update_task(self: &Arc<Self>) -> JoinHandle<()> {
        let host = Arc::clone(self);
        let interval = host.lock().config().update_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if host.lock().is_shut_down() {
                    tracing::debug!("Service shut down, stopping update task");
                    break;
                }

                let pass = Arc::clone(&host);
                match tokio::task::spawn_blocking(move || pass.update()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, status = %e.status(), "Update pass failed");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Update pass panicked");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::service::ServiceConfig;
    use crate::stream::{StreamCallbacks, StreamDescription, StreamType};

    struct Ticking(Arc<Mutex<u32>>);

    impl StreamCallbacks for Ticking {
        fn read(&mut self, _timeout: Duration) -> Result<()> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_update_task_drives_reads() {
        let config = ServiceConfig::default().update_interval(Duration::from_millis(1));
        let host = Arc::new(ServiceHost::new(PluginService::new(config)));
        let reads = Arc::new(Mutex::new(0));

        {
            let mut service = host.lock();
            let set = service.create_stream_set("astra://sensor0").unwrap();
            let depth = service
                .create_stream(
                    set,
                    StreamDescription::of(StreamType::Depth),
                    Ticking(Arc::clone(&reads)),
                )
                .unwrap();
            service.open_stream(depth).unwrap();
        }

        let task = host.spawn_update_task();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(*reads.lock().unwrap() > 0);

        // The task exits on its own once the service is shut down
        host.shutdown();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_update_without_runtime() {
        let host = ServiceHost::new(PluginService::default());
        host.update().unwrap();
        host.shutdown();
        assert!(host.lock().is_shut_down());
    }
}
