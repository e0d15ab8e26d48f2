//! # Background Services
//!
//! Producers that run beside the main loop and only ever talk to it through
//! the [`EventQueue`](crate::event::EventQueue):
//!
//! * [`timer::TimerService`]: the single repeating script timer
//! * [`sensor::SensorService`]: simulated region entities, one-shot and repeating sweeps
//! * [`listener::ListenerTable`]: channel subscriptions
//! * [`http::HttpService`]: `llHTTPRequest` completions
//! * [`dataserver::DataserverService`]: notecard and agent-data completions
//!
//! Services with background tasks are registered in a [`ServiceRegistry`] and
//! stopped together when the engine shuts down.

pub mod dataserver;
pub mod http;
pub mod listener;
pub mod sensor;
pub mod timer;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service `{name}` did not stop within {timeout:?}")]
    StopTimeout { name: &'static str, timeout: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ServiceStatus {
    Idle,
    Active,
}

#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &'static str;

    fn status(&self) -> ServiceStatus;

    /// Cancels background work. Must be idempotent.
    async fn stop(&self);
}

#[derive(Default, Clone)]
pub struct ServiceRegistry {
    services: Vec<Arc<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: Arc<dyn Service>) {
        debug!("register service: {}", service.name());
        self.services.push(service);
    }

    pub fn statuses(&self) -> Vec<(&'static str, ServiceStatus)> {
        self.services
            .iter()
            .map(|s| (s.name(), s.status()))
            .collect()
    }

    /// Stops every service, each bounded by `limit`. Failures are logged and
    /// the remaining services are still stopped.
    pub async fn shutdown(&self, limit: Duration) -> Vec<ServiceError> {
        info!("Stopping {} service(s)", self.services.len());
        let mut errors = Vec::new();
        for service in &self.services {
            if timeout(limit, service.stop()).await.is_err() {
                let err = ServiceError::StopTimeout {
                    name: service.name(),
                    timeout: limit,
                };
                error!("{}", err);
                errors.push(err);
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Slow;

    #[async_trait]
    impl Service for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }
        fn status(&self) -> ServiceStatus {
            ServiceStatus::Active
        }
        async fn stop(&self) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    }

    #[derive(Default)]
    struct Flag(AtomicBool);

    #[async_trait]
    impl Service for Flag {
        fn name(&self) -> &'static str {
            "flag"
        }
        fn status(&self) -> ServiceStatus {
            if self.0.load(Ordering::SeqCst) {
                ServiceStatus::Idle
            } else {
                ServiceStatus::Active
            }
        }
        async fn stop(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_shutdown_continues_after_timeout() {
        let flag = Arc::new(Flag::default());
        let mut registry = ServiceRegistry::new();
        registry.register(Arc::new(Slow));
        registry.register(flag.clone());

        let errors = registry.shutdown(Duration::from_millis(20)).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(flag.status(), ServiceStatus::Idle);
    }
}
