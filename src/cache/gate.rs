use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::backend::KvBackend;
use super::error::CacheError;

/// Decides whether the store may be used for the current operation.
///
/// Liveness is probed on every call and never remembered: the store can recover or fail
/// between two operations. A gate without a backend (cache disabled) is permanently closed.
#[derive(Clone)]
pub struct AvailabilityGate {
    backend: Option<Arc<dyn KvBackend>>,
    probe_timeout: Duration,
}

impl AvailabilityGate {
    pub fn new(backend: Arc<dyn KvBackend>, probe_timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            probe_timeout,
        }
    }

    pub fn disabled() -> Self {
        Self {
            backend: None,
            probe_timeout: Duration::ZERO,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Pings the store and hands out the backend when it answers.
    pub async fn acquire(&self) -> Result<Arc<dyn KvBackend>, CacheError> {
        let Some(backend) = self.backend.as_ref() else {
            return Err(CacheError::Unavailable);
        };

        match tokio::time::timeout(self.probe_timeout, backend.ping()).await {
            Ok(Ok(())) => Ok(Arc::clone(backend)),
            Ok(Err(err)) => {
                debug!(
                    target: "bistro::cache",
                    op = "ping",
                    error = %err,
                    "Cache store liveness probe failed"
                );
                Err(CacheError::Unavailable)
            }
            Err(_) => {
                debug!(
                    target: "bistro::cache",
                    op = "ping",
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "Cache store liveness probe timed out"
                );
                Err(CacheError::Unavailable)
            }
        }
    }

    pub async fn is_available(&self) -> bool {
        self.acquire().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryBackend;

    #[tokio::test]
    async fn disabled_gate_is_never_available() {
        let gate = AvailabilityGate::disabled();
        assert!(!gate.is_configured());
        assert!(!gate.is_available().await);
    }

    #[tokio::test]
    async fn gate_follows_backend_recovery() {
        let backend = Arc::new(MemoryBackend::new());
        let gate = AvailabilityGate::new(backend.clone(), Duration::from_secs(1));
        assert!(gate.is_available().await);

        backend.set_available(false);
        assert!(!gate.is_available().await);

        backend.set_available(true);
        assert!(gate.is_available().await);
    }
}
