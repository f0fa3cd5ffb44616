//! Backend fallback — ordered chain with per-entry timeouts.
//!
//! When a remote backend fails (timeout, rate limit, error), the chain
//! tries the next entry. With the rule backend as the final link,
//! generation never fails the pipeline.

use async_trait::async_trait;
use deskclaw_core::backend::{Generated, GenerationBackend};
use deskclaw_core::error::BackendError;
use deskclaw_core::turn::Turn;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A backend that wraps an ordered list of backends and falls back on
/// failure.
pub struct ChainBackend {
    name: String,
    chain: Vec<ChainEntry>,
}

struct ChainEntry {
    backend: Arc<dyn GenerationBackend>,
    timeout: Duration,
}

impl ChainBackend {
    /// Create a new chain with no entries.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
        }
    }

    /// Add a backend to the chain with a custom timeout.
    pub fn add(mut self, backend: Arc<dyn GenerationBackend>, timeout: Duration) -> Self {
        self.chain.push(ChainEntry { backend, timeout });
        self
    }

    /// Add a backend with the default timeout (30s).
    pub fn add_default(self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.add(backend, Duration::from_secs(30))
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[async_trait]
impl GenerationBackend for ChainBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        message: &str,
        prior_turns: &[Turn],
    ) -> Result<Generated, BackendError> {
        let mut last_error = BackendError::NotConfigured("No backends in chain".into());

        for (i, entry) in self.chain.iter().enumerate() {
            let backend_name = entry.backend.name().to_string();

            info!(
                backend = %backend_name,
                attempt = i + 1,
                total = self.chain.len(),
                "Chain: trying backend"
            );

            match tokio::time::timeout(entry.timeout, entry.backend.generate(message, prior_turns))
                .await
            {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(e)) => {
                    warn!(
                        backend = %backend_name,
                        error = %e,
                        "Chain: backend failed, trying next"
                    );
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        backend = %backend_name,
                        timeout_secs = entry.timeout.as_secs(),
                        "Chain: backend timed out, trying next"
                    );
                    last_error = BackendError::Timeout(format!(
                        "Backend '{}' timed out after {}s",
                        backend_name,
                        entry.timeout.as_secs()
                    ));
                }
            }
        }

        Err(last_error)
    }

    async fn summarize(&self, turns: &[Turn]) -> Result<String, BackendError> {
        let mut last_error = BackendError::NotConfigured("No backends in chain".into());

        for entry in &self.chain {
            match tokio::time::timeout(entry.timeout, entry.backend.summarize(turns)).await {
                Ok(Ok(summary)) => return Ok(summary),
                Ok(Err(e)) => {
                    warn!(backend = entry.backend.name(), error = %e, "Chain: summarize failed");
                    last_error = e;
                }
                Err(_) => {
                    last_error = BackendError::Timeout(format!(
                        "Backend '{}' summarize timed out",
                        entry.backend.name()
                    ));
                }
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FailingBackend {
        error: BackendError,
        calls: Mutex<usize>,
    }

    impl FailingBackend {
        fn new(error: BackendError) -> Self {
            Self {
                error,
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl GenerationBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _: &str, _: &[Turn]) -> Result<Generated, BackendError> {
            *self.calls.lock().unwrap() += 1;
            Err(self.error.clone())
        }
    }

    struct SuccessBackend;

    #[async_trait]
    impl GenerationBackend for SuccessBackend {
        fn name(&self) -> &str {
            "success"
        }

        async fn generate(&self, _: &str, _: &[Turn]) -> Result<Generated, BackendError> {
            Ok(Generated {
                text: "ok".into(),
                confidence: 0.9,
                source: "success".into(),
            })
        }
    }

    struct HangingBackend;

    #[async_trait]
    impl GenerationBackend for HangingBackend {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn generate(&self, _: &str, _: &[Turn]) -> Result<Generated, BackendError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn first_backend_wins() {
        let chain = ChainBackend::new("test").add_default(Arc::new(SuccessBackend));
        let reply = chain.generate("hello", &[]).await.unwrap();
        assert_eq!(reply.text, "ok");
    }

    #[tokio::test]
    async fn falls_back_on_failure() {
        let failing = Arc::new(FailingBackend::new(BackendError::Network(
            "conn refused".into(),
        )));
        let chain = ChainBackend::new("test")
            .add_default(failing.clone())
            .add_default(Arc::new(SuccessBackend));

        let reply = chain.generate("hello", &[]).await.unwrap();
        assert_eq!(reply.text, "ok");
        assert_eq!(failing.call_count(), 1);
    }

    #[tokio::test]
    async fn timeout_triggers_fallback() {
        let chain = ChainBackend::new("test")
            .add(Arc::new(HangingBackend), Duration::from_millis(50))
            .add_default(Arc::new(SuccessBackend));

        let reply = chain.generate("hello", &[]).await.unwrap();
        assert_eq!(reply.text, "ok");
    }

    #[tokio::test]
    async fn all_backends_fail() {
        let chain = ChainBackend::new("test")
            .add_default(Arc::new(FailingBackend::new(BackendError::Network(
                "down".into(),
            ))))
            .add_default(Arc::new(FailingBackend::new(
                BackendError::AuthenticationFailed("bad key".into()),
            )));

        let result = chain.generate("hello", &[]).await;
        match result.unwrap_err() {
            BackendError::AuthenticationFailed(_) => {}
            other => panic!("Expected AuthenticationFailed, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_chain_is_not_configured() {
        let chain = ChainBackend::new("empty");
        assert!(chain.is_empty());
        let result = chain.generate("hello", &[]).await;
        match result.unwrap_err() {
            BackendError::NotConfigured(_) => {}
            other => panic!("Expected NotConfigured, got: {other:?}"),
        }
    }
}
