//! Inference provider capability and registry

use async_trait::async_trait;
use footprint_core::model::{FailureKind, InferenceCandidate, ProfileData};
use std::sync::Arc;
use std::time::Duration;

/// Errors an inference provider may surface
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// Bad credentials or configuration; disables the provider for the scan
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        /// Provider supplied backoff hint
        retry_after: Option<Duration>,
    },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("invalid request or response: {0}")]
    Validation(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. } | ProviderError::Transient(_)
        )
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::Authentication(_) => FailureKind::Authentication,
            ProviderError::RateLimited { .. } => FailureKind::RateLimited,
            ProviderError::Transient(_) => FailureKind::Transient,
            ProviderError::Validation(_) => FailureKind::Validation,
        }
    }
}

/// Source of raw inference candidates for a profile
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider identifier, used for scoping and failure records
    fn id(&self) -> &str;

    /// Produce zero or more candidates from one profile
    async fn infer(&self, profile: &ProfileData) -> Result<Vec<InferenceCandidate>, ProviderError>;
}

/// Provider registry populated at startup
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register a provider. A provider with the same id replaces the earlier one.
    pub fn register(&mut self, provider: Arc<dyn ProviderAdapter>) {
        self.providers.retain(|p| p.id() != provider.id());
        self.providers.push(provider);
    }

    pub fn with_provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    pub fn providers(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.providers
    }

    pub fn ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }
}
