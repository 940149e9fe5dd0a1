//! Platform capability interface used by the executor

use async_trait::async_trait;
use footprint_core::model::{ActionOutcome, CapabilityKind, Platform, RemediationAction, StateSnapshot};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Platform call errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlatformError {
    #[error("platform authentication failed: {0}")]
    Authentication(String),

    #[error("transient platform failure: {0}")]
    Transient(String),

    #[error("platform call timed out after {0}ms")]
    Timeout(u64),

    #[error("platform rejected the operation: {0}")]
    Rejected(String),

    #[error("capability {0} not supported")]
    Unsupported(CapabilityKind),
}

/// Mutating operations a platform exposes for remediation
#[async_trait]
pub trait PlatformCapability: Send + Sync {
    fn platform(&self) -> Platform;

    /// Capability kinds this platform can execute
    fn supported(&self) -> Vec<CapabilityKind>;

    fn supports(&self, kind: CapabilityKind) -> bool {
        self.supported().contains(&kind)
    }

    /// Read the state an action is about to change
    async fn snapshot(&self, action: &RemediationAction) -> Result<StateSnapshot, PlatformError>;

    /// Perform the mutation
    async fn apply(&self, action: &RemediationAction) -> Result<ActionOutcome, PlatformError>;

    /// Put back the state captured by `snapshot`
    async fn restore(
        &self,
        action: &RemediationAction,
        snapshot: &StateSnapshot,
    ) -> Result<ActionOutcome, PlatformError>;
}

/// Capability registry keyed by platform, populated at startup
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<Platform, Arc<dyn PlatformCapability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, capability: Arc<dyn PlatformCapability>) {
        self.capabilities.insert(capability.platform(), capability);
    }

    pub fn with_capability(mut self, capability: Arc<dyn PlatformCapability>) -> Self {
        self.register(capability);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformCapability>> {
        self.capabilities.get(&platform).cloned()
    }

    /// Capability for a platform only if it supports the given kind
    pub fn resolve(&self, platform: Platform, kind: CapabilityKind) -> Option<Arc<dyn PlatformCapability>> {
        self.get(platform).filter(|c| c.supports(kind))
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.capabilities.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
