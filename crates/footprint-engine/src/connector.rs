//! Profile connector capability

use async_trait::async_trait;
use footprint_core::model::{Platform, ProfileData};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Connector errors. The engine treats every variant as "platform unavailable".
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectorError {
    #[error("no {platform} profile for subject {subject_id}")]
    NotFound {
        platform: Platform,
        subject_id: String,
    },

    #[error("connector authentication failed: {0}")]
    Authentication(String),

    #[error("connector unavailable: {0}")]
    Unavailable(String),
}

/// Fetches raw profile data for one platform
#[async_trait]
pub trait Connector: Send + Sync {
    fn platform(&self) -> Platform;

    async fn fetch_profile(&self, subject_id: &str) -> Result<ProfileData, ConnectorError>;
}

/// Connectors keyed by platform, populated at startup
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: BTreeMap<Platform, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector, replacing any previous one for the same platform
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors.insert(connector.platform(), connector);
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.register(connector);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn Connector>> {
        self.connectors.get(&platform).cloned()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.connectors.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}
