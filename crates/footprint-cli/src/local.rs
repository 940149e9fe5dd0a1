//! Local profile directory: connector and file-backed platform capability
//!
//! Each platform lives in `DIR/<platform>.json`:
//!
//! ```json
//! { "content": "bio and posts", "metadata": { "location": "Seattle" } }
//! ```

use async_trait::async_trait;
use footprint_core::model::{
    ActionOutcome, CapabilityKind, Platform, ProfileData, RemediationAction, StateSnapshot,
};
use footprint_engine::{Connector, ConnectorError};
use footprint_remediation::{PlatformCapability, PlatformError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk profile document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalProfile {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

pub fn profile_path(dir: &Path, platform: Platform) -> PathBuf {
    dir.join(format!("{}.json", platform.as_str()))
}

/// Platforms with a profile file in `dir`
pub fn discover_platforms(dir: &Path) -> Vec<Platform> {
    Platform::ALL
        .iter()
        .copied()
        .filter(|p| profile_path(dir, *p).is_file())
        .collect()
}

/// Reads `DIR/<platform>.json`
pub struct LocalProfileConnector {
    dir: PathBuf,
    platform: Platform,
}

impl LocalProfileConnector {
    pub fn new(dir: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            dir: dir.into(),
            platform,
        }
    }
}

#[async_trait]
impl Connector for LocalProfileConnector {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch_profile(&self, subject_id: &str) -> Result<ProfileData, ConnectorError> {
        let path = profile_path(&self.dir, self.platform);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConnectorError::NotFound {
                    platform: self.platform,
                    subject_id: subject_id.to_string(),
                })
            }
            Err(e) => return Err(ConnectorError::Unavailable(format!("{}: {}", path.display(), e))),
        };
        let local: LocalProfile = serde_json::from_str(&raw)
            .map_err(|e| ConnectorError::Unavailable(format!("{}: {}", path.display(), e)))?;

        debug!("Loaded {} profile from {}", self.platform, path.display());
        let mut profile = ProfileData::new(self.platform, subject_id, &local.content);
        profile.metadata = local.metadata;
        Ok(profile)
    }
}

/// Edits the local profile file: redacts metadata fields and records visibility settings
pub struct LocalProfileCapability {
    dir: PathBuf,
    platform: Platform,
}

impl LocalProfileCapability {
    pub fn new(dir: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            dir: dir.into(),
            platform,
        }
    }

    fn path(&self) -> PathBuf {
        profile_path(&self.dir, self.platform)
    }

    async fn read_document(&self) -> Result<Value, PlatformError> {
        let raw = tokio::fs::read_to_string(self.path())
            .await
            .map_err(|e| PlatformError::Transient(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| PlatformError::Rejected(e.to_string()))
    }

    async fn write_document(&self, document: &Value) -> Result<(), PlatformError> {
        let raw = serde_json::to_string_pretty(document)
            .map_err(|e| PlatformError::Rejected(e.to_string()))?;
        tokio::fs::write(self.path(), raw)
            .await
            .map_err(|e| PlatformError::Transient(e.to_string()))
    }
}

fn metadata_mut(document: &mut Value) -> Result<&mut Map<String, Value>, PlatformError> {
    let root = document
        .as_object_mut()
        .ok_or_else(|| PlatformError::Rejected("profile is not a JSON object".to_string()))?;
    root.entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| PlatformError::Rejected("metadata is not a JSON object".to_string()))
}

fn required<'a>(action: &'a RemediationAction, key: &str) -> Result<&'a str, PlatformError> {
    action
        .parameter_str(key)
        .ok_or_else(|| PlatformError::Rejected(format!("missing parameter {}", key)))
}

#[async_trait]
impl PlatformCapability for LocalProfileCapability {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn supported(&self) -> Vec<CapabilityKind> {
        vec![CapabilityKind::RedactField, CapabilityKind::SetVisibility]
    }

    async fn snapshot(&self, _action: &RemediationAction) -> Result<StateSnapshot, PlatformError> {
        Ok(StateSnapshot(self.read_document().await?))
    }

    async fn apply(&self, action: &RemediationAction) -> Result<ActionOutcome, PlatformError> {
        let mut document = self.read_document().await?;
        let metadata = metadata_mut(&mut document)?;

        let outcome = match action.capability {
            CapabilityKind::RedactField => {
                let field = required(action, "field")?;
                let removed = metadata.remove(field);
                ActionOutcome::new(format!("redacted {}", field))
                    .with_detail(json!({ "field": field, "was_present": removed.is_some() }))
            }
            CapabilityKind::SetVisibility => {
                let scope = required(action, "scope")?;
                let visibility = required(action, "visibility")?;
                let settings = metadata
                    .entry("visibility")
                    .or_insert_with(|| Value::Object(Map::new()));
                let settings = settings.as_object_mut().ok_or_else(|| {
                    PlatformError::Rejected("metadata.visibility is not a JSON object".to_string())
                })?;
                settings.insert(scope.to_string(), Value::String(visibility.to_string()));
                ActionOutcome::new(format!("{} visibility set to {}", scope, visibility))
                    .with_detail(json!({ "scope": scope, "visibility": visibility }))
            }
            other => return Err(PlatformError::Unsupported(other)),
        };

        self.write_document(&document).await?;
        info!("{} on {}: {}", action.capability, self.platform, outcome.message);
        Ok(outcome)
    }

    async fn restore(
        &self,
        _action: &RemediationAction,
        snapshot: &StateSnapshot,
    ) -> Result<ActionOutcome, PlatformError> {
        self.write_document(&snapshot.0).await?;
        Ok(ActionOutcome::new(format!(
            "restored {}",
            self.path().display()
        )))
    }
}
