//! Audit data models: profiles, inference candidates, reconciled inferences,
//! risk scores, recommendations, remediation actions and reports

use crate::config::WeightTable;
use crate::error::{ModelError, ParseEnumError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Schema version stamped on every assembled report
pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Platforms a subject may have a public footprint on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Github,
    Twitter,
    Reddit,
    Linkedin,
    Facebook,
    Instagram,
    Tiktok,
}

impl Platform {
    pub const ALL: [Platform; 7] = [
        Platform::Github,
        Platform::Twitter,
        Platform::Reddit,
        Platform::Linkedin,
        Platform::Facebook,
        Platform::Instagram,
        Platform::Tiktok,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Github => "github",
            Platform::Twitter => "twitter",
            Platform::Reddit => "reddit",
            Platform::Linkedin => "linkedin",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == needle)
            .ok_or_else(|| ParseEnumError::new("platform", s))
    }
}

/// Sensitivity category an inference type belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityCategory {
    Health,
    Political,
    Financial,
    Location,
    Personal,
    Behavioral,
    Professional,
    Interests,
}

impl SensitivityCategory {
    pub const ALL: [SensitivityCategory; 8] = [
        SensitivityCategory::Health,
        SensitivityCategory::Political,
        SensitivityCategory::Financial,
        SensitivityCategory::Location,
        SensitivityCategory::Personal,
        SensitivityCategory::Behavioral,
        SensitivityCategory::Professional,
        SensitivityCategory::Interests,
    ];

    /// Weight used when the configured weight table has no entry
    pub fn default_weight(&self) -> f64 {
        match self {
            SensitivityCategory::Health => 10.0,
            SensitivityCategory::Political => 9.5,
            SensitivityCategory::Financial => 9.0,
            SensitivityCategory::Location => 8.5,
            SensitivityCategory::Personal => 7.0,
            SensitivityCategory::Behavioral => 5.0,
            SensitivityCategory::Professional => 3.5,
            SensitivityCategory::Interests => 3.0,
        }
    }
}

/// Kinds of inference a provider may produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceType {
    ProgrammingSkills,
    Location,
    AgeRange,
    Interests,
    Sentiment,
    PoliticalLeaning,
    WorkSchedule,
    EducationLevel,
    HealthSignals,
    PurchasingPower,
    RelationshipStatus,
    PersonalityTraits,
    CareerStage,
    CommunicationStyle,
    RiskTolerance,
    SocialInfluence,
    LifestyleChoices,
    FinancialStatus,
    TravelPatterns,
    FamilyStructure,
}

impl InferenceType {
    pub const ALL: [InferenceType; 20] = [
        InferenceType::ProgrammingSkills,
        InferenceType::Location,
        InferenceType::AgeRange,
        InferenceType::Interests,
        InferenceType::Sentiment,
        InferenceType::PoliticalLeaning,
        InferenceType::WorkSchedule,
        InferenceType::EducationLevel,
        InferenceType::HealthSignals,
        InferenceType::PurchasingPower,
        InferenceType::RelationshipStatus,
        InferenceType::PersonalityTraits,
        InferenceType::CareerStage,
        InferenceType::CommunicationStyle,
        InferenceType::RiskTolerance,
        InferenceType::SocialInfluence,
        InferenceType::LifestyleChoices,
        InferenceType::FinancialStatus,
        InferenceType::TravelPatterns,
        InferenceType::FamilyStructure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InferenceType::ProgrammingSkills => "programming_skills",
            InferenceType::Location => "location",
            InferenceType::AgeRange => "age_range",
            InferenceType::Interests => "interests",
            InferenceType::Sentiment => "sentiment",
            InferenceType::PoliticalLeaning => "political_leaning",
            InferenceType::WorkSchedule => "work_schedule",
            InferenceType::EducationLevel => "education_level",
            InferenceType::HealthSignals => "health_signals",
            InferenceType::PurchasingPower => "purchasing_power",
            InferenceType::RelationshipStatus => "relationship_status",
            InferenceType::PersonalityTraits => "personality_traits",
            InferenceType::CareerStage => "career_stage",
            InferenceType::CommunicationStyle => "communication_style",
            InferenceType::RiskTolerance => "risk_tolerance",
            InferenceType::SocialInfluence => "social_influence",
            InferenceType::LifestyleChoices => "lifestyle_choices",
            InferenceType::FinancialStatus => "financial_status",
            InferenceType::TravelPatterns => "travel_patterns",
            InferenceType::FamilyStructure => "family_structure",
        }
    }

    /// Sensitivity category used for weighting
    pub fn category(&self) -> SensitivityCategory {
        use InferenceType::*;
        match self {
            HealthSignals => SensitivityCategory::Health,
            PoliticalLeaning => SensitivityCategory::Political,
            PurchasingPower | FinancialStatus => SensitivityCategory::Financial,
            Location | TravelPatterns => SensitivityCategory::Location,
            AgeRange | RelationshipStatus | FamilyStructure => SensitivityCategory::Personal,
            Sentiment | WorkSchedule | PersonalityTraits | CommunicationStyle | RiskTolerance
            | LifestyleChoices => SensitivityCategory::Behavioral,
            ProgrammingSkills | EducationLevel | CareerStage | SocialInfluence => {
                SensitivityCategory::Professional
            }
            Interests => SensitivityCategory::Interests,
        }
    }
}

impl fmt::Display for InferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InferenceType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        InferenceType::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| ParseEnumError::new("inference type", s))
    }
}

/// Confidence bucket derived from a merged confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence < 0.4 {
            ConfidenceLevel::Low
        } else if confidence < 0.7 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::High
        }
    }
}

/// Raw profile data produced by a connector. Never mutated after collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileData {
    pub platform: Platform,
    pub subject_id: String,
    /// Free-text profile content (bio, posts, descriptions)
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub collected_at: DateTime<Utc>,
}

impl ProfileData {
    pub fn new(platform: Platform, subject_id: &str, content: &str) -> Self {
        Self {
            platform,
            subject_id: subject_id.to_string(),
            content: content.to_string(),
            metadata: BTreeMap::new(),
            collected_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Metadata value as a non-empty string
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(|v| v.as_u64())
    }
}

/// A single provider's proposal for one inference type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceCandidate {
    pub subject_id: String,
    pub inference_type: InferenceType,
    pub value: String,
    pub confidence: f64,
    pub source_platform: Platform,
    pub provider_id: String,
    pub reasoning: String,
    pub observed_at: DateTime<Utc>,
}

impl InferenceCandidate {
    /// Reject candidates that cannot take part in reconciliation
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(ModelError::ConfidenceOutOfRange(self.confidence));
        }
        if self.value.trim().is_empty() {
            return Err(ModelError::EmptyValue(self.inference_type));
        }
        if self.subject_id.trim().is_empty() {
            return Err(ModelError::MissingSubject);
        }
        Ok(())
    }
}

/// Reconciled result for one (subject, inference type) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inference {
    pub subject_id: String,
    pub inference_type: InferenceType,
    pub value: String,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    /// Distinct contributing platforms, strongest evidence first
    pub source_platforms: Vec<Platform>,
    /// Reasoning snippets of every contributing candidate, in merge order
    pub reasoning: Vec<String>,
    /// Distinct contributing provider ids
    pub providers: Vec<String>,
    pub candidate_count: usize,
    /// Latest timestamp among contributing candidates
    pub observed_at: DateTime<Utc>,
}

impl Inference {
    /// Number of distinct platforms corroborating this inference
    pub fn corroboration(&self) -> usize {
        self.source_platforms.len()
    }
}

/// Weighted privacy risk computed from a set of inferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub per_type: BTreeMap<InferenceType, f64>,
    pub overall: f64,
    pub weights: WeightTable,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub exposure_points: Vec<String>,
}

impl RiskScore {
    pub fn empty(weights: WeightTable) -> Self {
        Self {
            per_type: BTreeMap::new(),
            overall: 0.0,
            weights,
            risk_factors: Vec::new(),
            exposure_points: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Ranked privacy improvement derived from a risk score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// 1-based position after sorting
    pub rank: usize,
    pub inference_type: InferenceType,
    pub title: String,
    pub text: String,
    pub priority: Priority,
    pub action_items: Vec<String>,
    pub platforms_affected: Vec<Platform>,
    pub estimated_risk_reduction: f64,
    pub confidence: f64,
}

/// Operations a platform may expose for remediation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    RedactField,
    SetVisibility,
    ArchiveContent,
    ObscureActivity,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::RedactField => "redact_field",
            CapabilityKind::SetVisibility => "set_visibility",
            CapabilityKind::ArchiveContent => "archive_content",
            CapabilityKind::ObscureActivity => "obscure_activity",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation action lifecycle.
///
/// `Proposed -> Scheduled -> Executing -> Completed | Failed`,
/// `Completed -> RollingBack -> RolledBack | Completed`,
/// `Scheduled -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Proposed,
    Scheduled,
    Executing,
    Completed,
    Failed,
    RollingBack,
    RolledBack,
    Cancelled,
}

impl ActionState {
    /// Completed is terminal apart from the rollback edge
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionState::Completed
                | ActionState::Failed
                | ActionState::RolledBack
                | ActionState::Cancelled
        )
    }

    /// Whether the platform may have been mutated by this action
    pub fn was_executed(&self) -> bool {
        matches!(
            self,
            ActionState::Completed | ActionState::RollingBack | ActionState::RolledBack
        )
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionState::Proposed => "proposed",
            ActionState::Scheduled => "scheduled",
            ActionState::Executing => "executing",
            ActionState::Completed => "completed",
            ActionState::Failed => "failed",
            ActionState::RollingBack => "rolling_back",
            ActionState::RolledBack => "rolled_back",
            ActionState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Opaque platform state captured before an action mutates it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSnapshot(pub serde_json::Value);

/// Result reported by a platform capability call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub message: String,
    #[serde(default)]
    pub detail: serde_json::Value,
    /// True for dry-run results that never touched the platform
    #[serde(default)]
    pub synthetic: bool,
}

impl ActionOutcome {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: serde_json::Value::Null,
            synthetic: false,
        }
    }

    pub fn dry_run() -> Self {
        Self {
            message: "dry-run: no-op".to_string(),
            detail: serde_json::Value::Null,
            synthetic: true,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Proposed,
    Scheduled,
    Started,
    SnapshotCaptured,
    Completed,
    Failed,
    Cancelled,
    RollbackStarted,
    RollbackSucceeded,
    RollbackFailed,
}

/// Entry in an action's execution history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub at: DateTime<Utc>,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Recommendation an action was planned from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOrigin {
    pub inference_type: InferenceType,
    pub recommendation_rank: usize,
    pub recommendation_title: String,
}

/// Concrete remediation operation against one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub id: Uuid,
    pub subject_id: String,
    pub platform: Platform,
    pub capability: CapabilityKind,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub description: String,
    pub origin: ActionOrigin,
    pub state: ActionState,
    #[serde(default)]
    pub dry_run: bool,
    /// Captured before `apply`; required for rollback
    #[serde(default)]
    pub snapshot: Option<StateSnapshot>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<ActionOutcome>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub events: Vec<ExecutionEvent>,
}

impl RemediationAction {
    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }

    pub fn record(&mut self, kind: EventKind, at: DateTime<Utc>, detail: Option<String>) {
        self.events.push(ExecutionEvent { at, kind, detail });
    }

    /// True when a rollback was attempted and failed at least once
    pub fn rollback_failed(&self) -> bool {
        self.events.iter().any(|e| e.kind == EventKind::RollbackFailed)
    }
}

/// Which external source a failure came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FailureSource {
    Connector { platform: Platform },
    Provider { provider_id: String, platform: Platform },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Authentication,
    RateLimited,
    Transient,
    Timeout,
    Validation,
    Unavailable,
    /// Call never made because the provider was disabled earlier in the scan
    Skipped,
}

/// Annotation of a source that did not contribute to a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    #[serde(flatten)]
    pub source: FailureSource,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

/// Immutable snapshot of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub report_id: Uuid,
    pub subject_id: String,
    pub platforms_analyzed: Vec<Platform>,
    pub profiles: Vec<ProfileData>,
    pub inferences: Vec<Inference>,
    pub risk: RiskScore,
    pub recommendations: Vec<Recommendation>,
    pub actions: Vec<RemediationAction>,
    #[serde(default)]
    pub failures: Vec<SourceFailure>,
    #[serde(default)]
    pub degraded: bool,
    pub generated_at: DateTime<Utc>,
    pub schema_version: String,
}

impl AuditReport {
    pub fn high_confidence_inferences(&self) -> impl Iterator<Item = &Inference> {
        self.inferences
            .iter()
            .filter(|i| i.confidence_level == ConfidenceLevel::High)
    }
}
