//! # Audit Configuration
//!
//! Explicit immutable configuration threaded through reconciliation,
//! scoring, planning and the remediation executor

use crate::error::ConfigError;
use crate::model::{InferenceType, Platform, SensitivityCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Top-level audit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Inference orchestration settings
    pub inference: InferenceConfig,

    /// Risk scoring settings
    pub analysis: AnalysisConfig,

    /// Remediation planning and execution settings
    pub remediation: RemediationConfig,

    /// Timeout for a single connector fetch in milliseconds
    pub connector_timeout_ms: u64,
}

/// Inference orchestration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Maximum concurrent provider calls
    pub max_in_flight: usize,

    /// Timeout per provider call in milliseconds
    pub call_timeout_ms: u64,

    /// Retry configuration for transient failures
    pub retry: RetryConfig,

    /// Candidates below this confidence are dropped before merging
    pub min_confidence: f64,

    /// Maximum inferences kept per scan
    pub max_inferences: usize,

    /// Platforms each provider is scoped to. Providers without an entry see every platform.
    pub provider_platforms: BTreeMap<String, Vec<Platform>>,
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts including the first call
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

/// Risk scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sensitivity weights per category
    pub weights: WeightTable,

    /// Multiplier added per extra corroborating platform
    pub exposure_step: f64,

    /// Upper bound for the exposure multiplier
    pub max_exposure_multiplier: f64,

    /// Per-type risk above which a recommendation is produced
    pub recommendation_threshold: f64,

    pub risk_floor: f64,
    pub risk_ceiling: f64,
}

/// Upper bound for `remediation.default_delay_secs` (10 years)
pub const MAX_DELAY_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Remediation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// Maximum actions produced by one plan
    pub max_actions_per_plan: usize,

    /// Schedule planned actions as part of a scan
    pub auto_schedule: bool,

    /// Delay used for auto-scheduled actions in seconds
    pub default_delay_secs: u64,

    /// Dry-run flag used for auto-scheduled actions
    pub dry_run: bool,

    /// Timeout per platform capability call in milliseconds
    pub call_timeout_ms: u64,

    /// Seconds a settled action stays in the executor after its last change
    pub retention_secs: u64,
}

/// Category weight table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable(pub BTreeMap<SensitivityCategory, f64>);

impl WeightTable {
    pub fn with_weight(mut self, category: SensitivityCategory, weight: f64) -> Self {
        self.0.insert(category, weight);
        self
    }

    pub fn category_weight(&self, category: SensitivityCategory) -> f64 {
        self.0
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_weight())
    }

    /// Weight applied to an inference type through its category
    pub fn weight_for(&self, inference_type: InferenceType) -> f64 {
        self.category_weight(inference_type.category())
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self(
            SensitivityCategory::ALL
                .into_iter()
                .map(|c| (c, c.default_weight()))
                .collect(),
        )
    }
}

impl RetryConfig {
    /// Backoff to wait after the given failed attempt (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

impl InferenceConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Whether a provider is configured to see profiles from a platform
    pub fn provider_covers(&self, provider_id: &str, platform: Platform) -> bool {
        match self.provider_platforms.get(provider_id) {
            Some(platforms) => platforms.contains(&platform),
            None => true,
        }
    }
}

impl RemediationConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl AuditConfig {
    pub fn connector_timeout(&self) -> Duration {
        Duration::from_millis(self.connector_timeout_ms)
    }

    /// Check thresholds and limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        let inference = &self.inference;
        non_zero("inference.max_in_flight", inference.max_in_flight as u64)?;
        non_zero("inference.call_timeout_ms", inference.call_timeout_ms)?;
        non_zero("inference.retry.max_attempts", inference.retry.max_attempts as u64)?;
        non_zero("inference.max_inferences", inference.max_inferences as u64)?;
        in_range("inference.min_confidence", inference.min_confidence, 0.0, 1.0)?;
        in_range(
            "inference.retry.backoff_multiplier",
            inference.retry.backoff_multiplier,
            1.0,
            f64::MAX,
        )?;

        let analysis = &self.analysis;
        for weight in analysis.weights.0.values() {
            in_range("analysis.weights", *weight, 0.0, 10.0)?;
        }
        in_range("analysis.exposure_step", analysis.exposure_step, 0.0, 10.0)?;
        in_range(
            "analysis.max_exposure_multiplier",
            analysis.max_exposure_multiplier,
            1.0,
            10.0,
        )?;
        in_range(
            "analysis.recommendation_threshold",
            analysis.recommendation_threshold,
            0.0,
            10.0,
        )?;
        in_range("analysis.risk_floor", analysis.risk_floor, 0.0, 10.0)?;
        in_range("analysis.risk_ceiling", analysis.risk_ceiling, 0.0, 10.0)?;
        if analysis.risk_floor > analysis.risk_ceiling {
            return Err(ConfigError::InvertedClamp {
                floor: analysis.risk_floor,
                ceiling: analysis.risk_ceiling,
            });
        }

        non_zero(
            "remediation.max_actions_per_plan",
            self.remediation.max_actions_per_plan as u64,
        )?;
        at_most(
            "remediation.default_delay_secs",
            self.remediation.default_delay_secs,
            MAX_DELAY_SECS,
        )?;
        at_most(
            "remediation.retention_secs",
            self.remediation.retention_secs,
            MAX_DELAY_SECS,
        )?;
        non_zero("remediation.call_timeout_ms", self.remediation.call_timeout_ms)?;
        non_zero("connector_timeout_ms", self.connector_timeout_ms)?;
        Ok(())
    }
}

fn non_zero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero { field });
    }
    Ok(())
}

fn at_most(field: &'static str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value > max {
        return Err(ConfigError::TooLarge { field, value, max });
    }
    Ok(())
}

fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            inference: InferenceConfig::default(),
            analysis: AnalysisConfig::default(),
            remediation: RemediationConfig::default(),
            connector_timeout_ms: 30_000,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 10,
            call_timeout_ms: 30_000,
            retry: RetryConfig::default(),
            min_confidence: 0.3,
            max_inferences: 50,
            provider_platforms: BTreeMap::new(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            weights: WeightTable::default(),
            exposure_step: 0.1,
            max_exposure_multiplier: 1.5,
            recommendation_threshold: 3.0,
            risk_floor: 0.0,
            risk_ceiling: 10.0,
        }
    }
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            max_actions_per_plan: 5,
            auto_schedule: false,
            default_delay_secs: 3600,
            dry_run: true,
            call_timeout_ms: 30_000,
            retention_secs: 86_400,
        }
    }
}
