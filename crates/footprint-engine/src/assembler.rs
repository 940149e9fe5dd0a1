//! Report assembly

use chrono::{DateTime, Utc};
use footprint_core::model::{
    AuditReport, Inference, Platform, ProfileData, Recommendation, RemediationAction, RiskScore,
    SourceFailure, REPORT_SCHEMA_VERSION,
};
use uuid::Uuid;

/// Everything a scan produced, borrowed for assembly
#[derive(Debug, Clone, Copy)]
pub struct ScanResults<'a> {
    pub subject_id: &'a str,
    pub platforms_analyzed: &'a [Platform],
    pub profiles: &'a [ProfileData],
    pub inferences: &'a [Inference],
    pub risk: &'a RiskScore,
    pub recommendations: &'a [Recommendation],
    pub actions: &'a [RemediationAction],
    pub failures: &'a [SourceFailure],
    /// Set when inference could not run at all
    pub inference_skipped: bool,
}

/// Snapshots scan results into an immutable [`AuditReport`]
#[derive(Debug, Clone, Default)]
pub struct AuditReportAssembler;

impl AuditReportAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(&self, results: ScanResults<'_>, generated_at: DateTime<Utc>) -> AuditReport {
        let degraded = results.inference_skipped
            || !results.failures.is_empty()
            || (results.profiles.is_empty() && !results.platforms_analyzed.is_empty());

        AuditReport {
            report_id: Uuid::new_v4(),
            subject_id: results.subject_id.to_string(),
            platforms_analyzed: results.platforms_analyzed.to_vec(),
            profiles: results.profiles.to_vec(),
            inferences: results.inferences.to_vec(),
            risk: results.risk.clone(),
            recommendations: results.recommendations.to_vec(),
            actions: results.actions.to_vec(),
            failures: results.failures.to_vec(),
            degraded,
            generated_at,
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
        }
    }
}
