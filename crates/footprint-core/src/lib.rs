//! # Footprint Core
//!
//! デジタルフットプリント監査のデータモデルと設定
//! プロファイル、推論候補、統合済み推論、リスクスコア、是正アクション、監査レポートを提供

pub mod config;
pub mod error;
pub mod model;

pub use config::*;
pub use error::*;
pub use model::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn candidate(confidence: f64, value: &str) -> InferenceCandidate {
        InferenceCandidate {
            subject_id: "alice".to_string(),
            inference_type: InferenceType::Location,
            value: value.to_string(),
            confidence,
            source_platform: Platform::Github,
            provider_id: "keyword".to_string(),
            reasoning: "bio mentions a city".to_string(),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_platform_round_trips_through_str() {
        for platform in Platform::ALL {
            assert_eq!(Platform::from_str(platform.as_str()).unwrap(), platform);
        }
        assert_eq!(Platform::from_str(" GitHub ").unwrap(), Platform::Github);
        assert!(Platform::from_str("myspace").is_err());
    }

    #[test]
    fn test_platform_serializes_snake_case() {
        let json = serde_json::to_string(&Platform::Linkedin).unwrap();
        assert_eq!(json, "\"linkedin\"");
    }

    #[test]
    fn test_inference_type_categories() {
        assert_eq!(
            InferenceType::HealthSignals.category(),
            SensitivityCategory::Health
        );
        assert_eq!(
            InferenceType::PoliticalLeaning.category(),
            SensitivityCategory::Political
        );
        assert_eq!(
            InferenceType::FinancialStatus.category(),
            SensitivityCategory::Financial
        );
        assert_eq!(
            InferenceType::TravelPatterns.category(),
            SensitivityCategory::Location
        );
        assert_eq!(
            InferenceType::Interests.category(),
            SensitivityCategory::Interests
        );
        assert_eq!(
            InferenceType::from_str("work_schedule").unwrap(),
            InferenceType::WorkSchedule
        );
    }

    #[test]
    fn test_sensitive_categories_outweigh_interests() {
        let weights = WeightTable::default();
        let health = weights.weight_for(InferenceType::HealthSignals);
        let political = weights.weight_for(InferenceType::PoliticalLeaning);
        let skills = weights.weight_for(InferenceType::ProgrammingSkills);
        let interests = weights.weight_for(InferenceType::Interests);
        assert!(health > skills && health > interests);
        assert!(political > skills && political > interests);
    }

    #[test]
    fn test_confidence_level_buckets() {
        assert_eq!(ConfidenceLevel::from_confidence(0.1), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_confidence(0.4), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_confidence(0.69), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_confidence(0.7), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_confidence(1.0), ConfidenceLevel::High);
    }

    #[test]
    fn test_candidate_validation() {
        assert!(candidate(0.5, "Seattle").validate().is_ok());
        assert_eq!(
            candidate(1.5, "Seattle").validate(),
            Err(ModelError::ConfidenceOutOfRange(1.5))
        );
        assert!(candidate(f64::NAN, "Seattle").validate().is_err());
        assert_eq!(
            candidate(0.5, "  ").validate(),
            Err(ModelError::EmptyValue(InferenceType::Location))
        );
    }

    #[test]
    fn test_profile_metadata_helpers() {
        let profile = ProfileData::new(Platform::Twitter, "alice", "hello")
            .with_metadata("location", serde_json::json!("Seattle, WA"))
            .with_metadata("followers", serde_json::json!(1200))
            .with_metadata("company", serde_json::json!(""));
        assert_eq!(profile.metadata_str("location"), Some("Seattle, WA"));
        assert_eq!(profile.metadata_str("company"), None);
        assert_eq!(profile.metadata_u64("followers"), Some(1200));
    }

    #[test]
    fn test_action_state_terminality() {
        assert!(ActionState::Completed.is_terminal());
        assert!(ActionState::Failed.is_terminal());
        assert!(ActionState::RolledBack.is_terminal());
        assert!(ActionState::Cancelled.is_terminal());
        assert!(!ActionState::Scheduled.is_terminal());
        assert!(!ActionState::RollingBack.is_terminal());
        assert!(ActionState::RolledBack.was_executed());
        assert!(!ActionState::Cancelled.was_executed());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AuditConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.inference.max_in_flight, 10);
        assert_eq!(config.inference.retry.max_attempts, 3);
        assert!(config.remediation.dry_run);
        assert!(!config.remediation.auto_schedule);
    }

    #[test]
    fn test_config_validation_rejects_bad_values() {
        let mut config = AuditConfig::default();
        config.inference.max_in_flight = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "inference.max_in_flight"
            })
        );

        let mut config = AuditConfig::default();
        config.inference.min_confidence = 1.2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));

        let mut config = AuditConfig::default();
        config.analysis.risk_floor = 6.0;
        config.analysis.risk_ceiling = 4.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedClamp { .. })
        ));
    }

    #[test]
    fn test_partial_yaml_config_uses_defaults() {
        let yaml = r#"
inference:
  max_in_flight: 4
  provider_platforms:
    keyword: [github, twitter]
analysis:
  weights:
    interests: 1.0
remediation:
  auto_schedule: true
"#;
        let config: AuditConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.inference.max_in_flight, 4);
        assert_eq!(config.inference.call_timeout_ms, 30_000);
        assert!(config.inference.provider_covers("keyword", Platform::Github));
        assert!(!config.inference.provider_covers("keyword", Platform::Reddit));
        assert!(config.inference.provider_covers("other", Platform::Reddit));
        assert_eq!(
            config.analysis.weights.weight_for(InferenceType::Interests),
            1.0
        );
        assert_eq!(
            config.analysis.weights.weight_for(InferenceType::HealthSignals),
            10.0
        );
        assert!(config.remediation.auto_schedule);
        assert!(config.remediation.dry_run);
    }

    #[test]
    fn test_retry_backoff_grows_and_caps() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff_for(1).as_millis(), 100);
        assert_eq!(retry.backoff_for(2).as_millis(), 200);
        assert_eq!(retry.backoff_for(3).as_millis(), 400);
        assert_eq!(retry.backoff_for(30).as_millis(), 10_000);
    }

    #[test]
    fn test_report_serialization_round_trip() {
        let report = AuditReport {
            report_id: uuid::Uuid::new_v4(),
            subject_id: "alice".to_string(),
            platforms_analyzed: vec![Platform::Github],
            profiles: vec![ProfileData::new(Platform::Github, "alice", "rustacean")],
            inferences: vec![],
            risk: RiskScore::empty(WeightTable::default()),
            recommendations: vec![],
            actions: vec![],
            failures: vec![SourceFailure {
                source: FailureSource::Provider {
                    provider_id: "remote".to_string(),
                    platform: Platform::Github,
                },
                kind: FailureKind::Authentication,
                message: "bad key".to_string(),
                attempts: 1,
            }],
            degraded: true,
            generated_at: Utc::now(),
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
        };

        let json = serde_json::to_string(&report).unwrap();
        let restored: AuditReport = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, report);
    }
}
