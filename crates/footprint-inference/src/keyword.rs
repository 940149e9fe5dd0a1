//! Offline keyword-pattern provider

use crate::provider::{ProviderAdapter, ProviderError};
use async_trait::async_trait;
use footprint_core::model::{InferenceCandidate, InferenceType, ProfileData};
use regex::Regex;
use tracing::warn;

/// Provider id under which the keyword provider registers
pub const KEYWORD_PROVIDER_ID: &str = "keyword";

/// Keyword pattern mapped to an inference
#[derive(Debug, Clone)]
struct KeywordRule {
    inference_type: InferenceType,
    value: &'static str,
    pattern: Regex,
    confidence: f64,
}

/// Derives inference candidates from profile text and metadata
#[derive(Debug, Clone)]
pub struct KeywordProvider {
    rules: Vec<KeywordRule>,
}

const KEYWORD_PATTERNS: &[(InferenceType, &str, &str, f64)] = &[
    (
        InferenceType::HealthSignals,
        "health condition mentioned",
        r"(?i)\b(diagnos\w*|therapy|therapist|chronic|diabetes|anxiety|depression|medication|recovering)\b",
        0.6,
    ),
    (
        InferenceType::HealthSignals,
        "fitness focused",
        r"(?i)\b(marathon|crossfit|fitbit|apple health|gym|running|yoga)\b",
        0.45,
    ),
    (
        InferenceType::FinancialStatus,
        "cryptocurrency holder",
        r"(?i)\b(bitcoin|btc|ethereum|eth|crypto|hodl|nft)\b",
        0.55,
    ),
    (
        InferenceType::PurchasingPower,
        "high purchasing power",
        r"(?i)\b(investor|angel|founder|ceo|luxury|first class)\b",
        0.45,
    ),
    (
        InferenceType::PoliticalLeaning,
        "politically engaged",
        r"(?i)\b(vote|voting|election|campaign|activist|democrat\w*|republican\w*|progressive|conservative)\b",
        0.5,
    ),
    (
        InferenceType::WorkSchedule,
        "night-time activity",
        r"(?i)\b(night owl|late night|midnight|3am|2am)\b",
        0.5,
    ),
    (
        InferenceType::WorkSchedule,
        "remote worker",
        r"(?i)\b(remote|work from home|wfh|digital nomad)\b",
        0.45,
    ),
    (
        InferenceType::ProgrammingSkills,
        "software developer",
        r"(?i)\b(rust|python|javascript|typescript|golang|kotlin|developer|engineer|programmer)\b",
        0.6,
    ),
    (
        InferenceType::Interests,
        "technology",
        r"(?i)\b(open source|machine learning|ai|robotics|linux)\b",
        0.5,
    ),
    (
        InferenceType::Interests,
        "outdoor activities",
        r"(?i)\b(hiking|climbing|camping|skiing|cycling)\b",
        0.5,
    ),
    (
        InferenceType::RelationshipStatus,
        "in a relationship",
        r"(?i)\b(married|husband|wife|partner|engaged)\b",
        0.55,
    ),
    (
        InferenceType::FamilyStructure,
        "has children",
        r"(?i)\b(dad|mom|father|mother|parent)\s+(of|to)\b",
        0.6,
    ),
    (
        InferenceType::TravelPatterns,
        "frequent traveller",
        r"(?i)\b(travel\w*|wanderlust|airport|passport)\b",
        0.45,
    ),
    (
        InferenceType::EducationLevel,
        "university educated",
        r"(?i)\b(phd|msc|bsc|university|alumn\w*|graduate)\b",
        0.5,
    ),
];

impl KeywordProvider {
    pub fn new() -> Self {
        let mut rules = Vec::new();
        for (inference_type, value, pattern, confidence) in KEYWORD_PATTERNS {
            match Regex::new(pattern) {
                Ok(pattern) => rules.push(KeywordRule {
                    inference_type: *inference_type,
                    value: *value,
                    pattern,
                    confidence: *confidence,
                }),
                Err(e) => warn!("Skipping keyword pattern for {}: {}", inference_type, e),
            }
        }
        Self { rules }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    fn candidate(
        &self,
        profile: &ProfileData,
        inference_type: InferenceType,
        value: &str,
        confidence: f64,
        reasoning: String,
    ) -> InferenceCandidate {
        InferenceCandidate {
            subject_id: profile.subject_id.clone(),
            inference_type,
            value: value.to_string(),
            confidence,
            source_platform: profile.platform,
            provider_id: KEYWORD_PROVIDER_ID.to_string(),
            reasoning,
            observed_at: profile.collected_at,
        }
    }

    fn metadata_candidates(&self, profile: &ProfileData) -> Vec<InferenceCandidate> {
        let mut candidates = Vec::new();

        if let Some(location) = profile.metadata_str("location") {
            candidates.push(self.candidate(
                profile,
                InferenceType::Location,
                location,
                0.85,
                format!("{} profile lists location '{}'", profile.platform, location),
            ));
        }

        if let Some(company) = profile.metadata_str("company") {
            candidates.push(self.candidate(
                profile,
                InferenceType::CareerStage,
                &format!("employed at {}", company),
                0.7,
                format!("{} profile lists company '{}'", profile.platform, company),
            ));
        }

        if let Some(languages) = profile.metadata.get("languages").and_then(|v| v.as_array()) {
            let names: Vec<&str> = languages.iter().filter_map(|v| v.as_str()).collect();
            if !names.is_empty() {
                let confidence = (0.5 + 0.1 * names.len() as f64).min(0.9);
                candidates.push(self.candidate(
                    profile,
                    InferenceType::ProgrammingSkills,
                    &names.join(", "),
                    confidence,
                    format!("{} repositories use {}", profile.platform, names.join(", ")),
                ));
            }
        }

        if let Some(followers) = profile
            .metadata_u64("followers_count")
            .or_else(|| profile.metadata_u64("followers"))
        {
            if followers > 1000 {
                candidates.push(self.candidate(
                    profile,
                    InferenceType::SocialInfluence,
                    "high reach",
                    0.6,
                    format!("{} followers on {}", followers, profile.platform),
                ));
            }
        }

        candidates
    }
}

impl Default for KeywordProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for KeywordProvider {
    fn id(&self) -> &str {
        KEYWORD_PROVIDER_ID
    }

    async fn infer(&self, profile: &ProfileData) -> Result<Vec<InferenceCandidate>, ProviderError> {
        if profile.subject_id.trim().is_empty() {
            return Err(ProviderError::Validation(
                "profile has no subject id".to_string(),
            ));
        }

        let mut candidates = self.metadata_candidates(profile);

        for rule in &self.rules {
            if let Some(found) = rule.pattern.find(&profile.content) {
                candidates.push(self.candidate(
                    profile,
                    rule.inference_type,
                    rule.value,
                    rule.confidence,
                    format!("'{}' mentioned on {}", found.as_str(), profile.platform),
                ));
            }
        }

        Ok(candidates)
    }
}
