//! 推奨事項から是正アクションへの変換

use crate::capability::CapabilityRegistry;
use chrono::Utc;
use footprint_core::config::RemediationConfig;
use footprint_core::model::{
    ActionOrigin, ActionState, CapabilityKind, EventKind, ExecutionEvent, InferenceType,
    Recommendation, RemediationAction,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// One way of addressing an inference type, in order of preference
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityPlan {
    pub kind: CapabilityKind,
    pub parameters: BTreeMap<String, Value>,
}

fn plan_entry(kind: CapabilityKind, params: &[(&str, &str)]) -> CapabilityPlan {
    CapabilityPlan {
        kind,
        parameters: params
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect(),
    }
}

/// Capabilities able to address an inference type, most direct first
pub fn preferred_capabilities(inference_type: InferenceType) -> Vec<CapabilityPlan> {
    use CapabilityKind::*;
    use InferenceType::*;

    let topic = inference_type.as_str();
    match inference_type {
        Location | TravelPatterns => vec![
            plan_entry(RedactField, &[("field", "location")]),
            plan_entry(SetVisibility, &[("scope", "location"), ("visibility", "private")]),
        ],
        HealthSignals | PoliticalLeaning | FinancialStatus | PurchasingPower
        | RelationshipStatus | FamilyStructure | AgeRange => vec![
            plan_entry(ArchiveContent, &[("topic", topic)]),
            plan_entry(SetVisibility, &[("scope", "posts"), ("visibility", "private")]),
        ],
        WorkSchedule | Sentiment | PersonalityTraits | CommunicationStyle | RiskTolerance
        | LifestyleChoices => vec![
            plan_entry(ObscureActivity, &[("pattern", topic)]),
            plan_entry(SetVisibility, &[("scope", "activity"), ("visibility", "private")]),
        ],
        CareerStage => vec![
            plan_entry(RedactField, &[("field", "company")]),
            plan_entry(SetVisibility, &[("scope", "profile"), ("visibility", "connections")]),
        ],
        ProgrammingSkills | EducationLevel | SocialInfluence => vec![plan_entry(
            SetVisibility,
            &[("scope", "profile"), ("visibility", "connections")],
        )],
        Interests => vec![plan_entry(
            SetVisibility,
            &[("scope", "interests"), ("visibility", "private")],
        )],
    }
}

/// 是正アクションプランナー
#[derive(Debug, Clone, Default)]
pub struct RemediationPlanner {
    config: RemediationConfig,
}

impl RemediationPlanner {
    pub fn new(config: RemediationConfig) -> Self {
        Self { config }
    }

    /// Propose actions for recommendations, in recommendation order.
    ///
    /// A recommendation without a matching capability on any of its platforms yields nothing.
    pub fn plan(
        &self,
        subject_id: &str,
        recommendations: &[Recommendation],
        capabilities: &CapabilityRegistry,
    ) -> Vec<RemediationAction> {
        let mut actions = Vec::new();

        'recommendations: for recommendation in recommendations {
            let options = preferred_capabilities(recommendation.inference_type);
            let mut matched = false;

            for platform in &recommendation.platforms_affected {
                let Some(option) = options
                    .iter()
                    .find(|o| capabilities.resolve(*platform, o.kind).is_some())
                else {
                    continue;
                };

                if actions.len() >= self.config.max_actions_per_plan {
                    break 'recommendations;
                }
                matched = true;

                let now = Utc::now();
                actions.push(RemediationAction {
                    id: Uuid::new_v4(),
                    subject_id: subject_id.to_string(),
                    platform: *platform,
                    capability: option.kind,
                    parameters: option.parameters.clone(),
                    description: format!(
                        "{} on {} to address {}",
                        option.kind, platform, recommendation.inference_type
                    ),
                    origin: ActionOrigin {
                        inference_type: recommendation.inference_type,
                        recommendation_rank: recommendation.rank,
                        recommendation_title: recommendation.title.clone(),
                    },
                    state: ActionState::Proposed,
                    dry_run: false,
                    snapshot: None,
                    scheduled_for: None,
                    executed_at: None,
                    result: None,
                    error: None,
                    events: vec![ExecutionEvent {
                        at: now,
                        kind: EventKind::Proposed,
                        detail: None,
                    }],
                });
            }

            if !matched {
                debug!(
                    "No capability addresses {} on {:?}",
                    recommendation.inference_type, recommendation.platforms_affected
                );
            }
        }

        actions
    }
}
