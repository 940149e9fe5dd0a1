//! プライバシーリスク分析
//!
//! 統合済み推論から重み付きリスクスコアと推奨事項を算出する。
//! ネットワーク呼び出しや副作用を持たない純粋な計算。

use crate::exposure::{exposure_points, risk_factors};
use crate::templates::template_for;
use footprint_core::config::AnalysisConfig;
use footprint_core::model::{
    Inference, InferenceType, Priority, ProfileData, Recommendation, RiskScore,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Score and recommendations produced together
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub risk: RiskScore,
    pub recommendations: Vec<Recommendation>,
}

/// Per-type contribution used for scoring and recommendations
#[derive(Debug, Clone)]
struct TypeRisk<'a> {
    inference: &'a Inference,
    risk: f64,
}

/// プライバシーリスク分析器
#[derive(Debug, Clone, Default)]
pub struct PrivacyAnalyzer {
    config: AnalysisConfig,
}

impl PrivacyAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// 推論集合からリスクスコアと推奨事項を算出
    pub fn score(&self, inferences: &[Inference], profiles: &[ProfileData]) -> Assessment {
        let by_type = self.type_risks(inferences);

        let per_type: BTreeMap<InferenceType, f64> =
            by_type.iter().map(|(t, r)| (*t, r.risk)).collect();
        let overall = self.overall(&per_type);

        let risk = RiskScore {
            per_type,
            overall,
            weights: self.config.weights.clone(),
            risk_factors: risk_factors(inferences, profiles),
            exposure_points: exposure_points(profiles),
        };
        let recommendations = self.recommend(&by_type, &risk);

        debug!(
            "Scored {} inference types, overall {:.2}, {} recommendations",
            risk.per_type.len(),
            risk.overall,
            recommendations.len()
        );

        Assessment {
            risk,
            recommendations,
        }
    }

    /// Exposure multiplier for an inference corroborated by `platforms` distinct platforms
    pub fn exposure_multiplier(&self, platforms: usize) -> f64 {
        let extra = platforms.saturating_sub(1) as f64;
        (1.0 + self.config.exposure_step * extra).min(self.config.max_exposure_multiplier)
    }

    /// Risk of a single inference in [0, 10]
    pub fn inference_risk(&self, inference: &Inference) -> f64 {
        let weight = self.config.weights.weight_for(inference.inference_type);
        let multiplier = self.exposure_multiplier(inference.corroboration());
        (inference.confidence * weight * multiplier).clamp(0.0, 10.0)
    }

    /// Weighted mean of per-type risks, clamped to the configured floor and ceiling
    pub fn overall(&self, per_type: &BTreeMap<InferenceType, f64>) -> f64 {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for (inference_type, risk) in per_type {
            let weight = self.config.weights.weight_for(*inference_type);
            weighted += weight * risk;
            total_weight += weight;
        }
        let mean = if total_weight > 0.0 {
            weighted / total_weight
        } else {
            0.0
        };
        mean.clamp(self.config.risk_floor, self.config.risk_ceiling)
    }

    fn type_risks<'a>(&self, inferences: &'a [Inference]) -> BTreeMap<InferenceType, TypeRisk<'a>> {
        let mut by_type: BTreeMap<InferenceType, TypeRisk<'a>> = BTreeMap::new();
        for inference in inferences {
            let risk = self.inference_risk(inference);
            let replace = match by_type.get(&inference.inference_type) {
                Some(current) => risk > current.risk,
                None => true,
            };
            if replace {
                by_type.insert(inference.inference_type, TypeRisk { inference, risk });
            }
        }
        by_type
    }

    fn recommend(
        &self,
        by_type: &BTreeMap<InferenceType, TypeRisk<'_>>,
        risk: &RiskScore,
    ) -> Vec<Recommendation> {
        let mut recommendations: Vec<Recommendation> = by_type
            .iter()
            .filter(|(_, r)| r.risk > self.config.recommendation_threshold)
            .map(|(inference_type, r)| {
                // 当該推論を抑制した場合 (信頼度 0、重みは維持) との差分
                let mut suppressed = risk.per_type.clone();
                suppressed.insert(*inference_type, 0.0);
                let reduction = (risk.overall - self.overall(&suppressed)).max(0.0);

                let template = template_for(*inference_type);
                Recommendation {
                    rank: 0,
                    inference_type: *inference_type,
                    title: template.title.to_string(),
                    text: template.text.to_string(),
                    priority: priority_for(r.risk),
                    action_items: template.action_items.iter().map(|s| s.to_string()).collect(),
                    platforms_affected: r.inference.source_platforms.clone(),
                    estimated_risk_reduction: reduction,
                    confidence: r.inference.confidence,
                }
            })
            .collect();

        recommendations.sort_by(|a, b| {
            b.estimated_risk_reduction
                .total_cmp(&a.estimated_risk_reduction)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| a.inference_type.cmp(&b.inference_type))
        });
        for (index, recommendation) in recommendations.iter_mut().enumerate() {
            recommendation.rank = index + 1;
        }
        recommendations
    }
}

fn priority_for(risk: f64) -> Priority {
    if risk >= 7.0 {
        Priority::High
    } else if risk >= 4.5 {
        Priority::Medium
    } else {
        Priority::Low
    }
}
