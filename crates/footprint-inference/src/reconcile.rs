//! 推論候補の統合
//!
//! 同一 (subject, inference type) の候補を一つの推論にまとめる純粋関数群

use chrono::{DateTime, Utc};
use footprint_core::model::{
    ConfidenceLevel, Inference, InferenceCandidate, InferenceType, Platform,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// 統合パラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergePolicy {
    /// これ未満の候補は統合前に破棄
    pub min_confidence: f64,
    /// 1スキャンあたりの推論数上限
    pub max_inferences: usize,
}

/// 候補集合を統合済み推論に変換
///
/// 結果は候補の到着順に依存しない。
pub fn merge_candidates(candidates: &[InferenceCandidate], policy: MergePolicy) -> Vec<Inference> {
    let mut groups: BTreeMap<(String, InferenceType), Vec<&InferenceCandidate>> = BTreeMap::new();

    for candidate in candidates {
        if candidate.validate().is_err() || candidate.confidence < policy.min_confidence {
            continue;
        }
        groups
            .entry((candidate.subject_id.clone(), candidate.inference_type))
            .or_default()
            .push(candidate);
    }

    let mut inferences: Vec<Inference> = groups
        .into_iter()
        .map(|((subject_id, inference_type), mut group)| {
            group.sort_by(|a, b| canonical_order(a, b));
            merge_group(subject_id, inference_type, &group)
        })
        .collect();

    if inferences.len() > policy.max_inferences {
        debug!(
            "Evicting {} inferences over the per-scan cap",
            inferences.len() - policy.max_inferences
        );
        // 信頼度が低く古いものから除外
        inferences.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b.observed_at.cmp(&a.observed_at))
                .then_with(|| a.subject_id.cmp(&b.subject_id))
                .then_with(|| a.inference_type.cmp(&b.inference_type))
        });
        inferences.truncate(policy.max_inferences);
    }

    inferences.sort_by(|a, b| {
        a.subject_id
            .cmp(&b.subject_id)
            .then_with(|| a.inference_type.cmp(&b.inference_type))
    });
    inferences
}

/// Noisy-OR combination of independent confidences, capped at 1.0
pub fn combine_confidences<I>(confidences: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let residual: f64 = confidences
        .into_iter()
        .map(|c| 1.0 - c.clamp(0.0, 1.0))
        .product();
    (1.0 - residual).clamp(0.0, 1.0)
}

fn canonical_order(a: &InferenceCandidate, b: &InferenceCandidate) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.source_platform.cmp(&b.source_platform))
        .then_with(|| a.provider_id.cmp(&b.provider_id))
        .then_with(|| a.value.cmp(&b.value))
        .then_with(|| a.reasoning.cmp(&b.reasoning))
        .then_with(|| a.observed_at.cmp(&b.observed_at))
}

fn merge_group(
    subject_id: String,
    inference_type: InferenceType,
    group: &[&InferenceCandidate],
) -> Inference {
    // 同一 (platform, provider) の重複は最大値のみ採用
    let mut seen_sources: BTreeSet<(Platform, &str)> = BTreeSet::new();
    let mut source_confidences = Vec::new();
    let mut source_platforms: Vec<Platform> = Vec::new();
    let mut providers: Vec<String> = Vec::new();
    let mut reasoning: Vec<String> = Vec::new();
    let mut observed_at: Option<DateTime<Utc>> = None;

    for candidate in group {
        if seen_sources.insert((candidate.source_platform, candidate.provider_id.as_str())) {
            source_confidences.push(candidate.confidence);
        }
        if !source_platforms.contains(&candidate.source_platform) {
            source_platforms.push(candidate.source_platform);
        }
        if !providers.contains(&candidate.provider_id) {
            providers.push(candidate.provider_id.clone());
        }
        if !candidate.reasoning.is_empty() && !reasoning.contains(&candidate.reasoning) {
            reasoning.push(candidate.reasoning.clone());
        }
        observed_at = Some(match observed_at {
            Some(current) if current >= candidate.observed_at => current,
            _ => candidate.observed_at,
        });
    }

    let confidence = combine_confidences(source_confidences);
    let top = group[0];

    Inference {
        subject_id,
        inference_type,
        value: top.value.clone(),
        confidence,
        confidence_level: ConfidenceLevel::from_confidence(confidence),
        source_platforms,
        reasoning,
        providers,
        candidate_count: group.len(),
        observed_at: observed_at.unwrap_or(top.observed_at),
    }
}
