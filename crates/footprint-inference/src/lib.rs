//! # Footprint Inference
//!
//! 推論プロバイダへの並行ファンアウトと候補統合
//! - 同時実行数の上限付きディスパッチ
//! - タイムアウトと指数バックオフによる再試行
//! - 到着順に依存しない決定的な統合

pub mod keyword;
pub mod orchestrator;
pub mod provider;
pub mod reconcile;

pub use keyword::*;
pub use orchestrator::*;
pub use provider::*;
pub use reconcile::*;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use footprint_core::config::{InferenceConfig, RetryConfig};
    use footprint_core::model::*;
    use proptest::prelude::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn candidate(
        platform: Platform,
        provider: &str,
        inference_type: InferenceType,
        value: &str,
        confidence: f64,
    ) -> InferenceCandidate {
        InferenceCandidate {
            subject_id: "alice".to_string(),
            inference_type,
            value: value.to_string(),
            confidence,
            source_platform: platform,
            provider_id: provider.to_string(),
            reasoning: format!("{} says {}", platform, value),
            observed_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn policy() -> MergePolicy {
        MergePolicy {
            min_confidence: 0.3,
            max_inferences: 50,
        }
    }

    fn fast_config() -> InferenceConfig {
        InferenceConfig {
            max_in_flight: 4,
            call_timeout_ms: 200,
            retry: RetryConfig {
                max_attempts: 3,
                initial_backoff_ms: 1,
                max_backoff_ms: 5,
                backoff_multiplier: 2.0,
            },
            ..InferenceConfig::default()
        }
    }

    fn profile(platform: Platform) -> ProfileData {
        ProfileData::new(platform, "alice", "profile text")
    }

    /// Mock provider replaying scripted responses, then a fixed fallback
    struct MockProvider {
        id: String,
        script: Mutex<VecDeque<Result<Vec<InferenceCandidate>, ProviderError>>>,
        fallback: Result<Vec<InferenceCandidate>, ProviderError>,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl MockProvider {
        fn new(id: &str, fallback: Result<Vec<InferenceCandidate>, ProviderError>) -> Self {
            Self {
                id: id.to_string(),
                script: Mutex::new(VecDeque::new()),
                fallback,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }
        }

        fn with_script(self, script: Vec<Result<Vec<InferenceCandidate>, ProviderError>>) -> Self {
            *self.script.lock().unwrap() = script.into();
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderAdapter for MockProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn infer(&self, profile: &ProfileData) -> Result<Vec<InferenceCandidate>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let scripted = self.script.lock().unwrap().pop_front();
            let result = scripted.unwrap_or_else(|| self.fallback.clone());
            result.map(|found| {
                found
                    .into_iter()
                    .map(|mut c| {
                        c.source_platform = profile.platform;
                        c.provider_id = self.id.clone();
                        c
                    })
                    .collect()
            })
        }
    }

    fn location_hit(confidence: f64) -> Vec<InferenceCandidate> {
        vec![candidate(
            Platform::Github,
            "mock",
            InferenceType::Location,
            "Seattle",
            confidence,
        )]
    }

    #[test]
    fn test_two_platforms_merge_super_linearly() {
        let candidates = vec![
            candidate(Platform::Github, "p", InferenceType::Location, "Seattle", 0.6),
            candidate(Platform::Twitter, "p", InferenceType::Location, "Seattle", 0.5),
        ];

        let merged = merge_candidates(&candidates, policy());
        assert_eq!(merged.len(), 1);
        let inference = &merged[0];
        assert!((inference.confidence - 0.8).abs() < 1e-9);
        assert_eq!(inference.value, "Seattle");
        assert_eq!(
            inference.source_platforms,
            vec![Platform::Github, Platform::Twitter]
        );
        assert_eq!(inference.confidence_level, ConfidenceLevel::High);
        assert_eq!(inference.candidate_count, 2);
        assert_eq!(inference.reasoning.len(), 2);
    }

    #[test]
    fn test_value_comes_from_strongest_candidate() {
        let candidates = vec![
            candidate(Platform::Reddit, "p", InferenceType::Location, "Portland", 0.4),
            candidate(Platform::Github, "p", InferenceType::Location, "Seattle", 0.9),
        ];
        let merged = merge_candidates(&candidates, policy());
        assert_eq!(merged[0].value, "Seattle");
        assert_eq!(merged[0].source_platforms[0], Platform::Github);
    }

    #[test]
    fn test_same_source_duplicates_do_not_compound() {
        let candidates = vec![
            candidate(Platform::Github, "p", InferenceType::Interests, "rust", 0.5),
            candidate(Platform::Github, "p", InferenceType::Interests, "rust", 0.5),
        ];
        let merged = merge_candidates(&candidates, policy());
        assert!((merged[0].confidence - 0.5).abs() < 1e-9);
        assert_eq!(merged[0].candidate_count, 2);
    }

    #[test]
    fn test_candidates_below_threshold_are_dropped() {
        let candidates = vec![
            candidate(Platform::Github, "p", InferenceType::HealthSignals, "chronic", 0.2),
            candidate(Platform::Github, "p", InferenceType::Location, "Seattle", 0.6),
            candidate(Platform::Twitter, "p", InferenceType::Location, "Seattle", 0.1),
        ];
        let merged = merge_candidates(&candidates, policy());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].inference_type, InferenceType::Location);
        assert!((merged[0].confidence - 0.6).abs() < 1e-9);
        assert_eq!(merged[0].source_platforms, vec![Platform::Github]);
    }

    #[test]
    fn test_cap_evicts_lowest_confidence_then_oldest() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut old = candidate(Platform::Github, "p", InferenceType::Interests, "x", 0.5);
        old.observed_at = base;
        let mut newer = candidate(Platform::Github, "p", InferenceType::Sentiment, "y", 0.5);
        newer.observed_at = base + ChronoDuration::days(1);
        let strong = candidate(Platform::Github, "p", InferenceType::AgeRange, "30s", 0.9);

        let merged = merge_candidates(
            &[old, newer, strong],
            MergePolicy {
                min_confidence: 0.3,
                max_inferences: 2,
            },
        );
        let types: Vec<_> = merged.iter().map(|i| i.inference_type).collect();
        assert_eq!(types, vec![InferenceType::AgeRange, InferenceType::Sentiment]);
    }

    #[test]
    fn test_combine_confidences_caps_at_one() {
        assert_eq!(combine_confidences([1.0, 0.9]), 1.0);
        assert_eq!(combine_confidences(Vec::<f64>::new()), 0.0);
        assert!((combine_confidences([0.5, 0.5]) - 0.75).abs() < 1e-9);
    }

    fn arb_candidate() -> impl Strategy<Value = InferenceCandidate> {
        (
            0usize..Platform::ALL.len(),
            0usize..3,
            0usize..4,
            0usize..3,
            0.0f64..=1.0,
        )
            .prop_map(|(p, provider, t, v, confidence)| {
                let types = [
                    InferenceType::Location,
                    InferenceType::HealthSignals,
                    InferenceType::Interests,
                    InferenceType::PoliticalLeaning,
                ];
                candidate(
                    Platform::ALL[p],
                    ["a", "b", "c"][provider],
                    types[t],
                    ["x", "y", "z"][v],
                    confidence,
                )
            })
    }

    proptest! {
        #[test]
        fn prop_merge_is_order_independent(
            candidates in prop::collection::vec(arb_candidate(), 0..24),
            seed in any::<u64>(),
        ) {
            let mut shuffled = candidates.clone();
            // Fisher-Yates with a small LCG so the permutation depends on the seed
            let mut state = seed;
            for i in (1..shuffled.len()).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let j = (state >> 33) as usize % (i + 1);
                shuffled.swap(i, j);
            }
            let small = MergePolicy { min_confidence: 0.3, max_inferences: 2 };
            prop_assert_eq!(merge_candidates(&candidates, policy()), merge_candidates(&shuffled, policy()));
            prop_assert_eq!(merge_candidates(&candidates, small), merge_candidates(&shuffled, small));
        }

        #[test]
        fn prop_corroboration_never_lowers_confidence(
            candidates in prop::collection::vec(arb_candidate(), 1..12),
            extra_confidence in 0.0f64..=1.0,
        ) {
            let before = merge_candidates(&candidates, policy());
            let mut extended = candidates.clone();
            let mut extra = candidates[0].clone();
            extra.provider_id = "corroborator".to_string();
            extra.confidence = extra_confidence;
            let target = (extra.subject_id.clone(), extra.inference_type);
            extended.push(extra);
            let after = merge_candidates(&extended, policy());

            let find = |set: &[Inference]| set
                .iter()
                .find(|i| (i.subject_id.clone(), i.inference_type) == target)
                .map(|i| i.confidence)
                .unwrap_or(0.0);
            prop_assert!(find(&after) + 1e-12 >= find(&before));
        }

        #[test]
        fn prop_below_threshold_never_contributes(
            candidates in prop::collection::vec(arb_candidate(), 0..24),
            threshold in 0.05f64..0.95,
        ) {
            let custom = MergePolicy { min_confidence: threshold, max_inferences: 50 };
            let merged = merge_candidates(&candidates, custom);
            let kept: Vec<_> = candidates.iter().filter(|c| c.confidence >= threshold).cloned().collect();
            prop_assert_eq!(&merged, &merge_candidates(&kept, custom));
            for inference in &merged {
                prop_assert!(inference.confidence + 1e-12 >= threshold);
                prop_assert!(!inference.source_platforms.is_empty());
                prop_assert!(inference.candidate_count >= 1);
            }
        }
    }

    #[tokio::test]
    async fn test_orchestrator_merges_across_platforms() {
        let provider = Arc::new(MockProvider::new("mock", Ok(location_hit(0.6))));
        let registry = ProviderRegistry::new().with_provider(provider.clone());
        let orchestrator = InferenceOrchestrator::new(fast_config());

        let outcome = orchestrator
            .reconcile(&[profile(Platform::Github), profile(Platform::Twitter)], &registry)
            .await
            .unwrap();

        assert_eq!(outcome.calls, 2);
        assert_eq!(provider.calls(), 2);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.inferences.len(), 1);
        assert!((outcome.inferences[0].confidence - 0.84).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let provider = Arc::new(
            MockProvider::new("flaky", Ok(location_hit(0.7))).with_script(vec![
                Err(ProviderError::Transient("connection reset".to_string())),
                Err(ProviderError::RateLimited {
                    message: "slow down".to_string(),
                    retry_after: Some(Duration::from_millis(1)),
                }),
            ]),
        );
        let registry = ProviderRegistry::new().with_provider(provider.clone());
        let outcome = InferenceOrchestrator::new(fast_config())
            .reconcile(&[profile(Platform::Github)], &registry)
            .await
            .unwrap();

        assert_eq!(provider.calls(), 3);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.inferences.len(), 1);
    }

    #[tokio::test]
    async fn test_retries_give_up_after_max_attempts() {
        let provider = Arc::new(MockProvider::new(
            "down",
            Err(ProviderError::Transient("503".to_string())),
        ));
        let healthy = Arc::new(MockProvider::new("healthy", Ok(location_hit(0.6))));
        let registry = ProviderRegistry::new()
            .with_provider(provider.clone())
            .with_provider(healthy);

        let outcome = InferenceOrchestrator::new(fast_config())
            .reconcile(&[profile(Platform::Github)], &registry)
            .await
            .unwrap();

        assert_eq!(provider.calls(), 3);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].kind, FailureKind::Transient);
        assert_eq!(outcome.failures[0].attempts, 3);
        assert_eq!(outcome.inferences.len(), 1);
    }

    #[tokio::test]
    async fn test_timeouts_surface_as_failures() {
        let provider = Arc::new(
            MockProvider::new("slow", Ok(location_hit(0.6))).with_delay(Duration::from_millis(500)),
        );
        let registry = ProviderRegistry::new().with_provider(provider.clone());
        let mut config = fast_config();
        config.call_timeout_ms = 20;
        config.retry.max_attempts = 2;

        let outcome = InferenceOrchestrator::new(config)
            .reconcile(&[profile(Platform::Github)], &registry)
            .await
            .unwrap();

        assert!(outcome.inferences.is_empty());
        assert_eq!(outcome.failures[0].kind, FailureKind::Timeout);
        assert_eq!(outcome.failures[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_authentication_failure_disables_only_that_provider() {
        let broken = Arc::new(MockProvider::new(
            "broken",
            Err(ProviderError::Authentication("invalid api key".to_string())),
        ));
        let healthy = Arc::new(MockProvider::new("healthy", Ok(location_hit(0.6))));
        let registry = ProviderRegistry::new()
            .with_provider(broken.clone())
            .with_provider(healthy.clone());
        let mut config = fast_config();
        config.max_in_flight = 1;

        let outcome = InferenceOrchestrator::new(config)
            .reconcile(
                &[profile(Platform::Github), profile(Platform::Reddit)],
                &registry,
            )
            .await
            .unwrap();

        // 認証エラーは再試行しない
        assert_eq!(broken.calls(), 2);
        assert_eq!(healthy.calls(), 2);
        let kinds: Vec<_> = outcome.failures.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FailureKind::Authentication, FailureKind::Authentication]);
        assert_eq!(outcome.inferences.len(), 1);
    }

    /// Provider whose answer and latency depend on the profile's platform
    struct PerPlatformProvider {
        responses: HashMap<Platform, (Duration, Result<Vec<InferenceCandidate>, ProviderError>)>,
    }

    #[async_trait]
    impl ProviderAdapter for PerPlatformProvider {
        fn id(&self) -> &str {
            "flaky"
        }

        async fn infer(&self, profile: &ProfileData) -> Result<Vec<InferenceCandidate>, ProviderError> {
            let Some((delay, response)) = self.responses.get(&profile.platform) else {
                return Ok(vec![]);
            };
            tokio::time::sleep(*delay).await;
            response.clone().map(|found| {
                found
                    .into_iter()
                    .map(|mut c| {
                        c.source_platform = profile.platform;
                        c.provider_id = "flaky".to_string();
                        c
                    })
                    .collect()
            })
        }
    }

    #[tokio::test]
    async fn test_authentication_outcome_ignores_completion_order() {
        let interests = vec![candidate(
            Platform::Twitter,
            "flaky",
            InferenceType::Interests,
            "cycling",
            0.9,
        )];
        let run = |github_delay: u64, twitter_delay: u64| {
            let interests = interests.clone();
            async move {
                let flaky = Arc::new(PerPlatformProvider {
                    responses: HashMap::from([
                        (
                            Platform::Github,
                            (
                                Duration::from_millis(github_delay),
                                Err(ProviderError::Authentication("token revoked".to_string())),
                            ),
                        ),
                        (
                            Platform::Twitter,
                            (Duration::from_millis(twitter_delay), Ok(interests)),
                        ),
                    ]),
                });
                let healthy = Arc::new(MockProvider::new("healthy", Ok(location_hit(0.6))));
                let registry = ProviderRegistry::new()
                    .with_provider(flaky)
                    .with_provider(healthy);
                InferenceOrchestrator::new(fast_config())
                    .reconcile(
                        &[profile(Platform::Github), profile(Platform::Twitter)],
                        &registry,
                    )
                    .await
                    .unwrap()
            }
        };

        let auth_first = run(0, 40).await;
        let success_first = run(40, 0).await;

        assert_eq!(auth_first.inferences, success_first.inferences);
        assert_eq!(auth_first.failures, success_first.failures);

        assert!(auth_first
            .inferences
            .iter()
            .all(|i| i.inference_type == InferenceType::Location));
        let failures: Vec<_> = auth_first
            .failures
            .iter()
            .map(|f| (f.source.clone(), f.kind, f.attempts))
            .collect();
        assert_eq!(
            failures,
            vec![
                (
                    FailureSource::Provider {
                        provider_id: "flaky".to_string(),
                        platform: Platform::Github,
                    },
                    FailureKind::Authentication,
                    1
                ),
                (
                    FailureSource::Provider {
                        provider_id: "flaky".to_string(),
                        platform: Platform::Twitter,
                    },
                    FailureKind::Skipped,
                    1
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_validation_errors_are_not_retried() {
        let provider = Arc::new(MockProvider::new(
            "strict",
            Err(ProviderError::Validation("profile too short".to_string())),
        ));
        let registry = ProviderRegistry::new().with_provider(provider.clone());
        let outcome = InferenceOrchestrator::new(fast_config())
            .reconcile(&[profile(Platform::Github)], &registry)
            .await
            .unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(outcome.failures[0].kind, FailureKind::Validation);
        assert_eq!(outcome.failures[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_malformed_candidates_are_dropped() {
        let mut bad = location_hit(0.6);
        bad.push(candidate(
            Platform::Github,
            "mock",
            InferenceType::HealthSignals,
            "x",
            1.7,
        ));
        let provider = Arc::new(MockProvider::new("mock", Ok(bad)));
        let registry = ProviderRegistry::new().with_provider(provider);
        let outcome = InferenceOrchestrator::new(fast_config())
            .reconcile(&[profile(Platform::Github)], &registry)
            .await
            .unwrap();

        assert_eq!(outcome.rejected_candidates, 1);
        assert_eq!(outcome.inferences.len(), 1);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let provider = Arc::new(
            MockProvider::new("mock", Ok(vec![])).with_delay(Duration::from_millis(20)),
        );
        let registry = ProviderRegistry::new().with_provider(provider.clone());
        let mut config = fast_config();
        config.max_in_flight = 2;
        let profiles: Vec<_> = Platform::ALL.iter().map(|p| profile(*p)).collect();

        InferenceOrchestrator::new(config)
            .reconcile(&profiles, &registry)
            .await
            .unwrap();

        assert_eq!(provider.calls(), Platform::ALL.len());
        assert!(provider.peak_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_provider_platform_scoping() {
        let provider = Arc::new(MockProvider::new("scoped", Ok(vec![])));
        let registry = ProviderRegistry::new().with_provider(provider.clone());
        let mut config = fast_config();
        config
            .provider_platforms
            .insert("scoped".to_string(), vec![Platform::Reddit]);

        let outcome = InferenceOrchestrator::new(config)
            .reconcile(
                &[profile(Platform::Github), profile(Platform::Reddit)],
                &registry,
            )
            .await
            .unwrap();

        assert_eq!(outcome.calls, 1);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_registry_is_rejected() {
        let result = InferenceOrchestrator::new(fast_config())
            .reconcile(&[profile(Platform::Github)], &ProviderRegistry::new())
            .await;
        assert!(matches!(result, Err(OrchestratorError::NoProviders)));
    }

    #[test]
    fn test_registry_replaces_same_id() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockProvider::new("a", Ok(vec![]))));
        registry.register(Arc::new(MockProvider::new("a", Ok(vec![]))));
        registry.register(Arc::new(KeywordProvider::new()));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec!["a".to_string(), "keyword".to_string()]);
        assert!(registry.get(KEYWORD_PROVIDER_ID).is_some());
    }

    #[tokio::test]
    async fn test_keyword_provider_reads_text_and_metadata() {
        let provider = KeywordProvider::new();
        assert!(provider.rule_count() > 10);

        let profile = ProfileData::new(
            Platform::Twitter,
            "alice",
            "Rust developer, night owl, marathon runner. Dad of two. Bitcoin since 2013.",
        )
        .with_metadata("location", serde_json::json!("Seattle, WA"))
        .with_metadata("followers_count", serde_json::json!(5400));

        let candidates = provider.infer(&profile).await.unwrap();
        let types: Vec<_> = candidates.iter().map(|c| c.inference_type).collect();
        for expected in [
            InferenceType::Location,
            InferenceType::ProgrammingSkills,
            InferenceType::WorkSchedule,
            InferenceType::HealthSignals,
            InferenceType::FamilyStructure,
            InferenceType::FinancialStatus,
            InferenceType::SocialInfluence,
        ] {
            assert!(types.contains(&expected), "missing {}", expected);
        }

        let location = candidates
            .iter()
            .find(|c| c.inference_type == InferenceType::Location)
            .unwrap();
        assert_eq!(location.value, "Seattle, WA");
        assert!(location.confidence >= 0.8);
        assert!(candidates.iter().all(|c| c.validate().is_ok()));
        assert!(candidates.iter().all(|c| c.provider_id == KEYWORD_PROVIDER_ID));
    }
}
