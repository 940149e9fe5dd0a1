//! Bounded-concurrency provider fan-out

use crate::provider::{ProviderAdapter, ProviderError, ProviderRegistry};
use crate::reconcile::{merge_candidates, MergePolicy};
use footprint_core::config::{InferenceConfig, RetryConfig};
use footprint_core::model::{
    FailureKind, FailureSource, Inference, InferenceCandidate, Platform, ProfileData,
    SourceFailure,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Orchestrator errors
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("no inference providers registered")]
    NoProviders,

    #[error("invalid inference configuration: {0}")]
    InvalidConfig(String),

    #[error("admission control closed")]
    AdmissionClosed,
}

/// Reconciled inferences plus the calls that did not contribute
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub inferences: Vec<Inference>,
    pub failures: Vec<SourceFailure>,
    /// Candidates rejected by validation before merging
    pub rejected_candidates: usize,
    /// Provider calls dispatched
    pub calls: usize,
}

/// Fans out profiles to providers and merges the candidates
pub struct InferenceOrchestrator {
    config: InferenceConfig,
}

/// Outcome of one (provider, profile) call
struct CallRecord {
    provider_id: String,
    platform: Platform,
    attempts: u32,
    result: Result<Vec<InferenceCandidate>, SourceFailure>,
}

impl InferenceOrchestrator {
    pub fn new(config: InferenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Run every (provider, profile) pair the configuration allows and reconcile the results.
    ///
    /// Provider failures are recorded on the outcome; they never abort the reconciliation.
    pub async fn reconcile(
        &self,
        profiles: &[ProfileData],
        registry: &ProviderRegistry,
    ) -> Result<ReconcileOutcome, OrchestratorError> {
        if registry.is_empty() {
            return Err(OrchestratorError::NoProviders);
        }
        if self.config.max_in_flight == 0 {
            return Err(OrchestratorError::InvalidConfig(
                "max_in_flight must be greater than zero".to_string(),
            ));
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight));
        let mut tasks = JoinSet::new();
        let mut calls = 0;

        for provider in registry.providers() {
            for profile in profiles {
                if !self.config.provider_covers(provider.id(), profile.platform) {
                    continue;
                }
                calls += 1;

                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| OrchestratorError::AdmissionClosed)?;
                let provider = Arc::clone(provider);
                let profile = profile.clone();
                let timeout = self.config.call_timeout();
                let retry = self.config.retry.clone();

                debug!("Dispatching {} for {}", provider.id(), profile.platform);
                tasks.spawn(async move {
                    let record = call_with_retry(provider.as_ref(), &profile, timeout, &retry).await;
                    drop(permit);
                    record
                });
            }
        }

        let mut records = Vec::with_capacity(calls);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(record) => records.push(record),
                Err(e) => error!("Provider task aborted: {}", e),
            }
        }
        let (mut candidates, mut failures) = settle(records);

        let total = candidates.len();
        candidates.retain(|candidate| match candidate.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping candidate from {}: {}", candidate.provider_id, e);
                false
            }
        });
        let rejected_candidates = total - candidates.len();

        let inferences = merge_candidates(
            &candidates,
            MergePolicy {
                min_confidence: self.config.min_confidence,
                max_inferences: self.config.max_inferences,
            },
        );
        failures.sort_by(|a, b| failure_key(a).cmp(&failure_key(b)));

        info!(
            "Reconciled {} candidates from {} calls into {} inferences ({} failures)",
            candidates.len(),
            calls,
            inferences.len(),
            failures.len()
        );

        Ok(ReconcileOutcome {
            inferences,
            failures,
            rejected_candidates,
            calls,
        })
    }
}

/// Split call records into candidates and failures.
///
/// A provider that failed authentication on any profile is fatal for the whole scan:
/// its candidates are discarded and its other calls are recorded as `Skipped`.
/// The result depends only on the set of records, never on the order they finished in.
fn settle(records: Vec<CallRecord>) -> (Vec<InferenceCandidate>, Vec<SourceFailure>) {
    let revoked: BTreeSet<String> = records
        .iter()
        .filter(|r| matches!(&r.result, Err(f) if f.kind == FailureKind::Authentication))
        .map(|r| r.provider_id.clone())
        .collect();

    let mut candidates = Vec::new();
    let mut failures = Vec::new();
    for record in records {
        if !revoked.contains(&record.provider_id) {
            match record.result {
                Ok(found) => candidates.extend(found),
                Err(failure) => failures.push(failure),
            }
            continue;
        }
        match record.result {
            Err(failure) if failure.kind == FailureKind::Authentication => failures.push(failure),
            _ => failures.push(SourceFailure {
                source: FailureSource::Provider {
                    provider_id: record.provider_id,
                    platform: record.platform,
                },
                kind: FailureKind::Skipped,
                message: "provider disabled after authentication failure".to_string(),
                attempts: record.attempts,
            }),
        }
    }
    for provider_id in &revoked {
        error!("{} failed authentication, discarding its results for this scan", provider_id);
    }
    (candidates, failures)
}

fn failure_key(failure: &SourceFailure) -> (String, String) {
    match &failure.source {
        FailureSource::Connector { platform } => (String::new(), platform.to_string()),
        FailureSource::Provider {
            provider_id,
            platform,
        } => (provider_id.clone(), platform.to_string()),
    }
}

async fn call_with_retry(
    provider: &dyn ProviderAdapter,
    profile: &ProfileData,
    timeout: Duration,
    retry: &RetryConfig,
) -> CallRecord {
    let provider_id = provider.id().to_string();
    let record = |attempts: u32, result: Result<Vec<InferenceCandidate>, SourceFailure>| CallRecord {
        provider_id: provider_id.clone(),
        platform: profile.platform,
        attempts,
        result,
    };
    let failure = |kind: FailureKind, message: String, attempts: u32| {
        record(
            attempts,
            Err(SourceFailure {
                source: FailureSource::Provider {
                    provider_id: provider_id.clone(),
                    platform: profile.platform,
                },
                kind,
                message,
                attempts,
            }),
        )
    };

    let max_attempts = retry.max_attempts.max(1);
    let mut last_kind = FailureKind::Transient;
    let mut last_message = String::new();

    for attempt in 1..=max_attempts {
        let backoff = match tokio::time::timeout(timeout, provider.infer(profile)).await {
            Ok(Ok(candidates)) => {
                debug!(
                    "{} returned {} candidates for {}",
                    provider_id,
                    candidates.len(),
                    profile.platform
                );
                return record(attempt, Ok(candidates));
            }
            Ok(Err(ProviderError::Authentication(message))) => {
                error!("{} authentication failed on {}: {}", provider_id, profile.platform, message);
                return failure(FailureKind::Authentication, message, attempt);
            }
            Ok(Err(e)) if !e.is_retryable() => {
                warn!("{} rejected profile from {}: {}", provider_id, profile.platform, e);
                return failure(e.kind(), e.to_string(), attempt);
            }
            Ok(Err(ProviderError::RateLimited {
                message,
                retry_after,
            })) => {
                last_kind = FailureKind::RateLimited;
                last_message = message;
                retry_after.unwrap_or_else(|| retry.backoff_for(attempt))
            }
            Ok(Err(e)) => {
                last_kind = e.kind();
                last_message = e.to_string();
                retry.backoff_for(attempt)
            }
            Err(_) => {
                last_kind = FailureKind::Timeout;
                last_message = format!("call exceeded {}ms", timeout.as_millis());
                retry.backoff_for(attempt)
            }
        };

        if attempt < max_attempts {
            warn!(
                "{} attempt {}/{} failed ({}), retrying in {:?}",
                provider_id, attempt, max_attempts, last_message, backoff
            );
            tokio::time::sleep(backoff).await;
        }
    }

    warn!(
        "{} gave up on {} after {} attempts: {}",
        provider_id, profile.platform, max_attempts, last_message
    );
    failure(last_kind, last_message, max_attempts)
}
