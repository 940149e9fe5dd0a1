//! # Audit Engine
//!
//! スキャンパイプライン (connector → inference → analysis → planning → report) と
//! スケジューラ向けの `execute_due_actions` を提供する。

use crate::assembler::{AuditReportAssembler, ScanResults};
use crate::connector::{ConnectorError, ConnectorRegistry};
use chrono::{DateTime, Duration, Utc};
use footprint_analysis::PrivacyAnalyzer;
use footprint_core::config::AuditConfig;
use footprint_core::error::ConfigError;
use footprint_core::model::{
    AuditReport, FailureKind, FailureSource, Platform, ProfileData, RemediationAction,
    SourceFailure,
};
use footprint_inference::{
    InferenceOrchestrator, OrchestratorError, ProviderRegistry, ReconcileOutcome,
};
use footprint_remediation::{
    CapabilityRegistry, ExecutorError, RemediationExecutor, RemediationPlanner,
};
use footprint_store::ReportStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Engine errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("a scan for subject {0} is already in progress")]
    ScanInProgress(String),

    #[error("no platforms requested")]
    NoPlatforms,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("report store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("inference error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("remediation error: {0}")]
    Executor(#[from] ExecutorError),
}

/// Releases the subject's scan slot on drop, including on early return
struct ScanGuard<'a> {
    active: &'a Mutex<HashSet<String>>,
    subject_id: String,
}

impl<'a> ScanGuard<'a> {
    fn acquire(active: &'a Mutex<HashSet<String>>, subject_id: &str) -> Result<Self, EngineError> {
        let mut scans = active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !scans.insert(subject_id.to_string()) {
            return Err(EngineError::ScanInProgress(subject_id.to_string()));
        }
        Ok(Self {
            active,
            subject_id: subject_id.to_string(),
        })
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        let mut scans = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        scans.remove(&self.subject_id);
    }
}

/// 監査エンジン
pub struct AuditEngine {
    config: AuditConfig,
    connectors: ConnectorRegistry,
    providers: ProviderRegistry,
    orchestrator: InferenceOrchestrator,
    analyzer: PrivacyAnalyzer,
    planner: RemediationPlanner,
    assembler: AuditReportAssembler,
    executor: Arc<RemediationExecutor>,
    store: Arc<dyn ReportStore>,
    active_scans: Mutex<HashSet<String>>,
}

impl AuditEngine {
    /// Build an engine with a fresh executor over `capabilities`
    pub fn new(
        config: AuditConfig,
        connectors: ConnectorRegistry,
        providers: ProviderRegistry,
        capabilities: CapabilityRegistry,
        store: Arc<dyn ReportStore>,
    ) -> Result<Self, EngineError> {
        let executor = Arc::new(RemediationExecutor::new(
            config.remediation.clone(),
            capabilities,
        ));
        Self::with_executor(config, connectors, providers, executor, store)
    }

    /// Build an engine around an existing executor (shared clock or registry)
    pub fn with_executor(
        config: AuditConfig,
        connectors: ConnectorRegistry,
        providers: ProviderRegistry,
        executor: Arc<RemediationExecutor>,
        store: Arc<dyn ReportStore>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            orchestrator: InferenceOrchestrator::new(config.inference.clone()),
            analyzer: PrivacyAnalyzer::new(config.analysis.clone()),
            planner: RemediationPlanner::new(config.remediation.clone()),
            assembler: AuditReportAssembler::new(),
            config,
            connectors,
            providers,
            executor,
            store,
            active_scans: Mutex::new(HashSet::new()),
        })
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn executor(&self) -> &Arc<RemediationExecutor> {
        &self.executor
    }

    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    /// Run a full scan and persist the resulting report.
    ///
    /// Connector and provider failures degrade the report instead of failing the scan.
    /// A second scan for a subject that is already being scanned is rejected with
    /// [`EngineError::ScanInProgress`]; it is not queued behind the running one.
    /// Once the report is saved, settled actions older than `remediation.retention_secs` are pruned.
    pub async fn run_scan(
        &self,
        subject_id: &str,
        platforms: &[Platform],
    ) -> Result<AuditReport, EngineError> {
        let platforms = dedup_platforms(platforms);
        if platforms.is_empty() {
            return Err(EngineError::NoPlatforms);
        }
        let _guard = ScanGuard::acquire(&self.active_scans, subject_id)?;
        info!("Starting scan for {} on {} platform(s)", subject_id, platforms.len());

        let (profiles, mut failures) = self.fetch_profiles(subject_id, &platforms).await;

        let (outcome, inference_skipped) =
            match self.orchestrator.reconcile(&profiles, &self.providers).await {
                Ok(outcome) => (outcome, false),
                Err(OrchestratorError::NoProviders) => {
                    warn!("No inference providers registered; report for {} is degraded", subject_id);
                    (ReconcileOutcome::default(), true)
                }
                Err(e) => return Err(e.into()),
            };
        failures.extend(outcome.failures.iter().cloned());
        debug!(
            "Reconciled {} inference(s) from {} call(s), {} candidate(s) rejected",
            outcome.inferences.len(),
            outcome.calls,
            outcome.rejected_candidates
        );

        let assessment = self.analyzer.score(&outcome.inferences, &profiles);
        let planned = self.planner.plan(
            subject_id,
            &assessment.recommendations,
            self.executor.capabilities(),
        );
        let ids = self.executor.register(planned).await;

        if self.config.remediation.auto_schedule {
            self.schedule_all(&ids).await;
        }
        let actions = self.collect_actions(&ids).await;

        let report = self.assembler.assemble(
            ScanResults {
                subject_id,
                platforms_analyzed: &platforms,
                profiles: &profiles,
                inferences: &outcome.inferences,
                risk: &assessment.risk,
                recommendations: &assessment.recommendations,
                actions: &actions,
                failures: &failures,
                inference_skipped,
            },
            self.executor.now(),
        );

        self.store.save(&report).await?;
        info!(
            "Scan {} for {} complete: overall risk {:.2}, {} action(s), degraded={}",
            report.report_id,
            subject_id,
            report.risk.overall,
            report.actions.len(),
            report.degraded
        );

        let retention = Duration::seconds(
            i64::try_from(self.config.remediation.retention_secs)
                .unwrap_or(i64::MAX)
                .min(i64::MAX / 1000),
        );
        self.executor.prune(retention).await;
        Ok(report)
    }

    /// Scheduler entry point: execute every action due at `now`
    pub async fn execute_due_actions(&self, now: DateTime<Utc>) -> Vec<RemediationAction> {
        let executed = self.executor.execute_due(now).await;
        if !executed.is_empty() {
            info!("Executed {} due action(s)", executed.len());
        }
        executed
    }

    /// Stored reports for a subject, newest first
    pub async fn history(&self, subject_id: &str, limit: usize) -> Result<Vec<AuditReport>, EngineError> {
        Ok(self.store.load(subject_id, limit).await?)
    }

    async fn fetch_profiles(
        &self,
        subject_id: &str,
        platforms: &[Platform],
    ) -> (Vec<ProfileData>, Vec<SourceFailure>) {
        let timeout = self.config.connector_timeout();
        let fetches = platforms.iter().map(|platform| {
            let connector = self.connectors.get(*platform);
            async move {
                let Some(connector) = connector else {
                    return (
                        *platform,
                        Err((FailureKind::Unavailable, "no connector registered".to_string())),
                    );
                };
                let result = match tokio::time::timeout(timeout, connector.fetch_profile(subject_id)).await {
                    Ok(Ok(profile)) => Ok(profile),
                    Ok(Err(e)) => Err((connector_failure_kind(&e), e.to_string())),
                    Err(_) => Err((
                        FailureKind::Timeout,
                        format!("connector timed out after {}ms", timeout.as_millis()),
                    )),
                };
                (*platform, result)
            }
        });

        let mut profiles = Vec::new();
        let mut failures = Vec::new();
        for (platform, result) in futures::future::join_all(fetches).await {
            match result {
                Ok(profile) => profiles.push(profile),
                Err((kind, message)) => {
                    warn!("Platform {} unavailable for {}: {}", platform, subject_id, message);
                    failures.push(SourceFailure {
                        source: FailureSource::Connector { platform },
                        kind,
                        message,
                        attempts: 1,
                    });
                }
            }
        }
        (profiles, failures)
    }

    async fn schedule_all(&self, ids: &[Uuid]) {
        let delay = Duration::seconds(
            i64::try_from(self.config.remediation.default_delay_secs)
                .unwrap_or(i64::MAX)
                .min(i64::MAX / 1000),
        );
        let dry_run = self.config.remediation.dry_run;
        for id in ids {
            if let Err(e) = self.executor.schedule(*id, delay, dry_run).await {
                error!("Failed to schedule action {}: {}", id, e);
            }
        }
    }

    async fn collect_actions(&self, ids: &[Uuid]) -> Vec<RemediationAction> {
        let mut actions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(action) = self.executor.get(*id).await {
                actions.push(action);
            }
        }
        actions
    }
}

fn dedup_platforms(platforms: &[Platform]) -> Vec<Platform> {
    let mut seen = HashSet::new();
    platforms.iter().copied().filter(|p| seen.insert(*p)).collect()
}

fn connector_failure_kind(error: &ConnectorError) -> FailureKind {
    match error {
        ConnectorError::Authentication(_) => FailureKind::Authentication,
        ConnectorError::NotFound { .. } | ConnectorError::Unavailable(_) => FailureKind::Unavailable,
    }
}
