//! # Remediation Executor
//!
//! 是正アクションの状態機械
//! `Proposed -> Scheduled -> Executing -> Completed | Failed`,
//! `Completed -> RollingBack -> RolledBack`, `Scheduled -> Cancelled`

use crate::capability::{CapabilityRegistry, PlatformError};
use crate::clock::{Clock, SystemClock};
use crate::registry::ActionRegistry;
use chrono::{DateTime, Duration, Utc};
use footprint_core::config::RemediationConfig;
use footprint_core::model::{
    ActionOutcome, ActionState, CapabilityKind, EventKind, Platform, RemediationAction,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Executor errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutorError {
    #[error("unknown action {0}")]
    UnknownAction(Uuid),

    #[error("action {id} cannot {operation} from state {from}")]
    InvalidTransition {
        id: Uuid,
        from: ActionState,
        operation: &'static str,
    },

    #[error("action {0} is not due yet")]
    NotDue(Uuid),

    #[error("delay for action {0} is out of range")]
    InvalidDelay(Uuid),

    #[error("cancellation window for action {0} has elapsed")]
    CancelWindowElapsed(Uuid),

    #[error("no {capability} capability registered for {platform}")]
    NoCapability {
        platform: Platform,
        capability: CapabilityKind,
    },

    #[error("rollback of action {id} failed: {message}")]
    RollbackFailed { id: Uuid, message: String },
}

/// 是正アクション実行器
pub struct RemediationExecutor {
    registry: Arc<ActionRegistry>,
    capabilities: CapabilityRegistry,
    config: RemediationConfig,
    clock: Arc<dyn Clock>,
    subject_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RemediationExecutor {
    pub fn new(config: RemediationConfig, capabilities: CapabilityRegistry) -> Self {
        Self {
            registry: Arc::new(ActionRegistry::new()),
            capabilities,
            config,
            clock: Arc::new(SystemClock),
            subject_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_registry(mut self, registry: Arc<ActionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn config(&self) -> &RemediationConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Register planned actions
    pub async fn register(&self, actions: Vec<RemediationAction>) -> Vec<Uuid> {
        let now = self.clock.now();
        let mut ids = Vec::with_capacity(actions.len());
        for action in actions {
            if action.state != ActionState::Proposed {
                warn!("Registering action {} in state {}", action.id, action.state);
            }
            ids.push(self.registry.insert(action, now).await);
        }
        ids
    }

    pub async fn get(&self, id: Uuid) -> Option<RemediationAction> {
        self.registry.get(id).await
    }

    pub async fn actions_for(&self, subject_id: &str) -> Vec<RemediationAction> {
        self.registry.for_subject(subject_id).await
    }

    /// `Proposed -> Scheduled`, or straight to `Completed` for dry runs.
    ///
    /// Dry-run actions never reach a platform capability.
    pub async fn schedule(
        &self,
        id: Uuid,
        delay: Duration,
        dry_run: bool,
    ) -> Result<RemediationAction, ExecutorError> {
        let now = self.clock.now();
        let at = now
            .checked_add_signed(delay.max(Duration::zero()))
            .ok_or(ExecutorError::InvalidDelay(id))?;

        if dry_run {
            let action = self
                .registry
                .transition(id, &[ActionState::Proposed], ActionState::Completed, "schedule", |a| {
                    a.dry_run = true;
                    a.scheduled_for = Some(at);
                    a.executed_at = Some(now);
                    a.result = Some(ActionOutcome::dry_run());
                    a.record(EventKind::Scheduled, now, Some("dry-run".to_string()));
                    a.record(EventKind::Completed, now, Some("dry-run: no-op".to_string()));
                    Ok(())
                })
                .await?;
            info!("Dry-run action {} completed without platform calls", id);
            return Ok(action);
        }

        let current = self
            .registry
            .get(id)
            .await
            .ok_or(ExecutorError::UnknownAction(id))?;
        if self
            .capabilities
            .resolve(current.platform, current.capability)
            .is_none()
        {
            return Err(ExecutorError::NoCapability {
                platform: current.platform,
                capability: current.capability,
            });
        }

        let action = self
            .registry
            .transition(id, &[ActionState::Proposed], ActionState::Scheduled, "schedule", |a| {
                a.dry_run = false;
                a.scheduled_for = Some(at);
                a.record(EventKind::Scheduled, now, Some(format!("due at {}", at)));
                Ok(())
            })
            .await?;
        info!("Scheduled action {} for {}", id, at);
        Ok(action)
    }

    /// `Scheduled -> Cancelled`, only before the trigger time
    pub async fn cancel(&self, id: Uuid) -> Result<RemediationAction, ExecutorError> {
        let now = self.clock.now();
        let action = self
            .registry
            .transition(id, &[ActionState::Scheduled], ActionState::Cancelled, "cancel", |a| {
                match a.scheduled_for {
                    Some(at) if now < at => {
                        a.record(EventKind::Cancelled, now, None);
                        Ok(())
                    }
                    _ => Err(ExecutorError::CancelWindowElapsed(id)),
                }
            })
            .await?;
        info!("Cancelled action {}", id);
        Ok(action)
    }

    /// Execute every scheduled action due at `now`.
    ///
    /// Actions for one subject run sequentially in trigger order; different subjects run concurrently.
    pub async fn execute_due(&self, now: DateTime<Utc>) -> Vec<RemediationAction> {
        let due = self.registry.due(now).await;
        if due.is_empty() {
            return Vec::new();
        }

        let mut by_subject: Vec<(String, Vec<Uuid>)> = Vec::new();
        for action in due {
            match by_subject.iter_mut().find(|(s, _)| *s == action.subject_id) {
                Some((_, ids)) => ids.push(action.id),
                None => by_subject.push((action.subject_id.clone(), vec![action.id])),
            }
        }

        let runs = by_subject.into_iter().map(|(subject_id, ids)| async move {
            let mut finished = Vec::new();
            for id in ids {
                match self.execute(id, now).await {
                    Ok(Some(action)) => finished.push(action),
                    Ok(None) => {}
                    Err(e) => warn!("Action {} for {} not executed: {}", id, subject_id, e),
                }
            }
            finished
        });

        futures::future::join_all(runs)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Execute one action if it is scheduled and due.
    ///
    /// Returns `None` when the action is not in `Scheduled` or not yet due, so a repeated
    /// call for the same id never produces a second platform mutation.
    pub async fn execute(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<RemediationAction>, ExecutorError> {
        let subject_id = self
            .registry
            .get(id)
            .await
            .ok_or(ExecutorError::UnknownAction(id))?
            .subject_id;
        let lock = self.subject_lock(&subject_id).await;
        let _guard = lock.lock().await;

        let started = match self
            .registry
            .transition(id, &[ActionState::Scheduled], ActionState::Executing, "execute", |a| {
                match a.scheduled_for {
                    Some(at) if at <= now => {
                        a.executed_at = Some(now);
                        a.record(EventKind::Started, now, None);
                        Ok(())
                    }
                    _ => Err(ExecutorError::NotDue(id)),
                }
            })
            .await
        {
            Ok(action) => action,
            Err(ExecutorError::InvalidTransition { from, .. }) => {
                debug!("Action {} already {}, skipping", id, from);
                return Ok(None);
            }
            Err(ExecutorError::NotDue(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let Some(capability) = self
            .capabilities
            .resolve(started.platform, started.capability)
        else {
            let message = format!(
                "no {} capability registered for {}",
                started.capability, started.platform
            );
            return self.mark_failed(id, message).await.map(Some);
        };

        let timeout = self.config.call_timeout();
        let timeout_ms = self.config.call_timeout_ms;

        let snapshot = match tokio::time::timeout(timeout, capability.snapshot(&started)).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                return self
                    .mark_failed(id, format!("snapshot failed: {}", e))
                    .await
                    .map(Some)
            }
            Err(_) => {
                let message = format!("snapshot failed: {}", PlatformError::Timeout(timeout_ms));
                return self.mark_failed(id, message).await.map(Some);
            }
        };

        // スナップショットは apply の前にアクション記録へ保存
        let at = self.clock.now();
        let prepared = self
            .registry
            .transition(id, &[ActionState::Executing], ActionState::Executing, "snapshot", |a| {
                a.snapshot = Some(snapshot);
                a.record(EventKind::SnapshotCaptured, at, None);
                Ok(())
            })
            .await?;

        let outcome = match tokio::time::timeout(timeout, capability.apply(&prepared)).await {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Timeout(timeout_ms)),
        };

        match outcome {
            Ok(outcome) => {
                let at = self.clock.now();
                let action = self
                    .registry
                    .transition(id, &[ActionState::Executing], ActionState::Completed, "complete", |a| {
                        a.result = Some(outcome);
                        a.record(EventKind::Completed, at, None);
                        Ok(())
                    })
                    .await?;
                info!(
                    "Action {} completed: {} on {}",
                    id, action.capability, action.platform
                );
                Ok(Some(action))
            }
            Err(e) => self.mark_failed(id, e.to_string()).await.map(Some),
        }
    }

    /// `Completed -> RolledBack` by restoring the snapshot captured before `apply`.
    ///
    /// A failed restore leaves the action `Completed` with a `RollbackFailed` event.
    pub async fn rollback(&self, id: Uuid) -> Result<RemediationAction, ExecutorError> {
        let subject_id = self
            .registry
            .get(id)
            .await
            .ok_or(ExecutorError::UnknownAction(id))?
            .subject_id;
        let lock = self.subject_lock(&subject_id).await;
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let rolling = self
            .registry
            .transition(id, &[ActionState::Completed], ActionState::RollingBack, "rollback", |a| {
                a.record(EventKind::RollbackStarted, now, None);
                Ok(())
            })
            .await?;

        if rolling.dry_run {
            return self
                .registry
                .transition(
                    id,
                    &[ActionState::RollingBack],
                    ActionState::RolledBack,
                    "rollback",
                    |a| {
                        a.record(
                            EventKind::RollbackSucceeded,
                            now,
                            Some("dry-run: nothing to restore".to_string()),
                        );
                        Ok(())
                    },
                )
                .await;
        }

        let restored = match (self.capabilities.get(rolling.platform), rolling.snapshot.as_ref()) {
            (Some(capability), Some(snapshot)) => {
                match tokio::time::timeout(
                    self.config.call_timeout(),
                    capability.restore(&rolling, snapshot),
                )
                .await
                {
                    Ok(Ok(outcome)) => Ok(outcome),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(PlatformError::Timeout(self.config.call_timeout_ms).to_string()),
                }
            }
            (None, _) => Err(format!("no capability registered for {}", rolling.platform)),
            (_, None) => Err("no snapshot captured".to_string()),
        };

        let at = self.clock.now();
        match restored {
            Ok(outcome) => {
                let action = self
                    .registry
                    .transition(
                        id,
                        &[ActionState::RollingBack],
                        ActionState::RolledBack,
                        "rollback",
                        |a| {
                            a.record(EventKind::RollbackSucceeded, at, Some(outcome.message));
                            Ok(())
                        },
                    )
                    .await?;
                info!("Action {} rolled back", id);
                Ok(action)
            }
            Err(message) => {
                error!("Rollback of action {} failed, action stays completed: {}", id, message);
                self.registry
                    .transition(
                        id,
                        &[ActionState::RollingBack],
                        ActionState::Completed,
                        "rollback",
                        |a| {
                            a.record(EventKind::RollbackFailed, at, Some(message.clone()));
                            Ok(())
                        },
                    )
                    .await?;
                Err(ExecutorError::RollbackFailed { id, message })
            }
        }
    }

    /// Forget settled actions idle for longer than `retention`, and the locks of subjects left without actions.
    ///
    /// Returns the ids that were dropped.
    pub async fn prune(&self, retention: Duration) -> Vec<Uuid> {
        let now = self.clock.now();
        let cutoff = now
            .checked_sub_signed(retention.max(Duration::zero()))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let pruned = self.registry.prune_settled(cutoff).await;

        let mut locks = self.subject_locks.lock().await;
        let subjects: Vec<String> = locks.keys().cloned().collect();
        for subject_id in subjects {
            let held = locks
                .get(&subject_id)
                .map(|lock| Arc::strong_count(lock) > 1)
                .unwrap_or(false);
            if !held && !self.registry.has_subject(&subject_id).await {
                locks.remove(&subject_id);
            }
        }
        if !pruned.is_empty() {
            debug!("Pruned {} settled action(s)", pruned.len());
        }
        pruned
    }

    async fn mark_failed(&self, id: Uuid, message: String) -> Result<RemediationAction, ExecutorError> {
        error!("Action {} failed: {}", id, message);
        let at = self.clock.now();
        self.registry
            .transition(id, &[ActionState::Executing], ActionState::Failed, "fail", |a| {
                a.error = Some(message.clone());
                a.record(EventKind::Failed, at, Some(message));
                Ok(())
            })
            .await
    }

    async fn subject_lock(&self, subject_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.subject_locks.lock().await;
        locks
            .entry(subject_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
