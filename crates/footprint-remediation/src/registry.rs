//! In-progress action registry (id -> action).
//!
//! Every state change goes through [`ActionRegistry::transition`], a
//! compare-and-set on the current state, so concurrent cancel, execute and
//! rollback requests for one id cannot interleave into an invalid transition.

use crate::executor::ExecutorError;
use chrono::{DateTime, Utc};
use footprint_core::model::{ActionState, RemediationAction};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Entry {
    /// Registration order, breaks ties between equal trigger times
    seq: u64,
    /// Last registration or transition time
    touched: DateTime<Utc>,
    action: RemediationAction,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    entries: HashMap<Uuid, Entry>,
}

/// Shared action registry
#[derive(Debug, Default)]
pub struct ActionRegistry {
    inner: RwLock<Inner>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action. An id that is already present is left untouched.
    pub async fn insert(&self, action: RemediationAction, at: DateTime<Utc>) -> Uuid {
        let mut inner = self.inner.write().await;
        let id = action.id;
        if !inner.entries.contains_key(&id) {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.entries.insert(
                id,
                Entry {
                    seq,
                    touched: at,
                    action,
                },
            );
        }
        id
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Drop actions that no longer need the registry and were last touched before `older_than`.
    ///
    /// `Scheduled`, `Executing` and `RollingBack` actions are always kept.
    /// A pruned `Completed` action can no longer be rolled back through the executor.
    pub async fn prune_settled(&self, older_than: DateTime<Utc>) -> Vec<Uuid> {
        let mut inner = self.inner.write().await;
        let mut pruned: Vec<(u64, Uuid)> = inner
            .entries
            .iter()
            .filter(|(_, e)| is_settled(e.action.state) && e.touched < older_than)
            .map(|(id, e)| (e.seq, *id))
            .collect();
        pruned.sort();
        for (_, id) in &pruned {
            inner.entries.remove(id);
        }
        pruned.into_iter().map(|(_, id)| id).collect()
    }

    /// Whether any action for the subject is still registered
    pub async fn has_subject(&self, subject_id: &str) -> bool {
        self.inner
            .read()
            .await
            .entries
            .values()
            .any(|e| e.action.subject_id == subject_id)
    }

    pub async fn get(&self, id: Uuid) -> Option<RemediationAction> {
        self.inner
            .read()
            .await
            .entries
            .get(&id)
            .map(|e| e.action.clone())
    }

    /// Actions for a subject in registration order
    pub async fn for_subject(&self, subject_id: &str) -> Vec<RemediationAction> {
        let inner = self.inner.read().await;
        let mut entries: Vec<&Entry> = inner
            .entries
            .values()
            .filter(|e| e.action.subject_id == subject_id)
            .collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.action.clone()).collect()
    }

    /// Scheduled actions whose trigger time has passed, ordered by trigger time then registration
    pub async fn due(&self, now: DateTime<Utc>) -> Vec<RemediationAction> {
        let inner = self.inner.read().await;
        let mut due: Vec<&Entry> = inner
            .entries
            .values()
            .filter(|e| {
                e.action.state == ActionState::Scheduled
                    && e.action.scheduled_for.map(|at| at <= now).unwrap_or(false)
            })
            .collect();
        due.sort_by(|a, b| {
            a.action
                .scheduled_for
                .cmp(&b.action.scheduled_for)
                .then_with(|| a.seq.cmp(&b.seq))
        });
        due.into_iter().map(|e| e.action.clone()).collect()
    }

    pub async fn count_in(&self, state: ActionState) -> usize {
        self.inner
            .read()
            .await
            .entries
            .values()
            .filter(|e| e.action.state == state)
            .count()
    }

    /// Compare-and-set transition.
    ///
    /// Fails with `InvalidTransition` unless the current state is one of `expected`.
    /// `update` runs under the write lock and may veto the transition by returning an error,
    /// in which case the action is left unchanged.
    pub async fn transition<F>(
        &self,
        id: Uuid,
        expected: &[ActionState],
        next: ActionState,
        operation: &'static str,
        update: F,
    ) -> Result<RemediationAction, ExecutorError>
    where
        F: FnOnce(&mut RemediationAction) -> Result<(), ExecutorError>,
    {
        let mut inner = self.inner.write().await;
        let entry = inner
            .entries
            .get_mut(&id)
            .ok_or(ExecutorError::UnknownAction(id))?;

        if !expected.contains(&entry.action.state) {
            return Err(ExecutorError::InvalidTransition {
                id,
                from: entry.action.state,
                operation,
            });
        }

        let mut staged = entry.action.clone();
        update(&mut staged)?;
        staged.state = next;
        if let Some(last) = staged.events.last() {
            entry.touched = entry.touched.max(last.at);
        }
        entry.action = staged.clone();
        Ok(staged)
    }
}

fn is_settled(state: ActionState) -> bool {
    matches!(state, ActionState::Proposed) || state.is_terminal()
}
