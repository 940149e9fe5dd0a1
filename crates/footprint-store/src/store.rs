//! Report store capability and the in-memory backend

use anyhow::{bail, Result};
use async_trait::async_trait;
use footprint_core::model::AuditReport;
use tokio::sync::RwLock;

/// Append-only audit report persistence
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Append a report. Saving the same report id twice is an error.
    async fn save(&self, report: &AuditReport) -> Result<()>;

    /// Reports for a subject, newest first
    async fn load(&self, subject_id: &str, limit: usize) -> Result<Vec<AuditReport>>;
}

/// Ephemeral store for tests and one-off runs
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: RwLock<Vec<AuditReport>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn save(&self, report: &AuditReport) -> Result<()> {
        let mut reports = self.reports.write().await;
        if reports.iter().any(|r| r.report_id == report.report_id) {
            bail!("report {} already stored", report.report_id);
        }
        reports.push(report.clone());
        Ok(())
    }

    async fn load(&self, subject_id: &str, limit: usize) -> Result<Vec<AuditReport>> {
        let reports = self.reports.read().await;
        // 挿入順を保ったまま新しい順に並べる
        let mut matching: Vec<(usize, &AuditReport)> = reports
            .iter()
            .enumerate()
            .filter(|(_, r)| r.subject_id == subject_id)
            .collect();
        matching.sort_by(|(ia, a), (ib, b)| {
            b.generated_at.cmp(&a.generated_at).then_with(|| ib.cmp(ia))
        });
        Ok(matching
            .into_iter()
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }
}
