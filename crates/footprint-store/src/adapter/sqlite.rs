use anyhow::{Context, Result};
use async_trait::async_trait;
use footprint_core::model::AuditReport;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use tracing::debug;

use crate::store::ReportStore;

pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl SqliteReportStore {
    /// Open (creating if missing) a SQLite database and ensure the schema
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url {}", database_url))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        // schema
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_reports (
              seq INTEGER PRIMARY KEY AUTOINCREMENT,
              report_id TEXT NOT NULL UNIQUE,
              subject_id TEXT NOT NULL,
              generated_at_us INTEGER NOT NULL,
              schema_version TEXT NOT NULL,
              report_json TEXT NOT NULL
            );
        "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_reports_subject ON audit_reports(subject_id, generated_at_us);"#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_reports")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn save(&self, report: &AuditReport) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO audit_reports(report_id, subject_id, generated_at_us, schema_version, report_json)
            VALUES(?, ?, ?, ?, ?)
        "#,
        )
        .bind(report.report_id.to_string())
        .bind(&report.subject_id)
        .bind(report.generated_at.timestamp_micros())
        .bind(&report.schema_version)
        .bind(serde_json::to_string(report)?)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to append report {}", report.report_id))?;

        tx.commit().await?;
        debug!("Stored report {} for {}", report.report_id, report.subject_id);
        Ok(())
    }

    async fn load(&self, subject_id: &str, limit: usize) -> Result<Vec<AuditReport>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, RowReport>(
            r#"
            SELECT report_json FROM audit_reports
            WHERE subject_id = ?
            ORDER BY generated_at_us DESC, seq DESC
            LIMIT ?
        "#,
        )
        .bind(subject_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| serde_json::from_str(&r.report_json).context("corrupt report row"))
            .collect()
    }
}

#[derive(FromRow)]
struct RowReport {
    report_json: String,
}
