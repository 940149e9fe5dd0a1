//! Backend selection for report persistence

use crate::adapter::sqlite::SqliteReportStore;
use crate::store::{MemoryReportStore, ReportStore};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Persistence backend types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceBackend {
    /// In-memory only (lost on exit)
    Memory,
    /// SQLite database file
    Sqlite { url: String },
}

impl PersistenceBackend {
    /// `memory` selects the in-memory backend, anything else is a SQLite URL or path
    pub fn from_url(url: &str) -> Self {
        match url.trim() {
            "" | "memory" | "memory://" => PersistenceBackend::Memory,
            other if other.starts_with("sqlite:") => PersistenceBackend::Sqlite {
                url: other.to_string(),
            },
            path => PersistenceBackend::Sqlite {
                url: format!("sqlite://{}", path),
            },
        }
    }

    /// Open the backend
    pub async fn open(&self) -> Result<Arc<dyn ReportStore>> {
        match self {
            PersistenceBackend::Memory => Ok(Arc::new(MemoryReportStore::new())),
            PersistenceBackend::Sqlite { url } => {
                info!("Opening report store at {}", url);
                Ok(Arc::new(SqliteReportStore::new(url).await?))
            }
        }
    }
}
