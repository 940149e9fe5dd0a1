//! # Footprint - Privacy Audit Engine
//!
//! Footprint audits the public digital footprint of a subject: it collects profiles from
//! platform connectors, reconciles what several inference providers claim about the
//! subject, scores the privacy risk and plans reversible remediation actions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use footprint::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let providers = ProviderRegistry::new().with_provider(Arc::new(KeywordProvider::new()));
//!     let engine = AuditEngine::new(
//!         AuditConfig::default(),
//!         ConnectorRegistry::new(),
//!         providers,
//!         CapabilityRegistry::new(),
//!         Arc::new(MemoryReportStore::new()),
//!     )?;
//!
//!     let report = engine.run_scan("alice", &[Platform::Github]).await?;
//!     println!("overall risk {:.2}", report.risk.overall);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`footprint-core`**: データモデルと設定
//! - **`footprint-inference`**: プロバイダ呼び出しと推論の統合 (noisy-OR)
//! - **`footprint-analysis`**: 重み付きリスクスコアと推奨事項
//! - **`footprint-remediation`**: 是正アクションの計画・実行・ロールバック
//! - **`footprint-store`**: 監査レポートの追記専用ストア
//! - **`footprint-engine`**: スキャンパイプラインとスケジューラ用エントリポイント
//! - **`footprint-cli`**: コマンドラインインターフェース
//!
//! ## Feature Flags
//!
//! - `full` (default): All crates included
//! - `core`: Only the data model and configuration
//! - `inference`, `analysis`, `remediation`, `store`: one pipeline stage each
//! - `engine`: the complete scan pipeline without the CLI
//! - `cli`: Command-line tools

// Re-export all public APIs from sub-crates (feature-gated)

#[cfg(feature = "footprint-core")]
pub use footprint_core as core;

#[cfg(feature = "footprint-inference")]
pub use footprint_inference as inference;

#[cfg(feature = "footprint-analysis")]
pub use footprint_analysis as analysis;

#[cfg(feature = "footprint-remediation")]
pub use footprint_remediation as remediation;

#[cfg(feature = "footprint-store")]
pub use footprint_store as store;

#[cfg(feature = "footprint-engine")]
pub use footprint_engine as engine;

#[cfg(feature = "footprint-cli")]
pub use footprint_cli as cli;

// Convenience re-exports for common types (feature-gated)
#[cfg(feature = "footprint-core")]
pub use footprint_core::{config, model};

#[cfg(feature = "footprint-engine")]
pub use footprint_engine::{AuditEngine, EngineError};

// Commonly used external dependencies
pub use anyhow;
pub use serde;
pub use serde_json;
pub use tokio;

/// Prelude module for convenient imports
///
/// ```rust
/// use footprint::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "footprint-core")]
    pub use footprint_core::config::*;
    #[cfg(feature = "footprint-core")]
    pub use footprint_core::model::*;

    #[cfg(feature = "footprint-inference")]
    pub use footprint_inference::{
        merge_candidates, InferenceOrchestrator, KeywordProvider, MergePolicy, ProviderAdapter,
        ProviderError, ProviderRegistry,
    };

    #[cfg(feature = "footprint-analysis")]
    pub use footprint_analysis::{Assessment, PrivacyAnalyzer};

    #[cfg(feature = "footprint-remediation")]
    pub use footprint_remediation::{
        CapabilityRegistry, ExecutorError, PlatformCapability, PlatformError,
        RemediationExecutor, RemediationPlanner,
    };

    #[cfg(feature = "footprint-store")]
    pub use footprint_store::{MemoryReportStore, PersistenceBackend, ReportStore};

    #[cfg(feature = "footprint-engine")]
    pub use footprint_engine::{
        AuditEngine, Connector, ConnectorError, ConnectorRegistry, EngineError,
    };

    // Common external types
    pub use anyhow::Result;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::Value;
    pub use tokio;
}

/// Current version of Footprint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Health check function
///
/// Returns the version and which crates this build includes.
pub fn health_check() -> serde_json::Value {
    serde_json::json!({
        "status": "healthy",
        "version": VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "modules": {
            "core": cfg!(feature = "footprint-core"),
            "inference": cfg!(feature = "footprint-inference"),
            "analysis": cfg!(feature = "footprint-analysis"),
            "remediation": cfg!(feature = "footprint-remediation"),
            "store": cfg!(feature = "footprint-store"),
            "engine": cfg!(feature = "footprint-engine"),
            "cli": cfg!(feature = "footprint-cli")
        }
    })
}
