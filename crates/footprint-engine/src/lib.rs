//! # Footprint Engine
//!
//! プライバシー監査のスキャンパイプラインとスケジューラ用エントリポイント
//!
//! - [`AuditEngine::run_scan`]: connector → inference → analysis → planning → report
//! - [`AuditEngine::execute_due_actions`]: 期限の来た是正アクションを実行

pub mod assembler;
pub mod connector;
pub mod engine;

pub use assembler::*;
pub use connector::*;
pub use engine::*;
