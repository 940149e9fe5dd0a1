//! # Footprint Store
//!
//! 監査レポートの追記専用ストア
//! スキャンごとに新しいレポートを保存し、過去のレポートは書き換えない

pub mod adapter;
pub mod persistence;
pub mod store;

pub use adapter::sqlite::SqliteReportStore;
pub use persistence::*;
pub use store::*;
