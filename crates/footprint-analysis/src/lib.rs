//! # Footprint Analysis
//!
//! 推論結果のプライバシーリスク評価
//! 感度カテゴリ重み、複数プラットフォームでの露出係数、推奨事項の順位付け

pub mod analyzer;
pub mod exposure;
pub mod templates;

pub use analyzer::*;
pub use exposure::*;
pub use templates::*;
