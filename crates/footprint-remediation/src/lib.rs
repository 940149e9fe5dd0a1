//! # Footprint Remediation
//!
//! 推奨事項を是正アクションへ変換し、状態機械として実行・記録・ロールバックする。
//! プラットフォームへの変更はすべて [`PlatformCapability`] を経由する。

pub mod capability;
pub mod clock;
pub mod executor;
pub mod planner;
pub mod registry;

pub use capability::*;
pub use clock::*;
pub use executor::*;
pub use planner::*;
pub use registry::*;
