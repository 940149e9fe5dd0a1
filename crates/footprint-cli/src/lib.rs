//! # Footprint CLI Library
//!
//! プライバシー監査のコマンドラインインターフェース
//! ローカルのプロファイルディレクトリを対象にスキャン・是正・履歴参照を行う

pub mod commands;
pub mod local;
pub mod render;

pub use commands::*;
pub use local::*;
pub use render::*;
