// アプリケーション層モジュール
pub mod analyze_id_handler;

// 再エクスポート
pub use analyze_id_handler::{AnalyzeIdError, AnalyzeIdHandler};
