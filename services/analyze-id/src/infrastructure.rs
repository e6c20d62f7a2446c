// Infrastructure layer modules
pub mod config;
pub mod document_analyzer;
pub mod logging;

// Re-exports
pub use config::{AnalyzerConfig, AnalyzerConfigError};
pub use document_analyzer::{AnalyzerError, DocumentAnalyzer, TextractDocumentAnalyzer, classify_service_error};
pub use logging::init_logging;
