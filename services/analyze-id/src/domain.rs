// Domain layer modules
pub mod analysis;
pub mod document_location;
pub mod extraction_result;
pub mod field_group;
pub mod invocation_event;

// Re-exports
pub use analysis::{AnalysisRequest, AnalysisResponse, FieldValue, IdentityDocumentRecord, MAX_DOCUMENT_PAGES};
pub use document_location::{DocumentLocation, DocumentLocationError, MAX_INLINE_DOCUMENT_BYTES};
pub use extraction_result::{DocumentFields, ErrorKind, ExtractionError, ExtractionResult};
pub use field_group::{CanonicalField, FieldGroup, FieldGroupError};
pub use invocation_event::{InvalidEventError, InvocationEvent};
