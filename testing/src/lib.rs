pub mod error;
mod fixtures;
mod framework;
mod generators;
mod negotiation_record;

pub use error::{FailurePoint, RecordError};
pub use fixtures::{sample_catalog, sample_request, sample_supplier, sample_suppliers};
pub use framework::{Framework, FrameworkError};
pub use generators::{ContextLog, EmitErrors, Panicking, ScriptedGenerator};
pub use negotiation_record::{
    NegotiationRecord, NegotiationRecordSync, NegotiationResult, NegotiationStage,
};
