//! Batch evaluation of raw scan files: quality gates, archiving and rejection bookkeeping.

pub mod archive;
pub mod dispatcher;
pub mod evaluator;
pub mod rejection;
pub mod status;

pub use archive::{ArchiveError, ArchivedEvaluation, EvaluationArchive, JsonArchive};
pub use dispatcher::{AcceptedScan, BatchContext, BatchOutcome, DispatchRequest, Dispatcher};
pub use evaluator::{EvaluationError, ScanEvaluator, ScanHeader};
pub use rejection::{Rejection, RejectionReason};
