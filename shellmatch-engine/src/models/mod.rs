//! Data models for shellmatch-engine

pub mod account_id;
pub mod batch;
pub mod records;
pub mod results;

pub use account_id::AccountId;
pub use batch::{BatchRequest, BatchResponse, BatchSummary, ShellCounts};
pub use records::{CustomerRecord, ShellRecord};
pub use results::{AssessmentStatus, MatchCandidate, MatchResult, MatchStatus, SignalNotes};
