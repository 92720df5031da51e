//! Pipeline orchestrator (spec §4.11, C12): per-chapter stage sequencing,
//! skip-if-present resumption, concurrency gates, MFA workspace pool.

pub mod external;
pub mod gates;
pub mod mfa_pool;
pub mod orchestrator;
pub mod stages;

pub use external::{AlignerOutcome, CliForcedAligner, ForcedAligner};
pub use gates::{CancellationToken, ConcurrencyGates};
pub use mfa_pool::{MfaWorkspacePool, WorkspaceGuard};
pub use orchestrator::{run_chapter, ChapterInput, ChapterRunReport, RunContext, RunSummary, StageOutcome};
pub use stages::{ForceClaims, StageId};
