pub mod aggregator;
pub mod classifier;
pub mod linkage;
pub mod lookup;
pub mod model;
pub mod orchestrator;
pub mod report;

pub use aggregator::{AggregateError, Aggregator};
pub use classifier::{
    classify_commit, classify_labels, inducing_variants, BugFixFlags, BugFixVariant,
    CommitVerdict, SzzVariant, Variant, VariantSet,
};
pub use linkage::{touches_source, Completeness, LinkageResolver, LinkageResult, Resolution};
pub use lookup::{LookupError, ShaLookup};
pub use model::{
    AggregateRow, CommitHistogram, CrossTab, LinkageCounts, Value, ValueKind, VariantTally,
    PROJECT_COLUMN,
};
pub use orchestrator::{Orchestrator, ProjectFailure, RunOutcome, DEFAULT_CONCURRENCY};
pub use report::ReportKind;
