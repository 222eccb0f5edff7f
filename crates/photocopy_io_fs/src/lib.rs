//! `photocopy_io_fs`:
//! Engine that sorts photos into `year/month/day/type` trees by
//! capture date and replicates them, verified, into several destinations.
//!
//! Pipeline stages, leaves first:
//! - `walk`     : lazy recursive file enumeration
//! - `classify` : capture timestamp + type tag per file
//! - `group`    : grouping keys and the read-only grouping index
//! - `stage`    : optional flat buffer copy of the source
//! - `verify`   : read-after-write hash comparison
//! - `copy`     : one destination writer
//! - `run`      : orchestration across all destinations
//! - `spec`     : enums/options/errors
//! - `report`   : run-time report model
//! - `util`     : shared helper functions

pub mod classify;
mod copy;
pub mod group;
pub mod report;
pub mod run;
pub mod spec;
mod stage;
mod util;
pub mod verify;
pub mod walk;

#[cfg(test)]
mod testing;

pub use classify::{
    ClassifyError, EnumClassifyOutcome, ExifMetadataSource, MetadataSource, classify_file,
    derive_type_tag, parse_capture_timestamp,
};
pub use group::{GroupKey, GroupingIndex, GroupingIndexBuilder, SpecGrouping, SpecSourceFile};
pub use report::{
    EnumCopyOutcome, EnumRunStatus, ReportCopy, ReportCopyBuilder, ReportRun, SpecCopyRecord,
};
pub use run::{run_pipeline, run_pipeline_with_source};
pub use spec::{EnumPatternMode, EnumWalkSymlinkStrategy, RunError, SpecRunOptions};
pub use verify::{EnumVerifyOutcome, hash_file, verify_copy};
pub use walk::{IterTreeFiles, walk_files};
