//! Copy report models, mutable report builder and the run-level aggregate.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

////////////////////////////////////////////////////////////////////////////////
// #region CopyRecords

/// Per-file outcome of one copy into a buffer or destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCopyOutcome {
    /// Bytes written and read back with an identical hash.
    Verified,
    /// Bytes written but the read-back hash differs (or could not be read back).
    Mismatched,
    /// The copy itself did not happen.
    CopyFailed,
}

/// One copied file with its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCopyRecord {
    /// File the bytes were read from.
    pub path_file_src: PathBuf,
    /// File the bytes were written to.
    pub path_file_dst: PathBuf,
    /// Copy/verify result.
    pub outcome: EnumCopyOutcome,
    /// Error or mismatch detail, `None` when verified.
    pub message: Option<String>,
}

impl SpecCopyRecord {
    pub(crate) fn failed(path_file_src: &Path, path_file_dst: &Path, message: String) -> Self {
        Self {
            path_file_src: path_file_src.to_path_buf(),
            path_file_dst: path_file_dst.to_path_buf(),
            outcome: EnumCopyOutcome::CopyFailed,
            message: Some(message),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportCopy

/// Aggregate counters and diagnostics for one copy target (buffer or destination).
#[derive(Debug, Default, Clone)]
pub struct ReportCopy {
    /// Buffer or destination root.
    pub path_dir_target: PathBuf,
    /// Number of files scheduled for this target.
    pub cnt_planned: u64,
    /// Number of directories created under the target.
    pub cnt_dirs_created: u64,
    /// Number of files written (verified or not).
    pub cnt_copied: u64,
    /// Number of written files whose hash matched the source.
    pub cnt_verified: u64,
    /// Number of written files whose hash did not match the source.
    pub cnt_mismatched: u64,
    /// Number of files that could not be written.
    pub cnt_failed: u64,
    /// Number of files skipped by dry-run or name collision.
    pub cnt_skipped: u64,
    /// Per-file outcomes.
    pub records: Vec<SpecCopyRecord>,
    /// Non-fatal warnings collected during the copy.
    pub warnings: Vec<String>,
    /// Set when the whole target was abandoned.
    pub error_fatal: Option<String>,
}

impl ReportCopy {
    /// Report for a target abandoned before any file was copied.
    pub fn fatal(path_dir_target: &Path, message: String) -> Self {
        Self {
            path_dir_target: path_dir_target.to_path_buf(),
            error_fatal: Some(message),
            ..Self::default()
        }
    }

    /// Whether the target was abandoned.
    pub fn is_fatal(&self) -> bool {
        self.error_fatal.is_some()
    }

    /// Number of collected hard errors (failed copies, plus one when fatal).
    pub fn error_count(&self) -> usize {
        self.cnt_failed as usize + usize::from(self.is_fatal())
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Records with the given outcome.
    pub fn records_with(&self, outcome: EnumCopyOutcome) -> impl Iterator<Item = &SpecCopyRecord> {
        self.records.iter().filter(move |r| r.outcome == outcome)
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_planned".to_string(), self.cnt_planned);
        dict_counts.insert("cnt_dirs_created".to_string(), self.cnt_dirs_created);
        dict_counts.insert("cnt_copied".to_string(), self.cnt_copied);
        dict_counts.insert("cnt_verified".to_string(), self.cnt_verified);
        dict_counts.insert("cnt_mismatched".to_string(), self.cnt_mismatched);
        dict_counts.insert("cnt_failed".to_string(), self.cnt_failed);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        if let Some(message) = &self.error_fatal {
            return format!(
                "{prefix} {} FAILED: {message}",
                self.path_dir_target.display()
            );
        }
        let dict_counts = self.to_dict();
        format!(
            "{prefix} {} planned={} copied={} verified={} mismatched={} failed={} skipped={} warnings={}",
            self.path_dir_target.display(),
            dict_counts["cnt_planned"],
            dict_counts["cnt_copied"],
            dict_counts["cnt_verified"],
            dict_counts["cnt_mismatched"],
            dict_counts["cnt_failed"],
            dict_counts["cnt_skipped"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[COPY]"))
    }
}

/// Mutable accumulator for one target's copy statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportCopyBuilder {
    report: ReportCopy,
}

impl ReportCopyBuilder {
    pub fn new(path_dir_target: &Path) -> Self {
        Self {
            report: ReportCopy {
                path_dir_target: path_dir_target.to_path_buf(),
                ..ReportCopy::default()
            },
        }
    }

    /// Increment planned count by `value`.
    pub fn add_planned(&mut self, value: u64) {
        self.report.cnt_planned += value;
    }

    /// Increment created-directory count by one.
    pub fn add_dir_created(&mut self) {
        self.report.cnt_dirs_created += 1;
    }

    /// Increment skipped count by one.
    pub fn add_skipped(&mut self) {
        self.report.cnt_skipped += 1;
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        self.report.warnings.push(warning);
    }

    /// Add one per-file outcome and bump the matching counters.
    pub fn add_record(&mut self, spec_copy_record: SpecCopyRecord) {
        match spec_copy_record.outcome {
            EnumCopyOutcome::Verified => {
                self.report.cnt_copied += 1;
                self.report.cnt_verified += 1;
            }
            EnumCopyOutcome::Mismatched => {
                self.report.cnt_copied += 1;
                self.report.cnt_mismatched += 1;
            }
            EnumCopyOutcome::CopyFailed => self.report.cnt_failed += 1,
        }
        self.report.records.push(spec_copy_record);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportCopy {
        self.report
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportRun

/// Overall run verdict, used for the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumRunStatus {
    /// Every destination was processed (per-file problems may still exist).
    Complete,
    /// At least one destination was abandoned, at least one was processed.
    Partial,
    /// No destination could be processed.
    Failed,
}

/// Aggregate of one `run_pipeline` call.
#[derive(Debug, Default, Clone)]
pub struct ReportRun {
    /// Regular files yielded by the walk.
    pub cnt_walked: u64,
    /// Files dropped by the ignore list or exclude patterns.
    pub cnt_ignored: u64,
    /// Files placed in the grouping index.
    pub cnt_grouped: u64,
    /// Distinct group keys in the grouping index.
    pub cnt_groups: u64,
    /// Files without a usable capture timestamp.
    pub cnt_unclassifiable: u64,
    /// Original source paths of the unclassifiable files.
    pub paths_unclassifiable: Vec<PathBuf>,
    /// Walk, classification and destination-list warnings.
    pub warnings: Vec<String>,
    /// Buffer stage report, `None` when no buffer is configured.
    pub report_stage: Option<ReportCopy>,
    /// One report per distinct destination root, in request order; repeated
    /// spellings of a root are dropped with a warning.
    pub reports_destination: Vec<ReportCopy>,
}

impl ReportRun {
    pub fn status(&self) -> EnumRunStatus {
        let n_fatal = self
            .reports_destination
            .iter()
            .filter(|r| r.is_fatal())
            .count();
        if n_fatal == 0 {
            EnumRunStatus::Complete
        } else if n_fatal < self.reports_destination.len() {
            EnumRunStatus::Partial
        } else {
            EnumRunStatus::Failed
        }
    }

    /// Human-readable one-line summary of the classification phase.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} walked={} ignored={} grouped={} groups={} unclassifiable={} warnings={}",
            self.cnt_walked,
            self.cnt_ignored,
            self.cnt_grouped,
            self.cnt_groups,
            self.cnt_unclassifiable,
            self.warnings.len()
        )
    }
}

impl fmt::Display for ReportRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[RUN]"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
