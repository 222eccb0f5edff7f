//! Run options, enums and top-level error types.

use std::path::PathBuf;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Symlink handling policy for the source walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumWalkSymlinkStrategy {
    /// Follow links: yield linked files and descend into linked directories.
    Follow,
    /// Ignore symlink entries.
    Skip,
}

/// Pattern matching mode for file-name exclusion lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumPatternMode {
    /// Shell-like wildcards (`*`, `?`, character classes).
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Substring match.
    Literal,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `run_pipeline`.
#[derive(Debug, Clone)]
pub struct SpecRunOptions {
    /// Optional flat staging directory read instead of the source after one pass.
    pub dir_buffer: Option<PathBuf>,
    /// File extensions dropped right after the walk (case-insensitive, `.` optional).
    pub exts_ignore: Option<Vec<String>>,
    /// Exclude patterns applied to file basename.
    pub patterns_exclude_files: Option<Vec<String>>,
    /// Pattern interpretation mode.
    pub rule_pattern: EnumPatternMode,
    /// Symlink handling behavior during the walk.
    pub rule_symlink: EnumWalkSymlinkStrategy,
    /// Maximum copy+verify workers per destination.
    pub num_workers_max: Option<usize>,
    /// Maximum copy workers for the buffer stage.
    pub num_workers_io: Option<usize>,
    /// Carry permissions, timestamps and xattrs over to every copy.
    pub if_preserve_metadata: bool,
    /// Do not mutate filesystem; record what would happen.
    pub if_dry_run: bool,
}

impl Default for SpecRunOptions {
    fn default() -> Self {
        Self {
            dir_buffer: None,
            exts_ignore: None,
            patterns_exclude_files: None,
            rule_pattern: EnumPatternMode::Glob,
            rule_symlink: EnumWalkSymlinkStrategy::Skip,
            num_workers_max: None,
            num_workers_io: None,
            if_preserve_metadata: true,
            if_dry_run: false,
        }
    }
}

/// "Top-level call failed" errors (input validation / setup stage).
///
/// Anything local to one file or one destination is reported through the run
/// report instead.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// No destination directory was requested.
    #[error("At least one destination directory is required.")]
    NoDestinations,
    /// Invalid exclude pattern.
    #[error("{0}")]
    InvalidPattern(String),
    /// Source path is not a directory.
    #[error("Source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),
    /// Source root exists but cannot be listed.
    #[error("Failed to read source directory {}: {message}", path.display())]
    SourceUnreadable {
        /// Source root.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
    /// Source and buffer overlap (`src` contains buffer or vice versa).
    #[error(
        "Source and buffer directories overlap: {} <-> {}",
        path_dir_src.display(),
        path_dir_buffer.display()
    )]
    SourceBufferOverlap {
        /// Normalized source directory.
        path_dir_src: PathBuf,
        /// Normalized buffer directory.
        path_dir_buffer: PathBuf,
    },
    /// Buffer directory initialization failed.
    #[error("Failed to initialize buffer {}: {message}", path.display())]
    BufferInitFailed {
        /// Buffer path that failed initialization.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
