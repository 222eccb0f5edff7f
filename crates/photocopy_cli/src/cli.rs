use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use photocopy_io_fs::{EnumPatternMode, EnumWalkSymlinkStrategy, SpecRunOptions};
use photocopy_log::SpecLogConfig;

#[derive(Parser, Debug)]
#[command(
    name = "photocopy",
    version,
    about = "Sort photos into year/month/day/type folders by capture date and copy them to several destinations"
)]
pub struct Cli {
    #[arg(short, long, help = "Directory tree to read photos from")]
    pub source: PathBuf,
    #[arg(
        short,
        long,
        required = true,
        num_args = 1..,
        help = "One or more destination roots"
    )]
    pub destinations: Vec<PathBuf>,
    #[arg(
        short,
        long,
        num_args = 1..,
        value_delimiter = ',',
        help = "File extensions to skip (case-insensitive, leading dot optional)"
    )]
    pub ignore: Vec<String>,
    #[arg(short, long, help = "Stage the source here once before copying")]
    pub buffer: Option<PathBuf>,
    #[arg(long, num_args = 1.., help = "File-name patterns to skip")]
    pub exclude: Vec<String>,
    #[arg(long, value_enum, default_value_t = PatternMode::Glob)]
    pub pattern_mode: PatternMode,
    #[arg(long, default_value_t = false, help = "Descend into symlinked directories")]
    pub follow_symlinks: bool,
    #[arg(long, help = "Copy+verify workers per destination")]
    pub workers: Option<usize>,
    #[arg(long, help = "Copy workers for the buffer stage")]
    pub io_workers: Option<usize>,
    #[arg(long, default_value_t = false, help = "Do not carry permissions, times or xattrs")]
    pub no_preserve_metadata: bool,
    #[arg(long, default_value_t = false, help = "Report what would be copied without writing")]
    pub dry_run: bool,
    #[arg(short, long, conflicts_with = "quiet", help = "Debug-level logging")]
    pub verbose: bool,
    #[arg(short, long, help = "Only log warnings and errors")]
    pub quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PatternMode {
    Glob,
    Regex,
    Literal,
}

impl From<PatternMode> for EnumPatternMode {
    fn from(value: PatternMode) -> Self {
        match value {
            PatternMode::Glob => EnumPatternMode::Glob,
            PatternMode::Regex => EnumPatternMode::Regex,
            PatternMode::Literal => EnumPatternMode::Literal,
        }
    }
}

impl Cli {
    pub fn to_log_config(&self) -> SpecLogConfig {
        SpecLogConfig {
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }

    pub fn to_run_options(&self) -> SpecRunOptions {
        SpecRunOptions {
            dir_buffer: self.buffer.clone(),
            exts_ignore: non_empty(&self.ignore),
            patterns_exclude_files: non_empty(&self.exclude),
            rule_pattern: self.pattern_mode.into(),
            rule_symlink: if self.follow_symlinks {
                EnumWalkSymlinkStrategy::Follow
            } else {
                EnumWalkSymlinkStrategy::Skip
            },
            num_workers_max: self.workers,
            num_workers_io: self.io_workers,
            if_preserve_metadata: !self.no_preserve_metadata,
            if_dry_run: self.dry_run,
        }
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    let l_values: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    (!l_values.is_empty()).then_some(l_values)
}
