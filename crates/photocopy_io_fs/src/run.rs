//! End-to-end orchestration: walk, filter, stage, classify, fan out, join.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::classify::{ExifMetadataSource, MetadataSource};
use crate::copy::{SpecWriteOptions, write_destination};
use crate::group::{SpecSourceFile, build_grouping_index};
use crate::report::{ReportCopy, ReportRun};
use crate::spec::{RunError, SpecRunOptions};
use crate::stage::{SpecStageOptions, stage_files};
use crate::util::{
    SpecNameFilter, absolutize_path, calculate_cpu_worker_limit, calculate_io_worker_limit,
    calculate_worker_limit, is_overlap, resolve_root_identity,
};
use crate::walk::walk_files;

/// Organize every photo under `dir_source` into `year/month/day/type`
/// directories in each of `dirs_destination`, reading capture dates from EXIF.
///
/// This function performs:
/// 1. Input validation.
/// 2. Source walk and ignore filtering.
/// 3. Optional buffer staging and buffer verification (`dir_buffer`).
/// 4. Parallel classification into a grouping index.
/// 5. One concurrent writer per destination, each copying and verifying on
///    its own bounded pool.
///
/// Returns [`ReportRun`] once every destination has finished, including ones
/// that were abandoned. Returns [`RunError`] only for setup failures.
pub fn run_pipeline<P: AsRef<Path>>(
    dir_source: P,
    dirs_destination: &[PathBuf],
    spec_run_options: SpecRunOptions,
) -> Result<ReportRun, RunError> {
    run_pipeline_with_source(
        dir_source,
        dirs_destination,
        spec_run_options,
        &ExifMetadataSource,
    )
}

/// [`run_pipeline`] with a custom capture-timestamp source.
pub fn run_pipeline_with_source<P: AsRef<Path>>(
    dir_source: P,
    dirs_destination: &[PathBuf],
    spec_run_options: SpecRunOptions,
    metadata_source: &dyn MetadataSource,
) -> Result<ReportRun, RunError> {
    if dirs_destination.is_empty() {
        return Err(RunError::NoDestinations);
    }
    let spec_name_filter = SpecNameFilter::from_raw(
        spec_run_options.exts_ignore.as_deref(),
        spec_run_options.patterns_exclude_files.as_deref(),
        spec_run_options.rule_pattern,
    )?;
    let path_dir_src = absolutize_path(dir_source.as_ref());
    if let Some(dir_buffer) = &spec_run_options.dir_buffer
        && is_overlap(&path_dir_src, dir_buffer)
    {
        return Err(RunError::SourceBufferOverlap {
            path_dir_src,
            path_dir_buffer: absolutize_path(dir_buffer),
        });
    }

    let mut report_run = ReportRun::default();

    tracing::info!("Identifying source files in {}", path_dir_src.display());
    let mut iter_files = walk_files(&path_dir_src, spec_run_options.rule_symlink)?;
    let mut l_paths_src = Vec::new();
    for path_file in iter_files.by_ref() {
        report_run.cnt_walked += 1;
        if spec_name_filter.should_ignore(&path_file) {
            tracing::debug!("Ignored {}", path_file.display());
            report_run.cnt_ignored += 1;
            continue;
        }
        l_paths_src.push(path_file);
    }
    report_run.warnings.extend(iter_files.into_warnings());
    tracing::info!(
        "Found {} files ({} ignored)",
        report_run.cnt_walked,
        report_run.cnt_ignored
    );

    let n_workers_cpu = calculate_cpu_worker_limit();
    let l_source_files = match &spec_run_options.dir_buffer {
        Some(dir_buffer) => {
            let spec_stage_options = SpecStageOptions {
                n_workers_io: calculate_io_worker_limit(spec_run_options.num_workers_io),
                n_workers_cpu,
                if_preserve_metadata: spec_run_options.if_preserve_metadata,
                if_dry_run: spec_run_options.if_dry_run,
            };
            let (l_source_files, report_stage) =
                stage_files(l_paths_src, dir_buffer, spec_stage_options)?;
            tracing::info!("{}", report_stage.format("[BUFFER]"));
            report_run.report_stage = Some(report_stage);
            l_source_files
        }
        None => l_paths_src
            .iter()
            .map(|p| SpecSourceFile::from_source(p))
            .collect(),
    };

    let spec_grouping = build_grouping_index(
        l_source_files,
        metadata_source,
        n_workers_cpu,
        &mut report_run.warnings,
    );
    let grouping_index = spec_grouping.grouping_index;
    report_run.cnt_grouped = grouping_index.cnt_files() as u64;
    report_run.cnt_groups = grouping_index.len() as u64;
    report_run.cnt_unclassifiable = spec_grouping.paths_unclassifiable.len() as u64;
    report_run.paths_unclassifiable = spec_grouping.paths_unclassifiable;
    tracing::info!("{}", report_run.format("[CLASSIFY]"));

    let spec_write_options = SpecWriteOptions {
        path_dir_src,
        n_workers_max: calculate_worker_limit(spec_run_options.num_workers_max),
        if_preserve_metadata: spec_run_options.if_preserve_metadata,
        if_dry_run: spec_run_options.if_dry_run,
    };
    let l_dirs_unique = dedup_destination_roots(dirs_destination, &mut report_run.warnings);
    let grouping_index = &grouping_index;
    let spec_write_options = &spec_write_options;
    report_run.reports_destination = std::thread::scope(|scope| {
        let l_handles: Vec<_> = l_dirs_unique
            .iter()
            .copied()
            .map(|dir_destination| {
                scope.spawn(move || {
                    write_destination(dir_destination, grouping_index, spec_write_options)
                })
            })
            .collect();
        l_handles
            .into_iter()
            .zip(&l_dirs_unique)
            .map(|(handle, dir_destination)| {
                handle.join().unwrap_or_else(|_| {
                    ReportCopy::fatal(
                        &absolutize_path(dir_destination),
                        "Destination worker panicked.".to_string(),
                    )
                })
            })
            .collect()
    });

    tracing::info!("Run finished: {:?}", report_run.status());
    Ok(report_run)
}

/// Keep the first spelling of every destination root; later spellings of the
/// same directory are dropped with a warning so each root has one writer.
fn dedup_destination_roots<'a>(
    dirs_destination: &'a [PathBuf],
    warnings: &mut Vec<String>,
) -> Vec<&'a PathBuf> {
    let mut map_root_to_first: HashMap<PathBuf, &PathBuf> =
        HashMap::with_capacity(dirs_destination.len());
    let mut l_dirs_unique = Vec::with_capacity(dirs_destination.len());
    for dir_destination in dirs_destination {
        let path_root = resolve_root_identity(dir_destination);
        if let Some(dir_first) = map_root_to_first.get(&path_root) {
            let warning = format!(
                "Duplicate destination {} ignored: same directory as {}",
                dir_destination.display(),
                dir_first.display()
            );
            tracing::warn!("{warning}");
            warnings.push(warning);
            continue;
        }
        map_root_to_first.insert(path_root, dir_destination);
        l_dirs_unique.push(dir_destination);
    }
    l_dirs_unique
}
