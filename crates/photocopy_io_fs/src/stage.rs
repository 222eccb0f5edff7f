//! Optional flat staging of source files into a fast local buffer.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::group::SpecSourceFile;
use crate::report::{ReportCopy, ReportCopyBuilder, SpecCopyRecord};
use crate::spec::RunError;
use crate::util::{
    SpecWorkerPool, absolutize_path, copy_file_with_metadata, file_name_lossy,
    validate_destination_path_safety,
};
use crate::verify::verify_into_record;

/// Worker counts and copy behavior for [`stage_files`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpecStageOptions {
    pub(crate) n_workers_io: usize,
    pub(crate) n_workers_cpu: usize,
    pub(crate) if_preserve_metadata: bool,
    pub(crate) if_dry_run: bool,
}

#[derive(Debug, Clone)]
struct SpecStageTask {
    path_file_src: PathBuf,
    path_file_buffer: PathBuf,
}

/// Pick one flat file name per source path; repeated base names get a `~N`
/// suffix before the extension.
pub(crate) fn plan_buffer_names(l_paths_src: &[PathBuf]) -> Vec<String> {
    let mut set_names_claimed: HashSet<String> = HashSet::with_capacity(l_paths_src.len());
    let mut l_names = Vec::with_capacity(l_paths_src.len());

    for path_file_src in l_paths_src {
        let name_file = file_name_lossy(path_file_src);
        let name_unique = if set_names_claimed.contains(&name_file) {
            let (c_stem, c_ext) = match name_file.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{ext}")),
                _ => (name_file.clone(), String::new()),
            };
            let mut n_suffix = 1_usize;
            loop {
                let name_candidate = format!("{c_stem}~{n_suffix}{c_ext}");
                if !set_names_claimed.contains(&name_candidate) {
                    break name_candidate;
                }
                n_suffix += 1;
            }
        } else {
            name_file
        };
        set_names_claimed.insert(name_unique.clone());
        l_names.push(name_unique);
    }
    l_names
}

/// Copy every source file once into `dir_buffer`, then verify each buffer copy
/// against its original.
///
/// Both phases are barrier-joined before returning. The returned list has one
/// entry per input path, in input order: the buffer copy when it was written,
/// the original path otherwise. Buffer verification never removes a file from
/// the list.
pub(crate) fn stage_files(
    l_paths_src: Vec<PathBuf>,
    dir_buffer: &Path,
    spec_stage_options: SpecStageOptions,
) -> Result<(Vec<SpecSourceFile>, ReportCopy), RunError> {
    let path_dir_buffer = absolutize_path(dir_buffer);
    let mut builder_stage_report = ReportCopyBuilder::new(&path_dir_buffer);
    builder_stage_report.add_planned(l_paths_src.len() as u64);

    if spec_stage_options.if_dry_run {
        tracing::info!(
            "Dry run: would stage {} files in {}",
            l_paths_src.len(),
            path_dir_buffer.display()
        );
        for _ in &l_paths_src {
            builder_stage_report.add_skipped();
        }
        let l_source_files = l_paths_src
            .iter()
            .map(|p| SpecSourceFile::from_source(p))
            .collect();
        return Ok((l_source_files, builder_stage_report.build()));
    }

    fs::create_dir_all(&path_dir_buffer).map_err(|e| RunError::BufferInitFailed {
        path: path_dir_buffer.clone(),
        message: e.to_string(),
    })?;

    let l_tasks: Vec<SpecStageTask> = plan_buffer_names(&l_paths_src)
        .into_iter()
        .zip(l_paths_src)
        .map(|(name_buffer, path_file_src)| SpecStageTask {
            path_file_buffer: path_dir_buffer.join(name_buffer),
            path_file_src,
        })
        .collect();

    tracing::info!(
        "Copying {} files to buffer {}",
        l_tasks.len(),
        path_dir_buffer.display()
    );
    let mut warnings = Vec::new();
    let pool_io = SpecWorkerPool::new(spec_stage_options.n_workers_io, "stage-copy", &mut warnings);
    let l_copied: Vec<(SpecStageTask, Result<(), String>)> = pool_io.map(l_tasks, |spec_task| {
        let res_copy = validate_destination_path_safety(&spec_task.path_file_buffer, &path_dir_buffer)
            .and_then(|_| {
                copy_file_with_metadata(
                    &spec_task.path_file_src,
                    &spec_task.path_file_buffer,
                    spec_stage_options.if_preserve_metadata,
                )
                .map_err(|e| e.to_string())
            });
        (spec_task, res_copy)
    });
    drop(pool_io);

    let mut l_source_files = Vec::with_capacity(l_copied.len());
    let mut l_tasks_verify = Vec::with_capacity(l_copied.len());
    for (spec_task, res_copy) in l_copied {
        match res_copy {
            Ok(()) => {
                l_source_files.push(SpecSourceFile {
                    path_file_read: spec_task.path_file_buffer.clone(),
                    path_file_origin: spec_task.path_file_src.clone(),
                });
                l_tasks_verify.push(spec_task);
            }
            Err(message) => {
                tracing::warn!(
                    "Failed to stage {} ({message}); reading it from the source instead",
                    spec_task.path_file_src.display()
                );
                builder_stage_report.add_record(SpecCopyRecord::failed(
                    &spec_task.path_file_src,
                    &spec_task.path_file_buffer,
                    message,
                ));
                l_source_files.push(SpecSourceFile::from_source(&spec_task.path_file_src));
            }
        }
    }

    tracing::info!("Verifying {} buffer copies", l_tasks_verify.len());
    let pool_cpu =
        SpecWorkerPool::new(spec_stage_options.n_workers_cpu, "stage-verify", &mut warnings);
    let l_records = pool_cpu.map(l_tasks_verify, |spec_task| {
        verify_into_record(&spec_task.path_file_src, &spec_task.path_file_buffer)
    });
    for spec_record in l_records {
        builder_stage_report.add_record(spec_record);
    }
    for warning in warnings {
        builder_stage_report.add_warning(warning);
    }

    Ok((l_source_files, builder_stage_report.build()))
}
