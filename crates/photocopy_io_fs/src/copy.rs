//! Destination writer: recreate the date hierarchy and copy+verify into it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::group::{GroupKey, GroupingIndex, SpecSourceFile};
use crate::report::{ReportCopy, ReportCopyBuilder, SpecCopyRecord};
use crate::util::{
    SpecWorkerPool, absolutize_path, copy_file_with_metadata, is_nested_within, is_same_file,
    validate_destination_path_safety,
};
use crate::verify::verify_into_record;

/// Per-destination settings shared by every destination of a run.
#[derive(Debug, Clone)]
pub(crate) struct SpecWriteOptions {
    pub(crate) path_dir_src: PathBuf,
    pub(crate) n_workers_max: usize,
    pub(crate) if_preserve_metadata: bool,
    pub(crate) if_dry_run: bool,
}

#[derive(Debug, Clone)]
struct SpecCopyTaskFile {
    path_file_src: PathBuf,
    path_file_dst: PathBuf,
}

struct SpecWriteContext<'a> {
    path_dir_dst: PathBuf,
    spec_write_options: &'a SpecWriteOptions,
    pool: SpecWorkerPool,
    builder_cp_report: ReportCopyBuilder,
}

/// Write every group of `grouping_index` below `dir_destination`.
///
/// Problems with the root itself (cannot be created, is a symlink, lies inside
/// the source tree) abandon this destination and are returned in
/// [`ReportCopy::error_fatal`]. Everything else is recorded per file and the
/// writer carries on with the next file or key.
pub(crate) fn write_destination(
    dir_destination: &Path,
    grouping_index: &GroupingIndex,
    spec_write_options: &SpecWriteOptions,
) -> ReportCopy {
    let path_dir_dst = absolutize_path(dir_destination);
    if let Err(message) = prepare_destination_root(&path_dir_dst, spec_write_options) {
        tracing::warn!(
            "Destination {} abandoned: {message}",
            path_dir_dst.display()
        );
        return ReportCopy::fatal(&path_dir_dst, message);
    }

    let mut warnings = Vec::new();
    let pool = SpecWorkerPool::new(spec_write_options.n_workers_max, "dest-copy", &mut warnings);
    let mut spec_write_ctx = SpecWriteContext {
        builder_cp_report: ReportCopyBuilder::new(&path_dir_dst),
        path_dir_dst,
        spec_write_options,
        pool,
    };
    for warning in warnings {
        spec_write_ctx.builder_cp_report.add_warning(warning);
    }

    tracing::info!(
        "Writing {} groups to {}",
        grouping_index.len(),
        spec_write_ctx.path_dir_dst.display()
    );
    for (group_key, l_source_files) in grouping_index {
        write_group(group_key, l_source_files, &mut spec_write_ctx);
    }

    let report = spec_write_ctx.builder_cp_report.build();
    tracing::info!("{}", report.format("[DEST]"));
    report
}

fn prepare_destination_root(
    path_dir_dst: &Path,
    spec_write_options: &SpecWriteOptions,
) -> Result<(), String> {
    if is_nested_within(path_dir_dst, &spec_write_options.path_dir_src) {
        return Err(format!(
            "Destination lies inside the source tree: {} <-> {}",
            spec_write_options.path_dir_src.display(),
            path_dir_dst.display()
        ));
    }
    if spec_write_options.if_dry_run {
        return Ok(());
    }
    fs::create_dir_all(path_dir_dst).map_err(|e| format!("Failed to create destination: {e}"))?;
    let meta_dir_dst = fs::symlink_metadata(path_dir_dst)
        .map_err(|e| format!("Failed to inspect destination: {e}"))?;
    if meta_dir_dst.file_type().is_symlink() {
        return Err("Destination root path must not be a symbolic link.".to_string());
    }
    Ok(())
}

/// Plan one task per distinct base name; a later file with the same name
/// replaces the earlier one (last write wins) and the replacement is reported.
fn plan_group_tasks(
    path_dir_group: &Path,
    l_source_files: &[SpecSourceFile],
    builder_cp_report: &mut ReportCopyBuilder,
) -> Vec<SpecCopyTaskFile> {
    let mut l_tasks: Vec<SpecCopyTaskFile> = Vec::with_capacity(l_source_files.len());
    let mut map_name_to_idx: HashMap<String, usize> = HashMap::with_capacity(l_source_files.len());

    for spec_source_file in l_source_files {
        let name_file = spec_source_file.name_file();
        let spec_task = SpecCopyTaskFile {
            path_file_src: spec_source_file.path_file_read.clone(),
            path_file_dst: path_dir_group.join(&name_file),
        };
        match map_name_to_idx.get(&name_file) {
            Some(&n_idx) => {
                let warning = format!(
                    "Name collision in {}: {} overwritten by {}",
                    path_dir_group.display(),
                    l_tasks[n_idx].path_file_src.display(),
                    spec_task.path_file_src.display()
                );
                tracing::warn!("{warning}");
                builder_cp_report.add_warning(warning);
                builder_cp_report.add_skipped();
                l_tasks[n_idx] = spec_task;
            }
            None => {
                map_name_to_idx.insert(name_file, l_tasks.len());
                l_tasks.push(spec_task);
            }
        }
    }
    l_tasks
}

fn write_group(
    group_key: &GroupKey,
    l_source_files: &[SpecSourceFile],
    spec_write_ctx: &mut SpecWriteContext<'_>,
) {
    let path_dir_group = spec_write_ctx.path_dir_dst.join(group_key.to_relative_path());
    spec_write_ctx
        .builder_cp_report
        .add_planned(l_source_files.len() as u64);
    let l_tasks = plan_group_tasks(
        &path_dir_group,
        l_source_files,
        &mut spec_write_ctx.builder_cp_report,
    );

    if spec_write_ctx.spec_write_options.if_dry_run {
        for spec_task in &l_tasks {
            tracing::info!(
                "Dry run: would copy {} -> {}",
                spec_task.path_file_src.display(),
                spec_task.path_file_dst.display()
            );
            spec_write_ctx.builder_cp_report.add_skipped();
        }
        return;
    }

    let res_dir = validate_destination_path_safety(&path_dir_group, &spec_write_ctx.path_dir_dst)
        .and_then(|_| {
            if path_dir_group.is_dir() {
                return Ok(false);
            }
            fs::create_dir_all(&path_dir_group)
                .map(|_| true)
                .map_err(|e| format!("Failed to create directory {} ({e})", path_dir_group.display()))
        });
    match res_dir {
        Ok(true) => spec_write_ctx.builder_cp_report.add_dir_created(),
        Ok(false) => {}
        Err(message) => {
            tracing::warn!("{message}");
            fail_group_tasks(l_tasks, &message, spec_write_ctx);
            return;
        }
    }

    flush_file_copy_tasks(l_tasks, spec_write_ctx);
}

fn fail_group_tasks(
    l_tasks: Vec<SpecCopyTaskFile>,
    message: &str,
    spec_write_ctx: &mut SpecWriteContext<'_>,
) {
    for spec_task in l_tasks {
        spec_write_ctx.builder_cp_report.add_record(SpecCopyRecord::failed(
            &spec_task.path_file_src,
            &spec_task.path_file_dst,
            message.to_string(),
        ));
    }
}

fn flush_file_copy_tasks(l_tasks: Vec<SpecCopyTaskFile>, spec_write_ctx: &mut SpecWriteContext<'_>) {
    if l_tasks.is_empty() {
        return;
    }
    let path_dir_dst_root = &spec_write_ctx.path_dir_dst;
    let if_preserve_metadata = spec_write_ctx.spec_write_options.if_preserve_metadata;

    let l_records = spec_write_ctx.pool.map(l_tasks, |spec_task| {
        copy_and_verify(&spec_task, path_dir_dst_root, if_preserve_metadata)
    });
    for spec_record in l_records {
        spec_write_ctx.builder_cp_report.add_record(spec_record);
    }
}

fn copy_and_verify(
    spec_task: &SpecCopyTaskFile,
    path_dir_dst_root: &Path,
    if_preserve_metadata: bool,
) -> SpecCopyRecord {
    let res_copy = validate_destination_path_safety(&spec_task.path_file_dst, path_dir_dst_root)
        .and_then(|_| {
            if is_same_file(&spec_task.path_file_src, &spec_task.path_file_dst) {
                return Err("Destination is the source file itself".to_string());
            }
            copy_file_with_metadata(
                &spec_task.path_file_src,
                &spec_task.path_file_dst,
                if_preserve_metadata,
            )
            .map_err(|e| e.to_string())
        });

    match res_copy {
        Ok(()) => verify_into_record(&spec_task.path_file_src, &spec_task.path_file_dst),
        Err(message) => {
            tracing::warn!(
                "Failed to copy {} -> {} ({message})",
                spec_task.path_file_src.display(),
                spec_task.path_file_dst.display()
            );
            SpecCopyRecord::failed(&spec_task.path_file_src, &spec_task.path_file_dst, message)
        }
    }
}
