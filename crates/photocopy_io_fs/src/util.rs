use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobMatcher};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use regex::Regex;

use crate::spec::{EnumPatternMode, RunError};

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone)]
pub(crate) enum TypeNamePatternSeq {
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

/// Post-walk filter: ignored extensions plus basename exclude patterns.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecNameFilter {
    pub(crate) set_exts_ignore: HashSet<String>,
    pub(crate) patterns_exclude_files: Option<TypeNamePatternSeq>,
}

impl SpecNameFilter {
    pub(crate) fn from_raw(
        exts_ignore: Option<&[String]>,
        patterns_exclude_files: Option<&[String]>,
        rule_pattern: EnumPatternMode,
    ) -> Result<Self, RunError> {
        let set_exts_ignore = exts_ignore
            .unwrap_or_default()
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| !ext.is_empty())
            .collect();
        Ok(Self {
            set_exts_ignore,
            patterns_exclude_files: _compile(patterns_exclude_files, rule_pattern)?,
        })
    }

    pub(crate) fn should_ignore(&self, path_file: &Path) -> bool {
        let Some(name_file) = path_file.file_name().map(|v| v.to_string_lossy()) else {
            return false;
        };
        if !self.set_exts_ignore.is_empty()
            && let Some((_, ext)) = name_file.rsplit_once('.')
            && self.set_exts_ignore.contains(&ext.to_lowercase())
        {
            return true;
        }
        _is_pattern_matching(&name_file, self.patterns_exclude_files.as_ref())
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

fn _compile(
    patterns: Option<&[String]>,
    rule_pattern: EnumPatternMode,
) -> Result<Option<TypeNamePatternSeq>, RunError> {
    let Some(patterns) = patterns else {
        return Ok(None);
    };
    if patterns.is_empty() {
        return Ok(None);
    }

    match rule_pattern {
        EnumPatternMode::Literal => Ok(Some(TypeNamePatternSeq::Literal(patterns.to_vec()))),
        EnumPatternMode::Glob => {
            let mut l_glob = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let matcher = Glob::new(pattern)
                    .map_err(|e| {
                        RunError::InvalidPattern(format!("Invalid pattern in exclude: {e}"))
                    })?
                    .compile_matcher();
                l_glob.push(matcher);
            }
            Ok(Some(TypeNamePatternSeq::Glob(l_glob)))
        }
        EnumPatternMode::Regex => {
            let mut l_regex = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex = Regex::new(pattern).map_err(|e| {
                    RunError::InvalidPattern(format!("Invalid pattern in exclude: {e}"))
                })?;
                l_regex.push(regex);
            }
            Ok(Some(TypeNamePatternSeq::Regex(l_regex)))
        }
    }
}

fn _is_pattern_matching(value: &str, patterns: Option<&TypeNamePatternSeq>) -> bool {
    match patterns {
        None => false,
        Some(TypeNamePatternSeq::Literal(v)) => v.iter().any(|p| value.contains(p)),
        Some(TypeNamePatternSeq::Glob(v)) => v.iter().any(|p| p.is_match(value)),
        Some(TypeNamePatternSeq::Regex(v)) => v.iter().any(|p| p.is_match(value)),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

fn _is_relative_to_base(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

fn _normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    _normalize_lexically(&absolutize_path(path))
}

/// Drop `.` and fold `..` without touching the filesystem.
fn _normalize_lexically(path: &Path) -> PathBuf {
    let mut path_out = PathBuf::new();
    for part in path.components() {
        match part {
            Component::CurDir => {}
            Component::ParentDir => {
                path_out.pop();
            }
            _ => path_out.push(part.as_os_str()),
        }
    }
    path_out
}

/// Identity of a directory root: canonical when it exists, lexically
/// normalized otherwise.
pub(crate) fn resolve_root_identity(path: &Path) -> PathBuf {
    _normalize_path(path)
}

/// `true` when `path` is `base` or lies below it.
pub(crate) fn is_nested_within(path: &Path, base: &Path) -> bool {
    _is_relative_to_base(&_normalize_path(path), &_normalize_path(base))
}

/// `true` when both paths name the same existing file.
#[cfg(unix)]
pub(crate) fn is_same_file(path_a: &Path, path_b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(path_a), fs::metadata(path_b)) {
        (Ok(stat_a), Ok(stat_b)) => stat_a.dev() == stat_b.dev() && stat_a.ino() == stat_b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
pub(crate) fn is_same_file(path_a: &Path, path_b: &Path) -> bool {
    match (fs::canonicalize(path_a), fs::canonicalize(path_b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

pub(crate) fn absolutize_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

pub(crate) fn is_overlap(src: &Path, dst: &Path) -> bool {
    let src_resolved = _normalize_path(src);
    let dst_resolved = _normalize_path(dst);
    _is_relative_to_base(&dst_resolved, &src_resolved)
        || _is_relative_to_base(&src_resolved, &dst_resolved)
}

pub(crate) fn validate_destination_path_safety(
    path_dst_item: &Path,
    path_dir_dst_root: &Path,
) -> Result<(), String> {
    let path_dir_dst_root_abs = absolutize_path(path_dir_dst_root);
    let path_dst_item_abs = absolutize_path(path_dst_item);

    let path_parent_dst = path_dst_item_abs.parent().ok_or_else(|| {
        format!(
            "Failed to derive parent directory: {}",
            path_dst_item.display()
        )
    })?;
    let path_parent_rel = path_parent_dst
        .strip_prefix(&path_dir_dst_root_abs)
        .map_err(|_| {
            format!(
                "Unsafe destination path escapes destination root: {} (root={})",
                path_dst_item.display(),
                path_dir_dst_root.display()
            )
        })?;

    let mut path_cursor = path_dir_dst_root_abs.clone();
    for part_rel in path_parent_rel.components() {
        path_cursor.push(part_rel.as_os_str());
        match fs::symlink_metadata(&path_cursor) {
            Ok(meta_cursor) => {
                if meta_cursor.file_type().is_symlink() {
                    return Err(format!(
                        "Unsafe destination path traverses symlink component: {}",
                        path_cursor.display()
                    ));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(format!(
                    "Failed to inspect destination path component {} ({e})",
                    path_cursor.display()
                ));
            }
        }
    }

    match fs::symlink_metadata(&path_dst_item_abs) {
        Ok(meta_dst_item) => {
            if meta_dst_item.file_type().is_symlink() {
                return Err(format!(
                    "Unsafe destination path is an existing symlink: {}",
                    path_dst_item.display()
                ));
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(format!(
                "Failed to inspect destination path {} ({e})",
                path_dst_item.display()
            ));
        }
    }

    Ok(())
}

/// Base name of `path` as text, empty when the path has none.
pub(crate) fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FileCopy

pub(crate) fn copy_file_with_metadata(
    path_file_src: &Path,
    path_file_dst: &Path,
    if_preserve_metadata: bool,
) -> Result<(), io::Error> {
    fs::copy(path_file_src, path_file_dst)?;
    #[cfg(target_os = "linux")]
    {
        if if_preserve_metadata {
            apply_metadata_linux(path_file_src, path_file_dst)?;
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = if_preserve_metadata;
    Ok(())
}

#[cfg(target_os = "linux")]
fn apply_metadata_linux(path_file_src: &Path, path_file_dst: &Path) -> Result<(), io::Error> {
    use filetime::{FileTime, set_file_times};

    let stat_src = fs::metadata(path_file_src)?;
    fs::set_permissions(path_file_dst, stat_src.permissions())?;

    let file_time_access = FileTime::from_last_access_time(&stat_src);
    let file_time_modify = FileTime::from_last_modification_time(&stat_src);
    set_file_times(path_file_dst, file_time_access, file_time_modify)?;

    copy_xattrs_linux(path_file_src, path_file_dst);
    Ok(())
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_file_src: &Path, path_file_dst: &Path) {
    let iter_xattr_names = match xattr::list(path_file_src) {
        Ok(v) => v,
        Err(_) => return,
    };

    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_file_src, &name).ok().flatten() else {
            continue;
        };
        let _ = xattr::set(path_file_dst, &name, &raw_value);
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WorkerPools

fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1)
}

/// Copy+verify workers per destination.
pub(crate) fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = available_cpus();

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

/// Buffer copy workers. Copying is I/O bound so this may exceed the CPU count,
/// but stays bounded to keep file descriptor usage in check.
pub(crate) fn calculate_io_worker_limit(num_workers_io: Option<usize>) -> usize {
    match num_workers_io {
        Some(n) => n.clamp(1, 64),
        None => (available_cpus() * 2).clamp(1, 16),
    }
}

/// Hashing and classification workers.
pub(crate) fn calculate_cpu_worker_limit() -> usize {
    available_cpus().max(1)
}

/// Bounded rayon pool with a serial fallback.
///
/// Every `map`/`for_each_with` call returns only once all items are done, so
/// each call is a barrier join.
pub(crate) struct SpecWorkerPool {
    pool: Option<ThreadPool>,
}

impl SpecWorkerPool {
    /// Build a pool of `n_workers` threads; on failure a warning is pushed and
    /// work runs serially on the calling thread.
    pub(crate) fn new(n_workers: usize, c_label: &str, warnings: &mut Vec<String>) -> Self {
        if n_workers <= 1 {
            return Self { pool: None };
        }
        match ThreadPoolBuilder::new()
            .num_threads(n_workers)
            .thread_name({
                let c_label = c_label.to_string();
                move |n_idx| format!("{c_label}-{n_idx}")
            })
            .build()
        {
            Ok(pool) => Self { pool: Some(pool) },
            Err(e) => {
                let warning = format!(
                    "Failed to initialize {c_label} thread pool (workers={n_workers}); fallback to serial ({e})."
                );
                tracing::warn!("{warning}");
                warnings.push(warning);
                Self { pool: None }
            }
        }
    }

    /// Apply `f` to every item, preserving input order in the output.
    pub(crate) fn map<T, R, F>(&self, l_items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        match &self.pool {
            None => l_items.into_iter().map(f).collect(),
            Some(pool) => pool.install(|| l_items.into_par_iter().map(f).collect()),
        }
    }

    /// Feed every item to `f` together with a per-worker clone of `init`.
    pub(crate) fn for_each_with<T, S, F>(&self, l_items: Vec<T>, init: S, f: F)
    where
        T: Send,
        S: Send + Clone,
        F: Fn(&mut S, T) + Sync + Send,
    {
        match &self.pool {
            None => {
                let mut state = init;
                for item in l_items {
                    f(&mut state, item);
                }
            }
            Some(pool) => pool.install(|| l_items.into_par_iter().for_each_with(init, f)),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
