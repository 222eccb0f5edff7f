//! Lazy recursive enumeration of regular files under a source root.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::spec::{EnumWalkSymlinkStrategy, RunError};
use crate::util::absolutize_path;

/// Iterator over every regular file reachable from a root directory.
///
/// Directories are opened one at a time as the iterator advances. Anything that
/// cannot be read is skipped and recorded in [`IterTreeFiles::warnings`]; the
/// walk itself never fails once started. No ordering is guaranteed.
#[derive(Debug)]
pub struct IterTreeFiles {
    rule_symlink: EnumWalkSymlinkStrategy,
    l_dirs_pending: Vec<PathBuf>,
    iter_entries_current: Option<(PathBuf, fs::ReadDir)>,
    set_visited_dirs: HashSet<(u64, u64)>,
    warnings: Vec<String>,
}

/// Start a walk below `dir_root`.
///
/// Fails only when the root itself is not a readable directory.
pub fn walk_files<P: AsRef<Path>>(
    dir_root: P,
    rule_symlink: EnumWalkSymlinkStrategy,
) -> Result<IterTreeFiles, RunError> {
    let path_dir_root = absolutize_path(dir_root.as_ref());
    if !path_dir_root.is_dir() {
        return Err(RunError::SourceNotDirectory(path_dir_root));
    }
    let iter_entries = fs::read_dir(&path_dir_root).map_err(|e| RunError::SourceUnreadable {
        path: path_dir_root.clone(),
        message: e.to_string(),
    })?;

    let mut iter_files = IterTreeFiles {
        rule_symlink,
        l_dirs_pending: Vec::new(),
        iter_entries_current: None,
        set_visited_dirs: HashSet::new(),
        warnings: Vec::new(),
    };
    iter_files.mark_visited(&path_dir_root);
    iter_files.iter_entries_current = Some((path_dir_root, iter_entries));
    Ok(iter_files)
}

impl IterTreeFiles {
    /// Warnings collected so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }

    fn add_warning(&mut self, warning: String) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Record a directory identity; `false` when it was already walked.
    #[cfg(unix)]
    fn mark_visited(&mut self, path_dir: &Path) -> bool {
        use std::os::unix::fs::MetadataExt;

        match fs::metadata(path_dir) {
            Ok(stat_dir) => self.set_visited_dirs.insert((stat_dir.dev(), stat_dir.ino())),
            Err(_) => true,
        }
    }

    #[cfg(not(unix))]
    fn mark_visited(&mut self, _path_dir: &Path) -> bool {
        true
    }

    fn open_next_dir(&mut self) -> bool {
        while let Some(path_dir) = self.l_dirs_pending.pop() {
            match fs::read_dir(&path_dir) {
                Ok(iter_entries) => {
                    self.iter_entries_current = Some((path_dir, iter_entries));
                    return true;
                }
                Err(e) => {
                    self.add_warning(format!(
                        "Failed to read directory {} ({e})",
                        path_dir.display()
                    ));
                }
            }
        }
        false
    }

    /// Decide what to do with one entry; `Some` when it is a file to yield.
    fn handle_entry(&mut self, entry: fs::DirEntry) -> Option<PathBuf> {
        let path_entry = entry.path();
        let cfg_file_type = match entry.file_type() {
            Ok(v) => v,
            Err(e) => {
                self.add_warning(format!("Failed to inspect {} ({e})", path_entry.display()));
                return None;
            }
        };

        if cfg_file_type.is_symlink() {
            if self.rule_symlink == EnumWalkSymlinkStrategy::Skip {
                tracing::debug!("Symlink skipped: {}", path_entry.display());
                return None;
            }
            let meta_target = match fs::metadata(&path_entry) {
                Ok(v) => v,
                Err(e) => {
                    self.add_warning(format!(
                        "Broken symlink: {} ({e})",
                        path_entry.display()
                    ));
                    return None;
                }
            };
            if meta_target.is_dir() {
                if self.mark_visited(&path_entry) {
                    self.l_dirs_pending.push(path_entry);
                } else {
                    self.add_warning(format!("Symlink loop detected: {}", path_entry.display()));
                }
                return None;
            }
            if meta_target.is_file() {
                return Some(path_entry);
            }
            self.add_warning(format!(
                "Special file target skipped: {}",
                path_entry.display()
            ));
            return None;
        }

        if cfg_file_type.is_dir() {
            if self.rule_symlink == EnumWalkSymlinkStrategy::Follow
                && !self.mark_visited(&path_entry)
            {
                self.add_warning(format!("Symlink loop detected: {}", path_entry.display()));
                return None;
            }
            self.l_dirs_pending.push(path_entry);
            return None;
        }
        if cfg_file_type.is_file() {
            return Some(path_entry);
        }

        self.add_warning(format!("Special file skipped: {}", path_entry.display()));
        None
    }
}

impl Iterator for IterTreeFiles {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            if self.iter_entries_current.is_none() && !self.open_next_dir() {
                return None;
            }
            let Some((path_dir, iter_entries)) = self.iter_entries_current.as_mut() else {
                return None;
            };

            match iter_entries.next() {
                Some(Ok(entry)) => {
                    if let Some(path_file) = self.handle_entry(entry) {
                        return Some(path_file);
                    }
                }
                Some(Err(e)) => {
                    let warning = format!(
                        "Failed to read directory entry under {} ({e})",
                        path_dir.display()
                    );
                    self.add_warning(warning);
                }
                None => self.iter_entries_current = None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    use super::walk_files;
    use crate::spec::{EnumWalkSymlinkStrategy, RunError};
    use crate::testing::{TestDir, write_text};

    fn collect(iter: impl Iterator<Item = PathBuf>) -> BTreeSet<PathBuf> {
        iter.collect()
    }

    #[test]
    fn walk_files_yields_every_regular_file() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("root.jpg"), "r");
        write_text(&src.join("a/one.jpg"), "1");
        write_text(&src.join("a/b/c/two.jpg"), "2");
        std::fs::create_dir_all(src.join("empty")).expect("mkdir empty");

        let mut iter_files = walk_files(&src, EnumWalkSymlinkStrategy::Skip).expect("walk");
        let set_files = collect(iter_files.by_ref());

        let expected: BTreeSet<PathBuf> = [
            src.join("root.jpg"),
            src.join("a/one.jpg"),
            src.join("a/b/c/two.jpg"),
        ]
        .into_iter()
        .collect();
        assert_eq!(set_files, expected);
        assert!(set_files.iter().all(|p| p.is_absolute()));
        assert!(iter_files.warnings().is_empty());
    }

    #[test]
    fn walk_files_rejects_missing_root() {
        let tmp = TestDir::new();
        let err = walk_files(tmp.path().join("missing"), EnumWalkSymlinkStrategy::Skip)
            .expect_err("missing root must fail");
        assert!(matches!(err, RunError::SourceNotDirectory(_)));
    }

    #[cfg(unix)]
    #[test]
    fn walk_files_symlink_strategies() {
        use std::os::unix::fs::symlink;

        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        let outside = tmp.path().join("outside");
        write_text(&src.join("a.jpg"), "a");
        write_text(&outside.join("b.jpg"), "b");
        symlink(&outside, src.join("linked_dir")).expect("dir symlink");
        symlink(src.join("a.jpg"), src.join("alias.jpg")).expect("file symlink");
        symlink(tmp.path().join("gone.jpg"), src.join("broken.jpg")).expect("broken symlink");

        let set_skip = collect(walk_files(&src, EnumWalkSymlinkStrategy::Skip).expect("walk"));
        assert_eq!(set_skip, [src.join("a.jpg")].into_iter().collect());

        let mut iter_follow = walk_files(&src, EnumWalkSymlinkStrategy::Follow).expect("walk");
        let set_follow = collect(iter_follow.by_ref());
        assert!(set_follow.contains(&src.join("a.jpg")));
        assert!(set_follow.contains(&src.join("alias.jpg")));
        assert!(set_follow.contains(&src.join("linked_dir/b.jpg")));
        assert!(!set_follow.contains(&src.join("broken.jpg")));
        assert!(
            iter_follow
                .warnings()
                .iter()
                .any(|w| w.contains("Broken symlink"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn walk_files_detects_symlink_loop() {
        use std::os::unix::fs::symlink;

        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("sub/a.jpg"), "a");
        symlink(&src, src.join("sub/back")).expect("loop symlink");

        let mut iter_files = walk_files(&src, EnumWalkSymlinkStrategy::Follow).expect("walk");
        let set_files = collect(iter_files.by_ref());
        assert_eq!(set_files, [src.join("sub/a.jpg")].into_iter().collect());
        assert!(
            iter_files
                .warnings()
                .iter()
                .any(|w| w.contains("Symlink loop detected"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn walk_files_skips_unreadable_subtree() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("ok/a.jpg"), "a");
        write_text(&src.join("locked/b.jpg"), "b");
        let path_locked = src.join("locked");
        std::fs::set_permissions(&path_locked, std::fs::Permissions::from_mode(0o000))
            .expect("lock dir");
        // Root ignores directory permissions; nothing to assert in that case.
        let b_if_enforced = std::fs::read_dir(&path_locked).is_err();

        let mut iter_files = walk_files(&src, EnumWalkSymlinkStrategy::Skip).expect("walk");
        let set_files = collect(iter_files.by_ref());
        std::fs::set_permissions(&path_locked, std::fs::Permissions::from_mode(0o755))
            .expect("unlock dir");

        assert!(set_files.contains(&src.join("ok/a.jpg")));
        if b_if_enforced {
            assert!(!set_files.contains(&src.join("locked/b.jpg")));
            assert!(
                iter_files
                    .warnings()
                    .iter()
                    .any(|w| w.contains("Failed to read directory"))
            );
        }
    }
}
