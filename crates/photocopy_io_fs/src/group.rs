//! Grouping keys and the read-only index consumed by destination writers.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use chrono::{Datelike, NaiveDateTime};

use crate::classify::{EnumClassifyOutcome, MetadataSource, classify_file};
use crate::util::{SpecWorkerPool, file_name_lossy};

////////////////////////////////////////////////////////////////////////////////
// #region Models

/// Composite `(year, month, day, type)` key naming one destination subdirectory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub type_tag: String,
}

impl GroupKey {
    pub fn from_capture(dt_capture: &NaiveDateTime, type_tag: String) -> Self {
        Self {
            year: dt_capture.year(),
            month: dt_capture.month(),
            day: dt_capture.day(),
            type_tag,
        }
    }

    /// `year/month/day/type`, numbers without zero-padding.
    pub fn to_relative_path(&self) -> PathBuf {
        let mut path_rel = PathBuf::new();
        path_rel.push(self.year.to_string());
        path_rel.push(self.month.to_string());
        path_rel.push(self.day.to_string());
        if !self.type_tag.is_empty() {
            path_rel.push(&self.type_tag);
        }
        path_rel
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.year, self.month, self.day, self.type_tag
        )
    }
}

/// One file travelling through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSourceFile {
    /// Where the bytes are read from (buffer copy when staged).
    pub path_file_read: PathBuf,
    /// The file as found in the source tree.
    pub path_file_origin: PathBuf,
}

impl SpecSourceFile {
    /// A file read straight from the source tree.
    pub fn from_source(path_file: &Path) -> Self {
        Self {
            path_file_read: path_file.to_path_buf(),
            path_file_origin: path_file.to_path_buf(),
        }
    }

    /// Base name used at every destination.
    pub fn name_file(&self) -> String {
        file_name_lossy(&self.path_file_origin)
    }
}

/// Mapping from [`GroupKey`] to the files sharing it, in arrival order.
///
/// Built once per run and never mutated afterwards, so it is shared by plain
/// reference between destination workers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingIndex {
    map_groups: BTreeMap<GroupKey, Vec<SpecSourceFile>>,
}

impl GroupingIndex {
    pub fn get(&self, group_key: &GroupKey) -> Option<&[SpecSourceFile]> {
        self.map_groups.get(group_key).map(Vec::as_slice)
    }

    /// Groups in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, GroupKey, Vec<SpecSourceFile>> {
        self.map_groups.iter()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.map_groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map_groups.is_empty()
    }

    /// Number of files across all keys.
    pub fn cnt_files(&self) -> usize {
        self.map_groups.values().map(Vec::len).sum()
    }
}

impl<'a> IntoIterator for &'a GroupingIndex {
    type Item = (&'a GroupKey, &'a Vec<SpecSourceFile>);
    type IntoIter = btree_map::Iter<'a, GroupKey, Vec<SpecSourceFile>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Builder

/// Single-owner reducer over classification results.
#[derive(Debug, Default)]
pub struct GroupingIndexBuilder {
    map_groups: BTreeMap<GroupKey, Vec<SpecSourceFile>>,
    paths_unclassifiable: Vec<PathBuf>,
}

impl GroupingIndexBuilder {
    /// Accept one result; any arrival order is fine.
    pub fn add(&mut self, spec_source_file: SpecSourceFile, outcome: EnumClassifyOutcome) {
        match outcome {
            EnumClassifyOutcome::Grouped(group_key) => {
                self.map_groups
                    .entry(group_key)
                    .or_default()
                    .push(spec_source_file);
            }
            EnumClassifyOutcome::Unclassifiable { .. } => {
                self.paths_unclassifiable
                    .push(spec_source_file.path_file_origin);
            }
        }
    }

    pub fn build(self) -> SpecGrouping {
        SpecGrouping {
            grouping_index: GroupingIndex {
                map_groups: self.map_groups,
            },
            paths_unclassifiable: self.paths_unclassifiable,
        }
    }
}

/// Classification phase output: the index plus the files left out of it.
#[derive(Debug, Clone, Default)]
pub struct SpecGrouping {
    pub grouping_index: GroupingIndex,
    /// Original paths of files without a usable capture timestamp.
    pub paths_unclassifiable: Vec<PathBuf>,
}

/// Classify every file on a pool of `n_workers` threads and reduce the results
/// into a [`SpecGrouping`] on the calling thread.
///
/// Workers only send over a channel; the reducer is the sole owner of the map.
pub(crate) fn build_grouping_index(
    l_source_files: Vec<SpecSourceFile>,
    metadata_source: &dyn MetadataSource,
    n_workers: usize,
    warnings: &mut Vec<String>,
) -> SpecGrouping {
    let pool = SpecWorkerPool::new(n_workers, "classify", warnings);
    let (sender, receiver) = mpsc::channel::<(SpecSourceFile, EnumClassifyOutcome)>();
    let mut builder = GroupingIndexBuilder::default();

    std::thread::scope(|scope| {
        let pool = &pool;
        scope.spawn(move || {
            pool.for_each_with(l_source_files, sender, |sender, spec_source_file| {
                let outcome = classify_file(&spec_source_file, metadata_source);
                let _ = sender.send((spec_source_file, outcome));
            });
        });
        for (spec_source_file, outcome) in receiver {
            builder.add(spec_source_file, outcome);
        }
    });

    builder.build()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
