//! Files and directories that change most often.

use crate::facts::FileChange;
use crate::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

pub const TOP_FILES: usize = 20;
pub const TOP_DIRECTORIES: usize = 10;

/// Directory reported for files at the repository root.
const ROOT_DIRECTORY: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHotspot {
    pub path: String,

    /// Distinct pull requests touching the file.
    pub pr_count: u64,

    /// Changed lines summed over those pull requests.
    pub changes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryHotspot {
    pub path: String,

    /// Distinct pull requests touching at least one file in the directory.
    pub pr_count: u64,

    /// Distinct files touched in the directory.
    pub file_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotspots {
    pub prs_analyzed: u64,
    pub prs_without_files: u64,
    pub files: Vec<FileHotspot>,
    pub directories: Vec<DirectoryHotspot>,
}

fn parent_directory(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir,
        _ => ROOT_DIRECTORY,
    }
}

/// Entries keyed by path, remembering the order in which paths were first seen.
#[derive(Debug)]
struct Tally<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Tally<T> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::default(),
        }
    }

    fn entry(&mut self, path: &str, make: impl FnOnce() -> T) -> &mut T {
        let slot = match self.index.get(path) {
            Some(&slot) => slot,
            None => {
                self.entries.push(make());
                let _ = self.index.insert(path.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[slot]
    }
}

/// Aggregate changed-file listings of merged pull requests into hotspots.
///
/// Rankings are by descending pull request count; ties keep first-seen order.
#[must_use]
pub fn compute_hotspots(per_pull: &[(u64, Vec<FileChange>)]) -> Hotspots {
    let mut files: Tally<FileHotspot> = Tally::new();
    let mut directories: Tally<(DirectoryHotspot, HashSet<String>)> = Tally::new();
    let mut prs_without_files = 0;

    for (_, changes) in per_pull {
        if changes.is_empty() {
            prs_without_files += 1;
            continue;
        }

        let mut seen_files: HashSet<&str> = HashSet::default();
        let mut seen_directories: HashSet<&str> = HashSet::default();

        for change in changes {
            let path = change.filename.as_str();
            if !seen_files.insert(path) {
                continue;
            }

            let file = files.entry(path, || FileHotspot {
                path: path.to_string(),
                pr_count: 0,
                changes: 0,
            });
            file.pr_count += 1;
            file.changes += change.changes;

            let dir = parent_directory(path);
            let (directory, dir_files) = directories.entry(dir, || {
                (
                    DirectoryHotspot {
                        path: dir.to_string(),
                        pr_count: 0,
                        file_count: 0,
                    },
                    HashSet::default(),
                )
            });

            if seen_directories.insert(dir) {
                directory.pr_count += 1;
            }
            if dir_files.insert(path.to_string()) {
                directory.file_count += 1;
            }
        }
    }

    let mut files = files.entries;
    files.sort_by(|a, b| b.pr_count.cmp(&a.pr_count));
    files.truncate(TOP_FILES);

    let mut directories: Vec<DirectoryHotspot> = directories.entries.into_iter().map(|(d, _)| d).collect();
    directories.sort_by(|a, b| b.pr_count.cmp(&a.pr_count));
    directories.truncate(TOP_DIRECTORIES);

    Hotspots {
        prs_analyzed: per_pull.len() as u64,
        prs_without_files,
        files,
        directories,
    }
}
