use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};

use super::model::SpectralCurve;

// ---------------------------------------------------------------------------
// Replicate grouping
// ---------------------------------------------------------------------------

/// One batch of replicate acquisitions of a single target: ordered
/// (source path, decoded curve) pairs.
#[derive(Debug, Clone)]
pub struct ReplicateGroup {
    pub members: Vec<(PathBuf, SpectralCurve)>,
}

impl ReplicateGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The curves in acquisition order, for the selector.
    pub fn curves(&self) -> Vec<SpectralCurve> {
        self.members.iter().map(|(_, c)| c.clone()).collect()
    }
}

/// Partition the regular files of `dir`, sorted by file name, into
/// consecutive chunks of `group_size`.  A trailing incomplete chunk is
/// dropped: it cannot form a full replicate group.
pub fn list_groups(dir: &Path, group_size: usize) -> Result<Vec<Vec<PathBuf>>> {
    ensure!(group_size > 0, "group size must be at least 1");

    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("listing {}", dir.display()))?
        .into_iter()
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let paths: Vec<PathBuf> = entries.iter().map(|e| e.path()).collect();
    Ok(paths
        .chunks_exact(group_size)
        .map(|chunk| chunk.to_vec())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn groups_are_sorted_and_trailing_chunk_dropped() {
        let dir = tempfile::tempdir().unwrap();
        // Created out of order on purpose; 23 files with group size 10
        // must yield 2 groups and drop the last 3 files.
        for i in (0..23).rev() {
            touch(dir.path(), &format!("scan{i:03}"));
        }
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let groups = list_groups(dir.path(), 10).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 10);
        assert_eq!(
            groups[0][0].file_name().unwrap().to_str().unwrap(),
            "scan000"
        );
        assert_eq!(
            groups[1][9].file_name().unwrap().to_str().unwrap(),
            "scan019"
        );
    }

    #[test]
    fn fewer_files_than_group_size_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..7 {
            touch(dir.path(), &format!("scan{i:03}"));
        }
        assert!(list_groups(dir.path(), 10).unwrap().is_empty());
    }

    #[test]
    fn zero_group_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_groups(dir.path(), 0).is_err());
    }
}
