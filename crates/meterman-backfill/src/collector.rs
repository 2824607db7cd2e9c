// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! CSV file discovery
//!
//! The meter logger writes one file per day as `YYYY/MM/YYYY-MM-DD`, so the
//! lexical order of full paths is also the chronological order.

use crate::error::{BackfillError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every regular file below `root`, sorted by full path.
///
/// Any walk error, including a missing root, aborts the collection.
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|source| BackfillError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    tracing::debug!("Found {} files under {}", files.len(), root.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collects_nested_files_in_path_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("2022/08")).unwrap();
        fs::create_dir_all(root.join("2022/07")).unwrap();
        fs::write(root.join("2022/08/2022-08-01"), b"").unwrap();
        fs::write(root.join("2022/07/2022-07-31"), b"").unwrap();
        fs::write(root.join("2022/07/2022-07-30"), b"").unwrap();

        let files = collect_files(root).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("2022/07/2022-07-30"),
                PathBuf::from("2022/07/2022-07-31"),
                PathBuf::from("2022/08/2022-08-01"),
            ]
        );
    }

    #[test]
    fn test_directories_are_not_listed() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("empty/nested")).unwrap();
        assert!(collect_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = collect_files(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, BackfillError::Walk { .. }));
    }
}
