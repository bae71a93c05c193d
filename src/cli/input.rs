//! Input discovery for the CLI
//!
//! Expands the command-line paths into the ordered list of files to import.
//! Plain files are taken as given, directories are walked recursively and
//! anything else is treated as a glob pattern.

use anyhow::{Context, Result};
use glob::MatchOptions;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Expand files, directories and glob patterns into a de-duplicated file list.
///
/// Order follows the arguments; files found in a directory are sorted by
/// name so repeated runs import in the same order.
pub fn collect_input_files(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        let path = Path::new(input);
        if path.is_file() {
            files.push(path.to_path_buf());
        } else if path.is_dir() {
            walk_directory(path, &mut files)?;
        } else if is_glob_pattern(input) {
            expand_pattern(input, &mut files)?;
        } else {
            anyhow::bail!("Input path does not exist: {}", input);
        }
    }

    let mut seen = HashSet::new();
    files.retain(|file| seen.insert(file.clone()));
    debug!("Collected {} input files", files.len());
    Ok(files)
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

fn expand_pattern(pattern: &str, files: &mut Vec<PathBuf>) -> Result<()> {
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let mut matched = 0;
    for entry in glob::glob_with(pattern, options)
        .with_context(|| format!("Invalid glob pattern '{}'", pattern))?
    {
        let path = entry.context("Failed to read glob match")?;
        if path.is_dir() {
            walk_directory(&path, files)?;
        } else {
            files.push(path);
        }
        matched += 1;
    }

    if matched == 0 {
        warn!("Pattern '{}' matched no files", pattern);
    }
    Ok(())
}

fn walk_directory(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let walker = WalkDir::new(dir)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk directory {}", dir.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(())
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|name| name.starts_with('.'))
}
