//! Shared helpers for the fltools command line

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use std::fs;
use std::path::{Path, PathBuf};

/// Render a byte count with a binary-scaled unit suffix
pub fn format_size(size: u64) -> String {
    const UNITS: [(&str, u64); 3] = [("GB", 1 << 30), ("MB", 1 << 20), ("KB", 1 << 10)];
    for (suffix, scale) in UNITS {
        if size >= scale {
            return format!("{:.2} {}", size as f64 / scale as f64, suffix);
        }
    }
    format!("{} B", size)
}

/// Build a matcher for archive entry-path filters
///
/// A bare `*.ext` applies at any depth, and a pattern with no wildcards
/// at all becomes a substring match, so `-f menu` finds every path
/// containing "menu".
pub fn create_glob_matcher(pattern: &str) -> Result<GlobMatcher> {
    let expanded = if pattern.starts_with("*.") {
        format!("**/{}", pattern)
    } else if !pattern.contains(['*', '?']) {
        format!("**/*{}*", pattern)
    } else {
        pattern.to_string()
    };

    let glob =
        Glob::new(&expanded).with_context(|| format!("invalid filter pattern '{}'", pattern))?;
    Ok(glob.compile_matcher())
}

/// Apply an optional filter; no filter matches everything
pub fn matches_filter(name: &str, matcher: Option<&GlobMatcher>) -> bool {
    matcher.map_or(true, |m| m.is_match(name))
}

/// Recursively collect all regular files under a directory
pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_glob_matcher() {
        let m = create_glob_matcher("*.scr").unwrap();
        assert!(matches_filter("menu/00000004.scr", Some(&m)));
        assert!(!matches_filter("menu/00000004.bin", Some(&m)));

        let m = create_glob_matcher("menu").unwrap();
        assert!(matches_filter("menu/00000004.scr", Some(&m)));

        assert!(matches_filter("anything", None));
    }
}
