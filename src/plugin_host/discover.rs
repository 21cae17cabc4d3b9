//! Plugin discovery: recursive `.ofx` scan to depth ≤ 2 (spec §4.3).

use std::path::{Path, PathBuf};

/// Maximum recursion depth below a search root (spec §4.3: "depth ≤ 2").
pub const MAX_DEPTH: u32 = 2;

/// Recursively scan `search_dirs` to depth ≤ 2 for files with extension
/// `.ofx`. Directory-traversal errors are logged and skipped, never fatal
/// (spec §4.3).
pub fn discover_plugins(search_dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for dir in search_dirs {
        scan_dir(dir, 0, &mut found);
    }
    found
}

fn scan_dir(dir: &Path, depth: u32, found: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable plugin search directory");
            return;
        }
    };
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        let is_dir = match entry.file_type() {
            Ok(ft) => ft.is_dir(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping entry with unreadable file type");
                continue;
            }
        };
        if is_dir {
            if depth < MAX_DEPTH {
                scan_dir(&path, depth + 1, found);
            }
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) == Some("ofx") {
            found.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_ofx_files_within_depth_two() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("a.ofx"), b"").unwrap();
        let d1 = root.path().join("d1");
        fs::create_dir(&d1).unwrap();
        fs::write(d1.join("b.ofx"), b"").unwrap();
        let d2 = d1.join("d2");
        fs::create_dir(&d2).unwrap();
        fs::write(d2.join("c.ofx"), b"").unwrap();
        let d3 = d2.join("d3");
        fs::create_dir(&d3).unwrap();
        fs::write(d3.join("too_deep.ofx"), b"").unwrap();

        let found = discover_plugins(&[root.path().to_path_buf()]);
        let names: Vec<_> = found.iter().filter_map(|p| p.file_name()?.to_str()).collect();
        assert!(names.contains(&"a.ofx"));
        assert!(names.contains(&"b.ofx"));
        assert!(names.contains(&"c.ofx"));
        assert!(!names.contains(&"too_deep.ofx"));
    }

    #[test]
    fn ignores_non_ofx_files() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("readme.txt"), b"").unwrap();
        let found = discover_plugins(&[root.path().to_path_buf()]);
        assert!(found.is_empty());
    }

    #[test]
    fn unreadable_search_dir_is_skipped_not_fatal() {
        let found = discover_plugins(&[PathBuf::from("/definitely/does/not/exist")]);
        assert!(found.is_empty());
    }
}
