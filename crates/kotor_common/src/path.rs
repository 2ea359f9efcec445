//! Path lookups that tolerate the mixed-case names of Windows installations.

use std::{
    fs,
    path::{Path, PathBuf},
};

/// Join a `/` or `\` separated relative name onto `root`.
///
/// Each component is matched case-insensitively against the directory listing when the exact
/// spelling does not exist. Components that match nothing are joined as spelled.
pub fn resolve_path(root: &Path, name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for component in name.split(['/', '\\']).filter(|c| !c.is_empty()) {
        let exact = path.join(component);
        if exact.exists() {
            path = exact;
            continue;
        }
        let found = fs::read_dir(&path).ok().and_then(|dir| {
            dir.filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name())
                .find(|file| file.to_string_lossy().eq_ignore_ascii_case(component))
        });
        path = match found {
            Some(file) => path.join(file),
            None => exact,
        };
    }
    path
}
