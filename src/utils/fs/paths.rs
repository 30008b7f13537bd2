//! Lexical path helpers.

use std::path::{Component, Path, PathBuf};

/// Normalizes a path by resolving `.` and `..` components.
///
/// Resolution is purely lexical: symbolic links are not followed and the
/// path need not exist. Output paths built from `$path` patterns such as
/// `../out/{id}.md` go through this so they compare equal to the paths the
/// file watcher reports.
///
/// ```rust
/// use mdxdb::utils::fs::normalize_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(normalize_path(Path::new("/site/posts/../out/./a.md")), PathBuf::from("/site/out/a.md"));
/// ```
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                } else if !matches!(components.last(), Some(Component::RootDir | Component::Prefix(_))) {
                    components.push(component);
                }
            }
            c => components.push(c),
        }
    }

    components.iter().collect()
}

/// Link from a document in `from_dir` to `target`, with `/` separators.
///
/// Both paths are normalized first; they must share the same base (both
/// absolute or both relative to one directory).
pub fn relative_link(from_dir: &Path, target: &Path) -> String {
    let from = normalize_path(from_dir);
    let target = normalize_path(target);
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = target.components().collect();

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(to[common..].iter().map(|c| c.as_os_str().to_string_lossy().into_owned()));
    parts.join("/")
}

/// `path` relative to `root` for display, or `path` itself when outside it.
pub fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
