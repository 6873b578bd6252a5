//! Lexical path helpers. None of these touch the filesystem.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// Symlinks are not followed.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Check whether `path` lies under `dir`, comparing normalized components.
///
/// `/store/packages/../../etc/passwd` is NOT under `/store`, and
/// `/store-extra/tool` is not under `/store` either.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// Relative path from the directory containing `from_link` to `to_target`.
///
/// A link at `/home/user/.kiln/bin/tool` pointing to
/// `/home/user/.kiln/packages/github.com_o_r/build/1.0/tool` gets
/// `../packages/github.com_o_r/build/1.0/tool`.
///
/// Returns `None` when no relative path exists (different drives on Windows).
pub fn relative_symlink_path(from_link: &Path, to_target: &Path) -> Option<PathBuf> {
    let from_dir = from_link.parent()?;
    let result = pathdiff::diff_paths(to_target, from_dir)?;

    if result.is_absolute() {
        return None;
    }

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_components() {
        assert_eq!(
            normalize_path(Path::new("/home/user/.kiln/./bin")),
            PathBuf::from("/home/user/.kiln/bin")
        );
        assert_eq!(
            normalize_path(Path::new("/home/user/.kiln/bin/../packages")),
            PathBuf::from("/home/user/.kiln/packages")
        );
        assert_eq!(
            normalize_path(Path::new("bin/../../packages")),
            PathBuf::from("../packages")
        );
        assert_eq!(normalize_path(Path::new("./.")), PathBuf::from(""));
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_path_parent_at_root() {
        assert_eq!(
            normalize_path(Path::new("/usr/../../../etc")),
            PathBuf::from("/etc")
        );
    }

    #[test]
    fn test_is_path_under() {
        let store = Path::new("/home/user/.kiln/packages");

        assert!(is_path_under(
            Path::new("/home/user/.kiln/packages/github.com_o_r/build/1.0/tool"),
            store
        ));
        assert!(is_path_under(store, store));
        assert!(!is_path_under(Path::new("/usr/local/bin/tool"), store));
        assert!(!is_path_under(Path::new("/home/user/.kiln"), store));
    }

    #[test]
    fn test_is_path_under_partial_component_match() {
        assert!(!is_path_under(
            Path::new("/home/user/.kiln/packages-old/tool"),
            Path::new("/home/user/.kiln/packages")
        ));
    }

    #[test]
    fn test_is_path_under_traversal() {
        assert!(!is_path_under(
            Path::new("/home/user/.kiln/packages/../../../etc/passwd"),
            Path::new("/home/user/.kiln/packages")
        ));
        assert!(is_path_under(
            Path::new("/home/user/.kiln/packages/a/../b/tool"),
            Path::new("/home/user/.kiln/packages")
        ));
    }

    #[cfg(windows)]
    #[test]
    fn test_is_path_under_windows() {
        assert!(is_path_under(
            Path::new("C:\\Users\\test\\.kiln\\packages\\x\\tool.exe"),
            Path::new("C:\\Users\\test\\.kiln")
        ));
        assert!(!is_path_under(
            Path::new("C:\\Users\\testing\\file.txt"),
            Path::new("C:\\Users\\test")
        ));
    }

    #[test]
    fn test_relative_symlink_path_into_store() {
        let result = relative_symlink_path(
            Path::new("/home/user/.kiln/bin/tool"),
            Path::new("/home/user/.kiln/packages/github.com_o_r/build/1.0/tool"),
        );
        assert_eq!(
            result,
            Some(PathBuf::from("../packages/github.com_o_r/build/1.0/tool"))
        );
    }

    #[test]
    fn test_relative_symlink_path_distant_store() {
        let result = relative_symlink_path(
            Path::new("/usr/local/bin/tool"),
            Path::new("/opt/kiln/packages/p/build/1.0/tool"),
        );
        assert_eq!(
            result,
            Some(PathBuf::from("../../../opt/kiln/packages/p/build/1.0/tool"))
        );
    }

    #[cfg(windows)]
    #[test]
    fn test_relative_symlink_path_windows_different_drives() {
        let result = relative_symlink_path(
            Path::new("C:\\Users\\test\\bin\\tool"),
            Path::new("D:\\Programs\\tool.exe"),
        );
        assert_eq!(result, None);
    }
}
