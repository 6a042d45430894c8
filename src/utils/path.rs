use std::borrow::Cow;
use std::path::Path;

/// Renders `path` with forward slashes, for the POSIX-style `RelPath.path`
/// the catalog stores regardless of host OS.
pub fn to_posix_string(path: &Path) -> Cow<'_, str> {
    let path_str = path.to_string_lossy();
    if path_str.contains('\\') {
        Cow::Owned(path_str.replace('\\', "/"))
    } else {
        path_str
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_posix_string_replaces_backslashes() {
        let path = Path::new("2013\\12Dec");
        assert_eq!(to_posix_string(path), "2013/12Dec");
    }

    #[test]
    fn to_posix_string_leaves_forward_slashes_untouched() {
        let path = Path::new("2013/12Dec");
        assert_eq!(to_posix_string(path), "2013/12Dec");
    }
}
