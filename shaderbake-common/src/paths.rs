use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Strip leading `..` components so source paths that climb out of the base
/// directory still map to a sensible location under the output directory.
pub fn remove_leading_dot_dots(path: &Path) -> PathBuf {
    let mut components = path.components().peekable();
    while matches!(components.peek(), Some(Component::ParentDir)) {
        components.next();
    }

    components.collect()
}

/// Append `suffix` to the file name of `path` without touching an extension.
pub fn append_to_file_name(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Append `ext` (with its dot) to the whole path. `Path::with_extension`
/// would replace a trailing `.vs` in names like `blit.vs`, so the extension
/// is pushed onto the raw string instead.
pub fn with_appended_ext(path: &Path, ext: &str) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(ext);
    PathBuf::from(s)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strips_leading_parent_dirs() {
        assert_eq!(
            remove_leading_dot_dots(Path::new("../../shaders/blit.hlsl")),
            PathBuf::from("shaders/blit.hlsl")
        );
        // Interior `..` components are preserved.
        assert_eq!(
            remove_leading_dot_dots(Path::new("shaders/../blit.hlsl")),
            PathBuf::from("shaders/../blit.hlsl")
        );
    }

    #[test]
    fn appends_without_clobbering_dots() {
        assert_eq!(
            append_to_file_name(Path::new("out/blit"), "_main"),
            PathBuf::from("out/blit_main")
        );
        assert_eq!(
            with_appended_ext(Path::new("out/blit.vs"), ".spirv"),
            PathBuf::from("out/blit.vs.spirv")
        );
    }
}
