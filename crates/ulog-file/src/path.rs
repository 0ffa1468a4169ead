use std::io;
use std::path::{Path, PathBuf};

/// Splits a path into `(path-without-extension, extension-with-leading-dot)`
/// using the simple last-dot rule: a leading dot makes the whole name a
/// hidden file with no extension (`.mylog` -> (".mylog", "")); otherwise the
/// last dot separates basename from extension, so a compound suffix like
/// `.tar.zst` yields basename `archive.tar` and extension `.zst` rather than
/// being special-cased further.
pub fn split_by_extension(path: &Path) -> (PathBuf, String) {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let filename = path.file_name().and_then(|f| f.to_str()).unwrap_or("");

    let (base, ext) = match filename.rfind('.') {
        Some(0) | None => (filename.to_string(), String::new()),
        Some(pos) => (filename[..pos].to_string(), filename[pos..].to_string()),
    };

    (dir.join(base), ext)
}

/// Creates `dir` and all missing parents with mode 0755 on unix, tolerating
/// an already-existing directory.
#[cfg(unix)]
pub fn create_dir_recursive(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)
}

#[cfg(not(unix))]
pub fn create_dir_recursive(dir: &Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
}
