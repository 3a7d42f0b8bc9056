use std::env;
use std::path::{Path, PathBuf};

pub fn is_executable_present(path: &Path) -> bool {
    path.is_file() && is_executable(path)
}

pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).map_or(false, |metadata| {
        let permissions = metadata.permissions();
        permissions.mode() & 0o111 != 0
    })
}

/// First executable called `name` in `search_path` (a `PATH`-style list).
pub fn find_in_search_path(name: &str, search_path: &std::ffi::OsStr) -> Option<PathBuf> {
    env::split_paths(search_path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable_present(candidate))
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let search_path = env::var_os("PATH")?;
    find_in_search_path(name, &search_path)
}
