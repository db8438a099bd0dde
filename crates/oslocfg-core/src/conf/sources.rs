//! Default config file and directory discovery.
//!
//! Search order: `~/.<project>/`, `~/`, `/etc/<project>/`, `/etc/`.

use std::path::{Path, PathBuf};

/// Extension of config files.
pub const CONFIG_FILE_EXTENSION: &str = ".conf";

/// Extension of config directories.
pub const CONFIG_DIR_EXTENSION: &str = ".conf.d";

/// Program name used when none is given and argv[0] is unusable.
pub const FALLBACK_PROG: &str = "oslocfg";

/// Expand a leading `~` and make the path absolute.
#[must_use]
pub fn fixpath(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let expanded = match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    };
    std::path::absolute(&expanded).unwrap_or(expanded)
}

/// Directories searched for default config files.
#[must_use]
pub fn config_search_dirs(project: Option<&str>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(project) = project {
        dirs.push(fixpath(format!("~/.{}", project)));
    }
    dirs.push(fixpath("~"));
    if let Some(project) = project {
        dirs.push(Path::new("/etc").join(project));
    }
    dirs.push(PathBuf::from("/etc"));
    dirs
}

/// First existing `<dir>/<basename><extension>`.
#[must_use]
pub fn search_dirs(dirs: &[PathBuf], basename: &str, extension: &str) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(format!("{}{}", basename, extension)))
        .find(|path| path.exists())
}

/// Program name derived from argv[0].
#[must_use]
pub fn default_prog() -> String {
    std::env::args_os()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_PROG.to_string())
}

/// Find `<project>.conf` and `<prog>.conf` in the given directories.
#[must_use]
pub fn find_in(dirs: &[PathBuf], project: Option<&str>, prog: &str, extension: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    if let Some(project) = project {
        found.extend(search_dirs(dirs, project, extension));
    }
    if let Some(path) = search_dirs(dirs, prog, extension) {
        if !found.contains(&path) {
            found.push(path);
        }
    }
    found
}

/// Default config files for a project/program pair.
#[must_use]
pub fn find_config_files(project: Option<&str>, prog: &str) -> Vec<PathBuf> {
    find_in(&config_search_dirs(project), project, prog, CONFIG_FILE_EXTENSION)
}

/// Default config directories for a project/program pair.
#[must_use]
pub fn find_config_dirs(project: Option<&str>, prog: &str) -> Vec<PathBuf> {
    find_in(&config_search_dirs(project), project, prog, CONFIG_DIR_EXTENSION)
}

/// `*.conf` files of a directory, sorted by name.
pub fn dir_config_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "conf"))
        .collect();
    files.sort();
    Ok(files)
}

// =============================================================================
// TESTS
// =============================================================================
