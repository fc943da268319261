//! Command strings
//!
//! Stage commands are plain strings split on whitespace: the first token is
//! the program, the rest are passed verbatim as arguments. There is no shell
//! expansion and no quoting, so an argument cannot contain a space.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::CommandError;

/// A tokenized command string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Splits a command string on whitespace
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        let mut tokens = raw.split_whitespace().map(str::to_string);
        let program = tokens.next().ok_or(CommandError::Empty)?;
        Ok(Self {
            program,
            args: tokens.collect(),
        })
    }
}

/// Finds `program` on the process search path
pub fn resolve_executable(program: &str) -> Result<PathBuf, CommandError> {
    let search_path = std::env::var_os("PATH").unwrap_or_default();
    resolve_executable_in(program, &search_path)
}

/// Finds `program` on an explicit search path
///
/// A program containing a path separator is checked as-is.
pub fn resolve_executable_in(program: &str, search_path: &OsStr) -> Result<PathBuf, CommandError> {
    if program.is_empty() {
        return Err(CommandError::Empty);
    }

    if has_separator(program) {
        return check_executable(program, PathBuf::from(program));
    }

    std::env::split_paths(search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file() && is_executable(candidate))
        .ok_or_else(|| CommandError::NotFound {
            program: program.to_string(),
        })
}

/// Finds `program` the way it is launched from `work_dir`
///
/// A relative path such as `./deploy.sh` is taken from `work_dir`, a bare
/// name from the process search path.
pub fn resolve_executable_from(program: &str, work_dir: &Path) -> Result<PathBuf, CommandError> {
    if has_separator(program) && Path::new(program).is_relative() {
        return check_executable(program, work_dir.join(program));
    }
    resolve_executable(program)
}

/// Path a stage program is spawned from when run in `work_dir`
pub fn launch_path(program: &str, work_dir: &Path) -> PathBuf {
    if has_separator(program) && Path::new(program).is_relative() {
        work_dir.join(program)
    } else {
        PathBuf::from(program)
    }
}

fn has_separator(program: &str) -> bool {
    program.contains(std::path::MAIN_SEPARATOR) || program.contains('/')
}

fn check_executable(program: &str, path: PathBuf) -> Result<PathBuf, CommandError> {
    if !path.is_file() {
        Err(CommandError::NotFound {
            program: program.to_string(),
        })
    } else if !is_executable(&path) {
        Err(CommandError::NotExecutable {
            program: program.to_string(),
            path,
        })
    } else {
        Ok(path)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
