//! UTF-8 file helpers built on `cap-std` and `camino`.
//!
//! Every helper opens the containing directory with ambient authority and
//! performs the operation relative to that capability.
#![forbid(unsafe_code)]

use std::io;
use std::time::SystemTime;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Open the directory containing `path` and return it with the file name.
///
/// # Errors
/// Fails when `path` has no file name or the directory cannot be opened.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, &str)> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("{path} does not name a file"))
    })?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

/// Read a whole UTF-8 file.
///
/// # Errors
/// Propagates I/O failures, including invalid UTF-8 content.
pub fn read_to_string(path: &Utf8Path) -> io::Result<String> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.read_to_string(name)
}

/// Last modification time of a file.
///
/// # Errors
/// Propagates I/O failures and platforms without modification times.
pub fn modified_time(path: &Utf8Path) -> io::Result<SystemTime> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.metadata(name)?.modified().map(cap_std::time::SystemTime::into_std)
}

/// Whether the existing entry at `path` is a regular file.
///
/// # Errors
/// Propagates I/O failures, including [`io::ErrorKind::NotFound`] when
/// nothing exists at `path`.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.metadata(name).map(|meta| meta.is_file())
}

/// Create every missing directory above `path`.
///
/// # Errors
/// Propagates I/O failures from directory creation.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let (base, relative) = anchored(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base.create_dir_all(&relative)
}

/// Write `contents` to `path`, creating parent directories as needed.
///
/// # Errors
/// Propagates I/O failures.
pub fn write_file(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let (dir, name) = open_dir_and_file(path)?;
    dir.write(name, contents)
}

/// Split `path` into an opened anchor directory and the remainder.
///
/// The anchor is the root (and drive prefix) for absolute paths and the
/// current directory otherwise.
fn anchored(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let mut anchor = Utf8PathBuf::new();
    let mut relative = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::Prefix(_) | Utf8Component::RootDir => anchor.push(component),
            Utf8Component::CurDir => {}
            other => relative.push(other),
        }
    }
    if anchor.as_str().is_empty() {
        anchor.push(".");
    }
    let dir = fs_utf8::Dir::open_ambient_dir(&anchor, ambient_authority())?;
    Ok((dir, relative))
}
