// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Encrypted path marking.
//!
//! Dotswitch does not encrypt anything itself. It only remembers which
//! repository-relative paths of a clone hold secrets, so they are kept out of
//! plaintext version control.
//!
//! # Encrypted Index Layout
//!
//! The __encrypted index__ lives inside the clone at `.dotswitch/encrypted`.
//! Each line holds one repository-relative path. Lines carry set semantics, so
//! order is meaningless and duplicates never appear. A missing index is just
//! an empty set.
//!
//! Marking a path also adds it to the clone's `.gitignore`. Unmarking a path
//! leaves the `.gitignore` line alone on purpose. The user has to decide
//! whether the content should ever become plaintext again.

use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Location of encrypted index relative to clone root.
pub const ENCRYPTED_INDEX: &str = ".dotswitch/encrypted";

/// Location of ignore file relative to clone root.
pub const IGNORE_FILE: &str = ".gitignore";

/// Mark repository-relative path as encrypted.
///
/// Idempotently inserts the path into the encrypted index, then into the
/// clone's ignore file.
///
/// # Errors
///
/// - Return [`EncryptError`] if either file cannot be read or written.
#[instrument(skip(clone_dir), level = "debug")]
pub fn mark_encrypted(clone_dir: &Path, rel_path: &str) -> Result<()> {
    edit_encrypted_index(clone_dir, |paths| paths.insert_path(rel_path))?;

    let ignore_path = clone_dir.join(IGNORE_FILE);
    let content = read_or_empty(&ignore_path)?;
    if content.lines().any(|line| line.trim() == rel_path) {
        debug!("{rel_path:?} already ignored");
        return Ok(());
    }

    let mut content = content;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(rel_path);
    content.push('\n');
    write(&ignore_path, content).map_err(|err| EncryptError::Write {
        source: err,
        path: ignore_path,
    })?;

    Ok(())
}

/// Unmark repository-relative path as encrypted.
///
/// Idempotently removes the path from the encrypted index only.
///
/// # Errors
///
/// - Return [`EncryptError`] if the encrypted index cannot be read or written.
#[instrument(skip(clone_dir), level = "debug")]
pub fn unmark_encrypted(clone_dir: &Path, rel_path: &str) -> Result<()> {
    edit_encrypted_index(clone_dir, |paths| paths.remove_path(rel_path))
}

/// List paths currently marked as encrypted, sorted.
///
/// # Errors
///
/// - Return [`EncryptError::Read`] if the encrypted index cannot be read.
pub fn encrypted_paths(clone_dir: &Path) -> Result<Vec<String>> {
    let content = read_or_empty(&clone_dir.join(ENCRYPTED_INDEX))?;
    let mut paths = PathSetEdit::from(content).paths.into_iter().collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

fn edit_encrypted_index<E>(clone_dir: &Path, editor: E) -> Result<()>
where
    E: FnOnce(&mut PathSetEdit),
{
    let index_path = clone_dir.join(ENCRYPTED_INDEX);
    let mut paths = PathSetEdit::from(read_or_empty(&index_path)?);
    editor(&mut paths);

    if !paths.changed {
        return Ok(());
    }

    if let Some(parent) = index_path.parent() {
        mkdirp::mkdirp(parent).map_err(|err| EncryptError::Write {
            source: err,
            path: parent.to_path_buf(),
        })?;
    }
    write(&index_path, paths.to_string()).map_err(|err| EncryptError::Write {
        source: err,
        path: index_path.clone(),
    })?;

    Ok(())
}

fn read_or_empty(path: &Path) -> Result<String> {
    match read_to_string(path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(EncryptError::Read {
            source: err,
            path: path.to_path_buf(),
        }),
    }
}

/// Path set editor.
///
/// # Invariant
///
/// - No duplicate paths.
/// - Blank lines are dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PathSetEdit {
    paths: HashSet<String>,
    changed: bool,
}

impl PathSetEdit {
    /// Insert a path.
    pub fn insert_path(&mut self, path: impl Into<String>) {
        if self.paths.insert(path.into()) {
            self.changed = true;
        }
    }

    /// Remove a path.
    pub fn remove_path(&mut self, path: impl AsRef<str>) {
        if self.paths.remove(path.as_ref()) {
            self.changed = true;
        }
    }
}

impl Display for PathSetEdit {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        let mut paths: Vec<_> = self.paths.iter().collect();
        paths.sort();

        for path in paths {
            writeln!(fmt, "{path}")?;
        }

        Ok(())
    }
}

impl From<String> for PathSetEdit {
    fn from(content: String) -> Self {
        Self::from(content.as_str())
    }
}

impl From<&str> for PathSetEdit {
    fn from(content: &str) -> Self {
        let paths = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect::<HashSet<_>>();

        Self {
            paths,
            changed: false,
        }
    }
}

/// Encryption marker error types.
#[derive(Debug, thiserror::Error)]
pub enum EncryptError {
    /// Index or ignore file cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Index or ignore file cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = EncryptError> = std::result::Result<T, E>;
