// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile activation logic.
//!
//! Utilities to move a tracked file between its two faces: __active__, where
//! the canonical source path is a symlink into the workspace clone, and
//! __unlinked__, where the canonical source path is a plain file or folder
//! (or nothing at all).
//!
//! # State Machine
//!
//! Each [`FileEntry`] starts out unlinked. Activation links it, moving any
//! foreign content found at the source path aside into a sibling backup first.
//! Deactivation replaces the link with a real copy of the repository content,
//! so the user keeps a working configuration after unlinking. Restoration
//! moves the most recent backup back over the source path.
//!
//! ```text
//!             activate (nothing at src)
//!   Unlinked ---------------------------> Active
//!      |  ^                                  |
//!      |  +---------- deactivate ------------+
//!      |                                     |
//!      |  activate (foreign content at src)  |
//!      +------------> ActiveWithBackup <-----+
//! ```
//!
//! # Pitfalls
//!
//! Backups are named `<src>.backup.<suffix>` where the suffix is the remote
//! document id of the entry when known, or a sortable timestamp otherwise.
//! Restoration picks the lexicographically greatest backup name, which is only
//! the most recent one when suffixes are timestamps.

use crate::{
    path::expand_portable,
    store::FileEntry,
};

use chrono::Utc;
use glob::Pattern;
use ignore::WalkBuilder;
use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Observed state of a tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    /// Source path is not linked into the clone.
    Unlinked,

    /// Source path is linked into the clone.
    Active,

    /// Source path is linked into the clone, and original content was backed
    /// up during activation.
    ActiveWithBackup,

    /// Recorded state disagrees with the file system.
    Stale,
}

impl Display for ActivationState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Unlinked => fmt.write_str("unlinked"),
            Self::Active => fmt.write_str("active"),
            Self::ActiveWithBackup => fmt.write_str("active (backup)"),
            Self::Stale => fmt.write_str("stale"),
        }
    }
}

/// Result of activating a tracked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Link created over empty source path.
    Linked,

    /// Link created after moving existing content to backup path.
    LinkedWithBackup(PathBuf),

    /// Source path was already the correct link.
    AlreadyLinked,
}

/// Activation engine for tracked files.
#[derive(Debug, Clone)]
pub struct Activator {
    home: PathBuf,
}

impl Activator {
    /// Construct new activator expanding portable paths against `home`.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Home directory used for portable path expansion.
    pub fn home(&self) -> &Path {
        self.home.as_path()
    }

    /// Absolute source path of tracked file.
    pub fn target_path(&self, entry: &FileEntry) -> PathBuf {
        expand_portable(&entry.src, &self.home)
    }

    /// Link tracked file into the file system.
    ///
    /// Foreign content at the source path is moved to a backup first. A
    /// backup of the exact same name is replaced. Nothing happens if the
    /// source path already links to the repository copy.
    ///
    /// # Errors
    ///
    /// - Return [`ActivateError::RepoFileMissing`] if the clone lacks the
    ///   repository copy.
    /// - Return [`ActivateError`] for any failing file system operation.
    #[instrument(skip(self, entry, clone_dir), fields(dst = %entry.dst), level = "debug")]
    pub fn activate(&self, entry: &mut FileEntry, clone_dir: &Path) -> Result<Transition> {
        let target = self.target_path(entry);
        let repo_file = clone_dir.join(&entry.dst);
        if !repo_file.exists() {
            return Err(ActivateError::RepoFileMissing { path: repo_file });
        }

        if is_link_to(&target, &repo_file) {
            debug!("{:?} already linked", target.display());
            entry.active = true;
            return Ok(Transition::AlreadyLinked);
        }

        if let Some(parent) = target.parent() {
            mkdirp::mkdirp(parent).map_err(|err| ActivateError::CreateDir {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        let transition = if occupied(&target) {
            let suffix = entry
                .doc_id
                .clone()
                .unwrap_or_else(|| Utc::now().format("%Y%m%d%H%M%S%3f").to_string());
            let backup = backup_path(&target, &suffix)?;
            if occupied(&backup) {
                remove_any(&backup)?;
            }

            fs::rename(&target, &backup).map_err(|err| ActivateError::Backup {
                source: err,
                path: target.clone(),
            })?;
            info!("backed up {:?} to {:?}", target.display(), backup.display());
            entry.backup_path = Some(backup.clone());
            entry.backup_created_at = Some(Utc::now());
            Transition::LinkedWithBackup(backup)
        } else {
            Transition::Linked
        };

        symlink(&repo_file, &target)?;
        entry.active = true;
        info!("linked {:?} -> {:?}", target.display(), repo_file.display());

        Ok(transition)
    }

    /// Replace link of tracked file with a real copy of its repository content.
    ///
    /// Nothing happens unless the source path links to the repository copy,
    /// whatever the recorded state claims. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// - Return [`ActivateError::RepoFileMissing`] if the link dangles.
    /// - Return [`ActivateError`] for any failing file system operation.
    #[instrument(skip(self, entry, clone_dir), fields(dst = %entry.dst), level = "debug")]
    pub fn deactivate(&self, entry: &mut FileEntry, clone_dir: &Path) -> Result<bool> {
        let target = self.target_path(entry);
        let repo_file = clone_dir.join(&entry.dst);
        if !is_link_to(&target, &repo_file) {
            debug!("{:?} not linked into clone", target.display());
            return Ok(false);
        }

        if !repo_file.exists() {
            return Err(ActivateError::RepoFileMissing { path: repo_file });
        }

        remove_any(&target)?;
        materialize(&repo_file, &target)?;
        entry.active = false;
        info!("unlinked {:?}", target.display());

        Ok(true)
    }

    /// Move most recent backup of tracked file back over its source path.
    ///
    /// Whatever occupies the source path is overwritten. Returns the backup
    /// that was restored, if any.
    ///
    /// # Errors
    ///
    /// - Return [`ActivateError`] for any failing file system operation.
    #[instrument(skip(self, entry), fields(dst = %entry.dst), level = "debug")]
    pub fn restore(&self, entry: &mut FileEntry) -> Result<Option<PathBuf>> {
        let target = self.target_path(entry);
        let Some(backup) = latest_backup(&target)? else {
            warn!("no backup found for {:?}", target.display());
            return Ok(None);
        };

        if occupied(&target) {
            remove_any(&target)?;
        }
        fs::rename(&backup, &target).map_err(|err| ActivateError::Restore {
            source: err,
            path: backup.clone(),
        })?;
        info!("restored {:?} from {:?}", target.display(), backup.display());

        entry.active = false;
        if entry.backup_path.as_deref() == Some(backup.as_path()) {
            entry.backup_path = None;
            entry.backup_created_at = None;
        }

        Ok(Some(backup))
    }

    /// Observe state of tracked file on the file system.
    pub fn state(&self, entry: &FileEntry, clone_dir: &Path) -> ActivationState {
        let linked = is_link_to(&self.target_path(entry), &clone_dir.join(&entry.dst));
        match (entry.active, linked) {
            (true, true) if entry.backup_path.is_some() => ActivationState::ActiveWithBackup,
            (true, true) => ActivationState::Active,
            (false, false) => ActivationState::Unlinked,
            _ => ActivationState::Stale,
        }
    }
}

/// Copy file or folder to destination.
///
/// Folders are copied recursively. Nested `.git` directories are skipped, and
/// symlinks are recreated rather than followed.
///
/// # Errors
///
/// - Return [`ActivateError`] if walking or copying fails.
pub fn materialize(from: &Path, to: &Path) -> Result<()> {
    if !from.is_dir() {
        fs::copy(from, to).map_err(|err| ActivateError::Copy {
            source: err,
            path: from.to_path_buf(),
        })?;
        return Ok(());
    }

    let walker = WalkBuilder::new(from)
        .standard_filters(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();
    for entry in walker {
        let entry = entry?;
        let rel = entry.path().strip_prefix(from).unwrap_or(Path::new(""));
        let dest = to.join(rel);
        let Some(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            fs::create_dir_all(&dest).map_err(|err| ActivateError::CreateDir {
                source: err,
                path: dest.clone(),
            })?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path()).map_err(|err| ActivateError::Copy {
                source: err,
                path: entry.path().to_path_buf(),
            })?;
            symlink(&link, &dest)?;
        } else {
            fs::copy(entry.path(), &dest).map_err(|err| ActivateError::Copy {
                source: err,
                path: entry.path().to_path_buf(),
            })?;
        }
    }

    Ok(())
}

fn is_link_to(target: &Path, repo_file: &Path) -> bool {
    let is_symlink = fs::symlink_metadata(target)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false);
    if !is_symlink {
        return false;
    }

    if fs::read_link(target).is_ok_and(|link| link == repo_file) {
        return true;
    }

    match (fs::canonicalize(target), fs::canonicalize(repo_file)) {
        (Ok(lhs), Ok(rhs)) => lhs == rhs,
        _ => false,
    }
}

// INVARIANT: Dangling symlinks still occupy their path.
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn backup_path(target: &Path, suffix: &str) -> Result<PathBuf> {
    let name = target
        .file_name()
        .ok_or_else(|| ActivateError::InvalidTarget {
            path: target.to_path_buf(),
        })?;
    let mut backup = OsString::from(name);
    backup.push(".backup.");
    backup.push(suffix);

    Ok(target.with_file_name(backup))
}

fn latest_backup(target: &Path) -> Result<Option<PathBuf>> {
    let (Some(parent), Some(name)) = (target.parent(), target.file_name()) else {
        return Err(ActivateError::InvalidTarget {
            path: target.to_path_buf(),
        });
    };

    let pattern = Pattern::new(&format!(
        "{}.backup*",
        Pattern::escape(&name.to_string_lossy())
    ))?;
    let entries = match fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(_) => return Ok(None),
    };

    let latest = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|candidate| pattern.matches(candidate))
        .max();

    Ok(latest.map(|name| parent.join(name)))
}

fn remove_any(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|err| ActivateError::Remove {
        source: err,
        path: path.to_path_buf(),
    })?;
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        remove_link_or_file(path)
    };

    result.map_err(|err| ActivateError::Remove {
        source: err,
        path: path.to_path_buf(),
    })
}

#[cfg(unix)]
fn remove_link_or_file(path: &Path) -> std::io::Result<()> {
    fs::remove_file(path)
}

#[cfg(windows)]
fn remove_link_or_file(path: &Path) -> std::io::Result<()> {
    fs::remove_file(path).or_else(|_| fs::remove_dir(path))
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(original, link).map_err(|err| ActivateError::Link {
        source: err,
        path: link.to_path_buf(),
    })
}

#[cfg(windows)]
fn symlink(original: &Path, link: &Path) -> Result<()> {
    let result = if original.is_dir() {
        std::os::windows::fs::symlink_dir(original, link)
    } else {
        std::os::windows::fs::symlink_file(original, link)
    };

    result.map_err(|err| ActivateError::Link {
        source: err,
        path: link.to_path_buf(),
    })
}

/// Activation error types.
#[derive(Debug, thiserror::Error)]
pub enum ActivateError {
    /// Repository copy of tracked file does not exist in the clone.
    #[error("repository file {:?} is missing", path.display())]
    RepoFileMissing { path: PathBuf },

    /// Source path has no file name to derive a backup from.
    #[error("invalid dotfile source path {:?}", path.display())]
    InvalidTarget { path: PathBuf },

    /// Parent directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Existing content cannot be moved to backup.
    #[error("failed to back up {:?}", path.display())]
    Backup {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Symlink cannot be created.
    #[error("failed to link {:?}", path.display())]
    Link {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Existing content cannot be removed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Content cannot be copied.
    #[error("failed to copy {:?}", path.display())]
    Copy {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Backup cannot be moved back into place.
    #[error("failed to restore backup {:?}", path.display())]
    Restore {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Folder walk fails.
    #[error(transparent)]
    Walk(#[from] ignore::Error),

    /// Backup pattern cannot be built.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

/// Friendly result alias :3
pub type Result<T, E = ActivateError> = std::result::Result<T, E>;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::store::FileKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        home: PathBuf,
        clone: PathBuf,
        activator: Activator,
    }

    impl Fixture {
        fn new() -> anyhow::Result<Self> {
            let root = tempfile::tempdir()?;
            let home = root.path().join("home");
            let clone = root.path().join("clone");
            fs::create_dir_all(&home)?;
            fs::create_dir_all(&clone)?;
            let activator = Activator::new(&home);

            Ok(Self {
                _root: root,
                home,
                clone,
                activator,
            })
        }

        fn backups(&self, name: &str) -> anyhow::Result<Vec<String>> {
            let mut found = fs::read_dir(&self.home)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .filter(|candidate| candidate.starts_with(&format!("{name}.backup")))
                .collect::<Vec<_>>();
            found.sort();
            Ok(found)
        }
    }

    fn bashrc() -> FileEntry {
        FileEntry::new("{{HOME}}/.bashrc", "bashrc", FileKind::File)
    }

    #[test]
    fn activate_links_empty_source_path() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fs::write(fixture.clone.join("bashrc"), "export A=1\n")?;
        let mut entry = bashrc();

        let result = fixture.activator.activate(&mut entry, &fixture.clone)?;
        assert_eq!(result, Transition::Linked);
        assert!(entry.active);
        assert_eq!(
            fs::read_link(fixture.home.join(".bashrc"))?,
            fixture.clone.join("bashrc")
        );
        assert_eq!(
            fixture.activator.state(&entry, &fixture.clone),
            ActivationState::Active
        );

        Ok(())
    }

    #[test]
    fn activate_backs_up_existing_file() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fs::write(fixture.clone.join("bashrc"), "export A=1\n")?;
        fs::write(fixture.home.join(".bashrc"), "original\n")?;
        let mut entry = bashrc();

        let result = fixture.activator.activate(&mut entry, &fixture.clone)?;
        let Transition::LinkedWithBackup(backup) = result else {
            panic!("expected backup, got {result:?}");
        };
        assert_eq!(fs::read_to_string(&backup)?, "original\n");
        assert_eq!(entry.backup_path.as_deref(), Some(backup.as_path()));
        assert!(entry.backup_created_at.is_some());
        assert!(fs::symlink_metadata(fixture.home.join(".bashrc"))?
            .file_type()
            .is_symlink());
        assert_eq!(
            fixture.activator.state(&entry, &fixture.clone),
            ActivationState::ActiveWithBackup
        );

        Ok(())
    }

    #[test]
    fn activate_twice_is_idempotent() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fs::write(fixture.clone.join("bashrc"), "export A=1\n")?;
        fs::write(fixture.home.join(".bashrc"), "original\n")?;
        let mut entry = bashrc();

        fixture.activator.activate(&mut entry, &fixture.clone)?;
        let result = fixture.activator.activate(&mut entry, &fixture.clone)?;
        assert_eq!(result, Transition::AlreadyLinked);
        assert_eq!(fixture.backups(".bashrc")?.len(), 1);

        Ok(())
    }

    #[test]
    fn activate_replaces_backup_of_same_name() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fs::write(fixture.clone.join("bashrc"), "export A=1\n")?;
        fs::write(fixture.home.join(".bashrc"), "current\n")?;
        fs::write(fixture.home.join(".bashrc.backup.doc-1"), "stale\n")?;
        let mut entry = bashrc();
        entry.doc_id = Some("doc-1".into());

        fixture.activator.activate(&mut entry, &fixture.clone)?;
        assert_eq!(fixture.backups(".bashrc")?, [".bashrc.backup.doc-1"]);
        assert_eq!(
            fs::read_to_string(fixture.home.join(".bashrc.backup.doc-1"))?,
            "current\n"
        );

        Ok(())
    }

    #[test]
    fn activate_requires_repository_copy() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut entry = bashrc();

        let result = fixture.activator.activate(&mut entry, &fixture.clone);
        assert!(matches!(result, Err(ActivateError::RepoFileMissing { .. })));
        assert!(!entry.active);
        assert!(!occupied(&fixture.home.join(".bashrc")));

        Ok(())
    }

    #[test]
    fn deactivate_materializes_repository_copy() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fs::write(fixture.clone.join("bashrc"), "export A=1\n")?;
        fs::write(fixture.home.join(".bashrc"), "original\n")?;
        let mut entry = bashrc();
        fixture.activator.activate(&mut entry, &fixture.clone)?;

        assert!(fixture.activator.deactivate(&mut entry, &fixture.clone)?);
        let target = fixture.home.join(".bashrc");
        assert!(!fs::symlink_metadata(&target)?.file_type().is_symlink());
        assert_eq!(fs::read(&target)?, fs::read(fixture.clone.join("bashrc"))?);
        assert!(!entry.active);

        Ok(())
    }

    #[test]
    fn deactivate_copies_folders_recursively() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let repo_folder = fixture.clone.join("nvim");
        fs::create_dir_all(repo_folder.join("lua"))?;
        fs::write(repo_folder.join("init.lua"), "require('x')\n")?;
        fs::write(repo_folder.join("lua").join("x.lua"), "return {}\n")?;
        let mut entry = FileEntry::new("{{HOME}}/.config/nvim", "nvim", FileKind::Folder);

        fixture.activator.activate(&mut entry, &fixture.clone)?;
        fixture.activator.deactivate(&mut entry, &fixture.clone)?;

        let target = fixture.home.join(".config").join("nvim");
        assert!(!fs::symlink_metadata(&target)?.file_type().is_symlink());
        assert_eq!(fs::read_to_string(target.join("init.lua"))?, "require('x')\n");
        assert_eq!(
            fs::read_to_string(target.join("lua").join("x.lua"))?,
            "return {}\n"
        );

        Ok(())
    }

    #[test]
    fn deactivate_ignores_foreign_content() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fs::write(fixture.clone.join("bashrc"), "export A=1\n")?;
        fs::write(fixture.home.join("elsewhere"), "x\n")?;
        std::os::unix::fs::symlink(fixture.home.join("elsewhere"), fixture.home.join(".bashrc"))?;
        let mut entry = bashrc();
        entry.active = true;

        assert!(!fixture.activator.deactivate(&mut entry, &fixture.clone)?);
        assert!(entry.active);
        assert_eq!(
            fs::read_link(fixture.home.join(".bashrc"))?,
            fixture.home.join("elsewhere")
        );
        assert_eq!(
            fixture.activator.state(&entry, &fixture.clone),
            ActivationState::Stale
        );

        Ok(())
    }

    #[test]
    fn deactivate_then_activate_relinks_same_file() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fs::write(fixture.clone.join("bashrc"), "export A=1\n")?;
        let mut entry = bashrc();

        fixture.activator.activate(&mut entry, &fixture.clone)?;
        fixture.activator.deactivate(&mut entry, &fixture.clone)?;
        fixture.activator.activate(&mut entry, &fixture.clone)?;

        assert!(entry.active);
        assert_eq!(
            fs::read_link(fixture.home.join(".bashrc"))?,
            fixture.clone.join("bashrc")
        );

        Ok(())
    }

    #[test]
    fn restore_picks_greatest_backup_name() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fs::write(fixture.clone.join("bashrc"), "export A=1\n")?;
        fs::write(fixture.home.join(".bashrc.backup.20240101000000000"), "old\n")?;
        fs::write(fixture.home.join(".bashrc.backup.20250101000000000"), "new\n")?;
        let mut entry = bashrc();
        fixture.activator.activate(&mut entry, &fixture.clone)?;

        let restored = fixture.activator.restore(&mut entry)?;
        assert_eq!(
            restored,
            Some(fixture.home.join(".bashrc.backup.20250101000000000"))
        );
        let target = fixture.home.join(".bashrc");
        assert!(!fs::symlink_metadata(&target)?.file_type().is_symlink());
        assert_eq!(fs::read_to_string(&target)?, "new\n");
        assert!(!entry.active);
        assert_eq!(
            fixture.backups(".bashrc")?,
            [".bashrc.backup.20240101000000000"]
        );

        Ok(())
    }

    #[test]
    fn restore_without_backup_is_noop() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fs::write(fixture.home.join(".bashrc"), "keep\n")?;
        let mut entry = bashrc();

        assert_eq!(fixture.activator.restore(&mut entry)?, None);
        assert_eq!(fs::read_to_string(fixture.home.join(".bashrc"))?, "keep\n");

        Ok(())
    }
}
