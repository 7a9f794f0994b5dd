// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local dotfile index management.
//!
//! Dotswitch keeps track of every dotfile it manages in one place called the
//! __dotfile index__. The index maps each workspace key, i.e.,
//! `user@remote:workspace`, to the configuration of that workspace: where its
//! local clone lives, what state the clone is in, and which files it tracks.
//!
//! # Index Layout
//!
//! The index is a single JSON document. It is the source of truth for local
//! state; remote metadata documents only mirror it on a best-effort basis.
//!
//! ```json
//! {
//!   "alice@host:work": {
//!     "path": "/home/alice/.local/share/dotswitch/alice@host/work",
//!     "status": "cloned",
//!     "files": [
//!       {
//!         "src": "{{HOME}}/.bashrc",
//!         "dst": "bashrc",
//!         "type": "file",
//!         "active": false,
//!         "addedAt": "2025-01-01T00:00:00Z"
//!       }
//!     ]
//!   }
//! }
//! ```
//!
//! # Pitfalls
//!
//! There is no locking around the index file. Callers must treat the store
//! as single-writer-at-a-time. Two concurrent invocations will lose updates,
//! where the last write wins.

use crate::address::WorkspaceAddress;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Mapping of workspace keys to workspace configuration.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct DotfilesIndex {
    pub workspaces: BTreeMap<String, WorkspaceConfig>,
}

impl DotfilesIndex {
    /// Lookup workspace configuration.
    pub fn workspace(&self, address: &WorkspaceAddress) -> Option<&WorkspaceConfig> {
        self.workspaces.get(&address.key())
    }

    /// Lookup workspace configuration for mutation.
    pub fn workspace_mut(&mut self, address: &WorkspaceAddress) -> Option<&mut WorkspaceConfig> {
        self.workspaces.get_mut(&address.key())
    }

    /// Lookup workspace configuration, creating an inactive one if missing.
    pub fn workspace_or_default(&mut self, address: &WorkspaceAddress) -> &mut WorkspaceConfig {
        self.workspaces.entry(address.key()).or_default()
    }
}

/// Configuration of one workspace.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// Local clone directory.
    pub path: PathBuf,

    /// State of local clone.
    pub status: WorkspaceStatus,

    /// Tracked files.
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

impl WorkspaceConfig {
    /// Find tracked file by repository-relative destination.
    ///
    /// First match wins.
    pub fn file(&self, dst: impl AsRef<str>) -> Option<&FileEntry> {
        self.files.iter().find(|entry| entry.dst == dst.as_ref())
    }

    /// Find tracked file by repository-relative destination for mutation.
    pub fn file_mut(&mut self, dst: impl AsRef<str>) -> Option<&mut FileEntry> {
        self.files.iter_mut().find(|entry| entry.dst == dst.as_ref())
    }

    /// Find position of tracked file by canonical source path.
    pub fn position_by_src(&self, src: impl AsRef<str>) -> Option<usize> {
        self.files.iter().position(|entry| entry.src == src.as_ref())
    }

    /// Absolute path to repository copy of tracked file.
    pub fn repo_path(&self, entry: &FileEntry) -> PathBuf {
        self.path.join(&entry.dst)
    }
}

/// State of a workspace's local clone.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceStatus {
    #[default]
    Inactive,
    Initialized,
    Cloned,
    Active,
}

impl Display for WorkspaceStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let status = match self {
            Self::Inactive => "inactive",
            Self::Initialized => "initialized",
            Self::Cloned => "cloned",
            Self::Active => "active",
        };
        fmt.write_str(status)
    }
}

/// Tracked file entry.
///
/// # Invariant
///
/// - If `active` is set, then the path resolved from `src` is a symlink to
///   `<clone>/<dst>`. Nothing watches the file system, so a violation just
///   means the index went stale.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Canonical source path.
    pub src: String,

    /// Repository-relative destination path.
    pub dst: String,

    /// File or folder.
    #[serde(rename = "type")]
    pub kind: FileKind,

    /// Whether source path is currently linked into the clone.
    pub active: bool,

    pub added_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_created_at: Option<DateTime<Utc>>,

    /// Remote metadata document id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
}

impl FileEntry {
    /// Construct new inactive entry.
    pub fn new(src: impl Into<String>, dst: impl Into<String>, kind: FileKind) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            kind,
            active: false,
            added_at: Utc::now(),
            backup_path: None,
            backup_created_at: None,
            doc_id: None,
        }
    }
}

/// Kind of tracked file.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    #[default]
    File,
    Folder,
}

impl FileKind {
    /// Determine kind of file at target path.
    pub fn of(path: impl AsRef<Path>) -> Self {
        if path.as_ref().is_dir() {
            Self::Folder
        } else {
            Self::File
        }
    }
}

impl Display for FileKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::File => fmt.write_str("file"),
            Self::Folder => fmt.write_str("folder"),
        }
    }
}

/// Shallow update of workspace configuration.
///
/// Only fields that are set replace their counterpart.
#[derive(Default, Debug, Clone)]
pub struct WorkspaceUpdate {
    pub path: Option<PathBuf>,
    pub status: Option<WorkspaceStatus>,
    pub files: Option<Vec<FileEntry>>,
}

impl WorkspaceUpdate {
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn status(mut self, status: WorkspaceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn files(mut self, files: Vec<FileEntry>) -> Self {
        self.files = Some(files);
        self
    }

    fn apply(self, config: &mut WorkspaceConfig) {
        if let Some(path) = self.path {
            config.path = path;
        }
        if let Some(status) = self.status {
            config.status = status;
        }
        if let Some(files) = self.files {
            config.files = files;
        }
    }
}

/// Persistent store of the dotfile index.
#[derive(Debug, Clone)]
pub struct IndexStore {
    index_path: PathBuf,
}

impl IndexStore {
    /// Construct new index store backed by target file.
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
        }
    }

    /// Path to backing index file.
    pub fn path(&self) -> &Path {
        self.index_path.as_path()
    }

    /// Load dotfile index.
    ///
    /// Never fails. A missing or unparsable index file yields an empty index
    /// with a warning.
    #[instrument(skip(self), level = "debug")]
    pub fn load(&self) -> DotfilesIndex {
        let content = match read_to_string(&self.index_path) {
            Ok(content) => content,
            Err(error) => {
                warn!(
                    "cannot read dotfile index {:?}, starting empty: {error}",
                    self.index_path.display()
                );
                return DotfilesIndex::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(index) => index,
            Err(error) => {
                warn!(
                    "cannot parse dotfile index {:?}, starting empty: {error}",
                    self.index_path.display()
                );
                DotfilesIndex::default()
            }
        }
    }

    /// Save dotfile index.
    ///
    /// Creates parent directories as needed, and rewrites the whole file.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::CreateDir`] if parent directory cannot be made.
    /// - Return [`StoreError::Serialize`] if index cannot be serialized.
    /// - Return [`StoreError::Write`] if index file cannot be written.
    #[instrument(skip(self, index), level = "debug")]
    pub fn save(&self, index: &DotfilesIndex) -> Result<()> {
        if let Some(parent) = self.index_path.parent() {
            mkdirp::mkdirp(parent).map_err(|err| StoreError::CreateDir {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(index)?;
        write(&self.index_path, content).map_err(|err| StoreError::Write {
            source: err,
            path: self.index_path.clone(),
        })?;
        debug!("saved dotfile index {:?}", self.index_path.display());

        Ok(())
    }

    /// Create or update workspace configuration.
    ///
    /// Loads the index, creates an inactive workspace with no files if
    /// missing, shallow-merges `update` into it, and saves the index.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if index cannot be saved.
    pub fn upsert_workspace(
        &self,
        address: &WorkspaceAddress,
        update: WorkspaceUpdate,
    ) -> Result<WorkspaceConfig> {
        let mut index = self.load();
        let config = index.workspace_or_default(address);
        update.apply(config);
        let merged = config.clone();
        self.save(&index)?;

        Ok(merged)
    }
}

/// Index store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Parent directory of index file cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Index file cannot be written to.
    #[error("failed to write dotfile index {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Index cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_index(clone: &Path) -> DotfilesIndex {
        let mut entry = FileEntry::new("{{HOME}}/.bashrc", "bashrc", FileKind::File);
        entry.active = true;
        entry.backup_path = Some(PathBuf::from("/home/alice/.bashrc.backup.1"));
        entry.backup_created_at = Some(Utc::now());
        entry.doc_id = Some("doc-1".into());

        let mut index = DotfilesIndex::default();
        index.workspaces.insert(
            "alice@host:work".into(),
            WorkspaceConfig {
                path: clone.to_path_buf(),
                status: WorkspaceStatus::Active,
                files: vec![
                    entry,
                    FileEntry::new("{{HOME}}/.config/nvim", "nvim", FileKind::Folder),
                ],
            },
        );
        index
    }

    #[test]
    fn save_then_load_round_trips() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = IndexStore::new(dir.path().join("nested").join("dotfiles.json"));
        let index = sample_index(dir.path());

        store.save(&index)?;
        assert_eq!(store.load(), index);

        Ok(())
    }

    #[test]
    fn load_missing_or_garbage_yields_empty_index() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = IndexStore::new(dir.path().join("dotfiles.json"));
        assert_eq!(store.load(), DotfilesIndex::default());

        write(store.path(), "{ not json")?;
        assert_eq!(store.load(), DotfilesIndex::default());

        Ok(())
    }

    #[test]
    fn index_uses_camel_case_layout() -> anyhow::Result<()> {
        let mut index = DotfilesIndex::default();
        let mut entry = FileEntry::new("{{HOME}}/.bashrc", "bashrc", FileKind::File);
        entry.doc_id = Some("doc-1".into());
        index.workspaces.insert(
            "alice@host:work".into(),
            WorkspaceConfig {
                path: PathBuf::from("/clones/work"),
                status: WorkspaceStatus::Cloned,
                files: vec![entry],
            },
        );

        let value = serde_json::to_value(&index)?;
        let file = &value["alice@host:work"]["files"][0];
        assert_eq!(value["alice@host:work"]["status"], "cloned");
        assert_eq!(file["type"], "file");
        assert_eq!(file["docId"], "doc-1");
        assert!(file.get("addedAt").is_some());
        assert!(file.get("backupPath").is_none());

        Ok(())
    }

    #[test]
    fn upsert_creates_then_merges_workspace() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = IndexStore::new(dir.path().join("dotfiles.json"));
        let address = WorkspaceAddress::new("alice", "host", "work");

        let created = store.upsert_workspace(&address, WorkspaceUpdate::default())?;
        assert_eq!(created.status, WorkspaceStatus::Inactive);
        assert!(created.files.is_empty());

        let merged = store.upsert_workspace(
            &address,
            WorkspaceUpdate::default()
                .path(dir.path().join("clone"))
                .status(WorkspaceStatus::Cloned),
        )?;
        assert_eq!(merged.path, dir.path().join("clone"));
        assert_eq!(merged.status, WorkspaceStatus::Cloned);
        assert_eq!(store.load().workspace(&address), Some(&merged));

        Ok(())
    }

    #[test]
    fn first_destination_match_wins() {
        let config = WorkspaceConfig {
            path: PathBuf::from("/clones/work"),
            status: WorkspaceStatus::Cloned,
            files: vec![
                FileEntry::new("{{HOME}}/.bashrc", "bashrc", FileKind::File),
                FileEntry::new("{{HOME}}/.bashrc2", "bashrc", FileKind::File),
            ],
        };

        let found = config.file("bashrc").map(|entry| entry.src.as_str());
        assert_eq!(found, Some("{{HOME}}/.bashrc"));
        assert_eq!(config.position_by_src("{{HOME}}/.bashrc2"), Some(1));
        assert_eq!(
            config.repo_path(&config.files[0]),
            PathBuf::from("/clones/work/bashrc")
        );
    }
}
