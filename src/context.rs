// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Context-aware activation.
//!
//! Switching the working __context__ swaps which dotfiles are live. The
//! resolver figures out the dotfile set of the target context, unlinks every
//! active dotfile across the whole index that claims one of the same source
//! paths, and then links the new set in priority order.
//!
//! # Ordering
//!
//! Deactivation of conflicting entries always finishes before any activation
//! starts. A canonical source path may only ever be linked to one repository
//! file at a time, even transiently.
//!
//! # Pitfalls
//!
//! The target dotfile set is not resolved through the target context itself.
//! Instead, the documents of the currently bound context are filtered by
//! whether their repository path mentions the target context path. Documents
//! of unrelated contexts are therefore invisible to a switch.

use crate::{
    activate::Activator,
    address::{is_repo_relative, WorkspaceAddress},
    path::canonical_src,
    remote::{MetadataApi, RemoteDotfileDocument, RemoteError},
    store::{DotfilesIndex, FileEntry, FileKind, IndexStore, WorkspaceStatus},
};

use std::{
    cmp::Reverse,
    collections::{HashMap, HashSet},
    path::Path,
};
use tracing::{debug, info, instrument, warn};

/// File the target context wants linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFile {
    /// Canonical source path.
    pub src: String,

    /// Repository-relative destination path.
    pub dst: String,

    pub doc_id: Option<String>,

    /// Activation order, higher goes first.
    pub priority: i64,
}

/// Report of a context switch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContextSwitch {
    /// File addresses unlinked to make room, in order.
    pub deactivated: Vec<String>,

    /// Destinations linked for the target context, in order.
    pub activated: Vec<String>,

    /// Destinations that could not be linked.
    pub skipped: Vec<String>,
}

/// Reference to a file entry inside the dotfile index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRef {
    pub workspace: String,
    pub position: usize,
}

/// Lookup of active file entries by canonical source path.
///
/// Built once per activation over every workspace of the index.
#[derive(Debug, Default, Clone)]
pub struct SourceIndex {
    owners: HashMap<String, Vec<EntryRef>>,
}

impl SourceIndex {
    /// Index every active entry of the dotfile index.
    pub fn active_entries(index: &DotfilesIndex, home: &Path) -> Self {
        let mut owners: HashMap<String, Vec<EntryRef>> = HashMap::new();
        for (key, config) in &index.workspaces {
            for (position, entry) in config.files.iter().enumerate() {
                if !entry.active {
                    continue;
                }

                owners
                    .entry(canonical_src(&entry.src, home))
                    .or_default()
                    .push(EntryRef {
                        workspace: key.clone(),
                        position,
                    });
            }
        }

        Self { owners }
    }

    /// Active entries linked at canonical source path.
    pub fn owners(&self, src: &str) -> &[EntryRef] {
        self.owners.get(src).map(Vec::as_slice).unwrap_or_default()
    }

    /// Unlink every active owner of `src` except entry `keep_dst` of
    /// workspace `keep_workspace`.
    ///
    /// Unlink failures are logged, and the entry is marked inactive anyway.
    /// Returns `workspace/dst` of every released entry, in order.
    pub fn release(
        &self,
        index: &mut DotfilesIndex,
        activator: &Activator,
        src: &str,
        keep_workspace: &str,
        keep_dst: &str,
    ) -> Vec<String> {
        let mut released = Vec::new();
        for owner in self.owners(src) {
            let Some(config) = index.workspaces.get_mut(&owner.workspace) else {
                continue;
            };
            let clone_dir = config.path.clone();
            let Some(entry) = config.files.get_mut(owner.position) else {
                continue;
            };

            // INVARIANT: Entry already linked to the target stays linked.
            if owner.workspace == keep_workspace && entry.dst == keep_dst {
                debug!("{} already owns {src}", entry.dst);
                continue;
            }
            if !entry.active {
                continue;
            }

            if let Err(error) = activator.deactivate(entry, &clone_dir) {
                warn!("failed to unlink {}/{}: {error}", owner.workspace, entry.dst);
            }
            entry.active = false;
            released.push(format!("{}/{}", owner.workspace, entry.dst));
        }

        released
    }
}

/// Whether repository path belongs to target context path.
pub fn matches_context(repo_path: &str, context_path: &str) -> bool {
    let segment = normalize_context(context_path);
    segment.is_empty() || repo_path.contains(segment) || repo_path.ends_with(segment)
}

fn normalize_context(context_path: &str) -> &str {
    context_path.trim().trim_matches('/')
}

/// Orchestrates activation across a context switch.
#[derive(Debug)]
pub struct ContextResolver<'a, M>
where
    M: MetadataApi,
{
    store: &'a IndexStore,
    activator: &'a Activator,
    metadata: Option<&'a M>,
    bound_context: Option<&'a str>,
}

impl<'a, M> ContextResolver<'a, M>
where
    M: MetadataApi,
{
    /// Construct new resolver.
    ///
    /// Without a metadata service or bound context, the resolver works off
    /// the local index alone.
    pub fn new(
        store: &'a IndexStore,
        activator: &'a Activator,
        metadata: Option<&'a M>,
        bound_context: Option<&'a str>,
    ) -> Self {
        Self {
            store,
            activator,
            metadata,
            bound_context,
        }
    }

    /// Activate dotfile set of target context for workspace.
    ///
    /// Unlinks conflicting active entries across every workspace first, then
    /// links the target set by descending priority. Individual files that
    /// cannot be linked are skipped with a warning. The index is saved once at
    /// the end.
    ///
    /// # Errors
    ///
    /// - Return [`ResolveError::CloneMissing`] if the workspace has no local
    ///   clone.
    /// - Return [`ResolveError::Store`] if the index cannot be saved.
    #[instrument(skip(self, address), fields(workspace = %address), level = "debug")]
    pub async fn activate_for_context(
        &self,
        address: &WorkspaceAddress,
        context_path: &str,
    ) -> Result<ContextSwitch> {
        let mut index = self.store.load();
        let clone_dir = index
            .workspace(address)
            .map(|config| config.path.clone())
            .filter(|path| path.is_dir())
            .ok_or_else(|| ResolveError::CloneMissing {
                workspace: address.key(),
            })?;

        let targets = self.target_files(&index, address, context_path).await;
        info!(
            "context {context_path:?} claims {} dotfile(s) of {address}",
            targets.len()
        );

        let mut report = ContextSwitch::default();
        self.deactivate_conflicts(&mut index, address, &targets, &mut report);
        self.activate_targets(&mut index, address, &clone_dir, &targets, &mut report);

        if !report.activated.is_empty() {
            if let Some(config) = index.workspace_mut(address) {
                config.status = WorkspaceStatus::Active;
            }
        }
        self.store.save(&index)?;

        Ok(report)
    }

    /// Determine dotfile set of target context, sorted by descending priority.
    ///
    /// Only the highest priority file per canonical source path survives.
    async fn target_files(
        &self,
        index: &DotfilesIndex,
        address: &WorkspaceAddress,
        context_path: &str,
    ) -> Vec<TargetFile> {
        let home = self.activator.home();
        let mut targets = match self.fetch_documents().await {
            Ok(documents) => documents
                .into_iter()
                .filter(|doc| matches_context(&doc.payload.repo_path, context_path))
                .map(|doc| TargetFile {
                    src: canonical_src(&doc.payload.local_path, home),
                    dst: doc.payload.repo_path,
                    doc_id: Some(doc.doc_id),
                    priority: doc.payload.priority,
                })
                .collect::<Vec<_>>(),
            Err(error) => {
                warn!("remote dotfiles unavailable, using local index only: {error}");
                index
                    .workspace(address)
                    .map(|config| config.files.as_slice())
                    .unwrap_or_default()
                    .iter()
                    .filter(|entry| matches_context(&entry.dst, context_path))
                    .map(|entry| TargetFile {
                        src: canonical_src(&entry.src, home),
                        dst: entry.dst.clone(),
                        doc_id: entry.doc_id.clone(),
                        priority: 0,
                    })
                    .collect::<Vec<_>>()
            }
        };

        targets.retain(|target| {
            let inside = is_repo_relative(&target.dst);
            if !inside {
                warn!("skip {}: points outside of clone", target.dst);
            }
            inside
        });
        targets.sort_by_key(|target| Reverse(target.priority));
        let mut seen = HashSet::new();
        targets.retain(|target| seen.insert(target.src.clone()));

        targets
    }

    async fn fetch_documents(
        &self,
    ) -> Result<Vec<RemoteDotfileDocument>, RemoteError> {
        let metadata = self
            .metadata
            .ok_or_else(|| RemoteError::Unavailable("no remote is bound".into()))?;
        let context = self
            .bound_context
            .ok_or_else(|| RemoteError::Unavailable("no context is bound".into()))?;

        metadata.documents_by_context(context).await
    }

    fn deactivate_conflicts(
        &self,
        index: &mut DotfilesIndex,
        address: &WorkspaceAddress,
        targets: &[TargetFile],
        report: &mut ContextSwitch,
    ) {
        let sources = SourceIndex::active_entries(index, self.activator.home());
        let key = address.key();

        for target in targets {
            let released = sources.release(index, self.activator, &target.src, &key, &target.dst);
            report.deactivated.extend(released);
        }
    }

    fn activate_targets(
        &self,
        index: &mut DotfilesIndex,
        address: &WorkspaceAddress,
        clone_dir: &Path,
        targets: &[TargetFile],
        report: &mut ContextSwitch,
    ) {
        let config = index.workspace_or_default(address);

        for target in targets {
            let repo_file = clone_dir.join(&target.dst);
            if !repo_file.exists() {
                warn!("skip {}: missing from clone", target.dst);
                report.skipped.push(target.dst.clone());
                continue;
            }
            let kind = FileKind::of(&repo_file);

            let result = match config.position_by_src(&target.src) {
                Some(position) => {
                    let entry = &mut config.files[position];
                    entry.dst = target.dst.clone();
                    entry.kind = kind;
                    if target.doc_id.is_some() {
                        entry.doc_id = target.doc_id.clone();
                    }
                    self.activator.activate(entry, clone_dir).map(|_| ())
                }
                None => {
                    let mut entry = FileEntry::new(&target.src, &target.dst, kind);
                    entry.doc_id = target.doc_id.clone();
                    self.activator
                        .activate(&mut entry, clone_dir)
                        .map(|_| config.files.push(entry))
                }
            };

            match result {
                Ok(()) => report.activated.push(target.dst.clone()),
                Err(error) => {
                    warn!("skip {}: {error}", target.dst);
                    report.skipped.push(target.dst.clone());
                }
            }
        }
    }
}

/// Context resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Workspace has no local clone to link from.
    #[error("workspace {workspace} has no local clone")]
    CloneMissing { workspace: String },

    /// Index cannot be saved.
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

/// Friendly result alias :3
pub type Result<T, E = ResolveError> = std::result::Result<T, E>;
