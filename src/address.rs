// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Workspace and file addressing.
//!
//! A __workspace__ is a named collection owned by a user on a remote service,
//! identified as `user@remote:workspace`. The same string doubles as the key
//! of the workspace in the local dotfile index. Tracked files are addressed by
//! appending their repository-relative destination path to the workspace
//! address, e.g., `alice@host:work/.config/nvim`.
//!
//! The `user@remote:` owner prefix may be left out when an [`Owner`] is
//! bound through the current session.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Component, Path},
    str::FromStr,
};

/// User and remote pair owning a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Owner {
    pub user: String,
    pub remote: String,
}

impl Owner {
    pub fn new(user: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            remote: remote.into(),
        }
    }
}

/// Fully qualified workspace address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceAddress {
    pub user: String,
    pub remote: String,
    pub workspace: String,
}

impl WorkspaceAddress {
    pub fn new(
        user: impl Into<String>,
        remote: impl Into<String>,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            remote: remote.into(),
            workspace: workspace.into(),
        }
    }

    /// Parse workspace address, filling in a missing owner prefix.
    ///
    /// # Errors
    ///
    /// - Return [`AddressError`] if the address is malformed, carries a
    ///   path component, or lacks an owner that cannot be filled in.
    pub fn parse_with_owner(raw: &str, owner: Option<&Owner>) -> Result<Self> {
        let (owner, rest) = split_owner(raw, owner)?;
        if rest.contains('/') {
            return Err(AddressError::UnexpectedPath(raw.to_string()));
        }

        Ok(Self::new(owner.user, owner.remote, rest))
    }

    /// Key of workspace inside the local dotfile index.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Resource segment used in remote URLs.
    pub fn resource(&self) -> String {
        format!("{}/{}", self.user, self.workspace)
    }

    /// Owner of this workspace.
    pub fn owner(&self) -> Owner {
        Owner::new(&self.user, &self.remote)
    }
}

impl FromStr for WorkspaceAddress {
    type Err = AddressError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse_with_owner(raw, None)
    }
}

impl Display for WorkspaceAddress {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}@{}:{}", self.user, self.remote, self.workspace)
    }
}

/// Address of a single tracked file within a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileAddress {
    pub workspace: WorkspaceAddress,
    pub dst: String,
}

impl FileAddress {
    /// Parse file address, filling in a missing owner prefix.
    ///
    /// # Errors
    ///
    /// - Return [`AddressError`] if the address is malformed, lacks a
    ///   destination path, or lacks an owner that cannot be filled in.
    pub fn parse_with_owner(raw: &str, owner: Option<&Owner>) -> Result<Self> {
        let (owner, rest) = split_owner(raw, owner)?;
        let (workspace, dst) = rest
            .split_once('/')
            .ok_or_else(|| AddressError::MissingDestination(raw.to_string()))?;
        let dst = dst.trim_matches('/');
        if workspace.is_empty() {
            return Err(AddressError::MissingWorkspace(raw.to_string()));
        }
        if dst.is_empty() {
            return Err(AddressError::MissingDestination(raw.to_string()));
        }
        if !is_repo_relative(dst) {
            return Err(AddressError::OutsideWorkspace(raw.to_string()));
        }

        Ok(Self {
            workspace: WorkspaceAddress::new(owner.user, owner.remote, workspace),
            dst: dst.to_string(),
        })
    }
}

impl FromStr for FileAddress {
    type Err = AddressError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse_with_owner(raw, None)
    }
}

impl Display for FileAddress {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}/{}", self.workspace, self.dst)
    }
}

/// Check that `path` names something strictly below a workspace clone.
///
/// Only plain path segments are accepted, so joining `path` onto a clone can
/// neither climb out of it nor name the clone itself.
pub fn is_repo_relative(path: &str) -> bool {
    let mut components = Path::new(path).components().peekable();
    components.peek().is_some()
        && components.all(|component| matches!(component, Component::Normal(_)))
}

fn split_owner<'a>(raw: &'a str, fallback: Option<&Owner>) -> Result<(Owner, &'a str)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AddressError::Empty);
    }

    let (owner, rest) = match raw.split_once(':') {
        Some((prefix, rest)) => {
            let (user, remote) = prefix
                .split_once('@')
                .filter(|(user, remote)| !user.is_empty() && !remote.is_empty())
                .ok_or_else(|| AddressError::MalformedOwner(raw.to_string()))?;
            (Owner::new(user, remote), rest)
        }
        None => match fallback {
            Some(owner) => (owner.clone(), raw),
            None => return Err(AddressError::MissingOwner(raw.to_string())),
        },
    };

    if rest.is_empty() || rest.starts_with('/') {
        return Err(AddressError::MissingWorkspace(raw.to_string()));
    }

    Ok((owner, rest))
}

/// Address parsing error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// No address given at all.
    #[error("empty address")]
    Empty,

    /// Owner prefix is not of the form `user@remote`.
    #[error("malformed owner in {0:?}, expected user@remote:workspace")]
    MalformedOwner(String),

    /// Owner prefix missing and no session owner bound.
    #[error("address {0:?} has no user@remote prefix and no remote is bound")]
    MissingOwner(String),

    /// Workspace name missing.
    #[error("address {0:?} names no workspace")]
    MissingWorkspace(String),

    /// File address lacks a destination path.
    #[error("address {0:?} names no file, expected workspace/path")]
    MissingDestination(String),

    /// Workspace address carries a path component.
    #[error("address {0:?} names a file, expected a workspace")]
    UnexpectedPath(String),

    /// File destination climbs out of the workspace clone.
    #[error("address {0:?} points outside of its workspace")]
    OutsideWorkspace(String),
}

/// Friendly result alias :3
type Result<T, E = AddressError> = std::result::Result<T, E>;
