// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for the settings file that dotswitch uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.
//!
//! # General Layout
//!
//! The settings file is composed of three parts: the current session, path
//! overrides, and a listing of remotes. The session section records which
//! remote, workspace, and context are currently bound, along with the legacy
//! global token. Each remote entry records the base URL of the remote service,
//! the user to act as, and the bearer token to authenticate with.

use crate::address::{Owner, WorkspaceAddress};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Settings file layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Currently bound session.
    #[serde(default)]
    pub session: Session,

    /// Overrides for default installation paths.
    #[serde(default, skip_serializing_if = "PathSettings::is_empty")]
    pub paths: PathSettings,

    /// Listing of known remotes.
    #[serde(default, rename = "remote", skip_serializing_if = "Vec::is_empty")]
    pub remotes: Vec<RemoteSettings>,
}

impl Settings {
    /// Find remote settings by name.
    pub fn remote(&self, name: impl AsRef<str>) -> Option<&RemoteSettings> {
        self.remotes
            .iter()
            .find(|remote| remote.name == name.as_ref())
    }

    /// Resolve bearer token for target remote.
    ///
    /// Prefers the token configured for the remote itself, falling back to
    /// the legacy global token of the session.
    pub fn token_for(&self, remote: impl AsRef<str>) -> Option<&str> {
        self.remote(remote)
            .and_then(|remote| remote.token.as_deref())
            .or(self.session.token.as_deref())
    }

    /// Owner implied by the bound session remote.
    ///
    /// Only available when the bound remote lists a user to act as.
    pub fn bound_owner(&self) -> Option<Owner> {
        let name = self.session.remote.as_deref()?;
        let user = self.remote(name)?.user.as_deref()?;
        Some(Owner::new(user, name))
    }

    /// Workspace bound by the current session.
    pub fn bound_workspace(&self) -> Option<WorkspaceAddress> {
        let owner = self.bound_owner()?;
        let workspace = self.session.workspace.as_deref()?;
        Some(WorkspaceAddress::new(owner.user, owner.remote, workspace))
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on path overrides.
        if let Some(index) = settings.paths.index.take() {
            settings.paths.index = Some(expand(index)?);
        }
        if let Some(clones) = settings.paths.clones.take() {
            settings.paths.clones = Some(expand(clones)?);
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(path: PathBuf) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Currently bound session.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Session {
    /// Name of bound remote.
    pub remote: Option<String>,

    /// Name of bound workspace on the bound remote.
    pub workspace: Option<String>,

    /// Path of bound context.
    pub context: Option<String>,

    /// Legacy global bearer token.
    pub token: Option<String>,
}

/// Overrides for default installation paths.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PathSettings {
    /// Location of local dotfile index.
    pub index: Option<PathBuf>,

    /// Directory housing local clones.
    pub clones: Option<PathBuf>,
}

impl PathSettings {
    fn is_empty(&self) -> bool {
        self.index.is_none() && self.clones.is_none()
    }
}

/// Remote service settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RemoteSettings {
    /// Name of remote used in workspace addresses.
    pub name: String,

    /// Base URL of remote service.
    pub url: String,

    /// User to act as on this remote.
    pub user: Option<String>,

    /// Bearer token for this remote.
    pub token: Option<String>,
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
