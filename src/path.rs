// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.
//!
//! # Portable Source Paths
//!
//! Tracked dotfiles record where they are supposed to live on disk as a
//! __canonical source path__. To keep the index usable across machines whose
//! home directories differ, any source path that sits under the user's home
//! directory is stored with the [`HOME_PLACEHOLDER`] in place of the absolute
//! home prefix, e.g., `{{HOME}}/.bashrc`.

use std::path::{Path, PathBuf};

/// Portable stand-in for the user's home directory in canonical source paths.
pub const HOME_PLACEHOLDER: &str = "{{HOME}}";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to configuration directory.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/dotswitch`. Holds both the
/// settings file and the local dotfile index. Does not check if the path
/// returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("dotswitch"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to the local dotfile index.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_index_path() -> Result<PathBuf> {
    default_config_dir().map(|path| path.join("dotfiles.json"))
}

/// Determine default absolute path to the settings file.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_settings_path() -> Result<PathBuf> {
    default_config_dir().map(|path| path.join("config.toml"))
}

/// Determine default absolute path to the directory housing local clones.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/dotswitch`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_clone_root() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("dotswitch"))
        .ok_or(NoWayHome)
}

/// Convert absolute path into its portable canonical form.
///
/// Paths outside of `home` are returned as-is.
pub fn to_portable(path: impl AsRef<Path>, home: impl AsRef<Path>) -> String {
    match path.as_ref().strip_prefix(home.as_ref()) {
        Ok(rest) if rest.as_os_str().is_empty() => HOME_PLACEHOLDER.to_string(),
        Ok(rest) => {
            let rest = rest
                .components()
                .map(|part| part.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            format!("{HOME_PLACEHOLDER}/{rest}")
        }
        Err(_) => path.as_ref().to_string_lossy().into_owned(),
    }
}

/// Expand portable canonical source path into an absolute path.
pub fn expand_portable(src: impl AsRef<str>, home: impl AsRef<Path>) -> PathBuf {
    match src.as_ref().strip_prefix(HOME_PLACEHOLDER) {
        Some(rest) => {
            let rest = rest.trim_start_matches(['/', '\\']);
            if rest.is_empty() {
                home.as_ref().to_path_buf()
            } else {
                home.as_ref().join(rest)
            }
        }
        None => PathBuf::from(src.as_ref()),
    }
}

/// Normalize any user or remote supplied source path into canonical form.
///
/// Accepts portable paths, tilde paths, and absolute paths alike so that two
/// spellings of the same location compare equal.
pub fn canonical_src(raw: impl AsRef<str>, home: impl AsRef<Path>) -> String {
    let raw = raw.as_ref();
    if raw.starts_with(HOME_PLACEHOLDER) {
        return raw.to_string();
    }

    let expanded = shellexpand::tilde_with_context(raw, || home.as_ref().to_str());
    to_portable(Path::new(expanded.as_ref()), home)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
