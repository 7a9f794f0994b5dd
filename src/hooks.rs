// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control hook installation.
//!
//! Installs a pre-commit hook into a clone that refuses to commit any path
//! listed in its encrypted index. The hook only reads the index at commit
//! time, so marking or unmarking paths later needs no reinstall.

use crate::encrypt::ENCRYPTED_INDEX;

use std::{
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Name of hook installed into the clone.
pub const PRE_COMMIT: &str = "pre-commit";

const SECTION_START: &str = "# >>> dotswitch pre-commit >>>";
const SECTION_END: &str = "# <<< dotswitch pre-commit <<<";

/// Render dotswitch section of pre-commit hook.
///
/// The section only exits when it refuses a commit, so it can follow
/// whatever hook body the user already has.
pub fn pre_commit_section() -> String {
    format!(
        r#"{SECTION_START}
# Refuse to commit paths marked as encrypted.
dotswitch_index="$(git rev-parse --show-toplevel)/{ENCRYPTED_INDEX}"
if [ -f "$dotswitch_index" ]; then
    dotswitch_status=0
    while IFS= read -r path; do
        [ -n "$path" ] || continue
        if git diff --cached --name-only -- "$path" | grep -q .; then
            echo "dotswitch: refusing to commit encrypted path $path" >&2
            dotswitch_status=1
        fi
    done < "$dotswitch_index"
    [ "$dotswitch_status" -eq 0 ] || exit 1
fi
{SECTION_END}
"#
    )
}

/// Install pre-commit hook into clone.
///
/// A missing hook is created. An existing hook keeps its body and gets the
/// dotswitch section appended, or refreshed in place if an older section is
/// present already. Returns path of installed hook.
///
/// # Errors
///
/// - Return [`HookError`] if hook directory or script cannot be read or
///   written.
#[instrument(skip(clone_dir), level = "debug")]
pub fn install_hooks(clone_dir: &Path) -> Result<PathBuf> {
    let hooks_dir = clone_dir.join(".git").join("hooks");
    if !clone_dir.join(".git").is_dir() {
        return Err(HookError::NotARepository {
            path: clone_dir.to_path_buf(),
        });
    }

    mkdirp::mkdirp(&hooks_dir).map_err(|err| HookError::Write {
        source: err,
        path: hooks_dir.clone(),
    })?;
    let hook = hooks_dir.join(PRE_COMMIT);
    let section = pre_commit_section();
    let script = match read_to_string(&hook) {
        Ok(existing) => merge_section(&existing, &section),
        Err(err) if err.kind() == ErrorKind::NotFound => Some(format!("#!/bin/sh\n\n{section}")),
        Err(err) => {
            return Err(HookError::Read {
                source: err,
                path: hook,
            })
        }
    };

    match script {
        Some(script) => {
            write(&hook, script).map_err(|err| HookError::Write {
                source: err,
                path: hook.clone(),
            })?;
            info!("installed {:?}", hook.display());
        }
        None => debug!("{:?} already up to date", hook.display()),
    }
    make_executable(&hook)?;

    Ok(hook)
}

/// Merge dotswitch section into existing hook body.
///
/// Returns `None` if the hook already carries the same section.
fn merge_section(existing: &str, section: &str) -> Option<String> {
    let bounds = existing.find(SECTION_START).and_then(|start| {
        existing[start..]
            .find(SECTION_END)
            .map(|end| (start, start + end + SECTION_END.len()))
    });

    match bounds {
        Some((start, end)) if existing[start..end] == *section.trim_end() => None,
        Some((start, end)) => Some(format!(
            "{}{}{}",
            &existing[..start],
            section.trim_end(),
            &existing[end..]
        )),
        None => Some(format!("{}\n\n{section}", existing.trim_end())),
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::{fs::set_permissions, os::unix::fs::PermissionsExt};

    set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|err| {
        HookError::Write {
            source: err,
            path: path.to_path_buf(),
        }
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Hook installation error types.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// Clone has no `.git` directory.
    #[error("{:?} is not a git repository", path.display())]
    NotARepository { path: PathBuf },

    /// Existing hook cannot be read.
    #[error("failed to read hook {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Hook cannot be written.
    #[error("failed to write hook {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = HookError> = std::result::Result<T, E>;
