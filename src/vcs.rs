// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control gateway.
//!
//! Utilities to drive the external Git binary against the local clone of a
//! workspace. Every interaction goes through a [`CommandRunner`], so failure
//! handling can be exercised without spawning real processes. Network
//! operations embed the bearer token of the remote directly into the URL
//! passed to that single invocation; the token is never written into the
//! clone's configuration.

use git2::Repository;
use std::{
    ffi::OsStr,
    future::Future,
    io::ErrorKind,
    path::Path,
    process::Stdio,
};
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Branch to fall back on when the clone does not name one.
pub const DEFAULT_BRANCH: &str = "main";

/// Buffered output of a finished command.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Layer of indirection for spawning external commands.
pub trait CommandRunner: Send + Sync {
    /// Run program to completion, buffering its output.
    fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
    ) -> impl Future<Output = Result<CommandOutput, RunError>> + Send;
}

/// Command runner spawning real child processes.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<CommandOutput, RunError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let output = command
            .output()
            .await
            .map_err(|err| RunError::from_spawn(program, err))?;
        let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
        let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

        if !output.status.success() {
            return Err(RunError::NonZeroExit {
                program: program.to_string(),
                code: output.status.code(),
                stderr: chomp(stderr),
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

/// Outcome of staging and committing a clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    NothingToCommit,
}

/// Outcome of pushing a clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    UpToDate,
}

/// Gateway to the external version control binary.
#[derive(Debug, Clone)]
pub struct VcsGateway<R = ProcessRunner>
where
    R: CommandRunner,
{
    runner: R,
    program: String,
}

impl Default for VcsGateway<ProcessRunner> {
    fn default() -> Self {
        Self::new(ProcessRunner)
    }
}

impl<R> VcsGateway<R>
where
    R: CommandRunner,
{
    /// Construct new gateway driving `git` through target runner.
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            program: "git".into(),
        }
    }

    /// Run Git subcommand.
    ///
    /// # Errors
    ///
    /// - Return [`VcsError::Run`] if Git cannot be spawned or exits with a
    ///   non-zero status. The error carries captured stderr and exit code.
    pub async fn run(
        &self,
        subcommand: &str,
        args: impl IntoIterator<Item = impl Into<String>>,
        cwd: Option<&Path>,
    ) -> Result<CommandOutput> {
        let mut bin_args = vec![subcommand.to_string()];
        bin_args.extend(args.into_iter().map(Into::into));
        debug!("{} {}", self.program, redact(&bin_args).join(" "));

        Ok(self.runner.run(&self.program, &bin_args, cwd).await?)
    }

    /// Initialize new repository in target directory.
    #[instrument(skip(self, dir), level = "debug")]
    pub async fn init(&self, dir: &Path) -> Result<()> {
        info!("initialize repository at {:?}", dir.display());
        self.run("init", Vec::<String>::new(), Some(dir)).await?;
        Ok(())
    }

    /// Clone remote repository into target directory.
    #[instrument(skip(self, url, target_dir), level = "debug")]
    pub async fn clone(&self, url: &str, target_dir: &Path) -> Result<()> {
        info!("clone into {:?}", target_dir.display());
        self.run(
            "clone",
            [url.to_string(), target_dir.to_string_lossy().into_owned()],
            None,
        )
        .await?;
        Ok(())
    }

    /// Point `origin` remote of the clone at target URL.
    ///
    /// Adds the remote if it does not exist yet.
    pub async fn set_origin(&self, dir: &Path, url: &str) -> Result<()> {
        match self.run("remote", ["set-url", "origin", url], Some(dir)).await {
            Ok(_) => Ok(()),
            Err(VcsError::Run(RunError::NonZeroExit { .. })) => {
                self.run("remote", ["add", "origin", url], Some(dir)).await?;
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Stage everything and commit it.
    ///
    /// Probes the index after staging. If nothing is staged, then no commit
    /// is made at all, which keeps repeated calls idempotent.
    ///
    /// # Errors
    ///
    /// - Return [`VcsError::Run`] if any Git invocation fails.
    #[instrument(skip(self, dir, message), level = "debug")]
    pub async fn commit_all(&self, dir: &Path, message: &str) -> Result<CommitOutcome> {
        self.run("add", ["-A"], Some(dir)).await?;
        let staged = self
            .run("diff", ["--cached", "--name-only"], Some(dir))
            .await?;
        if staged.stdout.trim().is_empty() {
            info!("nothing to commit in {:?}", dir.display());
            return Ok(CommitOutcome::NothingToCommit);
        }

        self.run("commit", ["-m", message], Some(dir)).await?;
        info!("committed {:?}", dir.display());
        Ok(CommitOutcome::Committed)
    }

    /// Push clone to authenticated remote URL.
    ///
    /// Branch defaults to the current branch of the clone. A rejection
    /// stating that there is nothing to push counts as success.
    ///
    /// # Errors
    ///
    /// - Return [`VcsError::Run`] if the push fails for any other reason.
    #[instrument(skip(self, dir, remote_url), level = "debug")]
    pub async fn push(
        &self,
        dir: &Path,
        remote_url: &str,
        branch: Option<&str>,
    ) -> Result<PushOutcome> {
        let branch = self.resolve_branch(dir, branch);
        let result = self
            .run("push", [remote_url.to_string(), format!("HEAD:{branch}")], Some(dir))
            .await;

        match result {
            Ok(_) => Ok(PushOutcome::Pushed),
            Err(VcsError::Run(RunError::NonZeroExit { stderr, .. }))
                if is_nothing_to_push(&stderr) =>
            {
                info!("{:?} already up-to-date", dir.display());
                Ok(PushOutcome::UpToDate)
            }
            Err(error) => Err(error),
        }
    }

    /// Pull authenticated remote URL into clone.
    ///
    /// Branch defaults to the current branch of the clone, falling back to
    /// [`DEFAULT_BRANCH`].
    ///
    /// # Errors
    ///
    /// - Return [`VcsError::Run`] if the pull fails.
    #[instrument(skip(self, dir, remote_url), level = "debug")]
    pub async fn pull(&self, dir: &Path, remote_url: &str, branch: Option<&str>) -> Result<()> {
        let branch = self.resolve_branch(dir, branch);
        self.run("pull", [remote_url.to_string(), branch], Some(dir))
            .await?;
        Ok(())
    }

    /// Short status of clone.
    pub async fn status(&self, dir: &Path) -> Result<String> {
        let output = self.run("status", ["--short"], Some(dir)).await?;
        Ok(output.stdout)
    }

    /// Current branch of clone.
    ///
    /// Reads the symbolic HEAD, so unborn branches of fresh repositories are
    /// reported too. Returns `None` for detached heads or missing repositories.
    pub fn current_branch(&self, dir: &Path) -> Option<String> {
        let repository = Repository::open(dir).ok()?;
        let head = repository.find_reference("HEAD").ok()?;
        head.symbolic_target()
            .and_then(|target| target.strip_prefix("refs/heads/"))
            .map(str::to_owned)
    }

    fn resolve_branch(&self, dir: &Path, branch: Option<&str>) -> String {
        branch
            .map(str::to_owned)
            .or_else(|| self.current_branch(dir))
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string())
    }
}

/// Git URL of a workspace on a remote service.
pub fn remote_git_url(base_url: &str, resource: &str) -> String {
    format!(
        "{}/rest/v2/workspaces/{}/dotfiles/git/",
        base_url.trim_end_matches('/'),
        resource
    )
}

/// Embed bearer token into HTTP(S) URL.
///
/// Inserts `user:{token}@` right after the scheme separator.
///
/// # Errors
///
/// - Return [`VcsError::InvalidUrl`] if URL is not HTTP(S).
pub fn authenticated_url(url: &str, token: &str) -> Result<String> {
    let (scheme, rest) = url
        .split_once("://")
        .filter(|(scheme, rest)| matches!(*scheme, "http" | "https") && !rest.is_empty())
        .ok_or_else(|| VcsError::InvalidUrl(url.to_string()))?;

    Ok(format!("{scheme}://user:{token}@{rest}"))
}

fn is_nothing_to_push(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("nothing to push")
        || stderr.contains("up-to-date")
        || stderr.contains("up to date")
}

fn redact(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|arg| match (arg.split_once("://"), arg.find('@')) {
            (Some((scheme, rest)), Some(_)) if rest.contains('@') => {
                let host = rest.split_once('@').map(|(_, host)| host).unwrap_or(rest);
                format!("{scheme}://***@{host}")
            }
            _ => arg.clone(),
        })
        .collect()
}

// INVARIANT: Chomp trailing newlines.
fn chomp(message: String) -> String {
    message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message)
}

/// Failure to run an external command.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Program does not exist.
    #[error("command {program:?} not found")]
    NotFound { program: String },

    /// Program exists but cannot be executed.
    #[error("permission denied running {program:?}")]
    PermissionDenied { program: String },

    /// Program cannot be spawned for any other reason.
    #[error("failed to spawn {program:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        program: String,
    },

    /// Program exited with a failure status.
    #[error("command {program:?} failed with exit code {}:\n{stderr}", code.map_or("none".to_string(), |code| code.to_string()))]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl RunError {
    fn from_spawn(program: impl AsRef<OsStr>, error: std::io::Error) -> Self {
        let program = program.as_ref().to_string_lossy().into_owned();
        match error.kind() {
            ErrorKind::NotFound => Self::NotFound { program },
            ErrorKind::PermissionDenied => Self::PermissionDenied { program },
            _ => Self::Spawn {
                source: error,
                program,
            },
        }
    }
}

/// Version control error types.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// External Git invocation fails.
    #[error(transparent)]
    Run(#[from] RunError),

    /// Remote URL cannot carry credentials.
    #[error("cannot embed credentials into non-HTTP(S) url {0:?}")]
    InvalidUrl(String),
}

/// Friendly result alias :3
pub type Result<T, E = VcsError> = std::result::Result<T, E>;
