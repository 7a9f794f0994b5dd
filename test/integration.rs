// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{RepoFixture, RepoKind};

use anyhow::Result;
use dotswitch::{
    encrypt::mark_encrypted,
    hooks::install_hooks,
    vcs::{CommitOutcome, RunError, VcsError, VcsGateway},
};
use pretty_assertions::assert_eq;
use std::fs;

#[tokio::test]
async fn commit_all_is_idempotent() -> Result<()> {
    let root = tempfile::tempdir()?;
    let repo = RepoFixture::new(root.path().join("work"), RepoKind::Normal)?;
    repo.stage_and_commit("bashrc", "alias ll='ls -l'\n")?;
    fs::write(repo.path().join("vimrc"), "set number\n")?;

    let vcs: VcsGateway = VcsGateway::default();
    assert_eq!(
        vcs.commit_all(repo.path(), "track vimrc").await?,
        CommitOutcome::Committed
    );
    assert_eq!(
        vcs.commit_all(repo.path(), "track vimrc").await?,
        CommitOutcome::NothingToCommit
    );
    assert_eq!(repo.commit_count()?, 2);

    Ok(())
}

#[tokio::test]
async fn push_and_pull_through_shared_remote() -> Result<()> {
    let root = tempfile::tempdir()?;
    let remote = RepoFixture::new(root.path().join("remote.git"), RepoKind::Bare)?;
    let remote_url = remote.path().to_string_lossy().into_owned();
    let laptop = RepoFixture::new(root.path().join("laptop"), RepoKind::Normal)?;
    laptop.stage_and_commit("bashrc", "export EDITOR=vim\n")?;

    let vcs: VcsGateway = VcsGateway::default();
    vcs.push(laptop.path(), &remote_url, None).await?;

    let desktop = root.path().join("desktop");
    vcs.clone(&remote_url, &desktop).await?;
    assert_eq!(
        fs::read_to_string(desktop.join("bashrc"))?,
        "export EDITOR=vim\n"
    );
    assert_eq!(vcs.current_branch(&desktop), Some("main".into()));

    laptop.stage_and_commit("gitconfig", "[user]\n\tname = John Doe\n")?;
    vcs.push(laptop.path(), &remote_url, Some("main")).await?;
    vcs.pull(&desktop, &remote_url, None).await?;
    assert!(desktop.join("gitconfig").is_file());

    Ok(())
}

#[tokio::test]
async fn set_origin_adds_then_rewrites_remote() -> Result<()> {
    let root = tempfile::tempdir()?;
    let repo = RepoFixture::new(root.path().join("work"), RepoKind::Normal)?;

    let vcs: VcsGateway = VcsGateway::default();
    vcs.set_origin(repo.path(), "https://host.example/a/").await?;
    vcs.set_origin(repo.path(), "https://host.example/b/").await?;

    let output = vcs
        .run("remote", ["get-url", "origin"], Some(repo.path()))
        .await?;
    assert_eq!(output.stdout.trim(), "https://host.example/b/");

    Ok(())
}

#[tokio::test]
async fn failed_clone_carries_stderr() -> Result<()> {
    let root = tempfile::tempdir()?;
    let missing = root.path().join("missing.git").to_string_lossy().into_owned();

    let vcs: VcsGateway = VcsGateway::default();
    let result = vcs.clone(&missing, &root.path().join("clone")).await;
    match result {
        Err(VcsError::Run(RunError::NonZeroExit { code, stderr, .. })) => {
            assert_eq!(code, Some(128));
            assert!(!stderr.is_empty());
        }
        other => panic!("unexpected clone result {other:?}"),
    }

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn pre_commit_hook_refuses_encrypted_path() -> Result<()> {
    let root = tempfile::tempdir()?;
    let repo = RepoFixture::new(root.path().join("work"), RepoKind::Normal)?;
    repo.stage_and_commit("bashrc", "alias ll='ls -l'\n")?;
    install_hooks(repo.path())?;
    mark_encrypted(repo.path(), "secrets.env")?;
    fs::write(repo.path().join("secrets.env"), "TOKEN=hunter2\n")?;

    // Ignored by the marker, so a plain commit leaves it out.
    let vcs: VcsGateway = VcsGateway::default();
    assert_eq!(
        vcs.commit_all(repo.path(), "mark secrets").await?,
        CommitOutcome::Committed
    );

    vcs.run("add", ["-f", "secrets.env"], Some(repo.path()))
        .await?;
    let result = vcs
        .run("commit", ["-m", "leak secrets"], Some(repo.path()))
        .await;
    match result {
        Err(VcsError::Run(RunError::NonZeroExit { stderr, .. })) => {
            assert!(stderr.contains("refusing to commit encrypted path secrets.env"));
        }
        other => panic!("unexpected commit result {other:?}"),
    }

    Ok(())
}
