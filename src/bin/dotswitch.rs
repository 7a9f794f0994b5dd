// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotswitch::{
    activate::Transition,
    config::Settings,
    manager::Manager,
    path::default_settings_path,
    prompt::{InquirePrompter, ProgressPrompter},
    vcs::{CommitOutcome, PushOutcome},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fs::{read_to_string, write},
    future::Future,
    io::ErrorKind,
    path::Path,
    process::exit,
    time::Duration,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "dotswitch [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Show debug logs and full error traces.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings_path = default_settings_path()?;
        let settings = load_settings(&settings_path)?;
        let mut manager = Manager::open(settings)?;

        match self.command {
            Command::List(opts) => run_list(&manager, opts),
            Command::Init(opts) => run_init(&manager, opts).await,
            Command::Clone(opts) => run_clone(&manager, opts).await,
            Command::Add(opts) => run_add(&manager, opts).await,
            Command::Commit(opts) => run_commit(&manager, opts).await,
            Command::Push(opts) => run_push(&manager, opts).await,
            Command::Pull(opts) => run_pull(&manager, opts).await,
            Command::Sync(opts) => run_sync(&manager, opts).await,
            Command::Status(opts) => run_status(&manager, opts).await,
            Command::Activate(opts) => run_activate(&manager, opts),
            Command::Deactivate(opts) => run_deactivate(&manager, opts),
            Command::Restore(opts) => run_restore(&manager, opts),
            Command::Remove(opts) => run_remove(&manager, opts).await,
            Command::Delete(opts) => run_delete(&manager, opts).await,
            Command::InstallHooks(opts) => run_install_hooks(&manager, opts),
            Command::Encrypt(opts) => run_encrypt(&manager, opts),
            Command::Decrypt(opts) => run_decrypt(&manager, opts),
            Command::Cd(opts) => run_cd(&mut manager, &settings_path, opts).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// List workspaces of dotfile index.
    #[command(override_usage = "dotswitch list [options]")]
    List(ListOptions),

    /// Initialize new empty workspace.
    #[command(override_usage = "dotswitch init [options] <workspace>")]
    Init(WorkspaceOptions),

    /// Clone existing workspace from its remote.
    #[command(override_usage = "dotswitch clone [options] <workspace>")]
    Clone(CloneOptions),

    /// Track new dotfile in workspace.
    #[command(override_usage = "dotswitch add [options] <src> <file>")]
    Add(AddOptions),

    /// Commit every change of workspace.
    #[command(override_usage = "dotswitch commit [options] <workspace>")]
    Commit(CommitOptions),

    /// Push workspace to its remote.
    #[command(override_usage = "dotswitch push [options] <workspace>")]
    Push(BranchOptions),

    /// Pull workspace from its remote.
    #[command(override_usage = "dotswitch pull [options] <workspace>")]
    Pull(BranchOptions),

    /// Commit, pull, and push workspace.
    #[command(override_usage = "dotswitch sync [options] <workspace>")]
    Sync(SyncOptions),

    /// Show changes and activation state of workspace.
    #[command(override_usage = "dotswitch status [options] <workspace>")]
    Status(WorkspaceOptions),

    /// Link tracked files into the file system.
    #[command(override_usage = "dotswitch activate [options] <file>...")]
    Activate(FileOptions),

    /// Replace links of tracked files with real copies.
    #[command(override_usage = "dotswitch deactivate [options] <file>...")]
    Deactivate(FileOptions),

    /// Move most recent backups of tracked files back into place.
    #[command(override_usage = "dotswitch restore [options] <file>...")]
    Restore(FileOptions),

    /// Stop tracking files.
    #[command(override_usage = "dotswitch remove [options] <file>...")]
    Remove(FileOptions),

    /// Stop tracking files and delete their repository copies.
    #[command(override_usage = "dotswitch delete [options] <file>...")]
    Delete(DeleteOptions),

    /// Install hook refusing to commit encrypted paths.
    #[command(override_usage = "dotswitch install-hooks [options] <workspace>")]
    InstallHooks(WorkspaceOptions),

    /// Mark tracked paths as encrypted.
    #[command(override_usage = "dotswitch encrypt [options] <file>...")]
    Encrypt(FileOptions),

    /// Unmark tracked paths as encrypted.
    #[command(override_usage = "dotswitch decrypt [options] <file>...")]
    Decrypt(FileOptions),

    /// Switch working context, swapping active dotfiles.
    #[command(override_usage = "dotswitch cd [options] <context>")]
    Cd(CdOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// Show tracked files of each workspace.
    #[arg(short, long)]
    pub files: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct WorkspaceOptions {
    /// Workspace address, e.g., user@remote:workspace.
    #[arg(required = true, value_name = "workspace")]
    pub workspace: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CloneOptions {
    /// Workspace address, e.g., user@remote:workspace.
    #[arg(required = true, value_name = "workspace")]
    pub workspace: String,

    /// Prompt for token instead of using the configured one.
    #[arg(long)]
    pub ask_token: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    /// Path of file or folder to track.
    #[arg(required = true, value_name = "src")]
    pub src: String,

    /// File address to track it as, e.g., workspace/path.
    #[arg(required = true, value_name = "file")]
    pub file: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CommitOptions {
    /// Workspace address, e.g., user@remote:workspace.
    #[arg(required = true, value_name = "workspace")]
    pub workspace: String,

    /// Commit message.
    #[arg(short, long, value_name = "message")]
    pub message: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BranchOptions {
    /// Workspace address, e.g., user@remote:workspace.
    #[arg(required = true, value_name = "workspace")]
    pub workspace: String,

    /// Target branch to use instead of the current branch.
    #[arg(short, long, value_name = "branch")]
    pub branch: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SyncOptions {
    /// Workspace address, e.g., user@remote:workspace.
    #[arg(required = true, value_name = "workspace")]
    pub workspace: String,

    /// Commit message.
    #[arg(short, long, value_name = "message")]
    pub message: Option<String>,

    /// Target branch to use instead of the current branch.
    #[arg(short, long, value_name = "branch")]
    pub branch: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct FileOptions {
    /// File addresses, e.g., workspace/path.
    #[arg(required = true, value_name = "file")]
    pub files: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeleteOptions {
    /// File addresses, e.g., workspace/path.
    #[arg(required = true, value_name = "file")]
    pub files: Vec<String>,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CdOptions {
    /// Context path to switch to.
    #[arg(required = true, value_name = "context")]
    pub context: String,

    /// Workspace to activate dotfiles from instead of the bound one.
    #[arg(short, long, value_name = "workspace")]
    pub workspace: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let debug = cli.debug;

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run().await {
        if debug {
            error!("{error:?}");
        } else {
            error!("{error:#}");
        }
        exit(1);
    }

    exit(0)
}

fn load_settings(path: &Path) -> Result<Settings> {
    match read_to_string(path) {
        Ok(data) => data
            .parse()
            .with_context(|| format!("invalid settings file {:?}", path.display())),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(Settings::default()),
        Err(error) => {
            Err(error).with_context(|| format!("cannot read settings file {:?}", path.display()))
        }
    }
}

fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        mkdirp::mkdirp(parent)
            .with_context(|| format!("cannot create directory {:?}", parent.display()))?;
    }
    write(path, settings.to_string())
        .with_context(|| format!("cannot write settings file {:?}", path.display()))
}

fn spinner(message: impl Into<String>) -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{elapsed_precise:.green}  {msg:<50}  [{spinner:.yellow}]")?
        .tick_chars("-Cco.");
    bar.set_style(style);
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));

    Ok(bar)
}

async fn with_spinner<T>(message: impl Into<String>, task: impl Future<Output = T>) -> Result<T> {
    let bar = spinner(message)?;
    let output = task.await;
    bar.finish_and_clear();

    Ok(output)
}

fn run_list(manager: &Manager, opts: ListOptions) -> Result<()> {
    let index = manager.list();
    if index.workspaces.is_empty() {
        info!("no workspaces tracked yet");
    }

    for (key, config) in &index.workspaces {
        println!("{key}  {}  {}", config.status, config.path.display());
        if !opts.files {
            continue;
        }

        for entry in &config.files {
            let marker = if entry.active { '*' } else { ' ' };
            println!("  {marker} {} -> {} ({})", entry.dst, entry.src, entry.kind);
        }
    }

    Ok(())
}

async fn run_init(manager: &Manager, opts: WorkspaceOptions) -> Result<()> {
    manager.init(&opts.workspace).await?;
    Ok(())
}

async fn run_clone(manager: &Manager, opts: CloneOptions) -> Result<()> {
    let bar = spinner(format!("clone {}", opts.workspace))?;
    let prompter = ProgressPrompter::new(bar.clone());
    let result = manager
        .clone(&opts.workspace, opts.ask_token, &prompter)
        .await;
    bar.finish_and_clear();

    let config = result?;
    info!("cloned {} into {:?}", opts.workspace, config.path.display());
    Ok(())
}

async fn run_add(manager: &Manager, opts: AddOptions) -> Result<()> {
    manager.add(&opts.src, &opts.file).await?;
    Ok(())
}

async fn run_commit(manager: &Manager, opts: CommitOptions) -> Result<()> {
    match manager
        .commit(&opts.workspace, opts.message.as_deref())
        .await?
    {
        CommitOutcome::Committed => info!("committed {}", opts.workspace),
        CommitOutcome::NothingToCommit => info!("nothing to commit in {}", opts.workspace),
    }

    Ok(())
}

async fn run_push(manager: &Manager, opts: BranchOptions) -> Result<()> {
    let outcome = with_spinner(
        format!("push {}", opts.workspace),
        manager.push(&opts.workspace, opts.branch.as_deref()),
    )
    .await??;
    if outcome == PushOutcome::UpToDate {
        info!("{} is up-to-date", opts.workspace);
    }

    Ok(())
}

async fn run_pull(manager: &Manager, opts: BranchOptions) -> Result<()> {
    with_spinner(
        format!("pull {}", opts.workspace),
        manager.pull(&opts.workspace, opts.branch.as_deref()),
    )
    .await??;

    Ok(())
}

async fn run_sync(manager: &Manager, opts: SyncOptions) -> Result<()> {
    let report = with_spinner(
        format!("sync {}", opts.workspace),
        manager.sync(
            &opts.workspace,
            opts.message.as_deref(),
            opts.branch.as_deref(),
        ),
    )
    .await??;
    info!("synced {}: {report:?}", opts.workspace);

    Ok(())
}

async fn run_status(manager: &Manager, opts: WorkspaceOptions) -> Result<()> {
    let report = manager.status(&opts.workspace).await?;
    println!("{}  {}", report.address, report.status);
    for file in &report.files {
        println!("  {:<16} {} -> {}", file.state.to_string(), file.dst, file.src);
    }
    if !report.changes.trim().is_empty() {
        println!();
        print!("{}", report.changes);
    }

    Ok(())
}

fn run_activate(manager: &Manager, opts: FileOptions) -> Result<()> {
    for file in opts.files {
        if let Transition::LinkedWithBackup(backup) = manager.activate(&file)? {
            info!("original of {file} kept at {:?}", backup.display());
        }
    }

    Ok(())
}

fn run_deactivate(manager: &Manager, opts: FileOptions) -> Result<()> {
    for file in opts.files {
        if !manager.deactivate(&file)? {
            info!("{file} was not linked");
        }
    }

    Ok(())
}

fn run_restore(manager: &Manager, opts: FileOptions) -> Result<()> {
    for file in opts.files {
        manager.restore(&file)?;
    }

    Ok(())
}

async fn run_remove(manager: &Manager, opts: FileOptions) -> Result<()> {
    for file in opts.files {
        manager.remove(&file).await?;
    }

    Ok(())
}

async fn run_delete(manager: &Manager, opts: DeleteOptions) -> Result<()> {
    for file in opts.files {
        manager.delete(&file, opts.yes, &InquirePrompter).await?;
    }

    Ok(())
}

fn run_install_hooks(manager: &Manager, opts: WorkspaceOptions) -> Result<()> {
    manager.install_hooks(&opts.workspace)?;
    Ok(())
}

fn run_encrypt(manager: &Manager, opts: FileOptions) -> Result<()> {
    for file in opts.files {
        manager.encrypt(&file)?;
    }

    Ok(())
}

fn run_decrypt(manager: &Manager, opts: FileOptions) -> Result<()> {
    for file in opts.files {
        manager.decrypt(&file)?;
    }

    Ok(())
}

async fn run_cd(manager: &mut Manager, settings_path: &Path, opts: CdOptions) -> Result<()> {
    let report = manager
        .cd(&opts.context, opts.workspace.as_deref())
        .await?;
    for skipped in &report.skipped {
        warn!("could not link {skipped}");
    }
    save_settings(settings_path, manager.settings())?;

    Ok(())
}
