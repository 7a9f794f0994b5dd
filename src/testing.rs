// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Test doubles shared by unit tests.

use crate::{
    address::WorkspaceAddress,
    prompt::{PromptError, Prompter},
    remote::{DotfilePayload, MetadataApi, RemoteDotfileDocument, RemoteError},
    vcs::{CommandOutput, CommandRunner, RunError},
};

use std::{
    collections::VecDeque,
    path::Path,
    sync::{Arc, Mutex},
};

#[derive(Debug, Default)]
struct RunnerState {
    calls: Vec<Vec<String>>,
    replies: VecDeque<Result<CommandOutput, RunError>>,
}

/// Command runner replaying scripted replies, succeeding silently once they
/// run out.
#[derive(Debug, Default, Clone)]
pub(crate) struct FakeRunner {
    state: Arc<Mutex<RunnerState>>,
}

impl FakeRunner {
    pub(crate) fn reply_ok(&self, stdout: &str) {
        self.state.lock().unwrap().replies.push_back(Ok(CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
        }));
    }

    pub(crate) fn reply_exit(&self, code: i32, stderr: &str) {
        self.state
            .lock()
            .unwrap()
            .replies
            .push_back(Err(RunError::NonZeroExit {
                program: "git".into(),
                code: Some(code),
                stderr: stderr.to_string(),
            }));
    }

    pub(crate) fn calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        _cwd: Option<&Path>,
    ) -> Result<CommandOutput, RunError> {
        let mut state = self.state.lock().unwrap();
        let mut call = vec![program.to_string()];
        call.extend(args.iter().cloned());
        state.calls.push(call);
        state.replies.pop_front().unwrap_or_else(|| Ok(CommandOutput::default()))
    }
}

#[derive(Debug, Default)]
struct MetadataState {
    documents: Vec<RemoteDotfileDocument>,
    offline: bool,
    next_id: usize,
    created: Vec<(String, Option<String>, DotfilePayload)>,
    removed: Vec<(String, String)>,
    deleted: Vec<String>,
}

/// In-memory metadata service.
#[derive(Debug, Default, Clone)]
pub(crate) struct FakeMetadata {
    state: Arc<Mutex<MetadataState>>,
}

impl FakeMetadata {
    pub(crate) fn with_documents(documents: Vec<RemoteDotfileDocument>) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().documents = documents;
        fake
    }

    pub(crate) fn offline() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().offline = true;
        fake
    }

    pub(crate) fn created(&self) -> Vec<(String, Option<String>, DotfilePayload)> {
        self.state.lock().unwrap().created.clone()
    }

    pub(crate) fn removed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().removed.clone()
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.state.lock().unwrap().offline {
            return Err(RemoteError::Unavailable("offline".into()));
        }
        Ok(())
    }
}

pub(crate) fn document(doc_id: &str, local: &str, repo: &str, priority: i64) -> RemoteDotfileDocument {
    RemoteDotfileDocument {
        doc_id: doc_id.into(),
        payload: DotfilePayload {
            local_path: local.into(),
            repo_path: repo.into(),
            kind: crate::store::FileKind::File,
            priority,
        },
    }
}

impl MetadataApi for FakeMetadata {
    async fn documents_by_context(
        &self,
        _context: &str,
    ) -> Result<Vec<RemoteDotfileDocument>, RemoteError> {
        self.check()?;
        Ok(self.state.lock().unwrap().documents.clone())
    }

    async fn documents_by_workspace(
        &self,
        _workspace: &WorkspaceAddress,
    ) -> Result<Vec<RemoteDotfileDocument>, RemoteError> {
        self.check()?;
        Ok(self.state.lock().unwrap().documents.clone())
    }

    async fn create_document(
        &self,
        workspace: &WorkspaceAddress,
        context: Option<&str>,
        payload: &DotfilePayload,
    ) -> Result<String, RemoteError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let doc_id = format!("doc-{}", state.next_id);
        state.created.push((
            workspace.key(),
            context.map(str::to_owned),
            payload.clone(),
        ));
        Ok(doc_id)
    }

    async fn remove_document(&self, doc_id: &str, context: &str) -> Result<(), RemoteError> {
        self.check()?;
        self.state
            .lock()
            .unwrap()
            .removed
            .push((doc_id.to_string(), context.to_string()));
        Ok(())
    }

    async fn delete_document(&self, doc_id: &str) -> Result<(), RemoteError> {
        self.check()?;
        self.state.lock().unwrap().deleted.push(doc_id.to_string());
        Ok(())
    }
}

/// Prompter answering from a script.
#[derive(Debug, Default, Clone)]
pub(crate) struct ScriptedPrompter {
    pub(crate) confirm: bool,
    pub(crate) secret: Option<String>,
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, _message: &str) -> Result<bool, PromptError> {
        Ok(self.confirm)
    }

    fn secret(&self, message: &str) -> Result<String, PromptError> {
        self.secret
            .clone()
            .ok_or_else(|| PromptError::NoAnswer(message.to_string()))
    }
}
