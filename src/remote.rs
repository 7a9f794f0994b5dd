// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote dotfile metadata.
//!
//! The remote service keeps one metadata document per tracked dotfile,
//! tagged with the `dotfile` schema. These documents tell dotswitch which
//! files belong to a given context and in what order to activate them. They
//! only mirror the local index; any failure to reach them degrades to local
//! behavior.

use crate::{address::WorkspaceAddress, store::FileKind};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, instrument};

/// Schema tag of dotfile documents.
pub const DOTFILE_SCHEMA: &str = "dotfile";

/// Payload of a dotfile document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DotfilePayload {
    /// Canonical source path.
    pub local_path: String,

    /// Repository-relative destination path.
    pub repo_path: String,

    #[serde(rename = "type")]
    pub kind: FileKind,

    /// Activation order, higher goes first.
    #[serde(default)]
    pub priority: i64,
}

/// Dotfile document addressed by its remote id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDotfileDocument {
    pub doc_id: String,
    pub payload: DotfilePayload,
}

/// Layer of indirection for the remote metadata service.
pub trait MetadataApi: Send + Sync {
    /// Fetch dotfile documents attached to a context.
    fn documents_by_context(
        &self,
        context: &str,
    ) -> impl Future<Output = Result<Vec<RemoteDotfileDocument>>> + Send;

    /// Fetch dotfile documents owned by a workspace.
    fn documents_by_workspace(
        &self,
        workspace: &WorkspaceAddress,
    ) -> impl Future<Output = Result<Vec<RemoteDotfileDocument>>> + Send;

    /// Create dotfile document, optionally attached to a context.
    ///
    /// Returns the id of the new document.
    fn create_document(
        &self,
        workspace: &WorkspaceAddress,
        context: Option<&str>,
        payload: &DotfilePayload,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Detach dotfile document from one context.
    fn remove_document(
        &self,
        doc_id: &str,
        context: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete dotfile document entirely.
    fn delete_document(&self, doc_id: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Wire envelope of any remote document.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct Envelope<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    schema: String,
    data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

/// Metadata API spoken over REST.
#[derive(Debug, Clone)]
pub struct RestMetadataApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RestMetadataApi {
    /// Construct new REST client against base URL of remote service.
    pub fn new(base_url: impl AsRef<str>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/v2/{path}", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch(&self, request: reqwest::RequestBuilder) -> Result<Vec<RemoteDotfileDocument>> {
        let envelopes: Vec<Envelope<serde_json::Value>> = self
            .authorize(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        envelopes
            .into_iter()
            .filter(|envelope| envelope.schema == DOTFILE_SCHEMA)
            .map(|envelope| -> Result<RemoteDotfileDocument> {
                let doc_id = envelope.id.ok_or(RemoteError::MissingId)?;
                let payload = serde_json::from_value(envelope.data)?;
                Ok(RemoteDotfileDocument { doc_id, payload })
            })
            .collect()
    }
}

impl MetadataApi for RestMetadataApi {
    #[instrument(skip(self), level = "debug")]
    async fn documents_by_context(&self, context: &str) -> Result<Vec<RemoteDotfileDocument>> {
        let request = self
            .client
            .get(self.url("contexts/documents"))
            .query(&[("path", context), ("schema", DOTFILE_SCHEMA)]);
        self.fetch(request).await
    }

    #[instrument(skip(self, workspace), fields(workspace = %workspace), level = "debug")]
    async fn documents_by_workspace(
        &self,
        workspace: &WorkspaceAddress,
    ) -> Result<Vec<RemoteDotfileDocument>> {
        let request = self
            .client
            .get(self.url(&format!("workspaces/{}/documents", workspace.resource())))
            .query(&[("schema", DOTFILE_SCHEMA)]);
        self.fetch(request).await
    }

    #[instrument(skip(self, workspace, payload), fields(workspace = %workspace), level = "debug")]
    async fn create_document(
        &self,
        workspace: &WorkspaceAddress,
        context: Option<&str>,
        payload: &DotfilePayload,
    ) -> Result<String> {
        let body = Envelope {
            id: None,
            schema: DOTFILE_SCHEMA.to_string(),
            data: payload,
            context: context.map(str::to_owned),
        };
        let created: Envelope<serde_json::Value> = self
            .authorize(
                self.client
                    .post(self.url(&format!("workspaces/{}/documents", workspace.resource())))
                    .json(&body),
            )
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let doc_id = created.id.ok_or(RemoteError::MissingId)?;
        debug!("created dotfile document {doc_id}");

        Ok(doc_id)
    }

    #[instrument(skip(self), level = "debug")]
    async fn remove_document(&self, doc_id: &str, context: &str) -> Result<()> {
        self.authorize(
            self.client
                .delete(self.url(&format!("contexts/documents/{doc_id}")))
                .query(&[("path", context)]),
        )
        .send()
        .await?
        .error_for_status()?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_document(&self, doc_id: &str) -> Result<()> {
        self.authorize(self.client.delete(self.url(&format!("documents/{doc_id}"))))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

/// Remote metadata error types.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Request to remote service fails.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Document payload does not match dotfile schema.
    #[error(transparent)]
    Payload(#[from] serde_json::Error),

    /// Remote service returns a document without id.
    #[error("remote document carries no id")]
    MissingId,

    /// No remote service is configured.
    #[error("no remote metadata service available: {0}")]
    Unavailable(String),
}

/// Friendly result alias :3
pub type Result<T, E = RemoteError> = std::result::Result<T, E>;
