//! Demo workspace served by the host.
//!
//! One [`StateRoot`] shared by every session, two slices:
//!
//! - `workspace` (warm): the workspace name and document count
//! - `documents` (hot): entity deltas keyed by document id
//!
//! `workspace.reload` starts a new epoch and replaces every document, which
//! tells the surface to drop anything it merged before. Every reloaded
//! document gets a higher version, so the next delta lists all of them.

use bridge_core::push::{EntitySlice, PlanSpec, PushTransport, Slice, StateRoot};
use bridge_core::{BridgeConfig, BridgeController, HandlerError};

use common::wire::{PushLevel, PushOp, StoreKey};

use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

pub const WORKSPACE_STORE: StoreKey = StoreKey::new("workspace");
pub const DOCUMENTS_STORE: StoreKey = StoreKey::new("documents");

const MAX_NAME_LEN: usize = 128;

#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub name: String,
    pub epoch: u64,
    pub documents: HashMap<String, Document>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub title: String,
    pub body: String,
    pub version: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceSummary {
    name: String,
    document_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct RenameParams {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpsertParams {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveParams {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReloadParams {
    /// Replacement document set; absent reloads the current documents.
    #[serde(default)]
    pub documents: Option<Vec<UpsertParams>>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResult {
    pub id: String,
    pub version: u64,
}

impl Workspace {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Insert or update a document. Returns the version it now has.
    ///
    /// Unchanged content keeps its version so it stays out of the next delta.
    pub fn upsert(&mut self, id: &str, title: String, body: String) -> u64 {
        match self.documents.get_mut(id) {
            Some(document) if document.title == title && document.body == body => document.version,
            Some(document) => {
                document.title = title;
                document.body = body;
                document.version += 1;
                document.version
            }
            None => {
                self.documents.insert(
                    id.to_string(),
                    Document {
                        title,
                        body,
                        version: 1,
                    },
                );
                1
            }
        }
    }

    /// Start a new epoch with a fresh document set. Returns the new epoch.
    pub fn reload(&mut self, documents: Vec<(String, String, String)>) -> u64 {
        let previous = std::mem::take(&mut self.documents);
        for (id, title, body) in documents {
            let version = previous.get(&id).map_or(1, |document| document.version + 1);
            self.documents.insert(
                id,
                Document {
                    title,
                    body,
                    version,
                },
            );
        }
        self.epoch += 1;
        self.epoch
    }
}

/// The push plan every session runs against `state`.
pub fn plan_spec(state: Arc<StateRoot<Workspace>>) -> PlanSpec<Workspace> {
    PlanSpec::builder("workspace", state)
        .slice(
            Slice::new("workspace", WORKSPACE_STORE, PushLevel::Warm, |w: &Workspace| {
                WorkspaceSummary {
                    name: w.name.clone(),
                    document_count: w.documents.len(),
                }
            })
            .with_op(PushOp::Replace),
        )
        .slice(EntitySlice::new(
            "documents",
            DOCUMENTS_STORE,
            PushLevel::Hot,
            |w: &Workspace| w.documents.clone(),
            |document: &Document| document.version,
            |id: &String| id.clone(),
        ))
        .epoch(|w: &Workspace| w.epoch)
        .build()
}

/// Build a session controller with the workspace plan and command handlers.
pub fn controller<T: PushTransport>(
    config: &BridgeConfig,
    state: &Arc<StateRoot<Workspace>>,
    transport: Arc<T>,
) -> BridgeController<Workspace, T> {
    let rename_state = Arc::clone(state);
    let upsert_state = Arc::clone(state);
    let remove_state = Arc::clone(state);
    let reload_state = Arc::clone(state);

    BridgeController::builder(config, transport)
        .plan(plan_spec(Arc::clone(state)))
        .handler("workspace.rename", move |params: RenameParams| {
            let state = Arc::clone(&rename_state);
            async move { rename(&state, params).await }
        })
        .handler("documents.upsert", move |params: UpsertParams| {
            let state = Arc::clone(&upsert_state);
            async move { upsert(&state, params).await }
        })
        .handler("documents.remove", move |params: RemoveParams| {
            let state = Arc::clone(&remove_state);
            async move { remove(&state, params).await }
        })
        .handler("workspace.reload", move |params: ReloadParams| {
            let state = Arc::clone(&reload_state);
            async move { Ok::<_, HandlerError>(reload(&state, params).await) }
        })
        .build()
}

async fn rename(state: &StateRoot<Workspace>, params: RenameParams) -> Result<String, HandlerError> {
    let name = params.name.trim().to_string();
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(HandlerError::invalid_params(format!(
            "name must be 1-{MAX_NAME_LEN} characters"
        )));
    }

    state.mutate(|w| w.name = name.clone()).await;
    info!("Workspace renamed to '{}'", name);
    Ok(name)
}

async fn upsert(
    state: &StateRoot<Workspace>,
    params: UpsertParams,
) -> Result<UpsertResult, HandlerError> {
    if params.id.is_empty() {
        return Err(HandlerError::invalid_params("id cannot be empty"));
    }

    let UpsertParams { id, title, body } = params;
    let version = state.mutate(|w| w.upsert(&id, title, body)).await;
    Ok(UpsertResult { id, version })
}

async fn remove(state: &StateRoot<Workspace>, params: RemoveParams) -> Result<bool, HandlerError> {
    let removed = state
        .mutate(|w| w.documents.remove(&params.id).is_some())
        .await;
    if !removed {
        return Err(HandlerError::failed(format!(
            "no document with id '{}'",
            params.id
        )));
    }
    Ok(true)
}

async fn reload(state: &StateRoot<Workspace>, params: ReloadParams) -> u64 {
    let epoch = state
        .mutate(|w| {
            let documents = match params.documents {
                Some(documents) => documents
                    .into_iter()
                    .map(|document| (document.id, document.title, document.body))
                    .collect(),
                None => w
                    .documents
                    .iter()
                    .map(|(id, document)| {
                        (id.clone(), document.title.clone(), document.body.clone())
                    })
                    .collect(),
            };
            w.reload(documents)
        })
        .await;
    info!("Workspace reloaded at epoch {}", epoch);
    epoch
}
