//! Test doubles shared by unit tests and the router tests under `tests/`.

use crate::config::Config;
use crate::db::GmaoStorage;
use crate::error::GmaoError;
use crate::router::GmaoState;
use crate::service::llm::{LanguageModel, LlmRequest};
use axum::http::StatusCode;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// API key configured by [`test_config`].
pub const TEST_KEY: &str = "test-key";

type Handler = Arc<dyn Fn(&LlmRequest) -> Result<String, GmaoError> + Send + Sync>;

/// Language model answering from per-task scripts.
///
/// Requests for a task with no script fail with [`GmaoError::ModelOutput`].
#[derive(Clone, Default)]
pub struct ScriptedModel {
    handlers: HashMap<&'static str, Handler>,
    gates: HashMap<&'static str, Arc<Notify>>,
    calls: Arc<Mutex<Vec<&'static str>>>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `task` with `response`.
    pub fn on(self, task: &'static str, response: impl Into<String>) -> Self {
        let response = response.into();
        self.on_with(task, move |_| Ok(response.clone()))
    }

    pub fn on_with<F>(mut self, task: &'static str, handler: F) -> Self
    where
        F: Fn(&LlmRequest) -> Result<String, GmaoError> + Send + Sync + 'static,
    {
        self.handlers.insert(task, Arc::new(handler));
        self
    }

    /// Make `task` fail the way an unavailable upstream does.
    pub fn fail(self, task: &'static str) -> Self {
        self.on_with(task, |_| {
            Err(GmaoError::UpstreamStatus(StatusCode::SERVICE_UNAVAILABLE))
        })
    }

    /// Hold every `task` request until `gate` is notified once per request.
    pub fn hold(mut self, task: &'static str, gate: Arc<Notify>) -> Self {
        self.gates.insert(task, gate);
        self
    }

    /// Task labels in call order; stays readable after the model is moved.
    pub fn calls_handle(&self) -> Arc<Mutex<Vec<&'static str>>> {
        self.calls.clone()
    }

    pub fn requests_handle(&self) -> Arc<Mutex<Vec<LlmRequest>>> {
        self.requests.clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn generate<'a>(&'a self, request: LlmRequest) -> BoxFuture<'a, Result<String, GmaoError>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(request.task);
            if let Some(gate) = self.gates.get(request.task) {
                gate.notified().await;
            }
            let result = match self.handlers.get(request.task) {
                Some(handler) => (handler.as_ref())(&request),
                None => Err(GmaoError::ModelOutput(format!(
                    "no script for task `{}`",
                    request.task
                ))),
            };
            self.requests
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(request);
            result
        })
    }
}

/// Defaults with an in-memory database, [`TEST_KEY`], and uploads under `upload_dir`.
pub fn test_config(upload_dir: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.basic.database_url = "sqlite::memory:".to_string();
    cfg.basic.gmao_key = TEST_KEY.to_string();
    cfg.storage.upload_dir = upload_dir.to_path_buf();
    cfg
}

/// Router state over `cfg` and a fresh in-memory database.
pub async fn test_state(cfg: Config, model: ScriptedModel) -> Result<GmaoState, GmaoError> {
    let storage = GmaoStorage::connect(&cfg.basic.database_url).await?;
    Ok(GmaoState::new(cfg, storage, Arc::new(model)))
}
