//! Model-handle cache.
//!
//! One `ModelManager` lives in `AppState`. The first caller of [`ModelManager::handles`]
//! loads the collaborators; every later caller (including ones racing the first) gets
//! the same `Arc`. The async mutex is held across the load, so concurrent first calls
//! converge on one loaded instance.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::ai::{SentimentModel, TextGenerator, TopicClassifier};
use crate::config::Config;
use crate::llm_client::LlmClient;

/// Backend label for handles that carry no collaborators.
pub const TEMPLATE_BACKEND: &str = "template";

/// Loaded collaborators. Any of them may be absent; callers degrade to templates.
pub struct ModelHandles {
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub classifier: Option<Arc<dyn TopicClassifier>>,
    pub sentiment: Option<Arc<dyn SentimentModel>>,
    pub backend: String,
    pub loaded_at: DateTime<Utc>,
    pub load_time_ms: u64,
}

impl ModelHandles {
    pub fn template_only() -> Self {
        Self {
            generator: None,
            classifier: None,
            sentiment: None,
            backend: TEMPLATE_BACKEND.to_string(),
            loaded_at: Utc::now(),
            load_time_ms: 0,
        }
    }

    pub fn from_llm(client: LlmClient) -> Self {
        let client = Arc::new(client);
        Self {
            generator: Some(client.clone()),
            classifier: Some(client.clone()),
            sentiment: Some(client),
            backend: "anthropic".to_string(),
            loaded_at: Utc::now(),
            load_time_ms: 0,
        }
    }
}

type Loader = Box<dyn Fn() -> Result<ModelHandles> + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub is_initialized: bool,
    pub backend: Option<String>,
    pub model_name: Option<String>,
    pub generator_available: bool,
    pub classifier_available: bool,
    pub sentiment_available: bool,
    pub loaded_at: Option<DateTime<Utc>>,
    pub load_time_ms: Option<u64>,
    pub load_count: usize,
}

pub struct ModelManager {
    loader: Loader,
    slot: Mutex<Option<Arc<ModelHandles>>>,
    loads: AtomicUsize,
}

impl ModelManager {
    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<ModelHandles> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            slot: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// Builds the manager from config: Anthropic-backed when a key is present and
    /// the backend is enabled, template-only otherwise.
    pub fn from_config(config: &Config) -> Self {
        match (config.enable_model_backend, config.anthropic_api_key.clone()) {
            (true, Some(api_key)) => Self::with_loader(move || {
                let client = LlmClient::new(api_key.clone())?;
                Ok(ModelHandles::from_llm(client))
            }),
            (true, None) => {
                warn!("ANTHROPIC_API_KEY not set; model-backed features will use templates");
                Self::with_loader(|| Ok(ModelHandles::template_only()))
            }
            (false, _) => Self::with_loader(|| Ok(ModelHandles::template_only())),
        }
    }

    #[cfg(test)]
    pub fn template_only() -> Self {
        Self::with_loader(|| Ok(ModelHandles::template_only()))
    }

    /// Returns the shared handles, loading them on first use. A failed load is
    /// cached as template-only so requests don't retry it; use
    /// [`ModelManager::initialize`] with `force_reload` to try again.
    pub async fn handles(&self) -> Arc<ModelHandles> {
        let mut slot = self.slot.lock().await;
        if let Some(handles) = slot.as_ref() {
            return handles.clone();
        }
        let handles = match self.load() {
            Ok(handles) => handles,
            Err(e) => {
                warn!("Model load failed, continuing template-only: {e:#}");
                ModelHandles::template_only()
            }
        };
        let handles = Arc::new(handles);
        *slot = Some(handles.clone());
        handles
    }

    /// Loads handles if needed (or unconditionally with `force_reload`).
    /// Unlike [`ModelManager::handles`], a load failure is returned to the caller.
    pub async fn initialize(&self, force_reload: bool) -> Result<Arc<ModelHandles>> {
        let mut slot = self.slot.lock().await;
        if !force_reload {
            if let Some(handles) = slot.as_ref() {
                info!("Model handles already initialized");
                return Ok(handles.clone());
            }
        }
        let handles = Arc::new(self.load()?);
        *slot = Some(handles.clone());
        Ok(handles)
    }

    pub async fn status(&self) -> ModelStatus {
        let slot = self.slot.lock().await;
        let load_count = self.loads.load(Ordering::SeqCst);
        match slot.as_ref() {
            Some(h) => ModelStatus {
                is_initialized: true,
                backend: Some(h.backend.clone()),
                model_name: h.generator.as_ref().map(|g| g.model_name().to_string()),
                generator_available: h.generator.is_some(),
                classifier_available: h.classifier.is_some(),
                sentiment_available: h.sentiment.is_some(),
                loaded_at: Some(h.loaded_at),
                load_time_ms: Some(h.load_time_ms),
                load_count,
            },
            None => ModelStatus {
                is_initialized: false,
                backend: None,
                model_name: None,
                generator_available: false,
                classifier_available: false,
                sentiment_available: false,
                loaded_at: None,
                load_time_ms: None,
                load_count,
            },
        }
    }

    fn load(&self) -> Result<ModelHandles> {
        info!("Loading model handles...");
        let started = Instant::now();
        self.loads.fetch_add(1, Ordering::SeqCst);
        let mut handles = (self.loader)()?;
        handles.load_time_ms = started.elapsed().as_millis() as u64;
        handles.loaded_at = Utc::now();
        info!(
            "Model handles loaded (backend: {}) in {}ms",
            handles.backend, handles.load_time_ms
        );
        Ok(handles)
    }
}
