use std::sync::Arc;

use crate::ai::manager::ModelManager;
use crate::config::Config;
use crate::interview::selector::SeededSelector;
use crate::jobs::IngestJobTracker;
use crate::store::InterviewStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Postgres when `DATABASE_URL` is set, in-memory otherwise.
    pub store: Arc<dyn InterviewStore>,
    pub models: Arc<ModelManager>,
    pub jobs: Arc<IngestJobTracker>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn InterviewStore>, models: ModelManager, config: Config) -> Self {
        Self {
            store,
            models: Arc::new(models),
            jobs: Arc::new(IngestJobTracker::new(config.ingest_job_history)),
            config,
        }
    }

    /// Fresh template selector for one request. Seeded runs repeat exactly.
    pub fn selector(&self) -> SeededSelector {
        SeededSelector::new(self.config.template_seed)
    }
}
