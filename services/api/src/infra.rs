use gig_market::error::AppError;
use gig_market::marketplace::{
    load_seed_from_path, ApplicationService, ImportSummary, InMemoryStore, InMemoryWorkerDirectory,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-process marketplace backing the service and the demo.
pub(crate) struct Marketplace {
    pub(crate) service: Arc<ApplicationService<InMemoryStore>>,
    pub(crate) workers: Arc<InMemoryWorkerDirectory>,
}

impl Marketplace {
    pub(crate) fn in_memory() -> Self {
        Self {
            service: Arc::new(ApplicationService::new(Arc::new(InMemoryStore::default()))),
            workers: Arc::new(InMemoryWorkerDirectory::default()),
        }
    }

    /// Load and store a seed file. Nothing is stored if any record is rejected.
    pub(crate) fn seed_from(&self, path: &Path) -> Result<ImportSummary, AppError> {
        let batch = load_seed_from_path(path)?;
        Ok(self.service.import(batch)?)
    }
}
