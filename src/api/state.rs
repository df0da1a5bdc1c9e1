use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    config::Config,
    services::{providers, providers::RatingPredictor, JokeCatalog, ScoringService},
    store::RatingStore,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<RatingStore>>,
    pub scoring: ScoringService,
}

impl AppState {
    /// Creates the state from already loaded parts
    pub fn new(
        store: RatingStore,
        predictor: Option<Arc<dyn RatingPredictor>>,
        catalog: Option<JokeCatalog>,
    ) -> Self {
        let store = Arc::new(RwLock::new(store));
        let scoring = ScoringService::new(store.clone(), predictor, catalog.map(Arc::new));
        Self { store, scoring }
    }

    /// Loads the ratings file, the model and the joke catalog
    ///
    /// A model or catalog that fails to load is logged and left out; the
    /// endpoints that need it report it as unavailable.
    pub async fn from_config(config: &Config) -> Self {
        let store = RatingStore::load(&config.ratings_file).await;

        let predictor = match providers::load_predictor(config).await {
            Ok(predictor) => Some(predictor),
            Err(e) => {
                tracing::error!(error = %e, "Rating model not available");
                None
            }
        };

        let catalog = load_catalog(&config.jokes_file).await;

        Self::new(store, predictor, catalog)
    }

    pub fn catalog(&self) -> Option<&JokeCatalog> {
        self.scoring.catalog()
    }
}

async fn load_catalog(path: &Path) -> Option<JokeCatalog> {
    match JokeCatalog::from_csv_path(path).await {
        Ok(catalog) => {
            tracing::info!(path = %path.display(), jokes = catalog.len(), "Loaded joke catalog");
            Some(catalog)
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Joke catalog not available");
            None
        }
    }
}
