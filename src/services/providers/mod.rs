//! Rating model abstraction
//!
//! The model that scores (user, joke) pairs is pre-trained elsewhere and
//! treated as a black box. It is either loaded from a local artifact or reached
//! over HTTP, behind the same trait.

use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    error::AppResult,
    models::{JokeId, UserId},
};

pub mod remote;
pub mod svd;

pub use remote::RemoteModel;
pub use svd::SvdModel;

/// Trait for pre-trained rating models
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RatingPredictor: Send + Sync {
    /// Raw rating estimate for a user and joke, before any bias adjustment
    async fn estimate(&self, user_id: UserId, joke_id: JokeId) -> AppResult<f64>;

    /// Model name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Builds the configured model
///
/// `MODEL_URL` selects the remote model server; otherwise the artifact at
/// `MODEL_PATH` is loaded.
pub async fn load_predictor(config: &Config) -> AppResult<Arc<dyn RatingPredictor>> {
    if let Some(url) = &config.model_url {
        let model = RemoteModel::new(url, Duration::from_millis(config.model_timeout_ms))?;
        tracing::info!(url = %url, "Using remote rating model");
        return Ok(Arc::new(model));
    }

    let model = SvdModel::from_path(&config.model_path).await?;
    tracing::info!(
        path = %config.model_path.display(),
        users = model.user_count(),
        jokes = model.item_count(),
        "Loaded SVD model"
    );
    Ok(Arc::new(model))
}
