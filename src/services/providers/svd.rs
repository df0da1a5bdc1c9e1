use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::RatingPredictor;
use crate::{
    error::{AppError, AppResult},
    models::{JokeId, UserId},
};

/// Learned bias and latent factors of one user or joke
#[derive(Debug, Clone, Deserialize)]
pub struct LatentEntry {
    pub bias: f64,
    pub factors: Vec<f64>,
}

/// Matrix-factorization model exported from the training pipeline
///
/// Estimate = global mean + user bias + joke bias + user factors · joke
/// factors, clipped to the rating scale the model was trained on. Terms for
/// an unknown user or joke are left out, so a pair where neither is known
/// falls back to the global mean.
#[derive(Debug, Clone, Deserialize)]
pub struct SvdModel {
    global_mean: f64,
    rating_scale: (f64, f64),
    factors: usize,
    #[serde(default)]
    users: HashMap<UserId, LatentEntry>,
    #[serde(default)]
    items: HashMap<JokeId, LatentEntry>,
}

impl SvdModel {
    pub fn new(global_mean: f64, rating_scale: (f64, f64), factors: usize) -> Self {
        Self {
            global_mean,
            rating_scale,
            factors,
            users: HashMap::new(),
            items: HashMap::new(),
        }
    }

    pub fn with_user(mut self, user_id: UserId, bias: f64, factors: Vec<f64>) -> Self {
        self.users.insert(user_id, LatentEntry { bias, factors });
        self
    }

    pub fn with_item(mut self, joke_id: JokeId, bias: f64, factors: Vec<f64>) -> Self {
        self.items.insert(joke_id, LatentEntry { bias, factors });
        self
    }

    /// Loads a model artifact (JSON)
    pub async fn from_path(path: &Path) -> AppResult<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> AppResult<Self> {
        let model: SvdModel = serde_json::from_str(json)?;
        let (low, high) = model.rating_scale;
        if !(low < high) {
            return Err(AppError::ModelLoad(format!(
                "invalid rating scale [{}, {}]",
                low, high
            )));
        }
        Ok(model)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    fn predict(&self, user_id: UserId, joke_id: JokeId) -> AppResult<f64> {
        let user = self.users.get(&user_id);
        let item = self.items.get(&joke_id);

        let mut estimate = self.global_mean;
        if let Some(user) = user {
            estimate += user.bias;
        }
        if let Some(item) = item {
            estimate += item.bias;
        }
        if let (Some(user), Some(item)) = (user, item) {
            if user.factors.len() != self.factors || item.factors.len() != self.factors {
                return Err(AppError::Prediction(format!(
                    "factor size mismatch for user {} and joke {}",
                    user_id, joke_id
                )));
            }
            estimate += dot(&user.factors, &item.factors);
        }

        let (low, high) = self.rating_scale;
        Ok(estimate.max(low).min(high))
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[async_trait::async_trait]
impl RatingPredictor for SvdModel {
    async fn estimate(&self, user_id: UserId, joke_id: JokeId) -> AppResult<f64> {
        self.predict(user_id, joke_id)
    }

    fn name(&self) -> &'static str {
        "svd"
    }
}
