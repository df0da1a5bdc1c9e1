use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod joke;
mod rating;

pub use joke::{Joke, MISSING_JOKE_TEXT};
pub use rating::{RatingEvent, UserHistory, HISTORY_CAPACITY};

pub type UserId = i64;
pub type JokeId = i64;

/// Lowest rating a user may submit
pub const MIN_RATING: f64 = 0.0;
/// Highest rating a user may submit
pub const MAX_RATING: f64 = 10.0;

/// Bounds of every adjusted prediction
pub const MIN_PREDICTION: f64 = -10.0;
pub const MAX_PREDICTION: f64 = 10.0;

/// Rounds to `decimals` places for presentation
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ============================================================================
// Scoring results
// ============================================================================

/// Bias-adjusted prediction for one (user, joke) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub user_id: UserId,
    pub joke_id: JokeId,
    /// Raw model estimate
    pub base: f64,
    /// User bias applied to the estimate
    pub bias: f64,
    /// Final score, clamped to [-10, 10]
    pub adjusted: f64,
    pub user_ratings_count: usize,
}

/// A ranked joke with its text attached
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Recommendation {
    pub joke_id: JokeId,
    pub predicted_rating: f64,
    pub joke_text: String,
}

/// Outcome of ranking the whole catalog for one user
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationSet {
    pub user_id: UserId,
    pub recommendations: Vec<Recommendation>,
    pub user_bias: f64,
    pub user_ratings_count: usize,
    /// Number of jokes the model produced a score for
    pub total_jokes_evaluated: usize,
}

/// Result of storing one rating
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRating {
    pub event: RatingEvent,
    /// History length after the append
    pub total_ratings: usize,
}

// ============================================================================
// HTTP payloads
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    pub user_id: UserId,
    pub joke_id: JokeId,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub user_id: UserId,
    pub joke_id: JokeId,
    pub predicted_rating: f64,
    pub base_prediction: f64,
    pub user_bias: f64,
    pub user_ratings_count: usize,
}

impl From<Prediction> for PredictResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            user_id: prediction.user_id,
            joke_id: prediction.joke_id,
            predicted_rating: round_to(prediction.adjusted, 3),
            base_prediction: round_to(prediction.base, 3),
            user_bias: round_to(prediction.bias, 3),
            user_ratings_count: prediction.user_ratings_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub user_id: UserId,
    pub joke_id: JokeId,
    pub rating: f64,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub message: String,
    pub user_id: UserId,
    pub joke_id: JokeId,
    pub rating: f64,
    pub total_ratings: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub user_id: UserId,
    pub top_n: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub user_id: UserId,
    pub recommendations: Vec<Recommendation>,
    pub user_bias: f64,
    pub user_ratings_count: usize,
    pub total_jokes_evaluated: usize,
}

impl From<RecommendationSet> for RecommendResponse {
    fn from(set: RecommendationSet) -> Self {
        Self {
            user_id: set.user_id,
            recommendations: set.recommendations,
            user_bias: round_to(set.user_bias, 3),
            user_ratings_count: set.user_ratings_count,
            total_jokes_evaluated: set.total_jokes_evaluated,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: UserId,
}

/// One past rating as shown to the user
#[derive(Debug, Serialize)]
pub struct RatedJoke {
    pub joke_id: JokeId,
    pub rating: f64,
    pub timestamp: DateTime<Utc>,
    pub joke_text: String,
}

#[derive(Debug, Serialize)]
pub struct UserRatingsResponse {
    pub user_id: UserId,
    pub ratings: Vec<RatedJoke>,
    pub total_ratings: usize,
    pub average_rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_users_with_ratings: usize,
    pub total_ratings_stored: usize,
    pub jokes_available: usize,
    pub model_loaded: bool,
    pub data_loaded: bool,
}
