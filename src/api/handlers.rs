use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{
        round_to, PredictQuery, PredictResponse, RateRequest, RateResponse, RatedJoke,
        RecommendQuery, RecommendResponse, StatsResponse, UserQuery, UserRatingsResponse,
        MISSING_JOKE_TEXT,
    },
    services::scoring::DEFAULT_TOP_N,
};

use super::AppState;

/// Characters of joke text shown next to a past rating
const PREVIEW_CHARS: usize = 100;

/// Service description and endpoint index
pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "Joke recommendation API",
        "status": "active",
        "endpoints": {
            "/predict/jokes": "GET - Predict a user's rating for a joke",
            "/rate/joke": "POST - Rate a joke",
            "/recommend/jokes": "GET - Best jokes for a user",
            "/user/ratings": "GET - A user's latest ratings",
            "/stats": "GET - Service statistics"
        }
    }))
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Predict a user's rating for one joke
pub async fn predict_joke(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    query: Result<Query<PredictQuery>, QueryRejection>,
) -> AppResult<Json<PredictResponse>> {
    let Query(query) = query.map_err(|_| {
        AppError::InvalidInput("user_id and joke_id must be integers".to_string())
    })?;

    let prediction = state.scoring.predict(query.user_id, query.joke_id).await?;

    tracing::info!(
        request_id = %request_id,
        user_id = query.user_id,
        joke_id = query.joke_id,
        adjusted = prediction.adjusted,
        "Prediction served"
    );

    Ok(Json(PredictResponse::from(prediction)))
}

/// Store a user's rating for a joke
pub async fn rate_joke(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<RateRequest>, JsonRejection>,
) -> AppResult<Json<RateResponse>> {
    let Json(request) = payload.map_err(|_| {
        AppError::InvalidInput(
            "invalid data: user_id (int), joke_id (int) and rating (float) are required"
                .to_string(),
        )
    })?;

    let recorded = state
        .store
        .write()
        .await
        .record(request.user_id, request.joke_id, request.rating, Utc::now())
        .await?;

    tracing::info!(
        request_id = %request_id,
        user_id = request.user_id,
        joke_id = request.joke_id,
        rating = request.rating,
        total_ratings = recorded.total_ratings,
        "Rating stored"
    );

    Ok(Json(RateResponse {
        message: "Rating saved".to_string(),
        user_id: request.user_id,
        joke_id: recorded.event.joke_id,
        rating: recorded.event.rating,
        total_ratings: recorded.total_ratings,
        timestamp: recorded.event.timestamp,
    }))
}

/// Best jokes for a user
pub async fn recommend_jokes(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    query: Result<Query<RecommendQuery>, QueryRejection>,
) -> AppResult<Json<RecommendResponse>> {
    let Query(query) = query.map_err(|_| {
        AppError::InvalidInput(
            "user_id must be an integer and top_n a non-negative integer".to_string(),
        )
    })?;
    let top_n = query.top_n.unwrap_or(DEFAULT_TOP_N);

    tracing::info!(
        request_id = %request_id,
        user_id = query.user_id,
        top_n,
        "Processing recommendation request"
    );

    let set = state.scoring.recommend(query.user_id, top_n).await?;
    Ok(Json(RecommendResponse::from(set)))
}

/// A user's latest ratings with a rolling average
pub async fn user_ratings(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> AppResult<Json<UserRatingsResponse>> {
    let Query(query) = query
        .map_err(|_| AppError::InvalidInput("user_id must be an integer".to_string()))?;

    let store = state.store.read().await;
    if !store.contains_user(query.user_id) {
        return Ok(Json(UserRatingsResponse {
            user_id: query.user_id,
            ratings: Vec::new(),
            total_ratings: 0,
            average_rating: 0.0,
            message: Some("User has no previous ratings".to_string()),
        }));
    }

    let catalog = state.catalog();
    let ratings: Vec<RatedJoke> = store
        .history_of(query.user_id)
        .into_iter()
        .map(|event| RatedJoke {
            joke_id: event.joke_id,
            rating: event.rating,
            timestamp: event.timestamp,
            joke_text: catalog
                .and_then(|c| c.get(event.joke_id))
                .map(|joke| joke.preview(PREVIEW_CHARS))
                .unwrap_or_else(|| MISSING_JOKE_TEXT.to_string()),
        })
        .collect();

    Ok(Json(UserRatingsResponse {
        user_id: query.user_id,
        total_ratings: ratings.len(),
        average_rating: store
            .average_of(query.user_id)
            .map(|avg| round_to(avg, 2))
            .unwrap_or(0.0),
        ratings,
        message: None,
    }))
}

/// Service-wide counters
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let store = state.store.read().await;
    let catalog = state.catalog();

    Json(StatsResponse {
        total_users_with_ratings: store.user_count(),
        total_ratings_stored: store.total_ratings(),
        jokes_available: catalog.map_or(0, |c| c.len()),
        model_loaded: state.scoring.model_loaded(),
        data_loaded: catalog.is_some(),
    })
}
