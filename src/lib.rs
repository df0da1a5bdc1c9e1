//! Joke recommendation service
//!
//! Serves bias-adjusted rating predictions and top-N recommendations backed by
//! a pre-trained rating model, and keeps each user's three most recent
//! ratings in a JSON file.

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
