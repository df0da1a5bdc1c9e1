pub mod ratings;

pub use ratings::RatingStore;
