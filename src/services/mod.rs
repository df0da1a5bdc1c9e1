pub mod catalog;
pub mod providers;
pub mod scoring;

pub use catalog::JokeCatalog;
pub use scoring::ScoringService;
