//! Availability-checked media recommendations from the city library
//! catalog.
//!
//! Curated film, album and book lists are balanced against each other and
//! checked live against the catalog; fruitless lookups are cached in three
//! blacklists so they are not repeated, and user rejections persist across
//! runs. This crate is the decision core only: list scraping, catalog HTML
//! parsing and the GUI live in the consuming application.

pub mod artist_blacklist;
pub mod blacklist;
pub mod borrowed_blacklist;
pub mod collection;
pub mod config;
pub mod matcher;
pub mod models;
pub mod recommender;
pub mod sources;
pub mod state;
pub mod store;

pub use artist_blacklist::ArtistBlacklist;
pub use blacklist::NotFoundBlacklist;
pub use borrowed_blacklist::BorrowedBlacklist;
pub use config::Config;
pub use matcher::NameMatcher;
pub use models::{AcceptedItem, CandidateItem, CatalogHit, Category, MediaType};
pub use recommender::{BalancedRecommender, CatalogSearch, SearchError, Selection};
pub use state::SuggestionState;
pub use store::StoreError;
