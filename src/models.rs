//! Domain types shared across the matcher, the blacklists and the
//! recommender.

use serde::{Deserialize, Serialize};

/// Physical media kind as labelled by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "DVD")]
    Dvd,
    #[serde(rename = "CD")]
    Cd,
    #[serde(rename = "Buch")]
    Book,
}

impl MediaType {
    /// Catalog-facing label, used in search queries and persisted entries.
    pub fn label(self) -> &'static str {
        match self {
            MediaType::Dvd => "DVD",
            MediaType::Cd => "CD",
            MediaType::Book => "Buch",
        }
    }
}

/// Recommendation category. Each category keeps its own blacklist file and
/// its own suggested/rejected sets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Films,
    Albums,
    Books,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Films, Category::Albums, Category::Books];

    /// Stable key used in file names and persisted maps.
    pub fn key(self) -> &'static str {
        match self {
            Category::Films => "films",
            Category::Albums => "albums",
            Category::Books => "books",
        }
    }
}

/// A work proposed for recommendation, before its availability is checked.
///
/// Produced by the list-source collaborators; the core never mutates it,
/// only copies it into an [`AcceptedItem`] on acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub title: String,
    pub author: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub source: String,
}

/// One result row from the catalog search collaborator. Ephemeral; only
/// facts derived from it (return dates, not-found entries) are persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogHit {
    pub title: String,
    pub author: String,
    pub year: Option<String>,
    pub media_type_label: Option<String>,
    /// Free-form availability/metadata text the heuristics run against.
    pub availability_text: String,
    pub detail_link: Option<String>,
}

/// Which matching strategy produced an author match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedField {
    PersonField,
    FullText,
    TitleField,
    NoAuthorSpecified,
    NoMatch,
}

/// Outcome of matching an expected author against a catalog hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub found: bool,
    pub score: f64,
    pub field: MatchedField,
}

/// A catalog hit annotated with matching scores, as returned by
/// [`crate::matcher::NameMatcher::rank_hits`].
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    pub hit: CatalogHit,
    pub author_score: f64,
    pub title_score: f64,
    pub combined_score: f64,
    pub matched_field: MatchedField,
}

/// An accepted recommendation: the original candidate plus a summary of the
/// availability texts of the hits that confirmed it.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedItem {
    pub candidate: CandidateItem,
    pub availability: String,
}
