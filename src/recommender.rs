//! Balanced recommendation selection against the live catalog.
//!
//! Candidates are grouped by source and serviced in strict round-robin
//! order so no curated list dominates the result. Each surviving candidate
//! costs one catalog search; the blacklists and the suggestion state are
//! consulted first so known-fruitless lookups are never repeated, and the
//! outcome of every search feeds back into them.

use log::{debug, info, warn};
use regex::Regex;
use thiserror::Error;

use crate::artist_blacklist::ArtistBlacklist;
use crate::blacklist::NotFoundBlacklist;
use crate::borrowed_blacklist::BorrowedBlacklist;
use crate::matcher::NameMatcher;
use crate::models::{AcceptedItem, CandidateItem, CatalogHit, Category, MediaType};
use crate::sources;
use crate::state::SuggestionState;

pub const NOT_FOUND_REASON: &str = "Keine Treffer in Bibliothekskatalog";

const AVAILABLE_KEYWORD: &str = "verfügbar";
const BORROWED_KEYWORD: &str = "entliehen";
/// Film media carry the "Uv" notation token in their catalog description.
const FILM_MARKER_PATTERN: &str = r"\bUv\b";
const SUMMARY_MAX_LEN: usize = 300;

/// Failure reported by the catalog search collaborator. Retry and backoff
/// are the collaborator's concern, not handled here.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("catalog transport error: {0}")]
    Transport(String),
}

/// The external catalog search boundary. Implementations perform one
/// (possibly slow, blocking) query and return all hits they can parse.
pub trait CatalogSearch {
    fn search(&self, query: &str) -> Result<Vec<CatalogHit>, SearchError>;
}

/// Whether a catalog description denotes a film medium. Non-film discs
/// share the DVD format but lack the notation token.
pub fn is_film_medium(description: &str) -> bool {
    Regex::new(FILM_MARKER_PATTERN)
        .map(|pattern| pattern.is_match(description))
        .unwrap_or(false)
}

/// Result of one `select` call: the accepted items plus observability data
/// for the caller (final per-source counts and how many searches failed).
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub items: Vec<AcceptedItem>,
    pub per_source: Vec<(String, usize)>,
    pub search_errors: usize,
}

struct SourceBucket<'c> {
    label: String,
    items: Vec<&'c CandidateItem>,
    accepted: usize,
    next: usize,
}

/// Round-robins across candidate sources, checks live availability and
/// emits a bounded, source-balanced list of accepted recommendations.
///
/// All stores are owned by the caller and injected; the recommender only
/// mutates them through their public surface.
pub struct BalancedRecommender<'a> {
    catalog: &'a dyn CatalogSearch,
    matcher: &'a NameMatcher,
    not_found: &'a mut NotFoundBlacklist,
    artists: &'a mut ArtistBlacklist,
    borrowed: &'a mut BorrowedBlacklist,
    state: &'a mut SuggestionState,
}

impl<'a> BalancedRecommender<'a> {
    pub fn new(
        catalog: &'a dyn CatalogSearch,
        matcher: &'a NameMatcher,
        not_found: &'a mut NotFoundBlacklist,
        artists: &'a mut ArtistBlacklist,
        borrowed: &'a mut BorrowedBlacklist,
        state: &'a mut SuggestionState,
    ) -> Self {
        Self {
            catalog,
            matcher,
            not_found,
            artists,
            borrowed,
            state,
        }
    }

    /// Selects up to `target_count` available works, at most
    /// `items_per_source` from each source, in strict round-robin order
    /// over the sources.
    ///
    /// Deterministic given identical inputs and store snapshots: sources
    /// keep their first-seen order, candidates their input order.
    pub fn select(
        &mut self,
        candidates: &[CandidateItem],
        category: Category,
        target_count: usize,
        items_per_source: usize,
    ) -> Selection {
        let mut buckets = Self::group_by_source(candidates);
        info!(
            "Selecting up to {target_count} {} item(s) from {} source(s)",
            category.key(),
            buckets.len()
        );

        let mut rotation: Vec<usize> = (0..buckets.len()).collect();
        let max_iterations = target_count * buckets.len() * 2;
        let mut iterations = 0;
        let mut position = 0;
        let mut items = Vec::new();
        let mut search_errors = 0;

        while !rotation.is_empty() && items.len() < target_count && iterations < max_iterations {
            iterations += 1;
            if position >= rotation.len() {
                position = 0;
            }
            let bucket = rotation[position];
            if buckets[bucket].accepted >= items_per_source {
                position += 1;
                continue;
            }
            match self.scan_source(&mut buckets[bucket], category, &mut search_errors) {
                Some(accepted) => {
                    items.push(accepted);
                    position += 1;
                }
                None => {
                    debug!("Source '{}' exhausted", buckets[bucket].label);
                    rotation.remove(position);
                }
            }
        }

        info!(
            "Selected {}/{target_count} item(s), {search_errors} search error(s)",
            items.len()
        );
        Selection {
            items,
            per_source: buckets
                .iter()
                .map(|bucket| (bucket.label.clone(), bucket.accepted))
                .collect(),
            search_errors,
        }
    }

    fn group_by_source(candidates: &[CandidateItem]) -> Vec<SourceBucket<'_>> {
        let mut buckets: Vec<SourceBucket> = Vec::new();
        for candidate in candidates {
            let label = sources::balancing_bucket(&candidate.source);
            match buckets.iter_mut().find(|bucket| bucket.label == label) {
                Some(bucket) => bucket.items.push(candidate),
                None => buckets.push(SourceBucket {
                    label: label.to_string(),
                    items: vec![candidate],
                    accepted: 0,
                    next: 0,
                }),
            }
        }
        buckets
    }

    /// Scans a source's remaining candidates until one is accepted. Returns
    /// None when the source is exhausted for this run.
    fn scan_source(
        &mut self,
        bucket: &mut SourceBucket<'_>,
        category: Category,
        search_errors: &mut usize,
    ) -> Option<AcceptedItem> {
        while bucket.next < bucket.items.len() {
            let candidate = bucket.items[bucket.next];
            bucket.next += 1;

            if self.state.is_already_suggested(category, candidate) {
                debug!("Skipping '{}' (already suggested or rejected)", candidate.title);
                continue;
            }
            if self.is_gated(category, candidate) {
                continue;
            }

            let query = Self::build_query(candidate);
            debug!("Searching catalog for '{query}'");
            let hits = match self.catalog.search(&query) {
                Ok(hits) => hits,
                Err(err) => {
                    warn!("Catalog search failed for '{}': {err}", candidate.title);
                    *search_errors += 1;
                    continue;
                }
            };

            if hits.is_empty() {
                info!("No hits for '{}' - blacklisting", candidate.title);
                self.not_found.add(category, candidate, NOT_FOUND_REASON);
                continue;
            }

            let hits = if category == Category::Films {
                let films: Vec<CatalogHit> = hits
                    .into_iter()
                    .filter(|hit| is_film_medium(&hit.availability_text))
                    .collect();
                if films.is_empty() {
                    info!("No film-medium hits for '{}' - blacklisting", candidate.title);
                    self.not_found.add(category, candidate, NOT_FOUND_REASON);
                    continue;
                }
                films
            } else {
                hits
            };

            let hits: Vec<CatalogHit> = if candidate.author.is_empty() {
                hits
            } else {
                let ranked = self.matcher.rank_hits(
                    hits,
                    &candidate.author,
                    Some(candidate.title.as_str()),
                );
                if ranked.is_empty() {
                    info!(
                        "No hits matching '{}' for '{}' - blacklisting",
                        candidate.author, candidate.title
                    );
                    self.not_found.add(category, candidate, NOT_FOUND_REASON);
                    continue;
                }
                ranked.into_iter().map(|ranked| ranked.hit).collect()
            };

            let mut available = 0usize;
            for hit in &hits {
                let description = hit.availability_text.to_lowercase();
                if description.contains(AVAILABLE_KEYWORD) {
                    available += 1;
                } else if description.contains(BORROWED_KEYWORD) {
                    // Best effort: a missing return date just leaves the hit
                    // classified as unavailable.
                    self.borrowed.add(
                        &candidate.title,
                        &candidate.author,
                        candidate.media_type,
                        &hit.availability_text,
                    );
                }
            }

            if available > 0 {
                let summary = Self::build_summary(&hits);
                self.state.mark_suggested(category, candidate);
                bucket.accepted += 1;
                info!("'{}' available and suggested", candidate.title);
                return Some(AcceptedItem {
                    candidate: candidate.clone(),
                    availability: summary,
                });
            }
        }
        None
    }

    fn is_gated(&self, category: Category, candidate: &CandidateItem) -> bool {
        if self.not_found.is_blacklisted(category, candidate) {
            debug!("Skipping '{}' (not-found blacklist)", candidate.title);
            return true;
        }
        if self
            .borrowed
            .is_blacklisted(&candidate.title, &candidate.author)
        {
            debug!("Skipping '{}' (still borrowed)", candidate.title);
            return true;
        }
        if category == Category::Albums
            && !candidate.author.is_empty()
            && self.artists.is_blacklisted(&candidate.author)
        {
            debug!("Skipping '{}' (artist blacklisted)", candidate.title);
            return true;
        }
        false
    }

    /// Book queries lead with the author; everything else leads with the
    /// title.
    fn build_query(candidate: &CandidateItem) -> String {
        let parts: [&str; 3] = match candidate.media_type {
            MediaType::Book => [
                candidate.author.as_str(),
                candidate.title.as_str(),
                candidate.media_type.label(),
            ],
            _ => [
                candidate.title.as_str(),
                candidate.author.as_str(),
                candidate.media_type.label(),
            ],
        };
        parts
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn build_summary(hits: &[CatalogHit]) -> String {
        let joined = hits
            .iter()
            .map(|hit| hit.availability_text.as_str())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        Self::truncate_summary(&joined, SUMMARY_MAX_LEN)
    }

    fn truncate_summary(summary: &str, max_len: usize) -> String {
        if summary.chars().count() <= max_len {
            return summary.to_string();
        }
        let truncated: String = summary.chars().take(max_len - 3).collect();
        format!("{}...", truncated.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatcherConfig;
    use std::cell::RefCell;

    const AVAILABLE_FILM: &str = "Uv Verfügbar Zentralbibliothek";

    /// Scripted catalog: knows a list of works and answers any query that
    /// contains a known title with one hit carrying the scripted
    /// availability text.
    struct ScriptedCatalog {
        works: Vec<(String, String)>,
        queries: RefCell<Vec<String>>,
    }

    impl ScriptedCatalog {
        fn new(works: Vec<(&str, &str)>) -> Self {
            Self {
                works: works
                    .into_iter()
                    .map(|(title, availability)| (title.to_string(), availability.to_string()))
                    .collect(),
                queries: RefCell::new(Vec::new()),
            }
        }

        fn query_count(&self) -> usize {
            self.queries.borrow().len()
        }
    }

    impl CatalogSearch for ScriptedCatalog {
        fn search(&self, query: &str) -> Result<Vec<CatalogHit>, SearchError> {
            self.queries.borrow_mut().push(query.to_string());
            let hits = self
                .works
                .iter()
                .filter(|(title, _)| query.contains(title.as_str()))
                .map(|(title, availability)| CatalogHit {
                    title: title.clone(),
                    availability_text: availability.clone(),
                    ..CatalogHit::default()
                })
                .collect();
            Ok(hits)
        }
    }

    struct FailingCatalog;

    impl CatalogSearch for FailingCatalog {
        fn search(&self, _query: &str) -> Result<Vec<CatalogHit>, SearchError> {
            Err(SearchError::Transport("connection reset".to_string()))
        }
    }

    struct Stores {
        not_found: NotFoundBlacklist,
        artists: ArtistBlacklist,
        borrowed: BorrowedBlacklist,
        state: SuggestionState,
        matcher: NameMatcher,
        _dir: tempfile::TempDir,
    }

    impl Stores {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            Self {
                not_found: NotFoundBlacklist::load_or_default(dir.path()),
                artists: ArtistBlacklist::load_or_default(dir.path(), 365),
                borrowed: BorrowedBlacklist::load_or_default(dir.path()),
                state: SuggestionState::load_or_default(dir.path()),
                matcher: NameMatcher::new(MatcherConfig::default()).expect("matcher"),
                _dir: dir,
            }
        }

        fn recommender<'a>(&'a mut self, catalog: &'a dyn CatalogSearch) -> BalancedRecommender<'a> {
            BalancedRecommender::new(
                catalog,
                &self.matcher,
                &mut self.not_found,
                &mut self.artists,
                &mut self.borrowed,
                &mut self.state,
            )
        }
    }

    fn film(title: &str, source: &str) -> CandidateItem {
        CandidateItem {
            title: title.to_string(),
            author: String::new(),
            media_type: MediaType::Dvd,
            source: source.to_string(),
        }
    }

    fn films_from(source: &str, count: usize) -> Vec<CandidateItem> {
        (1..=count)
            .map(|i| film(&format!("{source} Film {i}"), source))
            .collect()
    }

    fn catalog_knowing_all(candidates: &[CandidateItem], availability: &str) -> ScriptedCatalog {
        ScriptedCatalog::new(
            candidates
                .iter()
                .map(|c| (c.title.as_str(), availability))
                .collect(),
        )
    }

    fn count_for(selection: &Selection, source: &str) -> usize {
        selection
            .per_source
            .iter()
            .find(|(label, _)| label == source)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    #[test]
    fn balances_across_three_sources() {
        let mut candidates = films_from("BBC", 10);
        candidates.extend(films_from("FBW", 10));
        candidates.extend(films_from("Oscar", 10));
        let catalog = catalog_knowing_all(&candidates, AVAILABLE_FILM);

        let mut stores = Stores::new();
        let selection =
            stores
                .recommender(&catalog)
                .select(&candidates, Category::Films, 12, 4);

        assert_eq!(selection.items.len(), 12);
        assert_eq!(count_for(&selection, "BBC"), 4);
        assert_eq!(count_for(&selection, "FBW"), 4);
        assert_eq!(count_for(&selection, "Oscar"), 4);
        assert_eq!(selection.search_errors, 0);
    }

    #[test]
    fn round_robin_interleaves_sources() {
        let mut candidates = films_from("BBC", 3);
        candidates.extend(films_from("FBW", 3));
        let catalog = catalog_knowing_all(&candidates, AVAILABLE_FILM);

        let mut stores = Stores::new();
        let selection = stores
            .recommender(&catalog)
            .select(&candidates, Category::Films, 4, 2);

        let sources: Vec<&str> = selection
            .items
            .iter()
            .map(|item| item.candidate.source.as_str())
            .collect();
        assert_eq!(sources, vec!["BBC", "FBW", "BBC", "FBW"]);
    }

    #[test]
    fn exhausted_source_terminates_early() {
        let candidates = films_from("BBC", 2);
        let catalog = catalog_knowing_all(&candidates, AVAILABLE_FILM);

        let mut stores = Stores::new();
        let selection = stores
            .recommender(&catalog)
            .select(&candidates, Category::Films, 12, 4);

        assert!(selection.items.len() <= 2);
        assert_eq!(count_for(&selection, "BBC"), 2);
    }

    #[test]
    fn personalized_sources_share_one_bucket() {
        let candidates: Vec<CandidateItem> = (1..=10)
            .map(|i| CandidateItem {
                title: format!("Album {i}"),
                author: String::new(),
                media_type: MediaType::Cd,
                source: sources::personalized_source(&format!("Artist {i}")),
            })
            .collect();
        let catalog = catalog_knowing_all(&candidates, "Verfügbar Zentralbibliothek");

        let mut stores = Stores::new();
        let selection = stores
            .recommender(&catalog)
            .select(&candidates, Category::Albums, 12, 4);

        // One synthetic bucket, so its per-source cap applies to all of
        // them together.
        assert_eq!(selection.items.len(), 4);
        assert_eq!(count_for(&selection, sources::PERSONALIZED_BUCKET), 4);
    }

    #[test]
    fn skips_already_suggested_and_rejected() {
        let candidates = films_from("BBC", 3);
        let catalog = catalog_knowing_all(&candidates, AVAILABLE_FILM);

        let mut stores = Stores::new();
        stores.state.mark_suggested(Category::Films, &candidates[0]);
        stores.state.reject(Category::Films, &candidates[1]);
        let selection = stores
            .recommender(&catalog)
            .select(&candidates, Category::Films, 4, 4);

        assert_eq!(selection.items.len(), 1);
        assert_eq!(selection.items[0].candidate.title, "BBC Film 3");
    }

    #[test]
    fn zero_hits_feed_the_not_found_blacklist() {
        let candidates = vec![film("Unbekannter Film", "BBC")];
        let catalog = ScriptedCatalog::new(vec![]);

        let mut stores = Stores::new();
        let selection = stores
            .recommender(&catalog)
            .select(&candidates, Category::Films, 4, 4);

        assert!(selection.items.is_empty());
        assert!(stores
            .not_found
            .is_blacklisted(Category::Films, &candidates[0]));

        // The next run never queries the catalog for it again.
        let catalog = ScriptedCatalog::new(vec![]);
        stores
            .recommender(&catalog)
            .select(&candidates, Category::Films, 4, 4);
        assert_eq!(catalog.query_count(), 0);
    }

    #[test]
    fn non_film_discs_count_as_not_found() {
        let candidates = vec![film("Konzertmitschnitt", "BBC")];
        // Available, but without the film medium marker.
        let catalog = catalog_knowing_all(&candidates, "Verfügbar Zentralbibliothek");

        let mut stores = Stores::new();
        let selection = stores
            .recommender(&catalog)
            .select(&candidates, Category::Films, 4, 4);

        assert!(selection.items.is_empty());
        assert!(stores
            .not_found
            .is_blacklisted(Category::Films, &candidates[0]));
    }

    #[test]
    fn author_mismatch_counts_as_not_found() {
        let candidates = vec![CandidateItem {
            title: "Es".to_string(),
            author: "Stephen King".to_string(),
            media_type: MediaType::Book,
            source: "NYT".to_string(),
        }];
        // A hit under a different title whose person field names someone
        // else entirely.
        let catalog = ScriptedCatalog::new(vec![(
            "Es",
            "Person(en): Hohlbein, Wolfgang Verfasser Bestand Verfügbar",
        )]);

        let mut stores = Stores::new();
        let selection = stores
            .recommender(&catalog)
            .select(&candidates, Category::Books, 4, 4);

        // Title matches perfectly, so the title override accepts the hit
        // even though the author differs.
        assert_eq!(selection.items.len(), 1);

        // With neither a title nor an author match, the candidate is
        // blacklisted.
        let candidates = vec![CandidateItem {
            title: "Brennen muss Salem".to_string(),
            author: "Stephen King".to_string(),
            media_type: MediaType::Book,
            source: "NYT".to_string(),
        }];
        let catalog = ScriptedCatalog::new(vec![(
            "Brennen",
            "Person(en): Hohlbein, Wolfgang Verfasser Bestand Verfügbar",
        )]);
        let mut stores = Stores::new();
        let selection = stores
            .recommender(&catalog)
            .select(&candidates, Category::Books, 4, 4);
        assert!(selection.items.is_empty());
        assert!(stores
            .not_found
            .is_blacklisted(Category::Books, &candidates[0]));
    }

    #[test]
    fn book_queries_lead_with_the_author() {
        let book = CandidateItem {
            title: "Es".to_string(),
            author: "Stephen King".to_string(),
            media_type: MediaType::Book,
            source: "NYT".to_string(),
        };
        assert_eq!(
            BalancedRecommender::build_query(&book),
            "Stephen King Es Buch"
        );

        let album = CandidateItem {
            title: "OK Computer".to_string(),
            author: "Radiohead".to_string(),
            media_type: MediaType::Cd,
            source: "Radio".to_string(),
        };
        assert_eq!(
            BalancedRecommender::build_query(&album),
            "OK Computer Radiohead CD"
        );
    }

    #[test]
    fn transport_errors_are_counted_and_do_not_abort() {
        let candidates = films_from("BBC", 3);
        let catalog = FailingCatalog;

        let mut stores = Stores::new();
        let selection = stores
            .recommender(&catalog)
            .select(&candidates, Category::Films, 4, 4);

        assert!(selection.items.is_empty());
        assert_eq!(selection.search_errors, 3);
        // Failures are not treated as "not in the catalog".
        assert!(!stores
            .not_found
            .is_blacklisted(Category::Films, &candidates[0]));
    }

    #[test]
    fn borrowed_candidates_land_on_the_borrowed_blacklist() {
        let mut candidates = films_from("Quelle A", 10);
        candidates.extend(films_from("Quelle B", 10));

        let mut works: Vec<(&str, &str)> = Vec::new();
        for candidate in &candidates[..10] {
            works.push((candidate.title.as_str(), AVAILABLE_FILM));
        }
        for candidate in &candidates[10..] {
            works.push((
                candidate.title.as_str(),
                "Uv Entliehen, voraussichtlich bis 08/11/2099",
            ));
        }
        let catalog = ScriptedCatalog::new(works);

        let mut stores = Stores::new();
        let selection = stores
            .recommender(&catalog)
            .select(&candidates, Category::Films, 8, 4);

        assert_eq!(count_for(&selection, "Quelle A"), 4);
        assert_eq!(count_for(&selection, "Quelle B"), 0);
        assert_eq!(selection.items.len(), 4);
        for candidate in &candidates[10..] {
            assert!(stores.borrowed.is_blacklisted(&candidate.title, ""));
        }
        assert_eq!(stores.borrowed.stats().total, 10);
    }

    #[test]
    fn gated_candidates_never_reach_the_catalog() {
        let mut candidates = vec![
            film("Entliehener Film", "BBC"),
            CandidateItem {
                title: "Gesperrtes Album".to_string(),
                author: "Gesperrter Interpret".to_string(),
                media_type: MediaType::Cd,
                source: "Radio".to_string(),
            },
        ];
        let catalog = catalog_knowing_all(&candidates, AVAILABLE_FILM);

        let mut stores = Stores::new();
        stores
            .borrowed
            .add("Entliehener Film", "", MediaType::Dvd, "bis 01/01/2099");
        stores
            .artists
            .add("Gesperrter Interpret", 12, crate::artist_blacklist::DEFAULT_REASON);

        let selection =
            stores
                .recommender(&catalog)
                .select(&candidates[..1], Category::Films, 4, 4);
        assert!(selection.items.is_empty());
        assert_eq!(catalog.query_count(), 0);

        candidates.remove(0);
        let catalog = catalog_knowing_all(&candidates, "Verfügbar");
        let selection = stores
            .recommender(&catalog)
            .select(&candidates, Category::Albums, 4, 4);
        assert!(selection.items.is_empty());
        assert_eq!(catalog.query_count(), 0);
    }

    #[test]
    fn summary_is_capped_at_300_chars() {
        let long_availability = format!("Uv Verfügbar {}", "Bestand ".repeat(60));
        let candidates = vec![film("Langer Eintrag", "BBC")];
        let catalog = catalog_knowing_all(&candidates, &long_availability);

        let mut stores = Stores::new();
        let selection = stores
            .recommender(&catalog)
            .select(&candidates, Category::Films, 1, 1);

        assert_eq!(selection.items.len(), 1);
        let summary = &selection.items[0].availability;
        assert!(summary.chars().count() <= 300);
        assert!(summary.ends_with("..."));
    }
}
