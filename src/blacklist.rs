//! Negative cache for works the library does not hold at all.
//!
//! A candidate lands here when a catalog search returns zero usable hits.
//! Entries never expire; an explicit remove is the only way out. Works that
//! are merely borrowed belong in the borrowed blacklist instead.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::models::{CandidateItem, Category, MediaType};
use crate::store::{self, StoreError};

/// One permanently suppressed work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotFoundEntry {
    pub title: String,
    pub author: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub reason: String,
    pub added_at: DateTime<Local>,
}

/// Aggregate counts over the not-found lists.
#[derive(Debug, Clone, PartialEq)]
pub struct NotFoundStats {
    pub total: usize,
    pub by_category: Vec<(Category, usize)>,
}

/// Per-category lists of works with no catalog presence, one JSON file per
/// category, rewritten after every mutation.
pub struct NotFoundBlacklist {
    data_dir: PathBuf,
    lists: BTreeMap<Category, Vec<NotFoundEntry>>,
}

impl NotFoundBlacklist {
    /// Loads all category files. Missing files yield empty lists; a corrupt
    /// file is reported as an error so the caller can decide.
    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        let mut lists = BTreeMap::new();
        for category in Category::ALL {
            let entries: Vec<NotFoundEntry> =
                store::load_json(&Self::file_path(&data_dir, category))?.unwrap_or_default();
            lists.insert(category, entries);
        }
        Ok(Self { data_dir, lists })
    }

    /// Loads all category files, substituting an empty list for any that is
    /// unreadable or corrupt.
    pub fn load_or_default(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let mut lists = BTreeMap::new();
        for category in Category::ALL {
            let path = Self::file_path(&data_dir, category);
            let entries = match store::load_json::<Vec<NotFoundEntry>>(&path) {
                Ok(Some(entries)) => {
                    debug!("Loaded {} not-found entries for {}", entries.len(), category.key());
                    entries
                }
                Ok(None) => Vec::new(),
                Err(err) => {
                    warn!(
                        "Could not load not-found blacklist {}: {err} - starting empty",
                        path.display()
                    );
                    Vec::new()
                }
            };
            lists.insert(category, entries);
        }
        Self { data_dir, lists }
    }

    fn file_path(data_dir: &Path, category: Category) -> PathBuf {
        data_dir.join(format!("blacklist_{}.json", category.key()))
    }

    fn save(&self, category: Category) {
        let path = Self::file_path(&self.data_dir, category);
        if let Some(entries) = self.lists.get(&category) {
            if let Err(err) = store::save_json(&path, entries) {
                error!("Could not save not-found blacklist {}: {err}", path.display());
            }
        }
    }

    fn entry_matches(entry: &NotFoundEntry, title: &str, author: &str) -> bool {
        let entry_title = entry.title.trim().to_lowercase();
        if entry_title != title {
            return false;
        }
        let entry_author = entry.author.trim().to_lowercase();
        // A missing author on either side lets the title alone decide.
        if author.is_empty() || entry_author.is_empty() {
            return true;
        }
        entry_author == author
    }

    /// Whether a candidate is permanently suppressed.
    pub fn is_blacklisted(&self, category: Category, item: &CandidateItem) -> bool {
        let title = item.title.trim().to_lowercase();
        let author = item.author.trim().to_lowercase();
        self.lists
            .get(&category)
            .map(|entries| {
                entries
                    .iter()
                    .any(|entry| Self::entry_matches(entry, &title, &author))
            })
            .unwrap_or(false)
    }

    /// Suppresses a candidate. Returns false when it is already listed.
    pub fn add(&mut self, category: Category, item: &CandidateItem, reason: &str) -> bool {
        if self.is_blacklisted(category, item) {
            debug!("'{}' is already on the {} blacklist", item.title, category.key());
            return false;
        }
        let entry = NotFoundEntry {
            title: item.title.clone(),
            author: item.author.clone(),
            media_type: item.media_type,
            reason: reason.to_string(),
            added_at: Local::now(),
        };
        self.lists.entry(category).or_default().push(entry);
        self.save(category);
        info!(
            "'{}' added to the {} blacklist: {reason}",
            item.title,
            category.key()
        );
        true
    }

    /// Removes a work from a category list. Returns whether anything was
    /// removed.
    pub fn remove(&mut self, category: Category, title: &str, author: &str) -> bool {
        let title = title.trim().to_lowercase();
        let author = author.trim().to_lowercase();
        let Some(entries) = self.lists.get_mut(&category) else {
            return false;
        };
        let original_length = entries.len();
        entries.retain(|entry| !Self::entry_matches(entry, &title, &author));
        let removed = entries.len() < original_length;
        if removed {
            self.save(category);
            info!("'{title}' removed from the {} blacklist", category.key());
        }
        removed
    }

    /// Clears one category, or all of them.
    pub fn clear(&mut self, category: Option<Category>) {
        match category {
            Some(category) => {
                self.lists.insert(category, Vec::new());
                self.save(category);
            }
            None => {
                for category in Category::ALL {
                    self.lists.insert(category, Vec::new());
                    self.save(category);
                }
            }
        }
    }

    /// Entries of one category, for inspection.
    pub fn entries(&self, category: Category) -> &[NotFoundEntry] {
        self.lists
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn stats(&self) -> NotFoundStats {
        let by_category: Vec<(Category, usize)> = Category::ALL
            .iter()
            .map(|&category| {
                (
                    category,
                    self.lists.get(&category).map(Vec::len).unwrap_or(0),
                )
            })
            .collect();
        NotFoundStats {
            total: by_category.iter().map(|(_, count)| count).sum(),
            by_category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, author: &str) -> CandidateItem {
        CandidateItem {
            title: title.to_string(),
            author: author.to_string(),
            media_type: MediaType::Dvd,
            source: "Testquelle".to_string(),
        }
    }

    #[test]
    fn add_then_blacklisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut blacklist = NotFoundBlacklist::load_or_default(dir.path());
        let item = candidate("Der Pate", "Francis Ford Coppola");
        assert!(blacklist.add(Category::Films, &item, "Keine Treffer"));
        assert!(blacklist.is_blacklisted(Category::Films, &item));
        // Same title in another category is unaffected.
        assert!(!blacklist.is_blacklisted(Category::Books, &item));
    }

    #[test]
    fn add_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut blacklist = NotFoundBlacklist::load_or_default(dir.path());
        let item = candidate("Der Pate", "Francis Ford Coppola");
        assert!(blacklist.add(Category::Films, &item, "Keine Treffer"));
        assert!(!blacklist.add(Category::Films, &item, "Keine Treffer"));
        assert_eq!(blacklist.entries(Category::Films).len(), 1);
    }

    #[test]
    fn missing_author_matches_on_title_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut blacklist = NotFoundBlacklist::load_or_default(dir.path());
        blacklist.add(Category::Albums, &candidate("Abbey Road", ""), "Keine Treffer");
        assert!(blacklist.is_blacklisted(Category::Albums, &candidate("abbey road", "The Beatles")));
    }

    #[test]
    fn differing_authors_do_not_match() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut blacklist = NotFoundBlacklist::load_or_default(dir.path());
        blacklist.add(
            Category::Books,
            &candidate("Es", "Stephen King"),
            "Keine Treffer",
        );
        assert!(!blacklist.is_blacklisted(Category::Books, &candidate("Es", "Wolfgang Hohlbein")));
    }

    #[test]
    fn remove_is_the_only_way_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut blacklist = NotFoundBlacklist::load_or_default(dir.path());
        let item = candidate("Der Pate", "Francis Ford Coppola");
        blacklist.add(Category::Films, &item, "Keine Treffer");
        assert!(blacklist.remove(Category::Films, "der pate", "francis ford coppola"));
        assert!(!blacklist.is_blacklisted(Category::Films, &item));
        assert!(!blacklist.remove(Category::Films, "der pate", "francis ford coppola"));
    }

    #[test]
    fn persists_across_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let item = candidate("Der Pate", "Francis Ford Coppola");
        {
            let mut blacklist = NotFoundBlacklist::load_or_default(dir.path());
            blacklist.add(Category::Films, &item, "Keine Treffer");
        }
        let reloaded = NotFoundBlacklist::load(dir.path()).expect("load");
        assert!(reloaded.is_blacklisted(Category::Films, &item));
    }

    #[test]
    fn corrupt_file_is_explicit_on_load_and_empty_on_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("blacklist_films.json"), "{broken").expect("write");
        assert!(NotFoundBlacklist::load(dir.path()).is_err());
        let fallback = NotFoundBlacklist::load_or_default(dir.path());
        assert_eq!(fallback.stats().total, 0);
    }

    #[test]
    fn stats_count_per_category() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut blacklist = NotFoundBlacklist::load_or_default(dir.path());
        blacklist.add(Category::Films, &candidate("A", "x"), "Keine Treffer");
        blacklist.add(Category::Films, &candidate("B", "y"), "Keine Treffer");
        blacklist.add(Category::Books, &candidate("C", "z"), "Keine Treffer");
        let stats = blacklist.stats();
        assert_eq!(stats.total, 3);
        assert!(stats.by_category.contains(&(Category::Films, 2)));
        assert!(stats.by_category.contains(&(Category::Books, 1)));
    }
}
