//! Suggestion bookkeeping: what was already shown this run, and what the
//! user has explicitly rejected.
//!
//! Suggested titles live only in memory and reset with the process.
//! Rejections are persistent and flushed to `state.json` immediately, so a
//! rejected work never comes back in a later run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::models::{CandidateItem, Category};
use crate::store::{self, StoreError};

pub const STATE_FILE: &str = "state.json";

/// One persistently rejected work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedEntry {
    pub title: String,
    pub author: String,
}

/// Aggregate view over the suggestion state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateStats {
    pub rejected_total: usize,
    pub suggested_total: usize,
    pub rejected_by_category: Vec<(Category, usize)>,
    pub suggested_by_category: Vec<(Category, usize)>,
}

/// Tracks suggested (ephemeral) and rejected (persistent) works per
/// category.
pub struct SuggestionState {
    path: PathBuf,
    rejected: BTreeMap<Category, Vec<RejectedEntry>>,
    suggested: BTreeMap<Category, Vec<String>>,
}

impl SuggestionState {
    /// Loads the rejected set; corruption is an explicit error. The
    /// suggested set always starts empty.
    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = data_dir.into().join(STATE_FILE);
        let rejected = store::load_json(&path)?.unwrap_or_default();
        Ok(Self::with_rejected(path, rejected))
    }

    /// Loads the rejected set, starting empty when it is unreadable.
    pub fn load_or_default(data_dir: impl Into<PathBuf>) -> Self {
        let path = data_dir.into().join(STATE_FILE);
        let rejected = match store::load_json::<BTreeMap<Category, Vec<RejectedEntry>>>(&path) {
            Ok(Some(rejected)) => rejected,
            Ok(None) => BTreeMap::new(),
            Err(err) => {
                warn!(
                    "Could not load suggestion state {}: {err} - starting empty",
                    path.display()
                );
                BTreeMap::new()
            }
        };
        Self::with_rejected(path, rejected)
    }

    fn with_rejected(path: PathBuf, mut rejected: BTreeMap<Category, Vec<RejectedEntry>>) -> Self {
        let mut suggested = BTreeMap::new();
        for category in Category::ALL {
            rejected.entry(category).or_default();
            suggested.insert(category, Vec::new());
        }
        Self {
            path,
            rejected,
            suggested,
        }
    }

    fn save(&self) {
        if let Err(err) = store::save_json(&self.path, &self.rejected) {
            error!("Could not save suggestion state {}: {err}", self.path.display());
        }
    }

    /// Whether the work was already suggested this run or rejected earlier.
    pub fn is_already_suggested(&self, category: Category, item: &CandidateItem) -> bool {
        let title = item.title.to_lowercase();
        let suggested_this_run = self
            .suggested
            .get(&category)
            .map(|titles| titles.iter().any(|t| t.to_lowercase() == title))
            .unwrap_or(false);
        let rejected_earlier = self
            .rejected
            .get(&category)
            .map(|entries| entries.iter().any(|e| e.title.to_lowercase() == title))
            .unwrap_or(false);
        if suggested_this_run {
            debug!("'{}' already suggested this run", item.title);
        }
        if rejected_earlier {
            debug!("'{}' was rejected earlier", item.title);
        }
        suggested_this_run || rejected_earlier
    }

    /// Marks a work as suggested for this run. Idempotent, memory only.
    pub fn mark_suggested(&mut self, category: Category, item: &CandidateItem) {
        let titles = self.suggested.entry(category).or_default();
        let title = item.title.to_lowercase();
        if !titles.iter().any(|t| t.to_lowercase() == title) {
            titles.push(item.title.clone());
            debug!("'{}' marked as suggested", item.title);
        }
    }

    /// Rejects a work persistently. Idempotent; flushes to storage
    /// immediately.
    pub fn reject(&mut self, category: Category, item: &CandidateItem) {
        let entries = self.rejected.entry(category).or_default();
        let title = item.title.to_lowercase();
        if entries.iter().any(|e| e.title.to_lowercase() == title) {
            debug!("'{}' was already rejected", item.title);
            return;
        }
        entries.push(RejectedEntry {
            title: item.title.clone(),
            author: item.author.clone(),
        });
        debug!("'{}' marked as rejected", item.title);
        self.save();
    }

    /// Clears the per-run suggested set.
    pub fn reset_suggested(&mut self) {
        for titles in self.suggested.values_mut() {
            titles.clear();
        }
        debug!("Suggested set reset");
    }

    /// Clears the persistent rejected set and rewrites storage.
    pub fn reset_rejected(&mut self) {
        for entries in self.rejected.values_mut() {
            entries.clear();
        }
        self.save();
        debug!("Rejected set reset");
    }

    /// Rejected works of a category, for inspection.
    pub fn rejected(&self, category: Category) -> &[RejectedEntry] {
        self.rejected
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn stats(&self) -> StateStats {
        let rejected_by_category: Vec<(Category, usize)> = Category::ALL
            .iter()
            .map(|&c| (c, self.rejected.get(&c).map(Vec::len).unwrap_or(0)))
            .collect();
        let suggested_by_category: Vec<(Category, usize)> = Category::ALL
            .iter()
            .map(|&c| (c, self.suggested.get(&c).map(Vec::len).unwrap_or(0)))
            .collect();
        StateStats {
            rejected_total: rejected_by_category.iter().map(|(_, n)| n).sum(),
            suggested_total: suggested_by_category.iter().map(|(_, n)| n).sum(),
            rejected_by_category,
            suggested_by_category,
        }
    }
}
