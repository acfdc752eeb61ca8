//! Negative cache for works that exist in the catalog but are currently
//! borrowed.
//!
//! An entry is only created when a return date can be extracted from the
//! availability text; a borrowed hit without a date is treated as plain
//! unavailable and checked again next time. Entries stop blocking on the
//! return date and are removed by the periodic cleanup.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Local, NaiveDate};
use log::{debug, error, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::MediaType;
use crate::store::{self, StoreError};

pub const BORROWED_BLACKLIST_FILE: &str = "entliehen_blacklist.json";

const AVAILABILITY_SNIPPET_LEN: usize = 300;
const UPCOMING_WINDOW_DAYS: i64 = 7;
const UPCOMING_LIMIT: usize = 10;

/// One borrowed work, keyed by lowercased "title_author".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowedEntry {
    pub title: String,
    pub author: String,
    pub media_type: MediaType,
    pub return_date: NaiveDate,
    pub added_at: DateTime<Local>,
    /// Truncated availability text the return date was extracted from.
    pub availability_text: String,
}

/// A return expected within the upcoming window.
#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingReturn {
    pub title: String,
    pub return_date: NaiveDate,
    pub days_left: i64,
}

/// Aggregate view over the borrowed blacklist.
#[derive(Debug, Clone, PartialEq)]
pub struct BorrowedStats {
    pub total: usize,
    pub by_media_type: Vec<(&'static str, usize)>,
    pub upcoming_returns: Vec<UpcomingReturn>,
}

/// Extracts the expected return date from availability text, looking for
/// the catalog's "bis DD/MM/YYYY" marker. Impossible dates are rejected.
pub fn extract_return_date(availability_text: &str) -> Option<NaiveDate> {
    if availability_text.is_empty() {
        return None;
    }
    let pattern = Regex::new(r"bis\s+(\d{2})/(\d{2})/(\d{4})").ok()?;
    let caps = pattern.captures(availability_text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Borrowed works with their expected return dates, one JSON map file.
pub struct BorrowedBlacklist {
    path: PathBuf,
    entries: BTreeMap<String, BorrowedEntry>,
}

impl BorrowedBlacklist {
    /// Loads the blacklist file; corruption is an explicit error.
    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = data_dir.into().join(BORROWED_BLACKLIST_FILE);
        let entries = store::load_json(&path)?.unwrap_or_default();
        Ok(Self { path, entries })
    }

    /// Loads the blacklist file, starting empty when it is unreadable.
    pub fn load_or_default(data_dir: impl Into<PathBuf>) -> Self {
        let path = data_dir.into().join(BORROWED_BLACKLIST_FILE);
        let entries = match store::load_json::<BTreeMap<String, BorrowedEntry>>(&path) {
            Ok(Some(entries)) => {
                debug!("Loaded {} borrowed entries", entries.len());
                entries
            }
            Ok(None) => BTreeMap::new(),
            Err(err) => {
                warn!(
                    "Could not load borrowed blacklist {}: {err} - starting empty",
                    path.display()
                );
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    fn save(&self) {
        if let Err(err) = store::save_json(&self.path, &self.entries) {
            error!("Could not save borrowed blacklist {}: {err}", self.path.display());
        }
    }

    fn key(title: &str, author: &str) -> String {
        format!("{title}_{author}").trim().to_lowercase()
    }

    /// Whether the work is still out on loan.
    pub fn is_blacklisted(&self, title: &str, author: &str) -> bool {
        let Some(entry) = self.entries.get(&Self::key(title, author)) else {
            return false;
        };
        let today = Local::now().date_naive();
        if today >= entry.return_date {
            info!("Return date reached for '{title}' - eligible for re-check");
            return false;
        }
        let days_left = (entry.return_date - today).num_days();
        debug!("'{title}' still borrowed for {days_left} day(s)");
        true
    }

    /// Registers a borrowed work. Returns false (and stores nothing) when
    /// no return date can be extracted from the availability text. Repeated
    /// borrow detections keep the earliest known return date.
    pub fn add(
        &mut self,
        title: &str,
        author: &str,
        media_type: MediaType,
        availability_text: &str,
    ) -> bool {
        let Some(extracted) = extract_return_date(availability_text) else {
            warn!("No return date found for '{title}' - not blacklisting");
            return false;
        };

        let key = Self::key(title, author);
        let return_date = match self.entries.get(&key) {
            Some(existing) if existing.return_date <= extracted => {
                debug!(
                    "Keeping earlier return date {} for '{title}'",
                    existing.return_date
                );
                existing.return_date
            }
            Some(_) => {
                info!("Earlier return date {extracted} for '{title}'");
                extracted
            }
            None => extracted,
        };

        self.entries.insert(
            key,
            BorrowedEntry {
                title: title.to_string(),
                author: author.to_string(),
                media_type,
                return_date,
                added_at: Local::now(),
                availability_text: availability_text
                    .chars()
                    .take(AVAILABILITY_SNIPPET_LEN)
                    .collect(),
            },
        );
        self.save();
        info!("'{title}' on the borrowed blacklist until {return_date}");
        true
    }

    /// Removes a work. Returns whether an entry existed.
    pub fn remove(&mut self, title: &str, author: &str) -> bool {
        if self.entries.remove(&Self::key(title, author)).is_some() {
            self.save();
            info!("'{title}' removed from the borrowed blacklist");
            return true;
        }
        false
    }

    /// Drops entries whose return date has passed. Returns the number
    /// removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let today = Local::now().date_naive();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| today >= entry.return_date)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired_keys {
            if let Some(entry) = self.entries.remove(key) {
                debug!("Expired: {}", entry.title);
            }
        }
        if !expired_keys.is_empty() {
            self.save();
        }
        info!("{} expired borrowed entries removed", expired_keys.len());
        expired_keys.len()
    }

    pub fn stats(&self) -> BorrowedStats {
        let mut by_media_type: BTreeMap<&'static str, usize> = BTreeMap::new();
        for entry in self.entries.values() {
            *by_media_type.entry(entry.media_type.label()).or_insert(0) += 1;
        }

        let today = Local::now().date_naive();
        let window_end = today + Duration::days(UPCOMING_WINDOW_DAYS);
        let mut upcoming: Vec<UpcomingReturn> = self
            .entries
            .values()
            .filter(|entry| entry.return_date >= today && entry.return_date <= window_end)
            .map(|entry| UpcomingReturn {
                title: entry.title.clone(),
                return_date: entry.return_date,
                days_left: (entry.return_date - today).num_days(),
            })
            .collect();
        upcoming.sort_by(|a, b| a.return_date.cmp(&b.return_date));
        upcoming.truncate(UPCOMING_LIMIT);

        BorrowedStats {
            total: self.entries.len(),
            by_media_type: by_media_type.into_iter().collect(),
            upcoming_returns: upcoming,
        }
    }
}
