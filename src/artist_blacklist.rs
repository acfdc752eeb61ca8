//! Time-boxed negative cache for artists without new CDs in the catalog.
//!
//! Unlike the not-found list this cache ages out: once the last check is
//! older than the recheck interval the entry stays stored but stops
//! blocking, so the next search refreshes it instead of being suppressed.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Local};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::store::{self, StoreError};

pub const ARTIST_BLACKLIST_FILE: &str = "blacklist_artists.json";
pub const DEFAULT_REASON: &str = "Keine neuen CDs in Bibliothek gefunden";

const RECENT_ADDITION_DAYS: i64 = 30;
const MOST_CHECKED_LIMIT: usize = 5;

/// One blacklisted artist, keyed by the lowercased name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistEntry {
    /// Original spelling, kept for display.
    pub artist_name: String,
    pub song_count: u32,
    pub reason: String,
    pub added_at: DateTime<Local>,
    pub last_checked: DateTime<Local>,
    pub check_count: u32,
}

/// An entry whose recheck window has elapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecheckDue {
    pub artist_name: String,
    pub days_since_check: i64,
    pub last_checked: DateTime<Local>,
    pub check_count: u32,
    pub song_count: u32,
}

/// Aggregate view over the artist blacklist.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistStats {
    pub total: usize,
    pub due_for_recheck: usize,
    pub recent_additions: usize,
    pub most_checked: Vec<(String, u32)>,
}

/// Artists with no borrowable CDs, rechecked at most once per interval.
pub struct ArtistBlacklist {
    path: PathBuf,
    recheck_interval_days: i64,
    entries: BTreeMap<String, ArtistEntry>,
}

impl ArtistBlacklist {
    /// Loads the blacklist file; corruption is an explicit error.
    pub fn load(
        data_dir: impl Into<PathBuf>,
        recheck_interval_days: i64,
    ) -> Result<Self, StoreError> {
        let path = data_dir.into().join(ARTIST_BLACKLIST_FILE);
        let entries = store::load_json(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            recheck_interval_days,
            entries,
        })
    }

    /// Loads the blacklist file, starting empty when it is unreadable.
    pub fn load_or_default(data_dir: impl Into<PathBuf>, recheck_interval_days: i64) -> Self {
        let path = data_dir.into().join(ARTIST_BLACKLIST_FILE);
        let entries = match store::load_json::<BTreeMap<String, ArtistEntry>>(&path) {
            Ok(Some(entries)) => {
                debug!("Loaded {} blacklisted artists", entries.len());
                entries
            }
            Ok(None) => BTreeMap::new(),
            Err(err) => {
                warn!(
                    "Could not load artist blacklist {}: {err} - starting empty",
                    path.display()
                );
                BTreeMap::new()
            }
        };
        Self {
            path,
            recheck_interval_days,
            entries,
        }
    }

    fn save(&self) {
        if let Err(err) = store::save_json(&self.path, &self.entries) {
            error!("Could not save artist blacklist {}: {err}", self.path.display());
        }
    }

    fn key(artist_name: &str) -> String {
        artist_name.trim().to_lowercase()
    }

    /// Whether the artist is currently blocking. An entry past the recheck
    /// interval stays stored but no longer blocks.
    pub fn is_blacklisted(&self, artist_name: &str) -> bool {
        let Some(entry) = self.entries.get(&Self::key(artist_name)) else {
            return false;
        };
        let days_since_check = (Local::now() - entry.last_checked).num_days();
        if days_since_check >= self.recheck_interval_days {
            info!("Re-check due for '{artist_name}': {days_since_check} days since last check");
            return false;
        }
        debug!("'{artist_name}' blacklisted, {days_since_check} days since last check");
        true
    }

    /// Adds an artist, or refreshes the check timestamp of an existing
    /// entry. Returns true only when a new entry was created.
    pub fn add(&mut self, artist_name: &str, song_count: u32, reason: &str) -> bool {
        let key = Self::key(artist_name);
        let created = match self.entries.get_mut(&key) {
            Some(entry) => {
                debug!("'{artist_name}' already blacklisted - refreshing check date");
                entry.last_checked = Local::now();
                entry.check_count += 1;
                false
            }
            None => {
                let now = Local::now();
                self.entries.insert(
                    key,
                    ArtistEntry {
                        artist_name: artist_name.to_string(),
                        song_count,
                        reason: reason.to_string(),
                        added_at: now,
                        last_checked: now,
                        check_count: 1,
                    },
                );
                info!("'{artist_name}' added to the artist blacklist: {reason}");
                true
            }
        };
        self.save();
        created
    }

    /// Removes an artist. Returns whether an entry existed.
    pub fn remove(&mut self, artist_name: &str) -> bool {
        if self.entries.remove(&Self::key(artist_name)).is_some() {
            self.save();
            info!("'{artist_name}' removed from the artist blacklist");
            return true;
        }
        debug!("'{artist_name}' not on the artist blacklist");
        false
    }

    /// Entries whose recheck window has elapsed.
    pub fn entries_due_for_recheck(&self) -> Vec<RecheckDue> {
        let now = Local::now();
        let due: Vec<RecheckDue> = self
            .entries
            .values()
            .filter_map(|entry| {
                let days_since_check = (now - entry.last_checked).num_days();
                if days_since_check >= self.recheck_interval_days {
                    Some(RecheckDue {
                        artist_name: entry.artist_name.clone(),
                        days_since_check,
                        last_checked: entry.last_checked,
                        check_count: entry.check_count,
                        song_count: entry.song_count,
                    })
                } else {
                    None
                }
            })
            .collect();
        info!("{} artist(s) due for re-check", due.len());
        due
    }

    /// Purges entries added more than `days` ago. Returns the number
    /// removed.
    pub fn clear_older_than(&mut self, days: i64) -> usize {
        let cutoff = Local::now() - Duration::days(days);
        let old_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.added_at < cutoff)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &old_keys {
            if let Some(entry) = self.entries.remove(key) {
                info!("Removed stale artist entry '{}'", entry.artist_name);
            }
        }
        if !old_keys.is_empty() {
            self.save();
            info!("{} artist entries older than {days} days removed", old_keys.len());
        }
        old_keys.len()
    }

    pub fn stats(&self) -> ArtistStats {
        let recent_cutoff = Local::now() - Duration::days(RECENT_ADDITION_DAYS);
        let recent_additions = self
            .entries
            .values()
            .filter(|entry| entry.added_at >= recent_cutoff)
            .count();
        let mut most_checked: Vec<(String, u32)> = self
            .entries
            .values()
            .map(|entry| (entry.artist_name.clone(), entry.check_count))
            .collect();
        most_checked.sort_by(|a, b| b.1.cmp(&a.1));
        most_checked.truncate(MOST_CHECKED_LIMIT);
        ArtistStats {
            total: self.entries.len(),
            due_for_recheck: self.entries_due_for_recheck().len(),
            recent_additions,
            most_checked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blacklist(dir: &std::path::Path) -> ArtistBlacklist {
        ArtistBlacklist::load_or_default(dir, 365)
    }

    fn backdate_last_check(blacklist: &mut ArtistBlacklist, artist: &str, days: i64) {
        let entry = blacklist
            .entries
            .get_mut(&ArtistBlacklist::key(artist))
            .expect("entry should exist");
        entry.last_checked = Local::now() - Duration::days(days);
    }

    #[test]
    fn add_then_blacklisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut artists = blacklist(dir.path());
        assert!(artists.add("Radiohead", 42, DEFAULT_REASON));
        assert!(artists.is_blacklisted("Radiohead"));
        assert!(artists.is_blacklisted("  radiohead  "));
        assert!(!artists.is_blacklisted("Portishead"));
    }

    #[test]
    fn entry_expires_after_recheck_interval() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut artists = blacklist(dir.path());
        artists.add("Radiohead", 10, DEFAULT_REASON);
        backdate_last_check(&mut artists, "Radiohead", 400);
        assert!(!artists.is_blacklisted("Radiohead"));
        // The entry is inert, not deleted.
        assert_eq!(artists.stats().total, 1);
        let due = artists.entries_due_for_recheck();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].artist_name, "Radiohead");
        assert!(due[0].days_since_check >= 400);
    }

    #[test]
    fn re_add_refreshes_check_date_and_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut artists = blacklist(dir.path());
        assert!(artists.add("Radiohead", 10, DEFAULT_REASON));
        backdate_last_check(&mut artists, "Radiohead", 400);
        assert!(!artists.add("Radiohead", 10, DEFAULT_REASON));
        assert!(artists.is_blacklisted("Radiohead"));
        let stats = artists.stats();
        assert_eq!(stats.most_checked[0], ("Radiohead".to_string(), 2));
    }

    #[test]
    fn remove_drops_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut artists = blacklist(dir.path());
        artists.add("Radiohead", 10, DEFAULT_REASON);
        assert!(artists.remove("radiohead"));
        assert!(!artists.is_blacklisted("Radiohead"));
        assert!(!artists.remove("Radiohead"));
    }

    #[test]
    fn clear_older_than_purges_by_added_date() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut artists = blacklist(dir.path());
        artists.add("Alt", 5, DEFAULT_REASON);
        artists.add("Neu", 5, DEFAULT_REASON);
        artists
            .entries
            .get_mut("alt")
            .expect("entry should exist")
            .added_at = Local::now() - Duration::days(800);
        assert_eq!(artists.clear_older_than(730), 1);
        assert!(!artists.is_blacklisted("Alt"));
        assert!(artists.is_blacklisted("Neu"));
    }

    #[test]
    fn persists_across_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let mut artists = blacklist(dir.path());
            artists.add("Radiohead", 42, DEFAULT_REASON);
        }
        let reloaded = ArtistBlacklist::load(dir.path(), 365).expect("load");
        assert!(reloaded.is_blacklisted("Radiohead"));
    }

    #[test]
    fn corrupt_file_is_explicit_on_load_and_empty_on_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(ARTIST_BLACKLIST_FILE), "]]").expect("write");
        assert!(ArtistBlacklist::load(dir.path(), 365).is_err());
        let fallback = ArtistBlacklist::load_or_default(dir.path(), 365);
        assert_eq!(fallback.stats().total, 0);
    }
}
