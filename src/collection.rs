//! Local music archive analysis.
//!
//! Curated album lists are filtered against the archive on disk so only
//! missing albums become candidates, and song counts per artist feed the
//! personalized top-artist recommendations. Folder and file names are the
//! only metadata source; matching works on normalized name variants.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info, warn};

use crate::artist_blacklist::{ArtistBlacklist, DEFAULT_REASON};
use crate::models::CandidateItem;

/// Filler words ignored when comparing titles across languages.
const STOP_WORDS: [&str; 37] = [
    "the", "a", "an", "and", "&", "of", "in", "on", "at", "to", "for", "with", "by", "from",
    "up", "about", "into", "through", "during", "before", "after", "above", "below", "between",
    "among", "der", "die", "das", "ein", "eine", "und", "le", "la", "les", "un", "une", "et",
];

/// Artist buckets in the archive that do not name a real artist.
const IGNORED_ARTISTS: [&str; 3] = ["various", "compilations", "soundtracks"];

fn strip_special_chars(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect()
}

fn strip_bracket_chars(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '(' | ')' | '[' | ']' | '{' | '}' => ' ',
            other => other,
        })
        .collect()
}

fn remove_punctuation_marks(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '?' | '!' | '.' | ',' | ';' | ':'))
        .collect()
}

/// Drops parenthesized groups, leaving an unclosed "(" untouched.
fn remove_parenthesized(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '(' {
            result.push(c);
            continue;
        }
        let mut consumed = String::new();
        let mut closed = false;
        for inner in chars.by_ref() {
            if inner == ')' {
                closed = true;
                break;
            }
            consumed.push(inner);
        }
        if !closed {
            result.push('(');
            result.push_str(&consumed);
        }
    }
    result
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercases, strips special characters and removes filler words. Falls
/// back to the cleaned original when nothing but filler words remain.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let cleaned = strip_special_chars(text).to_lowercase();
    let filtered: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .collect();
    if filtered.is_empty() {
        return collapse_whitespace(&cleaned);
    }
    filtered.join(" ")
}

/// Builds the search variants under which a band/album pair may appear as
/// an archive folder name: normalized, bracket-free, punctuation-free and
/// "&"/"and" spellings, deduplicated in order.
pub fn search_variants(band: &str, album: &str) -> Vec<String> {
    let original = format!("{band} {album}").to_lowercase();
    let normalized_band = normalize_text(band);
    let normalized_album = normalize_text(album);
    let normalized = format!("{normalized_band} {normalized_album}");

    let mut variants = vec![
        original.clone(),
        normalized.clone(),
        format!("{} {normalized_album}", band.to_lowercase()),
        format!("{normalized_band} {}", album.to_lowercase()),
        strip_special_chars(&original),
        strip_special_chars(&normalized),
        strip_bracket_chars(&original),
        strip_bracket_chars(&normalized),
        remove_punctuation_marks(&original),
        original.replace('&', "and"),
        original.replace(" and ", " & "),
        normalized.replace('&', "and"),
        normalized.replace(" and ", " & "),
    ];

    let without_parens = remove_parenthesized(&original);
    if without_parens != original {
        variants.push(without_parens.trim().to_string());
    }

    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for variant in variants.drain(..) {
        let cleaned = collapse_whitespace(&variant);
        if !cleaned.is_empty() && seen.insert(cleaned.clone()) {
            unique.push(cleaned);
        }
    }
    unique
}

/// Whether an archive folder plausibly holds the given album: both the
/// band and the album must appear in some normalized form, and the folder
/// name must not be wildly longer than the pair.
pub fn folder_matches(folder: &str, band: &str, album: &str) -> bool {
    let folder_lower = folder.to_lowercase();
    let folder_versions = [
        folder_lower.clone(),
        normalize_text(folder),
        collapse_whitespace(&strip_special_chars(&folder_lower)),
    ];

    let band_variants: Vec<String> = [
        band.to_lowercase(),
        normalize_text(band),
        collapse_whitespace(&strip_special_chars(&band.to_lowercase())),
    ]
    .into_iter()
    .filter(|variant| !variant.is_empty())
    .collect();

    let album_lower = album.to_lowercase();
    let album_variants: Vec<String> = [
        album_lower.clone(),
        normalize_text(album),
        collapse_whitespace(&strip_special_chars(&album_lower)),
        collapse_whitespace(&strip_bracket_chars(&album_lower)),
        collapse_whitespace(&remove_parenthesized(&album_lower)),
    ]
    .into_iter()
    .filter(|variant| !variant.is_empty())
    .collect();

    let band_found = band_variants
        .iter()
        .any(|variant| folder_versions.iter().any(|folder| folder.contains(variant)));
    let album_found = album_variants
        .iter()
        .any(|variant| folder_versions.iter().any(|folder| folder.contains(variant)));

    if band_found && album_found {
        let max_expected = format!("{band} {album}").chars().count() * 2;
        return folder.chars().count() <= max_expected;
    }
    false
}

/// Collects all folder names below the archive root, lowercased. Errors
/// inside the tree are skipped; only an unreadable root is reported.
pub fn scan_archive_folders(base_path: &Path) -> io::Result<HashSet<String>> {
    let mut folders = HashSet::new();
    let mut pending = vec![base_path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if dir == base_path => return Err(err),
            Err(err) => {
                debug!("Skipping unreadable folder {}: {err}", dir.display());
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                    folders.insert(name.to_lowercase());
                }
                pending.push(path);
            }
        }
    }
    Ok(folders)
}

/// Filters out albums already present in the archive, keeping each missing
/// candidate with all its properties. When the archive cannot be read the
/// list passes through unfiltered.
pub fn filter_missing_albums(albums: &[CandidateItem], base_path: &Path) -> Vec<CandidateItem> {
    if albums.is_empty() {
        return Vec::new();
    }
    if !base_path.exists() {
        warn!("Archive path {} does not exist", base_path.display());
        return albums.to_vec();
    }
    let existing_folders = match scan_archive_folders(base_path) {
        Ok(folders) => folders,
        Err(err) => {
            warn!("Could not scan archive {}: {err}", base_path.display());
            return albums.to_vec();
        }
    };
    info!("Found {} folders in the archive", existing_folders.len());

    let mut missing = Vec::new();
    let mut owned = 0usize;
    for album in albums {
        let variants = search_variants(&album.author, &album.title);
        let found_exact = variants
            .iter()
            .any(|variant| existing_folders.contains(variant));
        let found = found_exact
            || existing_folders
                .iter()
                .any(|folder| folder_matches(folder, &album.author, &album.title));
        if found {
            owned += 1;
            debug!("Already owned: {} - {}", album.author, album.title);
        } else {
            missing.push(album.clone());
        }
    }
    info!(
        "{} of {} albums already owned, {} missing",
        owned,
        albums.len(),
        missing.len()
    );
    missing
}

/// Counts songs per artist from "Artist - Title.mp3" file names below the
/// archive root. Hidden and compilation buckets are ignored.
pub fn count_artists(archive_path: &Path) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    if !archive_path.exists() {
        warn!("MP3 archive not found: {}", archive_path.display());
        return counts;
    }
    let mut pending = vec![archive_path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !file_name.to_lowercase().ends_with(".mp3") {
                continue;
            }
            let Some((artist, _)) = file_name.split_once(" - ") else {
                continue;
            };
            let artist = artist.trim();
            if artist.starts_with('.') || IGNORED_ARTISTS.contains(&artist.to_lowercase().as_str())
            {
                continue;
            }
            *counts.entry(artist.to_string()).or_insert(0) += 1;
        }
    }
    info!(
        "Found {} artists, {} songs total",
        counts.len(),
        counts.values().sum::<usize>()
    );
    counts
}

/// The artists with the most songs, descending; ties break alphabetically
/// so the order is stable.
pub fn top_artists(counts: &HashMap<String, usize>, top_n: usize) -> Vec<(String, usize)> {
    let mut ranked: Vec<(String, usize)> = counts
        .iter()
        .map(|(artist, count)| (artist.clone(), *count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top_n);
    ranked
}

/// The top artists that are not blacklisted, scanning at most `max_total`
/// candidates before giving up.
pub fn filtered_top_artists(
    counts: &HashMap<String, usize>,
    blacklist: &ArtistBlacklist,
    top_n: usize,
    max_total: usize,
) -> Vec<(String, usize)> {
    let mut filtered = Vec::new();
    let mut skipped = 0usize;
    for (artist, count) in top_artists(counts, max_total) {
        if blacklist.is_blacklisted(&artist) {
            debug!("Skipping '{artist}' (blacklisted, {count} songs)");
            skipped += 1;
            continue;
        }
        filtered.push((artist, count));
        if filtered.len() >= top_n {
            break;
        }
    }
    info!(
        "Filtered top {}: {skipped} blacklisted artist(s) skipped",
        filtered.len()
    );
    filtered
}

/// Feeds a search outcome back into the artist blacklist: finding new
/// albums lifts the block, finding none sets or refreshes it.
pub fn update_artist_after_search(
    artist_name: &str,
    song_count: u32,
    found_new_albums: bool,
    blacklist: &mut ArtistBlacklist,
) {
    if found_new_albums {
        if blacklist.is_blacklisted(artist_name) {
            blacklist.remove(artist_name);
            info!("'{artist_name}' removed from the blacklist - new albums found");
        }
    } else {
        blacklist.add(artist_name, song_count, DEFAULT_REASON);
        info!("'{artist_name}' blacklisted - no new albums available");
    }
}
