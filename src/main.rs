//! Maintenance entry point: store statistics and periodic cleanup.
//!
//! The recommendation core runs embedded in the GUI application; this
//! binary covers the operational side, printing the state of the persisted
//! stores and running the maintenance passes (expired borrow entries,
//! stale artist entries).

use std::env;
use std::path::Path;

use log::info;

use bibrec::artist_blacklist::ArtistBlacklist;
use bibrec::blacklist::NotFoundBlacklist;
use bibrec::borrowed_blacklist::BorrowedBlacklist;
use bibrec::config::Config;
use bibrec::state::SuggestionState;

fn print_stats(
    not_found: &NotFoundBlacklist,
    artists: &ArtistBlacklist,
    borrowed: &BorrowedBlacklist,
    state: &SuggestionState,
) {
    let stats = not_found.stats();
    println!("Not-found blacklist: {} entries", stats.total);
    for (category, count) in &stats.by_category {
        if *count > 0 {
            println!("  - {}: {count}", category.key());
        }
    }

    let stats = artists.stats();
    println!("Artist blacklist: {} entries", stats.total);
    println!("  - due for re-check: {}", stats.due_for_recheck);
    println!("  - added in the last 30 days: {}", stats.recent_additions);
    for (artist, check_count) in &stats.most_checked {
        println!("  - {artist}: checked {check_count}x");
    }

    let stats = borrowed.stats();
    println!("Borrowed blacklist: {} entries", stats.total);
    for (media_type, count) in &stats.by_media_type {
        println!("  - {media_type}: {count}");
    }
    if !stats.upcoming_returns.is_empty() {
        println!("  back within a week:");
        for upcoming in &stats.upcoming_returns {
            println!(
                "  - {} ({}, {} day(s))",
                upcoming.title, upcoming.return_date, upcoming.days_left
            );
        }
    }

    let stats = state.stats();
    println!("Rejected works (persistent): {}", stats.rejected_total);
    for (category, count) in &stats.rejected_by_category {
        if *count > 0 {
            println!("  - {}: {count}", category.key());
        }
    }
}

fn main() {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Info);
    clog.init();

    let config = Config::load(Path::new("config.toml"));
    let data_dir = &config.storage.data_dir;
    info!("Using data directory {}", data_dir.display());

    let not_found = NotFoundBlacklist::load_or_default(data_dir);
    let mut artists =
        ArtistBlacklist::load_or_default(data_dir, config.blacklist.recheck_interval_days);
    let mut borrowed = BorrowedBlacklist::load_or_default(data_dir);
    let state = SuggestionState::load_or_default(data_dir);

    let command = env::args().nth(1).unwrap_or_else(|| "stats".to_string());
    match command.as_str() {
        "stats" => print_stats(&not_found, &artists, &borrowed, &state),
        "cleanup" => {
            let expired = borrowed.cleanup_expired();
            let stale = artists.clear_older_than(config.blacklist.retention_days);
            println!("Removed {expired} expired borrow entries and {stale} stale artist entries");
            print_stats(&not_found, &artists, &borrowed, &state);
        }
        other => {
            eprintln!("Unknown command '{other}'. Usage: bibrec [stats|cleanup]");
            std::process::exit(2);
        }
    }
}
