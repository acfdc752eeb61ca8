//! Source labels of the curated lists and the personalized bucket.
//!
//! Every candidate carries the label of the list it came from; the
//! recommender balances across these labels. Personalized per-artist labels
//! are generated, so they fold into one synthetic bucket for balancing.

// Film sources
pub const SOURCE_OSCAR_BEST_PICTURE: &str = "Oscar (Bester Film)";
pub const SOURCE_FBW_EXCEPTIONAL: &str = "FBW Prädikat besonders wertvoll";
pub const SOURCE_BBC_100_FILMS: &str = "BBC 100 Greatest Films of the 21st Century";

// Music sources
pub const SOURCE_OSCAR_BEST_SCORE: &str = "Oscar (Beste Filmmusik)";
pub const SOURCE_RADIO_EINS_TOP_100: &str = "Radio Eins Top 100 Alben 2019";

// Book sources
pub const SOURCE_NYT_CANON: &str = "New York Times Kanon des 21. Jahrhunderts";

const PERSONALIZED_PREFIX: &str = "Interessant für dich";
/// Synthetic bucket all personalized labels fold into for balancing.
pub const PERSONALIZED_BUCKET: &str = "Personalisiert";

/// Builds the source label for a personalized top-artist recommendation.
pub fn personalized_source(artist_name: &str) -> String {
    format!("{PERSONALIZED_PREFIX} (Top-Interpret: {artist_name})")
}

/// Whether a label is a personalized per-artist source.
pub fn is_personalized(source: &str) -> bool {
    source.contains(PERSONALIZED_PREFIX)
}

/// Maps a source label to its balancing bucket: personalized labels share
/// one bucket, curated labels are their own.
pub fn balancing_bucket(source: &str) -> &str {
    if is_personalized(source) {
        PERSONALIZED_BUCKET
    } else {
        source
    }
}
