//! Fuzzy person-name matching against catalog hits.
//!
//! The catalog reports contributors in a semi-structured "Person(en)" field
//! buried in free-form detail text, with role tags appended and names in
//! "Last, First" order. The matcher normalizes both sides, scores them with
//! a blend of edit similarity, word overlap and surname heuristics, and
//! falls back to scanning the free text and the hit title when the person
//! field gives nothing usable.

use std::collections::HashSet;

use log::debug;
use regex::Regex;

use crate::config::MatcherConfig;
use crate::models::{CatalogHit, MatchResult, MatchedField, RankedHit};

const SEQUENCE_WEIGHT: f64 = 0.3;
const WORD_WEIGHT: f64 = 0.4;
const SUBSTRING_WEIGHT: f64 = 0.3;
const SUBSTRING_BONUS: f64 = 0.9;
const LASTNAME_BONUS: f64 = 0.95;
/// How many capitalized word sequences the free-text fallback scores.
const FULL_TEXT_NAME_SCAN_LIMIT: usize = 10;

/// Normalizes and scores person names, and ranks catalog hits by how well
/// they match an expected author and title.
pub struct NameMatcher {
    config: MatcherConfig,
    person_field: Regex,
    role_tags: Vec<Regex>,
    brackets: Regex,
    capitalized: Regex,
    punctuation: Regex,
    whitespace: Regex,
}

impl NameMatcher {
    /// Builds a matcher from the configured field tables. Only fails if a
    /// configured label produces an invalid pattern.
    pub fn new(config: MatcherConfig) -> Result<Self, regex::Error> {
        let person_field = Self::person_field_pattern(&config)?;
        let role_tags = config
            .role_tags
            .iter()
            .map(|tag| Regex::new(&format!(r"(?i)\s+{}\s*", regex::escape(tag))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            person_field,
            role_tags,
            brackets: Regex::new(r"\[[^\]]*\]")?,
            capitalized: Regex::new(r"\b([A-ZÄÖÜ][a-zäöüß]+(?:\s+[A-ZÄÖÜ][a-zäöüß]+)*)\b")?,
            punctuation: Regex::new(r"[^\w\s]")?,
            whitespace: Regex::new(r"\s+")?,
            config,
        })
    }

    fn person_field_pattern(config: &MatcherConfig) -> Result<Regex, regex::Error> {
        let label = regex::escape(&config.person_field_label);
        if config.field_boundary_labels.is_empty() {
            return Regex::new(&format!(r"(?is){label}\s*:\s*(.+)$"));
        }
        let boundaries = config
            .field_boundary_labels
            .iter()
            .map(|label| regex::escape(label))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(
            r"(?is){label}\s*:\s*(.+?)(?:\s+(?:{boundaries})|$)"
        ))
    }

    /// Canonicalizes a person name: reorders "Last, First", lowercases,
    /// replaces punctuation with spaces and collapses whitespace.
    /// Idempotent.
    pub fn normalize(&self, name: &str) -> String {
        if name.is_empty() {
            return String::new();
        }
        let reordered = match name.split_once(',') {
            Some((last, first)) => format!("{} {}", first.trim(), last.trim()),
            None => name.to_string(),
        };
        let lowered = reordered.to_lowercase();
        let without_punctuation = self.punctuation.replace_all(&lowered, " ");
        self.whitespace
            .replace_all(without_punctuation.trim(), " ")
            .into_owned()
    }

    /// Scores the similarity of two names in `[0, 1]`.
    ///
    /// Exact equality scores 1.0. An abbreviated first name ("S. King")
    /// with a matching surname scores the configured abbreviation value.
    /// Otherwise the score is the best of a weighted blend (edit similarity,
    /// word overlap, substring containment) and the surname/substring
    /// bonuses.
    pub fn similarity(&self, name1: &str, name2: &str) -> f64 {
        if name1.is_empty() || name2.is_empty() {
            return 0.0;
        }
        if name1 == name2 {
            return 1.0;
        }

        let sequence_score = strsim::normalized_levenshtein(name1, name2);

        let words1: Vec<&str> = name1.split_whitespace().collect();
        let words2: Vec<&str> = name2.split_whitespace().collect();
        if words1.is_empty() || words2.is_empty() {
            return sequence_score;
        }

        let lastname1 = words1.last().copied().unwrap_or_default();
        let lastname2 = words2.last().copied().unwrap_or_default();

        if words2.len() > 1 && words2[0].ends_with('.') && lastname1 == lastname2 {
            return self.config.abbreviation_score;
        }

        let set1: HashSet<&str> = words1.iter().copied().collect();
        let set2: HashSet<&str> = words2.iter().copied().collect();
        let intersection = set1.intersection(&set2).count();
        let union = set1.union(&set2).count();
        let word_score = if union > 0 {
            intersection as f64 / union as f64
        } else {
            0.0
        };

        let substring_score = if name1.contains(name2) || name2.contains(name1) {
            SUBSTRING_BONUS
        } else {
            0.0
        };

        let lastname_score = if !lastname1.is_empty() && lastname1 == lastname2 {
            LASTNAME_BONUS
        } else {
            0.0
        };

        let weighted = sequence_score * SEQUENCE_WEIGHT
            + word_score * WORD_WEIGHT
            + substring_score * SUBSTRING_WEIGHT;
        weighted.max(lastname_score).max(substring_score)
    }

    /// Extracts all person names from the person field of an availability
    /// text block, with role tags and bracketed annotations stripped.
    /// Returns an empty list when the field is absent.
    pub fn extract_persons(&self, availability_text: &str) -> Vec<String> {
        if availability_text.is_empty() {
            return Vec::new();
        }
        let raw = match self
            .person_field
            .captures(availability_text)
            .and_then(|caps| caps.get(1))
        {
            Some(group) => group.as_str().trim().to_string(),
            None => {
                debug!("No person field in availability text");
                return Vec::new();
            }
        };
        let collapsed = self.whitespace.replace_all(&raw, " ");

        let mut persons = Vec::new();
        for part in collapsed.split(';') {
            let mut person = part.trim().to_string();
            for role in &self.role_tags {
                person = role.replace_all(&person, "").into_owned();
            }
            person = self.brackets.replace_all(&person, "").trim().to_string();
            let person = person
                .trim_matches(|c: char| c == ' ' || c == ',' || c == ';')
                .to_string();
            if !person.is_empty() {
                persons.push(person);
            }
        }
        debug!("Extracted {} person(s) from availability text", persons.len());
        persons
    }

    /// Checks whether a catalog hit matches the expected author, trying the
    /// person field, then capitalized sequences in the free text, then the
    /// hit title, until one strategy clears the configured threshold.
    ///
    /// An empty expected author passes unconditionally.
    pub fn match_author(
        &self,
        availability_text: &str,
        title: &str,
        expected_author: &str,
    ) -> MatchResult {
        if expected_author.is_empty() {
            return MatchResult {
                found: true,
                score: 1.0,
                field: MatchedField::NoAuthorSpecified,
            };
        }

        let expected = self.normalize(expected_author);
        let threshold = self.config.threshold;

        let persons = self.extract_persons(availability_text);
        if !persons.is_empty() {
            let mut best = 0.0f64;
            for person in &persons {
                let score = self.similarity(&expected, &self.normalize(person));
                if score > best {
                    best = score;
                }
            }
            if best >= threshold {
                return MatchResult {
                    found: true,
                    score: best,
                    field: MatchedField::PersonField,
                };
            }
            debug!("Person field best score {best:.3} below threshold {threshold}");
        }

        if !availability_text.is_empty() {
            let mut best = 0.0f64;
            for candidate in self
                .capitalized
                .find_iter(availability_text)
                .take(FULL_TEXT_NAME_SCAN_LIMIT)
            {
                let score = self.similarity(&expected, &self.normalize(candidate.as_str()));
                if score > best {
                    best = score;
                }
            }
            if best >= threshold {
                return MatchResult {
                    found: true,
                    score: best,
                    field: MatchedField::FullText,
                };
            }
        }

        if !title.is_empty() {
            let score = self.similarity(&expected, &self.normalize(title));
            if score >= threshold {
                return MatchResult {
                    found: true,
                    score,
                    field: MatchedField::TitleField,
                };
            }
        }

        MatchResult {
            found: false,
            score: 0.0,
            field: MatchedField::NoMatch,
        }
    }

    /// Filters and ranks catalog hits by author match, optionally assisted
    /// by a title match.
    ///
    /// With a title, a hit is accepted when the weighted combination of
    /// author and title scores clears the threshold, or when the title alone
    /// reaches the override score. Without one, the author match decides.
    /// Accepted hits are sorted descending by combined score; ties keep
    /// their input order.
    pub fn rank_hits(
        &self,
        hits: Vec<CatalogHit>,
        expected_author: &str,
        expected_title: Option<&str>,
    ) -> Vec<RankedHit> {
        if expected_author.is_empty() {
            return hits
                .into_iter()
                .map(|hit| RankedHit {
                    hit,
                    author_score: 1.0,
                    title_score: 0.0,
                    combined_score: 1.0,
                    matched_field: MatchedField::NoAuthorSpecified,
                })
                .collect();
        }

        let threshold = self.config.threshold;
        let mut ranked = Vec::new();

        for hit in hits {
            let author_match =
                self.match_author(&hit.availability_text, &hit.title, expected_author);

            match expected_title {
                Some(expected_title) => {
                    let title_score = if hit.title.is_empty() {
                        0.0
                    } else {
                        self.similarity(
                            &self.normalize(expected_title),
                            &self.normalize(&hit.title),
                        )
                    };
                    let combined_score = author_match.score * self.config.author_weight
                        + title_score * self.config.title_weight;
                    if combined_score >= threshold || title_score >= self.config.title_override {
                        ranked.push(RankedHit {
                            hit,
                            author_score: author_match.score,
                            title_score,
                            combined_score,
                            matched_field: author_match.field,
                        });
                    } else {
                        debug!(
                            "Rejected hit (combined {combined_score:.2} < {threshold}, title {title_score:.2})"
                        );
                    }
                }
                None => {
                    if author_match.found {
                        ranked.push(RankedHit {
                            hit,
                            author_score: author_match.score,
                            title_score: 0.0,
                            combined_score: author_match.score,
                            matched_field: author_match.field,
                        });
                    }
                }
            }
        }

        ranked.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}
