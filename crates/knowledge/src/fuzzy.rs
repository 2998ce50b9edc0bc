//! Finding section names mentioned in generated answers.
//!
//! The answer is split into words and every contiguous run of up to
//! `max_ngram` words is compared with every section name using normalized
//! Levenshtein distance. Longer runs are tried first, so an exact multi-word
//! phrase beats a coincidental single-word overlap.

use rolerag_config::FuzzyConfig;
use rolerag_core::directory::normalize_section_name;
use std::collections::HashSet;

/// A section name found in an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyReference<'a> {
    pub name: &'a str,
    /// The answer words that matched, lower-cased.
    pub phrase: String,
    /// Character-level normalized edit distance in [0, 1].
    pub distance: f64,
    /// Mean per-word distance of the name's words to the phrase's words.
    pub token_score: f64,
    pub ngram_len: usize,
    position: usize,
}

#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    max_distance: f64,
    token_cutoff: f64,
    max_ngram: usize,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::from_config(&FuzzyConfig::default())
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn distance(a: &str, b: &str) -> f64 {
    1.0 - strsim::normalized_levenshtein(a, b)
}

/// Mean over `name_words` of the distance to the closest word in `gram`.
fn token_score(name_words: &[String], gram: &[String]) -> f64 {
    let total: f64 = name_words
        .iter()
        .map(|nw| {
            gram.iter()
                .map(|gw| distance(nw, gw))
                .fold(1.0, f64::min)
        })
        .sum();
    total / name_words.len() as f64
}

impl FuzzyMatcher {
    pub fn new(max_distance: f64, token_cutoff: f64, max_ngram: usize) -> Self {
        Self {
            max_distance,
            token_cutoff,
            max_ngram: max_ngram.max(1),
        }
    }

    pub fn from_config(config: &FuzzyConfig) -> Self {
        Self::new(config.max_distance, config.token_cutoff, config.max_ngram)
    }

    /// Section names referenced in `answer`.
    ///
    /// Results are distinct (by normalized name) and ordered by distance,
    /// then longer phrase first, then the order of `names`.
    pub fn find_references<'a>(&self, answer: &str, names: &[&'a str]) -> Vec<FuzzyReference<'a>> {
        let answer_words = words(answer);
        if answer_words.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut found: Vec<FuzzyReference<'a>> = names
            .iter()
            .enumerate()
            .filter(|(_, name)| seen.insert(normalize_section_name(name)))
            .filter_map(|(position, &name)| self.match_name(&answer_words, name, position))
            .collect();

        found.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(b.ngram_len.cmp(&a.ngram_len))
                .then(a.position.cmp(&b.position))
        });
        found
    }

    fn match_name<'a>(
        &self,
        answer_words: &[String],
        name: &'a str,
        position: usize,
    ) -> Option<FuzzyReference<'a>> {
        let name_words = words(name);
        if name_words.is_empty() {
            return None;
        }
        let target = name_words.join(" ");

        let mut best: Option<(f64, &[String])> = None;
        for n in (1..=self.max_ngram.min(answer_words.len())).rev() {
            for gram in answer_words.windows(n) {
                let d = distance(&gram.join(" "), &target);
                // Strictly lower only: on ties the longer n-gram seen first stays.
                if best.is_none_or(|(bd, _)| d < bd) {
                    best = Some((d, gram));
                }
            }
        }

        let (d, gram) = best?;
        if d >= self.max_distance {
            return None;
        }
        let ts = token_score(&name_words, gram);
        if ts >= self.token_cutoff {
            return None;
        }

        Some(FuzzyReference {
            name,
            phrase: gram.join(" "),
            distance: d,
            token_score: ts,
            ngram_len: gram.len(),
            position,
        })
    }
}
