//! Text helpers shared by the converter stages
//!
//! Name cleaning for schema identifiers, utterance tokenization, span
//! enumeration and the word-level similarity used to pick entity display
//! strings out of an utterance.

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static SNAKE_CASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[() _-]+").unwrap());
static NON_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^1-9a-zA-Z]").unwrap());
static END_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]$").unwrap());
static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'s\b|\w+|[^\w\s]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static STEMMER: LazyLock<Stemmer> = LazyLock::new(|| Stemmer::create(Algorithm::English));

/// Reserved words of the target language; a cleaned name colliding with one
/// of these gets an underscore prefix.
const KEYWORDS: &[&str] = &[
    "let", "now", "new", "as", "of", "in", "out", "req", "opt", "true", "false", "enum",
    "null", "undefined", "monitor", "notify", "return", "filter", "join", "edge",
    "aggregate", "sort", "asc", "desc", "class", "dataset", "function", "import", "from",
    "language", "mixin", "stream", "query", "action", "list",
];

/// English stopwords dropped before computing word-level similarity.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "could", "did", "do", "does", "doing", "down", "during", "each",
    "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here",
    "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it",
    "its", "itself", "me", "more", "most", "my", "myself", "no", "nor", "not", "of", "off",
    "on", "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out", "over",
    "own", "same", "she", "should", "so", "some", "such", "than", "that", "the", "their",
    "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "with", "would", "you",
    "your", "yours", "yourself", "yourselves", "'s",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

/// Lowercase snake case: runs of spaces, parentheses, underscores and dashes
/// collapse into one underscore.
pub fn snake_case(v: &str) -> String {
    SNAKE_CASE.replace_all(v.trim(), "_").to_lowercase()
}

/// Strip combining diacritical marks after canonical decomposition.
pub fn remove_accent(v: &str) -> String {
    v.nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect()
}

/// Drop a single trailing `.`, `!` or `?`.
pub fn remove_end_punctuation(v: &str) -> String {
    END_PUNCTUATION.replace(v, "").into_owned()
}

/// Turn a knowledge-base label into an identifier usable as a table or
/// property name.
///
/// ```
/// use sparql2thingtalk::text::clean_name;
///
/// assert_eq!(clean_name("date of birth"), "date_of_birth");
/// assert_eq!(clean_name("member(s)"), "members");
/// assert_eq!(clean_name("U.S. state"), "us_state");
/// ```
pub fn clean_name(v: &str) -> String {
    let v = v.replace("(s)", "s");
    let v = snake_case(&v);
    let v = v.replace("u.s.", "us");
    let v = remove_accent(&v);
    let v = NON_IDENTIFIER.replace_all(&v, "_").replace("__", "_");

    let starts_ok = v
        .chars()
        .next()
        .map(|c| c.is_ascii_lowercase() || c == '_')
        .unwrap_or(false);
    let mut v = if starts_ok { v } else { format!("_{}", v) };
    if KEYWORDS.contains(&v.as_str()) {
        v = format!("_{}", v);
    }
    v
}

/// Lowercase an utterance and split it into space-separated tokens, with
/// punctuation and possessive `'s` as their own tokens.
pub fn tokenize(utterance: &str) -> String {
    let lowered = utterance.to_lowercase();
    TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every contiguous token span of a sentence, shortest first.
pub fn get_spans(s: &str) -> Vec<String> {
    let cleaned = remove_end_punctuation(s.trim());
    let tokens: Vec<&str> = WHITESPACE
        .split(cleaned.trim())
        .filter(|t| !t.is_empty())
        .collect();
    let mut spans = Vec::new();
    for len in 1..=tokens.len() {
        for start in 0..=(tokens.len() - len) {
            spans.push(tokens[start..start + len].join(" "));
        }
    }
    spans
}

fn significant_words(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(' ')
        .filter(|w| !w.is_empty() && !STOPWORD_SET.contains(w))
        .map(|w| STEMMER.stem(&remove_accent(w)).into_owned())
        .collect()
}

/// Word-level F1 between two strings after lowercasing, stopword removal and
/// stemming.
pub fn similarity(s1: &str, s2: &str) -> f64 {
    let words1 = significant_words(s1);
    let words2 = significant_words(s2);
    if words1.is_empty() || words2.is_empty() {
        return 0.0;
    }
    let intersect = words1.iter().filter(|w| words2.contains(w)).count();
    if intersect == 0 {
        return 0.0;
    }
    let precision = intersect as f64 / words1.len() as f64;
    let recall = intersect as f64 / words2.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// The candidate most similar to `s`, ignoring candidates that share no
/// significant word with it. Earlier candidates win ties.
pub fn closest<'a, I>(s: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut best: Option<&'a str> = None;
    let mut best_score = 0.0;
    for candidate in candidates {
        let score = similarity(s, candidate);
        if score > best_score {
            best_score = score;
            best = Some(candidate.as_str());
        }
    }
    best
}

fn number_word(w: &str) -> Option<u64> {
    let n = match w {
        "zero" => 0,
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        "hundred" => 100,
        "thousand" => 1_000,
        "million" => 1_000_000,
        _ => return None,
    };
    Some(n)
}

/// Running value of a spelled-out number: `total` holds the completed
/// thousands/millions groups, `current` the group being read.
#[derive(Default)]
struct NumberWords {
    total: u64,
    current: u64,
}

impl NumberWords {
    fn push(&mut self, n: u64) {
        match n {
            100 => self.current = self.current.max(1) * 100,
            1_000 | 1_000_000 => {
                self.total += self.current.max(1) * n;
                self.current = 0;
            }
            _ => self.current += n,
        }
    }

    fn value(&self) -> u64 {
        self.total + self.current
    }
}

/// Replace spelled-out numbers with digits so measures written in words can
/// be matched against numeric literals. Consecutive number words form one
/// number ("two hundred and five" becomes "205").
pub fn words_to_numbers(utterance: &str) -> String {
    let words: Vec<&str> = utterance.split(' ').collect();
    let mut out: Vec<String> = Vec::with_capacity(words.len());
    let mut number: Option<NumberWords> = None;
    for (i, w) in words.iter().enumerate() {
        if let Some(n) = number_word(w) {
            number.get_or_insert_with(NumberWords::default).push(n);
            continue;
        }
        let joins = *w == "and" && words.get(i + 1).and_then(|next| number_word(next)).is_some();
        if number.is_some() && joins {
            continue;
        }
        if let Some(done) = number.take() {
            out.push(done.value().to_string());
        }
        out.push(w.to_string());
    }
    if let Some(done) = number {
        out.push(done.value().to_string());
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("position held"), "position_held");
        assert_eq!(clean_name("sovereign state"), "sovereign_state");
        assert_eq!(clean_name("Pokémon"), "pokemon");
        assert_eq!(clean_name("20th century"), "_2_th_century");
        assert_eq!(clean_name("filter"), "_filter");
        assert_eq!(clean_name("position played on team / speciality"), "position_played_on_team__speciality");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Who is Obama's wife?"), "who is obama 's wife ?");
        assert_eq!(tokenize("How tall is the Eiffel   Tower"), "how tall is the eiffel tower");
    }

    #[test]
    fn test_get_spans() {
        let spans = get_spans("who wrote dune ?");
        assert_eq!(spans[0], "who");
        assert!(spans.contains(&"wrote dune".to_string()));
        assert!(spans.contains(&"who wrote dune".to_string()));
        assert!(!spans.iter().any(|s| s.contains('?')));
        assert_eq!(spans.len(), 6);
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("the", "of"), 0.0);
        assert_eq!(similarity("Douglas Adams", "douglas adams"), 1.0);
        let partial = similarity("Douglas Adams", "adams");
        assert!(partial > 0.0 && partial < 1.0);
    }

    #[test]
    fn test_closest_prefers_exact_span() {
        let spans = get_spans("who is the wife of barack obama");
        assert_eq!(closest("Barack Obama", &spans), Some("barack obama"));
        assert_eq!(closest("Angela Merkel", &spans), None);
    }

    #[test]
    fn test_words_to_numbers() {
        assert_eq!(words_to_numbers("more than two hundred meters"), "more than 200 meters");
        assert_eq!(words_to_numbers("twenty five meters"), "25 meters");
        assert_eq!(words_to_numbers("two hundred and five km"), "205 km");
        assert_eq!(words_to_numbers("three thousand five hundred feet"), "3500 feet");
        assert_eq!(words_to_numbers("one and only"), "1 and only");
    }
}
