use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::PantryItem;

/// Minimum score for a pantry item to count as a candidate.
///
/// 0.5 accepts "pasta" -> "Pasta (Spaghetti)" (containment, 0.85) and
/// "spaghetti pasta" -> "pasta spaghetti" (overlap 1.0) while rejecting
/// "chicken breast" -> "chicken thighs" (overlap 0.33).
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

/// Share of the score granted by whole-phrase containment alone.
pub const DEFAULT_CONTAINMENT_WEIGHT: f64 = 0.7;

// Preparation words and quantity words that say nothing about what the item is.
const QUALIFIERS: &[&str] = &[
    "chopped", "fresh", "freshly", "diced", "minced", "sliced", "grated", "shredded", "crushed",
    "ground", "peeled", "cubed", "julienned", "halved", "quartered", "finely", "roughly",
    "coarsely", "thinly", "large", "small", "medium", "extra", "optional", "softened", "melted",
    "packed", "sifted", "rinsed", "drained", "to", "taste", "of", "a", "an", "the", "and", "or",
    "some", "few", "handful", "pinch", "dash", "one", "two", "three", "four", "five", "six",
    "seven", "eight", "nine", "ten", "half", "quarter", "dozen",
];

/// A name reduced to comparable tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedName {
    pub text: String,
    pub tokens: Vec<String>,
}

impl NormalizedName {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Lowercases, strips punctuation, numbers and qualifiers, and singularizes
/// every token. If only qualifiers remain ("fresh"), they are kept.
pub fn normalize_name(raw: &str) -> NormalizedName {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\'')
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();

    let words: Vec<String> = cleaned
        .split_whitespace()
        .filter(|word| !word.chars().all(|c| c.is_ascii_digit()))
        .map(singularize)
        .collect();

    let meaningful: Vec<String> = words
        .iter()
        .filter(|word| !QUALIFIERS.contains(&word.as_str()))
        .cloned()
        .collect();
    let tokens = if meaningful.is_empty() { words } else { meaningful };

    NormalizedName { text: tokens.join(" "), tokens }
}

/// Reduces singular and plural spellings to one stem: "cookie" and
/// "cookies" both become "cooky", "quiche" and "quiches" both "quich".
fn singularize(word: &str) -> String {
    let singular = if word.len() <= 3 { word.to_string() } else { strip_plural(word) };
    if let Some(stem) = singular.strip_suffix("ie") {
        return format!("{}y", stem);
    }
    for ending in ["che", "she", "sse", "xe", "ze"] {
        if singular.len() > ending.len() && singular.ends_with(ending) {
            return singular[..singular.len() - 1].to_string();
        }
    }
    singular
}

fn strip_plural(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    for suffix in ["oes", "ches", "shes", "sses", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    word.strip_suffix('s').unwrap_or(word).to_string()
}

/// Similarity between a recipe ingredient and a pantry item name, in [0, 1].
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, ingredient: &NormalizedName, candidate: &NormalizedName) -> f64;
}

/// Phrase containment (either direction, on token boundaries) blended with
/// the Jaccard overlap of the token sets.
#[derive(Debug, Clone, Copy)]
pub struct TokenOverlapScorer {
    pub containment_weight: f64,
}

impl Default for TokenOverlapScorer {
    fn default() -> Self {
        Self { containment_weight: DEFAULT_CONTAINMENT_WEIGHT }
    }
}

impl SimilarityScorer for TokenOverlapScorer {
    fn score(&self, ingredient: &NormalizedName, candidate: &NormalizedName) -> f64 {
        if ingredient.is_empty() || candidate.is_empty() {
            return 0.0;
        }
        if ingredient.text == candidate.text {
            return 1.0;
        }

        let a: HashSet<&str> = ingredient.tokens.iter().map(String::as_str).collect();
        let b: HashSet<&str> = candidate.tokens.iter().map(String::as_str).collect();
        let shared = a.intersection(&b).count() as f64;
        let union = a.union(&b).count() as f64;
        let overlap = if union > 0.0 { shared / union } else { 0.0 };

        let contained = contains_phrase(&candidate.tokens, &ingredient.tokens)
            || contains_phrase(&ingredient.tokens, &candidate.tokens);
        if contained {
            self.containment_weight + (1.0 - self.containment_weight) * overlap
        } else {
            overlap
        }
    }
}

fn contains_phrase(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && needle.len() <= haystack.len()
        && haystack.windows(needle.len()).any(|window| window == needle)
}

/// A pantry item (by position in the snapshot) that cleared the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    pub index: usize,
    pub score: f64,
}

pub struct IngredientMatcher<S: SimilarityScorer = TokenOverlapScorer> {
    scorer: S,
    threshold: f64,
}

impl IngredientMatcher<TokenOverlapScorer> {
    pub fn new(threshold: f64) -> Self {
        Self::with_scorer(TokenOverlapScorer::default(), threshold)
    }
}

impl Default for IngredientMatcher<TokenOverlapScorer> {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl<S: SimilarityScorer> IngredientMatcher<S> {
    pub fn with_scorer(scorer: S, threshold: f64) -> Self {
        Self { scorer, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Every qualifying item, best score first; ties go to the oldest
    /// acquisition, then to the item id so the order is total.
    pub fn rank(&self, ingredient_name: &str, pantry: &[PantryItem]) -> Vec<ScoredCandidate> {
        let ingredient = normalize_name(ingredient_name);
        if ingredient.is_empty() {
            return Vec::new();
        }

        let mut candidates: Vec<ScoredCandidate> = pantry
            .iter()
            .enumerate()
            .map(|(index, item)| ScoredCandidate {
                index,
                score: self.scorer.score(&ingredient, &normalize_name(&item.name)).clamp(0.0, 1.0),
            })
            .filter(|candidate| candidate.score >= self.threshold && candidate.score > 0.0)
            .collect();

        candidates.sort_by(|x, y| {
            let (a, b) = (&pantry[x.index], &pantry[y.index]);
            y.score
                .partial_cmp(&x.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.acquired_at.cmp(&b.acquired_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates
    }

    pub fn find_matches<'a>(&self, ingredient_name: &str, pantry: &'a [PantryItem]) -> Vec<(&'a PantryItem, f64)> {
        self.rank(ingredient_name, pantry)
            .into_iter()
            .map(|candidate| (&pantry[candidate.index], candidate.score))
            .collect()
    }
}
