//! Set-overlap helpers shared by enhancement, branching and summarization

use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

/// Jaccard similarity of two sets; 0.0 when both are empty
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Jaccard similarity for hash sets
pub fn jaccard_hashed<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Lowercased alphanumeric words of a text
pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// Distinct lowercased words of a text
pub fn word_set(text: &str) -> HashSet<String> {
    words(text).collect()
}
