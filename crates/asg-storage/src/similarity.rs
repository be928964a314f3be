//! Pairwise node similarity for clone detection.
//!
//! Two nodes are comparable only if they have the same kind under the same
//! schema; otherwise their similarity is 0. For comparable nodes every
//! similarity-relevant attribute scores in `[0, 1]`: booleans, integers and
//! enum variants score 1 on an exact match and 0 otherwise, strings score
//! their normalized edit-distance similarity. A string pair scoring below
//! `min_for_strings` makes the whole pair non-matching (0). Otherwise the
//! mean attribute score `s` is lifted onto `[minimum, 1]` as
//! `s * (1 - minimum) + minimum`.

use serde::{Deserialize, Serialize};

use asg_core::{AttrValue, NodeRef};

/// Similarity thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Floor of the similarity of two comparable nodes.
    pub minimum: f64,
    /// String attributes less similar than this make the pair non-matching.
    pub min_for_strings: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        SimilarityConfig {
            minimum: 0.1,
            min_for_strings: 0.0,
        }
    }
}

/// Similarity of two nodes, possibly from different arenas, in `[0, 1]`.
pub fn similarity(a: NodeRef<'_>, b: NodeRef<'_>, config: &SimilarityConfig) -> f64 {
    let schema = a.arena().schema();
    if a.kind() != b.kind() || schema.name() != b.arena().schema().name() {
        return 0.0;
    }

    let mut matched = 0.0;
    let mut count = 0usize;
    for (attr, left) in a.attrs() {
        if !schema.attr(attr).is_some_and(|def| def.in_similarity) {
            continue;
        }
        let Some(right) = b.attr(attr) else {
            continue;
        };
        let score = match (left, right) {
            (AttrValue::Str(x), AttrValue::Str(y)) => {
                let x = a.arena().strings().get(x).unwrap_or("");
                let y = b.arena().strings().get(y).unwrap_or("");
                let sim = string_similarity(x, y);
                if sim < config.min_for_strings {
                    return 0.0;
                }
                sim
            }
            (left, right) if left == right => 1.0,
            _ => 0.0,
        };
        matched += score;
        count += 1;
    }

    if count == 0 || matched == count as f64 {
        return 1.0;
    }
    let mean = matched / count as f64;
    (mean * (1.0 - config.minimum) + config.minimum).min(1.0)
}

/// `1 - distance / longer length`, with two empty strings fully similar.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Character-level edit distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (curr[j - 1] + 1).min(prev[j] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use asg_core::catalog::python::{self, attr, kind};
    use asg_core::Arena;

    #[test]
    fn edit_distance() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("héllo", "hello"), 1);
    }

    #[test]
    fn string_similarity_is_normalized() {
        assert_eq!(string_similarity("", ""), 1.0);
        assert_eq!(string_similarity("abcd", "abcx"), 0.75);
        assert_eq!(string_similarity("ab", "xy"), 0.0);
    }

    #[test]
    fn different_kinds_are_dissimilar() {
        let mut arena = Arena::new(python::schema());
        let a = arena.create(kind::IDENTIFIER).unwrap();
        let b = arena.create(kind::STRING_LITERAL).unwrap();
        let sim = similarity(arena.get(a).unwrap(), arena.get(b).unwrap(), &SimilarityConfig::default());
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn identical_nodes_are_fully_similar() {
        let mut arena = Arena::new(python::schema());
        let a = arena.create(kind::FUNCTION_DEF).unwrap();
        arena.set_str(a, attr::NAME, "run").unwrap();
        let node = arena.get(a).unwrap();
        assert_eq!(similarity(node, node, &SimilarityConfig::default()), 1.0);
    }

    #[test]
    fn partial_match_is_lifted_by_minimum() {
        let mut arena = Arena::new(python::schema());
        let a = arena.create(kind::FUNCTION_DEF).unwrap();
        let b = arena.create(kind::FUNCTION_DEF).unwrap();
        arena.set_str(a, attr::NAME, "abcd").unwrap();
        arena.set_str(b, attr::NAME, "abcx").unwrap();
        arena.set_attr(b, attr::IS_ASYNC, asg_core::AttrValue::Bool(true)).unwrap();

        // name 0.75, docstring 1, isGenerator 1, isAsync 0: mean 0.6875.
        let sim = similarity(arena.get(a).unwrap(), arena.get(b).unwrap(), &SimilarityConfig::default());
        assert!((sim - (0.6875 * 0.9 + 0.1)).abs() < 1e-12);
    }

    #[test]
    fn positions_do_not_count() {
        let mut arena = Arena::new(python::schema());
        let a = arena.create(kind::IDENTIFIER).unwrap();
        let b = arena.create(kind::IDENTIFIER).unwrap();
        arena.set_attr(b, attr::LINE, asg_core::AttrValue::Int(99)).unwrap();
        let sim = similarity(arena.get(a).unwrap(), arena.get(b).unwrap(), &SimilarityConfig::default());
        assert_eq!(sim, 1.0);
    }

    #[test]
    fn weak_string_match_rejects_pair() {
        let mut arena = Arena::new(python::schema());
        let a = arena.create(kind::IDENTIFIER).unwrap();
        let b = arena.create(kind::IDENTIFIER).unwrap();
        arena.set_str(a, attr::NAME, "alpha").unwrap();
        arena.set_str(b, attr::NAME, "omega").unwrap();
        let strict = SimilarityConfig {
            min_for_strings: 0.5,
            ..SimilarityConfig::default()
        };
        assert_eq!(similarity(arena.get(a).unwrap(), arena.get(b).unwrap(), &strict), 0.0);
        assert!(similarity(arena.get(a).unwrap(), arena.get(b).unwrap(), &SimilarityConfig::default()) > 0.1);
    }

    #[test]
    fn nodes_from_different_arenas_compare_by_text() {
        let mut left = Arena::new(python::schema());
        left.intern("shift");
        let mut right = Arena::new(python::schema());
        let a = left.create(kind::IDENTIFIER).unwrap();
        let b = right.create(kind::IDENTIFIER).unwrap();
        left.set_str(a, attr::NAME, "value").unwrap();
        right.set_str(b, attr::NAME, "value").unwrap();
        let sim = similarity(left.get(a).unwrap(), right.get(b).unwrap(), &SimilarityConfig::default());
        assert_eq!(sim, 1.0);
    }
}
