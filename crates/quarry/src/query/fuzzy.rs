use serde::{Deserialize, Serialize};

use crate::Score;

/// Configuration of the near-spelling enumeration: which rewritings are
/// applied and how far a variant may drift before it is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyConfig {
    pub apply_replacements: bool,
    pub apply_swappings: bool,
    /// Variants scoring above this are dropped. Zero disables fuzzing
    /// entirely, the fuzzy set degenerates to the word itself.
    pub max_fuzziness: Score,
    pub replacements: Vec<(char, char)>,
}

impl Default for FuzzyConfig {
    fn default() -> FuzzyConfig {
        FuzzyConfig {
            apply_replacements: true,
            apply_swappings: true,
            max_fuzziness: 1.0,
            replacements: default_replacements(),
        }
    }
}

/// Character pairs treated as near-spellings of each other, applied in
/// both directions.
pub fn default_replacements() -> Vec<(char, char)> {
    vec![('k', 'c'), ('z', 's'), ('f', 'v'), ('i', 'y'), ('e', 'a')]
}

/// A rewriting early in the word drifts further from the original than
/// one at the end.
fn fuzziness_at(index: usize, length: usize) -> Score {
    1.0 - index as Score / length as Score
}

/// Enumerates near-spellings of `word` with their distance scores,
/// closest first. The word itself is not part of the result.
pub fn fuzz(config: &FuzzyConfig, word: &str) -> Vec<(String, Score)> {
    let chars: Vec<char> = word.chars().collect();
    let length = chars.len();
    if length == 0 {
        return Vec::new();
    }

    let mut variants: Vec<(String, Score)> = Vec::new();

    if config.apply_swappings {
        for index in 0..length.saturating_sub(1) {
            if chars[index] == chars[index + 1] {
                continue;
            }
            let mut swapped = chars.clone();
            swapped.swap(index, index + 1);
            variants.push((swapped.into_iter().collect(), fuzziness_at(index, length)));
        }
    }

    if config.apply_replacements {
        for index in 0..length {
            for &(a, b) in &config.replacements {
                let replaced = if chars[index] == a {
                    Some(b)
                } else if chars[index] == b {
                    Some(a)
                } else {
                    None
                };
                if let Some(replacement) = replaced {
                    let mut rewritten = chars.clone();
                    rewritten[index] = replacement;
                    variants.push((
                        rewritten.into_iter().collect(),
                        fuzziness_at(index, length),
                    ));
                }
            }
        }
    }

    variants.retain(|(variant, score)| variant != word && *score <= config.max_fuzziness);
    variants.sort_by(|(a_word, a_score), (b_word, b_score)| {
        a_score.total_cmp(b_score).then_with(|| a_word.cmp(b_word))
    });
    variants.dedup_by(|(later, _), (first, _)| later == first);
    variants
}
