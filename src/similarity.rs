use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use crate::normalize::normalize_name;

/// Curated name alias pairs: nicknames, shortened legal names, multi-part
/// surname spellings. Maintained by hand as operators adjudicate review
/// exports; matched bidirectionally after normalization.
const RAW_ALIASES: &[(&str, &str)] = &[
    ("CJ Egan-Riley", "Conrad Jonathan Egan-Riley"),
    ("Saud Abdulhamid", "Saud Abdullah Abdul Hamid"),
    ("Nathan Buayi-Kiala", "Nathan Mbala"),
    ("Matz Sels", "Mathias Sels"),
    ("Habib Diarra", "Habibou Mouhamadou Diarra"),
    ("Chris Bedia", "Christian Kouakou Bedia"),
];

static ALIASES: Lazy<Vec<(String, String)>> = Lazy::new(|| {
    RAW_ALIASES
        .iter()
        .map(|(a, b)| (normalize_name(a), normalize_name(b)))
        .collect()
});

const ALIAS_SCORE: f64 = 0.95;
const SUBSTRING_SCORE: f64 = 0.88;
const SURNAME_BONUS: f64 = 0.25;
const CHAR_SIMILARITY_SCALE: f64 = 0.92;
const MIN_SUBSTRING_LEN: usize = 4;

/// Confidence in [0,1] that two names denote the same person.
///
/// Rule order trades recall for precision: alias and exact hits are trusted
/// fully, substring and token overlap catch word-order and missing-middle-name
/// cases, and the character-level ratio is the typo-tolerant floor, discounted
/// so it never outranks an alias or exact hit.
pub fn name_similarity(name_a: &str, name_b: &str) -> f64 {
    let a = normalize_name(name_a);
    let b = normalize_name(name_b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    if is_alias_pair(&a, &b) {
        return ALIAS_SCORE;
    }

    if a == b {
        return 1.0;
    }

    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if shorter.len() >= MIN_SUBSTRING_LEN && longer.contains(shorter.as_str()) {
        return SUBSTRING_SCORE;
    }

    let tokens_a: HashSet<&str> = a.split(' ').collect();
    let tokens_b: HashSet<&str> = b.split(' ').collect();
    let intersection = tokens_a.intersection(&tokens_b).count() as f64;
    let union = tokens_a.union(&tokens_b).count() as f64;
    let jaccard = intersection / union;

    // Last token is treated as the surname, usually the strongest signal.
    let surname_bonus = match (a.rsplit(' ').next(), b.rsplit(' ').next()) {
        (Some(last_a), Some(last_b)) if last_a == last_b => SURNAME_BONUS,
        _ => 0.0,
    };
    let base_score = (jaccard + surname_bonus).min(1.0);

    let char_score = matching_blocks_ratio(&a, &b) * CHAR_SIMILARITY_SCALE;

    base_score.max(char_score)
}

/// Longest-matching-blocks similarity ratio in [0,1]: twice the total size of
/// the recursively matched common blocks over the combined length.
fn matching_blocks_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matched = matched_size(&a, &b);
    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

fn matched_size(a: &[char], b: &[char]) -> usize {
    let (a_start, b_start, size) = longest_common_block(a, b);
    if size == 0 {
        return 0;
    }
    matched_size(&a[..a_start], &b[..b_start])
        + size
        + matched_size(&a[a_start + size..], &b[b_start + size..])
}

fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0usize, 0usize, 0usize);
    let mut run_ending_at: HashMap<usize, usize> = HashMap::new();
    for (i, ca) in a.iter().enumerate() {
        let mut next_runs = HashMap::new();
        for (j, cb) in b.iter().enumerate() {
            if ca != cb {
                continue;
            }
            let len = j
                .checked_sub(1)
                .and_then(|prev| run_ending_at.get(&prev))
                .copied()
                .unwrap_or(0)
                + 1;
            next_runs.insert(j, len);
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        run_ending_at = next_runs;
    }
    best
}

fn is_alias_pair(a: &str, b: &str) -> bool {
    ALIASES
        .iter()
        .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
}
