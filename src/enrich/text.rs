use std::collections::HashSet;

const NAME_SEPARATORS: [char; 7] = ['&', '/', '-', '(', ')', '.', ','];

/// Lowercases, maps separator punctuation to spaces and collapses runs of
/// whitespace. Used for every name-keyword lookup.
pub fn normalize_name(text: &str) -> String {
    let replaced: String = text
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if NAME_SEPARATORS.contains(&c) { ' ' } else { c })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cuisine strings only get `/` and `-` folded.
pub fn normalize_cuisine(text: &str) -> String {
    text.to_lowercase().trim().replace(['/', '-'], " ")
}

/// Number of keywords occurring as substrings of `text`.
pub fn keyword_score(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| text.contains(*kw)).count()
}

/// Picks the bucket with the strictly highest score; earlier buckets win ties.
/// `None` when nothing scores.
pub fn best_bucket<'a>(text: &str, buckets: &[(&'a str, &[&str])]) -> Option<&'a str> {
    let mut best: Option<&'a str> = None;
    let mut best_score = 0;

    for (label, keywords) in buckets {
        let score = keyword_score(text, keywords);
        if score > best_score {
            best_score = score;
            best = Some(*label);
        }
    }

    best
}

fn similarity_key(name: &str) -> String {
    normalize_name(name)
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

fn token_dice(a: &str, b: &str) -> f64 {
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    2.0 * shared as f64 / (left.len() + right.len()) as f64
}

/// Name similarity in `0.0..=1.0`: the larger of the character edit ratio and
/// the token overlap over normalised names. Two empty names score 0.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = similarity_key(a);
    let b = similarity_key(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    levenshtein_ratio(&a, &b).max(token_dice(&a, &b))
}
