//! Fuzzy string matching for column names
//!
//! Scores are 0-100. Strings are compared after processing: lower-cased,
//! non-alphanumerics replaced by spaces, trimmed.

/// Minimum score for a fuzzy column match
pub const DEFAULT_CUTOFF: u32 = 60;

pub fn process(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev_row: Vec<usize> = (0..=b.len()).collect();
    let mut curr_row = vec![0; b.len() + 1];

    for (i, a_char) in a.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, b_char) in b.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b.len()]
}

fn char_ratio(a: &[char], b: &[char]) -> u32 {
    let longest = a.len().max(b.len());
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let distance = levenshtein(a, b);
    (100.0 * (1.0 - distance as f64 / longest as f64)).round() as u32
}

/// Edit-distance similarity of the processed strings
pub fn ratio(a: &str, b: &str) -> u32 {
    let a: Vec<char> = process(a).chars().collect();
    let b: Vec<char> = process(b).chars().collect();
    char_ratio(&a, &b)
}

/// Best ratio of the shorter string against same-length windows of the longer
pub fn partial_ratio(a: &str, b: &str) -> u32 {
    let a: Vec<char> = process(a).chars().collect();
    let b: Vec<char> = process(b).chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0;
    }

    (0..=long.len() - short.len())
        .map(|start| char_ratio(&short, &long[start..start + short.len()]))
        .max()
        .unwrap_or(0)
}

/// Ratio after sorting whitespace-separated tokens
pub fn token_sort_ratio(a: &str, b: &str) -> u32 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let processed = process(s);
    let mut tokens: Vec<&str> = processed.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Best of plain, partial (lengths differ by 1.5x or more) and token-sort ratios
pub fn weighted_ratio(a: &str, b: &str) -> u32 {
    let len_a = process(a).chars().count();
    let len_b = process(b).chars().count();
    if len_a == 0 || len_b == 0 {
        return 0;
    }

    let base = ratio(a, b) as f64;
    let scale = len_a.max(len_b) as f64 / len_a.min(len_b) as f64;

    let partial = if scale >= 1.5 {
        partial_ratio(a, b) as f64 * 0.9
    } else {
        0.0
    };
    let token_sort = token_sort_ratio(a, b) as f64 * 0.95;

    base.max(partial).max(token_sort).round() as u32
}

/// Highest scoring choice at or above `cutoff`; earlier choices win ties
pub fn extract_best<'a, S: AsRef<str>>(
    query: &str,
    choices: &'a [S],
    cutoff: u32,
) -> Option<(&'a str, u32)> {
    let mut best: Option<(&'a str, u32)> = None;
    for choice in choices {
        let score = weighted_ratio(query, choice.as_ref());
        if score >= cutoff && best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((choice.as_ref(), score));
        }
    }
    best
}
