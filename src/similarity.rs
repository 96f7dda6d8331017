// 🔤 Similarity Scorer - Levenshtein distance between descriptions
//
// Comparison is case-insensitive per character; lengths are counted in
// chars so multi-byte descriptions score the same as their ASCII cousins.

/// Case-insensitive character equality.
fn chars_match(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Edit distance with unit cost for insert, delete and substitute.
///
/// Table rows follow `b`, columns follow `a`. Only two rows are kept alive;
/// the result is identical to the full `(len(b)+1) x (len(a)+1)` table.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Row 0: transforming "" into a[..j] costs j insertions
    let mut prev: Vec<usize> = (0..=a.len()).collect();
    let mut curr: Vec<usize> = vec![0; a.len() + 1];

    for i in 1..=b.len() {
        curr[0] = i;
        for j in 1..=a.len() {
            let cost = if chars_match(b[i - 1], a[j - 1]) { 0 } else { 1 };
            curr[j] = (prev[j] + 1) // deletion
                .min(curr[j - 1] + 1) // insertion
                .min(prev[j - 1] + cost); // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[a.len()]
}

/// Normalized similarity in `0..=100`.
///
/// `round((1 - distance / max(len_a, len_b)) * 100)`, with two empty strings
/// defined as identical.
pub fn similarity(a: &str, b: &str) -> u8 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100;
    }

    let distance = levenshtein_distance(a, b);
    let ratio = 1.0 - distance as f64 / max_len as f64;
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}
