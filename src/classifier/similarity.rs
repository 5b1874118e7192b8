//! Name similarity used when revalidating a stored group against the provider.

use crate::store::name_key;
use strsim::normalized_levenshtein;

/// Floor applied when one name contains the other.
const CONTAINMENT_FLOOR: f64 = 0.8;

/// Similarity in `0.0..=1.0` between two names, compared trimmed and
/// lowercased: `1 - distance / longer_length`.
///
/// When one name contains the other and covers at least half of it, the
/// score is raised to at least 0.8. "Seventeen" vs "Seventeen BSS" gets the
/// floor; "Twice" vs "Twice Entertainment" does not.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = name_key(a);
    let b = name_key(b);
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let longer = len_a.max(len_b);
    let shorter = len_a.min(len_b);
    let ratio = normalized_levenshtein(&a, &b);

    let contained = a.contains(b.as_str()) || b.contains(a.as_str());
    if contained && shorter * 2 >= longer {
        ratio.max(CONTAINMENT_FLOOR)
    } else {
        ratio
    }
}
