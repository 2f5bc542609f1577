// src/rl/feature_extraction.rs - Pair feature vector for the learned scorer
use super::pairwise_scorer::FeatureRecord;

pub const FEATURE_VECTOR_SIZE: usize = 10;

pub const FEATURE_NAMES: [&str; FEATURE_VECTOR_SIZE] = [
    "name_jaro_winkler",
    "fingerprint_levenshtein",
    "token_jaccard",
    "token_containment",
    "name_sorensen_dice",
    "fingerprint_equal",
    "length_ratio",
    "same_origin",
    "attribute_agreement",
    "attribute_conflict",
];

/// Features for a pair, each in [0, 1]. Name features are zero when either
/// name is missing.
pub fn extract_pair_features(a: &FeatureRecord, b: &FeatureRecord) -> Vec<f64> {
    let mut features = Vec::with_capacity(FEATURE_VECTOR_SIZE);
    let named = !a.normalized_name.is_empty() && !b.normalized_name.is_empty();

    if named {
        features.push(strsim::jaro_winkler(&a.normalized_name, &b.normalized_name));
        features.push(strsim::normalized_levenshtein(&a.fingerprint, &b.fingerprint));
        features.push(token_jaccard(a, b));
        features.push(token_containment(a, b));
        features.push(strsim::sorensen_dice(&a.normalized_name, &b.normalized_name));
        features.push(bool_feature(
            !a.fingerprint.is_empty() && a.fingerprint == b.fingerprint,
        ));
        features.push(length_ratio(&a.normalized_name, &b.normalized_name));
    } else {
        features.extend(std::iter::repeat(0.0).take(7));
    }

    features.push(bool_feature(a.origin == b.origin));
    let (agreement, conflict) = attribute_overlap(a, b);
    features.push(agreement);
    features.push(conflict);
    features
}

fn bool_feature(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn token_jaccard(a: &FeatureRecord, b: &FeatureRecord) -> f64 {
    let union = a.tokens.union(&b.tokens).count();
    if union == 0 {
        return 0.0;
    }
    a.tokens.intersection(&b.tokens).count() as f64 / union as f64
}

fn token_containment(a: &FeatureRecord, b: &FeatureRecord) -> f64 {
    let smaller = a.tokens.len().min(b.tokens.len());
    if smaller == 0 {
        return 0.0;
    }
    a.tokens.intersection(&b.tokens).count() as f64 / smaller as f64
}

fn length_ratio(a: &str, b: &str) -> f64 {
    let (la, lb) = (a.chars().count(), b.chars().count());
    let longest = la.max(lb);
    if longest == 0 {
        0.0
    } else {
        la.min(lb) as f64 / longest as f64
    }
}

/// Share of common non-empty attribute keys whose values agree, and share that disagree.
fn attribute_overlap(a: &FeatureRecord, b: &FeatureRecord) -> (f64, f64) {
    let mut shared = 0usize;
    let mut agree = 0usize;
    for (key, value_a) in a.attributes.iter().filter(|(_, v)| !v.trim().is_empty()) {
        if let Some(value_b) = b.attributes.get(key).filter(|v| !v.trim().is_empty()) {
            shared += 1;
            if value_a.trim().eq_ignore_ascii_case(value_b.trim()) {
                agree += 1;
            }
        }
    }
    if shared == 0 {
        (0.0, 0.0)
    } else {
        (
            agree as f64 / shared as f64,
            (shared - agree) as f64 / shared as f64,
        )
    }
}
