use crate::config::NameWeights;

/// Normalized Levenshtein similarity of two names, ignoring case and
/// surrounding whitespace. `1.0` means identical.
pub fn name_similarity(left: &str, right: &str) -> f64 {
    let left = left.trim().to_lowercase();
    let right = right.trim().to_lowercase();
    strsim::normalized_levenshtein(&left, &right)
}

/// Weighted mean of the first and last name similarities.
pub fn composite_score(first_name: f64, last_name: f64, weights: &NameWeights) -> f64 {
    let total = weights.first_name + weights.last_name;
    if total <= 0.0 {
        return 0.0;
    }
    (first_name * weights.first_name + last_name * weights.last_name) / total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }

    #[test]
    fn ignores_case_and_padding() {
        assert!(approx(name_similarity("  JOHN ", "john"), 1.0));
    }

    #[test]
    fn one_edit_in_four_characters() {
        assert!(approx(name_similarity("Jon", "John"), 0.75));
        assert!(approx(name_similarity("", "Doe"), 0.0));
    }

    #[test]
    fn composite_is_weighted_mean() {
        let equal = NameWeights::default();
        assert!(approx(composite_score(0.75, 1.0, &equal), 0.875));

        let last_heavy = NameWeights {
            first_name: 1.0,
            last_name: 3.0,
        };
        assert!(approx(composite_score(0.0, 1.0, &last_heavy), 0.75));
        assert!(approx(
            composite_score(
                1.0,
                1.0,
                &NameWeights {
                    first_name: 0.0,
                    last_name: 0.0
                }
            ),
            0.0
        ));
    }
}
