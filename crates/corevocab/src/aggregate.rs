use vocab_types::{Aggregates, LemmaRow};

/// Mean after dropping the single lowest and single highest value. With two
/// values or fewer nothing is dropped.
pub fn trimmed_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let kept = if sorted.len() > 2 {
        &sorted[1..sorted.len() - 1]
    } else {
        &sorted[..]
    };
    kept.iter().sum::<f64>() / kept.len() as f64
}

/// Cross-corpus aggregates of a row's relative frequencies.
pub fn aggregates(row: &LemmaRow) -> Aggregates {
    let values = &row.rel_freq;
    Aggregates {
        trimmed_mean: trimmed_mean(values),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_one_lowest_and_one_highest() {
        let mut row = LemmaRow::new("kissa");
        row.rel_freq = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        let agg = aggregates(&row);
        assert_eq!(agg.trimmed_mean, 3.5);
        assert_eq!(agg.min, 1.0);
        assert_eq!(agg.max, 100.0);
    }

    #[test]
    fn repeated_extremes_drop_only_once() {
        assert_eq!(trimmed_mean(&[0.0, 0.0, 0.0, 6.0, 6.0, 6.0]), 3.0);
    }

    #[test]
    fn short_inputs() {
        assert_eq!(trimmed_mean(&[]), 0.0);
        assert_eq!(trimmed_mean(&[2.0, 4.0]), 3.0);
    }
}
