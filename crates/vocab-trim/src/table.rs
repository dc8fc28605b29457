use std::collections::HashMap;

use vocab_types::{CORPUS_COUNT, LemmaRow};

/// Lemma rows with unique lemmas, sorted ascending, plus a lemma → position map.
///
/// Only [`crate::merge_duplicates`] and the trimming stages build tables, so
/// the uniqueness and ordering invariants hold for every value of this type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FreqTable {
    rows: Vec<LemmaRow>,
    index: HashMap<String, usize>,
}

impl FreqTable {
    /// Wrap rows that are already sorted by lemma with no duplicates.
    pub(crate) fn from_sorted_unique(rows: Vec<LemmaRow>) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0].lemma < w[1].lemma));
        let index = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| (row.lemma.clone(), idx))
            .collect();
        Self { rows, index }
    }

    pub(crate) fn into_parts(self) -> (Vec<LemmaRow>, HashMap<String, usize>) {
        (self.rows, self.index)
    }

    pub fn rows(&self) -> &[LemmaRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<LemmaRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `lemma` in [`FreqTable::rows`].
    pub fn position(&self, lemma: &str) -> Option<usize> {
        self.index.get(lemma).copied()
    }

    pub fn get(&self, lemma: &str) -> Option<&LemmaRow> {
        self.position(lemma).map(|idx| &self.rows[idx])
    }

    pub fn contains(&self, lemma: &str) -> bool {
        self.index.contains_key(lemma)
    }

    /// Per-corpus sum of absolute counts.
    pub fn abs_totals(&self) -> [f64; CORPUS_COUNT] {
        let mut totals = [0.0; CORPUS_COUNT];
        for row in &self.rows {
            for (total, value) in totals.iter_mut().zip(row.abs_freq.iter()) {
                *total += value;
            }
        }
        totals
    }

    /// Sum of absolute counts over every row and corpus.
    pub fn total_mass(&self) -> f64 {
        self.abs_totals().iter().sum()
    }

    /// Keep only the rows matching `keep`; order is preserved.
    pub fn retain(self, keep: impl Fn(&LemmaRow) -> bool) -> Self {
        let rows = self.rows.into_iter().filter(|row| keep(row)).collect();
        Self::from_sorted_unique(rows)
    }
}
