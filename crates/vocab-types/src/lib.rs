//! Shared types for building a core vocabulary out of several frequency corpora.
//!
//! Every table in the pipeline is a set of [`LemmaRow`]s with one absolute and
//! one relative frequency per [`Corpus`]. The corpus set is fixed at compile
//! time, so per-corpus values live in plain `[f64; CORPUS_COUNT]` arrays indexed
//! by [`Corpus::index`]. Morphological relations handed over by upstream
//! analysis are [`RelationEdge`]s (and [`CompoundEdge`]s for compounds, which
//! also carry a compositionality score).
//!
//! ```rust
//! use vocab_types::{Corpus, LemmaRow};
//!
//! let corpus = Corpus::from_name("wiki").unwrap();
//! assert_eq!(corpus.abs_column(), "abs_freq_wiki");
//!
//! let mut row = LemmaRow::new("kissa");
//! row.abs_freq[corpus.index()] = 3.0;
//! assert_eq!(row.total_abs(), 3.0);
//! ```

use std::fmt;

/// Number of corpora every frequency table carries.
pub const CORPUS_COUNT: usize = 6;

/// Column prefix for absolute counts.
pub const ABS_FREQ_PREFIX: &str = "abs_freq_";
/// Column prefix for relative (size-normalised) frequencies.
pub const REL_FREQ_PREFIX: &str = "relative_freq_";

/// One independent source of word-frequency counts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Corpus {
    /// Suomi24 discussion forum.
    S24,
    /// Parliament proceedings (KLK).
    Klk,
    /// Magazines and newspapers.
    Lehdet,
    Wiki,
    Reddit,
    /// OpenSubtitles.
    Opensub,
}

impl Corpus {
    /// All corpora in their fixed processing order.
    pub const ALL: [Corpus; CORPUS_COUNT] = [
        Corpus::S24,
        Corpus::Klk,
        Corpus::Lehdet,
        Corpus::Wiki,
        Corpus::Reddit,
        Corpus::Opensub,
    ];

    /// Position of this corpus in [`Corpus::ALL`] and in per-corpus arrays.
    pub fn index(self) -> usize {
        match self {
            Corpus::S24 => 0,
            Corpus::Klk => 1,
            Corpus::Lehdet => 2,
            Corpus::Wiki => 3,
            Corpus::Reddit => 4,
            Corpus::Opensub => 5,
        }
    }

    /// Short name used in column headers.
    pub fn name(self) -> &'static str {
        match self {
            Corpus::S24 => "s24",
            Corpus::Klk => "klk",
            Corpus::Lehdet => "lehdet",
            Corpus::Wiki => "wiki",
            Corpus::Reddit => "reddit",
            Corpus::Opensub => "opensub",
        }
    }

    /// Parse a short corpus name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        Corpus::ALL.into_iter().find(|c| c.name() == lower)
    }

    /// Header of the absolute-count column, e.g. `abs_freq_wiki`.
    pub fn abs_column(self) -> String {
        format!("{ABS_FREQ_PREFIX}{}", self.name())
    }

    /// Header of the relative-frequency column, e.g. `relative_freq_wiki`.
    pub fn rel_column(self) -> String {
        format!("{REL_FREQ_PREFIX}{}", self.name())
    }
}

impl fmt::Display for Corpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-lemma frequency record.
///
/// `abs_freq` and `rel_freq` always move together: anything that adds mass to
/// one adds the matching mass to the other.
#[derive(Clone, Debug, PartialEq)]
pub struct LemmaRow {
    pub lemma: String,
    /// Source part-of-speech tag; only meaningful before merging.
    pub pos: Option<String>,
    pub abs_freq: [f64; CORPUS_COUNT],
    pub rel_freq: [f64; CORPUS_COUNT],
}

impl LemmaRow {
    /// Row with all frequencies zero and no POS.
    pub fn new(lemma: impl Into<String>) -> Self {
        Self {
            lemma: lemma.into(),
            pos: None,
            abs_freq: [0.0; CORPUS_COUNT],
            rel_freq: [0.0; CORPUS_COUNT],
        }
    }

    /// Add `factor` times every frequency column of `other` into this row.
    pub fn add_scaled(&mut self, other: &LemmaRow, factor: f64) {
        for idx in 0..CORPUS_COUNT {
            self.abs_freq[idx] += other.abs_freq[idx] * factor;
            self.rel_freq[idx] += other.rel_freq[idx] * factor;
        }
    }

    /// Add `other`'s frequencies divided evenly over `parts` recipients.
    pub fn add_share(&mut self, other: &LemmaRow, parts: usize) {
        let parts = parts as f64;
        for idx in 0..CORPUS_COUNT {
            self.abs_freq[idx] += other.abs_freq[idx] / parts;
            self.rel_freq[idx] += other.rel_freq[idx] / parts;
        }
    }

    pub fn abs(&self, corpus: Corpus) -> f64 {
        self.abs_freq[corpus.index()]
    }

    pub fn rel(&self, corpus: Corpus) -> f64 {
        self.rel_freq[corpus.index()]
    }

    /// Sum of absolute counts over all corpora.
    pub fn total_abs(&self) -> f64 {
        self.abs_freq.iter().sum()
    }

    /// Largest relative frequency over all corpora.
    pub fn max_rel(&self) -> f64 {
        self.rel_freq.iter().copied().fold(0.0, f64::max)
    }
}

/// Which morphological relation a set of edges describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RelationKind {
    Loan,
    Derivation,
    Compound,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelationKind::Loan => "loan",
            RelationKind::Derivation => "derivation",
            RelationKind::Compound => "compound",
        })
    }
}

/// A derived lemma and the lemmas that absorb its mass when it is removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationEdge {
    pub derived_lemma: String,
    pub part_lemmas: Vec<String>,
}

impl RelationEdge {
    pub fn new<I, S>(derived_lemma: impl Into<String>, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            derived_lemma: derived_lemma.into(),
            part_lemmas: parts.into_iter().map(Into::into).collect(),
        }
    }
}

/// Compound edge with its precomputed compositionality score.
#[derive(Clone, Debug, PartialEq)]
pub struct CompoundEdge {
    pub edge: RelationEdge,
    /// Cosine similarity between the compound and the sum of its parts.
    pub compositionality: f64,
}

/// Cross-corpus aggregates of a row's relative frequencies.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aggregates {
    /// Mean after dropping the single lowest and single highest value.
    pub trimmed_mean: f64,
    pub min: f64,
    pub max: f64,
}

/// A row of the final vocabulary table.
#[derive(Clone, Debug, PartialEq)]
pub struct VocabRow {
    pub row: LemmaRow,
    pub aggregates: Aggregates,
    /// Picked by one of the seed passes.
    pub is_core_seed: bool,
    /// Picked by the seed pass that ran before relation trimming.
    pub is_pretrim_member: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corpus_names_and_columns() {
        for corpus in Corpus::ALL {
            assert_eq!(Corpus::from_name(corpus.name()), Some(corpus));
            assert_eq!(Corpus::ALL[corpus.index()], corpus);
        }
        assert_eq!(Corpus::from_name(" OpenSub "), Some(Corpus::Opensub));
        assert_eq!(Corpus::from_name("twitter"), None);
        assert_eq!(Corpus::Klk.rel_column(), "relative_freq_klk");
    }

    #[test]
    fn add_scaled_moves_both_columns() {
        let mut head = LemmaRow::new("kissa");
        let mut derived = LemmaRow::new("kissanpentu");
        derived.abs_freq[Corpus::Wiki.index()] = 10.0;
        derived.rel_freq[Corpus::Wiki.index()] = 0.5;

        head.add_scaled(&derived, 0.5);
        assert_eq!(head.abs(Corpus::Wiki), 5.0);
        assert_eq!(head.rel(Corpus::Wiki), 0.25);
        assert_eq!(head.abs(Corpus::S24), 0.0);
    }

    #[test]
    fn max_rel_over_corpora() {
        let mut row = LemmaRow::new("talo");
        row.rel_freq = [1.0, 4.0, 2.0, 0.0, 3.0, 0.5];
        assert_eq!(row.max_rel(), 4.0);
    }
}
