use std::collections::HashSet;

use serde::Serialize;
use tracing::info;
use vocab_trim::{CompositionalityPolicy, EdgeOrder};
use vocab_types::LemmaRow;

pub const DEFAULT_TARGET_LEN: usize = 12_000;
pub const DEFAULT_SEED_QUOTA: usize = 2_000;
pub const DEFAULT_SEED: u64 = 0;
pub const DEFAULT_POS_FILTER: [&str; 5] = ["V", "N", "A", "Adv", "Adp"];

/// How the list is extended from the seed to the target length.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BalanceMode {
    /// Next word comes from the corpus with the lowest covered share of its tokens.
    Coverage,
    /// Next word fills the emptiest log-frequency bucket.
    #[default]
    Buckets,
}

/// What counts against a corpus's seed quota.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SeedCounting {
    /// Only lemmas this corpus adds to the list.
    #[default]
    NewOnly,
    /// Every lemma visited, including ones an earlier corpus already chose.
    Visited,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineConfig {
    pub target_len: usize,
    pub seed_quota: usize,
    /// Quota of the seed pass over the untrimmed table; 0 skips it.
    pub pretrim_quota: usize,
    pub seed_counting: SeedCounting,
    pub balance: BalanceMode,
    pub edge_order: EdgeOrder,
    pub compositionality: CompositionalityPolicy,
    pub drop_hyphenated: bool,
    pub shuffle_output: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_len: DEFAULT_TARGET_LEN,
            seed_quota: DEFAULT_SEED_QUOTA,
            pretrim_quota: 0,
            seed_counting: SeedCounting::default(),
            balance: BalanceMode::default(),
            edge_order: EdgeOrder::default(),
            compositionality: CompositionalityPolicy::default(),
            drop_hyphenated: true,
            shuffle_output: false,
        }
    }
}

/// Row filters applied to the raw frequency table before merging.
#[derive(Clone, Debug)]
pub struct Filters {
    /// Allowed POS tags; empty allows everything.
    pub pos: Vec<String>,
    pub blocklist: HashSet<String>,
    /// Known citation forms; rows outside it are dropped when present.
    pub reference: Option<HashSet<String>>,
    /// Drop affixes such as `-inen` or `epä-`.
    pub drop_affixes: bool,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            pos: DEFAULT_POS_FILTER.iter().map(|p| p.to_string()).collect(),
            blocklist: HashSet::new(),
            reference: None,
            drop_affixes: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilterReport {
    pub input_rows: usize,
    pub dropped_reference: usize,
    pub dropped_pos: usize,
    pub dropped_blocklist: usize,
    pub dropped_affix: usize,
    pub kept: usize,
}

impl Filters {
    pub fn apply(&self, rows: Vec<LemmaRow>) -> (Vec<LemmaRow>, FilterReport) {
        let mut report = FilterReport {
            input_rows: rows.len(),
            ..FilterReport::default()
        };
        let kept: Vec<LemmaRow> = rows
            .into_iter()
            .filter(|row| {
                if let Some(reference) = &self.reference
                    && !reference.contains(&row.lemma)
                {
                    report.dropped_reference += 1;
                    return false;
                }
                if !self.pos.is_empty()
                    && !row
                        .pos
                        .as_deref()
                        .is_some_and(|pos| self.pos.iter().any(|p| p == pos))
                {
                    report.dropped_pos += 1;
                    return false;
                }
                if self.blocklist.contains(&row.lemma) {
                    report.dropped_blocklist += 1;
                    return false;
                }
                if self.drop_affixes && (row.lemma.starts_with('-') || row.lemma.ends_with('-')) {
                    report.dropped_affix += 1;
                    return false;
                }
                true
            })
            .collect();
        report.kept = kept.len();
        info!(
            "kept {} of {} rows after filtering ({} pos, {} reference, {} blocklist, {} affix)",
            report.kept,
            report.input_rows,
            report.dropped_pos,
            report.dropped_reference,
            report.dropped_blocklist,
            report.dropped_affix
        );
        (kept, report)
    }
}
