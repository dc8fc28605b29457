use std::collections::HashSet;

use bitvec::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use vocab_trim::FreqTable;
use vocab_types::{CORPUS_COUNT, Corpus};

use crate::config::SeedCounting;

type BitSet = BitVec<usize, Lsb0>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("every frequency bucket is exhausted with {chosen} of {target} lemmas chosen")]
    BucketExhaustion { chosen: usize, target: usize },
    #[error("ran out of candidate lemmas with {chosen} of {target} chosen")]
    CoverageExhaustion { chosen: usize, target: usize },
    #[error("no lemmas left after filtering")]
    EmptyUniverse,
}

/// Which pass put a lemma on the list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Origin {
    /// Seed pass over the untrimmed table.
    PretrimSeed,
    Seed,
    /// Picked while extending the seed to the target length.
    Fill,
}

/// The chosen lemmas in pick order. A lemma is on the list at most once.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    order: Vec<String>,
    members: HashSet<String>,
    seeds: HashSet<String>,
    pretrim: HashSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, lemma: &str) -> bool {
        self.members.contains(lemma)
    }

    /// Append `lemma`; returns false if it was already chosen.
    pub fn push(&mut self, lemma: &str, origin: Origin) -> bool {
        if !self.members.insert(lemma.to_string()) {
            return false;
        }
        self.order.push(lemma.to_string());
        match origin {
            Origin::PretrimSeed => {
                self.seeds.insert(lemma.to_string());
                self.pretrim.insert(lemma.to_string());
            }
            Origin::Seed => {
                self.seeds.insert(lemma.to_string());
            }
            Origin::Fill => {}
        }
        true
    }

    /// Drop every lemma for which `keep` is false; returns how many went.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let mut dropped = HashSet::new();
        self.order.retain(|lemma| {
            let kept = keep(lemma);
            if !kept {
                dropped.insert(lemma.clone());
            }
            kept
        });
        for set in [&mut self.members, &mut self.seeds, &mut self.pretrim] {
            set.retain(|lemma| !dropped.contains(lemma));
        }
        dropped.len()
    }

    pub fn lemmas(&self) -> &[String] {
        &self.order
    }

    pub fn is_seed(&self, lemma: &str) -> bool {
        self.seeds.contains(lemma)
    }

    pub fn is_pretrim_member(&self, lemma: &str) -> bool {
        self.pretrim.contains(lemma)
    }

    /// Bit per row of `table`, set when that row's lemma is chosen.
    pub fn mask(&self, table: &FreqTable) -> BitVec<usize, Lsb0> {
        let mut mask = bitvec![usize, Lsb0; 0; table.len()];
        for lemma in &self.order {
            if let Some(idx) = table.position(lemma) {
                mask.set(idx, true);
            }
        }
        mask
    }
}

/// Lemmas each corpus contributed to a seed pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SeedReport {
    pub quota: usize,
    pub taken: [usize; CORPUS_COUNT],
    pub total: usize,
}

/// Walks a table's rows in per-corpus descending frequency order, keeping track
/// of which rows are chosen and how much of each corpus they cover.
pub struct Selector<'t> {
    table: &'t FreqTable,
    orders: [Vec<usize>; CORPUS_COUNT],
    cursors: [usize; CORPUS_COUNT],
    chosen: BitSet,
    covered: [f64; CORPUS_COUNT],
    totals: [f64; CORPUS_COUNT],
}

impl<'t> Selector<'t> {
    /// Rows already in `selection` start out chosen and covered.
    pub fn new(table: &'t FreqTable, selection: &Selection) -> Self {
        let orders = array_init::array_init(|idx| descending_order(table, Corpus::ALL[idx]));
        let chosen = selection.mask(table);
        let mut covered = [0.0; CORPUS_COUNT];
        for idx in chosen.iter_ones() {
            for (sum, value) in covered.iter_mut().zip(table.rows()[idx].abs_freq.iter()) {
                *sum += value;
            }
        }
        Self {
            table,
            orders,
            cursors: [0; CORPUS_COUNT],
            chosen,
            covered,
            totals: table.abs_totals(),
        }
    }

    /// Share of each corpus's tokens covered by the chosen rows. A corpus with
    /// no tokens reports 1.
    pub fn coverage(&self) -> [f64; CORPUS_COUNT] {
        array_init::array_init(|idx| {
            if self.totals[idx] > 0.0 {
                self.covered[idx] / self.totals[idx]
            } else {
                1.0
            }
        })
    }

    pub fn log_coverage(&self, stage: &str) {
        let coverage = self.coverage();
        for corpus in Corpus::ALL {
            info!(
                "{stage}: {corpus} coverage {:.2}%",
                coverage[corpus.index()] * 100.0
            );
        }
    }

    /// For each corpus in order, walk its rows from most to least frequent and
    /// add up to `quota` of them. Stops early once `selection` reaches `limit`.
    pub fn take_seeds(
        &mut self,
        selection: &mut Selection,
        quota: usize,
        counting: SeedCounting,
        origin: Origin,
        limit: usize,
    ) -> SeedReport {
        let mut report = SeedReport {
            quota,
            ..SeedReport::default()
        };
        for corpus in Corpus::ALL {
            let c = corpus.index();
            let mut counted = 0;
            while counted < quota && selection.len() < limit {
                let Some(&idx) = self.orders[c].get(self.cursors[c]) else {
                    break;
                };
                self.cursors[c] += 1;
                if self.chosen[idx] {
                    if counting == SeedCounting::Visited {
                        counted += 1;
                    }
                    continue;
                }
                self.choose(idx, selection, origin);
                report.taken[c] += 1;
                counted += 1;
            }
        }
        report.total = report.taken.iter().sum();
        info!(
            "seed pass took {} lemmas (quota {} per corpus)",
            report.total, quota
        );
        report
    }

    /// Repeatedly add the most frequent unchosen lemma of the least covered
    /// corpus until `selection` holds `target` lemmas.
    pub fn fill_by_coverage(
        &mut self,
        selection: &mut Selection,
        target: usize,
    ) -> Result<usize, SelectError> {
        let start = selection.len();
        while selection.len() < target {
            let coverage = self.coverage();
            let c = (0..CORPUS_COUNT)
                .min_by(|&a, &b| coverage[a].total_cmp(&coverage[b]))
                .unwrap_or(0);
            let Some(idx) = self.next_unchosen(c) else {
                return Err(SelectError::CoverageExhaustion {
                    chosen: selection.len(),
                    target,
                });
            };
            self.choose(idx, selection, Origin::Fill);
        }
        Ok(selection.len() - start)
    }

    fn next_unchosen(&mut self, c: usize) -> Option<usize> {
        while let Some(&idx) = self.orders[c].get(self.cursors[c]) {
            self.cursors[c] += 1;
            if !self.chosen[idx] {
                return Some(idx);
            }
        }
        None
    }

    fn choose(&mut self, idx: usize, selection: &mut Selection, origin: Origin) {
        let table = self.table;
        let row = &table.rows()[idx];
        self.chosen.set(idx, true);
        for (sum, value) in self.covered.iter_mut().zip(row.abs_freq.iter()) {
            *sum += value;
        }
        selection.push(&row.lemma, origin);
    }
}

/// Row indices by descending absolute count in `corpus`; ties keep table order.
fn descending_order(table: &FreqTable, corpus: Corpus) -> Vec<usize> {
    let rows = table.rows();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| rows[b].abs(corpus).total_cmp(&rows[a].abs(corpus)));
    order
}
