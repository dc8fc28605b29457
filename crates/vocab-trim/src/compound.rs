use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::info;
use vocab_types::{CompoundEdge, RelationEdge, RelationKind};

use crate::{EdgeOrder, FreqTable, RedistributionReport, Redistributor};

/// Decides which compounds are predictable enough to be folded into their parts.
///
/// Compounds at or above `remove_from` are always removed, compounds below
/// `keep_below` are always kept. In between, a compound is kept with a
/// probability falling linearly from 1 at `keep_below` to 0 at `remove_from`,
/// and no more mid-range compounds are kept than there are compounds below
/// `keep_below`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CompositionalityPolicy {
    pub keep_below: f64,
    pub remove_from: f64,
}

impl Default for CompositionalityPolicy {
    fn default() -> Self {
        Self {
            keep_below: 0.7,
            remove_from: 0.9,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CompoundStats {
    pub total: usize,
    pub non_compositional: usize,
    pub fully_compositional: usize,
    pub mid_range: usize,
    pub mid_range_kept: usize,
    pub hyphenated_redistributed: usize,
    pub hyphenated_dropped: usize,
}

/// Compounds chosen for removal, in input order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompoundSelection {
    pub removals: Vec<RelationEdge>,
    pub stats: CompoundStats,
}

impl CompositionalityPolicy {
    /// Probability of keeping a compound with the given score.
    pub fn keep_probability(&self, compositionality: f64) -> f64 {
        if compositionality < self.keep_below {
            1.0
        } else if compositionality >= self.remove_from {
            0.0
        } else {
            1.0 - (compositionality - self.keep_below) / (self.remove_from - self.keep_below)
        }
    }

    /// Pick the compounds to remove. Mid-range compounds are visited in a
    /// shuffled order and each draws once from `rng`.
    pub fn select<R: Rng + ?Sized>(
        &self,
        compounds: &[CompoundEdge],
        rng: &mut R,
    ) -> CompoundSelection {
        let mut stats = CompoundStats {
            total: compounds.len(),
            ..CompoundStats::default()
        };
        let mut remove = vec![false; compounds.len()];
        let mut mid_range = Vec::new();
        for (idx, compound) in compounds.iter().enumerate() {
            let score = compound.compositionality;
            if score >= self.remove_from {
                remove[idx] = true;
                stats.fully_compositional += 1;
            } else if score >= self.keep_below {
                remove[idx] = true;
                mid_range.push(idx);
            } else {
                stats.non_compositional += 1;
            }
        }
        stats.mid_range = mid_range.len();

        mid_range.shuffle(rng);
        for idx in mid_range {
            let keep_prob = self.keep_probability(compounds[idx].compositionality);
            if rng.r#gen::<f64>() < keep_prob {
                remove[idx] = false;
                stats.mid_range_kept += 1;
                if stats.mid_range_kept >= stats.non_compositional {
                    break;
                }
            }
        }

        let removals = compounds
            .iter()
            .zip(remove)
            .filter(|(_, gone)| *gone)
            .map(|(compound, _)| compound.edge.clone())
            .collect();
        CompoundSelection { removals, stats }
    }
}

/// The compound relation pass: compositionality selection, hyphenated
/// compounds, then redistribution.
#[derive(Clone, Copy, Debug)]
pub struct CompoundPass {
    pub policy: CompositionalityPolicy,
    /// Remove every lemma spelled with a hyphen, redistributing when a compound
    /// record exists and dropping its mass otherwise.
    pub drop_hyphenated: bool,
    pub order: EdgeOrder,
}

impl CompoundPass {
    pub fn apply<R: Rng + ?Sized>(
        &self,
        table: FreqTable,
        compounds: &[CompoundEdge],
        rng: &mut R,
    ) -> (FreqTable, RedistributionReport, CompoundStats) {
        let CompoundSelection {
            mut removals,
            mut stats,
        } = self.policy.select(compounds, rng);
        info!(
            "compounds: {} removable ({} fully compositional, {}/{} mid-range kept, {} kept below {})",
            removals.len(),
            stats.fully_compositional,
            stats.mid_range_kept,
            stats.mid_range,
            stats.non_compositional,
            self.policy.keep_below
        );

        let mut drops = Vec::new();
        if self.drop_hyphenated {
            let chosen: HashSet<String> =
                removals.iter().map(|e| e.derived_lemma.clone()).collect();
            let by_lemma: HashMap<&str, &RelationEdge> = compounds
                .iter()
                .map(|c| (c.edge.derived_lemma.as_str(), &c.edge))
                .collect();
            for row in table.rows() {
                if !row.lemma.contains('-') || chosen.contains(&row.lemma) {
                    continue;
                }
                match by_lemma.get(row.lemma.as_str()) {
                    Some(edge) => {
                        removals.push((*edge).clone());
                        stats.hyphenated_redistributed += 1;
                    }
                    None => {
                        drops.push(row.lemma.clone());
                        stats.hyphenated_dropped += 1;
                    }
                }
            }
        }

        let (table, report) = Redistributor::new(RelationKind::Compound, self.order)
            .apply_with_drops(table, &removals, &drops);
        (table, report, stats)
    }
}
