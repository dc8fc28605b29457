use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};
use vocab_types::{RelationEdge, RelationKind};

use crate::FreqTable;

/// Order in which the edges of one relation pass are applied.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeOrder {
    /// Longest derived lemma first, input order among equal lengths.
    ///
    /// Approximates dependency order: in a chain `A <- B <- C` the longer `C`
    /// usually hands its mass to `B` before `B` is itself removed. Chains where
    /// a derived lemma is shorter than its own part lose that mass.
    #[default]
    ByLength,
    /// Every edge runs before the edges whose derived lemma is one of its parts,
    /// so mass climbs whole chains. Ties and cycle members fall back to
    /// [`EdgeOrder::ByLength`].
    Topological,
}

/// Outcome of one relation pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RedistributionReport {
    pub kind: Option<String>,
    pub edges: usize,
    /// Edges whose derived row was removed and its mass handed to its parts.
    pub applied: usize,
    /// Rows removed in total, including `dropped`.
    pub removed: usize,
    /// Derived lemmas not present in the table.
    pub missing_derived: usize,
    /// Part lookups that failed.
    pub missing_parts: usize,
    /// Edges left alone because none of their parts was found.
    pub skipped_no_parts: usize,
    /// Rows removed without redistribution (their mass leaves the table).
    pub dropped: usize,
}

/// Applies one kind of relation to a table: removes derived lemmas, splits
/// their mass over their parts.
#[derive(Clone, Copy, Debug)]
pub struct Redistributor {
    kind: RelationKind,
    order: EdgeOrder,
}

impl Redistributor {
    pub fn new(kind: RelationKind, order: EdgeOrder) -> Self {
        Self { kind, order }
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Apply `edges` to `table`, returning the trimmed table.
    pub fn apply(
        &self,
        table: FreqTable,
        edges: &[RelationEdge],
    ) -> (FreqTable, RedistributionReport) {
        self.apply_with_drops(table, edges, &[])
    }

    /// Like [`Redistributor::apply`], additionally removing every lemma in
    /// `drops` that no edge removed, without passing its mass anywhere.
    pub fn apply_with_drops(
        &self,
        table: FreqTable,
        edges: &[RelationEdge],
        drops: &[String],
    ) -> (FreqTable, RedistributionReport) {
        let kind = self.kind;
        let mut report = RedistributionReport {
            kind: Some(kind.to_string()),
            edges: edges.len(),
            ..RedistributionReport::default()
        };

        let (mut rows, index) = table.into_parts();
        let mut removed = vec![false; rows.len()];

        for edge_idx in edge_order(edges, self.order) {
            let edge = &edges[edge_idx];
            let Some(&derived_idx) = index.get(&edge.derived_lemma) else {
                warn!("{kind}: couldn't find derived lemma {}", edge.derived_lemma);
                report.missing_derived += 1;
                continue;
            };

            let mut live_parts: Vec<usize> = Vec::with_capacity(edge.part_lemmas.len());
            for part in &edge.part_lemmas {
                match index.get(part) {
                    Some(&part_idx) if part_idx != derived_idx => {
                        if !live_parts.contains(&part_idx) {
                            live_parts.push(part_idx);
                        }
                    }
                    Some(_) => debug!("{kind}: {} lists itself as a part", edge.derived_lemma),
                    None => {
                        warn!(
                            "{kind}: couldn't find part {part} of {}",
                            edge.derived_lemma
                        );
                        report.missing_parts += 1;
                    }
                }
            }
            if live_parts.is_empty() {
                debug!("{kind}: no parts left for {}, keeping it", edge.derived_lemma);
                report.skipped_no_parts += 1;
                continue;
            }

            let derived = rows[derived_idx].clone();
            let parts = live_parts.len();
            for part_idx in live_parts {
                rows[part_idx].add_share(&derived, parts);
            }
            if !removed[derived_idx] {
                removed[derived_idx] = true;
                report.removed += 1;
            }
            report.applied += 1;
        }

        for lemma in drops {
            if let Some(&idx) = index.get(lemma)
                && !removed[idx]
            {
                removed[idx] = true;
                report.removed += 1;
                report.dropped += 1;
            }
        }

        let kept = rows
            .into_iter()
            .zip(removed)
            .filter_map(|(row, gone)| (!gone).then_some(row))
            .collect();
        info!(
            "{kind}: removed {} lemmas ({} redistributed, {} dropped)",
            report.removed, report.applied, report.dropped
        );
        (FreqTable::from_sorted_unique(kept), report)
    }
}

fn length_order(edges: &[RelationEdge]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..edges.len()).collect();
    // Stable, so equal lengths keep input order.
    order.sort_by_key(|&idx| Reverse(edges[idx].derived_lemma.chars().count()));
    order
}

fn edge_order(edges: &[RelationEdge], order: EdgeOrder) -> Vec<usize> {
    match order {
        EdgeOrder::ByLength => length_order(edges),
        EdgeOrder::Topological => topological_order(edges),
    }
}

/// Kahn ordering where edge X precedes edge Y whenever Y's derived lemma is one
/// of X's parts. The ready set is drained in length order.
fn topological_order(edges: &[RelationEdge]) -> Vec<usize> {
    let by_length = length_order(edges);
    let mut rank = vec![0usize; edges.len()];
    for (pos, &idx) in by_length.iter().enumerate() {
        rank[idx] = pos;
    }

    let edge_of: HashMap<&str, usize> = edges
        .iter()
        .enumerate()
        .map(|(idx, edge)| (edge.derived_lemma.as_str(), idx))
        .collect();

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); edges.len()];
    let mut indegree = vec![0usize; edges.len()];
    for (idx, edge) in edges.iter().enumerate() {
        let mut seen = HashSet::new();
        for part in &edge.part_lemmas {
            if let Some(&next) = edge_of.get(part.as_str())
                && next != idx
                && seen.insert(next)
            {
                successors[idx].push(next);
                indegree[next] += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..edges.len())
        .filter(|&idx| indegree[idx] == 0)
        .map(|idx| Reverse(rank[idx]))
        .collect();
    let mut ordered = Vec::with_capacity(edges.len());
    let mut done = vec![false; edges.len()];
    while let Some(Reverse(r)) = ready.pop() {
        let idx = by_length[r];
        ordered.push(idx);
        done[idx] = true;
        for &next in &successors[idx] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push(Reverse(rank[next]));
            }
        }
    }

    if ordered.len() < edges.len() {
        warn!(
            "{} relation edges form cycles; applying them in length order",
            edges.len() - ordered.len()
        );
        ordered.extend(by_length.into_iter().filter(|&idx| !done[idx]));
    }
    ordered
}
