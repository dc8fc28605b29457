//! Log-frequency bucket balancing.
//!
//! Every frequency axis (one per corpus plus the per-lemma maximum) is cut into
//! buckets a tenth of a Zipf unit wide, starting at Zipf 2. The number of
//! buckets on an axis is the bucket of the densest value among the lemmas
//! chosen so far, so the grid covers the frequency range below where the seed
//! list is thickest. The balancer then repeatedly picks a lemma for the
//! emptiest bucket until the list is long enough.

use bitvec::prelude::*;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info};
use vocab_trim::FreqTable;
use vocab_types::{CORPUS_COUNT, Corpus, LemmaRow};

use crate::density::ModeEstimator;
use crate::selection::{Origin, SelectError, Selection};

pub const AXIS_COUNT: usize = CORPUS_COUNT + 1;
/// Zipf value of the lower edge of bucket 0.
pub const MIN_ZIPF: f64 = 2.0;
pub const BUCKETS_PER_ZIPF: f64 = 10.0;

/// One dimension of the bucket grid.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FreqAxis {
    Corpus(Corpus),
    /// Largest relative frequency over all corpora.
    Max,
}

impl FreqAxis {
    pub const ALL: [FreqAxis; AXIS_COUNT] = [
        FreqAxis::Corpus(Corpus::S24),
        FreqAxis::Corpus(Corpus::Klk),
        FreqAxis::Corpus(Corpus::Lehdet),
        FreqAxis::Corpus(Corpus::Wiki),
        FreqAxis::Corpus(Corpus::Reddit),
        FreqAxis::Corpus(Corpus::Opensub),
        FreqAxis::Max,
    ];

    pub fn value(self, row: &LemmaRow) -> f64 {
        match self {
            FreqAxis::Corpus(corpus) => row.rel(corpus),
            FreqAxis::Max => row.max_rel(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FreqAxis::Corpus(corpus) => corpus.name(),
            FreqAxis::Max => "max",
        }
    }
}

/// Zipf value of a relative frequency given per million tokens.
fn zipf(rel: f64) -> f64 {
    (rel * 1000.0).log10()
}

fn floor_at(position: f64) -> f64 {
    10f64.powf(MIN_ZIPF + position / BUCKETS_PER_ZIPF) / 1000.0
}

/// Relative frequency at the lower edge of `bucket`.
pub fn bucket_floor(bucket: usize) -> f64 {
    floor_at(bucket as f64)
}

/// Bucket whose `[bucket_floor(b), bucket_floor(b + 1))` range holds `rel`, or
/// `None` when `rel` is zero or the bucket falls outside `[0, max_bucket)`.
///
/// The log10 estimate can land one off right at an edge, so it is checked
/// against the edges themselves.
pub fn rel_to_bucket(rel: f64, max_bucket: usize) -> Option<usize> {
    if rel <= 0.0 || !rel.is_finite() {
        return None;
    }
    let mut position = ((zipf(rel) - MIN_ZIPF) * BUCKETS_PER_ZIPF).floor();
    if rel < floor_at(position) {
        position -= 1.0;
    } else if rel >= floor_at(position + 1.0) {
        position += 1.0;
    }
    if position < 0.0 || position >= max_bucket as f64 {
        return None;
    }
    Some(position as usize)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cell {
    Open(u32),
    /// Above the axis's bucket count, or no candidate is left for it.
    Impossible,
}

/// Per-axis bucket counts of the chosen lemmas.
#[derive(Clone, Debug, PartialEq)]
pub struct BucketGrid {
    max_buckets: [usize; AXIS_COUNT],
    cells: [Vec<Cell>; AXIS_COUNT],
}

impl BucketGrid {
    /// Every axis gets as many columns as the widest one; columns at or past an
    /// axis's own bucket count start out impossible.
    pub fn new(max_buckets: [usize; AXIS_COUNT]) -> Self {
        let width = max_buckets.iter().copied().max().unwrap_or(0);
        let cells = array_init::array_init(|axis| {
            (0..width)
                .map(|bucket| {
                    if bucket < max_buckets[axis] {
                        Cell::Open(0)
                    } else {
                        Cell::Impossible
                    }
                })
                .collect()
        });
        Self { max_buckets, cells }
    }

    pub fn max_buckets(&self) -> [usize; AXIS_COUNT] {
        self.max_buckets
    }

    pub fn cell(&self, axis: usize, bucket: usize) -> Option<Cell> {
        self.cells.get(axis)?.get(bucket).copied()
    }

    /// Count `row` on every axis where it lands in an open bucket.
    pub fn record(&mut self, row: &LemmaRow) {
        for (axis, cells) in FreqAxis::ALL.iter().zip(self.cells.iter_mut()) {
            if let Some(bucket) = rel_to_bucket(axis.value(row), cells.len())
                && let Cell::Open(count) = &mut cells[bucket]
            {
                *count += 1;
            }
        }
    }

    /// The open cell with the lowest count, scanning axis by axis.
    pub fn least_filled(&self) -> Option<(usize, usize)> {
        let mut best: Option<((usize, usize), u32)> = None;
        for (axis, cells) in self.cells.iter().enumerate() {
            for (bucket, cell) in cells.iter().enumerate() {
                if let Cell::Open(count) = *cell
                    && best.is_none_or(|(_, lowest)| count < lowest)
                {
                    best = Some(((axis, bucket), count));
                }
            }
        }
        best.map(|(cell, _)| cell)
    }

    pub fn mark_impossible(&mut self, axis: usize, bucket: usize) {
        if let Some(cell) = self.cells.get_mut(axis).and_then(|c| c.get_mut(bucket)) {
            *cell = Cell::Impossible;
        }
    }

    /// Counts per axis, `None` for impossible cells.
    pub fn counts(&self) -> Vec<Vec<Option<u32>>> {
        self.cells
            .iter()
            .map(|cells| {
                cells
                    .iter()
                    .map(|cell| match cell {
                        Cell::Open(count) => Some(*count),
                        Cell::Impossible => None,
                    })
                    .collect()
            })
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImpossibleBucket {
    pub axis: &'static str,
    pub bucket: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BucketReport {
    pub max_buckets: [usize; AXIS_COUNT],
    pub picked: usize,
    /// Cells given up on because no candidate was left, in discovery order.
    pub impossible: Vec<ImpossibleBucket>,
    pub counts: Vec<Vec<Option<u32>>>,
}

/// Extends `selection` to `target` lemmas drawn from `table`.
pub struct BucketBalancer<'e, E: ModeEstimator + ?Sized> {
    estimator: &'e E,
}

impl<'e, E: ModeEstimator + ?Sized> BucketBalancer<'e, E> {
    pub fn new(estimator: &'e E) -> Self {
        Self { estimator }
    }

    /// Bucket count per axis from the mode of the chosen lemmas' values.
    pub fn max_buckets(&self, table: &FreqTable, chosen: &BitSlice) -> [usize; AXIS_COUNT] {
        array_init::array_init(|axis| {
            let sample: Vec<f64> = chosen
                .iter_ones()
                .map(|idx| FreqAxis::ALL[axis].value(&table.rows()[idx]))
                .collect();
            self.estimator
                .mode(&sample)
                .and_then(|mode| rel_to_bucket(mode, usize::MAX))
                .unwrap_or(0)
        })
    }

    /// Fill the emptiest bucket until `selection` holds `target` lemmas.
    ///
    /// Unchosen rows are shuffled once; each bucket takes its candidates in
    /// that order. A bucket with no candidate left becomes impossible. Fails
    /// with [`SelectError::BucketExhaustion`] once every bucket is impossible.
    pub fn fill<R: Rng + ?Sized>(
        &self,
        table: &FreqTable,
        selection: &mut Selection,
        target: usize,
        rng: &mut R,
    ) -> Result<BucketReport, SelectError> {
        let mut chosen = selection.mask(table);
        let mut grid = BucketGrid::new(self.max_buckets(table, &chosen));
        for idx in chosen.iter_ones() {
            grid.record(&table.rows()[idx]);
        }
        info!(
            "bucket counts per axis: {:?}",
            FreqAxis::ALL
                .iter()
                .map(|axis| axis.name())
                .zip(grid.max_buckets())
                .collect::<Vec<_>>()
        );

        let mut report = BucketReport {
            max_buckets: grid.max_buckets(),
            ..BucketReport::default()
        };
        if selection.len() >= target {
            report.counts = grid.counts();
            return Ok(report);
        }

        let mut pool: Vec<usize> = chosen.iter_zeros().collect();
        pool.shuffle(rng);
        let queues = candidate_queues(table, &pool, grid.max_buckets());
        let mut cursors: [Vec<usize>; AXIS_COUNT] =
            array_init::array_init(|axis| vec![0; queues[axis].len()]);

        while selection.len() < target {
            let Some((axis, bucket)) = grid.least_filled() else {
                return Err(SelectError::BucketExhaustion {
                    chosen: selection.len(),
                    target,
                });
            };
            let queue = &queues[axis][bucket];
            let cursor = &mut cursors[axis][bucket];
            while *cursor < queue.len() && chosen[queue[*cursor]] {
                *cursor += 1;
            }
            let Some(&idx) = queue.get(*cursor) else {
                debug!(
                    axis = FreqAxis::ALL[axis].name(),
                    bucket, "no candidate left for bucket"
                );
                grid.mark_impossible(axis, bucket);
                report.impossible.push(ImpossibleBucket {
                    axis: FreqAxis::ALL[axis].name(),
                    bucket,
                });
                continue;
            };
            *cursor += 1;
            let row = &table.rows()[idx];
            chosen.set(idx, true);
            grid.record(row);
            selection.push(&row.lemma, Origin::Fill);
            report.picked += 1;
        }

        info!(
            "bucket fill picked {} lemmas, {} buckets ran dry",
            report.picked,
            report.impossible.len()
        );
        report.counts = grid.counts();
        Ok(report)
    }
}

/// For every open cell, the pool rows (in pool order) whose value on that axis
/// falls inside the cell's range.
fn candidate_queues(
    table: &FreqTable,
    pool: &[usize],
    max_buckets: [usize; AXIS_COUNT],
) -> [Vec<Vec<usize>>; AXIS_COUNT] {
    array_init::array_init(|axis| {
        let axis_buckets = max_buckets[axis];
        let mut queues = vec![Vec::new(); axis_buckets];
        for &idx in pool {
            let value = FreqAxis::ALL[axis].value(&table.rows()[idx]);
            if let Some(bucket) = rel_to_bucket(value, axis_buckets) {
                queues[bucket].push(idx);
            }
        }
        queues
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use vocab_trim::merge_duplicates;

    /// Mode is the sample maximum, so every bucket up to the top chosen value
    /// stays open.
    struct Highest;

    impl ModeEstimator for Highest {
        fn mode(&self, sample: &[f64]) -> Option<f64> {
            sample.iter().copied().reduce(f64::max)
        }
    }

    fn row(lemma: &str, rel: f64) -> LemmaRow {
        let mut row = LemmaRow::new(lemma);
        row.rel_freq = [rel; CORPUS_COUNT];
        row
    }

    #[test]
    fn buckets_are_tenths_of_zipf_units() {
        assert_eq!(rel_to_bucket(0.0, usize::MAX), None);
        assert_eq!(rel_to_bucket(0.05, usize::MAX), None);
        assert_eq!(rel_to_bucket(0.11, usize::MAX), Some(0));
        // log10(1500) = 3.176
        assert_eq!(rel_to_bucket(1.5, usize::MAX), Some(11));
        assert_eq!(rel_to_bucket(1.5, 11), None);
        assert_eq!(rel_to_bucket(1.5, 12), Some(11));
    }

    #[test]
    fn every_bucket_floor_opens_its_own_bucket() {
        for bucket in 0..60 {
            let floor = bucket_floor(bucket);
            assert_eq!(rel_to_bucket(floor, 60), Some(bucket), "floor of {bucket}");
            let below = floor * (1.0 - 1e-12);
            assert_eq!(rel_to_bucket(below, 60), bucket.checked_sub(1), "below {bucket}");
        }
    }

    #[test]
    fn recorded_row_lands_in_the_cell_it_was_queued_for() {
        let max_buckets = [40; AXIS_COUNT];
        for bucket in 0..40 {
            let table = merge_duplicates(vec![row("sana", bucket_floor(bucket))]);
            let queues = candidate_queues(&table, &[0], max_buckets);
            let mut grid = BucketGrid::new(max_buckets);
            grid.record(&table.rows()[0]);
            for axis in 0..AXIS_COUNT {
                assert_eq!(queues[axis][bucket], vec![0], "axis {axis} bucket {bucket}");
                assert_eq!(grid.cell(axis, bucket), Some(Cell::Open(1)));
            }
        }
    }

    #[test]
    fn grid_starts_with_impossible_cells_past_axis_max() {
        let grid = BucketGrid::new([2, 0, 0, 0, 0, 0, 3]);
        assert_eq!(grid.cell(0, 1), Some(Cell::Open(0)));
        assert_eq!(grid.cell(0, 2), Some(Cell::Impossible));
        assert_eq!(grid.cell(1, 0), Some(Cell::Impossible));
        assert_eq!(grid.cell(6, 2), Some(Cell::Open(0)));
        assert_eq!(grid.cell(6, 3), None);
    }

    #[test]
    fn least_filled_scans_axis_by_axis() {
        let mut grid = BucketGrid::new([2, 2, 0, 0, 0, 0, 0]);
        assert_eq!(grid.least_filled(), Some((0, 0)));

        // 0.11 lands in bucket 0 on every axis.
        grid.record(&row("aamu", 0.11));
        assert_eq!(grid.cell(0, 0), Some(Cell::Open(1)));
        assert_eq!(grid.cell(1, 0), Some(Cell::Open(1)));
        assert_eq!(grid.least_filled(), Some((0, 1)));

        grid.mark_impossible(0, 1);
        assert_eq!(grid.least_filled(), Some((1, 1)));
        grid.mark_impossible(1, 1);
        assert_eq!(grid.least_filled(), Some((0, 0)));
        grid.mark_impossible(0, 0);
        grid.mark_impossible(1, 0);
        assert_eq!(grid.least_filled(), None);
    }

    fn universe(n: usize) -> FreqTable {
        // Spread from Zipf 2 upwards so every row lands in some bucket.
        merge_duplicates(
            (0..n)
                .map(|i| row(&format!("sana{i:03}"), 0.1 * 10f64.powf(i as f64 / 25.0)))
                .collect(),
        )
    }

    fn seeded(table: &FreqTable, top: usize) -> Selection {
        let mut selection = Selection::new();
        for row in table.rows().iter().rev().take(top) {
            selection.push(&row.lemma, Origin::Seed);
        }
        selection
    }

    #[test]
    fn fills_to_exact_target() {
        let table = universe(60);
        let mut selection = seeded(&table, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let report = BucketBalancer::new(&Highest)
            .fill(&table, &mut selection, 30, &mut rng)
            .unwrap();
        assert_eq!(selection.len(), 30);
        assert_eq!(report.picked, 20);
        assert!(report.max_buckets.iter().all(|&b| b > 0));
    }

    #[test]
    fn fill_never_lowers_a_bucket_count() {
        let table = universe(80);
        let mut selection = seeded(&table, 15);
        let balancer = BucketBalancer::new(&Highest);
        let chosen = selection.mask(&table);
        let mut grid = BucketGrid::new(balancer.max_buckets(&table, &chosen));
        for idx in chosen.iter_ones() {
            grid.record(&table.rows()[idx]);
        }
        let before = grid.counts();

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let report = balancer.fill(&table, &mut selection, 45, &mut rng).unwrap();
        assert_eq!(report.picked, 30);
        for (axis, (old, new)) in before.iter().zip(&report.counts).enumerate() {
            for (bucket, (old, new)) in old.iter().zip(new).enumerate() {
                if let (Some(old), Some(new)) = (old, new) {
                    assert!(new >= old, "axis {axis} bucket {bucket}: {old} -> {new}");
                }
            }
        }
        let total = |counts: &[Vec<Option<u32>>]| -> u32 {
            counts.iter().flatten().flatten().sum()
        };
        assert!(total(&report.counts) > total(&before));
    }

    #[test]
    fn exhausts_when_universe_is_too_small() {
        let table = universe(20);
        let mut selection = seeded(&table, 5);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let err = BucketBalancer::new(&Highest)
            .fill(&table, &mut selection, 25, &mut rng)
            .unwrap_err();
        assert_eq!(
            err,
            SelectError::BucketExhaustion {
                chosen: 20,
                target: 25
            }
        );
    }

    #[test]
    fn same_seed_same_picks() {
        let table = universe(80);
        let run = |seed| {
            let mut selection = seeded(&table, 10);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            BucketBalancer::new(&Highest)
                .fill(&table, &mut selection, 40, &mut rng)
                .unwrap();
            selection.lemmas().to_vec()
        };
        assert_eq!(run(3), run(3));
    }

    #[test]
    fn nothing_to_do_when_already_long_enough() {
        let table = universe(30);
        let mut selection = seeded(&table, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let report = BucketBalancer::new(&Highest)
            .fill(&table, &mut selection, 5, &mut rng)
            .unwrap();
        assert_eq!(report.picked, 0);
        assert_eq!(selection.len(), 10);
    }
}
