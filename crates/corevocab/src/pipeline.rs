use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::info;
use vocab_trim::{
    CompoundPass, CompoundStats, FreqTable, RedistributionReport, Redistributor, merge_duplicates,
};
use vocab_types::{CORPUS_COUNT, CompoundEdge, LemmaRow, RelationEdge, RelationKind, VocabRow};

use crate::aggregate::aggregates;
use crate::buckets::{BucketBalancer, BucketReport};
use crate::config::{BalanceMode, FilterReport, Filters, PipelineConfig};
use crate::density::{GaussianKde, ModeEstimator};
use crate::selection::{Origin, SeedReport, SelectError, Selection, Selector};

/// Everything a run reads.
#[derive(Clone, Debug, Default)]
pub struct PipelineInput {
    /// Raw frequency rows, duplicates allowed.
    pub rows: Vec<LemmaRow>,
    pub loans: Vec<RelationEdge>,
    pub derivations: Vec<RelationEdge>,
    pub compounds: Vec<CompoundEdge>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub config: PipelineConfig,
    pub filter: FilterReport,
    pub merged_lemmas: usize,
    pub pretrim_seed: Option<SeedReport>,
    /// Pretrim seeds removed by trimming; they leave the list.
    pub pretrim_dropped: usize,
    /// Loans, derivations, then compounds.
    pub relations: Vec<RedistributionReport>,
    pub compounds: CompoundStats,
    pub trimmed_lemmas: usize,
    /// Mass lost by trimming (hyphenated drops, hand-offs to removed parts).
    pub mass_lost: f64,
    pub seed: SeedReport,
    pub seed_coverage: [f64; CORPUS_COUNT],
    pub buckets: Option<BucketReport>,
    pub final_coverage: [f64; CORPUS_COUNT],
    pub selected: usize,
}

/// The finished vocabulary plus what happened on the way.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    pub rows: Vec<VocabRow>,
    pub report: RunReport,
}

/// Merge, trim, seed, balance.
#[derive(Clone, Debug)]
pub struct Pipeline<E = GaussianKde> {
    config: PipelineConfig,
    filters: Filters,
    estimator: E,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, filters: Filters) -> Self {
        Self {
            config,
            filters,
            estimator: GaussianKde,
        }
    }
}

impl<E: ModeEstimator> Pipeline<E> {
    /// Swap the estimator used to size the bucket grid.
    pub fn with_estimator<F: ModeEstimator>(self, estimator: F) -> Pipeline<F> {
        Pipeline {
            config: self.config,
            filters: self.filters,
            estimator,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage. All randomness comes from `rng`, drawn in a fixed
    /// order: compound retention, bucket candidates, output shuffle.
    pub fn run<R: Rng + ?Sized>(
        &self,
        input: PipelineInput,
        rng: &mut R,
    ) -> Result<Vocabulary, SelectError> {
        let config = &self.config;
        let target = config.target_len;

        let PipelineInput {
            rows,
            loans,
            derivations,
            compounds: compound_edges,
        } = input;
        let (rows, filter) = self.filters.apply(rows);
        if rows.is_empty() {
            return Err(SelectError::EmptyUniverse);
        }
        let merged = merge_duplicates(rows);
        let mut selection = Selection::new();

        let pretrim_seed = (config.pretrim_quota > 0).then(|| {
            let mut selector = Selector::new(&merged, &selection);
            let report = selector.take_seeds(
                &mut selection,
                config.pretrim_quota,
                config.seed_counting,
                Origin::PretrimSeed,
                target,
            );
            selector.log_coverage("pretrim seed");
            report
        });

        let (trimmed, relations, compounds) = self.trim(
            &merged,
            [loans.as_slice(), derivations.as_slice()],
            &compound_edges,
            rng,
        );
        let mass_lost = merged.total_mass() - trimmed.total_mass();
        info!(
            "trimmed table holds {} of {} lemmas, {:.1} tokens dropped",
            trimmed.len(),
            merged.len(),
            mass_lost
        );
        // Removed rows handed their mass to their parts and stay removed.
        let pretrim_dropped = selection.retain(|lemma| trimmed.get(lemma).is_some());
        if pretrim_dropped > 0 {
            info!("{pretrim_dropped} pretrim seeds were trimmed away");
        }

        let mut selector = Selector::new(&trimmed, &selection);
        let seed = selector.take_seeds(
            &mut selection,
            config.seed_quota,
            config.seed_counting,
            Origin::Seed,
            target,
        );
        selector.log_coverage("seed");
        let seed_coverage = selector.coverage();

        let buckets = match config.balance {
            BalanceMode::Coverage => {
                selector.fill_by_coverage(&mut selection, target)?;
                None
            }
            BalanceMode::Buckets => Some(BucketBalancer::new(&self.estimator).fill(
                &trimmed,
                &mut selection,
                target,
                rng,
            )?),
        };

        let finished = Selector::new(&trimmed, &selection);
        finished.log_coverage("final");
        let final_coverage = finished.coverage();

        let mut rows = vocab_rows(&selection, &trimmed);
        if config.shuffle_output {
            rows.shuffle(rng);
        } else {
            rows.sort_by(|a, b| a.row.lemma.cmp(&b.row.lemma));
        }
        info!("selected {} lemmas", rows.len());

        let report = RunReport {
            config: config.clone(),
            filter,
            merged_lemmas: merged.len(),
            pretrim_seed,
            pretrim_dropped,
            relations,
            compounds,
            trimmed_lemmas: trimmed.len(),
            mass_lost,
            seed,
            seed_coverage,
            buckets,
            final_coverage,
            selected: rows.len(),
        };
        Ok(Vocabulary { rows, report })
    }

    /// Loans, then derivations, then compounds.
    fn trim<R: Rng + ?Sized>(
        &self,
        merged: &FreqTable,
        relation_edges: [&[RelationEdge]; 2],
        compound_edges: &[CompoundEdge],
        rng: &mut R,
    ) -> (FreqTable, Vec<RedistributionReport>, CompoundStats) {
        let order = self.config.edge_order;
        let mut relations = Vec::with_capacity(3);
        let mut table = merged.clone();
        for (kind, edges) in [RelationKind::Loan, RelationKind::Derivation]
            .into_iter()
            .zip(relation_edges)
        {
            let (next, report) = Redistributor::new(kind, order).apply(table, edges);
            table = next;
            relations.push(report);
        }

        let pass = CompoundPass {
            policy: self.config.compositionality,
            drop_hyphenated: self.config.drop_hyphenated,
            order,
        };
        let (table, report, stats) = pass.apply(table, compound_edges, rng);
        relations.push(report);
        (table, relations, stats)
    }
}

/// One output row per chosen lemma, with its values from the trimmed table.
fn vocab_rows(selection: &Selection, trimmed: &FreqTable) -> Vec<VocabRow> {
    selection
        .lemmas()
        .iter()
        .filter_map(|lemma| {
            let row = trimmed.get(lemma)?;
            Some(VocabRow {
                row: row.clone(),
                aggregates: aggregates(row),
                is_core_seed: selection.is_seed(lemma),
                is_pretrim_member: selection.is_pretrim_member(lemma),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedCounting;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use vocab_types::Corpus;

    fn row(lemma: &str, count: f64) -> LemmaRow {
        let mut row = LemmaRow::new(lemma);
        row.pos = Some("N".to_string());
        row.abs_freq = [count; CORPUS_COUNT];
        row.rel_freq = [count; CORPUS_COUNT];
        row
    }

    fn config(target_len: usize) -> PipelineConfig {
        PipelineConfig {
            target_len,
            seed_quota: 1,
            balance: BalanceMode::Coverage,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn trimmed_compound_gives_mass_to_its_parts() {
        let input = PipelineInput {
            rows: vec![
                row("kissanpentu", 100.0),
                row("kissa", 10.0),
                row("pentu", 1.0),
                row("talo", 20.0),
            ],
            compounds: vec![CompoundEdge {
                edge: RelationEdge::new("kissanpentu", ["kissa", "pentu"]),
                compositionality: 0.95,
            }],
            ..PipelineInput::default()
        };
        let pipeline = Pipeline::new(config(2), Filters::default());
        let vocab = pipeline
            .run(input, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap();

        let lemmas: Vec<&str> = vocab.rows.iter().map(|r| r.row.lemma.as_str()).collect();
        assert_eq!(lemmas, vec!["kissa", "pentu"]);
        assert_eq!(vocab.rows[0].row.abs(Corpus::Wiki), 60.0);
        assert!(vocab.rows.iter().all(|r| r.is_core_seed));
        assert_eq!(vocab.report.mass_lost, 0.0);
        assert_eq!(vocab.report.relations[2].applied, 1);
    }

    #[test]
    fn pretrim_seed_removed_by_trimming_leaves_the_list() {
        let input = PipelineInput {
            rows: vec![
                row("kissanpentu", 100.0),
                row("kissa", 10.0),
                row("talo", 1.0),
                row("koira", 0.5),
            ],
            compounds: vec![CompoundEdge {
                edge: RelationEdge::new("kissanpentu", ["kissa"]),
                compositionality: 0.99,
            }],
            ..PipelineInput::default()
        };
        let config = PipelineConfig {
            pretrim_quota: 1,
            seed_counting: SeedCounting::NewOnly,
            ..config(3)
        };
        let vocab = Pipeline::new(config, Filters::default())
            .run(input, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap();

        let lemmas: Vec<&str> = vocab.rows.iter().map(|r| r.row.lemma.as_str()).collect();
        assert_eq!(lemmas, vec!["kissa", "koira", "talo"]);
        assert_eq!(vocab.report.pretrim_seed.as_ref().unwrap().total, 3);
        assert_eq!(vocab.report.pretrim_dropped, 1);

        // kissanpentu's mass lives on in kissa only.
        assert_eq!(vocab.rows[0].row.abs(Corpus::Wiki), 110.0);
        let wiki: f64 = vocab.rows.iter().map(|r| r.row.abs(Corpus::Wiki)).sum();
        assert_eq!(wiki, 111.5);

        assert!(vocab.rows[0].is_pretrim_member && vocab.rows[2].is_pretrim_member);
        assert!(vocab.rows[1].is_core_seed && !vocab.rows[1].is_pretrim_member);
    }

    #[test]
    fn empty_after_filtering() {
        let input = PipelineInput {
            rows: vec![row("-inen", 1.0)],
            ..PipelineInput::default()
        };
        let err = Pipeline::new(config(1), Filters::default())
            .run(input, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert_eq!(err, SelectError::EmptyUniverse);
    }
}
