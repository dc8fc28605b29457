use std::path::PathBuf;

use corevocab::{
    BalanceMode, Filters, ModeEstimator, Pipeline, PipelineConfig, PipelineInput, SelectError,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use vocab_tables::{
    LoadMode, load_compounds, load_freq_table, load_relations, write_vocab_file,
    write_vocab_table,
};
use vocab_types::{CORPUS_COUNT, Corpus, LemmaRow};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("run")
}

fn fixture_input() -> PipelineInput {
    let dir = fixture_dir();
    PipelineInput {
        rows: load_freq_table(dir.join("freqs.csv"), LoadMode::Owned).expect("load freqs"),
        loans: load_relations(dir.join("loans.csv"), LoadMode::Owned).expect("load loans"),
        derivations: load_relations(dir.join("derivations.csv"), LoadMode::Owned)
            .expect("load derivations"),
        compounds: load_compounds(dir.join("compounds.csv"), LoadMode::Owned)
            .expect("load compounds"),
    }
}

/// Mode is the sample maximum, so the grid spans everything below the most
/// frequent chosen lemma.
struct Highest;

impl ModeEstimator for Highest {
    fn mode(&self, sample: &[f64]) -> Option<f64> {
        sample.iter().copied().reduce(f64::max)
    }
}

/// `n` noun rows with scattered counts; relative frequencies stay within
/// Zipf 2 to 5 so every value lands in some bucket.
fn synthetic_rows(n: usize) -> Vec<LemmaRow> {
    (0..n)
        .map(|i| {
            let mut row = LemmaRow::new(format!("sana{i:05}"));
            row.pos = Some("N".to_string());
            for c in 0..CORPUS_COUNT {
                let count = ((i * (c + 7) * 7919 + c * 31) % 997 + 1) as f64;
                row.abs_freq[c] = count;
                row.rel_freq[c] = count / 10.0;
            }
            row
        })
        .collect()
}

fn synthetic_config(target_len: usize) -> PipelineConfig {
    PipelineConfig {
        target_len,
        seed_quota: 10,
        ..PipelineConfig::default()
    }
}

#[test]
fn end_to_end_from_files() {
    let config = PipelineConfig {
        target_len: 6,
        seed_quota: 1,
        balance: BalanceMode::Coverage,
        ..PipelineConfig::default()
    };
    let vocab = Pipeline::new(config, Filters::default())
        .run(fixture_input(), &mut ChaCha8Rng::seed_from_u64(0))
        .expect("run pipeline");

    let lemmas: Vec<&str> = vocab.rows.iter().map(|r| r.row.lemma.as_str()).collect();
    assert_eq!(
        lemmas,
        vec!["baari", "juosta", "kirja", "kissa", "pentu", "talo"]
    );
    let kissa = &vocab.rows[3];
    assert_eq!(kissa.row.abs(Corpus::Wiki), 8.0);
    assert_eq!(kissa.row.abs(Corpus::Opensub), 5.0);
    assert_eq!(vocab.rows[1].row.abs(Corpus::S24), 11.0);
    assert_eq!(vocab.rows[0].row.abs(Corpus::Reddit), 9.0);
    assert!(vocab.rows.iter().all(|r| r.is_core_seed && !r.is_pretrim_member));
    assert_eq!(vocab.report.seed.taken, [1; CORPUS_COUNT]);
    assert_eq!(vocab.report.mass_lost, 2.0);

    let report = serde_json::to_value(&vocab.report).expect("serialize report");
    assert_eq!(report["selected"], 6);
    assert_eq!(report["compounds"]["hyphenated_dropped"], 1);
    assert_eq!(report["config"]["balance"], "coverage");

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("core.csv");
    write_vocab_file(&out, &vocab.rows).expect("write vocab");
    let written = std::fs::read_to_string(&out).unwrap();
    let mut lines = written.lines();
    assert!(lines.next().unwrap().starts_with("lemma,abs_freq_s24,"));
    assert_eq!(lines.count(), 6);
}

#[test]
fn bucket_fill_reaches_exact_target() {
    let input = PipelineInput {
        rows: synthetic_rows(300),
        ..PipelineInput::default()
    };
    let vocab = Pipeline::new(synthetic_config(150), Filters::default())
        .with_estimator(Highest)
        .run(input, &mut ChaCha8Rng::seed_from_u64(5))
        .expect("run pipeline");

    assert_eq!(vocab.rows.len(), 150);
    assert_eq!(vocab.report.seed.taken, [10; CORPUS_COUNT]);
    assert_eq!(vocab.rows.iter().filter(|r| r.is_core_seed).count(), 60);
    let buckets = vocab.report.buckets.expect("bucket report");
    assert_eq!(buckets.picked, 90);
    assert!(
        vocab
            .rows
            .windows(2)
            .all(|w| w[0].row.lemma < w[1].row.lemma)
    );
}

#[test]
fn too_small_universe_exhausts_buckets() {
    let input = PipelineInput {
        rows: synthetic_rows(110),
        ..PipelineInput::default()
    };
    let err = Pipeline::new(synthetic_config(120), Filters::default())
        .with_estimator(Highest)
        .run(input, &mut ChaCha8Rng::seed_from_u64(5))
        .unwrap_err();
    match err {
        SelectError::BucketExhaustion { chosen, target } => {
            assert_eq!(target, 120);
            assert!(chosen <= 110);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn same_seed_same_bytes() {
    let run = |seed: u64, shuffle: bool| {
        let config = PipelineConfig {
            shuffle_output: shuffle,
            ..synthetic_config(120)
        };
        let input = PipelineInput {
            rows: synthetic_rows(400),
            ..PipelineInput::default()
        };
        Pipeline::new(config, Filters::default())
            .run(input, &mut ChaCha8Rng::seed_from_u64(seed))
            .map(|vocab| {
                let mut bytes = Vec::new();
                write_vocab_table(&mut bytes, &vocab.rows).expect("write vocab");
                bytes
            })
            .map_err(|err| err.to_string())
    };
    assert_eq!(run(9, false), run(9, false));
    assert_eq!(run(9, true), run(9, true));
}
