use std::env;
use std::path::PathBuf;

use corevocab::{Filters, Pipeline, PipelineConfig, PipelineInput};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use vocab_tables::{LoadMode, load_compounds, load_freq_table, load_relations};

fn data_dir() -> Option<PathBuf> {
    env::var("COREVOCAB_DATA_DIR").ok().map(PathBuf::from)
}

#[test]
fn builds_default_vocabulary() {
    let Some(dir) = data_dir() else {
        eprintln!("skipping: COREVOCAB_DATA_DIR not set");
        return;
    };
    let input = PipelineInput {
        rows: load_freq_table(dir.join("freqs.csv"), LoadMode::Mmap).expect("load freqs"),
        loans: load_relations(dir.join("loans.csv"), LoadMode::Mmap).expect("load loans"),
        derivations: load_relations(dir.join("derivations.csv"), LoadMode::Mmap)
            .expect("load derivations"),
        compounds: load_compounds(dir.join("compounds.csv"), LoadMode::Mmap)
            .expect("load compounds"),
    };
    let config = PipelineConfig::default();
    let target = config.target_len;
    let vocab = Pipeline::new(config, Filters::default())
        .run(input, &mut ChaCha8Rng::seed_from_u64(0))
        .expect("run pipeline");
    assert_eq!(vocab.rows.len(), target);
    assert!(vocab.rows.iter().filter(|r| r.is_core_seed).count() >= 2_000);
}
