//! Build a core vocabulary from several word-frequency corpora.
//!
//! # How it works
//! 1. Rows are filtered (POS, reference list, blocklist, affixes) and
//!    duplicate lemmas merged.
//! 2. Loans, derivations and compositional compounds are trimmed out of the
//!    table, their frequency handed to the lemmas they are built from.
//! 3. Each corpus seeds the list with its most frequent lemmas.
//! 4. The list is extended to the target length, either by filling the
//!    emptiest log-frequency bucket or by topping up the least covered corpus.
//! 5. Every chosen row gets cross-corpus aggregates.
//!
//! # Example
//! ```
//! use corevocab::{BalanceMode, Filters, Pipeline, PipelineConfig, PipelineInput};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use vocab_types::LemmaRow;
//!
//! let rows = ["talo", "kissa", "koira"]
//!     .into_iter()
//!     .enumerate()
//!     .map(|(i, lemma)| {
//!         let mut row = LemmaRow::new(lemma);
//!         row.abs_freq = [10.0 * (i + 1) as f64; 6];
//!         row
//!     })
//!     .collect();
//! let config = PipelineConfig {
//!     target_len: 2,
//!     seed_quota: 1,
//!     balance: BalanceMode::Coverage,
//!     ..PipelineConfig::default()
//! };
//! let filters = Filters {
//!     pos: Vec::new(),
//!     ..Filters::default()
//! };
//! let vocab = Pipeline::new(config, filters)
//!     .run(
//!         PipelineInput { rows, ..PipelineInput::default() },
//!         &mut ChaCha8Rng::seed_from_u64(0),
//!     )
//!     .unwrap();
//! assert_eq!(vocab.rows.len(), 2);
//! assert_eq!(vocab.rows[0].row.lemma, "kissa");
//! ```

pub mod aggregate;
pub mod buckets;
pub mod config;
pub mod density;
pub mod pipeline;
pub mod selection;

pub use aggregate::{aggregates, trimmed_mean};
pub use buckets::{BucketBalancer, BucketGrid, BucketReport, FreqAxis, rel_to_bucket};
pub use config::{
    BalanceMode, DEFAULT_POS_FILTER, DEFAULT_SEED, DEFAULT_SEED_QUOTA, DEFAULT_TARGET_LEN,
    FilterReport, Filters, PipelineConfig, SeedCounting,
};
pub use density::{GaussianKde, ModeEstimator};
pub use pipeline::{Pipeline, PipelineInput, RunReport, Vocabulary};
pub use selection::{Origin, SeedReport, SelectError, Selection, Selector};
