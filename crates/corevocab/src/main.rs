use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;
use vocab_tables::LoadMode;
use vocab_trim::{CompositionalityPolicy, EdgeOrder};

use corevocab::{
    BalanceMode, DEFAULT_POS_FILTER, DEFAULT_SEED, DEFAULT_SEED_QUOTA, DEFAULT_TARGET_LEN,
    Filters, Pipeline, PipelineConfig, PipelineInput, SeedCounting,
};

/// Build a balanced core vocabulary from a multi-corpus frequency table.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Frequency table with lemma, pos and per-corpus frequency columns.
    freqs: PathBuf,
    /// Where to write the vocabulary table.
    output: PathBuf,
    /// Loanword relations (derived_lemma, part_lemmas).
    #[arg(long)]
    loans: Option<PathBuf>,
    /// Derivation relations (derived_lemma, part_lemmas).
    #[arg(long)]
    derivations: Option<PathBuf>,
    /// Compound relations with a compositionality column.
    #[arg(long)]
    compounds: Option<PathBuf>,
    /// Lemmas to exclude, one per line.
    #[arg(long)]
    blocklist: Option<PathBuf>,
    /// Known citation forms, one per line; other lemmas are dropped.
    #[arg(long)]
    reference: Option<PathBuf>,
    /// Allowed POS tags (repeatable).
    #[arg(long = "pos", default_values_t = DEFAULT_POS_FILTER.map(String::from))]
    pos: Vec<String>,
    /// Keep every POS tag.
    #[arg(long, conflicts_with = "pos")]
    any_pos: bool,
    /// Keep affixes such as `-inen`.
    #[arg(long)]
    keep_affixes: bool,
    #[arg(long, env = "COREVOCAB_TARGET", default_value_t = DEFAULT_TARGET_LEN)]
    target: usize,
    /// Lemmas each corpus contributes to the seed.
    #[arg(long, env = "COREVOCAB_SEED_QUOTA", default_value_t = DEFAULT_SEED_QUOTA)]
    seed_quota: usize,
    /// Seed quota over the table before trimming; 0 skips that pass.
    #[arg(long, default_value_t = 0)]
    pretrim_quota: usize,
    #[arg(long, value_enum, default_value_t = SeedCounting::NewOnly)]
    seed_counting: SeedCounting,
    #[arg(long, value_enum, default_value_t = BalanceMode::Buckets)]
    balance: BalanceMode,
    #[arg(long, value_enum, default_value_t = EdgeOrderArg::Length)]
    edge_order: EdgeOrderArg,
    /// Compounds below this compositionality are always kept.
    #[arg(long, default_value_t = 0.7)]
    keep_below: f64,
    /// Compounds at or above this compositionality are always removed.
    #[arg(long, default_value_t = 0.9)]
    remove_from: f64,
    /// Keep hyphenated lemmas that have no compound record.
    #[arg(long)]
    keep_hyphenated: bool,
    /// Shuffle output rows instead of sorting them by lemma.
    #[arg(long)]
    shuffle: bool,
    #[arg(long, env = "COREVOCAB_SEED", default_value_t = DEFAULT_SEED)]
    seed: u64,
    /// Write a JSON run report here.
    #[arg(long)]
    report: Option<PathBuf>,
    #[arg(long, env = "COREVOCAB_LOAD_MODE", value_enum, default_value_t = LoadModeArg::Mmap)]
    load_mode: LoadModeArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EdgeOrderArg {
    Length,
    Topological,
}

impl From<EdgeOrderArg> for EdgeOrder {
    fn from(arg: EdgeOrderArg) -> Self {
        match arg {
            EdgeOrderArg::Length => EdgeOrder::ByLength,
            EdgeOrderArg::Topological => EdgeOrder::Topological,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LoadModeArg {
    Mmap,
    Owned,
}

impl From<LoadModeArg> for LoadMode {
    fn from(arg: LoadModeArg) -> Self {
        match arg {
            LoadModeArg::Mmap => LoadMode::Mmap,
            LoadModeArg::Owned => LoadMode::Owned,
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mode = LoadMode::from(cli.load_mode);

    if cli.keep_below > cli.remove_from {
        anyhow::bail!(
            "--keep-below ({}) must not exceed --remove-from ({})",
            cli.keep_below,
            cli.remove_from
        );
    }

    let start = Instant::now();
    let input = PipelineInput {
        rows: vocab_tables::load_freq_table(&cli.freqs, mode)
            .with_context(|| format!("loading {}", cli.freqs.display()))?,
        loans: load_optional(cli.loans.as_deref(), |p| vocab_tables::load_relations(p, mode))?,
        derivations: load_optional(cli.derivations.as_deref(), |p| {
            vocab_tables::load_relations(p, mode)
        })?,
        compounds: load_optional(cli.compounds.as_deref(), |p| {
            vocab_tables::load_compounds(p, mode)
        })?,
    };
    info!("inputs loaded in {} ms", start.elapsed().as_millis());

    let filters = Filters {
        pos: if cli.any_pos { Vec::new() } else { cli.pos.clone() },
        blocklist: match &cli.blocklist {
            Some(path) => load_words(path)?,
            None => HashSet::new(),
        },
        reference: cli.reference.as_deref().map(load_words).transpose()?,
        drop_affixes: !cli.keep_affixes,
    };
    let config = PipelineConfig {
        target_len: cli.target,
        seed_quota: cli.seed_quota,
        pretrim_quota: cli.pretrim_quota,
        seed_counting: cli.seed_counting,
        balance: cli.balance,
        edge_order: cli.edge_order.into(),
        compositionality: CompositionalityPolicy {
            keep_below: cli.keep_below,
            remove_from: cli.remove_from,
        },
        drop_hyphenated: !cli.keep_hyphenated,
        shuffle_output: cli.shuffle,
    };
    info!("target {} lemmas, seed {}", config.target_len, cli.seed);

    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    let vocab = Pipeline::new(config, filters)
        .run(input, &mut rng)
        .context("building the vocabulary")?;

    vocab_tables::write_vocab_file(&cli.output, &vocab.rows)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    info!(
        "wrote {} rows to {} in {} ms",
        vocab.rows.len(),
        cli.output.display(),
        start.elapsed().as_millis()
    );

    if let Some(path) = &cli.report {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &vocab.report)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn load_optional<T>(
    path: Option<&Path>,
    load: impl FnOnce(&Path) -> Result<Vec<T>, vocab_tables::TableError>,
) -> anyhow::Result<Vec<T>> {
    match path {
        Some(path) => load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(Vec::new()),
    }
}

fn load_words(path: &Path) -> anyhow::Result<HashSet<String>> {
    vocab_tables::load_word_list(path).with_context(|| format!("loading {}", path.display()))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .init();
}
