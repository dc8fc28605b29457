use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use vocab_tables::{LoadMode, load_freq_table};
use vocab_types::Corpus;

fn main() -> Result<()> {
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: cargo run -p vocab-tables --example stats -- <freqs.csv>")?;

    let rows = load_freq_table(&path, LoadMode::Mmap)
        .with_context(|| format!("loading frequency table from {}", path.display()))?;

    let distinct: HashSet<&str> = rows.iter().map(|r| r.lemma.as_str()).collect();
    let pos_tags: HashSet<&str> = rows.iter().filter_map(|r| r.pos.as_deref()).collect();

    println!("Table: {}", path.display());
    println!("Rows          : {}", rows.len());
    println!("Distinct lemmas: {}", distinct.len());
    println!("POS tags      : {}", pos_tags.len());
    for corpus in Corpus::ALL {
        let total: f64 = rows.iter().map(|r| r.abs(corpus)).sum();
        let attested = rows.iter().filter(|r| r.abs(corpus) > 0.0).count();
        println!(
            "{:<8} total {:>14.0}  attested lemmas {:>8}",
            corpus.name(),
            total,
            attested
        );
    }

    Ok(())
}
