//! Load and write the tables that feed the core-vocabulary pipeline.
//!
//! Every input is loaded wholesale: the frequency table, the three relation
//! tables (loans, derivations, compounds) and the plain-text word lists
//! (blocklist, reference citation forms). CSV inputs can be memory-mapped or
//! read into an owned buffer, chosen at runtime via [`LoadMode`].
//!
//! Shape problems (missing columns, empty tables, unparsable or negative
//! frequencies) are fatal and surface as [`TableError`]. Duplicate relation
//! records are not: the first record per derived lemma wins and the rest are
//! logged.
//!
//! # Example
//! ```no_run
//! use vocab_tables::{LoadMode, load_freq_table, load_relations};
//!
//! # fn main() -> Result<(), vocab_tables::TableError> {
//! let rows = load_freq_table("freqs.csv", LoadMode::Mmap)?;
//! let loans = load_relations("loans.csv", LoadMode::Mmap)?;
//! println!("{} rows, {} loan edges", rows.len(), loans.len());
//! # Ok(()) }
//! ```
//!
//! For a runnable demo, see `cargo run -p vocab-tables --example stats -- <freqs.csv>`.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use vocab_types::{CORPUS_COUNT, CompoundEdge, Corpus, LemmaRow, RelationEdge, VocabRow};

/// Separator between lemmas in the `part_lemmas` column.
pub const PART_SEPARATOR: char = '|';

/// Strategy for loading table files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map each file (fast, zero-copy).
    Mmap,
    /// Read each file into an owned buffer (portable fallback).
    Owned,
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed table {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{} is missing required column `{column}`", path.display())]
    MissingColumn { path: PathBuf, column: String },
    #[error("{} contains no data rows", path.display())]
    EmptyTable { path: PathBuf },
    #[error("{}:{line} invalid value {value:?} in column `{column}`", path.display())]
    BadValue {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },
}

enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

fn load_file(path: &Path, mode: LoadMode) -> Result<Buffer, TableError> {
    let io_err = |source| TableError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_err)?;
    let len = file.metadata().map_err(io_err)?.len();
    match mode {
        // Empty files cannot be mapped on every platform; they are empty tables anyway.
        LoadMode::Mmap if len > 0 => {
            unsafe { Mmap::map(&file) }.map(Buffer::Mmap).map_err(io_err)
        }
        _ => {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf).map_err(io_err)?;
            Ok(Buffer::Owned(buf))
        }
    }
}

/// Column positions of the frequency table, resolved from its header.
struct FreqColumns {
    lemma: usize,
    pos: usize,
    abs: [usize; CORPUS_COUNT],
    rel: [usize; CORPUS_COUNT],
}

impl FreqColumns {
    fn resolve(path: &Path, headers: &csv::StringRecord) -> Result<Self, TableError> {
        let by_name: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().to_ascii_lowercase(), idx))
            .collect();
        let find = |column: &str| {
            by_name
                .get(column)
                .copied()
                .ok_or_else(|| TableError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                })
        };

        let mut abs = [0usize; CORPUS_COUNT];
        let mut rel = [0usize; CORPUS_COUNT];
        for corpus in Corpus::ALL {
            abs[corpus.index()] = find(&corpus.abs_column())?;
            rel[corpus.index()] = find(&corpus.rel_column())?;
        }
        Ok(Self {
            lemma: find("lemma")?,
            pos: find("pos")?,
            abs,
            rel,
        })
    }
}

/// Load a frequency table with `lemma`, `pos` and the per-corpus
/// `abs_freq_*`/`relative_freq_*` columns. Rows come back in file order,
/// duplicates included.
pub fn load_freq_table(
    path: impl AsRef<Path>,
    mode: LoadMode,
) -> Result<Vec<LemmaRow>, TableError> {
    let path = path.as_ref();
    let buffer = load_file(path, mode)?;
    let rows = parse_freq_table(path, buffer.as_slice())?;
    info!("loaded {} frequency rows from {}", rows.len(), path.display());
    Ok(rows)
}

fn parse_freq_table(path: &Path, bytes: &[u8]) -> Result<Vec<LemmaRow>, TableError> {
    let csv_err = |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers().map_err(csv_err)?.clone();
    let columns = FreqColumns::resolve(path, &headers)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let lemma = field(columns.lemma).trim();
        if lemma.is_empty() {
            return Err(bad_value(path, line, "lemma", lemma));
        }
        let mut row = LemmaRow::new(lemma);
        let pos = field(columns.pos).trim();
        if !pos.is_empty() {
            row.pos = Some(pos.to_string());
        }
        for corpus in Corpus::ALL {
            let idx = corpus.index();
            row.abs_freq[idx] =
                parse_freq(path, line, &headers, columns.abs[idx], field(columns.abs[idx]))?;
            row.rel_freq[idx] =
                parse_freq(path, line, &headers, columns.rel[idx], field(columns.rel[idx]))?;
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(TableError::EmptyTable {
            path: path.to_path_buf(),
        });
    }
    Ok(rows)
}

fn parse_freq(
    path: &Path,
    line: u64,
    headers: &csv::StringRecord,
    column: usize,
    raw: &str,
) -> Result<f64, TableError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(bad_value(path, line, headers.get(column).unwrap_or("?"), raw)),
    }
}

fn bad_value(path: &Path, line: u64, column: &str, value: &str) -> TableError {
    TableError::BadValue {
        path: path.to_path_buf(),
        line,
        column: column.to_string(),
        value: value.to_string(),
    }
}

#[derive(Deserialize)]
struct RelationRecord {
    derived_lemma: String,
    part_lemmas: String,
}

#[derive(Deserialize)]
struct CompoundRecord {
    derived_lemma: String,
    part_lemmas: String,
    compositionality: f64,
}

/// Load a loan or derivation table (`derived_lemma`, `part_lemmas`).
pub fn load_relations(
    path: impl AsRef<Path>,
    mode: LoadMode,
) -> Result<Vec<RelationEdge>, TableError> {
    let path = path.as_ref();
    let buffer = load_file(path, mode)?;
    let records: Vec<(u64, RelationRecord)> =
        read_relation_records(path, buffer.as_slice(), &["derived_lemma", "part_lemmas"])?;

    let edges = records
        .into_iter()
        .map(|(_, record)| {
            RelationEdge::new(record.derived_lemma.trim(), parse_parts(&record.part_lemmas))
        })
        .collect();
    let edges = dedup_edges(path, edges, |e| &e.derived_lemma)?;
    info!("loaded {} relation edges from {}", edges.len(), path.display());
    Ok(edges)
}

/// Load a compound table (`derived_lemma`, `part_lemmas`, `compositionality`).
pub fn load_compounds(
    path: impl AsRef<Path>,
    mode: LoadMode,
) -> Result<Vec<CompoundEdge>, TableError> {
    let path = path.as_ref();
    let buffer = load_file(path, mode)?;
    let records: Vec<(u64, CompoundRecord)> = read_relation_records(
        path,
        buffer.as_slice(),
        &["derived_lemma", "part_lemmas", "compositionality"],
    )?;

    let mut edges = Vec::with_capacity(records.len());
    for (line, record) in records {
        if !record.compositionality.is_finite() {
            return Err(bad_value(
                path,
                line,
                "compositionality",
                &record.compositionality.to_string(),
            ));
        }
        edges.push(CompoundEdge {
            edge: RelationEdge::new(record.derived_lemma.trim(), parse_parts(&record.part_lemmas)),
            compositionality: record.compositionality,
        });
    }
    let edges = dedup_edges(path, edges, |e| &e.edge.derived_lemma)?;
    info!("loaded {} compound edges from {}", edges.len(), path.display());
    Ok(edges)
}

fn read_relation_records<T: serde::de::DeserializeOwned>(
    path: &Path,
    bytes: &[u8],
    required: &[&str],
) -> Result<Vec<(u64, T)>, TableError> {
    let csv_err = |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_reader(bytes);
    // Trimmed once, so the column check and serde see the same names.
    let headers: csv::StringRecord = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::trim)
        .collect();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(TableError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let parsed: T = record.deserialize(Some(&headers)).map_err(csv_err)?;
        out.push((line, parsed));
    }
    Ok(out)
}

/// Split a `part_lemmas` cell into trimmed, non-empty lemmas.
pub fn parse_parts(raw: &str) -> Vec<String> {
    raw.split(PART_SEPARATOR)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn dedup_edges<T>(
    path: &Path,
    edges: Vec<T>,
    key: impl Fn(&T) -> &String,
) -> Result<Vec<T>, TableError> {
    if edges.is_empty() {
        return Err(TableError::EmptyTable {
            path: path.to_path_buf(),
        });
    }
    let mut seen: HashSet<String> = HashSet::with_capacity(edges.len());
    let mut kept = Vec::with_capacity(edges.len());
    let mut dropped = 0usize;
    for edge in edges {
        if seen.insert(key(&edge).clone()) {
            kept.push(edge);
        } else {
            debug!("duplicate relation for {} in {}", key(&edge), path.display());
            dropped += 1;
        }
    }
    if dropped > 0 {
        warn!(
            "{}: kept first record for {} duplicated derived lemmas",
            path.display(),
            dropped
        );
    }
    Ok(kept)
}

/// Read a plain word list: one lemma per line, blank lines ignored.
pub fn load_word_list(path: impl AsRef<Path>) -> Result<HashSet<String>, TableError> {
    let path = path.as_ref();
    let io_err = |source| TableError::Io {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut words = HashSet::new();
    for line in reader.lines() {
        let line = line.map_err(io_err)?;
        let word = line.trim();
        if !word.is_empty() {
            words.insert(word.to_string());
        }
    }
    info!("loaded {} words from {}", words.len(), path.display());
    Ok(words)
}

/// Header of the output table, in column order.
pub fn vocab_headers() -> Vec<String> {
    let mut headers = vec!["lemma".to_string()];
    headers.extend(Corpus::ALL.iter().map(|c| c.abs_column()));
    headers.extend(Corpus::ALL.iter().map(|c| c.rel_column()));
    headers.extend(
        [
            "agg_rel_freq_trimmed_mean",
            "agg_rel_freq_min",
            "agg_rel_freq_max",
            "is_core_seed",
            "is_pretrim_member",
        ]
        .map(str::to_string),
    );
    headers
}

/// Write the final vocabulary table as CSV, rows in the given order.
pub fn write_vocab_table<W: Write>(writer: W, rows: &[VocabRow]) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(vocab_headers())?;
    for vocab in rows {
        let mut record = Vec::with_capacity(3 + 2 * CORPUS_COUNT + 5);
        record.push(vocab.row.lemma.clone());
        record.extend(vocab.row.abs_freq.iter().map(f64::to_string));
        record.extend(vocab.row.rel_freq.iter().map(f64::to_string));
        record.push(vocab.aggregates.trimmed_mean.to_string());
        record.push(vocab.aggregates.min.to_string());
        record.push(vocab.aggregates.max.to_string());
        record.push(vocab.is_core_seed.to_string());
        record.push(vocab.is_pretrim_member.to_string());
        out.write_record(&record)?;
    }
    out.flush()?;
    Ok(())
}

/// Write the final vocabulary table to `path`.
pub fn write_vocab_file(path: impl AsRef<Path>, rows: &[VocabRow]) -> Result<(), TableError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_vocab_table(file, rows).map_err(|source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    info!("wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocab_types::Aggregates;

    fn header() -> String {
        vocab_headers()[..1 + 2 * CORPUS_COUNT].join(",") + ",pos"
    }

    #[test]
    fn parses_parts_with_blanks() {
        assert_eq!(parse_parts("kissa| pentu |"), vec!["kissa", "pentu"]);
        assert!(parse_parts("").is_empty());
    }

    #[test]
    fn freq_table_requires_every_corpus_column() {
        let csv = "lemma,pos,abs_freq_s24\nkissa,N,1\n";
        let err = parse_freq_table(Path::new("t.csv"), csv.as_bytes()).unwrap_err();
        assert!(
            matches!(err, TableError::MissingColumn { column, .. } if column == "relative_freq_s24")
        );
    }

    #[test]
    fn freq_table_rejects_negative_counts() {
        let values = vec!["1"; 2 * CORPUS_COUNT].join(",");
        let bad = format!("{}\nkissa,{},N\ntalo,-1{},N\n", header(), values, &values[1..]);
        let err = parse_freq_table(Path::new("t.csv"), bad.as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::BadValue { line: 3, .. }));
    }

    #[test]
    fn freq_table_rejects_empty_body() {
        let err = parse_freq_table(Path::new("t.csv"), format!("{}\n", header()).as_bytes())
            .unwrap_err();
        assert!(matches!(err, TableError::EmptyTable { .. }));
    }

    #[test]
    fn writes_header_and_flags() {
        let mut row = LemmaRow::new("kissa");
        row.abs_freq[Corpus::Wiki.index()] = 8.0;
        let rows = vec![VocabRow {
            row,
            aggregates: Aggregates::default(),
            is_core_seed: true,
            is_pretrim_member: false,
        }];
        let mut out = Vec::new();
        write_vocab_table(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("lemma,abs_freq_s24,"));
        let body = lines.next().unwrap();
        assert!(body.starts_with("kissa,0,0,0,8,"));
        assert!(body.ends_with(",true,false"));
    }
}
