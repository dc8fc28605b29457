//! Trim morphological redundancy out of a multi-corpus frequency table.
//!
//! A predictable word-formation product (loanword, derivation, compositional
//! compound) should not take a vocabulary slot of its own. Instead of dropping
//! it outright, its frequency mass is handed to the lemmas it is built from, so
//! those constituents rank higher.
//!
//! # How it works
//! 1. [`merge_duplicates`] collapses repeated lemmas into one [`FreqTable`] row.
//! 2. A [`Redistributor`] removes every resolvable derived lemma of one
//!    relation kind and splits its mass evenly over the parts it can find.
//! 3. For compounds, [`CompositionalityPolicy`] first decides which compounds
//!    are predictable enough to remove at all.
//!
//! Each stage consumes a table and returns a new one.
//!
//! # Example
//! ```
//! use vocab_trim::{EdgeOrder, Redistributor, merge_duplicates};
//! use vocab_types::{Corpus, LemmaRow, RelationEdge, RelationKind};
//!
//! let mut compound = LemmaRow::new("kissanpentu");
//! compound.abs_freq[Corpus::Wiki.index()] = 10.0;
//! let table = merge_duplicates(vec![
//!     compound,
//!     LemmaRow::new("kissa"),
//!     LemmaRow::new("pentu"),
//! ]);
//!
//! let edges = [RelationEdge::new("kissanpentu", ["kissa", "pentu"])];
//! let (trimmed, report) =
//!     Redistributor::new(RelationKind::Compound, EdgeOrder::ByLength).apply(table, &edges);
//! assert_eq!(report.removed, 1);
//! assert_eq!(trimmed.get("kissa").unwrap().abs(Corpus::Wiki), 5.0);
//! ```

mod compound;
mod merge;
mod redistribute;
mod table;

pub use compound::{CompositionalityPolicy, CompoundPass, CompoundSelection, CompoundStats};
pub use merge::merge_duplicates;
pub use redistribute::{EdgeOrder, RedistributionReport, Redistributor};
pub use table::FreqTable;
