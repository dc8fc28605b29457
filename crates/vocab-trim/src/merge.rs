use tracing::info;
use vocab_types::LemmaRow;

use crate::FreqTable;

/// Collapse rows sharing a lemma into one, summing every frequency column.
///
/// Rows are sorted by lemma (stable), then reduced in a single left-to-right
/// scan. The POS tag does not survive: a merged lemma may have come from
/// several POS entries. Applying this to an already merged table changes
/// nothing.
pub fn merge_duplicates(mut rows: Vec<LemmaRow>) -> FreqTable {
    rows.sort_by(|a, b| a.lemma.cmp(&b.lemma));

    let before = rows.len();
    let mut merged: Vec<LemmaRow> = Vec::with_capacity(rows.len());
    for mut row in rows {
        match merged.last_mut() {
            Some(last) if last.lemma == row.lemma => last.add_scaled(&row, 1.0),
            _ => {
                row.pos = None;
                merged.push(row);
            }
        }
    }

    if merged.len() < before {
        info!(
            "merged {} duplicate rows into {} lemmas",
            before - merged.len(),
            merged.len()
        );
    }
    FreqTable::from_sorted_unique(merged)
}
