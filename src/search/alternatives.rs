//! Alternative medicines by composition overlap / 按成分查找替代药品

use super::tokenizer::tokenize;
use crate::dataset::{Dataset, MedicineRecord};

pub const MAX_ALTERNATIVES: usize = 5;

/// Find up to [`MAX_ALTERNATIVES`] rows sharing a composition word with `reference`.
///
/// Scans in index order and stops at the fifth hit, so results reflect
/// dataset order rather than relevance. `exclude_index` is never returned.
pub fn find_alternatives<'a>(
    dataset: &'a Dataset,
    reference: &MedicineRecord,
    exclude_index: usize,
) -> Vec<&'a MedicineRecord> {
    let tokens = tokenize(&reference.composition);
    if tokens.is_empty() {
        return Vec::new();
    }

    dataset
        .iter()
        .filter(|r| r.index != exclude_index)
        .filter(|r| {
            let composition = r.composition.to_lowercase();
            tokens.iter().any(|t| composition.contains(t.as_str()))
        })
        .take(MAX_ALTERNATIVES)
        .collect()
}
