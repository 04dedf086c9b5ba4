use crate::Row;

/// Default character budget applied to a serialized result set.
pub const DEFAULT_RESULT_BUDGET: usize = 10_000;

/// Outcome of a bounding pass, reported to the caller so it can surface the
/// cut to its own consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncation {
    pub original: usize,
    pub kept: usize,
}

impl Truncation {
    pub fn none(count: usize) -> Self {
        Self {
            original: count,
            kept: count,
        }
    }

    pub fn dropped(&self) -> usize {
        self.original - self.kept
    }

    pub fn is_truncated(&self) -> bool {
        self.kept < self.original
    }
}

/// Cap the serialized size of an already-fetched result set.
///
/// A result whose full serialization fits the budget is returned unchanged.
/// Otherwise rows are kept in order until the next row would cross the
/// budget, and that row plus everything after it is dropped. The prefix can
/// be empty when even the first row is oversized; bounding never fails.
pub fn bound_rows(mut rows: Vec<Row>, budget: usize) -> (Vec<Row>, Truncation) {
    let sizes: Vec<usize> = rows.iter().map(|row| row.serialized().len()).collect();
    if sizes.iter().sum::<usize>() <= budget {
        let truncation = Truncation::none(rows.len());
        return (rows, truncation);
    }
    let mut used = 0;
    let mut kept = 0;
    for size in &sizes {
        if used + size > budget {
            break;
        }
        used += size;
        kept += 1;
    }
    let truncation = Truncation {
        original: rows.len(),
        kept,
    };
    log::warn!(
        "query result truncated from {} to {} rows to fit the {} character budget",
        truncation.original,
        truncation.kept,
        budget,
    );
    rows.truncate(kept);
    (rows, truncation)
}
