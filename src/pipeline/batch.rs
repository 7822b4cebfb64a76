//! Batch planning over an ordered identifier set.
//!
//! [`plan_batches`] validates the batch size up front and returns a
//! [`BatchPlan`] that lazily yields contiguous [`Batch`]es borrowing from the
//! identifier slice. Batches never reorder, drop or duplicate identifiers.

use std::slice::Chunks;

use thiserror::Error;

/// Default number of identifiers per fetch call.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Errors produced while planning batches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The batch size was zero.
    #[error("batch size must be at least 1 (got {size})")]
    InvalidBatchSize {
        /// The rejected batch size.
        size: usize,
    },
}

/// One contiguous slice of the identifier set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a> {
    /// Zero-based position of the batch in the plan.
    pub index: usize,
    /// Identifiers of this batch, in search order.
    pub ids: &'a [String],
}

impl Batch<'_> {
    /// Number of identifiers in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True for a batch without identifiers (never produced by a plan).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Lazy sequence of batches covering an identifier set in order.
#[derive(Debug, Clone)]
pub struct BatchPlan<'a> {
    chunks: Chunks<'a, String>,
    next_index: usize,
    batch_size: usize,
    total: usize,
}

impl BatchPlan<'_> {
    /// Number of batches the plan yields in total.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        batch_count(self.total, self.batch_size)
    }

    /// Configured batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl<'a> Iterator for BatchPlan<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let ids = self.chunks.next()?;
        let index = self.next_index;
        self.next_index += 1;
        Some(Batch { index, ids })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for BatchPlan<'_> {}

/// Splits `ids` into batches of `batch_size`, the last one possibly shorter.
///
/// # Errors
///
/// Returns [`PlanError::InvalidBatchSize`] when `batch_size` is zero.
pub fn plan_batches(ids: &[String], batch_size: usize) -> Result<BatchPlan<'_>, PlanError> {
    validate_batch_size(batch_size)?;
    Ok(BatchPlan {
        chunks: ids.chunks(batch_size),
        next_index: 0,
        batch_size,
        total: ids.len(),
    })
}

/// Checks a batch size without planning anything.
///
/// # Errors
///
/// Returns [`PlanError::InvalidBatchSize`] when `batch_size` is zero.
pub fn validate_batch_size(batch_size: usize) -> Result<(), PlanError> {
    if batch_size == 0 {
        return Err(PlanError::InvalidBatchSize { size: batch_size });
    }
    Ok(())
}

/// Number of batches needed for `total` identifiers (`ceil(total / batch_size)`).
///
/// Returns 0 when `batch_size` is zero.
#[must_use]
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    total.div_ceil(batch_size)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}", 38_000_000 + i)).collect()
    }

    #[test]
    fn test_plan_120_by_50_yields_50_50_20() {
        let ids = ids(120);
        let plan = plan_batches(&ids, 50).unwrap();
        assert_eq!(plan.batch_count(), 3);

        let sizes: Vec<usize> = plan.map(|b| b.len()).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
    }

    #[test]
    fn test_plan_indices_are_sequential() {
        let ids = ids(7);
        let indices: Vec<usize> = plan_batches(&ids, 3).unwrap().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_plan_empty_input_yields_no_batches() {
        let plan = plan_batches(&[], 50).unwrap();
        assert_eq!(plan.batch_count(), 0);
        assert_eq!(plan.count(), 0);
    }

    #[test]
    fn test_plan_zero_batch_size_is_rejected() {
        let ids = ids(3);
        let err = plan_batches(&ids, 0).unwrap_err();
        assert_eq!(err, PlanError::InvalidBatchSize { size: 0 });
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_plan_batch_larger_than_input() {
        let ids = ids(4);
        let batches: Vec<Batch<'_>> = plan_batches(&ids, 50).unwrap().collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].ids, &ids[..]);
    }

    #[test]
    fn test_plan_concatenates_to_input_for_all_sizes() {
        for total in 1..=60 {
            let ids = ids(total);
            for size in 1..=total + 2 {
                let plan = plan_batches(&ids, size).unwrap();
                let expected_count = plan.batch_count();
                let batches: Vec<Batch<'_>> = plan.collect();
                assert_eq!(batches.len(), expected_count, "total {total} size {size}");

                let mut joined: Vec<String> = Vec::with_capacity(total);
                for (position, batch) in batches.iter().enumerate() {
                    assert_eq!(batch.index, position);
                    assert!(!batch.is_empty());
                    if position + 1 < batches.len() {
                        assert_eq!(batch.len(), size, "only the last batch may be short");
                    } else {
                        assert!(batch.len() <= size);
                    }
                    joined.extend(batch.ids.iter().cloned());
                }
                assert_eq!(joined, ids, "total {total} size {size}");
            }
        }
    }

    #[test]
    fn test_batch_count_rounds_up() {
        assert_eq!(batch_count(120, 50), 3);
        assert_eq!(batch_count(100, 50), 2);
        assert_eq!(batch_count(1, 50), 1);
        assert_eq!(batch_count(0, 50), 0);
        assert_eq!(batch_count(10, 0), 0);
    }
}
