use crate::engine::reconcile;
use crate::error::CompareError;
use crate::model::{BatchId, DuplicatePolicy, ReconResult};
use crate::store::BatchStore;

/// Load both batches and reconcile them. Both ids are looked up before
/// failing, so a missing pair is reported in one error.
pub fn compare<S: BatchStore>(
    store: &S,
    id_a: BatchId,
    id_b: BatchId,
    policy: DuplicatePolicy,
) -> Result<ReconResult, CompareError> {
    let batch_a = store.load_batch_with_records(id_a).map_err(CompareError::Storage)?;
    let batch_b = store.load_batch_with_records(id_b).map_err(CompareError::Storage)?;

    let (batch_a, batch_b) = match (batch_a, batch_b) {
        (Some(a), Some(b)) => (a, b),
        (a, b) => {
            let mut missing = Vec::new();
            if a.is_none() {
                missing.push(id_a);
            }
            if b.is_none() && !(id_a == id_b && a.is_none()) {
                missing.push(id_b);
            }
            return Err(CompareError::NotFound(missing));
        }
    };

    tracing::debug!(
        batch_a = %id_a,
        batch_b = %id_b,
        rows_a = batch_a.transactions.len(),
        rows_b = batch_b.transactions.len(),
        "comparing batches"
    );

    Ok(reconcile(&batch_a.transactions, &batch_b.transactions, policy)?)
}
