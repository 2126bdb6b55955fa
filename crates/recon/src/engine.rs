use std::collections::HashMap;

use crate::error::{DuplicateId, ReconError};
use crate::model::{
    Classification, DiscrepancyReason, DuplicatePolicy, MatchKind, ReconResult, ReconSummary, Side,
    TransactionRecord,
};

/// Records of one side keyed by business id, in first-occurrence order.
struct SideIndex<'a> {
    order: Vec<&'a TransactionRecord>,
    position: HashMap<&'a str, usize>,
    collapsed: usize,
}

impl<'a> SideIndex<'a> {
    fn get(&self, business_id: &str) -> Option<&'a TransactionRecord> {
        self.position.get(business_id).map(|&i| self.order[i])
    }
}

fn index_side<'a>(
    records: &'a [TransactionRecord],
    side: Side,
    policy: DuplicatePolicy,
    duplicates: &mut Vec<DuplicateId>,
) -> SideIndex<'a> {
    let mut order: Vec<&TransactionRecord> = Vec::with_capacity(records.len());
    let mut position: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    let mut counts: Vec<usize> = Vec::with_capacity(records.len());

    for record in records {
        match position.get(record.business_id.as_str()) {
            Some(&i) => {
                counts[i] += 1;
                if policy == DuplicatePolicy::LastWins {
                    order[i] = record;
                }
            }
            None => {
                position.insert(record.business_id.as_str(), order.len());
                order.push(record);
                counts.push(1);
            }
        }
    }

    for (record, &count) in order.iter().zip(&counts) {
        if count > 1 {
            duplicates.push(DuplicateId {
                side: Some(side),
                business_id: record.business_id.clone(),
                count,
            });
        }
    }

    SideIndex {
        collapsed: records.len() - order.len(),
        order,
        position,
    }
}

/// Descriptive fields come from `base`, which is A's record whenever A has one.
fn classify(
    kind: MatchKind,
    base: &TransactionRecord,
    a: Option<&TransactionRecord>,
    b: Option<&TransactionRecord>,
) -> Classification {
    Classification {
        kind,
        business_id: base.business_id.clone(),
        occurred_at: base.occurred_at,
        source_account: base.source_account.clone(),
        destination_account: base.destination_account.clone(),
        amount_a: a.map(|r| r.amount),
        amount_b: b.map(|r| r.amount),
        status_a: a.map(|r| r.status),
        status_b: b.map(|r| r.status),
    }
}

/// Three-way classification of two record sets keyed by business id.
///
/// Output order follows side A's first occurrences, then side B's for ids
/// absent from A. Amounts compare as exact decimals, so `100.5` and
/// `100.50` are equal. An amount difference outranks a status difference.
pub fn reconcile(
    a: &[TransactionRecord],
    b: &[TransactionRecord],
    policy: DuplicatePolicy,
) -> Result<ReconResult, ReconError> {
    let mut duplicates = Vec::new();
    let index_a = index_side(a, Side::A, policy, &mut duplicates);
    let index_b = index_side(b, Side::B, policy, &mut duplicates);

    if policy == DuplicatePolicy::Reject && !duplicates.is_empty() {
        return Err(ReconError::DuplicateIds(duplicates));
    }

    let mut exact = Vec::new();
    let mut discrepant = Vec::new();
    let mut only_a = Vec::new();
    let mut only_b = Vec::new();
    let mut summary = ReconSummary {
        rows_a: a.len(),
        rows_b: b.len(),
        duplicates_a: index_a.collapsed,
        duplicates_b: index_b.collapsed,
        ..Default::default()
    };

    for &rec_a in &index_a.order {
        match index_b.get(&rec_a.business_id) {
            None => only_a.push(classify(MatchKind::OnlyInA, rec_a, Some(rec_a), None)),
            Some(rec_b) => {
                if rec_a.amount != rec_b.amount {
                    summary.amount_discrepancies += 1;
                    discrepant.push(classify(
                        MatchKind::Discrepancy(DiscrepancyReason::Amount),
                        rec_a,
                        Some(rec_a),
                        Some(rec_b),
                    ));
                } else if rec_a.status != rec_b.status {
                    summary.status_discrepancies += 1;
                    discrepant.push(classify(
                        MatchKind::Discrepancy(DiscrepancyReason::Status),
                        rec_a,
                        Some(rec_a),
                        Some(rec_b),
                    ));
                } else {
                    exact.push(classify(MatchKind::ExactMatch, rec_a, Some(rec_a), Some(rec_b)));
                }
            }
        }
    }

    for &rec_b in &index_b.order {
        if index_a.get(&rec_b.business_id).is_none() {
            only_b.push(classify(MatchKind::OnlyInB, rec_b, None, Some(rec_b)));
        }
    }

    summary.exact = exact.len();
    summary.discrepant = discrepant.len();
    summary.only_a = only_a.len();
    summary.only_b = only_b.len();

    tracing::info!(
        exact = summary.exact,
        discrepant = summary.discrepant,
        only_a = summary.only_a,
        only_b = summary.only_b,
        "reconciled"
    );

    Ok(ReconResult {
        exact,
        discrepant,
        only_a,
        only_b,
        summary,
    })
}
