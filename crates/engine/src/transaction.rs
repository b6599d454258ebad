//! Conversion of an allocation into the persisted transaction record shape.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AllocationResult, ItemAssignments, LineItem, MoneyCents, Participant, Receipt,
    allocate::assignees_in_order,
};

/// One participant's slice of a persisted transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    pub user_id: String,
    pub name: String,
    /// The participant's item subset, each re-priced to their share only.
    pub items: Vec<LineItem>,
    /// Sum of the re-priced items.
    pub total: MoneyCents,
    /// Remainder attributed to tax/fees; present only when positive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees: Option<MoneyCents>,
    /// The allocation's owed amount, verbatim.
    pub split_amount: MoneyCents,
}

/// The persisted transaction record.
///
/// Created once on save and never mutated afterwards (the store is
/// append-only). Record-level `fees` carries the receipt tax only;
/// `subtotal` is `total - tax`, so named surcharges stay inside it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub name: String,
    pub date: DateTime<Utc>,
    pub merchant: String,
    pub users: Vec<UserEntry>,
    /// Ids of participants actually billed (owed > 0).
    pub user_ids: Vec<String>,
    pub fees: MoneyCents,
    pub subtotal: MoneyCents,
    pub total: MoneyCents,
}

/// Builds the persisted record for a finished split.
///
/// `items` is the (possibly user-edited) item list the assignments refer to.
/// Per-participant item shares reuse the allocation's deterministic cent
/// distribution, so each user's `fees` (owed minus their items) is exact.
pub fn build_record(
    name: &str,
    date: DateTime<Utc>,
    receipt: &Receipt,
    participants: &[Participant],
    items: &[LineItem],
    assignments: &ItemAssignments,
    allocation: &AllocationResult,
) -> TransactionRecord {
    let mut user_items: BTreeMap<&str, Vec<LineItem>> = BTreeMap::new();
    for (index, item) in items.iter().enumerate() {
        let Some(ids) = assignments.assignees(index) else {
            continue;
        };
        let assignees = assignees_in_order(participants, ids);
        if assignees.is_empty() {
            continue;
        }
        let shares = item.price.split_even(assignees.len());
        for (id, share) in assignees.iter().zip(shares) {
            user_items.entry(id).or_default().push(LineItem {
                name: item.name.clone(),
                price: share,
            });
        }
    }

    let users: Vec<UserEntry> = participants
        .iter()
        .map(|participant| {
            let items = user_items
                .remove(participant.id.as_str())
                .unwrap_or_default();
            let items_total: MoneyCents = items.iter().map(|item| item.price).sum();
            let owed = allocation
                .owed
                .get(&participant.id)
                .copied()
                .unwrap_or(MoneyCents::ZERO);
            let fee_share = owed - items_total;
            UserEntry {
                user_id: participant.id.clone(),
                name: participant.name.clone(),
                items,
                total: items_total,
                fees: fee_share.is_positive().then_some(fee_share),
                split_amount: owed,
            }
        })
        .collect();

    let user_ids = participants
        .iter()
        .filter(|p| {
            allocation
                .owed
                .get(&p.id)
                .is_some_and(|owed| owed.is_positive())
        })
        .map(|p| p.id.clone())
        .collect();

    TransactionRecord {
        name: name.to_string(),
        date,
        merchant: receipt.merchant_name.clone(),
        users,
        user_ids,
        fees: receipt.tax,
        subtotal: receipt.total - receipt.tax,
        total: receipt.total,
    }
}
