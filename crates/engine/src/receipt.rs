use serde::{Deserialize, Serialize};

use crate::MoneyCents;

/// Absolute tolerance for receipt arithmetic checks: 2 cents.
///
/// Shared by the validator's discrepancy checks and the allocation tests so
/// "close enough" means the same thing everywhere.
pub const TOLERANCE: MoneyCents = MoneyCents::new(2);

/// One purchased product or service with its price.
///
/// Immutable once part of a canonical [`Receipt`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub price: MoneyCents,
}

/// A named surcharge distinct from tax (tip, service charge, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherFee {
    pub name: String,
    pub amount: MoneyCents,
}

/// Canonical, validated representation of a scanned purchase.
///
/// The arithmetic invariants (`sum(items) ≈ subtotal`,
/// `subtotal + tax + fees ≈ total`) are soft: a receipt that violates them
/// still exists, but carries the unresolved `discrepancies` and, when it came
/// out of a non-convergent reconciliation, a human-readable `warning`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub merchant_name: String,
    pub items: Vec<LineItem>,
    pub subtotal: MoneyCents,
    pub tax: MoneyCents,
    pub other_fees: Vec<OtherFee>,
    /// Derived sum of `other_fees`, kept as a convenience for clients.
    pub other_fees_total: MoneyCents,
    pub total: MoneyCents,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discrepancies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl Receipt {
    /// Sum of all line item prices.
    #[must_use]
    pub fn items_total(&self) -> MoneyCents {
        self.items.iter().map(|item| item.price).sum()
    }
}
