//! Normalization of raw extractor payloads into canonical receipts.
//!
//! The extraction provider has no guaranteed schema: fields go missing,
//! prices arrive as strings with currency noise, and the model invents
//! ad-hoc top-level fields ("healthcareSurcharge": 4.0) instead of using the
//! fee list. Everything here degrades to a safe default instead of failing,
//! so downstream logic always has well-typed input.

use serde_json::{Map, Value};

use crate::{LineItem, MoneyCents, OtherFee, Receipt, receipt::TOLERANCE};

/// Top-level payload fields that are never absorbed into the fee list.
///
/// `otherFeesTotal`, `warning`, and `discrepancies` appear when a canonical
/// receipt is fed back through validation; keeping them reserved makes
/// validation idempotent.
const RESERVED_FIELDS: &[&str] = &[
    "merchantName",
    "items",
    "subtotal",
    "tax",
    "total",
    "date",
    "time",
    "dateTime",
    "otherFees",
    "otherFeesTotal",
    "warning",
    "discrepancies",
];

/// Result of validating a raw payload: the canonical receipt plus the
/// arithmetic discrepancies found against it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validated {
    pub receipt: Receipt,
    pub discrepancies: Vec<String>,
}

/// Normalizes a raw extractor payload into a canonical [`Receipt`].
///
/// Missing required fields default (`merchantName` → `""`, `items` → `[]`,
/// `total` → 0); item prices and fee amounts are coerced leniently; ad-hoc
/// numeric top-level fields are absorbed into the fee list. The two
/// tolerance checks (items vs subtotal, expected vs declared total) emit
/// discrepancy messages but never reject the receipt.
pub fn validate(raw: &Value) -> Validated {
    let empty = Map::new();
    let fields = raw.as_object().unwrap_or(&empty);

    let merchant_name = fields
        .get("merchantName")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let items = parse_items(fields.get("items"));

    let mut other_fees = parse_fees(fields.get("otherFees"));
    absorb_extra_fees(fields, &mut other_fees);

    let tax = fields
        .get("tax")
        .map(coerce_money)
        .unwrap_or(MoneyCents::ZERO);
    let total = fields
        .get("total")
        .map(coerce_money)
        .unwrap_or(MoneyCents::ZERO);

    let items_total: MoneyCents = items.iter().map(|item| item.price).sum();
    let other_fees_total: MoneyCents = other_fees.iter().map(|fee| fee.amount).sum();

    let subtotal = match fields.get("subtotal").map(coerce_money) {
        Some(value) if !value.is_zero() => value,
        _ => {
            tracing::debug!(subtotal = %items_total, "subtotal missing, computed from items");
            items_total
        }
    };

    let mut discrepancies = Vec::new();
    if (items_total - subtotal).cents().abs() > TOLERANCE.cents() {
        discrepancies.push(format!(
            "Calculated items total ({:.2}) doesn't match subtotal ({:.2})",
            items_total.to_major(),
            subtotal.to_major(),
        ));
    }

    let expected_total = subtotal + tax + other_fees_total;
    if (expected_total - total).cents().abs() > TOLERANCE.cents() {
        discrepancies.push(format!(
            "Calculated total ({:.2}) doesn't match receipt total ({:.2})",
            expected_total.to_major(),
            total.to_major(),
        ));
    }

    for message in &discrepancies {
        tracing::warn!("{message}");
    }

    Validated {
        receipt: Receipt {
            merchant_name,
            items,
            subtotal,
            tax,
            other_fees,
            other_fees_total,
            total,
            discrepancies: Vec::new(),
            warning: None,
        },
        discrepancies,
    }
}

/// Lenient money coercion for a single JSON value.
///
/// Numbers are rounded to cents; strings go through
/// [`MoneyCents::coerce_lossy`]; everything else coerces to zero and is
/// logged as a data-quality note.
fn coerce_money(value: &Value) -> MoneyCents {
    match value {
        Value::Number(n) => MoneyCents::from_major(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => MoneyCents::coerce_lossy(s),
        _ => {
            tracing::debug!(?value, "non-numeric money value coerced to zero");
            MoneyCents::ZERO
        }
    }
}

fn parse_items(value: Option<&Value>) -> Vec<LineItem> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };

    entries
        .iter()
        .map(|entry| LineItem {
            name: entry
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            price: entry.get("price").map(coerce_money).unwrap_or(MoneyCents::ZERO),
        })
        .collect()
}

/// Parses the `otherFees` field, which arrives either as a sequence of
/// `{name, amount}` entries or as a plain name → amount mapping.
fn parse_fees(value: Option<&Value>) -> Vec<OtherFee> {
    match value {
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|entry| OtherFee {
                name: entry
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                amount: entry
                    .get("amount")
                    .map(coerce_money)
                    .unwrap_or(MoneyCents::ZERO),
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, amount)| OtherFee {
                name: title_case(key),
                amount: coerce_money(amount),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Moves model-hallucinated ad-hoc fields ("tip": 5, "serviceCharge": "2.50")
/// into the fee list. Only positive numeric values qualify; anything else
/// stays untouched at the top level and is simply dropped by the canonical
/// receipt shape.
fn absorb_extra_fees(fields: &Map<String, Value>, other_fees: &mut Vec<OtherFee>) {
    for (key, value) in fields {
        if RESERVED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let amount = match value {
            Value::Number(n) => MoneyCents::from_major(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => MoneyCents::coerce_lossy(s),
            _ => continue,
        };
        if amount.is_positive() {
            tracing::debug!(field = %key, amount = %amount, "absorbed ad-hoc field into fees");
            other_fees.push(OtherFee {
                name: title_case(key),
                amount,
            });
        }
    }
}

/// Formats a camelCase field name as a display name:
/// "healthcareSurcharge" → "Healthcare Surcharge".
fn title_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for (i, c) in field.chars().enumerate() {
        if i == 0 {
            out.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            out.push(' ');
            out.push(c);
        } else {
            out.push(c);
        }
    }
    out.trim().to_string()
}
