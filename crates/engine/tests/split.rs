//! End-to-end tests over the full split pipeline:
//! raw payload -> validate -> allocate -> transaction record.

use chrono::Utc;
use engine::{
    ItemAssignments, MoneyCents, Participant, TOLERANCE, allocate, build_record, validate,
};
use serde_json::json;

fn within_tolerance(a: MoneyCents, b: MoneyCents) -> bool {
    (a - b).cents().abs() <= TOLERANCE.cents()
}

fn cafe_payload() -> serde_json::Value {
    json!({
        "merchantName": "Corner Cafe",
        "items": [
            { "name": "Coffee", "price": 3.50 },
            { "name": "Bagel", "price": 2.25 },
        ],
        "tax": 0.50,
        "total": 6.25,
    })
}

#[test]
fn clean_scan_validates_without_discrepancies() {
    let validated = validate(&cafe_payload());
    assert!(validated.discrepancies.is_empty());
    assert_eq!(validated.receipt.subtotal.cents(), 575);
    assert_eq!(validated.receipt.total.cents(), 625);
}

#[test]
fn inflated_total_is_flagged_once() {
    let validated = validate(&json!({
        "merchantName": "Corner Cafe",
        "items": [
            { "name": "Coffee", "price": 3.50 },
            { "name": "Bagel", "price": 2.25 },
        ],
        "total": 7.00,
    }));
    assert_eq!(validated.discrepancies.len(), 1);
}

#[test]
fn fee_absorption_round_trips() {
    let validated = validate(&json!({
        "merchantName": "Diner",
        "items": [{ "name": "Eggs", "price": 8.00 }],
        "subtotal": 8.00,
        "tax": 0.60,
        "tip": 5,
        "total": 13.60,
    }));
    let receipt = validated.receipt;
    assert_eq!(receipt.other_fees.len(), 1);
    assert_eq!(receipt.other_fees[0].name, "Tip");
    assert_eq!(receipt.other_fees[0].amount.cents(), 500);

    // The ad-hoc field must not survive into the canonical serialization.
    let serialized = serde_json::to_value(&receipt).unwrap();
    assert!(serialized.get("tip").is_none());
    assert_eq!(serialized["otherFeesTotal"], json!(5.0));
}

#[test]
fn canonical_receipts_are_a_fixed_point_of_validation() {
    let first = validate(&cafe_payload());
    let reparsed = serde_json::to_value(&first.receipt).unwrap();
    let second = validate(&reparsed);
    assert!(second.discrepancies.is_empty());
}

#[test]
fn owed_amounts_conserve_the_bill_when_everything_is_assigned() {
    let receipt = validate(&cafe_payload()).receipt;
    let participants = vec![
        Participant::requester("a@x.io", "Ada"),
        Participant::invitee("b@x.io", "Ben"),
        Participant::invitee("c@x.io", "Cam"),
    ];
    let mut assignments = ItemAssignments::new();
    // Coffee shared three ways, bagel two ways: nothing unassigned.
    for id in ["a@x.io", "b@x.io", "c@x.io"] {
        assignments.assign(0, id);
    }
    assignments.assign(1, "a@x.io");
    assignments.assign(1, "b@x.io");

    let result = allocate(&receipt, &participants, &assignments).unwrap();
    let billed = receipt.items_total() + receipt.tax;
    // Cent-remainder distribution makes conservation exact, not just within
    // tolerance.
    assert_eq!(result.total(), billed);
}

#[test]
fn requester_always_owes_the_tax_floor() {
    let receipt = validate(&cafe_payload()).receipt;
    let participants = vec![
        Participant::requester("a@x.io", "Ada"),
        Participant::invitee("b@x.io", "Ben"),
    ];
    let mut assignments = ItemAssignments::new();
    assignments.assign(0, "b@x.io");
    assignments.assign(1, "b@x.io");

    let result = allocate(&receipt, &participants, &assignments).unwrap();
    assert!(result.owed["a@x.io"].is_positive());
}

#[test]
fn item_shares_reconstruct_the_price() {
    let receipt = validate(&json!({
        "merchantName": "Bar",
        "items": [{ "name": "Pitcher", "price": 11.00 }],
        "total": 11.00,
    }))
    .receipt;
    let participants = vec![
        Participant::requester("a@x.io", "Ada"),
        Participant::invitee("b@x.io", "Ben"),
        Participant::invitee("c@x.io", "Cam"),
    ];
    let mut assignments = ItemAssignments::new();
    for id in ["a@x.io", "b@x.io", "c@x.io"] {
        assignments.assign(0, id);
    }

    let result = allocate(&receipt, &participants, &assignments).unwrap();
    let ideal = MoneyCents::from_major(11.00 / 3.0);
    for id in ["a@x.io", "b@x.io", "c@x.io"] {
        assert!(within_tolerance(result.owed[id], ideal));
    }
    assert_eq!(result.total().cents(), 1100);
}

#[test]
fn record_matches_allocation_to_the_cent() {
    let receipt = validate(&cafe_payload()).receipt;
    let participants = vec![
        Participant::requester("a@x.io", "Ada"),
        Participant::invitee("b@x.io", "Ben"),
    ];
    let mut assignments = ItemAssignments::new();
    assignments.assign(0, "a@x.io");
    assignments.assign(0, "b@x.io");
    assignments.assign(1, "b@x.io");

    let allocation = allocate(&receipt, &participants, &assignments).unwrap();
    let record = build_record(
        "Breakfast",
        Utc::now(),
        &receipt,
        &participants,
        &receipt.items,
        &assignments,
        &allocation,
    );

    for user in &record.users {
        assert_eq!(user.split_amount, allocation.owed[&user.user_id]);
        let items_total: MoneyCents = user.items.iter().map(|i| i.price).sum();
        assert_eq!(user.total, items_total);
        let fee = user.fees.unwrap_or(MoneyCents::ZERO);
        assert_eq!(user.total + fee, user.split_amount);
    }
    assert_eq!(record.subtotal, record.total - record.fees);
    assert_eq!(record.merchant, "Corner Cafe");
}

#[test]
fn record_serializes_in_the_persisted_wire_shape() {
    let receipt = validate(&cafe_payload()).receipt;
    let participants = vec![Participant::requester("a@x.io", "Ada")];
    let mut assignments = ItemAssignments::new();
    assignments.assign(0, "a@x.io");
    assignments.assign(1, "a@x.io");

    let allocation = allocate(&receipt, &participants, &assignments).unwrap();
    let record = build_record(
        "Solo",
        Utc::now(),
        &receipt,
        &participants,
        &receipt.items,
        &assignments,
        &allocation,
    );

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["userIds"], json!(["a@x.io"]));
    assert_eq!(value["users"][0]["userId"], json!("a@x.io"));
    assert_eq!(value["users"][0]["splitAmount"], json!(6.25));
    assert_eq!(value["fees"], json!(0.5));
    assert_eq!(value["subtotal"], json!(5.75));
    assert_eq!(value["total"], json!(6.25));
}
