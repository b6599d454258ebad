//! Per-participant bill allocation.
//!
//! Pure arithmetic over a canonical receipt, a participant list, and the
//! item assignments the user built up interactively. Tax is split equally
//! among the active participants (anyone holding at least one item, plus the
//! requester unconditionally); each item's price is split equally among its
//! assignees. All splits distribute cent remainders deterministically so the
//! owed amounts always sum back exactly.

use std::collections::{BTreeMap, BTreeSet};

use crate::{EngineError, MoneyCents, Receipt, ResultEngine};

/// A person in a split.
///
/// Exactly one participant per split is the requester (the user creating
/// it); the requester always carries a tax share even with no items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    /// Unique id, in practice the user's email.
    pub id: String,
    pub name: String,
    pub is_requester: bool,
}

impl Participant {
    /// The participant creating the split.
    pub fn requester(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_requester: true,
        }
    }

    /// An invited friend.
    pub fn invitee(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_requester: false,
        }
    }
}

/// Which participants share the cost of which line item.
///
/// Keyed by item index into the receipt's item list. This is the only
/// mutable state in a split session; everything downstream is derived.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemAssignments {
    by_item: BTreeMap<usize, BTreeSet<String>>,
}

impl ItemAssignments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a participant to an item's assignee set.
    pub fn assign(&mut self, item: usize, participant_id: impl Into<String>) {
        self.by_item
            .entry(item)
            .or_default()
            .insert(participant_id.into());
    }

    /// Removes a participant from an item's assignee set.
    pub fn unassign(&mut self, item: usize, participant_id: &str) {
        if let Some(ids) = self.by_item.get_mut(&item) {
            ids.remove(participant_id);
            if ids.is_empty() {
                self.by_item.remove(&item);
            }
        }
    }

    /// Flips a participant's membership in an item's assignee set (the
    /// tap-to-toggle interaction).
    pub fn toggle(&mut self, item: usize, participant_id: &str) {
        let assigned = self
            .by_item
            .get(&item)
            .is_some_and(|ids| ids.contains(participant_id));
        if assigned {
            self.unassign(item, participant_id);
        } else {
            self.assign(item, participant_id);
        }
    }

    /// Clears all assignees of an item.
    pub fn clear(&mut self, item: usize) {
        self.by_item.remove(&item);
    }

    /// The assignee set of an item, if any participant holds it.
    #[must_use]
    pub fn assignees(&self, item: usize) -> Option<&BTreeSet<String>> {
        self.by_item.get(&item)
    }

    /// Iterates `(item index, assignee set)` pairs in item order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &BTreeSet<String>)> {
        self.by_item.iter().map(|(item, ids)| (*item, ids))
    }
}

/// Derived per-participant owed amounts.
///
/// Recomputed from scratch whenever the assignments change; never persisted
/// directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationResult {
    /// Owed amount per participant id, seeded for every known participant.
    pub owed: BTreeMap<String, MoneyCents>,
    /// Equal tax share, rounded to the nearest cent (display value; the
    /// `owed` amounts carry the exact cent distribution).
    pub tax_per_person: MoneyCents,
    /// Participants carrying a tax share: assignees of at least one item,
    /// plus the requester.
    pub active_participant_count: usize,
}

impl AllocationResult {
    /// Sum of all owed amounts.
    #[must_use]
    pub fn total(&self) -> MoneyCents {
        self.owed.values().sum()
    }
}

/// Computes what each participant owes for a receipt.
///
/// Unknown participant ids appearing in an assignment are ignored silently:
/// they do not receive a share, and they do not count toward the
/// active-participant tax denominator. Item indexes outside the receipt's
/// item list are likewise skipped. Unassigned items are not billed to
/// anyone.
pub fn allocate(
    receipt: &Receipt,
    participants: &[Participant],
    assignments: &ItemAssignments,
) -> ResultEngine<AllocationResult> {
    let requester = requester_of(participants)?;

    if let Some(item) = receipt.items.iter().find(|item| item.price.is_negative()) {
        return Err(EngineError::InvalidAmount(format!(
            "negative price for item '{}'",
            item.name
        )));
    }

    let known: BTreeSet<&str> = participants.iter().map(|p| p.id.as_str()).collect();

    let mut active: BTreeSet<&str> = BTreeSet::new();
    for (item, ids) in assignments.iter() {
        if item >= receipt.items.len() {
            continue;
        }
        for id in ids {
            if known.contains(id.as_str()) {
                active.insert(id.as_str());
            }
        }
    }
    // The requester is always active, even with zero assigned items.
    active.insert(requester.id.as_str());

    let num_active = active.len().max(1);

    let mut owed: BTreeMap<String, MoneyCents> = BTreeMap::new();
    let tax_shares = receipt.tax.split_even(num_active);
    let mut next_tax_share = tax_shares.into_iter();
    for participant in participants {
        let seed = if active.contains(participant.id.as_str()) {
            next_tax_share.next().unwrap_or(MoneyCents::ZERO)
        } else {
            MoneyCents::ZERO
        };
        owed.insert(participant.id.clone(), seed);
    }

    for (item, ids) in assignments.iter() {
        let Some(line) = receipt.items.get(item) else {
            continue;
        };
        let assignees = assignees_in_order(participants, ids);
        if assignees.is_empty() {
            continue;
        }
        let shares = line.price.split_even(assignees.len());
        for (id, share) in assignees.iter().zip(shares) {
            if let Some(amount) = owed.get_mut(*id) {
                *amount += share;
            }
        }
    }

    Ok(AllocationResult {
        owed,
        tax_per_person: receipt.tax.div_round(num_active),
        active_participant_count: num_active,
    })
}

/// The known assignees of an item, in participant-list order.
///
/// The ordering matters: even splits hand their cent remainders to the
/// earliest assignees, and the transaction builder must agree with the
/// allocation about who those are.
pub(crate) fn assignees_in_order<'a>(
    participants: &'a [Participant],
    ids: &BTreeSet<String>,
) -> Vec<&'a str> {
    participants
        .iter()
        .filter(|p| ids.contains(p.id.as_str()))
        .map(|p| p.id.as_str())
        .collect()
}

fn requester_of(participants: &[Participant]) -> ResultEngine<&Participant> {
    let mut requesters = participants.iter().filter(|p| p.is_requester);
    let requester = requesters.next().ok_or_else(|| {
        EngineError::InvalidParticipants("a split needs exactly one requester".to_string())
    })?;
    if requesters.next().is_some() {
        return Err(EngineError::InvalidParticipants(
            "more than one requester".to_string(),
        ));
    }
    Ok(requester)
}
