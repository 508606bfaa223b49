//! Relay Turn Resolver
//!
//! Turn order always comes from an explicit category list, never from the
//! order in which slots happened to be assigned. Slot positions are 1-based.
//!
//! Resolution is cheap and stateless; callers re-resolve on every slot
//! transition and every answer instead of caching the active player, since
//! reassignment and takeovers can change between slots.

use serde::{Deserialize, Serialize};
use types::ids::PlayerId;
use types::question::OperationCategory;

// ---------------------------------------------------------------------------
// Turn order
// ---------------------------------------------------------------------------

/// Ordered category list that drives relay turns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOrder {
    categories: Vec<OperationCategory>,
}

impl TurnOrder {
    /// Addition, subtraction, multiplication, division, mixed
    pub fn canonical() -> Self {
        Self {
            categories: OperationCategory::CANONICAL.to_vec(),
        }
    }

    /// Custom order; duplicates after the first occurrence are dropped
    pub fn new(categories: impl IntoIterator<Item = OperationCategory>) -> Self {
        let mut out: Vec<OperationCategory> = Vec::new();
        for c in categories {
            if !out.contains(&c) {
                out.push(c);
            }
        }
        Self { categories: out }
    }

    pub fn categories(&self) -> &[OperationCategory] {
        &self.categories
    }
}

impl Default for TurnOrder {
    fn default() -> Self {
        Self::canonical()
    }
}

// ---------------------------------------------------------------------------
// Slot assignment
// ---------------------------------------------------------------------------

/// Category → player mapping, at most one holder per category.
///
/// Insertion order is kept only for the degenerate fallback in
/// [`resolve_active_player`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    entries: Vec<(OperationCategory, PlayerId)>,
}

impl SlotAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `category` to `player`, replacing any previous holder.
    ///
    /// Returns the previous holder.
    pub fn assign(&mut self, category: OperationCategory, player: PlayerId) -> Option<PlayerId> {
        match self.entries.iter_mut().find(|(c, _)| *c == category) {
            Some(entry) => {
                let previous = entry.1;
                entry.1 = player;
                Some(previous)
            }
            None => {
                self.entries.push((category, player));
                None
            }
        }
    }

    pub fn unassign(&mut self, category: OperationCategory) -> Option<PlayerId> {
        let idx = self.entries.iter().position(|(c, _)| *c == category)?;
        Some(self.entries.remove(idx).1)
    }

    /// Exchange the holders of two categories. Both must be assigned.
    pub fn swap(&mut self, a: OperationCategory, b: OperationCategory) -> bool {
        match (self.holder(a), self.holder(b)) {
            (Some(pa), Some(pb)) => {
                self.assign(a, pb);
                self.assign(b, pa);
                true
            }
            _ => false,
        }
    }

    pub fn holder(&self, category: OperationCategory) -> Option<PlayerId> {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, p)| *p)
    }

    /// Categories in insertion order
    pub fn categories(&self) -> impl Iterator<Item = OperationCategory> + '_ {
        self.entries.iter().map(|(c, _)| *c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Categories in turn order (see [`resolve_active_player`])
    pub fn ordered(&self, order: &TurnOrder) -> Vec<OperationCategory> {
        let filtered: Vec<OperationCategory> = order
            .categories()
            .iter()
            .copied()
            .filter(|c| self.holder(*c).is_some())
            .collect();
        if filtered.is_empty() {
            // Nothing in the configured order is assigned
            self.categories().collect()
        } else {
            filtered
        }
    }
}

/// Anchor override for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Takeover {
    pub category: OperationCategory,
    pub anchor: PlayerId,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Category played at a 1-based slot position
pub fn slot_category(order: &TurnOrder, assignment: &SlotAssignment, slot: usize) -> Option<OperationCategory> {
    if slot == 0 {
        return None;
    }
    assignment.ordered(order).get(slot - 1).copied()
}

/// Player who acts at a 1-based slot position.
///
/// `None` when the slot is 0 or past the assigned slots.
pub fn resolve_active_player(
    order: &TurnOrder,
    assignment: &SlotAssignment,
    takeover: Option<&Takeover>,
    slot: usize,
) -> Option<PlayerId> {
    let category = slot_category(order, assignment, slot)?;
    match takeover {
        Some(t) if t.category == category => Some(t.anchor),
        _ => assignment.holder(category),
    }
}

/// Number of playable slots for the assignment
pub fn slot_count(order: &TurnOrder, assignment: &SlotAssignment) -> usize {
    assignment.ordered(order).len()
}

/// 1-based slot position of a category, if it is played
pub fn slot_of(order: &TurnOrder, assignment: &SlotAssignment, category: OperationCategory) -> Option<usize> {
    assignment
        .ordered(order)
        .iter()
        .position(|c| *c == category)
        .map(|i| i + 1)
}

/// Round-robin default: member `i` takes every category at index `i mod n`
pub fn default_assignment(order: &TurnOrder, members: &[PlayerId]) -> SlotAssignment {
    let mut assignment = SlotAssignment::new();
    if members.is_empty() {
        return assignment;
    }
    for (i, category) in order.categories().iter().enumerate() {
        assignment.assign(*category, members[i % members.len()]);
    }
    assignment
}
