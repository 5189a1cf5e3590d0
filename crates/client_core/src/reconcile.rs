use shared::{
    domain::{Ticket, TicketId},
    protocol::{ListUpdate, UpdateAction},
};
use tracing::{debug, warn};

/// Outcome of applying one update to a roster.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Added(Ticket),
    Updated(Ticket),
    Removed(Ticket),
    Unchanged,
}

impl Applied {
    pub fn is_change(&self) -> bool {
        !matches!(self, Applied::Unchanged)
    }
}

/// The list held by an active view: the registered tickets in arrival order,
/// plus the side pool of persons that can still be registered.
///
/// Invariant: at most one ticket per id. Updates that miss are logged and
/// ignored rather than raised; by the time they arrive the item was usually
/// already added or removed by a local action.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    tickets: Vec<Ticket>,
    candidates: Vec<Ticket>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(tickets: Vec<Ticket>, candidates: Vec<Ticket>) -> Self {
        Self {
            tickets,
            candidates,
        }
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn candidates(&self) -> &[Ticket] {
        &self.candidates
    }

    pub fn contains(&self, id: &TicketId) -> bool {
        self.position(id).is_some()
    }

    /// Replace everything after a full reload.
    pub fn reset(&mut self, tickets: Vec<Ticket>, candidates: Vec<Ticket>) {
        self.tickets = tickets;
        self.candidates = candidates;
    }

    pub fn apply(&mut self, update: &ListUpdate) -> Applied {
        match update.action {
            UpdateAction::Add => self.apply_add(update),
            UpdateAction::Update => self.apply_update(update),
            UpdateAction::Delete => self.apply_delete(update),
        }
    }

    fn apply_add(&mut self, update: &ListUpdate) -> Applied {
        if self.contains(&update.id) {
            debug!(id = %update.id, "duplicate add ignored");
            return Applied::Unchanged;
        }
        let Some(item) = update.item.clone() else {
            warn!(id = %update.id, "add without payload dropped");
            return Applied::Unchanged;
        };
        self.consume_candidate(&item);
        self.tickets.push(item.clone());
        Applied::Added(item)
    }

    fn apply_update(&mut self, update: &ListUpdate) -> Applied {
        let Some(pos) = self.position(&update.id) else {
            warn!(id = %update.id, "update for unknown ticket ignored");
            return Applied::Unchanged;
        };
        let Some(item) = update.item.clone() else {
            warn!(id = %update.id, "update without payload dropped");
            return Applied::Unchanged;
        };
        if self.tickets[pos] == item {
            return Applied::Unchanged;
        }
        self.tickets[pos] = item.clone();
        Applied::Updated(item)
    }

    fn apply_delete(&mut self, update: &ListUpdate) -> Applied {
        let Some(pos) = self.position(&update.id) else {
            warn!(id = %update.id, "delete for unknown ticket ignored");
            return Applied::Unchanged;
        };
        let removed = self.tickets.remove(pos);
        if !self.candidates.iter().any(|c| c.id == removed.id) {
            self.candidates.push(removed.clone());
        }
        Applied::Removed(removed)
    }

    fn position(&self, id: &TicketId) -> Option<usize> {
        self.tickets.iter().position(|t| &t.id == id)
    }

    /// A newly registered person leaves the candidate pool. The ticket id is
    /// server-assigned, so when no candidate carries it the match falls back
    /// to the e-mail address.
    fn consume_candidate(&mut self, item: &Ticket) {
        if let Some(pos) = self.candidates.iter().position(|c| c.id == item.id) {
            self.candidates.remove(pos);
            return;
        }
        if let Some(pos) = self.candidates.iter().position(|c| c.same_email(item)) {
            self.candidates.remove(pos);
        }
    }
}
