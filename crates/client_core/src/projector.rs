use shared::domain::Ticket;

/// Aggregate tallies derived from the current ticket list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterCounts {
    /// Tickets that are not cancelled.
    pub registered: usize,
    /// Tickets marked attended and not cancelled.
    pub attending: usize,
    pub cancelled: usize,
}

impl RosterCounts {
    /// Full O(n) recount. Recomputed after every structural change so it is
    /// always consistent with the list itself.
    pub fn of(tickets: &[Ticket]) -> Self {
        let mut counts = Self::default();
        for ticket in tickets {
            if ticket.cancelled {
                counts.cancelled += 1;
                continue;
            }
            counts.registered += 1;
            if ticket.attended {
                counts.attending += 1;
            }
        }
        counts
    }
}
