use std::collections::HashSet;

use shared::{
    domain::{ClientUuid, TicketId},
    protocol::{ListUpdate, UpdateAction},
};
use tracing::debug;

/// Decides whether a pushed update reaches the reconciler.
///
/// Every mutating REST call carries this client's uuid and the server stamps
/// the resulting broadcast with it, so a client normally receives an echo of
/// each of its own writes. The echo is redundant once the confirmed payload
/// has been applied locally, but only then: a push that arrives after a
/// failed local call still has to repair the list. The ledger therefore holds
/// server-acknowledged mutations only, and each entry is consumed by the
/// first matching echo.
pub struct OriginFilter {
    uuid: ClientUuid,
    confirmed: HashSet<(UpdateAction, TicketId)>,
}

impl OriginFilter {
    pub fn new(uuid: ClientUuid) -> Self {
        Self {
            uuid,
            confirmed: HashSet::new(),
        }
    }

    pub fn uuid(&self) -> ClientUuid {
        self.uuid
    }

    /// Record a local mutation the server acknowledged.
    pub fn record(&mut self, action: UpdateAction, id: TicketId) {
        self.confirmed.insert((action, id));
    }

    /// Forget all recorded mutations, e.g. on a full reload.
    pub fn clear(&mut self) {
        self.confirmed.clear();
    }

    pub fn should_apply(&mut self, update: &ListUpdate) -> bool {
        if update.uuid != Some(self.uuid) {
            return true;
        }
        if self.confirmed.remove(&(update.action, update.id.clone())) {
            debug!(id = %update.id, action = ?update.action, "suppressing echo of local mutation");
            return false;
        }
        true
    }
}
