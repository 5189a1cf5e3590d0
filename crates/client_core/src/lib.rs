use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};
use shared::{
    domain::{EventId, Ticket, TicketId},
    protocol::{ListUpdate, UpdateAction},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod origin;
pub mod projector;
pub mod reconcile;
pub mod rest;
pub mod updates;

pub use origin::OriginFilter;
pub use projector::RosterCounts;
pub use reconcile::{Applied, Roster};
pub use rest::EventsApi;
pub use updates::{updates_url, UpdateFeed, UpdateStream};

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("no event is open in this view")]
    NotOpen,
}

/// Notifications emitted towards the UI layer.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    RosterLoaded {
        event_id: EventId,
        counts: RosterCounts,
    },
    TicketAdded {
        ticket: Ticket,
        counts: RosterCounts,
    },
    TicketUpdated {
        ticket: Ticket,
        counts: RosterCounts,
    },
    TicketRemoved {
        ticket: Ticket,
        counts: RosterCounts,
    },
    Error(String),
}

/// The controller behind one event-detail view.
///
/// Owns the roster for the open event and is the only place that mutates it:
/// pushed updates arrive through the injected [`UpdateFeed`] and are applied
/// by a single pump task, local mutations go through the REST API first and
/// apply the confirmed payload on the same path. Lifecycle is explicit via
/// [`open`](TicketListView::open) and [`close`](TicketListView::close).
pub struct TicketListView {
    api: Arc<EventsApi>,
    feed: Arc<dyn UpdateFeed>,
    inner: Mutex<ViewState>,
    events: broadcast::Sender<ClientEvent>,
}

struct ViewState {
    event_id: Option<EventId>,
    roster: Roster,
    origin: OriginFilter,
    counts: RosterCounts,
    generation: u64,
    pump: Option<JoinHandle<()>>,
}

impl TicketListView {
    pub fn new(api: Arc<EventsApi>, feed: Arc<dyn UpdateFeed>) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        let origin = OriginFilter::new(api.uuid());
        Arc::new(Self {
            api,
            feed,
            inner: Mutex::new(ViewState {
                event_id: None,
                roster: Roster::new(),
                origin,
                counts: RosterCounts::default(),
                generation: 0,
                pump: None,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Load the event's ticket list and candidate pool over REST, then start
    /// following the push channel. Opening while already open tears the
    /// previous subscription down first.
    pub async fn open(self: &Arc<Self>, event_id: EventId) -> Result<()> {
        self.close().await;

        let detail = self.api.get_event(&event_id).await?;
        let persons = self.api.list_persons().await?;
        let candidates = available_candidates(persons, &detail.tickets);

        let generation = {
            let mut inner = self.inner.lock().await;
            inner.event_id = Some(event_id.clone());
            inner.roster.reset(detail.tickets, candidates);
            inner.origin.clear();
            inner.counts = RosterCounts::of(inner.roster.tickets());
            inner.generation
        };

        let url = updates_url(self.api.server_url(), &event_id, self.api.uuid())?;
        let mut updates = self.feed.subscribe();
        self.feed.open(&url).await?;

        let view = Arc::clone(self);
        let pump = tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(update) => view.ingest(generation, update).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "update feed lagged; list may be stale");
                        let _ = view.events.send(ClientEvent::Error(format!(
                            "update feed lagged; {missed} updates missed"
                        )));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let counts = {
            let mut inner = self.inner.lock().await;
            inner.pump = Some(pump);
            inner.counts
        };

        info!(event_id = %event_id, "ticket view opened");
        let _ = self
            .events
            .send(ClientEvent::RosterLoaded { event_id, counts });
        Ok(())
    }

    /// Stop following updates. Anything still in flight is discarded by the
    /// generation check, so the roster can no longer change.
    pub async fn close(&self) {
        self.feed.close().await;
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.event_id = None;
        if let Some(pump) = inner.pump.take() {
            pump.abort();
        }
    }

    /// Register a person for the open event. The server assigns the ticket
    /// id; the confirmed payload is applied locally right away and the later
    /// broadcast echo is suppressed.
    pub async fn add_ticket(&self, person: &Ticket) -> Result<Ticket> {
        let event_id = self.require_open().await?;
        let created = self.api.add_ticket(&event_id, person).await?;
        self.apply_confirmed(local_update(UpdateAction::Add, created.clone())).await;
        Ok(created)
    }

    pub async fn update_ticket(
        &self,
        ticket_id: &TicketId,
        patch: Map<String, Value>,
    ) -> Result<Ticket> {
        let event_id = self.require_open().await?;
        let updated = self.api.update_ticket(&event_id, ticket_id, &patch).await?;
        self.apply_confirmed(local_update(UpdateAction::Update, updated.clone())).await;
        Ok(updated)
    }

    pub async fn set_attended(&self, ticket_id: &TicketId, attended: bool) -> Result<Ticket> {
        let mut patch = Map::new();
        patch.insert("attended".to_string(), Value::Bool(attended));
        self.update_ticket(ticket_id, patch).await
    }

    pub async fn delete_ticket(&self, ticket_id: &TicketId) -> Result<()> {
        let event_id = self.require_open().await?;
        self.api.delete_ticket(&event_id, ticket_id).await?;
        self.apply_confirmed(ListUpdate {
            action: UpdateAction::Delete,
            id: ticket_id.clone(),
            item: None,
            uuid: None,
        })
        .await;
        Ok(())
    }

    pub async fn event_id(&self) -> Option<EventId> {
        self.inner.lock().await.event_id.clone()
    }

    pub async fn tickets(&self) -> Vec<Ticket> {
        self.inner.lock().await.roster.tickets().to_vec()
    }

    pub async fn candidates(&self) -> Vec<Ticket> {
        self.inner.lock().await.roster.candidates().to_vec()
    }

    pub async fn counts(&self) -> RosterCounts {
        self.inner.lock().await.counts
    }

    pub async fn attendee_count(&self) -> usize {
        self.counts().await.attending
    }

    /// Apply one pushed update. `generation` is the pump's token; a stale
    /// token means the view was closed (or reopened) after the update was
    /// queued, and the update must not touch the roster.
    async fn ingest(&self, generation: u64, update: ListUpdate) {
        let (applied, counts) = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                debug!(id = %update.id, "dropping update for torn-down view");
                return;
            }
            if !inner.origin.should_apply(&update) {
                return;
            }
            let applied = inner.roster.apply(&update);
            if !applied.is_change() {
                return;
            }
            inner.counts = RosterCounts::of(inner.roster.tickets());
            (applied, inner.counts)
        };
        self.emit(applied, counts);
    }

    /// Apply a server-confirmed local mutation through the same path pushed
    /// updates take, then remember it so its echo is suppressed.
    async fn apply_confirmed(&self, update: ListUpdate) {
        let (applied, counts) = {
            let mut inner = self.inner.lock().await;
            inner.origin.record(update.action, update.id.clone());
            let applied = inner.roster.apply(&update);
            if !applied.is_change() {
                return;
            }
            inner.counts = RosterCounts::of(inner.roster.tickets());
            (applied, inner.counts)
        };
        self.emit(applied, counts);
    }

    fn emit(&self, applied: Applied, counts: RosterCounts) {
        let event = match applied {
            Applied::Added(ticket) => ClientEvent::TicketAdded { ticket, counts },
            Applied::Updated(ticket) => ClientEvent::TicketUpdated { ticket, counts },
            Applied::Removed(ticket) => ClientEvent::TicketRemoved { ticket, counts },
            Applied::Unchanged => return,
        };
        let _ = self.events.send(event);
    }

    async fn require_open(&self) -> Result<EventId> {
        self.inner
            .lock()
            .await
            .event_id
            .clone()
            .ok_or_else(|| ViewError::NotOpen.into())
    }
}

fn local_update(action: UpdateAction, ticket: Ticket) -> ListUpdate {
    ListUpdate {
        action,
        id: ticket.id.clone(),
        item: Some(ticket),
        uuid: None,
    }
}

/// Persons that can still be registered: the registry minus anyone already
/// holding a ticket. Ticket ids are server-assigned, so the match checks the
/// registry id first and falls back to the e-mail address.
fn available_candidates(persons: Vec<Ticket>, tickets: &[Ticket]) -> Vec<Ticket> {
    persons
        .into_iter()
        .filter(|person| {
            !tickets
                .iter()
                .any(|ticket| ticket.id == person.id || ticket.same_email(person))
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
