use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{ClientUuid, EventSummary, Setting, Ticket, TicketId, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAction {
    Add,
    Update,
    Delete,
}

/// One incremental update pushed over a per-view channel.
///
/// The payload travels under an entity key; ticket lists use `ticket` and
/// person lists use `person`, both carrying the same record shape. The
/// `uuid` is the origin tag of the client whose REST call caused the update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListUpdate {
    pub action: UpdateAction,
    #[serde(rename = "_id")]
    pub id: TicketId,
    #[serde(
        default,
        rename = "ticket",
        alias = "person",
        skip_serializing_if = "Option::is_none"
    )]
    pub item: Option<Ticket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<ClientUuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsReply {
    pub events: Vec<EventSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketReply {
    pub ticket: Ticket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonsReply {
    pub persons: Vec<Ticket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsReply {
    pub settings: Vec<Setting>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersReply {
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoReply {
    #[serde(default)]
    pub info: Map<String, Value>,
}
