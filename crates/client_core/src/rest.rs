use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shared::{
    domain::{ClientUuid, EventDetail, EventId, EventSummary, Setting, Ticket, TicketId, User},
    error::{ApiException, ErrorCode, ErrorReply},
    protocol::{EventsReply, InfoReply, PersonsReply, SettingsReply, TicketReply, UsersReply},
};

/// Thin wrapper over the event service's REST resources.
///
/// Every mutating call carries the client uuid as a query parameter so the
/// server can stamp the resulting broadcast with the origin of the write.
pub struct EventsApi {
    http: Client,
    server_url: String,
    uuid: ClientUuid,
}

impl EventsApi {
    pub fn new(server_url: impl Into<String>, uuid: ClientUuid) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            server_url,
            uuid,
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn uuid(&self) -> ClientUuid {
        self.uuid
    }

    pub async fn list_events(&self) -> Result<Vec<EventSummary>> {
        let reply: EventsReply = self.get_json(&format!("{}/events", self.server_url)).await?;
        Ok(reply.events)
    }

    pub async fn get_event(&self, event_id: &EventId) -> Result<EventDetail> {
        self.get_json(&format!("{}/events/{event_id}", self.server_url))
            .await
    }

    pub async fn update_event(
        &self,
        event_id: &EventId,
        patch: &Map<String, Value>,
    ) -> Result<EventDetail> {
        let url = format!("{}/events/{event_id}", self.server_url);
        let response = self
            .http
            .put(&url)
            .query(&[("uuid", self.uuid.to_string())])
            .json(patch)
            .send()
            .await
            .with_context(|| format!("PUT {url} failed"))?;
        decode(response).await
    }

    /// The whole person registry; candidates for registration are derived
    /// from it by the view.
    pub async fn list_persons(&self) -> Result<Vec<Ticket>> {
        let reply: PersonsReply = self
            .get_json(&format!("{}/persons", self.server_url))
            .await?;
        Ok(reply.persons)
    }

    pub async fn add_ticket(&self, event_id: &EventId, ticket: &Ticket) -> Result<Ticket> {
        let url = format!("{}/events/{event_id}/tickets", self.server_url);
        let response = self
            .http
            .post(&url)
            .query(&[("uuid", self.uuid.to_string())])
            .json(ticket)
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;
        let reply: TicketReply = decode(response).await?;
        Ok(reply.ticket)
    }

    pub async fn update_ticket(
        &self,
        event_id: &EventId,
        ticket_id: &TicketId,
        patch: &Map<String, Value>,
    ) -> Result<Ticket> {
        let url = format!("{}/events/{event_id}/tickets/{ticket_id}", self.server_url);
        let response = self
            .http
            .put(&url)
            .query(&[("uuid", self.uuid.to_string())])
            .json(patch)
            .send()
            .await
            .with_context(|| format!("PUT {url} failed"))?;
        let reply: TicketReply = decode(response).await?;
        Ok(reply.ticket)
    }

    pub async fn delete_ticket(&self, event_id: &EventId, ticket_id: &TicketId) -> Result<()> {
        let url = format!("{}/events/{event_id}/tickets/{ticket_id}", self.server_url);
        let response = self
            .http
            .delete(&url)
            .query(&[("uuid", self.uuid.to_string())])
            .send()
            .await
            .with_context(|| format!("DELETE {url} failed"))?;
        ensure_success(response).await?;
        Ok(())
    }

    pub async fn settings(&self) -> Result<Vec<Setting>> {
        let reply: SettingsReply = self
            .get_json(&format!("{}/settings", self.server_url))
            .await?;
        Ok(reply.settings)
    }

    pub async fn info(&self) -> Result<Map<String, Value>> {
        let reply: InfoReply = self.get_json(&format!("{}/info", self.server_url)).await?;
        Ok(reply.info)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let reply: UsersReply = self.get_json(&format!("{}/users", self.server_url)).await?;
        Ok(reply.users)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = ensure_success(response).await?;
    response.json().await.context("invalid response payload")
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(api_error(status, &body).into())
}

fn api_error(status: StatusCode, body: &str) -> ApiException {
    let message = serde_json::from_str::<ErrorReply>(body)
        .map(|reply| reply.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("request failed with status {status}"));
    let code = match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        status if status.is_client_error() => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    };
    ApiException::new(code, message)
}
