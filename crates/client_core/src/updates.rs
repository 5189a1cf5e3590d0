use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use shared::{
    domain::{ClientUuid, EventId},
    protocol::ListUpdate,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

/// Source of incremental list updates for a single view.
///
/// Object-safe so a view can be driven by a scripted feed in tests instead
/// of a live websocket.
#[async_trait]
pub trait UpdateFeed: Send + Sync {
    /// Open the feed against `url`, closing any previous subscription first.
    async fn open(&self, url: &str) -> Result<()>;
    /// Tear the feed down. Messages still in flight are discarded.
    async fn close(&self);
    fn subscribe(&self) -> broadcast::Receiver<ListUpdate>;
}

/// Derives the per-view update channel address from the REST base URL.
pub fn updates_url(server_url: &str, event_id: &EventId, uuid: ClientUuid) -> Result<String> {
    let ws_base = if server_url.starts_with("https://") {
        server_url.replacen("https://", "wss://", 1)
    } else if server_url.starts_with("http://") {
        server_url.replacen("http://", "ws://", 1)
    } else {
        return Err(anyhow!("server_url must start with http:// or https://"));
    };
    let url = format!(
        "{}/ws/events/{event_id}/updates?uuid={uuid}",
        ws_base.trim_end_matches('/')
    );
    Url::parse(&url).with_context(|| format!("invalid updates url: {url}"))?;
    Ok(url)
}

/// Websocket subscription to one view's update channel.
///
/// `open` while already open closes the previous connection first. Every
/// `close`/re-`open` bumps a generation counter that the reader task checks
/// before forwarding a message, so nothing delivered across a close reaches
/// subscribers. Malformed payloads are logged and dropped. Reconnecting is
/// left to the owner; when the connection ends the feed simply goes quiet.
pub struct UpdateStream {
    updates: broadcast::Sender<ListUpdate>,
    generation: Arc<AtomicU64>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateStream {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            updates,
            generation: Arc::new(AtomicU64::new(0)),
            reader: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ListUpdate> {
        self.updates.subscribe()
    }

    pub async fn open(&self, url: &str) -> Result<()> {
        self.close().await;

        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect update channel: {url}"))?;
        let (_, mut ws_reader) = ws_stream.split();

        let my_generation = self.generation.load(Ordering::SeqCst);
        let generation = Arc::clone(&self.generation);
        let updates = self.updates.clone();
        debug!(url, "update channel opened");

        let task = tokio::spawn(async move {
            while let Some(message) = ws_reader.next().await {
                if generation.load(Ordering::SeqCst) != my_generation {
                    break;
                }
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ListUpdate>(&text) {
                        Ok(update) => {
                            if generation.load(Ordering::SeqCst) != my_generation {
                                break;
                            }
                            let _ = updates.send(update);
                        }
                        Err(err) => warn!("dropping malformed update payload: {err}"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("update channel receive failed: {err}");
                        break;
                    }
                }
            }
            debug!("update channel reader finished");
        });

        *self.reader.lock().await = Some(task);
        Ok(())
    }

    pub async fn close(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.reader.lock().await.take() {
            task.abort();
        }
    }
}

impl Default for UpdateStream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpdateFeed for UpdateStream {
    async fn open(&self, url: &str) -> Result<()> {
        UpdateStream::open(self, url).await
    }

    async fn close(&self) {
        UpdateStream::close(self).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ListUpdate> {
        UpdateStream::subscribe(self)
    }
}
