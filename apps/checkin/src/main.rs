use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use client_core::{ClientEvent, EventsApi, TicketListView, UpdateStream};
use shared::domain::{ClientUuid, EventId};
use tracing::warn;

mod config;

use config::load_settings;

/// Follow an event's attendee list live and print attendance counts.
#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the event service; overrides checkin.toml and env.
    #[arg(long)]
    server_url: Option<String>,
    /// Event to follow. Without it the known events are listed.
    #[arg(long)]
    event_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(event_id) = args.event_id {
        settings.event_id = Some(event_id);
    }

    let api = Arc::new(EventsApi::new(
        settings.server_url,
        ClientUuid::generate(),
    ));

    let Some(event_id) = settings.event_id else {
        let events = api.list_events().await?;
        if events.is_empty() {
            return Err(anyhow!("no events on the server; create one first"));
        }
        for event in events {
            println!("{}  {}", event.id, event.title);
        }
        return Ok(());
    };

    let view = TicketListView::new(Arc::clone(&api), Arc::new(UpdateStream::new()));
    let mut events = view.subscribe_events();
    view.open(EventId(event_id)).await?;

    let counts = view.counts().await;
    println!(
        "attending {} / registered {} (cancelled {})",
        counts.attending, counts.registered, counts.cancelled
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(ClientEvent::TicketAdded { ticket, counts }) => {
                    println!(
                        "+ {}  attending {}/{}",
                        ticket.display_name(), counts.attending, counts.registered
                    );
                }
                Ok(ClientEvent::TicketUpdated { ticket, counts }) => {
                    println!(
                        "~ {}  attending {}/{}",
                        ticket.display_name(), counts.attending, counts.registered
                    );
                }
                Ok(ClientEvent::TicketRemoved { ticket, counts }) => {
                    println!(
                        "- {}  attending {}/{}",
                        ticket.display_name(), counts.attending, counts.registered
                    );
                }
                Ok(ClientEvent::RosterLoaded { counts, .. }) => {
                    println!(
                        "reloaded: attending {} / registered {}",
                        counts.attending, counts.registered
                    );
                }
                Ok(ClientEvent::Error(message)) => warn!("{message}"),
                Err(_) => break,
            },
        }
    }

    view.close().await;
    Ok(())
}
