use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use client_core::{
    resolve_endpoint, ConnectOutcome, ConnectionState, SessionController, SessionEvent,
    SessionOptions, UnknownFieldPolicy,
};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod render;

/// Follows a voice agent session and prints the form it fills in.
#[derive(Parser, Debug)]
#[command(name = "voice-form-console")]
struct Args {
    /// Voice agent WebSocket endpoint; http(s) URLs are mapped to ws(s).
    #[arg(long, env = "VOICE_AGENT_URL")]
    endpoint: Option<String>,
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,
    /// What to do with updates for fields the open form does not declare.
    #[arg(long, default_value = "store")]
    unknown_fields: UnknownFieldPolicy,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    let args = Args::parse();

    let endpoint = resolve_endpoint(args.endpoint.as_deref());
    let controller = SessionController::websocket(SessionOptions {
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        unknown_field_policy: args.unknown_fields,
        ..SessionOptions::default()
    });
    let mut events = controller.subscribe_events();

    println!("Connecting to {endpoint} ...");
    match controller.connect(&endpoint).await {
        ConnectOutcome::Connected => {}
        ConnectOutcome::Failed(reason) => bail!("could not reach voice agent: {reason}"),
        other => bail!("connect did not complete: {other:?}"),
    }
    discard_queued(&mut events);
    println!("{}", render::render_state(&controller.state().await));
    let mut events = BroadcastStream::new(events);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Disconnecting ...");
                controller.disconnect().await;
                break;
            }
            event = events.next() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(lagged) => {
                        warn!(%lagged, "console fell behind; redrawing from current state");
                        println!("{}", render::render_state(&controller.state().await));
                        continue;
                    }
                };
                match event {
                    SessionEvent::StateChanged { state, error } => {
                        println!("{}", render::render_connection(state, error.as_deref()));
                        if matches!(state, ConnectionState::Idle | ConnectionState::Error) {
                            break;
                        }
                    }
                    SessionEvent::FormChanged(form) => {
                        println!("{}", render::render_form(&form));
                    }
                    SessionEvent::UpdateRejected { field_name } => {
                        println!("Ignored update for undeclared field '{field_name}'");
                    }
                    SessionEvent::Inbound(message) => {
                        debug!(kind = message.kind(), "agent message");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Drops events that the snapshot rendered right after already covers.
fn discard_queued(events: &mut broadcast::Receiver<SessionEvent>) {
    loop {
        match events.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
