//! `tracing` renderer for published lifecycle events.
//!
//! Enabled via [`Config::log_events`](crate::Config::log_events). Runs as
//! an ordinary bus subscription so it exercises the same delivery path as
//! external consumers.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Event, EventBus, EventKind};

/// Spawns a consumer that renders every published event through `tracing`.
pub(crate) fn spawn_event_logger(bus: &EventBus, shutdown: CancellationToken) -> JoinHandle<()> {
    let mut sub = bus.subscribe(None);
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                ev = sub.recv() => match ev {
                    Some(ev) => ev,
                    None => break,
                },
            };
            log_event(&event);
        }
    })
}

fn log_event(event: &Event) {
    match event.kind {
        EventKind::Exit => info!(
            container = %event.id,
            process = %event.process_id,
            status = event.status,
            "exit"
        ),
        EventKind::StartProcess => info!(
            container = %event.id,
            process = %event.process_id,
            "start-process"
        ),
        kind => info!(container = %event.id, "{kind}"),
    }
}
