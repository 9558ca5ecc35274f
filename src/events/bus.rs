//! # Event bus: fan-out with history replay.
//!
//! [`EventBus`] delivers every published [`Event`] to every live
//! [`Subscription`] through a per-subscription bounded queue, and retains a
//! bounded ring of recent events so late subscribers can replay from a
//! caller-supplied timestamp.
//!
//! ## What it guarantees
//! - `publish` never blocks and never fails.
//! - Each subscription receives every event published after its creation,
//!   in publication order, with no drops — until it falls behind.
//! - Timestamps are monotone non-decreasing and `seq` strictly increases.
//!
//! ## Delivery policy
//! A subscription whose queue is full at publication time is
//! **disconnected**: its channel closes, its overflow flag is set, and a
//! warning is logged. Other subscriptions are unaffected. This trades
//! per-subscriber completeness for publisher liveness.
//!
//! ## Replay
//! `subscribe(Some(since))` first enqueues every retained event with
//! `timestamp >= since`, oldest first, then live events. Events that have
//! fallen out of the ring are silently absent from replay.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tokio::sync::mpsc;
use tracing::warn;

use super::event::Event;

struct SubscriberChannel {
    tx: mpsc::Sender<Event>,
    overflowed: Arc<AtomicBool>,
}

struct BusState {
    history: VecDeque<Event>,
    subscribers: HashMap<u64, SubscriberChannel>,
    next_subscriber: u64,
    next_seq: u64,
    last_timestamp: SystemTime,
}

/// Fan-out bus for lifecycle events with bounded history replay.
#[derive(Clone)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
    history_capacity: usize,
    subscriber_capacity: usize,
}

impl EventBus {
    /// Creates a bus retaining `history_capacity` events for replay and
    /// giving each subscription a queue of `subscriber_capacity`.
    pub fn new(history_capacity: usize, subscriber_capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                history: VecDeque::with_capacity(history_capacity),
                subscribers: HashMap::new(),
                next_subscriber: 0,
                next_seq: 0,
                last_timestamp: SystemTime::UNIX_EPOCH,
            })),
            history_capacity: history_capacity.max(1),
            subscriber_capacity: subscriber_capacity.max(1),
        }
    }

    /// Publishes an event: assigns its `seq` and clamped timestamp, appends
    /// it to history, and delivers it to every live subscription.
    ///
    /// Subscriptions that cannot accept the event are disconnected; see the
    /// module docs for the policy.
    pub fn publish(&self, mut event: Event) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        event.seq = state.next_seq;
        state.next_seq += 1;

        let now = SystemTime::now();
        event.timestamp = now.max(state.last_timestamp);
        state.last_timestamp = event.timestamp;

        if state.history.len() == self.history_capacity {
            state.history.pop_front();
        }
        state.history.push_back(event.clone());

        let mut lagging = Vec::new();
        for (id, sub) in &state.subscribers {
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    sub.overflowed.store(true, Ordering::Release);
                    warn!(subscription = id, "disconnecting lagging event subscriber");
                    lagging.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    lagging.push(*id);
                }
            }
        }
        for id in lagging {
            state.subscribers.remove(&id);
        }
    }

    /// Creates a subscription.
    ///
    /// With `since = Some(t)`, retained events with `timestamp >= t` are
    /// delivered first, in original order. `None` means future events only.
    pub fn subscribe(&self, since: Option<SystemTime>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        let overflowed = Arc::new(AtomicBool::new(false));

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let mut replay_ok = true;
        if let Some(since) = since {
            for event in state.history.iter().filter(|e| e.timestamp >= since) {
                if tx.try_send(event.clone()).is_err() {
                    // Replay alone overran the queue; same policy as live
                    // overflow.
                    overflowed.store(true, Ordering::Release);
                    replay_ok = false;
                    break;
                }
            }
        }

        let id = state.next_subscriber;
        state.next_subscriber += 1;
        if replay_ok {
            state.subscribers.insert(
                id,
                SubscriberChannel {
                    tx,
                    overflowed: Arc::clone(&overflowed),
                },
            );
        }

        Subscription {
            id,
            rx,
            overflowed,
            bus: Arc::clone(&self.state),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .subscribers
            .len()
    }
}

/// Receiving side of one bus subscription.
///
/// Dropping the subscription unsubscribes it; the next publish prunes the
/// channel.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Event>,
    overflowed: Arc<AtomicBool>,
    bus: Arc<Mutex<BusState>>,
}

impl Subscription {
    /// Receives the next event. `None` means the subscription is closed:
    /// either the bus is gone or this subscriber was disconnected for
    /// lagging (see [`Subscription::overflowed`]).
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Receives without waiting; `None` when no event is queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// True when this subscription was disconnected because its queue
    /// overflowed.
    pub fn overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut state = self.bus.lock().unwrap_or_else(|e| e.into_inner());
        state.subscribers.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    fn exit(id: &str, status: u32) -> Event {
        Event::new(EventKind::Exit, id).with_status(status)
    }

    #[tokio::test]
    async fn delivers_in_publication_order() {
        let bus = EventBus::new(16, 16);
        let mut a = bus.subscribe(None);
        let mut b = bus.subscribe(None);

        bus.publish(Event::new(EventKind::StartContainer, "c1"));
        bus.publish(exit("c1", 0));

        for sub in [&mut a, &mut b] {
            let first = sub.recv().await.unwrap();
            let second = sub.recv().await.unwrap();
            assert_eq!(first.kind, EventKind::StartContainer);
            assert_eq!(second.kind, EventKind::Exit);
            assert!(first.seq < second.seq);
            assert!(first.timestamp <= second.timestamp);
        }
    }

    #[tokio::test]
    async fn replays_history_from_timestamp() {
        let bus = EventBus::new(16, 16);
        bus.publish(Event::new(EventKind::StartContainer, "c1"));
        bus.publish(Event::new(EventKind::Pause, "c1"));
        bus.publish(Event::new(EventKind::Resume, "c1"));

        // Everything retained.
        let mut sub = bus.subscribe(Some(SystemTime::UNIX_EPOCH));
        let kinds: Vec<_> = [
            sub.try_recv().unwrap().kind,
            sub.try_recv().unwrap().kind,
            sub.try_recv().unwrap().kind,
        ]
        .into();
        assert_eq!(
            kinds,
            vec![EventKind::StartContainer, EventKind::Pause, EventKind::Resume]
        );

        // Future-only sees nothing retained.
        let mut fresh = bus.subscribe(None);
        assert!(fresh.try_recv().is_none());
        bus.publish(exit("c1", 0));
        assert_eq!(fresh.recv().await.unwrap().kind, EventKind::Exit);
    }

    #[tokio::test]
    async fn replay_is_contiguous_with_live_events() {
        let bus = EventBus::new(16, 16);
        bus.publish(Event::new(EventKind::StartContainer, "c1"));
        let mut first = bus.subscribe(Some(SystemTime::UNIX_EPOCH));
        let seen = first.try_recv().unwrap();

        let mut second = bus.subscribe(Some(seen.timestamp));
        bus.publish(exit("c1", 0));

        let replayed = second.recv().await.unwrap();
        let live = second.recv().await.unwrap();
        assert_eq!(replayed.seq, seen.seq);
        assert_eq!(live.kind, EventKind::Exit);
        assert!(replayed.timestamp <= live.timestamp);
    }

    #[tokio::test]
    async fn lagging_subscriber_is_disconnected_others_unaffected() {
        let bus = EventBus::new(16, 1);
        let mut slow = bus.subscribe(None);
        let mut healthy = bus.subscribe(None);

        bus.publish(Event::new(EventKind::StartContainer, "c1"));
        // The slow subscriber's single-slot queue is full now.
        bus.publish(Event::new(EventKind::Pause, "c1"));

        assert_eq!(bus.subscriber_count(), 1);
        assert!(slow.overflowed());
        // The queued event is still readable, then the channel ends.
        assert_eq!(
            slow.recv().await.unwrap().kind,
            EventKind::StartContainer
        );
        assert!(slow.recv().await.is_none());

        // Drain the healthy one to prove it saw both.
        assert_eq!(healthy.recv().await.unwrap().kind, EventKind::StartContainer);
        assert_eq!(healthy.recv().await.unwrap().kind, EventKind::Pause);
        assert!(!healthy.overflowed());
    }

    #[tokio::test]
    async fn history_ring_drops_oldest() {
        let bus = EventBus::new(2, 16);
        bus.publish(Event::new(EventKind::StartContainer, "c1"));
        bus.publish(Event::new(EventKind::Pause, "c1"));
        bus.publish(Event::new(EventKind::Resume, "c1"));

        let mut sub = bus.subscribe(Some(SystemTime::UNIX_EPOCH));
        assert_eq!(sub.try_recv().unwrap().kind, EventKind::Pause);
        assert_eq!(sub.try_recv().unwrap().kind, EventKind::Resume);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn dropped_subscription_is_pruned() {
        let bus = EventBus::new(16, 16);
        let sub = bus.subscribe(None);
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
