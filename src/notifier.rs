//! Room-keyed fan-out of already-committed state changes.
//!
//! Publishing only enqueues. A [`Relay`] task drains the queue and broadcasts each
//! event to the subscribers of its room, so a slow or absent consumer can never
//! hold up the engine. Every event carries the sequence number it was published
//! under, and a subscriber only sees events published after it joined.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RequestCreated {
        request_id: Uuid,
    },
    OfferSubmitted {
        request_id: Uuid,
        offer_id: Uuid,
        driver_id: Uuid,
        price: i64,
    },
    OfferWithdrawn {
        request_id: Uuid,
        offer_id: Uuid,
    },
    OfferAccepted {
        request_id: Uuid,
        offer_id: Uuid,
        price: i64,
        payment_id: Uuid,
    },
    OffersRejected {
        request_id: Uuid,
        count: u64,
    },
    RequestCompleted {
        request_id: Uuid,
    },
    RequestCancelled {
        request_id: Uuid,
    },
}

impl Event {
    /// Nothing is published for a request after its terminal event.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::RequestCompleted { .. } | Event::RequestCancelled { .. }
        )
    }
}

type Sequenced = (u64, Event);
type Rooms = Arc<DashMap<Uuid, broadcast::Sender<Sequenced>>>;

#[derive(Clone, Debug)]
pub struct Notifier {
    rooms: Rooms,
    sequence: Arc<AtomicU64>,
    outbound: async_channel::Sender<(Uuid, Sequenced)>,
    room_buffer: usize,
}

pub struct Relay {
    rooms: Rooms,
    inbound: async_channel::Receiver<(Uuid, Sequenced)>,
}

impl Notifier {
    pub fn new(queue_size: usize, room_buffer: usize) -> (Self, Relay) {
        let (outbound, inbound) = async_channel::bounded(queue_size.max(1));
        let rooms: Rooms = Arc::new(DashMap::new());

        (
            Self {
                rooms: rooms.clone(),
                sequence: Arc::new(AtomicU64::new(0)),
                outbound,
                room_buffer: room_buffer.max(1),
            },
            Relay { rooms, inbound },
        )
    }

    /// Fire-and-forget. Drops the event when the queue is full or the relay is gone.
    pub fn publish(&self, room: Uuid, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        if let Err(err) = self.outbound.try_send((room, (seq, event))) {
            tracing::warn!(room = %room, error = %err, "dropping notification");
        }
    }

    /// Subscribers that fall behind skip the events they missed. The stream ends
    /// once the room's terminal event has been delivered.
    pub fn subscribe(&self, room: Uuid) -> EventStream {
        let joined_at = self.sequence.load(Ordering::SeqCst);
        let receiver = self
            .rooms
            .entry(room)
            .or_insert_with(|| broadcast::channel(self.room_buffer).0)
            .subscribe();

        Box::pin(
            BroadcastStream::new(receiver).filter_map(move |item| match item {
                Ok((seq, event)) if seq > joined_at => Some(event),
                _ => None,
            }),
        )
    }

    /// Forgets the room once its last subscriber is gone.
    pub fn release(&self, room: Uuid) {
        self.rooms
            .remove_if(&room, |_, sender| sender.receiver_count() == 0);
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Relay {
    pub async fn run(self) {
        tracing::info!("notification relay started");

        while let Ok((room, sequenced)) = self.inbound.recv().await {
            self.deliver(room, sequenced);
        }

        tracing::info!("notification relay stopped: queue closed");
    }

    fn deliver(&self, room: Uuid, (seq, event): Sequenced) {
        let terminal = event.is_terminal();

        let delivered = match self.rooms.get(&room) {
            Some(sender) => sender.send((seq, event)).is_ok(),
            None => return,
        };

        if terminal {
            // dropping the sender ends every subscriber stream after this event
            self.rooms.remove(&room);
        } else if !delivered {
            self.rooms
                .remove_if(&room, |_, sender| sender.receiver_count() == 0);
        }
    }
}

#[tokio::test]
async fn relay_delivers_only_to_the_room() {
    let (notifier, relay) = Notifier::new(8, 8);
    tokio::spawn(relay.run());

    let room = Uuid::new_v4();
    let other = Uuid::new_v4();
    let mut stream = notifier.subscribe(room);
    let mut other_stream = notifier.subscribe(other);

    notifier.publish(room, Event::RequestCompleted { request_id: room });

    let event = stream.next().await.unwrap();
    assert_eq!(event, Event::RequestCompleted { request_id: room });

    let nothing =
        tokio::time::timeout(std::time::Duration::from_millis(50), other_stream.next()).await;
    assert!(nothing.is_err());
}

#[tokio::test]
async fn publish_without_relay_never_blocks() {
    let (notifier, _relay) = Notifier::new(1, 1);
    let room = Uuid::new_v4();

    for _ in 0..10 {
        notifier.publish(room, Event::RequestCancelled { request_id: room });
    }
}

#[tokio::test]
async fn subscribers_skip_events_published_before_they_joined() {
    let (notifier, relay) = Notifier::new(8, 8);
    let room = Uuid::new_v4();

    // queued while nobody listens and before the relay runs
    notifier.publish(room, Event::RequestCreated { request_id: room });

    let mut stream = notifier.subscribe(room);
    tokio::spawn(relay.run());

    notifier.publish(
        room,
        Event::OffersRejected {
            request_id: room,
            count: 2,
        },
    );

    let event = stream.next().await.unwrap();
    assert_eq!(
        event,
        Event::OffersRejected {
            request_id: room,
            count: 2
        }
    );
}

#[tokio::test]
async fn terminal_event_closes_the_room() {
    let (notifier, relay) = Notifier::new(8, 8);
    tokio::spawn(relay.run());

    let room = Uuid::new_v4();
    let mut stream = notifier.subscribe(room);
    assert_eq!(notifier.room_count(), 1);

    notifier.publish(room, Event::RequestCompleted { request_id: room });

    assert_eq!(
        stream.next().await,
        Some(Event::RequestCompleted { request_id: room })
    );
    assert_eq!(stream.next().await, None);
    assert_eq!(notifier.room_count(), 0);
}

#[test]
fn released_rooms_without_subscribers_are_forgotten() {
    let (notifier, _relay) = Notifier::new(8, 8);
    let room = Uuid::new_v4();

    let first = notifier.subscribe(room);
    let second = notifier.subscribe(room);

    drop(first);
    notifier.release(room);
    assert_eq!(notifier.room_count(), 1);

    drop(second);
    notifier.release(room);
    assert_eq!(notifier.room_count(), 0);
}

#[test]
fn events_are_tagged_by_type() {
    let request_id = Uuid::nil();
    let json = serde_json::to_value(Event::RequestCreated { request_id }).unwrap();

    assert_eq!(json["type"], "request_created");
    assert_eq!(json["request_id"], request_id.to_string());
}
