//! Per-draw event fan-out for live subscribers.
//!
//! One bounded broadcast channel per draw id. Emission is synchronous and
//! never waits on consumers: a subscriber that falls more than the channel
//! capacity behind loses its oldest events (`RecvError::Lagged`), and a
//! channel with no subscribers drops events on the floor — exactly the
//! contract the pipeline requires from its sink.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::broadcast;

use chainmix_core::{DrawEvent, EventSink};

/// Channel name for cross-draw announcements (the "current draw" feed).
pub const CURRENT_CHANNEL: &str = "__current__";

/// Events buffered per subscriber before drop-oldest kicks in.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
pub struct StreamHub {
    channels: Mutex<HashMap<String, broadcast::Sender<Value>>>,
}

impl StreamHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one draw's event feed (or to [`CURRENT_CHANNEL`]).
    pub fn subscribe(&self, draw_id: &str) -> broadcast::Receiver<Value> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(draw_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Announce a new current draw id on the global channel.
    pub fn announce_current(&self, draw_id: &str) {
        self.emit(
            CURRENT_CHANNEL,
            &DrawEvent::Current {
                draw_id: draw_id.to_string(),
            },
        );
    }

    fn publish(&self, channel: &str, value: Value) {
        let mut channels = self.channels.lock().unwrap();
        if let Some(sender) = channels.get(channel) {
            if sender.send(value).is_err() {
                // Nobody is listening anymore; reclaim the slot.
                channels.remove(channel);
            }
        }
    }
}

impl EventSink for StreamHub {
    fn emit(&self, draw_id: &str, event: &DrawEvent) {
        self.publish(draw_id, event.to_json(draw_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_in_order() {
        let hub = StreamHub::new();
        let mut rx = hub.subscribe("d");
        hub.emit(
            "d",
            &DrawEvent::Commit {
                blocks: 3,
                source: "SOLANA".into(),
            },
        );
        hub.emit(
            "d",
            &DrawEvent::BlockWaiting {
                note: "fetching".into(),
            },
        );

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first["type"], "commit");
        assert_eq!(first["drawId"], "d");
        assert_eq!(second["type"], "block.waiting");
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_does_not_block() {
        let hub = StreamHub::new();
        // Never subscribed: events vanish, emission stays non-blocking.
        for _ in 0..10_000 {
            hub.emit(
                "nobody",
                &DrawEvent::CollectTick {
                    remaining_ms: 1,
                    bytes: 0,
                },
            );
        }
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_oldest() {
        let hub = StreamHub::new();
        let mut rx = hub.subscribe("d");
        for i in 0..(CHANNEL_CAPACITY + 50) {
            hub.emit(
                "d",
                &DrawEvent::CollectTick {
                    remaining_ms: i as u64,
                    bytes: 0,
                },
            );
        }
        // The reader lagged; the oldest events are gone, not the producer.
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(n)) => assert!(n >= 50),
            other => panic!("expected lag, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let hub = StreamHub::new();
        let mut rx_a = hub.subscribe("a");
        let _rx_b = hub.subscribe("b");
        hub.emit(
            "b",
            &DrawEvent::MixStart {
                inputs: vec!["PUB".into()],
            },
        );
        hub.emit(
            "a",
            &DrawEvent::MixStart {
                inputs: vec!["PUB".into()],
            },
        );
        let got = rx_a.recv().await.unwrap();
        assert_eq!(got["drawId"], "a");
    }

    #[tokio::test]
    async fn test_current_announcement() {
        let hub = StreamHub::new();
        let mut rx = hub.subscribe(CURRENT_CHANNEL);
        hub.announce_current("auto-17");
        let got = rx.recv().await.unwrap();
        assert_eq!(got["type"], "current");
        assert_eq!(got["drawId"], "auto-17");
    }
}
