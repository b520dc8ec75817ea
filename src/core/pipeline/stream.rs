//! Item streams connecting adjacent stages.
//!
//! A stream is a crossbeam channel. It is closed once every [`ItemSender`]
//! for it has been dropped; the receiving side then drains what is left and
//! sees the end of input.

use crate::error::StageError;
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A value travelling between stages
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Item {
    /// A scalar input value
    Number(i64),
    /// A digest or any other string value
    Text(String),
}

impl Item {
    /// Shape name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Item::Number(_) => "number",
            Item::Text(_) => "text",
        }
    }

    /// Take the string payload, failing with a shape error for `stage`
    pub fn into_text(self, stage: &str) -> Result<String, StageError> {
        match self {
            Item::Text(text) => Ok(text),
            other => Err(StageError::UnexpectedItem {
                stage: stage.to_string(),
                expected: "text",
                found: other.kind(),
            }),
        }
    }

    /// Canonical string form of a scalar item
    pub fn into_canonical(self) -> String {
        match self {
            Item::Number(n) => n.to_string(),
            Item::Text(text) => text,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Number(n) => write!(f, "{n}"),
            Item::Text(text) => f.write_str(text),
        }
    }
}

impl From<i64> for Item {
    fn from(value: i64) -> Self {
        Item::Number(value)
    }
}

impl From<String> for Item {
    fn from(value: String) -> Self {
        Item::Text(value)
    }
}

impl From<&str> for Item {
    fn from(value: &str) -> Self {
        Item::Text(value.to_string())
    }
}

/// Writing end of a stream, owned by the producing stage.
///
/// Cloning is how a stage hands the stream to its item workers. The stream
/// closes when the last clone is dropped.
#[derive(Clone)]
pub struct ItemSender {
    inner: Sender<Item>,
    stage: Arc<str>,
    sent: Arc<AtomicUsize>,
}

impl ItemSender {
    /// Push an item downstream, blocking while the stream is full.
    pub fn send(&self, item: impl Into<Item>) -> Result<(), StageError> {
        self.inner
            .send(item.into())
            .map_err(|_| StageError::DownstreamClosed {
                stage: self.stage.to_string(),
            })?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Items successfully sent through any clone of this sender
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }

    /// Shared handle on the sent counter that does not keep the stream open
    pub(crate) fn sent_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.sent)
    }
}

/// Reading end of a stream, owned by the consuming stage
pub struct ItemReceiver {
    inner: Receiver<Item>,
}

impl ItemReceiver {
    /// Block until the next item, or `None` once the stream is closed and
    /// drained.
    pub fn recv(&self) -> Option<Item> {
        self.inner.recv().ok()
    }

    /// Iterate until the stream is closed and drained
    pub fn iter(&self) -> impl Iterator<Item = Item> + '_ {
        self.inner.iter()
    }
}

impl IntoIterator for ItemReceiver {
    type Item = Item;
    type IntoIter = crossbeam_channel::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

/// Create a stream written by `stage`.
///
/// `capacity` of 0 makes every send a rendezvous with the receiver.
pub fn stream(stage: &str, capacity: usize) -> (ItemSender, ItemReceiver) {
    let (sender, receiver) = bounded(capacity);
    (
        ItemSender {
            inner: sender,
            stage: Arc::from(stage),
            sent: Arc::new(AtomicUsize::new(0)),
        },
        ItemReceiver { inner: receiver },
    )
}

/// A stream that is already closed and empty
pub fn closed_stream() -> ItemReceiver {
    let (_, receiver) = stream("closed", 0);
    receiver
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn items_flow_until_sender_drops() {
        let (tx, rx) = stream("test", 2);
        let producer = thread::spawn(move || {
            tx.send(1_i64).unwrap();
            tx.send("two").unwrap();
        });

        let items: Vec<Item> = rx.iter().collect();
        producer.join().unwrap();

        assert_eq!(items, vec![Item::Number(1), Item::Text("two".to_string())]);
    }

    #[test]
    fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = stream("source", 0);
        drop(rx);

        let err = tx.send(1_i64).unwrap_err();
        assert!(err.is_downstream_closed());
        assert!(err.to_string().contains("source"));
        assert_eq!(tx.sent(), 0);
    }

    #[test]
    fn clones_share_the_sent_counter() {
        let (tx, rx) = stream("counter", 4);
        let clone = tx.clone();
        tx.send(1_i64).unwrap();
        clone.send(2_i64).unwrap();
        assert_eq!(tx.sent(), 2);
        drop(clone);
        drop(tx);

        assert_eq!(rx.iter().count(), 2);
    }

    #[test]
    fn closed_stream_yields_nothing() {
        let rx = closed_stream();
        assert!(rx.recv().is_none());
    }

    #[test]
    fn into_text_rejects_numbers() {
        let err = Item::Number(3).into_text("multi_hash").unwrap_err();
        assert!(matches!(
            err,
            StageError::UnexpectedItem { expected: "text", found: "number", .. }
        ));
        assert_eq!(Item::from("x").into_text("any").unwrap(), "x");
    }

    #[test]
    fn canonical_form_of_numbers_is_decimal() {
        assert_eq!(Item::Number(-12).into_canonical(), "-12");
        assert_eq!(Item::from("abc").into_canonical(), "abc");
    }
}
