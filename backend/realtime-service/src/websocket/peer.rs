/// Peer handles
///
/// A peer handle is the write side of one live connection. The registries only
/// ever talk to peers through [`PeerHandle`], so the transport (an actix
/// WebSocket session) and test doubles are interchangeable.
use actix::Message;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerError {
    #[error("peer connection closed")]
    Closed,

    #[error("peer write timed out after {0:?}")]
    TimedOut(Duration),
}

/// Write side of a single live connection
#[async_trait]
pub trait PeerHandle: Send + Sync {
    /// Attempt a single write of an already encoded frame
    async fn send_frame(&self, frame: &str) -> Result<(), PeerError>;

    /// Ask the transport to close the connection. Never fails.
    fn close(&self);
}

/// Command forwarded from a [`ChannelPeer`] to its session actor
#[derive(Debug, Clone, PartialEq, Eq, Message)]
#[rtype(result = "()")]
pub enum SessionCommand {
    Frame(String),
    Close,
}

/// Peer handle backed by a bounded queue drained by a session actor
///
/// A full queue makes `send_frame` wait (slow peer); a dropped receiver makes
/// it fail (dead peer). Close requests bypass the queue, so a backed-up peer
/// can still be closed.
#[derive(Clone)]
pub struct ChannelPeer {
    tx: mpsc::Sender<SessionCommand>,
    close_tx: Arc<watch::Sender<bool>>,
}

impl ChannelPeer {
    pub fn channel(buffer: usize) -> (Self, PeerReceiver) {
        let (tx, frames) = mpsc::channel(buffer.max(1));
        let (close_tx, closed) = watch::channel(false);
        let peer = Self {
            tx,
            close_tx: Arc::new(close_tx),
        };
        let rx = PeerReceiver {
            frames,
            closed,
            close_delivered: false,
        };
        (peer, rx)
    }
}

#[async_trait]
impl PeerHandle for ChannelPeer {
    async fn send_frame(&self, frame: &str) -> Result<(), PeerError> {
        self.tx
            .send(SessionCommand::Frame(frame.to_string()))
            .await
            .map_err(|_| PeerError::Closed)
    }

    fn close(&self) {
        self.close_tx.send_replace(true);
    }
}

/// Read side of a [`ChannelPeer`]
///
/// A pending close is yielded ahead of any queued frames, exactly once;
/// after that the receiver is exhausted.
pub struct PeerReceiver {
    frames: mpsc::Receiver<SessionCommand>,
    closed: watch::Receiver<bool>,
    close_delivered: bool,
}

impl PeerReceiver {
    pub async fn recv(&mut self) -> Option<SessionCommand> {
        if self.close_delivered {
            return None;
        }
        if *self.closed.borrow_and_update() {
            return Some(self.deliver_close());
        }

        tokio::select! {
            biased;
            changed = self.closed.changed() => match changed {
                Ok(()) => Some(self.deliver_close()),
                // Handle dropped without closing: drain what is left
                Err(_) => self.frames.recv().await,
            },
            command = self.frames.recv() => command,
        }
    }

    pub fn try_recv(&mut self) -> Option<SessionCommand> {
        if self.close_delivered {
            return None;
        }
        if *self.closed.borrow() {
            return Some(self.deliver_close());
        }
        self.frames.try_recv().ok()
    }

    fn deliver_close(&mut self) -> SessionCommand {
        self.close_delivered = true;
        self.frames.close();
        SessionCommand::Close
    }
}

/// Outcome of one fan-out call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub evicted: usize,
}

impl DeliveryReport {
    pub fn record(&mut self, delivered: bool) {
        self.attempted += 1;
        if delivered {
            self.delivered += 1;
        } else {
            self.evicted += 1;
        }
    }
}

/// Write a frame, bounded by an optional deadline
pub(crate) async fn write_with_deadline(
    handle: &dyn PeerHandle,
    frame: &str,
    deadline: Option<Duration>,
) -> Result<(), PeerError> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, handle.send_frame(frame))
            .await
            .unwrap_or(Err(PeerError::TimedOut(limit))),
        None => handle.send_frame(frame).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_peer_forwards_frames() {
        let (peer, mut rx) = ChannelPeer::channel(4);
        peer.send_frame(r#"{"event":"x","data":null}"#).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(SessionCommand::Frame(r#"{"event":"x","data":null}"#.to_string()))
        );
    }

    #[tokio::test]
    async fn test_channel_peer_fails_after_receiver_dropped() {
        let (peer, rx) = ChannelPeer::channel(4);
        drop(rx);

        assert_eq!(peer.send_frame("{}").await, Err(PeerError::Closed));
    }

    #[tokio::test]
    async fn test_close_is_delivered_once() {
        let (peer, mut rx) = ChannelPeer::channel(4);
        peer.close();
        peer.close();

        assert_eq!(rx.recv().await, Some(SessionCommand::Close));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_close_overtakes_full_queue() {
        let (peer, mut rx) = ChannelPeer::channel(1);
        peer.send_frame("backlog").await.unwrap();
        peer.close();

        assert_eq!(rx.try_recv(), Some(SessionCommand::Close));
        assert_eq!(rx.try_recv(), None);
        assert_eq!(peer.send_frame("late").await, Err(PeerError::Closed));
    }

    #[tokio::test]
    async fn test_pending_recv_wakes_on_close() {
        let (peer, mut rx) = ChannelPeer::channel(1);
        let waiter = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;
        peer.close();

        assert_eq!(waiter.await.unwrap(), Some(SessionCommand::Close));
    }

    #[tokio::test]
    async fn test_dropped_handle_drains_queue_then_ends() {
        let (peer, mut rx) = ChannelPeer::channel(2);
        peer.send_frame("a").await.unwrap();
        drop(peer);

        assert_eq!(rx.recv().await, Some(SessionCommand::Frame("a".to_string())));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_deadline_turns_full_queue_into_failure() {
        let (peer, _rx) = ChannelPeer::channel(1);
        peer.send_frame("first").await.unwrap();

        let result =
            write_with_deadline(&peer, "second", Some(Duration::from_millis(20))).await;
        assert_eq!(result, Err(PeerError::TimedOut(Duration::from_millis(20))));
    }

    #[test]
    fn test_delivery_report_record() {
        let mut report = DeliveryReport::default();
        report.record(true);
        report.record(false);
        report.record(true);

        assert_eq!(
            report,
            DeliveryReport {
                attempted: 3,
                delivered: 2,
                evicted: 1
            }
        );
    }
}
