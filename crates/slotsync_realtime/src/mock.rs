// --- File: crates/slotsync_realtime/src/mock.rs ---
//! In-memory transport for tests: records what the client sends and lets the
//! test play the server side.

use std::future::pending;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use slotsync_common::{BoxFuture, SlotSyncError};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::transport::{Outgoing, Transport, TransportEvent, TransportLink};

struct MockLink {
    outbound: mpsc::UnboundedReceiver<Outgoing>,
    inbound: mpsc::UnboundedSender<TransportEvent>,
    sent: Vec<Outgoing>,
}

#[derive(Default)]
struct MockState {
    failures_remaining: usize,
    hangs_remaining: usize,
    attempts: Vec<Instant>,
    links: Vec<MockLink>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next `count` handshakes fail.
    pub fn fail_next(&self, count: usize) {
        self.lock().failures_remaining = count;
    }

    /// The next `count` handshakes never complete.
    pub fn hang_next(&self, count: usize) {
        self.lock().hangs_remaining = count;
    }

    /// Every handshake fails until `fail_next(0)`.
    pub fn fail_always(&self) {
        self.fail_next(usize::MAX);
    }

    /// Instants of every handshake attempt, successful or not.
    pub fn attempts(&self) -> Vec<Instant> {
        self.lock().attempts.clone()
    }

    /// Number of links successfully opened.
    pub fn link_count(&self) -> usize {
        self.lock().links.len()
    }

    /// Delivers a text frame on the most recent link.
    pub fn push_text(&self, text: &str) {
        if let Some(link) = self.lock().links.last() {
            let _ = link.inbound.send(TransportEvent::Text(text.to_string()));
        }
    }

    /// Closes the most recent link from the server side.
    pub fn close_remote(&self, code: u16) {
        if let Some(link) = self.lock().links.last() {
            let _ = link.inbound.send(TransportEvent::Closed { code });
        }
    }

    /// Everything the client wrote on link `index` (0-based, in open order).
    pub fn sent_on(&self, index: usize) -> Vec<Outgoing> {
        let mut state = self.lock();
        match state.links.get_mut(index) {
            Some(link) => {
                while let Ok(frame) = link.outbound.try_recv() {
                    link.sent.push(frame);
                }
                link.sent.clone()
            }
            None => Vec::new(),
        }
    }

    /// Text frames written on link `index`.
    pub fn texts_on(&self, index: usize) -> Vec<String> {
        self.sent_on(index)
            .into_iter()
            .filter_map(|frame| match frame {
                Outgoing::Text(text) => Some(text),
                Outgoing::Close { .. } => None,
            })
            .collect()
    }
}

impl Transport for MockTransport {
    fn open(&self, _url: &str) -> BoxFuture<'_, TransportLink, SlotSyncError> {
        Box::pin(async move {
            let hang = {
                let mut state = self.lock();
                state.attempts.push(Instant::now());
                let hang = state.hangs_remaining > 0;
                if hang {
                    state.hangs_remaining -= 1;
                }
                hang
            };
            if hang {
                return pending().await;
            }

            let mut state = self.lock();
            if state.failures_remaining > 0 {
                state.failures_remaining -= 1;
                return Err(SlotSyncError::ConnectionError(
                    "mock handshake refused".to_string(),
                ));
            }

            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            state.links.push(MockLink {
                outbound: out_rx,
                inbound: in_tx,
                sent: Vec::new(),
            });
            Ok(TransportLink {
                outbound: out_tx,
                inbound: in_rx,
            })
        })
    }
}
