//! The connection set: one record, outbox and writer thread per peer.

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tungstenite::protocol::{Message, Role};
use tungstenite::WebSocket;

use crate::debug;
use crate::reload::message::PushMessage;

/// Messages queued per peer before it counts as dead.
pub const OUTBOX_CAPACITY: usize = 16;

/// Idle time before the writer pings its peer.
pub const PING_INTERVAL: Duration = Duration::from_secs(20);

/// A byte stream the server can speak WebSocket over.
pub trait Duplex: Read + Write + Send {}

impl<T: Read + Write + Send> Duplex for T {}

/// Box any upgraded stream.
pub fn into_duplex<S: Read + Write + Send + 'static>(stream: S) -> Box<dyn Duplex> {
    Box::new(stream)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub id: u64,
    pub state: ConnectionState,
}

/// Lifecycle report from a writer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEvent {
    /// Greeting delivered
    Opened(u64),
    /// Writer exited; the peer is gone
    Closed(u64),
}

struct Peer {
    record: ConnectionRecord,
    outbox: Sender<Message>,
}

/// All push-channel connections. Owned by a single `WsActor`.
pub struct Peers {
    peers: FxHashMap<u64, Peer>,
    next_id: u64,
    capacity: usize,
    /// Writer threads report open and close here
    events_tx: mpsc::UnboundedSender<PeerEvent>,
}

impl Peers {
    pub fn new(events_tx: mpsc::UnboundedSender<PeerEvent>) -> Self {
        Self::with_capacity(events_tx, OUTBOX_CAPACITY)
    }

    pub fn with_capacity(events_tx: mpsc::UnboundedSender<PeerEvent>, capacity: usize) -> Self {
        Self {
            peers: FxHashMap::default(),
            next_id: 1,
            capacity,
            events_tx,
        }
    }

    /// Register an upgraded stream and start its writer.
    ///
    /// The writer thread sends the greeting, then reports `Opened`. The
    /// record stays `Connecting` until [`Peers::mark_open`] sees that.
    pub fn add(&mut self, stream: Box<dyn Duplex>) -> ConnectionRecord {
        let id = self.next_id;
        self.next_id += 1;

        let (outbox, inbox) = channel::bounded(self.capacity);
        let record = ConnectionRecord {
            id,
            state: ConnectionState::Connecting,
        };
        self.peers.insert(id, Peer { record, outbox });

        let events_tx = self.events_tx.clone();
        thread::spawn(move || {
            let mut ws = WebSocket::from_raw_socket(stream, Role::Server, None);
            let greeting = Message::Text(PushMessage::connected().to_json().into());
            match ws.send(greeting) {
                Ok(()) => {
                    let _ = events_tx.send(PeerEvent::Opened(id));
                    writer_loop(&mut ws, &inbox);
                }
                Err(e) => debug!("ws"; "client {} failed greeting: {}", id, e),
            }
            let _ = events_tx.send(PeerEvent::Closed(id));
        });

        debug!("ws"; "client {} connecting (total: {})", id, self.peers.len());
        record
    }

    /// The writer delivered the greeting.
    pub fn mark_open(&mut self, id: u64) {
        if let Some(peer) = self.peers.get_mut(&id) {
            peer.record.state = ConnectionState::Open;
        }
    }

    /// Queue `msg` for every live peer. Returns how many accepted it.
    ///
    /// Connecting peers are included: their writer sends the greeting
    /// before anything queued. Peers with a full or disconnected outbox
    /// are closed and dropped.
    pub fn broadcast(&mut self, msg: &PushMessage) -> usize {
        if self.peers.is_empty() {
            debug!("ws"; "no clients connected");
            return 0;
        }

        let text = msg.to_json();
        let mut sent = 0;
        self.peers.retain(|id, peer| {
            if peer.record.state == ConnectionState::Closed {
                return true;
            }
            match peer.outbox.try_send(Message::Text(text.clone().into())) {
                Ok(()) => {
                    sent += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    debug!("ws"; "client {} is not keeping up, dropping", id);
                    peer.record.state = ConnectionState::Closed;
                    false
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("ws"; "client {} disconnected", id);
                    peer.record.state = ConnectionState::Closed;
                    false
                }
            }
        });
        debug!("ws"; "broadcast to {} clients", sent);
        sent
    }

    /// Forget a peer whose writer has exited.
    pub fn remove(&mut self, id: u64) {
        if self.peers.remove(&id).is_some() {
            debug!("ws"; "client {} closed (total: {})", id, self.peers.len());
        }
    }

    /// Drop every outbox; writers send a close frame and exit.
    pub fn close_all(&mut self) {
        self.peers.clear();
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn records(&self) -> Vec<ConnectionRecord> {
        let mut records: Vec<_> = self.peers.values().map(|p| p.record).collect();
        records.sort_by_key(|r| r.id);
        records
    }
}

/// Deliver queued messages, pinging while idle, until a write fails
/// or the outbox is dropped.
fn writer_loop(ws: &mut WebSocket<Box<dyn Duplex>>, inbox: &Receiver<Message>) {
    loop {
        let msg = match inbox.recv_timeout(PING_INTERVAL) {
            Ok(msg) => msg,
            Err(RecvTimeoutError::Timeout) => Message::Ping(Default::default()),
            Err(RecvTimeoutError::Disconnected) => {
                let _ = ws.close(None);
                let _ = ws.flush();
                return;
            }
        };
        if let Err(e) = ws.send(msg) {
            debug!("ws"; "write failed: {}", e);
            return;
        }
    }
}
