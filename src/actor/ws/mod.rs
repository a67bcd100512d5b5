//! WebSocket Actor - Push Channel
//!
//! This actor is responsible for:
//! - Registering upgraded connections (their writers send the greeting)
//! - Broadcasting `reload` to every open connection
//! - Removing connections whose writer failed
//!
//! # Architecture
//!
//! ```text
//! HTTP /ws --AddClient--> WsActor --outbox--> writer thread --> agent
//! Orchestrator --Reload--/    ^                    |
//!                             +---opened/closed----+
//! ```
//!
//! Each peer has its own bounded outbox, so a slow or dead agent never
//! delays delivery to the others.

mod connection;


pub use connection::{
    ConnectionRecord, ConnectionState, Duplex, OUTBOX_CAPACITY, PING_INTERVAL, PeerEvent, Peers,
    into_duplex,
};

use tokio::sync::mpsc;

use super::messages::WsMsg;
use crate::reload::message::PushMessage;

/// WebSocket Actor - sole owner of the connection set
pub struct WsActor {
    /// Channel to receive messages
    rx: mpsc::Receiver<WsMsg>,
    /// Open and close reports from writer threads
    events_rx: mpsc::UnboundedReceiver<PeerEvent>,
    peers: Peers,
}

impl WsActor {
    /// Create a new WsActor
    pub fn new(rx: mpsc::Receiver<WsMsg>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            rx,
            events_rx,
            peers: Peers::new(events_tx),
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(WsMsg::AddClient(stream)) => {
                        self.peers.add(stream);
                    }
                    Some(WsMsg::Reload) => {
                        self.peers.broadcast(&PushMessage::Reload);
                    }
                    Some(WsMsg::Shutdown) | None => {
                        crate::debug!("ws"; "shutting down");
                        self.peers.close_all();
                        break;
                    }
                },
                Some(event) = self.events_rx.recv() => match event {
                    PeerEvent::Opened(id) => self.peers.mark_open(id),
                    PeerEvent::Closed(id) => self.peers.remove(id),
                },
            }
        }
    }
}

/// Handle the Orchestrator uses to trigger a broadcast.
#[derive(Clone)]
pub struct ReloadNotifier {
    tx: mpsc::Sender<WsMsg>,
}

impl ReloadNotifier {
    pub fn new(tx: mpsc::Sender<WsMsg>) -> Self {
        Self { tx }
    }

    /// Broadcast `{"type":"reload"}`. Best-effort: no acknowledgment.
    pub async fn notify(&self) {
        if self.tx.send(WsMsg::Reload).await.is_err() {
            crate::debug!("ws"; "reload dropped, actor stopped");
        }
    }
}
