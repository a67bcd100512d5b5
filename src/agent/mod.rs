//! Browser Agent
//!
//! A long-lived client of the push channel. It keeps one WebSocket open
//! to `/ws`, reconnecting forever with a fixed delay, and on every
//! `reload` points the preview tab at a freshly cache-busted view URL.
//!
//! ```text
//! Disconnected --attempt--> Connecting --ok--> Connected
//!      ^                        |                  |
//!      +------ wait 3s ---------+---close/error----+
//! ```
//!
//! Only the shutdown channel ends the loop.

mod cdp;
mod tabs;

#[cfg(test)]
pub(crate) mod tests;

pub use cdp::CdpTabs;
pub use tabs::{Reconciled, TabError, TabHandle, TabManager, cache_bust, matches_view, reconcile};

use std::io;
use std::net::TcpStream;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use thiserror::Error;
use tungstenite::{Message, WebSocket};
use url::Url;

use crate::reload::message::PushMessage;
use crate::{debug, log};

/// Delay between connection attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(3);

/// How long a read blocks before the shutdown channel is checked again.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection state, published on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Disconnected,
    Connecting,
    Connected,
}

/// Push-channel transport failure. Recovered by reconnecting.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid push channel address `{0}`")]
    Address(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error(transparent)]
    Transport(#[from] tungstenite::Error),
}

/// A push message that is not valid JSON or lacks a `type`.
#[derive(Debug, Error)]
#[error("malformed push message `{raw}`")]
pub struct MalformedMessageError {
    pub raw: String,
    #[source]
    pub source: serde_json::Error,
}

/// Reconnecting push-channel client driving a [`TabManager`].
pub struct BrowserAgent<T: TabManager> {
    ws_url: String,
    view_url: Url,
    tabs: T,
    retry_delay: Duration,
    state: AgentState,
    state_tx: Option<Sender<AgentState>>,
    shutdown_rx: Receiver<()>,
    stopping: bool,
}

impl<T: TabManager> BrowserAgent<T> {
    /// `ws_url` is the push endpoint, `view_url` the artifact endpoint.
    pub fn new(ws_url: &str, view_url: Url, tabs: T, shutdown_rx: Receiver<()>) -> Self {
        Self {
            ws_url: ws_url.to_string(),
            view_url,
            tabs,
            retry_delay: RETRY_DELAY,
            state: AgentState::Disconnected,
            state_tx: None,
            shutdown_rx,
            stopping: false,
        }
    }

    /// Agent for the server behind `view_url`; the push channel is `/ws` on the same origin.
    ///
    /// Build `view_url` the way the browser opener does, not from the bind
    /// address, so the tab it opened matches.
    pub fn for_view(
        view_url: Url,
        tabs: T,
        shutdown_rx: Receiver<()>,
    ) -> Result<Self, ConnectionError> {
        let ws_url = push_url(&view_url)?;
        Ok(Self::new(ws_url.as_str(), view_url, tabs, shutdown_rx))
    }

    /// Override the reconnect delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Publish state transitions on `tx`.
    pub fn with_state_channel(mut self, tx: Sender<AgentState>) -> Self {
        self.state_tx = Some(tx);
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn tabs(&self) -> &T {
        &self.tabs
    }

    /// Connect, serve, reconnect. Returns only on shutdown (blocking).
    pub fn run(mut self) -> T {
        loop {
            if self.shutdown_requested() {
                break;
            }

            self.set_state(AgentState::Connecting);
            match self.connect() {
                Ok(ws) => {
                    self.set_state(AgentState::Connected);
                    if let Err(e) = self.session(ws) {
                        debug!("agent"; "connection lost: {}", e);
                    }
                }
                Err(e) => debug!("agent"; "connect to {} failed: {}", self.ws_url, e),
            }

            self.set_state(AgentState::Disconnected);
            if self.stopping {
                break;
            }
            match self.shutdown_rx.recv_timeout(self.retry_delay) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.tabs
    }

    fn connect(&self) -> Result<WebSocket<TcpStream>, ConnectionError> {
        let ws = open_socket(&self.ws_url, CONNECT_TIMEOUT)?;
        // Short reads so shutdown is noticed while idle
        ws.get_ref().set_read_timeout(Some(POLL_INTERVAL))?;
        Ok(ws)
    }

    /// Read until the connection closes or shutdown is requested.
    fn session(&mut self, mut ws: WebSocket<TcpStream>) -> Result<(), ConnectionError> {
        loop {
            if self.shutdown_requested() {
                let _ = ws.close(None);
                let _ = ws.flush();
                return Ok(());
            }

            match ws.read() {
                Ok(Message::Text(text)) => {
                    if let Err(e) = self.handle_text(text.as_str()) {
                        log!("agent"; "{}", e);
                    }
                }
                Ok(Message::Close(_)) | Err(tungstenite::Error::ConnectionClosed) => return Ok(()),
                // Pings are answered by tungstenite on the next read
                Ok(_) => {}
                Err(tungstenite::Error::Io(e))
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    // Idle; push out any queued pong
                    ws.flush()?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Act on one text frame. Unknown types are ignored.
    pub fn handle_text(&mut self, text: &str) -> Result<(), MalformedMessageError> {
        let message = PushMessage::parse(text).map_err(|source| MalformedMessageError {
            raw: text.chars().take(80).collect(),
            source,
        })?;

        match message {
            PushMessage::Reload => match reconcile(&mut self.tabs, &self.view_url, unix_millis()) {
                Ok(Reconciled::Reused(tab)) => debug!("agent"; "reloaded tab {}", tab.id),
                Ok(Reconciled::Created(tab)) => debug!("agent"; "opened tab {}", tab.id),
                Err(e) => log!("agent"; "tab update failed: {}", e),
            },
            other => debug!("agent"; "ignoring {:?}", other),
        }
        Ok(())
    }

    fn set_state(&mut self, state: AgentState) {
        if self.state == state {
            return;
        }
        self.state = state;
        if let Some(tx) = &self.state_tx {
            let _ = tx.send(state);
        }
    }

    fn shutdown_requested(&mut self) -> bool {
        if !self.stopping {
            self.stopping = matches!(
                self.shutdown_rx.try_recv(),
                Ok(()) | Err(TryRecvError::Disconnected)
            );
        }
        self.stopping
    }
}

/// The `/ws` endpoint on the origin of `view_url`.
pub fn push_url(view_url: &Url) -> Result<Url, ConnectionError> {
    let mut url = view_url.clone();
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|()| ConnectionError::Address(view_url.to_string()))?;
    url.set_path("/ws");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Open a plain WebSocket client connection to `ws_url`.
///
/// Every resolved address is tried in turn (`localhost` may resolve to
/// `::1` first while the server listens on IPv4 only).
pub(crate) fn open_socket(
    ws_url: &str,
    timeout: Duration,
) -> Result<WebSocket<TcpStream>, ConnectionError> {
    let address = || ConnectionError::Address(ws_url.to_string());
    let url = Url::parse(ws_url).map_err(|_| address())?;

    let mut last_err = None;
    let mut stream = None;
    for addr in url.socket_addrs(|| None)? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(e) => last_err = Some(e),
        }
    }
    let stream = match (stream, last_err) {
        (Some(stream), _) => stream,
        (None, Some(e)) => return Err(e.into()),
        (None, None) => return Err(address()),
    };

    stream.set_read_timeout(Some(timeout))?;
    let (ws, _) = tungstenite::client(ws_url, stream)
        .map_err(|e| ConnectionError::Handshake(e.to_string()))?;
    Ok(ws)
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
