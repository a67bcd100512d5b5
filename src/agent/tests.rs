use std::net::TcpListener;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tungstenite::Message;
use url::Url;

use super::*;

/// In-memory tab strip. Clones share the same tabs.
#[derive(Clone, Default)]
pub(crate) struct MemoryTabs {
    inner: Arc<Mutex<MemoryTabsInner>>,
}

#[derive(Default)]
struct MemoryTabsInner {
    tabs: Vec<TabHandle>,
    next_id: u64,
    focused_window: Option<u64>,
    /// Make the next `update` fail as if the tab had been closed
    vanish_on_update: bool,
}

impl MemoryTabs {
    pub(crate) fn with_tabs(tabs: &[(u64, u64, &str)]) -> Self {
        let this = Self::default();
        {
            let mut inner = this.inner.lock();
            inner.tabs = tabs
                .iter()
                .map(|(id, window_id, url)| TabHandle {
                    id: *id,
                    window_id: *window_id,
                    url: url.to_string(),
                })
                .collect();
            inner.next_id = tabs.iter().map(|t| t.0).max().unwrap_or(0) + 1;
        }
        this
    }

    pub(crate) fn tabs(&self) -> Vec<TabHandle> {
        self.inner.lock().tabs.clone()
    }

    pub(crate) fn focused_window(&self) -> Option<u64> {
        self.inner.lock().focused_window
    }

    pub(crate) fn vanish_on_update(&self) {
        self.inner.lock().vanish_on_update = true;
    }
}

impl TabManager for MemoryTabs {
    fn query(&mut self) -> Result<Vec<TabHandle>, TabError> {
        Ok(self.tabs())
    }

    fn update(&mut self, id: u64, url: &str, _active: bool) -> Result<TabHandle, TabError> {
        let mut inner = self.inner.lock();
        if std::mem::take(&mut inner.vanish_on_update) {
            inner.tabs.retain(|t| t.id != id);
            return Err(TabError::Gone(id));
        }
        let tab = inner
            .tabs
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TabError::Gone(id))?;
        tab.url = url.to_string();
        Ok(tab.clone())
    }

    fn create(&mut self, url: &str) -> Result<TabHandle, TabError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let tab = TabHandle {
            id: inner.next_id,
            window_id: 1,
            url: url.to_string(),
        };
        inner.tabs.push(tab.clone());
        Ok(tab)
    }

    fn focus_window(&mut self, window_id: u64) -> Result<(), TabError> {
        self.inner.lock().focused_window = Some(window_id);
        Ok(())
    }
}

const VIEW: &str = "http://127.0.0.1:4848/view";

fn view() -> Url {
    Url::parse(VIEW).unwrap()
}

fn agent(tabs: MemoryTabs) -> (BrowserAgent<MemoryTabs>, Sender<()>) {
    let (shutdown_tx, shutdown_rx) = channel::unbounded();
    let agent = BrowserAgent::new("ws://127.0.0.1:4848/ws", view(), tabs, shutdown_rx);
    (agent, shutdown_tx)
}

#[test]
fn test_reload_reuses_matching_tab() {
    let tabs = MemoryTabs::with_tabs(&[
        (1, 10, "https://example.com/"),
        (2, 20, "http://127.0.0.1:4848/view?t=1"),
    ]);
    let (mut agent, _shutdown) = agent(tabs.clone());

    agent.handle_text(r#"{"type":"reload"}"#).unwrap();

    let after = tabs.tabs();
    assert_eq!(after.len(), 2);
    let preview = after.iter().find(|t| t.id == 2).unwrap();
    assert!(preview.url.starts_with("http://127.0.0.1:4848/view?t="));
    assert_ne!(preview.url, "http://127.0.0.1:4848/view?t=1");
    assert_eq!(tabs.focused_window(), Some(20));
}

#[test]
fn test_reload_creates_tab_when_none_match() {
    let tabs = MemoryTabs::with_tabs(&[(1, 10, "http://127.0.0.1:4848/viewer")]);
    let (mut agent, _shutdown) = agent(tabs.clone());

    agent.handle_text(r#"{"type":"reload"}"#).unwrap();

    let after = tabs.tabs();
    assert_eq!(after.len(), 2);
    assert_eq!(after[1].url, VIEW);
}

#[test]
fn test_vanished_tab_falls_back_to_create() {
    let tabs = MemoryTabs::with_tabs(&[(5, 10, VIEW)]);
    tabs.vanish_on_update();
    let result = reconcile(&mut tabs.clone(), &view(), 42).unwrap();

    assert!(matches!(result, Reconciled::Created(_)));
    let after = tabs.tabs();
    assert_eq!(after.len(), 1);
    assert_ne!(after[0].id, 5);
}

#[test]
fn test_reconcile_reports_reuse() {
    let mut tabs = MemoryTabs::with_tabs(&[(3, 30, "http://127.0.0.1:4848/view#page=2")]);
    match reconcile(&mut tabs, &view(), 99).unwrap() {
        Reconciled::Reused(tab) => {
            assert_eq!(tab.id, 3);
            assert_eq!(tab.url, "http://127.0.0.1:4848/view?t=99");
        }
        other => panic!("expected reuse, got {other:?}"),
    }
}

#[test]
fn test_unknown_and_malformed_messages() {
    let tabs = MemoryTabs::with_tabs(&[(1, 1, VIEW)]);
    let (mut agent, _shutdown) = agent(tabs.clone());

    agent
        .handle_text(r#"{"type":"connected","version":"0.3.0"}"#)
        .unwrap();
    agent.handle_text(r#"{"type":"patch"}"#).unwrap();
    let err = agent.handle_text("not json").unwrap_err();
    assert_eq!(err.raw, "not json");

    // Nothing touched the tabs
    assert_eq!(tabs.tabs()[0].url, VIEW);
}

#[test]
fn test_push_url_follows_view_origin() {
    let view = Url::parse("http://localhost:4848/view?t=3#page=2").unwrap();
    assert_eq!(push_url(&view).unwrap().as_str(), "ws://localhost:4848/ws");

    let view = Url::parse("https://[::1]:9000/view").unwrap();
    assert_eq!(push_url(&view).unwrap().as_str(), "wss://[::1]:9000/ws");
}

#[test]
fn test_agent_from_view_reuses_opened_tab() {
    // Served on 0.0.0.0; the opener put `localhost` in the tab
    let tabs = MemoryTabs::with_tabs(&[(4, 2, "http://localhost:4848/view")]);
    let (_shutdown_tx, shutdown_rx) = channel::unbounded();
    let view = Url::parse("http://localhost:4848/view").unwrap();
    let mut agent = BrowserAgent::for_view(view, tabs.clone(), shutdown_rx).unwrap();

    agent.handle_text(r#"{"type":"reload"}"#).unwrap();
    let after = tabs.tabs();
    assert_eq!(after.len(), 1);
    assert!(after[0].url.starts_with("http://localhost:4848/view?t="));
}

/// Collect `Connecting` timestamps until `count` attempts were seen.
fn connecting_times(states: &Receiver<AgentState>, count: usize) -> Vec<Instant> {
    let mut times = Vec::new();
    while times.len() < count {
        let state = states.recv_timeout(Duration::from_secs(5)).unwrap();
        if state == AgentState::Connecting {
            times.push(Instant::now());
        }
    }
    times
}

#[test]
fn test_reconnects_with_fixed_delay() {
    // Reserve a port with nothing listening on it
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let (shutdown_tx, shutdown_rx) = channel::unbounded();
    let (state_tx, state_rx) = channel::unbounded();
    let delay = Duration::from_millis(150);

    let agent = BrowserAgent::new(
        &format!("ws://127.0.0.1:{port}/ws"),
        view(),
        MemoryTabs::default(),
        shutdown_rx,
    )
    .with_retry_delay(delay)
    .with_state_channel(state_tx);
    let handle = std::thread::spawn(move || agent.run());

    let times = connecting_times(&state_rx, 5);
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    for gap in &gaps {
        assert!(*gap >= delay - Duration::from_millis(20), "gap {gap:?} too short");
        assert!(*gap < delay * 4, "gap {gap:?} grew");
    }

    shutdown_tx.send(()).unwrap();
    handle.join().unwrap();
}

#[test]
fn test_shutdown_cancels_wait() {
    let (shutdown_tx, shutdown_rx) = channel::unbounded();
    let agent = BrowserAgent::new("ws://127.0.0.1:9/ws", view(), MemoryTabs::default(), shutdown_rx)
        .with_retry_delay(Duration::from_secs(60));
    let handle = std::thread::spawn(move || agent.run());

    std::thread::sleep(Duration::from_millis(200));
    let started = Instant::now();
    shutdown_tx.send(()).unwrap();
    handle.join().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// Accept one WebSocket client, greet it, send reload, then close.
fn serve_once(listener: TcpListener) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ws = tungstenite::accept(stream).unwrap();
        ws.send(Message::Text(
            String::from(r#"{"type":"connected","version":"test"}"#).into(),
        ))
        .unwrap();
        ws.send(Message::Text(String::from("{oops").into())).unwrap();
        ws.send(Message::Text(String::from(r#"{"type":"reload"}"#).into()))
            .unwrap();
        std::thread::sleep(Duration::from_millis(200));
        let _ = ws.close(None);
        let _ = ws.flush();
    })
}

#[test]
fn test_session_reloads_then_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = serve_once(listener);

    let tabs = MemoryTabs::default();
    let (shutdown_tx, shutdown_rx) = channel::unbounded();
    let (state_tx, state_rx) = channel::unbounded();
    let view = Url::parse(&format!("http://{addr}/view")).unwrap();
    let agent = BrowserAgent::for_view(view, tabs.clone(), shutdown_rx)
        .unwrap()
        .with_retry_delay(Duration::from_millis(100))
        .with_state_channel(state_tx);
    let handle = std::thread::spawn(move || agent.run());

    let mut seen = Vec::new();
    while seen.len() < 4 {
        seen.push(state_rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }
    assert_eq!(
        seen,
        vec![
            AgentState::Connecting,
            AgentState::Connected,
            AgentState::Disconnected,
            AgentState::Connecting,
        ]
    );

    // The reload opened the preview tab despite the malformed frame before it
    let opened = tabs.tabs();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].url, format!("http://{addr}/view"));

    server.join().unwrap();
    shutdown_tx.send(()).unwrap();
    handle.join().unwrap();
}
