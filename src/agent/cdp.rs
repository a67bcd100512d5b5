//! Chrome DevTools Protocol backend for [`TabManager`].
//!
//! Drives a Chromium-family browser started with `--remote-debugging-port`.
//! All calls go over the browser-level WebSocket using the `Target` and
//! `Browser` domains. Navigation attaches a flat session to the page for a
//! single `Page.navigate`.
//!
//! The connection is opened lazily and dropped on any transport error, so a
//! browser restart is picked up by the next call.

use std::net::TcpStream;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::{Value, json};
use tungstenite::{Message, WebSocket};
use url::Url;

use super::{TabError, TabHandle, TabManager, open_socket};
use crate::debug;

const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON-RPC code DevTools uses for an unknown target or session.
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
    web_socket_debugger_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfo {
    target_id: String,
    #[serde(rename = "type")]
    kind: String,
    url: String,
}

#[derive(Debug)]
enum CallError {
    Transport(String),
    Protocol { code: i64, message: String },
}

impl From<CallError> for TabError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(message) => TabError::Browser(message),
            CallError::Protocol { code, message } => {
                TabError::Browser(format!("{message} ({code})"))
            }
        }
    }
}

fn transport(err: impl std::fmt::Display) -> CallError {
    CallError::Transport(err.to_string())
}

/// Tabs of a browser reached through its DevTools endpoint.
///
/// `endpoint` is either the HTTP debugging address (`http://127.0.0.1:9222`),
/// from which the browser WebSocket is discovered, or that `ws://` URL itself.
/// Tab handle ids are local; DevTools target ids are mapped onto them.
pub struct CdpTabs {
    endpoint: Url,
    socket: Option<WebSocket<TcpStream>>,
    next_call: u64,
    targets: FxHashMap<u64, String>,
    handles: FxHashMap<String, u64>,
    next_handle: u64,
}

impl CdpTabs {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            socket: None,
            next_call: 0,
            targets: FxHashMap::default(),
            handles: FxHashMap::default(),
            next_handle: 1,
        }
    }

    fn browser_url(&self) -> Result<String, CallError> {
        if self.endpoint.scheme() == "ws" {
            return Ok(self.endpoint.to_string());
        }
        let version = self.endpoint.join("/json/version").map_err(transport)?;
        let info: VersionInfo = ureq::get(version.as_str())
            .timeout(CALL_TIMEOUT)
            .call()
            .map_err(transport)?
            .into_json()
            .map_err(transport)?;
        Ok(info.web_socket_debugger_url)
    }

    fn socket(&mut self) -> Result<&mut WebSocket<TcpStream>, CallError> {
        let ws = match self.socket.take() {
            Some(ws) => ws,
            None => {
                let url = self.browser_url()?;
                let ws = open_socket(&url, CALL_TIMEOUT).map_err(transport)?;
                debug!("agent"; "attached to browser at {}", url);
                ws
            }
        };
        Ok(self.socket.insert(ws))
    }

    /// One DevTools command. Events received while waiting are skipped.
    fn call(&mut self, method: &str, params: Value, session: Option<&str>) -> Result<Value, CallError> {
        self.next_call += 1;
        let id = self.next_call;
        let mut request = json!({ "id": id, "method": method, "params": params });
        if let Some(session) = session {
            request["sessionId"] = json!(session);
        }

        let result = self.exchange(id, request.to_string());
        if matches!(result, Err(CallError::Transport(_))) {
            self.socket = None;
        }
        result
    }

    fn exchange(&mut self, id: u64, request: String) -> Result<Value, CallError> {
        let ws = self.socket()?;
        ws.send(Message::Text(request.into())).map_err(transport)?;

        loop {
            let text = match ws.read().map_err(transport)? {
                Message::Text(text) => text,
                Message::Close(_) => return Err(transport("browser closed the connection")),
                _ => continue,
            };
            let reply: Value = serde_json::from_str(text.as_str()).map_err(transport)?;
            if reply.get("id").and_then(Value::as_u64) != Some(id) {
                continue;
            }
            if let Some(error) = reply.get("error") {
                return Err(CallError::Protocol {
                    code: error["code"].as_i64().unwrap_or_default(),
                    message: error["message"].as_str().unwrap_or_default().to_string(),
                });
            }
            return Ok(reply.get("result").cloned().unwrap_or(Value::Null));
        }
    }

    fn handle_for(&mut self, target_id: &str) -> u64 {
        if let Some(id) = self.handles.get(target_id) {
            return *id;
        }
        let id = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(target_id.to_string(), id);
        self.targets.insert(id, target_id.to_string());
        id
    }

    fn window_for(&mut self, target_id: &str) -> Result<u64, CallError> {
        let result = self.call(
            "Browser.getWindowForTarget",
            json!({ "targetId": target_id }),
            None,
        )?;
        result["windowId"]
            .as_u64()
            .ok_or_else(|| transport("getWindowForTarget returned no windowId"))
    }
}

impl TabManager for CdpTabs {
    /// Page targets only. `window_id` is resolved by `update` and `create`.
    fn query(&mut self) -> Result<Vec<TabHandle>, TabError> {
        let result = self.call("Target.getTargets", json!({}), None)?;
        let infos: Vec<TargetInfo> = serde_json::from_value(result["targetInfos"].clone())
            .map_err(|e| TabError::Browser(e.to_string()))?;

        Ok(infos
            .into_iter()
            .filter(|info| info.kind == "page")
            .map(|info| TabHandle {
                id: self.handle_for(&info.target_id),
                window_id: 0,
                url: info.url,
            })
            .collect())
    }

    fn update(&mut self, id: u64, url: &str, active: bool) -> Result<TabHandle, TabError> {
        let target = self.targets.get(&id).cloned().ok_or(TabError::Gone(id))?;

        let attached = self.call(
            "Target.attachToTarget",
            json!({ "targetId": target, "flatten": true }),
            None,
        );
        let session = match attached {
            Ok(result) => result["sessionId"].as_str().unwrap_or_default().to_string(),
            Err(CallError::Protocol {
                code: INVALID_PARAMS,
                ..
            }) => return Err(TabError::Gone(id)),
            Err(e) => return Err(e.into()),
        };

        let navigated = self.call("Page.navigate", json!({ "url": url }), Some(&session));
        let _ = self.call(
            "Target.detachFromTarget",
            json!({ "sessionId": session }),
            None,
        );
        navigated?;

        if active {
            self.call("Target.activateTarget", json!({ "targetId": target }), None)?;
        }
        let window_id = self.window_for(&target)?;
        Ok(TabHandle {
            id,
            window_id,
            url: url.to_string(),
        })
    }

    fn create(&mut self, url: &str) -> Result<TabHandle, TabError> {
        let result = self.call("Target.createTarget", json!({ "url": url }), None)?;
        let target = result["targetId"]
            .as_str()
            .ok_or_else(|| TabError::Browser("createTarget returned no targetId".into()))?
            .to_string();

        let window_id = self.window_for(&target)?;
        Ok(TabHandle {
            id: self.handle_for(&target),
            window_id,
            url: url.to_string(),
        })
    }

    fn focus_window(&mut self, window_id: u64) -> Result<(), TabError> {
        self.call(
            "Browser.setWindowBounds",
            json!({ "windowId": window_id, "bounds": { "windowState": "normal" } }),
            None,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::agent::{Reconciled, reconcile};

    /// Browser-side state of the fake DevTools server.
    #[derive(Default)]
    struct Browser {
        /// (target id, url, window id)
        pages: Vec<(String, String, u64)>,
        methods: Vec<String>,
        focused: Option<u64>,
        vanish_on_attach: bool,
        created: u64,
    }

    impl Browser {
        fn answer(&mut self, request: &Value) -> Vec<Value> {
            let id = request["id"].clone();
            let method = request["method"].as_str().unwrap_or_default().to_string();
            let params = &request["params"];
            self.methods.push(method.clone());

            let ok = |result: Value| json!({ "id": id.clone(), "result": result });
            let missing = json!({
                "id": id.clone(),
                "error": { "code": -32602, "message": "No target with given id found" }
            });
            let target = params["targetId"].as_str().unwrap_or_default().to_string();

            match method.as_str() {
                "Target.getTargets" => {
                    let mut infos: Vec<Value> = self
                        .pages
                        .iter()
                        .map(|(t, u, _)| json!({ "targetId": t, "type": "page", "url": u, "title": "" }))
                        .collect();
                    infos.push(json!({
                        "targetId": "SW",
                        "type": "service_worker",
                        "url": "http://localhost:4848/sw.js"
                    }));
                    vec![ok(json!({ "targetInfos": infos }))]
                }
                "Target.attachToTarget" => {
                    if self.vanish_on_attach {
                        self.pages.retain(|p| p.0 != target);
                    }
                    if self.pages.iter().any(|p| p.0 == target) {
                        vec![ok(json!({ "sessionId": format!("session-{target}") }))]
                    } else {
                        vec![missing]
                    }
                }
                "Page.navigate" => {
                    let session = request["sessionId"].as_str().unwrap_or_default();
                    let target = session.trim_start_matches("session-");
                    let url = params["url"].as_str().unwrap_or_default();
                    if let Some(page) = self.pages.iter_mut().find(|p| p.0 == target) {
                        page.1 = url.to_string();
                    }
                    vec![
                        json!({ "method": "Page.frameStartedLoading", "params": {}, "sessionId": session }),
                        ok(json!({ "frameId": "F1" })),
                    ]
                }
                "Target.detachFromTarget" | "Target.activateTarget" => vec![ok(json!({}))],
                "Browser.getWindowForTarget" => match self.pages.iter().find(|p| p.0 == target) {
                    Some(page) => vec![ok(json!({ "windowId": page.2, "bounds": {} }))],
                    None => vec![missing],
                },
                "Target.createTarget" => {
                    self.created += 1;
                    let target = format!("NEW{}", self.created);
                    let url = params["url"].as_str().unwrap_or_default().to_string();
                    self.pages.push((target.clone(), url, 9));
                    vec![ok(json!({ "targetId": target }))]
                }
                "Browser.setWindowBounds" => {
                    self.focused = params["windowId"].as_u64();
                    vec![ok(json!({}))]
                }
                _ => vec![json!({
                    "id": id.clone(),
                    "error": { "code": -32601, "message": "method not found" }
                })],
            }
        }
    }

    struct FakeBrowser {
        state: Arc<Mutex<Browser>>,
        ws_url: String,
    }

    impl FakeBrowser {
        fn start(pages: &[(&str, &str, u64)]) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let ws_url = format!(
                "ws://{}/devtools/browser/fake",
                listener.local_addr().unwrap()
            );
            let state = Arc::new(Mutex::new(Browser {
                pages: pages
                    .iter()
                    .map(|(t, u, w)| (t.to_string(), u.to_string(), *w))
                    .collect(),
                ..Default::default()
            }));

            let shared = Arc::clone(&state);
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { break };
                    let Ok(mut ws) = tungstenite::accept(stream) else {
                        continue;
                    };
                    while let Ok(msg) = ws.read() {
                        let Message::Text(text) = msg else { continue };
                        let request: Value = serde_json::from_str(text.as_str()).unwrap();
                        let replies = shared.lock().answer(&request);
                        for reply in replies {
                            let _ = ws.send(Message::Text(reply.to_string().into()));
                        }
                    }
                }
            });

            Self { state, ws_url }
        }

        fn tabs(&self) -> CdpTabs {
            CdpTabs::new(Url::parse(&self.ws_url).unwrap())
        }

        fn page_url(&self, target: &str) -> Option<String> {
            let state = self.state.lock();
            state.pages.iter().find(|p| p.0 == target).map(|p| p.1.clone())
        }
    }

    fn view() -> Url {
        Url::parse("http://localhost:4848/view").unwrap()
    }

    #[test]
    fn test_query_lists_pages_only() {
        let browser = FakeBrowser::start(&[
            ("A", "https://example.com/", 1),
            ("B", "http://localhost:4848/view?t=1", 2),
        ]);
        let mut tabs = browser.tabs();

        let listed = tabs.query().unwrap();
        assert_eq!(listed.len(), 2);
        assert_ne!(listed[0].id, listed[1].id);
        assert_eq!(listed[1].url, "http://localhost:4848/view?t=1");

        // Handles are stable across queries
        let again = tabs.query().unwrap();
        assert_eq!(again[0].id, listed[0].id);
    }

    #[test]
    fn test_reconcile_navigates_matching_page() {
        let browser = FakeBrowser::start(&[
            ("A", "https://example.com/", 1),
            ("B", "http://localhost:4848/view?t=1", 2),
        ]);
        let mut tabs = browser.tabs();

        match reconcile(&mut tabs, &view(), 77).unwrap() {
            Reconciled::Reused(tab) => assert_eq!(tab.window_id, 2),
            other => panic!("expected reuse, got {other:?}"),
        }
        assert_eq!(
            browser.page_url("B").as_deref(),
            Some("http://localhost:4848/view?t=77")
        );
        let state = browser.state.lock();
        assert!(state.methods.iter().any(|m| m == "Target.activateTarget"));
        assert_eq!(state.focused, Some(2));
        assert_eq!(state.pages.len(), 2);
    }

    #[test]
    fn test_reconcile_opens_page_when_none_match() {
        let browser = FakeBrowser::start(&[("A", "https://example.com/", 1)]);
        let mut tabs = browser.tabs();

        match reconcile(&mut tabs, &view(), 5).unwrap() {
            Reconciled::Created(tab) => assert_eq!(tab.window_id, 9),
            other => panic!("expected a new tab, got {other:?}"),
        }
        assert_eq!(
            browser.page_url("NEW1").as_deref(),
            Some("http://localhost:4848/view")
        );
    }

    #[test]
    fn test_closed_page_falls_back_to_create() {
        let browser = FakeBrowser::start(&[("B", "http://localhost:4848/view", 2)]);
        browser.state.lock().vanish_on_attach = true;
        let mut tabs = browser.tabs();

        let result = reconcile(&mut tabs, &view(), 5).unwrap();
        assert!(matches!(result, Reconciled::Created(_)));
        assert!(browser.page_url("B").is_none());
        assert!(browser.page_url("NEW1").is_some());
    }

    #[test]
    fn test_unknown_handle_is_gone() {
        let browser = FakeBrowser::start(&[]);
        let mut tabs = browser.tabs();
        assert!(matches!(
            tabs.update(42, "http://localhost:4848/view", true),
            Err(TabError::Gone(42))
        ));
    }

    #[test]
    fn test_discovers_browser_socket_over_http() {
        let browser = FakeBrowser::start(&[("A", "https://example.com/", 1)]);
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", server.server_addr().to_ip().unwrap());
        let body = json!({ "Browser": "Fake/1.0", "webSocketDebuggerUrl": browser.ws_url }).to_string();
        std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                assert_eq!(request.url(), "/json/version");
                let _ = request.respond(tiny_http::Response::from_string(body));
            }
        });

        let mut tabs = CdpTabs::new(Url::parse(&endpoint).unwrap());
        assert_eq!(tabs.query().unwrap().len(), 1);
    }

    #[test]
    fn test_unreachable_browser_is_error() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut tabs = CdpTabs::new(Url::parse(&format!("http://127.0.0.1:{port}")).unwrap());
        assert!(matches!(tabs.query(), Err(TabError::Browser(_))));
    }
}
