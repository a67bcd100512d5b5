//! HTTP server for the artifact endpoint and the push-channel upgrade.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tiny_http::{Request, Response, Server, StatusCode};
use tokio::sync::mpsc;
use tungstenite::handshake::derive_accept_key;

use super::response::{self, header_value, make_header};
use crate::actor::messages::WsMsg;
use crate::actor::ws::into_duplex;
use crate::{debug, log};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Worker threads answering HTTP requests.
const REQUEST_THREADS: usize = 4;

/// Everything a request handler needs.
#[derive(Clone)]
pub struct ServeState {
    /// Absolute path of the compiled artifact
    pub artifact: PathBuf,
    /// Upgraded `/ws` connections go here
    pub ws_tx: mpsc::Sender<WsMsg>,
}

/// Bound server ready to accept requests
pub struct BoundServer {
    server: Arc<Server>,
    addr: SocketAddr,
}

/// Bind to the specified interface and port, with automatic port retry.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<BoundServer> {
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                // Port 0 binds an ephemeral port; report the real one
                let addr = server.server_addr().to_ip().unwrap_or(addr);
                return Ok(BoundServer {
                    server: Arc::new(server),
                    addr,
                });
            }
            Err(_) if offset + 1 < MAX_PORT_RETRIES => continue,
            Err(e) => {
                return Err(anyhow!(
                    "Failed to bind after {} attempts (ports {}-{}): {}",
                    MAX_PORT_RETRIES,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}

impl BoundServer {
    /// Get the bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared handle (for the shutdown handler).
    pub fn server(&self) -> Arc<Server> {
        Arc::clone(&self.server)
    }

    /// Serve requests until the server is unblocked (blocking).
    pub fn run(&self, state: ServeState) -> Result<()> {
        run_request_loop(&self.server, state)
    }
}

fn run_request_loop(server: &Server, state: ServeState) -> Result<()> {
    // Use thread pool to handle requests concurrently
    // so a large artifact download never delays the upgrade of /ws
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .build()?;
    let state = Arc::new(state);

    for request in server.incoming_requests() {
        let state = Arc::clone(&state);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &state) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, state: &ServeState) -> Result<()> {
    // Early exit if shutdown requested
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    debug!("serve"; "{} {}", request.method(), request.url());
    match route(request.url()) {
        "/view" => response::respond_artifact(request, &state.artifact),
        "/ws" => upgrade_websocket(request, &state.ws_tx),
        _ => response::respond_not_found(request),
    }
}

/// Path part of a request target, without query or fragment.
fn route(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// Complete the WebSocket handshake and hand the stream to WsActor.
fn upgrade_websocket(request: Request, ws_tx: &mpsc::Sender<WsMsg>) -> Result<()> {
    let is_upgrade = header_value(&request, "Upgrade")
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    let key = header_value(&request, "Sec-WebSocket-Key");
    let (true, Some(key)) = (is_upgrade, key) else {
        return response::respond_bad_request(request, "expected a WebSocket upgrade");
    };

    let accept = derive_accept_key(key.trim().as_bytes());
    let response = Response::empty(StatusCode(101))
        .with_header(make_header("Sec-WebSocket-Accept", &accept)?);

    let stream = request.upgrade("websocket", response);
    ws_tx
        .blocking_send(WsMsg::AddClient(into_duplex(stream)))
        .map_err(|_| anyhow!("push channel is not running"))
}
