//! Watch session lifecycle.
//!
//! Startup order matters: the watcher is installed before anything else so
//! edits made while the server binds are still seen, then the server binds,
//! then the actor system starts and runs the initial compile. The browser is
//! opened once that compile has finished.
//!
//! With a DevTools endpoint configured, the browser agent takes the opener's
//! place. It connects before the initial compile starts, so the first reload
//! already opens or reuses the preview tab.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam::channel::{self, Receiver, Sender};
use url::Url;

use crate::actor::Coordinator;
use crate::actor::fs::{FsActor, WatchFilter};
use crate::agent::{AgentState, BrowserAgent, CdpTabs, TabManager};
use crate::compiler::CommandCompiler;
use crate::config::QtexConfig;
use crate::core::{is_shutdown, register_server};
use crate::reload::server::{ServeState, bind_with_retry};
use crate::utils::exec::open_in_browser;
use crate::{debug, log};

/// Run the watch loop until Ctrl+C.
pub fn watch(config: &QtexConfig) -> Result<()> {
    let compiler = Arc::new(CommandCompiler::new(config.compile.command.clone()));
    let options = config.compile_options();
    let coordinator = Coordinator::new(compiler, config.root.clone(), options.clone());

    // Watcher-first: events start buffering now
    let fs = FsActor::new(
        &config.root,
        WatchFilter::new(&config.root, &options.output),
        coordinator.orchestrator_tx(),
    )?;
    log!("watch"; "watching {}", fs.root().display());
    let state = ServeState {
        artifact: config.artifact_path(),
        ws_tx: coordinator.ws_tx(),
    };

    let bound = bind_with_retry(config.serve.interface, config.serve.port)?;
    let (shutdown_tx, shutdown_rx) = channel::bounded(1);
    register_server(bound.server(), shutdown_tx);

    let port = bound.addr().port();
    let view_url = config.view_url(port);
    log!("serve"; "preview at {}", view_url);

    let agent = match config.agent.endpoint() {
        Some(endpoint) => {
            log!("agent"; "keeping the preview tab in {}", endpoint);
            let agent = preview_agent(config, port, CdpTabs::new(endpoint))?;
            Some(agent.spawn())
        }
        None => None,
    };

    let (ready_tx, ready_rx) = channel::bounded(1);
    let coordinator = coordinator
        .with_watcher(fs)
        .with_ready_signal(ready_tx)
        .with_shutdown_signal(shutdown_rx);
    let actors = spawn_actors(coordinator, agent.as_ref().map(|a| a.states.clone()));

    if config.serve.open && agent.is_none() {
        spawn_opener(view_url, ready_rx);
    }

    // Blocks until the shutdown handler unblocks the server
    bound.run(state)?;

    if let Some(agent) = agent {
        let _ = agent.shutdown_tx.send(());
        wait_for_shutdown(agent.thread);
    }
    wait_for_shutdown(actors);
    Ok(())
}

/// Agent for this session's view URL.
struct PreviewAgent<T: TabManager> {
    agent: BrowserAgent<T>,
    states: Receiver<AgentState>,
    shutdown_tx: Sender<()>,
}

/// A running agent thread.
struct AgentHandle {
    states: Receiver<AgentState>,
    shutdown_tx: Sender<()>,
    thread: JoinHandle<()>,
}

impl<T: TabManager + 'static> PreviewAgent<T> {
    fn spawn(self) -> AgentHandle {
        let agent = self.agent;
        AgentHandle {
            states: self.states,
            shutdown_tx: self.shutdown_tx,
            thread: thread::spawn(move || {
                agent.run();
            }),
        }
    }
}

/// Build the agent from the same view URL the opener would use.
///
/// The bind interface may be a wildcard (`0.0.0.0`), which is not a
/// browsable host.
fn preview_agent<T: TabManager>(
    config: &QtexConfig,
    port: u16,
    tabs: T,
) -> Result<PreviewAgent<T>> {
    let view = Url::parse(&config.view_url(port))?;
    let (shutdown_tx, shutdown_rx) = channel::bounded(1);
    let (state_tx, states) = channel::unbounded();
    let agent = BrowserAgent::for_view(view, tabs, shutdown_rx)?.with_state_channel(state_tx);
    Ok(PreviewAgent {
        agent,
        states,
        shutdown_tx,
    })
}

/// Hold the actors back until the agent is connected, or give up after `AGENT_WAIT`.
///
/// The server request loop must already be running to answer the upgrade.
fn wait_for_agent(states: &Receiver<AgentState>) {
    let deadline = Instant::now() + AGENT_WAIT;
    while let Ok(state) = states.recv_deadline(deadline) {
        if state == AgentState::Connected {
            return;
        }
    }
    debug!("agent"; "not connected yet, starting without it");
}

const AGENT_WAIT: Duration = Duration::from_secs(2);

/// Run the actor system on its own thread and tokio runtime.
fn spawn_actors(
    coordinator: Coordinator,
    agent_states: Option<Receiver<AgentState>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Some(states) = agent_states {
            wait_for_agent(&states);
        }
        let rt = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                log!("actor"; "failed to start runtime: {}", e);
                return;
            }
        };

        rt.block_on(async {
            if let Err(e) = coordinator.run().await {
                log!("actor"; "error: {}", e);
            }
        });
    })
}

/// Open the preview once the first compile has finished.
fn spawn_opener(url: String, ready_rx: Receiver<()>) {
    thread::spawn(move || {
        if ready_rx.recv().is_err() || is_shutdown() {
            return;
        }
        debug!("serve"; "opening {}", url);
        if let Err(e) = open_in_browser(&url) {
            log!("serve"; "could not open browser: {}", e);
        }
    });
}

/// Wait for actor system to shutdown gracefully (max 2 seconds).
fn wait_for_shutdown(handle: JoinHandle<()>) {
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
