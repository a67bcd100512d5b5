use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::{Receiver, TryRecvError};
use tokio::sync::mpsc;

use crate::actor::fs::FsActor;
use crate::actor::messages::{OrchestratorMsg, WsMsg};
use crate::actor::orchestrator::Orchestrator;
use crate::actor::ws::WsActor;

/// Run all actors concurrently.
pub(super) async fn run_actors(
    fs: Option<FsActor>,
    orchestrator: Orchestrator,
    ws: WsActor,
    orchestrator_tx: mpsc::Sender<OrchestratorMsg>,
    ws_tx: mpsc::Sender<WsMsg>,
    shutdown_rx: Option<Receiver<()>>,
) -> Result<()> {
    let fs_handle = fs.map(|fs| tokio::spawn(fs.run()));
    let mut orchestrator_handle = tokio::spawn(orchestrator.run());
    let mut ws_handle = tokio::spawn(ws.run());

    if let Some(rx) = shutdown_rx {
        loop {
            match rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    crate::debug!("actor"; "shutdown signal received");
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    } else {
        tokio::select! {
            _ = &mut orchestrator_handle => {}
            _ = &mut ws_handle => {}
        }
    }

    crate::debug!("actor"; "sending shutdown");
    let _ = orchestrator_tx.send(OrchestratorMsg::Shutdown).await;
    let _ = ws_tx.send(WsMsg::Shutdown).await;

    if let Some(handle) = fs_handle {
        handle.abort();
    }
    let _ = tokio::time::timeout(Duration::from_millis(500), orchestrator_handle).await;
    let _ = tokio::time::timeout(Duration::from_millis(500), ws_handle).await;

    Ok(())
}
