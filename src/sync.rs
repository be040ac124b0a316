//! Replication state machine: exchanges pins with peers on the mesh.
//!
//! The actor owns the in-memory cache for its whole lifetime and processes
//! one event to completion before accepting the next, so cache and store
//! never see concurrent mutation.

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::cache::PinCache;
use crate::mesh::{MeshCommand, MeshConn, MeshEvent, PeerId};
use crate::pin::Pin;
use crate::store::{Namespace, PinStore};

/// A pinmesh operation.
///
/// This is the message that is exchanged between peers over the mesh.
#[derive(Debug, Clone, Serialize, Deserialize, strum::Display)]
pub enum Op {
    /// A single newly created pin.
    Record(Pin),
    /// A full cache snapshot, sent to seed a newly joined peer.
    Cache(Vec<Pin>),
}

impl Op {
    /// Encode for the wire.
    pub fn encode(&self) -> Result<Bytes> {
        let bytes = postcard::to_stdvec(self)?;
        Ok(bytes.into())
    }

    /// Decode from the wire.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let op = postcard::from_bytes(bytes)?;
        Ok(op)
    }
}

#[derive(derive_more::Debug, strum::Display)]
enum ToSyncActor {
    Snapshot {
        #[debug("reply")]
        reply: oneshot::Sender<Vec<Pin>>,
    },
    Shutdown {
        #[debug("reply")]
        reply: oneshot::Sender<()>,
    },
}

/// Controls a running [`SyncActor`].
///
/// Cheaply cloneable. Dropping every handle lets the actor exit once its
/// inbox drains.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<ToSyncActor>,
    cancel: CancellationToken,
}

impl SyncHandle {
    /// The current cache contents in insertion order.
    pub async fn snapshot(&self) -> Result<Vec<Pin>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ToSyncActor::Snapshot { reply })
            .await
            .context("sync actor is gone")?;
        rx.await.context("sync actor dropped the reply")
    }

    /// Stop the actor and wait until it acknowledged.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(ToSyncActor::Shutdown { reply }).await.is_err() {
            // already gone
            return Ok(());
        }
        rx.await.ok();
        Ok(())
    }

    /// Abort the actor without waiting for pending events.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// The replication actor.
///
/// Reacts to mesh events: seeds newly joined peers with the cache snapshot,
/// and applies inbound `Record` and `Cache` messages by dedup, cache insert
/// and persistence.
#[derive(Debug)]
pub struct SyncActor {
    inbox: mpsc::Receiver<ToSyncActor>,
    events: mpsc::Receiver<MeshEvent>,
    commands: mpsc::Sender<MeshCommand>,
    cache: PinCache,
    store: PinStore,
    cancel: CancellationToken,
}

impl SyncActor {
    /// Spawn the actor on the runtime.
    ///
    /// Takes ownership of the hydrated cache; it is never reassigned, only
    /// mutated in place by the event loop.
    pub fn spawn(cache: PinCache, store: PinStore, conn: MeshConn) -> (SyncHandle, JoinHandle<()>) {
        let (tx, inbox) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let actor = SyncActor {
            inbox,
            events: conn.events,
            commands: conn.commands,
            cache,
            store,
            cancel: cancel.clone(),
        };
        let join_handle = tokio::task::spawn(async move {
            if let Err(err) = actor.run().await {
                error!("sync actor closed with error: {err:?}");
            }
        });
        (SyncHandle { tx, cancel }, join_handle)
    }

    async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("sync actor cancelled");
                    break;
                }
                msg = self.inbox.recv() => {
                    let Some(msg) = msg else {
                        // all handles dropped
                        break;
                    };
                    trace!(%msg, "tick: inbox");
                    match msg {
                        ToSyncActor::Snapshot { reply } => {
                            reply.send(self.cache.snapshot()).ok();
                        }
                        ToSyncActor::Shutdown { reply } => {
                            reply.send(()).ok();
                            break;
                        }
                    }
                }
                event = self.events.recv() => {
                    let Some(event) = event else {
                        debug!("mesh transport closed, stopping");
                        break;
                    };
                    trace!(%event, "tick: mesh");
                    if let Err(err) = self.on_mesh_event(event).await {
                        warn!(?err, "failed to handle mesh event");
                    }
                }
            }
        }
        debug!("sync actor stopped");
        Ok(())
    }

    async fn on_mesh_event(&mut self, event: MeshEvent) -> Result<()> {
        match event {
            MeshEvent::PeerJoined(peer) => {
                debug!(peer = %peer.fmt_short(), pins = self.cache.len(), "peer joined, seeding");
                let payload = Op::Cache(self.cache.snapshot()).encode()?;
                self.commands
                    .send(MeshCommand::Send { to: peer, payload })
                    .await
                    .context("mesh command channel closed")?;
            }
            MeshEvent::PeerLeft(peer) => {
                debug!(peer = %peer.fmt_short(), "peer left");
            }
            MeshEvent::Message { from, payload } => {
                let op = match Op::decode(&payload) {
                    Ok(op) => op,
                    Err(err) => {
                        warn!(peer = %from.fmt_short(), ?err, "dropping undecodable message");
                        return Ok(());
                    }
                };
                self.on_op(from, op);
            }
        }
        Ok(())
    }

    fn on_op(&mut self, from: PeerId, op: Op) {
        match op {
            Op::Record(pin) => {
                if self.cache.contains(&pin.id) {
                    trace!(peer = %from.fmt_short(), id = %pin.id, "duplicate pin dropped");
                    return;
                }
                debug!(peer = %from.fmt_short(), id = %pin.id, "received pin");
                self.cache.insert(pin.clone());
                self.persist(&pin);
            }
            Op::Cache(pins) => {
                let added = self.cache.merge_batch(pins);
                debug!(peer = %from.fmt_short(), added = added.len(), "merged peer snapshot");
                for pin in &added {
                    self.persist(pin);
                }
            }
        }
    }

    /// A failed write is logged and otherwise ignored: the pin stays in the
    /// cache and will reach future peers via join snapshots.
    fn persist(&self, pin: &Pin) {
        if let Err(err) = self.store.put_pin(Namespace::Location, pin) {
            warn!(id = %pin.id, ?err, "failed to persist pin, keeping in cache");
        }
    }
}
