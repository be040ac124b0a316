//! Startup sequencing and the long-running service handle.

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::PinCache;
use crate::config::Config;
use crate::identity::ClientIdentity;
use crate::mesh::{MeshConn, TopicId};
use crate::store::{Namespace, PinStore};
use crate::sweep::sweep;
use crate::sync::{SyncActor, SyncHandle};

const MESH_CHANNEL_CAP: usize = 64;

/// Open the persistent store, spawn the service and run until the `Ctrl-C`
/// signal is received, then shutdown.
///
/// The returned mesh adapter end stays idle here; embedding processes that
/// bring their own transport should use [`Server::spawn`] directly.
pub async fn run_with_config_until_ctrl_c(config: Config) -> Result<()> {
    let store = PinStore::persistent(config.store_path()?)?;
    let (conn, _adapter) = MeshConn::pair(MESH_CHANNEL_CAP);
    let server = Server::spawn(config, store, conn)?;
    info!(topic = %server.topic(), "ready, waiting for mesh events");
    tokio::signal::ctrl_c().await?;
    info!("shutdown");
    server.shutdown().await?;
    Ok(())
}

/// The running service.
///
/// Startup runs strictly in sequence: retention sweeps first, then identity
/// bootstrap, then cache hydration from the swept store, and only then the
/// replication actor. Reclaimed pins therefore never enter the working set,
/// and the sweep never runs concurrently with replication.
#[derive(Debug)]
pub struct Server {
    sync: SyncHandle,
    task: JoinHandle<()>,
    topic: TopicId,
    identity: ClientIdentity,
}

impl Server {
    /// Run the startup sequence and spawn the replication actor.
    ///
    /// Any failure here aborts startup; the process must not continue from a
    /// partially swept or partially hydrated state.
    pub fn spawn(config: Config, store: PinStore, conn: MeshConn) -> Result<Self> {
        for ns in Namespace::ALL {
            sweep(&store, ns, config.retention)?;
        }

        let identity = ClientIdentity::load_or_create(&store)?;
        let topic = TopicId::derive(&identity.application_id, &config.room);

        let mut cache = PinCache::new();
        let loaded = cache.merge_batch(store.scan(Namespace::Location)?).len();
        debug!(loaded, "hydrated pin cache");

        let (sync, task) = SyncActor::spawn(cache, store, conn);
        Ok(Self {
            sync,
            task,
            topic,
            identity,
        })
    }

    /// The mesh topic this peer participates in, for the transport to join.
    pub fn topic(&self) -> TopicId {
        self.topic
    }

    /// The local identity.
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Handle to the replication actor.
    pub fn sync(&self) -> &SyncHandle {
        &self.sync
    }

    /// Stop the replication actor and wait for it to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.sync.shutdown().await?;
        self.task.await?;
        Ok(())
    }
}
