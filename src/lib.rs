//! Local-first, peer-synchronized store for geo-tagged annotation pins.
//!
//! Every peer keeps a durable local copy of all pins it has seen and
//! propagates new pins over an ad hoc peer-to-peer mesh; there is no server
//! of record, only eventually-consistent replication among participants.
//!
//! The crate provides the synchronization and persistence core: a bounded
//! deduplicated in-memory working set, a redb-backed store keyed for range
//! scans, an age-based retention sweep, and the replication actor reacting
//! to mesh events. The mesh transport itself is consumed through the channel
//! seam in [`mesh`]; bring your own transport adapter.

#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod mesh;
pub mod pin;
pub mod server;
pub mod sync;

mod cache;
mod identity;
mod store;
mod sweep;

pub use cache::{PinCache, MAX_CACHE_SIZE};
pub use identity::ClientIdentity;
pub use store::{Namespace, PinStore};
pub use sweep::sweep;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use tracing_test::traced_test;

    use crate::config::Config;
    use crate::mesh::{MeshCommand, MeshConn, MeshEvent, PeerId};
    use crate::pin::{now_micros, Pin, PinId};
    use crate::server::Server;
    use crate::store::{Namespace, PinStore};
    use crate::sync::{Op, SyncHandle};

    fn pin(id: &str) -> Pin {
        Pin {
            id: id.into(),
            ..Pin::placeholder()
        }
    }

    async fn wait_for_len(handle: &SyncHandle, len: usize) -> Result<Vec<Pin>> {
        for _ in 0..100 {
            let snapshot = handle.snapshot().await?;
            if snapshot.len() == len {
                return Ok(snapshot);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        anyhow::bail!("cache never reached {len} pins")
    }

    #[tokio::test]
    #[traced_test]
    async fn empty_start_receive_and_redeliver() -> Result<()> {
        let store = PinStore::in_memory()?;
        let (conn, mut adapter) = MeshConn::pair(16);
        let server = Server::spawn(Config::default(), store.clone(), conn)?;

        // fresh store: the sweep was a no-op, a new identity exists and the
        // hydrated cache is empty
        assert!(store.get_identity()?.is_some());
        assert!(server.sync().snapshot().await?.is_empty());

        let payload = Op::Record(pin("a")).encode()?;
        adapter
            .events
            .send(MeshEvent::Message {
                from: PeerId::from("peer-1"),
                payload: payload.clone(),
            })
            .await?;

        let snapshot = wait_for_len(server.sync(), 1).await?;
        assert_eq!(snapshot[0].id, PinId::from("a"));
        assert!(store.get_pin(Namespace::Location, &"a".into())?.is_some());

        // redelivery of the same message changes nothing; the join event
        // queued behind it proves it was processed
        adapter
            .events
            .send(MeshEvent::Message {
                from: PeerId::from("peer-1"),
                payload,
            })
            .await?;
        adapter
            .events
            .send(MeshEvent::PeerJoined(PeerId::from("peer-2")))
            .await?;

        let command = adapter.commands.recv().await.expect("command channel open");
        let MeshCommand::Send { to, payload } = command else {
            panic!("expected a direct send, got {command}");
        };
        assert_eq!(to, PeerId::from("peer-2"));
        let Op::Cache(pins) = Op::decode(&payload)? else {
            panic!("expected a cache snapshot");
        };
        let ids: Vec<_> = pins.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PinId::from("a")]);

        server.shutdown().await?;
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn restart_rehydrates_cache_and_identity() -> Result<()> {
        let store = PinStore::in_memory()?;

        let (conn, adapter) = MeshConn::pair(16);
        let server = Server::spawn(Config::default(), store.clone(), conn)?;
        let identity = server.identity().clone();
        adapter
            .events
            .send(MeshEvent::Message {
                from: PeerId::from("peer-1"),
                payload: Op::Record(pin("a")).encode()?,
            })
            .await?;
        wait_for_len(server.sync(), 1).await?;
        server.shutdown().await?;
        drop(adapter);

        let (conn, _adapter) = MeshConn::pair(16);
        let server = Server::spawn(Config::default(), store.clone(), conn)?;
        let snapshot = server.sync().snapshot().await?;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, PinId::from("a"));
        assert_eq!(server.identity(), &identity);
        server.shutdown().await?;
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn stale_pins_are_swept_before_hydration() -> Result<()> {
        let store = PinStore::in_memory()?;
        let old = Pin {
            created_at: now_micros() - Duration::from_secs(15 * 24 * 60 * 60).as_micros() as u64,
            ..pin("old")
        };
        store.put_pin(Namespace::Location, &old)?;
        store.put_pin(Namespace::Location, &pin("young"))?;

        let (conn, _adapter) = MeshConn::pair(16);
        let server = Server::spawn(Config::default(), store.clone(), conn)?;

        let snapshot = server.sync().snapshot().await?;
        let ids: Vec<_> = snapshot.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PinId::from("young")]);
        assert!(store.get_pin(Namespace::Location, &"old".into())?.is_none());

        server.shutdown().await?;
        Ok(())
    }
}
