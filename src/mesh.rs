//! The peer-mesh capability seam.
//!
//! The transport itself (connection establishment, signaling, delivery) is
//! not part of this crate. A transport adapter owns a [`MeshAdapter`]: it
//! feeds peer and message events into the sync actor and drains send
//! commands for delivery. The sync actor only sees the [`MeshConn`] end.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Opaque identifier of a remote peer, assigned by the transport.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct PeerId(String);

impl PeerId {
    /// Shortened form for log output.
    pub fn fmt_short(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Topic the local peer joins on the mesh.
///
/// Derived from the application id and the room name, so peers using a
/// different application id (or room) land on a different topic and never
/// meet.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TopicId([u8; 32]);

impl TopicId {
    /// Derive the topic for an application id and room name.
    pub fn derive(application_id: &str, room: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(application_id.as_bytes());
        hasher.update(room.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// The raw topic bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&data_encoding::HEXLOWER.encode(&self.0))
    }
}

impl fmt::Debug for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopicId({self})")
    }
}

/// An event delivered by the transport.
#[derive(Debug, strum::Display)]
pub enum MeshEvent {
    /// A peer joined the topic.
    PeerJoined(PeerId),
    /// A peer left the topic.
    PeerLeft(PeerId),
    /// An encoded message arrived from a peer.
    Message {
        /// The sending peer.
        from: PeerId,
        /// Encoded [`crate::sync::Op`] payload.
        payload: Bytes,
    },
}

/// A delivery request handed back to the transport.
#[derive(Debug, strum::Display)]
pub enum MeshCommand {
    /// Deliver a payload to a single peer.
    Send {
        /// The receiving peer.
        to: PeerId,
        /// Encoded [`crate::sync::Op`] payload.
        payload: Bytes,
    },
    /// Deliver a payload to every connected peer.
    Broadcast {
        /// Encoded [`crate::sync::Op`] payload.
        payload: Bytes,
    },
}

/// The sync actor's end of the transport: events in, commands out.
#[derive(Debug)]
pub struct MeshConn {
    /// Events delivered by the transport, one at a time.
    pub events: mpsc::Receiver<MeshEvent>,
    /// Send commands for the transport to deliver.
    pub commands: mpsc::Sender<MeshCommand>,
}

/// The transport adapter's end, mirroring [`MeshConn`].
#[derive(Debug)]
pub struct MeshAdapter {
    /// Feed events into the sync actor.
    pub events: mpsc::Sender<MeshEvent>,
    /// Drain commands for delivery.
    pub commands: mpsc::Receiver<MeshCommand>,
}

impl MeshConn {
    /// Create a connected pair of channel ends with the given capacity.
    pub fn pair(cap: usize) -> (MeshConn, MeshAdapter) {
        let (event_tx, event_rx) = mpsc::channel(cap);
        let (command_tx, command_rx) = mpsc::channel(cap);
        (
            MeshConn {
                events: event_rx,
                commands: command_tx,
            },
            MeshAdapter {
                events: event_tx,
                commands: command_rx,
            },
        )
    }
}
