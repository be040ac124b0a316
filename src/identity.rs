//! One-time bootstrap of the local anonymous identity.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::PinStore;

const SALT: &str = "salt1234";
const SEQUENCE_ID: u64 = 1;

/// The local peer's self-description.
///
/// Created lazily on first run, persisted, and reused across restarts. Never
/// mutated afterwards. The `application_id` scopes peer discovery: peers
/// derived from different application ids never meet on the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// Fixed row id; there is a single local identity per store.
    pub sequence_id: u64,
    /// Randomly generated handle, created once.
    pub handle: String,
    /// Digest of the handle and a fixed salt, hex encoded.
    pub application_id: String,
}

impl ClientIdentity {
    /// Load the identity from the store, creating and persisting a new one
    /// if none exists yet.
    ///
    /// Storage errors other than the expected first-run miss propagate; the
    /// process cannot proceed without an identity.
    pub fn load_or_create(store: &PinStore) -> Result<Self> {
        if let Some(identity) = store.get_identity()? {
            debug!(application_id = %identity.application_id, "loaded client identity");
            return Ok(identity);
        }
        let handle = Uuid::new_v4().to_string();
        let identity = Self {
            sequence_id: SEQUENCE_ID,
            handle: handle.clone(),
            application_id: derive_application_id(&handle),
        };
        store.put_identity(&identity)?;
        info!(application_id = %identity.application_id, "created new client identity");
        Ok(identity)
    }
}

fn derive_application_id(handle: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(handle.as_bytes());
    hasher.update(SALT.as_bytes());
    data_encoding::HEXLOWER.encode(hasher.finalize().as_bytes())
}
