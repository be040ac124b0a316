//! On disk storage for pins, backed by redb.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use redb::{backends::InMemoryBackend, Database, ReadableTable, TableDefinition};
use tracing::info;

use crate::identity::ClientIdentity;
use crate::pin::{Pin, PinId};

// Pins
// Key: "<namespace>:<id>", or the fixed "client" row
// Value: postcard-encoded Pin (or ClientIdentity for "client")
const PINS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("pins-1");

const CLIENT_KEY: &str = "client";

/// A record class, used as a key prefix partitioning the store.
///
/// Both classes are subject to the same retention policy; only
/// [`Namespace::Location`] is written by the replication path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Pins received from or shared with peers.
    Location,
    /// Pins kept only on this device.
    Local,
}

impl Namespace {
    /// All record classes, in sweep order.
    pub const ALL: [Namespace; 2] = [Namespace::Location, Namespace::Local];

    /// The persisted key prefix for this class.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Location => "locationpins",
            Namespace::Local => "localpins",
        }
    }

    pub(crate) fn key(&self, id: &PinId) -> String {
        format!("{}:{}", self.as_str(), id)
    }

    fn range_bounds(&self) -> (String, String) {
        (format!("{}:", self.as_str()), format!("{}:~", self.as_str()))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyed durable storage for pins and the client identity.
///
/// Cheaply cloneable; all clones share one database.
#[derive(Debug, Clone)]
pub struct PinStore {
    db: Arc<Database>,
}

impl PinStore {
    /// Open or create the database at the given path.
    pub fn persistent(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("loading pin database from {}", path.to_string_lossy());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create database directory at {}",
                    path.to_string_lossy()
                )
            })?;
        }
        let db = Database::builder()
            .create(path)
            .context("failed to open pin database")?;
        Self::open(db)
    }

    /// Open a database that lives in memory only.
    pub fn in_memory() -> Result<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::open(db)
    }

    fn open(db: Database) -> Result<Self> {
        let write_tx = db.begin_write()?;
        {
            let _table = write_tx.open_table(PINS_TABLE)?;
        }
        write_tx.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Read the client identity, if one was created before.
    pub fn get_identity(&self) -> Result<Option<ClientIdentity>> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(PINS_TABLE)?;
        let Some(row) = table.get(CLIENT_KEY)? else {
            return Ok(None);
        };
        let identity = postcard::from_bytes(row.value()).context("malformed client identity")?;
        Ok(Some(identity))
    }

    /// Persist the client identity under the fixed `client` key.
    pub fn put_identity(&self, identity: &ClientIdentity) -> Result<()> {
        let value = postcard::to_stdvec(identity)?;
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(PINS_TABLE)?;
            table.insert(CLIENT_KEY, &value[..])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Read a single pin by namespace and id.
    pub fn get_pin(&self, ns: Namespace, id: &PinId) -> Result<Option<Pin>> {
        let key = ns.key(id);
        let tx = self.db.begin_read()?;
        let table = tx.open_table(PINS_TABLE)?;
        let Some(row) = table.get(key.as_str())? else {
            return Ok(None);
        };
        let pin = decode_pin(row.value())?;
        Ok(Some(pin))
    }

    /// Persist a pin under its namespace.
    pub fn put_pin(&self, ns: Namespace, pin: &Pin) -> Result<()> {
        let key = ns.key(&pin.id);
        let value = postcard::to_stdvec(pin)?;
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(PINS_TABLE)?;
            table.insert(key.as_str(), &value[..])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// All pins in a namespace, in key order.
    pub fn scan(&self, ns: Namespace) -> Result<Vec<Pin>> {
        let (low, high) = ns.range_bounds();
        let tx = self.db.begin_read()?;
        let table = tx.open_table(PINS_TABLE)?;
        let mut pins = Vec::new();
        for row in table.range(low.as_str()..high.as_str())? {
            let (_key, value) = row?;
            pins.push(decode_pin(value.value())?);
        }
        Ok(pins)
    }

    /// Remove all listed keys in one write transaction.
    ///
    /// Either every key is removed or, if the transaction fails, none are.
    /// Returns how many keys were actually present.
    pub fn remove_batch(&self, keys: &[String]) -> Result<usize> {
        let tx = self.db.begin_write()?;
        let mut removed = 0;
        {
            let mut table = tx.open_table(PINS_TABLE)?;
            for key in keys {
                if table.remove(key.as_str())?.is_some() {
                    removed += 1;
                }
            }
        }
        tx.commit()?;
        Ok(removed)
    }
}

fn decode_pin(bytes: &[u8]) -> Result<Pin> {
    postcard::from_bytes(bytes).context("malformed pin row")
}
