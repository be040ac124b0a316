//! Age-based garbage collection over persisted pins.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::pin::now_micros;
use crate::store::{Namespace, PinStore};

/// Delete all pins in a namespace older than the retention period.
///
/// Collects the stale keys from a range scan and removes them in a single
/// batch. Idempotent: a second sweep right after the first removes nothing.
///
/// Must run before the cache is hydrated, so reclaimed pins never enter the
/// working set; the sweep touches only the store.
pub fn sweep(store: &PinStore, ns: Namespace, retention: Duration) -> Result<usize> {
    let cutoff = now_micros().saturating_sub(retention.as_micros() as u64);
    let mut stale = Vec::new();
    for pin in store.scan(ns)? {
        if pin.created_at < cutoff {
            stale.push(ns.key(&pin.id));
        }
    }
    if stale.is_empty() {
        debug!(%ns, "retention sweep found nothing to remove");
        return Ok(0);
    }
    let removed = store.remove_batch(&stale)?;
    info!(%ns, removed, "retention sweep");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::Pin;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn pin_aged(id: &str, age: Duration) -> Pin {
        Pin {
            id: id.into(),
            created_at: now_micros() - age.as_micros() as u64,
            ..Pin::placeholder()
        }
    }

    #[test]
    fn removes_only_stale_pins() -> Result<()> {
        let store = PinStore::in_memory()?;
        store.put_pin(Namespace::Location, &pin_aged("old", 15 * DAY))?;
        store.put_pin(Namespace::Location, &pin_aged("young", DAY))?;

        let removed = sweep(&store, Namespace::Location, 14 * DAY)?;
        assert_eq!(removed, 1);
        assert!(store.get_pin(Namespace::Location, &"old".into())?.is_none());
        assert!(store
            .get_pin(Namespace::Location, &"young".into())?
            .is_some());

        // second run is a no-op
        let removed = sweep(&store, Namespace::Location, 14 * DAY)?;
        assert_eq!(removed, 0);
        Ok(())
    }

    #[test]
    fn namespaces_are_swept_independently() -> Result<()> {
        let store = PinStore::in_memory()?;
        store.put_pin(Namespace::Location, &pin_aged("old-loc", 15 * DAY))?;
        store.put_pin(Namespace::Local, &pin_aged("old-local", 15 * DAY))?;

        sweep(&store, Namespace::Location, 14 * DAY)?;
        assert!(store
            .get_pin(Namespace::Location, &"old-loc".into())?
            .is_none());
        assert!(store
            .get_pin(Namespace::Local, &"old-local".into())?
            .is_some());

        sweep(&store, Namespace::Local, 14 * DAY)?;
        assert!(store
            .get_pin(Namespace::Local, &"old-local".into())?
            .is_none());
        Ok(())
    }
}
