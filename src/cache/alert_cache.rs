use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::cache::store::TtlStore;
use crate::error::StoreError;
use crate::violation::{GridCell, ViolationHash};

pub const HASH_PREFIX: &str = "alert_hash:";
pub const SUPPRESSION_PREFIX: &str = "alert_suppression:";

/// Two independent TTL key spaces for one camera: violation hashes that
/// already alerted, and grid cells under suppression.
///
/// Every store failure is logged and treated as fail-open: predicates answer
/// `false` and mutations become no-ops, so detection keeps running without
/// rate-limiting until the store comes back.
#[derive(Clone)]
pub struct AlertCache {
    camera_id: String,
    store: Arc<dyn TtlStore>,
}

impl AlertCache {
    /// Key spaces of `camera_id` over a shared store.
    pub fn new(camera_id: impl Into<String>, store: Arc<dyn TtlStore>) -> Self {
        Self {
            camera_id: camera_id.into(),
            store,
        }
    }

    /// Camera whose keys this cache reads and writes.
    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// Record that `hash` alerted, for `ttl`.
    pub fn mark_alerted(&self, hash: &ViolationHash, ttl: Duration) {
        let key = hash_key(hash);
        // An existing entry keeps its original TTL.
        let _ = self.fail_open("mark_alerted", &key, self.store.set_if_absent(&key, ttl));
    }

    /// Whether `hash` alerted within its TTL. `false` if the store is down.
    pub fn is_alerted(&self, hash: &ViolationHash) -> bool {
        let key = hash_key(hash);
        self.fail_open("is_alerted", &key, self.store.exists(&key))
            .unwrap_or(false)
    }

    /// Open a suppression window for `cell`, or extend it if already open.
    pub fn suppress(&self, cell: GridCell, ttl: Duration) {
        let key = self.suppression_key(cell);
        let created = self.fail_open("suppress", &key, self.store.set_if_absent(&key, ttl));
        if created == Some(false) {
            let _ = self.fail_open("suppress", &key, self.store.expire(&key, ttl));
        }
    }

    /// Extend an open suppression window. No-op returning `false` when the
    /// cell is not suppressed; the caller decides whether to [`suppress`].
    ///
    /// [`suppress`]: AlertCache::suppress
    pub fn renew(&self, cell: GridCell, ttl: Duration) -> bool {
        let key = self.suppression_key(cell);
        self.fail_open("renew", &key, self.store.expire(&key, ttl))
            .unwrap_or(false)
    }

    /// Whether `cell` is under suppression. `false` if the store is down.
    pub fn is_suppressed(&self, cell: GridCell) -> bool {
        let key = self.suppression_key(cell);
        self.fail_open("is_suppressed", &key, self.store.exists(&key))
            .unwrap_or(false)
    }

    /// Lift the suppression on `cell` immediately.
    pub fn clear(&self, cell: GridCell) {
        let key = self.suppression_key(cell);
        let _ = self.fail_open("clear", &key, self.store.delete(&key));
    }

    /// Cells of this camera with an open suppression window.
    pub fn list_suppressed(&self) -> Vec<GridCell> {
        let prefix = format!("{SUPPRESSION_PREFIX}{}:", self.camera_id);
        let keys = self
            .fail_open("list_suppressed", &prefix, self.store.scan(&prefix))
            .unwrap_or_default();

        let mut cells: Vec<GridCell> = keys
            .iter()
            .filter_map(|key| {
                let rest = key.strip_prefix(&prefix)?;
                // `cam:x:y` also matches the prefix of camera `cam:x`.
                if rest.matches(':').count() != 1 {
                    return None;
                }
                let cell = parse_cell(rest);
                if cell.is_none() {
                    warn!(camera = %self.camera_id, key = %key, "unparseable suppression key");
                }
                cell
            })
            .collect();
        cells.sort();
        cells
    }

    fn suppression_key(&self, cell: GridCell) -> String {
        format!("{SUPPRESSION_PREFIX}{}:{}:{}", self.camera_id, cell.x, cell.y)
    }

    fn fail_open<T>(&self, op: &str, key: &str, result: Result<T, StoreError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    camera = %self.camera_id,
                    op,
                    key,
                    error = %err,
                    "ttl store call failed, continuing without rate limiting"
                );
                None
            }
        }
    }
}

fn hash_key(hash: &ViolationHash) -> String {
    format!("{HASH_PREFIX}{hash}")
}

fn parse_cell(rest: &str) -> Option<GridCell> {
    let (x, y) = rest.split_once(':')?;
    Some(GridCell::new(x.parse().ok()?, y.parse().ok()?))
}
