use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Registry of per-match mutexes. Appends for the same match serialize so the
/// (quarter, clock) order the aggregation fold sees is stable; appends and
/// recomputes for different matches never contend with each other.
#[derive(Clone, Default)]
pub struct MatchLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl MatchLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for one match; created on first use
    pub fn for_match(&self, match_id: i64) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap();
        map.entry(match_id).or_default().clone()
    }
}
