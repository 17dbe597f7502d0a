use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rusqlite::Connection;

use crate::error::Result;

const TTL: Duration = Duration::from_secs(60);

/// Coarse TTL cache of per-status application counts (spec §9 — "sidebar
/// cache"). Written lazily on read, invalidated eagerly on every transition.
/// Readers tolerate staleness up to 60s between writes.
pub struct SidebarCache {
    inner: Mutex<Option<(Instant, HashMap<String, i64>)>>,
}

impl Default for SidebarCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SidebarCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Force the next `counts()` call to recompute, regardless of TTL.
    pub fn invalidate(&self) {
        let mut guard = self.inner.lock().unwrap();
        *guard = None;
    }

    /// Per-status application counts, recomputed if stale.
    pub fn counts(&self, conn: &Connection) -> Result<HashMap<String, i64>> {
        let mut guard = self.inner.lock().unwrap();
        if let Some((fetched_at, counts)) = guard.as_ref() {
            if fetched_at.elapsed() < TTL {
                return Ok(counts.clone());
            }
        }
        let counts = compute_counts(conn)?;
        *guard = Some((Instant::now(), counts.clone()));
        Ok(counts)
    }
}

fn compute_counts(conn: &Connection) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM applications GROUP BY status")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::transition::create_application;

    #[test]
    fn counts_reflect_inserted_applications() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        create_application(&conn, 1, 1).unwrap();
        create_application(&conn, 2, 1).unwrap();
        let cache = SidebarCache::new();
        let counts = cache.counts(&conn).unwrap();
        assert_eq!(counts.get("PENDING_CALL"), Some(&2));
    }

    #[test]
    fn invalidate_forces_recompute() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        let cache = SidebarCache::new();
        cache.counts(&conn).unwrap();
        create_application(&conn, 1, 1).unwrap();
        cache.invalidate();
        let counts = cache.counts(&conn).unwrap();
        assert_eq!(counts.get("PENDING_CALL"), Some(&1));
    }
}
