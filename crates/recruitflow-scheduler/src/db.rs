use rusqlite::Connection;

use crate::error::Result;
use crate::types::JobRun;

pub(crate) fn row_to_job_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRun> {
    Ok(JobRun {
        id: row.get(0)?,
        job_name: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        ok: row.get::<_, i64>(4)? != 0,
        detail: row.get(5)?,
    })
}

/// Initialise the scheduler's own schema — a run-history log, not a job
/// definition table, since the job set is fixed (spec §4.2).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS job_runs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            job_name        TEXT NOT NULL,
            started_at      TEXT NOT NULL,
            finished_at     TEXT,
            ok              INTEGER NOT NULL DEFAULT 0,
            detail          TEXT
         ) STRICT;
         CREATE INDEX IF NOT EXISTS idx_job_runs_job_name ON job_runs (job_name, started_at);",
    )?;
    Ok(())
}

pub(crate) fn start_run(conn: &Connection, job_name: &str, started_at: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO job_runs (job_name, started_at, ok) VALUES (?1, ?2, 0)",
        rusqlite::params![job_name, started_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn finish_run(conn: &Connection, run_id: i64, finished_at: &str, ok: bool, detail: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE job_runs SET finished_at = ?2, ok = ?3, detail = ?4 WHERE id = ?1",
        rusqlite::params![run_id, finished_at, ok as i64, detail],
    )?;
    Ok(())
}

/// Most recent run rows for a job, newest first — used by the operator CLI
/// and, potentially, a future dashboard.
pub fn list_recent_runs(conn: &Connection, job_name: &str, limit: u32) -> Result<Vec<JobRun>> {
    let mut stmt = conn.prepare(
        "SELECT id, job_name, started_at, finished_at, ok, detail
         FROM job_runs WHERE job_name = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![job_name, limit], row_to_job_run)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
