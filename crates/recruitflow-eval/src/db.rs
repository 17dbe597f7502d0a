use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Result};

use crate::types::{Evaluation, EvaluationOutcome};

fn row_to_evaluation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Evaluation> {
    let outcome = EvaluationOutcome::from_str(&row.get::<_, String>(3)?)
        .map_err(|_| rusqlite::Error::InvalidColumnType(3, "outcome".into(), rusqlite::types::Type::Text))?;
    Ok(Evaluation {
        id: row.get(0)?,
        application_id: row.get(1)?,
        call_id: row.get(2)?,
        outcome,
        qualified: row.get::<_, i64>(4)? != 0,
        score: row.get(5)?,
        reasoning: row.get(6)?,
        callback_requested: row.get::<_, i64>(7)? != 0,
        callback_notes: row.get(8)?,
        callback_at: row.get(9)?,
        needs_human: row.get::<_, i64>(10)? != 0,
        needs_human_notes: row.get(11)?,
        raw_response: row.get(12)?,
        evaluated_at: row.get(13)?,
    })
}

const EVALUATION_SELECT_SQL: &str = "SELECT id, application_id, call_id, outcome, qualified, score,
            reasoning, callback_requested, callback_notes, callback_at,
            needs_human, needs_human_notes, raw_response, evaluated_at
     FROM evaluations";

pub fn init_db(conn: &Connection) -> Result<()> {
    // call_id is UNIQUE — "at most one evaluation per call" (spec §3), the
    // invariant the idempotency re-check in evaluate_call() relies on.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS evaluations (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            application_id      INTEGER NOT NULL,
            call_id             INTEGER NOT NULL UNIQUE,
            outcome             TEXT NOT NULL,
            qualified           INTEGER NOT NULL,
            score               INTEGER NOT NULL,
            reasoning           TEXT NOT NULL,
            callback_requested  INTEGER NOT NULL DEFAULT 0,
            callback_notes      TEXT,
            callback_at         TEXT,
            needs_human         INTEGER NOT NULL DEFAULT 0,
            needs_human_notes   TEXT,
            raw_response        TEXT NOT NULL,
            evaluated_at        TEXT NOT NULL
        ) STRICT;",
    )
}

pub fn get_evaluation_by_call(conn: &Connection, call_id: i64) -> Result<Option<Evaluation>> {
    let mut stmt = conn.prepare(&format!("{EVALUATION_SELECT_SQL} WHERE call_id = ?1"))?;
    stmt.query_row(params![call_id], row_to_evaluation).optional()
}

#[allow(clippy::too_many_arguments)]
pub fn insert_evaluation(
    conn: &Connection,
    application_id: i64,
    call_id: i64,
    outcome: EvaluationOutcome,
    qualified: bool,
    score: i32,
    reasoning: &str,
    callback_requested: bool,
    callback_notes: Option<&str>,
    callback_at: Option<&str>,
    needs_human: bool,
    needs_human_notes: Option<&str>,
    raw_response: &str,
    evaluated_at: &str,
) -> Result<Evaluation> {
    conn.execute(
        "INSERT INTO evaluations
            (application_id, call_id, outcome, qualified, score, reasoning,
             callback_requested, callback_notes, callback_at, needs_human,
             needs_human_notes, raw_response, evaluated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
        params![
            application_id,
            call_id,
            outcome.as_str(),
            qualified as i32,
            score,
            reasoning,
            callback_requested as i32,
            callback_notes,
            callback_at,
            needs_human as i32,
            needs_human_notes,
            raw_response,
            evaluated_at,
        ],
    )?;
    get_evaluation_by_call(conn, call_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}
