//! CV file storage (spec §5 "Shared resources"): new files are written
//! under a UUID-prefixed name to avoid collisions, and a file is only
//! physically deleted once no remaining `cv_uploads` row references its
//! path.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::Result;

/// Write `content` under `dir` as `{uuid}-{file_name}`, creating `dir` if
/// it doesn't exist yet, and return the resulting path as a string.
pub async fn store_cv_file(dir: &str, file_name: &str, content: &[u8]) -> Result<String> {
    tokio::fs::create_dir_all(dir).await?;
    let stored_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(file_name));
    let path = std::path::Path::new(dir).join(stored_name);
    tokio::fs::write(&path, content).await?;
    Ok(path.to_string_lossy().into_owned())
}

/// Drop any path component from `file_name` so it can't escape `dir`.
fn sanitize_file_name(file_name: &str) -> String {
    file_name.rsplit(['/', '\\']).next().unwrap_or(file_name).to_string()
}

/// Delete the file at `file_path` only if no `cv_uploads` row still
/// references it. Safe to call with an empty path (manual-assignment
/// uploads have none) or a path whose file is already gone.
pub fn delete_if_orphaned(conn: &Connection, file_path: &str) -> Result<()> {
    if file_path.is_empty() {
        return Ok(());
    }
    let refcount: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cv_uploads WHERE file_path = ?1",
        params![file_path],
        |row| row.get(0),
    )?;
    if refcount > 0 {
        return Ok(());
    }
    match std::fs::remove_file(file_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(label: &str) -> String {
        std::env::temp_dir().join(format!("recruitflow-test-{label}-{}", Uuid::new_v4())).to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn stored_file_name_is_uuid_prefixed_and_readable() {
        let dir = scratch_dir("store");
        let path = store_cv_file(&dir, "resume.pdf", b"hello").await.unwrap();

        assert!(path.ends_with("-resume.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn two_uploads_of_the_same_file_name_do_not_collide() {
        let dir = scratch_dir("collide");
        let a = store_cv_file(&dir, "cv.pdf", b"one").await.unwrap();
        let b = store_cv_file(&dir, "cv.pdf", b"two").await.unwrap();

        assert_ne!(a, b);
        assert_eq!(std::fs::read(&a).unwrap(), b"one");
        assert_eq!(std::fs::read(&b).unwrap(), b"two");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn file_with_path_separators_is_sanitized_into_dir() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("..\\windows\\evil.exe"), "evil.exe");
    }

    #[test]
    fn orphaned_path_with_no_referencing_row_is_deleted() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        let dir = scratch_dir("orphan");
        std::fs::create_dir_all(&dir).unwrap();
        let path = std::path::Path::new(&dir).join("dangling.pdf");
        std::fs::write(&path, b"x").unwrap();

        delete_if_orphaned(&conn, &path.to_string_lossy()).unwrap();
        assert!(!path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn path_still_referenced_by_a_row_is_kept() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        let dir = scratch_dir("kept");
        std::fs::create_dir_all(&dir).unwrap();
        let path = std::path::Path::new(&dir).join("kept.pdf");
        std::fs::write(&path, b"x").unwrap();

        conn.execute(
            "INSERT INTO cv_uploads (application_id, file_name, file_path, source, match_method, needs_review, received_at)
             VALUES (1, 'kept.pdf', ?1, 'EMAIL', 'MANUAL', 0, '2026-01-01T00:00:00Z')",
            params![path.to_string_lossy()],
        )
        .unwrap();

        delete_if_orphaned(&conn, &path.to_string_lossy()).unwrap();
        assert!(path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
