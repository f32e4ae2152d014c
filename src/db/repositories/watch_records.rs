use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_i64, to_u32, to_u64},
    models::{normalize_path_key, WatchRecord},
};

const WATCH_RECORD_COLUMNS: &str = "file_path, file_name, file_size, watched_date, watch_count, \
     last_position, total_duration, watched_percentage";

fn row_to_watch_record(row: &Row) -> Result<WatchRecord> {
    let file_size: i64 = row.get("file_size")?;
    let watch_count: i64 = row.get("watch_count")?;
    let watched_date: String = row.get("watched_date")?;

    Ok(WatchRecord {
        file_path: row.get("file_path")?,
        file_name: row.get("file_name")?,
        file_size: to_u64(file_size, "file_size")?,
        watch_count: to_u32(watch_count, "watch_count")?,
        last_position: row.get("last_position")?,
        total_duration: row.get("total_duration")?,
        watched_percentage: row.get("watched_percentage")?,
        watched_date: parse_datetime(&watched_date, "watched_date")?,
    })
}

impl Database {
    pub async fn get_watch_record(&self, file_path: &str) -> Result<Option<WatchRecord>> {
        let path_key = normalize_path_key(file_path);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WATCH_RECORD_COLUMNS} FROM watched_videos WHERE path_key = ?1"
            ))?;

            let mut rows = stmt.query(params![path_key])?;
            let record = match rows.next()? {
                Some(row) => Some(row_to_watch_record(row)?),
                None => None,
            };
            Ok(record)
        })
        .await
    }

    /// Insert or overwrite the progress of a record. Name and size keep the
    /// values from the first insert.
    pub async fn upsert_watch_record(&self, record: &WatchRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO watched_videos
                     (path_key, file_path, file_name, file_size, watched_date, watch_count,
                      last_position, total_duration, watched_percentage)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(path_key) DO UPDATE SET
                     watched_date = excluded.watched_date,
                     watch_count = excluded.watch_count,
                     last_position = excluded.last_position,
                     total_duration = excluded.total_duration,
                     watched_percentage = excluded.watched_percentage",
                params![
                    record.path_key(),
                    record.file_path,
                    record.file_name,
                    to_i64(record.file_size)?,
                    record.watched_date.to_rfc3339(),
                    i64::from(record.watch_count),
                    record.last_position,
                    record.total_duration,
                    record.watched_percentage,
                ],
            )
            .with_context(|| format!("failed to upsert watch record {}", record.file_path))?;
            Ok(())
        })
        .await
    }

    /// Record that a file was opened for playback. Creates the row with a zero
    /// watch count when absent, otherwise only touches `watched_date`.
    pub async fn ensure_watch_record(
        &self,
        file_path: &str,
        file_name: &str,
        file_size: u64,
        now: DateTime<Utc>,
    ) -> Result<WatchRecord> {
        let fresh = WatchRecord::new(file_path, file_name, file_size, now);
        self.execute(move |conn| {
            let path_key = fresh.path_key();
            conn.execute(
                "INSERT INTO watched_videos
                     (path_key, file_path, file_name, file_size, watched_date)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(path_key) DO UPDATE SET watched_date = excluded.watched_date",
                params![
                    path_key,
                    fresh.file_path,
                    fresh.file_name,
                    to_i64(fresh.file_size)?,
                    fresh.watched_date.to_rfc3339(),
                ],
            )
            .with_context(|| format!("failed to register playback of {}", fresh.file_path))?;

            let record = conn
                .query_row(
                    &format!(
                        "SELECT {WATCH_RECORD_COLUMNS} FROM watched_videos WHERE path_key = ?1"
                    ),
                    params![path_key],
                    |row| Ok(row_to_watch_record(row)),
                )
                .optional()?
                .context("watch record vanished after insert")??;
            Ok(record)
        })
        .await
    }

    pub async fn list_watch_records(&self) -> Result<Vec<WatchRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WATCH_RECORD_COLUMNS} FROM watched_videos ORDER BY watched_date DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_watch_record(row)?);
            }

            Ok(records)
        })
        .await
    }

    /// Returns whether a row was deleted.
    pub async fn remove_watch_record(&self, file_path: &str) -> Result<bool> {
        let path_key = normalize_path_key(file_path);
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM watched_videos WHERE path_key = ?1",
                params![path_key],
            )?;
            Ok(rows_affected > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn upsert_then_get_by_equivalent_path() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        let mut record = WatchRecord::new(r"C:\Videos\Film.mkv", "Film.mkv", 1024, now);
        record.watch_count = 1;
        record.last_position = 42.5;
        record.total_duration = 100.0;
        record.watched_percentage = 43.0;
        db.upsert_watch_record(&record).await.unwrap();

        let stored = db
            .get_watch_record("c:/videos/film.mkv")
            .await
            .unwrap()
            .expect("record should exist");
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn upsert_keeps_first_name_and_size() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        let original = WatchRecord::new("/v/a.mp4", "a.mp4", 10, now);
        db.upsert_watch_record(&original).await.unwrap();

        let later = now + Duration::seconds(5);
        let mut changed = WatchRecord::new("/v/a.mp4", "renamed.mp4", 99, later);
        changed.watch_count = 3;
        changed.last_position = 12.0;
        db.upsert_watch_record(&changed).await.unwrap();

        let stored = db.get_watch_record("/v/a.mp4").await.unwrap().unwrap();
        assert_eq!(stored.file_name, "a.mp4");
        assert_eq!(stored.file_size, 10);
        assert_eq!(stored.watch_count, 3);
        assert_eq!(stored.last_position, 12.0);
        assert_eq!(stored.watched_date, changed.watched_date);
    }

    #[tokio::test]
    async fn ensure_creates_once_without_counting() {
        let db = Database::in_memory().unwrap();
        let first = Utc::now();

        let created = db
            .ensure_watch_record("/v/b.mp4", "b.mp4", 2048, first)
            .await
            .unwrap();
        assert_eq!(created.watch_count, 0);
        assert_eq!(created.file_size, 2048);

        let mut progressed = created.clone();
        progressed.watch_count = 1;
        progressed.last_position = 30.0;
        db.upsert_watch_record(&progressed).await.unwrap();

        let later = first + Duration::minutes(1);
        let touched = db
            .ensure_watch_record("/V/B.mp4", "B.mp4", 1, later)
            .await
            .unwrap();
        assert_eq!(touched.watch_count, 1);
        assert_eq!(touched.last_position, 30.0);
        assert_eq!(touched.file_name, "b.mp4");
        assert_eq!(touched.watched_date, later);
    }

    #[tokio::test]
    async fn list_orders_by_most_recent_and_remove_deletes() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        let earlier = now - Duration::hours(1);
        db.upsert_watch_record(&WatchRecord::new("/v/old.mp4", "old.mp4", 1, earlier))
            .await
            .unwrap();
        db.upsert_watch_record(&WatchRecord::new("/v/new.mp4", "new.mp4", 1, now))
            .await
            .unwrap();

        let listed = db.list_watch_records().await.unwrap();
        let names: Vec<_> = listed.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["new.mp4", "old.mp4"]);

        assert!(db.remove_watch_record("/V/OLD.mp4").await.unwrap());
        assert!(!db.remove_watch_record("/v/old.mp4").await.unwrap());
        assert_eq!(db.list_watch_records().await.unwrap().len(), 1);
    }
}
