use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::{connection::Database, helpers::parse_datetime, models::BrowseState};

impl Database {
    /// Last remembered folder, `None` until something has been saved.
    pub async fn browse_state(&self) -> Result<Option<BrowseState>> {
        self.execute(|conn| {
            let row = conn
                .query_row(
                    "SELECT last_folder, last_path, last_updated FROM app_state WHERE id = 1",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;

            match row {
                Some((last_folder, last_path, last_updated)) => Ok(Some(BrowseState {
                    last_folder,
                    last_path,
                    last_updated: parse_datetime(&last_updated, "last_updated")?,
                })),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn save_browse_state(&self, folder: &str, path: &str) -> Result<()> {
        let folder = folder.to_string();
        let path = path.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO app_state (id, last_folder, last_path, last_updated)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     last_folder = excluded.last_folder,
                     last_path = excluded.last_path,
                     last_updated = excluded.last_updated",
                params![folder, path, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn browse_state_is_a_single_overwritten_row() {
        let db = Database::in_memory().unwrap();
        assert!(db.browse_state().await.unwrap().is_none());

        db.save_browse_state("/media", "/media").await.unwrap();
        db.save_browse_state("/media", "/media/shows").await.unwrap();

        let state = db.browse_state().await.unwrap().unwrap();
        assert_eq!(state.last_folder, "/media");
        assert_eq!(state.last_path, "/media/shows");
        assert!(!state.is_empty());

        db.save_browse_state("", "").await.unwrap();
        assert!(db.browse_state().await.unwrap().unwrap().is_empty());
    }
}
