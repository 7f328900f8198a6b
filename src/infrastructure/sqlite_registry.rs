//! SQLite-backed [`Registry`] adapter, applied to `RepositoryRecord`.
//!
//! `fail`/`success` are each a single read-modify-write transaction so a
//! crash mid-update never leaves a torn record visible to the scheduler:
//! a repository's durable state commits before its next poll is scheduled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::RegistryError;
use crate::domain::models::RepositoryRecord;
use crate::domain::ports::Registry;

#[derive(Clone)]
pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &SqliteRow) -> Result<RepositoryRecord, RegistryError> {
        let id: String = row.get("id");
        let location = row
            .get::<Option<String>, _>("location")
            .map(|s| {
                url::Url::parse(&s).map_err(|e| RegistryError::MalformedRecord {
                    id: id.clone(),
                    reason: format!("invalid location url: {e}"),
                })
            })
            .transpose()?;
        let next = parse_optional_timestamp(&id, row.get::<Option<String>, _>("next"))?;
        let last = parse_optional_timestamp(&id, row.get::<Option<String>, _>("last"))?;
        let errors: i64 = row.get("errors");
        let successful_queries: i64 = row.get("successful_queries");

        Ok(RepositoryRecord {
            id,
            location,
            next,
            last,
            errors: errors.max(0) as u32,
            successful_queries: successful_queries.max(0) as u64,
        })
    }
}

fn parse_optional_timestamp(
    id: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RegistryError> {
    raw.map(|s| {
        s.parse::<DateTime<Utc>>()
            .map_err(|e| RegistryError::MalformedRecord {
                id: id.to_string(),
                reason: format!("invalid timestamp {s:?}: {e}"),
            })
    })
    .transpose()
}

#[async_trait]
impl Registry for SqliteRegistry {
    async fn get(&self, id: &str) -> Result<Option<RepositoryRecord>, RegistryError> {
        let row = sqlx::query("SELECT * FROM repositories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn get_all_ids(&self) -> Result<Vec<String>, RegistryError> {
        let rows = sqlx::query("SELECT id FROM repositories")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    async fn set(&self, record: RepositoryRecord) -> Result<(), RegistryError> {
        sqlx::query(
            "INSERT INTO repositories (id, location, next, last, errors, successful_queries) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             location = excluded.location, next = excluded.next, last = excluded.last, \
             errors = excluded.errors, successful_queries = excluded.successful_queries",
        )
        .bind(&record.id)
        .bind(record.location.as_ref().map(url::Url::to_string))
        .bind(record.next.map(|t| t.to_rfc3339()))
        .bind(record.last.map(|t| t.to_rfc3339()))
        .bind(i64::from(record.errors))
        .bind(record.successful_queries as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<RepositoryRecord, RegistryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM repositories WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let mut record = Self::row_to_record(&row)?;
        record.mark_failure();

        sqlx::query("UPDATE repositories SET errors = ? WHERE id = ?")
            .bind(i64::from(record.errors))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::warn!(repo_id = %id, errors = record.errors, reason = reason.unwrap_or("unspecified"), "repository poll failed");
        Ok(record)
    }

    async fn success(
        &self,
        id: &str,
        next_from: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<RepositoryRecord, RegistryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM repositories WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let mut record = Self::row_to_record(&row)?;
        record.mark_success(next_from, now);

        sqlx::query(
            "UPDATE repositories SET errors = 0, last = ?, next = ?, successful_queries = ? \
             WHERE id = ?",
        )
        .bind(record.last.map(|t| t.to_rfc3339()))
        .bind(record.next.map(|t| t.to_rfc3339()))
        .bind(record.successful_queries as i64)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::DatabaseConnection;

    async fn registry() -> (SqliteRegistry, DatabaseConnection) {
        let db = DatabaseConnection::new("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        (SqliteRegistry::new(db.pool().clone()), db)
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (reg, _db) = registry().await;
        let record = RepositoryRecord::new("repo-a", Some(url::Url::parse("http://a").unwrap()));
        reg.set(record.clone()).await.unwrap();
        let fetched = reg.get("repo-a").await.unwrap().unwrap();
        assert_eq!(fetched.id, "repo-a");
        assert_eq!(fetched.location, record.location);
    }

    #[tokio::test]
    async fn get_unknown_id_returns_none() {
        let (reg, _db) = registry().await;
        assert!(reg.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fail_increments_errors_and_leaves_next_untouched() {
        let (reg, _db) = registry().await;
        let mut record = RepositoryRecord::new("repo-a", None);
        record.next = Some("2020-01-01T00:00:00Z".parse().unwrap());
        reg.set(record).await.unwrap();

        let updated = reg.fail("repo-a", Some("boom")).await.unwrap();
        assert_eq!(updated.errors, 1);
        assert_eq!(
            updated.next,
            Some("2020-01-01T00:00:00Z".parse().unwrap())
        );

        let updated = reg.fail("repo-a", None).await.unwrap();
        assert_eq!(updated.errors, 2);
    }

    #[tokio::test]
    async fn success_resets_errors_and_advances_cursor() {
        let (reg, _db) = registry().await;
        reg.set(RepositoryRecord::new("repo-a", None)).await.unwrap();
        reg.fail("repo-a", None).await.unwrap();
        reg.fail("repo-a", None).await.unwrap();

        let next_from: DateTime<Utc> = "2021-06-01T00:00:00Z".parse().unwrap();
        let now: DateTime<Utc> = "2021-06-02T00:00:00Z".parse().unwrap();
        let updated = reg.success("repo-a", Some(next_from), now).await.unwrap();

        assert_eq!(updated.errors, 0);
        assert_eq!(updated.next, Some(next_from));
        assert_eq!(updated.last, Some(now));
        assert_eq!(updated.successful_queries, 1);
    }

    #[tokio::test]
    async fn unknown_repository_fails_on_fail_and_success() {
        let (reg, _db) = registry().await;
        assert!(matches!(
            reg.fail("ghost", None).await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            reg.success("ghost", None, Utc::now()).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn survives_reopen_of_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        let url = format!("sqlite:{}", path.display());

        {
            let db = DatabaseConnection::new(&url).await.unwrap();
            db.migrate().await.unwrap();
            let reg = SqliteRegistry::new(db.pool().clone());
            reg.set(RepositoryRecord::new("repo-a", None)).await.unwrap();
            db.close().await;
        }

        let db = DatabaseConnection::new(&url).await.unwrap();
        db.migrate().await.unwrap();
        let reg = SqliteRegistry::new(db.pool().clone());
        assert!(reg.get("repo-a").await.unwrap().is_some());
    }
}
