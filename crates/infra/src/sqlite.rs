//! Durable SQLite job store.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use domainforge_core::{
    DomainJob, DomainRegistrant, JobId, JobMetadata, JobStatus, PageId, ProvisionStep,
    RegistrantId,
};

use crate::store::{JobStore, PageDomainState, StoreError};

/// SQLite-backed [`JobStore`].
///
/// Timestamps are stored as fixed-width RFC 3339 strings so lexicographic
/// comparison in SQL matches chronological order. The claim is a single
/// conditional `UPDATE`; SQLite serializes writers, so `rows_affected`
/// reports exactly one winner per pending job.
#[derive(Debug, Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

/// Fixed-width RFC 3339 (microseconds, `Z` suffix).
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid {column}: {e}")))
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool against `url` (e.g. `sqlite://domainforge.db?mode=rwc`)
    /// and bootstrap the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new().connect(url).await?;
        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Create tables and indices if they do not exist.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS domain_jobs (
                id            TEXT PRIMARY KEY,
                page_id       TEXT NOT NULL,
                domain        TEXT NOT NULL,
                status        TEXT NOT NULL,
                step          TEXT NOT NULL,
                attempts      INTEGER NOT NULL,
                max_attempts  INTEGER NOT NULL,
                last_error    TEXT NULL,
                metadata      TEXT NOT NULL,
                scheduled_for TEXT NULL,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL,
                completed_at  TEXT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_domain_jobs_due
             ON domain_jobs (status, scheduled_for)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_domain_jobs_page
             ON domain_jobs (page_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS domain_registrants (
                id          TEXT PRIMARY KEY,
                first_name  TEXT NOT NULL,
                last_name   TEXT NOT NULL,
                email       TEXT NOT NULL,
                phone       TEXT NOT NULL,
                street      TEXT NOT NULL,
                city        TEXT NOT NULL,
                state       TEXT NOT NULL,
                postal_code TEXT NOT NULL,
                country     TEXT NOT NULL,
                client_ip   TEXT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS page_domain_state (
                page_id         TEXT PRIMARY KEY,
                domain_status   TEXT NOT NULL,
                domain_verified INTEGER NOT NULL,
                ssl_status      TEXT NULL,
                updated_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn job_from_row(row: &SqliteRow) -> Result<DomainJob, StoreError> {
        let id_str: String = row.try_get("id")?;
        let id = JobId::from_str(&id_str)
            .map_err(|e| StoreError::Corrupt(format!("invalid job id: {e}")))?;

        let page_str: String = row.try_get("page_id")?;
        let page_id = PageId::from_str(&page_str)
            .map_err(|e| StoreError::Corrupt(format!("invalid page id: {e}")))?;

        let status_str: String = row.try_get("status")?;
        let status = JobStatus::from_str(&status_str)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let step_str: String = row.try_get("step")?;
        let step = ProvisionStep::from_str(&step_str)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let metadata_str: String = row.try_get("metadata")?;
        let metadata: JobMetadata = serde_json::from_str(&metadata_str)
            .map_err(|e| StoreError::Corrupt(format!("invalid metadata: {e}")))?;

        let attempts: i64 = row.try_get("attempts")?;
        let max_attempts: i64 = row.try_get("max_attempts")?;

        let scheduled_for = row
            .try_get::<Option<String>, _>("scheduled_for")?
            .map(|s| parse_ts(&s, "scheduled_for"))
            .transpose()?;
        let completed_at = row
            .try_get::<Option<String>, _>("completed_at")?
            .map(|s| parse_ts(&s, "completed_at"))
            .transpose()?;

        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(DomainJob {
            id,
            page_id,
            domain: row.try_get("domain")?,
            status,
            step,
            attempts: attempts as u32,
            max_attempts: max_attempts as u32,
            last_error: row.try_get("last_error")?,
            metadata,
            scheduled_for,
            created_at: parse_ts(&created_at, "created_at")?,
            updated_at: parse_ts(&updated_at, "updated_at")?,
            completed_at,
        })
    }

    fn registrant_from_row(row: &SqliteRow) -> Result<DomainRegistrant, StoreError> {
        let id_str: String = row.try_get("id")?;
        let id = RegistrantId::from_str(&id_str)
            .map_err(|e| StoreError::Corrupt(format!("invalid registrant id: {e}")))?;
        let created_at: String = row.try_get("created_at")?;

        Ok(DomainRegistrant {
            id,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            street: row.try_get("street")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            postal_code: row.try_get("postal_code")?,
            country: row.try_get("country")?,
            client_ip: row.try_get("client_ip")?,
            created_at: parse_ts(&created_at, "created_at")?,
        })
    }

    fn metadata_json(job: &DomainJob) -> Result<String, StoreError> {
        serde_json::to_string(&job.metadata)
            .map_err(|e| StoreError::Corrupt(format!("unserializable metadata: {e}")))
    }
}

const JOB_COLUMNS: &str = "id, page_id, domain, status, step, attempts, max_attempts, \
                           last_error, metadata, scheduled_for, created_at, updated_at, \
                           completed_at";

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert_job(&self, job: &DomainJob) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO domain_jobs (
                id, page_id, domain, status, step, attempts, max_attempts,
                last_error, metadata, scheduled_for, created_at, updated_at,
                completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(job.id.to_string())
        .bind(job.page_id.to_string())
        .bind(&job.domain)
        .bind(job.status.as_str())
        .bind(job.step.as_str())
        .bind(job.attempts as i64)
        .bind(job.max_attempts as i64)
        .bind(&job.last_error)
        .bind(Self::metadata_json(job)?)
        .bind(job.scheduled_for.map(fmt_ts))
        .bind(fmt_ts(job.created_at))
        .bind(fmt_ts(job.updated_at))
        .bind(job.completed_at.map(fmt_ts))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(job.id));
        }
        Ok(())
    }

    async fn job(&self, id: JobId) -> Result<Option<DomainJob>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM domain_jobs WHERE id = ?1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::job_from_row).transpose()
    }

    async fn update_job(&self, job: &DomainJob) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE domain_jobs
            SET status = ?2,
                step = ?3,
                attempts = ?4,
                max_attempts = ?5,
                last_error = ?6,
                metadata = ?7,
                scheduled_for = ?8,
                updated_at = ?9,
                completed_at = ?10
            WHERE id = ?1
            "#,
        )
        .bind(job.id.to_string())
        .bind(job.status.as_str())
        .bind(job.step.as_str())
        .bind(job.attempts as i64)
        .bind(job.max_attempts as i64)
        .bind(&job.last_error)
        .bind(Self::metadata_json(job)?)
        .bind(job.scheduled_for.map(fmt_ts))
        .bind(fmt_ts(job.updated_at))
        .bind(job.completed_at.map(fmt_ts))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::JobNotFound(job.id));
        }
        Ok(())
    }

    async fn claim(&self, id: JobId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE domain_jobs
            SET status = 'processing', updated_at = ?2
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id.to_string())
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn due_jobs(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<DomainJob>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM domain_jobs
            WHERE status = 'pending'
              AND (scheduled_for IS NULL OR scheduled_for <= ?1)
            ORDER BY created_at ASC
            LIMIT ?2
            "#
        ))
        .bind(fmt_ts(now))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::job_from_row).collect()
    }

    async fn latest_job_for_page(
        &self,
        page_id: PageId,
    ) -> Result<Option<DomainJob>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM domain_jobs
            WHERE page_id = ?1
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(page_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::job_from_row).transpose()
    }

    async fn insert_registrant(&self, registrant: &DomainRegistrant) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO domain_registrants (
                id, first_name, last_name, email, phone, street, city, state,
                postal_code, country, client_ip, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(registrant.id.to_string())
        .bind(&registrant.first_name)
        .bind(&registrant.last_name)
        .bind(&registrant.email)
        .bind(&registrant.phone)
        .bind(&registrant.street)
        .bind(&registrant.city)
        .bind(&registrant.state)
        .bind(&registrant.postal_code)
        .bind(&registrant.country)
        .bind(&registrant.client_ip)
        .bind(fmt_ts(registrant.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn registrant(
        &self,
        id: RegistrantId,
    ) -> Result<Option<DomainRegistrant>, StoreError> {
        let row = sqlx::query("SELECT * FROM domain_registrants WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::registrant_from_row).transpose()
    }

    async fn page_state(&self, page_id: PageId) -> Result<Option<PageDomainState>, StoreError> {
        let row = sqlx::query(
            "SELECT page_id, domain_status, domain_verified, ssl_status
             FROM page_domain_state WHERE page_id = ?1",
        )
        .bind(page_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let page_str: String = row.try_get("page_id")?;
        let page_id = PageId::from_str(&page_str)
            .map_err(|e| StoreError::Corrupt(format!("invalid page id: {e}")))?;
        let verified: i64 = row.try_get("domain_verified")?;

        Ok(Some(PageDomainState {
            page_id,
            domain_status: row.try_get("domain_status")?,
            domain_verified: verified != 0,
            ssl_status: row.try_get("ssl_status")?,
        }))
    }

    async fn set_page_domain_active(&self, page_id: PageId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO page_domain_state (page_id, domain_status, domain_verified, ssl_status, updated_at)
            VALUES (?1, 'active', 1, NULL, ?2)
            ON CONFLICT (page_id) DO UPDATE
            SET domain_status = 'active', domain_verified = 1, updated_at = ?2
            "#,
        )
        .bind(page_id.to_string())
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_page_ssl_status(
        &self,
        page_id: PageId,
        ssl_status: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO page_domain_state (page_id, domain_status, domain_verified, ssl_status, updated_at)
            VALUES (?1, 'pending', 0, ?2, ?3)
            ON CONFLICT (page_id) DO UPDATE
            SET ssl_status = ?2, updated_at = ?3
            "#,
        )
        .bind(page_id.to_string())
        .bind(ssl_status)
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainforge_core::RetryPolicy;

    async fn test_store() -> SqliteJobStore {
        // A single connection keeps every query on the same in-memory DB.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteJobStore::new(pool);
        store.init_schema().await.unwrap();
        store
    }

    fn test_job() -> DomainJob {
        DomainJob::new(PageId::new(), "example.com", RegistrantId::new())
    }

    fn test_registrant() -> DomainRegistrant {
        DomainRegistrant {
            id: RegistrantId::new(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "555-123-4567".into(),
            street: "1 Analytical Way".into(),
            city: "London".into(),
            state: "LDN".into(),
            postal_code: "SW1A".into(),
            country: "GB".into(),
            client_ip: Some("203.0.113.7".into()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn job_round_trips_through_storage() {
        let store = test_store().await;
        let mut job = test_job();
        job.metadata.registrar_order_id = Some("ORD-1".into());
        job.record_failure("network timeout", &RetryPolicy::default())
            .unwrap();
        store.insert_job(&job).await.unwrap();

        let loaded = store.job(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.domain, job.domain);
        assert_eq!(loaded.status, job.status);
        assert_eq!(loaded.step, job.step);
        assert_eq!(loaded.attempts, 1);
        assert_eq!(loaded.metadata, job.metadata);
        assert_eq!(loaded.last_error.as_deref(), Some("network timeout"));
        // Microsecond precision survives the fixed-width encoding.
        assert_eq!(
            loaded.scheduled_for.map(fmt_ts),
            job.scheduled_for.map(fmt_ts)
        );
    }

    #[tokio::test]
    async fn claim_flips_exactly_one_pending_row() {
        let store = test_store().await;
        let job = test_job();
        store.insert_job(&job).await.unwrap();

        assert!(store.claim(job.id).await.unwrap());
        assert!(!store.claim(job.id).await.unwrap());

        let loaded = store.job(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn claim_ignores_terminal_jobs() {
        let store = test_store().await;
        let mut job = test_job();
        job.complete().unwrap();
        store.insert_job(&job).await.unwrap();

        assert!(!store.claim(job.id).await.unwrap());
    }

    #[tokio::test]
    async fn due_scan_skips_future_jobs() {
        let store = test_store().await;
        let now = Utc::now();

        let mut immediate = test_job();
        immediate.created_at = now - chrono::Duration::minutes(1);
        let mut deferred = test_job();
        deferred.scheduled_for = Some(now + chrono::Duration::minutes(5));
        store.insert_job(&immediate).await.unwrap();
        store.insert_job(&deferred).await.unwrap();

        let due = store.due_jobs(now, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, immediate.id);

        let later = store
            .due_jobs(now + chrono::Duration::minutes(6), 10)
            .await
            .unwrap();
        assert_eq!(later.len(), 2);

        // The batch bound truncates after ordering, keeping the oldest.
        let capped = store
            .due_jobs(now + chrono::Duration::minutes(6), 1)
            .await
            .unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, immediate.id);
    }

    #[tokio::test]
    async fn registrant_round_trips() {
        let store = test_store().await;
        let registrant = test_registrant();
        store.insert_registrant(&registrant).await.unwrap();

        let loaded = store.registrant(registrant.id).await.unwrap().unwrap();
        assert_eq!(loaded.email, registrant.email);
        assert_eq!(loaded.client_ip, registrant.client_ip);
    }

    #[tokio::test]
    async fn page_state_writes_compose() {
        let store = test_store().await;
        let page_id = PageId::new();

        store.set_page_ssl_status(page_id, "active").await.unwrap();
        store.set_page_domain_active(page_id).await.unwrap();

        let state = store.page_state(page_id).await.unwrap().unwrap();
        assert_eq!(state.domain_status, "active");
        assert!(state.domain_verified);
        assert_eq!(state.ssl_status.as_deref(), Some("active"));
    }

    #[tokio::test]
    async fn corrupt_rows_surface_loudly() {
        let store = test_store().await;
        let job = test_job();
        store.insert_job(&job).await.unwrap();

        sqlx::query("UPDATE domain_jobs SET step = 'verify_dns' WHERE id = ?1")
            .bind(job.id.to_string())
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(matches!(
            store.job(job.id).await,
            Err(StoreError::Corrupt(_))
        ));
    }
}
