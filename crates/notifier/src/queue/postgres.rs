use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use taskmail_common::types::{FailedJob, JobKind, QueuedJob};

use super::{JobQueue, QueueError};

/// Queue backed by the Postgres `jobs` and `failed_jobs` tables.
///
/// Claims use `FOR UPDATE SKIP LOCKED` so concurrent workers never see the
/// same row; moves between tables run in one transaction.
#[derive(Clone)]
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn push(
        &self,
        queue: &str,
        kind: JobKind,
        payload: serde_json::Value,
    ) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO jobs (id, queue, kind, payload, attempts, available_at)
            VALUES ($1, $2, $3, $4, 0, NOW())
            "#,
        )
        .bind(id)
        .bind(queue)
        .bind(kind.to_string())
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        tracing::debug!(job_id = %id, queue, kind = %kind, "Job queued");
        Ok(id)
    }

    async fn reserve(
        &self,
        queue: &str,
        reservation_timeout: Duration,
    ) -> Result<Option<QueuedJob>, QueueError> {
        let job: Option<QueuedJob> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET reserved_at = NOW(), attempts = attempts + 1
            WHERE id = (
                SELECT id FROM jobs
                WHERE queue = $1
                  AND (
                    (reserved_at IS NULL AND available_at <= NOW())
                    OR reserved_at <= NOW() - make_interval(secs => $2)
                  )
                ORDER BY available_at, created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(queue)
        .bind(reservation_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn delete(&self, job_id: Uuid) -> Result<(), QueueError> {
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn release(&self, job_id: Uuid, delay: Duration) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET reserved_at = NULL, available_at = NOW() + make_interval(secs => $2)
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(delay.as_secs_f64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(job_id));
        }
        Ok(())
    }

    async fn fail(&self, job: &QueuedJob, exception: &str) -> Result<(), QueueError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO failed_jobs (id, queue, kind, payload, exception, failed_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(job.id)
        .bind(&job.queue)
        .bind(job.kind.to_string())
        .bind(&job.payload)
        .bind(exception)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn pending_count(&self, kind: Option<JobKind>) -> Result<i64, QueueError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE ($1::text IS NULL OR kind = $1)")
                .bind(kind.map(|k| k.to_string()))
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn failed_count(&self, kind: Option<JobKind>) -> Result<i64, QueueError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM failed_jobs WHERE ($1::text IS NULL OR kind = $1)",
        )
        .bind(kind.map(|k| k.to_string()))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn recent_pending(
        &self,
        kind: JobKind,
        limit: i64,
    ) -> Result<Vec<QueuedJob>, QueueError> {
        let jobs: Vec<QueuedJob> = sqlx::query_as(
            "SELECT * FROM jobs WHERE kind = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(kind.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn recent_failed(&self, kind: JobKind, limit: i64) -> Result<Vec<FailedJob>, QueueError> {
        let jobs: Vec<FailedJob> = sqlx::query_as(
            "SELECT * FROM failed_jobs WHERE kind = $1 ORDER BY failed_at DESC LIMIT $2",
        )
        .bind(kind.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn retry_failed(&self, job_id: Uuid) -> Result<(), QueueError> {
        let mut tx = self.pool.begin().await?;

        let failed: FailedJob = sqlx::query_as("DELETE FROM failed_jobs WHERE id = $1 RETURNING *")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(QueueError::NotFound(job_id))?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, queue, kind, payload, attempts, available_at)
            VALUES ($1, $2, $3, $4, 0, NOW())
            "#,
        )
        .bind(failed.id)
        .bind(&failed.queue)
        .bind(failed.kind.to_string())
        .bind(&failed.payload)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn flush_failed(&self) -> Result<u64, QueueError> {
        let result = sqlx::query("DELETE FROM failed_jobs")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
