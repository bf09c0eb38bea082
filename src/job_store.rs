use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use thiserror::Error;

use crate::job::{CrossLoadStatus, JobRecord};

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job store query failed: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("job store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view over the job table; the cross loader never writes job
/// records itself.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Snapshot of the job records currently in `status`.
    async fn jobs_in_cross_load_status(
        &self,
        status: CrossLoadStatus,
    ) -> Result<Vec<JobRecord>, JobStoreError>;
}

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(
        connection_string: &str,
        max_connections: u32,
    ) -> Result<Self, JobStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn jobs_in_cross_load_status(
        &self,
        status: CrossLoadStatus,
    ) -> Result<Vec<JobRecord>, JobStoreError> {
        let rows = sqlx::query(
            "SELECT job_id, date_time_updated_utc FROM job WHERE cross_loading_status = $1",
        )
        .bind(status.code())
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(JobRecord {
                job_id: row.try_get::<i64, _>("job_id")?,
                cross_load_status: status,
                last_updated_utc: row
                    .try_get::<Option<DateTime<Utc>>, _>("date_time_updated_utc")?,
            });
        }
        Ok(records)
    }
}
