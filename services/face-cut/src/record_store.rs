use crate::config::DatabaseConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// Link between a source photo and one face cut out of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceRecord {
    /// Random record ID
    pub id: i64,
    /// Object key of the source photo
    pub original_id: String,
    /// Object key of the cropped face
    pub face_id: String,
}

impl FaceRecord {
    /// New record with a uniformly random 64-bit ID. Collisions are not
    /// checked; the primary key rejects the insert if one ever happens.
    pub fn new(original_id: impl Into<String>, face_id: impl Into<String>) -> Self {
        Self {
            id: rand::thread_rng().gen::<i64>(),
            original_id: original_id.into(),
            face_id: face_id.into(),
        }
    }
}

/// Persistence of face records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FaceRecordStore: Send + Sync {
    /// Insert one record in its own committed transaction
    async fn insert(&self, record: &FaceRecord) -> Result<()>;

    /// Check the store is reachable
    async fn ping(&self) -> Result<()>;
}

/// `photo` table in PostgreSQL
pub struct PgFaceRecordStore {
    pool: PgPool,
}

impl PgFaceRecordStore {
    /// Create a new record store with connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let mut options = PgConnectOptions::from_str(&config.url)
            .context("Invalid PostgreSQL connection URL")?;

        if let Some(ref schema) = config.schema {
            options = options.options([("search_path", schema.as_str())]);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect_with(options)
            .await
            .context("Failed to connect to PostgreSQL")?;

        info!(
            schema = config.schema.as_deref().unwrap_or("public"),
            "Connected to PostgreSQL database"
        );

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }
}

#[async_trait]
impl FaceRecordStore for PgFaceRecordStore {
    #[instrument(skip(self, record), fields(id = record.id, face_id = %record.face_id))]
    async fn insert(&self, record: &FaceRecord) -> Result<()> {
        // Dropping the transaction on an error path rolls it back
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO photo (id, original_id, face_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(record.id)
        .bind(&record.original_id)
        .bind(&record.face_id)
        .execute(&mut *tx)
        .await
        .context("Failed to insert face record")?;

        tx.commit().await.context("Failed to commit transaction")?;

        debug!(original_id = %record.original_id, "Face record inserted");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database is not reachable")?;
        Ok(())
    }
}
