use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema on an open pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_entries (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            storage_path TEXT NOT NULL UNIQUE,
            file_name TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            content_type TEXT NOT NULL,
            content_digest TEXT,
            title TEXT NOT NULL,
            doc_type TEXT NOT NULL,
            tags_json TEXT NOT NULL DEFAULT '[]',
            equipment_model TEXT,
            manufacturer TEXT,
            year INTEGER,
            norm_source TEXT,
            description TEXT,
            serial_number TEXT,
            plant_unit TEXT,
            system_area TEXT,
            revision_version TEXT,
            version INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Legacy rows have no digest; NULLs never collide in a unique index.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_catalog_owner_digest
        ON catalog_entries(owner_id, content_digest)
        WHERE content_digest IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_catalog_owner_updated ON catalog_entries(owner_id, updated_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_catalog_owner_doc_type ON catalog_entries(owner_id, doc_type)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
