//! # Database Migrations
//!
//! Embedded SQL migrations for the catalog schema.
//!
//! ## Schema Invariants Owned by the Store
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  001_catalog_schema.sql                                                 │
//! │                                                                         │
//! │  categories                                                            │
//! │  ├── CHECK length(name) 1..=100, length(description) 1..=500           │
//! │  └── UNIQUE (name) WHERE is_deleted = 0   ← partial index              │
//! │                                                                         │
//! │  products                                                              │
//! │  ├── CHECK price_cents >= 0, stock >= 0                                │
//! │  └── category_id → categories(id) ON DELETE RESTRICT                   │
//! │                                                                         │
//! │  002_category_soft_delete_guard.sql                                     │
//! │  └── trigger: is_deleted 0 → 1 refused while live products reference it │
//! │                                                                         │
//! │  003_unit_of_work_markers.sql                                           │
//! │  └── unit_of_work_markers (session_id, save_seq): last save per session │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file in `migrations/sqlite/` with the next sequence number
//! 2. Name format: `NNN_description.sql`
//! 3. **NEVER** modify existing migrations - always add new ones

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations from the `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations, each in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!(
        available = MIGRATOR.migrations.len(),
        "Checking for pending migrations"
    );

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;

    Ok((total, applied as usize))
}
