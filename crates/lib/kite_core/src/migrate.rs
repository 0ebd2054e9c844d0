//! Database migration support.
//!
//! Each service owns its tables. Migrations live under
//! `kite_core/migrations/<service>/` and carry disjoint version numbers, so
//! the identity and post services may share one database during development.

use sqlx::PgPool;
use sqlx::migrate::MigrateError;

/// Run the identity service migrations (`users`, `refresh_tokens`).
pub async fn migrate_identity(pool: &PgPool) -> Result<(), MigrateError> {
    let mut migrator = sqlx::migrate!("./migrations/identity");
    migrator.set_ignore_missing(true);
    migrator.run(pool).await
}

/// Run the post service migrations (`posts`).
pub async fn migrate_posts(pool: &PgPool) -> Result<(), MigrateError> {
    let mut migrator = sqlx::migrate!("./migrations/posts");
    migrator.set_ignore_missing(true);
    migrator.run(pool).await
}
