use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;

use crate::config::DatabaseConfig;

pub mod models;
pub mod schemas;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Session settings applied to every pooled connection. Timestamps are
/// stored and compared in UTC throughout.
const SESSION_SETUP: &[&str] = &[
    "SET timezone = 'UTC'",
    "SET application_name = 'seva_setu_api'",
];

#[derive(Debug)]
struct SessionSetup;

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for SessionSetup {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        for statement in SESSION_SETUP {
            diesel::sql_query(*statement)
                .execute(conn)
                .map_err(diesel::r2d2::Error::QueryError)?;
        }
        Ok(())
    }
}

/// Build the pool and bring the schema up to date before serving anything.
pub async fn establish_connection(
    config: &DatabaseConfig,
) -> Result<DbPool, Box<dyn std::error::Error + Send + Sync>> {
    let pool = Pool::builder()
        .connection_customizer(Box::new(SessionSetup))
        .max_size(config.max_connections)
        .min_idle(Some(config.min_connections))
        .connection_timeout(Duration::from_secs(config.connect_timeout))
        .idle_timeout(Some(Duration::from_secs(config.idle_timeout)))
        .max_lifetime(Some(Duration::from_secs(config.max_lifetime)))
        .build(ConnectionManager::<PgConnection>::new(&config.url))?;

    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)?;
    drop(conn);

    Ok(pool)
}
