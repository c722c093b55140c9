//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. The indexes that carry business invariants (no double booking, a
//! single open cashier session) are partial indexes that `SeaORM` cannot express
//! from an entity, so they are issued as raw statements right after the tables.

use crate::entities::{
    Appointment, BarberStat, CashierSession, CashierTransaction, CutHistory, Order, OrderItem,
    Product, Service, ShopSetting,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/chairside.sqlite?mode=rwc";

/// Statements enforcing invariants at the storage level.
const INVARIANT_INDEXES: [&str; 3] = [
    // One live booking per barber per instant; cancelled rows free the slot.
    r#"CREATE UNIQUE INDEX IF NOT EXISTS ux_appointments_barber_slot
       ON appointments (barber_id, scheduled_at) WHERE status <> 'CANCELLED'"#,
    // At most one open register.
    r#"CREATE UNIQUE INDEX IF NOT EXISTS ux_cashier_sessions_single_open
       ON cashier_sessions (status) WHERE status = 'OPEN'"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS ux_barber_stats_session_barber
       ON barber_stats (session_id, barber_id)"#,
];

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let url = get_database_url();
    ensure_sqlite_dir(&url)?;
    Database::connect(url).await.map_err(Into::into)
}

/// Creates the parent directory of a file-backed `SQLite` URL.
fn ensure_sqlite_dir(url: &str) -> Result<()> {
    let Some(rest) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = Path::new(rest.split('?').next().unwrap_or(rest));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables and invariant indexes. Safe to run against an existing database.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, ShopSetting).await?;
    create_table(db, &schema, Service).await?;
    create_table(db, &schema, Product).await?;
    create_table(db, &schema, Appointment).await?;
    create_table(db, &schema, CutHistory).await?;
    create_table(db, &schema, CashierSession).await?;
    create_table(db, &schema, CashierTransaction).await?;
    create_table(db, &schema, BarberStat).await?;
    create_table(db, &schema, Order).await?;
    create_table(db, &schema, OrderItem).await?;

    for statement in INVARIANT_INDEXES {
        db.execute_unprepared(statement).await?;
    }

    Ok(())
}
