//! Example consumer: registers its model packages with tendril-db, creates the schema and
//! runs a unit of work in a session.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Set `DATABASE_HOST`, `DATABASE_USER`, `DATABASE_PASS` and `DATABASE_DB` (or a `.env` file).
//! Pass `--dump-config` to print the effective configuration without connecting.

use clap::Parser;
use std::path::PathBuf;
use tendril_db::config::{db_core_group, db_group, ConfigManager};
use tendril_db::{
    commit_metadata, ensure_database_exists, get_metadata_from_config, with_session, ColumnDef,
    Database, DbError, MetaData, MetadataError, PackageRegistry, TableDef,
};
use sqlx::{PgPool, Postgres, Transaction};

#[derive(Parser)]
#[command(name = "example-consumer")]
#[command(about = "Create the Tendril schema and stock an inventory line")]
struct Cli {
    /// Path to a JSON config file (defaults to $TENDRIL_DB_CONFIG)
    #[arg(short, long, env = "TENDRIL_DB_CONFIG")]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,
}

fn inventory_models(md: &mut MetaData) -> Result<(), MetadataError> {
    md.add_table(
        TableDef::base("InventoryLocation")
            .column(ColumnDef::new("name", "VARCHAR(50)").not_null().unique()),
    )?;
    md.add_table(
        TableDef::base("InventoryLine")
            .column(ColumnDef::new("ident", "VARCHAR(255)").not_null())
            .column(ColumnDef::new("qty", "INTEGER").not_null().default_expr("0"))
            .column(ColumnDef::new("location_id", "INTEGER").not_null().references("InventoryLocation", "id"))
            .with_timestamps(),
    )
}

fn auth_models(md: &mut MetaData) -> Result<(), MetadataError> {
    md.add_table(
        TableDef::base("User")
            .column(ColumnDef::new("name", "VARCHAR(255)").not_null().unique())
            .with_created_timestamp(),
    )
}

fn registry() -> PackageRegistry {
    let mut registry = PackageRegistry::new();
    registry
        .register("tendril.inventory", inventory_models)
        .register("tendril.auth", auth_models)
        .register_without_models("tendril.utils");
    registry
}

/// Add stock for `ident` and return its new total. Runs in the caller's session when given one.
async fn stock_line(
    pool: &PgPool,
    session: Option<&mut Transaction<'static, Postgres>>,
    ident: String,
    qty: i32,
    location_id: i32,
) -> Result<i64, DbError> {
    with_session(pool, session, move |tx| {
        Box::pin(async move {
            sqlx::query("INSERT INTO \"InventoryLine\" (ident, qty, location_id) VALUES ($1, $2, $3)")
                .bind(&ident)
                .bind(qty)
                .bind(location_id)
                .execute(&mut **tx)
                .await?;
            let (total,): (i64,) = sqlx::query_as(
                "SELECT COALESCE(SUM(qty), 0)::BIGINT FROM \"InventoryLine\" WHERE ident = $1",
            )
            .bind(&ident)
            .fetch_one(&mut **tx)
            .await?;
            Ok::<_, DbError>(total)
        })
    })
    .await
}

/// Create the location if needed and stock the line in the same session.
async fn restock(db: &Database, location: String, ident: String, qty: i32) -> Result<i64, DbError> {
    let pool = db.pool().clone();
    db.session(move |tx| {
        Box::pin(async move {
            let (location_id,): (i32,) = sqlx::query_as(
                "INSERT INTO \"InventoryLocation\" (name) VALUES ($1) \
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id",
            )
            .bind(&location)
            .fetch_one(&mut **tx)
            .await?;
            let total = stock_line(&pool, Some(tx), ident, qty, location_id).await?;
            Ok::<_, DbError>(total)
        })
    })
    .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ConfigManager::load_env_file();
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tendril_db=info,sqlx=warn")),
        )
        .init();

    let mut mgr = ConfigManager::new();
    if let Some(path) = cli.config {
        mgr = mgr.with_file(path)?;
    }
    mgr.load_group(&db_core_group())?;
    mgr.load_group(&db_group())?;
    if cli.dump_config {
        println!("{}", serde_json::to_string_pretty(&mgr.describe())?);
        return Ok(());
    }

    let db = Database::from_config(&mut mgr)?;

    let config = tendril_db::DatabaseConfig::from_manager(&mgr, "")?;
    ensure_database_exists(&config.uri()?).await?;

    let metadata = get_metadata_from_config(&registry(), &mgr)?;
    commit_metadata(db.pool(), &metadata).await?;

    let total = restock(&db, "Shelf A".into(), "RES 0603 10K".into(), 100).await?;
    tracing::info!(total, "restocked");
    let pool = db.pool().clone();
    let (location_id,): (i32,) = sqlx::query_as("SELECT id FROM \"InventoryLocation\" WHERE name = $1")
        .bind("Shelf A")
        .fetch_one(&pool)
        .await?;
    let total = stock_line(&pool, None, "RES 0603 10K".into(), -10, location_id).await?;
    tracing::info!(total, "consumed");
    Ok(())
}
