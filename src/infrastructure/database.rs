use crate::entities::{chunk_infos, file_infos};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema, Statement};
use std::env;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://uploads.db?mode=rwc";

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_file_infos_file_hash ON file_infos(file_hash)",
    "CREATE INDEX IF NOT EXISTS idx_file_infos_status_updated_at ON file_infos(status, updated_at)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_file_infos_completed_hash ON file_infos(file_hash) WHERE status = 'completed'",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_chunk_infos_file_chunk ON chunk_infos(file_id, chunk_num)",
];

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(50)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

/// Creates the record tables from their entities, then the lookup indexes.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    info!("🔄 Running schema bootstrap...");
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let stmts = vec![
        schema
            .create_table_from_entity(file_infos::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(chunk_infos::Entity)
            .if_not_exists()
            .to_owned(),
    ];

    for stmt in stmts {
        db.execute(builder.build(&stmt)).await?;
    }

    for sql in INDEXES {
        db.execute(Statement::from_string(builder, sql.to_string()))
            .await?;
    }

    Ok(())
}
