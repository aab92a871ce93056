use anyhow::Context;
use sea_orm::{ConnectionTrait, Database, Statement};
use std::env;

/// Drops the files table and migration bookkeeping so the next server start
/// recreates the schema from scratch. Development use only.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let db = Database::connect(database_url)
        .await
        .context("Failed to connect to database")?;
    let backend = db.get_database_backend();

    for table in ["files", "seaql_migrations"] {
        db.execute(Statement::from_string(
            backend,
            format!("DROP TABLE IF EXISTS \"{table}\""),
        ))
        .await
        .with_context(|| format!("Failed to drop {table}"))?;
        println!("Dropped {table}");
    }

    println!("Database reset successfully");
    Ok(())
}
