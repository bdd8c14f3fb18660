use sqlx::SqlitePool;
use tracing::{debug, info};

use super::StoreError;

struct Migration {
    id: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: "001_energy_data",
        sql: r#"
            CREATE TABLE IF NOT EXISTS energy_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                hour TEXT NOT NULL,
                total REAL NOT NULL DEFAULT 0,
                natural_gas REAL NOT NULL DEFAULT 0,
                dammed_hydro REAL NOT NULL DEFAULT 0,
                lignite REAL NOT NULL DEFAULT 0,
                river REAL NOT NULL DEFAULT 0,
                import_coal REAL NOT NULL DEFAULT 0,
                wind REAL NOT NULL DEFAULT 0,
                sun REAL NOT NULL DEFAULT 0,
                fuel_oil REAL NOT NULL DEFAULT 0,
                geothermal REAL NOT NULL DEFAULT 0,
                asphaltite_coal REAL NOT NULL DEFAULT 0,
                black_coal REAL NOT NULL DEFAULT 0,
                biomass REAL NOT NULL DEFAULT 0,
                naphta REAL NOT NULL DEFAULT 0,
                lng REAL NOT NULL DEFAULT 0,
                import_export REAL NOT NULL DEFAULT 0,
                waste_heat REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_energy_date_hour
                ON energy_data (date, hour);
            CREATE INDEX IF NOT EXISTS idx_energy_date
                ON energy_data (date);
            CREATE TABLE IF NOT EXISTS data_collection_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                status TEXT NOT NULL,
                records_inserted INTEGER NOT NULL DEFAULT 0,
                records_updated INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                execution_time_ms INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
    },
    Migration {
        id: "002_market_and_weather",
        sql: r#"
            CREATE TABLE IF NOT EXISTS ptf_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                hour TEXT NOT NULL,
                price_try REAL NOT NULL DEFAULT 0,
                price_usd REAL,
                price_eur REAL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_ptf_date_hour
                ON ptf_data (date, hour);
            CREATE TABLE IF NOT EXISTS consumption_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                hour TEXT NOT NULL,
                consumption REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_consumption_date_hour
                ON consumption_data (date, hour);
            CREATE TABLE IF NOT EXISTS weather_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                hour TEXT NOT NULL,
                temperature REAL NOT NULL DEFAULT 0,
                windspeed REAL NOT NULL DEFAULT 0,
                winddirection REAL NOT NULL DEFAULT 0,
                direct_radiation REAL NOT NULL DEFAULT 0,
                precipitation REAL NOT NULL DEFAULT 0,
                cloudcover REAL NOT NULL DEFAULT 0,
                humidity REAL NOT NULL DEFAULT 0,
                city TEXT NOT NULL,
                latitude REAL NOT NULL DEFAULT 0,
                longitude REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_weather_date_hour_city
                ON weather_data (date, hour, city)
        "#,
    },
    Migration {
        id: "003_staging_and_backfill",
        sql: r#"
            CREATE TABLE IF NOT EXISTS energy_data_staging (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                hour TEXT NOT NULL,
                total REAL NOT NULL DEFAULT 0,
                natural_gas REAL NOT NULL DEFAULT 0,
                dammed_hydro REAL NOT NULL DEFAULT 0,
                lignite REAL NOT NULL DEFAULT 0,
                river REAL NOT NULL DEFAULT 0,
                import_coal REAL NOT NULL DEFAULT 0,
                wind REAL NOT NULL DEFAULT 0,
                sun REAL NOT NULL DEFAULT 0,
                fuel_oil REAL NOT NULL DEFAULT 0,
                geothermal REAL NOT NULL DEFAULT 0,
                asphaltite_coal REAL NOT NULL DEFAULT 0,
                black_coal REAL NOT NULL DEFAULT 0,
                biomass REAL NOT NULL DEFAULT 0,
                naphta REAL NOT NULL DEFAULT 0,
                lng REAL NOT NULL DEFAULT 0,
                import_export REAL NOT NULL DEFAULT 0,
                waste_heat REAL NOT NULL DEFAULT 0,
                is_valid INTEGER NOT NULL DEFAULT 1,
                is_interpolated INTEGER NOT NULL DEFAULT 0,
                is_outlier INTEGER NOT NULL DEFAULT 0,
                validation_errors TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_staging_date_hour
                ON energy_data_staging (date, hour);
            CREATE TABLE IF NOT EXISTS backfill_progress (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                last_processed_date TEXT,
                records_processed INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'in_progress',
                error_message TEXT,
                started_at TEXT NOT NULL DEFAULT (datetime('now')),
                finished_at TEXT
            )
        "#,
    },
];

pub(super) async fn run(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS migrations (
            id TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await?;

    for migration in MIGRATIONS {
        let applied: Option<(String,)> =
            sqlx::query_as("SELECT id FROM migrations WHERE id = ?")
                .bind(migration.id)
                .fetch_optional(pool)
                .await?;
        if applied.is_some() {
            debug!(id = migration.id, "migration already applied");
            continue;
        }

        for statement in migration.sql.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            if let Err(e) = sqlx::query(statement).execute(pool).await {
                // Re-running against an older database that predates the
                // migrations table is fine.
                let benign = matches!(
                    &e,
                    sqlx::Error::Database(db) if db.message().contains("already exists")
                );
                if !benign {
                    return Err(StoreError::Migration {
                        id: migration.id.to_string(),
                        source: e,
                    });
                }
            }
        }

        sqlx::query("INSERT INTO migrations (id) VALUES (?)")
            .bind(migration.id)
            .execute(pool)
            .await?;
        info!(id = migration.id, "applied migration");
    }

    Ok(())
}
