use std::cmp::Ordering;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::RepoResult;
use crate::orders::status_workflow::{SEED_STATI_ORDINE, SEED_STATI_PAGAMENTO};
use crate::validation::normalize_key;

/// Type alias for the SQLite connection pool
pub type DbPool = SqlitePool;

/// Collation of every business-key column: trimmed, Unicode lowercase.
///
/// SQLite's built-in `NOCASE` folds ASCII only, so "Babà" and "BABÀ" would
/// count as different names.
pub const KEY_COLLATION: &str = "KEY_NOCASE";

fn compare_keys(a: &str, b: &str) -> Ordering {
    normalize_key(a).cmp(&normalize_key(b))
}

/// Connection options shared by the pool and the test fixtures.
///
/// Foreign keys are enforced and [`KEY_COLLATION`] is registered on every
/// connection; the schema cannot be opened without it.
pub fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .collation(KEY_COLLATION, compare_keys))
}

/// Creates and configures a SQLite connection pool
///
/// # Arguments
/// * `database_url` - SQLite connection string (`sqlite://file.db`, `sqlite::memory:`)
/// * `max_connections` - Upper bound on pooled connections
///
/// An in-memory database exists per connection, so callers using
/// `sqlite::memory:` must pass `max_connections = 1`.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    tracing::debug!("Creating database connection pool");

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(connect_options(database_url)?)
        .await?;

    tracing::info!("Database connection pool created successfully");
    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &DbPool) -> RepoResult<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Migrations completed successfully");
    Ok(())
}

/// Inserts the seed order and payment states when missing.
///
/// Idempotent: existing names (compared case-insensitively by the column
/// collation) are left untouched.
pub async fn seed_defaults(pool: &DbPool) -> RepoResult<()> {
    let mut tx = pool.begin().await?;

    for (nome, terminale) in SEED_STATI_ORDINE {
        sqlx::query(
            r#"
            INSERT INTO stato_ordine (stato_ordine, terminale)
            SELECT ?1, ?2
            WHERE NOT EXISTS (SELECT 1 FROM stato_ordine WHERE stato_ordine = ?1)
            "#,
        )
        .bind(*nome)
        .bind(*terminale)
        .execute(&mut *tx)
        .await?;
    }

    for nome in SEED_STATI_PAGAMENTO {
        sqlx::query(
            r#"
            INSERT INTO stato_pagamento (stato_pagamento)
            SELECT ?1
            WHERE NOT EXISTS (SELECT 1 FROM stato_pagamento WHERE stato_pagamento = ?1)
            "#,
        )
        .bind(*nome)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!(
        "Seed states ensured ({} order states, {} payment states)",
        SEED_STATI_ORDINE.len(),
        SEED_STATI_PAGAMENTO.len()
    );
    Ok(())
}

/// Closed set of persisted entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    LogAttivita,
    OrderItem,
    StatoStoricoOrdine,
    Ordine,
    ConfigSoglieTempi,
    PreferitiCliente,
    Cliente,
    BevandaStandard,
    BevandaCustom,
    Dolce,
    Articolo,
    IngredientiPersonalizzazione,
    PersonalizzazioneCustom,
    DimensioneQuantitaIngredienti,
    PersonalizzazioneIngrediente,
    Personalizzazione,
    Ingrediente,
    DimensioneBicchiere,
    UnitaDiMisura,
    Tavolo,
    TaxRates,
    StatoOrdine,
    StatoPagamento,
    Utente,
}

impl EntityKind {
    /// Every kind, children before the tables they reference.
    pub const DEPENDENTS_FIRST: [EntityKind; 24] = [
        EntityKind::LogAttivita,
        EntityKind::OrderItem,
        EntityKind::StatoStoricoOrdine,
        EntityKind::Ordine,
        EntityKind::ConfigSoglieTempi,
        EntityKind::PreferitiCliente,
        EntityKind::Cliente,
        EntityKind::BevandaStandard,
        EntityKind::BevandaCustom,
        EntityKind::Dolce,
        EntityKind::Articolo,
        EntityKind::IngredientiPersonalizzazione,
        EntityKind::PersonalizzazioneCustom,
        EntityKind::DimensioneQuantitaIngredienti,
        EntityKind::PersonalizzazioneIngrediente,
        EntityKind::Personalizzazione,
        EntityKind::Ingrediente,
        EntityKind::DimensioneBicchiere,
        EntityKind::UnitaDiMisura,
        EntityKind::Tavolo,
        EntityKind::TaxRates,
        EntityKind::StatoOrdine,
        EntityKind::StatoPagamento,
        EntityKind::Utente,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::LogAttivita => "log_attivita",
            EntityKind::OrderItem => "order_item",
            EntityKind::StatoStoricoOrdine => "stato_storico_ordine",
            EntityKind::Ordine => "ordine",
            EntityKind::ConfigSoglieTempi => "config_soglie_tempi",
            EntityKind::PreferitiCliente => "preferiti_cliente",
            EntityKind::Cliente => "cliente",
            EntityKind::BevandaStandard => "bevanda_standard",
            EntityKind::BevandaCustom => "bevanda_custom",
            EntityKind::Dolce => "dolce",
            EntityKind::Articolo => "articolo",
            EntityKind::IngredientiPersonalizzazione => "ingredienti_personalizzazione",
            EntityKind::PersonalizzazioneCustom => "personalizzazione_custom",
            EntityKind::DimensioneQuantitaIngredienti => "dimensione_quantita_ingredienti",
            EntityKind::PersonalizzazioneIngrediente => "personalizzazione_ingrediente",
            EntityKind::Personalizzazione => "personalizzazione",
            EntityKind::Ingrediente => "ingrediente",
            EntityKind::DimensioneBicchiere => "dimensione_bicchiere",
            EntityKind::UnitaDiMisura => "unita_di_misura",
            EntityKind::Tavolo => "tavolo",
            EntityKind::TaxRates => "tax_rates",
            EntityKind::StatoOrdine => "stato_ordine",
            EntityKind::StatoPagamento => "stato_pagamento",
            EntityKind::Utente => "utenti",
        }
    }
}

/// Removes every row of one entity kind, returning the number of rows deleted.
///
/// Foreign keys stay enforced: truncating a table that still has dependents
/// fails with a database error. Use [`truncate_all`] to clear everything.
pub async fn truncate(pool: &DbPool, kind: EntityKind) -> RepoResult<u64> {
    // table names come from a closed match, never from caller input
    let sql = format!("DELETE FROM {}", kind.table_name());
    let result = sqlx::query(&sql).execute(pool).await?;
    tracing::debug!("Truncated {} ({} rows)", kind.table_name(), result.rows_affected());
    Ok(result.rows_affected())
}

/// Clears every table, dependents first, in one transaction.
pub async fn truncate_all(pool: &DbPool) -> RepoResult<()> {
    let mut tx = pool.begin().await?;
    for kind in EntityKind::DEPENDENTS_FIRST {
        let sql = format!("DELETE FROM {}", kind.table_name());
        sqlx::query(&sql).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepositoryError;
    use crate::test_support::TestDb;

    #[tokio::test]
    async fn test_seed_defaults_is_idempotent() {
        let db = TestDb::new().await;
        seed_defaults(&db.pool).await.unwrap();
        seed_defaults(&db.pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stato_ordine")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, SEED_STATI_ORDINE.len() as i64);

        let terminali: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM stato_ordine WHERE terminale = 1")
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(terminali, 2);
    }

    #[test]
    fn test_compare_keys_folds_accented_letters() {
        assert_eq!(compare_keys("Babà", "  BABÀ "), Ordering::Equal);
        assert_eq!(compare_keys("Caffè", "CAFFÈ"), Ordering::Equal);
        assert_ne!(compare_keys("Caffè", "Caffe"), Ordering::Equal);
    }

    #[tokio::test]
    async fn test_key_index_rejects_unicode_case_variant() {
        let db = TestDb::new().await;
        let insert = "INSERT INTO unita_di_misura (sigla, descrizione) VALUES (?, 'tazza')";
        sqlx::query(insert).bind("Tè").execute(&db.pool).await.unwrap();

        let duplicate = sqlx::query(insert).bind("TÈ").execute(&db.pool).await;
        let err = RepositoryError::from(duplicate.unwrap_err());
        assert!(err.is_unique_violation());

        let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM unita_di_misura WHERE sigla = 'tè'")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(found, 1);
    }

    #[tokio::test]
    async fn test_truncate_single_kind() {
        let db = TestDb::new().await;
        db.tavolo(1).await;
        db.tavolo(2).await;

        let removed = truncate(&db.pool, EntityKind::Tavolo).await.unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn test_truncate_parent_with_children_fails() {
        let db = TestDb::new().await;
        let tavolo_id = db.tavolo(1).await;
        db.cliente(tavolo_id).await;

        assert!(truncate(&db.pool, EntityKind::Tavolo).await.is_err());
    }

    #[tokio::test]
    async fn test_truncate_all_clears_everything() {
        let db = TestDb::new().await;
        seed_defaults(&db.pool).await.unwrap();
        let tavolo_id = db.tavolo(3).await;
        db.cliente(tavolo_id).await;

        truncate_all(&db.pool).await.unwrap();

        for kind in EntityKind::DEPENDENTS_FIRST {
            let sql = format!("SELECT COUNT(*) FROM {}", kind.table_name());
            let count: i64 = sqlx::query_scalar(&sql).fetch_one(&db.pool).await.unwrap();
            assert_eq!(count, 0, "{} not empty", kind.table_name());
        }
    }
}
